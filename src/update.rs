//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use itertools::Itertools;

use crate::events::classful_prefix_len;
use crate::interface::{Interface, SplitHorizon};
use crate::metric::Metric;
use crate::packet::{Command, Pdu, Rte, RteIpv4, RteZero};
use crate::policy::{Direction, OffsetList, RouteInfo, RouteMap, RouteMapVerdict};
use crate::route::{RouteOrigin, RouteTable};

pub const RIPV2_MCAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 9);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResponseType {
    Periodic,
    Triggered,
}

#[derive(Clone, Copy, Debug)]
pub enum SendDestination {
    Multicast,
    Broadcast(Ipv4Addr),
    Unicast(Ipv4Addr),
}

/// Per-interface egress collaborators: the output route-map and offset-list.
pub struct EgressPolicy<'a> {
    pub route_map: &'a dyn RouteMap,
    pub offset_list: &'a dyn OffsetList,
}

/// The egress-side redistribution defaults not carried on `RouteEntry`
/// itself: the default redistribute metric applied to non-rip,
/// non-connected sources with no more specific metric configured.
#[derive(Clone, Copy, Debug)]
pub struct RedistributeDefaults {
    pub default_metric: Metric,
}

/// Returns the multicast/broadcast/unicast destinations an interface should
/// send a dump to.
pub fn destinations(iface: &Interface, version: u8) -> Vec<SendDestination> {
    let mut dsts = Vec::new();

    if version == 2 {
        dsts.push(SendDestination::Multicast);
    } else if let Some(broadcast) = iface.system.broadcast {
        dsts.push(SendDestination::Broadcast(broadcast));
    } else if let Some(net) = iface.system.addr_list.iter().next() {
        dsts.push(SendDestination::Broadcast(net.broadcast()));
    }

    for nbr in &iface.config.explicit_neighbors {
        dsts.push(SendDestination::Unicast(*nbr));
    }

    dsts
}

/// Step 2: for RIPv1, decides whether `prefix` survives the classful-dump
/// filter on this interface. RIPv2 dumps are unfiltered by classfulness.
fn v1_classful_allows(prefix: &Ipv4Network, iface: &Interface) -> bool {
    let Some(primary) = iface.system.primary_classful() else {
        return true;
    };
    let iface_len = iface
        .system
        .addr_list
        .iter()
        .next()
        .map(|n| n.prefix())
        .unwrap_or(primary.prefix());
    let subnetted = iface_len > primary.prefix();
    if !subnetted {
        return true;
    }

    let classful_len = classful_prefix_len(prefix.ip());
    let classful_net = match Ipv4Network::new(prefix.ip(), classful_len) {
        Ok(n) => n.network(),
        Err(_) => return true,
    };

    if primary.network() == classful_net {
        prefix.prefix() == iface_len || prefix.prefix() == 32
    } else {
        prefix.prefix() == classful_len || prefix.ip() == Ipv4Addr::UNSPECIFIED
    }
}

/// Step 5: split-horizon / poisoned-reverse. Returns `None` if the route
/// should be suppressed entirely (plain split horizon), otherwise the
/// (possibly poisoned) metric to advertise.
fn split_horizon_metric(
    origin: &RouteOrigin,
    route_prefix: &Ipv4Network,
    route_ifindex: u32,
    metric: Metric,
    iface: &Interface,
    iface_ifindex: u32,
) -> Option<Metric> {
    let learned_via_this_iface = match origin {
        RouteOrigin::LearnedRip => route_ifindex == iface_ifindex,
        RouteOrigin::Connected => iface.system.addr_list.contains(route_prefix),
        _ => false,
    };

    if !learned_via_this_iface {
        return Some(metric);
    }

    match iface.config.split_horizon {
        SplitHorizon::Disabled => Some(metric),
        SplitHorizon::Simple => None,
        SplitHorizon::PoisonReverse => {
            let mut m = metric;
            m.set_infinite();
            Some(m)
        }
    }
}

/// Step 6: computes the advertised metric for one route.
fn compute_metric_out(
    origin: &RouteOrigin,
    own_metric: Metric,
    external_metric: Option<Metric>,
    route_map_metric: Option<Metric>,
    defaults: &RedistributeDefaults,
) -> Metric {
    let base = if let Some(m) = route_map_metric {
        m
    } else if let Some(m) = external_metric {
        if !own_metric.is_infinite() { m } else { own_metric }
    } else if origin.is_redistribute() {
        defaults.default_metric
    } else {
        own_metric
    };
    base
}

/// Builds the dump for one (interface, RIP version) pair, chunked to
/// `max_entries` RTEs per packet. Returns an empty vector
/// when nothing is advertisable.
#[allow(clippy::too_many_arguments)]
pub fn build_dump(
    routes: &RouteTable,
    iface: &Interface,
    iface_ifindex: u32,
    version: u8,
    response_type: ResponseType,
    policy: &EgressPolicy,
    defaults: &RedistributeDefaults,
    max_entries: usize,
) -> Vec<Pdu> {
    let mut rtes = Vec::new();

    for (prefix, entry) in routes.iter() {
        if response_type == ResponseType::Triggered && !entry.is_changed() {
            continue;
        }

        if version == 1 && !v1_classful_allows(prefix, iface) {
            continue;
        }

        let mut info = RouteInfo::new(*prefix, entry.nexthop, entry.metric, entry.tag);
        if let Some(name) = &iface.config.filters_out.route_map {
            if policy.route_map.apply(name, &mut info) == RouteMapVerdict::DenyMatch {
                continue;
            }
        }
        let route_map_metric = if info.metric_out != entry.metric {
            Some(info.metric_out)
        } else {
            None
        };

        let Some(mut metric) = split_horizon_metric(
            &entry.origin,
            prefix,
            entry.ifindex,
            entry.metric,
            iface,
            iface_ifindex,
        ) else {
            continue;
        };

        if !metric.is_infinite() {
            metric = compute_metric_out(
                &entry.origin,
                metric,
                entry.external_metric,
                route_map_metric,
                defaults,
            );
        }

        if let Some(name) = &iface.config.filters_out.offset_list {
            policy
                .offset_list
                .apply(name, Direction::Out, prefix, &iface.name, &mut metric);
        }

        // Step 7: nexthop_out.
        let nexthop_out = if entry.origin.is_learned_rip() && entry.ifindex == iface_ifindex {
            entry.nexthop
        } else {
            Ipv4Addr::UNSPECIFIED
        };

        rtes.push(RteIpv4 {
            tag: info.tag_out,
            prefix_addr: prefix.ip(),
            prefix_mask: prefix.mask(),
            nexthop: nexthop_out,
            metric,
        });
    }

    if rtes.is_empty() {
        return Vec::new();
    }

    rtes.into_iter()
        .chunks(max_entries)
        .into_iter()
        .map(|chunk| Pdu {
            command: Command::Response,
            version,
            rtes: chunk.map(Rte::Ipv4).collect(),
            rte_errors: Vec::new(),
        })
        .collect()
}

/// Builds the response to an inbound Request. `request` is the
/// already-decoded RTE list.
pub fn handle_request(
    routes: &RouteTable,
    iface: &Interface,
    iface_ifindex: u32,
    version: u8,
    request: &[Rte],
    policy: &EgressPolicy,
    defaults: &RedistributeDefaults,
    max_entries: usize,
) -> Vec<Pdu> {
    if let [Rte::Zero(RteZero { metric })] = request {
        if metric.is_infinite() {
            return build_dump(
                routes,
                iface,
                iface_ifindex,
                version,
                ResponseType::Periodic,
                policy,
                defaults,
                max_entries,
            );
        }
    }

    let mut rtes = Vec::with_capacity(request.len());
    for rte in request {
        let Rte::Ipv4(req) = rte else { continue };
        let Ok(prefix) = Ipv4Network::with_netmask(req.prefix_addr, req.prefix_mask) else {
            continue;
        };
        let metric = routes
            .get(&prefix)
            .map(|e| e.metric)
            .unwrap_or_else(Metric::infinite);
        rtes.push(RteIpv4 {
            tag: req.tag,
            prefix_addr: req.prefix_addr,
            prefix_mask: req.prefix_mask,
            nexthop: Ipv4Addr::UNSPECIFIED,
            metric,
        });
    }

    rtes.into_iter()
        .chunks(max_entries)
        .into_iter()
        .map(|chunk| Pdu {
            command: Command::Response,
            version,
            rtes: chunk.map(Rte::Ipv4).collect(),
            rte_errors: Vec::new(),
        })
        .collect()
}
