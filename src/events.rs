//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::time::Duration;

use ipnetwork::Ipv4Network;

use tokio::sync::mpsc::UnboundedSender;

use crate::distance::DistanceTable;
use crate::interface::Interface;
use crate::metric::Metric;
use crate::policy::{AccessList, Direction, OffsetList, PrefixList, RouteInfo, RouteMap, RouteMapVerdict, Verdict};
use crate::route::{RedistributeKind, RouteEntry, RouteOrigin, RouteTable};
use crate::southbound::FibSink;
use crate::tasks::{self, DispatcherMsg};

/// A single RTE as decoded off the wire, reduced to what RouteDB ingestion
/// needs. Built by the Dispatcher from `packet::RteIpv4` before calling
/// [`process_rte`].
#[derive(Clone, Debug)]
pub struct IncomingRte {
    pub prefix_addr: Ipv4Addr,
    /// `None` when the on-wire mask was zero: mask must be inferred.
    pub prefix_mask: Option<Ipv4Addr>,
    pub nexthop: Ipv4Addr,
    pub metric: u32,
    pub tag: u16,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RejectReason {
    BadDestination,
    BadMask,
    BadMetric,
    NexthopIsLocal,
    FilteredIn,
}

/// Collaborators RouteDB ingestion consults; grouped so `process_rte`'s
/// signature doesn't balloon as filter types are added.
pub struct IngressPolicy<'a> {
    pub access_list: &'a dyn AccessList,
    pub prefix_list: &'a dyn PrefixList,
    pub route_map: &'a dyn RouteMap,
    pub offset_list: &'a dyn OffsetList,
}

/// Timer defaults; overridden per instance via `timers basic`.
pub struct Timers {
    pub timeout: Duration,
    pub garbage: Duration,
}

impl Default for Timers {
    fn default() -> Self {
        Timers {
            timeout: Duration::from_secs(180),
            garbage: Duration::from_secs(120),
        }
    }
}

/// Returns the classful prefix length for an IPv4 address (class A → 8,
/// class B → 16, class C → 24), per RFC 1058's implicit-mask rule. Class D/E
/// addresses have no classful mask under this scheme and default to /32,
/// matching the original daemon's behavior of rejecting them earlier in the
/// destination-sanity check.
pub fn classful_prefix_len(addr: Ipv4Addr) -> u8 {
    let octet = addr.octets()[0];
    if octet < 128 {
        8
    } else if octet < 192 {
        16
    } else if octet < 224 {
        24
    } else {
        32
    }
}

/// Step 1: reject net-127 (loopback), net-0 other than the default route,
/// and anything outside class A/B/C unicast space.
fn destination_sane(addr: Ipv4Addr) -> bool {
    let octets = addr.octets();
    if octets[0] == 127 {
        return false;
    }
    if octets[0] == 0 && addr != Ipv4Addr::UNSPECIFIED {
        return false;
    }
    octets[0] < 224
}

/// Step 2: infers the prefix for a v1 RTE, or a v2 RTE with a zero on-wire
/// mask, per the classful/subnetted algorithm (grounded on the original
/// daemon's `subnetted` tri-state logic in `rip_response_process`).
fn infer_prefix(addr: Ipv4Addr, iface: &Interface) -> Option<Ipv4Network> {
    let classful_len = classful_prefix_len(addr);
    let classful_net = Ipv4Network::new(addr, classful_len).ok()?.network();

    if let Some(primary) = iface.system.primary_classful() {
        let iface_len = iface
            .system
            .addr_list
            .iter()
            .next()
            .map(|n| n.prefix())
            .unwrap_or(classful_len);
        let subnetted = iface_len > primary.prefix();

        if subnetted && primary.network() == classful_net {
            let candidate = Ipv4Network::new(addr, iface_len).ok()?;
            if candidate.network() == addr {
                return Some(candidate);
            }
            // Interface's own mask doesn't cover the received address:
            // fall back to a /32 host route (kept deliberately, see
            // SPEC_FULL.md's Resolved Open Questions).
            return Ipv4Network::new(addr, 32).ok();
        }
    }

    let classful = Ipv4Network::new(addr, classful_len).ok()?;
    if classful.network() == addr {
        Some(classful)
    } else {
        None
    }
}

/// Resolves the on-wire prefix for an [`IncomingRte`], applying mask
/// inference when the declared mask is absent/zero (step 2).
fn resolve_prefix(rte: &IncomingRte, iface: &Interface) -> Option<Ipv4Network> {
    match rte.prefix_mask {
        Some(mask) if mask != Ipv4Addr::UNSPECIFIED => {
            let declared = Ipv4Network::with_netmask(rte.prefix_addr, mask).ok()?;
            if declared.network() == rte.prefix_addr {
                Some(declared)
            } else {
                None
            }
        }
        _ => infer_prefix(rte.prefix_addr, iface),
    }
}

/// Step 4: resolves the effective nexthop for a learned route. `datagram_src`
/// is the neighbor `N` that sent the packet; `reachable` tells whether
/// `candidate` is a directly connected, non-multicast unicast address;
/// `local_addrs` is used to reject a nexthop that names this router itself.
fn resolve_nexthop(
    candidate: Ipv4Addr,
    datagram_src: Ipv4Addr,
    reachable: bool,
    routes: &RouteTable,
    iface: &Interface,
) -> Option<Ipv4Addr> {
    if iface.system.contains_addr(candidate) {
        return None;
    }

    if candidate == Ipv4Addr::UNSPECIFIED {
        return Some(datagram_src);
    }
    if candidate.is_multicast() {
        return None;
    }
    if reachable {
        return Some(candidate);
    }
    if let Some((_, entry)) = routes
        .iter()
        .find(|(_, e)| e.origin.is_learned_rip() && e.nexthop == candidate)
    {
        return Some(entry.from);
    }
    Some(datagram_src)
}

/// Outcome of [`process_rte`], reported to the Dispatcher for counter/signal
/// bookkeeping.
pub enum IngestOutcome {
    Rejected(RejectReason),
    Ignored,
    Accepted { triggers_update: bool },
}

/// Ingests one validated RTE from a Response: destination/mask/metric
/// sanity, nexthop resolution, input filtering, then the RFC 2453 §3.9.2
/// acceptance test against any existing entry for the prefix.
#[allow(clippy::too_many_arguments)]
pub fn process_rte(
    routes: &mut RouteTable,
    rte: &IncomingRte,
    datagram_src: Ipv4Addr,
    ifindex: u32,
    iface: &Interface,
    policy: &IngressPolicy,
    distance_table: &DistanceTable,
    timers: &Timers,
    fib: &dyn FibSink,
    msgp: &UnboundedSender<DispatcherMsg>,
) -> IngestOutcome {
    if !destination_sane(rte.prefix_addr) {
        return IngestOutcome::Rejected(RejectReason::BadDestination);
    }

    let Some(prefix) = resolve_prefix(rte, iface) else {
        return IngestOutcome::Rejected(RejectReason::BadMask);
    };

    let Ok(mut metric) = Metric::new(rte.metric) else {
        return IngestOutcome::Rejected(RejectReason::BadMetric);
    };

    // Step 4: nexthop resolution. "Reachable" means the candidate nexthop
    // itself falls within one of the interface's connected prefixes.
    let reachable = rte.nexthop != Ipv4Addr::UNSPECIFIED && iface.system.contains_addr(rte.nexthop);
    let Some(nexthop) = resolve_nexthop(rte.nexthop, datagram_src, reachable, routes, iface) else {
        return IngestOutcome::Rejected(RejectReason::NexthopIsLocal);
    };

    // Step 5: input route-map / distribute-list / prefix-list.
    if let Some(name) = &iface.config.filters_in.access_list {
        if acl_denies(policy.access_list, name, &prefix) {
            return IngestOutcome::Rejected(RejectReason::FilteredIn);
        }
    }
    if let Some(name) = &iface.config.filters_in.prefix_list {
        if prefix_list_denies(policy.prefix_list, name, &prefix) {
            return IngestOutcome::Rejected(RejectReason::FilteredIn);
        }
    }
    let mut info = RouteInfo::new(prefix, nexthop, metric, rte.tag);
    if let Some(name) = &iface.config.filters_in.route_map {
        if policy.route_map.apply(name, &mut info) == RouteMapVerdict::DenyMatch {
            return IngestOutcome::Rejected(RejectReason::FilteredIn);
        }
    }
    let nexthop = info.nexthop_out;
    let tag = info.tag_out;
    metric = info.metric_out;

    // Step 6: additive cost (offset-list, else interface cost).
    let matched_offset = iface
        .config
        .filters_in
        .offset_list
        .as_ref()
        .is_some_and(|name| {
            policy
                .offset_list
                .apply(name, Direction::In, &prefix, &iface.name, &mut metric)
        });
    if !matched_offset {
        metric = metric.add(iface.config.cost.get());
    }

    // Step 7: lookup existing entry and arbitrate.
    let existing_origin = routes.get(&prefix).map(|e| e.origin.clone());
    if let Some(origin) = &existing_origin {
        if origin.is_immortal() && !routes[&prefix].metric.is_infinite() {
            return IngestOutcome::Ignored;
        }
        if origin.is_redistribute() {
            let entry = routes.get(&prefix).unwrap();
            if !entry.metric.is_infinite() {
                let candidate_distance =
                    distance_table.apply(datagram_src, &prefix, policy.access_list);
                if candidate_distance > entry.distance || metric.is_infinite() {
                    return IngestOutcome::Ignored;
                }
                withdraw_entry(routes, fib, &prefix);
                // Displaced: the redistributed entry no longer occupies the
                // prefix, so ingestion falls through to the "no existing
                // entry" branch below.
                routes.remove(&prefix);
            }
        }
    }

    match routes.get_mut(&prefix) {
        None => {
            if metric.is_infinite() {
                return IngestOutcome::Ignored;
            }
            let distance = distance_table.apply(datagram_src, &prefix, policy.access_list);
            let mut entry =
                RouteEntry::new_learned(metric, tag, nexthop, datagram_src, ifindex, distance);
            entry.t_timeout = Some(tasks::route_timeout(prefix, timers.timeout, msgp));
            entry.set_in_fib(true);
            fib.fib_add(prefix, nexthop, metric, entry.effective_distance());
            routes.insert(prefix, entry);
            IngestOutcome::Accepted {
                triggers_update: true,
            }
        }
        Some(entry) if entry.origin.is_learned_rip() => {
            let same = entry.from == datagram_src && entry.ifindex == ifindex;
            let candidate_distance = distance_table.apply(datagram_src, &prefix, policy.access_list);
            let distance_changed = same && entry.distance != candidate_distance;

            let accept = (same && metric != entry.metric)
                || metric < entry.metric
                || (same && metric == entry.metric && tag != entry.tag)
                || entry.distance > candidate_distance
                || distance_changed;

            if !accept {
                if same {
                    entry.t_timeout = Some(tasks::route_timeout(prefix, timers.timeout, msgp));
                }
                return IngestOutcome::Ignored;
            }

            let old_metric = entry.metric;
            let old_nexthop = entry.nexthop;
            entry.metric = metric;
            entry.tag = tag;
            entry.nexthop = nexthop;
            entry.ifindex = ifindex;
            entry.from = datagram_src;
            entry.distance = candidate_distance;
            entry.set_changed();

            if metric.is_infinite() && !old_metric.is_infinite() {
                entry.timeout_cancel();
                entry.t_garbage = Some(tasks::route_gc_timeout(prefix, timers.garbage, msgp));
                if entry.is_in_fib() {
                    fib.fib_delete(prefix, old_nexthop, old_metric);
                    entry.set_in_fib(false);
                }
            } else {
                if old_metric.is_infinite() {
                    fib.fib_add(prefix, nexthop, metric, entry.effective_distance());
                    entry.set_in_fib(true);
                } else {
                    fib.fib_delete(prefix, old_nexthop, old_metric);
                    fib.fib_add(prefix, nexthop, metric, entry.effective_distance());
                }
                entry.t_timeout = Some(tasks::route_timeout(prefix, timers.timeout, msgp));
            }

            IngestOutcome::Accepted {
                triggers_update: true,
            }
        }
        Some(_) => IngestOutcome::Ignored,
    }
}

fn acl_denies(acl: &dyn AccessList, name: &str, prefix: &Ipv4Network) -> bool {
    !matches!(acl.apply(name, prefix), Some(Verdict::Permit))
}

fn prefix_list_denies(pl: &dyn PrefixList, name: &str, prefix: &Ipv4Network) -> bool {
    !matches!(pl.apply(name, prefix), Some(Verdict::Permit))
}

fn withdraw_entry(routes: &mut RouteTable, fib: &dyn FibSink, prefix: &Ipv4Network) {
    if let Some(entry) = routes.get_mut(prefix) {
        if entry.is_in_fib() {
            fib.fib_delete(*prefix, entry.nexthop, entry.metric);
            entry.set_in_fib(false);
        }
    }
}

/// Withdrawal API for redistribution collaborators: marks every entry of
/// `kind` (excluding connected routes) as unreachable and starts garbage
/// collection.
pub fn withdraw_redistribute(
    routes: &mut RouteTable,
    fib: &dyn FibSink,
    kind: RedistributeKind,
    garbage: Duration,
    msgp: &UnboundedSender<DispatcherMsg>,
) -> bool {
    let mut any = false;
    for (prefix, entry) in routes.iter_mut() {
        if !matches!(&entry.origin, RouteOrigin::Redistribute(k) if *k == kind) {
            continue;
        }
        if entry.metric.is_infinite() {
            continue;
        }
        entry.metric.set_infinite();
        entry.timeout_cancel();
        entry.t_garbage = Some(tasks::route_gc_timeout(*prefix, garbage, msgp));
        entry.set_changed();
        if entry.is_in_fib() {
            fib.fib_delete(*prefix, entry.nexthop, entry.metric);
            entry.set_in_fib(false);
        }
        any = true;
    }
    any
}

/// Route-timeout expiry handler: enters the deletion phase, keeping the
/// entry in the table until garbage collection.
pub fn on_timeout(
    routes: &mut RouteTable,
    fib: &dyn FibSink,
    prefix: &Ipv4Network,
    garbage: Duration,
    msgp: &UnboundedSender<DispatcherMsg>,
) {
    let Some(entry) = routes.get_mut(prefix) else {
        return;
    };
    entry.metric.set_infinite();
    if entry.is_in_fib() {
        fib.fib_delete(*prefix, entry.nexthop, entry.metric);
        entry.set_in_fib(false);
    }
    entry.t_garbage = Some(tasks::route_gc_timeout(*prefix, garbage, msgp));
    entry.set_changed();
}

/// Garbage-collection expiry handler: unlinks and frees the entry.
pub fn on_garbage_expiry(routes: &mut RouteTable, prefix: &Ipv4Network) {
    routes.remove(prefix);
}
