//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::metric::Metric;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    Permit,
    Deny,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteMapVerdict {
    Match,
    DenyMatch,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    In,
    Out,
}

/// Mutable view of a candidate route passed to the route-map collaborator.
/// Fields ending in `_out` hold the route-map's
/// output; the collaborator may rewrite them in place before returning
/// `Match`.
#[derive(Clone, Debug)]
pub struct RouteInfo {
    pub prefix: Ipv4Network,
    pub nexthop: Ipv4Addr,
    pub nexthop_out: Ipv4Addr,
    pub metric: Metric,
    pub metric_out: Metric,
    pub tag: u16,
    pub tag_out: u16,
}

impl RouteInfo {
    pub fn new(prefix: Ipv4Network, nexthop: Ipv4Addr, metric: Metric, tag: u16) -> Self {
        RouteInfo {
            prefix,
            nexthop,
            nexthop_out: nexthop,
            metric,
            metric_out: metric,
            tag,
            tag_out: tag,
        }
    }
}

/// Named access-list predicate collaborator.
pub trait AccessList {
    fn apply(&self, name: &str, prefix: &Ipv4Network) -> Option<Verdict>;
}

/// Named prefix-list predicate collaborator.
pub trait PrefixList {
    fn apply(&self, name: &str, prefix: &Ipv4Network) -> Option<Verdict>;
}

/// Named route-map collaborator; may mutate `info` in place.
pub trait RouteMap {
    fn apply(&self, name: &str, info: &mut RouteInfo) -> RouteMapVerdict;
}

/// Named offset-list collaborator: adds a configured offset to `metric` if
/// the prefix and interface match; returns whether it matched.
pub trait OffsetList {
    fn apply(
        &self,
        name: &str,
        direction: Direction,
        prefix: &Ipv4Network,
        ifname: &str,
        metric: &mut Metric,
    ) -> bool;
}
