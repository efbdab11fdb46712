//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::metric::Metric;
use crate::route::RedistributeKind;

/// Outbound half of the FIB-sink collaborator: RouteDB calls these
/// when a RIP-learned route is installed or withdrawn from the kernel
/// forwarding table. Calls must be non-blocking or fire-and-forget; retry on
/// failure is the collaborator's concern, not RouteDB's.
pub trait FibSink {
    fn fib_add(&self, prefix: Ipv4Network, nexthop: Ipv4Addr, metric: Metric, distance: u8);
    fn fib_delete(&self, prefix: Ipv4Network, nexthop: Ipv4Addr, metric: Metric);
}

/// A redistribution announcement arriving from another protocol or from
/// kernel/connected-route discovery (inbound `fib_notify_redistribute`).
#[derive(Clone, Debug)]
pub struct RedistributeNotify {
    pub kind: RedistributeKind,
    /// Source-protocol route subtype, opaque to this daemon (e.g. OSPF
    /// intra-area vs. inter-area); carried through to the FIB sink only.
    pub subtype: u8,
    pub prefix: Ipv4Network,
    pub ifindex: u32,
    pub nexthop: Ipv4Addr,
    pub metric: u32,
    pub distance: Option<u8>,
}

/// Inbound `fib_notify_withdraw`: the source protocol has stopped
/// advertising all routes of the given kind (e.g. a BGP session reset).
#[derive(Clone, Copy, Debug)]
pub struct WithdrawNotify {
    pub kind: RedistributeKind,
}
