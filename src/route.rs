//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use bitflags::bitflags;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::metric::Metric;
use crate::task::TimeoutTask;

/// The route table: one entry per destination prefix.
pub type RouteTable = BTreeMap<Ipv4Network, RouteEntry>;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct RouteFlags: u8 {
        /// Route changed since the last update was emitted; drives triggered updates.
        const CHANGED = 0x01;
        /// Route is currently installed in the FIB sink.
        const IN_FIB  = 0x02;
    }
}

/// Where a RouteEntry came from; determines eligibility for timers,
/// garbage collection and distance-based displacement.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RouteOrigin {
    /// `route A.B.C.D/M` configuration; immortal.
    LocalStatic,
    /// `default-information originate`; immortal.
    DefaultOriginate,
    /// Redistributed from another protocol (e.g. connected, static, OSPF).
    Redistribute(RedistributeKind),
    /// Learned via a RIP Response.
    LearnedRip,
    /// Mirrors a connected interface subnet.
    Connected,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RedistributeKind {
    Kernel,
    Static,
    Connected,
    Ospf,
    Bgp,
    Isis,
}

impl RouteOrigin {
    pub fn is_immortal(&self) -> bool {
        matches!(self, RouteOrigin::LocalStatic | RouteOrigin::DefaultOriginate)
    }

    pub fn is_learned_rip(&self) -> bool {
        matches!(self, RouteOrigin::LearnedRip)
    }

    pub fn is_redistribute(&self) -> bool {
        matches!(self, RouteOrigin::Redistribute(_))
    }
}

/// One routing table entry.
#[derive(Debug)]
pub struct RouteEntry {
    pub origin: RouteOrigin,
    pub metric: Metric,
    pub external_metric: Option<Metric>,
    pub tag: u16,
    /// 0.0.0.0 means "use the datagram source on advertisement".
    pub nexthop: Ipv4Addr,
    /// Advertising neighbor; unset (0.0.0.0) for locally-originated routes.
    pub from: Ipv4Addr,
    pub ifindex: u32,
    /// Administrative distance; 0 means "unset, defaults to 120".
    pub distance: u8,
    pub flags: RouteFlags,
    pub t_timeout: Option<TimeoutTask>,
    pub t_garbage: Option<TimeoutTask>,
}

pub const DISTANCE_DEFAULT: u8 = 120;

impl RouteEntry {
    pub fn new_learned(
        metric: Metric,
        tag: u16,
        nexthop: Ipv4Addr,
        from: Ipv4Addr,
        ifindex: u32,
        distance: u8,
    ) -> Self {
        RouteEntry {
            origin: RouteOrigin::LearnedRip,
            metric,
            external_metric: None,
            tag,
            nexthop,
            from,
            ifindex,
            distance,
            flags: RouteFlags::CHANGED,
            t_timeout: None,
            t_garbage: None,
        }
    }

    pub fn effective_distance(&self) -> u8 {
        if self.distance == 0 {
            DISTANCE_DEFAULT
        } else {
            self.distance
        }
    }

    pub fn is_in_fib(&self) -> bool {
        self.flags.contains(RouteFlags::IN_FIB)
    }

    pub fn set_in_fib(&mut self, value: bool) {
        self.flags.set(RouteFlags::IN_FIB, value);
    }

    pub fn set_changed(&mut self) {
        self.flags.insert(RouteFlags::CHANGED);
    }

    pub fn clear_changed(&mut self) {
        self.flags.remove(RouteFlags::CHANGED);
    }

    pub fn is_changed(&self) -> bool {
        self.flags.contains(RouteFlags::CHANGED)
    }

    /// Cancels the timeout timer, if any. Idempotent.
    pub fn timeout_cancel(&mut self) {
        self.t_timeout = None;
    }

    /// Cancels the garbage-collection timer, if any. Idempotent.
    pub fn garbage_cancel(&mut self) {
        self.t_garbage = None;
    }
}
