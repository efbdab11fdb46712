//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use derive_new::new;
use tokio::sync::mpsc::UnboundedSender;

use crate::task::TimeoutTask;
use crate::tasks::{self, DispatcherMsg};

pub type NeighborTable = HashMap<Ipv4Addr, NeighborEntry>;

/// Per-source-IP counters and last-seen bookkeeping.
#[derive(Debug, new)]
pub struct NeighborEntry {
    #[new(default)]
    pub last_update: Option<Instant>,
    #[new(default)]
    pub rip_version: Option<u8>,
    #[new(default)]
    pub bad_packets_rcvd: u32,
    #[new(default)]
    pub bad_routes_rcvd: u32,
    #[new(default)]
    pub auth_seqno: u32,
    #[new(default)]
    pub timeout_task: Option<TimeoutTask>,
}

impl NeighborEntry {
    pub fn touch(&mut self, version: u8) {
        self.last_update = Some(Instant::now());
        self.rip_version = Some(version);
    }
}

/// Updates (or creates) the neighbor entry for `addr` and (re)arms its
/// timeout. Mirrors the entry-API pattern used across this codebase.
pub fn update(
    neighbors: &mut NeighborTable,
    addr: Ipv4Addr,
    version: u8,
    timeout: Duration,
    msgp: &UnboundedSender<DispatcherMsg>,
) -> &mut NeighborEntry {
    let nbr = neighbors.entry(addr).or_insert_with(NeighborEntry::new);
    nbr.touch(version);
    nbr.timeout_task = Some(tasks::nbr_timeout(addr, timeout, msgp));
    nbr
}
