//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::time::Duration;

use crate::distance::DistanceTable;
use crate::interface::Interfaces;
use crate::metric::Metric;
use crate::neighbor::NeighborTable;
use crate::route::RouteTable;
use crate::task::{IntervalTask, TimeoutTask};

/// Ambient, externally-owned configuration this daemon reads but never
/// persists: filled in by whatever collaborator owns CLI parsing and
/// configuration storage, and treated as plain data here.
#[derive(Clone, Debug)]
pub struct InstanceConfig {
    pub version: u8,
    pub update_interval: Duration,
    pub timeout_interval: Duration,
    pub garbage_interval: Duration,
    pub default_metric: Metric,
    pub default_distance: Option<u8>,
    pub relaxed_recv_size_checks: bool,
    pub distance_rules: DistanceTable,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        InstanceConfig {
            version: 2,
            update_interval: Duration::from_secs(30),
            timeout_interval: Duration::from_secs(180),
            garbage_interval: Duration::from_secs(120),
            default_metric: Metric::from(1u8),
            default_distance: None,
            relaxed_recv_size_checks: false,
            distance_rules: DistanceTable::default(),
        }
    }
}

/// Process-scoped runtime state: route/neighbor/interface tables plus the
/// Dispatcher's own timer handles. Owned and mutated only by the core task.
pub struct InstanceState {
    pub routes: RouteTable,
    pub neighbors: NeighborTable,
    pub interfaces: Interfaces,
    pub auth_seqno: Arc<AtomicU32>,
    pub t_update_interval: Option<IntervalTask>,
    pub t_triggered_interval: Option<TimeoutTask>,
    pub pending_trigger_update: bool,
}

impl Default for InstanceState {
    fn default() -> Self {
        InstanceState {
            routes: RouteTable::default(),
            neighbors: NeighborTable::default(),
            interfaces: Interfaces::default(),
            auth_seqno: Arc::new(AtomicU32::new(
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs() as u32)
                    .unwrap_or(0),
            )),
            t_update_interval: None,
            t_triggered_interval: None,
            pending_trigger_update: false,
        }
    }
}

impl InstanceState {
    /// Marks a triggered update as pending. While the post-emission cooldown
    /// timer (`t_triggered_interval`) is running, the Dispatcher only
    /// consults this flag once the timer fires, coalescing any number of
    /// route changes into a single triggered update.
    pub fn raise_triggered_update(&mut self) {
        self.pending_trigger_update = true;
    }
}

pub struct Instance {
    pub config: InstanceConfig,
    pub state: InstanceState,
}

impl Instance {
    pub fn new(config: InstanceConfig) -> Self {
        Instance {
            config,
            state: InstanceState::default(),
        }
    }
}
