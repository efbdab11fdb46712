//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use generational_arena::{Arena, Index};
use ipnetwork::Ipv4Network;

use crate::keychain::AuthMethod;
use crate::metric::Metric;

pub type InterfaceIndex = Index;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct InterfaceFlags: u8 {
        const OPERATIVE    = 0x01;
        const LOOPBACK     = 0x02;
        const BROADCAST    = 0x04;
        const POINTOPOINT  = 0x08;
    }
}

bitflags! {
    /// Which RIP versions an interface sends/accepts (`ip rip send|receive
    /// version`).
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct RipVersions: u8 {
        const V1 = 0x01;
        const V2 = 0x02;
    }
}

impl Default for RipVersions {
    fn default() -> Self {
        RipVersions::V2
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SplitHorizon {
    Disabled,
    Simple,
    PoisonReverse,
}

impl Default for SplitHorizon {
    fn default() -> Self {
        SplitHorizon::Simple
    }
}

/// The filter/route-map handles an interface applies on ingress or egress
/// for a given direction.
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    pub access_list: Option<String>,
    pub prefix_list: Option<String>,
    pub route_map: Option<String>,
    pub offset_list: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct InterfaceConfig {
    pub passive: bool,
    pub no_listen: bool,
    pub split_horizon: SplitHorizon,
    pub send_version: RipVersions,
    pub recv_version: RipVersions,
    pub auth: AuthMethod,
    /// Additive cost applied to the metric of routes learned or advertised
    /// through this interface (`ip rip metric …`).
    pub cost: Metric,
    pub filters_in: FilterSet,
    pub filters_out: FilterSet,
    /// Explicitly configured unicast neighbors (`neighbor A.B.C.D`), used in
    /// addition to multicast/broadcast transmission.
    pub explicit_neighbors: BTreeSet<Ipv4Addr>,
}

#[derive(Clone, Debug, Default)]
pub struct InterfaceSys {
    pub flags: InterfaceFlags,
    pub ifindex: Option<u32>,
    pub mtu: Option<u32>,
    pub addr_list: BTreeSet<Ipv4Network>,
    pub broadcast: Option<Ipv4Addr>,
}

impl InterfaceSys {
    /// Checks if any of the interface's connected prefixes contains `addr`.
    pub fn contains_addr(&self, addr: Ipv4Addr) -> bool {
        self.addr_list.iter().any(|local| local.contains(addr))
    }

    /// The classful mask inferred from the interface's primary address, used
    /// by the v1 subnetted-network inference algorithm.
    pub fn primary_classful(&self) -> Option<Ipv4Network> {
        let primary = self.addr_list.iter().next()?;
        let classful_len = crate::events::classful_prefix_len(primary.ip());
        Ipv4Network::new(primary.ip(), classful_len).ok()
    }
}

#[derive(Debug, Default)]
pub struct MessageStatistics {
    pub discontinuity_time: Option<DateTime<Utc>>,
    pub bad_packets_rcvd: u32,
    pub bad_routes_rcvd: u32,
    pub updates_sent: u32,
}

impl MessageStatistics {
    pub fn update_discontinuity_time(&mut self) {
        self.discontinuity_time = Some(Utc::now());
    }
}

#[derive(Debug)]
pub struct Interface {
    pub name: String,
    pub system: InterfaceSys,
    pub config: InterfaceConfig,
    pub statistics: MessageStatistics,
}

impl Interface {
    fn new(name: String) -> Self {
        Interface {
            name,
            system: InterfaceSys::default(),
            config: InterfaceConfig::default(),
            statistics: MessageStatistics::default(),
        }
    }

    /// Whether RIP is operational on this interface: administratively
    /// passive interfaces still process received packets but never
    /// originate updates or requests.
    pub fn is_active(&self) -> bool {
        self.system.flags.contains(InterfaceFlags::OPERATIVE)
            && self.system.ifindex.is_some()
            && !self.system.addr_list.is_empty()
    }

    pub fn is_passive(&self) -> bool {
        self.system.flags.contains(InterfaceFlags::LOOPBACK) || self.config.passive
    }
}

#[derive(Debug, Default)]
pub struct Interfaces {
    pub arena: Arena<Interface>,
    name_tree: BTreeMap<String, InterfaceIndex>,
    ifindex_tree: HashMap<u32, InterfaceIndex>,
}

impl Interfaces {
    pub fn add(&mut self, ifname: &str) -> (InterfaceIndex, &mut Interface) {
        if let Some(iface_idx) = self.name_tree.get(ifname).copied() {
            return (iface_idx, &mut self.arena[iface_idx]);
        }

        let iface = Interface::new(ifname.to_owned());
        let iface_idx = self.arena.insert(iface);
        self.name_tree.insert(ifname.to_owned(), iface_idx);

        (iface_idx, &mut self.arena[iface_idx])
    }

    pub fn delete(&mut self, iface_idx: InterfaceIndex) {
        let iface = &self.arena[iface_idx];
        self.name_tree.remove(&iface.name);
        if let Some(ifindex) = iface.system.ifindex {
            self.ifindex_tree.remove(&ifindex);
        }
        self.arena.remove(iface_idx);
    }

    pub fn update_ifindex(
        &mut self,
        ifname: &str,
        ifindex: Option<u32>,
    ) -> Option<(InterfaceIndex, &mut Interface)> {
        let iface_idx = self.name_tree.get(ifname).copied()?;
        let iface = &mut self.arena[iface_idx];

        if let Some(old) = iface.system.ifindex {
            self.ifindex_tree.remove(&old);
        }
        iface.system.ifindex = ifindex;
        if let Some(ifindex) = ifindex {
            self.ifindex_tree.insert(ifindex, iface_idx);
        }

        Some((iface_idx, iface))
    }

    pub fn get_by_name(&self, ifname: &str) -> Option<(InterfaceIndex, &Interface)> {
        self.name_tree
            .get(ifname)
            .copied()
            .map(|idx| (idx, &self.arena[idx]))
    }

    pub fn get_mut_by_name(
        &mut self,
        ifname: &str,
    ) -> Option<(InterfaceIndex, &mut Interface)> {
        self.name_tree
            .get(ifname)
            .copied()
            .map(move |idx| (idx, &mut self.arena[idx]))
    }

    pub fn get_by_ifindex(&self, ifindex: u32) -> Option<(InterfaceIndex, &Interface)> {
        self.ifindex_tree
            .get(&ifindex)
            .copied()
            .map(|idx| (idx, &self.arena[idx]))
    }

    /// Resolves the interface whose connected prefix covers `addr` — used to
    /// attribute an inbound datagram to an interface by source address,
    /// since this daemon owns a single process-scoped socket rather than one
    /// per interface.
    pub fn get_by_source(&self, addr: Ipv4Addr) -> Option<(InterfaceIndex, &Interface)> {
        self.iter_indexed()
            .find(|(_, iface)| iface.system.contains_addr(addr))
    }

    /// Mutable counterpart of [`Interfaces::get_by_source`], used by the
    /// receive path to update per-interface message statistics.
    pub fn get_mut_by_source(&mut self, addr: Ipv4Addr) -> Option<(InterfaceIndex, &mut Interface)> {
        let idx = self.get_by_source(addr)?.0;
        Some((idx, &mut self.arena[idx]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'_ Interface> + '_ {
        self.name_tree.values().map(|idx| &self.arena[*idx])
    }

    pub fn iter_indexed(&self) -> impl Iterator<Item = (InterfaceIndex, &'_ Interface)> + '_ {
        self.name_tree.values().map(|idx| (*idx, &self.arena[*idx]))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &'_ mut Interface> + '_ {
        self.arena.iter_mut().map(|(_, iface)| iface)
    }
}

impl std::ops::Index<InterfaceIndex> for Interfaces {
    type Output = Interface;

    fn index(&self, index: InterfaceIndex) -> &Self::Output {
        &self.arena[index]
    }
}

impl std::ops::IndexMut<InterfaceIndex> for Interfaces {
    fn index_mut(&mut self, index: InterfaceIndex) -> &mut Self::Output {
        &mut self.arena[index]
    }
}
