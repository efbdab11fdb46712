//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use tracing::{debug, debug_span};

use crate::metric::Metric;
use crate::packet::{DecodeError, Pdu};

#[derive(Debug)]
pub enum Debug<'a> {
    InstanceCreate,
    InstanceDelete,
    InstanceStart,
    InstanceStop(InstanceInactiveReason),
    InterfaceCreate(&'a str),
    InterfaceDelete(&'a str),
    InterfaceStart(&'a str),
    InterfaceStop(&'a str, InterfaceInactiveReason),
    InitialUpdate,
    UpdateInterval,
    TriggeredUpdate,
    PduRx(&'a str, &'a Ipv4Addr, &'a Result<Pdu, DecodeError>),
    PduTx(&'a str, &'a Pdu),
    NbrCreate(&'a Ipv4Addr),
    NbrTimeout(&'a Ipv4Addr),
    RouteCreate(&'a Ipv4Network, &'a Ipv4Addr, &'a Metric),
    RouteUpdate(&'a Ipv4Network, &'a Ipv4Addr, &'a Metric),
    RouteTimeout(&'a Ipv4Network),
    RouteGcTimeout(&'a Ipv4Network),
    RouteInvalidate(&'a Ipv4Network),
}

#[derive(Debug)]
pub enum InstanceInactiveReason {
    AdminDown,
}

#[derive(Debug)]
pub enum InterfaceInactiveReason {
    InstanceDown,
    AdminDown,
    OperationalDown,
    MissingIfindex,
    MissingIpAddress,
}

// ===== impl Debug =====

impl<'a> Debug<'a> {
    pub fn log(&self) {
        match self {
            Debug::InstanceCreate | Debug::InstanceDelete | Debug::InstanceStart => {
                debug!("{}", self);
            }
            Debug::InstanceStop(reason) => {
                debug!(%reason, "{}", self);
            }
            Debug::InterfaceCreate(name)
            | Debug::InterfaceDelete(name)
            | Debug::InterfaceStart(name) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::InterfaceStop(name, reason) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!(%reason, "{}", self);
                });
            }
            Debug::InitialUpdate | Debug::UpdateInterval | Debug::TriggeredUpdate => {
                debug!("{}", self);
            }
            Debug::PduRx(ifname, source, pdu) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("input", interface = %ifname, %source).in_scope(|| {
                        let data = serde_json::to_string(pdu).unwrap();
                        debug!(%data, "{}", self);
                    });
                });
            }
            Debug::PduTx(ifname, pdu) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("output", interface = %ifname).in_scope(|| {
                        let data = serde_json::to_string(pdu).unwrap();
                        debug!(%data, "{}", self);
                    });
                });
            }
            Debug::NbrCreate(addr) | Debug::NbrTimeout(addr) => {
                debug!(address = %addr, "{}", self);
            }
            Debug::RouteCreate(prefix, from, metric) | Debug::RouteUpdate(prefix, from, metric) => {
                debug!(%prefix, %from, metric = %metric.get(), "{}", self);
            }
            Debug::RouteTimeout(prefix)
            | Debug::RouteGcTimeout(prefix)
            | Debug::RouteInvalidate(prefix) => {
                debug!(%prefix, "{}", self);
            }
        }
    }
}

impl<'a> std::fmt::Display for Debug<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceCreate => write!(f, "instance created"),
            Debug::InstanceDelete => write!(f, "instance deleted"),
            Debug::InstanceStart => write!(f, "starting instance"),
            Debug::InstanceStop(..) => write!(f, "stopping instance"),
            Debug::InterfaceCreate(..) => write!(f, "interface created"),
            Debug::InterfaceDelete(..) => write!(f, "interface deleted"),
            Debug::InterfaceStart(..) => write!(f, "starting interface"),
            Debug::InterfaceStop(..) => write!(f, "stopping interface"),
            Debug::InitialUpdate => write!(f, "initial update"),
            Debug::UpdateInterval => write!(f, "update interval"),
            Debug::TriggeredUpdate => write!(f, "triggered update"),
            Debug::PduRx(..) | Debug::PduTx(..) => write!(f, "pdu"),
            Debug::NbrCreate(..) => write!(f, "neighbor created"),
            Debug::NbrTimeout(..) => write!(f, "neighbor timed out"),
            Debug::RouteCreate(..) => write!(f, "route created"),
            Debug::RouteUpdate(..) => write!(f, "route updated"),
            Debug::RouteTimeout(..) => write!(f, "route timed out"),
            Debug::RouteGcTimeout(..) => write!(f, "route deleted"),
            Debug::RouteInvalidate(..) => write!(f, "route invalidated"),
        }
    }
}

impl std::fmt::Display for InstanceInactiveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceInactiveReason::AdminDown => write!(f, "administrative status down"),
        }
    }
}

impl std::fmt::Display for InterfaceInactiveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceInactiveReason::InstanceDown => write!(f, "RIP instance down"),
            InterfaceInactiveReason::AdminDown => write!(f, "administrative status down"),
            InterfaceInactiveReason::OperationalDown => write!(f, "operational status down"),
            InterfaceInactiveReason::MissingIfindex => write!(f, "missing ifindex"),
            InterfaceInactiveReason::MissingIpAddress => write!(f, "missing IP address"),
        }
    }
}
