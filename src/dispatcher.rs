//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::debug::Debug;
use crate::distance::DistanceTable;
use crate::error::Error;
use crate::events::{self, IncomingRte, IngestOutcome, IngressPolicy, Timers};
use crate::instance::{Instance, InstanceConfig};
use crate::interface::RipVersions;
use crate::metric::Metric;
use crate::neighbor;
use crate::packet::{Command, Pdu, Rte};
use crate::policy::{AccessList, OffsetList, PrefixList, RouteMap};
use crate::route::{RouteEntry, RouteFlags, RouteOrigin};
use crate::southbound::{FibSink, RedistributeNotify, WithdrawNotify};
use crate::task::{IntervalTask, Task, TimeoutTask};
use crate::tasks::{self, DispatcherMsg, TxMsg};
use crate::update::{self, EgressPolicy, RedistributeDefaults, ResponseType};
use crate::{auth, socket};

/// The external collaborators this instance consults; bundled so the
/// Dispatcher's constructor doesn't balloon as more are added.
pub struct Collaborators {
    pub fib: Arc<dyn FibSink + Send + Sync>,
    pub access_list: Arc<dyn AccessList + Send + Sync>,
    pub prefix_list: Arc<dyn PrefixList + Send + Sync>,
    pub route_map: Arc<dyn RouteMap + Send + Sync>,
    pub offset_list: Arc<dyn OffsetList + Send + Sync>,
}

/// Owns the process-scoped socket, the RouteDB/Interface tables, and the
/// single-threaded cooperative event loop that ties the Codec,
/// Authenticator, RouteDB and UpdateEngine together.
pub struct Dispatcher {
    instance: Instance,
    collaborators: Collaborators,
    socket: Arc<tokio::net::UdpSocket>,
    msgp: UnboundedSender<DispatcherMsg>,
    msgc: UnboundedReceiver<DispatcherMsg>,
    txp: UnboundedSender<TxMsg>,
    _udp_rx: Task<()>,
    _udp_tx: Task<()>,
    _initial_update: TimeoutTask,
}

impl Dispatcher {
    /// Binds the socket and spawns the receive/transmit child tasks. Joins
    /// the RIPv2 multicast group on every currently-active, non-passive
    /// interface that isn't configured for `no listen` v1-only use.
    pub async fn new(config: InstanceConfig, instance: Instance, collaborators: Collaborators) -> Result<Self, Error> {
        let socket = socket::bind().map_err(Error::Io)?;
        let socket = Arc::new(socket);

        for iface in instance.state.interfaces.iter() {
            if iface.is_active() && iface.config.send_version.contains(RipVersions::V2) {
                if let Some(primary) = iface.system.addr_list.iter().next() {
                    if let Err(error) = socket::join_multicast(&socket, primary.ip()) {
                        return Err(Error::InterfaceStartError(iface.name.clone(), error));
                    }
                }
            }
        }

        let (msgp, msgc) = mpsc::unbounded_channel();
        let (txp, txc) = mpsc::unbounded_channel();

        let udp_rx = tasks::udp_rx(socket.clone(), msgp.clone(), config.relaxed_recv_size_checks, 4);
        let udp_tx = tasks::udp_tx(socket.clone(), txc);
        let initial_update = tasks::initial_update(&msgp);

        Debug::InstanceCreate.log();

        Ok(Dispatcher {
            instance: Instance { config, state: instance.state },
            collaborators,
            socket,
            msgp,
            msgc,
            txp,
            _udp_rx: udp_rx,
            _udp_tx: udp_tx,
            _initial_update: initial_update,
        })
    }

    /// A clonable handle external collaborators (e.g. the FIB-sink's
    /// redistribution feed) use to post events into the core task.
    pub fn msg_sender(&self) -> UnboundedSender<DispatcherMsg> {
        self.msgp.clone()
    }

    /// Runs the event loop until the message channel is closed (all senders,
    /// including the internal ones held by timers/tasks, dropped).
    pub async fn run(&mut self) {
        Debug::InstanceStart.log();
        self.instance.state.t_update_interval =
            Some(tasks::update_interval(self.instance.config.update_interval, &self.msgp));

        while let Some(msg) = self.msgc.recv().await {
            self.handle_msg(msg);
        }

        self.shutdown();
    }

    fn handle_msg(&mut self, msg: DispatcherMsg) {
        match msg {
            DispatcherMsg::UdpRx { src, result, raw } => self.handle_udp_rx(src, result, &raw),
            DispatcherMsg::InitialUpdate => {
                Debug::InitialUpdate.log();
                self.send_dump_all(ResponseType::Periodic);
            }
            DispatcherMsg::UpdateInterval => {
                Debug::UpdateInterval.log();
                self.send_dump_all(ResponseType::Periodic);
                for (_, entry) in self.instance.state.routes.iter_mut() {
                    entry.clear_changed();
                }
            }
            DispatcherMsg::TriggeredUpdate => self.raise_triggered_update(),
            DispatcherMsg::TriggeredUpdateTimeout => self.fire_triggered_update(),
            DispatcherMsg::NbrTimeout { addr } => {
                Debug::NbrTimeout(&addr).log();
                self.instance.state.neighbors.remove(&addr);
            }
            DispatcherMsg::RouteTimeout { prefix } => {
                Debug::RouteTimeout(&prefix).log();
                events::on_timeout(
                    &mut self.instance.state.routes,
                    self.collaborators.fib.as_ref(),
                    &prefix,
                    self.instance.config.garbage_interval,
                    &self.msgp,
                );
                self.raise_triggered_update();
            }
            DispatcherMsg::RouteGcTimeout { prefix } => {
                Debug::RouteGcTimeout(&prefix).log();
                events::on_garbage_expiry(&mut self.instance.state.routes, &prefix);
            }
            DispatcherMsg::Redistribute(notify) => self.handle_redistribute(notify),
            DispatcherMsg::RedistributeWithdraw(notify) => self.handle_redistribute_withdraw(notify),
        }
    }

    fn handle_udp_rx(&mut self, src: Ipv4Addr, result: Result<Pdu, crate::packet::DecodeError>, raw: &[u8]) {
        if self
            .instance
            .state
            .interfaces
            .iter()
            .any(|iface| iface.system.addr_list.iter().any(|n| n.ip() == src))
        {
            return;
        }

        let Some((iface_idx, _)) = self.instance.state.interfaces.get_by_source(src) else {
            Error::UdpInvalidSourceAddr(src).log();
            return;
        };

        Debug::PduRx(&self.instance.state.interfaces[iface_idx].name.clone(), &src, &result).log();

        let pdu = match result {
            Ok(pdu) => pdu,
            Err(error) => {
                let iface = &mut self.instance.state.interfaces[iface_idx];
                iface.statistics.bad_packets_rcvd += 1;
                iface.statistics.update_discontinuity_time();
                Error::UdpPduDecodeError(error).log();
                return;
            }
        };

        let iface = &self.instance.state.interfaces[iface_idx];
        let recv_version_ok = iface.config.recv_version.contains(match pdu.version {
            1 => RipVersions::V1,
            _ => RipVersions::V2,
        });
        let auth_method = iface.config.auth.clone();
        let is_passive = iface.is_passive();
        if !recv_version_ok {
            return;
        }

        let auth_envelope = crate::packet::Pdu::examine(raw, self.instance.config.relaxed_recv_size_checks, 4)
            .ok()
            .and_then(|(_, env)| env);

        let verify_outcome = match auth::verify(raw, auth_envelope.as_ref(), &auth_method) {
            Ok(outcome) => outcome,
            Err(failure) => {
                let iface = &mut self.instance.state.interfaces[iface_idx];
                iface.statistics.bad_packets_rcvd += 1;
                Error::UdpPduAuthFailure(src, failure).log();
                return;
            }
        };

        if let Some(seqno) = verify_outcome.seqno {
            let last = self.instance.state.neighbors.get(&src).map(|n| n.auth_seqno).unwrap_or(0);
            if !auth::seqno_acceptable(last, seqno) {
                let iface = &mut self.instance.state.interfaces[iface_idx];
                iface.statistics.bad_packets_rcvd += 1;
                Error::UdpPduAuthFailure(src, crate::auth::AuthFailure::SeqnoReplay).log();
                return;
            }
        }

        let version = pdu.version;
        let nbr = neighbor::update(
            &mut self.instance.state.neighbors,
            src,
            version,
            self.instance.config.timeout_interval,
            &self.msgp,
        );
        if let Some(seqno) = verify_outcome.seqno {
            nbr.auth_seqno = seqno;
        }

        if is_passive {
            return;
        }

        match pdu.command {
            Command::Response => self.ingest_response(iface_idx, src, &pdu),
            Command::Request => self.handle_request(iface_idx, src, version, &pdu.rtes),
        }
    }

    fn ingest_response(&mut self, iface_idx: crate::interface::InterfaceIndex, src: Ipv4Addr, pdu: &Pdu) {
        let ifindex = self.instance.state.interfaces[iface_idx].system.ifindex.unwrap_or(0);
        let mut any_trigger = false;

        for rte in &pdu.rtes {
            let Rte::Ipv4(rte) = rte else { continue };
            let incoming = IncomingRte {
                prefix_addr: rte.prefix_addr,
                prefix_mask: Some(rte.prefix_mask).filter(|m| *m != Ipv4Addr::UNSPECIFIED),
                nexthop: rte.nexthop,
                metric: rte.metric.get() as u32,
                tag: rte.tag,
            };

            let policy = IngressPolicy {
                access_list: self.collaborators.access_list.as_ref(),
                prefix_list: self.collaborators.prefix_list.as_ref(),
                route_map: self.collaborators.route_map.as_ref(),
                offset_list: self.collaborators.offset_list.as_ref(),
            };
            let timers = Timers {
                timeout: self.instance.config.timeout_interval,
                garbage: self.instance.config.garbage_interval,
            };

            let iface = &self.instance.state.interfaces[iface_idx];
            let outcome = events::process_rte(
                &mut self.instance.state.routes,
                &incoming,
                src,
                ifindex,
                iface,
                &policy,
                &self.instance.config.distance_rules,
                &timers,
                self.collaborators.fib.as_ref(),
                &self.msgp,
            );

            match outcome {
                IngestOutcome::Accepted { triggers_update } => any_trigger |= triggers_update,
                IngestOutcome::Rejected(_) => {
                    let iface = &mut self.instance.state.interfaces[iface_idx];
                    iface.statistics.bad_routes_rcvd += 1;
                }
                IngestOutcome::Ignored => {}
            }
        }

        if any_trigger {
            self.raise_triggered_update();
        }
    }

    fn handle_request(&mut self, iface_idx: crate::interface::InterfaceIndex, src: Ipv4Addr, version: u8, request: &[Rte]) {
        let iface = &self.instance.state.interfaces[iface_idx];
        let ifindex = iface.system.ifindex.unwrap_or(0);
        let policy = EgressPolicy {
            route_map: self.collaborators.route_map.as_ref(),
            offset_list: self.collaborators.offset_list.as_ref(),
        };
        let defaults = RedistributeDefaults {
            default_metric: self.instance.config.default_metric,
        };
        let max_entries = Pdu::max_entries(None);

        let pdus = update::handle_request(
            &self.instance.state.routes,
            iface,
            ifindex,
            version,
            request,
            &policy,
            &defaults,
            max_entries,
        );

        for pdu in pdus {
            self.send_pdu(iface_idx, &pdu, Some(update::SendDestination::Unicast(src)));
        }
    }

    /// Emits a periodic or triggered dump on every active, non-passive
    /// interface and RIP version it's configured to send.
    fn send_dump_all(&mut self, response_type: ResponseType) {
        let iface_indices: Vec<_> = self
            .instance
            .state
            .interfaces
            .iter_indexed()
            .filter(|(_, iface)| iface.is_active() && !iface.is_passive())
            .map(|(idx, _)| idx)
            .collect();

        let versions = [(1u8, RipVersions::V1), (2u8, RipVersions::V2)];

        for iface_idx in iface_indices {
            for (version, flag) in versions {
                let pdus = {
                    let iface = &self.instance.state.interfaces[iface_idx];
                    if !iface.config.send_version.contains(flag) {
                        continue;
                    }
                    let ifindex = iface.system.ifindex.unwrap_or(0);

                    let policy = EgressPolicy {
                        route_map: self.collaborators.route_map.as_ref(),
                        offset_list: self.collaborators.offset_list.as_ref(),
                    };
                    let defaults = RedistributeDefaults {
                        default_metric: self.instance.config.default_metric,
                    };
                    let max_entries = Pdu::max_entries(None);

                    update::build_dump(
                        &self.instance.state.routes,
                        iface,
                        ifindex,
                        version,
                        response_type,
                        &policy,
                        &defaults,
                        max_entries,
                    )
                };

                for pdu in pdus {
                    self.send_pdu(iface_idx, &pdu, None);
                }
            }
        }
    }

    /// Signs `pdu` and enqueues it for transmission. `dst` overrides the
    /// interface's normal multicast/broadcast/neighbor fan-out (used for
    /// unicast Request replies).
    fn send_pdu(&mut self, iface_idx: crate::interface::InterfaceIndex, pdu: &Pdu, dst: Option<update::SendDestination>) {
        let iface = &mut self.instance.state.interfaces[iface_idx];
        Debug::PduTx(&iface.name.clone(), pdu).log();

        let buf = auth::sign(pdu, &iface.config.auth, &self.instance.state.auth_seqno);
        iface.statistics.updates_sent += 1;

        let destinations = match dst {
            Some(d) => vec![d],
            None => update::destinations(iface, pdu.version),
        };

        for dst in destinations {
            let _ = self.txp.send(TxMsg {
                dst,
                buf: buf.to_vec(),
            });
        }
    }

    fn raise_triggered_update(&mut self) {
        self.instance.state.raise_triggered_update();
        if self.instance.state.t_triggered_interval.is_none() {
            self.fire_triggered_update();
        }
    }

    fn fire_triggered_update(&mut self) {
        if !self.instance.state.pending_trigger_update {
            self.instance.state.t_triggered_interval = None;
            return;
        }
        self.instance.state.pending_trigger_update = false;
        Debug::TriggeredUpdate.log();
        self.send_dump_all(ResponseType::Triggered);
        for (_, entry) in self.instance.state.routes.iter_mut() {
            entry.clear_changed();
        }
        self.instance.state.t_triggered_interval =
            Some(tasks::triggered_update_timeout(std::time::Duration::from_secs(5), &self.msgp));
    }

    fn handle_redistribute(&mut self, notify: RedistributeNotify) {
        let metric = Metric::from(notify.metric.min(Metric::INFINITE as u32) as u8);
        let distance = notify.distance.unwrap_or(0);

        match self.instance.state.routes.get_mut(&notify.prefix) {
            Some(entry) if entry.origin.is_immortal() => {}
            _ => {
                let mut entry = RouteEntry {
                    origin: RouteOrigin::Redistribute(notify.kind),
                    metric,
                    external_metric: Some(metric),
                    tag: 0,
                    nexthop: notify.nexthop,
                    from: Ipv4Addr::UNSPECIFIED,
                    ifindex: notify.ifindex,
                    distance,
                    flags: RouteFlags::CHANGED,
                    t_timeout: None,
                    t_garbage: None,
                };
                if !metric.is_infinite() {
                    self.collaborators
                        .fib
                        .fib_add(notify.prefix, notify.nexthop, metric, entry.effective_distance());
                    entry.set_in_fib(true);
                }
                self.instance.state.routes.insert(notify.prefix, entry);
                self.raise_triggered_update();
            }
        }
    }

    fn handle_redistribute_withdraw(&mut self, notify: WithdrawNotify) {
        if events::withdraw_redistribute(
            &mut self.instance.state.routes,
            self.collaborators.fib.as_ref(),
            notify.kind,
            self.instance.config.garbage_interval,
            &self.msgp,
        ) {
            self.raise_triggered_update();
        }
    }

    /// Cancels every pending timer (dropping the handles is enough, since
    /// [`TimeoutTask`]/[`IntervalTask`] cancel on drop) and withdraws every
    /// FIB-resident route.
    fn shutdown(&mut self) {
        Debug::InstanceStop(crate::debug::InstanceInactiveReason::AdminDown).log();

        self.instance.state.t_update_interval = None::<IntervalTask>;
        self.instance.state.t_triggered_interval = None::<TimeoutTask>;

        for (prefix, entry) in self.instance.state.routes.iter_mut() {
            entry.timeout_cancel();
            entry.garbage_cancel();
            if entry.is_in_fib() {
                self.collaborators.fib.fib_delete(*prefix, entry.nexthop, entry.metric);
                entry.set_in_fib(false);
            }
        }

        for iface in self.instance.state.interfaces.iter() {
            if let Some(primary) = iface.system.addr_list.iter().next() {
                if iface.config.send_version.contains(RipVersions::V2) {
                    let _ = socket::leave_multicast(&self.socket, primary.ip());
                }
            }
        }
    }
}
