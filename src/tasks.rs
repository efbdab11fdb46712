//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use ipnetwork::Ipv4Network;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{Instrument, debug_span};

use crate::packet::{DecodeError, Pdu};
use crate::southbound::{RedistributeNotify, WithdrawNotify};
use crate::task::{IntervalTask, Task, TimeoutTask};
use crate::update::SendDestination;

//
// Dispatcher task diagram:
//
//                     udp_rx (1x) -> +------------+
//        initial_update (0/1x) ->    |            |
//         update_interval (1x) ->    |            |
//    triggered_update (0/1x) ->      | dispatcher | -> (1x) udp_tx
// triggered_update_timeout (0/1x) -> |            |
//             nbr_timeout (Nx) ->    |            |
//           route_timeout (Nx) ->    |            |
//        route_gc_timeout (Nx) ->    +------------+
//

/// Messages flowing from child tasks (the UDP reader, timers) into the
/// single core task that owns all mutable RouteDB/UpdateEngine state.
#[derive(Debug)]
pub enum DispatcherMsg {
    UdpRx {
        src: Ipv4Addr,
        result: Result<Pdu, DecodeError>,
        raw: Vec<u8>,
    },
    InitialUpdate,
    UpdateInterval,
    TriggeredUpdate,
    TriggeredUpdateTimeout,
    NbrTimeout {
        addr: Ipv4Addr,
    },
    RouteTimeout {
        prefix: Ipv4Network,
    },
    RouteGcTimeout {
        prefix: Ipv4Network,
    },
    Redistribute(RedistributeNotify),
    RedistributeWithdraw(WithdrawNotify),
}

/// A pending transmission, queued by the core task and drained by `udp_tx`.
#[derive(Debug)]
pub struct TxMsg {
    pub dst: SendDestination,
    pub buf: Vec<u8>,
}

/// Spawns the datagram receive loop. Decode errors are not fatal to the
/// task: each datagram is read, examined, and forwarded as a `UdpRx`
/// message regardless of outcome, so the core task can still account bad
/// packets against the right interface/neighbor counters.
pub fn udp_rx(
    socket: Arc<UdpSocket>,
    msgp: UnboundedSender<DispatcherMsg>,
    relaxed_recv_size_checks: bool,
    bending_bytes: u16,
) -> Task<()> {
    let span = debug_span!("network");
    Task::spawn_supervised(move || {
        let socket = socket.clone();
        let msgp = msgp.clone();
        async move {
            let mut buf = [0u8; 4096];
            loop {
                let (len, src) = match socket.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                let std::net::SocketAddr::V4(src) = src else {
                    continue;
                };
                let raw = buf[..len].to_vec();
                let result = Pdu::examine(&raw, relaxed_recv_size_checks, bending_bytes)
                    .map(|(pdu, _)| pdu);
                if msgp
                    .send(DispatcherMsg::UdpRx {
                        src: *src.ip(),
                        result,
                        raw,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }
        .instrument(span.clone())
    })
}

/// Spawns the transmit-side loop: drains the outbound PDU queue and writes
/// each to the socket at the resolved destination.
pub fn udp_tx(
    socket: Arc<UdpSocket>,
    mut txc: tokio::sync::mpsc::UnboundedReceiver<TxMsg>,
) -> Task<()> {
    let span = debug_span!("network");
    Task::spawn(
        async move {
            while let Some(msg) = txc.recv().await {
                let dst = match msg.dst {
                    SendDestination::Multicast => {
                        std::net::SocketAddrV4::new(crate::update::RIPV2_MCAST_ADDR, crate::socket::RIP_UDP_PORT)
                    }
                    SendDestination::Broadcast(addr) | SendDestination::Unicast(addr) => {
                        std::net::SocketAddrV4::new(addr, crate::socket::RIP_UDP_PORT)
                    }
                };
                let _ = socket.send_to(&msg.buf, dst).await;
            }
        }
        .instrument(span),
    )
}

/// Delays the first full dump a few seconds after startup, giving the
/// southbound collaborator time to report connected routes.
pub fn initial_update(msgp: &UnboundedSender<DispatcherMsg>) -> TimeoutTask {
    let msgp = msgp.clone();
    TimeoutTask::new(Duration::from_secs(2), move || async move {
        let _ = msgp.send(DispatcherMsg::InitialUpdate);
    })
}

pub fn update_interval(interval: Duration, msgp: &UnboundedSender<DispatcherMsg>) -> IntervalTask {
    let msgp = msgp.clone();
    IntervalTask::new(interval, false, move || {
        let msgp = msgp.clone();
        async move {
            let _ = msgp.send(DispatcherMsg::UpdateInterval);
        }
    })
}

/// RFC 2453's triggered-update cooldown: once fired, further route changes
/// are coalesced until this timer expires.
pub fn triggered_update_timeout(
    timeout: Duration,
    msgp: &UnboundedSender<DispatcherMsg>,
) -> TimeoutTask {
    let msgp = msgp.clone();
    TimeoutTask::new(timeout, move || async move {
        let _ = msgp.send(DispatcherMsg::TriggeredUpdateTimeout);
    })
}

pub fn nbr_timeout(
    addr: Ipv4Addr,
    timeout: Duration,
    msgp: &UnboundedSender<DispatcherMsg>,
) -> TimeoutTask {
    let msgp = msgp.clone();
    TimeoutTask::new(timeout, move || async move {
        let _ = msgp.send(DispatcherMsg::NbrTimeout { addr });
    })
}

pub fn route_timeout(
    prefix: Ipv4Network,
    timeout: Duration,
    msgp: &UnboundedSender<DispatcherMsg>,
) -> TimeoutTask {
    let msgp = msgp.clone();
    TimeoutTask::new(timeout, move || async move {
        let _ = msgp.send(DispatcherMsg::RouteTimeout { prefix });
    })
}

pub fn route_gc_timeout(
    prefix: Ipv4Network,
    timeout: Duration,
    msgp: &UnboundedSender<DispatcherMsg>,
) -> TimeoutTask {
    let msgp = msgp.clone();
    TimeoutTask::new(timeout, move || async move {
        let _ = msgp.send(DispatcherMsg::RouteGcTimeout { prefix });
    })
}
