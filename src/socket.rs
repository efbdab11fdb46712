//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use capctl::caps::CapState;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::error;

use crate::error::IoError;

pub const RIP_UDP_PORT: u16 = 520;

/// Runs `cb` with the process's permitted capabilities raised into the
/// effective set, dropping them again once `cb` returns. Used only around
/// the bind operation; everything else runs unprivileged.
fn with_raised_caps<F, R>(cb: F) -> R
where
    F: FnOnce() -> R,
{
    let mut caps = CapState::get_current().unwrap();
    caps.effective = caps.permitted;
    if let Err(error) = caps.set_current() {
        error!("failed to raise capabilities: {}", error);
    }

    let ret = cb();

    caps.effective.clear();
    if let Err(error) = caps.set_current() {
        error!("failed to drop capabilities: {}", error);
    }

    ret
}

/// Builds the process-scoped RIP socket: UDP bound to 0.0.0.0:520,
/// SO_BROADCAST/SO_REUSEADDR/SO_REUSEPORT, IP_TOS set
/// to Internetwork Control (0xC0), and an enlarged receive buffer.
/// Privilege elevation is requested only for `bind` and dropped immediately
/// after.
pub fn bind() -> Result<tokio::net::UdpSocket, IoError> {
    let socket =
        Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(IoError::UdpSocketError)?;

    socket.set_reuse_address(true).map_err(IoError::UdpSocketError)?;
    socket.set_reuse_port(true).map_err(IoError::UdpSocketError)?;
    socket.set_broadcast(true).map_err(IoError::UdpSocketError)?;
    socket.set_tos(0xC0).map_err(IoError::UdpSocketError)?;
    socket.set_recv_buffer_size(1 << 20).map_err(IoError::UdpSocketError)?;
    socket.set_nonblocking(true).map_err(IoError::UdpSocketError)?;

    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, RIP_UDP_PORT));
    with_raised_caps(|| socket.bind(&addr.into())).map_err(IoError::UdpSocketError)?;

    let std_socket: std::net::UdpSocket = socket.into();
    tokio::net::UdpSocket::from_std(std_socket).map_err(IoError::UdpSocketError)
}

/// Joins the RIPv2 multicast group (224.0.0.9) via the interface whose
/// primary address is `iface_addr`.
pub fn join_multicast(socket: &tokio::net::UdpSocket, iface_addr: Ipv4Addr) -> Result<(), IoError> {
    socket
        .join_multicast_v4(crate::update::RIPV2_MCAST_ADDR, iface_addr)
        .map_err(IoError::UdpMulticastJoinError)
}

/// Leaves the RIPv2 multicast group via the interface whose primary address
/// is `iface_addr`.
pub fn leave_multicast(socket: &tokio::net::UdpSocket, iface_addr: Ipv4Addr) -> Result<(), IoError> {
    socket
        .leave_multicast_v4(crate::update::RIPV2_MCAST_ADDR, iface_addr)
        .map_err(IoError::UdpMulticastLeaveError)
}
