//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use tracing::{error, warn};

use crate::auth::AuthFailure;
use crate::packet::DecodeError;

/// Top-level errors the Dispatcher logs and, for the fatal cases, aborts on.
#[derive(Debug)]
pub enum Error {
    Io(IoError),
    UdpInvalidSourceAddr(Ipv4Addr),
    UdpPduDecodeError(DecodeError),
    UdpPduAuthFailure(Ipv4Addr, AuthFailure),
    InterfaceStartError(String, IoError),
}

/// I/O errors, mostly fatal at startup and recoverable thereafter.
#[derive(Debug)]
pub enum IoError {
    UdpSocketError(std::io::Error),
    UdpMulticastJoinError(std::io::Error),
    UdpMulticastLeaveError(std::io::Error),
    UdpRecvError(std::io::Error),
    UdpSendError(std::io::Error),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Io(error) => error.log(),
            Error::UdpInvalidSourceAddr(addr) => {
                warn!(address = %addr, "{}", self);
            }
            Error::UdpPduDecodeError(error) => {
                warn!(%error, "{}", self);
            }
            Error::UdpPduAuthFailure(source, failure) => {
                warn!(%source, ?failure, "{}", self);
            }
            Error::InterfaceStartError(name, error) => {
                error!(%name, error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(error) => error.fmt(f),
            Error::UdpInvalidSourceAddr(..) => write!(f, "invalid source address"),
            Error::UdpPduDecodeError(..) => write!(f, "failed to decode PDU"),
            Error::UdpPduAuthFailure(..) => write!(f, "packet authentication failed"),
            Error::InterfaceStartError(..) => write!(f, "failed to start interface"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(error) => Some(error),
            Error::UdpPduDecodeError(error) => Some(error),
            Error::InterfaceStartError(_, error) => Some(error),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::Io(error)
    }
}

// ===== impl IoError =====

impl IoError {
    pub fn log(&self) {
        match self {
            IoError::UdpSocketError(error)
            | IoError::UdpMulticastJoinError(error)
            | IoError::UdpMulticastLeaveError(error)
            | IoError::UdpRecvError(error)
            | IoError::UdpSendError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::UdpSocketError(..) => write!(f, "failed to create UDP socket"),
            IoError::UdpMulticastJoinError(..) => write!(f, "failed to join multicast group"),
            IoError::UdpMulticastLeaveError(..) => write!(f, "failed to leave multicast group"),
            IoError::UdpRecvError(..) => write!(f, "failed to receive UDP packet"),
            IoError::UdpSendError(..) => write!(f, "failed to send UDP packet"),
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::UdpSocketError(error)
            | IoError::UdpMulticastJoinError(error)
            | IoError::UdpMulticastLeaveError(error)
            | IoError::UdpRecvError(error)
            | IoError::UdpSendError(error) => Some(error),
        }
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
