//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::ops::Range;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use enum_as_inner::EnumAsInner;
use ipnetwork::Ipv4Network;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::crypto::CryptoAlgo;
use crate::metric::Metric;

//
// The RIP packet format is:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  command (1)  |  version (1)  |       must be zero (2)        |
// +---------------+---------------+-------------------------------+
// |                                                               |
// ~                         RIP Entry (20)                        ~
// |                                                               |
// +---------------+---------------+---------------+---------------+
//
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Request = 1,
    Response = 2,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pdu {
    pub command: Command,
    pub version: u8,
    pub rtes: Vec<Rte>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rte_errors: Vec<DecodeError>,
}

//
// The format for the 20-octet route RTE for RIP-1/2 is:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// | Address Family Identifier (2) |        Route Tag (2)          |
// +-------------------------------+-------------------------------+
// |                         IP Address (4)                        |
// +---------------------------------------------------------------+
// |                         Subnet Mask (4)                       |
// +---------------------------------------------------------------+
// |                         Next Hop (4)                          |
// +---------------------------------------------------------------+
// |                         Metric (4)                            |
// +---------------------------------------------------------------+
//
#[derive(Clone, Debug, EnumAsInner, Eq, PartialEq, Serialize, Deserialize)]
pub enum Rte {
    Zero(RteZero),
    Ipv4(RteIpv4),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RteZero {
    pub metric: Metric,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RteIpv4 {
    pub tag: u16,
    /// `None` means the on-wire mask was zero (v1, or v2 with unspecified
    /// mask) and the prefix length must be inferred by the RouteDB.
    pub prefix_addr: Ipv4Addr,
    pub prefix_mask: Ipv4Addr,
    pub nexthop: Ipv4Addr,
    pub metric: Metric,
}

impl RteIpv4 {
    /// Prefix as declared on the wire, with no mask inference applied.
    /// Valid only when `prefix_mask` is non-zero.
    pub fn declared_prefix(&self) -> Option<Ipv4Network> {
        Ipv4Network::with_netmask(self.prefix_addr, self.prefix_mask).ok()
    }
}

//
// The RIP authentication entry formats (RFC 2082 / RFC 4822):
//
// Simple password (type=2): 16 octets of cleartext password.
// Crypto header (type=3): declares packet length, key id, digest length and
// sequence number; a trailer RTE (type=1, family=0xFFFF) carries the digest.
//
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AuthRte {
    Simple([u8; 16]),
    Crypto(AuthCrypto),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuthCrypto {
    pub pkt_len: u16,
    pub key_id: u8,
    pub auth_data_len: u8,
    pub seqno: u32,
}

/// Everything decoded about a packet's authentication envelope, prior to
/// cryptographic verification (performed by the Authenticator).
#[derive(Clone, Debug)]
pub struct AuthEnvelope {
    pub header: AuthRte,
    /// Digest bytes from the trailer RTE, present only for `Crypto`.
    pub trailer: Option<Bytes>,
    /// Byte range (into the original buffer) covered by the digest
    /// computation for `Crypto` authentication (header ++ RTEs ++ auth
    /// header RTE).
    pub signed_range: Range<usize>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DecodeError {
    InvalidLength(usize),
    InvalidCommand(u8),
    InvalidVersion(u8),
    NotIntegralRteCount,
    TooManyRtes(usize),
    V1AuthNotAllowed,
    AuthNotFirst,
    MultipleZeroRte,
    ZeroRteNotSoleRte,
    ZeroRteInResponse,
    MissingAuthTrailer,
    AuthTrailerOutOfRange,
    InvalidRteAddressFamily(u16),
    InvalidRteAuthType(u16),
    InvalidRteMetric(u32),
}

pub type DecodeResult<T> = Result<T, DecodeError>;

impl Pdu {
    pub const HDR_LENGTH: usize = 4;
    pub const RTE_LENGTH: usize = 20;
    pub const MAX_ENTRIES: usize = 25;
    pub const MIN_SIZE: usize = Self::HDR_LENGTH + Self::RTE_LENGTH;
    pub const STRICT_MAX_SIZE: usize = 512;

    /// Maximum number of non-auth RTEs that fit a single packet for the
    /// given authentication scheme.
    pub fn max_entries(auth_algo: Option<CryptoAlgo>) -> usize {
        match auth_algo {
            Some(_) => Self::MAX_ENTRIES - 2,
            None => Self::MAX_ENTRIES,
        }
    }

    /// Validates and decodes a raw datagram. `relaxed` lifts the strict
    /// 512-byte ceiling; `bending_bytes` extends the tolerance used when validating
    /// the declared auth trailer position (a legacy vendor miscounts the
    /// MD5 trailer length by this many bytes).
    pub fn examine(
        data: &[u8],
        relaxed: bool,
        bending_bytes: u16,
    ) -> DecodeResult<(Self, Option<AuthEnvelope>)> {
        let len = data.len();
        if len < Self::MIN_SIZE {
            return Err(DecodeError::InvalidLength(len));
        }
        if !relaxed && len > Self::STRICT_MAX_SIZE {
            return Err(DecodeError::InvalidLength(len));
        }
        if (len - Self::HDR_LENGTH) % Self::RTE_LENGTH != 0 {
            return Err(DecodeError::NotIntegralRteCount);
        }

        let mut buf = Bytes::copy_from_slice(data);
        let command = buf.get_u8();
        let command = Command::from_u8(command)
            .ok_or(DecodeError::InvalidCommand(command))?;
        let version = buf.get_u8();
        if version != 1 && version != 2 {
            return Err(DecodeError::InvalidVersion(version));
        }
        let _reserved = buf.get_u16();

        let n_rtes = (len - Self::HDR_LENGTH) / Self::RTE_LENGTH;

        // Peek the first RTE's address family to detect an auth header
        // without consuming it from `buf` yet.
        let mut auth_envelope = None;
        let mut rtes = Vec::new();
        let mut rte_errors = Vec::new();
        let mut zero_seen = false;

        for i in 0..n_rtes {
            let rte_start = Self::HDR_LENGTH + i * Self::RTE_LENGTH;
            let afi = (&data[rte_start..rte_start + 2]).get_u16();

            if afi == AFI_AUTH {
                if version == 1 {
                    return Err(DecodeError::V1AuthNotAllowed);
                }
                let auth_type =
                    (&data[rte_start + 2..rte_start + 4]).get_u16();
                match auth_type {
                    AUTH_TYPE_SIMPLE => {
                        if i != 0 {
                            return Err(DecodeError::AuthNotFirst);
                        }
                        let mut pw = [0u8; 16];
                        pw.copy_from_slice(
                            &data[rte_start + 4..rte_start + 20],
                        );
                        auth_envelope = Some(AuthEnvelope {
                            header: AuthRte::Simple(pw),
                            trailer: None,
                            signed_range: 0..0,
                        });
                        buf.advance(Self::RTE_LENGTH);
                        continue;
                    }
                    AUTH_TYPE_CRYPTO => {
                        if i != 0 {
                            return Err(DecodeError::AuthNotFirst);
                        }
                        let mut hdr = Bytes::copy_from_slice(
                            &data[rte_start + 4..rte_start + Self::RTE_LENGTH],
                        );
                        let pkt_len = hdr.get_u16();
                        let key_id = hdr.get_u8();
                        let auth_data_len = hdr.get_u8();
                        let seqno = hdr.get_u32();

                        // Locate and bounds-check the trailer RTE.
                        let trailer_start = pkt_len as usize;
                        let declared_end = trailer_start + 4;
                        if declared_end > len + bending_bytes as usize {
                            return Err(DecodeError::AuthTrailerOutOfRange);
                        }
                        let trailer_afi_pos = trailer_start.min(len.saturating_sub(4));
                        if trailer_afi_pos + 4 > len {
                            return Err(DecodeError::MissingAuthTrailer);
                        }
                        let trailer_afi =
                            (&data[trailer_afi_pos..trailer_afi_pos + 2])
                                .get_u16();
                        let trailer_type = (&data
                            [trailer_afi_pos + 2..trailer_afi_pos + 4])
                            .get_u16();
                        if trailer_afi != AFI_AUTH
                            || trailer_type != AUTH_TYPE_TRAILER
                        {
                            return Err(DecodeError::MissingAuthTrailer);
                        }
                        let digest =
                            Bytes::copy_from_slice(&data[trailer_afi_pos + 4..len]);

                        auth_envelope = Some(AuthEnvelope {
                            header: AuthRte::Crypto(AuthCrypto {
                                pkt_len,
                                key_id,
                                auth_data_len,
                                seqno,
                            }),
                            trailer: Some(digest),
                            signed_range: 0..(trailer_afi_pos + 4),
                        });
                        buf.advance(Self::RTE_LENGTH);
                        continue;
                    }
                    AUTH_TYPE_TRAILER => {
                        // Standalone trailer with no preceding crypto
                        // header: only valid if we already captured one.
                        if auth_envelope.is_none() {
                            return Err(DecodeError::InvalidRteAuthType(
                                auth_type,
                            ));
                        }
                        break;
                    }
                    _ => {
                        return Err(DecodeError::InvalidRteAuthType(auth_type));
                    }
                }
            }

            match Rte::decode(&mut buf) {
                Ok(rte) => {
                    if matches!(rte, Rte::Zero(_)) {
                        if zero_seen {
                            return Err(DecodeError::MultipleZeroRte);
                        }
                        zero_seen = true;
                        if command != Command::Request {
                            return Err(DecodeError::ZeroRteInResponse);
                        }
                    }
                    rtes.push(rte);
                }
                Err(error) => rte_errors.push(error),
            }
        }

        if zero_seen && rtes.len() + rte_errors.len() != 1 {
            return Err(DecodeError::ZeroRteNotSoleRte);
        }

        let max_entries = Self::max_entries(
            auth_envelope.as_ref().map(|_| CryptoAlgo::Md5),
        );
        if rtes.is_empty() && rte_errors.is_empty() {
            return Err(DecodeError::InvalidLength(len));
        }
        if rtes.len() + rte_errors.len() > max_entries {
            return Err(DecodeError::TooManyRtes(rtes.len() + rte_errors.len()));
        }

        let pdu = Pdu {
            command,
            version,
            rtes,
            rte_errors,
        };

        Ok((pdu, auth_envelope))
    }

    /// Decodes without the structural checks (used by tests and by
    /// encode/decode round-trip verification once `examine` has already
    /// validated shape).
    pub fn decode(data: &[u8]) -> DecodeResult<Self> {
        Self::examine(data, true, 0).map(|(pdu, _)| pdu)
    }

    /// Encodes the 4-byte PDU header.
    pub fn encode_header(&self) -> [u8; 4] {
        [self.command as u8, self.version, 0, 0]
    }

    /// Encodes the RTE list only (no header, no authentication envelope).
    /// The Authenticator assembles the final wire buffer out of the header,
    /// an optional authentication header RTE, this, and an optional
    /// trailer.
    pub fn encode_rtes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.rtes.len() * Self::RTE_LENGTH);
        for rte in &self.rtes {
            rte.encode(&mut buf, self.version);
        }
        buf
    }

    /// Encodes a full, unauthenticated packet. Used directly when the
    /// interface's authentication method is `None`.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(
            Self::HDR_LENGTH + self.rtes.len() * Self::RTE_LENGTH,
        );
        buf.put_slice(&self.encode_header());
        buf.extend_from_slice(&self.encode_rtes());
        buf
    }
}

impl Rte {
    pub(crate) fn encode(&self, buf: &mut BytesMut, version: u8) {
        match self {
            Rte::Zero(rte) => rte.encode(buf),
            Rte::Ipv4(rte) => rte.encode(buf, version),
        }
    }

    pub(crate) fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let afi = buf.get_u16();
        match afi {
            AFI_ZERO => Ok(Rte::Zero(RteZero::decode(buf)?)),
            AFI_INET => Ok(Rte::Ipv4(RteIpv4::decode(buf)?)),
            _ => {
                buf.advance(Pdu::RTE_LENGTH - 2);
                Err(DecodeError::InvalidRteAddressFamily(afi))
            }
        }
    }
}

const AFI_ZERO: u16 = 0;
const AFI_INET: u16 = 2;
pub(crate) const AFI_AUTH: u16 = 0xFFFF;
pub(crate) const AUTH_TYPE_TRAILER: u16 = 1;
pub(crate) const AUTH_TYPE_SIMPLE: u16 = 2;
pub(crate) const AUTH_TYPE_CRYPTO: u16 = 3;

impl RteZero {
    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(AFI_ZERO);
        buf.put_u16(0);
        buf.put_u32(0);
        buf.put_u32(0);
        buf.put_u32(0);
        buf.put_u32(self.metric.get().into());
    }

    pub(crate) fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let _tag = buf.get_u16();
        let _addr = buf.get_u32();
        let _mask = buf.get_u32();
        let _nexthop = buf.get_u32();
        let metric = buf.get_u32();
        let metric = Metric::new(metric)
            .map_err(|_| DecodeError::InvalidRteMetric(metric))?;
        Ok(RteZero { metric })
    }
}

impl RteIpv4 {
    pub(crate) fn encode(&self, buf: &mut BytesMut, version: u8) {
        buf.put_u16(AFI_INET);
        if version == 1 {
            buf.put_u16(0);
        } else {
            buf.put_u16(self.tag);
        }
        buf.put_u32(self.prefix_addr.into());
        if version == 1 {
            buf.put_u32(0);
            buf.put_u32(0);
        } else {
            buf.put_u32(self.prefix_mask.into());
            buf.put_u32(self.nexthop.into());
        }
        buf.put_u32(self.metric.get().into());
    }

    pub(crate) fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let tag = buf.get_u16();
        let addr = Ipv4Addr::from(buf.get_u32());
        let mask = Ipv4Addr::from(buf.get_u32());
        let nexthop = Ipv4Addr::from(buf.get_u32());
        let metric = buf.get_u32();
        let metric = Metric::new(metric)
            .map_err(|_| DecodeError::InvalidRteMetric(metric))?;
        Ok(RteIpv4 {
            tag,
            prefix_addr: addr,
            prefix_mask: mask,
            nexthop,
            metric,
        })
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidLength(n) => write!(f, "invalid length: {n}"),
            DecodeError::InvalidCommand(c) => write!(f, "invalid command: {c}"),
            DecodeError::InvalidVersion(v) => write!(f, "invalid version: {v}"),
            DecodeError::NotIntegralRteCount => {
                write!(f, "packet length is not an integral number of RTEs")
            }
            DecodeError::TooManyRtes(n) => write!(f, "too many RTEs: {n}"),
            DecodeError::V1AuthNotAllowed => {
                write!(f, "RIPv1 packets must not carry an authentication RTE")
            }
            DecodeError::AuthNotFirst => {
                write!(f, "authentication RTE must be first")
            }
            DecodeError::MultipleZeroRte => {
                write!(f, "more than one zero-family RTE")
            }
            DecodeError::ZeroRteNotSoleRte => {
                write!(f, "zero-family RTE must be the sole RTE")
            }
            DecodeError::ZeroRteInResponse => {
                write!(f, "zero-family RTE outside a Request")
            }
            DecodeError::MissingAuthTrailer => {
                write!(f, "declared authentication trailer not found")
            }
            DecodeError::AuthTrailerOutOfRange => {
                write!(f, "authentication trailer position out of range")
            }
            DecodeError::InvalidRteAddressFamily(afi) => {
                write!(f, "invalid RTE address family: {afi}")
            }
            DecodeError::InvalidRteAuthType(t) => {
                write!(f, "invalid authentication type: {t}")
            }
            DecodeError::InvalidRteMetric(m) => {
                write!(f, "invalid RIP metric: {m}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}
