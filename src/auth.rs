//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::{BufMut, BytesMut};

use crate::crypto;
use crate::keychain::{AuthMethod, Key};
use crate::packet::{
    AFI_AUTH, AUTH_TYPE_CRYPTO, AUTH_TYPE_SIMPLE, AUTH_TYPE_TRAILER, AuthCrypto, AuthEnvelope,
    AuthRte, Pdu,
};

const AUTH_HDR_LENGTH: usize = 20;

/// Reasons the Authenticator rejects an inbound packet. Never mutates
/// RouteDB state; the caller is responsible for the badpacket counters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthFailure {
    /// The packet's authentication envelope doesn't match the interface's
    /// configured scheme (e.g. unauthenticated packet on an authenticated
    /// interface, or vice versa).
    TypeMismatch,
    /// No key matches the declared key-id/acceptance window.
    NoKey,
    /// Declared digest didn't match the computed one.
    DigestMismatch,
    /// Sequence number went backwards (replay).
    SeqnoReplay,
}

pub struct VerifyOutcome {
    /// Sequence number carried by Keyed-MD5/HMAC authentication, if any.
    /// The caller compares/updates this against per-neighbor state.
    pub seqno: Option<u32>,
}

/// Verifies an inbound packet's authentication envelope against the
/// interface's configured method. `data` is the full on-wire buffer that
/// `envelope` was decoded from.
pub fn verify(
    data: &[u8],
    envelope: Option<&AuthEnvelope>,
    method: &AuthMethod,
) -> Result<VerifyOutcome, AuthFailure> {
    match (method, envelope) {
        (AuthMethod::None, None) => Ok(VerifyOutcome { seqno: None }),
        (AuthMethod::None, Some(_)) => Err(AuthFailure::TypeMismatch),
        (AuthMethod::Cleartext(_), None) => Err(AuthFailure::TypeMismatch),
        (AuthMethod::ManualKey(_) | AuthMethod::Keychain(_), None) => {
            Err(AuthFailure::TypeMismatch)
        }
        (AuthMethod::Cleartext(passphrase), Some(envelope)) => {
            let AuthRte::Simple(wire_pw) = &envelope.header else {
                return Err(AuthFailure::TypeMismatch);
            };
            let mut expected = passphrase.clone();
            expected.resize(16, 0);
            if wire_pw[..] == expected[..] {
                Ok(VerifyOutcome { seqno: None })
            } else {
                Err(AuthFailure::DigestMismatch)
            }
        }
        (AuthMethod::ManualKey(key), Some(envelope)) => {
            verify_crypto(data, envelope, key)
        }
        (AuthMethod::Keychain(keychain), Some(envelope)) => {
            let AuthRte::Crypto(hdr) = &envelope.header else {
                return Err(AuthFailure::TypeMismatch);
            };
            let key = keychain
                .key_lookup_accept(hdr.key_id as u16)
                .ok_or(AuthFailure::NoKey)?;
            verify_crypto(data, envelope, key)
        }
    }
}

fn verify_crypto(
    data: &[u8],
    envelope: &AuthEnvelope,
    key: &Key,
) -> Result<VerifyOutcome, AuthFailure> {
    let AuthRte::Crypto(hdr) = &envelope.header else {
        return Err(AuthFailure::TypeMismatch);
    };
    let trailer = envelope.trailer.as_ref().ok_or(AuthFailure::NoKey)?;
    let signed = &data[envelope.signed_range.clone()];
    let digest = crypto::message_digest(signed, key.algo, &key.string);
    if digest[..] == trailer[..] {
        Ok(VerifyOutcome {
            seqno: Some(hdr.seqno),
        })
    } else {
        Err(AuthFailure::DigestMismatch)
    }
}

/// Checks non-decreasing sequence number semantics (RFC 2082 Section 3): a
/// reset to zero is always accepted, otherwise the new value must not be
/// less than the last observed one.
pub fn seqno_acceptable(last: u32, incoming: u32) -> bool {
    incoming == 0 || incoming >= last
}

/// Renders a full wire packet, applying the interface's authentication
/// method. `seqno` is the per-interface send-sequence counter (RFC 2082
/// Section 3 calls for a monotonically increasing value, e.g. seeded from
/// the Unix epoch at startup to reduce the chance of successfully replaying
/// packets from a restarted instance).
pub fn sign(pdu: &Pdu, method: &AuthMethod, seqno: &Arc<AtomicU32>) -> BytesMut {
    match method {
        AuthMethod::None => pdu.encode(),
        AuthMethod::Cleartext(passphrase) => {
            let mut buf = BytesMut::with_capacity(Pdu::HDR_LENGTH + AUTH_HDR_LENGTH);
            buf.put_slice(&pdu.encode_header());
            buf.put_u16(AFI_AUTH);
            buf.put_u16(AUTH_TYPE_SIMPLE);
            let mut pw = passphrase.clone();
            pw.resize(16, 0);
            buf.put_slice(&pw);
            buf.extend_from_slice(&pdu.encode_rtes());
            buf
        }
        AuthMethod::ManualKey(key) => sign_crypto(pdu, key, seqno),
        AuthMethod::Keychain(keychain) => {
            match keychain.key_lookup_send() {
                Some(key) => sign_crypto(pdu, key, seqno),
                // Fail-close: no usable send key. Emit unauthenticated
                // rather than panic; the Dispatcher logs this condition.
                None => pdu.encode(),
            }
        }
    }
}

fn sign_crypto(pdu: &Pdu, key: &Key, seqno: &Arc<AtomicU32>) -> BytesMut {
    let mut buf = BytesMut::with_capacity(Pdu::HDR_LENGTH + AUTH_HDR_LENGTH);
    buf.put_slice(&pdu.encode_header());

    let auth_hdr = AuthCrypto {
        pkt_len: 0,
        key_id: key.id as u8,
        auth_data_len: key.algo.digest_size(),
        seqno: seqno.fetch_add(1, Ordering::Relaxed),
    };
    buf.put_u16(AFI_AUTH);
    buf.put_u16(AUTH_TYPE_CRYPTO);
    buf.put_u16(auth_hdr.pkt_len);
    buf.put_u8(auth_hdr.key_id);
    buf.put_u8(auth_hdr.auth_data_len);
    buf.put_u32(auth_hdr.seqno);
    buf.put_u32(0);
    buf.put_u32(0);

    buf.extend_from_slice(&pdu.encode_rtes());

    // Patch the "packet length" field (offset 8..10) now that the true
    // extent of header+auth-header+RTEs is known.
    let pkt_len = buf.len() as u16;
    buf[8..10].copy_from_slice(&pkt_len.to_be_bytes());

    let digest = crypto::message_digest(&buf, key.algo, &key.string);

    buf.put_u16(AFI_AUTH);
    buf.put_u16(AUTH_TYPE_TRAILER);
    buf.put_slice(&digest);

    buf
}

