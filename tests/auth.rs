//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::sync::atomic::AtomicU32;

use ripd_core::auth::{self, AuthFailure};
use ripd_core::crypto::CryptoAlgo;
use ripd_core::keychain::{AuthMethod, Key};
use ripd_core::metric::Metric;
use ripd_core::packet::{Command, Pdu, Rte, RteIpv4};

fn sample_pdu() -> Pdu {
    Pdu {
        command: Command::Response,
        version: 2,
        rtes: vec![Rte::Ipv4(RteIpv4 {
            tag: 0,
            prefix_addr: "10.1.0.0".parse().unwrap(),
            prefix_mask: "255.255.0.0".parse().unwrap(),
            nexthop: "0.0.0.0".parse().unwrap(),
            metric: Metric::from(6),
        })],
        rte_errors: vec![],
    }
}

#[test]
fn cleartext_round_trips() {
    let method = AuthMethod::Cleartext(b"hunter2".to_vec());
    let seqno = Arc::new(AtomicU32::new(0));

    let wire = auth::sign(&sample_pdu(), &method, &seqno);
    let (_, envelope) = Pdu::examine(&wire, false, 0).unwrap();
    let outcome = auth::verify(&wire, envelope.as_ref(), &method).unwrap();
    assert!(outcome.seqno.is_none());
}

#[test]
fn cleartext_wrong_password_is_rejected() {
    let sign_method = AuthMethod::Cleartext(b"hunter2".to_vec());
    let verify_method = AuthMethod::Cleartext(b"wrongpw".to_vec());
    let seqno = Arc::new(AtomicU32::new(0));

    let wire = auth::sign(&sample_pdu(), &sign_method, &seqno);
    let (_, envelope) = Pdu::examine(&wire, false, 0).unwrap();
    let outcome = auth::verify(&wire, envelope.as_ref(), &verify_method);
    assert_eq!(outcome.unwrap_err(), AuthFailure::DigestMismatch);
}

#[test]
fn keyed_md5_round_trips_and_carries_seqno() {
    let key = Key::new(1, CryptoAlgo::Md5, b"hello".to_vec());
    let method = AuthMethod::ManualKey(key);
    let seqno = Arc::new(AtomicU32::new(42));

    let wire = auth::sign(&sample_pdu(), &method, &seqno);
    let (_, envelope) = Pdu::examine(&wire, false, 4).unwrap();
    let outcome = auth::verify(&wire, envelope.as_ref(), &method).unwrap();
    assert_eq!(outcome.seqno, Some(42));
}

/// Scenario: a valid-shape v2 packet whose trailer digest differs from the
/// correct keyed-MD5 value by one bit must be rejected outright.
#[test]
fn keyed_md5_single_bit_trailer_corruption_is_rejected() {
    let key = Key::new(1, CryptoAlgo::Md5, b"hello".to_vec());
    let method = AuthMethod::ManualKey(key);
    let seqno = Arc::new(AtomicU32::new(0));

    let mut wire = auth::sign(&sample_pdu(), &method, &seqno).to_vec();
    *wire.last_mut().unwrap() ^= 0x01;

    let (_, envelope) = Pdu::examine(&wire, false, 4).unwrap();
    let outcome = auth::verify(&wire, envelope.as_ref(), &method);
    assert_eq!(outcome.unwrap_err(), AuthFailure::DigestMismatch);
}

#[test]
fn unauthenticated_packet_on_authenticated_interface_is_rejected() {
    let key = Key::new(1, CryptoAlgo::Md5, b"hello".to_vec());
    let method = AuthMethod::ManualKey(key);

    let wire = sample_pdu().encode();
    let (_, envelope) = Pdu::examine(&wire, false, 4).unwrap();
    assert!(envelope.is_none());
    let outcome = auth::verify(&wire, envelope.as_ref(), &method);
    assert_eq!(outcome.unwrap_err(), AuthFailure::TypeMismatch);
}

#[test]
fn sequence_number_replay_detection() {
    assert!(auth::seqno_acceptable(10, 11));
    assert!(auth::seqno_acceptable(10, 10));
    assert!(!auth::seqno_acceptable(10, 9));
    // A reset to zero is always accepted (RFC 2082 Section 3).
    assert!(auth::seqno_acceptable(10, 0));
}
