//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use const_addrs::ip4;
use ripd_core::metric::Metric;
use ripd_core::packet::{Command, DecodeError, Pdu, Rte, RteIpv4, RteZero};

#[test]
fn decode_v2_response_two_entries() {
    let bytes = vec![
        0x02, 0x02, 0x00, 0x00, // header: Response, v2
        0x00, 0x02, 0x00, 0x00, 0x0a, 0x00, 0x02, 0x00, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x01, // 10.0.2.0/24, metric 1
        0x00, 0x02, 0x00, 0x00, 0x0a, 0x00, 0x03, 0x00, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x03, // 10.0.3.0/24, metric 3
    ];

    let (pdu, envelope) = Pdu::examine(&bytes, false, 0).unwrap();
    assert!(envelope.is_none());
    assert_eq!(pdu.command, Command::Response);
    assert_eq!(pdu.version, 2);
    assert_eq!(pdu.rtes.len(), 2);

    let Rte::Ipv4(first) = &pdu.rtes[0] else {
        panic!("expected an IPv4 RTE");
    };
    assert_eq!(first.prefix_addr, Ipv4Addr::new(10, 0, 2, 0));
    assert_eq!(first.prefix_mask, Ipv4Addr::new(255, 255, 255, 0));
    assert_eq!(first.nexthop, Ipv4Addr::UNSPECIFIED);
    assert_eq!(first.metric.get(), 1);

    assert_eq!(pdu.encode_rtes().len(), bytes.len() - Pdu::HDR_LENGTH);
}

#[test]
fn encode_matches_decode_for_v2_response() {
    let pdu = Pdu {
        command: Command::Response,
        version: 2,
        rtes: vec![Rte::Ipv4(RteIpv4 {
            tag: 7,
            prefix_addr: ip4!("10.1.0.0"),
            prefix_mask: ip4!("255.255.0.0"),
            nexthop: ip4!("10.0.0.2"),
            metric: Metric::from(6),
        })],
        rte_errors: vec![],
    };

    let encoded = pdu.encode();
    let (decoded, _) = Pdu::examine(&encoded, false, 0).unwrap();
    assert_eq!(decoded, pdu);
}

#[test]
fn v1_encode_zeroes_tag_mask_and_nexthop() {
    let pdu = Pdu {
        command: Command::Response,
        version: 1,
        rtes: vec![Rte::Ipv4(RteIpv4 {
            tag: 42,
            prefix_addr: Ipv4Addr::new(10, 0, 0, 0),
            prefix_mask: Ipv4Addr::new(255, 0, 0, 0),
            nexthop: Ipv4Addr::new(10, 0, 0, 9),
            metric: Metric::from(2),
        })],
        rte_errors: vec![],
    };

    let encoded = pdu.encode();
    let rte_bytes = &encoded[Pdu::HDR_LENGTH..];
    // tag field (bytes 2..4)
    assert_eq!(&rte_bytes[2..4], &[0, 0]);
    // mask field (bytes 8..12)
    assert_eq!(&rte_bytes[8..12], &[0, 0, 0, 0]);
    // nexthop field (bytes 12..16)
    assert_eq!(&rte_bytes[12..16], &[0, 0, 0, 0]);
}

#[test]
fn request_sentinel_decodes_as_sole_zero_rte() {
    let bytes = vec![
        0x01, 0x02, 0x00, 0x00, // header: Request, v2
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x10, // family 0, metric 16 (infinite)
    ];

    let (pdu, _) = Pdu::examine(&bytes, false, 0).unwrap();
    assert_eq!(pdu.command, Command::Request);
    assert_eq!(pdu.rtes.len(), 1);
    let Rte::Zero(RteZero { metric }) = &pdu.rtes[0] else {
        panic!("expected the family-0 sentinel RTE");
    };
    assert!(metric.is_infinite());
}

#[test]
fn rejects_unknown_version() {
    let bytes = vec![
        0x02, 0x03, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x0a, 0x00, 0x02, 0x00, 0xff, 0xff, 0xff,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    ];
    assert_eq!(Pdu::examine(&bytes, false, 0), Err(DecodeError::InvalidVersion(3)));
}

#[test]
fn rejects_non_integral_rte_count() {
    let bytes = vec![0x02, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    assert_eq!(
        Pdu::examine(&bytes, false, 0),
        Err(DecodeError::NotIntegralRteCount)
    );
}

#[test]
fn rejects_too_many_rtes() {
    let mut bytes = vec![0x02, 0x02, 0x00, 0x00];
    let one_rte = [
        0x00, 0x02, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x01,
    ];
    for _ in 0..Pdu::MAX_ENTRIES + 1 {
        bytes.extend_from_slice(&one_rte);
    }
    assert!(matches!(
        Pdu::examine(&bytes, false, 0),
        Err(DecodeError::TooManyRtes(_))
    ));
}

#[test]
fn max_entries_shrinks_with_authentication() {
    assert_eq!(Pdu::max_entries(None), 25);
    assert_eq!(
        Pdu::max_entries(Some(ripd_core::crypto::CryptoAlgo::Md5)),
        23
    );
}
