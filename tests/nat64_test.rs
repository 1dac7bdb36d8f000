//! Tests for NAT64 address synthesis: hex embedding of IPv4 octets into the
//! fixed-prefix IPv6 literal, and rejection of malformed input.

use hubproxy::nat64::{convert_to_nat64, Nat64Mapping};
use std::net::{Ipv4Addr, Ipv6Addr};

#[test]
fn test_convert_embeds_octets_as_hex() {
    let literal = convert_to_nat64("192.0.2.1").unwrap();
    assert_eq!(literal, "[2602:fc59:b0:64::c000:0201]");
}

#[test]
fn test_convert_pads_small_octets() {
    let literal = convert_to_nat64("1.2.3.4").unwrap();
    assert_eq!(literal, "[2602:fc59:b0:64::0102:0304]");
}

#[test]
fn test_convert_high_octets() {
    let literal = convert_to_nat64("255.255.255.255").unwrap();
    assert_eq!(literal, "[2602:fc59:b0:64::ffff:ffff]");
}

#[test]
fn test_convert_is_deterministic() {
    let first = convert_to_nat64("10.0.0.1").unwrap();
    let second = convert_to_nat64("10.0.0.1").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_literal_parses_as_ipv6() {
    let literal = convert_to_nat64("192.0.2.1").unwrap();
    let stripped = literal.trim_start_matches('[').trim_end_matches(']');
    let parsed: Ipv6Addr = stripped.parse().expect("literal should be a valid IPv6 address");
    let expected: Ipv6Addr = "2602:fc59:b0:64::c000:201".parse().unwrap();
    assert_eq!(parsed, expected);
}

#[test]
fn test_mapping_addr_strips_brackets() {
    let mapping = Nat64Mapping {
        domain: "example.com".to_string(),
        ipv4: Ipv4Addr::new(192, 0, 2, 1),
        literal: convert_to_nat64("192.0.2.1").unwrap(),
    };
    let addr = mapping.addr().unwrap();
    let expected: Ipv6Addr = "2602:fc59:b0:64::c000:201".parse().unwrap();
    assert_eq!(addr, expected);
}

#[test]
fn test_mapping_addr_rejects_garbage_literal() {
    let mapping = Nat64Mapping {
        domain: "example.com".to_string(),
        ipv4: Ipv4Addr::new(192, 0, 2, 1),
        literal: "[not-an-address]".to_string(),
    };
    assert!(mapping.addr().is_err());
}

#[test]
fn test_convert_rejects_out_of_range_octet() {
    assert!(convert_to_nat64("999.1.1.1").is_err());
}

#[test]
fn test_convert_rejects_short_address() {
    assert!(convert_to_nat64("1.2.3").is_err());
}

#[test]
fn test_convert_rejects_empty_and_alpha() {
    assert!(convert_to_nat64("").is_err());
    assert!(convert_to_nat64("not.an.ip.addr").is_err());
}
