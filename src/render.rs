//! Deterministic include-file rendering for forward/reverse4/reverse6 zones (SPEC_FULL §4.6).
//!
//! Ordering is the only source of determinism: record keys are visited in ascending string
//! order, and RRs within a key keep their insertion order. Given the same `Zone` contents this
//! always produces byte-identical output, which is what lets the reconciler diff-by-checksum.

use std::fmt::Write as _;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::zone::{Zone, ZoneKind};

const NAME_WIDTH_FORWARD: usize = 30;
const TTL_WIDTH: usize = 5;
const TYPE_WIDTH: usize = 8;
const NAME_WIDTH_REVERSE6: usize = 50;

/// Renders `zone`'s include-file text, given the path it will be `$INCLUDE`d from (used only in
/// the header preamble).
pub fn render_zone(zone: &Zone, include_path: &str) -> String {
    let mut keys: Vec<&String> = zone.records.keys().collect();
    keys.sort();

    let record_count = zone.record_count();
    let mut out = String::new();

    writeln!(out, "; Auto-generated include file: {include_path}").unwrap();
    writeln!(out, "; {record_count} record(s)").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "$ORIGIN {}.", zone.name).unwrap();
    writeln!(out).unwrap();

    for key in keys {
        for rr in &zone.records[key] {
            match zone.kind {
                ZoneKind::Forward => render_forward_line(&mut out, rr),
                ZoneKind::Reverse4 => render_reverse_line(&mut out, rr, &zone.name, true),
                ZoneKind::Reverse6 => render_reverse_line(&mut out, rr, &zone.name, false),
            }
        }
    }

    out
}

fn render_forward_line(out: &mut String, rr: &crate::record::RR) {
    let ttl = rr.ttl.map(|t| t.to_string()).unwrap_or_default();
    writeln!(
        out,
        "{:<name_w$}{:<ttl_w$}{:<type_w$}{}",
        rr.name,
        ttl,
        rr.rtype.as_str(),
        rr.value,
        name_w = NAME_WIDTH_FORWARD,
        ttl_w = TTL_WIDTH,
        type_w = TYPE_WIDTH,
    )
    .unwrap();
}

fn reverse4_name(zone_name: &str, addr: Ipv4Addr) -> String {
    let octets = addr.octets();
    let reversed = format!(
        "{}.{}.{}.{}.in-addr.arpa",
        octets[3], octets[2], octets[1], octets[0]
    );
    truncate_trailing(&reversed, zone_name.len() + 1)
}

fn reverse6_name(zone_name: &str, addr: Ipv6Addr) -> String {
    let hex = format!("{:032x}", u128::from(addr));
    let nibbles: Vec<char> = hex.chars().rev().collect();
    let parts: Vec<String> = nibbles.iter().map(|c| c.to_string()).collect();
    let reversed = format!("{}.ip6.arpa", parts.join("."));
    truncate_trailing(&reversed, zone_name.len() + 1)
}

fn truncate_trailing(s: &str, trailing_len: usize) -> String {
    if trailing_len >= s.len() {
        return String::new();
    }
    s[..s.len() - trailing_len].to_string()
}

fn render_reverse_line(out: &mut String, rr: &crate::record::RR, zone_name: &str, is_v4: bool) {
    let name = if is_v4 {
        Ipv4Addr::from_str(&rr.name)
            .map(|addr| reverse4_name(zone_name, addr))
            .unwrap_or_else(|_| rr.name.clone())
    } else {
        Ipv6Addr::from_str(&rr.name)
            .map(|addr| reverse6_name(zone_name, addr))
            .unwrap_or_else(|_| rr.name.clone())
    };

    let name_width = if is_v4 {
        NAME_WIDTH_FORWARD
    } else {
        NAME_WIDTH_REVERSE6
    };
    let ttl = rr.ttl.map(|t| t.to_string()).unwrap_or_default();

    writeln!(
        out,
        "{:<name_w$}{:<ttl_w$}{:<type_w$}{}",
        name,
        ttl,
        rr.rtype.as_str(),
        rr.value,
        name_w = name_width,
        ttl_w = TTL_WIDTH,
        type_w = TYPE_WIDTH,
    )
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_parser::ZoneInfo;
    use crate::record::{Record, RecordType};
    use crate::router::route_record;
    use crate::zone::Zones;
    use std::path::PathBuf;

    fn zone_info(name: &str) -> ZoneInfo {
        ZoneInfo {
            name: name.to_string(),
            file: PathBuf::from(format!("/z/{name}")),
            kind: "master".into(),
        }
    }

    #[test]
    fn empty_zone_renders_preamble_only() {
        let zones = Zones::build(vec![zone_info("example.com")]).unwrap();
        let text = render_zone(&zones.forward[0], "/etc/bind/include/example.com");
        assert!(text.contains("$ORIGIN example.com."));
        assert!(text.contains("0 record(s)"));
    }

    #[test]
    fn forward_record_renders_padded_columns() {
        let mut zones = Zones::build(vec![zone_info("example.com")]).unwrap();
        let mut record = Record::new("example.com", "www", RecordType::A);
        record.values.push("192.0.2.5".into());
        record.reverse = Some(false);
        route_record(&mut zones, &record);

        let text = render_zone(&zones.forward[0], "/etc/bind/include/example.com");
        assert!(text.contains("www"));
        assert!(text.contains("A"));
        assert!(text.contains("192.0.2.5"));
    }

    #[test]
    fn reverse4_name_is_reversed_octets_truncated_by_zone_name() {
        let mut zones = Zones::build(vec![
            zone_info("example.com"),
            zone_info("2.0.192.in-addr.arpa"),
        ])
        .unwrap();
        let mut record = Record::new("example.com", "www", RecordType::A);
        record.values.push("192.0.2.5".into());
        record.reverse = Some(true);
        route_record(&mut zones, &record);

        let text = render_zone(&zones.reverse4[0], "/etc/bind/include/2.0.192.in-addr.arpa");
        assert!(text.contains("5"));
        assert!(text.contains("PTR"));
        assert!(text.contains("www.example.com."));
    }

    #[test]
    fn render_is_byte_identical_across_repeated_calls() {
        let mut zones = Zones::build(vec![zone_info("example.com")]).unwrap();
        let mut record = Record::new("example.com", "www", RecordType::A);
        record.values.push("192.0.2.5".into());
        record.reverse = Some(false);
        route_record(&mut zones, &record);

        let first = render_zone(&zones.forward[0], "/x");
        let second = render_zone(&zones.forward[0], "/x");
        assert_eq!(first, second);
    }

    #[test]
    fn keys_are_rendered_in_ascending_string_order() {
        let mut zones = Zones::build(vec![zone_info("example.com")]).unwrap();
        let mut a = Record::new("example.com", "zzz", RecordType::A);
        a.values.push("192.0.2.9".into());
        a.reverse = Some(false);
        let mut b = Record::new("example.com", "aaa", RecordType::A);
        b.values.push("192.0.2.1".into());
        b.reverse = Some(false);
        route_record(&mut zones, &a);
        route_record(&mut zones, &b);

        let text = render_zone(&zones.forward[0], "/x");
        let aaa_pos = text.find("aaa").unwrap();
        let zzz_pos = text.find("zzz").unwrap();
        assert!(aaa_pos < zzz_pos);
    }
}
