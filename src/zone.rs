//! In-memory zone model: forward/reverse4/reverse6 zones, their reverse-zone prefixes, and the
//! collection that threads the LPM index (SPEC_FULL §3/§4.8 step 1-3).

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::str::FromStr;

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

use crate::config_parser::ZoneInfo;
use crate::error::{DnsMgrError, Result};
use crate::lpm::{Mtrie4, Mtrie6};
use crate::record::RR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Forward,
    Reverse4,
    Reverse6,
}

/// A single zone's records, keyed by `name + domain` (per §4.6); the renderer re-sorts keys
/// ascending at render time, so storage order here doesn't matter.
#[derive(Debug)]
pub struct Zone {
    pub name: String,
    pub kind: ZoneKind,
    pub prefix: Option<IpNetwork>,
    pub include_file_name: String,
    pub backing_file: PathBuf,
    pub records: HashMap<String, Vec<RR>>,
}

impl Zone {
    fn new(name: String, kind: ZoneKind, prefix: Option<IpNetwork>, backing_file: PathBuf) -> Self {
        Zone {
            include_file_name: name.clone(),
            name,
            kind,
            prefix,
            backing_file,
            records: HashMap::new(),
        }
    }

    pub fn add_rr(&mut self, rr: RR) {
        let key = format!("{}{}", rr.name, rr.domain);
        self.records.entry(key).or_default().push(rr);
    }

    pub fn record_count(&self) -> usize {
        self.records.values().map(|v| v.len()).sum()
    }
}

/// Derives the IPv4 reverse-zone prefix this zone name covers, by reversing its dotted labels
/// and right-padding with `0` octets, per §4.8 step 2.
pub fn reverse4_prefix(zone_name: &str) -> Result<Ipv4Network> {
    let trimmed = zone_name.trim_end_matches('.');
    let stripped = trimmed
        .strip_suffix(".in-addr.arpa")
        .ok_or_else(|| DnsMgrError::Validation(format!("'{zone_name}' is not an in-addr.arpa zone")))?;

    let mut labels: Vec<&str> = stripped.split('.').collect();
    if labels.len() > 4 {
        return Err(DnsMgrError::Validation(format!(
            "'{zone_name}' has more than 4 reverse labels"
        )));
    }
    labels.reverse();

    let prefixlen = 8 * labels.len() as u8;
    let mut octets = [0u8; 4];
    for (i, label) in labels.iter().enumerate() {
        octets[i] = label
            .parse()
            .map_err(|_| DnsMgrError::Validation(format!("'{label}' is not a valid octet in '{zone_name}'")))?;
    }

    Ipv4Network::new(Ipv4Addr::from(octets), prefixlen)
        .map_err(|e| DnsMgrError::Validation(format!("invalid reverse4 prefix for '{zone_name}': {e}")))
}

/// Derives the IPv6 reverse-zone prefix this zone name covers, by reversing its nibble labels
/// and right-padding with `0` nibbles, per §4.8 step 2.
pub fn reverse6_prefix(zone_name: &str) -> Result<Ipv6Network> {
    let trimmed = zone_name.trim_end_matches('.');
    let stripped = trimmed
        .strip_suffix(".ip6.arpa")
        .ok_or_else(|| DnsMgrError::Validation(format!("'{zone_name}' is not an ip6.arpa zone")))?;

    let mut nibbles: Vec<&str> = if stripped.is_empty() {
        Vec::new()
    } else {
        stripped.split('.').collect()
    };
    if nibbles.len() > 32 {
        return Err(DnsMgrError::Validation(format!(
            "'{zone_name}' has more than 32 reverse nibbles"
        )));
    }
    nibbles.reverse();

    let prefixlen = 4 * nibbles.len() as u8;
    let mut hex = String::with_capacity(32);
    for nibble in &nibbles {
        if nibble.len() != 1 || !nibble.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DnsMgrError::Validation(format!(
                "'{nibble}' is not a valid hex nibble in '{zone_name}'"
            )));
        }
        hex.push_str(nibble);
    }
    while hex.len() < 32 {
        hex.push('0');
    }

    let value = u128::from_str_radix(&hex, 16)
        .map_err(|_| DnsMgrError::Validation(format!("invalid reverse6 prefix for '{zone_name}'")))?;

    Ipv6Network::new(Ipv6Addr::from(value), prefixlen)
        .map_err(|e| DnsMgrError::Validation(format!("invalid reverse6 prefix for '{zone_name}': {e}")))
}

fn classify(name: &str) -> ZoneKind {
    let trimmed = name.trim_end_matches('.');
    if trimmed.ends_with(".in-addr.arpa") {
        ZoneKind::Reverse4
    } else if trimmed.ends_with(".ip6.arpa") {
        ZoneKind::Reverse6
    } else {
        ZoneKind::Forward
    }
}

/// The full set of zones for one reconciliation: forward zones kept in discovery order (the
/// router does an exact-name linear search over them), reverse zones sorted by descending
/// prefix length and indexed by an LPM trie for routing.
pub struct Zones {
    pub forward: Vec<Zone>,
    pub reverse4: Vec<Zone>,
    pub reverse6: Vec<Zone>,
    lpm4: Mtrie4<usize>,
    lpm6: Mtrie6<usize>,
}

impl Zones {
    /// Builds the zone set from discovered `ZoneInfo`s, filtering to `master` kind and
    /// constructing the LPM index over reverse zones (longest-prefix-first insertion per
    /// §4.3/§4.8 step 3).
    pub fn build(zone_infos: Vec<ZoneInfo>) -> Result<Zones> {
        let mut forward = Vec::new();
        let mut reverse4 = Vec::new();
        let mut reverse6 = Vec::new();

        for info in zone_infos {
            if info.kind != "master" {
                tracing::debug!(zone = %info.name, kind = %info.kind, "ignoring non-master zone");
                continue;
            }

            match classify(&info.name) {
                ZoneKind::Forward => {
                    forward.push(Zone::new(info.name, ZoneKind::Forward, None, info.file));
                }
                ZoneKind::Reverse4 => {
                    let prefix = reverse4_prefix(&info.name)?;
                    reverse4.push(Zone::new(
                        info.name,
                        ZoneKind::Reverse4,
                        Some(IpNetwork::V4(prefix)),
                        info.file,
                    ));
                }
                ZoneKind::Reverse6 => {
                    let prefix = reverse6_prefix(&info.name)?;
                    reverse6.push(Zone::new(
                        info.name,
                        ZoneKind::Reverse6,
                        Some(IpNetwork::V6(prefix)),
                        info.file,
                    ));
                }
            }
        }

        forward.sort_by_key(|z| z.name.len());

        reverse4.sort_by_key(|z| match z.prefix {
            Some(IpNetwork::V4(n)) => std::cmp::Reverse(n.prefix()),
            _ => std::cmp::Reverse(0),
        });
        reverse6.sort_by_key(|z| match z.prefix {
            Some(IpNetwork::V6(n)) => std::cmp::Reverse(n.prefix()),
            _ => std::cmp::Reverse(0),
        });

        let mut lpm4 = Mtrie4::new();
        for (i, zone) in reverse4.iter().enumerate() {
            if let Some(IpNetwork::V4(net)) = zone.prefix {
                lpm4.insert(net, i);
            }
        }

        let mut lpm6 = Mtrie6::new();
        for (i, zone) in reverse6.iter().enumerate() {
            if let Some(IpNetwork::V6(net)) = zone.prefix {
                lpm6.insert(net, i)?;
            }
        }

        Ok(Zones {
            forward,
            reverse4,
            reverse6,
            lpm4,
            lpm6,
        })
    }

    pub fn find_forward(&self, domain: &str) -> Option<usize> {
        self.forward.iter().position(|z| z.name == domain)
    }

    pub fn lookup_reverse4(&self, addr: Ipv4Addr) -> Option<usize> {
        self.lpm4.lookup(addr)
    }

    pub fn lookup_reverse6(&self, addr: Ipv6Addr) -> Option<usize> {
        self.lpm6.lookup(addr)
    }
}

pub(crate) fn parse_ipv4(s: &str) -> Option<Ipv4Addr> {
    Ipv4Addr::from_str(s).ok()
}

pub(crate) fn parse_ipv6(s: &str) -> Option<Ipv6Addr> {
    Ipv6Addr::from_str(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse4_prefix_from_three_labels() {
        let net = reverse4_prefix("1.168.192.in-addr.arpa").unwrap();
        assert_eq!(net.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn reverse6_prefix_from_sixteen_nibbles() {
        let net = reverse6_prefix("1.0.0.0.c.e.f.d.0.7.4.0.1.0.0.2.ip6.arpa").unwrap();
        assert_eq!(net.prefix(), 64);
        assert_eq!(
            net.network(),
            Ipv6Addr::from_str("2001:0470:dfec:0001::").unwrap()
        );
    }

    #[test]
    fn classify_identifies_each_zone_kind() {
        assert!(matches!(classify("example.com"), ZoneKind::Forward));
        assert!(matches!(
            classify("2.0.192.in-addr.arpa"),
            ZoneKind::Reverse4
        ));
        assert!(matches!(
            classify("1.0.0.0.c.e.f.d.0.7.4.0.1.0.0.2.ip6.arpa"),
            ZoneKind::Reverse6
        ));
    }

    #[test]
    fn zones_build_filters_non_master_and_sorts_reverse_by_prefixlen_desc() {
        let infos = vec![
            ZoneInfo {
                name: "0.192.in-addr.arpa".into(),
                file: PathBuf::from("/zones/0.192"),
                kind: "master".into(),
            },
            ZoneInfo {
                name: "2.0.192.in-addr.arpa".into(),
                file: PathBuf::from("/zones/2.0.192"),
                kind: "master".into(),
            },
            ZoneInfo {
                name: "slave-zone.example".into(),
                file: PathBuf::from("/zones/slave"),
                kind: "slave".into(),
            },
        ];

        let zones = Zones::build(infos).unwrap();
        assert_eq!(zones.reverse4.len(), 2);
        assert_eq!(zones.reverse4[0].name, "2.0.192.in-addr.arpa");
        assert_eq!(zones.reverse4[1].name, "0.192.in-addr.arpa");
    }

    #[test]
    fn lpm_picks_most_specific_reverse4_zone() {
        let infos = vec![
            ZoneInfo {
                name: "0.192.in-addr.arpa".into(),
                file: PathBuf::from("/zones/a"),
                kind: "master".into(),
            },
            ZoneInfo {
                name: "2.0.192.in-addr.arpa".into(),
                file: PathBuf::from("/zones/b"),
                kind: "master".into(),
            },
        ];
        let zones = Zones::build(infos).unwrap();
        let idx = zones
            .lookup_reverse4(Ipv4Addr::from_str("192.0.2.5").unwrap())
            .unwrap();
        assert_eq!(zones.reverse4[idx].name, "2.0.192.in-addr.arpa");
    }
}
