//! Distributes parsed records into the zones that own them, synthesising reverse PTRs along the
//! way (SPEC_FULL §4.5).

use crate::record::{Record, RecordType, RR};
use crate::zone::{parse_ipv4, parse_ipv6, Zones};

/// Routes one `Record` against a built `Zones` set: the forward RR(s) go to the zone whose name
/// exactly matches `record.domain` (no suffix matching); A/AAAA values additionally synthesise a
/// PTR into whichever reverse zone covers them, provided the record opts into reverse synthesis
/// and a covering zone exists. Records/RRs with no home are logged and dropped, never aborting
/// the run.
pub fn route_record(zones: &mut Zones, record: &Record) {
    let rrs = record.to_rrs();

    match zones.find_forward(&record.domain) {
        Some(idx) => {
            for rr in &rrs {
                zones.forward[idx].add_rr(rr.clone());
            }
        }
        None => {
            tracing::info!(domain = %record.domain, name = %record.name, "no forward zone for record, dropping");
        }
    }

    if !record.reverse_enabled(default_reverse_for(record.rtype)) {
        return;
    }

    for rr in &rrs {
        match rr.rtype {
            RecordType::A => route_reverse4(zones, rr),
            RecordType::Aaaa => route_reverse6(zones, rr),
            _ => {}
        }
    }
}

fn default_reverse_for(rtype: RecordType) -> bool {
    matches!(rtype, RecordType::A | RecordType::Aaaa)
}

fn route_reverse4(zones: &mut Zones, rr: &RR) {
    let Some(addr) = parse_ipv4(&rr.value) else {
        tracing::warn!(value = %rr.value, "A record value is not a valid IPv4 address, skipping PTR synthesis");
        return;
    };

    match zones.lookup_reverse4(addr) {
        Some(idx) => {
            let ptr = RR {
                domain: zones.reverse4[idx].name.clone(),
                name: addr.to_string(),
                ttl: rr.ttl,
                rtype: RecordType::Ptr,
                value: format!("{}.", rr.fqdn()),
            };
            zones.reverse4[idx].add_rr(ptr);
        }
        None => {
            tracing::warn!(address = %addr, "no reverse4 zone covers this address, dropping PTR");
        }
    }
}

fn route_reverse6(zones: &mut Zones, rr: &RR) {
    let Some(addr) = parse_ipv6(&rr.value) else {
        tracing::warn!(value = %rr.value, "AAAA record value is not a valid IPv6 address, skipping PTR synthesis");
        return;
    };

    match zones.lookup_reverse6(addr) {
        Some(idx) => {
            let ptr = RR {
                domain: zones.reverse6[idx].name.clone(),
                name: addr.to_string(),
                ttl: rr.ttl,
                rtype: RecordType::Ptr,
                value: format!("{}.", rr.fqdn()),
            };
            zones.reverse6[idx].add_rr(ptr);
        }
        None => {
            tracing::warn!(address = %addr, "no reverse6 zone covers this address, dropping PTR");
        }
    }
}
