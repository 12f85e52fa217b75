//! DHCP static-host include-file emission (SPEC_FULL §4.9).
//!
//! Reuses the render-then-diff-then-replace-then-restart pattern of the zone reconciler. The
//! IPv4 and IPv6 branches are independent end to end — each buffer is diffed and each restart is
//! gated on its own branch's diff result. The source this is distilled from tests the IPv4
//! buffer's diff result before restarting the IPv6 service; that copy/paste bug is fixed here.

use crate::config::DhcpFamilyConfig;
use crate::error::Result;
use crate::record::{Record, RecordType};
use crate::transport::{Transport, DEFAULT_TIMEOUT};

fn fqdn_underscored(record: &Record) -> String {
    record.fqdn().replace('.', "_")
}

fn render_ipv4_hosts(records: &[Record]) -> String {
    let mut out = String::new();
    out.push_str("# Auto-generated DHCP static hosts (IPv4)\n\n");
    for record in records {
        if record.rtype != RecordType::A {
            continue;
        }
        let Some(mac) = &record.mac else { continue };
        for value in &record.values {
            out.push_str(&format!(
                "host {} {{ hardware ethernet {}; fixed-address {}; }}\n",
                fqdn_underscored(record),
                mac,
                value
            ));
        }
    }
    out
}

fn render_ipv6_hosts(records: &[Record]) -> String {
    let mut out = String::new();
    out.push_str("# Auto-generated DHCP static hosts (IPv6)\n\n");
    for record in records {
        if record.rtype != RecordType::Aaaa {
            continue;
        }
        let Some(mac) = &record.mac else { continue };
        for value in &record.values {
            out.push_str(&format!(
                "# host {} {{ hardware ethernet {}; fixed-address {}; }} (IPv6 lease syntax not yet implemented)\n",
                fqdn_underscored(record),
                mac,
                value
            ));
        }
    }
    out
}

/// Emits the IPv4 static-host include-file (if configured+enabled), replacing it only when its
/// content differs and restarting the IPv4 DHCP family only when it was replaced.
pub fn emit_ipv4(transport: &Transport, family: &DhcpFamilyConfig, records: &[Record]) -> Result<bool> {
    emit_family(transport, family, render_ipv4_hosts(records))
}

/// Emits the IPv6 static-host include-file (if configured+enabled). See module docs: this
/// branch's restart is gated on ITS OWN diff result, not the IPv4 branch's.
pub fn emit_ipv6(transport: &Transport, family: &DhcpFamilyConfig, records: &[Record]) -> Result<bool> {
    emit_family(transport, family, render_ipv6_hosts(records))
}

fn emit_family(transport: &Transport, family: &DhcpFamilyConfig, rendered: String) -> Result<bool> {
    if !family.enable {
        return Ok(false);
    }

    let existing = if transport.exists(&family.include_file)? {
        Some(transport.read_all(&family.include_file)?)
    } else {
        None
    };

    if existing.as_deref() == Some(rendered.as_bytes()) {
        tracing::debug!(path = %family.include_file.display(), "DHCP include-file unchanged, skipping");
        return Ok(false);
    }

    transport.write_all(&family.include_file, rendered.as_bytes())?;

    let parts: Vec<String> = family.restart.split_whitespace().map(String::from).collect();
    if !parts.is_empty() {
        transport.run(&parts, DEFAULT_TIMEOUT)?;
    }

    Ok(true)
}
