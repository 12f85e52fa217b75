//! Top-level YAML configuration schema (SPEC_FULL §3/§6, component C12).
//!
//! Deserialized with `serde_yml` through `serde_path_to_error`, reusing the teacher's pattern of
//! extracting a precise `line:column` location out of the underlying deserializer's error text
//! rather than surfacing its raw `Display` output.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{DnsMgrError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub dns_server: DnsServerSection,
    #[serde(default)]
    pub dhcp_server: Option<DhcpServerSection>,
    pub records: Vec<RecordsSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsServerSection {
    pub driver: String,
    #[serde(default)]
    pub enable: Option<bool>,
    pub config: NsManagerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NsManagerConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
    pub includedir: PathBuf,
    pub includefile: String,
    pub tmpdir: PathBuf,
    pub directory: PathBuf,
    pub configfile: PathBuf,
    #[serde(default)]
    pub ignorezones: Vec<String>,
    pub cmd: ServiceCommands,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceCommands {
    pub restart: String,
    pub reload_zone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DhcpServerSection {
    pub driver: String,
    pub enable: bool,
    #[serde(default)]
    pub ipv4: Option<DhcpFamilyConfig>,
    #[serde(default)]
    pub ipv6: Option<DhcpFamilyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DhcpFamilyConfig {
    pub enable: bool,
    pub include_file: PathBuf,
    pub restart: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordsSource {
    pub r#type: String,
    pub name: String,
}

/// Extracts the first `"at line X column Y"` substring out of a `serde_yml` error message, the
/// same rescue the teacher's YAML/TOML loader performs, since neither crate exposes structured
/// line/column fields directly on its error type.
fn extract_location(error_msg: &str) -> String {
    if let Some(pos) = error_msg.find("at line ") {
        let rest = &error_msg[pos..];
        if let Some(newline) = rest.find('\n') {
            return format!(" ({})", rest[..newline].trim());
        }
        let end = rest.len().min(50);
        return format!(" ({})", rest[..end].trim());
    }
    String::new()
}

/// Parses a top-level configuration document, reporting a precise `path: location` diagnostic
/// on failure instead of the raw serde error.
pub fn parse_config(raw: &str) -> Result<Config> {
    let deserializer = serde_yml::Deserializer::from_str(raw);
    let config: Config = serde_path_to_error::deserialize(deserializer).map_err(|e| {
        let inner_err = e.inner().to_string();
        let location = extract_location(&inner_err);
        DnsMgrError::Config(format!(
            "at '{}'{}: {}",
            e.path(),
            location,
            inner_err
        ))
    })?;

    for source in &config.records {
        if source.r#type != "file" {
            return Err(DnsMgrError::Config(format!(
                "unsupported records source type '{}' (only \"file\" is implemented)",
                source.r#type
            )));
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_YAML: &str = r#"
dns_server:
  driver: isc_bind
  config:
    includedir: /etc/bind/include
    includefile: "{zone}"
    tmpdir: /tmp/dnsmgr
    directory: /etc/bind
    configfile: /etc/bind/named.conf
    cmd:
      restart: sudo service bind9 restart
      reload_zone: "sudo /usr/sbin/rndc reload {zone}"
records:
  - type: file
    name: /etc/dnsmgr/records.txt
"#;

    #[test]
    fn parses_minimal_config() {
        let config = parse_config(MINIMAL_YAML).unwrap();
        assert_eq!(config.dns_server.driver, "isc_bind");
        assert_eq!(config.records.len(), 1);
        assert!(config.dhcp_server.is_none());
    }

    #[test]
    fn unknown_records_source_type_is_rejected() {
        let yaml = MINIMAL_YAML.replace("type: file", "type: http");
        let err = parse_config(&yaml).unwrap_err();
        assert!(matches!(err, DnsMgrError::Config(_)));
    }

    #[test]
    fn missing_required_key_reports_location() {
        let yaml = MINIMAL_YAML.replace("driver: isc_bind\n", "");
        let err = parse_config(&yaml).unwrap_err();
        match err {
            DnsMgrError::Config(msg) => assert!(msg.contains("dns_server")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn parses_dhcp_server_section_when_present() {
        let yaml = format!(
            "{MINIMAL_YAML}\ndhcp_server:\n  driver: isc_dhcp\n  enable: true\n  ipv4:\n    enable: true\n    include_file: /etc/dhcp/hosts.conf\n    restart: sudo service isc-dhcp-server restart\n"
        );
        let config = parse_config(&yaml).unwrap();
        let dhcp = config.dhcp_server.unwrap();
        assert!(dhcp.enable);
        assert!(dhcp.ipv4.unwrap().enable);
        assert!(dhcp.ipv6.is_none());
    }
}
