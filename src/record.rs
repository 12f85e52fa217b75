//! Input record model, output RR model, and the coalescing rule between them (SPEC_FULL §3).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{DnsMgrError, Result};

/// Record type recognised by the loader. `A`/`AAAA` values are parsed as addresses; everything
/// else is carried as an opaque string all the way through to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Mx,
    Ns,
    Ptr,
    Srv,
    Sshfp,
    Tlsa,
    Tsig,
    Txt,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Ptr => "PTR",
            RecordType::Srv => "SRV",
            RecordType::Sshfp => "SSHFP",
            RecordType::Tlsa => "TLSA",
            RecordType::Tsig => "TSIG",
            RecordType::Txt => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = DnsMgrError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "CNAME" => RecordType::Cname,
            "MX" => RecordType::Mx,
            "NS" => RecordType::Ns,
            "PTR" => RecordType::Ptr,
            "SRV" => RecordType::Srv,
            "SSHFP" => RecordType::Sshfp,
            "TLSA" => RecordType::Tlsa,
            "TSIG" => RecordType::Tsig,
            "TXT" => RecordType::Txt,
            other => {
                return Err(DnsMgrError::Validation(format!(
                    "unknown record type '{other}'"
                )))
            }
        })
    }
}

/// Per-value options carried by a record line's trailing `;key=val` pairs. Unknown keys are
/// accepted and ignored (the source this is distilled from is lenient here; we preserve that
/// leniency but log it at debug in the loader).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOptions {
    pub mac: Option<String>,
    pub reverse: Option<bool>,
}

/// Parses the truthy/falsy vocabulary shared by `$REVERSE*` directives and `;reverse=` options.
pub fn parse_bool_token(token: &str) -> Result<bool> {
    match token.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "t" | "yes" => Ok(true),
        "off" | "false" | "0" | "f" | "no" => Ok(false),
        other => Err(DnsMgrError::Validation(format!(
            "'{other}' is not a recognised boolean value (expected on/true/1/t/yes or off/false/0/f/no)"
        ))),
    }
}

/// Validates the raw `name` token of a record line. `@` (the zone apex) always passes.
pub fn verify_dnsname(name: &str) -> Result<()> {
    if name == "@" {
        return Ok(());
    }
    if name.is_empty() {
        return Err(DnsMgrError::Validation("DNS name cannot be empty".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Err(DnsMgrError::Validation(format!(
            "DNS name '{name}' contains characters outside [0-9A-Za-z_.-]"
        )));
    }
    Ok(())
}

/// A record as read from the loader, before fan-out into individual RRs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub domain: String,
    pub name: String,
    pub ttl: Option<u32>,
    pub rtype: RecordType,
    pub values: Vec<String>,
    pub mac: Option<String>,
    pub reverse: Option<bool>,
}

impl Record {
    pub fn new(domain: impl Into<String>, name: impl Into<String>, rtype: RecordType) -> Self {
        Record {
            domain: domain.into(),
            name: name.into(),
            ttl: None,
            rtype,
            values: Vec::new(),
            mac: None,
            reverse: None,
        }
    }

    /// Fully qualified name, `name + "." + domain`, collapsing to the bare domain at the apex.
    pub fn fqdn(&self) -> String {
        if self.name == "@" {
            self.domain.clone()
        } else {
            format!("{}.{}", self.name, self.domain)
        }
    }

    /// Whether this record's values should be reflected into a reverse zone as PTRs, given the
    /// loader's current `$REVERSE*` default for this record's type.
    pub fn reverse_enabled(&self, default_for_type: bool) -> bool {
        self.reverse.unwrap_or(default_for_type)
    }

    /// Fans this record out into one RR per value, preserving declaration order.
    pub fn to_rrs(&self) -> Vec<RR> {
        self.values
            .iter()
            .map(|value| RR {
                domain: self.domain.clone(),
                name: self.name.clone(),
                ttl: self.ttl,
                rtype: self.rtype,
                value: value.clone(),
            })
            .collect()
    }
}

/// A single resource record, as it appears in a rendered zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RR {
    pub domain: String,
    pub name: String,
    pub ttl: Option<u32>,
    pub rtype: RecordType,
    pub value: String,
}

impl RR {
    pub fn fqdn(&self) -> String {
        if self.name == "@" {
            self.domain.clone()
        } else {
            format!("{}.{}", self.name, self.domain)
        }
    }
}

/// Coalescing container keyed by `(fqdn, type)`: records sharing a key have their values merged
/// in declaration order, duplicates preserved. Iteration order is first-insertion order.
#[derive(Debug, Default)]
pub struct RecordSet {
    records: Vec<Record>,
    index: HashMap<(String, RecordType), usize>,
}

impl RecordSet {
    pub fn new() -> Self {
        RecordSet::default()
    }

    pub fn add(&mut self, record: Record) {
        let key = (record.fqdn(), record.rtype);
        if let Some(&i) = self.index.get(&key) {
            let existing = &mut self.records[i];
            existing.values.extend(record.values);
            if record.ttl.is_some() {
                existing.ttl = record.ttl;
            }
            if record.mac.is_some() {
                existing.mac = record.mac;
            }
            if record.reverse.is_some() {
                existing.reverse = record.reverse;
            }
        } else {
            self.index.insert(key, self.records.len());
            self.records.push(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn into_vec(self) -> Vec<Record> {
        self.records
    }
}
