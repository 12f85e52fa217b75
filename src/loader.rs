//! Parses the records file grammar of SPEC_FULL §4.4 into a canonical `RecordSet`.
//!
//! A low-level line tokenizer (`parse_line`) feeds a stateful accumulator (`Loader`) that owns
//! the current `$DOMAIN`/`$REVERSE*` defaults, analogous to the teacher's split between a raw
//! parser and a higher-level transform pass.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{DnsMgrError, Result};
use crate::record::{parse_bool_token, verify_dnsname, Record, RecordOptions, RecordSet, RecordType};

/// One line's worth of parsed content.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Blank,
    SetDomain(String),
    Include(String),
    SetReverse(Option<RecordTypeFamily>, bool),
    Record {
        name: String,
        ttl: Option<u32>,
        rtype: RecordType,
        value: String,
        options: RecordOptions,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordTypeFamily {
    V4,
    V6,
}

fn parse_line(raw: &str) -> Result<Line> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        return Ok(Line::Blank);
    }

    if let Some(rest) = line.strip_prefix('$') {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let directive = parts.next().unwrap_or_default();
        let arg = parts.next().unwrap_or_default().trim();

        return match directive.to_ascii_uppercase().as_str() {
            "DOMAIN" => Ok(Line::SetDomain(arg.to_string())),
            "INCLUDE" => Ok(Line::Include(arg.to_string())),
            "REVERSE" => Ok(Line::SetReverse(None, parse_bool_token(arg)?)),
            "REVERSE4" => Ok(Line::SetReverse(Some(RecordTypeFamily::V4), parse_bool_token(arg)?)),
            "REVERSE6" => Ok(Line::SetReverse(Some(RecordTypeFamily::V6), parse_bool_token(arg)?)),
            other => Err(DnsMgrError::Validation(format!(
                "unknown directive '${other}'"
            ))),
        };
    }

    // Split off any trailing `;key=val ...` options block first.
    let (body, options_str) = match line.find(';') {
        Some(idx) => (&line[..idx], Some(line[idx + 1..].trim())),
        None => (line, None),
    };

    let mut fields = body.split_whitespace();
    let name = fields
        .next()
        .ok_or_else(|| DnsMgrError::Validation("record line has no name field".into()))?;
    verify_dnsname(name)?;

    let next = fields
        .next()
        .ok_or_else(|| DnsMgrError::Validation(format!("record line for '{name}' has no type/ttl field")))?;

    let (ttl, type_token) = if next.chars().all(|c| c.is_ascii_digit()) && !next.is_empty() {
        let ttl: u32 = next
            .parse()
            .map_err(|_| DnsMgrError::Validation(format!("invalid ttl '{next}'")))?;
        let rtype_token = fields
            .next()
            .ok_or_else(|| DnsMgrError::Validation(format!("record line for '{name}' has no type field")))?;
        (Some(ttl), rtype_token)
    } else {
        (None, next)
    };

    let rtype: RecordType = type_token.parse()?;

    let value = fields
        .next()
        .ok_or_else(|| DnsMgrError::Validation(format!("record line for '{name}' has no value field")))?
        .to_string();

    match rtype {
        RecordType::A => {
            Ipv4Addr::from_str(&value).map_err(|_| {
                DnsMgrError::Validation(format!("'{value}' is not a valid IPv4 address"))
            })?;
        }
        RecordType::Aaaa => {
            Ipv6Addr::from_str(&value).map_err(|_| {
                DnsMgrError::Validation(format!("'{value}' is not a valid IPv6 address"))
            })?;
        }
        _ => {}
    }

    if fields.next().is_some() {
        return Err(DnsMgrError::Validation(format!(
            "record line for '{name}' has trailing fields after the value"
        )));
    }

    let options = parse_options(options_str)?;

    Ok(Line::Record {
        name: name.to_string(),
        ttl,
        rtype,
        value,
        options,
    })
}

fn parse_options(raw: Option<&str>) -> Result<RecordOptions> {
    let mut options = RecordOptions::default();
    let Some(raw) = raw else {
        return Ok(options);
    };

    for token in raw.split_whitespace() {
        let Some((key, val)) = token.split_once('=') else {
            continue;
        };
        match key {
            "mac" => options.mac = Some(val.to_string()),
            "reverse" => options.reverse = Some(parse_bool_token(val)?),
            _ => {
                tracing::debug!(key, val, "ignoring unrecognised record option");
            }
        }
    }

    Ok(options)
}

/// Stateful accumulator that owns the current `$DOMAIN`/`$REVERSE*` defaults while folding
/// lines (including recursive `$INCLUDE`s) into a single coalescing `RecordSet`.
pub struct Loader {
    domain: Option<String>,
    reverse_default: bool,
    reverse4_default: Option<bool>,
    reverse6_default: Option<bool>,
    records: RecordSet,
}

impl Loader {
    pub fn new() -> Self {
        Loader {
            domain: None,
            reverse_default: true,
            reverse4_default: None,
            reverse6_default: None,
            records: RecordSet::new(),
        }
    }

    /// Loads a records file (and any files it `$INCLUDE`s, resolved relative to `base_dir`)
    /// into this loader's accumulating `RecordSet`.
    pub fn load_file(&mut self, path: &Path, base_dir: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DnsMgrError::parse(path.to_string_lossy(), format!("cannot read: {e}")))?;

        for (lineno, raw) in text.lines().enumerate() {
            let parsed = parse_line(raw).map_err(|e| match e {
                DnsMgrError::Validation(msg) => DnsMgrError::parse(
                    path.to_string_lossy(),
                    format!("line {}: {msg}", lineno + 1),
                ),
                other => other,
            })?;

            match parsed {
                Line::Blank => {}
                Line::SetDomain(domain) => self.domain = Some(domain),
                Line::Include(inc) => {
                    let inc_path = resolve_path(&inc, base_dir);
                    self.load_file(&inc_path, base_dir)?;
                }
                Line::SetReverse(None, value) => self.reverse_default = value,
                Line::SetReverse(Some(RecordTypeFamily::V4), value) => {
                    self.reverse4_default = Some(value)
                }
                Line::SetReverse(Some(RecordTypeFamily::V6), value) => {
                    self.reverse6_default = Some(value)
                }
                Line::Record {
                    name,
                    ttl,
                    rtype,
                    value,
                    options,
                } => {
                    let domain = self.domain.clone().ok_or_else(|| {
                        DnsMgrError::parse(
                            path.to_string_lossy(),
                            format!("line {}: record before any $DOMAIN directive", lineno + 1),
                        )
                    })?;

                    let default_reverse = match rtype {
                        RecordType::A => self.reverse4_default.unwrap_or(self.reverse_default),
                        RecordType::Aaaa => self.reverse6_default.unwrap_or(self.reverse_default),
                        _ => self.reverse_default,
                    };

                    let mut record = Record::new(domain, name, rtype);
                    record.ttl = ttl;
                    record.values.push(value);
                    record.mac = options.mac;
                    record.reverse = Some(options.reverse.unwrap_or(default_reverse));

                    self.records.add(record);
                }
            }
        }

        Ok(())
    }

    pub fn into_record_set(self) -> RecordSet {
        self.records
    }
}

impl Default for Loader {
    fn default() -> Self {
        Loader::new()
    }
}

fn resolve_path(raw: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(raw);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// Convenience entry point: loads a single records file (and its includes) into a fresh
/// `RecordSet`.
pub fn load_records_file(path: &Path) -> Result<RecordSet> {
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut loader = Loader::new();
    loader.load_file(path, base_dir)?;
    Ok(loader.into_record_set())
}
