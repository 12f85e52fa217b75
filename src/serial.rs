//! Locates, validates, and advances the ten-digit `YYYYMMDDxx` SOA serial embedded in a
//! `"; Serial"`-tagged comment line of an authoritative zone file (SPEC_FULL §4.7).
//!
//! All-or-nothing per zone: any failure aborts before the authoritative file is touched.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{DnsMgrError, Result};
use crate::transport::{Transport, DEFAULT_TIMEOUT};

const SERIAL_WIDTH: usize = 10;
const SERIAL_TAG: &str = "; serial";

/// Locates the last `"; serial"`-suffixed line (case-insensitive) in `content` and returns the
/// byte range of its ten-digit serial field.
fn find_serial_field(content: &str) -> Result<(usize, usize)> {
    let mut found: Option<(usize, usize)> = None;

    let mut offset = 0usize;
    for raw_line in content.split_inclusive('\n') {
        let trimmed_len = raw_line.trim_end().len();
        let trimmed = &raw_line[..trimmed_len];

        if trimmed.len() >= SERIAL_TAG.len()
            && trimmed[trimmed.len() - SERIAL_TAG.len()..].eq_ignore_ascii_case(SERIAL_TAG)
        {
            let tag_start = trimmed.len() - SERIAL_TAG.len();
            let before = trimmed[..tag_start].trim_end();
            let digits_end = before.len();

            if digits_end >= SERIAL_WIDTH {
                let digits_start = digits_end - SERIAL_WIDTH;
                let candidate = &before[digits_start..digits_end];
                let preceded_by_digit = digits_start > 0
                    && before.as_bytes()[digits_start - 1].is_ascii_digit();

                if candidate.bytes().all(|b| b.is_ascii_digit()) && !preceded_by_digit {
                    found = Some((offset + digits_start, offset + digits_end));
                }
            }
        }

        offset += raw_line.len();
    }

    found.ok_or_else(|| {
        DnsMgrError::serial(
            PathBuf::new(),
            "no ten-digit serial field found before a \"; Serial\" line",
        )
    })
}

fn parse_serial(field: &str) -> Result<(NaiveDate, u32)> {
    let (date_str, seq_str) = field.split_at(8);
    let date = NaiveDate::parse_from_str(date_str, "%Y%m%d")
        .map_err(|_| DnsMgrError::serial(PathBuf::new(), format!("'{date_str}' is not a valid YYYYMMDD date")))?;
    let seq: u32 = seq_str
        .parse()
        .map_err(|_| DnsMgrError::serial(PathBuf::new(), format!("'{seq_str}' is not a valid sequence number")))?;
    Ok((date, seq))
}

/// Advance rule of §4.7 step 5.
fn advance(date: NaiveDate, seq: u32, today: NaiveDate) -> (NaiveDate, u32) {
    if today > date {
        (today, 0)
    } else if seq >= 99 {
        (date + chrono::Duration::days(1), 0)
    } else {
        (date, seq + 1)
    }
}

/// Computes the patched file content (with the serial field advanced) without touching any
/// transport — used directly by tests and by `advance_zone_serial` below.
fn patch_content(content: &str, today: NaiveDate) -> Result<String> {
    let (start, end) = find_serial_field(content)?;
    let field = &content[start..end];
    let (date, seq) = parse_serial(field)?;
    let (new_date, new_seq) = advance(date, seq, today);
    let new_field = format!("{}{:02}", new_date.format("%Y%m%d"), new_seq);
    debug_assert_eq!(new_field.len(), SERIAL_WIDTH);

    let mut patched = String::with_capacity(content.len());
    patched.push_str(&content[..start]);
    patched.push_str(&new_field);
    patched.push_str(&content[end..]);
    Ok(patched)
}

/// Pulls `zone_file` through `transport`, advances its SOA serial (all-or-nothing), and pushes
/// the result back via `tmp_dir` as a local staging area (§4.7 steps 1-7).
pub fn advance_zone_serial(
    transport: &Transport,
    zone_file: &Path,
    tmp_dir: &Path,
    today: NaiveDate,
) -> Result<()> {
    let local = Transport::local();

    let original = transport.read_all(zone_file).map_err(|e| {
        DnsMgrError::serial(zone_file, format!("failed to fetch zone file: {e}"))
    })?;
    let original_text = String::from_utf8(original.clone())
        .map_err(|_| DnsMgrError::serial(zone_file, "zone file is not valid UTF-8"))?;

    let file_name = zone_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "zone".to_string());
    let tmp_path = tmp_dir.join(format!("{file_name}.serial.tmp"));

    local.write_all(&tmp_path, &original).map_err(|e| {
        DnsMgrError::serial(zone_file, format!("failed to stage local copy: {e}"))
    })?;

    let source_checksum = transport.sha256(zone_file)?;
    let staged_checksum = local.sha256(&tmp_path)?;
    if source_checksum != staged_checksum {
        return Err(DnsMgrError::serial(
            zone_file,
            "checksum mismatch between authoritative file and staged local copy",
        ));
    }

    let patched_text = patch_content(&original_text, today).map_err(|e| match e {
        DnsMgrError::Serial { message, .. } => DnsMgrError::serial(zone_file, message),
        other => other,
    })?;
    let patched = patched_text.into_bytes();

    local.write_all(&tmp_path, &patched).map_err(|e| {
        DnsMgrError::serial(zone_file, format!("failed to write patched copy: {e}"))
    })?;

    if transport.is_remote() {
        let remote_tmp = tmp_dir.join(format!("{file_name}.serial.push"));
        transport.write_all(&remote_tmp, &patched)?;

        let pushed_checksum = transport.sha256(&remote_tmp)?;
        let staged_patched_checksum = local.sha256(&tmp_path)?;
        if pushed_checksum != staged_patched_checksum {
            return Err(DnsMgrError::serial(
                zone_file,
                "checksum mismatch after pushing patched copy to remote",
            ));
        }

        let orig_size = transport.stat_size(zone_file)?;
        let new_size = transport.stat_size(&remote_tmp)?;
        if orig_size != new_size {
            return Err(DnsMgrError::serial(
                zone_file,
                "size mismatch between original and patched zone file",
            ));
        }

        transport.cp_force(&remote_tmp, zone_file)?;
    } else {
        let orig_size = transport.stat_size(zone_file)?;
        let new_size = local.stat_size(&tmp_path)?;
        if orig_size != new_size {
            return Err(DnsMgrError::serial(
                zone_file,
                "size mismatch between original and patched zone file",
            ));
        }

        transport.cp_force(&tmp_path, zone_file)?;
    }

    Ok(())
}

/// Invokes the configured `reload_zone` command with `{zone}` substituted, per §4.7 step 8.
pub fn invoke_reload(transport: &Transport, reload_cmd_template: &str, zone_name: &str) -> Result<()> {
    let substituted = reload_cmd_template.replace("{zone}", zone_name);
    let parts: Vec<String> = substituted.split_whitespace().map(String::from).collect();
    transport.run(&parts, DEFAULT_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn advance_increments_sequence_within_same_day() {
        let (d, s) = advance(date(2024, 1, 1), 99 - 98, date(2024, 1, 1));
        assert_eq!(d, date(2024, 1, 1));
        assert_eq!(s, 2);
    }

    #[test]
    fn advance_resets_to_today_when_date_is_in_the_past() {
        let (d, s) = advance(date(2024, 1, 7), 5, date(2024, 1, 9));
        assert_eq!(d, date(2024, 1, 9));
        assert_eq!(s, 0);
    }

    #[test]
    fn advance_rolls_to_next_day_when_sequence_saturates() {
        let (d, s) = advance(date(2024, 1, 1), 99, date(2024, 1, 1));
        assert_eq!(d, date(2024, 1, 2));
        assert_eq!(s, 0);
    }

    #[test]
    fn serial_2024010199_advances_to_2024010200() {
        let content = "  2024010199  ; Serial\n";
        let patched = patch_content(content, date(2024, 1, 1)).unwrap();
        assert!(patched.contains("2024010200"));
        assert_eq!(patched.len(), content.len());
    }

    #[test]
    fn scenario_serial_past_date_resets_preserving_byte_length() {
        let content = "                        2024010107  ; Serial\n";
        let patched = patch_content(content, date(2024, 1, 9)).unwrap();
        assert!(patched.contains("2024010900"));
        assert_eq!(patched.len(), content.len());
    }

    #[test]
    fn finds_last_matching_line_when_multiple_exist() {
        let content = "; not a serial line\n1111111111  ; serial\n2222222222  ; Serial\n";
        let (start, end) = find_serial_field(content).unwrap();
        assert_eq!(&content[start..end], "2222222222");
    }

    #[test]
    fn missing_serial_tag_is_an_error() {
        let content = "no serial line here\n";
        let err = find_serial_field(content).unwrap_err();
        assert!(matches!(err, DnsMgrError::Serial { .. }));
    }

    #[test]
    fn invalid_date_in_serial_field_is_an_error() {
        let content = "  9999999999  ; Serial\n";
        let err = patch_content(content, date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, DnsMgrError::Serial { .. }));
    }

    #[test]
    fn advance_zone_serial_round_trips_locally() {
        let dir = tempfile::tempdir().unwrap();
        let zone_path = dir.path().join("example.com.zone");
        std::fs::write(&zone_path, "@  IN  SOA  ns1. hostmaster. (\n  2024010107  ; Serial\n  3600\n)\n").unwrap();

        let transport = Transport::local();
        advance_zone_serial(&transport, &zone_path, dir.path(), date(2024, 1, 9)).unwrap();

        let updated = std::fs::read_to_string(&zone_path).unwrap();
        assert!(updated.contains("2024010900"));
    }
}
