//! Orchestrates discover → index → route → render → diff → replace → reload (SPEC_FULL §4.8).
//!
//! `ReconcileContext` threads the `Transport` and `NsManagerConfig` explicitly instead of the
//! module-global `logging`/`current_loader_domain` state the source this is distilled from used
//! (SPEC_FULL §9 Design Notes).

use chrono::Local;

use crate::config::NsManagerConfig;
use crate::config_parser::parse_config_file;
use crate::error::{DnsMgrError, Result};
use crate::record::RecordSet;
use crate::render::render_zone;
use crate::router::route_record;
use crate::serial::{advance_zone_serial, invoke_reload};
use crate::transport::{Transport, DEFAULT_TIMEOUT};
use crate::zone::{Zone, Zones};

/// Threads the transport and nameserver configuration through a single reconciliation run,
/// replacing the module-global state of the system this was distilled from.
pub struct ReconcileContext {
    pub transport: Transport,
    pub config: NsManagerConfig,
}

impl ReconcileContext {
    pub fn new(transport: Transport, config: NsManagerConfig) -> Self {
        ReconcileContext { transport, config }
    }

    fn include_path(&self, zone_name: &str) -> std::path::PathBuf {
        let file_name = self.config.includefile.replace("{zone}", zone_name);
        self.config.includedir.join(file_name)
    }

    /// `update_dns(records)`: discovers zones, routes every record (fanning out over values and
    /// synthesising reverse PTRs), renders each zone in deterministic order, and replaces +
    /// advances the serial + reloads only the zones whose rendered content changed.
    pub fn update_dns(&self, records: RecordSet) -> Result<ReconcileSummary> {
        let zone_infos = parse_config_file(
            &self.config.configfile,
            &self.config.directory,
            &self.config.ignorezones,
        )?;
        let mut zones = Zones::build(zone_infos)?;

        for record in records.iter() {
            route_record(&mut zones, record);
        }

        let mut summary = ReconcileSummary::default();
        let today = Local::now().date_naive();

        for zone in zones.forward.iter().chain(zones.reverse4.iter()).chain(zones.reverse6.iter()) {
            self.reconcile_zone(zone, today, &mut summary)?;
        }

        Ok(summary)
    }

    fn reconcile_zone(
        &self,
        zone: &Zone,
        today: chrono::NaiveDate,
        summary: &mut ReconcileSummary,
    ) -> Result<()> {
        let include_path = self.include_path(&zone.name);
        let rendered = render_zone(zone, &include_path.to_string_lossy());

        let existing = if self.transport.exists(&include_path)? {
            Some(self.transport.read_all(&include_path)?)
        } else {
            None
        };

        if existing.as_deref() == Some(rendered.as_bytes()) {
            tracing::debug!(zone = %zone.name, "include-file unchanged, skipping");
            summary.unchanged.push(zone.name.clone());
            return Ok(());
        }

        tracing::info!(zone = %zone.name, path = %include_path.display(), "include-file changed, replacing");

        let tmp_path = self
            .config
            .tmpdir
            .join(format!("{}.include.tmp", zone.name));
        self.transport.write_all(&tmp_path, rendered.as_bytes())?;
        self.transport.move_file(&tmp_path, &include_path)?;

        advance_zone_serial(&self.transport, &zone.backing_file, &self.config.tmpdir, today)?;
        invoke_reload(&self.transport, &self.config.cmd.reload_zone, &zone.name)?;

        summary.replaced.push(zone.name.clone());
        Ok(())
    }

    /// `restart()`: invokes the configured nameserver restart command verbatim.
    pub fn restart(&self) -> Result<()> {
        let parts: Vec<String> = self
            .config
            .cmd
            .restart
            .split_whitespace()
            .map(String::from)
            .collect();
        if parts.is_empty() {
            return Err(DnsMgrError::Config("restart command is empty".into()));
        }
        self.transport.run(&parts, DEFAULT_TIMEOUT)
    }
}

/// Per-run bookkeeping surfaced to the CLI for diagnostics.
#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub unchanged: Vec<String>,
    pub replaced: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceCommands;
    use crate::record::{Record, RecordType};
    use std::io::Write;
    use std::path::PathBuf;

    fn write_file(path: &std::path::Path, content: &str) {
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    fn base_config(dir: &std::path::Path) -> NsManagerConfig {
        NsManagerConfig {
            host: None,
            port: None,
            includedir: dir.join("include"),
            includefile: "{zone}".to_string(),
            tmpdir: dir.join("tmp"),
            directory: dir.to_path_buf(),
            configfile: dir.join("named.conf"),
            ignorezones: vec![],
            cmd: ServiceCommands {
                restart: "true".to_string(),
                reload_zone: "true {zone}".to_string(),
            },
        }
    }

    #[test]
    fn first_run_creates_include_file_and_advances_serial() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("include")).unwrap();
        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();

        let zone_file = dir.path().join("example.com.zone");
        write_file(
            &zone_file,
            "@  IN  SOA  ns1. hostmaster. (\n  2024010107  ; Serial\n  3600\n)\n",
        );

        write_file(
            &dir.path().join("named.conf"),
            &format!(
                "zone \"example.com\" {{ type master; file \"{}\"; }};",
                zone_file.display()
            ),
        );

        let ctx = ReconcileContext::new(Transport::local(), base_config(dir.path()));

        let mut records = RecordSet::new();
        let mut rec = Record::new("example.com", "www", RecordType::A);
        rec.values.push("192.0.2.5".into());
        rec.reverse = Some(false);
        records.add(rec);

        let summary = ctx.update_dns(records).unwrap();
        assert_eq!(summary.replaced, vec!["example.com".to_string()]);

        let include_content =
            std::fs::read_to_string(dir.path().join("include").join("example.com")).unwrap();
        assert!(include_content.contains("www"));

        let zone_content = std::fs::read_to_string(&zone_file).unwrap();
        assert!(!zone_content.contains("2024010107"));
    }

    #[test]
    fn second_run_with_unchanged_records_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("include")).unwrap();
        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();

        let zone_file = dir.path().join("example.com.zone");
        write_file(
            &zone_file,
            "@  IN  SOA  ns1. hostmaster. (\n  2024010107  ; Serial\n  3600\n)\n",
        );
        write_file(
            &dir.path().join("named.conf"),
            &format!(
                "zone \"example.com\" {{ type master; file \"{}\"; }};",
                zone_file.display()
            ),
        );

        let ctx = ReconcileContext::new(Transport::local(), base_config(dir.path()));

        let mut records = RecordSet::new();
        let mut rec = Record::new("example.com", "www", RecordType::A);
        rec.values.push("192.0.2.5".into());
        rec.reverse = Some(false);
        records.add(rec);

        ctx.update_dns(records.iter().cloned().fold(RecordSet::new(), |mut s, r| {
            s.add(r);
            s
        }))
        .unwrap();

        let zone_content_after_first = std::fs::read_to_string(&zone_file).unwrap();

        let mut records2 = RecordSet::new();
        let mut rec2 = Record::new("example.com", "www", RecordType::A);
        rec2.values.push("192.0.2.5".into());
        rec2.reverse = Some(false);
        records2.add(rec2);

        let summary = ctx.update_dns(records2).unwrap();
        assert_eq!(summary.unchanged, vec!["example.com".to_string()]);
        assert!(summary.replaced.is_empty());

        let zone_content_after_second = std::fs::read_to_string(&zone_file).unwrap();
        assert_eq!(zone_content_after_first, zone_content_after_second);
    }

    #[test]
    fn zone_with_no_matching_config_path_is_missing_produces_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ReconcileContext::new(Transport::local(), base_config(dir.path()));
        let err = ctx.update_dns(RecordSet::new()).unwrap_err();
        assert!(matches!(err, DnsMgrError::Parse { .. }));
    }
}
