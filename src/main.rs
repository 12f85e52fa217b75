use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zonekeeper::config::{self, Config};
use zonekeeper::config_parser::parse_config_file;
use zonekeeper::dhcp;
use zonekeeper::error::DnsMgrError;
use zonekeeper::loader::load_records_file;
use zonekeeper::reconciler::ReconcileContext;
use zonekeeper::transport::{Remote, Transport};

const DEFAULT_CONFIG_PATH: &str = "/etc/dnsmgr/dnsmgr.conf";

#[derive(Parser)]
#[command(name = "zonekeeper", about = "Reconciles declarative DNS records into BIND zone include-files", version)]
struct Cli {
    /// Path to the top-level YAML configuration file
    #[arg(short = 'c', long = "config", global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long = "log-level", global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load records, reconcile DNS zones, and emit DHCP static hosts if configured
    Update,
    /// Print the zones discovered in the name-server configuration
    Getzones,
    /// Restart the configured name server
    Restart,
    /// Parse the records file and print the canonical record set
    Load,
    /// Reserved; not implemented
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            match err.downcast_ref::<DnsMgrError>() {
                Some(DnsMgrError::Config(_)) => ExitCode::from(1),
                _ => ExitCode::from(2),
            }
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&cli.config)
        .map_err(|e| DnsMgrError::Config(format!("cannot read '{}': {e}", cli.config.display())))?;
    let config: Config = config::parse_config(&raw)?;

    match cli.command {
        Command::Update => cmd_update(&config),
        Command::Getzones => cmd_getzones(&config),
        Command::Restart => cmd_restart(&config),
        Command::Load => cmd_load(&config),
        Command::Status => {
            println!("not implemented");
            Ok(())
        }
    }
}

fn transport_for(config: &Config) -> Transport {
    match &config.dns_server.config.host {
        Some(host) => Transport::remote(Remote {
            host: host.clone(),
            port: config.dns_server.config.port.clone(),
        }),
        None => Transport::local(),
    }
}

fn records_source_path(config: &Config) -> anyhow::Result<PathBuf> {
    let source = config
        .records
        .first()
        .ok_or_else(|| DnsMgrError::Config("no records source configured".into()))?;
    Ok(PathBuf::from(&source.name))
}

fn cmd_update(config: &Config) -> anyhow::Result<()> {
    let path = records_source_path(config)?;
    let record_set = load_records_file(&path)?;
    let dhcp_records: Vec<_> = record_set.iter().cloned().collect();

    let ctx = ReconcileContext::new(transport_for(config), config.dns_server.config.clone());
    let summary = ctx.update_dns(record_set)?;
    tracing::info!(
        replaced = summary.replaced.len(),
        unchanged = summary.unchanged.len(),
        "reconciliation complete"
    );

    if let Some(dhcp_section) = &config.dhcp_server {
        if dhcp_section.enable {
            let transport = transport_for(config);
            if let Some(ipv4) = &dhcp_section.ipv4 {
                dhcp::emit_ipv4(&transport, ipv4, &dhcp_records)?;
            }
            if let Some(ipv6) = &dhcp_section.ipv6 {
                dhcp::emit_ipv6(&transport, ipv6, &dhcp_records)?;
            }
        }
    }

    Ok(())
}

fn cmd_getzones(config: &Config) -> anyhow::Result<()> {
    let ns_config = &config.dns_server.config;
    let zones = parse_config_file(&ns_config.configfile, &ns_config.directory, &ns_config.ignorezones)?;
    for zone in zones {
        println!("{:<30} {:<8} {}", zone.name, zone.kind, zone.file.display());
    }
    Ok(())
}

fn cmd_restart(config: &Config) -> anyhow::Result<()> {
    let ctx = ReconcileContext::new(transport_for(config), config.dns_server.config.clone());
    ctx.restart()?;
    Ok(())
}

fn cmd_load(config: &Config) -> anyhow::Result<()> {
    let path = records_source_path(config)?;
    let record_set = load_records_file(&path)?;

    for record in record_set.iter() {
        let ttl = record.ttl.map(|t| t.to_string()).unwrap_or_default();
        for value in &record.values {
            print!(
                "{:<30} {:<5} {:<8} {}",
                record.fqdn(),
                ttl,
                record.rtype,
                value
            );
            println!("        reverse={}", record.reverse_enabled(true));
            if let Some(mac) = &record.mac {
                println!("  mac={mac}");
            }
        }
    }

    Ok(())
}
