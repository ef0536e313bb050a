//! Attendee sync - attendee exports to CRM registration/attendance events
//!
//! Module structure:
//! - `domain/` - Core types (Attendee, DomainEvent, PublishOutcome)
//! - `io/` - External interfaces (CRM client, progress stream, HTTP server, CSV)
//! - `services/` - Pipeline stages and batch orchestration
//! - `infra/` - Infrastructure (Config, errors)

use anyhow::Context;
use attendee_sync::domain::{ColumnMapping, EventSettings};
use attendee_sync::infra::{Config, CrmEnvironment};
use attendee_sync::io::csv_source::read_records;
use attendee_sync::io::server::start_server;
use attendee_sync::io::WriterSink;
use attendee_sync::services::{ImportRequest, Importer};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Attendee sync - push attendee registrations and attendance to the CRM
#[derive(Parser, Debug)]
#[command(name = "attendee-sync", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP import endpoint
    Serve,
    /// Import a CSV file and write progress lines to stdout
    Import(ImportArgs),
}

#[derive(clap::Args, Debug)]
struct ImportArgs {
    /// CSV file with a header row
    #[arg(short, long)]
    input: PathBuf,

    /// JSON column mapping, e.g. {"email": "Email", "status": "Status"}
    #[arg(short, long)]
    mapping: PathBuf,

    #[arg(long)]
    event_name: Option<String>,

    #[arg(long)]
    event_date: Option<String>,

    #[arg(long)]
    event_time: Option<String>,

    #[arg(long)]
    presenter: Option<String>,

    /// live or sandbox (default from config)
    #[arg(long)]
    environment: Option<CrmEnvironment>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the progress stream for `import`
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(|| Config::resolve_config_path(&[]));
    let config = Config::load_from_path(&config_path);

    info!(
        git_hash = %env!("GIT_HASH"),
        config_file = %config.config_file(),
        crm_base_url = %config.crm_base_url(),
        default_environment = %config.default_environment(),
        settle_delay_ms = %config.settle_delay().as_millis(),
        inter_event_delay_ms = %config.inter_event_delay().as_millis(),
        "config_loaded"
    );

    match args.command {
        Command::Serve => serve(config).await,
        Command::Import(import) => import_file(config, import).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    start_server(Arc::new(Importer::new(config)), shutdown_rx).await?;
    info!("attendee-sync shutdown complete");
    Ok(())
}

async fn import_file(config: Config, args: ImportArgs) -> anyhow::Result<()> {
    let records = read_records(&args.input)?;

    let mapping_json = std::fs::read_to_string(&args.mapping)
        .with_context(|| format!("Failed to read mapping file {}", args.mapping.display()))?;
    let mapping: ColumnMapping = serde_json::from_str(&mapping_json)
        .with_context(|| format!("Failed to parse mapping file {}", args.mapping.display()))?;

    let request = ImportRequest {
        records,
        mapping,
        event_settings: EventSettings {
            event_name: args.event_name,
            event_date: args.event_date,
            event_time: args.event_time,
            presenter: args.presenter,
        },
        environment: args.environment,
    };

    let importer = Importer::new(config);
    importer.run(request, WriterSink::new(tokio::io::stdout())).await;
    Ok(())
}
