//! Stride analytics
//!
//! Read-only dashboard and report exporter over a project-management
//! reporting replica.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use stride_analytics::cli::check::run_check;
use stride_analytics::cli::export::ExportArgs;
use stride_analytics::cli::{Cli, Command, InitDbArgs};
use stride_analytics::config::{Config, ConfigLoader};
use stride_analytics::dashboard::{self, DashboardServer};
use stride_analytics::db::{Database, SqliteSource};
use stride_analytics::logging::{self, LogTarget};
use stride_analytics::report::export::{ReportKind, gzip, render_report};
use stride_analytics::snapshot::SnapshotStore;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    // SAFETY: This is safe at program startup before any other threads are spawned
    if let Some(config_path) = &cli.config {
        unsafe {
            std::env::set_var("STRIDE_ANALYTICS_CONFIG_PATH", config_path);
        }
    }
    let mut loader = ConfigLoader::load()?;
    if let Some(path) = loader.config_path() {
        info!("Using config file {}", path.display());
    }

    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.source.db_path = db_path.into();
    }
    if let Some(org) = &cli.org {
        config.source.organization_id = Some(org.clone());
    }
    if let Some(port) = cli.port {
        config.dashboard.port = port;
    }
    let config = loader.into_config();
    config.validate()?;

    match cli.command {
        Some(Command::Check) => run_check_command(&config),
        Some(Command::Export(args)) => run_export(&config, args),
        Some(Command::InitDb(args)) => run_init_db(&config, args),
        Some(Command::Serve) | None => run_serve(config).await,
    }
}

fn open_source(config: &Config) -> Result<SqliteSource> {
    let path = &config.source.db_path;
    let db = Database::open_read_only(path)
        .with_context(|| format!("failed to open replica at {}", path.display()))?;
    Ok(SqliteSource::new(db, config.source.organization_id.clone())?)
}

fn open_store(config: &Config) -> Result<SnapshotStore> {
    let source = open_source(config)?;
    Ok(SnapshotStore::new(
        Arc::new(source),
        &config.refresh,
        config.reports.sample_rows,
    ))
}

/// Run the check command
fn run_check_command(config: &Config) -> Result<()> {
    let source = open_source(config)?;
    let report = run_check(&source);
    print!("{}", report.render());
    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}

/// Run the export command
fn run_export(config: &Config, args: ExportArgs) -> Result<()> {
    let kind: ReportKind = args.report.parse()?;
    let store = open_store(config)?;
    let bytes = render_report(&store, kind, &args.filter_params(), &config.reports, Utc::now())?;

    let should_compress = args.should_compress(Some(bytes.len() as u64));
    let output = if should_compress { gzip(&bytes)? } else { bytes };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        if should_compress {
            eprintln!("Exported {} to {} (gzipped)", kind, path.display());
        } else {
            eprintln!("Exported {} to {}", kind, path.display());
        }
    } else {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(&output)?;
        lock.flush()?;
    }

    Ok(())
}

/// Run the init-db command
fn run_init_db(config: &Config, args: InitDbArgs) -> Result<()> {
    let path = args.path.unwrap_or_else(|| config.source.db_path.clone());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Database::init(&path).with_context(|| format!("failed to initialize {}", path.display()))?;
    eprintln!("Initialized reporting database at {}", display_path(&path));
    Ok(())
}

fn display_path(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Serve the dashboard until Ctrl-C.
async fn run_serve(config: Config) -> Result<()> {
    let config = Arc::new(config);
    let store = Arc::new(open_store(&config)?);
    let state = DashboardServer::new(store, Arc::clone(&config))?;

    let handle = dashboard::start_server_with_retry(state);
    info!(
        "Starting dashboard on {}:{}",
        config.dashboard.bind, config.dashboard.port
    );

    tokio::signal::ctrl_c().await?;
    info!(status = ?handle.status(), "Shutting down");
    handle.shutdown();
    Ok(())
}
