use anyhow::{Context, Result};
use chart_durability::chart::Week;
use chart_durability::config::{AppConfig, CliConfig, FileConfig};
use chart_durability::fetch::{FileDiagnosticsSink, HttpChartFetcher};
use chart_durability::ingestion::IngestionOrchestrator;
use chart_durability::metrics::{Bucket, MetricsEngine};
use chart_durability::report::{build_report, write_report};
use chart_durability::snapshot_store::{SnapshotStore, SqliteSnapshotStore};
use chart_durability::status::status;
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[clap(name = "chart-durability", about = "Weekly chart snapshots and durability metrics")]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite snapshot database.
    #[clap(long, global = true, value_parser = parse_path)]
    pub db: Option<PathBuf>,

    /// Directory for raw payloads of failed fetches.
    #[clap(long, global = true, value_parser = parse_path)]
    pub debug_dir: Option<PathBuf>,

    /// Directory the JSON report is written to.
    #[clap(long, global = true, value_parser = parse_path)]
    pub output_dir: Option<PathBuf>,

    /// Fetch all charts concurrently.
    #[clap(long, global = true)]
    pub parallel_fetch: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or validate the snapshot database.
    InitDb,
    /// Fetch every configured chart and record one snapshot per chart.
    Ingest(WeekArgs),
    /// Compute durability metrics and print a per-chart summary.
    Compute(WeekArgs),
    /// Write the JSON report for the renderer.
    Report(WeekArgs),
    /// Show snapshot and metric state per chart.
    Status(WeekArgs),
    /// init-db, ingest, compute and report in one go.
    RunAll(WeekArgs),
}

#[derive(Args, Debug)]
struct WeekArgs {
    /// Any date (YYYY-MM-DD) in the target week.
    #[clap(long)]
    pub week: Option<String>,
}

fn parse_week_arg(raw: &str) -> Result<Week> {
    let (week, shifted) = Week::parse_normalizing(raw)?;
    if shifted {
        warn!("{} is not a Monday; using week {}", raw, week);
    }
    Ok(week)
}

/// Explicit week, or the current week.
fn ingest_week(args: &WeekArgs) -> Result<Week> {
    match &args.week {
        Some(raw) => parse_week_arg(raw),
        None => Ok(Week::current()),
    }
}

/// Explicit week, or the latest week with any snapshot.
fn through_week(args: &WeekArgs, store: &dyn SnapshotStore) -> Result<Week> {
    match &args.week {
        Some(raw) => parse_week_arg(raw),
        None => Ok(store.latest_week()?.unwrap_or_else(Week::current)),
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<SqliteSnapshotStore>> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }
    }
    let store = SqliteSnapshotStore::new(&config.db_path)
        .with_context(|| format!("Failed to open snapshot database {:?}", config.db_path))?;
    Ok(Arc::new(store))
}

fn run_init_db(config: &AppConfig) -> Result<()> {
    open_store(config)?;
    println!("Database initialized at {}", config.db_path.display());
    Ok(())
}

fn run_ingest(config: &AppConfig, args: &WeekArgs) -> Result<()> {
    let week = ingest_week(args)?;
    let store = open_store(config)?;
    let fetcher = HttpChartFetcher::new(config.fetch.clone())?;
    let orchestrator = IngestionOrchestrator::new(
        Arc::new(fetcher),
        store,
        Arc::new(FileDiagnosticsSink::new(&config.debug_dir)),
    )
    .with_parallel_fetch(config.parallel_fetch);

    let report = orchestrator.ingest(&config.charts, week);
    for (chart, outcome) in &report.outcomes {
        println!("{}: {}", chart, outcome);
    }
    println!(
        "Ingest complete for week {} ({} ok, {} not ok)",
        week,
        report.ok_count(),
        report.failed_count()
    );
    Ok(())
}

fn run_compute(config: &AppConfig, args: &WeekArgs) -> Result<()> {
    let store = open_store(config)?;
    let through = through_week(args, &*store)?;
    let engine = MetricsEngine::new(store, config.metrics.clone());

    for chart in &config.charts {
        match engine.compute_as_of(&chart.key, through)? {
            None => println!("{}: no ok snapshot through {}", chart.key, through),
            Some((week, records)) => {
                let mut buckets: BTreeMap<&str, usize> = BTreeMap::new();
                for record in &records {
                    *buckets.entry(record.bucket.as_str()).or_default() += 1;
                }
                let summary = [
                    Bucket::Anchor,
                    Bucket::Climber,
                    Bucket::Fader,
                    Bucket::Spike,
                    Bucket::Uncategorized,
                ]
                .iter()
                .map(|b| format!("{} {}", b, buckets.get(b.as_str()).unwrap_or(&0)))
                .collect::<Vec<_>>()
                .join(", ");
                println!("{}: {} tracks as of {} ({})", chart.key, records.len(), week, summary);
            }
        }
    }
    println!("Compute complete through week {}", through);
    Ok(())
}

fn run_report(config: &AppConfig, args: &WeekArgs) -> Result<()> {
    let store = open_store(config)?;
    let through = through_week(args, &*store)?;
    let engine = MetricsEngine::new(store, config.metrics.clone());
    let report = build_report(&engine, &config.charts, through)?;
    let path = write_report(&report, &config.output_dir)?;
    println!("Report written to {}", path.display());
    Ok(())
}

fn run_status(config: &AppConfig, args: &WeekArgs) -> Result<()> {
    let store = open_store(config)?;
    let through = through_week(args, &*store)?;
    let engine = MetricsEngine::new(store.clone(), config.metrics.clone());

    println!("Chart durability status\n");
    println!("DB:      {}", config.db_path.display());
    println!("Report:  {}", config.output_dir.join("report.json").display());
    println!("Through: {}", through);
    println!("\nTracked charts:");
    for chart in &config.charts {
        println!("- {}: {} ({})", chart.key, chart.name, chart.url);
    }

    println!("\nChart state:");
    let keys: Vec<_> = config.charts.iter().map(|c| c.key.clone()).collect();
    for chart_status in status(&*store, &engine, &keys, through)? {
        println!("{}", chart_status);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let defaults = CliConfig::default();
    let cli_config = CliConfig {
        db_path: cli_args.db.clone().unwrap_or(defaults.db_path),
        debug_dir: cli_args.debug_dir.clone().unwrap_or(defaults.debug_dir),
        output_dir: cli_args.output_dir.clone().unwrap_or(defaults.output_dir),
        parallel_fetch: cli_args.parallel_fetch,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    match &cli_args.command {
        Command::InitDb => run_init_db(&config),
        Command::Ingest(args) => run_ingest(&config, args),
        Command::Compute(args) => run_compute(&config, args),
        Command::Report(args) => run_report(&config, args),
        Command::Status(args) => run_status(&config, args),
        Command::RunAll(args) => {
            info!("Running full pipeline");
            run_init_db(&config)?;
            run_ingest(&config, args)?;
            run_compute(&config, args)?;
            run_report(&config, args)
        }
    }
}
