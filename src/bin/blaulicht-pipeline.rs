//! CLI entry point. Dispatches every pipeline subcommand onto the library
//! crate's scrape/filter/enrich/transform/sink/manifest/orchestrator/live
//! modules.

use blaulicht_pipeline::core::config::BUNDESLAENDER;
use blaulicht_pipeline::core::{PipelineConfig, ShutdownToken};
use blaulicht_pipeline::live;
use blaulicht_pipeline::manifest::Manifest;
use blaulicht_pipeline::orchestrator::{run_parallel, run_sequential, PipelineContext};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "blaulicht-pipeline", about = "German police press-release ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs the full pipeline chunk by chunk, one at a time.
    Start,
    /// Runs the full pipeline with phased worker pools for higher throughput.
    Fast,
    /// Prints manifest progress.
    Status,
    /// Resets failed chunks back to pending and runs them.
    Retry,
    /// Resets chunk state.
    Reset {
        #[arg(long)]
        failed: bool,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        confirm: bool,
    },
    /// Generates or extends the manifest to cover one additional year.
    Week {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        week: u32,
    },
    /// Lists chunks, optionally filtered.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        bundesland: Option<String>,
    },
    /// Scrapes one Bundesland for a date window, printing article counts.
    Scrape {
        #[arg(long)]
        state: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Runs the live polling loop.
    Live {
        #[arg(long, default_value = "once")]
        mode: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load();
    let shutdown = ShutdownToken::new();
    shutdown.install_signal_handler();

    match run(cli.command, config, &shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "pipeline command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: PipelineConfig, shutdown: &ShutdownToken) -> anyhow::Result<()> {
    match command {
        Command::Start => {
            let ctx = PipelineContext::build(config)?;
            run_sequential(&ctx, shutdown).await?;
        }
        Command::Fast => {
            let ctx = PipelineContext::build(config)?;
            run_parallel(&ctx, shutdown).await?;
        }
        Command::Status => {
            let manifest = Manifest::load(&config.manifest_path());
            match manifest {
                Some(m) => println!("{}", m.progress_summary()),
                None => println!("No manifest found at {}", config.manifest_path().display()),
            }
        }
        Command::Retry => {
            let mut manifest = Manifest::load_or_create(&config.manifest_path(), "2023-01-01", "2026-01-01")?;
            let reset = manifest.reset_failed();
            manifest.save(&config.manifest_path())?;
            info!(reset, "reset failed chunks, starting sequential run");
            let ctx = PipelineContext::build(config)?;
            run_sequential(&ctx, shutdown).await?;
        }
        Command::Reset { failed, all, confirm } => {
            if !confirm {
                println!("Refusing to reset without --confirm");
                return Ok(());
            }
            let mut manifest = Manifest::load_or_create(&config.manifest_path(), "2023-01-01", "2026-01-01")?;
            if all {
                manifest = Manifest::create(&manifest.start_date, &manifest.end_date);
            } else if failed {
                manifest.reset_failed();
            }
            manifest.save(&config.manifest_path())?;
            println!("Manifest reset.");
        }
        Command::Week { year, week } => {
            let start = chrono::NaiveDate::from_isoywd_opt(year, week, chrono::Weekday::Mon)
                .ok_or_else(|| anyhow::anyhow!("invalid year/week"))?;
            let end = start + chrono::Duration::days(7);
            let manifest = Manifest::load_or_create(
                &config.manifest_path(),
                &start.format("%Y-%m-%d").to_string(),
                &end.format("%Y-%m-%d").to_string(),
            )?;
            manifest.save(&config.manifest_path())?;
            println!("Manifest covers {} chunks", manifest.chunks.len());
        }
        Command::List { status, bundesland } => {
            let manifest = Manifest::load(&config.manifest_path());
            let Some(manifest) = manifest else {
                println!("No manifest found.");
                return Ok(());
            };
            if bundesland.is_some() {
                println!("note: listing is per-chunk (all Bundesländer per month); --bundesland is informational only.");
                println!("Bundesländer covered: {}", BUNDESLAENDER.join(", "));
            }
            for (id, chunk) in &manifest.chunks {
                let status_str = format!("{:?}", chunk.status).to_lowercase();
                if let Some(filter) = &status {
                    if &status_str != filter {
                        continue;
                    }
                }
                println!("{id}: {status_str} ({}-{})", chunk.start_date, chunk.end_date);
            }
        }
        Command::Scrape { state, start, end } => {
            let ctx = PipelineContext::build(config)?;
            let window = blaulicht_pipeline::scrape::ScrapeWindow {
                start: chrono::NaiveDate::parse_from_str(&start, "%Y-%m-%d")?,
                end: chrono::NaiveDate::parse_from_str(&end, "%Y-%m-%d")?,
            };
            let (articles, meta) = blaulicht_pipeline::orchestrator::scrape_state(
                &state,
                &ctx.config,
                ctx.fetcher.clone(),
                window,
                shutdown,
            )
            .await;
            println!("{state}: {} articles ({:?})", articles.len(), meta.stop_reason);
        }
        Command::Live { mode, source, dry_run, interval } => {
            let mut config = config;
            if let Some(interval) = interval {
                config.live_poll_interval_minutes = interval;
            }
            let ctx = PipelineContext::build(config)?;
            match mode.as_str() {
                "once" => {
                    let metrics = live::run_once(&ctx, source.as_deref(), dry_run, shutdown).await?;
                    println!("{metrics:?}");
                }
                "daemon" => {
                    live::run_daemon(&ctx, source.as_deref(), dry_run, shutdown).await?;
                }
                "status" => {
                    println!("{}", live::status_report(&ctx));
                }
                other => {
                    anyhow::bail!("unknown live mode: {other}");
                }
            }
        }
    }
    Ok(())
}
