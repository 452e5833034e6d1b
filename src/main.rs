mod aggregate;
mod artifact;
mod browser;
mod config;
mod db;
mod error;
mod parser;
mod pipeline;
mod scraper;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::artifact::ArtifactStore;
use crate::browser::chrome::ChromeLauncher;
use crate::config::PipelineConfig;
use crate::db::StoreLoader;
use crate::pipeline::LoadOutcome;
use crate::scraper::ScrapeSettings;

#[derive(Parser)]
#[command(name = "imdb_scraper", about = "IMDb per-genre movie listing scraper and loader")]
struct Cli {
    /// Config file (default: imdb_scraper.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape genres, merge and load into the store
    Run {
        /// Only these genres (repeatable; default: all configured)
        #[arg(short, long = "genre")]
        genres: Vec<String>,
    },
    /// Scrape genres into per-genre CSV extracts only
    Scrape {
        #[arg(short, long = "genre")]
        genres: Vec<String>,
    },
    /// Merge the per-genre extracts on disk and load the store
    Merge,
    /// Load the persisted merged CSV into the store (retry a failed load)
    Load,
    /// Per-genre summary of the store table
    Stats,
    /// List movies from the store table
    Movies {
        #[arg(short, long)]
        genre: Option<String>,
        #[arg(long)]
        min_rating: Option<f64>,
        #[arg(long)]
        max_rating: Option<f64>,
        #[arg(long)]
        min_votes: Option<i64>,
        /// Minutes
        #[arg(long)]
        min_duration: Option<i64>,
        /// Minutes
        #[arg(long)]
        max_duration: Option<i64>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let cfg = crate::config::load(cli.config.as_deref()).context("invalid configuration")?;
    let artifacts = ArtifactStore::new(&cfg.artifacts.dir, cfg.artifacts.year);

    let result = match cli.command {
        Commands::Run { genres } => {
            let loader = StoreLoader::new(&cfg.store)?;
            let (succeeded, failed) = scrape(&cfg, &artifacts, &genres).await?;

            info!("{} genre(s) scraped this run", succeeded.len());
            let names = pipeline::merge_inputs(&cfg.genres, &failed);
            let extracts = pipeline::collect_extracts(&artifacts, &names);
            let outcome = pipeline::merge_and_load(extracts, &artifacts, &loader)?;
            report(&outcome, loader.table());
            if matches!(outcome, LoadOutcome::Loaded { .. }) {
                launch_dashboard(&cfg.dashboard_command);
            }
            fail_on_genres(&failed)
        }
        Commands::Scrape { genres } => {
            let (_, failed) = scrape(&cfg, &artifacts, &genres).await?;
            fail_on_genres(&failed)
        }
        Commands::Merge => {
            let loader = StoreLoader::new(&cfg.store)?;
            let names: Vec<String> = cfg.genres.iter().map(|g| g.name.clone()).collect();
            let extracts = pipeline::collect_extracts(&artifacts, &names);
            let outcome = pipeline::merge_and_load(extracts, &artifacts, &loader)?;
            report(&outcome, loader.table());
            Ok(())
        }
        Commands::Load => {
            let loader = StoreLoader::new(&cfg.store)?;
            let rows = pipeline::load_persisted(&artifacts, &loader)?;
            println!("Loaded {} rows into {}", rows, loader.table());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::open_readonly(&cfg.store.path)?;
            let table = &cfg.store.table;
            let stats = db::fetch_genre_stats(&conn, table)?;
            if stats.is_empty() {
                println!("No movies loaded. Run 'run' or 'merge' first.");
                return Ok(());
            }
            println!(
                "{:<14} | {:>6} | {:>6} | {:>8} | {:>12}",
                "Genre", "Movies", "Rating", "Minutes", "Votes"
            );
            println!("{}", "-".repeat(58));
            for s in &stats {
                println!(
                    "{:<14} | {:>6} | {:>6.2} | {:>8.1} | {:>12}",
                    truncate(&s.genre, 14),
                    s.movies,
                    s.avg_rating,
                    s.avg_duration,
                    s.total_votes
                );
            }
            println!("\nTotal: {} movies", db::count_rows(&conn, table)?);
            Ok(())
        }
        Commands::Movies {
            genre,
            min_rating,
            max_rating,
            min_votes,
            min_duration,
            max_duration,
            limit,
        } => {
            let conn = db::open_readonly(&cfg.store.path)?;
            let filter = db::MovieFilter {
                genre,
                min_rating,
                max_rating,
                min_votes,
                min_duration,
                max_duration,
            };
            let rows = db::fetch_movies(&conn, &cfg.store.table, &filter, limit)?;
            if rows.is_empty() {
                println!("No movies found.");
                return Ok(());
            }

            println!(
                "{:>4} | {:<36} | {:<10} | {:>6} | {:>9} | {:>7}",
                "#", "Movie", "Genre", "Rating", "Votes", "Minutes"
            );
            println!("{}", "-".repeat(88));
            for r in &rows {
                println!(
                    "{:>4} | {:<36} | {:<10} | {:>6.1} | {:>9} | {:>7}",
                    r.serial_no,
                    truncate(&r.title, 36),
                    truncate(&r.genre, 10),
                    r.rating,
                    r.votes,
                    r.duration
                );
            }
            println!("\n{} movies", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Scrape the selected genres. Returns (succeeded, failed) genre names.
async fn scrape(
    cfg: &PipelineConfig,
    artifacts: &ArtifactStore,
    only: &[String],
) -> anyhow::Result<(Vec<String>, Vec<String>)> {
    let genres = cfg.select_genres(only)?;
    println!(
        "Scraping {} genres ({} at a time)...",
        genres.len(),
        cfg.concurrency
    );

    let results = scraper::scrape_genres(
        Arc::new(ChromeLauncher::new(cfg.browser.clone())),
        genres,
        Arc::new(ScrapeSettings::from_config(cfg)),
        Arc::new(artifacts.clone()),
        cfg.concurrency,
    )
    .await;

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for result in results {
        match result {
            Ok(run) => {
                println!(
                    "  {:<12} {:>5} movies ({} load-more clicks, {} forced) -> {}",
                    run.genre,
                    run.rows,
                    run.expand.clicks,
                    run.expand.forced,
                    run.artifact.display()
                );
                succeeded.push(run.genre);
            }
            Err(e) => {
                println!("  {:<12} FAILED: {}", e.genre(), e);
                failed.push(e.genre().to_string());
            }
        }
    }
    Ok((succeeded, failed))
}

fn report(outcome: &LoadOutcome, table: &str) {
    match outcome {
        LoadOutcome::Loaded {
            rows,
            dropped,
            artifact,
        } => println!(
            "Loaded {} movies into {} ({} incomplete rows dropped; merged CSV: {})",
            rows,
            table,
            dropped,
            artifact.display()
        ),
        LoadOutcome::SkippedEmpty { input_rows } => println!(
            "Nothing to load: no complete rows among {} extracted. Store left unchanged.",
            input_rows
        ),
    }
}

fn fail_on_genres(failed: &[String]) -> anyhow::Result<()> {
    if failed.is_empty() {
        Ok(())
    } else {
        bail!("{} genre(s) failed: {}", failed.len(), failed.join(", "))
    }
}

/// Fire-and-forget: the pipeline result never depends on the dashboard.
fn launch_dashboard(argv: &[String]) {
    let Some((program, args)) = argv.split_first() else {
        return;
    };
    info!("Launching dashboard: {}", argv.join(" "));
    match std::process::Command::new(program).args(args).spawn() {
        Ok(child) => info!("Dashboard started (pid {})", child.id()),
        Err(e) => warn!("Could not launch dashboard {}: {}", program, e),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
