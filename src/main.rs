use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod artifact;
mod cache;
mod db;
mod filters;
mod models;
mod predict;
mod report;
mod risk;
mod server;

#[derive(Parser)]
#[command(name = "shortwatch")]
#[command(about = "Drug shortage risk dashboard backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import FDA shortage records from a CSV file
    ImportShortages {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import FDA enforcement records from a CSV file
    ImportEnforcements {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Run the JSON API server
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
        /// Precomputed model artifact (JSON) from the offline training run
        #[arg(long)]
        model_artifact: Option<PathBuf>,
        #[arg(long, default_value_t = 300)]
        cache_ttl_secs: u64,
    },
    /// Generate a markdown summary report
    Report {
        #[arg(long)]
        company: Option<String>,
        #[arg(long, default_value_t = 90)]
        window_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportShortages { csv } => {
            let inserted = db::import_shortages_csv(&pool, &csv).await?;
            println!("Inserted {inserted} shortage records from {}.", csv.display());
        }
        Commands::ImportEnforcements { csv } => {
            let inserted = db::import_enforcements_csv(&pool, &csv).await?;
            println!(
                "Inserted {inserted} enforcement records from {}.",
                csv.display()
            );
        }
        Commands::Serve {
            bind,
            model_artifact,
            cache_ttl_secs,
        } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .init();

            let artifact = match model_artifact {
                Some(path) => Some(Arc::new(artifact::ModelArtifact::load(&path)?)),
                None => {
                    info!("no model artifact supplied; predictions fall back to count-derived scores");
                    None
                }
            };

            let state = server::AppState {
                pool,
                cache: Arc::new(cache::SnapshotCache::new(Duration::from_secs(
                    cache_ttl_secs,
                ))),
                artifact,
            };
            let router = server::build_router(state);

            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("failed to bind {bind}"))?;
            info!(%bind, "serving dashboard API");
            axum::serve(listener, router).await?;
        }
        Commands::Report {
            company,
            window_days,
            out,
        } => {
            let shortages = db::fetch_shortages(&pool).await?;
            let enforcements = db::fetch_enforcements(&pool).await?;
            let filter = filters::RecordFilter {
                company: company.clone(),
                ..Default::default()
            };
            let today = Utc::now().date_naive();

            let metrics = aggregate::summary_metrics(&shortages, &enforcements, today);
            let companies = aggregate::group_by_company(&shortages, &enforcements, &filter, 10);
            let feed = aggregate::recent_activity(
                &shortages,
                &enforcements,
                None,
                window_days,
                today,
                &filter,
            );

            let report = report::build_report(
                company.as_deref(),
                window_days,
                &metrics,
                &companies,
                &feed,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
