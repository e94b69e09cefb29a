use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use incident_common::{
    AppConfig, ClusteringConfig, IncidentFilter, IncidentStatus, IncidentSummary,
};
use incident_domains::{run_clustering, PgComplaintStore, RunOptions, SnapshotSource};

#[derive(Parser)]
#[command(
    name = "incident-clusterer",
    about = "Groups citizen complaints that describe the same incident"
)]
struct Cli {
    /// Path to config TOML file
    #[arg(long, global = true, default_value = "./config/incidents.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cluster every unassigned complaint and link the results
    Run {
        /// Build and report, but do not write incidents
        #[arg(long)]
        dry_run: bool,

        /// Audit the partition before committing
        #[arg(long)]
        verify: bool,

        /// Read complaints from a JSON snapshot instead of Postgres (implies --dry-run)
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Print incident summaries as JSON lines
    Incidents {
        /// OPEN, IN_PROGRESS, RESOLVED or CLOSED
        #[arg(long)]
        status: Option<IncidentStatus>,

        #[arg(long, default_value_t = 2)]
        min_members: i64,

        #[arg(long, default_value_t = 100)]
        limit: i64,

        /// Open incidents with at least five complaints
        #[arg(long, conflicts_with_all = ["status", "min_members"])]
        major: bool,
    },
}

#[derive(Serialize)]
struct IncidentLine<'a> {
    code: String,
    #[serde(flatten)]
    summary: &'a IncidentSummary,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.canonicalize().with_context(|| {
        format!(
            "Config file not found: {}. Create one or specify --config <path>",
            cli.config.display()
        )
    })?;
    tracing::info!(config = %config_path.display(), "Loading config");
    let file_config = incident_common::file_config::load_config(&config_path)?;

    match cli.command {
        Command::Run {
            dry_run,
            verify,
            snapshot,
        } => run(&file_config.clustering, dry_run, verify, snapshot).await,
        Command::Incidents {
            status,
            min_members,
            limit,
            major,
        } => {
            let filter = if major {
                IncidentFilter {
                    limit,
                    ..IncidentFilter::major()
                }
            } else {
                IncidentFilter {
                    status,
                    min_members,
                    limit,
                }
            };
            list(&filter).await
        }
    }
}

async fn run(
    clustering: &ClusteringConfig,
    dry_run: bool,
    verify: bool,
    snapshot: Option<PathBuf>,
) -> Result<()> {
    let options = RunOptions { dry_run, verify };

    let stats = match snapshot {
        Some(path) => {
            let source = SnapshotSource::from_path(&path)?;
            run_clustering(&source, None, clustering, options).await?
        }
        None => {
            let store = connect().await?;
            run_clustering(&store, Some(&store), clustering, options).await?
        }
    };

    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}

async fn list(filter: &IncidentFilter) -> Result<()> {
    let store = connect().await?;
    let summaries = store.list_incidents(filter).await?;
    tracing::info!(incidents = summaries.len(), "Listing incidents");

    for summary in &summaries {
        let line = IncidentLine {
            code: summary.display_code(),
            summary,
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

async fn connect() -> Result<PgComplaintStore> {
    let config = AppConfig::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "Connected to database"
    );
    Ok(PgComplaintStore::new(pool))
}
