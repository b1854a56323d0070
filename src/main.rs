use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tradesync::alert::parse_alert;
use tradesync::api::BybitConnector;
use tradesync::auth::EnvSecretProvider;
use tradesync::config::Settings;
use tradesync::execution::{CycleReport, DecisionCycle};
use tradesync::persistence::{RedisSnapshotStore, SnapshotStore};

#[derive(Parser)]
#[command(
    name = "tradesync",
    about = "Candle-synchronized trade decisions for indicator alerts"
)]
struct Cli {
    /// Config file (extension optional). Defaults to config/tradesync.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge one alert and act on the candle if all four feeds are in
    Run {
        /// Alert JSON file. Reads stdin when omitted.
        #[arg(long)]
        alert: Option<PathBuf>,
    },
    /// Print the stored snapshot for a symbol
    Show {
        #[arg(long)]
        symbol: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("Failed to load settings")?;

    let store: Arc<dyn SnapshotStore> = Arc::new(
        RedisSnapshotStore::new(&settings.redis_url)
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", settings.redis_url))?,
    );

    match cli.command {
        Commands::Run { alert } => run(store, &settings, alert).await,
        Commands::Show { symbol } => show(store, &symbol).await,
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tradesync=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(store: Arc<dyn SnapshotStore>, settings: &Settings, alert: Option<PathBuf>) -> Result<()> {
    let body = match alert {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read alert from {}", path.display()))?,
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read alert from stdin")?;
            body
        }
    };

    let update = parse_alert(&body)?;
    tracing::info!(
        symbol = %update.symbol(),
        fields = update.deltas().len(),
        "Received alert"
    );

    let cycle = DecisionCycle::new(
        store,
        Arc::new(EnvSecretProvider::new(settings.exchange.testnet)),
        Arc::new(BybitConnector::new(settings.exchange.clone())),
        settings.sizing.clone(),
        settings.secret_id.clone(),
    );

    let report = cycle.run(&update).await?;
    match &report {
        CycleReport::Skipped { reason } => {
            tracing::info!(symbol = %update.symbol(), reason = %reason, "Skipped");
        }
        CycleReport::Executed {
            previous_state,
            outcome,
            ..
        } => {
            tracing::info!(
                symbol = %update.symbol(),
                from = %previous_state,
                to = %outcome.state,
                orders = outcome.orders.len(),
                "Cycle complete"
            );
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn show(store: Arc<dyn SnapshotStore>, symbol: &str) -> Result<()> {
    match store.get(symbol).await? {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        None => anyhow::bail!("No snapshot stored for {}", symbol),
    }
    Ok(())
}
