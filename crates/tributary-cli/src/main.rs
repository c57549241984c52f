//! Tributary CLI
//!
//! Operational entry point: run one sync against a configured source and
//! print the terminal job snapshot as JSON. Sources and the hash store are
//! configured through environment variables (see `AppConfig::from_env`);
//! a `.env` file is honored.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;
use uuid::Uuid;

use tributary_common::logging::{init_logging, LogConfig};
use tributary_sync::config::AppConfig;
use tributary_sync::connectors::discord::DiscordConnector;
use tributary_sync::connectors::dixa::DixaConnector;
use tributary_sync::connectors::intercom::IntercomConnector;
use tributary_sync::connectors::postgres::PostgresConnector;
use tributary_sync::connectors::Connector;
use tributary_sync::sync::{
    cancel_channel, HashStore, LogDestination, MemoryHashStore, PostgresHashStore,
    SyncJobStatus, SyncOrchestrator,
};

#[derive(Parser)]
#[command(name = "tributary", version, about = "Sync external sources into the entity index")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one sync against a configured source
    Sync {
        /// Which source to sync
        #[arg(long, value_enum)]
        source: SourceKind,
        /// Stable sync identity. Reuse the same id across runs to get
        /// incremental behavior; defaults to a fresh random id.
        #[arg(long)]
        sync_id: Option<Uuid>,
    },
    /// Show which sources are configured in the environment
    Sources,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceKind {
    Discord,
    Dixa,
    Intercom,
    Postgres,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging(&LogConfig::from_env())?;

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Sync { source, sync_id } => run_sync(&config, source, sync_id).await,
        Command::Sources => {
            list_sources(&config);
            Ok(())
        },
    }
}

async fn run_sync(config: &AppConfig, source: SourceKind, sync_id: Option<Uuid>) -> Result<()> {
    let policy = config.retry.policy();
    let connector: Box<dyn Connector> = match source {
        SourceKind::Discord => {
            let discord = config
                .discord
                .as_ref()
                .context("discord is not configured (set SOURCE_DISCORD_TOKEN)")?;
            Box::new(DiscordConnector::create(discord, policy).await?)
        },
        SourceKind::Dixa => {
            let dixa = config
                .dixa
                .as_ref()
                .context("dixa is not configured (set SOURCE_DIXA_API_KEY)")?;
            Box::new(DixaConnector::create(dixa, policy)?)
        },
        SourceKind::Intercom => {
            let intercom = config
                .intercom
                .as_ref()
                .context("intercom is not configured (set SOURCE_INTERCOM_TOKEN)")?;
            Box::new(IntercomConnector::create(intercom, policy)?)
        },
        SourceKind::Postgres => {
            let postgres = config
                .postgres
                .as_ref()
                .context("postgres is not configured (set SOURCE_POSTGRES_URL)")?;
            Box::new(PostgresConnector::create(postgres).await?)
        },
    };

    let store: Arc<dyn HashStore> = match &config.sync.hash_store_url {
        Some(url) => Arc::new(PostgresHashStore::connect(url).await?),
        None => {
            warn!("no hash store configured (SYNC_HASH_STORE_URL); state will not survive this process");
            Arc::new(MemoryHashStore::new())
        },
    };

    let sync_id = sync_id.unwrap_or_else(Uuid::new_v4);
    let (orchestrator, _monitor) = SyncOrchestrator::new(
        sync_id,
        store,
        Arc::new(LogDestination::new()),
        config.sync.clone(),
    );

    let (cancel_tx, cancel_rx) = cancel_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let job = orchestrator.run(connector, cancel_rx).await;
    println!("{}", serde_json::to_string_pretty(&job)?);

    if job.status == SyncJobStatus::Failed {
        bail!(
            "sync failed: {}",
            job.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    Ok(())
}

fn list_sources(config: &AppConfig) {
    let entries = [
        ("discord", config.discord.is_some()),
        ("dixa", config.dixa.is_some()),
        ("intercom", config.intercom.is_some()),
        ("postgres", config.postgres.is_some()),
    ];
    for (name, configured) in entries {
        let status = if configured { "configured" } else { "not configured" };
        println!("{name:<10} {status}");
    }
}
