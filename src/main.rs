use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use ip_gate::auth::{api_key::CredentialStore, AuthorizationGate};
use ip_gate::cli::{Cli, Command, WhitelistCommand};
use ip_gate::config::Config;
use ip_gate::db::{models::EntryState, DbPool};
use ip_gate::metrics::GateMetrics;
use ip_gate::ocr::UnconfiguredEngine;
use ip_gate::whitelist::{WhitelistCache, WhitelistService, WhitelistStore};
use ip_gate::{api, config, db};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ip_gate=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    let cfg = config::load(&cli.config)?;
    info!("Configuration loaded");

    let db_pool = db::init(&cfg).await?;
    info!("Database initialized");

    db::seed_api_key(&db_pool, &cfg).await?;

    let whitelist = build_whitelist(&cfg, db_pool.clone());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg, db_pool, whitelist).await,
        Command::Whitelist(cmd) => run_whitelist(cmd, &whitelist).await,
        Command::IssueKey { description, days } => {
            let credentials = CredentialStore::new(db_pool);
            let (key, record) = credentials.issue(description.as_deref(), days).await?;
            println!("id:         {}", record.id);
            println!("expires_at: {}", record.expires_at.map_or("never".to_string(), |t| t.to_rfc3339()));
            println!("key:        {}", key);
            println!("Store this key now; it cannot be shown again.");
            Ok(())
        }
        Command::RevokeKey { id } => {
            let credentials = CredentialStore::new(db_pool);
            if credentials.revoke(id).await? {
                println!("API key {} revoked", id);
            } else {
                anyhow::bail!("No active API key with id {}", id);
            }
            Ok(())
        }
    }
}

fn build_whitelist(cfg: &Config, db_pool: DbPool) -> WhitelistService {
    let store = WhitelistStore::new(db_pool);
    let cache = Arc::new(WhitelistCache::new(
        cfg.whitelist.cache_ttl(),
        cfg.whitelist.refresh_timeout(),
    ));
    WhitelistService::new(store, cache)
}

async fn serve(cfg: Config, db_pool: DbPool, whitelist: WhitelistService) -> Result<()> {
    info!("Starting ip-gate v{}", env!("CARGO_PKG_VERSION"));

    whitelist.seed_defaults(&cfg.whitelist.seed).await?;

    // A failed warm-up is not fatal: reads retry the refresh and deny until it succeeds.
    match whitelist.refresh_cache().await {
        Ok(size) => info!("Whitelist cache warmed with {} entries", size),
        Err(e) => tracing::error!("Initial whitelist cache refresh failed: {}", e),
    }

    // Shared between the gate and the /metrics endpoint
    let metrics = Arc::new(GateMetrics::default());

    let gate = Arc::new(AuthorizationGate::new(
        whitelist.cache().clone(),
        whitelist.store().clone(),
        CredentialStore::new(db_pool.clone()),
        metrics.clone(),
    ));

    api::serve(cfg, db_pool, whitelist, gate, metrics, Arc::new(UnconfiguredEngine)).await
}

async fn run_whitelist(cmd: WhitelistCommand, whitelist: &WhitelistService) -> Result<()> {
    match cmd {
        WhitelistCommand::Add { spec, description } => {
            let outcome = whitelist.add(&spec, description.as_deref(), "cli").await?;
            println!("{}: {:?}", spec.trim(), outcome);
        }
        WhitelistCommand::Remove { spec } => {
            whitelist.remove(&spec).await?;
            println!("{}: removed", spec.trim());
        }
        WhitelistCommand::List => {
            for entry in whitelist.list().await? {
                println!(
                    "{:<4} {:<40} {:<8} {:<8} {}",
                    entry.id,
                    entry.address_spec,
                    match entry.state() {
                        EntryState::Active => "active",
                        EntryState::Inactive => "inactive",
                    },
                    entry.created_by.as_deref().unwrap_or("-"),
                    entry.description.as_deref().unwrap_or(""),
                );
            }
        }
        WhitelistCommand::Update { spec, description } => {
            whitelist.update_description(&spec, description.as_deref()).await?;
            println!("{}: description updated", spec.trim());
        }
        WhitelistCommand::RefreshCache => {
            let size = whitelist.refresh_cache().await?;
            println!("cache_size: {}", size);
        }
        WhitelistCommand::CacheInfo => {
            whitelist.refresh_cache().await?;
            println!("{}", serde_json::to_string_pretty(&whitelist.cache_info().await)?);
        }
    }
    Ok(())
}
