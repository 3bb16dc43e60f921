use anyhow::Context;
use clap::Parser;
use config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;

/// HTTP facade for the multi-source vacancy aggregator.
#[derive(Debug, Parser)]
#[command(name = "vacagg-serve", version)]
struct Args {
    /// Path to an optional YAML configuration file.
    #[arg(long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Bind address; overrides the configured `server.addr`.
    #[arg(long)]
    addr: Option<String>,

    #[command(flatten)]
    log: cli_common::LogArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    cli_common::init_logging(&args.log);

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }

    let manager = Arc::new(wire_manager(&config)?);
    let router = serve::build_router(manager.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("binding {}", config.server.addr))?;
    tracing::info!(addr = %config.server.addr, "http facade listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("caught signal; shutting down");
        })
        .await
        .context("serving http")?;

    manager.shutdown().await;
    Ok(())
}

fn wire_manager(config: &AppConfig) -> anyhow::Result<manager::Manager> {
    let registry = config.registry();
    let enabled = config.enabled_sources();
    anyhow::ensure!(!enabled.is_empty(), "no sources are enabled");

    let sources = registry
        .create_enabled(&enabled)
        .context("creating enabled sources")?;

    let shards = config.cache.num_of_shards;
    let results = cache::Cache::new(shards, config.cache.search.sweep);
    let index = cache::Cache::new(shards, config.cache.vacancy.sweep);
    let details = cache::Cache::new(shards, config.cache.vacancy.sweep);

    let endpoints = sources
        .iter()
        .map(|source| (source.name().to_string(), source.health_endpoint()))
        .collect();
    let health = Arc::new(
        health::HealthManager::new(config.health.clone(), endpoints)
            .context("starting health manager")?,
    );

    Ok(manager::Manager::new(
        config.manager_config(),
        sources,
        results,
        index,
        details,
        health,
    ))
}
