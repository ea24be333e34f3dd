//! GophKeeper server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use gophkeeper_core::config::AppConfig;
use gophkeeper_server::{AppState, create_router};
use gophkeeper_store::LimiterParams;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// GophKeeper - a zero-knowledge vault for confidential records
#[derive(Parser, Debug)]
#[command(name = "gophkeeperd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "GOPHKEEPER_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("GophKeeper v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override
    // everything).
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("GOPHKEEPER_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    if config.auth.sign_key.is_empty() {
        anyhow::bail!("auth.sign_key must be set (GOPHKEEPER_AUTH__SIGN_KEY)");
    }

    // Initialize the vault store and apply migrations.
    let store = gophkeeper_store::from_config(
        &config.database,
        LimiterParams::from(&config.limiter),
    )
    .await
    .context("failed to initialize vault store")?;
    store
        .health_check()
        .await
        .context("vault store health check failed")?;
    tracing::info!("Vault store initialized");

    let state = AppState::new(config.clone(), store);
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
