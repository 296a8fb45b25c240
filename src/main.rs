mod audit;
mod config;
mod platform;
mod relay;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::audit::AuditLog;
use crate::config::Config;
use crate::platform::telegram::{self, TelegramMessenger, TelegramUpdates};
use crate::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the variables may come from the real environment
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relaybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Admin: {}", config.telegram.admin_id);
    info!("  Cooldown: {} ms", config.relay.cooldown_ms);
    if config.relay.links.is_empty() {
        warn!("No [[relay.links]] in the config, /order will say no links are configured");
    }

    let audit_log = AuditLog::open(&config.relay.audit_log_path)?;
    info!("  Audit log: {}", audit_log.path().display());
    let bot = Bot::new(&config.telegram.bot_token);

    let relay = Arc::new(Relay::new(
        config.telegram.admin_id,
        config.relay.clone(),
        Arc::new(TelegramMessenger::new(bot.clone())),
        audit_log,
    ));

    let webhook_url = config.webhook_url();
    telegram::register_webhook(&bot, &webhook_url).await?;

    let app = server::router(
        &config.telegram.bot_token,
        Arc::new(TelegramUpdates::new(bot.clone(), relay.clone())),
    );

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Starting webhook server on {}", addr);
    info!("Webhook URL: {}/webhook/<token>", config.server.public_base_url);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    info!("Shutting down...");
    telegram::remove_webhook(&bot).await;
    info!("Users seen this run: {}", relay.visitors.len().await);

    served
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
