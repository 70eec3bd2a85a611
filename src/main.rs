//! guildline - runs a bot with the built-in commands against the gateway.

use std::sync::Arc;

use anyhow::Context;
use guildline::bus::{ConnectionEvent, EventBus};
use guildline::commands::{CommandModule, CommandRegistry, ConverterRegistry, ModuleOptions, builtin};
use guildline::config::{Config, LogFormat};
use guildline::network::Gateway;
use guildline::{http, metrics};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable consulted when the config has no token.
const TOKEN_ENV: &str = "GUILDLINE_TOKEN";

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;

    init_tracing(config.logging.format);
    info!(path = %config_path, url = %config.gateway.url, "Starting guildline");

    if config.gateway.token.is_none() {
        config.gateway.token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
    }
    if config.gateway.token.is_none() {
        warn!("No token configured; the gateway will likely reject the connection");
    }

    // Metrics
    match config.metrics.enabled_port() {
        Some(port) => {
            metrics::init();
            tokio::spawn(async move {
                http::run_http_server(port).await;
            });
            info!(port, "Prometheus HTTP server started");
        }
        None => info!("Metrics disabled"),
    }

    let bus = Arc::new(EventBus::new());

    // Lifecycle log
    let mut lifecycle = bus.subscribe_lifecycle();
    tokio::spawn(async move {
        while let Some(event) = lifecycle.recv().await {
            match event {
                ConnectionEvent::Connected { key } => info!(key = %key, "Connected"),
                ConnectionEvent::Disconnected { key, reason } => {
                    warn!(key = %key, reason = ?reason, "Disconnected")
                }
                ConnectionEvent::Reconnecting {
                    key,
                    attempt,
                    delay,
                } => info!(key = %key, attempt, delay_ms = delay.as_millis() as u64, "Reconnecting"),
            }
        }
    });

    // Commands
    let registry = CommandRegistry::register(builtin::definitions(), &ConverterRegistry::with_defaults())?;
    info!(commands = registry.len(), prefix = %config.commands.prefix, "Commands registered");
    let module = Arc::new(
        CommandModule::new(registry).with_options(ModuleOptions::from(&config.commands)),
    );
    let handle = module.attach(&bus)?;

    // Gateway
    let gateway = Gateway::new(config.gateway.clone(), Arc::clone(&bus));
    gateway.connect().await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutting down");

    module.detach(handle)?;
    gateway.disconnect_all().await;
    Ok(())
}
