//! ping-watch library
//!
//! A chat-driven website availability monitor.
//!
//! ## Architecture
//!
//! The codebase is organized into modules:
//! - `monitors`: HTTP prober, probe results, digest/alert formatting
//! - `tasks`: registry of active monitors and their polling loops
//! - `commands`: chat command parsing and dispatch
//! - `transport`: Telegram and Discord adapters ("send text to session")
//! - `config`: paths, settings file, token resolution
//! - `logging`: structured logging with tracing
//!
//! ## Main Entry Point
//!
//! - `run()`: resolve the token, build the registry and serve commands until Ctrl-C

pub mod commands;
pub mod config;
pub mod logging;
pub mod monitors;
pub mod tasks;
pub mod transport;

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

pub use config::{Config, ConfigError, Settings};
pub use logging::init_tracing;
pub use transport::TransportKind;

use commands::CommandHandler;
use monitors::website::HttpProber;
use tasks::TaskRegistry;
use transport::{discord, telegram};

/// Serve the given transport until it fails or Ctrl-C. A missing or rejected
/// token fails before any command is served.
pub async fn run(transport: TransportKind, settings: Settings) -> Result<()> {
    let token = config::resolve_token(transport)?;
    let prober = Arc::new(HttpProber::new(
        settings.probe_timeout_secs,
        settings.accept_invalid_certs,
    )?);
    info!(
        "ping-watch v{}: starting {:?} transport (poll every {}s, digest every {}s, recovery alerts: {})",
        Config::version(),
        transport,
        settings.poll_interval_secs,
        settings.report_interval_secs,
        settings.alert_on_recovery
    );

    match transport {
        TransportKind::Telegram => {
            let client = Arc::new(telegram::TelegramClient::new(&token)?);
            let registry = TaskRegistry::new(prober, client.clone(), settings.monitor_settings());
            let handler = CommandHandler::new(registry.clone());
            serve(registry, telegram::run_polling(client, handler)).await
        }
        TransportKind::Discord => {
            let notifier = Arc::new(discord::DiscordNotifier::new(&token));
            let registry = TaskRegistry::new(prober, notifier, settings.monitor_settings());
            let handler = CommandHandler::new(registry.clone());
            serve(registry, discord::run_gateway(&token, handler)).await
        }
    }
}

/// Monitoring state is in-memory only; loops are cancelled on the way out.
async fn serve(registry: TaskRegistry, transport: impl Future<Output = Result<()>>) -> Result<()> {
    let result = tokio::select! {
        r = transport => r,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    };
    registry.shutdown();
    result
}
