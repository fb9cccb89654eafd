//! ferment-watch server
//!
//! Loads `monitor.toml`, opens the sled store and serves the `/api/v1`
//! HTTP surface. Alerts go to Telegram when a bot token and chat id are
//! configured, otherwise to the log.
//!
//! # Usage
//!
//! ```bash
//! ferment-watch --config monitor.toml
//! RUST_LOG=debug ferment-watch --log-json
//! ```
//!
//! # Environment Variables
//!
//! - `FERMENT_CONFIG`: config file path (same as `--config`)
//! - `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`: enable Telegram delivery
//! - `TELEGRAM_WEBHOOK_SECRET`: required secret token on the bot webhook
//! - `FERMENT_SERVER_ADDR`, `FERMENT_DATA_DIR`: override `[server]` / `[storage]`
//! - `RUST_LOG`: Logging level (default: info)
//! - `RESET_DB`: Set to "true" to wipe all persistent data on startup (for testing)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ferment_watch::api::{create_app, ApiState, TelegramBot};
use ferment_watch::config::MonitorConfig;
use ferment_watch::{AlertEngine, LogNotifier, Notifier, SledStore, TelegramNotifier};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "ferment-watch")]
#[command(about = "Fermentation monitor with diacetyl rest alerts")]
#[command(version)]
struct CliArgs {
    /// Path to monitor.toml (skips the FERMENT_CONFIG / ./monitor.toml search)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the server address (default: "0.0.0.0:8000")
    #[arg(short, long, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Override the data directory holding the sled database
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Reset all persistent data (batches, readings, alert history) on startup.
    /// WARNING: This is destructive and cannot be undone!
    /// Can also be set via RESET_DB=true environment variable.
    #[arg(long)]
    reset_db: bool,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// Check if database reset is requested via CLI flag or environment variable
fn should_reset_db(cli_flag: bool) -> bool {
    if cli_flag {
        return true;
    }
    if let Ok(val) = std::env::var("RESET_DB") {
        let val_lower = val.to_lowercase();
        return val_lower == "true" || val_lower == "1" || val_lower == "yes";
    }
    false
}

/// Safely remove the data directory and all its contents.
fn reset_data_directory(data_path: &Path) -> Result<()> {
    if !data_path.exists() {
        info!("Data directory does not exist, nothing to reset");
        return Ok(());
    }

    warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    warn!("  RESET_DB DETECTED - WIPING ALL PERSISTENT DATA");
    warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    warn!("  Removing: {}", data_path.display());

    std::fs::remove_dir_all(data_path).context("Failed to remove data directory")?;

    warn!("  Data directory removed. A fresh database will be created on startup.");
    warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MonitorConfig::load(),
    };
    config.apply_env_overrides();
    if let Some(addr) = &args.addr {
        config.server.addr = addr.clone();
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Alert channel, plus the bot command handler when Telegram is configured.
fn build_notifier(config: &MonitorConfig) -> Result<(Arc<dyn Notifier>, Option<TelegramBot>)> {
    if config.telegram.is_configured() {
        let telegram = Arc::new(
            TelegramNotifier::from_config(&config.telegram, config.analysis.notify_timeout())
                .context("Failed to build Telegram client")?,
        );
        info!("📨 Notifier: Telegram");
        if config.telegram.webhook_secret.is_none() {
            warn!("🤖 Bot webhook accepts unsigned calls (set TELEGRAM_WEBHOOK_SECRET)");
        }
        let bot = TelegramBot::new(telegram.clone(), config.telegram.webhook_secret.clone());
        let notifier: Arc<dyn Notifier> = telegram;
        Ok((notifier, Some(bot)))
    } else {
        warn!("📨 Notifier: log only (set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID for Telegram)");
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        Ok((notifier, None))
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();
    init_logging(args.log_json);

    let config = load_config(&args)?;

    // must run before the store is opened
    if should_reset_db(args.reset_db) {
        reset_data_directory(&config.storage.data_dir)?;
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  ferment-watch {}", env!("CARGO_PKG_VERSION"));
    info!("  Fermentation monitor");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    std::fs::create_dir_all(&config.storage.data_dir)
        .with_context(|| format!("Failed to create {}", config.storage.data_dir.display()))?;
    let store = Arc::new(
        SledStore::open(config.storage.db_path()).context("Failed to open sled database")?,
    );
    info!("💾 Storage: {}", config.storage.db_path().display());

    let (notifier, bot) = build_notifier(&config)?;
    let profiles: Vec<String> = config
        .profiles
        .thresholds
        .iter()
        .map(|(name, t)| format!("{name}={:.0}%", t * 100.0))
        .collect();
    info!("🧫 Profiles: {}", profiles.join(", "));

    let engine = Arc::new(AlertEngine::with_store(
        store.clone(),
        notifier,
        config.analysis.clone(),
        config.profiles.clone(),
    ));
    let mut state = ApiState::new(engine);
    if let Some(bot) = bot {
        state = state.with_bot(bot);
        info!("🤖 Bot commands on POST /webhook/telegram");
    }
    let app = create_app(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.addr))?;
    info!("🌐 Listening on http://{}/api/v1", config.server.addr);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
        })
        .await;

    if let Err(e) = store.flush() {
        error!("Failed to flush storage on shutdown: {}", e);
    }

    match result {
        Ok(()) => {
            info!("Graceful shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Server error: {}", e);
            Err(anyhow::anyhow!("HTTP server error: {}", e))
        }
    }
}
