//! RAPT Pill poller
//!
//! Every interval, fetches the latest telemetry of one RAPT hydrometer and
//! forwards it to a running ferment-watch server.
//!
//! # Usage
//! ```bash
//! RAPT_USERNAME=me@example.com RAPT_API_SECRET=... RAPT_DEVICE_ID=... \
//!     ./rapt-poller --backend-url http://localhost:8000
//! ./rapt-poller --once
//! ./rapt-poller --list-devices
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ferment_watch::config::defaults::{
    POLLER_HTTP_TIMEOUT_SECS, POLLER_INTERVAL_SECS, POLLER_LOOKBACK_HOURS, POLLER_RETRY_SECS,
};
use ferment_watch::poller::{list_devices, sync_once, BackendClient, Hydrometer, RaptClient, SyncOutcome};

#[derive(Parser, Debug)]
#[command(name = "rapt-poller")]
#[command(about = "Forward RAPT Pill telemetry to ferment-watch")]
#[command(version)]
struct Args {
    /// RAPT account username (e-mail)
    #[arg(long, env = "RAPT_USERNAME")]
    username: String,

    /// RAPT API secret generated in the RAPT portal
    #[arg(long, env = "RAPT_API_SECRET", hide_env_values = true)]
    api_secret: String,

    /// Hydrometer id (see --list-devices)
    #[arg(long, env = "RAPT_DEVICE_ID", required_unless_present = "list_devices")]
    device_id: Option<String>,

    /// ferment-watch server root
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8000")]
    backend_url: String,

    /// Seconds between sync cycles
    #[arg(long, default_value_t = POLLER_INTERVAL_SECS)]
    interval_secs: u64,

    /// Hours of telemetry fetched per cycle
    #[arg(long, default_value_t = POLLER_LOOKBACK_HOURS)]
    lookback_hours: i64,

    /// Run one sync cycle and exit
    #[arg(long)]
    once: bool,

    /// Print the hydrometers on the account and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let timeout = Duration::from_secs(POLLER_HTTP_TIMEOUT_SECS);
    let rapt = RaptClient::new(&args.username, &args.api_secret, timeout)?;

    if args.list_devices {
        let devices = list_devices(&rapt).await?;
        print_devices(&devices);
        return Ok(());
    }

    let device_id = args.device_id.clone().context("--device-id is required")?;
    let backend = BackendClient::new(&args.backend_url, timeout)?;
    let lookback = chrono::Duration::hours(args.lookback_hours);

    info!("🚀 RAPT poller started");
    info!("   Backend: {}", backend.ingest_url());
    info!("   Device:  {}", device_id);

    if args.once {
        return match sync_once(&rapt, &backend, &device_id, lookback).await {
            Ok(outcome) => {
                report(&outcome);
                Ok(())
            }
            Err(e) => Err(e.into()),
        };
    }

    info!("   Interval: {}s (Ctrl+C to stop)", args.interval_secs);

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, stopping poller...");
        shutdown_token.cancel();
    });

    let mut iteration: u64 = 0;
    loop {
        iteration += 1;
        info!("📍 Sync #{}", iteration);

        let wait = match sync_once(&rapt, &backend, &device_id, lookback).await {
            Ok(outcome) => {
                report(&outcome);
                Duration::from_secs(args.interval_secs)
            }
            Err(e) => {
                error!(error = %e, "Sync failed, retrying in {}s", POLLER_RETRY_SECS);
                Duration::from_secs(POLLER_RETRY_SECS)
            }
        };

        tokio::select! {
            () = cancel_token.cancelled() => break,
            () = tokio::time::sleep(wait) => {}
        }
    }

    info!("Poller stopped");
    Ok(())
}

fn report(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Forwarded { reading, alerts } => info!(
            gravity = reading.gravity,
            temperature = reading.temperature,
            alerts,
            "🎉 Sync complete"
        ),
        SyncOutcome::NoTelemetry => warn!("⚠️  No telemetry in the lookback window"),
    }
}

fn print_devices(devices: &[Hydrometer]) {
    if devices.is_empty() {
        println!("No hydrometers on this account");
        return;
    }
    for (i, device) in devices.iter().enumerate() {
        println!("📱 #{} {}", i + 1, device.display_name());
        println!("   Device ID: {}", device.id);
        println!("   MAC:       {}", device.mac.as_deref().unwrap_or("n/a"));
        println!("   Status:    {}", if device.is_online { "🟢 online" } else { "🔴 offline" });
    }
    println!();
    println!("Pass the Device ID as --device-id or RAPT_DEVICE_ID");
}
