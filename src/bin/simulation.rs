//! Fermentation Simulation
//!
//! Drives a synthetic fermentation through the alert engine and prints every
//! alert it dispatches. Gravity follows a logistic decay from OG to FG with
//! Gaussian sensor noise; temperature carries an exotherm bump that fades as
//! activity slows.
//!
//! # Usage
//! ```bash
//! ./simulation --days 10 --profile ale --seed 42
//! ./simulation --og 1.062 --fg 1.012 --noise 0.0003 --report
//! ```

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::sync::Arc;

use ferment_watch::config::{AnalysisConfig, ProfileConfig};
use ferment_watch::{AlertEngine, InMemoryStore, LogNotifier, NewBatch, SensorSample};

// ============================================================================
// Fermentation Constants
// ============================================================================

/// Logistic steepness (per hour)
const DECAY_RATE: f64 = 0.07;
/// Hours until half the extract is gone
const MIDPOINT_HOURS: f64 = 60.0;
/// Peak exotherm above the set temperature (°C)
const EXOTHERM_C: f64 = 2.5;
/// Temperature noise (°C, one sigma)
const TEMP_NOISE_C: f64 = 0.05;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "ferment-simulation")]
#[command(about = "Synthetic fermentation run through the ferment-watch alert engine")]
#[command(version = "1.0")]
struct Args {
    /// Simulated duration in days
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=60))]
    days: u32,

    /// Minutes between readings
    #[arg(short, long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=720))]
    interval_minutes: u32,

    /// Yeast profile (must exist in the profile table)
    #[arg(short, long, default_value = "ale")]
    profile: String,

    /// Original gravity
    #[arg(long, default_value = "1.050")]
    og: f64,

    /// Target final gravity
    #[arg(long, default_value = "1.010")]
    fg: f64,

    /// Fermentation set temperature (°C)
    #[arg(long, default_value = "19.0")]
    temperature: f64,

    /// Gravity sensor noise (SG, one sigma)
    #[arg(long, default_value = "0.0001")]
    noise: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Print the final analysis report as JSON
    #[arg(long)]
    report: bool,
}

struct Fermentation {
    rng: StdRng,
    gravity_noise: Normal<f64>,
    temp_noise: Normal<f64>,
    og: f64,
    fg: f64,
    set_temperature: f64,
}

impl Fermentation {
    fn new(args: &Args) -> Result<Self> {
        let rng = match args.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            gravity_noise: Normal::new(0.0, args.noise).map_err(|e| anyhow!("invalid --noise: {e}"))?,
            temp_noise: Normal::new(0.0, TEMP_NOISE_C).map_err(|e| anyhow!("invalid noise: {e}"))?,
            og: args.og,
            fg: args.fg,
            set_temperature: args.temperature,
        })
    }

    /// (gravity, temperature) at `hours` after pitching.
    fn sample(&mut self, hours: f64) -> (f64, f64) {
        let progress = 1.0 / (1.0 + (-DECAY_RATE * (hours - MIDPOINT_HOURS)).exp());
        let gravity = self.og - (self.og - self.fg) * progress;

        // activity is the derivative of progress, peaking at the midpoint
        let activity = 4.0 * progress * (1.0 - progress);
        let temperature = self.set_temperature + EXOTHERM_C * activity;

        (
            gravity + self.gravity_noise.sample(&mut self.rng),
            temperature + self.temp_noise.sample(&mut self.rng),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut fermentation = Fermentation::new(&args)?;

    let engine = AlertEngine::with_store(
        Arc::new(InMemoryStore::new()),
        Arc::new(LogNotifier),
        AnalysisConfig::default(),
        ProfileConfig::default(),
    );

    let start = Utc::now() - Duration::days(i64::from(args.days));
    let batch = engine.register_batch(NewBatch {
        name: format!("Simulated {}", args.profile),
        yeast_profile: args.profile.clone(),
        og: args.og,
        fg_target: args.fg,
        temp_target: args.temperature + 2.0,
        started_at: Some(start),
    })?;

    println!("🍺 Simulating batch {} ({}) for {} days", batch.id, batch.yeast_profile, args.days);
    println!("   OG {:.3} → FG {:.3}, reading every {} min", args.og, args.fg, args.interval_minutes);
    println!();

    let steps = args.days * 24 * 60 / args.interval_minutes;
    let mut total_alerts = 0;
    for step in 0..=steps {
        let minutes = i64::from(step) * i64::from(args.interval_minutes);
        let hours = minutes as f64 / 60.0;
        let (gravity, temperature) = fermentation.sample(hours);

        let sample = SensorSample {
            timestamp: start + Duration::minutes(minutes),
            gravity,
            temperature,
            battery: (100.0 - hours * 0.05).max(0.0),
        };
        let alerts = engine.process_reading(batch.id, sample).await?;

        for alert in alerts {
            total_alerts += 1;
            println!(
                "[day {:>4.1}] {:<24} G={:.4} T={:.1}°C",
                hours / 24.0,
                alert.kind.to_string(),
                gravity,
                temperature
            );
        }
    }

    let final_batch = engine.get_batch(batch.id)?;
    println!();
    println!("✅ {} readings, {} alerts, final status: {}", steps + 1, total_alerts, final_batch.status);

    if args.report {
        let report = engine.analyze(batch.id)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
