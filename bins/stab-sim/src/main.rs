//! Stability engine simulator.
//!
//! Funds a population of accounts, drives random transfers against a
//! simulated clock, and runs the health driver alongside with a synthetic
//! metrics profile. Prints a JSON summary with the final snapshot digest.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use stab_core::constants::PPM;
use stab_core::error::{StabilityError, TransferError};
use stab_core::types::{AccountId, ChainId, NetworkMetrics, SettlementDirection, Timestamp};
use stab_engine::driver::unix_now;
use stab_engine::{run_health_loop, Settings, StabilityEngine};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Profile {
    /// Healthy network throughout.
    Calm,
    /// Participation collapses mid-run, then recovers.
    Stress,
}

#[derive(Parser, Debug)]
#[command(name = "stab-sim", version, about = "Token stability engine simulator")]
struct Args {
    /// Settings file (TOML, YAML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of funded user accounts
    #[arg(long, default_value_t = 20)]
    accounts: usize,

    /// Simulation rounds
    #[arg(long, default_value_t = 96)]
    rounds: u64,

    /// Random transfers attempted per round
    #[arg(long, default_value_t = 10)]
    transfers_per_round: usize,

    /// Simulated seconds per round
    #[arg(long, default_value_t = 3_600)]
    step_secs: u64,

    /// Wall-clock milliseconds between rounds and between health ticks
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,

    /// Initial balance of each user account
    #[arg(long, default_value_t = 1_000_000)]
    initial_balance: u64,

    /// RNG seed
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Synthetic network metrics profile
    #[arg(long, value_enum, default_value_t = Profile::Stress)]
    profile: Profile,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[derive(Debug, Default)]
struct Tally {
    committed: u64,
    breaker_rejected: u64,
    insufficient: u64,
    other_rejected: u64,
    surcharged: u64,
    settlements: u64,
    bridged: u64,
}

impl Tally {
    fn record(&mut self, result: &Result<(), StabilityError>) {
        match result {
            Ok(()) => self.committed += 1,
            Err(StabilityError::Transfer(TransferError::CircuitBreakerRejected { .. })) => {
                self.breaker_rejected += 1
            }
            Err(StabilityError::Transfer(TransferError::InsufficientEffectiveBalance { .. })) => {
                self.insufficient += 1
            }
            Err(e) => {
                debug!(error = %e, "operation rejected");
                self.other_rejected += 1
            }
        }
    }
}

/// Participation ratio for `profile` at `progress` (0..=PPM of the run).
fn participation_ppm(profile: Profile, progress: u64) -> u64 {
    match profile {
        Profile::Calm => PPM,
        Profile::Stress => {
            // V-shaped dip to 5% at the midpoint.
            let distance = progress.abs_diff(PPM / 2);
            (PPM / 20 + distance * 2 * (PPM - PPM / 20) / PPM).min(PPM)
        }
    }
}

fn synthetic_metrics(profile: Profile, progress: u64, seed: u64) -> NetworkMetrics {
    let mut rng = StdRng::seed_from_u64(seed ^ progress);
    let participants_target = 10_000;
    NetworkMetrics {
        participants_observed: participation_ppm(profile, progress) * participants_target / PPM,
        participants_target,
        volume_observed: rng.gen_range(800_000..1_200_000),
        volume_target: 1_000_000,
        reserve_observed: 2 * PPM,
        reserve_required: PPM,
        market_pressure_ppm: rng.gen_range(-100_000..100_000),
        performance_bps: rng.gen_range(9_000..=10_000),
        cross_chain_volume: rng.gen_range(0..50_000),
    }
}

fn user(i: usize) -> AccountId {
    AccountId::new(format!("user-{i}"))
}

async fn run_workload(
    engine: &StabilityEngine,
    args: &Args,
    clock: &AtomicU64,
    mut rng: StdRng,
) -> Tally {
    let mut tally = Tally::default();
    let chain = ChainId("sidechain".into());
    for round in 0..args.rounds {
        let now = clock.fetch_add(args.step_secs, Ordering::SeqCst) + args.step_secs;
        for _ in 0..args.transfers_per_round {
            let from = rng.gen_range(0..args.accounts);
            let to = (from + rng.gen_range(1..args.accounts)) % args.accounts;
            let amount = rng.gen_range(1..=args.initial_balance / 20);
            let result = engine.transfer(&user(from), &user(to), amount, now);
            if let Ok(receipt) = &result {
                if receipt.surcharge > 0 {
                    tally.surcharged += 1;
                }
            }
            tally.record(&result.map(|_| ()));
        }

        // Occasional fiat settlement and bridge traffic.
        let who = user(rng.gen_range(0..args.accounts));
        if rng.gen_bool(0.3) {
            let direction = if rng.gen_bool(0.5) {
                SettlementDirection::Onramp
            } else {
                SettlementDirection::Offramp
            };
            let result = engine
                .report_settlement(&who, rng.gen_range(1_000..50_000), direction, now)
                .map(|_| ());
            if result.is_ok() {
                tally.settlements += 1;
            }
        }
        if rng.gen_bool(0.1) {
            let result = engine
                .bridge_outbound(&who, &chain, rng.gen_range(1_000..20_000), now)
                .map(|_| ());
            if result.is_ok() {
                tally.bridged += 1;
            }
            tally.record(&result);
        }

        debug!(round, now, committed = tally.committed, "round complete");
        tokio::time::sleep(Duration::from_millis(args.tick_ms)).await;
    }
    tally
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);
    anyhow::ensure!(args.accounts >= 2, "need at least two accounts");
    anyhow::ensure!(args.rounds > 0 && args.step_secs > 0, "rounds and step must be positive");
    anyhow::ensure!(args.initial_balance >= 20, "initial balance must be at least 20");

    let settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    let genesis = unix_now();
    let engine = Arc::new(
        StabilityEngine::new(settings.owner.clone(), settings.engine.clone(), genesis)
            .context("initializing engine")?,
    );
    let owner = settings.owner.clone();
    engine
        .open_exempt_account(&owner, &AccountId::from("reserve"), genesis)
        .context("opening reserve")?;
    for i in 0..args.accounts {
        engine
            .credit(&owner, &user(i), args.initial_balance, genesis)
            .with_context(|| format!("funding {}", user(i)))?;
    }
    info!(
        accounts = args.accounts,
        rounds = args.rounds,
        profile = ?args.profile,
        seed = args.seed,
        "simulation starting"
    );

    let clock = Arc::new(AtomicU64::new(genesis));
    let span = args.rounds * args.step_secs;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = {
        let clock = Arc::clone(&clock);
        let (profile, seed) = (args.profile, args.seed);
        let metrics = move |now: Timestamp| {
            let progress = now.saturating_sub(genesis).min(span) as u128 * PPM as u128 / span as u128;
            synthetic_metrics(profile, progress as u64, seed)
        };
        tokio::spawn(run_health_loop(
            Arc::clone(&engine),
            metrics,
            Duration::from_millis(args.tick_ms),
            move || clock.load(Ordering::SeqCst),
            shutdown_rx,
        ))
    };

    let rng = StdRng::seed_from_u64(args.seed);
    let tally = tokio::select! {
        tally = run_workload(&engine, &args, &clock, rng) => tally,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; reporting partial results");
            Tally::default()
        }
    };

    shutdown_tx.send(true).ok();
    let ticks = driver.await.context("health driver panicked")?;

    let snapshot = engine.network_health();
    let pool = engine.fee_pool();
    let summary = json!({
        "rounds": args.rounds,
        "ticks": ticks,
        "committed": tally.committed,
        "surcharged": tally.surcharged,
        "rejected": {
            "breaker": tally.breaker_rejected,
            "insufficient_balance": tally.insufficient,
            "other": tally.other_rejected,
        },
        "settlements": tally.settlements,
        "bridged_out": tally.bridged,
        "accounts": engine.ledger().len(),
        "raw_supply": engine.ledger().total_raw_balance().to_string(),
        "fee_pool": pool,
        "epoch": engine.epoch_stats(),
        "snapshot": &*snapshot,
        "snapshot_digest": hex::encode(snapshot.digest()),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!("simulation complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text. Logs go to stderr so the JSON summary on
/// stdout stays clean.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
