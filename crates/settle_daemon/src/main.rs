mod routes;
mod scheduler;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use settle_core::WorldId;
use settle_store::SettlementStore;
use state::{AppState, SchedulerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "settle_daemon", about = "Settlement simulation daemon")]
struct Args {
    #[arg(long, default_value = "./content")]
    content_dir: String,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
    /// Base RNG seed; per-settlement streams are derived from it.
    #[arg(long)]
    seed: Option<u64>,
    /// Scheduler wake-up cadence.
    #[arg(long, default_value_t = 100)]
    pass_interval_ms: u64,
    /// Minimum time between two ticks of the same settlement.
    #[arg(long, default_value_t = 1_000)]
    settlement_interval_ms: u64,
    /// Settlements simulated concurrently within one pass.
    #[arg(long, default_value_t = 16)]
    parallelism: usize,
    #[arg(long, default_value_t = 250)]
    settlement_timeout_ms: u64,
    /// Settlements idle longer than this stop ticking until touched again.
    #[arg(long, default_value_t = 3_600)]
    activity_horizon_secs: u64,
    /// Found this many settlements at startup, spread across --demo-worlds.
    #[arg(long, default_value_t = 0)]
    demo_settlements: usize,
    #[arg(long, default_value_t = 2)]
    demo_worlds: usize,
}

async fn seed_demo_settlements(state: &AppState, count: usize, worlds: usize) -> Result<()> {
    let now_ms = scheduler::wall_clock_ms();
    let mut rng = ChaCha8Rng::seed_from_u64(state.seed);
    let worlds: Vec<WorldId> = (1..=worlds.max(1))
        .map(|n| WorldId(format!("world_{n:04}")))
        .collect();
    for settlement in
        settle_world::found_demo_settlements(&state.content, count, &worlds, now_ms, &mut rng)
    {
        // Keep the id counter ahead of the pre-founded settlements.
        let _ = state.ids.settlement_id();
        state
            .store
            .insert_settlement(settlement, now_ms)
            .await
            .map_err(|err| anyhow::anyhow!("seeding demo settlement: {err}"))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("settle_daemon=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let content = settle_world::load_content(&args.content_dir)
        .with_context(|| format!("loading content from {}", args.content_dir))?;
    settle_world::validate_content(&content);
    tracing::info!(
        content_version = %content.content_version,
        structures = content.structures.len(),
        "content loaded",
    );

    let seed = args.seed.unwrap_or_else(rand::random);
    let config = SchedulerConfig {
        pass_interval_ms: args.pass_interval_ms,
        settlement_interval_ms: args.settlement_interval_ms,
        parallelism: args.parallelism,
        settlement_timeout_ms: args.settlement_timeout_ms,
        activity_horizon_ms: args.activity_horizon_secs * 1_000,
    };
    let state = AppState::new(content, seed, config);

    if args.demo_settlements > 0 {
        seed_demo_settlements(&state, args.demo_settlements, args.demo_worlds).await?;
        tracing::info!(count = args.demo_settlements, "demo settlements founded");
    }

    tokio::spawn(scheduler::run_tick_driver(state.clone()));

    let router = routes::make_router_with_cors(state, &args.cors_origin);
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, seed, "settle_daemon listening");
    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}
