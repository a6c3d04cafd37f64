use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use settle_core::{
    advance_phase, resolve_aftermath, severity_from_user_scale, tick_settlement, town_hall_level,
    DisasterEvent, DisasterId, DisasterKind, DisasterStatus, GameContent, SettlementState, WorldId,
};
use settle_world::{found_demo_settlements, load_content, validate_content};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "settle_cli", about = "Headless settlement simulation runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate settlements for a fixed number of logical seconds.
    Run {
        /// Logical seconds to simulate, stepped at 1s resolution.
        #[arg(long, default_value_t = 600)]
        seconds: u64,
        #[arg(long, default_value_t = 3)]
        settlements: usize,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 60)]
        print_every: u64,
        /// Schedule an earthquake warning at this logical second.
        #[arg(long)]
        disaster_at: Option<u64>,
        /// User severity scale (1-5) for the scheduled disaster.
        #[arg(long, default_value_t = 3)]
        disaster_scale: u8,
        /// Dump final settlement states as JSON to stdout.
        #[arg(long)]
        dump_state: bool,
    },
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn schedule_disaster(
    content: &GameContent,
    world: WorldId,
    scale: u8,
    now_ms: u64,
    rng: &mut ChaCha8Rng,
) -> Result<DisasterEvent> {
    let severity = severity_from_user_scale(scale, rng)
        .map_err(|err| anyhow::anyhow!("bad disaster scale: {err}"))?;
    let tuning = &content.disasters;
    Ok(DisasterEvent {
        id: DisasterId("disaster_0001".to_string()),
        world,
        kind: DisasterKind::Earthquake,
        severity,
        status: DisasterStatus::Warning,
        warning_issued_at_ms: now_ms,
        scheduled_at_ms: now_ms + (tuning.default_warning_secs * 1000.0) as u64,
        impact_duration_ms: (tuning.default_impact_secs * 1000.0) as u64,
        aftermath_at_ms: None,
        resolved_at_ms: None,
    })
}

fn run(
    seconds: u64,
    settlement_count: usize,
    content_dir: &str,
    seed: Option<u64>,
    print_every: u64,
    disaster_at: Option<u64>,
    disaster_scale: u8,
    dump_state: bool,
) -> Result<()> {
    let content = load_content(content_dir)?;
    validate_content(&content);

    let resolved_seed = seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(resolved_seed);
    let world = WorldId("world_0001".to_string());
    let mut settlements =
        found_demo_settlements(&content, settlement_count, &[world.clone()], 0, &mut rng);

    let mut disaster: Option<DisasterEvent> = None;

    println!(
        "Starting simulation: seconds={seconds} settlements={settlement_count} \
         seed={resolved_seed} content_version={}",
        content.content_version,
    );
    println!("{}", "-".repeat(80));

    for t in 1..=seconds {
        let now_ms = t * 1000;

        if disaster_at == Some(t) {
            let event = schedule_disaster(
                &content,
                world.clone(),
                disaster_scale,
                now_ms,
                &mut rng,
            )?;
            println!(
                "*** DISASTER WARNING: {} severity {:.0} at t={t} ***",
                event.kind.label(),
                event.severity,
            );
            disaster = Some(event);
        }

        if let Some(ref mut event) = disaster {
            if let Some(change) = advance_phase(event, now_ms, &content.disasters) {
                println!("*** DISASTER {:?} -> {:?} at t={t} ***", change.from, change.to);
                if change.to == DisasterStatus::Aftermath {
                    for settlement in &mut settlements {
                        let summary = resolve_aftermath(settlement, event, &content, &mut rng);
                        println!(
                            "    {}: casualties={} destroyed={} resilience=+{}",
                            settlement.id,
                            summary.casualties,
                            summary.structures_destroyed,
                            summary.resilience_gained,
                        );
                    }
                }
            }
        }

        for settlement in &mut settlements {
            let outcome =
                tick_settlement(settlement, &content, disaster.as_ref(), now_ms, &mut rng);
            for def in &outcome.missing_defs {
                eprintln!("warning: unknown structure def '{def}' contributed nothing");
            }
        }

        if t % print_every == 0 {
            print_status(t, &settlements, &content);
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done after {seconds}s:");
    print_status(seconds, &settlements, &content);

    if dump_state {
        println!(
            "{}",
            serde_json::to_string_pretty(&settlements).context("serializing final state")?
        );
    }

    Ok(())
}

fn print_status(t: u64, settlements: &[SettlementState], content: &GameContent) {
    for settlement in settlements {
        let resources = settlement.storage.amounts.floored();
        println!(
            "[t={t:05}] {id}  th={th}  pop={pop:3}/{cap:3}  happy={happy:5.1}  \
             food={food:6.0}  water={water:6.0}  wood={wood:6.0}  stone={stone:6.0}  \
             queue={queue}  resilience={res}",
            id = settlement.id,
            th = town_hall_level(settlement, content),
            pop = settlement.population.headcount(),
            cap = settlement.population.capacity,
            happy = settlement.population.happiness,
            food = resources.food,
            water = resources.water,
            wood = resources.wood,
            stone = resources.stone,
            queue = settlement.queue.len(),
            res = settlement.resilience,
        );
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            seconds,
            settlements,
            content_dir,
            seed,
            print_every,
            disaster_at,
            disaster_scale,
            dump_state,
        } => run(
            seconds,
            settlements,
            &content_dir,
            seed,
            print_every,
            disaster_at,
            disaster_scale,
            dump_state,
        ),
    }
}
