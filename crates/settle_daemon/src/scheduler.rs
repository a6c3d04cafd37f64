//! Tick scheduler: wakes on a fixed cadence, steps disaster phases first
//! (single writer), then simulates every due settlement concurrently.
//!
//! Each settlement tick is load → simulate → commit against the version the
//! snapshot was read at. A failed commit loses nothing but that pass; the
//! settlement catches up on elapsed time the next time it is processed.

use crate::state::AppState;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use settle_core::{
    advance_phase, resolve_aftermath, tick_settlement, AftermathSummary, DisasterEvent,
    DisasterRecord, DisasterStatus, Event, ResourceAmounts, ResourceKind, SettlementId,
};
use settle_store::{SettlementStore, StoreError};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;

pub fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Per-settlement deterministic rng: same seed, settlement, and pass time
/// always roll the same values, which keeps replays and tests stable.
fn rng_for(seed: u64, id: &SettlementId, now_ms: u64) -> ChaCha8Rng {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    id.hash(&mut hasher);
    now_ms.hash(&mut hasher);
    ChaCha8Rng::seed_from_u64(hasher.finish())
}

pub async fn run_tick_driver(state: AppState) {
    let mut interval =
        tokio::time::interval(Duration::from_millis(state.config.pass_interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if state.paused.load(Ordering::Relaxed) {
            continue;
        }
        run_pass(&state, wall_clock_ms()).await;
        state.passes.fetch_add(1, Ordering::Relaxed);
    }
}

/// One scheduler pass at an explicit wall-clock time. Factored out of the
/// driver loop so tests can drive simulated time directly.
pub async fn run_pass(state: &AppState, now_ms: u64) {
    advance_disasters(state, now_ms).await;
    tick_due_settlements(state, now_ms).await;
}

/// Step every unresolved disaster forward by at most one phase. The update
/// is claimed (versioned write) before settlement effects are applied, so a
/// lost race can never double-apply an aftermath.
async fn advance_disasters(state: &AppState, now_ms: u64) {
    for (mut event, version) in state.store.unresolved_disasters().await {
        // Orphaned events (no settlements left in the world) have nothing
        // to affect; force-resolve them instead of walking the phases.
        if state.store.settlements_in_world(&event.world).await.is_empty() {
            tracing::warn!(disaster = %event.id, world = %event.world, "orphaned disaster force-resolved");
            event.status = DisasterStatus::Resolved;
            event.resolved_at_ms = Some(now_ms);
            if let Err(err) = state.store.update_disaster(event.clone(), version).await {
                tracing::warn!(disaster = %event.id, %err, "force-resolve lost, will retry");
            }
            continue;
        }

        let Some(change) = advance_phase(&mut event, now_ms, &state.content.disasters) else {
            continue;
        };
        if let Err(err) = state.store.update_disaster(event.clone(), version).await {
            tracing::warn!(disaster = %event.id, %err, "disaster phase step lost, will retry");
            continue;
        }
        tracing::info!(
            disaster = %event.id,
            world = %event.world,
            from = ?change.from,
            to = ?change.to,
            "disaster phase change",
        );
        match change.to {
            DisasterStatus::Impact => {
                state.bus.publish(
                    &event.world,
                    Event::DisasterImpact {
                        disaster: event.id.clone(),
                    },
                    now_ms,
                );
            }
            DisasterStatus::Aftermath => run_aftermath(state, &event, now_ms).await,
            DisasterStatus::Warning | DisasterStatus::Resolved => {}
        }
    }
}

#[derive(Default)]
struct AftermathTotals {
    casualties: u32,
    structures_damaged: u32,
    structures_destroyed: u32,
    resources_lost: ResourceAmounts,
    happiness_loss: f32,
    resilience_gained: u32,
}

impl AftermathTotals {
    fn add(&mut self, summary: &AftermathSummary) {
        self.casualties += summary.casualties;
        self.structures_damaged += summary.structures_damaged;
        self.structures_destroyed += summary.structures_destroyed;
        for kind in ResourceKind::ALL {
            *self.resources_lost.get_mut(kind) += summary.resources_lost.get(kind);
        }
        // Identical across settlements of one event; keep the last.
        self.happiness_loss = summary.happiness_loss;
        self.resilience_gained = summary.resilience_gained;
    }
}

/// Apply aftermath effects to every settlement in the affected world and
/// publish one aggregated report for the event.
async fn run_aftermath(state: &AppState, event: &DisasterEvent, now_ms: u64) {
    let ids = state.store.settlements_in_world(&event.world).await;
    let mut totals = AftermathTotals::default();
    for id in ids {
        match apply_aftermath_to(state, &id, event, now_ms).await {
            Ok(summary) => totals.add(&summary),
            Err(err) => {
                tracing::warn!(settlement = %id, disaster = %event.id, %err, "aftermath skipped");
            }
        }
    }

    state.bus.publish(
        &event.world,
        Event::DisasterAftermath {
            disaster: event.id.clone(),
            casualties: totals.casualties,
            structures_damaged: totals.structures_damaged,
            structures_destroyed: totals.structures_destroyed,
            resources_lost: totals.resources_lost,
            happiness_loss: totals.happiness_loss,
            resilience_gained: totals.resilience_gained,
        },
        now_ms,
    );
}

/// The phase transition has already been claimed when this runs, so the
/// effects must land here or be lost. A commit beaten by a concurrent
/// writer (an HTTP build request racing the same settlement) is reapplied
/// against fresh state; the rng is keyed on (seed, id, now_ms), so a
/// reapply rolls the same outcome.
async fn apply_aftermath_to(
    state: &AppState,
    id: &SettlementId,
    event: &DisasterEvent,
    now_ms: u64,
) -> Result<AftermathSummary, StoreError> {
    let mut last_err = StoreError::Unavailable("aftermath commit retries exhausted".to_string());
    for _ in 0..3 {
        let loaded = state.store.load_settlement(id).await?;
        let mut settlement = loaded.state;
        let mut rng = rng_for(state.seed, id, now_ms);
        let summary = resolve_aftermath(&mut settlement, event, &state.content, &mut rng);
        match state
            .store
            .commit_settlement(settlement, loaded.version)
            .await
        {
            Ok(_) => {
                state
                    .store
                    .append_history(
                        id,
                        DisasterRecord {
                            disaster: event.id.clone(),
                            kind: event.kind,
                            severity_level: event.severity_level(),
                            casualties: summary.casualties,
                            structures_damaged: summary.structures_damaged,
                            structures_destroyed: summary.structures_destroyed,
                            resources_lost: summary.resources_lost,
                            happiness_loss: summary.happiness_loss,
                            resilience_gained: summary.resilience_gained,
                            recorded_at_ms: now_ms,
                        },
                    )
                    .await?;
                return Ok(summary);
            }
            Err(err @ (StoreError::VersionConflict { .. } | StoreError::Unavailable(_))) => {
                tracing::debug!(settlement = %id, %err, "aftermath commit lost, reapplying");
                last_err = err;
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err)
}

/// Simulate every active settlement whose interval has elapsed, bounded by
/// the configured parallelism and per-settlement time budget.
async fn tick_due_settlements(state: &AppState, now_ms: u64) {
    let ids = state
        .store
        .active_settlements(now_ms, state.config.activity_horizon_ms)
        .await;
    let semaphore = Arc::new(Semaphore::new(state.config.parallelism.max(1)));
    let mut handles = Vec::with_capacity(ids.len());

    for id in ids {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permit;
            let budget = Duration::from_millis(state.config.settlement_timeout_ms);
            match tokio::time::timeout(budget, tick_one(&state, &id, now_ms)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(settlement = %id, %err, "settlement tick failed, skipping");
                }
                Err(_) => tracing::warn!(settlement = %id, "settlement tick timed out"),
            }
        }));
    }

    for handle in handles {
        if handle.await.is_err() {
            tracing::error!("settlement tick task panicked");
        }
    }
}

/// Transactional tick of a single settlement: snapshot, simulate against
/// the snapshot, commit against the snapshot's version.
async fn tick_one(state: &AppState, id: &SettlementId, now_ms: u64) -> Result<(), StoreError> {
    let loaded = state.store.load_settlement(id).await?;
    if now_ms.saturating_sub(loaded.state.last_tick_ms) < state.config.settlement_interval_ms {
        return Ok(());
    }

    let mut settlement = loaded.state;
    let active_disaster = state
        .store
        .active_disaster_for_world(&settlement.world)
        .await;
    let mut rng = rng_for(state.seed, id, now_ms);

    let outcome = tick_settlement(
        &mut settlement,
        &state.content,
        active_disaster.as_ref(),
        now_ms,
        &mut rng,
    );
    for def in &outcome.missing_defs {
        tracing::warn!(settlement = %id, def, "unknown structure def, contributes nothing");
    }

    let world = settlement.world.clone();
    state
        .store
        .commit_settlement(settlement, loaded.version)
        .await?;
    state.bus.publish_all(&world, outcome.events, now_ms);
    Ok(())
}
