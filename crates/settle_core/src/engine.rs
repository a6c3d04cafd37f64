//! Per-settlement tick entry point.

use crate::catalog::GameContent;
use crate::construction::CompletedProject;
use crate::types::{DisasterEvent, Event, SettlementState};
use crate::{construction, disaster, ledger, population};
use rand::Rng;
use smallvec::SmallVec;

/// Everything one settlement tick produced. `missing_defs` are catalog ids
/// that failed to resolve (treated as zero contribution); the caller logs
/// them rather than aborting the tick.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub events: Vec<Event>,
    pub completed: Option<CompletedProject>,
    pub missing_defs: SmallVec<[String; 2]>,
    pub impact_damage: f32,
}

/// Advance one settlement by the wall-clock time since its last tick.
///
/// Order of operations (later steps consume earlier outputs):
/// 1. Resource Ledger — production/consumption applied to storage.
/// 2. Population Model — growth and happiness from the ledger outcome.
/// 3. Construction Queue — head project accrues time; completions mutate
///    structures and refresh derived capacity/rates immediately.
/// 4. Disaster damage — partial structure damage while an event is in
///    IMPACT over this settlement's world.
///
/// A zero-elapsed call changes nothing. Returns all events produced.
pub fn tick_settlement(
    settlement: &mut SettlementState,
    content: &GameContent,
    active_disaster: Option<&DisasterEvent>,
    now_ms: u64,
    rng: &mut impl Rng,
) -> TickOutcome {
    let elapsed_ms = now_ms.saturating_sub(settlement.last_tick_ms);
    if elapsed_ms == 0 {
        return TickOutcome::default();
    }
    let elapsed_secs = elapsed_ms as f32 / 1000.0;
    settlement.last_tick_ms = now_ms;

    let mut events = Vec::new();

    let delta = ledger::apply_production_tick(settlement, content, elapsed_secs, &mut events);
    population::advance_population(settlement, &delta.rates, content, elapsed_secs, &mut events);
    let completed = construction::advance(settlement, content, elapsed_secs, &mut events);

    let impact_damage = active_disaster.map_or(0.0, |event| {
        disaster::apply_impact_damage(settlement, event, &content.disasters, elapsed_secs, rng)
    });

    TickOutcome {
        events,
        completed,
        missing_defs: delta.missing_defs,
        impact_damage,
    }
}
