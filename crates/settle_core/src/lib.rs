//! `settle_core` — deterministic settlement simulation tick.
//!
//! No IO, no network, no clock. All randomness comes from the passed-in Rng;
//! all wall-clock inputs are explicit `now_ms` / `elapsed_secs` parameters.

mod catalog;
mod construction;
mod disaster;
mod engine;
mod ledger;
mod population;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use catalog::{
    level_multiplier, Constants, DisasterTuning, GameContent, Modifiers, Prereq, StructureCategory,
    StructureDef,
};
pub use construction::{
    advance, area_capacity, area_stats, enqueue, enqueue_upgrade, town_hall_level, AreaStats,
    BuildError, CompletedProject, CompletionResult,
};
pub use disaster::{
    advance_phase, apply_impact_damage, resolve_aftermath, severity_from_user_scale,
    severity_level, AftermathSummary, DisasterError, PhaseChange, USER_SEVERITY_RANGES,
};
pub use engine::{tick_settlement, TickOutcome};
pub use ledger::{apply_production_tick, current_rates, storage_capacity, ResourceDelta};
pub use population::{advance_population, apply_casualties, population_capacity, PopulationDelta};
pub use types::*;

#[cfg(test)]
mod tests;
