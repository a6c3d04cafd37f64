//! Disaster State Machine: WARNING → IMPACT → AFTERMATH → RESOLVED.
//!
//! Phase advancement is a single-writer step (the scheduler runs it once
//! per pass, ahead of per-settlement processing); settlements only *read*
//! the event while applying impact damage. Casualty and summary math is
//! deliberately batched into the IMPACT→AFTERMATH transition so the
//! aftermath report stays coherent and nothing is double-counted.

use crate::catalog::{DisasterTuning, GameContent};
use crate::population;
use crate::types::{
    DisasterEvent, DisasterStatus, ResourceAmounts, ResourceKind, SettlementState, SeverityLevel,
    WorldId,
};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisasterError {
    #[error("world '{0}' already has an unresolved disaster")]
    RegionBusy(WorldId),
    #[error("user severity scale is 1-5, got {0}")]
    InvalidUserSeverity(u8),
}

/// User-facing 1–5 scale → internal 0–100 ranges.
pub const USER_SEVERITY_RANGES: [(f32, f32); 5] = [
    (20.0, 25.0),
    (30.0, 40.0),
    (45.0, 55.0),
    (60.0, 75.0),
    (80.0, 100.0),
];

/// Roll an internal severity from the user scale, uniform within the band.
pub fn severity_from_user_scale(scale: u8, rng: &mut impl Rng) -> Result<f32, DisasterError> {
    let index = scale
        .checked_sub(1)
        .filter(|i| (*i as usize) < USER_SEVERITY_RANGES.len())
        .ok_or(DisasterError::InvalidUserSeverity(scale))?;
    let (lo, hi) = USER_SEVERITY_RANGES[index as usize];
    Ok(rng.gen_range(lo..=hi))
}

/// MILD (<30), MODERATE (30–55), MAJOR (55–80), CATASTROPHIC (≥80).
pub fn severity_level(severity: f32) -> SeverityLevel {
    if severity < 30.0 {
        SeverityLevel::Mild
    } else if severity < 55.0 {
        SeverityLevel::Moderate
    } else if severity < 80.0 {
        SeverityLevel::Major
    } else {
        SeverityLevel::Catastrophic
    }
}

/// Resilience gained by surviving a disaster: +5 base, more for higher tiers.
pub fn resilience_award(level: SeverityLevel) -> u32 {
    match level {
        SeverityLevel::Mild => 5,
        SeverityLevel::Moderate => 8,
        SeverityLevel::Major => 12,
        SeverityLevel::Catastrophic => 20,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: DisasterStatus,
    pub to: DisasterStatus,
}

/// Advance the event's status by at most one step, driven by wall-clock
/// comparison. Transitions are strictly forward; a RESOLVED event never
/// moves again.
pub fn advance_phase(
    event: &mut DisasterEvent,
    now_ms: u64,
    tuning: &DisasterTuning,
) -> Option<PhaseChange> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let grace_ms = (tuning.aftermath_grace_secs * 1000.0) as u64;
    let from = event.status;
    let to = match event.status {
        DisasterStatus::Warning if now_ms >= event.scheduled_at_ms => DisasterStatus::Impact,
        DisasterStatus::Impact
            if now_ms >= event.scheduled_at_ms + event.impact_duration_ms =>
        {
            event.aftermath_at_ms = Some(now_ms);
            DisasterStatus::Aftermath
        }
        DisasterStatus::Aftermath
            if event
                .aftermath_at_ms
                .is_some_and(|at| now_ms >= at + grace_ms) =>
        {
            event.resolved_at_ms = Some(now_ms);
            DisasterStatus::Resolved
        }
        _ => return None,
    };
    event.status = to;
    Some(PhaseChange { from, to })
}

/// Per-tick partial structure damage while the event is in IMPACT.
///
/// Damage is proportional to severity and the elapsed fraction of the
/// impact window, with randomized variance per structure. Casualties are
/// NOT applied here — they are computed once at the aftermath transition.
/// Returns total health points dealt this tick.
pub fn apply_impact_damage(
    settlement: &mut SettlementState,
    event: &DisasterEvent,
    tuning: &DisasterTuning,
    elapsed_secs: f32,
    rng: &mut impl Rng,
) -> f32 {
    if event.status != DisasterStatus::Impact || event.world != settlement.world {
        return 0.0;
    }

    let severity_frac = event.severity / 100.0;
    let per_sec = tuning.damage_health_per_sec_at_max * severity_frac;
    let variance = tuning.damage_variance;
    let mut dealt = 0.0;

    for structure in settlement.structures.iter_mut().filter(|s| s.is_intact()) {
        let roll = rng.gen_range((1.0 - variance)..=(1.0 + variance));
        let damage = (per_sec * elapsed_secs * roll).max(0.0);
        let applied = damage.min(structure.health);
        structure.health -= applied;
        dealt += applied;
    }
    dealt
}

/// Full summary of one disaster's effect on one settlement, computed at the
/// IMPACT→AFTERMATH transition.
#[derive(Debug, Clone, PartialEq)]
pub struct AftermathSummary {
    pub casualties: u32,
    pub structures_damaged: u32,
    pub structures_destroyed: u32,
    pub resources_lost: ResourceAmounts,
    pub happiness_loss: f32,
    pub resilience_gained: u32,
}

/// Apply aftermath effects to one settlement: casualties (a function of
/// severity, shelter capacity, and randomness), resource losses, the
/// happiness penalty, and the resilience award for surviving.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn resolve_aftermath(
    settlement: &mut SettlementState,
    event: &DisasterEvent,
    content: &GameContent,
    rng: &mut impl Rng,
) -> AftermathSummary {
    let tuning = &content.disasters;
    let severity_frac = event.severity / 100.0;
    let heads = settlement.population.headcount();

    // Shelter: housing capacity beyond the unsheltered base camp dampens
    // casualties.
    let shelter = population::population_capacity(settlement, content)
        .saturating_sub(content.constants.base_population_capacity);
    let shelter_frac = if heads == 0 {
        1.0
    } else {
        (shelter as f32 / heads as f32).min(1.0)
    };

    let variance = rng.gen_range((1.0 - tuning.casualty_variance)..=1.0);
    let casualty_frac = tuning.casualty_fraction_at_max
        * severity_frac
        * (1.0 - tuning.shelter_mitigation * shelter_frac)
        * variance;
    let casualties =
        population::apply_casualties(settlement, (heads as f32 * casualty_frac).floor() as u32);

    let loss_roll = rng.gen_range((1.0 - tuning.casualty_variance)..=1.0);
    let loss_frac = tuning.resource_loss_fraction_at_max * severity_frac * loss_roll;
    let resources_lost = settlement.storage.amounts.scaled(loss_frac);
    for kind in ResourceKind::ALL {
        let slot = settlement.storage.amounts.get_mut(kind);
        *slot = (*slot - resources_lost.get(kind)).max(0.0);
    }

    let happiness_loss = tuning.happiness_penalty_at_max * severity_frac;
    settlement.population.happiness = (settlement.population.happiness - happiness_loss).max(0.0);
    settlement.trauma += happiness_loss;

    let resilience_gained = resilience_award(severity_level(event.severity));
    settlement.resilience += resilience_gained;

    let structures_damaged = settlement
        .structures
        .iter()
        .filter(|s| s.is_damaged())
        .count() as u32;
    let structures_destroyed = settlement
        .structures
        .iter()
        .filter(|s| s.is_destroyed())
        .count() as u32;

    AftermathSummary {
        casualties,
        structures_damaged,
        structures_destroyed,
        resources_lost,
        happiness_loss,
        resilience_gained,
    }
}
