//! Population Model: growth/decline, happiness drift, capacity from
//! housing, and casualty application.

use crate::catalog::{level_multiplier, GameContent};
use crate::types::{Event, ResourceRates, SettlementState};

#[derive(Debug, Clone, Copy, Default)]
pub struct PopulationDelta {
    pub growth: f32,
    pub happiness_shift: f32,
    pub capacity: u32,
}

/// Capacity = base (10) + intact housing `population_capacity` modifiers at
/// their current level.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn population_capacity(settlement: &SettlementState, content: &GameContent) -> u32 {
    let mut capacity = content.constants.base_population_capacity;
    for structure in settlement.structures.iter().filter(|s| s.is_intact()) {
        if let Some(def) = content.structure(&structure.def) {
            let scaled = def.modifiers.population_capacity as f32
                * level_multiplier(structure.level, &content.constants);
            capacity += scaled.round() as u32;
        }
    }
    capacity
}

/// Happiness contribution from intact comfort structures.
fn structure_happiness(settlement: &SettlementState, content: &GameContent) -> f32 {
    settlement
        .structures
        .iter()
        .filter(|s| s.is_intact())
        .filter_map(|s| {
            content
                .structure(&s.def)
                .map(|def| def.modifiers.happiness * level_multiplier(s.level, &content.constants))
        })
        .sum()
}

/// Advance population and happiness for one tick.
///
/// Growth scales with happiness and capacity headroom; it turns negative
/// under starvation (food or water at zero) or when happiness falls below
/// the emigration threshold. Happiness drifts toward a baseline adjusted by
/// resource sufficiency, decaying disaster trauma, and structure modifiers.
pub fn advance_population(
    settlement: &mut SettlementState,
    rates: &ResourceRates,
    content: &GameContent,
    elapsed_secs: f32,
    events: &mut Vec<Event>,
) -> PopulationDelta {
    let c = &content.constants;
    let before_capacity = settlement.population.capacity;
    let capacity = population_capacity(settlement, content);
    settlement.population.capacity = capacity;

    let before_heads = settlement.population.headcount();
    let before_happiness = settlement.population.happiness;

    // Trauma decays linearly toward zero.
    settlement.trauma = (settlement.trauma - c.trauma_decay_per_sec * elapsed_secs).max(0.0);

    // Sufficiency: producing at least what is consumed, with stock on hand.
    let starving =
        settlement.storage.amounts.food <= 0.0 || settlement.storage.amounts.water <= 0.0;
    let sufficient = !starving
        && rates.production.food >= rates.consumption.food
        && rates.production.water >= rates.consumption.water;
    let sufficiency = if starving {
        -c.shortage_happiness_penalty
    } else if sufficient {
        c.sufficiency_happiness_bonus
    } else {
        0.0
    };

    let target = (c.happiness_baseline + sufficiency + structure_happiness(settlement, content)
        - settlement.trauma)
        .clamp(0.0, 100.0);
    let drift = (target - settlement.population.happiness)
        * (c.happiness_drift_per_sec * elapsed_secs).min(1.0);
    settlement.population.happiness = (settlement.population.happiness + drift).clamp(0.0, 100.0);

    let pop = settlement.population.current;
    let growth = if starving {
        -c.starvation_decline_per_sec * pop * elapsed_secs
    } else if settlement.population.happiness < c.emigration_threshold {
        -c.emigration_decline_per_sec * pop * elapsed_secs
    } else {
        let headroom = (capacity as f32 - pop).max(0.0) / (capacity.max(1) as f32);
        c.growth_rate_per_sec * (settlement.population.happiness / 100.0)
            * headroom
            * pop
            * elapsed_secs
    };

    settlement.population.current = (pop + growth).clamp(0.0, capacity as f32);

    let happiness_shift = settlement.population.happiness - before_happiness;
    if settlement.population.headcount() != before_heads
        || happiness_shift.abs() >= 0.5
        || capacity != before_capacity
    {
        events.push(Event::PopulationUpdate {
            settlement: settlement.id.clone(),
            current: settlement.population.headcount(),
            capacity,
            happiness: settlement.population.happiness,
        });
    }

    PopulationDelta {
        growth: settlement.population.current - pop,
        happiness_shift,
        capacity,
    }
}

/// Reduce population by `count`, flooring at zero. Returns the casualties
/// actually applied, for aftermath reporting. Invoked by the disaster
/// machine, never self-triggered.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn apply_casualties(settlement: &mut SettlementState, count: u32) -> u32 {
    let applied = count.min(settlement.population.headcount());
    settlement.population.current = (settlement.population.current - applied as f32).max(0.0);
    applied
}
