//! Resource Ledger: production/consumption rate computation and storage
//! mutation for one settlement tick.

use crate::catalog::{level_multiplier, GameContent, StructureCategory};
use crate::types::{Event, ResourceAmounts, ResourceKind, ResourceRates, SettlementState};
use smallvec::SmallVec;

/// Outcome of one ledger tick. `missing_defs` lists structure catalog ids
/// that could not be resolved — those structures contributed zero and the
/// caller is expected to log them.
#[derive(Debug, Clone, Default)]
pub struct ResourceDelta {
    pub rates: ResourceRates,
    pub changed: bool,
    pub missing_defs: SmallVec<[String; 2]>,
}

/// Per-kind storage ceiling: base plus intact storage-structure modifiers.
pub fn storage_capacity(settlement: &SettlementState, content: &GameContent) -> f32 {
    let mut capacity = content.constants.base_storage_capacity;
    for structure in settlement.structures.iter().filter(|s| s.is_intact()) {
        if let Some(def) = content.structure(&structure.def) {
            capacity += def.modifiers.storage_capacity
                * level_multiplier(structure.level, &content.constants);
        }
    }
    capacity
}

/// Current per-second production and consumption rates.
///
/// Production sums intact extractors: base rate × tile quality × level
/// multiplier. Consumption is the flat per-capita food/water draw.
pub fn current_rates(
    settlement: &SettlementState,
    content: &GameContent,
) -> (ResourceRates, SmallVec<[String; 2]>) {
    let mut missing: SmallVec<[String; 2]> = SmallVec::new();
    let mut production = ResourceAmounts::default();

    for structure in settlement.structures.iter().filter(|s| s.is_intact()) {
        let Some(def) = content.structure(&structure.def) else {
            missing.push(structure.def.clone());
            continue;
        };
        if def.category != StructureCategory::Extractor {
            continue;
        }
        let factor =
            settlement.tile_quality * level_multiplier(structure.level, &content.constants);
        for kind in ResourceKind::ALL {
            *production.get_mut(kind) += def.modifiers.production.get(kind) * factor;
        }
    }

    let heads = settlement.population.current.max(0.0);
    let consumption = ResourceAmounts {
        food: heads * content.constants.food_per_capita_per_sec,
        water: heads * content.constants.water_per_capita_per_sec,
        ..ResourceAmounts::default()
    };

    (
        ResourceRates {
            production,
            consumption,
        },
        missing,
    )
}

/// Apply one production tick: net delta = (production − consumption) ×
/// elapsed, added to storage and clamped to [0, capacity]. Emits a
/// `ResourceUpdate` only when a whole-unit quantity actually changed.
pub fn apply_production_tick(
    settlement: &mut SettlementState,
    content: &GameContent,
    elapsed_secs: f32,
    events: &mut Vec<Event>,
) -> ResourceDelta {
    let (rates, missing_defs) = current_rates(settlement, content);

    settlement.storage.capacity = storage_capacity(settlement, content);
    let capacity = settlement.storage.capacity;
    let before = settlement.storage.amounts.floored();

    for kind in ResourceKind::ALL {
        let net = rates.production.get(kind) - rates.consumption.get(kind);
        let slot = settlement.storage.amounts.get_mut(kind);
        *slot = (*slot + net * elapsed_secs).clamp(0.0, capacity);
    }

    let changed = settlement.storage.amounts.floored() != before;
    if changed {
        events.push(Event::ResourceUpdate {
            settlement: settlement.id.clone(),
            resources: settlement.storage.amounts.floored(),
            rates,
        });
    }

    ResourceDelta {
        rates,
        changed,
        missing_defs,
    }
}
