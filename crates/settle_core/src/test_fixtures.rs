//! Shared test fixtures for `settle_core` and downstream crates.
//!
//! `base_content()` provides a full catalog (town hall, housing, one
//! extractor per resource, comfort building) with compressed build times so
//! lifecycle tests stay fast. `base_settlement()` founds a settlement with
//! generous starting stock.

use crate::catalog::{
    Constants, DisasterTuning, GameContent, Modifiers, Prereq, StructureCategory, StructureDef,
};
use crate::types::{
    Counters, DisasterEvent, DisasterId, DisasterKind, DisasterStatus, PopulationState, ProfileId,
    ResourceAmounts, SettlementId, SettlementState, StorageState, StructureId, StructureState,
    WorldId,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

fn building(id: &str, area_cost: u32, modifiers: Modifiers) -> StructureDef {
    StructureDef {
        id: id.to_string(),
        name: id.to_string(),
        category: StructureCategory::Building,
        unique: false,
        area_cost,
        max_level: 5,
        base_cost: ResourceAmounts {
            wood: 20.0,
            stone: 10.0,
            ..ResourceAmounts::default()
        },
        cost_growth: 1.5,
        base_build_secs: 10.0,
        build_time_growth: 1.4,
        town_hall_level: 0,
        prereqs: vec![],
        modifiers,
    }
}

fn extractor(id: &str, production: ResourceAmounts) -> StructureDef {
    StructureDef {
        id: id.to_string(),
        name: id.to_string(),
        category: StructureCategory::Extractor,
        unique: false,
        area_cost: 60,
        max_level: 5,
        base_cost: ResourceAmounts {
            wood: 30.0,
            ..ResourceAmounts::default()
        },
        cost_growth: 1.5,
        base_build_secs: 15.0,
        build_time_growth: 1.4,
        town_hall_level: 0,
        prereqs: vec![],
        modifiers: Modifiers {
            production,
            ..Modifiers::default()
        },
    }
}

pub fn base_content() -> GameContent {
    let mut town_hall = building(
        "structure_town_hall",
        100,
        Modifiers {
            population_capacity: 5,
            storage_capacity: 200.0,
            ..Modifiers::default()
        },
    );
    town_hall.unique = true;
    town_hall.max_level = 10;

    let house = building(
        "structure_house",
        50,
        Modifiers {
            population_capacity: 5,
            ..Modifiers::default()
        },
    );
    let mut tent = building(
        "structure_tent",
        20,
        Modifiers {
            population_capacity: 2,
            ..Modifiers::default()
        },
    );
    tent.base_cost = ResourceAmounts {
        wood: 5.0,
        ..ResourceAmounts::default()
    };
    tent.base_build_secs = 2.0;

    let mut shrine = building(
        "structure_shrine",
        40,
        Modifiers {
            happiness: 5.0,
            ..Modifiers::default()
        },
    );
    shrine.town_hall_level = 1;
    shrine.prereqs = vec![Prereq {
        def: "structure_house".to_string(),
        level: 1,
    }];

    GameContent {
        content_version: "test".to_string(),
        structures: vec![
            town_hall,
            house,
            tent,
            shrine,
            extractor(
                "structure_farm",
                ResourceAmounts {
                    food: 1.0,
                    ..ResourceAmounts::default()
                },
            ),
            extractor(
                "structure_well",
                ResourceAmounts {
                    water: 1.0,
                    ..ResourceAmounts::default()
                },
            ),
            extractor(
                "structure_lumber_camp",
                ResourceAmounts {
                    wood: 0.5,
                    ..ResourceAmounts::default()
                },
            ),
            extractor(
                "structure_quarry",
                ResourceAmounts {
                    stone: 0.4,
                    ..ResourceAmounts::default()
                },
            ),
            extractor(
                "structure_mine",
                ResourceAmounts {
                    ore: 0.2,
                    ..ResourceAmounts::default()
                },
            ),
        ],
        constants: Constants {
            town_hall_def: "structure_town_hall".to_string(),
            base_population_capacity: 10,
            base_storage_capacity: 500.0,
            base_area: 500,
            area_per_town_hall_level: 100,
            food_per_capita_per_sec: 0.01,
            water_per_capita_per_sec: 0.01,
            growth_rate_per_sec: 0.01,
            starvation_decline_per_sec: 0.02,
            emigration_threshold: 25.0,
            emigration_decline_per_sec: 0.01,
            happiness_baseline: 70.0,
            happiness_drift_per_sec: 0.05,
            sufficiency_happiness_bonus: 10.0,
            shortage_happiness_penalty: 20.0,
            trauma_decay_per_sec: 0.1,
            level_bonus_per_level: 0.25,
            starting_resources: ResourceAmounts {
                food: 100.0,
                water: 100.0,
                wood: 200.0,
                stone: 100.0,
                ore: 0.0,
            },
            starting_population: 5.0,
        },
        disasters: DisasterTuning {
            default_warning_secs: 5.0,
            default_impact_secs: 5.0,
            aftermath_grace_secs: 5.0,
            damage_health_per_sec_at_max: 10.0,
            damage_variance: 0.3,
            casualty_fraction_at_max: 0.4,
            casualty_variance: 0.4,
            shelter_mitigation: 0.5,
            resource_loss_fraction_at_max: 0.2,
            happiness_penalty_at_max: 30.0,
        },
    }
}

pub fn base_settlement(content: &GameContent) -> SettlementState {
    SettlementState {
        id: SettlementId("settlement_0001".to_string()),
        profile: ProfileId("profile_0001".to_string()),
        world: WorldId("world_0001".to_string()),
        tile_quality: 1.0,
        resilience: 0,
        trauma: 0.0,
        storage: StorageState {
            amounts: content.constants.starting_resources,
            capacity: content.constants.base_storage_capacity,
        },
        population: PopulationState {
            current: content.constants.starting_population,
            happiness: 70.0,
            capacity: content.constants.base_population_capacity,
        },
        structures: vec![],
        queue: vec![],
        last_tick_ms: 0,
        counters: Counters::default(),
    }
}

/// A settlement with a level-1 town hall and one house already placed.
pub fn developed_settlement(content: &GameContent) -> SettlementState {
    let mut settlement = base_settlement(content);
    settlement.structures.push(StructureState {
        id: StructureId("struct_th".to_string()),
        def: "structure_town_hall".to_string(),
        level: 1,
        health: 100.0,
        slot: None,
    });
    settlement.structures.push(StructureState {
        id: StructureId("struct_house".to_string()),
        def: "structure_house".to_string(),
        level: 1,
        health: 100.0,
        slot: None,
    });
    settlement.population.capacity = crate::population_capacity(&settlement, content);
    settlement
}

/// A disaster already in WARNING, with windows taken from the tuning.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn warning_disaster(content: &GameContent, now_ms: u64) -> DisasterEvent {
    let warning_ms = (content.disasters.default_warning_secs * 1000.0) as u64;
    let impact_ms = (content.disasters.default_impact_secs * 1000.0) as u64;
    DisasterEvent {
        id: DisasterId("disaster_0001".to_string()),
        world: WorldId("world_0001".to_string()),
        kind: DisasterKind::Earthquake,
        severity: 22.0,
        status: DisasterStatus::Warning,
        warning_issued_at_ms: now_ms,
        scheduled_at_ms: now_ms + warning_ms,
        impact_duration_ms: impact_ms,
        aftermath_at_ms: None,
        resolved_at_ms: None,
    }
}
