//! Content loading, validation, and settlement founding shared between
//! `settle_cli` and `settle_daemon`.

use anyhow::{Context, Result};
use rand::Rng;
use serde::Deserialize;
use settle_core::{
    Constants, Counters, DisasterTuning, GameContent, PopulationState, ProfileId, SettlementId,
    SettlementState, StorageState, StructureCategory, StructureDef, WorldId,
};
use std::path::Path;

#[derive(Deserialize)]
struct StructuresFile {
    content_version: String,
    structures: Vec<StructureDef>,
}

#[derive(Deserialize)]
struct ConstantsFile {
    constants: Constants,
}

#[derive(Deserialize)]
struct DisastersFile {
    disasters: DisasterTuning,
}

pub fn load_content(content_dir: &str) -> Result<GameContent> {
    let dir = Path::new(content_dir);
    let structures_file: StructuresFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("structures.json")).context("reading structures.json")?,
    )
    .context("parsing structures.json")?;
    let constants_file: ConstantsFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("constants.json")).context("reading constants.json")?,
    )
    .context("parsing constants.json")?;
    let disasters_file: DisastersFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("disasters.json")).context("reading disasters.json")?,
    )
    .context("parsing disasters.json")?;
    Ok(GameContent {
        content_version: structures_file.content_version,
        structures: structures_file.structures,
        constants: constants_file.constants,
        disasters: disasters_file.disasters,
    })
}

/// Validates cross-references in loaded content, panicking on any authoring
/// error.
///
/// Catches mistakes like: a prerequisite pointing at an unknown structure,
/// a missing town-hall definition, or rates that would run the simulation
/// backwards.
pub fn validate_content(content: &GameContent) {
    assert!(
        content
            .structure(&content.constants.town_hall_def)
            .is_some(),
        "town hall def '{}' is not in the structure catalog",
        content.constants.town_hall_def,
    );

    for def in &content.structures {
        assert!(!def.id.is_empty(), "structure has empty id");
        assert!(def.max_level >= 1, "structure '{}' has max_level 0", def.id);
        assert!(
            def.base_build_secs > 0.0,
            "structure '{}' has non-positive build time",
            def.id,
        );
        assert!(
            def.cost_growth >= 1.0 && def.build_time_growth >= 1.0,
            "structure '{}' has shrinking level curves",
            def.id,
        );
        for prereq in &def.prereqs {
            assert!(
                content.structure(&prereq.def).is_some(),
                "structure '{}' prereq '{}' is not a known structure id",
                def.id,
                prereq.def,
            );
        }
        if def.category == StructureCategory::Extractor {
            assert!(
                !def.modifiers.production.is_empty(),
                "extractor '{}' produces nothing",
                def.id,
            );
        }
    }

    let c = &content.constants;
    assert!(c.base_area > 0, "base_area must be positive");
    assert!(
        c.food_per_capita_per_sec >= 0.0 && c.water_per_capita_per_sec >= 0.0,
        "per-capita consumption must be non-negative",
    );
    assert!(
        content.disasters.default_warning_secs > 0.0
            && content.disasters.default_impact_secs > 0.0,
        "disaster windows must be positive",
    );
}

/// Found a new settlement for a profile in a world. Settlements start with
/// no structures (town-hall level 0), the configured starting stock and
/// population, and a tile quality rolled from the location.
pub fn found_settlement(
    content: &GameContent,
    id: SettlementId,
    profile: ProfileId,
    world: WorldId,
    now_ms: u64,
    rng: &mut impl Rng,
) -> SettlementState {
    SettlementState {
        id,
        profile,
        world,
        tile_quality: rng.gen_range(0.8..=1.2),
        resilience: 0,
        trauma: 0.0,
        storage: StorageState {
            amounts: content.constants.starting_resources,
            capacity: content.constants.base_storage_capacity,
        },
        population: PopulationState {
            current: content.constants.starting_population,
            happiness: content.constants.happiness_baseline,
            capacity: content.constants.base_population_capacity,
        },
        structures: vec![],
        queue: vec![],
        last_tick_ms: now_ms,
        counters: Counters::default(),
    }
}

/// Found `count` settlements across `worlds` round-robin, for demo/headless
/// runs.
pub fn found_demo_settlements(
    content: &GameContent,
    count: usize,
    worlds: &[WorldId],
    now_ms: u64,
    rng: &mut impl Rng,
) -> Vec<SettlementState> {
    (0..count)
        .map(|i| {
            found_settlement(
                content,
                SettlementId(format!("settlement_{:04}", i + 1)),
                ProfileId(format!("profile_{:04}", i + 1)),
                worlds[i % worlds.len()].clone(),
                now_ms,
                rng,
            )
        })
        .collect()
}
