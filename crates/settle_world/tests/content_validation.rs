//! Content/schema validation tests for the JSON game data.
//!
//! These tests load the actual `content/*.json` files and validate:
//! 1. Schema validity — all files deserialize without error
//! 2. Range constraints — no negative rates, no zero durations, no empty IDs
//! 3. Cross-reference integrity — all inter-file references resolve
//! 4. Content invariants — the balance anchors (footprints, area formula)
//!    stay true

use settle_core::{GameContent, StructureCategory};
use settle_world::{load_content, validate_content};
use std::sync::OnceLock;

/// Helper: resolve the content directory relative to the workspace root.
/// Integration tests run from the crate directory, so we go up two levels.
fn content_dir() -> String {
    let manifest = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    format!("{manifest}/../../content")
}

/// Shared content loaded once across all tests in this module.
fn load_test_content() -> &'static GameContent {
    static CONTENT: OnceLock<GameContent> = OnceLock::new();
    CONTENT.get_or_init(|| {
        load_content(&content_dir()).expect("load_content should succeed for production content")
    })
}

#[test]
fn content_loads_successfully() {
    let _content = load_test_content();
}

#[test]
fn content_passes_validation() {
    validate_content(load_test_content());
}

#[test]
fn structure_ids_are_unique() {
    let content = load_test_content();
    let mut seen = std::collections::HashSet::new();
    for def in &content.structures {
        assert!(seen.insert(&def.id), "duplicate structure id '{}'", def.id);
    }
}

#[test]
fn all_costs_are_non_negative() {
    let content = load_test_content();
    for def in &content.structures {
        for kind in settle_core::ResourceKind::ALL {
            assert!(
                def.base_cost.get(kind) >= 0.0,
                "'{}' has negative {kind:?} cost",
                def.id,
            );
        }
    }
}

#[test]
fn extractors_produce_and_buildings_do_not() {
    let content = load_test_content();
    for def in &content.structures {
        match def.category {
            StructureCategory::Extractor => assert!(
                !def.modifiers.production.is_empty(),
                "extractor '{}' produces nothing",
                def.id,
            ),
            StructureCategory::Building => assert!(
                def.modifiers.production.is_empty(),
                "building '{}' unexpectedly produces resources",
                def.id,
            ),
        }
    }
}

#[test]
fn town_hall_footprint_and_area_constants_hold() {
    let content = load_test_content();
    let town_hall = content
        .structure(&content.constants.town_hall_def)
        .expect("town hall def");
    assert_eq!(town_hall.area_cost, 100);
    assert!(town_hall.unique);
    assert_eq!(content.constants.base_area, 500);
    assert_eq!(content.constants.area_per_town_hall_level, 100);
}

#[test]
fn house_footprint_holds() {
    let content = load_test_content();
    let house = content.structure("structure_house").expect("house def");
    assert_eq!(house.area_cost, 50);
}

#[test]
fn gated_structures_require_reachable_town_hall_levels() {
    let content = load_test_content();
    let town_hall = content
        .structure(&content.constants.town_hall_def)
        .expect("town hall def");
    for def in &content.structures {
        assert!(
            def.town_hall_level <= town_hall.max_level,
            "'{}' requires town hall level {} but max is {}",
            def.id,
            def.town_hall_level,
            town_hall.max_level,
        );
    }
}

#[test]
fn founding_produces_a_fresh_settlement() {
    use rand::SeedableRng;
    let content = load_test_content();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);

    let settlement = settle_world::found_settlement(
        content,
        settle_core::SettlementId("settlement_test".to_string()),
        settle_core::ProfileId("profile_test".to_string()),
        settle_core::WorldId("world_test".to_string()),
        1_000,
        &mut rng,
    );

    assert!(settlement.structures.is_empty());
    assert_eq!(settle_core::town_hall_level(&settlement, content), 0);
    let stats = settle_core::area_stats(&settlement, content);
    assert_eq!(stats.area_capacity, 500);
    assert!((0.8..=1.2).contains(&settlement.tile_quality));
}
