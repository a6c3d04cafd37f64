use super::*;
use crate::test_fixtures::{base_content, base_settlement, developed_settlement, make_rng};

mod construction;
mod disaster;
mod ledger;

// --- Shared test helpers ------------------------------------------------

fn test_content() -> GameContent {
    base_content()
}

fn test_settlement(content: &GameContent) -> SettlementState {
    base_settlement(content)
}

fn add_structure(settlement: &mut SettlementState, def: &str, level: u32) -> StructureId {
    let id = StructureId(format!("struct_fixture_{}", settlement.structures.len()));
    settlement.structures.push(StructureState {
        id: id.clone(),
        def: def.to_string(),
        level,
        health: 100.0,
        slot: None,
    });
    id
}

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}
