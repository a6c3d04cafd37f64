use super::*;

#[test]
fn extractor_production_adds_to_storage() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    add_structure(&mut settlement, "structure_farm", 1);
    let mut events = Vec::new();

    let before = settlement.storage.amounts.food;
    let delta = apply_production_tick(&mut settlement, &content, 10.0, &mut events);

    // Farm: 1.0/s; consumption: 5 settlers × 0.01/s.
    assert!(approx_eq(delta.rates.production.food, 1.0));
    assert!(approx_eq(delta.rates.consumption.food, 0.05));
    assert!(approx_eq(settlement.storage.amounts.food, before + 9.5));
    assert!(delta.changed);
}

#[test]
fn consumption_drains_storage_without_producers() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    let mut events = Vec::new();

    apply_production_tick(&mut settlement, &content, 10.0, &mut events);

    assert!(settlement.storage.amounts.food < 100.0);
    assert!(settlement.storage.amounts.water < 100.0);
    // Non-consumed kinds are untouched.
    assert!(approx_eq(settlement.storage.amounts.wood, 200.0));
}

#[test]
fn production_clamps_at_capacity() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    add_structure(&mut settlement, "structure_farm", 1);
    settlement.storage.amounts.food = 499.0;
    let mut events = Vec::new();

    apply_production_tick(&mut settlement, &content, 100.0, &mut events);

    assert!(approx_eq(
        settlement.storage.amounts.food,
        settlement.storage.capacity
    ));
}

#[test]
fn consumption_clamps_at_zero() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    settlement.storage.amounts.food = 0.2;
    let mut events = Vec::new();

    apply_production_tick(&mut settlement, &content, 100.0, &mut events);

    assert!(settlement.storage.amounts.food >= 0.0);
    assert!(approx_eq(settlement.storage.amounts.food, 0.0));
}

#[test]
fn level_scales_extractor_output() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    add_structure(&mut settlement, "structure_farm", 3);

    let (rates, _) = current_rates(&settlement, &content);

    // level 3 → 1 + 0.25 × 2 = 1.5× base rate.
    assert!(approx_eq(rates.production.food, 1.5));
}

#[test]
fn tile_quality_scales_extractor_output() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    settlement.tile_quality = 0.5;
    add_structure(&mut settlement, "structure_farm", 1);

    let (rates, _) = current_rates(&settlement, &content);

    assert!(approx_eq(rates.production.food, 0.5));
}

#[test]
fn destroyed_extractor_contributes_nothing() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    let id = add_structure(&mut settlement, "structure_farm", 1);
    settlement.structure_mut(&id).unwrap().health = 0.0;

    let (rates, _) = current_rates(&settlement, &content);

    assert!(approx_eq(rates.production.food, 0.0));
}

#[test]
fn missing_master_data_contributes_zero_and_is_reported() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    add_structure(&mut settlement, "structure_ghost", 1);
    let mut events = Vec::new();

    let delta = apply_production_tick(&mut settlement, &content, 1.0, &mut events);

    assert_eq!(delta.missing_defs.as_slice(), ["structure_ghost"]);
    assert!(approx_eq(delta.rates.production.food, 0.0));
}

#[test]
fn no_event_when_nothing_changes() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    settlement.population.current = 0.0;
    let mut events = Vec::new();

    let delta = apply_production_tick(&mut settlement, &content, 10.0, &mut events);

    assert!(!delta.changed);
    assert!(events.is_empty());
}

#[test]
fn event_emitted_on_whole_unit_change() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    add_structure(&mut settlement, "structure_farm", 1);
    let mut events = Vec::new();

    apply_production_tick(&mut settlement, &content, 10.0, &mut events);

    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ResourceUpdate { .. })));
}

#[test]
fn storage_modifiers_raise_capacity() {
    let content = test_content();
    let settlement = developed_settlement(&content);

    // Base 500 + town hall 200.
    assert!(approx_eq(storage_capacity(&settlement, &content), 700.0));
}
