use super::*;

#[test]
fn area_capacity_formula() {
    let content = test_content();
    assert_eq!(area_capacity(0, &content), 500);
    assert_eq!(area_capacity(1, &content), 600);
    assert_eq!(area_capacity(5, &content), 1000);
    assert_eq!(area_capacity(10, &content), 1500);
}

#[test]
fn unknown_structure_is_rejected() {
    let content = test_content();
    let mut settlement = test_settlement(&content);

    let err = enqueue(&mut settlement, &content, "structure_ghost").unwrap_err();

    assert_eq!(err.code(), "UNKNOWN_STRUCTURE");
}

#[test]
fn unique_structure_cannot_be_built_twice() {
    let content = test_content();
    let mut settlement = developed_settlement(&content);
    // Plenty of resources — uniqueness must still win.
    settlement.storage.amounts.wood = 10_000.0;
    settlement.storage.amounts.stone = 10_000.0;

    let err = enqueue(&mut settlement, &content, "structure_town_hall").unwrap_err();

    assert_eq!(err, BuildError::AlreadyUnique("structure_town_hall".to_string()));
    assert_eq!(err.code(), "ALREADY_UNIQUE");
}

#[test]
fn unique_structure_cannot_be_queued_twice() {
    let content = test_content();
    let mut settlement = test_settlement(&content);

    enqueue(&mut settlement, &content, "structure_town_hall").unwrap();
    let err = enqueue(&mut settlement, &content, "structure_town_hall").unwrap_err();

    assert_eq!(err.code(), "ALREADY_UNIQUE");
}

#[test]
fn area_capacity_is_enforced_before_affordability() {
    let content = test_content();
    let mut settlement = developed_settlement(&content);
    settlement.storage.amounts.wood = 10_000.0;
    settlement.storage.amounts.stone = 10_000.0;

    // Town hall (100) + house (50) placed; capacity at TH level 1 is 600.
    for _ in 0..9 {
        enqueue(&mut settlement, &content, "structure_house").unwrap();
    }
    let err = enqueue(&mut settlement, &content, "structure_house").unwrap_err();

    assert_eq!(err.code(), "AREA_EXCEEDED");
}

#[test]
fn town_hall_gate_blocks_early_builds() {
    let content = test_content();
    let mut settlement = test_settlement(&content);

    let err = enqueue(&mut settlement, &content, "structure_shrine").unwrap_err();

    assert_eq!(
        err,
        BuildError::LevelRequirementNotMet {
            required: 1,
            actual: 0
        }
    );
}

#[test]
fn missing_prerequisite_is_rejected() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    add_structure(&mut settlement, "structure_town_hall", 1);

    let err = enqueue(&mut settlement, &content, "structure_shrine").unwrap_err();

    assert_eq!(err.code(), "PREREQUISITE_MISSING");
}

#[test]
fn insufficient_resources_is_rejected() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    settlement.storage.amounts.wood = 5.0;

    let err = enqueue(&mut settlement, &content, "structure_house").unwrap_err();

    assert_eq!(err.code(), "INSUFFICIENT_RESOURCES");
}

#[test]
fn cost_is_deducted_at_enqueue_not_completion() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    let wood_before = settlement.storage.amounts.wood;

    enqueue(&mut settlement, &content, "structure_house").unwrap();

    assert!(approx_eq(settlement.storage.amounts.wood, wood_before - 20.0));
    // Queued cost is spent; a second identical enqueue cannot double-spend
    // against the same stock.
    assert_eq!(settlement.queue.len(), 1);
}

#[test]
fn only_head_of_queue_accrues_time() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    let mut events = Vec::new();

    let tent = enqueue(&mut settlement, &content, "structure_tent").unwrap();
    let house = enqueue(&mut settlement, &content, "structure_house").unwrap();

    assert!(advance(&mut settlement, &content, 1.0, &mut events).is_none());
    assert!(approx_eq(settlement.queue[0].elapsed_secs, 1.0));
    assert!(approx_eq(settlement.queue[1].elapsed_secs, 0.0));

    // Tent needs 2s total; it completes first, in enqueue order.
    let done = advance(&mut settlement, &content, 1.5, &mut events).unwrap();
    assert_eq!(done.project, tent);
    assert!(matches!(done.result, CompletionResult::Built(_)));

    // The promoted house starts from a fresh timer.
    assert!(approx_eq(settlement.queue[0].elapsed_secs, 0.0));
    let done = advance(&mut settlement, &content, 10.0, &mut events).unwrap();
    assert_eq!(done.project, house);
}

#[test]
fn completion_materializes_structure_and_recalculates_capacity() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    let mut events = Vec::new();

    enqueue(&mut settlement, &content, "structure_tent").unwrap();
    advance(&mut settlement, &content, 2.0, &mut events).unwrap();

    let tent = settlement
        .structures
        .iter()
        .find(|s| s.def == "structure_tent")
        .expect("tent should be materialized");
    assert_eq!(tent.level, 1);
    assert!(approx_eq(tent.health, 100.0));
    // Capacity refreshed immediately: base 10 + tent 2.
    assert_eq!(settlement.population.capacity, 12);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::StructureBuilt { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::PopulationUpdate { capacity: 12, .. })));
}

#[test]
fn upgrade_bumps_level_on_completion() {
    let content = test_content();
    let mut settlement = developed_settlement(&content);
    let house = StructureId("struct_house".to_string());
    let mut events = Vec::new();

    enqueue_upgrade(&mut settlement, &content, &house).unwrap();
    let done = advance(&mut settlement, &content, 100.0, &mut events).unwrap();

    assert!(matches!(done.result, CompletionResult::Upgraded(_, 2)));
    assert_eq!(settlement.structure(&house).unwrap().level, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::StructureUpgraded { .. })));
}

#[test]
fn upgrade_of_destroyed_target_is_dropped() {
    let content = test_content();
    let mut settlement = developed_settlement(&content);
    let house = StructureId("struct_house".to_string());
    let mut events = Vec::new();

    enqueue_upgrade(&mut settlement, &content, &house).unwrap();
    settlement.structure_mut(&house).unwrap().health = 0.0;
    let done = advance(&mut settlement, &content, 100.0, &mut events).unwrap();

    assert!(matches!(done.result, CompletionResult::TargetMissing(_)));
    assert_eq!(settlement.structure(&house).unwrap().level, 1);
    assert!(settlement.queue.is_empty());
}

#[test]
fn upgrade_revalidates_prerequisites() {
    let content = test_content();
    let mut settlement = developed_settlement(&content);
    let shrine = add_structure(&mut settlement, "structure_shrine", 1);

    // Losing the prerequisite house after the original build blocks the
    // upgrade, same as a fresh enqueue would be blocked.
    settlement
        .structure_mut(&StructureId("struct_house".to_string()))
        .unwrap()
        .health = 0.0;

    let err = enqueue_upgrade(&mut settlement, &content, &shrine).unwrap_err();

    assert_eq!(err.code(), "PREREQUISITE_MISSING");
}

#[test]
fn upgrade_past_max_level_is_rejected() {
    let content = test_content();
    let mut settlement = developed_settlement(&content);
    settlement.storage.amounts.wood = 100_000.0;
    settlement.storage.amounts.stone = 100_000.0;
    let house = StructureId("struct_house".to_string());
    settlement.structure_mut(&house).unwrap().level = 5;

    let err = enqueue_upgrade(&mut settlement, &content, &house).unwrap_err();

    assert_eq!(err.code(), "MAX_LEVEL");
}

#[test]
fn queued_new_builds_reserve_area() {
    let content = test_content();
    let mut settlement = developed_settlement(&content);
    settlement.storage.amounts.wood = 10_000.0;
    settlement.storage.amounts.stone = 10_000.0;

    for _ in 0..9 {
        enqueue(&mut settlement, &content, "structure_house").unwrap();
    }

    // 150 placed + 9 × 50 queued.
    let stats = area_stats(&settlement, &content);
    assert_eq!(stats.area_used, 600);
    assert_eq!(stats.area_available, 0);
}
