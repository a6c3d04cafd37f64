use super::*;
use crate::test_fixtures::warning_disaster;

#[test]
fn severity_levels_match_internal_ranges() {
    assert_eq!(severity_level(0.0), SeverityLevel::Mild);
    assert_eq!(severity_level(29.9), SeverityLevel::Mild);
    assert_eq!(severity_level(30.0), SeverityLevel::Moderate);
    assert_eq!(severity_level(54.9), SeverityLevel::Moderate);
    assert_eq!(severity_level(55.0), SeverityLevel::Major);
    assert_eq!(severity_level(79.9), SeverityLevel::Major);
    assert_eq!(severity_level(80.0), SeverityLevel::Catastrophic);
    assert_eq!(severity_level(100.0), SeverityLevel::Catastrophic);
}

#[test]
fn user_scale_maps_into_documented_bands() {
    let mut rng = make_rng();
    for (scale, (lo, hi)) in (1u8..=5).zip(USER_SEVERITY_RANGES) {
        for _ in 0..50 {
            let severity = severity_from_user_scale(scale, &mut rng).unwrap();
            assert!(
                (lo..=hi).contains(&severity),
                "scale {scale} rolled {severity} outside {lo}..={hi}"
            );
        }
    }
}

#[test]
fn user_scale_out_of_range_is_rejected() {
    let mut rng = make_rng();
    assert_eq!(
        severity_from_user_scale(0, &mut rng),
        Err(DisasterError::InvalidUserSeverity(0))
    );
    assert_eq!(
        severity_from_user_scale(6, &mut rng),
        Err(DisasterError::InvalidUserSeverity(6))
    );
}

#[test]
fn phases_advance_strictly_forward() {
    let content = test_content();
    let mut event = warning_disaster(&content, 0);
    // Windows: warning 5 s, impact 5 s, grace 5 s.

    assert!(advance_phase(&mut event, 1_000, &content.disasters).is_none());
    assert_eq!(event.status, DisasterStatus::Warning);

    let change = advance_phase(&mut event, 5_000, &content.disasters).unwrap();
    assert_eq!(change.from, DisasterStatus::Warning);
    assert_eq!(change.to, DisasterStatus::Impact);

    assert!(advance_phase(&mut event, 5_500, &content.disasters).is_none());

    let change = advance_phase(&mut event, 10_000, &content.disasters).unwrap();
    assert_eq!(change.to, DisasterStatus::Aftermath);
    assert_eq!(event.aftermath_at_ms, Some(10_000));

    assert!(advance_phase(&mut event, 14_000, &content.disasters).is_none());

    let change = advance_phase(&mut event, 15_000, &content.disasters).unwrap();
    assert_eq!(change.to, DisasterStatus::Resolved);

    // A resolved event never moves again, even far in the future.
    assert!(advance_phase(&mut event, 1_000_000, &content.disasters).is_none());
    assert_eq!(event.status, DisasterStatus::Resolved);
}

#[test]
fn observed_statuses_are_monotonic_under_arbitrary_clocks() {
    let content = test_content();
    let mut event = warning_disaster(&content, 0);
    let mut observed = vec![event.status];

    // Deliberately uneven clock steps, including repeats.
    for now in [0, 3_000, 3_000, 5_000, 7_000, 10_000, 10_500, 15_000, 20_000] {
        advance_phase(&mut event, now, &content.disasters);
        observed.push(event.status);
    }

    let mut sorted = observed.clone();
    sorted.sort_unstable();
    assert_eq!(observed, sorted, "status walk regressed: {observed:?}");
}

#[test]
fn impact_damage_only_applies_during_impact_in_same_world() {
    let content = test_content();
    let mut settlement = developed_settlement(&content);
    let mut event = warning_disaster(&content, 0);
    let mut rng = make_rng();

    // WARNING: no damage yet.
    let dealt = apply_impact_damage(&mut settlement, &event, &content.disasters, 1.0, &mut rng);
    assert!(approx_eq(dealt, 0.0));

    event.status = DisasterStatus::Impact;
    event.world = WorldId("world_elsewhere".to_string());
    let dealt = apply_impact_damage(&mut settlement, &event, &content.disasters, 1.0, &mut rng);
    assert!(approx_eq(dealt, 0.0));

    event.world = settlement.world.clone();
    let dealt = apply_impact_damage(&mut settlement, &event, &content.disasters, 1.0, &mut rng);
    assert!(dealt > 0.0);
    assert!(settlement
        .structures
        .iter()
        .all(|s| s.health < 100.0 && s.health > 0.0));
}

#[test]
fn impact_damage_floors_health_at_zero() {
    let content = test_content();
    let mut settlement = developed_settlement(&content);
    let mut event = warning_disaster(&content, 0);
    event.status = DisasterStatus::Impact;
    event.severity = 100.0;
    let mut rng = make_rng();

    // Far more damage than any structure has health.
    apply_impact_damage(&mut settlement, &event, &content.disasters, 1_000.0, &mut rng);

    for structure in &settlement.structures {
        assert!(approx_eq(structure.health, 0.0));
        assert!(structure.is_destroyed());
    }
}

#[test]
fn aftermath_population_consistency() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    settlement.population.current = 10.0;
    let mut event = warning_disaster(&content, 0);
    event.severity = 90.0;
    event.status = DisasterStatus::Aftermath;
    let mut rng = make_rng();

    let summary = resolve_aftermath(&mut settlement, &event, &content, &mut rng);

    assert_eq!(settlement.population.headcount() + summary.casualties, 10);
}

#[test]
fn shelter_capacity_dampens_casualties() {
    let content = test_content();
    let mut rng = make_rng();
    let mut event = warning_disaster(&content, 0);
    event.severity = 100.0;

    // Average casualties over many rolls, unsheltered vs. fully housed.
    let mut unsheltered = 0u32;
    let mut sheltered = 0u32;
    for _ in 0..50 {
        let mut bare = test_settlement(&content);
        bare.population.current = 10.0;
        unsheltered += resolve_aftermath(&mut bare, &event, &content, &mut rng).casualties;

        let mut housed = test_settlement(&content);
        housed.population.current = 10.0;
        add_structure(&mut housed, "structure_house", 1);
        add_structure(&mut housed, "structure_house", 1);
        sheltered += resolve_aftermath(&mut housed, &event, &content, &mut rng).casualties;
    }

    assert!(
        sheltered < unsheltered,
        "housing should reduce casualties: sheltered {sheltered} vs unsheltered {unsheltered}"
    );
}

#[test]
fn aftermath_awards_resilience_by_tier() {
    let content = test_content();
    let mut rng = make_rng();

    for (severity, expected) in [(22.0, 5), (40.0, 8), (60.0, 12), (90.0, 20)] {
        let mut settlement = test_settlement(&content);
        let mut event = warning_disaster(&content, 0);
        event.severity = severity;

        let summary = resolve_aftermath(&mut settlement, &event, &content, &mut rng);

        assert_eq!(summary.resilience_gained, expected);
        assert_eq!(settlement.resilience, expected);
    }
}

#[test]
fn aftermath_applies_resource_loss_and_trauma() {
    let content = test_content();
    let mut settlement = test_settlement(&content);
    let mut event = warning_disaster(&content, 0);
    event.severity = 80.0;
    let mut rng = make_rng();
    let food_before = settlement.storage.amounts.food;
    let happiness_before = settlement.population.happiness;

    let summary = resolve_aftermath(&mut settlement, &event, &content, &mut rng);

    assert!(summary.resources_lost.food > 0.0);
    assert!(approx_eq(
        settlement.storage.amounts.food,
        food_before - summary.resources_lost.food
    ));
    assert!(settlement.population.happiness < happiness_before);
    assert!(settlement.trauma > 0.0);
}
