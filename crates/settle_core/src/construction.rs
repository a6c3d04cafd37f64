//! Construction Queue: validated enqueue (cost deducted up front) and
//! single-slot FIFO advancement.
//!
//! Only the head-of-queue project accrues time. This models one build crew
//! per settlement — a deliberate throughput constraint, not an accidental
//! serialization.

use crate::catalog::{GameContent, StructureDef};
use crate::types::{
    BuildTarget, ConstructionProject, DefId, Event, ProjectId, SettlementState, StructureId,
    StructureState,
};
use crate::{ledger, population};
use thiserror::Error;

/// Why a build/upgrade request was rejected. Every variant carries a stable
/// reason code for the requesting layer; none of these are logged-and-dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("unknown structure '{0}'")]
    UnknownStructure(DefId),
    #[error("town hall level {required} required, have {actual}")]
    LevelRequirementNotMet { required: u32, actual: u32 },
    #[error("'{0}' is unique and already present or queued")]
    AlreadyUnique(DefId),
    #[error("area exceeded: {used} used + {required} needed > {capacity} capacity")]
    AreaExceeded {
        used: u32,
        required: u32,
        capacity: u32,
    },
    #[error("missing prerequisite '{def}' at level {level}")]
    PrerequisiteMissing { def: DefId, level: u32 },
    #[error("insufficient resources for '{0}'")]
    InsufficientResources(DefId),
    #[error("structure instance '{0}' not found")]
    UnknownInstance(StructureId),
    #[error("'{0}' is already at max level")]
    MaxLevel(DefId),
}

impl BuildError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            BuildError::UnknownStructure(_) => "UNKNOWN_STRUCTURE",
            BuildError::LevelRequirementNotMet { .. } => "LEVEL_REQUIREMENT_NOT_MET",
            BuildError::AlreadyUnique(_) => "ALREADY_UNIQUE",
            BuildError::AreaExceeded { .. } => "AREA_EXCEEDED",
            BuildError::PrerequisiteMissing { .. } => "PREREQUISITE_MISSING",
            BuildError::InsufficientResources(_) => "INSUFFICIENT_RESOURCES",
            BuildError::UnknownInstance(_) => "UNKNOWN_INSTANCE",
            BuildError::MaxLevel(_) => "MAX_LEVEL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AreaStats {
    pub area_used: u32,
    pub area_capacity: u32,
    pub area_available: u32,
    pub percent_used: f32,
    pub buildings: usize,
}

/// `500 + townHallLevel × 100` with the default constants.
pub fn area_capacity(th_level: u32, content: &GameContent) -> u32 {
    content.constants.base_area + th_level * content.constants.area_per_town_hall_level
}

/// Level of the settlement's town hall; 0 when none has been built yet.
pub fn town_hall_level(settlement: &SettlementState, content: &GameContent) -> u32 {
    settlement
        .structures
        .iter()
        .filter(|s| s.is_intact() && s.def == content.constants.town_hall_def)
        .map(|s| s.level)
        .max()
        .unwrap_or(0)
}

/// Footprint in use: intact structures plus queued new builds (queued
/// projects reserve their area so the queue cannot overcommit).
fn area_used(settlement: &SettlementState, content: &GameContent) -> u32 {
    let placed: u32 = settlement
        .structures
        .iter()
        .filter(|s| s.is_intact())
        .filter_map(|s| content.structure(&s.def).map(|def| def.area_cost))
        .sum();
    let queued: u32 = settlement
        .queue
        .iter()
        .filter_map(|p| match &p.target {
            BuildTarget::New { def } => content.structure(def).map(|d| d.area_cost),
            BuildTarget::Upgrade { .. } => None,
        })
        .sum();
    placed + queued
}

pub fn area_stats(settlement: &SettlementState, content: &GameContent) -> AreaStats {
    let capacity = area_capacity(town_hall_level(settlement, content), content);
    let used = area_used(settlement, content);
    let percent_used = if capacity == 0 {
        0.0
    } else {
        used as f32 / capacity as f32 * 100.0
    };
    AreaStats {
        area_used: used,
        area_capacity: capacity,
        area_available: capacity.saturating_sub(used),
        percent_used,
        buildings: settlement.structures.len(),
    }
}

fn check_prereqs(settlement: &SettlementState, def: &StructureDef) -> Result<(), BuildError> {
    for prereq in &def.prereqs {
        let satisfied = settlement
            .structures
            .iter()
            .any(|s| s.is_intact() && s.def == prereq.def && s.level >= prereq.level);
        if !satisfied {
            return Err(BuildError::PrerequisiteMissing {
                def: prereq.def.clone(),
                level: prereq.level,
            });
        }
    }
    Ok(())
}

fn next_project_id(settlement: &mut SettlementState) -> ProjectId {
    let id = ProjectId(format!("proj_{:06}", settlement.counters.next_project_id));
    settlement.counters.next_project_id += 1;
    id
}

/// Enqueue a new build. Validation order: known structure → town-hall gate
/// → uniqueness → area → prerequisites → affordability. The cost is
/// deducted here, at enqueue, so queued projects can never double-spend.
pub fn enqueue(
    settlement: &mut SettlementState,
    content: &GameContent,
    def_id: &str,
) -> Result<ProjectId, BuildError> {
    let def = content
        .structure(def_id)
        .ok_or_else(|| BuildError::UnknownStructure(def_id.to_string()))?;

    let th_level = town_hall_level(settlement, content);
    // The town hall itself is exempt from its own gate.
    if def.id != content.constants.town_hall_def && def.town_hall_level > th_level {
        return Err(BuildError::LevelRequirementNotMet {
            required: def.town_hall_level,
            actual: th_level,
        });
    }

    if def.unique {
        let present = settlement.structures.iter().any(|s| s.def == def.id);
        let queued = settlement.queue.iter().any(
            |p| matches!(&p.target, BuildTarget::New { def: queued } if *queued == def.id),
        );
        if present || queued {
            return Err(BuildError::AlreadyUnique(def.id.clone()));
        }
    }

    let used = area_used(settlement, content);
    let capacity = area_capacity(th_level, content);
    if used + def.area_cost > capacity {
        return Err(BuildError::AreaExceeded {
            used,
            required: def.area_cost,
            capacity,
        });
    }

    check_prereqs(settlement, def)?;

    let cost = def.cost_at(1);
    if !settlement.storage.amounts.covers(&cost) {
        return Err(BuildError::InsufficientResources(def.id.clone()));
    }
    settlement.storage.amounts.deduct(&cost);

    let id = next_project_id(settlement);
    settlement.queue.push(ConstructionProject {
        id: id.clone(),
        target: BuildTarget::New {
            def: def.id.clone(),
        },
        cost,
        required_secs: def.build_secs_at(1),
        elapsed_secs: 0.0,
    });
    Ok(id)
}

/// Enqueue an upgrade of an existing structure to its next level.
pub fn enqueue_upgrade(
    settlement: &mut SettlementState,
    content: &GameContent,
    structure_id: &StructureId,
) -> Result<ProjectId, BuildError> {
    let (def_id, current_level) = settlement
        .structure(structure_id)
        .filter(|s| s.is_intact())
        .map(|s| (s.def.clone(), s.level))
        .ok_or_else(|| BuildError::UnknownInstance(structure_id.clone()))?;
    let def = content
        .structure(&def_id)
        .ok_or(BuildError::UnknownStructure(def_id))?;

    // Account for upgrades already queued against this instance.
    let queued_levels = settlement
        .queue
        .iter()
        .filter(|p| {
            matches!(&p.target, BuildTarget::Upgrade { structure, .. } if structure == structure_id)
        })
        .count() as u32;
    let to_level = current_level + queued_levels + 1;
    if to_level > def.max_level {
        return Err(BuildError::MaxLevel(def.id.clone()));
    }

    let th_level = town_hall_level(settlement, content);
    if def.id != content.constants.town_hall_def && def.town_hall_level > th_level {
        return Err(BuildError::LevelRequirementNotMet {
            required: def.town_hall_level,
            actual: th_level,
        });
    }

    // Prerequisites can have been destroyed since the original build.
    check_prereqs(settlement, def)?;

    let cost = def.cost_at(to_level);
    if !settlement.storage.amounts.covers(&cost) {
        return Err(BuildError::InsufficientResources(def.id.clone()));
    }
    settlement.storage.amounts.deduct(&cost);

    let id = next_project_id(settlement);
    settlement.queue.push(ConstructionProject {
        id: id.clone(),
        target: BuildTarget::Upgrade {
            structure: structure_id.clone(),
            to_level,
        },
        cost,
        required_secs: def.build_secs_at(to_level),
        elapsed_secs: 0.0,
    });
    Ok(id)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionResult {
    Built(StructureId),
    Upgraded(StructureId, u32),
    /// The upgrade target was destroyed or removed while queued.
    TargetMissing(StructureId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedProject {
    pub project: ProjectId,
    pub result: CompletionResult,
}

fn materialize(
    settlement: &mut SettlementState,
    target: BuildTarget,
    events: &mut Vec<Event>,
) -> CompletionResult {
    match target {
        BuildTarget::New { def } => {
            let id = StructureId(format!("struct_{:06}", settlement.counters.next_structure_id));
            settlement.counters.next_structure_id += 1;
            let structure = StructureState {
                id: id.clone(),
                def,
                level: 1,
                health: 100.0,
                slot: None,
            };
            settlement.structures.push(structure.clone());
            events.push(Event::StructureBuilt {
                settlement: settlement.id.clone(),
                structure,
            });
            CompletionResult::Built(id)
        }
        BuildTarget::Upgrade {
            structure,
            to_level,
        } => {
            let Some(existing) = settlement
                .structure_mut(&structure)
                .filter(|s| s.is_intact())
            else {
                return CompletionResult::TargetMissing(structure);
            };
            existing.level = to_level;
            let snapshot = existing.clone();
            events.push(Event::StructureUpgraded {
                settlement: settlement.id.clone(),
                structure: snapshot,
            });
            CompletionResult::Upgraded(structure, to_level)
        }
    }
}

/// Completion feeds straight back into capacity and production rates so
/// clients never see a tick of stale derived state.
fn recalculate_derived(
    settlement: &mut SettlementState,
    content: &GameContent,
    events: &mut Vec<Event>,
) {
    settlement.population.capacity = population::population_capacity(settlement, content);
    settlement.storage.capacity = ledger::storage_capacity(settlement, content);
    let (rates, _) = ledger::current_rates(settlement, content);
    events.push(Event::ResourceUpdate {
        settlement: settlement.id.clone(),
        resources: settlement.storage.amounts.floored(),
        rates,
    });
    events.push(Event::PopulationUpdate {
        settlement: settlement.id.clone(),
        current: settlement.population.headcount(),
        capacity: settlement.population.capacity,
        happiness: settlement.population.happiness,
    });
}

/// Advance the active (head-of-queue) project. On completion the structure
/// is materialized, the project removed, and the next project promoted with
/// a fresh timer — so at most one project completes per call.
pub fn advance(
    settlement: &mut SettlementState,
    content: &GameContent,
    elapsed_secs: f32,
    events: &mut Vec<Event>,
) -> Option<CompletedProject> {
    let head = settlement.queue.first_mut()?;
    head.elapsed_secs += elapsed_secs;
    if head.elapsed_secs < head.required_secs {
        return None;
    }

    let project = settlement.queue.remove(0);
    let result = materialize(settlement, project.target, events);
    if !matches!(result, CompletionResult::TargetMissing(_)) {
        recalculate_derived(settlement, content, events);
    }
    Some(CompletedProject {
        project: project.id,
        result,
    })
}
