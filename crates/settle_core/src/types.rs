//! Type definitions for `settle_core`.
//!
//! All public state types, event payloads, and ID newtypes used by the
//! simulation. Content/catalog definitions live in `catalog`.

use serde::{Deserialize, Serialize};

/// Catalog (master-data) id of a structure definition, e.g. `"structure_house"`.
pub type DefId = String;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(SettlementId);
string_id!(WorldId);
string_id!(ProfileId);
string_id!(StructureId);
string_id!(ProjectId);
string_id!(DisasterId);

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Food,
    Water,
    Wood,
    Stone,
    Ore,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Food,
        ResourceKind::Water,
        ResourceKind::Wood,
        ResourceKind::Stone,
        ResourceKind::Ore,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Food => "food",
            ResourceKind::Water => "water",
            ResourceKind::Wood => "wood",
            ResourceKind::Stone => "stone",
            ResourceKind::Ore => "ore",
        }
    }
}

/// A quantity for every resource kind. Stored as `f32` so sub-unit
/// production at a 1 Hz tick accumulates instead of being truncated away;
/// externally-visible payloads go through [`ResourceAmounts::floored`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAmounts {
    #[serde(default)]
    pub food: f32,
    #[serde(default)]
    pub water: f32,
    #[serde(default)]
    pub wood: f32,
    #[serde(default)]
    pub stone: f32,
    #[serde(default)]
    pub ore: f32,
}

impl ResourceAmounts {
    pub fn get(&self, kind: ResourceKind) -> f32 {
        match kind {
            ResourceKind::Food => self.food,
            ResourceKind::Water => self.water,
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
            ResourceKind::Ore => self.ore,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut f32 {
        match kind {
            ResourceKind::Food => &mut self.food,
            ResourceKind::Water => &mut self.water,
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Stone => &mut self.stone,
            ResourceKind::Ore => &mut self.ore,
        }
    }

    /// True if every kind in `self` is at least the matching kind in `cost`.
    pub fn covers(&self, cost: &ResourceAmounts) -> bool {
        ResourceKind::ALL
            .iter()
            .all(|&kind| self.get(kind) >= cost.get(kind))
    }

    /// Subtract `cost` from each kind, flooring at zero.
    pub fn deduct(&mut self, cost: &ResourceAmounts) {
        for kind in ResourceKind::ALL {
            let slot = self.get_mut(kind);
            *slot = (*slot - cost.get(kind)).max(0.0);
        }
    }

    pub fn scaled(&self, factor: f32) -> ResourceAmounts {
        let mut out = *self;
        for kind in ResourceKind::ALL {
            *out.get_mut(kind) = self.get(kind) * factor;
        }
        out
    }

    /// Whole-unit view used in event payloads and change detection.
    pub fn floored(&self) -> ResourceAmounts {
        let mut out = *self;
        for kind in ResourceKind::ALL {
            *out.get_mut(kind) = self.get(kind).floor();
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        ResourceKind::ALL.iter().all(|&kind| self.get(kind) <= 0.0)
    }
}

/// Per-second production and consumption, as last computed by the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRates {
    pub production: ResourceAmounts,
    pub consumption: ResourceAmounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    pub amounts: ResourceAmounts,
    /// Per-kind ceiling. Quantities never exceed this after a tick; excess
    /// production is discarded, not banked.
    pub capacity: f32,
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationState {
    /// Fractional internally; [`PopulationState::headcount`] is the visible value.
    pub current: f32,
    /// 0–100.
    pub happiness: f32,
    /// Derived: 10 base + housing modifiers. Recomputed every tick and on
    /// construction completion.
    pub capacity: u32,
}

impl PopulationState {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn headcount(&self) -> u32 {
        self.current.max(0.0).floor() as u32
    }
}

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureState {
    pub id: StructureId,
    /// References a `StructureDef` in `GameContent`.
    pub def: DefId,
    pub level: u32,
    /// 0–100. At 0 the structure is destroyed and stops contributing to
    /// capacity and production.
    pub health: f32,
    pub slot: Option<u32>,
}

impl StructureState {
    pub fn is_intact(&self) -> bool {
        self.health > 0.0
    }

    pub fn is_damaged(&self) -> bool {
        self.health > 0.0 && self.health < 100.0
    }

    pub fn is_destroyed(&self) -> bool {
        self.health <= 0.0
    }
}

// ---------------------------------------------------------------------------
// Construction queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BuildTarget {
    New { def: DefId },
    Upgrade { structure: StructureId, to_level: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionProject {
    pub id: ProjectId,
    pub target: BuildTarget,
    /// Already deducted from storage at enqueue time.
    pub cost: ResourceAmounts,
    pub required_secs: f32,
    /// Only the head-of-queue project accrues time (single build slot).
    pub elapsed_secs: f32,
}

// ---------------------------------------------------------------------------
// Settlement aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub next_structure_id: u64,
    pub next_project_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementState {
    pub id: SettlementId,
    pub profile: ProfileId,
    pub world: WorldId,
    /// Location modifier applied to extractor output.
    pub tile_quality: f32,
    /// Cumulative disaster-preparedness score.
    pub resilience: u32,
    /// Happiness penalty from recent disasters; decays over time.
    pub trauma: f32,
    pub storage: StorageState,
    pub population: PopulationState,
    pub structures: Vec<StructureState>,
    /// FIFO; index 0 is the active project.
    pub queue: Vec<ConstructionProject>,
    /// Wall-clock of the last completed tick, used to derive elapsed time.
    pub last_tick_ms: u64,
    pub counters: Counters,
}

impl SettlementState {
    pub fn structure(&self, id: &StructureId) -> Option<&StructureState> {
        self.structures.iter().find(|s| &s.id == id)
    }

    pub fn structure_mut(&mut self, id: &StructureId) -> Option<&mut StructureState> {
        self.structures.iter_mut().find(|s| &s.id == id)
    }
}

// ---------------------------------------------------------------------------
// Disasters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisasterKind {
    Earthquake,
    Flood,
    Wildfire,
    Storm,
    Drought,
}

impl DisasterKind {
    pub fn label(self) -> &'static str {
        match self {
            DisasterKind::Earthquake => "earthquake",
            DisasterKind::Flood => "flood",
            DisasterKind::Wildfire => "wildfire",
            DisasterKind::Storm => "storm",
            DisasterKind::Drought => "drought",
        }
    }
}

/// Status transitions are strictly forward; `Ord` reflects the walk
/// WARNING → IMPACT → AFTERMATH → RESOLVED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisasterStatus {
    Warning,
    Impact,
    Aftermath,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityLevel {
    Mild,
    Moderate,
    Major,
    Catastrophic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterEvent {
    pub id: DisasterId,
    pub world: WorldId,
    pub kind: DisasterKind,
    /// Internal 0–100 scale; the user-facing 1–5 scale maps onto ranges of
    /// this via `severity_from_user_scale`.
    pub severity: f32,
    pub status: DisasterStatus,
    /// Events are created already in WARNING, so this equals creation time.
    pub warning_issued_at_ms: u64,
    /// When impact begins (warning window end).
    pub scheduled_at_ms: u64,
    pub impact_duration_ms: u64,
    /// Set on entry to AFTERMATH; drives the grace period before RESOLVED.
    pub aftermath_at_ms: Option<u64>,
    pub resolved_at_ms: Option<u64>,
}

impl DisasterEvent {
    pub fn severity_level(&self) -> SeverityLevel {
        crate::disaster::severity_level(self.severity)
    }
}

/// Append-only per-settlement record of one resolved disaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterRecord {
    pub disaster: DisasterId,
    pub kind: DisasterKind,
    pub severity_level: SeverityLevel,
    pub casualties: u32,
    pub structures_damaged: u32,
    pub structures_destroyed: u32,
    pub resources_lost: ResourceAmounts,
    pub happiness_loss: f32,
    pub resilience_gained: u32,
    pub recorded_at_ms: u64,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Externally-visible simulation events, relayed by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "resource-update")]
    ResourceUpdate {
        settlement: SettlementId,
        resources: ResourceAmounts,
        rates: ResourceRates,
    },
    #[serde(rename = "population-state")]
    PopulationUpdate {
        settlement: SettlementId,
        current: u32,
        capacity: u32,
        happiness: f32,
    },
    #[serde(rename = "construction-queued")]
    ConstructionQueued {
        settlement: SettlementId,
        project: ProjectId,
        def: DefId,
    },
    #[serde(rename = "structure:built")]
    StructureBuilt {
        settlement: SettlementId,
        structure: StructureState,
    },
    #[serde(rename = "structure:upgraded")]
    StructureUpgraded {
        settlement: SettlementId,
        structure: StructureState,
    },
    #[serde(rename = "disaster-warning")]
    DisasterWarning {
        disaster: DisasterId,
        kind: DisasterKind,
        world: WorldId,
        warning_remaining_ms: u64,
    },
    #[serde(rename = "disaster-impact")]
    DisasterImpact { disaster: DisasterId },
    #[serde(rename = "disaster-aftermath")]
    DisasterAftermath {
        disaster: DisasterId,
        casualties: u32,
        structures_damaged: u32,
        structures_destroyed: u32,
        resources_lost: ResourceAmounts,
        happiness_loss: f32,
        resilience_gained: u32,
    },
}
