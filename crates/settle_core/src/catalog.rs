//! Content/master-data definitions: the structure catalog and simulation
//! constants. Loaded once at startup (by `settle_world`), validated, and
//! passed by reference — never held in ambient global state.

use crate::types::{DefId, ResourceAmounts};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructureCategory {
    Building,
    Extractor,
}

/// A prerequisite structure (at a minimum level) for building something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prereq {
    pub def: DefId,
    #[serde(default = "default_prereq_level")]
    pub level: u32,
}

fn default_prereq_level() -> u32 {
    1
}

/// Per-structure contribution to derived settlement stats. All modifiers
/// scale linearly with structure level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub population_capacity: u32,
    #[serde(default)]
    pub storage_capacity: f32,
    #[serde(default)]
    pub happiness: f32,
    /// Per-second base output for extractors; zero for plain buildings.
    #[serde(default)]
    pub production: ResourceAmounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureDef {
    pub id: DefId,
    pub name: String,
    pub category: StructureCategory,
    /// At most one instance per settlement.
    #[serde(default)]
    pub unique: bool,
    pub area_cost: u32,
    pub max_level: u32,
    /// Cost of level 1; level L costs `base_cost × cost_growth^(L-1)`.
    pub base_cost: ResourceAmounts,
    pub cost_growth: f32,
    pub base_build_secs: f32,
    pub build_time_growth: f32,
    /// Minimum town-hall level required to start building this.
    #[serde(default)]
    pub town_hall_level: u32,
    #[serde(default)]
    pub prereqs: Vec<Prereq>,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl StructureDef {
    pub fn cost_at(&self, level: u32) -> ResourceAmounts {
        self.base_cost
            .scaled(self.cost_growth.powi(level.saturating_sub(1) as i32))
    }

    pub fn build_secs_at(&self, level: u32) -> f32 {
        self.base_build_secs * self.build_time_growth.powi(level.saturating_sub(1) as i32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constants {
    /// Catalog id of the town hall, the structure whose level gates area
    /// capacity and build requirements.
    pub town_hall_def: DefId,
    pub base_population_capacity: u32,
    pub base_storage_capacity: f32,
    /// Buildable footprint at town-hall level 0.
    pub base_area: u32,
    pub area_per_town_hall_level: u32,
    pub food_per_capita_per_sec: f32,
    pub water_per_capita_per_sec: f32,
    /// Peak fractional growth per second at full happiness and headroom.
    pub growth_rate_per_sec: f32,
    pub starvation_decline_per_sec: f32,
    /// Below this happiness, settlers emigrate.
    pub emigration_threshold: f32,
    pub emigration_decline_per_sec: f32,
    pub happiness_baseline: f32,
    /// Fraction of the gap to target closed per second.
    pub happiness_drift_per_sec: f32,
    pub sufficiency_happiness_bonus: f32,
    pub shortage_happiness_penalty: f32,
    pub trauma_decay_per_sec: f32,
    /// Extra output/modifier fraction per structure level above 1.
    pub level_bonus_per_level: f32,
    pub starting_resources: ResourceAmounts,
    pub starting_population: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterTuning {
    pub default_warning_secs: f32,
    pub default_impact_secs: f32,
    /// AFTERMATH lingers this long before RESOLVED so clients can show the
    /// aftermath report.
    pub aftermath_grace_secs: f32,
    /// Structure health lost per second of impact at severity 100.
    pub damage_health_per_sec_at_max: f32,
    /// ± fraction applied to each damage roll.
    pub damage_variance: f32,
    /// Fraction of population lost at severity 100 with no shelter.
    pub casualty_fraction_at_max: f32,
    pub casualty_variance: f32,
    /// Fraction of casualties avoided when everyone is sheltered.
    pub shelter_mitigation: f32,
    pub resource_loss_fraction_at_max: f32,
    pub happiness_penalty_at_max: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameContent {
    pub content_version: String,
    pub structures: Vec<StructureDef>,
    pub constants: Constants,
    pub disasters: DisasterTuning,
}

impl GameContent {
    pub fn structure(&self, id: &str) -> Option<&StructureDef> {
        self.structures.iter().find(|def| def.id == id)
    }
}

/// Linear level scaling applied to modifiers and production:
/// level 1 → 1.0, each further level adds `level_bonus_per_level`.
pub fn level_multiplier(level: u32, constants: &Constants) -> f32 {
    1.0 + constants.level_bonus_per_level * level.saturating_sub(1) as f32
}
