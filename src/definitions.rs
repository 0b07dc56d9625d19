//! Read-only external collaborators: definition stores, server-data
//! stores, and the scripting host. Everything here is a trait boundary so
//! the crate can be exercised against in-memory fixtures in tests without
//! a real definition database — the same small-focused-module preference
//! the source shows by taking config and zone state as plain arguments
//! instead of reaching into global state.

use crate::ai::{AICommand, AiParams, SkillCategory, SkillId};
use crate::entity::EntityId;
use crate::error::SkillFailureCode;
use crate::geometry::Point;
use crate::geometry::qmp::QmpFile;
use crate::geometry::spot::Spot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillFamily {
    Normal,
    Item,
    Fusion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillActivationType {
    Active,
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillActionType {
    Melee,
    Ranged,
    Heal,
    Support,
    Guard,
    Spin,
    Rapid,
    Counter,
    Dodge,
}

#[derive(Debug, Clone, Copy)]
pub struct SkillDamageInfo {
    pub formula_id: u32,
    pub modifier1: i32,
    pub modifier2: i32,
    pub adds_status_effects: bool,
    pub is_aoe: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SkillCost {
    pub hp_cost: i32,
    pub mp_cost: i32,
    pub bullet_cost: u32,
    pub item_cost: u32,
}

/// Everything `RefreshSkillMap`/`PrepareSkillUsage`/`SkillAdvance` need
/// about one skill definition.
#[derive(Debug, Clone, Copy)]
pub struct SkillDefinition {
    pub id: SkillId,
    pub family: SkillFamily,
    pub activation_type: SkillActivationType,
    pub action_type: SkillActionType,
    pub function_id: u32,
    pub range: f64,
    pub cooldown_ms: u64,
    pub charge_ms: u64,
    pub use_count: u32,
    pub cost: SkillCost,
    pub damage: Option<SkillDamageInfo>,
    pub targets_party: bool,
    pub targets_dead: bool,
}

impl SkillDefinition {
    pub fn category(&self) -> Option<SkillCategory> {
        match self.action_type {
            SkillActionType::Melee | SkillActionType::Spin | SkillActionType::Rapid => Some(SkillCategory::Clsr),
            SkillActionType::Ranged => Some(SkillCategory::Lngr),
            SkillActionType::Heal => Some(SkillCategory::Heal),
            SkillActionType::Support => Some(SkillCategory::Support),
            SkillActionType::Guard | SkillActionType::Counter | SkillActionType::Dodge => Some(SkillCategory::Def),
        }
    }

    pub fn requires_advance(&self) -> bool {
        matches!(
            self.action_type,
            SkillActionType::Melee | SkillActionType::Spin | SkillActionType::Rapid | SkillActionType::Counter | SkillActionType::Dodge
        )
    }

    pub fn is_outclass_eligible(&self) -> bool {
        self.cooldown_ms == 0 && self.cost.hp_cost == 0 && self.cost.mp_cost == 0 && self.cost.bullet_cost == 0 && self.cost.item_cost == 0
    }
}

pub trait SkillDataStore {
    fn skill(&self, id: SkillId) -> Option<SkillDefinition>;
}

pub trait AiDataStore {
    fn ai_params(&self, ai_type_id: u32) -> Option<AiParams>;
}

pub trait DevilDataStore {
    fn base_level(&self, devil_id: u32) -> Option<i16>;
    fn base_move_speed(&self, devil_id: u32) -> Option<f64>;
    fn base_hp(&self, devil_id: u32) -> Option<i32>;
    fn base_mp(&self, devil_id: u32) -> Option<i32>;
    fn ai_type_id(&self, devil_id: u32) -> Option<u32>;
    fn skill_ids(&self, devil_id: u32) -> Vec<SkillId>;
}

pub trait SpotDataStore {
    fn spots(&self, dynamic_map_id: u32) -> Vec<Spot>;
    fn spot(&self, dynamic_map_id: u32, spot_id: u32) -> Option<Spot>;
}

pub trait QmpLoader {
    fn load(&self, name: &str) -> Option<QmpFile>;
}

/// One NPC/object/spawn-group placement as the server-data store describes
/// a zone's static content; `zone::Zone` is built from these at first entry.
#[derive(Debug, Clone)]
pub struct ServerZone {
    pub starting_x: f64,
    pub starting_y: f64,
    pub starting_rotation: f64,
    /// A global zone has exactly one live instance shared by everyone,
    /// rather than one private copy per `ZoneInstance`.
    pub global: bool,
    pub spawn_group_ids: Vec<u32>,
    pub spawn_location_group_ids: Vec<u32>,
    pub qmp_name: Option<String>,
}

pub trait ZoneDataStore {
    fn zone(&self, zone_id: u32, dynamic_map_id: Option<u32>) -> Option<ServerZone>;
}

/// `ZoneInstanceData(id)`: the lobby and zone/dynamic-map set backing one
/// instance definition.
#[derive(Debug, Clone)]
pub struct ZoneInstanceData {
    pub lobby_id: u32,
    pub zone_ids: Vec<u32>,
    pub dynamic_map_ids: Vec<u32>,
}

pub trait ZoneInstanceDataStore {
    fn zone_instance(&self, instance_def_id: u32) -> Option<ZoneInstanceData>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneInstanceVariantKind {
    Normal,
    TimeTrial,
    DemonOnly,
}

/// `ZoneInstanceVariantData(id)`: timer shape, rewards, and rank
/// breakpoints for one instance variant.
#[derive(Debug, Clone)]
pub struct ZoneInstanceVariantData {
    pub kind: ZoneInstanceVariantKind,
    pub sub_id: u32,
    pub zone_partial_ids: Vec<u32>,
    /// `[base_duration_or_limit_s, breakpoint_b_s, breakpoint_c_s, unused]`
    /// for TimeTrial/DemonOnly; `[time_limit_s, 0, 0, 0]` for Normal.
    pub time_points: [u32; 4],
    pub timer_expiration_event_id: u32,
    pub fixed_reward: u32,
    pub reward_modifier: f64,
}

pub trait ZoneInstanceVariantDataStore {
    fn variant(&self, variant_id: u32) -> Option<ZoneInstanceVariantData>;
}

/// `AIScript(name) → { source }`, opaque text the scripting host compiles
/// or interprets; this crate never inspects `source` itself.
#[derive(Debug, Clone)]
pub struct AiScriptSource {
    pub source: String,
}

pub trait AiScriptStore {
    fn script(&self, name: &str) -> Option<AiScriptSource>;
}

/// Outcome of a script entry point, replacing the source's magic integers
/// with a tagged result per the design note on script/engine callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    Continue,
    AbortWithError(String),
    HandledQueued,
    PickedTarget(EntityId),
}

/// The callable surface an AI script is allowed to invoke. Implemented by
/// the scripting host, consumed by `ai::scripting`.
pub trait AiScriptHost {
    fn queue_move_command(&self, entity: EntityId, dest: Point, interrupt: bool);
    fn queue_script_command(&self, entity: EntityId, function: &str, interrupt: bool);
    fn queue_use_skill_command(&self, entity: EntityId, skill: SkillId, target: Option<EntityId>, advance: bool);
    fn queue_wait_command(&self, entity: EntityId, ms: u64, interrupt: bool);
    fn chase(&self, entity: EntityId, target: EntityId, min_dist: f64, max_dist: f64, interrupt: bool);
    fn circle(&self, entity: EntityId, center: Point, interrupt: bool, distance: f64);
    fn retreat(&self, entity: EntityId, point: Point, distance: f64, interrupt: bool);

    /// `prepare(entity, manager) -> int (0 = ok)`.
    fn prepare(&self, entity: EntityId, now: u64) -> ScriptOutcome;
    /// `idle|wander|aggro|combat(entity, manager, now) -> int`.
    fn run_state_script(&self, function: &str, entity: EntityId, now: u64) -> ScriptOutcome;
    /// `combatSkillHit(entity, manager, source, skillId) -> int`.
    fn combat_skill_hit(&self, entity: EntityId, source: EntityId, skill: SkillId) -> ScriptOutcome;
    /// `prepareSkill(entity, manager, target) -> int`.
    fn prepare_skill(&self, entity: EntityId, target: Option<EntityId>) -> ScriptOutcome;
    /// `target(entity, candidates, manager, now) -> int (entity id or 0)`.
    fn pick_target(&self, entity: EntityId, candidates: &[EntityId], now: u64) -> ScriptOutcome;
}

/// Exposed for command-queue reconstruction when a script entry point
/// queues a command rather than handling it itself.
pub fn noop_command() -> AICommand {
    AICommand::Wait { duration_ms: 0 }
}

/// The stat/damage-resolution collaborator `UseSkill` command execution
/// calls into. Battle formulas are out of scope for this crate (see
/// Non-goals); this trait is the seam a combat system plugs into.
pub trait SkillExecutor {
    /// Begin activating `skill`. `Ok(true)` means it resolved immediately
    /// this tick (the command should pop); `Ok(false)` means it is now
    /// charging or traveling and the command stays queued with
    /// `UseSkill::activated` flipped to `true`.
    fn activate(&self, entity: EntityId, skill: SkillId, target: Option<EntityId>, now: u64) -> Result<bool, SkillFailureCode>;
    /// Continue an already-activated skill. Same `Ok` meaning as `activate`.
    fn execute(&self, entity: EntityId, skill: SkillId, target: Option<EntityId>, now: u64) -> Result<bool, SkillFailureCode>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn melee_skill(id: SkillId, cooldown_ms: u64) -> SkillDefinition {
        SkillDefinition {
            id,
            family: SkillFamily::Normal,
            activation_type: SkillActivationType::Active,
            action_type: SkillActionType::Melee,
            function_id: 1,
            range: 0.0,
            cooldown_ms,
            charge_ms: 0,
            use_count: 1,
            cost: SkillCost { hp_cost: 0, mp_cost: 0, bullet_cost: 0, item_cost: 0 },
            damage: None,
            targets_party: false,
            targets_dead: false,
        }
    }

    #[test]
    fn outclass_eligible_requires_zero_cooldown_and_cost() {
        assert!(melee_skill(1, 0).is_outclass_eligible());
        assert!(!melee_skill(1, 1000).is_outclass_eligible());
    }

    #[test]
    fn category_maps_action_type() {
        assert_eq!(melee_skill(1, 0).category(), Some(SkillCategory::Clsr));
    }
}
