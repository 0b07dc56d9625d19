//! Shared fixtures for the end-to-end scenario tests in §8 of the spec.
//!
//! Each test drives the real `zone`/`ai` modules through their public
//! API (`ai::tick::update_active_states`) rather than poking at private
//! state, so a passing test actually exercises the tick loop's wiring,
//! not just one function in isolation.

#![allow(dead_code)]

use std::collections::HashMap;

use odyssey_ai_core::ai::tick::{update_active_states, TickEnvironment};
use odyssey_ai_core::ai::{AIState, AiParams, SkillId, SkillTypeMask};
use odyssey_ai_core::config::Config;
use odyssey_ai_core::definitions::{
    AiScriptHost, ScriptOutcome, SkillActionType, SkillActivationType, SkillCost, SkillDataStore,
    SkillDefinition, SkillExecutor, SkillFamily,
};
use odyssey_ai_core::entity::active_entity::ActiveEntityConfig;
use odyssey_ai_core::entity::enemy::EnemyBase;
use odyssey_ai_core::entity::{ActiveEntity, Ally, Enemy, EntityId, EntityKind, alloc_entity_id};
use odyssey_ai_core::error::SkillFailureCode;
use odyssey_ai_core::geometry::Point;
use odyssey_ai_core::zone::{Connection, Zone, ZoneId};

/// A script host with no action overrides at all: every hook falls back
/// to the built-in behavior, matching an entity with no `ai_type`-level
/// scripted AI.
pub struct NoopHost;

impl AiScriptHost for NoopHost {
    fn queue_move_command(&self, _entity: EntityId, _dest: Point, _interrupt: bool) {}
    fn queue_script_command(&self, _entity: EntityId, _function: &str, _interrupt: bool) {}
    fn queue_use_skill_command(&self, _entity: EntityId, _skill: SkillId, _target: Option<EntityId>, _advance: bool) {}
    fn queue_wait_command(&self, _entity: EntityId, _ms: u64, _interrupt: bool) {}
    fn chase(&self, _entity: EntityId, _target: EntityId, _min_dist: f64, _max_dist: f64, _interrupt: bool) {}
    fn circle(&self, _entity: EntityId, _center: Point, _interrupt: bool, _distance: f64) {}
    fn retreat(&self, _entity: EntityId, _point: Point, _distance: f64, _interrupt: bool) {}
    fn prepare(&self, _entity: EntityId, _now: u64) -> ScriptOutcome {
        ScriptOutcome::Continue
    }
    fn run_state_script(&self, _function: &str, _entity: EntityId, _now: u64) -> ScriptOutcome {
        ScriptOutcome::Continue
    }
    fn combat_skill_hit(&self, _entity: EntityId, _source: EntityId, _skill: SkillId) -> ScriptOutcome {
        ScriptOutcome::Continue
    }
    fn prepare_skill(&self, _entity: EntityId, _target: Option<EntityId>) -> ScriptOutcome {
        ScriptOutcome::Continue
    }
    fn pick_target(&self, _entity: EntityId, _candidates: &[EntityId], _now: u64) -> ScriptOutcome {
        ScriptOutcome::Continue
    }
}

/// A handful of pre-registered skill definitions keyed by id.
pub struct FixtureSkills(pub HashMap<SkillId, SkillDefinition>);

impl SkillDataStore for FixtureSkills {
    fn skill(&self, id: SkillId) -> Option<SkillDefinition> {
        self.0.get(&id).copied()
    }
}

/// A melee skill with the given range and zero cost/cooldown, matching
/// the "one melee skill range=0" setup in scenario (i).
pub fn melee_skill(id: SkillId, range: f64) -> SkillDefinition {
    SkillDefinition {
        id,
        family: SkillFamily::Normal,
        activation_type: SkillActivationType::Active,
        action_type: SkillActionType::Melee,
        function_id: 1,
        range,
        cooldown_ms: 0,
        charge_ms: 0,
        use_count: 1,
        cost: SkillCost { hp_cost: 0, mp_cost: 0, bullet_cost: 0, item_cost: 0 },
        damage: Some(odyssey_ai_core::definitions::SkillDamageInfo { formula_id: 1, modifier1: 100, modifier2: 0, adds_status_effects: false, is_aoe: false }),
        targets_party: false,
        targets_dead: false,
    }
}

/// A skill executor that resolves every activation/execution immediately,
/// as if the embedding battle system always lands the hit on the first
/// call — enough to drive a command off the queue without modeling
/// damage.
pub struct InstantExecutor;

impl SkillExecutor for InstantExecutor {
    fn activate(&self, _entity: EntityId, _skill: SkillId, _target: Option<EntityId>, _now: u64) -> Result<bool, SkillFailureCode> {
        Ok(true)
    }
    fn execute(&self, _entity: EntityId, _skill: SkillId, _target: Option<EntityId>, _now: u64) -> Result<bool, SkillFailureCode> {
        Ok(true)
    }
}

pub fn ai_params(aggro_distance: f64, fov: f64, think_speed_ms: u64) -> AiParams {
    AiParams {
        aggro_normal_distance: aggro_distance,
        aggro_normal_fov: fov,
        aggro_night_distance: aggro_distance,
        aggro_night_fov: fov,
        aggro_cast_distance: aggro_distance * 1.5,
        aggro_cast_fov: fov,
        deaggro_distance: aggro_distance,
        think_speed_ms,
        aggression: 100,
        aggro_level_limit: 99,
        defensive_distance: 0.0,
        heal_threshold_pct: 50,
        is_boss: false,
        skill_settings: SkillTypeMask::ALL,
        ignores_aggro_limit: false,
    }
}

pub fn make_zone(geometry: Option<odyssey_ai_core::geometry::Geometry>) -> Zone {
    let mut zone = Zone::new(ZoneId(1), 100, None, geometry, 0);
    zone.add_connection(Connection::new(1, EntityId(0)));
    zone
}

pub fn spawn_player(zone: &mut Zone, position: Point) -> EntityId {
    let id = alloc_entity_id();
    let entity = ActiveEntity::new(
        id,
        ActiveEntityConfig {
            kind: EntityKind::Player,
            zone: Some(zone.id),
            position,
            rotation: 0.0,
            now_ticks: 0,
            move_speed: 0.0,
            max_hp: 1000,
            max_mp: 100,
            level: 10,
        },
    );
    zone.players.insert(id, entity);
    id
}

/// Spawn an enemy with the given position, AI params, and skill list,
/// defaulting to `Wandering` (the rest state once a spawn's first-think
/// delay has elapsed, per `ai::tick`'s dispatch).
pub fn spawn_enemy(zone: &mut Zone, position: Point, params: AiParams, move_speed: f64, skill_ids: Vec<SkillId>) -> EntityId {
    let id = alloc_entity_id();
    let base = ActiveEntity::new(
        id,
        ActiveEntityConfig {
            kind: EntityKind::Enemy,
            zone: Some(zone.id),
            position,
            rotation: 0.0,
            now_ticks: 0,
            move_speed,
            max_hp: 500,
            max_mp: 100,
            level: 10,
        },
    );
    let ai = AIState::new(params, odyssey_ai_core::ai::AIStatus::Wandering);
    let enemy_base = EnemyBase {
        devil_id: 1,
        spawn_group_id: None,
        spawn_location_group_id: None,
        spawn_spot_id: None,
        encounter_id: None,
        variant_type: 0,
        skill_ids,
    };
    zone.enemies.insert(id, Enemy { base, enemy_base, ai });
    id
}

pub fn spawn_ally(zone: &mut Zone, position: Point, params: AiParams, move_speed: f64, skill_ids: Vec<SkillId>, owner: Option<EntityId>) -> EntityId {
    let id = alloc_entity_id();
    let base = ActiveEntity::new(
        id,
        ActiveEntityConfig {
            kind: EntityKind::Ally,
            zone: Some(zone.id),
            position,
            rotation: 0.0,
            now_ticks: 0,
            move_speed,
            max_hp: 500,
            max_mp: 100,
            level: 10,
        },
    );
    let ai = AIState::new(params, odyssey_ai_core::ai::AIStatus::Wandering);
    let enemy_base = EnemyBase {
        devil_id: 2,
        spawn_group_id: None,
        spawn_location_group_id: None,
        spawn_spot_id: None,
        encounter_id: None,
        variant_type: 0,
        skill_ids,
    };
    zone.allies.insert(id, Ally { base, enemy_base, ai, owner });
    id
}

pub fn tick_env<'a>(host: &'a NoopHost, skills: &'a FixtureSkills, executor: &'a InstantExecutor, config: &'a Config, now: u64) -> TickEnvironment<'a> {
    TickEnvironment { host, skills, executor, config, now }
}

/// Run `n` ticks, `step_ticks` microseconds apart, starting at `start`,
/// collecting every tick's broadcast packets in emission order. Drains
/// connection 1's outbox since that's the only connection `make_zone`
/// wires up.
pub fn run_ticks(
    zone: &mut Zone,
    host: &NoopHost,
    skills: &FixtureSkills,
    executor: &InstantExecutor,
    config: &Config,
    start: u64,
    step_ticks: u64,
    n: u32,
) -> Vec<Vec<odyssey_ai_core::protocol::OutboundPacket>> {
    let mut history = Vec::new();
    let mut now = start;
    for _ in 0..n {
        let env = tick_env(host, skills, executor, config, now);
        update_active_states(zone, &env, false);
        let packets = zone.connections.first_mut().map(|c| c.drain_outbox()).unwrap_or_default();
        history.push(packets);
        now += step_ticks;
    }
    history
}
