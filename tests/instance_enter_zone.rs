//! Scenario (v)'s `EnterZone` gate and the instance-expiry lobby move
//! (§4.9): a DemonOnly instance refuses admission without a living
//! partner demon, and 5 s after an instance's timer expires every
//! connected member lands in the instance definition's lobby zone.

use std::collections::HashSet;

use odyssey_ai_core::ai::AiParams;
use odyssey_ai_core::config::Config;
use odyssey_ai_core::definitions::{
    AiDataStore, AiScriptHost, DevilDataStore, ScriptOutcome, SkillDataStore, SkillDefinition, SkillExecutor,
    ZoneInstanceData, ZoneInstanceDataStore, ZoneInstanceVariantData, ZoneInstanceVariantDataStore, ZoneInstanceVariantKind,
};
use odyssey_ai_core::entity::active_entity::ActiveEntityConfig;
use odyssey_ai_core::entity::{ActiveEntity, EntityId, EntityKind};
use odyssey_ai_core::error::{CoreError, SkillFailureCode};
use odyssey_ai_core::geometry::Point;
use odyssey_ai_core::zone::{Connection, Zone, ZoneId};
use odyssey_ai_core::{Collaborators, Scheduler};

struct NullHost;
impl AiScriptHost for NullHost {
    fn queue_move_command(&self, _entity: EntityId, _dest: Point, _interrupt: bool) {}
    fn queue_script_command(&self, _entity: EntityId, _function: &str, _interrupt: bool) {}
    fn queue_use_skill_command(&self, _entity: EntityId, _skill: odyssey_ai_core::ai::SkillId, _target: Option<EntityId>, _advance: bool) {}
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
    fn combat_skill_hit(&self, _entity: EntityId, _source: EntityId, _skill: odyssey_ai_core::ai::SkillId) -> ScriptOutcome {
        ScriptOutcome::Continue
    }
    fn prepare_skill(&self, _entity: EntityId, _target: Option<EntityId>) -> ScriptOutcome {
        ScriptOutcome::Continue
    }
    fn pick_target(&self, _entity: EntityId, _candidates: &[EntityId], _now: u64) -> ScriptOutcome {
        ScriptOutcome::Continue
    }
}

struct NullSkills;
impl SkillDataStore for NullSkills {
    fn skill(&self, _id: odyssey_ai_core::ai::SkillId) -> Option<SkillDefinition> {
        None
    }
}

struct NullExecutor;
impl SkillExecutor for NullExecutor {
    fn activate(&self, _entity: EntityId, _skill: odyssey_ai_core::ai::SkillId, _target: Option<EntityId>, _now: u64) -> Result<bool, SkillFailureCode> {
        Ok(true)
    }
    fn execute(&self, _entity: EntityId, _skill: odyssey_ai_core::ai::SkillId, _target: Option<EntityId>, _now: u64) -> Result<bool, SkillFailureCode> {
        Ok(true)
    }
}

struct NullDevils;
impl DevilDataStore for NullDevils {
    fn base_level(&self, _devil_id: u32) -> Option<i16> {
        None
    }
    fn base_move_speed(&self, _devil_id: u32) -> Option<f64> {
        None
    }
    fn base_hp(&self, _devil_id: u32) -> Option<i32> {
        None
    }
    fn base_mp(&self, _devil_id: u32) -> Option<i32> {
        None
    }
    fn ai_type_id(&self, _devil_id: u32) -> Option<u32> {
        None
    }
    fn skill_ids(&self, _devil_id: u32) -> Vec<odyssey_ai_core::ai::SkillId> {
        Vec::new()
    }
}

struct NullAiData;
impl AiDataStore for NullAiData {
    fn ai_params(&self, _ai_type_id: u32) -> Option<AiParams> {
        None
    }
}

/// Instance definition 1: DemonOnly variant 10, one zone (id 2), lobby
/// zone id 9.
struct DemonOnlyFixture;
impl ZoneInstanceDataStore for DemonOnlyFixture {
    fn zone_instance(&self, instance_def_id: u32) -> Option<ZoneInstanceData> {
        (instance_def_id == 1).then(|| ZoneInstanceData { lobby_id: 9, zone_ids: vec![2], dynamic_map_ids: vec![] })
    }
}
impl ZoneInstanceVariantDataStore for DemonOnlyFixture {
    fn variant(&self, variant_id: u32) -> Option<ZoneInstanceVariantData> {
        (variant_id == 10).then(|| ZoneInstanceVariantData {
            kind: ZoneInstanceVariantKind::DemonOnly,
            sub_id: 0,
            zone_partial_ids: vec![],
            time_points: [600, 400, 200, 0],
            timer_expiration_event_id: 0,
            fixed_reward: 1000,
            reward_modifier: 1.0,
        })
    }
}

fn scheduler() -> Scheduler {
    Scheduler::new(
        Config::default(),
        Collaborators {
            host: Box::new(NullHost),
            skills: Box::new(NullSkills),
            executor: Box::new(NullExecutor),
            devils: Box::new(NullDevils),
            ai_data: Box::new(NullAiData),
        },
    )
}

fn spawn_player(zone: &mut Zone, character_id: u32, position: Point) -> EntityId {
    let entity = ActiveEntity::new(
        odyssey_ai_core::entity::alloc_entity_id(),
        ActiveEntityConfig {
            kind: EntityKind::Player,
            zone: Some(zone.id),
            position,
            rotation: 0.0,
            now_ticks: 0,
            move_speed: 0.0,
            max_hp: 100,
            max_mp: 50,
            level: 10,
        },
    );
    let id = entity.id;
    zone.players.insert(id, entity);
    zone.add_connection(Connection::new(character_id, id));
    id
}

fn spawn_partner_demon(zone: &mut Zone, position: Point, alive: bool) -> EntityId {
    let mut entity = ActiveEntity::new(
        odyssey_ai_core::entity::alloc_entity_id(),
        ActiveEntityConfig {
            kind: EntityKind::PartnerDemon,
            zone: Some(zone.id),
            position,
            rotation: 0.0,
            now_ticks: 0,
            move_speed: 0.0,
            max_hp: 100,
            max_mp: 50,
            level: 10,
        },
    );
    if !alive {
        entity.hp = 0;
    }
    let id = entity.id;
    zone.players.insert(id, entity);
    id
}

#[test]
fn demon_only_entry_rejected_without_living_partner_demon() {
    let s = scheduler();
    let old_zone = s.register_zone(Zone::new(ZoneId(1), 50, None, None, 0));
    s.register_zone(Zone::new(ZoneId(2), 100, None, None, 0));

    let character_id = 7;
    let entity_id = spawn_player(&mut old_zone.lock().unwrap(), character_id, Point::new(0.0, 0.0));

    let fixture = DemonOnlyFixture;
    let access: HashSet<u32> = [character_id].into_iter().collect();
    let instance_id = {
        let mut instances = s.instances().lock().unwrap();
        instances.create_instance(&fixture, &fixture, 1, Some(10), None, None, access).unwrap()
    };

    let err = s
        .enter_zone(character_id, entity_id, ZoneId(1), ZoneId(2), Point::new(1.0, 1.0), 0.0, None)
        .unwrap_err();
    assert!(matches!(err, CoreError::InstanceRejected(_)));

    // Rejected entry leaves the player in place and the access grant intact.
    assert!(old_zone.lock().unwrap().players.contains_key(&entity_id));
    assert_eq!(s.instances().lock().unwrap().peek_access(character_id), Some(instance_id));
}

#[test]
fn demon_only_entry_succeeds_with_a_living_partner_demon() {
    let s = scheduler();
    let old_zone = s.register_zone(Zone::new(ZoneId(1), 50, None, None, 0));
    let new_zone = s.register_zone(Zone::new(ZoneId(2), 100, None, None, 0));

    let character_id = 7;
    let (entity_id, partner_id) = {
        let mut zone = old_zone.lock().unwrap();
        let entity_id = spawn_player(&mut zone, character_id, Point::new(0.0, 0.0));
        let partner_id = spawn_partner_demon(&mut zone, Point::new(0.0, 0.0), true);
        (entity_id, partner_id)
    };

    let fixture = DemonOnlyFixture;
    let access: HashSet<u32> = [character_id].into_iter().collect();
    {
        let mut instances = s.instances().lock().unwrap();
        instances.create_instance(&fixture, &fixture, 1, Some(10), None, None, access).unwrap();
    }

    s.enter_zone(character_id, entity_id, ZoneId(1), ZoneId(2), Point::new(5.0, 5.0), 0.0, Some(partner_id)).unwrap();

    assert!(!old_zone.lock().unwrap().players.contains_key(&entity_id));
    assert!(new_zone.lock().unwrap().players.contains_key(&entity_id));
    assert_eq!(s.instances().lock().unwrap().peek_access(character_id), None);
}

#[test]
fn instance_expiry_moves_connected_players_to_the_lobby_after_the_delay() {
    let s = scheduler();
    let instance_zone = s.register_zone(Zone::new(ZoneId(2), 100, None, None, 0));
    let lobby_zone = s.register_zone(Zone::new(ZoneId(9), 9, None, None, 0));

    let character_id = 7;
    let entity_id = spawn_player(&mut instance_zone.lock().unwrap(), character_id, Point::new(1.0, 2.0));

    let fixture = DemonOnlyFixture;
    let access: HashSet<u32> = [character_id].into_iter().collect();
    let (instance_id, expire_at) = {
        let mut instances = s.instances().lock().unwrap();
        let id = instances.create_instance(&fixture, &fixture, 1, Some(10), None, None, access).unwrap();
        let expire_at = instances.get_mut(id).unwrap().start_timer(0, s.config()).unwrap();
        (id, expire_at)
    };
    s.schedule_instance_expiry(instance_id, ZoneId(2), expire_at);

    while s.now_ticks() < expire_at {
        s.tick_once();
    }
    // The expiry broadcast has fired but the lobby move is still pending.
    assert!(instance_zone.lock().unwrap().players.contains_key(&entity_id));

    while s.now_ticks() < expire_at + 5_000_000 {
        s.tick_once();
    }

    assert!(!instance_zone.lock().unwrap().players.contains_key(&entity_id));
    assert!(lobby_zone.lock().unwrap().players.contains_key(&entity_id));
}
