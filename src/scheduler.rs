//! Active-zone dispatch, the tick loop, and the deferred-task queue (§5).
//!
//! Grounded in the teacher's `GameServer::run` loop in the old `main.rs`:
//! one `tokio::time::interval`-driven loop steps every zone each tick.
//! Generalized from the teacher's single `GameServer` owning every zone
//! directly to one `Mutex<Zone>` per zone id, so cross-zone work (an
//! instance tearing down two zones at once) can take both locks in
//! sorted order without blocking zones it doesn't touch. Per the design
//! note on timer wheels, this crate runs the dispatch loop on a single
//! task; a multi-worker pool pulling from a shared priority queue is out
//! of scope (documented in DESIGN.md).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ai::tick::{update_active_states, TickEnvironment};
use crate::ai::{AIState, AIStatus, AiParams, SkillTypeMask};
use crate::clock::WorldClock;
use crate::config::{Config, TICK_INTERVAL_MS};
use crate::definitions::{AiDataStore, AiScriptHost, DevilDataStore, SkillDataStore, SkillExecutor};
use crate::entity::active_entity::ActiveEntityConfig;
use crate::entity::enemy::{EnemyBase, SpawnLocationGroupId};
use crate::entity::{alloc_entity_id, ActiveEntity, EntityId, EntityKind, Enemy};
use crate::error::{CoreError, CoreResult};
use crate::geometry::Point;
use crate::instance::{InstanceId, InstanceRegistry};
use crate::protocol::OutboundPacket;
use crate::zone::spawn::SpawnMode;
use crate::zone::transfer;
use crate::zone::{Zone, ZoneId};

/// Delay between an instance's expiry broadcast and the lobby move that
/// follows it: "5 s later all players are moved to the instance
/// definition's lobbyId" (§4.9).
const LOBBY_MOVE_DELAY_TICKS: u64 = 5_000_000;

/// One sweep-or-expire boundary the deferred-task queue tracks. Respawn
/// and trigger evaluation already have their own per-zone due-time state
/// (`SpawnManager`/`TriggerRegistry`); this task only tells the scheduler
/// *when* to ask a zone to re-check them, plus instance timer boundaries
/// that span zones and so cannot live on a single `Zone`.
#[derive(Debug, Clone, Copy)]
pub enum DeferredTaskKind {
    /// Re-run the respawn/trigger sweep for one zone.
    ZoneSweep,
    /// An instance's timer has reached its scheduled expiry tick.
    InstanceTimerExpire(InstanceId),
    /// `LOBBY_MOVE_DELAY_TICKS` after an instance's timer expired: move
    /// every remaining connected member into the instance's lobby zone.
    InstanceLobbyMove(InstanceId),
}

#[derive(Debug, Clone, Copy)]
pub struct DeferredTask {
    pub run_at_ticks: u64,
    pub zone_id: ZoneId,
    pub kind: DeferredTaskKind,
}

/// Min-heap entry ordering deferred tasks by `run_at_ticks`, same
/// reversed-`Ord` idiom as `status_effect::Boundary`.
#[derive(Debug, Clone, Copy)]
struct QueueEntry(DeferredTask);

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.run_at_ticks == other.0.run_at_ticks
    }
}
impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.run_at_ticks.cmp(&self.0.run_at_ticks)
    }
}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn fallback_ai_params(config: &Config) -> AiParams {
    AiParams {
        aggro_normal_distance: 1000.0,
        aggro_normal_fov: std::f64::consts::PI,
        aggro_night_distance: 1000.0,
        aggro_night_fov: std::f64::consts::PI,
        aggro_cast_distance: 1500.0,
        aggro_cast_fov: std::f64::consts::PI,
        deaggro_distance: 1500.0,
        think_speed_ms: config.default_think_speed_ms,
        aggression: 100,
        aggro_level_limit: 99,
        defensive_distance: 0.0,
        heal_threshold_pct: 50,
        is_boss: false,
        skill_settings: SkillTypeMask::ALL,
        ignores_aggro_limit: false,
    }
}

/// Turn one declarative `SpawnPlacement` into a live `Enemy` registered in
/// `zone`. Returns `None` (logging the taxonomy's `DefinitionMissing`
/// warning) if the devil definition backing the placement can't be
/// resolved — the one case this function itself can fail; a missing AI
/// definition degrades to `fallback_ai_params` rather than rejecting the
/// spawn outright, since an idle/wandering NPC is still better than none.
fn instantiate_placement(
    zone: &mut Zone,
    placement: &crate::zone::spawn::SpawnPlacement,
    location_group_id: u32,
    devils: &dyn DevilDataStore,
    ai_data: &dyn AiDataStore,
    config: &Config,
    now: u64,
) -> Option<EntityId> {
    let Some(level) = devils.base_level(placement.devil_id) else {
        tracing::warn!(devil_id = placement.devil_id, zone_id = zone.id.0, "devil definition missing, skipping spawn placement");
        return None;
    };
    let move_speed = devils.base_move_speed(placement.devil_id).unwrap_or(0.0);
    let max_hp = devils.base_hp(placement.devil_id).unwrap_or(1);
    let max_mp = devils.base_mp(placement.devil_id).unwrap_or(0);
    let skill_ids = devils.skill_ids(placement.devil_id);
    let ai_type_id = devils.ai_type_id(placement.devil_id);
    let mut params = ai_type_id.and_then(|id| ai_data.ai_params(id)).unwrap_or_else(|| fallback_ai_params(config));
    if let Some(aggression) = placement.aggression_override {
        params.aggression = aggression;
    }

    let id = alloc_entity_id();
    let base = ActiveEntity::new(
        id,
        ActiveEntityConfig {
            kind: EntityKind::Enemy,
            zone: Some(zone.id),
            position: placement.position,
            rotation: 0.0,
            now_ticks: now,
            move_speed,
            max_hp,
            max_mp,
            level,
        },
    );
    let mut ai = AIState::new(params, AIStatus::Wandering);
    if let Some(script) = &placement.ai_script_override {
        ai.action_overrides.insert("wander".to_string(), script.clone());
    }

    let enemy = Enemy {
        base,
        enemy_base: EnemyBase {
            devil_id: placement.devil_id,
            spawn_group_id: None,
            spawn_location_group_id: Some(SpawnLocationGroupId(location_group_id)),
            spawn_spot_id: None,
            encounter_id: None,
            variant_type: 0,
            skill_ids,
        },
        ai,
    };
    zone.enemies.insert(id, enemy);
    zone.spawner.note_live_entity(location_group_id, id);
    Some(id)
}

/// Every definition-store/scripting collaborator a tick needs. Stored as
/// trait objects since the scheduler runs on a single task and has no
/// need to name a concrete type per deployment.
pub struct Collaborators {
    pub host: Box<dyn AiScriptHost>,
    pub skills: Box<dyn SkillDataStore>,
    pub executor: Box<dyn SkillExecutor>,
    pub devils: Box<dyn DevilDataStore>,
    pub ai_data: Box<dyn AiDataStore>,
}

pub struct Scheduler {
    zones: Mutex<HashMap<ZoneId, Arc<Mutex<Zone>>>>,
    /// Zone ids currently tracked active (non-empty last tick), used to
    /// detect the inactive→active edge that calls `Zone::thaw`.
    active: Mutex<HashSet<ZoneId>>,
    instances: Mutex<InstanceRegistry>,
    deferred: Mutex<BinaryHeap<QueueEntry>>,
    clock: Mutex<WorldClock>,
    config: Config,
    collaborators: Collaborators,
    now_ticks: std::sync::atomic::AtomicU64,
}

impl Scheduler {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            zones: Mutex::new(HashMap::new()),
            active: Mutex::new(HashSet::new()),
            instances: Mutex::new(InstanceRegistry::new()),
            deferred: Mutex::new(BinaryHeap::new()),
            clock: Mutex::new(WorldClock::default()),
            config,
            collaborators,
            now_ticks: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn instances(&self) -> &Mutex<InstanceRegistry> {
        &self.instances
    }

    pub fn now_ticks(&self) -> u64 {
        self.now_ticks.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn register_zone(&self, zone: Zone) -> Arc<Mutex<Zone>> {
        let id = zone.id;
        let handle = Arc::new(Mutex::new(zone));
        self.zones.lock().unwrap().insert(id, handle.clone());
        handle
    }

    pub fn zone_handle(&self, id: ZoneId) -> Option<Arc<Mutex<Zone>>> {
        self.zones.lock().unwrap().get(&id).cloned()
    }

    pub fn unregister_zone(&self, id: ZoneId) {
        self.zones.lock().unwrap().remove(&id);
        self.active.lock().unwrap().remove(&id);
    }

    pub fn schedule(&self, task: DeferredTask) {
        self.deferred.lock().unwrap().push(QueueEntry(task));
    }

    /// Schedule an instance's timer expiry against the wall the scheduler
    /// already owns, so the sweep fires it without a second clock source.
    pub fn schedule_instance_expiry(&self, instance_id: InstanceId, zone_id: ZoneId, expire_at_ticks: u64) {
        self.schedule(DeferredTask { run_at_ticks: expire_at_ticks, zone_id, kind: DeferredTaskKind::InstanceTimerExpire(instance_id) });
    }

    /// One engine tick: advance the clock, step every active zone, then
    /// drain whatever deferred tasks are now due. Mirrors the teacher's
    /// `GameServer::game_tick` shape (spawn tick, AI tick, per-zone sweep)
    /// but over `ZoneId`-addressed locks instead of one shared state blob.
    pub fn tick_once(&self) {
        let now = self.now_ticks.fetch_add(TICK_INTERVAL_MS * 1_000, std::sync::atomic::Ordering::Relaxed) + TICK_INTERVAL_MS * 1_000;

        let is_night = {
            let mut clock = self.clock.lock().unwrap();
            clock.advance_game_minute();
            clock.is_night()
        };

        let zone_ids: Vec<ZoneId> = self.zones.lock().unwrap().keys().copied().collect();
        for zone_id in zone_ids {
            let Some(handle) = self.zone_handle(zone_id) else { continue };
            let _span = tracing::info_span!("zone_tick", zone_id = zone_id.0).entered();
            let mut zone = handle.lock().unwrap();

            let was_active = self.active.lock().unwrap().contains(&zone_id);
            let is_active = zone.is_active();
            if is_active && !was_active {
                zone.thaw(now);
            }
            match (was_active, is_active) {
                (_, true) => {
                    self.active.lock().unwrap().insert(zone_id);
                }
                (_, false) => {
                    self.active.lock().unwrap().remove(&zone_id);
                }
            }
            if !is_active {
                continue;
            }

            self.tick_zone(&mut zone, now, is_night);
        }

        self.drain_deferred(now);
    }

    fn tick_zone(&self, zone: &mut Zone, now: u64, is_night: bool) {
        let env = TickEnvironment {
            host: self.collaborators.host.as_ref(),
            skills: self.collaborators.skills.as_ref(),
            executor: self.collaborators.executor.as_ref(),
            config: &self.config,
            now,
        };
        let despawned = update_active_states(zone, &env, is_night);
        for id in despawned {
            if let Some(enemy) = zone.enemies.remove(&id) {
                if let Some(group) = enemy.enemy_base.spawn_location_group_id {
                    zone.spawner.note_entity_removed(group.0, id, now);
                }
            } else if let Some(ally) = zone.allies.remove(&id) {
                if let Some(group) = ally.enemy_base.spawn_location_group_id {
                    zone.spawner.note_entity_removed(group.0, id, now);
                }
            }
        }
        zone.last_ticked_now = now;
        self.sweep_respawns(zone, now);
    }

    /// §4.8 respawn/trigger sweep: ask `SpawnManager` which location
    /// groups are due, instantiate their placements, and re-arm the next
    /// sweep a tick-interval out.
    fn sweep_respawns(&self, zone: &mut Zone, now: u64) {
        let due = zone.spawner.due_for_respawn(now);
        if due.is_empty() {
            return;
        }
        let clock = *self.clock.lock().unwrap();
        for group_id in due {
            let disabled = zone.disabled_spawn_groups.clone();
            let placements = zone.spawner.trigger(group_id, SpawnMode::Normal, &clock, &disabled);
            for placement in &placements {
                instantiate_placement(
                    zone,
                    placement,
                    group_id,
                    self.collaborators.devils.as_ref(),
                    self.collaborators.ai_data.as_ref(),
                    &self.config,
                    now,
                );
            }
        }
    }

    /// Drain every deferred task whose `run_at_ticks` has passed, acquiring
    /// at most one zone lock and the instance-registry lock at a time —
    /// never both simultaneously, per §5's ordering rule.
    fn drain_deferred(&self, now: u64) {
        loop {
            let due = {
                let mut heap = self.deferred.lock().unwrap();
                match heap.peek() {
                    Some(entry) if entry.0.run_at_ticks <= now => heap.pop().map(|e| e.0),
                    _ => None,
                }
            };
            let Some(task) = due else { break };
            match task.kind {
                DeferredTaskKind::ZoneSweep => {
                    if let Some(handle) = self.zone_handle(task.zone_id) {
                        let mut zone = handle.lock().unwrap();
                        self.sweep_respawns(&mut zone, now);
                    }
                }
                DeferredTaskKind::InstanceTimerExpire(instance_id) => {
                    self.expire_instance_timer(instance_id, task.zone_id, now);
                }
                DeferredTaskKind::InstanceLobbyMove(instance_id) => {
                    self.move_instance_to_lobby(instance_id, now);
                }
            }
        }
    }

    /// An instance timer reached its scheduled boundary without an
    /// explicit stop: resolve completion and broadcast the matching `_End`
    /// packet to every zone the instance owns, in sorted zone-id order.
    fn expire_instance_timer(&self, instance_id: InstanceId, primary_zone: ZoneId, now: u64) {
        let (zone_ids, packet) = {
            let mut instances = self.instances.lock().unwrap();
            let Some(instance) = instances.get_mut(instance_id) else { return };
            if !matches!(instance.timer_state, crate::instance::TimerState::Running) {
                return;
            }
            let result = instance.expire(now);
            let packet = match instance.variant.as_ref().map(|v| v.kind) {
                Some(crate::instance::InstanceType::TimeTrial) => {
                    result.rank.map(|rank| OutboundPacket::TimeTrialEnd { instance_id: instance_id.0, elapsed_s: result.elapsed_s, rank })
                }
                Some(crate::instance::InstanceType::DemonOnly) => {
                    result.rank.map(|rank| OutboundPacket::DemonSoloEnd { instance_id: instance_id.0, rank, sp_gain: result.sp_gain })
                }
                Some(crate::instance::InstanceType::Normal) | None => {
                    Some(OutboundPacket::TimeLimitEnd { instance_id: instance_id.0, expiration_event_id: instance.expiration_event_id.unwrap_or(0) })
                }
            };
            let mut zone_ids: Vec<ZoneId> = instance.zone_ids.clone();
            zone_ids.sort();
            (zone_ids, packet)
        };

        let Some(packet) = packet else { return };
        let _ = primary_zone;
        for zone_id in &zone_ids {
            if let Some(handle) = self.zone_handle(*zone_id) {
                let mut zone = handle.lock().unwrap();
                zone.broadcast(packet.clone());
            }
        }

        let lobby_sweep_zone = zone_ids.first().copied().unwrap_or(primary_zone);
        self.schedule(DeferredTask {
            run_at_ticks: now + LOBBY_MOVE_DELAY_TICKS,
            zone_id: lobby_sweep_zone,
            kind: DeferredTaskKind::InstanceLobbyMove(instance_id),
        });
    }

    /// `LOBBY_MOVE_DELAY_TICKS` after an instance's expiry: relocate every
    /// connected player out of the instance's zones into its lobby zone.
    /// Zones already equal to the lobby are left untouched.
    fn move_instance_to_lobby(&self, instance_id: InstanceId, now: u64) {
        let (zone_ids, lobby_zone_id) = {
            let instances = self.instances.lock().unwrap();
            let Some(instance) = instances.get(instance_id) else { return };
            (instance.zone_ids.clone(), ZoneId(instance.lobby_id))
        };
        let Some(lobby_handle) = self.zone_handle(lobby_zone_id) else {
            tracing::warn!(lobby_zone_id = lobby_zone_id.0, "lobby zone not registered, skipping instance lobby move");
            return;
        };

        for zone_id in zone_ids {
            if zone_id == lobby_zone_id {
                continue;
            }
            let Some(handle) = self.zone_handle(zone_id) else { continue };
            let members: Vec<(u32, EntityId)> = {
                let zone = handle.lock().unwrap();
                zone.connections.iter().map(|c| (c.character_id, c.entity_id)).collect()
            };
            for (character_id, entity_id) in members {
                let player = {
                    let mut zone = handle.lock().unwrap();
                    transfer::leave_zone(&mut zone, entity_id, character_id)
                };
                let Some(player) = player else { continue };
                let mut lobby = lobby_handle.lock().unwrap();
                // The lobby entry point is content-store data this crate
                // doesn't own; land at the origin and let the embedding
                // server correct the placement once it resolves the spot.
                transfer::enter_zone(&mut lobby, player, character_id, Point::new(0.0, 0.0), 0.0, now);
            }
        }
    }

    /// `EnterZone`: gate DemonOnly instance admission on a living partner
    /// demon, then drive the zone-local leave/enter mechanics. On success,
    /// any pending instance access grant for `character_id` is consumed.
    /// `partner_entity` is the character's currently summoned partner
    /// demon's entity id in `old_zone_id`, if any.
    pub fn enter_zone(
        &self,
        character_id: u32,
        entity_id: EntityId,
        old_zone_id: ZoneId,
        new_zone_id: ZoneId,
        position: Point,
        rotation: f64,
        partner_entity: Option<EntityId>,
    ) -> CoreResult<()> {
        let now = self.now_ticks();
        let gate_instance_id = self.instances.lock().unwrap().peek_access(character_id);

        if let Some(instance_id) = gate_instance_id {
            let requires_demon = self
                .instances
                .lock()
                .unwrap()
                .get(instance_id)
                .map(|i| i.requires_living_partner_demon())
                .unwrap_or(false);
            if requires_demon {
                let alive = partner_entity
                    .and_then(|pid| self.zone_handle(old_zone_id).and_then(|h| h.lock().unwrap().active_entity(pid).map(|e| e.is_alive())))
                    .unwrap_or(false);
                if !alive {
                    tracing::info!(character_id, "instance entry rejected: no living partner demon");
                    return Err(CoreError::InstanceRejected("DemonOnly instance requires a living partner demon"));
                }
            }
        }

        let Some(old_handle) = self.zone_handle(old_zone_id) else {
            return Err(CoreError::EntityGone { entity: entity_id, zone: old_zone_id });
        };
        let player = {
            let mut old_zone = old_handle.lock().unwrap();
            transfer::leave_zone(&mut old_zone, entity_id, character_id)
        };
        let Some(player) = player else {
            return Err(CoreError::EntityGone { entity: entity_id, zone: old_zone_id });
        };

        let Some(new_handle) = self.zone_handle(new_zone_id) else {
            let mut old_zone = old_handle.lock().unwrap();
            transfer::enter_zone(&mut old_zone, player, character_id, position, rotation, now);
            return Err(CoreError::EntityGone { entity: entity_id, zone: new_zone_id });
        };
        {
            let mut new_zone = new_handle.lock().unwrap();
            transfer::enter_zone(&mut new_zone, player, character_id, position, rotation, now);
        }

        if gate_instance_id.is_some() {
            self.instances.lock().unwrap().consume_access(character_id);
        }
        Ok(())
    }

    /// Drive `tick_once` on a `tokio::time::interval`, matching the
    /// teacher's `GameServer::run` loop shape. Runs until `shutdown`
    /// resolves.
    pub async fn run(self: Arc<Self>, shutdown: impl std::future::Future<Output = ()>) {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_once();
                }
                _ = &mut shutdown => {
                    tracing::info!("scheduler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiParams;
    use crate::definitions::{AiScriptHost, ScriptOutcome};
    use crate::entity::EntityId;
    use crate::error::SkillFailureCode;
    use crate::geometry::Point;

    struct NullHost;
    impl AiScriptHost for NullHost {
        fn queue_move_command(&self, _entity: EntityId, _dest: Point, _interrupt: bool) {}
        fn queue_script_command(&self, _entity: EntityId, _function: &str, _interrupt: bool) {}
        fn queue_use_skill_command(&self, _entity: EntityId, _skill: crate::ai::SkillId, _target: Option<EntityId>, _advance: bool) {}
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
        fn combat_skill_hit(&self, _entity: EntityId, _source: EntityId, _skill: crate::ai::SkillId) -> ScriptOutcome {
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
        fn skill(&self, _id: crate::ai::SkillId) -> Option<crate::definitions::SkillDefinition> {
            None
        }
    }

    struct NullExecutor;
    impl SkillExecutor for NullExecutor {
        fn activate(&self, _entity: EntityId, _skill: crate::ai::SkillId, _target: Option<EntityId>, _now: u64) -> Result<bool, SkillFailureCode> {
            Ok(true)
        }
        fn execute(&self, _entity: EntityId, _skill: crate::ai::SkillId, _target: Option<EntityId>, _now: u64) -> Result<bool, SkillFailureCode> {
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
        fn skill_ids(&self, _devil_id: u32) -> Vec<crate::ai::SkillId> {
            Vec::new()
        }
    }

    struct NullAiData;
    impl AiDataStore for NullAiData {
        fn ai_params(&self, _ai_type_id: u32) -> Option<AiParams> {
            None
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

    #[test]
    fn empty_zone_does_not_tick_or_panic() {
        let s = scheduler();
        s.register_zone(Zone::new(ZoneId(1), 100, None, None, 0));
        s.tick_once();
        assert_eq!(s.now_ticks(), TICK_INTERVAL_MS * 1_000);
    }

    #[test]
    fn zone_with_a_connection_becomes_active_and_thaws() {
        let s = scheduler();
        let handle = s.register_zone(Zone::new(ZoneId(1), 100, None, None, 0));
        handle.lock().unwrap().add_connection(crate::zone::Connection::new(1, EntityId(1)));
        s.tick_once();
        assert!(handle.lock().unwrap().last_ticked_now > 0);
    }

    #[test]
    fn deferred_task_runs_once_due() {
        let s = scheduler();
        s.register_zone(Zone::new(ZoneId(1), 100, None, None, 0));
        s.schedule(DeferredTask { run_at_ticks: 1, zone_id: ZoneId(1), kind: DeferredTaskKind::ZoneSweep });
        // Not due yet at tick 0 -> now after one tick is TICK_INTERVAL_MS*1000, which is >= 1.
        s.tick_once();
        assert!(s.deferred.lock().unwrap().is_empty());
    }

    struct InstanceFixture;
    impl crate::definitions::ZoneInstanceDataStore for InstanceFixture {
        fn zone_instance(&self, instance_def_id: u32) -> Option<crate::definitions::ZoneInstanceData> {
            (instance_def_id == 1).then(|| crate::definitions::ZoneInstanceData { lobby_id: 1, zone_ids: vec![1], dynamic_map_ids: vec![] })
        }
    }
    impl crate::definitions::ZoneInstanceVariantDataStore for InstanceFixture {
        fn variant(&self, _variant_id: u32) -> Option<crate::definitions::ZoneInstanceVariantData> {
            Some(crate::definitions::ZoneInstanceVariantData {
                kind: crate::definitions::ZoneInstanceVariantKind::Normal,
                sub_id: 0,
                zone_partial_ids: vec![],
                time_points: [100, 0, 0, 0],
                timer_expiration_event_id: 42,
                fixed_reward: 0,
                reward_modifier: 0.0,
            })
        }
    }

    #[test]
    fn instance_timer_expiry_broadcasts_to_every_owned_zone() {
        let s = scheduler();
        let z1 = s.register_zone(Zone::new(ZoneId(1), 100, None, None, 0));
        z1.lock().unwrap().add_connection(crate::zone::Connection::new(1, EntityId(1)));

        let fixture = InstanceFixture;
        let instance_id = {
            let mut instances = s.instances.lock().unwrap();
            let id = instances.create_instance(&fixture, &fixture, 1, Some(1), None, Some(42), std::collections::HashSet::new()).unwrap();
            instances.get_mut(id).unwrap().start_timer(0, &s.config);
            id
        };

        s.expire_instance_timer(instance_id, ZoneId(1), 100 * 1_000_000);
        let packets = z1.lock().unwrap().connections[0].drain_outbox();
        assert_eq!(packets.len(), 1);
        assert!(matches!(packets[0], OutboundPacket::TimeLimitEnd { expiration_event_id: 42, .. }));
    }
}
