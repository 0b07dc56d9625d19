//! `UpdateState` and `UpdateActiveStates` (§4.1, §4.2): the per-entity tick
//! and the zone-wide driver that walks enemies then allies, executes
//! queued commands, and turns the results into outbound packets.

use std::collections::{HashMap, HashSet};

use crate::config::{Config, MOVE_REPATH_DISTANCE};
use crate::definitions::{AiScriptHost, SkillDataStore, SkillDefinition, SkillExecutor};
use crate::entity::active_entity::CombatFlags;
use crate::entity::enemy::EnemyBase;
use crate::entity::status_effect::expire_status_effects;
use crate::entity::{ActiveEntity, EntityId};
use crate::geometry::Geometry;
use crate::protocol::OutboundPacket;
use crate::zone::Zone;

use super::behavior::{self, EnemyStateContext, TargetInfo};
use super::pathing::chase;
use super::scripting::{run_state_override, StateScriptResult};
use super::skill::{self, ResourcePool};
use super::targeting::{AggroTransition, Candidate};
use super::wander::WanderHome;
use super::{AICommand, AIState, AIStatus, SkillId};

/// Everything one tick of one zone needs that isn't owned by the zone or
/// the entity itself.
pub struct TickEnvironment<'a> {
    pub host: &'a dyn AiScriptHost,
    pub skills: &'a dyn SkillDataStore,
    pub executor: &'a dyn SkillExecutor,
    pub config: &'a Config,
    pub now: u64,
}

#[derive(Default)]
struct TickResult {
    despawn: bool,
    changed: bool,
    packets: Vec<OutboundPacket>,
    transitions: Vec<AggroTransition>,
}

/// Swap in the night-time aggro distance/FoV for the duration of `f`, then
/// restore. `Retarget` only ever reads the "normal" fields, so `isNight`
/// selection happens here rather than inside it.
fn with_night_adjustment<R>(ai: &mut AIState, is_night: bool, f: impl FnOnce(&mut AIState) -> R) -> R {
    if !is_night {
        return f(ai);
    }
    let saved = ai.params;
    ai.params.aggro_normal_distance = saved.aggro_night_distance;
    ai.params.aggro_normal_fov = saved.aggro_night_fov;
    let result = f(ai);
    ai.params = saved;
    result
}

fn build_skill_defs(skill_ids: &[SkillId], store: &dyn SkillDataStore) -> HashMap<SkillId, SkillDefinition> {
    skill_ids.iter().filter_map(|&id| store.skill(id).map(|def| (id, def))).collect()
}

fn override_name(status: AIStatus) -> &'static str {
    match status {
        AIStatus::Idle => "idle",
        AIStatus::Wandering => "wander",
        AIStatus::Following => "follow",
        AIStatus::Aggro => "aggro",
        AIStatus::Combat => "combat",
    }
}

/// One entity's `UpdateState`, §4.1 steps 2-9 (step 1, position refresh, is
/// implicit in `ActiveEntity::position_at`).
#[allow(clippy::too_many_arguments)]
fn tick_one(
    id: EntityId,
    base: &mut ActiveEntity,
    ai: &mut AIState,
    enemy_base: &EnemyBase,
    is_ally: bool,
    skill_ids: &[SkillId],
    skill_defs: &HashMap<SkillId, SkillDefinition>,
    home: Option<&WanderHome>,
    candidates: &[Candidate],
    targets: &HashMap<EntityId, TargetInfo>,
    geometry: Option<&Geometry>,
    disabled: &HashSet<u32>,
    env: &TickEnvironment,
    is_night: bool,
) -> TickResult {
    let now = env.now;
    let mut result = TickResult::default();
    let _ = enemy_base;

    // Step 2: a nonzero despawn timeout that has elapsed.
    if ai.despawn_timeout != 0 && ai.despawn_timeout <= now {
        result.despawn = true;
        return result;
    }

    // Arm the leash timeout the first time a lost entity strays from home;
    // `Wander`'s own `returning_home` check consumes this once it reaches
    // home again.
    if ai.despawn_when_lost && ai.despawn_timeout == 0 {
        if let Some(home) = home {
            if !home.contains(base.position_at(now)) {
                ai.despawn_timeout = now + env.config.leash_despawn_ms * 1000;
            }
        }
    }

    // Step 3: a dormant Idle entity with no override does nothing at all.
    if ai.status == AIStatus::Idle && ai.action_override("idle").is_none() {
        return result;
    }

    // Step 4: status-effect expiry.
    let expired = expire_status_effects(&mut base.status_effects, now);
    if !expired.is_empty() {
        result.packets.push(OutboundPacket::RemoveStatusEffect { entity_id: id, effect_types: expired });
    }

    // Step 5: cannot-act / explicit waiting status.
    if base.combat_flags.blocks_action() || base.is_waiting(now) {
        if base.is_moving(now) && !base.combat_flags.contains(CombatFlags::KNOCKBACK) {
            base.stop_motion(now);
            result.changed = true;
        }
        return result;
    }

    // Step 6: skill-lockout.
    if base.combat_flags.contains(CombatFlags::SKILL_LOCKOUT) {
        return result;
    }

    // Step 7: status-changed queue reset, Aggro->Combat exempted.
    if ai.status_changed {
        let keeps_queue = ai.previous_status == AIStatus::Aggro && ai.status == AIStatus::Combat;
        if !keeps_queue {
            let requeue = matches!(ai.commands.head(), Some(AICommand::UseSkill { .. })).then(|| ai.commands.head().cloned()).flatten();
            ai.commands.clear();
            if let Some(command) = requeue {
                ai.commands.push(command);
            }
        }
        ai.status_changed = false;
    }

    // Step 8: dispatch when the queue is empty.
    if ai.commands.is_empty() {
        match run_state_override(env.host, ai, override_name(ai.status), id, now) {
            StateScriptResult::Keep | StateScriptResult::Done => {}
            StateScriptResult::UseBuiltin => {
                if ai.commands.is_empty() {
                    let resources = ResourcePool { hp: base.hp, max_hp: base.max_hp, mp: base.mp, max_mp: base.max_mp };
                    let resolve_target = |other: EntityId| targets.get(&other).copied();
                    let ctx = EnemyStateContext {
                        entity_id: id,
                        position: base.position_at(now),
                        rotation: base.destination.rotation,
                        move_speed: base.move_speed,
                        faction: base.faction(),
                        level: base.level,
                        is_ally,
                        geometry,
                        disabled_geometry: disabled,
                        now,
                        config: env.config,
                        host: env.host,
                        store: env.skills,
                    };
                    let cooldowns = ai.cooldowns.clone();
                    let mut aggro_target = base.aggro_target;
                    let mut opponents = std::mem::take(&mut base.opponents);
                    let (_, transition) = with_night_adjustment(ai, is_night, |ai| {
                        behavior::update_enemy_state(
                            ai,
                            &mut aggro_target,
                            &mut opponents,
                            home,
                            candidates,
                            resolve_target,
                            skill_ids,
                            skill_defs,
                            resources,
                            &cooldowns,
                            &ctx,
                        )
                    });
                    base.aggro_target = aggro_target;
                    base.opponents = opponents;
                    if let Some(transition) = transition {
                        result.transitions.push(transition);
                    }
                }
            }
        }
    }

    // Step 9: process the head command.
    if execute_head_command(id, base, ai, geometry, disabled, targets, env, now) {
        result.changed = true;
    }

    result
}

/// §4.2 Scripted command: 0 keeps it queued, +1 pops and reports a state
/// change, anything else pops silently.
fn execute_scripted(ai: &mut AIState, host: &dyn AiScriptHost, function: &str, entity: EntityId, now: u64) -> bool {
    use crate::definitions::ScriptOutcome;
    match host.run_state_script(function, entity, now) {
        ScriptOutcome::Continue => false,
        ScriptOutcome::HandledQueued => {
            ai.commands.pop();
            true
        }
        ScriptOutcome::AbortWithError(_) | ScriptOutcome::PickedTarget(_) => {
            ai.commands.pop();
            false
        }
    }
}

fn execute_use_skill(ai: &mut AIState, env: &TickEnvironment, entity: EntityId, resolve: &dyn Fn(EntityId) -> Option<TargetInfo>, now: u64) -> bool {
    let Some(AICommand::UseSkill { skill, activated, target }) = ai.commands.head().cloned() else {
        return false;
    };

    if let Some(target_id) = target {
        match resolve(target_id) {
            None => {
                ai.commands.pop();
                return false;
            }
            Some(info) if !info.ready => {
                ai.commands.pop();
                return false;
            }
            Some(info) if info.knocked_back && env.config.aggro_limit_enabled => {
                ai.commands.push(AICommand::Wait { duration_ms: ai.params.think_speed_ms });
                return false;
            }
            _ => {}
        }
    }

    let outcome = if activated { env.executor.execute(entity, skill, target, now) } else { env.executor.activate(entity, skill, target, now) };

    match outcome {
        Ok(true) => {
            ai.commands.pop();
            ai.skill_failure = None;
            true
        }
        Ok(false) => {
            if let Some(AICommand::UseSkill { activated, .. }) = ai.commands.head_mut() {
                *activated = true;
            }
            false
        }
        Err(code) => {
            if code.is_retryable() {
                ai.skill_failure = Some(code);
            } else {
                ai.commands.pop();
                ai.skill_failure = None;
            }
            false
        }
    }
}

fn execute_move(
    base: &mut ActiveEntity,
    ai: &mut AIState,
    geometry: Option<&Geometry>,
    disabled: &HashSet<u32>,
    resolve: &dyn Fn(EntityId) -> Option<TargetInfo>,
    now: u64,
) -> bool {
    let Some(AICommand::Move { mut path, target, min_distance, max_distance, mut cursor }) = ai.commands.head().cloned() else {
        return false;
    };

    if base.move_speed <= 0.0 {
        ai.commands.clear();
        return false;
    }

    let current = base.position_at(now);

    if let Some(target_id) = target {
        let Some(info) = resolve(target_id) else {
            ai.commands.clear();
            return false;
        };
        let distance = current.distance(info.position);
        let at_min = min_distance.map(|m| distance <= m).unwrap_or(false);
        let at_max = max_distance.map(|m| distance >= m).unwrap_or(false);
        if at_min || at_max {
            base.stop_motion(now);
            ai.commands.pop();
            return true;
        }

        let drifted = path.last().map(|last| last.distance(info.position) > MOVE_REPATH_DISTANCE + min_distance.unwrap_or(0.0)).unwrap_or(false);
        if drifted {
            match chase(geometry, disabled, current, target_id, info.position, base.move_speed, min_distance.unwrap_or(0.0), max_distance.unwrap_or(f64::MAX)) {
                Some(AICommand::Move { path: new_path, cursor: new_cursor, .. }) => {
                    path = new_path;
                    cursor = new_cursor;
                }
                _ => {
                    ai.commands.clear();
                    return false;
                }
            }
        }
    }

    while cursor < path.len() && path[cursor] == current {
        cursor += 1;
    }

    let Some(&next) = path.get(cursor) else {
        base.stop_motion(now);
        ai.commands.pop();
        return true;
    };

    if let Some(geo) = geometry {
        if geo.segment_collides(current, next, disabled) {
            ai.commands.clear();
            return false;
        }
    }

    let rotation = (next.y - current.y).atan2(next.x - current.x);
    base.set_destination(now, next, rotation);
    cursor += 1;
    if let Some(AICommand::Move { cursor: c, path: p, .. }) = ai.commands.head_mut() {
        *c = cursor;
        *p = path;
    }
    true
}

fn execute_head_command(
    entity: EntityId,
    base: &mut ActiveEntity,
    ai: &mut AIState,
    geometry: Option<&Geometry>,
    disabled: &HashSet<u32>,
    targets: &HashMap<EntityId, TargetInfo>,
    env: &TickEnvironment,
    now: u64,
) -> bool {
    let resolve = |id: EntityId| targets.get(&id).copied();
    match ai.commands.head() {
        Some(AICommand::Move { .. }) => execute_move(base, ai, geometry, disabled, &resolve, now),
        Some(AICommand::UseSkill { .. }) => execute_use_skill(ai, env, entity, &resolve, now),
        Some(AICommand::Scripted { function }) => {
            let function = function.clone();
            execute_scripted(ai, env.host, &function, entity, now)
        }
        Some(AICommand::Wait { duration_ms }) => {
            let wait_until = now + duration_ms * 1000;
            base.set_waiting_until(wait_until);
            ai.commands.pop();
            false
        }
        None => false,
    }
}

fn movement_packet(id: EntityId, base: &ActiveEntity, now: u64) -> OutboundPacket {
    if base.is_moving(now) {
        if base.destination.position != base.origin.position {
            OutboundPacket::Move {
                entity_id: id,
                dest_x: base.destination.position.x,
                dest_y: base.destination.position.y,
                orig_x: base.origin.position.x,
                orig_y: base.origin.position.y,
                speed: base.move_speed,
                now_ticks: now,
                dest_ticks: base.destination.ticks,
            }
        } else {
            OutboundPacket::Rotate { entity_id: id, dest_rot: base.destination.rotation, now_ticks: now, dest_ticks: base.destination.ticks }
        }
    } else {
        OutboundPacket::StopMovement { entity_id: id, x: base.destination.position.x, y: base.destination.position.y, dest_ticks: base.destination.ticks }
    }
}

/// Symmetric opponents/aggressors update for one acting entity's
/// `AggroTransition`, applied after the mutable sweep below so lookups of
/// the old/new target (which may be a sibling in the same map) are safe.
fn apply_aggro_transition(zone: &mut Zone, actor: EntityId, transition: AggroTransition, now: u64, packets: &mut Vec<OutboundPacket>) {
    if let Some(old) = transition.old_target {
        if let Some(e) = zone.active_entity_mut(old) {
            e.aggressors.remove(&actor);
            e.opponents.remove(&actor);
        }
    }
    if let Some(new) = transition.new_target {
        if let Some(e) = zone.active_entity_mut(new) {
            e.aggressors.insert(actor);
            e.opponents.insert(actor);
        }
    }
    let _ = now;
    packets.push(OutboundPacket::EnemyActivated { entity_id: actor, target_entity_id: transition.new_target });
}

/// `UpdateActiveStates`: walk enemies then allies, running `UpdateState` on
/// each, and broadcast the resulting movement/activation/status packets.
/// Despawns and respawn-manager bookkeeping are left to the caller via the
/// ids this returns; it only drives AI and networking.
pub fn update_active_states(zone: &mut Zone, env: &TickEnvironment, is_night: bool) -> Vec<EntityId> {
    let now = env.now;

    let mut pursuer_counts: HashMap<EntityId, u32> = HashMap::new();
    for id in zone.active_entity_ids() {
        if let Some(e) = zone.active_entity(id) {
            if let Some(target) = e.aggro_target {
                *pursuer_counts.entry(target).or_insert(0) += 1;
            }
        }
    }

    let mut targets: HashMap<EntityId, TargetInfo> = HashMap::new();
    let mut candidates: Vec<Candidate> = Vec::new();
    for id in zone.active_entity_ids() {
        let Some(e) = zone.active_entity(id) else { continue };
        let position = e.position_at(now);
        targets.insert(id, TargetInfo { id, position, ready: e.is_ready(), knocked_back: e.combat_flags.contains(CombatFlags::KNOCKBACK) });
        candidates.push(Candidate {
            id,
            position,
            faction: e.faction(),
            level: e.level,
            ready: e.is_ready(),
            charging: e.combat_flags.contains(CombatFlags::CHARGING),
            pursuer_count: pursuer_counts.get(&id).copied().unwrap_or(0),
        });
    }

    let mut despawns: Vec<EntityId> = Vec::new();
    let mut packets: Vec<OutboundPacket> = Vec::new();
    let mut transitions: Vec<(EntityId, AggroTransition)> = Vec::new();

    // `wander_home_for` needs read access to `zone.spawner`, which is a
    // disjoint field from `zone.enemies`/`zone.allies`; the two sweeps
    // below borrow the pieces they need directly off `zone` rather than
    // through a `&Zone` so both stay borrowed at once.
    {
        let geometry = zone.geometry.as_ref();
        let disabled = &zone.disabled_geometry_elements;
        let spawner = &zone.spawner;

        for (&id, enemy) in zone.enemies.iter_mut() {
            let home = enemy.enemy_base.spawn_location_group_id.and_then(|g| spawner.location_group(g.0)).and_then(|g| g.locations.first().copied()).map(WanderHome::Location);
            let skill_defs = build_skill_defs(&enemy.ai_skill_ids(), env.skills);
            let result = tick_one(
                id,
                &mut enemy.base,
                &mut enemy.ai,
                &enemy.enemy_base,
                false,
                &enemy.ai_skill_ids(),
                &skill_defs,
                home.as_ref(),
                &candidates,
                &targets,
                geometry,
                disabled,
                env,
                is_night,
            );
            if result.despawn {
                despawns.push(id);
                continue;
            }
            packets.extend(result.packets);
            if result.changed {
                packets.push(movement_packet(id, &enemy.base, now));
            }
            for transition in result.transitions {
                transitions.push((id, transition));
            }
        }

        for (&id, ally) in zone.allies.iter_mut() {
            let home = ally.enemy_base.spawn_location_group_id.and_then(|g| spawner.location_group(g.0)).and_then(|g| g.locations.first().copied()).map(WanderHome::Location);
            let skill_defs = build_skill_defs(&ally.ai_skill_ids(), env.skills);
            let result = tick_one(
                id,
                &mut ally.base,
                &mut ally.ai,
                &ally.enemy_base,
                true,
                &ally.ai_skill_ids(),
                &skill_defs,
                home.as_ref(),
                &candidates,
                &targets,
                geometry,
                disabled,
                env,
                is_night,
            );
            if result.despawn {
                despawns.push(id);
                continue;
            }
            packets.extend(result.packets);
            if result.changed {
                packets.push(movement_packet(id, &ally.base, now));
            }
            for transition in result.transitions {
                transitions.push((id, transition));
            }
        }
    }

    for (actor, transition) in transitions {
        apply_aggro_transition(zone, actor, transition, now, &mut packets);
    }
    for id in &despawns {
        zone.queue_despawn(*id);
    }
    for packet in packets {
        zone.broadcast(packet);
    }

    despawns
}
