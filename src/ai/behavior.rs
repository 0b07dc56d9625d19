//! `UpdateEnemyState` (§4.3): the decision tree that runs for an enemy or
//! ally once its command queue is empty and no state-machine script
//! override claimed the tick.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::config::{Config, DEAGGRO_DISTANCE_MULTIPLIER};
use crate::definitions::{AiScriptHost, SkillDataStore, SkillDefinition};
use crate::entity::{EntityId, Faction};
use crate::geometry::{Geometry, Point};

use super::pathing::retreat;
use super::scripting::{run_prepare_skill_override, run_target_override, PrepareSkillResult};
use super::skill::{prepare_skill_usage, refresh_skill_map, skill_advance, AdvanceOutcome, PrepareOutcome, ResourcePool};
use super::targeting::{aggression_roll_passes, pick_random, retarget_candidates, update_aggro, AggroTransition, Candidate};
use super::wander::{wander, WanderHome};
use super::{AICommand, AIState, AIStatus, SkillId};

/// Resolved state of the entity's current aggro target, gathered by the
/// caller from the zone.
#[derive(Debug, Clone, Copy)]
pub struct TargetInfo {
    pub id: EntityId,
    pub position: Point,
    pub ready: bool,
    pub knocked_back: bool,
}

/// Read-only environment `UpdateEnemyState` needs but doesn't own.
pub struct EnemyStateContext<'a> {
    pub entity_id: EntityId,
    pub position: Point,
    pub rotation: f64,
    pub move_speed: f64,
    pub faction: Faction,
    pub level: i16,
    pub is_ally: bool,
    pub geometry: Option<&'a Geometry>,
    pub disabled_geometry: &'a HashSet<u32>,
    pub now: u64,
    pub config: &'a Config,
    pub host: &'a dyn AiScriptHost,
    pub store: &'a dyn SkillDataStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyStateOutcome {
    /// No target and no opponents, still none after `Retarget`; nothing
    /// to do this tick.
    NoTarget,
    /// Just acquired a target for the first time; a 3s wait was queued.
    FirstEngagement,
    /// Delegated to `Wander`.
    Wandering,
    /// Combat branch ran (skill queued, retreat queued, wait queued, or
    /// aggro dropped).
    Acting,
}

fn pick_target(host: &dyn AiScriptHost, ai: &AIState, entity_id: EntityId, candidates: &[EntityId], now: u64) -> Option<EntityId> {
    run_target_override(host, ai, entity_id, candidates, now).or_else(|| pick_random(candidates))
}

#[allow(clippy::too_many_arguments)]
fn retarget(
    ai: &AIState,
    ctx: &EnemyStateContext,
    opponents: &HashSet<EntityId>,
    candidates: &[Candidate],
) -> Option<EntityId> {
    if opponents.is_empty() && !aggression_roll_passes(ai.params.aggression) {
        return None;
    }
    let candidate_ids = retarget_candidates(
        &ai.params,
        ctx.position,
        ctx.rotation,
        ctx.faction,
        ctx.level,
        opponents,
        candidates,
        ctx.geometry,
        ctx.disabled_geometry,
        ctx.config,
    );
    if candidate_ids.is_empty() {
        tracing::debug!(entity_id = ctx.entity_id.0, "retarget found no candidates");
    }
    pick_target(ctx.host, ai, ctx.entity_id, &candidate_ids, ctx.now)
}

/// `UpdateEnemyState`. `aggro_target` and `opponents` are the entity's own
/// `ActiveEntity` fields, threaded through by reference so this function
/// can both read and mutate them. `resolve_target` looks up an
/// `EntityId`'s live position/readiness from the zone.
#[allow(clippy::too_many_arguments)]
pub fn update_enemy_state(
    ai: &mut AIState,
    aggro_target: &mut Option<EntityId>,
    opponents: &mut HashSet<EntityId>,
    home: Option<&WanderHome>,
    candidates: &[Candidate],
    resolve_target: impl Fn(EntityId) -> Option<TargetInfo>,
    skill_ids: &[SkillId],
    skill_defs: &HashMap<SkillId, SkillDefinition>,
    resources: ResourcePool,
    cooldowns_until: &HashMap<SkillId, u64>,
    ctx: &EnemyStateContext,
) -> (EnemyStateOutcome, Option<AggroTransition>) {
    if aggro_target.is_none() && opponents.is_empty() {
        if let Some(found) = retarget(ai, ctx, opponents, candidates) {
            opponents.insert(found);
            let transition = update_aggro(ai, aggro_target, Some(found));
            ai.commands.push(AICommand::Wait { duration_ms: 3000 });
            return (EnemyStateOutcome::FirstEngagement, Some(transition));
        }
    }

    if ai.status == AIStatus::Wandering && home.is_some() {
        wander(ai, ctx.position, ctx.move_speed, home.unwrap(), ctx.geometry, ctx.disabled_geometry, ctx.config);
        return (EnemyStateOutcome::Wandering, None);
    }

    let mut target = aggro_target.and_then(|id| resolve_target(id));
    if aggro_target.is_some() && target.as_ref().map(|t| !t.ready).unwrap_or(true) {
        let found = retarget(ai, ctx, opponents, candidates);
        if let Some(found) = found {
            opponents.insert(found);
        }
        let transition = update_aggro(ai, aggro_target, found);
        if found.is_none() {
            let default_status = ai.default_status;
            ai.set_status(default_status);
            return (EnemyStateOutcome::NoTarget, Some(transition));
        }
        target = found.and_then(|id| resolve_target(id));
    }

    let Some(target) = target else {
        return (EnemyStateOutcome::NoTarget, None);
    };

    let distance = ctx.position.distance(target.position);
    if distance > DEAGGRO_DISTANCE_MULTIPLIER * ai.params.aggro_normal_distance {
        opponents.remove(&target.id);
        let found = retarget(ai, ctx, opponents, candidates);
        if let Some(found) = found {
            opponents.insert(found);
        }
        let transition = update_aggro(ai, aggro_target, found);
        return (EnemyStateOutcome::Acting, Some(transition));
    }

    if let Some(AICommand::UseSkill { skill, activated: true, target: skill_target }) = ai.commands.head().cloned() {
        // Charging is surfaced to this function via the caller's own
        // combat-flags check before it calls in.
        if let Some(failure) = ai.skill_failure.clone() {
            if !failure.is_retryable() {
                ai.commands.pop();
                ai.skill_failure = None;
                ai.skill_wait_start = None;
                return (EnemyStateOutcome::Acting, None);
            }
        }
        if let Some(wait_start) = ai.skill_wait_start {
            let grace_us = 2 * ai.params.think_speed_ms * 1000;
            if ctx.now > wait_start + grace_us && rand::thread_rng().gen_bool(0.5) {
                ai.commands.pop();
                ai.skill_wait_start = None;
                ai.skill_failure = None;
            } else {
                if ai.params.defensive_distance > 0.0 {
                    ai.commands.push(super::pathing::circle(ctx.geometry, ctx.disabled_geometry, ctx.position, target.position, ai.params.defensive_distance));
                }
                ai.commands.push(AICommand::Wait { duration_ms: ai.params.think_speed_ms });
            }
            return (EnemyStateOutcome::Acting, None);
        }
        if skill_target != Some(target.id) {
            if let Some(cmd) = ai.commands.head_mut() {
                if let AICommand::UseSkill { target: t, .. } = cmd {
                    *t = Some(target.id);
                }
            }
        } else if let Some(def) = skill_defs.get(&skill) {
            skill_advance(ai, ctx.geometry, ctx.disabled_geometry, ctx.position, target.id, target.position, ctx.move_speed, def);
        }
        return (EnemyStateOutcome::Acting, None);
    }

    let act_probability_pct = 20.0 / (ai.params.aggression as f64).max(25.0);
    if rand::thread_rng().gen_bool((act_probability_pct / 100.0).clamp(0.0, 1.0)) {
        ai.commands.push(AICommand::Wait { duration_ms: ai.params.think_speed_ms });
        return (EnemyStateOutcome::Acting, None);
    }

    if skill_ids.is_empty() {
        let transition = update_aggro(ai, aggro_target, None);
        return (EnemyStateOutcome::Acting, Some(transition));
    }

    match run_prepare_skill_override(ctx.host, ai, ctx.entity_id, Some(target.id)) {
        PrepareSkillResult::Abort | PrepareSkillResult::AlreadyQueued => (EnemyStateOutcome::Acting, None),
        PrepareSkillResult::ContinueDefault => {
            if ai.skill_map.is_none() {
                refresh_skill_map(ai, skill_ids, ctx.store, resources, ctx.is_ally, ctx.config);
            }
            match prepare_skill_usage(ai, skill_defs, resources, Some(target.id), cooldowns_until, ctx.now, ctx.config) {
                PrepareOutcome::Chosen { skill, target: skill_target, requires_advance } => {
                    if requires_advance {
                        if let Some(def) = skill_defs.get(&skill) {
                            let _: AdvanceOutcome = skill_advance(ai, ctx.geometry, ctx.disabled_geometry, ctx.position, target.id, target.position, ctx.move_speed, def);
                        }
                    }
                    ai.commands.push(AICommand::UseSkill { skill, activated: false, target: skill_target });
                    (EnemyStateOutcome::Acting, None)
                }
                PrepareOutcome::NoUsableSkill => {
                    let transition = update_aggro(ai, aggro_target, None);
                    if ai.params.defensive_distance > 0.0 {
                        if let Some(cmd) = retreat(ctx.position, target.position, ai.params.defensive_distance) {
                            ai.commands.push(cmd);
                        }
                    }
                    (EnemyStateOutcome::Acting, Some(transition))
                }
            }
        }
    }
}
