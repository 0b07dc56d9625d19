//! `Retarget` and `UpdateAggro` (§4.4): picking a combat target and
//! propagating the resulting aggro-graph change.

use std::collections::HashSet;

use rand::Rng;

use crate::config::Config;
use crate::entity::{EntityId, Faction};
use crate::geometry::{Geometry, Point};

use super::{AIState, AIStatus, AiParams};

/// Everything `Retarget` needs to know about one potential target,
/// gathered by the caller from the zone's registries.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub id: EntityId,
    pub position: Point,
    pub faction: Faction,
    pub level: i16,
    /// Alive, fully spawned, not AI-ignored (`ActiveEntity::is_ready`).
    pub ready: bool,
    /// Currently charging a skill (`CombatFlags::CHARGING`).
    pub charging: bool,
    /// Count of other active pursuers whose `aggro_target` is this
    /// candidate, for the aggro-limit prune.
    pub pursuer_count: u32,
}

fn angle_within_fov(facing_rotation: f64, from: Point, to: Point, half_angle: f64) -> bool {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx == 0.0 && dy == 0.0 {
        return true;
    }
    let bearing = dy.atan2(dx);
    let mut diff = (bearing - facing_rotation).rem_euclid(std::f64::consts::TAU);
    if diff > std::f64::consts::PI {
        diff -= std::f64::consts::TAU;
    }
    diff.abs() <= half_angle
}

fn has_line_of_sight(geometry: Option<&Geometry>, disabled: &HashSet<u32>, from: Point, to: Point) -> bool {
    match geometry {
        Some(geo) => !geo.segment_collides(from, to, disabled),
        None => true,
    }
}

/// Compute the final candidate list for `Retarget`. Does not perform the
/// random-aggression roll's state mutation (clearing aggro on a failed
/// roll) — callers do that themselves against the returned `None`.
#[allow(clippy::too_many_arguments)]
pub fn retarget_candidates(
    params: &AiParams,
    self_position: Point,
    self_rotation: f64,
    self_faction: Faction,
    self_level: i16,
    existing_opponents: &HashSet<EntityId>,
    candidates: &[Candidate],
    geometry: Option<&Geometry>,
    disabled_geometry: &HashSet<u32>,
    config: &Config,
) -> Vec<EntityId> {
    if !existing_opponents.is_empty() {
        let max_distance = params.aggro_normal_distance.max(params.aggro_cast_distance);
        return candidates
            .iter()
            .filter(|c| existing_opponents.contains(&c.id) && c.ready && self_position.distance(c.position) <= max_distance)
            .map(|c| c.id)
            .collect();
    }

    let level_cap = if params.aggro_level_limit < 99 { Some(self_level + params.aggro_level_limit) } else { None };
    let aggro_limit = if config.aggro_limit_enabled && !params.ignores_aggro_limit {
        Some(if params.is_boss { config.aggro_limit_boss } else { config.aggro_limit_non_boss })
    } else {
        None
    };

    let base_filter = |c: &&Candidate| -> bool {
        c.faction != self_faction && c.ready && c.faction != Faction::Neutral
    };

    // (a) charging entities, considered at the longer cast range/FoV.
    let charging = candidates.iter().filter(base_filter).filter(|c| c.charging).filter(|c| self_position.distance(c.position) <= params.aggro_cast_distance);
    // (b) everyone else, at normal aggro range/FoV.
    let normal = candidates.iter().filter(base_filter).filter(|c| self_position.distance(c.position) <= params.aggro_normal_distance);

    let mut pool: Vec<&Candidate> = Vec::new();
    let mut seen: HashSet<EntityId> = HashSet::new();
    for c in charging.chain(normal) {
        if seen.insert(c.id) {
            pool.push(c);
        }
    }

    if let Some(cap) = level_cap {
        pool.retain(|c| c.level <= cap);
    }
    if let Some(limit) = aggro_limit {
        pool.retain(|c| c.pursuer_count < limit as u32);
    }

    pool.retain(|c| {
        let half_angle = if c.charging { params.aggro_cast_fov } else { params.aggro_normal_fov };
        angle_within_fov(self_rotation, self_position, c.position, half_angle)
    });

    if geometry.is_some() {
        pool.retain(|c| has_line_of_sight(geometry, disabled_geometry, self_position, c.position));
    }

    pool.into_iter().map(|c| c.id).collect()
}

/// The random-aggression roll a non-combat `Retarget` performs before
/// gathering candidates at all: entities with `aggression < 100` have a
/// chance to skip targeting entirely this tick.
pub fn aggression_roll_passes(aggression: u8) -> bool {
    aggression >= 100 || rand::thread_rng().gen_range(1..=100) <= aggression as u32
}

/// Pick uniformly at random from `candidates` (used when no script
/// override claims the pick).
pub fn pick_random(candidates: &[EntityId]) -> Option<EntityId> {
    if candidates.is_empty() {
        return None;
    }
    let idx = rand::thread_rng().gen_range(0..candidates.len());
    Some(candidates[idx])
}

/// Result of an aggro-target change, describing the graph edges a caller
/// must update on the old/new target's own `ActiveEntity` (this function
/// only mutates the acting entity's own state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggroTransition {
    pub old_target: Option<EntityId>,
    pub new_target: Option<EntityId>,
}

/// `UpdateAggro`: set the entity's own aggro target, transition
/// Idle/Wandering → Aggro on first valid target, and drop queued commands
/// referencing the old target if the new target is `None`. Returns the
/// transition so the caller can update the old/new target's aggressor
/// sets and broadcast an "activated" notice.
pub fn update_aggro(ai: &mut AIState, current_aggro_target: &mut Option<EntityId>, new_target: Option<EntityId>) -> AggroTransition {
    let old_target = *current_aggro_target;
    if old_target == new_target {
        return AggroTransition { old_target, new_target };
    }
    *current_aggro_target = new_target;

    if new_target.is_some() && matches!(ai.status, AIStatus::Idle | AIStatus::Wandering) {
        ai.set_status(AIStatus::Aggro);
    }
    if new_target.is_none() {
        if let Some(old) = old_target {
            ai.commands.drop_commands_targeting(old);
        }
    }
    AggroTransition { old_target, new_target }
}
