//! Dispatch between an entity's action overrides and the built-in
//! behaviors they replace.
//!
//! The source represents a script entry point's result as a bare integer
//! whose meaning is call-site specific. Per the design note on
//! script/engine callbacks, this crate exposes the callable surface as
//! [`crate::definitions::AiScriptHost`] returning the tagged
//! [`crate::definitions::ScriptOutcome`] instead, and this module is the
//! one place that still has to know what each integer used to mean so the
//! mapping lives in exactly one spot.

use crate::definitions::{AiScriptHost, ScriptOutcome};
use crate::entity::EntityId;

use super::{AIState, SkillId};

/// Result of running (or falling back from) a state-machine action
/// override: `idle`, `wander`, `aggro`, or `combat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateScriptResult {
    /// No override ran, or the override deferred to the built-in (-1).
    UseBuiltin,
    /// Override is handling this tick; no state change to report (0).
    Keep,
    /// Override finished its action this tick; report a state change (+1).
    Done,
}

/// Run the named state-machine override if one is set, translating the
/// source's `-1/0/+1` convention into [`StateScriptResult`]. A script
/// error (or no override at all) falls back to the built-in behavior, per
/// §7 error kind 4.
pub fn run_state_override(
    host: &dyn AiScriptHost,
    ai: &AIState,
    builtin_name: &str,
    entity: EntityId,
    now: u64,
) -> StateScriptResult {
    let Some(function) = ai.action_override(builtin_name) else {
        return StateScriptResult::UseBuiltin;
    };
    match host.run_state_script(function, entity, now) {
        ScriptOutcome::Continue => StateScriptResult::Keep,
        ScriptOutcome::HandledQueued => StateScriptResult::Done,
        ScriptOutcome::AbortWithError(message) => {
            tracing::warn!(entity_id = entity.0, script = %function, %message, "script error, falling back to built-in behavior");
            StateScriptResult::UseBuiltin
        }
        ScriptOutcome::PickedTarget(_) => StateScriptResult::Keep,
    }
}

/// `combatSkillHit(entity, manager, source, skillId) -> int`. `true` means
/// the override swallowed the hit (0); `false` means the default handling
/// should still run (nonzero).
pub fn run_combat_skill_hit_override(
    host: &dyn AiScriptHost,
    ai: &AIState,
    entity: EntityId,
    source: EntityId,
    skill: SkillId,
) -> bool {
    let Some(function) = ai.action_override("combatSkillHit") else {
        return false;
    };
    match host.combat_skill_hit(entity, source, skill) {
        ScriptOutcome::HandledQueued => true,
        ScriptOutcome::AbortWithError(message) => {
            tracing::warn!(entity_id = entity.0, script = %function, %message, "combatSkillHit script error, falling back to built-in behavior");
            false
        }
        _ => false,
    }
}

/// `prepareSkill(entity, manager, target) -> int (-1 abort, 0 queued, +1 continue default)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareSkillResult {
    Abort,
    AlreadyQueued,
    ContinueDefault,
}

pub fn run_prepare_skill_override(
    host: &dyn AiScriptHost,
    ai: &AIState,
    entity: EntityId,
    target: Option<EntityId>,
) -> PrepareSkillResult {
    let Some(function) = ai.action_override("prepareSkill") else {
        return PrepareSkillResult::ContinueDefault;
    };
    match host.prepare_skill(entity, target) {
        ScriptOutcome::HandledQueued => PrepareSkillResult::AlreadyQueued,
        ScriptOutcome::AbortWithError(message) => {
            tracing::debug!(entity_id = entity.0, script = %function, %message, "prepareSkill override aborted");
            PrepareSkillResult::Abort
        }
        ScriptOutcome::Continue | ScriptOutcome::PickedTarget(_) => PrepareSkillResult::ContinueDefault,
    }
}

/// `target(entity, candidates, manager, now) -> int (entity id or 0)`.
/// Returns `None` when there was no override, or the script declined to
/// pick (so the engine should fall back to its own selection).
pub fn run_target_override(
    host: &dyn AiScriptHost,
    ai: &AIState,
    entity: EntityId,
    candidates: &[EntityId],
    now: u64,
) -> Option<EntityId> {
    let function = ai.action_override("target")?;
    match host.pick_target(entity, candidates, now) {
        ScriptOutcome::PickedTarget(id) => Some(id),
        ScriptOutcome::AbortWithError(message) => {
            tracing::warn!(entity_id = entity.0, script = %function, %message, "target script error, falling back to random pick");
            None
        }
        _ => None,
    }
}
