//! Per-entity AI state: mode, command queue, and the cached skill map.
//!
//! Submodules implement the behaviors that read and mutate this state each
//! tick; this module only owns the data shape and the command queue's
//! FIFO-with-interrupt-to-head discipline.

pub mod behavior;
pub mod pathing;
pub mod scripting;
pub mod skill;
pub mod targeting;
pub mod tick;
pub mod wander;

use std::collections::{HashMap, HashSet, VecDeque};

use crate::entity::EntityId;
use crate::error::SkillFailureCode;
use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AIStatus {
    Idle,
    Wandering,
    Following,
    Aggro,
    Combat,
}

/// Per-range-type/action-type bucket a skill is classified into by
/// `RefreshSkillMap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkillCategory {
    Clsr,
    Lngr,
    Heal,
    Support,
    Def,
}

bitflags::bitflags! {
    /// Filtering mask over the five skill categories, used by
    /// `PrepareSkillUsage` to decide which buckets an entity may draw from
    /// and as the concrete bit layout behind the source's enemy/ally/all
    /// skill-type constants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SkillTypeMask: u8 {
        const CLSR = 1 << 0;
        const LNGR = 1 << 1;
        const HEAL = 1 << 2;
        const SUPPORT = 1 << 3;
        const DEF = 1 << 4;

        const ENEMY = Self::CLSR.bits() | Self::LNGR.bits();
        const ALLY = Self::DEF.bits() | Self::HEAL.bits() | Self::SUPPORT.bits();
        const ALL = Self::ENEMY.bits() | Self::ALLY.bits();
    }
}

pub type SkillId = u32;

/// `skillDef` handle plus the weight `RefreshSkillMap` assigned it.
pub type SkillWeight = (SkillId, u16);

/// Built lazily by `RefreshSkillMap`, invalidated on any set/cost change.
pub type SkillMap = HashMap<SkillCategory, Vec<SkillWeight>>;

/// The aggro/FoV/think-speed tuning an entity's `AIData` record supplies.
#[derive(Debug, Clone, Copy)]
pub struct AiParams {
    pub aggro_normal_distance: f64,
    pub aggro_normal_fov: f64,
    pub aggro_night_distance: f64,
    pub aggro_night_fov: f64,
    pub aggro_cast_distance: f64,
    pub aggro_cast_fov: f64,
    pub deaggro_distance: f64,
    pub think_speed_ms: u64,
    pub aggression: u8,
    pub aggro_level_limit: i16,
    pub defensive_distance: f64,
    pub heal_threshold_pct: u8,
    pub is_boss: bool,
    pub skill_settings: SkillTypeMask,
    pub ignores_aggro_limit: bool,
}

#[derive(Debug, Clone)]
pub enum AICommand {
    Wait {
        duration_ms: u64,
    },
    Move {
        path: Vec<Point>,
        target: Option<EntityId>,
        min_distance: Option<f64>,
        max_distance: Option<f64>,
        cursor: usize,
    },
    UseSkill {
        skill: SkillId,
        activated: bool,
        target: Option<EntityId>,
    },
    Scripted {
        function: String,
    },
}

/// Runtime status of the command currently at the queue head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRunState {
    NotStarted,
    Running,
    /// `now` at which a `Wait` (or a delay converted to one) ends.
    WaitingUntil(u64),
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    queue: VecDeque<AICommand>,
    pub run_state: Option<CommandRunState>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn head(&self) -> Option<&AICommand> {
        self.queue.front()
    }

    pub fn head_mut(&mut self) -> Option<&mut AICommand> {
        self.queue.front_mut()
    }

    /// Push to the tail (normal enqueue).
    pub fn push(&mut self, command: AICommand) {
        self.queue.push_back(command);
    }

    /// Push to the head, interrupting whatever is running.
    pub fn interrupt(&mut self, command: AICommand) {
        self.queue.push_front(command);
        self.run_state = Some(CommandRunState::NotStarted);
    }

    /// Pop the head. A popped command never re-appears: callers must not
    /// retain a reference to it past this call.
    pub fn pop(&mut self) -> Option<AICommand> {
        self.run_state = None;
        self.queue.pop_front()
    }

    /// Clear every queued command, e.g. on a state-changed reset. If the
    /// discarded head was a `UseSkill`, callers should re-queue it
    /// themselves (see `AIState::clear_for_status_change`) so the
    /// activation completes.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.run_state = None;
    }

    /// Drop every queued command whose `target` is `lost`, per §3's "a
    /// command referencing a dead/invalid target self-cancels" and
    /// `UpdateAggro`'s "if removing, pops commands whose target was the
    /// old target".
    pub fn drop_commands_targeting(&mut self, lost: EntityId) {
        if matches!(self.queue.front(), Some(AICommand::Move { target: Some(t), .. }) | Some(AICommand::UseSkill { target: Some(t), .. }) if *t == lost) {
            self.run_state = None;
        }
        self.queue.retain(|command| match command {
            AICommand::Move { target: Some(t), .. } => *t != lost,
            AICommand::UseSkill { target: Some(t), .. } => *t != lost,
            _ => true,
        });
    }
}

pub struct AIState {
    pub status: AIStatus,
    pub previous_status: AIStatus,
    pub default_status: AIStatus,
    pub status_changed: bool,

    pub params: AiParams,

    /// Opaque handle into `AiScriptStore`; `None` means no script assigned.
    pub script_handle: Option<String>,
    /// Replaces a built-in behavior name ("idle", "wander", "aggro",
    /// "combat", "combatSkillHit", "prepareSkill", "target") with a named
    /// script function.
    pub action_overrides: HashMap<String, String>,

    pub skill_map: Option<SkillMap>,
    pub outclassed_skills: HashSet<SkillId>,

    /// Set when this entity is awaiting a delayed-attack skill's hit time.
    pub skill_wait_start: Option<u64>,
    /// Result code of the most recent `UseSkill` activation attempt that
    /// hasn't yet been resolved by `UpdateEnemyState`; `None` once handled.
    pub skill_failure: Option<SkillFailureCode>,

    /// 0 means never.
    pub despawn_timeout: u64,
    pub despawn_when_lost: bool,

    /// Per-skill cooldown expiry, maintained by `ai::tick` as skills
    /// resolve; read by `PrepareSkillUsage` (§4.5).
    pub cooldowns: HashMap<SkillId, u64>,

    pub commands: CommandQueue,
}

impl AIState {
    pub fn new(params: AiParams, default_status: AIStatus) -> Self {
        Self {
            status: default_status,
            previous_status: default_status,
            default_status,
            status_changed: false,
            params,
            script_handle: None,
            action_overrides: HashMap::new(),
            skill_map: None,
            outclassed_skills: HashSet::new(),
            skill_wait_start: None,
            skill_failure: None,
            despawn_timeout: 0,
            despawn_when_lost: false,
            cooldowns: HashMap::new(),
            commands: CommandQueue::new(),
        }
    }

    pub fn set_status(&mut self, status: AIStatus) {
        if status != self.status {
            self.previous_status = self.status;
            self.status = status;
            self.status_changed = true;
        }
    }

    pub fn action_override(&self, name: &str) -> Option<&str> {
        self.action_overrides.get(name).map(|s| s.as_str())
    }

    pub fn invalidate_skill_map(&mut self) {
        self.skill_map = None;
        self.outclassed_skills.clear();
    }
}
