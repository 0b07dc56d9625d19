//! Engine configuration.
//!
//! Per the design note on replacing singleton `SVR_CONST`-style globals:
//! this is a read-only struct threaded through construction rather than a
//! module of `pub const`s. A handful of values that really are fixed for
//! the life of the process (tick rate, the `maxTargetRange` formula
//! constants) stay as plain consts since no definition store or deployment
//! ever overrides them.

use serde::Deserialize;

pub const TICK_RATE_HZ: u32 = 20;
pub const TICK_INTERVAL_MS: u64 = 1000 / TICK_RATE_HZ as u64;

/// `maxTargetRange = MAX_TARGET_RANGE_BASE + skillRange * MAX_TARGET_RANGE_PER_RANGE`.
pub const MAX_TARGET_RANGE_BASE: f64 = 400.0;
pub const MAX_TARGET_RANGE_PER_RANGE: f64 = 10.0;
pub const MAX_TARGET_RANGE_BUFFER: f64 = 20.0;

pub const CIRCLE_ANGLE_STEP_RAD: f64 = 0.52;
pub const CIRCLE_MAX_SEGMENTS: usize = 3;

/// De-aggro kicks in at this multiple of the entity's normal aggro distance.
pub const DEAGGRO_DISTANCE_MULTIPLIER: f64 = 1.5;

/// Spot-sample pullback distance (units beyond the collision point) when a
/// random spot sample collides with geometry (see `geometry::spot`).
pub const SPOT_SAMPLE_PULLBACK: f64 = 10.0;

/// "1 cell" in the move-command repath check: a live target's position is
/// allowed to drift this far from a Move command's committed end-point
/// before the command repaths (§4.2).
pub const MOVE_REPATH_DISTANCE: f64 = 50.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum interval between discrete AI decisions, in ms, when an
    /// AIData record doesn't specify its own think speed.
    pub default_think_speed_ms: u64,
    /// Floor applied to think speed when computing wander step size:
    /// `moveSpeed * max(thinkSpeed, wander_think_floor_ms) / 1000`.
    pub wander_think_floor_ms: u64,
    /// Global "aggro limit" feature flag.
    pub aggro_limit_enabled: bool,
    /// Pursuer cap applied by the aggro-limit feature for non-boss targets.
    pub aggro_limit_non_boss: u32,
    /// Pursuer cap applied by the aggro-limit feature for boss targets.
    pub aggro_limit_boss: u32,
    /// Whether outclassed skills are excluded from `PrepareSkillUsage`.
    pub skip_outclassed_skills: bool,
    /// Skill weight bonuses applied in `RefreshSkillMap`.
    pub skill_weight_charge: u16,
    pub skill_weight_cost: u16,
    pub skill_weight_heal: u16,
    pub skill_weight_range: u16,
    /// How often, in ms, the deferred-task queue is swept for due tasks.
    pub deferred_task_sweep_ms: u64,
    /// Default per-member DemonOnly timer reduction when the variant does
    /// not specify one explicitly: `floor(base/600) * 30`.
    pub demon_only_reduction_divisor_s: u64,
    pub demon_only_reduction_step_s: u64,
    /// Grace period, in ms, an entity with `despawnWhenLost` is allowed to
    /// sit outside its wander home before `UpdateState` queues it for
    /// despawn.
    pub leash_despawn_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_think_speed_ms: 2500,
            wander_think_floor_ms: 500,
            aggro_limit_enabled: true,
            aggro_limit_non_boss: 1,
            aggro_limit_boss: 2,
            skip_outclassed_skills: true,
            skill_weight_charge: 2,
            skill_weight_cost: 2,
            skill_weight_heal: 2,
            skill_weight_range: 2,
            deferred_task_sweep_ms: 1000,
            demon_only_reduction_divisor_s: 600,
            demon_only_reduction_step_s: 30,
            leash_despawn_ms: 30_000,
        }
    }
}

impl Config {
    /// Load a config, falling back to defaults for any field the file
    /// doesn't set. Missing file is not an error — it just means defaults.
    pub fn load_or_default(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(body) => toml::from_str(&body).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to parse config file, using defaults");
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }
}
