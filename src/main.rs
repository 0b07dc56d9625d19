//! Minimal standalone runner: boots the scheduler against empty definition
//! stores so the tick loop can be exercised without a real content database.
//! The embedding server is expected to supply its own `Collaborators` built
//! from its own definition/script backends (see `definitions`); this binary
//! exists so the core can be smoke-tested and profiled on its own.

use std::sync::Arc;

use odyssey_ai_core::ai::{AiParams, SkillId};
use odyssey_ai_core::definitions::{AiDataStore, AiScriptHost, DevilDataStore, ScriptOutcome, SkillDataStore, SkillDefinition, SkillExecutor};
use odyssey_ai_core::entity::EntityId;
use odyssey_ai_core::error::SkillFailureCode;
use odyssey_ai_core::geometry::Point;
use odyssey_ai_core::{Collaborators, Config, Scheduler};

struct EmptyHost;
impl AiScriptHost for EmptyHost {
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

struct EmptySkills;
impl SkillDataStore for EmptySkills {
    fn skill(&self, _id: SkillId) -> Option<SkillDefinition> {
        None
    }
}

struct EmptyExecutor;
impl SkillExecutor for EmptyExecutor {
    fn activate(&self, _entity: EntityId, _skill: SkillId, _target: Option<EntityId>, _now: u64) -> Result<bool, SkillFailureCode> {
        Ok(true)
    }
    fn execute(&self, _entity: EntityId, _skill: SkillId, _target: Option<EntityId>, _now: u64) -> Result<bool, SkillFailureCode> {
        Ok(true)
    }
}

struct EmptyDevils;
impl DevilDataStore for EmptyDevils {
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
    fn skill_ids(&self, _devil_id: u32) -> Vec<SkillId> {
        Vec::new()
    }
}

struct EmptyAiData;
impl AiDataStore for EmptyAiData {
    fn ai_params(&self, _ai_type_id: u32) -> Option<AiParams> {
        None
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let config = Config::load_or_default(std::path::Path::new("config.toml"));
    tracing::info!(tick_hz = odyssey_ai_core::config::TICK_RATE_HZ, "odyssey-ai-core starting");

    let scheduler = Arc::new(Scheduler::new(
        config,
        Collaborators {
            host: Box::new(EmptyHost),
            skills: Box::new(EmptySkills),
            executor: Box::new(EmptyExecutor),
            devils: Box::new(EmptyDevils),
            ai_data: Box::new(EmptyAiData),
        },
    ));

    scheduler
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await;
}
