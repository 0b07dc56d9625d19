//! Error taxonomy for the AI and zone simulation core.
//!
//! Every variant corresponds to one of the seven error kinds the engine
//! distinguishes: definitions missing from the data store, entity-state
//! inconsistency, unreachable geometry, script failure, skill-activation
//! failure, instance-creation rejection, and resource exhaustion. Local
//! recovery is preferred at every call site; `CoreError` is returned, not
//! panicked, except for the one documented invariant violation in
//! `zone::Zone::register_entity`.

use thiserror::Error;

use crate::entity::EntityId;
use crate::zone::ZoneId;

/// Retryable vs. terminal skill activation failure codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillFailureCode {
    /// Transient — caller should keep the command queued and retry.
    ActionRetry,
    /// Target moved out of range — also retryable.
    TooFar,
    /// Any other failure reported by the skill subsystem; not retryable.
    Other(String),
}

impl SkillFailureCode {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SkillFailureCode::ActionRetry | SkillFailureCode::TooFar)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("definition not found: {kind} {id}")]
    DefinitionMissing { kind: &'static str, id: u32 },

    #[error("entity {entity:?} is no longer present in zone {zone:?}")]
    EntityGone { entity: EntityId, zone: ZoneId },

    #[error("no reachable path")]
    Unreachable,

    #[error("script error in {function}: {message}")]
    ScriptError { function: String, message: String },

    #[error("skill activation failed: {0:?}")]
    SkillActivationFailed(SkillFailureCode),

    #[error("instance creation rejected: {0}")]
    InstanceRejected(&'static str),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
}

pub type CoreResult<T> = Result<T, CoreError>;
