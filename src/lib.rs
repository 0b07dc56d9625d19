//! Odyssey AI core: the per-tick NPC brain, targeting, skill selection, and
//! zone/instance runtime that drives a live MMO zone. Transport, persistence,
//! and battle-formula resolution are deliberately out of scope — this crate
//! owns the decision loop and hands off packets and skill-execution calls to
//! whatever the embedding server wires up (see `definitions` and
//! `protocol`).

pub mod ai;
pub mod clock;
pub mod config;
pub mod definitions;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod instance;
pub mod protocol;
pub mod scheduler;
pub mod zone;

pub use config::Config;
pub use error::{CoreError, CoreResult, SkillFailureCode};
pub use scheduler::{Collaborators, Scheduler};
