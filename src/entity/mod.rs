//! Entity identity and the bidirectional opponents/aggressors graph.
//!
//! Entities are addressed by id everywhere outside of the zone that owns
//! them; nothing holds a direct reference across an `.await` point or a
//! lock boundary. This matches the source engine's weak-reference-by-id
//! pattern for cyclic entity/zone/target graphs.

pub mod active_entity;
pub mod enemy;
pub mod status_effect;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

pub use active_entity::ActiveEntity;
pub use enemy::{Ally, Enemy, EnemyBase};
pub use status_effect::StatusEffect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

static NEXT_ENTITY_ID: AtomicU32 = AtomicU32::new(1);

/// Allocate a fresh, process-wide unique entity id.
pub fn alloc_entity_id() -> EntityId {
    EntityId(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Player,
    PartnerDemon,
    Enemy,
    Ally,
    Npc,
    Object,
}

/// Coarse grouping used by `Retarget`'s same-faction filter. NPCs and
/// objects are never valid aggro candidates, hence `Neutral`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Faction {
    Friendly,
    Hostile,
    Neutral,
}

impl EntityKind {
    pub fn faction(&self) -> Faction {
        match self {
            EntityKind::Player | EntityKind::PartnerDemon | EntityKind::Ally => Faction::Friendly,
            EntityKind::Enemy => Faction::Hostile,
            EntityKind::Npc | EntityKind::Object => Faction::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    NotSent,
    AwaitingSummon,
    Sent,
    Active,
}

/// Add `a` and `b` to each other's opponents set. If either side is a
/// player or partner-demon, the paired (character, partner-demon) on that
/// side is added too — callers resolve the pairing before calling this;
/// this function only enforces the symmetric invariant for the ids given.
pub fn add_opponents(opponents: &mut std::collections::HashMap<EntityId, HashSet<EntityId>>, a: EntityId, b: EntityId) {
    opponents.entry(a).or_default().insert(b);
    opponents.entry(b).or_default().insert(a);
}

/// Remove `a` and `b` from each other's opponents set.
pub fn remove_opponents(opponents: &mut std::collections::HashMap<EntityId, HashSet<EntityId>>, a: EntityId, b: EntityId) {
    if let Some(set) = opponents.get_mut(&a) {
        set.remove(&b);
    }
    if let Some(set) = opponents.get_mut(&b) {
        set.remove(&a);
    }
}
