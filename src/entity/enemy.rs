//! `EnemyBase`, `Enemy`, and `Ally` — the composed structure for any
//! spawned, AI-controlled entity. Grounded in the source's NPC-family
//! split (`systems::npc` distinguishes factions/types) but generalized to
//! the spawn-template-driven model the spec describes.

use super::ActiveEntity;
use crate::ai::{AIState, SkillId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnGroupId(pub u32);
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnLocationGroupId(pub u32);
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnSpotId(pub u32);
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncounterId(pub u32);

/// Fields shared by anything that originated from a spawn (as opposed to
/// a player or object). Composed into `Enemy` and `Ally` rather than
/// inherited, matching the source's EnemyBase mixin.
pub struct EnemyBase {
    pub devil_id: u32,
    pub spawn_group_id: Option<SpawnGroupId>,
    pub spawn_location_group_id: Option<SpawnLocationGroupId>,
    pub spawn_spot_id: Option<SpawnSpotId>,
    pub encounter_id: Option<EncounterId>,
    pub variant_type: u8,
    /// The skill ids `RefreshSkillMap` draws from, resolved once at spawn
    /// time from the devil definition (or a spawn-level override).
    pub skill_ids: Vec<SkillId>,
}

pub struct Enemy {
    pub base: ActiveEntity,
    pub enemy_base: EnemyBase,
    pub ai: AIState,
}

impl Enemy {
    pub fn ai_skill_ids(&self) -> Vec<SkillId> {
        self.enemy_base.skill_ids.clone()
    }
}

pub struct Ally {
    pub base: ActiveEntity,
    pub enemy_base: EnemyBase,
    pub ai: AIState,
    /// The character entity id this ally is partnered to, if any.
    pub owner: Option<super::EntityId>,
}

impl Ally {
    pub fn ai_skill_ids(&self) -> Vec<SkillId> {
        self.enemy_base.skill_ids.clone()
    }
}
