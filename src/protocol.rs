//! Outbound network-layer packets produced by this core and consumed by a
//! transport layer that is otherwise out of scope.
//!
//! Keeps the source's 1-byte type id + MessagePack body framing
//! (`encode_message`) even though no live transport is wired up here;
//! downstream transport code is expected to call [`encode`].

use serde::Serialize;

use crate::entity::EntityId;

/// Message type IDs for the packets this core emits.
#[allow(dead_code)]
pub mod id {
    pub const MOVE: u8 = 0x40;
    pub const ROTATE: u8 = 0x41;
    pub const STOP_MOVEMENT: u8 = 0x42;
    pub const ENEMY_ACTIVATED: u8 = 0x43;
    pub const BATTLE_STARTED: u8 = 0x44;
    pub const BATTLE_STOPPED: u8 = 0x45;
    pub const ADD_STATUS_EFFECT: u8 = 0x46;
    pub const REMOVE_STATUS_EFFECT: u8 = 0x47;
    pub const FIX_POSITION: u8 = 0x48;
    pub const TIME_TRIAL_UPDATE: u8 = 0x50;
    pub const TIME_TRIAL_END: u8 = 0x51;
    pub const DEMON_SOLO_UPDATE: u8 = 0x52;
    pub const DEMON_SOLO_END: u8 = 0x53;
    pub const TIME_LIMIT_UPDATE: u8 = 0x54;
    pub const TIME_LIMIT_END: u8 = 0x55;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRank {
    A,
    B,
    C,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEffectEntry {
    pub effect_type: u32,
    pub expiration_ticks: u64,
    pub stack: u8,
}

#[derive(Debug, Clone)]
pub enum OutboundPacket {
    Move { entity_id: EntityId, dest_x: f64, dest_y: f64, orig_x: f64, orig_y: f64, speed: f64, now_ticks: u64, dest_ticks: u64 },
    Rotate { entity_id: EntityId, dest_rot: f64, now_ticks: u64, dest_ticks: u64 },
    StopMovement { entity_id: EntityId, x: f64, y: f64, dest_ticks: u64 },
    EnemyActivated { entity_id: EntityId, target_entity_id: Option<EntityId> },
    BattleStarted { entity_id: EntityId, speed: f64 },
    BattleStopped { entity_id: EntityId, speed: f64 },
    AddStatusEffect { entity_id: EntityId, effects: Vec<StatusEffectEntry> },
    RemoveStatusEffect { entity_id: EntityId, effect_types: Vec<u32> },
    FixPosition { entity_id: EntityId, x: f64, y: f64, rot: f64, now_ticks: u64, end_ticks: u64 },
    TimeTrialUpdate { instance_id: u32, elapsed_s: u32 },
    TimeTrialEnd { instance_id: u32, elapsed_s: u32, rank: InstanceRank },
    DemonSoloUpdate { instance_id: u32, remaining_s: u32 },
    DemonSoloEnd { instance_id: u32, rank: InstanceRank, sp_gain: u32 },
    TimeLimitUpdate { instance_id: u32, remaining_s: u32 },
    TimeLimitEnd { instance_id: u32, expiration_event_id: u32 },
}

#[derive(Debug)]
pub enum ProtocolError {
    SerializeError(rmp_serde::encode::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializeError(e) => write!(f, "serialize: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MovePayload { entity_id: u32, dest_x: f64, dest_y: f64, orig_x: f64, orig_y: f64, speed: f64, now_ticks: u64, dest_ticks: u64 }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RotatePayload { entity_id: u32, dest_rot: f64, now_ticks: u64, dest_ticks: u64 }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StopMovementPayload { entity_id: u32, dest_x: f64, dest_y: f64, dest_ticks: u64 }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnemyActivatedPayload { entity_id: u32, target_entity_id: u32 }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BattleTogglePayload { entity_id: u32, speed: f64 }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddStatusEffectPayload { entity_id: u32, count: u32, effects: Vec<StatusEffectEntry> }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveStatusEffectPayload { entity_id: u32, count: u32, effect_types: Vec<u32> }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FixPositionPayload { entity_id: u32, x: f64, y: f64, rot: f64, now_ticks: u64, end_ticks: u64 }

/// Encode a packet: 1-byte type id + MessagePack body, matching the
/// source's `encode_message(type_id, payload)` framing.
pub fn encode(packet: &OutboundPacket) -> Result<Vec<u8>, ProtocolError> {
    match packet {
        OutboundPacket::Move { entity_id, dest_x, dest_y, orig_x, orig_y, speed, now_ticks, dest_ticks } => encode_message(
            id::MOVE,
            &MovePayload { entity_id: entity_id.0, dest_x: *dest_x, dest_y: *dest_y, orig_x: *orig_x, orig_y: *orig_y, speed: *speed, now_ticks: *now_ticks, dest_ticks: *dest_ticks },
        ),
        OutboundPacket::Rotate { entity_id, dest_rot, now_ticks, dest_ticks } => {
            encode_message(id::ROTATE, &RotatePayload { entity_id: entity_id.0, dest_rot: *dest_rot, now_ticks: *now_ticks, dest_ticks: *dest_ticks })
        }
        OutboundPacket::StopMovement { entity_id, x, y, dest_ticks } => {
            encode_message(id::STOP_MOVEMENT, &StopMovementPayload { entity_id: entity_id.0, dest_x: *x, dest_y: *y, dest_ticks: *dest_ticks })
        }
        OutboundPacket::EnemyActivated { entity_id, target_entity_id } => encode_message(
            id::ENEMY_ACTIVATED,
            &EnemyActivatedPayload { entity_id: entity_id.0, target_entity_id: target_entity_id.map(|t| t.0).unwrap_or(0) },
        ),
        OutboundPacket::BattleStarted { entity_id, speed } => {
            encode_message(id::BATTLE_STARTED, &BattleTogglePayload { entity_id: entity_id.0, speed: *speed })
        }
        OutboundPacket::BattleStopped { entity_id, speed } => {
            encode_message(id::BATTLE_STOPPED, &BattleTogglePayload { entity_id: entity_id.0, speed: *speed })
        }
        OutboundPacket::AddStatusEffect { entity_id, effects } => encode_message(
            id::ADD_STATUS_EFFECT,
            &AddStatusEffectPayload { entity_id: entity_id.0, count: effects.len() as u32, effects: effects.clone() },
        ),
        OutboundPacket::RemoveStatusEffect { entity_id, effect_types } => encode_message(
            id::REMOVE_STATUS_EFFECT,
            &RemoveStatusEffectPayload { entity_id: entity_id.0, count: effect_types.len() as u32, effect_types: effect_types.clone() },
        ),
        OutboundPacket::FixPosition { entity_id, x, y, rot, now_ticks, end_ticks } => encode_message(
            id::FIX_POSITION,
            &FixPositionPayload { entity_id: entity_id.0, x: *x, y: *y, rot: *rot, now_ticks: *now_ticks, end_ticks: *end_ticks },
        ),
        OutboundPacket::TimeTrialUpdate { instance_id, elapsed_s } => encode_message(id::TIME_TRIAL_UPDATE, &(instance_id, elapsed_s)),
        OutboundPacket::TimeTrialEnd { instance_id, elapsed_s, rank } => encode_message(id::TIME_TRIAL_END, &(instance_id, elapsed_s, *rank as u8)),
        OutboundPacket::DemonSoloUpdate { instance_id, remaining_s } => encode_message(id::DEMON_SOLO_UPDATE, &(instance_id, remaining_s)),
        OutboundPacket::DemonSoloEnd { instance_id, rank, sp_gain } => encode_message(id::DEMON_SOLO_END, &(instance_id, *rank as u8, sp_gain)),
        OutboundPacket::TimeLimitUpdate { instance_id, remaining_s } => encode_message(id::TIME_LIMIT_UPDATE, &(instance_id, remaining_s)),
        OutboundPacket::TimeLimitEnd { instance_id, expiration_event_id } => encode_message(id::TIME_LIMIT_END, &(instance_id, expiration_event_id)),
    }
}

fn encode_message<T: Serialize>(type_id: u8, payload: &T) -> Result<Vec<u8>, ProtocolError> {
    let body = rmp_serde::to_vec_named(payload).map_err(ProtocolError::SerializeError)?;
    let mut frame = Vec::with_capacity(1 + body.len());
    frame.push(type_id);
    frame.extend_from_slice(&body);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_move_sets_type_id_byte() {
        let packet = OutboundPacket::Move {
            entity_id: EntityId(1),
            dest_x: 1.0, dest_y: 2.0, orig_x: 0.0, orig_y: 0.0,
            speed: 5.0, now_ticks: 0, dest_ticks: 1000,
        };
        let frame = encode(&packet).unwrap();
        assert_eq!(frame[0], id::MOVE);
        assert!(frame.len() > 1);
    }

    #[test]
    fn encode_enemy_activated_with_no_target_uses_zero_sentinel() {
        let packet = OutboundPacket::EnemyActivated { entity_id: EntityId(5), target_entity_id: None };
        let frame = encode(&packet).unwrap();
        assert_eq!(frame[0], id::ENEMY_ACTIVATED);
    }
}
