//! The zone-local mechanics behind `EnterZone`/`LeaveZone` (§4.9): trigger
//! firing and zone-change-cancellable status-effect clearing around an
//! entity's move between two `Zone`s. Gating (DemonOnly's living-partner
//! check) and the cross-zone lock ordering live one layer up in
//! `scheduler::Scheduler`, which only ever holds one of these zones' locks
//! at a time.
//!
//! Grounded in `ZoneManager::EnterZone`/`LeaveZone`: `TriggerZoneActions`
//! fires before the entity leaves, `SetStatusEffectsActive(false, ...)`
//! clears the zone-change-cancellable set, and the entity is re-homed into
//! the destination zone's registry before its zone-in triggers fire.

use crate::entity::status_effect::{remove_cancelled, CancelMask};
use crate::entity::active_entity::Waypoint;
use crate::entity::{ActiveEntity, EntityId};
use crate::geometry::Point;
use crate::zone::trigger::TriggerKind;
use crate::zone::{Connection, Zone};

fn place_at(entity: &mut ActiveEntity, position: Point, rotation: f64, now_ticks: u64) {
    let waypoint = Waypoint { position, rotation, ticks: now_ticks };
    entity.origin = waypoint;
    entity.destination = waypoint;
}

/// Detach a player's entity from `zone`: fire its on-zone-out triggers,
/// clear `ZONE_CHANGE`-cancellable status effects, drop its connection, and
/// hand the entity back for the destination zone to adopt. `None` if
/// `entity_id` is not a player currently registered in `zone`.
pub fn leave_zone(zone: &mut Zone, entity_id: EntityId, character_id: u32) -> Option<ActiveEntity> {
    zone.triggers.fire_event(TriggerKind::OnZoneOut, Some(entity_id));
    let mut entity = zone.players.remove(&entity_id)?;
    remove_cancelled(&mut entity.status_effects, CancelMask::ZONE_CHANGE);
    zone.remove_connection(character_id);
    Some(entity)
}

/// Place `entity` into `zone` at `position`/`rotation`, wire its connection
/// back up, and fire its on-zone-in triggers. Returns the entity's id.
pub fn enter_zone(zone: &mut Zone, mut entity: ActiveEntity, character_id: u32, position: Point, rotation: f64, now_ticks: u64) -> EntityId {
    entity.zone = Some(zone.id);
    place_at(&mut entity, position, rotation, now_ticks);
    let id = entity.id;
    zone.players.insert(id, entity);
    zone.add_connection(Connection::new(character_id, id));
    zone.triggers.fire_event(TriggerKind::OnZoneIn, Some(id));
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::active_entity::ActiveEntityConfig;
    use crate::entity::status_effect::StatusEffect;
    use crate::entity::{alloc_entity_id, EntityKind};
    use crate::zone::trigger::Trigger;
    use crate::zone::ZoneId;

    fn make_player(zone: &Zone, position: Point) -> ActiveEntity {
        let id = alloc_entity_id();
        let mut entity = ActiveEntity::new(
            id,
            ActiveEntityConfig {
                kind: EntityKind::Player,
                zone: Some(zone.id),
                position,
                rotation: 0.0,
                now_ticks: 0,
                move_speed: 0.0,
                max_hp: 100,
                max_mp: 50,
                level: 10,
            },
        );
        entity.status_effects.push(StatusEffect { effect_id: 1, stack_count: 1, expires_at_ticks: None, cancel_mask: CancelMask::ZONE_CHANGE });
        entity.status_effects.push(StatusEffect { effect_id: 2, stack_count: 1, expires_at_ticks: None, cancel_mask: CancelMask::LOGOUT });
        entity
    }

    #[test]
    fn leave_zone_clears_zone_change_effects_and_connection() {
        let mut zone = Zone::new(ZoneId(1), 100, None, None, 0);
        zone.triggers.register(Trigger { kind: TriggerKind::OnZoneOut, target_value: None, flag_key: None, action: "onZoneOut".into() });
        let player = make_player(&zone, Point::new(0.0, 0.0));
        let id = player.id;
        zone.players.insert(id, player);
        zone.add_connection(Connection::new(7, id));

        let detached = leave_zone(&mut zone, id, 7).unwrap();
        assert_eq!(detached.status_effects.len(), 1);
        assert_eq!(detached.status_effects[0].effect_id, 2);
        assert!(zone.players.get(&id).is_none());
        assert!(zone.connections.is_empty());
    }

    #[test]
    fn enter_zone_places_entity_and_wires_connection() {
        let mut dest = Zone::new(ZoneId(2), 101, None, None, 0);
        let origin_zone = Zone::new(ZoneId(1), 100, None, None, 0);
        let player = make_player(&origin_zone, Point::new(5.0, 5.0));
        let id = player.id;

        let placed_id = enter_zone(&mut dest, player, 7, Point::new(10.0, 20.0), 1.5, 1000);
        assert_eq!(placed_id, id);
        let entity = dest.active_entity(id).unwrap();
        assert_eq!(entity.zone, Some(ZoneId(2)));
        assert_eq!(entity.origin.position, Point::new(10.0, 20.0));
        assert_eq!(entity.destination.position, Point::new(10.0, 20.0));
        assert_eq!(dest.connections.len(), 1);
        assert_eq!(dest.connections[0].character_id, 7);
    }
}
