//! `Zone` — the spatial container and entity registry that owns a tick.
//!
//! Grounded in the source's `game::Zone` (players keyed by id, bounds,
//! respawn ticking) but generalized from "players only" to the full
//! registry set the spec requires, and from a fixed rectangle to an
//! optional `Geometry` handle plus named spots.

pub mod spawn;
pub mod transfer;
pub mod trigger;

use std::collections::{HashMap, HashSet};

use crate::entity::{ActiveEntity, Ally, Enemy, EntityId};
use crate::geometry::{Geometry, Point};
use crate::protocol::OutboundPacket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub u32);

/// A dropped, unclaimed item pile. Sits in the zone's registry purely as
/// addressable state; item rolling and claim rules are out of scope here.
pub struct LootBox {
    pub position: Point,
    pub expires_at_ticks: u64,
}

/// A harvestable resource node. `depleted_until_ticks` tracks a respawn
/// cooldown after the last harvest.
pub struct PlasmaPoint {
    pub position: Point,
    pub depleted_until_ticks: Option<u64>,
}

/// A player-run market stall. Expiration is one of the deferred tasks the
/// scheduler drives; the listing contents themselves are out of scope.
pub struct Bazaar {
    pub owner_character_id: u32,
    pub position: Point,
    pub expires_at_ticks: u64,
}

/// A connected player session able to receive broadcasts. The transport
/// itself is out of scope; this crate only needs a stable identity and a
/// place to push outbound packets.
pub struct Connection {
    pub character_id: u32,
    pub entity_id: EntityId,
    outbox: Vec<OutboundPacket>,
}

impl Connection {
    pub fn new(character_id: u32, entity_id: EntityId) -> Self {
        Self { character_id, entity_id, outbox: Vec::new() }
    }

    pub fn send(&mut self, packet: OutboundPacket) {
        self.outbox.push(packet);
    }

    pub fn drain_outbox(&mut self) -> Vec<OutboundPacket> {
        std::mem::take(&mut self.outbox)
    }
}

pub struct Zone {
    pub id: ZoneId,
    pub definition_id: u32,
    pub dynamic_map_id: Option<u32>,
    pub geometry: Option<Geometry>,

    pub players: HashMap<EntityId, ActiveEntity>,
    pub enemies: HashMap<EntityId, Enemy>,
    pub allies: HashMap<EntityId, Ally>,
    pub npcs: HashMap<EntityId, ActiveEntity>,
    pub objects: HashMap<EntityId, ActiveEntity>,
    pub loot_boxes: HashMap<EntityId, LootBox>,
    pub plasma: HashMap<EntityId, PlasmaPoint>,
    pub bazaars: HashMap<EntityId, Bazaar>,

    pub connections: Vec<Connection>,

    pub pending_despawn: Vec<EntityId>,
    pub disabled_spawn_groups: HashSet<u32>,
    pub disabled_geometry_elements: HashSet<u32>,

    pub spawner: spawn::SpawnManager,
    pub triggers: trigger::TriggerRegistry,

    /// `now` (microseconds) as of this zone's last ticked update; frozen
    /// zones keep this pinned while real time moves on, so thaw can
    /// rebaseline timers against the gap.
    pub last_ticked_now: u64,
}

impl Zone {
    pub fn new(id: ZoneId, definition_id: u32, dynamic_map_id: Option<u32>, geometry: Option<Geometry>, now: u64) -> Self {
        Self {
            id,
            definition_id,
            dynamic_map_id,
            geometry,
            players: HashMap::new(),
            enemies: HashMap::new(),
            allies: HashMap::new(),
            npcs: HashMap::new(),
            objects: HashMap::new(),
            loot_boxes: HashMap::new(),
            plasma: HashMap::new(),
            bazaars: HashMap::new(),
            connections: Vec::new(),
            pending_despawn: Vec::new(),
            disabled_spawn_groups: HashSet::new(),
            disabled_geometry_elements: HashSet::new(),
            spawner: spawn::SpawnManager::new(),
            triggers: trigger::TriggerRegistry::new(),
            last_ticked_now: now,
        }
    }

    /// A zone with zero connections does not tick.
    pub fn is_active(&self) -> bool {
        !self.connections.is_empty()
    }

    pub fn add_connection(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    pub fn remove_connection(&mut self, character_id: u32) -> Option<Connection> {
        let idx = self.connections.iter().position(|c| c.character_id == character_id)?;
        Some(self.connections.remove(idx))
    }

    pub fn broadcast(&mut self, packet: OutboundPacket) {
        for conn in &mut self.connections {
            conn.send(packet.clone());
        }
    }

    pub fn broadcast_except(&mut self, except_character_id: u32, packet: OutboundPacket) {
        for conn in &mut self.connections {
            if conn.character_id != except_character_id {
                conn.send(packet.clone());
            }
        }
    }

    /// Resolve an entity id against whichever registry currently holds it.
    /// Loot boxes, plasma, and bazaars are not `ActiveEntity`s and are
    /// never returned here.
    pub fn active_entity(&self, id: EntityId) -> Option<&ActiveEntity> {
        self.players
            .get(&id)
            .or_else(|| self.enemies.get(&id).map(|e| &e.base))
            .or_else(|| self.allies.get(&id).map(|a| &a.base))
            .or_else(|| self.npcs.get(&id))
            .or_else(|| self.objects.get(&id))
    }

    pub fn active_entity_mut(&mut self, id: EntityId) -> Option<&mut ActiveEntity> {
        if self.players.contains_key(&id) {
            return self.players.get_mut(&id);
        }
        if let Some(e) = self.enemies.get_mut(&id) {
            return Some(&mut e.base);
        }
        if let Some(a) = self.allies.get_mut(&id) {
            return Some(&mut a.base);
        }
        if let Some(n) = self.npcs.get_mut(&id) {
            return Some(n);
        }
        self.objects.get_mut(&id)
    }

    /// Every combat-capable entity id currently registered, for
    /// `Retarget`'s candidate sweep.
    pub fn active_entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.players
            .keys()
            .chain(self.enemies.keys())
            .chain(self.allies.keys())
            .chain(self.npcs.keys())
            .copied()
    }

    /// Resolve an opponent-graph entity id against whichever registry
    /// currently holds it, returning its live position. Any entity not
    /// found in this zone's registries is treated as gone.
    pub fn position_of(&self, id: EntityId, now: u64) -> Option<Point> {
        self.active_entity(id).map(|e| e.position_at(now))
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.active_entity(id).map(|e| e.is_alive()).unwrap_or(false)
    }

    /// Advance the frozen-zone baseline to `now` without running any AI.
    /// Called once when a zone transitions back to active so respawn
    /// timers and status-effect boundaries rebase against the gap rather
    /// than firing all at once.
    pub fn thaw(&mut self, now: u64) {
        let elapsed = now.saturating_sub(self.last_ticked_now);
        self.spawner.rebaseline(elapsed);
        self.last_ticked_now = now;
    }

    pub fn queue_despawn(&mut self, id: EntityId) {
        self.pending_despawn.push(id);
    }

    pub fn drain_despawns(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.pending_despawn)
    }
}
