//! `ActiveEntity` — base kinematics, HP/MP, and opponent tracking shared by
//! anything the AI system can drive (enemies, allies) or that participates
//! in combat (players, partner demons).

use std::collections::HashSet;

use super::{DisplayState, EntityId, EntityKind, Faction, StatusEffect};
use crate::geometry::Point;

bitflags::bitflags! {
    /// Named status windows that constrain what an entity may do on the
    /// current tick (§4.1 step 5, §4.3's charging/knockback checks).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CombatFlags: u16 {
        const STUNNED = 1 << 0;
        const KNOCKBACK = 1 << 1;
        const CHARGING = 1 << 2;
        const SKILL_LOCKOUT = 1 << 3;
    }
}

impl CombatFlags {
    /// Whether any of the "cannot act" windows from §4.1 step 5 are open.
    pub fn blocks_action(&self) -> bool {
        self.intersects(CombatFlags::STUNNED | CombatFlags::CHARGING)
    }
}

/// A timestamped kinematic endpoint: where the entity was (or will be) and
/// when. `MOVE`/`ROTATE` packets carry an origin and destination pair of
/// these so the client can interpolate locally between ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub position: Point,
    pub rotation: f64,
    pub ticks: u64,
}

pub struct ActiveEntityConfig {
    pub kind: EntityKind,
    pub zone: Option<crate::zone::ZoneId>,
    pub position: Point,
    pub rotation: f64,
    pub now_ticks: u64,
    pub move_speed: f64,
    pub max_hp: i32,
    pub max_mp: i32,
    pub level: i16,
}

pub struct ActiveEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub zone: Option<crate::zone::ZoneId>,

    pub origin: Waypoint,
    pub destination: Waypoint,
    pub move_speed: f64,

    pub hp: i32,
    pub max_hp: i32,
    pub mp: i32,
    pub max_mp: i32,
    pub level: i16,

    pub status_effects: Vec<StatusEffect>,

    pub opponents: HashSet<EntityId>,
    pub aggro_target: Option<EntityId>,
    pub aggressors: HashSet<EntityId>,

    pub display_state: DisplayState,

    pub combat_flags: CombatFlags,
    /// "Waiting" status end time set by a `Wait` command or a consumed
    /// delay; distinct from `combat_flags` because it is a queue-driven
    /// pause rather than a skill/knockback window.
    pub waiting_until: Option<u64>,
    /// Entities a script or GM tool has marked invisible to AI targeting.
    pub ai_ignored: bool,
}

impl ActiveEntity {
    pub fn new(id: EntityId, config: ActiveEntityConfig) -> Self {
        let waypoint = Waypoint { position: config.position, rotation: config.rotation, ticks: config.now_ticks };
        Self {
            id,
            kind: config.kind,
            zone: config.zone,
            origin: waypoint,
            destination: waypoint,
            move_speed: config.move_speed,
            hp: config.max_hp,
            max_hp: config.max_hp,
            mp: config.max_mp,
            max_mp: config.max_mp,
            level: config.level,
            status_effects: Vec::new(),
            opponents: HashSet::new(),
            aggro_target: None,
            aggressors: HashSet::new(),
            display_state: DisplayState::NotSent,
            combat_flags: CombatFlags::empty(),
            waiting_until: None,
            ai_ignored: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn faction(&self) -> Faction {
        self.kind.faction()
    }

    /// A valid `Retarget`/opponent candidate: alive, fully spawned, and not
    /// explicitly hidden from AI.
    pub fn is_ready(&self) -> bool {
        self.is_alive() && !self.ai_ignored && matches!(self.display_state, DisplayState::Sent | DisplayState::Active)
    }

    /// Whether this entity is presently under a "waiting" status set by a
    /// `Wait` command or a consumed command delay (§4.1 step 5).
    pub fn is_waiting(&self, now_ticks: u64) -> bool {
        self.waiting_until.map(|t| now_ticks < t).unwrap_or(false)
    }

    pub fn set_waiting_until(&mut self, until_ticks: u64) {
        self.waiting_until = Some(until_ticks);
    }

    pub fn clear_waiting(&mut self) {
        self.waiting_until = None;
    }

    /// Interpolated current position at `now_ticks`, clamped to the
    /// destination once it has been reached.
    pub fn position_at(&self, now_ticks: u64) -> Point {
        if self.destination.ticks <= self.origin.ticks || now_ticks >= self.destination.ticks {
            return self.destination.position;
        }
        if now_ticks <= self.origin.ticks {
            return self.origin.position;
        }
        let total = (self.destination.ticks - self.origin.ticks) as f64;
        let elapsed = (now_ticks - self.origin.ticks) as f64;
        let t = (elapsed / total).clamp(0.0, 1.0);
        Point::new(
            self.origin.position.x + (self.destination.position.x - self.origin.position.x) * t,
            self.origin.position.y + (self.destination.position.y - self.origin.position.y) * t,
        )
    }

    pub fn is_moving(&self, now_ticks: u64) -> bool {
        self.destination.ticks > now_ticks && self.destination.position != self.origin.position
    }

    /// Cap motion to `now_ticks`: freeze the entity where it currently is,
    /// collapsing origin and destination to the interpolated position.
    pub fn stop_motion(&mut self, now_ticks: u64) {
        let here = self.position_at(now_ticks);
        self.origin = Waypoint { position: here, rotation: self.destination.rotation, ticks: now_ticks };
        self.destination = self.origin;
    }

    pub fn set_destination(&mut self, now_ticks: u64, position: Point, rotation: f64) {
        let current = self.position_at(now_ticks);
        self.origin = Waypoint { position: current, rotation: self.origin.rotation, ticks: now_ticks };
        let distance = current.distance(position);
        let travel_ticks = if self.move_speed > 0.0 {
            ((distance / self.move_speed) * 1_000_000.0) as u64 // microseconds
        } else {
            0
        };
        self.destination = Waypoint { position, rotation, ticks: now_ticks + travel_ticks };
    }
}
