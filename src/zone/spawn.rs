//! Declarative spawn templates and the respawn/trigger machinery that
//! turns them into live entities.
//!
//! Generalizes the source's per-zone-id hardcoded `SpawnConfig` table
//! (`systems::npc_spawner::get_zone_npc_configs`) into the spec's
//! data-driven SpawnGroup/SpawnLocationGroup model, and its flat
//! respawn-timer `Vec<RespawnEntry>` into one timestamp per location
//! group.

use std::collections::{HashMap, HashSet};

use crate::clock::{DayOfWeekMask, MoonPhaseMask, TimeWindow, WorldClock};
use crate::entity::EntityId;
use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotSelectionMode {
    ShareSpot,
    Spread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnMode {
    Normal,
    OneTime,
    OneTimeRandom,
    NoneExist,
    EnableGroup,
    DisableGroup,
    Despawn,
}

/// A rectangular area entities may be placed within, distinct from a named
/// `Spot` in that it carries no rotation and no independent identity
/// outside a `SpawnLocationGroup`.
#[derive(Debug, Clone, Copy)]
pub struct SpawnLocation {
    pub center: Point,
    pub half_span_x: f64,
    pub half_span_y: f64,
}

impl SpawnLocation {
    pub fn random_point(&self) -> Point {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        Point::new(
            self.center.x + rng.gen_range(-self.half_span_x..self.half_span_x),
            self.center.y + rng.gen_range(-self.half_span_y..self.half_span_y),
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        (p.x - self.center.x).abs() <= self.half_span_x && (p.y - self.center.y).abs() <= self.half_span_y
    }
}

#[derive(Debug, Clone)]
pub struct Spawn {
    pub devil_id: u32,
    pub ai_script_override: Option<String>,
    pub aggression_override: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct SpawnGroup {
    pub id: u32,
    /// Template × count pairs.
    pub spawns: Vec<(Spawn, u32)>,
}

#[derive(Debug, Clone, Default)]
pub struct SpawnRestriction {
    pub moon_phases: Option<MoonPhaseMask>,
    pub days_of_week: Option<DayOfWeekMask>,
    pub game_time_windows: Vec<TimeWindow>,
    pub real_time_windows: Vec<TimeWindow>,
    pub date_list: Vec<(u8, u8)>,
}

impl SpawnRestriction {
    /// Satisfied iff the clock matches *all* configured dimensions —
    /// dimensions left unconfigured are vacuously satisfied.
    pub fn satisfied(&self, clock: &WorldClock) -> bool {
        if let Some(mask) = self.moon_phases {
            if !mask.matches(clock.moon_phase) {
                return false;
            }
        }
        if let Some(mask) = self.days_of_week {
            if !mask.matches(clock.day_of_week) {
                return false;
            }
        }
        if !self.game_time_windows.is_empty()
            && !self.game_time_windows.iter().any(|w| w.contains(clock.game_hour, clock.game_minute))
        {
            return false;
        }
        if !self.real_time_windows.is_empty()
            && !self.real_time_windows.iter().any(|w| w.contains(clock.system_hour, clock.system_minute))
        {
            return false;
        }
        if !self.date_list.is_empty() && !self.date_list.contains(&(clock.month, clock.day)) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct SpawnLocationGroup {
    pub id: u32,
    pub candidate_group_ids: Vec<u32>,
    pub candidate_spot_ids: Vec<u32>,
    pub locations: Vec<SpawnLocation>,
    pub respawn_interval_ticks: u64,
    pub spot_selection: SpotSelectionMode,
    pub restriction: Option<SpawnRestriction>,
}

/// One concrete entity placement produced by `trigger`.
#[derive(Debug, Clone)]
pub struct SpawnPlacement {
    pub devil_id: u32,
    pub position: Point,
    pub ai_script_override: Option<String>,
    pub aggression_override: Option<u8>,
}

#[derive(Debug, Default)]
pub struct SpawnManager {
    groups: HashMap<u32, SpawnGroup>,
    location_groups: HashMap<u32, SpawnLocationGroup>,
    live_entities: HashMap<u32, HashSet<EntityId>>,
    next_due: HashMap<u32, u64>,
    ever_spawned: HashSet<u32>,
    one_time_random_chosen: HashMap<u32, u32>,
}

impl SpawnManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_group(&mut self, group: SpawnGroup) {
        self.groups.insert(group.id, group);
    }

    pub fn register_location_group(&mut self, group: SpawnLocationGroup) {
        self.location_groups.insert(group.id, group);
    }

    /// Exposed for `ai::tick`'s `Wander` home lookup.
    pub fn location_group(&self, id: u32) -> Option<&SpawnLocationGroup> {
        self.location_groups.get(&id)
    }

    pub fn note_live_entity(&mut self, location_group_id: u32, entity: EntityId) {
        self.live_entities.entry(location_group_id).or_default().insert(entity);
    }

    pub fn note_entity_removed(&mut self, location_group_id: u32, entity: EntityId, now: u64) {
        let empty = if let Some(set) = self.live_entities.get_mut(&location_group_id) {
            set.remove(&entity);
            set.is_empty()
        } else {
            false
        };
        if empty {
            if let Some(group) = self.location_groups.get(&location_group_id) {
                self.next_due.insert(location_group_id, now + group.respawn_interval_ticks);
            }
        }
    }

    fn any_alive(&self, location_group_id: u32) -> bool {
        self.live_entities.get(&location_group_id).map(|s| !s.is_empty()).unwrap_or(false)
    }

    /// Evaluate a triggering action against a location group, returning the
    /// placements to instantiate (empty if the mode skips this attempt).
    pub fn trigger(&mut self, location_group_id: u32, mode: SpawnMode, clock: &WorldClock, disabled: &HashSet<u32>) -> Vec<SpawnPlacement> {
        if disabled.contains(&location_group_id) {
            return Vec::new();
        }
        let Some(group) = self.location_groups.get(&location_group_id).cloned() else {
            return Vec::new();
        };
        if let Some(restriction) = &group.restriction {
            if !restriction.satisfied(clock) {
                return Vec::new();
            }
        }

        match mode {
            SpawnMode::EnableGroup | SpawnMode::DisableGroup | SpawnMode::Despawn => Vec::new(),
            SpawnMode::NoneExist if self.any_alive(location_group_id) => Vec::new(),
            SpawnMode::OneTime if self.ever_spawned.contains(&location_group_id) => Vec::new(),
            SpawnMode::OneTimeRandom if self.one_time_random_chosen.contains_key(&location_group_id) => Vec::new(),
            _ => {
                self.ever_spawned.insert(location_group_id);
                let candidate_group_id = if mode == SpawnMode::OneTimeRandom {
                    let chosen = pick_uniform(&group.candidate_group_ids);
                    if let Some(c) = chosen {
                        self.one_time_random_chosen.insert(location_group_id, c);
                    }
                    chosen
                } else {
                    pick_uniform(&group.candidate_group_ids)
                };
                let Some(candidate_group_id) = candidate_group_id else { return Vec::new() };
                let Some(spawn_group) = self.groups.get(&candidate_group_id) else { return Vec::new() };
                self.place(spawn_group, &group)
            }
        }
    }

    /// `ShareSpot` picks one of the group's candidate locations once and
    /// reuses it for every placement; `Spread` draws a fresh independent
    /// pick per placement (§4.8, scenario (vi)).
    fn pick_location<'b>(location_group: &'b SpawnLocationGroup) -> Option<&'b SpawnLocation> {
        pick_uniform_ref(&location_group.locations)
    }

    fn place(&self, spawn_group: &SpawnGroup, location_group: &SpawnLocationGroup) -> Vec<SpawnPlacement> {
        let mut placements = Vec::new();
        let shared_point = match location_group.spot_selection {
            SpotSelectionMode::ShareSpot => Self::pick_location(location_group).map(|l| l.random_point()),
            SpotSelectionMode::Spread => None,
        };

        for (spawn, count) in &spawn_group.spawns {
            for _ in 0..*count {
                let position = match shared_point {
                    Some(p) => p,
                    None => Self::pick_location(location_group).map(|l| l.random_point()).unwrap_or(Point::new(0.0, 0.0)),
                };
                placements.push(SpawnPlacement {
                    devil_id: spawn.devil_id,
                    position,
                    ai_script_override: spawn.ai_script_override.clone(),
                    aggression_override: spawn.aggression_override,
                });
            }
        }
        placements
    }

    /// Location groups whose respawn interval has elapsed as of `now`.
    pub fn due_for_respawn(&mut self, now: u64) -> Vec<u32> {
        let due: Vec<u32> = self.next_due.iter().filter(|(_, &t)| t <= now).map(|(id, _)| *id).collect();
        for id in &due {
            self.next_due.remove(id);
        }
        due
    }

    /// Shift every pending respawn deadline forward by `elapsed` ticks,
    /// called when a frozen zone thaws so timers don't all fire at once.
    pub fn rebaseline(&mut self, elapsed: u64) {
        for due in self.next_due.values_mut() {
            *due = due.saturating_add(elapsed);
        }
    }
}

fn pick_uniform(candidates: &[u32]) -> Option<u32> {
    if candidates.is_empty() {
        return None;
    }
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..candidates.len());
    Some(candidates[idx])
}

fn pick_uniform_ref<T>(candidates: &[T]) -> Option<&T> {
    if candidates.is_empty() {
        return None;
    }
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..candidates.len());
    Some(&candidates[idx])
}
