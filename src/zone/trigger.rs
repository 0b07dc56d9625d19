//! Trigger registry: fires named actions on zone lifecycle events, clock
//! crossings, and flag writes.

use std::collections::HashMap;

use crate::entity::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    OnSetup,
    OnZoneIn,
    OnZoneOut,
    OnSpawn,
    OnDeath,
    OnRevival,
    OnFlagSet,
    OnTime,
    OnSystemTime,
    OnMoonPhase,
}

#[derive(Debug, Clone)]
pub struct Trigger {
    pub kind: TriggerKind,
    /// For `OnTime`/`OnSystemTime`: the hour*60+minute value that must be
    /// crossed. For `OnMoonPhase`: the target phase. For `OnFlagSet`: the
    /// flag key stored in `action` instead.
    pub target_value: Option<u32>,
    pub flag_key: Option<String>,
    pub action: String,
}

/// One firing: the action to run and the entity (if any) bound as subject.
#[derive(Debug, Clone)]
pub struct TriggerFiring {
    pub action: String,
    pub subject: Option<EntityId>,
}

#[derive(Debug, Default)]
pub struct TriggerRegistry {
    by_kind: HashMap<TriggerKind, Vec<Trigger>>,
    last_time_value: Option<u32>,
    last_moon_phase: Option<u8>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, trigger: Trigger) {
        self.by_kind.entry(trigger.kind).or_default().push(trigger);
    }

    /// Fire every trigger of `kind`, binding `subject` as the originating
    /// entity. Used for zone-in/zone-out/spawn/death/revival events.
    pub fn fire_event(&self, kind: TriggerKind, subject: Option<EntityId>) -> Vec<TriggerFiring> {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .map(|t| TriggerFiring { action: t.action.clone(), subject })
            .collect()
    }

    /// Fire flag-set triggers whose key matches.
    pub fn fire_flag_set(&self, key: &str) -> Vec<TriggerFiring> {
        self.by_kind
            .get(&TriggerKind::OnFlagSet)
            .into_iter()
            .flatten()
            .filter(|t| t.flag_key.as_deref() == Some(key))
            .map(|t| TriggerFiring { action: t.action.clone(), subject: None })
            .collect()
    }

    /// Fire `OnTime` triggers whose target value was crossed since the
    /// last evaluation, handling rollover (e.g. hour 23 -> 0).
    pub fn evaluate_time(&mut self, current_value: u32, rollover_at: u32) -> Vec<TriggerFiring> {
        let crossed = self.crossed(self.last_time_value, current_value, rollover_at);
        self.last_time_value = Some(current_value);
        self.by_kind
            .get(&TriggerKind::OnTime)
            .into_iter()
            .flatten()
            .filter(|t| t.target_value.map(|v| crossed.contains(&v)).unwrap_or(false))
            .map(|t| TriggerFiring { action: t.action.clone(), subject: None })
            .collect()
    }

    pub fn evaluate_moon_phase(&mut self, current_phase: u8) -> Vec<TriggerFiring> {
        let fired = self.last_moon_phase != Some(current_phase);
        self.last_moon_phase = Some(current_phase);
        if !fired {
            return Vec::new();
        }
        self.by_kind
            .get(&TriggerKind::OnMoonPhase)
            .into_iter()
            .flatten()
            .filter(|t| t.target_value == Some(current_phase as u32))
            .map(|t| TriggerFiring { action: t.action.clone(), subject: None })
            .collect()
    }

    fn crossed(&self, last: Option<u32>, current: u32, rollover_at: u32) -> Vec<u32> {
        let Some(last) = last else { return vec![current] };
        if last == current {
            return Vec::new();
        }
        if current >= last {
            (last + 1..=current).collect()
        } else {
            // Wrapped past rollover: everything from last+1 up to the
            // ceiling, then 0 up to current.
            let mut values: Vec<u32> = (last + 1..rollover_at).collect();
            values.extend(0..=current);
            values
        }
    }
}
