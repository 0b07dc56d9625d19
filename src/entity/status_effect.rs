//! Status effects and the per-entity expiration queue.
//!
//! Recalculation ordering matters: stats are recalculated first, then
//! removal notifications are sent, then add/update notifications — in
//! that order — to avoid client-visible flicker (see design notes on the
//! status-effect tick).

use std::collections::BinaryHeap;
use std::cmp::Ordering;

bitflags::bitflags! {
    /// Which real-world events cancel a status effect.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CancelMask: u16 {
        const ZONE_CHANGE = 1 << 0;
        const LOGOUT = 1 << 1;
        const DAMAGE = 1 << 2;
        const KNOCKBACK = 1 << 3;
        const DEATH = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEffect {
    pub effect_id: u32,
    pub stack_count: u8,
    /// `None` means constant (never expires on its own).
    pub expires_at_ticks: Option<u64>,
    pub cancel_mask: CancelMask,
}

impl StatusEffect {
    pub fn is_expired(&self, now_ticks: u64) -> bool {
        self.expires_at_ticks.map(|t| t <= now_ticks).unwrap_or(false)
    }

    pub fn cancels_on(&self, event: CancelMask) -> bool {
        self.cancel_mask.intersects(event)
    }
}

/// Min-heap entry ordering effects by their next expiration boundary.
/// Constant effects (no expiration) never enter this queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct Boundary {
    at_ticks: u64,
    effect_id: u32,
}

impl Ord for Boundary {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for a min-heap on `at_ticks`.
        other.at_ticks.cmp(&self.at_ticks).then_with(|| other.effect_id.cmp(&self.effect_id))
    }
}

impl PartialOrd for Boundary {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct StatusEffectQueue {
    heap: BinaryHeap<Boundary>,
}

impl StatusEffectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, effect_id: u32, at_ticks: u64) {
        self.heap.push(Boundary { at_ticks, effect_id });
    }

    /// Pop every effect id whose boundary has passed `now_ticks`, in
    /// boundary order.
    pub fn drain_expired(&mut self, now_ticks: u64) -> Vec<u32> {
        let mut out = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.at_ticks > now_ticks {
                break;
            }
            out.push(self.heap.pop().unwrap().effect_id);
        }
        out
    }
}

/// Expire and remove any status effect on `effects` whose timer elapsed by
/// `now_ticks`. Returns the removed effect ids in expiration order, ready
/// to be sent as `REMOVE_STATUS_EFFECT` notifications after stats have
/// been recalculated.
pub fn expire_status_effects(effects: &mut Vec<StatusEffect>, now_ticks: u64) -> Vec<u32> {
    let mut removed = Vec::new();
    effects.retain(|e| {
        if e.is_expired(now_ticks) {
            removed.push(e.effect_id);
            false
        } else {
            true
        }
    });
    removed
}

/// Remove every status effect on `effects` whose `cancel_mask` intersects
/// `event` (e.g. `ZONE_CHANGE` on `EnterZone`). Returns the removed effect
/// ids in the order they appeared, same shape as `expire_status_effects`.
pub fn remove_cancelled(effects: &mut Vec<StatusEffect>, event: CancelMask) -> Vec<u32> {
    let mut removed = Vec::new();
    effects.retain(|e| {
        if e.cancels_on(event) {
            removed.push(e.effect_id);
            false
        } else {
            true
        }
    });
    removed
}
