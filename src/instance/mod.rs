//! Per-party private instances: access grants, the zone set an instance
//! owns, and the timer state machine that drives ranked completion and
//! expiry (§4.9).
//!
//! Grounded in the zone registry pattern in `zone::mod` (entities held in a
//! `HashMap` keyed by a process-wide monotonic id) but one layer up: an
//! instance owns a *set* of `ZoneId`s rather than entities directly.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::definitions::{
    ZoneInstanceData, ZoneInstanceDataStore, ZoneInstanceVariantData, ZoneInstanceVariantDataStore,
};
use crate::error::{CoreError, CoreResult};
use crate::protocol::InstanceRank;
use crate::zone::ZoneId;

/// `ZoneInstanceVariantData::kind` doubles as the runtime `InstanceType`:
/// the three variants the timer state machine branches on are exactly the
/// three kinds the data store hands back, so this crate keeps one enum
/// rather than a second copy that could drift from it.
pub use crate::definitions::ZoneInstanceVariantKind as InstanceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

static NEXT_INSTANCE_ID: AtomicU32 = AtomicU32::new(1);

pub fn alloc_instance_id() -> InstanceId {
    InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    NotStarted,
    Running,
    Stopped { success: bool },
    Expired,
}

/// Outcome of stopping or expiring a timer: what packet-producing code
/// needs to report completion, already resolved to a rank/reward where the
/// variant calls for one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionResult {
    pub elapsed_s: u32,
    pub rank: Option<InstanceRank>,
    pub sp_gain: u32,
}

pub struct ZoneInstance {
    pub id: InstanceId,
    pub definition_id: u32,
    pub variant_id: Option<u32>,
    pub variant: Option<ZoneInstanceVariantData>,
    /// For Normal: the time-limit definition id. For DemonOnly: the timer's
    /// color (0 bronze / 1 silver / 2 gold). Unused for TimeTrial.
    pub timer_id: Option<u32>,
    pub expiration_event_id: Option<u32>,

    /// Character ids with a live access grant to this instance, consumed
    /// one at a time as each member's `EnterZone` call lands.
    pub access_cids: HashSet<u32>,
    /// Snapshot of the access set at creation time, used for difficulty
    /// and reward scaling even after members have since left.
    pub original_access_cids: HashSet<u32>,

    pub zone_ids: Vec<ZoneId>,
    /// Where `LeaveZone` sends every connected member once the timer
    /// expires without an explicit stop (§4.9).
    pub lobby_id: u32,

    pub timer_state: TimerState,
    pub timer_start_ticks: Option<u64>,
    pub timer_expire_ticks: Option<u64>,
    pub timer_stop_ticks: Option<u64>,
}

impl ZoneInstance {
    fn party_size(&self) -> u32 {
        self.original_access_cids.len().max(1) as u32
    }

    /// §4.9's `EnterZone` gate: a DemonOnly instance refuses admission
    /// without a living summoned partner demon. Every other variant is
    /// unconditional.
    pub fn requires_living_partner_demon(&self) -> bool {
        matches!(self.variant.as_ref().map(|v| v.kind), Some(InstanceType::DemonOnly))
    }

    /// DemonOnly's effective duration after the per-member reduction.
    /// Reduction is the `floor(base/600)*30` default from the design note;
    /// the distilled spec's "or explicit" clause has no carrier field on
    /// `ZoneInstanceVariantData`, so this crate always uses the computed
    /// default (see DESIGN.md).
    fn demon_only_effective_duration_s(&self, base_s: u32, config: &crate::config::Config) -> u32 {
        let reduction = (base_s / config.demon_only_reduction_divisor_s as u32) * config.demon_only_reduction_step_s as u32;
        let total_reduction = reduction * (self.party_size() - 1);
        base_s.saturating_sub(total_reduction)
    }

    /// Start the timer; ticks are the same microsecond clock `ai::tick`
    /// uses. Returns the scheduled expiry tick for Normal/DemonOnly/
    /// TimeTrial, or `None` if this variant never auto-expires.
    pub fn start_timer(&mut self, now_ticks: u64, config: &crate::config::Config) -> Option<u64> {
        self.timer_state = TimerState::Running;
        self.timer_start_ticks = Some(now_ticks);

        let expire_at = match &self.variant {
            Some(v) => match v.kind {
                InstanceType::TimeTrial => Some(now_ticks + v.time_points[0] as u64 * 1_000_000),
                InstanceType::DemonOnly => {
                    let effective = self.demon_only_effective_duration_s(v.time_points[0], config);
                    Some(now_ticks + effective as u64 * 1_000_000)
                }
                InstanceType::Normal => Some(now_ticks + v.time_points[0] as u64 * 1_000_000),
            },
            None => None,
        };
        self.timer_expire_ticks = expire_at;
        expire_at
    }

    /// Explicit stop (player-triggered success/failure), e.g. reaching a
    /// TimeTrial's goal line or a DemonOnly boss kill.
    pub fn stop_timer(&mut self, now_ticks: u64, success: bool) -> CompletionResult {
        self.timer_state = TimerState::Stopped { success };
        self.timer_stop_ticks = Some(now_ticks);
        self.resolve_completion(now_ticks, success)
    }

    /// Called by the scheduler's deferred-task sweep when `now_ticks` has
    /// reached `timer_expire_ticks`. TimeTrial expiry is always a failure;
    /// Normal/DemonOnly expiry fires the expiration event instead of a
    /// rank (callers read `expiration_event_id` for that).
    pub fn expire(&mut self, now_ticks: u64) -> CompletionResult {
        self.timer_state = TimerState::Expired;
        let success = !matches!(self.variant.as_ref().map(|v| v.kind), Some(InstanceType::TimeTrial));
        self.resolve_completion(now_ticks, success)
    }

    fn resolve_completion(&self, now_ticks: u64, success: bool) -> CompletionResult {
        let elapsed_s = self.timer_start_ticks.map(|start| now_ticks.saturating_sub(start) / 1_000_000).unwrap_or(0) as u32;

        let Some(variant) = &self.variant else {
            return CompletionResult { elapsed_s, rank: None, sp_gain: 0 };
        };

        match variant.kind {
            InstanceType::TimeTrial => {
                let rank = success.then(|| rank_for_time_trial(elapsed_s, &variant.time_points)).flatten();
                CompletionResult { elapsed_s, rank, sp_gain: 0 }
            }
            InstanceType::DemonOnly => {
                if !success {
                    return CompletionResult { elapsed_s, rank: None, sp_gain: 0 };
                }
                let effective = self.timer_expire_ticks.zip(self.timer_start_ticks).map(|(e, s)| (e - s) / 1_000_000).unwrap_or(0) as u32;
                let leftover = effective.saturating_sub(elapsed_s);
                let rank = rank_for_demon_only(leftover, &variant.time_points);
                let sp_gain = demon_only_sp_gain(leftover, effective, variant.fixed_reward, variant.reward_modifier, self.party_size());
                CompletionResult { elapsed_s, rank: Some(rank), sp_gain }
            }
            InstanceType::Normal => CompletionResult { elapsed_s, rank: None, sp_gain: 0 },
        }
    }
}

/// TimeTrial rank: shortest elapsed time wins against breakpoints
/// `timePoints[1..3]`; `None` means the run didn't qualify for any rank.
fn rank_for_time_trial(elapsed_s: u32, time_points: &[u32; 4]) -> Option<InstanceRank> {
    if elapsed_s <= time_points[1] {
        Some(InstanceRank::A)
    } else if elapsed_s <= time_points[2] {
        Some(InstanceRank::B)
    } else if elapsed_s <= time_points[3] {
        Some(InstanceRank::C)
    } else {
        None
    }
}

/// DemonOnly rank: A if leftover time beats breakpoint 1, B if it beats
/// breakpoint 2, C otherwise.
fn rank_for_demon_only(leftover_s: u32, time_points: &[u32; 4]) -> InstanceRank {
    if leftover_s > time_points[1] {
        InstanceRank::A
    } else if leftover_s > time_points[2] {
        InstanceRank::B
    } else {
        InstanceRank::C
    }
}

/// Base `fixedReward` plus a bonus scaled by leftover time and party size,
/// per the worked scenario (leftover 0 still pays the full `fixedReward`;
/// the proportional part is a bonus on top, not the whole award).
fn demon_only_sp_gain(leftover_s: u32, effective_duration_s: u32, fixed_reward: u32, reward_modifier: f64, party_size: u32) -> u32 {
    if effective_duration_s == 0 || reward_modifier == 0.0 {
        return fixed_reward;
    }
    let proportion = leftover_s as f64 / effective_duration_s as f64;
    let party_boost = 1.0 + 0.1 * (party_size.saturating_sub(1)) as f64;
    let bonus = (reward_modifier * party_boost * proportion).ceil();
    fixed_reward + bonus as u32
}

/// Owns every live instance plus the pending access grants `CreateInstance`
/// registers and `EnterZone` consumes. Sits behind one mutex in
/// `scheduler::Scheduler`, per §5's ordering rule (never held while a
/// zone's own lock is held).
#[derive(Default)]
pub struct InstanceRegistry {
    instances: std::collections::HashMap<InstanceId, ZoneInstance>,
    pending_access: std::collections::HashMap<u32, InstanceId>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: InstanceId) -> Option<&ZoneInstance> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut ZoneInstance> {
        self.instances.get_mut(&id)
    }

    /// `CreateInstance`: validate the instance definition, build the
    /// `ZoneInstance`, and register an access grant for every member of
    /// `access_cids`.
    pub fn create_instance(
        &mut self,
        zone_data: &dyn ZoneInstanceDataStore,
        variant_data: &dyn ZoneInstanceVariantDataStore,
        instance_def_id: u32,
        variant_id: Option<u32>,
        timer_id: Option<u32>,
        expiration_event_id: Option<u32>,
        access_cids: HashSet<u32>,
    ) -> CoreResult<InstanceId> {
        let Some(ZoneInstanceData { lobby_id, zone_ids, .. }) = zone_data.zone_instance(instance_def_id) else {
            tracing::error!(instance_def_id, "instance creation rejected");
            return Err(CoreError::InstanceRejected("unknown instance definition"));
        };

        let variant = match variant_id {
            Some(vid) => match variant_data.variant(vid) {
                Some(v) => Some(v),
                None => {
                    tracing::error!(instance_def_id, variant_id = vid, "instance creation rejected");
                    return Err(CoreError::InstanceRejected("unknown instance variant"));
                }
            },
            None => None,
        };

        let id = alloc_instance_id();
        let instance = ZoneInstance {
            id,
            definition_id: instance_def_id,
            variant_id,
            variant,
            timer_id,
            expiration_event_id,
            access_cids: access_cids.clone(),
            original_access_cids: access_cids.clone(),
            zone_ids: zone_ids.into_iter().map(ZoneId).collect(),
            lobby_id,
            timer_state: TimerState::NotStarted,
            timer_start_ticks: None,
            timer_expire_ticks: None,
            timer_stop_ticks: None,
        };
        for cid in &access_cids {
            self.pending_access.insert(*cid, id);
        }
        self.instances.insert(id, instance);
        Ok(id)
    }

    /// Consume `cid`'s access grant on `EnterZone`, returning the instance
    /// it pointed to. Subsequent calls for the same `cid` return `None`
    /// until a new grant is created.
    pub fn consume_access(&mut self, cid: u32) -> Option<InstanceId> {
        self.pending_access.remove(&cid)
    }

    /// Look up `cid`'s pending access grant without consuming it, so an
    /// `EnterZone` gate can be checked before the grant is spent.
    pub fn peek_access(&self, cid: u32) -> Option<InstanceId> {
        self.pending_access.get(&cid).copied()
    }

    /// User-facing "leave access": revoke the grant without touching a
    /// live instance the character may already be inside.
    pub fn revoke_access(&mut self, cid: u32) {
        self.pending_access.remove(&cid);
    }

    /// Teardown: called once a zone transitions to empty; if every zone the
    /// owning instance owns is also empty (per `remaining_live_zones`),
    /// erase the instance and any access mappings still pointing at it.
    pub fn teardown_if_empty(&mut self, id: InstanceId, remaining_live_zones: usize) -> bool {
        if remaining_live_zones > 0 {
            return false;
        }
        self.pending_access.retain(|_, instance_id| *instance_id != id);
        self.instances.remove(&id);
        true
    }
}
