//! The skill-selection engine: `RefreshSkillMap`, `PrepareSkillUsage`, and
//! `SkillAdvance` (§4.5).

use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::config::{Config, DEAGGRO_DISTANCE_MULTIPLIER, MAX_TARGET_RANGE_BASE, MAX_TARGET_RANGE_BUFFER, MAX_TARGET_RANGE_PER_RANGE};
use crate::definitions::{SkillDataStore, SkillDefinition, SkillFamily};
use crate::entity::EntityId;
use crate::geometry::{Geometry, Point};

use super::pathing::chase;
use super::{AIState, AiParams, SkillCategory, SkillId, SkillMap, SkillTypeMask};

/// HP/MP the acting entity currently has, needed to decide affordability
/// and the heal threshold.
#[derive(Debug, Clone, Copy)]
pub struct ResourcePool {
    pub hp: i32,
    pub max_hp: i32,
    pub mp: i32,
    pub max_mp: i32,
}

/// Rebuild `ai.skill_map` and `ai.outclassed_skills` from the entity's
/// current skill list. Idempotent; callers should only invoke this when
/// `ai.skill_map.is_none()` (see `AIState::invalidate_skill_map`).
pub fn refresh_skill_map(ai: &mut AIState, skill_ids: &[SkillId], store: &dyn SkillDataStore, resources: ResourcePool, is_ally: bool, config: &Config) {
    let mut map: SkillMap = HashMap::new();
    let mut defs: HashMap<SkillId, SkillDefinition> = HashMap::new();

    for &id in skill_ids {
        let Some(def) = store.skill(id) else {
            tracing::debug!(skill_id = id, "skill definition missing, skipping");
            continue;
        };
        if def.activation_type != crate::definitions::SkillActivationType::Active {
            continue;
        }
        if matches!(def.family, SkillFamily::Item | SkillFamily::Fusion) {
            continue;
        }
        if !is_ally && (def.targets_party || def.targets_dead) {
            continue;
        }
        let Some(category) = def.category() else { continue };

        if def.cost.bullet_cost > 0 || def.cost.item_cost > 0 {
            continue;
        }
        // "cannot be paid on average": a positive cost that would exceed the
        // entity's entire pool can never be paid regardless of current HP/MP.
        if (def.cost.hp_cost > 0 && def.cost.hp_cost >= resources.max_hp) || (def.cost.mp_cost > 0 && def.cost.mp_cost >= resources.max_mp) {
            continue;
        }

        let mut weight: u16 = if category == SkillCategory::Def { 1 } else { 2 };
        if category != SkillCategory::Def {
            if def.charge_ms == 0 {
                weight += config.skill_weight_charge;
            }
            let free = def.cost.hp_cost == 0 && def.cost.mp_cost == 0 && def.cost.bullet_cost == 0 && def.cost.item_cost == 0;
            if free {
                weight += config.skill_weight_cost;
            }
            if category == SkillCategory::Heal {
                weight += config.skill_weight_heal;
            }
            if category == SkillCategory::Lngr {
                weight += config.skill_weight_range;
            }
        }

        map.entry(category).or_default().push((id, weight));
        defs.insert(id, def);
    }

    let mut outclassed: HashSet<SkillId> = HashSet::new();
    let all: Vec<&SkillDefinition> = defs.values().collect();
    for a in all.iter().filter(|d| d.is_outclass_eligible()) {
        for b in &all {
            if a.id == b.id {
                continue;
            }
            let a_is_heal = a.category() == Some(SkillCategory::Heal);
            let b_is_heal = b.category() == Some(SkillCategory::Heal);
            if a_is_heal != b_is_heal {
                continue;
            }
            let (Some(ad), Some(bd)) = (a.damage, b.damage) else { continue };
            if bd.is_aoe || bd.adds_status_effects {
                continue;
            }
            if ad.formula_id != bd.formula_id {
                continue;
            }
            if bd.modifier1 > ad.modifier1 {
                continue;
            }
            if matches!(a.category(), Some(SkillCategory::Clsr) | Some(SkillCategory::Lngr)) && b.range > a.range {
                continue;
            }
            if b.use_count > a.use_count {
                continue;
            }
            outclassed.insert(b.id);
        }
    }

    ai.skill_map = Some(map);
    ai.outclassed_skills = outclassed;
}

/// Result of `PrepareSkillUsage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// No skill is currently usable; caller should drop aggro (and queue a
    /// `Retreat` if `defensiveDistance > 0`).
    NoUsableSkill,
    /// Chose `skill`, to be used on `target` (`None` for self-targeted
    /// heal/support); `requires_advance` means `SkillAdvance` must run
    /// before the `UseSkill` command is queued.
    Chosen { skill: SkillId, target: Option<EntityId>, requires_advance: bool },
}

/// Build a weighted candidate pool from the cached skill map, filtered by
/// outclass/cooldown/cost/state, and weighted-randomly pick one (§4.5
/// steps 3-6). Assumes `refresh_skill_map` has already been called.
#[allow(clippy::too_many_arguments)]
pub fn prepare_skill_usage(
    ai: &AIState,
    skill_defs: &HashMap<SkillId, SkillDefinition>,
    resources: ResourcePool,
    target: Option<EntityId>,
    cooldowns_until: &HashMap<SkillId, u64>,
    now: u64,
    config: &Config,
) -> PrepareOutcome {
    let Some(map) = &ai.skill_map else { return PrepareOutcome::NoUsableSkill };

    let can_heal = resources.max_hp > 0 && (resources.hp as f64 / resources.max_hp as f64 * 100.0) <= ai.params.heal_threshold_pct as f64;
    let can_fight = target.is_some();
    let can_support = map.get(&SkillCategory::Support).map(|v| !v.is_empty()).unwrap_or(false);

    let mask = ai.params.skill_settings;
    let mut candidates: Vec<(SkillId, u16)> = Vec::new();
    let mut add_if = |category: SkillCategory, allowed: bool, candidates: &mut Vec<(SkillId, u16)>| {
        if !allowed {
            return;
        }
        if let Some(bucket) = map.get(&category) {
            candidates.extend(bucket.iter().copied());
        }
    };
    add_if(SkillCategory::Heal, mask.contains(SkillTypeMask::HEAL) && can_heal, &mut candidates);
    add_if(SkillCategory::Clsr, mask.contains(SkillTypeMask::CLSR) && can_fight, &mut candidates);
    add_if(SkillCategory::Lngr, mask.contains(SkillTypeMask::LNGR) && can_fight, &mut candidates);
    add_if(SkillCategory::Def, mask.contains(SkillTypeMask::DEF) && can_fight, &mut candidates);
    add_if(SkillCategory::Support, mask.contains(SkillTypeMask::SUPPORT) && can_support, &mut candidates);

    let mut usable: Vec<(SkillId, u16, &SkillDefinition)> = Vec::new();
    for (id, weight) in candidates {
        if config.skip_outclassed_skills && ai.outclassed_skills.contains(&id) {
            continue;
        }
        if cooldowns_until.get(&id).map(|&t| t > now).unwrap_or(false) {
            continue;
        }
        let Some(def) = skill_defs.get(&id) else { continue };
        if def.cost.hp_cost > resources.hp || def.cost.mp_cost > resources.mp {
            continue;
        }
        usable.push((id, weight, def));
    }

    if usable.is_empty() {
        return PrepareOutcome::NoUsableSkill;
    }
    usable.sort_by(|a, b| b.1.cmp(&a.1));

    let total_weight: u32 = usable.iter().map(|(_, w, _)| *w as u32).sum();
    let mut roll = if total_weight == 0 { 0 } else { rand::thread_rng().gen_range(0..total_weight) };
    let mut chosen = usable[0];
    for entry in &usable {
        if roll < entry.1 as u32 {
            chosen = *entry;
            break;
        }
        roll -= entry.1 as u32;
    }

    let (skill_id, _, def) = chosen;
    let skill_target = match def.category() {
        Some(SkillCategory::Clsr) | Some(SkillCategory::Lngr) | Some(SkillCategory::Def) => target,
        _ => None,
    };
    PrepareOutcome::Chosen { skill: skill_id, target: skill_target, requires_advance: def.requires_advance() }
}

/// Result of `SkillAdvance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    QueuedMove,
    CouldNotMove,
    AlreadyInRange,
}

/// Move the entity into range of `skill` against a target, queuing a
/// `Chase` command if needed (§4.5 SkillAdvance).
#[allow(clippy::too_many_arguments)]
pub fn skill_advance(
    ai: &mut AIState,
    geometry: Option<&Geometry>,
    disabled: &std::collections::HashSet<u32>,
    from: Point,
    target_id: EntityId,
    target_pos: Point,
    move_speed: f64,
    skill: &SkillDefinition,
) -> AdvanceOutcome {
    let max_target_range = MAX_TARGET_RANGE_BASE + skill.range * MAX_TARGET_RANGE_PER_RANGE;
    let distance = from.distance(target_pos);

    if distance > max_target_range - MAX_TARGET_RANGE_BUFFER {
        let min_distance = if skill.category() == Some(SkillCategory::Lngr) { max_target_range - MAX_TARGET_RANGE_BUFFER } else { 350.0 };
        let max_distance = DEAGGRO_DISTANCE_MULTIPLIER * ai.params.aggro_normal_distance;
        match chase(geometry, disabled, from, target_id, target_pos, move_speed, min_distance, max_distance) {
            Some(command) => {
                ai.commands.push(command);
                AdvanceOutcome::QueuedMove
            }
            None => AdvanceOutcome::CouldNotMove,
        }
    } else {
        AdvanceOutcome::AlreadyInRange
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{SkillActionType, SkillActivationType, SkillCost, SkillDamageInfo};

    struct FixtureStore(HashMap<SkillId, SkillDefinition>);
    impl SkillDataStore for FixtureStore {
        fn skill(&self, id: SkillId) -> Option<SkillDefinition> {
            self.0.get(&id).copied()
        }
    }

    fn heal_skill(id: SkillId, modifier1: i32) -> SkillDefinition {
        SkillDefinition {
            id,
            family: SkillFamily::Normal,
            activation_type: SkillActivationType::Active,
            action_type: SkillActionType::Heal,
            function_id: 1,
            range: 0.0,
            cooldown_ms: 0,
            charge_ms: 0,
            use_count: 1,
            cost: SkillCost { hp_cost: 0, mp_cost: 0, bullet_cost: 0, item_cost: 0 },
            damage: Some(SkillDamageInfo { formula_id: 1, modifier1, modifier2: 0, adds_status_effects: false, is_aoe: false }),
            targets_party: true,
            targets_dead: false,
        }
    }

    fn base_ai() -> AIState {
        AIState::new(
            AiParams {
                aggro_normal_distance: 2000.0,
                aggro_normal_fov: 1.4,
                aggro_night_distance: 2000.0,
                aggro_night_fov: 1.4,
                aggro_cast_distance: 3000.0,
                aggro_cast_fov: 1.4,
                deaggro_distance: 2000.0,
                think_speed_ms: 500,
                aggression: 100,
                aggro_level_limit: 99,
                defensive_distance: 0.0,
                heal_threshold_pct: 50,
                is_boss: false,
                skill_settings: SkillTypeMask::ALL,
                ignores_aggro_limit: false,
            },
            super::super::AIStatus::Combat,
        )
    }

    #[test]
    fn outclass_filtering_chooses_the_stronger_heal_deterministically() {
        let mut ai = base_ai();
        let store = FixtureStore(HashMap::from([(1, heal_skill(1, 100)), (2, heal_skill(2, 50))]));
        let config = Config::default();
        refresh_skill_map(&mut ai, &[1, 2], &store, ResourcePool { hp: 50, max_hp: 100, mp: 50, max_mp: 50 }, true, &config);

        assert!(ai.outclassed_skills.contains(&2));
        assert!(!ai.outclassed_skills.contains(&1));

        let defs: HashMap<SkillId, SkillDefinition> = HashMap::from([(1, heal_skill(1, 100)), (2, heal_skill(2, 50))]);
        let outcome = prepare_skill_usage(&ai, &defs, ResourcePool { hp: 10, max_hp: 100, mp: 50, max_mp: 50 }, None, &HashMap::new(), 0, &config);
        assert_eq!(outcome, PrepareOutcome::Chosen { skill: 1, target: None, requires_advance: false });
    }

    #[test]
    fn no_usable_skill_when_all_on_cooldown() {
        let mut ai = base_ai();
        let store = FixtureStore(HashMap::from([(1, heal_skill(1, 100))]));
        let config = Config::default();
        refresh_skill_map(&mut ai, &[1], &store, ResourcePool { hp: 10, max_hp: 100, mp: 50, max_mp: 50 }, true, &config);
        let defs: HashMap<SkillId, SkillDefinition> = HashMap::from([(1, heal_skill(1, 100))]);
        let mut cooldowns = HashMap::new();
        cooldowns.insert(1, 1000u64);
        let outcome = prepare_skill_usage(&ai, &defs, ResourcePool { hp: 10, max_hp: 100, mp: 50, max_mp: 50 }, None, &cooldowns, 0, &config);
        assert_eq!(outcome, PrepareOutcome::NoUsableSkill);
    }

    #[test]
    fn skill_advance_reports_already_in_range_when_close() {
        let mut ai = base_ai();
        let skill = heal_skill(1, 100);
        let outcome = skill_advance(&mut ai, None, &std::collections::HashSet::new(), Point::new(0.0, 0.0), EntityId(2), Point::new(10.0, 0.0), 100.0, &skill);
        assert_eq!(outcome, AdvanceOutcome::AlreadyInRange);
    }

    #[test]
    fn skill_advance_queues_a_chase_when_far() {
        let mut ai = base_ai();
        let mut skill = heal_skill(1, 100);
        skill.action_type = SkillActionType::Melee;
        let outcome = skill_advance(&mut ai, None, &std::collections::HashSet::new(), Point::new(0.0, 0.0), EntityId(2), Point::new(5000.0, 0.0), 100.0, &skill);
        assert_eq!(outcome, AdvanceOutcome::QueuedMove);
        assert!(ai.commands.head().is_some());
    }
}
