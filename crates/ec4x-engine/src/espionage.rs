//! Space-Guild espionage: EBP-funded operations, detection, and ongoing
//! effect lifecycles.
//!
//! Operations resolve during the Conflict Phase in prestige-ranked house
//! order (dishonored houses last). Each operation debits the actor's EBP
//! pool, runs a detection roll against the target's counter-intelligence,
//! and on success applies an immediate effect or starts an ongoing one.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::dice::{DeterministicRng, OpKind};
use crate::event::GameEvent;
use crate::house::TechField;
use crate::ids::HouseId;
use crate::intel::IntelligenceReport;
use crate::order::EspionageAction;
use crate::state::GameState;

/// Kinds of persistent espionage effect.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum EffectKind {
    /// Intel the target receives about the actor is perturbed.
    Disinformation,
    /// Target colony production suffers while active.
    ProductionSiphon,
    /// Target bleeds prestige each turn.
    Psyops,
    /// Target's detection rolls are penalized.
    CyberDisruption,
    /// Actor gains a detection bonus against the target.
    AgentNetwork,
}

impl EffectKind {
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Disinformation => "Disinformation",
            EffectKind::ProductionSiphon => "ProductionSiphon",
            EffectKind::Psyops => "Psyops",
            EffectKind::CyberDisruption => "CyberDisruption",
            EffectKind::AgentNetwork => "AgentNetwork",
        }
    }
}

/// A running espionage effect with a turn timer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OngoingEffect {
    pub kind: EffectKind,
    pub actor: HouseId,
    pub target: HouseId,
    pub turns_remaining: u32,
}

/// Whether an active effect of `kind` by `actor` targets `target`.
pub fn effect_active(state: &GameState, kind: EffectKind, actor: HouseId, target: HouseId) -> bool {
    state
        .ongoing_effects
        .iter()
        .any(|e| e.kind == kind && e.actor == actor && e.target == target)
}

/// Whether any active effect of `kind` targets `target`.
pub fn any_effect_on(state: &GameState, kind: EffectKind, target: HouseId) -> bool {
    state
        .ongoing_effects
        .iter()
        .any(|e| e.kind == kind && e.target == target)
}

/// EBP cost of an operation.
pub fn operation_cost(config: &GameConfig, action: &EspionageAction) -> u32 {
    match action {
        EspionageAction::TechTheft { .. }
        | EspionageAction::SabotageHigh { .. }
        | EspionageAction::Assassination { .. }
        | EspionageAction::IntelligenceTheft { .. } => config.espionage.high_op_cost,
        _ => config.espionage.low_op_cost,
    }
}

/// Houses ordered for espionage priority: prestige descending, dishonored
/// houses pushed to the back, remaining ties broken by the turn's
/// tiebreaker stream.
pub fn priority_order(state: &GameState) -> Vec<HouseId> {
    let mut rng = DeterministicRng::for_op(state.seed, state.turn, OpKind::Tiebreak, 0xE5);
    let mut keyed: Vec<(bool, i32, u32, HouseId)> = state
        .houses
        .values()
        .filter(|h| !h.eliminated)
        .map(|h| (h.dishonored, -h.prestige, rng.range_u32(0, u32::MAX - 1), h.id))
        .collect();
    keyed.sort();
    keyed.into_iter().map(|(_, _, _, id)| id).collect()
}

/// Run every Guild operation for one house, in submitted order.
pub fn execute_guild_operations(
    state: &mut GameState,
    config: &GameConfig,
    actor: HouseId,
    actions: &[EspionageAction],
    events: &mut Vec<GameEvent>,
) {
    for (idx, action) in actions.iter().enumerate() {
        execute_operation(state, config, actor, action, idx as u64, events);
    }
}

fn execute_operation(
    state: &mut GameState,
    config: &GameConfig,
    actor: HouseId,
    action: &EspionageAction,
    sequence: u64,
    events: &mut Vec<GameEvent>,
) {
    let cost = operation_cost(config, action);
    {
        let Some(house) = state.houses.get_mut(&actor) else {
            return;
        };
        if house.ebp < cost {
            events.push(GameEvent::OrderFailed {
                house: actor,
                fleet: None,
                order: action.name().to_string(),
                reason: format!("insufficient EBP: need {cost}, have {}", house.ebp),
            });
            return;
        }
        house.ebp -= cost;
        house.tallies.attempts += 1;
    }

    // CounterIntelSweep is self-targeted: purge hostile networks and
    // disinformation aimed at the actor.
    let Some(target) = action.target() else {
        let before = state.ongoing_effects.len();
        state.ongoing_effects.retain(|e| {
            !(e.target == actor
                && matches!(e.kind, EffectKind::AgentNetwork | EffectKind::Disinformation))
        });
        let purged = before - state.ongoing_effects.len();
        if let Some(house) = state.houses.get_mut(&actor) {
            house.cip = house.cip.saturating_add(cost / 2);
            house.tallies.successes += 1;
        }
        events.push(GameEvent::EspionageSuccess {
            actor,
            target: actor,
            operation: format!("{} ({} hostile effects purged)", action.name(), purged),
        });
        return;
    };

    if target == actor || !state.houses.contains_key(&target) {
        events.push(GameEvent::OrderFailed {
            house: actor,
            fleet: None,
            order: action.name().to_string(),
            reason: "invalid espionage target".into(),
        });
        return;
    }

    if detection_roll(state, config, actor, target, sequence) {
        on_detected(state, config, actor, target, action, events);
        return;
    }

    apply_success(state, config, actor, target, action, events);
}

/// Detection: d20 + target CIC level + CIP bonus - actor advantages,
/// against the configured threshold.
fn detection_roll(
    state: &GameState,
    config: &GameConfig,
    actor: HouseId,
    target: HouseId,
    sequence: u64,
) -> bool {
    let stream = (u64::from(actor.0) << 40) | (u64::from(target.0) << 16) | sequence;
    let mut rng = DeterministicRng::for_op(state.seed, state.turn, OpKind::Espionage, stream);

    let target_house = &state.houses[&target];
    let cic = target_house.tech.level(TechField::CounterIntel) as i32;
    let cip_bonus = (target_house.cip / config.espionage.cip_divisor.max(1)) as i32;

    let mut modifier = cic + cip_bonus;
    if effect_active(state, EffectKind::AgentNetwork, actor, target) {
        modifier -= 3;
    }
    if any_effect_on(state, EffectKind::CyberDisruption, target) {
        modifier -= 2;
    }

    rng.roll_d20() + modifier >= config.espionage.detection_threshold
}

fn on_detected(
    state: &mut GameState,
    config: &GameConfig,
    actor: HouseId,
    target: HouseId,
    action: &EspionageAction,
    events: &mut Vec<GameEvent>,
) {
    if let Some(house) = state.houses.get_mut(&actor) {
        house.tallies.losses += 1;
        house.dishonored = true;
    }
    state.award_prestige(
        actor,
        config.prestige.espionage_detected,
        "Espionage operation exposed",
        events,
    );
    events.push(GameEvent::EspionageDetected {
        actor,
        target,
        operation: action.name().to_string(),
    });
}

fn apply_success(
    state: &mut GameState,
    config: &GameConfig,
    actor: HouseId,
    target: HouseId,
    action: &EspionageAction,
    events: &mut Vec<GameEvent>,
) {
    let duration = config.espionage.effect_duration;
    match action {
        EspionageAction::TechTheft { field, .. } => {
            let target_level = state.houses[&target].tech.level(*field);
            let Some(house) = state.houses.get_mut(&actor) else {
                return;
            };
            let own_level = house.tech.level(*field);
            if target_level > own_level {
                house.tech.levels.insert(*field, own_level + 1);
                events.push(GameEvent::TechAdvanced {
                    house: actor,
                    field: *field,
                    level: own_level + 1,
                });
            } else {
                // Nothing worth stealing; bank the groundwork as RP.
                *house.tech.accumulated_rp.entry(*field).or_insert(0) +=
                    config.economy.rp_per_tech_level / 4;
            }
        }
        EspionageAction::SabotageLow { .. } => {
            if let Some(colony_id) = richest_colony(state, target) {
                let iu = config.espionage.sabotage_low_iu;
                if let Some(colony) = state.colonies.get_mut(&colony_id) {
                    colony.infrastructure = colony.infrastructure.saturating_sub(iu);
                }
            }
        }
        EspionageAction::SabotageHigh { .. } => {
            let field = sabotage_field(state, target);
            if let Some(house) = state.houses.get_mut(&target) {
                house.tech.downgrade(field);
                let level = house.tech.level(field);
                events.push(GameEvent::TechSabotaged {
                    house: target,
                    field,
                    level,
                });
            }
        }
        EspionageAction::Assassination { .. } => {
            state.award_prestige(target, -15, "Court assassination", events);
        }
        EspionageAction::EconomicManipulation { .. } => {
            push_effect(state, EffectKind::ProductionSiphon, actor, target, duration);
        }
        EspionageAction::CyberAttack { .. } => {
            push_effect(state, EffectKind::CyberDisruption, actor, target, duration);
            // Cripple a starbase at the richest colony, if one stands.
            if let Some(colony_id) = richest_colony(state, target) {
                if let Some(colony) = state.colonies.get_mut(&colony_id) {
                    if let Some(base) = colony.starbases.iter_mut().find(|s| !s.crippled) {
                        base.crippled = true;
                    }
                }
            }
        }
        EspionageAction::PsyopsCampaign { .. } => {
            push_effect(state, EffectKind::Psyops, actor, target, duration);
        }
        EspionageAction::IntelligenceTheft { .. } => {
            let stolen: Vec<IntelligenceReport> = state.houses[&target]
                .intel_reports
                .iter()
                .rev()
                .take(5)
                .cloned()
                .collect();
            if let Some(house) = state.houses.get_mut(&actor) {
                house.intel_reports.extend(stolen);
            }
        }
        EspionageAction::PlantDisinformation { .. } => {
            push_effect(state, EffectKind::Disinformation, actor, target, duration);
        }
        EspionageAction::RecruitAgent { .. } => {
            push_effect(state, EffectKind::AgentNetwork, actor, target, duration * 2);
        }
        // Self-targeted; resolved before the detection roll.
        EspionageAction::CounterIntelSweep => {}
    }

    if let Some(house) = state.houses.get_mut(&actor) {
        house.tallies.successes += 1;
    }
    state.award_prestige(
        actor,
        config.prestige.espionage_success,
        "Espionage operation succeeded",
        events,
    );
    events.push(GameEvent::EspionageSuccess {
        actor,
        target,
        operation: action.name().to_string(),
    });
}

fn push_effect(
    state: &mut GameState,
    kind: EffectKind,
    actor: HouseId,
    target: HouseId,
    turns: u32,
) {
    // Refresh rather than stack an identical effect.
    if let Some(existing) = state
        .ongoing_effects
        .iter_mut()
        .find(|e| e.kind == kind && e.actor == actor && e.target == target)
    {
        existing.turns_remaining = existing.turns_remaining.max(turns);
        return;
    }
    state.ongoing_effects.push(OngoingEffect {
        kind,
        actor,
        target,
        turns_remaining: turns,
    });
}

/// The target house's highest-infrastructure colony.
fn richest_colony(state: &GameState, house: HouseId) -> Option<crate::ids::ColonyId> {
    state
        .owned_colony_ids(house)
        .into_iter()
        .filter_map(|id| state.colony(id).map(|c| (c.infrastructure, id)))
        .max()
        .map(|(_, id)| id)
}

/// Pick the field high sabotage hits: the target's best.
fn sabotage_field(state: &GameState, target: HouseId) -> TechField {
    let tech = &state.houses[&target].tech;
    TechField::all()
        .iter()
        .copied()
        .max_by_key(|&f| tech.level(f))
        .unwrap_or(TechField::Weapons)
}

/// Advance every effect timer by one turn, expiring finished effects.
/// Called once per turn from the Income Phase.
pub fn tick_effects(state: &mut GameState, config: &GameConfig, events: &mut Vec<GameEvent>) {
    // Psyops drains while active.
    let drains: Vec<HouseId> = state
        .ongoing_effects
        .iter()
        .filter(|e| e.kind == EffectKind::Psyops)
        .map(|e| e.target)
        .collect();
    for target in drains {
        state.award_prestige(
            target,
            -config.espionage.psyops_drain,
            "Psyops campaign",
            events,
        );
    }

    for effect in &mut state.ongoing_effects {
        effect.turns_remaining = effect.turns_remaining.saturating_sub(1);
    }
    let expired: Vec<(HouseId, &'static str)> = state
        .ongoing_effects
        .iter()
        .filter(|e| e.turns_remaining == 0)
        .map(|e| (e.target, e.kind.name()))
        .collect();
    for (target, effect) in expired {
        events.push(GameEvent::EffectExpired {
            target,
            effect: effect.to_string(),
        });
    }
    state.ongoing_effects.retain(|e| e.turns_remaining > 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::house::House;
    use crate::ids::SystemId;
    use crate::starmap::{PlanetClass, ResourceRating, StarMap, System};

    fn two_house_state() -> GameState {
        let systems = vec![System {
            id: SystemId(0),
            name: "Home".into(),
            planet_class: PlanetClass::Benign,
            resource_rating: ResourceRating::Abundant,
        }];
        let mut state = GameState::new(7, StarMap::new(systems, vec![]));
        let mut a = House::new(HouseId(0), "A".into(), 100);
        a.ebp = 100;
        state.houses.insert(HouseId(0), a);
        state
            .houses
            .insert(HouseId(1), House::new(HouseId(1), "B".into(), 100));
        state
    }

    #[test]
    fn test_insufficient_ebp_fails_locally() {
        let mut state = two_house_state();
        state.houses.get_mut(&HouseId(0)).unwrap().ebp = 0;
        let config = GameConfig::standard();
        let mut events = Vec::new();
        execute_guild_operations(
            &mut state,
            &config,
            HouseId(0),
            &[EspionageAction::PsyopsCampaign { target: HouseId(1) }],
            &mut events,
        );
        assert!(matches!(events[0], GameEvent::OrderFailed { .. }));
        assert!(state.ongoing_effects.is_empty());
    }

    #[test]
    fn test_operation_debits_pool() {
        let mut state = two_house_state();
        let config = GameConfig::standard();
        let mut events = Vec::new();
        execute_guild_operations(
            &mut state,
            &config,
            HouseId(0),
            &[EspionageAction::PsyopsCampaign { target: HouseId(1) }],
            &mut events,
        );
        assert_eq!(
            state.houses[&HouseId(0)].ebp,
            100 - config.espionage.low_op_cost
        );
        assert_eq!(state.houses[&HouseId(0)].tallies.attempts, 1);
    }

    #[test]
    fn test_effects_expire() {
        let mut state = two_house_state();
        let config = GameConfig::standard();
        state.ongoing_effects.push(OngoingEffect {
            kind: EffectKind::Disinformation,
            actor: HouseId(0),
            target: HouseId(1),
            turns_remaining: 1,
        });
        let mut events = Vec::new();
        tick_effects(&mut state, &config, &mut events);
        assert!(state.ongoing_effects.is_empty());
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::EffectExpired { .. })));
    }

    #[test]
    fn test_counter_intel_sweep_purges() {
        let mut state = two_house_state();
        let config = GameConfig::standard();
        state.ongoing_effects.push(OngoingEffect {
            kind: EffectKind::AgentNetwork,
            actor: HouseId(1),
            target: HouseId(0),
            turns_remaining: 5,
        });
        let mut events = Vec::new();
        execute_guild_operations(
            &mut state,
            &config,
            HouseId(0),
            &[EspionageAction::CounterIntelSweep],
            &mut events,
        );
        assert!(state.ongoing_effects.is_empty());
    }

    #[test]
    fn test_priority_order_is_deterministic() {
        let mut state = two_house_state();
        state.houses.get_mut(&HouseId(1)).unwrap().prestige = 50;
        let first = priority_order(&state);
        let second = priority_order(&state);
        assert_eq!(first, second);
        // Higher prestige goes first.
        assert_eq!(first[0], HouseId(1));
    }

    #[test]
    fn test_dishonored_sorts_last() {
        let mut state = two_house_state();
        state.houses.get_mut(&HouseId(0)).unwrap().prestige = 500;
        state.houses.get_mut(&HouseId(0)).unwrap().dishonored = true;
        let order = priority_order(&state);
        assert_eq!(order.last(), Some(&HouseId(0)));
    }
}
