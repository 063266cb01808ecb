//! Capacity enforcement: squadron caps, fighter garrisons, Planet-Breaker
//! limits, and the Space Guild's forced divestiture.
//!
//! Runs in the Income Phase after maintenance, because infrastructure may
//! have dropped since last turn. Capital over-cap is seized immediately
//! with a half-price payment; total-squadron and fighter over-caps get a
//! grace period before escorts are disbanded without refund.

use crate::config::GameConfig;
use crate::event::{
    CapacityCategory, CapacitySeverity, CapacityViolation, GameEvent,
};
use crate::ids::{ColonyId, FleetId, HouseId, SquadronId};
use crate::state::GameState;
use crate::unit::ShipClass;

/// Capital squadron cap: `max(8, IU/100 * 2 * mapMul)`.
pub fn capital_cap(config: &GameConfig, total_iu: u32) -> u32 {
    (total_iu / 100 * 2 * config.setup.map_multiplier).max(8)
}

/// Total squadron cap: `max(20, IU/50 * mapMul)`.
pub fn total_cap(config: &GameConfig, total_iu: u32) -> u32 {
    (total_iu / 50 * config.setup.map_multiplier).max(20)
}

/// Fighter cap per colony: `IU/100 * FD multiplier`.
pub fn fighter_cap(config: &GameConfig, colony_iu: u32) -> u32 {
    colony_iu / 100 * config.setup.fighter_cap_multiplier
}

fn total_infrastructure(state: &GameState, house: HouseId) -> u32 {
    state
        .owned_colony_ids(house)
        .iter()
        .filter_map(|id| state.colony(*id))
        .map(|c| c.infrastructure)
        .sum()
}

/// All squadrons of a house, with fleet, capital flag, and attack strength.
fn house_squadrons(
    state: &GameState,
    config: &GameConfig,
    house: HouseId,
) -> Vec<(FleetId, SquadronId, bool, u32)> {
    let mut out = Vec::new();
    for fleet_id in state.owned_fleet_ids(house) {
        if let Some(fleet) = state.fleet(fleet_id) {
            for squadron in &fleet.squadrons {
                out.push((
                    fleet_id,
                    squadron.id,
                    squadron.is_capital(config),
                    squadron.attack_strength(config),
                ));
            }
        }
    }
    out
}

fn remove_squadron(state: &mut GameState, fleet_id: FleetId, squadron_id: SquadronId) {
    let mut now_empty = false;
    if let Some(fleet) = state.fleet_mut(fleet_id) {
        fleet.squadrons.retain(|s| s.id != squadron_id);
        now_empty = fleet.is_empty();
    }
    if now_empty {
        state.remove_fleet(fleet_id);
    }
}

/// Run every capacity check for every living house.
pub fn enforce(state: &mut GameState, config: &GameConfig, events: &mut Vec<GameEvent>) {
    for house in state.living_houses() {
        enforce_capitals(state, config, house, events);
        enforce_total_squadrons(state, config, house, events);
        enforce_fighters(state, config, house, events);
        enforce_planet_breakers(state, config, house, events);
    }
}

/// Capitals over cap are seized by the Space Guild at once; the house is
/// paid half the original production cost per squadron.
fn enforce_capitals(
    state: &mut GameState,
    config: &GameConfig,
    house: HouseId,
    events: &mut Vec<GameEvent>,
) {
    let cap = capital_cap(config, total_infrastructure(state, house));
    let mut capitals: Vec<(FleetId, SquadronId, bool, u32)> =
        house_squadrons(state, config, house)
            .into_iter()
            .filter(|(_, _, is_capital, _)| *is_capital)
            .collect();
    let count = capitals.len() as u32;
    if count <= cap {
        return;
    }
    let excess = count - cap;
    events.push(GameEvent::CapacityExceeded {
        violation: CapacityViolation {
            house,
            category: CapacityCategory::CapitalSquadrons,
            current: count,
            max: cap,
            excess,
            severity: CapacitySeverity::Enforced,
            grace_remaining: None,
        },
    });

    // Lowest attack strength goes first.
    capitals.sort_by_key(|&(_, id, _, strength)| (strength, id));
    for &(fleet_id, squadron_id, _, _) in capitals.iter().take(excess as usize) {
        let build_cost = state
            .fleet(fleet_id)
            .and_then(|f| f.squadron(squadron_id))
            .map(|s| s.total_build_cost(config))
            .unwrap_or(0);
        let payment = build_cost * config.economy.seizure_payment_pct / 100;
        remove_squadron(state, fleet_id, squadron_id);
        state.credit_treasury(house, payment);
        events.push(GameEvent::CapitalShipSeized {
            house,
            squadron: squadron_id,
            payment,
        });
    }
}

/// Total squadrons get a grace period; once it lapses, the weakest
/// non-capital squadrons are disbanded without refund.
fn enforce_total_squadrons(
    state: &mut GameState,
    config: &GameConfig,
    house: HouseId,
    events: &mut Vec<GameEvent>,
) {
    let cap = total_cap(config, total_infrastructure(state, house));
    let squadrons = house_squadrons(state, config, house);
    let count = squadrons.len() as u32;

    if count <= cap {
        if let Some(tracker) = state.grace_timers.get_mut(&house) {
            tracker.total_squadrons = None;
        }
        return;
    }

    let tracker = state.grace_timers.entry(house).or_default();
    let remaining = match tracker.total_squadrons {
        None => {
            tracker.total_squadrons = Some(config.setup.capacity_grace_turns);
            config.setup.capacity_grace_turns
        }
        Some(r) => r,
    };

    if remaining > 0 {
        events.push(GameEvent::CapacityExceeded {
            violation: CapacityViolation {
                house,
                category: CapacityCategory::TotalSquadrons,
                current: count,
                max: cap,
                excess: count - cap,
                severity: CapacitySeverity::Warning,
                grace_remaining: Some(remaining),
            },
        });
        return;
    }

    let excess = count - cap;
    events.push(GameEvent::CapacityExceeded {
        violation: CapacityViolation {
            house,
            category: CapacityCategory::TotalSquadrons,
            current: count,
            max: cap,
            excess,
            severity: CapacitySeverity::Enforced,
            grace_remaining: Some(0),
        },
    });

    // Weakest escorts first; capitals only if escorts run out.
    let mut ordered = squadrons;
    ordered.sort_by_key(|&(_, id, is_capital, strength)| (is_capital, strength, id));
    for &(fleet_id, squadron_id, _, _) in ordered.iter().take(excess as usize) {
        remove_squadron(state, fleet_id, squadron_id);
        events.push(GameEvent::SquadronDisbanded {
            house,
            squadron: squadron_id,
        });
    }
    if let Some(tracker) = state.grace_timers.get_mut(&house) {
        tracker.total_squadrons = None;
    }
}

/// Fighters per colony get a grace period; oldest squadrons are disbanded
/// once it lapses.
fn enforce_fighters(
    state: &mut GameState,
    config: &GameConfig,
    house: HouseId,
    events: &mut Vec<GameEvent>,
) {
    for colony_id in state.owned_colony_ids(house) {
        let Some((count, cap)) = state
            .colony(colony_id)
            .map(|c| (c.fighters.len() as u32, fighter_cap(config, c.infrastructure)))
        else {
            continue;
        };

        if count <= cap {
            if let Some(tracker) = state.grace_timers.get_mut(&house) {
                tracker.fighters.remove(&colony_id);
            }
            continue;
        }

        let tracker = state.grace_timers.entry(house).or_default();
        let remaining = *tracker
            .fighters
            .entry(colony_id)
            .or_insert(config.setup.capacity_grace_turns);

        if remaining > 0 {
            events.push(GameEvent::CapacityExceeded {
                violation: CapacityViolation {
                    house,
                    category: CapacityCategory::FightersPerColony,
                    current: count,
                    max: cap,
                    excess: count - cap,
                    severity: CapacitySeverity::Warning,
                    grace_remaining: Some(remaining),
                },
            });
            continue;
        }

        let excess = count - cap;
        events.push(GameEvent::CapacityExceeded {
            violation: CapacityViolation {
                house,
                category: CapacityCategory::FightersPerColony,
                current: count,
                max: cap,
                excess,
                severity: CapacitySeverity::Enforced,
                grace_remaining: Some(0),
            },
        });
        if let Some(colony) = state.colony_mut(colony_id) {
            // Oldest hulls carry the lowest IDs.
            colony.fighters.sort_by_key(|f| f.id);
            colony.fighters.drain(..excess as usize);
        }
        events.push(GameEvent::FightersDisbanded {
            colony: colony_id,
            count: excess,
        });
        if let Some(tracker) = state.grace_timers.get_mut(&house) {
            tracker.fighters.remove(&colony_id);
        }
    }
}

/// One Planet-Breaker per owned colony, enforced immediately.
fn enforce_planet_breakers(
    state: &mut GameState,
    config: &GameConfig,
    house: HouseId,
    events: &mut Vec<GameEvent>,
) {
    let allowed = state.owned_colony_ids(house).len() as u32;
    let mut breakers: Vec<(FleetId, SquadronId)> = Vec::new();
    for fleet_id in state.owned_fleet_ids(house) {
        if let Some(fleet) = state.fleet(fleet_id) {
            for squadron in &fleet.squadrons {
                if squadron.flagship.class == ShipClass::PlanetBreaker {
                    breakers.push((fleet_id, squadron.id));
                }
            }
        }
    }
    let count = breakers.len() as u32;
    if count <= allowed {
        return;
    }
    let excess = (count - allowed) as usize;
    events.push(GameEvent::CapacityExceeded {
        violation: CapacityViolation {
            house,
            category: CapacityCategory::PlanetBreakers,
            current: count,
            max: allowed,
            excess: excess as u32,
            severity: CapacitySeverity::Enforced,
            grace_remaining: None,
        },
    });
    // Newest hulls scrap first.
    breakers.sort_by_key(|&(_, id)| std::cmp::Reverse(id));
    for &(fleet_id, squadron_id) in breakers.iter().take(excess) {
        remove_squadron(state, fleet_id, squadron_id);
        events.push(GameEvent::PlanetBreakerScrapped {
            house,
            fleet: fleet_id,
        });
    }
}

/// Advance grace timers one turn. Called at the end of the Income Phase.
pub fn tick_grace_timers(state: &mut GameState) {
    for tracker in state.grace_timers.values_mut() {
        if let Some(remaining) = tracker.total_squadrons.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        for remaining in tracker.fighters.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }
}
