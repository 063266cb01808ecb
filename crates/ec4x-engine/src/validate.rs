//! Order admission validation.
//!
//! First of the two validation stages: syntax and current-state checks at
//! packet submission time. Orders rejected here never enter the stored
//! command tables. Execution-time revalidation happens in the phase
//! drivers, because the world changes between admission and execution.

use crate::colony::ProjectKind;
use crate::config::GameConfig;
use crate::error::EngineError;
use crate::ids::{ColonyId, FleetId, HouseId};
use crate::order::{
    BuildOrder, ColonyDirective, DiplomaticAction, EspionageAction, FleetOrder,
    PopulationTransfer,
};
use crate::state::GameState;
use crate::unit::ShipClass;
use crate::{capacity, fleet::FleetStatus};

fn reject(reason: impl Into<String>) -> EngineError {
    EngineError::OrderRejected {
        reason: reason.into(),
    }
}

/// Validate one fleet order for admission.
pub fn fleet_order(
    state: &GameState,
    config: &GameConfig,
    house: HouseId,
    fleet_id: FleetId,
    order: &FleetOrder,
) -> Result<(), EngineError> {
    let Some(fleet) = state.fleet(fleet_id) else {
        return Err(reject(format!("{fleet_id} does not exist")));
    };
    if fleet.owner != house {
        return Err(reject(format!("{fleet_id} is not yours to command")));
    }
    if fleet.status == FleetStatus::Mothballed && !matches!(order, FleetOrder::Reactivate) {
        return Err(reject("mothballed fleets can only be reactivated"));
    }

    match *order {
        FleetOrder::Hold | FleetOrder::SeekHome | FleetOrder::Reactivate => {}
        FleetOrder::Move { to }
        | FleetOrder::Patrol { system: to }
        | FleetOrder::SpySystem { system: to }
        | FleetOrder::View { system: to }
        | FleetOrder::Blockade { system: to } => {
            if !state.star_map.contains(to) {
                return Err(reject(format!("{to} is not on the star map")));
            }
        }
        FleetOrder::GuardStarbase => {
            let guarded = state
                .colony_at(fleet.location)
                .map(|c| c.owner == house && !c.starbases.is_empty())
                .unwrap_or(false);
            if !guarded {
                return Err(reject("no friendly starbase here to guard"));
            }
        }
        FleetOrder::GuardColony => {
            let friendly = state
                .colony_at(fleet.location)
                .map(|c| c.owner == house)
                .unwrap_or(false);
            if !friendly {
                return Err(reject("no friendly colony here to guard"));
            }
        }
        FleetOrder::Bombard { colony }
        | FleetOrder::Invade { colony }
        | FleetOrder::Blitz { colony }
        | FleetOrder::SpyPlanet { colony }
        | FleetOrder::HackStarbase { colony } => {
            let Some(target) = state.colony(colony) else {
                return Err(reject(format!("{colony} does not exist")));
            };
            if target.owner == house
                && matches!(
                    order,
                    FleetOrder::Bombard { .. } | FleetOrder::Invade { .. } | FleetOrder::Blitz { .. }
                )
            {
                return Err(reject("cannot assault your own colony"));
            }
            if matches!(order, FleetOrder::Invade { .. } | FleetOrder::Blitz { .. })
                && fleet.embarked_marines() == 0
            {
                return Err(reject("no marines embarked for the landing"));
            }
        }
        FleetOrder::Colonize { system } => {
            if !state.star_map.contains(system) {
                return Err(reject(format!("{system} is not on the star map")));
            }
            if state.colony_at(system).is_some() {
                return Err(reject("target system is already colonized"));
            }
            let has_seed_ptu = fleet
                .spacelift
                .iter()
                .any(|s| config.ship(s.class).spacelift_ptu > 0 && s.cargo.ptu > 0);
            if !has_seed_ptu {
                return Err(reject("colonization requires a loaded ETAC"));
            }
        }
        FleetOrder::JoinFleet { target } => {
            let Some(other) = state.fleet(target) else {
                return Err(reject(format!("{target} does not exist")));
            };
            if other.owner != house {
                return Err(reject("cannot join a foreign fleet"));
            }
            if target == fleet_id {
                return Err(reject("a fleet cannot join itself"));
            }
        }
        FleetOrder::Rendezvous { system, with } => {
            if !state.star_map.contains(system) {
                return Err(reject(format!("{system} is not on the star map")));
            }
            let Some(other) = state.fleet(with) else {
                return Err(reject(format!("{with} does not exist")));
            };
            if other.owner != house {
                return Err(reject("cannot rendezvous with a foreign fleet"));
            }
        }
        FleetOrder::Salvage => {
            let dock = state
                .colony_at(fleet.location)
                .map(|c| c.owner == house && c.has_dock())
                .unwrap_or(false);
            if !dock {
                return Err(reject("salvage requires a friendly spaceport or shipyard"));
            }
        }
        FleetOrder::Reserve => {
            let friendly = state
                .colony_at(fleet.location)
                .map(|c| c.owner == house)
                .unwrap_or(false);
            if !friendly {
                return Err(reject("reserve status requires a friendly colony"));
            }
        }
        FleetOrder::Mothball => {
            let spaceport = state
                .colony_at(fleet.location)
                .map(|c| c.owner == house && c.spaceports > 0)
                .unwrap_or(false);
            if !spaceport {
                return Err(reject("mothballing requires a friendly spaceport"));
            }
        }
    }
    Ok(())
}

/// Validate a build order. Dock capacity, the Planet-Breaker limit, and
/// the squadron caps are hard here; fighter counts are deliberately not
/// capped at admission (the garrison cap has its own grace period).
pub fn build_order(
    state: &GameState,
    config: &GameConfig,
    house: HouseId,
    order: &BuildOrder,
) -> Result<(), EngineError> {
    let Some(colony) = state.colony(order.colony) else {
        return Err(reject(format!("{} does not exist", order.colony)));
    };
    if colony.owner != house {
        return Err(reject(format!("{} is not yours", order.colony)));
    }
    if colony.depopulated {
        return Err(reject("a depopulated colony cannot build"));
    }
    if colony.construction_queue.len() >= colony.build_slots() * 2 {
        return Err(reject("construction docks are at capacity"));
    }

    match order.kind {
        ProjectKind::Ship(class) => {
            let stats = config.ship(class);
            match class {
                ShipClass::Starbase => {
                    if colony.shipyards == 0 {
                        return Err(reject("starbases require a shipyard"));
                    }
                }
                ShipClass::Fighter => {
                    if colony.spaceports == 0 {
                        return Err(reject("fighters require a spaceport"));
                    }
                }
                _ => {
                    if colony.shipyards == 0 {
                        return Err(reject("warship construction requires a shipyard"));
                    }
                }
            }
            if class == ShipClass::PlanetBreaker {
                let existing = planet_breaker_count(state, house);
                let queued = queued_planet_breakers(state, house);
                let allowed = state.owned_colony_ids(house).len() as u32;
                if existing + queued + 1 > allowed {
                    return Err(reject("Planet-Breaker limit: one per owned colony"));
                }
            }
            // Squadron caps are hard against current values.
            if stats.is_capital() {
                let total_iu = house_iu(state, house);
                let cap = capacity::capital_cap(config, total_iu);
                if capital_count(state, config, house) >= cap {
                    return Err(reject("capital squadron cap reached"));
                }
            }
            if class != ShipClass::Fighter {
                let total_iu = house_iu(state, house);
                let cap = capacity::total_cap(config, total_iu);
                if squadron_count(state, house) >= cap {
                    return Err(reject("total squadron cap reached"));
                }
            }
        }
        ProjectKind::GroundUnit(_) => {}
        ProjectKind::Facility(_) => {}
        ProjectKind::Infrastructure(amount) => {
            if amount == 0 {
                return Err(reject("cannot build zero infrastructure"));
            }
        }
    }
    Ok(())
}

/// Validate a diplomatic action.
pub fn diplomatic_action(
    state: &GameState,
    house: HouseId,
    action: &DiplomaticAction,
) -> Result<(), EngineError> {
    let target = match *action {
        DiplomaticAction::DeclareHostile { target }
        | DiplomaticAction::DeclareEnemy { target }
        | DiplomaticAction::SetNeutral { target } => target,
    };
    if target == house {
        return Err(reject("cannot set a diplomatic stance toward yourself"));
    }
    if !state.houses.contains_key(&target) {
        return Err(reject(format!("{target} does not exist")));
    }
    Ok(())
}

/// Validate an espionage action for admission.
pub fn espionage_action(
    state: &GameState,
    house: HouseId,
    action: &EspionageAction,
) -> Result<(), EngineError> {
    if let Some(target) = action.target() {
        if target == house {
            return Err(reject("cannot run operations against yourself"));
        }
        if !state.houses.contains_key(&target) {
            return Err(reject(format!("{target} does not exist")));
        }
    }
    Ok(())
}

/// Validate a colony directive.
pub fn colony_directive(
    state: &GameState,
    house: HouseId,
    directive: &ColonyDirective,
) -> Result<(), EngineError> {
    match *directive {
        ColonyDirective::SetTaxRate { colony, pct } => {
            owned_colony(state, house, colony)?;
            if pct > 100 {
                return Err(reject("tax rate cannot exceed 100 percent"));
            }
        }
        ColonyDirective::BeginTerraform { colony, target } => {
            let c = owned_colony(state, house, colony)?;
            let current = state
                .star_map
                .system(c.system)
                .map(|s| s.planet_class)
                .ok_or_else(|| reject("colony system missing from map"))?;
            if target <= current {
                return Err(reject("terraforming can only improve the planet class"));
            }
        }
        ColonyDirective::SetFleetRoe { fleet, roe } => {
            let Some(f) = state.fleet(fleet) else {
                return Err(reject(format!("{fleet} does not exist")));
            };
            if f.owner != house {
                return Err(reject(format!("{fleet} is not yours")));
            }
            if roe > 10 {
                return Err(reject("ROE range is 0-10"));
            }
        }
    }
    Ok(())
}

/// Validate a population transfer.
pub fn population_transfer(
    state: &GameState,
    house: HouseId,
    transfer: &PopulationTransfer,
) -> Result<(), EngineError> {
    let from = owned_colony(state, house, transfer.from)?;
    let to = owned_colony(state, house, transfer.to)?;
    if transfer.ptu == 0 {
        return Err(reject("cannot transfer zero PTU"));
    }
    if from.population <= transfer.ptu {
        return Err(reject("transfer would empty the source colony"));
    }
    if state.star_map.distance(from.system, to.system).is_none() {
        return Err(reject("no jump-lane route between the colonies"));
    }
    Ok(())
}

fn owned_colony<'a>(
    state: &'a GameState,
    house: HouseId,
    colony: ColonyId,
) -> Result<&'a crate::colony::Colony, EngineError> {
    let Some(c) = state.colony(colony) else {
        return Err(reject(format!("{colony} does not exist")));
    };
    if c.owner != house {
        return Err(reject(format!("{colony} is not yours")));
    }
    Ok(c)
}

fn house_iu(state: &GameState, house: HouseId) -> u32 {
    state
        .owned_colony_ids(house)
        .iter()
        .filter_map(|id| state.colony(*id))
        .map(|c| c.infrastructure)
        .sum()
}

fn squadron_count(state: &GameState, house: HouseId) -> u32 {
    state
        .owned_fleet_ids(house)
        .iter()
        .filter_map(|id| state.fleet(*id))
        .map(|f| f.squadrons.len() as u32)
        .sum()
}

fn capital_count(state: &GameState, config: &GameConfig, house: HouseId) -> u32 {
    state
        .owned_fleet_ids(house)
        .iter()
        .filter_map(|id| state.fleet(*id))
        .flat_map(|f| f.squadrons.iter())
        .filter(|s| s.is_capital(config))
        .count() as u32
}

fn planet_breaker_count(state: &GameState, house: HouseId) -> u32 {
    state
        .owned_fleet_ids(house)
        .iter()
        .filter_map(|id| state.fleet(*id))
        .flat_map(|f| f.squadrons.iter())
        .filter(|s| s.flagship.class == ShipClass::PlanetBreaker)
        .count() as u32
}

fn queued_planet_breakers(state: &GameState, house: HouseId) -> u32 {
    state
        .owned_colony_ids(house)
        .iter()
        .filter_map(|id| state.colony(*id))
        .flat_map(|c| c.construction_queue.iter())
        .filter(|p| matches!(p.kind, ProjectKind::Ship(ShipClass::PlanetBreaker)))
        .count() as u32
}
