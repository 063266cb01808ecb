//! The Command Phase.
//!
//! Part A (server, before the player window): commission finished
//! projects, run colony automation, resolve colonization conflicts.
//! Part B (player window): admit order packets, executing zero-turn
//! administrative orders synchronously.
//! Part C (server, after the window): generate orders from standing
//! directives and store everything for later execution.

use log::debug;
use std::collections::BTreeMap;

use crate::colony::{Colony, CompletedProject, ConstructionProject, FacilityKind, ProjectKind, RepairJob};
use crate::config::GameConfig;
use crate::error::EngineError;
use crate::event::GameEvent;
use crate::house::TechField;
use crate::ids::{FleetId, HouseId, SystemId};
use crate::movement;
use crate::order::{
    DiplomaticAction, FleetOrder, OrderPacket, PopulationTransfer, StandingOrder, ZeroTurnOrder,
};
use crate::resolver;
use crate::state::{FleetCommand, GameState};
use crate::unit::{GroundUnit, GroundUnitClass, Ship, ShipClass};
use crate::validate;

/// Per-turn items the Maintenance Phase executes after admission.
#[derive(Clone, Debug, Default)]
pub struct MaintenanceDocket {
    pub diplomatic: Vec<(HouseId, Vec<DiplomaticAction>)>,
    pub transfers: Vec<(HouseId, PopulationTransfer)>,
}

/// Run the full Command Phase.
pub fn run(
    state: &mut GameState,
    config: &GameConfig,
    packets: &BTreeMap<HouseId, OrderPacket>,
    events: &mut Vec<GameEvent>,
) -> Result<MaintenanceDocket, EngineError> {
    debug!("command phase: turn {}", state.turn);

    commission_projects(state, config, events);
    colony_automation(state, config, events);
    resolve_colonization(state, config, events);

    let mut docket = MaintenanceDocket::default();
    for (&house, packet) in packets {
        let eliminated = state.house(house).map(|h| h.eliminated).unwrap_or(true);
        if eliminated {
            continue;
        }
        admit_packet(state, config, house, packet, &mut docket, events);
    }

    generate_standing_orders(state, config);
    Ok(docket)
}

// -------------------------------------------------------------------
// Part A
// -------------------------------------------------------------------

/// Commission everything the last Maintenance Phase completed.
fn commission_projects(state: &mut GameState, config: &GameConfig, events: &mut Vec<GameEvent>) {
    let completed = std::mem::take(&mut state.pending_commissions);
    for CompletedProject { colony: colony_id, kind } in completed {
        let Some(colony) = state.colony(colony_id) else {
            continue;
        };
        let owner = colony.owner;
        let system = colony.system;
        match kind {
            ProjectKind::Ship(class) => match class {
                ShipClass::Fighter => {
                    let ship = Ship::new(state.id_counters.next_ship(), class);
                    if let Some(colony) = state.colony_mut(colony_id) {
                        colony.fighters.push(ship);
                    }
                    events.push(GameEvent::ProjectCompleted {
                        colony: colony_id,
                        description: "Fighter squadron".to_string(),
                    });
                }
                ShipClass::Starbase => {
                    let ship = Ship::new(state.id_counters.next_ship(), class);
                    if let Some(colony) = state.colony_mut(colony_id) {
                        colony.starbases.push(ship);
                    }
                    events.push(GameEvent::ProjectCompleted {
                        colony: colony_id,
                        description: "Starbase".to_string(),
                    });
                }
                _ => {
                    let ship = Ship::new(state.id_counters.next_ship(), class);
                    let fleet_id = state.id_counters.next_fleet();
                    let mut fleet = crate::fleet::Fleet::new(fleet_id, owner, system);
                    if config.ship(class).is_spacelift() {
                        fleet.spacelift.push(ship);
                    } else {
                        let squadron_id = state.id_counters.next_squadron();
                        fleet
                            .squadrons
                            .push(crate::fleet::Squadron::new(squadron_id, ship));
                    }
                    state.insert_fleet(fleet);
                    events.push(GameEvent::ShipCommissioned {
                        colony: colony_id,
                        fleet: fleet_id,
                        class,
                    });
                }
            },
            ProjectKind::GroundUnit(class) => {
                let unit = GroundUnit::new(state.id_counters.next_ground_unit(), class);
                if let Some(colony) = state.colony_mut(colony_id) {
                    match class {
                        GroundUnitClass::Marine => colony.marines.push(unit),
                        _ => colony.armies.push(unit),
                    }
                }
                events.push(GameEvent::ProjectCompleted {
                    colony: colony_id,
                    description: format!("{class:?}"),
                });
            }
            ProjectKind::Facility(kind) => {
                if let Some(colony) = state.colony_mut(colony_id) {
                    match kind {
                        FacilityKind::Spaceport => colony.spaceports += 1,
                        FacilityKind::Shipyard => colony.shipyards += 1,
                        FacilityKind::Drydock => colony.drydocks += 1,
                        FacilityKind::GroundBattery => colony.ground_batteries += 1,
                        FacilityKind::ShieldGenerator => colony.shield_level += 1,
                    }
                }
                events.push(GameEvent::ProjectCompleted {
                    colony: colony_id,
                    description: format!("{kind:?}"),
                });
            }
            ProjectKind::Infrastructure(amount) => {
                if let Some(colony) = state.colony_mut(colony_id) {
                    colony.infrastructure += amount;
                }
                events.push(GameEvent::ProjectCompleted {
                    colony: colony_id,
                    description: format!("{amount} IU"),
                });
            }
        }
    }
}

/// Colony automation: embark fighters onto carriers with free hangar
/// space, and queue crippled hulls for drydock repair.
fn colony_automation(state: &mut GameState, config: &GameConfig, events: &mut Vec<GameEvent>) {
    let _ = events;
    let colony_ids: Vec<_> = state.colonies.keys().copied().collect();
    for colony_id in colony_ids {
        let Some((owner, system, has_drydock)) = state
            .colony(colony_id)
            .map(|c| (c.owner, c.system, c.drydocks > 0))
        else {
            continue;
        };

        for fleet_id in state.fleet_ids_at(system) {
            let Some(fleet) = state.fleet(fleet_id) else {
                continue;
            };
            if fleet.owner != owner {
                continue;
            }

            // Auto-load: top up carrier hangars from the garrison.
            let mut loads: Vec<(crate::ids::SquadronId, u32)> = Vec::new();
            for squadron in &fleet.squadrons {
                let hangar = config.ship(squadron.flagship.class).hangar_capacity;
                let free = hangar.saturating_sub(squadron.fighters.len() as u32);
                if free > 0 {
                    loads.push((squadron.id, free));
                }
            }
            for (squadron_id, free) in loads {
                for _ in 0..free {
                    let Some(mut fighter) = state
                        .colony_mut(colony_id)
                        .and_then(|c| c.fighters.pop())
                    else {
                        break;
                    };
                    if let Some(fleet) = state.fleet_mut(fleet_id) {
                        if let Some(squadron) = fleet.squadron_mut(squadron_id) {
                            fighter.assigned_carrier = Some(squadron.flagship.id);
                            squadron.fighters.push(fighter);
                        }
                    }
                }
            }

            // Auto-repair: crippled flagships head into the drydock queue.
            if has_drydock {
                let mut jobs: Vec<RepairJob> = Vec::new();
                if let Some(fleet) = state.fleet(fleet_id) {
                    for squadron in &fleet.squadrons {
                        if squadron.flagship.crippled {
                            let already_queued = state
                                .colony(colony_id)
                                .map(|c| {
                                    c.repair_queue
                                        .iter()
                                        .any(|j| j.ship == squadron.flagship.id)
                                })
                                .unwrap_or(false);
                            if !already_queued {
                                jobs.push(RepairJob {
                                    fleet: fleet_id,
                                    ship: squadron.flagship.id,
                                    turns_remaining: 1,
                                });
                            }
                        }
                    }
                }
                for job in jobs {
                    let cost = config
                        .ship(
                            state
                                .fleet(job.fleet)
                                .and_then(|f| {
                                    f.squadrons
                                        .iter()
                                        .find(|s| s.flagship.id == job.ship)
                                        .map(|s| s.flagship.class)
                                })
                                .unwrap_or(ShipClass::Corvette),
                        )
                        .build_cost
                        / 4;
                    if state.house(owner).map(|h| h.treasury).unwrap_or(0) < cost {
                        continue;
                    }
                    state.debit_treasury(owner, cost);
                    if let Some(colony) = state.colony_mut(colony_id) {
                        colony.repair_queue.push(job);
                    }
                }
            }
        }
    }
}

/// Simultaneous colonization resolution.
fn resolve_colonization(state: &mut GameState, config: &GameConfig, events: &mut Vec<GameEvent>) {
    // Gather live intents per target system.
    let mut by_system: BTreeMap<SystemId, Vec<(FleetId, HouseId, u64)>> = BTreeMap::new();
    let intents: Vec<(FleetId, SystemId)> = state
        .colonize_intents
        .iter()
        .map(|(&f, &s)| (f, s))
        .collect();
    for (fleet_id, system) in intents {
        let Some(fleet) = state.fleet(fleet_id) else {
            state.colonize_intents.remove(&fleet_id);
            continue;
        };
        if fleet.location != system || state.colony_at(system).is_some() {
            state.colonize_intents.remove(&fleet_id);
            continue;
        }
        let has_seed = fleet
            .spacelift
            .iter()
            .any(|s| config.ship(s.class).spacelift_ptu > 0 && s.cargo.ptu > 0);
        if !has_seed {
            let owner = fleet.owner;
            state.colonize_intents.remove(&fleet_id);
            events.push(GameEvent::OrderFailed {
                house: owner,
                fleet: Some(fleet_id),
                order: "Colonize".to_string(),
                reason: "no population units left aboard".to_string(),
            });
            continue;
        }
        by_system.entry(system).or_default().push((
            fleet_id,
            fleet.owner,
            u64::from(fleet.attack_strength(config)),
        ));
    }

    for (system, contenders) in by_system {
        let Some(outcome) = resolver::resolve(
            contenders,
            |&(_, _, strength)| strength,
            state.seed,
            state.turn,
            u64::from(system.0),
        ) else {
            continue;
        };

        let (winner_fleet, winner_house, _) = outcome.winner;
        state.colonize_intents.remove(&winner_fleet);

        // Spend one PTU from the first loaded spacelift hull.
        if let Some(fleet) = state.fleet_mut(winner_fleet) {
            if let Some(ship) = fleet.spacelift.iter_mut().find(|s| s.cargo.ptu > 0) {
                ship.cargo.ptu -= 1;
            }
        }

        let colony_id = state.id_counters.next_colony();
        let colony = Colony::new(colony_id, winner_house, system, 1);
        state.insert_colony(colony);
        state.award_prestige(
            winner_house,
            config.prestige.colony_founded,
            "Colony founded",
            events,
        );
        events.push(GameEvent::ColonyFounded {
            colony: colony_id,
            system,
            house: winner_house,
        });

        for (loser_fleet, loser_house, _) in outcome.losers {
            state.colonize_intents.remove(&loser_fleet);
            events.push(GameEvent::ColonizationConflictLost {
                fleet: loser_fleet,
                house: loser_house,
                system,
                winner: winner_house,
            });
            // Auto-colonizers re-route to the next nearest open system.
            let auto = matches!(
                state.standing_commands.get(&loser_fleet),
                Some(StandingOrder::AutoColonize)
            );
            if auto {
                if let Some(next) = nearest_uncolonized(state, loser_fleet) {
                    state
                        .pending_moves
                        .insert(loser_fleet, FleetOrder::Colonize { system: next });
                }
            }
        }
    }
}

fn nearest_uncolonized(state: &GameState, fleet_id: FleetId) -> Option<SystemId> {
    let from = state.fleet(fleet_id)?.location;
    state
        .star_map
        .systems()
        .filter(|s| state.colony_at(s.id).is_none())
        .filter_map(|s| state.star_map.distance(from, s.id).map(|d| (d, s.id)))
        .min()
        .map(|(_, id)| id)
}

// -------------------------------------------------------------------
// Part B
// -------------------------------------------------------------------

fn rejection_reason(err: EngineError) -> String {
    match err {
        EngineError::OrderRejected { reason } => reason,
        other => other.to_string(),
    }
}

fn admit_packet(
    state: &mut GameState,
    config: &GameConfig,
    house: HouseId,
    packet: &OrderPacket,
    docket: &mut MaintenanceDocket,
    events: &mut Vec<GameEvent>,
) {
    // Fleet orders: validate, then route by execution timing.
    for (&fleet_id, order) in &packet.fleet_orders {
        match validate::fleet_order(state, config, house, fleet_id, order) {
            Ok(()) => {
                if order.is_maintenance_order() {
                    state.pending_moves.insert(fleet_id, order.clone());
                } else {
                    state.fleet_commands.insert(
                        fleet_id,
                        FleetCommand {
                            order: order.clone(),
                            issued_turn: state.turn,
                        },
                    );
                }
            }
            Err(err) => {
                events.push(GameEvent::OrderRejected {
                    house,
                    fleet: Some(fleet_id),
                    order: order.name().to_string(),
                    reason: rejection_reason(err),
                });
            }
        }
    }

    // Zero-turn administrative orders run synchronously.
    for order in &packet.zero_turn_orders {
        execute_zero_turn(state, config, house, order, events);
    }

    // Standing orders replace whatever was installed before.
    for (&fleet_id, standing) in &packet.standing_orders {
        let owned = state
            .fleet(fleet_id)
            .map(|f| f.owner == house)
            .unwrap_or(false);
        if !owned {
            events.push(GameEvent::OrderRejected {
                house,
                fleet: Some(fleet_id),
                order: "StandingOrder".to_string(),
                reason: format!("{fleet_id} is not yours to command"),
            });
            continue;
        }
        if matches!(standing, StandingOrder::None) {
            state.standing_commands.remove(&fleet_id);
        } else {
            state.standing_commands.insert(fleet_id, standing.clone());
        }
    }

    // Build orders: validate, charge, enqueue.
    for order in &packet.build_orders {
        match validate::build_order(state, config, house, order) {
            Ok(()) => {
                let cost = project_cost(config, &order.kind);
                if state.house(house).map(|h| h.treasury).unwrap_or(0) < cost {
                    events.push(GameEvent::OrderRejected {
                        house,
                        fleet: None,
                        order: "Build".to_string(),
                        reason: format!("insufficient funds: need {cost} PP"),
                    });
                    continue;
                }
                state.debit_treasury(house, cost);
                let cst = state
                    .house(house)
                    .map(|h| h.tech.level(TechField::Construction))
                    .unwrap_or(1);
                let turns = build_time(&order.kind, cst);
                if let Some(colony) = state.colony_mut(order.colony) {
                    colony.construction_queue.push(ConstructionProject {
                        kind: order.kind.clone(),
                        turns_remaining: turns,
                    });
                }
            }
            Err(err) => {
                events.push(GameEvent::OrderRejected {
                    house,
                    fleet: None,
                    order: "Build".to_string(),
                    reason: rejection_reason(err),
                });
            }
        }
    }

    // Research: convert PP into banked RP.
    let research_total = packet.research.total();
    if research_total > 0 {
        if state.house(house).map(|h| h.treasury).unwrap_or(0) < research_total {
            events.push(GameEvent::OrderRejected {
                house,
                fleet: None,
                order: "Research".to_string(),
                reason: format!("insufficient funds: need {research_total} PP"),
            });
        } else {
            state.debit_treasury(house, research_total);
            let rp_per_pp = config.economy.rp_per_pp;
            if let Some(h) = state.house_mut(house) {
                for (&field, &pp) in &packet.research.per_field {
                    *h.tech.accumulated_rp.entry(field).or_insert(0) += pp * rp_per_pp;
                }
            }
        }
    }

    // Espionage: admit into the pending table for next Conflict Phase.
    for action in &packet.espionage_actions {
        match validate::espionage_action(state, house, action) {
            Ok(()) => {
                state
                    .pending_espionage
                    .entry(house)
                    .or_default()
                    .push(action.clone());
            }
            Err(err) => {
                events.push(GameEvent::OrderRejected {
                    house,
                    fleet: None,
                    order: action.name().to_string(),
                    reason: rejection_reason(err),
                });
            }
        }
    }

    // Colony directives apply immediately.
    for directive in &packet.colony_directives {
        match validate::colony_directive(state, house, directive) {
            Ok(()) => apply_directive(state, config, directive),
            Err(err) => {
                events.push(GameEvent::OrderRejected {
                    house,
                    fleet: None,
                    order: "ColonyDirective".to_string(),
                    reason: rejection_reason(err),
                });
            }
        }
    }

    // Espionage budget investments.
    if packet.ebp_investment > 0 {
        let paid = state
            .house(house)
            .map(|h| h.treasury.min(packet.ebp_investment))
            .unwrap_or(0);
        state.debit_treasury(house, paid);
        if let Some(h) = state.house_mut(house) {
            h.ebp += paid;
        }
    }
    if packet.cip_investment > 0 {
        let paid = state
            .house(house)
            .map(|h| h.treasury.min(packet.cip_investment))
            .unwrap_or(0);
        state.debit_treasury(house, paid);
        if let Some(h) = state.house_mut(house) {
            h.cip += paid;
        }
    }

    // Diplomacy and population transfers execute in Maintenance.
    let mut diplomatic = Vec::new();
    for action in &packet.diplomatic_actions {
        match validate::diplomatic_action(state, house, action) {
            Ok(()) => diplomatic.push(*action),
            Err(err) => {
                events.push(GameEvent::OrderRejected {
                    house,
                    fleet: None,
                    order: "Diplomacy".to_string(),
                    reason: rejection_reason(err),
                });
            }
        }
    }
    if !diplomatic.is_empty() {
        docket.diplomatic.push((house, diplomatic));
    }
    for transfer in &packet.population_transfers {
        match validate::population_transfer(state, house, transfer) {
            Ok(()) => docket.transfers.push((house, *transfer)),
            Err(err) => {
                events.push(GameEvent::OrderRejected {
                    house,
                    fleet: None,
                    order: "PopulationTransfer".to_string(),
                    reason: rejection_reason(err),
                });
            }
        }
    }
}

fn apply_directive(state: &mut GameState, config: &GameConfig, directive: &crate::order::ColonyDirective) {
    use crate::order::ColonyDirective;
    match *directive {
        ColonyDirective::SetTaxRate { colony, pct } => {
            if let Some(c) = state.colony_mut(colony) {
                c.tax_rate = pct;
            }
        }
        ColonyDirective::BeginTerraform { colony, target } => {
            let level = state
                .colony(colony)
                .and_then(|c| state.house(c.owner))
                .map(|h| h.tech.level(TechField::Terraforming))
                .unwrap_or(1);
            let turns = (8u32).saturating_sub(level).max(2);
            let _ = config;
            if let Some(c) = state.colony_mut(colony) {
                c.terraform = Some(crate::colony::TerraformProject {
                    target_class: target,
                    turns_remaining: turns,
                });
            }
        }
        ColonyDirective::SetFleetRoe { fleet, roe } => {
            if let Some(f) = state.fleet_mut(fleet) {
                f.roe = roe;
            }
        }
    }
}

/// PP price of a project.
pub fn project_cost(config: &GameConfig, kind: &ProjectKind) -> u32 {
    match kind {
        ProjectKind::Ship(class) => config.ship(*class).build_cost,
        ProjectKind::GroundUnit(class) => config.ground_unit(*class).build_cost,
        ProjectKind::Facility(kind) => match kind {
            FacilityKind::Spaceport => 50,
            FacilityKind::Shipyard => 80,
            FacilityKind::Drydock => 60,
            FacilityKind::GroundBattery => 25,
            FacilityKind::ShieldGenerator => 40,
        },
        ProjectKind::Infrastructure(amount) => amount * 3,
    }
}

/// Build time in turns, shortened by construction tech.
pub fn build_time(kind: &ProjectKind, cst_level: u32) -> u32 {
    let base: u32 = match kind {
        ProjectKind::Ship(class) => match class {
            ShipClass::Fighter | ShipClass::Corvette | ShipClass::Scout | ShipClass::Etac => 1,
            ShipClass::Dreadnought | ShipClass::PlanetBreaker | ShipClass::Starbase => 3,
            _ => 2,
        },
        ProjectKind::GroundUnit(_) => 1,
        ProjectKind::Facility(_) => 2,
        ProjectKind::Infrastructure(_) => 1,
    };
    base.saturating_sub((cst_level.saturating_sub(1)) / 2).max(1)
}

// -------------------------------------------------------------------
// Zero-turn orders
// -------------------------------------------------------------------

fn zero_turn_rejected(
    house: HouseId,
    fleet: Option<FleetId>,
    name: &str,
    reason: impl Into<String>,
    events: &mut Vec<GameEvent>,
) {
    events.push(GameEvent::OrderRejected {
        house,
        fleet,
        order: name.to_string(),
        reason: reason.into(),
    });
}

fn owns_fleet(state: &GameState, house: HouseId, fleet: FleetId) -> bool {
    state.fleet(fleet).map(|f| f.owner == house).unwrap_or(false)
}

fn execute_zero_turn(
    state: &mut GameState,
    config: &GameConfig,
    house: HouseId,
    order: &ZeroTurnOrder,
    events: &mut Vec<GameEvent>,
) {
    match order {
        ZeroTurnOrder::DetachShips { fleet, squadrons } => {
            if !owns_fleet(state, house, *fleet) {
                return zero_turn_rejected(house, Some(*fleet), "DetachShips", "not your fleet", events);
            }
            let (owner, location) = {
                let f = state.fleet(*fleet).map(|f| (f.owner, f.location));
                let Some(pair) = f else { return };
                pair
            };
            let mut detached = Vec::new();
            if let Some(f) = state.fleet_mut(*fleet) {
                for id in squadrons {
                    if let Some(idx) = f.squadrons.iter().position(|s| s.id == *id) {
                        detached.push(f.squadrons.remove(idx));
                    }
                }
            }
            if detached.is_empty() {
                return zero_turn_rejected(
                    house,
                    Some(*fleet),
                    "DetachShips",
                    "no matching squadrons",
                    events,
                );
            }
            let new_id = state.id_counters.next_fleet();
            let mut new_fleet = crate::fleet::Fleet::new(new_id, owner, location);
            new_fleet.squadrons = detached;
            state.insert_fleet(new_fleet);
            // An emptied source fleet dissolves.
            if state.fleet(*fleet).map(|f| f.is_empty()).unwrap_or(false) {
                state.remove_fleet(*fleet);
            }
            events.push(GameEvent::OrderCompleted {
                house,
                fleet: new_id,
                order: "DetachShips".to_string(),
            });
        }
        ZeroTurnOrder::TransferShips { from, to, squadrons } => {
            if !owns_fleet(state, house, *from) || !owns_fleet(state, house, *to) {
                return zero_turn_rejected(house, Some(*from), "TransferShips", "not your fleets", events);
            }
            let colocated = match (state.fleet(*from), state.fleet(*to)) {
                (Some(a), Some(b)) => a.location == b.location,
                _ => false,
            };
            if !colocated {
                return zero_turn_rejected(
                    house,
                    Some(*from),
                    "TransferShips",
                    "fleets are not co-located",
                    events,
                );
            }
            let mut moved = Vec::new();
            if let Some(f) = state.fleet_mut(*from) {
                for id in squadrons {
                    if let Some(idx) = f.squadrons.iter().position(|s| s.id == *id) {
                        moved.push(f.squadrons.remove(idx));
                    }
                }
            }
            if let Some(f) = state.fleet_mut(*to) {
                f.squadrons.extend(moved);
            }
            if state.fleet(*from).map(|f| f.is_empty()).unwrap_or(false) {
                state.remove_fleet(*from);
            }
            events.push(GameEvent::OrderCompleted {
                house,
                fleet: *to,
                order: "TransferShips".to_string(),
            });
        }
        ZeroTurnOrder::MergeFleets { from, into } => {
            if !owns_fleet(state, house, *from) || !owns_fleet(state, house, *into) {
                return zero_turn_rejected(house, Some(*from), "MergeFleets", "not your fleets", events);
            }
            movement::merge_fleets(state, *from, *into);
            if state.fleet(*from).is_some() {
                return zero_turn_rejected(
                    house,
                    Some(*from),
                    "MergeFleets",
                    "fleets are not co-located",
                    events,
                );
            }
            events.push(GameEvent::OrderCompleted {
                house,
                fleet: *into,
                order: "MergeFleets".to_string(),
            });
        }
        ZeroTurnOrder::LoadCargo { fleet, ptu, marines } => {
            if !owns_fleet(state, house, *fleet) {
                return zero_turn_rejected(house, Some(*fleet), "LoadCargo", "not your fleet", events);
            }
            let colony_id = state
                .fleet(*fleet)
                .and_then(|f| state.colony_at(f.location))
                .filter(|c| c.owner == house)
                .map(|c| c.id);
            let Some(colony_id) = colony_id else {
                return zero_turn_rejected(
                    house,
                    Some(*fleet),
                    "LoadCargo",
                    "no friendly colony here",
                    events,
                );
            };

            // PTU: bounded by source population and hull capacity.
            let mut ptu_left = *ptu;
            let mut marines_left = *marines;
            let ship_count = state.fleet(*fleet).map(|f| f.spacelift.len()).unwrap_or(0);
            for idx in 0..ship_count {
                let (class, loaded_ptu, loaded_marines) = {
                    let Some(fleet) = state.fleet(*fleet) else { break };
                    let ship = &fleet.spacelift[idx];
                    (ship.class, ship.cargo.ptu, ship.cargo.marines.len() as u32)
                };
                let stats = config.ship(class);

                let ptu_space = stats.spacelift_ptu.saturating_sub(loaded_ptu);
                let take_ptu = ptu_left.min(ptu_space).min(
                    state
                        .colony(colony_id)
                        .map(|c| c.population.saturating_sub(1))
                        .unwrap_or(0),
                );
                if take_ptu > 0 {
                    if let Some(c) = state.colony_mut(colony_id) {
                        c.population -= take_ptu;
                    }
                    if let Some(f) = state.fleet_mut(*fleet) {
                        f.spacelift[idx].cargo.ptu += take_ptu;
                    }
                    ptu_left -= take_ptu;
                }

                let marine_space = stats.marine_capacity.saturating_sub(loaded_marines);
                let available = state
                    .colony(colony_id)
                    .map(|c| c.marines.len() as u32)
                    .unwrap_or(0);
                let take_marines = marines_left.min(marine_space).min(available);
                for _ in 0..take_marines {
                    let unit = state.colony_mut(colony_id).and_then(|c| c.marines.pop());
                    if let (Some(unit), Some(f)) = (unit, state.fleet_mut(*fleet)) {
                        f.spacelift[idx].cargo.marines.push(unit);
                    }
                }
                marines_left -= take_marines;
            }
            events.push(GameEvent::OrderCompleted {
                house,
                fleet: *fleet,
                order: "LoadCargo".to_string(),
            });
        }
        ZeroTurnOrder::UnloadCargo { fleet, ptu, marines } => {
            if !owns_fleet(state, house, *fleet) {
                return zero_turn_rejected(house, Some(*fleet), "UnloadCargo", "not your fleet", events);
            }
            let colony_id = state
                .fleet(*fleet)
                .and_then(|f| state.colony_at(f.location))
                .filter(|c| c.owner == house)
                .map(|c| c.id);
            let Some(colony_id) = colony_id else {
                return zero_turn_rejected(
                    house,
                    Some(*fleet),
                    "UnloadCargo",
                    "no friendly colony here",
                    events,
                );
            };
            let mut ptu_left = *ptu;
            let mut marines_left = *marines;
            let ship_count = state.fleet(*fleet).map(|f| f.spacelift.len()).unwrap_or(0);
            for idx in 0..ship_count {
                let drop_ptu = {
                    let Some(f) = state.fleet(*fleet) else { break };
                    f.spacelift[idx].cargo.ptu.min(ptu_left)
                };
                if drop_ptu > 0 {
                    if let Some(f) = state.fleet_mut(*fleet) {
                        f.spacelift[idx].cargo.ptu -= drop_ptu;
                    }
                    if let Some(c) = state.colony_mut(colony_id) {
                        c.population += drop_ptu;
                    }
                    ptu_left -= drop_ptu;
                }
                while marines_left > 0 {
                    let unit = state
                        .fleet_mut(*fleet)
                        .and_then(|f| f.spacelift[idx].cargo.marines.pop());
                    let Some(unit) = unit else { break };
                    if let Some(c) = state.colony_mut(colony_id) {
                        c.marines.push(unit);
                    }
                    marines_left -= 1;
                }
            }
            events.push(GameEvent::OrderCompleted {
                house,
                fleet: *fleet,
                order: "UnloadCargo".to_string(),
            });
        }
        ZeroTurnOrder::TransferShipBetweenSquadrons {
            fleet,
            from_squadron,
            to_squadron,
            ship,
        } => {
            if !owns_fleet(state, house, *fleet) {
                return zero_turn_rejected(
                    house,
                    Some(*fleet),
                    "TransferShipBetweenSquadrons",
                    "not your fleet",
                    events,
                );
            }
            let mut moved: Option<Ship> = None;
            if let Some(f) = state.fleet_mut(*fleet) {
                if let Some(src) = f.squadron_mut(*from_squadron) {
                    if let Some(idx) = src.escorts.iter().position(|s| s.id == *ship) {
                        moved = Some(src.escorts.remove(idx));
                    }
                }
            }
            let Some(escort) = moved else {
                return zero_turn_rejected(
                    house,
                    Some(*fleet),
                    "TransferShipBetweenSquadrons",
                    "ship not found in source squadron",
                    events,
                );
            };
            // The destination must still fit its command rating.
            let fits = state
                .fleet(*fleet)
                .and_then(|f| f.squadron(*to_squadron))
                .map(|dst| {
                    let cost = dst.command_cost(config) + config.ship(escort.class).command_cost;
                    cost <= dst.command_rating(config)
                })
                .unwrap_or(false);
            if !fits {
                // Put it back where it came from.
                if let Some(f) = state.fleet_mut(*fleet) {
                    if let Some(src) = f.squadron_mut(*from_squadron) {
                        src.escorts.push(escort);
                    }
                }
                return zero_turn_rejected(
                    house,
                    Some(*fleet),
                    "TransferShipBetweenSquadrons",
                    "destination flagship lacks command rating",
                    events,
                );
            }
            if let Some(f) = state.fleet_mut(*fleet) {
                if let Some(dst) = f.squadron_mut(*to_squadron) {
                    dst.escorts.push(escort);
                }
            }
            events.push(GameEvent::OrderCompleted {
                house,
                fleet: *fleet,
                order: "TransferShipBetweenSquadrons".to_string(),
            });
        }
        ZeroTurnOrder::AssignSquadronToFleet { squadron, from, to } => {
            if !owns_fleet(state, house, *from) || !owns_fleet(state, house, *to) {
                return zero_turn_rejected(
                    house,
                    Some(*from),
                    "AssignSquadronToFleet",
                    "not your fleets",
                    events,
                );
            }
            let colocated = match (state.fleet(*from), state.fleet(*to)) {
                (Some(a), Some(b)) => a.location == b.location,
                _ => false,
            };
            if !colocated {
                return zero_turn_rejected(
                    house,
                    Some(*from),
                    "AssignSquadronToFleet",
                    "fleets are not co-located",
                    events,
                );
            }
            let mut moved = None;
            if let Some(f) = state.fleet_mut(*from) {
                if let Some(idx) = f.squadrons.iter().position(|s| s.id == *squadron) {
                    moved = Some(f.squadrons.remove(idx));
                }
            }
            let Some(squad) = moved else {
                return zero_turn_rejected(
                    house,
                    Some(*from),
                    "AssignSquadronToFleet",
                    "squadron not found",
                    events,
                );
            };
            if let Some(f) = state.fleet_mut(*to) {
                f.squadrons.push(squad);
            }
            if state.fleet(*from).map(|f| f.is_empty()).unwrap_or(false) {
                state.remove_fleet(*from);
            }
            events.push(GameEvent::OrderCompleted {
                house,
                fleet: *to,
                order: "AssignSquadronToFleet".to_string(),
            });
        }
    }
}

// -------------------------------------------------------------------
// Part C
// -------------------------------------------------------------------

/// Generate orders from standing directives for fleets that received no
/// explicit order this turn.
fn generate_standing_orders(state: &mut GameState, config: &GameConfig) {
    let standing: Vec<(FleetId, StandingOrder)> = state
        .standing_commands
        .iter()
        .map(|(&f, s)| (f, s.clone()))
        .collect();

    for (fleet_id, standing) in standing {
        if state.fleet_commands.contains_key(&fleet_id)
            || state.pending_moves.contains_key(&fleet_id)
            || state.colonize_intents.contains_key(&fleet_id)
        {
            continue;
        }
        let Some(fleet) = state.fleet(fleet_id) else {
            continue;
        };
        let location = fleet.location;
        let owner = fleet.owner;

        match standing {
            StandingOrder::None => {}
            StandingOrder::PatrolRoute { systems } => {
                if systems.is_empty() {
                    continue;
                }
                // Continue the loop from the current waypoint, or head to
                // the route's start if off-route.
                let next = match systems.iter().position(|&s| s == location) {
                    Some(idx) => systems[(idx + 1) % systems.len()],
                    None => systems[0],
                };
                if next != location {
                    state
                        .pending_moves
                        .insert(fleet_id, FleetOrder::Move { to: next });
                }
            }
            StandingOrder::DefendSystem { system } => {
                if location == system {
                    let friendly = state
                        .colony_at(system)
                        .map(|c| c.owner == owner)
                        .unwrap_or(false);
                    if friendly {
                        state.fleet_commands.insert(
                            fleet_id,
                            FleetCommand {
                                order: FleetOrder::GuardColony,
                                issued_turn: state.turn,
                            },
                        );
                    }
                } else {
                    state
                        .pending_moves
                        .insert(fleet_id, FleetOrder::Move { to: system });
                }
            }
            StandingOrder::GuardColony { colony } => {
                let Some(target) = state.colony(colony) else {
                    continue;
                };
                if target.system == location {
                    state.fleet_commands.insert(
                        fleet_id,
                        FleetCommand {
                            order: FleetOrder::GuardColony,
                            issued_turn: state.turn,
                        },
                    );
                } else {
                    let system = target.system;
                    state
                        .pending_moves
                        .insert(fleet_id, FleetOrder::Move { to: system });
                }
            }
            StandingOrder::AutoColonize => {
                let loaded = fleet
                    .spacelift
                    .iter()
                    .any(|s| config.ship(s.class).spacelift_ptu > 0 && s.cargo.ptu > 0);
                if loaded {
                    if let Some(target) = nearest_uncolonized(state, fleet_id) {
                        state
                            .pending_moves
                            .insert(fleet_id, FleetOrder::Colonize { system: target });
                    }
                }
            }
            StandingOrder::AutoReinforce { colony } => {
                if let Some(target) = state.colony(colony) {
                    if target.system != location {
                        let system = target.system;
                        state
                            .pending_moves
                            .insert(fleet_id, FleetOrder::Move { to: system });
                    }
                }
            }
            StandingOrder::AutoRepair => {
                let crippled = fleet
                    .squadrons
                    .iter()
                    .any(|s| s.flagship.crippled || s.escorts.iter().any(|e| e.crippled));
                if crippled {
                    let at_drydock = state
                        .colony_at(location)
                        .map(|c| c.owner == owner && c.drydocks > 0)
                        .unwrap_or(false);
                    if !at_drydock {
                        let dock = state
                            .owned_colony_ids(owner)
                            .into_iter()
                            .filter_map(|id| state.colony(id))
                            .filter(|c| c.drydocks > 0)
                            .filter_map(|c| {
                                state.star_map.distance(location, c.system).map(|d| (d, c.system))
                            })
                            .min()
                            .map(|(_, s)| s);
                        if let Some(system) = dock {
                            state
                                .pending_moves
                                .insert(fleet_id, FleetOrder::Move { to: system });
                        }
                    }
                }
            }
            StandingOrder::AutoEvade => {
                let danger = state
                    .fleet_ids_at(location)
                    .iter()
                    .filter_map(|id| state.fleet(*id))
                    .any(|f| crate::diplomacy::are_hostile(state, owner, f.owner));
                if danger {
                    state.pending_moves.insert(fleet_id, FleetOrder::SeekHome);
                }
            }
            StandingOrder::BlockadeTarget { system } => {
                if location == system {
                    state.fleet_commands.insert(
                        fleet_id,
                        FleetCommand {
                            order: FleetOrder::Blockade { system },
                            issued_turn: state.turn,
                        },
                    );
                } else {
                    state
                        .pending_moves
                        .insert(fleet_id, FleetOrder::Move { to: system });
                }
            }
        }
    }
}
