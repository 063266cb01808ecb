//! Fleet order executors.
//!
//! Every executor shares the same preamble (locate the fleet, confirm it
//! still exists and the order still makes sense) and postamble (emit
//! `OrderCompleted` or `OrderFailed`, keep indices coherent). A failed
//! order is always local: skip, report, continue.

use crate::config::GameConfig;
use crate::event::GameEvent;
use crate::fleet::FleetStatus;
use crate::house::TechField;
use crate::ids::{FleetId, SystemId};
use crate::order::FleetOrder;
use crate::state::GameState;

/// Jumps a fleet can make in one Maintenance Phase.
pub fn fleet_speed(state: &GameState, fleet_id: FleetId) -> u32 {
    let Some(fleet) = state.fleet(fleet_id) else {
        return 1;
    };
    let propulsion = state
        .house(fleet.owner)
        .map(|h| h.tech.level(TechField::Propulsion))
        .unwrap_or(1);
    1 + propulsion / 2
}

fn order_failed(
    state: &GameState,
    fleet_id: FleetId,
    order: &FleetOrder,
    reason: &str,
    events: &mut Vec<GameEvent>,
) {
    let house = state.fleet(fleet_id).map(|f| f.owner);
    events.push(GameEvent::OrderFailed {
        house: house.unwrap_or(crate::ids::HouseId(u32::MAX)),
        fleet: Some(fleet_id),
        order: order.name().to_string(),
        reason: reason.to_string(),
    });
}

fn order_completed(state: &GameState, fleet_id: FleetId, order: &FleetOrder, events: &mut Vec<GameEvent>) {
    if let Some(fleet) = state.fleet(fleet_id) {
        events.push(GameEvent::OrderCompleted {
            house: fleet.owner,
            fleet: fleet_id,
            order: order.name().to_string(),
        });
    }
}

/// Advance a fleet along the jump-lane path toward `to`, limited by its
/// speed. Returns `Some(true)` on arrival, `Some(false)` while en route,
/// `None` when no path exists.
fn step_toward(state: &mut GameState, fleet_id: FleetId, to: SystemId) -> Option<bool> {
    let from = state.fleet(fleet_id)?.location;
    if from == to {
        return Some(true);
    }
    let path = state.star_map.shortest_path(from, to)?;
    let speed = fleet_speed(state, fleet_id) as usize;
    let hop = path.len().saturating_sub(1).min(speed);
    let next = path[hop];
    state.move_fleet(fleet_id, next);
    Some(next == to)
}

/// Execute one maintenance-timed order for one fleet.
pub fn execute_maintenance_order(
    state: &mut GameState,
    _config: &GameConfig,
    fleet_id: FleetId,
    order: FleetOrder,
    events: &mut Vec<GameEvent>,
) {
    // Preamble: the fleet must still exist (it may have died in Conflict).
    if state.fleet(fleet_id).is_none() {
        return;
    }

    match order.clone() {
        FleetOrder::Hold => {
            order_completed(state, fleet_id, &order, events);
        }
        FleetOrder::Move { to } => {
            execute_move(state, fleet_id, to, order, events, false);
        }
        FleetOrder::SeekHome => {
            let Some(fleet) = state.fleet(fleet_id) else {
                return;
            };
            match state.nearest_owned_colony(fleet.owner, fleet.location) {
                Some(home) => execute_move(state, fleet_id, home, order, events, false),
                // No home left: hold position.
                None => order_completed(state, fleet_id, &order, events),
            }
        }
        FleetOrder::Patrol { system } => {
            execute_move(state, fleet_id, system, order, events, false);
        }
        FleetOrder::Colonize { system } => {
            if !state.star_map.contains(system) {
                order_failed(state, fleet_id, &order, "unknown target system", events);
                return;
            }
            if state.colony_at(system).is_some() {
                order_failed(state, fleet_id, &order, "system already colonized", events);
                return;
            }
            execute_move(state, fleet_id, system, order, events, true);
        }
        FleetOrder::JoinFleet { target } => {
            let Some(dest) = state.fleet(target).map(|f| f.location) else {
                order_failed(state, fleet_id, &order, "target fleet no longer exists", events);
                return;
            };
            match step_toward(state, fleet_id, dest) {
                Some(true) => {
                    merge_fleets(state, fleet_id, target);
                    order_completed(state, target, &order, events);
                }
                Some(false) => {
                    // Still chasing; keep the order alive for next turn.
                    state.pending_moves.insert(fleet_id, order);
                }
                None => order_failed(state, fleet_id, &order, "no jump-lane route", events),
            }
        }
        FleetOrder::Rendezvous { system, with } => {
            match step_toward(state, fleet_id, system) {
                Some(true) => {
                    let partner_there =
                        state.fleet(with).map(|f| f.location) == Some(system);
                    if partner_there {
                        merge_fleets(state, fleet_id, with);
                        order_completed(state, with, &order, events);
                    } else {
                        // Arrived first; wait for the partner.
                        state.pending_moves.insert(fleet_id, order);
                    }
                }
                Some(false) => {
                    state.pending_moves.insert(fleet_id, order);
                }
                None => order_failed(state, fleet_id, &order, "no jump-lane route", events),
            }
        }
        FleetOrder::Reserve => {
            let Some(fleet) = state.fleet(fleet_id) else {
                return;
            };
            let friendly = state
                .colony_at(fleet.location)
                .map(|c| c.owner == fleet.owner)
                .unwrap_or(false);
            if !friendly {
                order_failed(state, fleet_id, &order, "no friendly colony here", events);
                return;
            }
            set_status(state, fleet_id, FleetStatus::Reserve, events);
            order_completed(state, fleet_id, &order, events);
        }
        FleetOrder::Mothball => {
            let Some(fleet) = state.fleet(fleet_id) else {
                return;
            };
            let has_spaceport = state
                .colony_at(fleet.location)
                .map(|c| c.owner == fleet.owner && c.spaceports > 0)
                .unwrap_or(false);
            if !has_spaceport {
                order_failed(
                    state,
                    fleet_id,
                    &order,
                    "mothballing requires a friendly spaceport",
                    events,
                );
                return;
            }
            set_status(state, fleet_id, FleetStatus::Mothballed, events);
            order_completed(state, fleet_id, &order, events);
        }
        FleetOrder::Reactivate => {
            let Some(fleet) = state.fleet(fleet_id) else {
                return;
            };
            if fleet.status == FleetStatus::Mothballed {
                let has_spaceport = state
                    .colony_at(fleet.location)
                    .map(|c| c.owner == fleet.owner && c.spaceports > 0)
                    .unwrap_or(false);
                if !has_spaceport {
                    order_failed(
                        state,
                        fleet_id,
                        &order,
                        "reactivation requires a friendly spaceport",
                        events,
                    );
                    return;
                }
            }
            set_status(state, fleet_id, FleetStatus::Active, events);
            order_completed(state, fleet_id, &order, events);
        }
        // Conflict-timed and income-timed orders never reach this executor.
        _ => {}
    }
}

fn execute_move(
    state: &mut GameState,
    fleet_id: FleetId,
    to: SystemId,
    order: FleetOrder,
    events: &mut Vec<GameEvent>,
    colonizing: bool,
) {
    if !state.star_map.contains(to) {
        order_failed(state, fleet_id, &order, "unknown destination system", events);
        return;
    }
    match step_toward(state, fleet_id, to) {
        Some(true) => {
            if let Some(fleet) = state.fleet(fleet_id) {
                events.push(GameEvent::FleetArrived {
                    fleet: fleet_id,
                    house: fleet.owner,
                    system: to,
                });
            }
            if colonizing {
                state.colonize_intents.insert(fleet_id, to);
            }
            order_completed(state, fleet_id, &order, events);
        }
        Some(false) => {
            // En route; the remaining leg carries over to next turn.
            state.pending_moves.insert(fleet_id, order);
        }
        None => {
            order_failed(state, fleet_id, &order, "no jump-lane route", events);
        }
    }
}

fn set_status(state: &mut GameState, fleet_id: FleetId, status: FleetStatus, events: &mut Vec<GameEvent>) {
    if let Some(fleet) = state.fleet_mut(fleet_id) {
        if fleet.status != status {
            fleet.status = status;
            events.push(GameEvent::FleetStatusChanged {
                fleet: fleet_id,
                status,
            });
        }
    }
}

/// Fold `from` into `into` (same owner, same location) and remove `from`.
pub fn merge_fleets(state: &mut GameState, from: FleetId, into: FleetId) {
    let ok = match (state.fleet(from), state.fleet(into)) {
        (Some(a), Some(b)) => a.owner == b.owner && a.location == b.location,
        _ => false,
    };
    if !ok {
        return;
    }
    if let Some(absorbed) = state.remove_fleet(from) {
        if let Some(target) = state.fleet_mut(into) {
            target.squadrons.extend(absorbed.squadrons);
            target.spacelift.extend(absorbed.spacelift);
        }
    }
}

/// Execute a salvage order: the fleet must be alive after the Conflict
/// Phase and parked at a friendly colony with a spaceport or shipyard.
/// Refund is half the summed build cost; the fleet is struck from every
/// table.
pub fn execute_salvage(
    state: &mut GameState,
    config: &GameConfig,
    fleet_id: FleetId,
    events: &mut Vec<GameEvent>,
) {
    let order = FleetOrder::Salvage;
    let Some(fleet) = state.fleet(fleet_id) else {
        return;
    };
    let owner = fleet.owner;
    let dockyard = state
        .colony_at(fleet.location)
        .map(|c| c.owner == owner && c.has_dock())
        .unwrap_or(false);
    if !dockyard {
        order_failed(
            state,
            fleet_id,
            &order,
            "salvage requires a friendly spaceport or shipyard",
            events,
        );
        return;
    }

    let hull_value: u32 = {
        let fleet = state.fleet(fleet_id).map(|f| f.clone());
        let Some(fleet) = fleet else { return };
        fleet
            .squadrons
            .iter()
            .map(|s| s.total_build_cost(config))
            .sum::<u32>()
            + fleet
                .spacelift
                .iter()
                .map(|s| config.ship(s.class).build_cost)
                .sum::<u32>()
    };
    let refund = hull_value * config.economy.salvage_refund_pct / 100;

    state.remove_fleet(fleet_id);
    state.credit_treasury(owner, refund);
    events.push(GameEvent::SalvageCompleted {
        fleet: fleet_id,
        house: owner,
        refund,
    });
}
