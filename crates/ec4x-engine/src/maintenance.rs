//! The Maintenance Phase: movement, construction and repair advancement,
//! research level-ups, diplomacy, population transfers, terraforming, and
//! end-of-turn cleanup. The turn counter increments here.

use log::debug;
use std::collections::BTreeMap;

use crate::command::MaintenanceDocket;
use crate::config::GameConfig;
use crate::diplomacy::{self, DiplomaticState};
use crate::error::EngineError;
use crate::event::GameEvent;
use crate::house::TechField;
use crate::ids::HouseId;
use crate::movement;
use crate::state::GameState;

/// Run the full Maintenance Phase.
pub fn run(
    state: &mut GameState,
    config: &GameConfig,
    docket: &MaintenanceDocket,
    events: &mut Vec<GameEvent>,
) -> Result<(), EngineError> {
    debug!("maintenance phase: turn {}", state.turn);

    execute_movement(state, config, events);
    advance_construction(state, events);
    advance_repairs(state, events);
    advance_research(state, config, events);
    execute_diplomacy(state, config, docket, events);
    execute_population_transfers(state, docket, events);
    advance_terraforming(state, events);
    cleanup(state);

    state.turn += 1;
    Ok(())
}

/// Execute every pending movement-timed order. Multi-turn legs reinsert
/// themselves into the pending table.
fn execute_movement(state: &mut GameState, config: &GameConfig, events: &mut Vec<GameEvent>) {
    let moves = std::mem::take(&mut state.pending_moves);
    for (fleet_id, order) in moves {
        movement::execute_maintenance_order(state, config, fleet_id, order, events);
    }
}

/// Advance construction queues; finished projects become commissions for
/// the next Command Phase.
fn advance_construction(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let _ = events;
    let colony_ids: Vec<_> = state.colonies.keys().copied().collect();
    for colony_id in colony_ids {
        let mut finished = Vec::new();
        if let Some(colony) = state.colony_mut(colony_id) {
            let slots = colony.build_slots();
            for project in colony.construction_queue.iter_mut().take(slots) {
                project.turns_remaining = project.turns_remaining.saturating_sub(1);
            }
            let mut idx = 0;
            while idx < colony.construction_queue.len() {
                if colony.construction_queue[idx].turns_remaining == 0 {
                    let project = colony.construction_queue.remove(idx);
                    finished.push(project.kind);
                } else {
                    idx += 1;
                }
            }
        }
        for kind in finished {
            state
                .pending_commissions
                .push(crate::colony::CompletedProject {
                    colony: colony_id,
                    kind,
                });
        }
    }
}

/// Advance drydock repairs; finished jobs uncripple the hull.
fn advance_repairs(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let _ = events;
    let colony_ids: Vec<_> = state.colonies.keys().copied().collect();
    for colony_id in colony_ids {
        let mut done = Vec::new();
        if let Some(colony) = state.colony_mut(colony_id) {
            for job in &mut colony.repair_queue {
                job.turns_remaining = job.turns_remaining.saturating_sub(1);
            }
            colony.repair_queue.retain(|job| {
                if job.turns_remaining == 0 {
                    done.push((job.fleet, job.ship));
                    false
                } else {
                    true
                }
            });
        }
        for (fleet_id, ship_id) in done {
            if let Some(fleet) = state.fleet_mut(fleet_id) {
                for squadron in &mut fleet.squadrons {
                    if squadron.flagship.id == ship_id {
                        squadron.flagship.crippled = false;
                    }
                    for escort in &mut squadron.escorts {
                        if escort.id == ship_id {
                            escort.crippled = false;
                        }
                    }
                }
            }
        }
    }
}

/// Convert banked RP into tech levels.
fn advance_research(state: &mut GameState, config: &GameConfig, events: &mut Vec<GameEvent>) {
    let threshold = config.economy.rp_per_tech_level;
    let houses: Vec<HouseId> = state.living_houses();
    for house_id in houses {
        let mut advanced: Vec<(TechField, u32)> = Vec::new();
        if let Some(house) = state.house_mut(house_id) {
            for &field in TechField::all() {
                let rp = house.tech.accumulated_rp.entry(field).or_insert(0);
                while *rp >= threshold {
                    *rp -= threshold;
                    let level = house.tech.levels.entry(field).or_insert(1);
                    *level += 1;
                    advanced.push((field, *level));
                }
            }
        }
        for (field, level) in advanced {
            events.push(GameEvent::TechAdvanced {
                house: house_id,
                field,
                level,
            });
            state.award_prestige(
                house_id,
                config.prestige.tech_level_gained,
                "Research breakthrough",
                events,
            );
        }
    }
}

/// Player diplomatic actions, then escalations owed from detected spy
/// scouts: detection moves the detector's stance on the spy to at least
/// Hostile, never downward, and never touches the reverse relation.
fn execute_diplomacy(
    state: &mut GameState,
    config: &GameConfig,
    docket: &MaintenanceDocket,
    events: &mut Vec<GameEvent>,
) {
    for (house, actions) in &docket.diplomatic {
        diplomacy::execute_actions(state, config, *house, actions, events);
    }

    let losses = std::mem::take(&mut state.scout_loss_events);
    for loss in losses {
        diplomacy::escalate_relation(
            state,
            loss.detected_by,
            loss.house,
            DiplomaticState::Hostile,
            "Spy scout detected",
            events,
        );
    }
}

fn execute_population_transfers(
    state: &mut GameState,
    docket: &MaintenanceDocket,
    events: &mut Vec<GameEvent>,
) {
    for (house, transfer) in &docket.transfers {
        // Re-validate: the world changed since admission.
        let ok = crate::validate::population_transfer(state, *house, transfer).is_ok();
        if !ok {
            events.push(GameEvent::OrderFailed {
                house: *house,
                fleet: None,
                order: "PopulationTransfer".to_string(),
                reason: "transfer no longer valid".to_string(),
            });
            continue;
        }
        if let Some(from) = state.colony_mut(transfer.from) {
            from.population -= transfer.ptu;
            from.souls = u64::from(from.population) * 1_000_000;
        }
        if let Some(to) = state.colony_mut(transfer.to) {
            to.population += transfer.ptu;
            to.souls = u64::from(to.population) * 1_000_000;
        }
        events.push(GameEvent::PopulationTransferred {
            from: transfer.from,
            to: transfer.to,
            ptu: transfer.ptu,
        });
    }
}

fn advance_terraforming(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let mut finished = Vec::new();
    for colony in state.colonies.values_mut() {
        if let Some(project) = colony.terraform.as_mut() {
            project.turns_remaining = project.turns_remaining.saturating_sub(1);
            if project.turns_remaining == 0 {
                finished.push((colony.id, colony.system, project.target_class));
                colony.terraform = None;
            }
        }
    }
    for (colony_id, system, class) in finished {
        state.star_map.set_planet_class(system, class);
        events.push(GameEvent::TerraformCompleted {
            colony: colony_id,
            class,
        });
    }
}

/// End-of-turn cleanup: drop stale references and refresh blockade flags.
fn cleanup(state: &mut GameState) {
    let live_fleets: Vec<_> = state.fleets.keys().copied().collect();
    state
        .colonize_intents
        .retain(|fleet, _| live_fleets.contains(fleet));
    state.pending_espionage.retain(|house, _| {
        state
            .houses
            .get(house)
            .map(|h| !h.eliminated)
            .unwrap_or(false)
    });

    // Repair queues must not point at vanished hulls.
    let fleet_ships: BTreeMap<crate::ids::FleetId, Vec<crate::ids::ShipId>> = state
        .fleets
        .iter()
        .map(|(&id, fleet)| {
            let ships = fleet
                .squadrons
                .iter()
                .flat_map(|s| {
                    std::iter::once(s.flagship.id).chain(s.escorts.iter().map(|e| e.id))
                })
                .collect();
            (id, ships)
        })
        .collect();
    for colony in state.colonies.values_mut() {
        colony.repair_queue.retain(|job| {
            fleet_ships
                .get(&job.fleet)
                .map(|ships| ships.contains(&job.ship))
                .unwrap_or(false)
        });
    }

    let blockaded: Vec<_> = state.blockades.keys().copied().collect();
    for colony in state.colonies.values_mut() {
        colony.blockaded = blockaded.contains(&colony.system);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::{Colony, ConstructionProject, ProjectKind};
    use crate::fleet::{Fleet, Squadron};
    use crate::house::House;
    use crate::ids::{ColonyId, FleetId, ShipId, SquadronId, SystemId};
    use crate::order::{DiplomaticAction, FleetOrder, PopulationTransfer};
    use crate::starmap::{PlanetClass, ResourceRating, StarMap, System};
    use crate::state::ScoutLossEvent;
    use crate::unit::{Ship, ShipClass};

    fn maint_state() -> GameState {
        let systems = (0..3)
            .map(|i| System {
                id: SystemId(i),
                name: format!("S{i}"),
                planet_class: PlanetClass::Benign,
                resource_rating: ResourceRating::Abundant,
            })
            .collect();
        let lanes = vec![(SystemId(0), SystemId(1)), (SystemId(1), SystemId(2))];
        let mut state = GameState::new(5, StarMap::new(systems, lanes));
        state
            .houses
            .insert(HouseId(0), House::new(HouseId(0), "A".into(), 100));
        state
            .houses
            .insert(HouseId(1), House::new(HouseId(1), "B".into(), 100));
        state.insert_colony(Colony::new(ColonyId(0), HouseId(0), SystemId(0), 20));
        state
    }

    #[test]
    fn test_turn_increments() {
        let mut state = maint_state();
        let config = GameConfig::standard();
        let mut events = Vec::new();
        run(&mut state, &config, &MaintenanceDocket::default(), &mut events).unwrap();
        assert_eq!(state.turn, 2);
    }

    #[test]
    fn test_pending_move_executes() {
        let mut state = maint_state();
        let config = GameConfig::standard();
        let mut fleet = Fleet::new(FleetId(0), HouseId(0), SystemId(0));
        fleet.squadrons.push(Squadron::new(
            SquadronId(0),
            Ship::new(ShipId(0), ShipClass::Frigate),
        ));
        state.insert_fleet(fleet);
        state
            .pending_moves
            .insert(FleetId(0), FleetOrder::Move { to: SystemId(1) });

        let mut events = Vec::new();
        run(&mut state, &config, &MaintenanceDocket::default(), &mut events).unwrap();
        assert_eq!(state.fleet(FleetId(0)).unwrap().location, SystemId(1));
    }

    #[test]
    fn test_construction_completes_into_commissions() {
        let mut state = maint_state();
        let config = GameConfig::standard();
        state
            .colony_mut(ColonyId(0))
            .unwrap()
            .construction_queue
            .push(ConstructionProject {
                kind: ProjectKind::Ship(ShipClass::Frigate),
                turns_remaining: 1,
            });
        let mut events = Vec::new();
        run(&mut state, &config, &MaintenanceDocket::default(), &mut events).unwrap();
        assert!(state.colony(ColonyId(0)).unwrap().construction_queue.is_empty());
        assert_eq!(state.pending_commissions.len(), 1);
    }

    #[test]
    fn test_research_levels_up_with_prestige() {
        let mut state = maint_state();
        let config = GameConfig::standard();
        state
            .houses
            .get_mut(&HouseId(0))
            .unwrap()
            .tech
            .accumulated_rp
            .insert(TechField::Weapons, config.economy.rp_per_tech_level + 5);

        let mut events = Vec::new();
        run(&mut state, &config, &MaintenanceDocket::default(), &mut events).unwrap();
        let house = &state.houses[&HouseId(0)];
        assert_eq!(house.tech.level(TechField::Weapons), 2);
        assert_eq!(
            house.tech.accumulated_rp[&TechField::Weapons],
            5
        );
        assert_eq!(house.prestige, config.prestige.tech_level_gained);
    }

    #[test]
    fn test_scout_loss_escalates_detector_only() {
        let mut state = maint_state();
        let config = GameConfig::standard();
        state.scout_loss_events.push(ScoutLossEvent {
            house: HouseId(0),
            system: SystemId(1),
            detected_by: HouseId(1),
            turn: 1,
        });
        let mut events = Vec::new();
        run(&mut state, &config, &MaintenanceDocket::default(), &mut events).unwrap();

        // The detector hardens its stance on the spy.
        assert_eq!(
            state.houses[&HouseId(1)].relation(HouseId(0)),
            DiplomaticState::Hostile
        );
        // The spy's own stance is untouched.
        assert_eq!(
            state.houses[&HouseId(0)].relation(HouseId(1)),
            DiplomaticState::Neutral
        );
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::DiplomaticRelationChanged { reason, .. } if reason == "Spy scout detected"
        )));
        assert!(state.scout_loss_events.is_empty());
    }

    #[test]
    fn test_escalation_never_demotes_enemy() {
        let mut state = maint_state();
        let config = GameConfig::standard();
        state
            .houses
            .get_mut(&HouseId(1))
            .unwrap()
            .relations
            .insert(HouseId(0), DiplomaticState::Enemy);
        state.scout_loss_events.push(ScoutLossEvent {
            house: HouseId(0),
            system: SystemId(1),
            detected_by: HouseId(1),
            turn: 1,
        });
        let mut events = Vec::new();
        run(&mut state, &config, &MaintenanceDocket::default(), &mut events).unwrap();
        assert_eq!(
            state.houses[&HouseId(1)].relation(HouseId(0)),
            DiplomaticState::Enemy
        );
    }

    #[test]
    fn test_diplomatic_actions_execute() {
        let mut state = maint_state();
        let config = GameConfig::standard();
        let docket = MaintenanceDocket {
            diplomatic: vec![(
                HouseId(0),
                vec![DiplomaticAction::DeclareEnemy { target: HouseId(1) }],
            )],
            transfers: Vec::new(),
        };
        let mut events = Vec::new();
        run(&mut state, &config, &docket, &mut events).unwrap();
        assert_eq!(
            state.houses[&HouseId(0)].relation(HouseId(1)),
            DiplomaticState::Enemy
        );
    }

    #[test]
    fn test_population_transfer_moves_ptu() {
        let mut state = maint_state();
        let config = GameConfig::standard();
        state.insert_colony(Colony::new(ColonyId(1), HouseId(0), SystemId(2), 5));
        let docket = MaintenanceDocket {
            diplomatic: Vec::new(),
            transfers: vec![(
                HouseId(0),
                PopulationTransfer {
                    from: ColonyId(0),
                    to: ColonyId(1),
                    ptu: 4,
                },
            )],
        };
        let mut events = Vec::new();
        run(&mut state, &config, &docket, &mut events).unwrap();
        assert_eq!(state.colony(ColonyId(0)).unwrap().population, 16);
        assert_eq!(state.colony(ColonyId(1)).unwrap().population, 9);
    }

    #[test]
    fn test_terraform_completion_upgrades_class() {
        let mut state = maint_state();
        let config = GameConfig::standard();
        state.colony_mut(ColonyId(0)).unwrap().terraform =
            Some(crate::colony::TerraformProject {
                target_class: PlanetClass::Gaia,
                turns_remaining: 1,
            });
        let mut events = Vec::new();
        run(&mut state, &config, &MaintenanceDocket::default(), &mut events).unwrap();
        assert_eq!(
            state.star_map.system(SystemId(0)).unwrap().planet_class,
            PlanetClass::Gaia
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::TerraformCompleted { .. })));
    }
}
