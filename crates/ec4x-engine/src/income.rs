//! The Income Phase: production, maintenance, salvage, capacity
//! enforcement, prestige, victory checks, and timer advancement.

use log::debug;
use std::collections::BTreeMap;

use crate::capacity;
use crate::config::GameConfig;
use crate::error::EngineError;
use crate::espionage::{self, EffectKind};
use crate::event::GameEvent;
use crate::fleet::FleetStatus;
use crate::ids::HouseId;
use crate::movement;
use crate::order::FleetOrder;
use crate::state::GameState;
use crate::victory;

/// Run the full Income Phase.
pub fn run(
    state: &mut GameState,
    config: &GameConfig,
    events: &mut Vec<GameEvent>,
) -> Result<(), EngineError> {
    debug!("income phase: turn {}", state.turn);

    update_blockade_flags(state);
    let production = compute_production(state, config);
    pay_maintenance(state, config, events);
    execute_salvage_orders(state, config, events);
    capacity::enforce(state, config, events);

    // Production (and any seizure payments already banked) land after
    // maintenance so a starving house cannot spend this turn's income on
    // last turn's upkeep.
    for (house, amount) in production {
        if amount > 0 {
            state.credit_treasury(house, amount);
            events.push(GameEvent::ProductionCollected { house, amount });
        }
    }

    apply_policy_prestige(state, config, events);
    grow_population(state, config);
    victory::check(state, config, events);

    espionage::tick_effects(state, config, events);
    capacity::tick_grace_timers(state);
    for house in state.houses.values_mut() {
        house.tallies = Default::default();
    }

    Ok(())
}

/// Mirror the blockade table onto colony flags.
fn update_blockade_flags(state: &mut GameState) {
    let blockaded: Vec<_> = state.blockades.keys().copied().collect();
    for colony in state.colonies.values_mut() {
        colony.blockaded = blockaded.contains(&colony.system);
    }
}

/// Per-house production after tax, blockade, and sabotage effects.
fn compute_production(state: &GameState, config: &GameConfig) -> BTreeMap<HouseId, u32> {
    let mut production: BTreeMap<HouseId, u32> = BTreeMap::new();
    for colony in state.colonies.values() {
        if colony.depopulated {
            continue;
        }
        let Some(system) = state.star_map.system(colony.system) else {
            continue;
        };
        let gross = colony.gross_output(
            system.planet_class.production_pct(),
            system.resource_rating.production_pct(),
        );
        let mut pp = gross * colony.tax_rate.min(100) / 100;
        if colony.blockaded {
            pp = pp * config.economy.blockade_penalty_pct / 100;
        }
        if espionage::any_effect_on(state, EffectKind::ProductionSiphon, colony.owner) {
            pp = pp * 3 / 4;
        }
        *production.entry(colony.owner).or_insert(0) += pp;
    }
    production
}

/// Deduct upkeep for ships, facilities, and ground forces. A treasury
/// that cannot cover it is zeroed and the shortfall costs prestige.
fn pay_maintenance(state: &mut GameState, config: &GameConfig, events: &mut Vec<GameEvent>) {
    let mut bills: BTreeMap<HouseId, u32> = BTreeMap::new();

    for fleet in state.fleets.values() {
        let mut upkeep: u32 = 0;
        for squadron in &fleet.squadrons {
            upkeep += config.ship(squadron.flagship.class).maintenance;
            for ship in squadron.escorts.iter().chain(squadron.fighters.iter()) {
                upkeep += config.ship(ship.class).maintenance;
            }
        }
        for ship in &fleet.spacelift {
            upkeep += config.ship(ship.class).maintenance;
        }
        let upkeep = match fleet.status {
            FleetStatus::Active => upkeep,
            FleetStatus::Reserve => upkeep * config.economy.reserve_maintenance_pct / 100,
            FleetStatus::Mothballed => 0,
        };
        *bills.entry(fleet.owner).or_insert(0) += upkeep;
    }

    for colony in state.colonies.values() {
        let mut upkeep = colony.spaceports * 2 + colony.shipyards * 3 + colony.drydocks * 2;
        upkeep += colony.ground_batteries + colony.shield_level * 2;
        for base in &colony.starbases {
            upkeep += config.ship(base.class).maintenance;
        }
        for unit in colony.armies.iter().chain(colony.marines.iter()) {
            upkeep += config.ground_unit(unit.class).maintenance;
        }
        for fighter in &colony.fighters {
            upkeep += config.ship(fighter.class).maintenance;
        }
        *bills.entry(colony.owner).or_insert(0) += upkeep;
    }

    for (house, bill) in bills {
        if bill == 0 {
            continue;
        }
        let shortfall = state.debit_treasury(house, bill);
        events.push(GameEvent::MaintenancePaid {
            house,
            amount: bill - shortfall,
        });
        if shortfall > 0 {
            events.push(GameEvent::MaintenanceShortfall { house, shortfall });
            state.award_prestige(
                house,
                config.prestige.maintenance_shortfall,
                "Maintenance shortfall",
                events,
            );
        }
    }
}

/// Execute Salvage orders stored last turn for fleets that survived the
/// Conflict Phase.
fn execute_salvage_orders(state: &mut GameState, config: &GameConfig, events: &mut Vec<GameEvent>) {
    let salvagers: Vec<_> = state
        .fleet_commands
        .iter()
        .filter(|(_, cmd)| matches!(cmd.order, FleetOrder::Salvage))
        .map(|(&id, _)| id)
        .collect();
    for fleet_id in salvagers {
        state.fleet_commands.remove(&fleet_id);
        movement::execute_salvage(state, config, fleet_id, events);
    }
}

/// Tax-band and blockade prestige.
fn apply_policy_prestige(state: &mut GameState, config: &GameConfig, events: &mut Vec<GameEvent>) {
    let mut light: BTreeMap<HouseId, i32> = BTreeMap::new();
    let mut oppressive: BTreeMap<HouseId, i32> = BTreeMap::new();
    for colony in state.colonies.values() {
        if colony.depopulated {
            continue;
        }
        if colony.tax_rate <= config.economy.light_tax_pct {
            *light.entry(colony.owner).or_insert(0) += 1;
        } else if colony.tax_rate > config.economy.oppressive_tax_pct {
            *oppressive.entry(colony.owner).or_insert(0) += 1;
        }
    }
    for (house, count) in light {
        state.award_prestige(
            house,
            config.prestige.light_tax_bonus * count,
            "Light taxation",
            events,
        );
    }
    for (house, count) in oppressive {
        state.award_prestige(
            house,
            config.prestige.oppressive_tax_penalty * count,
            "Oppressive taxation",
            events,
        );
    }

    let blockades: Vec<_> = state
        .blockades
        .values()
        .map(|b| (b.controller, b.system))
        .collect();
    for (controller, system) in blockades {
        state.award_prestige(
            controller,
            config.prestige.blockade_imposed,
            "Blockade maintained",
            events,
        );
        if let Some(owner) = state.colony_at(system).map(|c| c.owner) {
            state.award_prestige(
                owner,
                config.prestige.blockade_suffered,
                "Colony under blockade",
                events,
            );
        }
    }
}

/// Grow colony populations toward the planet-class ceiling. Blockaded and
/// depopulated colonies stand still.
fn grow_population(state: &mut GameState, config: &GameConfig) {
    let caps: BTreeMap<_, _> = state
        .star_map
        .systems()
        .map(|s| (s.id, s.planet_class.population_cap()))
        .collect();
    for colony in state.colonies.values_mut() {
        if colony.blockaded || colony.depopulated || colony.population == 0 {
            continue;
        }
        let cap = caps.get(&colony.system).copied().unwrap_or(u32::MAX);
        if colony.population >= cap {
            continue;
        }
        let growth =
            (colony.population * config.economy.population_growth_per_100 / 100).max(1);
        colony.population = (colony.population + growth).min(cap);
        colony.souls = u64::from(colony.population) * 1_000_000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::Colony;
    use crate::fleet::{Fleet, Squadron};
    use crate::house::House;
    use crate::ids::{ColonyId, FleetId, ShipId, SquadronId, SystemId};
    use crate::starmap::{PlanetClass, ResourceRating, StarMap, System};
    use crate::state::{Blockade, FleetCommand};
    use crate::unit::{Ship, ShipClass};

    fn economy_state() -> GameState {
        let systems = vec![
            System {
                id: SystemId(0),
                name: "Home".into(),
                planet_class: PlanetClass::Benign,
                resource_rating: ResourceRating::Abundant,
            },
            System {
                id: SystemId(1),
                name: "Far".into(),
                planet_class: PlanetClass::Benign,
                resource_rating: ResourceRating::Abundant,
            },
        ];
        let lanes = vec![(SystemId(0), SystemId(1))];
        let mut state = GameState::new(17, StarMap::new(systems, lanes));
        state
            .houses
            .insert(HouseId(0), House::new(HouseId(0), "A".into(), 100));
        state
            .houses
            .insert(HouseId(1), House::new(HouseId(1), "B".into(), 100));
        let mut colony = Colony::new(ColonyId(0), HouseId(0), SystemId(0), 10);
        colony.infrastructure = 100;
        colony.tax_rate = 50;
        state.insert_colony(colony);
        state.insert_colony(Colony::new(ColonyId(1), HouseId(1), SystemId(1), 10));
        state
    }

    #[test]
    fn test_production_credited() {
        let mut state = economy_state();
        let config = GameConfig::standard();
        let mut events = Vec::new();
        run(&mut state, &config, &mut events).unwrap();
        // 100 IU x 100% x 100% = 100 gross, 50% tax -> 50 PP.
        assert_eq!(state.houses[&HouseId(0)].treasury, 150);
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::ProductionCollected { house: HouseId(0), amount: 50 }
        )));
    }

    #[test]
    fn test_blockade_halves_production() {
        let mut state = economy_state();
        let config = GameConfig::standard();
        state.blockades.insert(
            SystemId(0),
            Blockade {
                system: SystemId(0),
                controller: HouseId(1),
                fleet: FleetId(99),
                since_turn: 1,
            },
        );
        // The blockading fleet must exist for the audit to hold; give it
        // a hull.
        let mut fleet = Fleet::new(FleetId(99), HouseId(1), SystemId(0));
        fleet.squadrons.push(Squadron::new(
            SquadronId(0),
            Ship::new(ShipId(50), ShipClass::Frigate),
        ));
        state.insert_fleet(fleet);

        let mut events = Vec::new();
        run(&mut state, &config, &mut events).unwrap();
        // 50 PP halved to 25, minus nothing else. Frigate upkeep bills
        // house 1, not house 0.
        let house0 = &state.houses[&HouseId(0)];
        assert_eq!(house0.treasury, 125);
        // Blockade prestige flows both ways.
        assert!(house0.prestige < 0 || house0.prestige < state.houses[&HouseId(1)].prestige);
    }

    #[test]
    fn test_maintenance_shortfall_penalizes_prestige() {
        let mut state = economy_state();
        let config = GameConfig::standard();
        state.houses.get_mut(&HouseId(0)).unwrap().treasury = 0;
        // An upkeep bill with no income to match. Escort hulls stay under
        // the capacity caps, so no seizure payment muddies the treasury.
        let mut fleet = Fleet::new(FleetId(0), HouseId(0), SystemId(0));
        for i in 0..10 {
            fleet.squadrons.push(Squadron::new(
                SquadronId(i),
                Ship::new(ShipId(i), ShipClass::Frigate),
            ));
        }
        state.insert_fleet(fleet);
        state.colony_mut(ColonyId(0)).unwrap().infrastructure = 0;

        let mut events = Vec::new();
        run(&mut state, &config, &mut events).unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::MaintenanceShortfall { .. })));
        assert!(state.houses[&HouseId(0)].prestige < 0);
        // Treasury clamps at zero, never negative.
        assert_eq!(state.houses[&HouseId(0)].treasury, 0);
    }

    #[test]
    fn test_mothballed_fleet_pays_nothing() {
        let mut state = economy_state();
        let config = GameConfig::standard();
        state.colony_mut(ColonyId(0)).unwrap().infrastructure = 0;
        let mut fleet = Fleet::new(FleetId(0), HouseId(0), SystemId(0));
        fleet.squadrons.push(Squadron::new(
            SquadronId(0),
            Ship::new(ShipId(0), ShipClass::Battleship),
        ));
        fleet.status = FleetStatus::Mothballed;
        state.insert_fleet(fleet);

        let mut events = Vec::new();
        run(&mut state, &config, &mut events).unwrap();
        assert_eq!(state.houses[&HouseId(0)].treasury, 100);
    }

    #[test]
    fn test_salvage_order_executes_in_income() {
        let mut state = economy_state();
        let config = GameConfig::standard();
        state.colony_mut(ColonyId(0)).unwrap().spaceports = 1;
        let mut fleet = Fleet::new(FleetId(0), HouseId(0), SystemId(0));
        for i in 0..3 {
            fleet.squadrons.push(Squadron::new(
                SquadronId(i),
                Ship::new(ShipId(i), ShipClass::Frigate),
            ));
        }
        state.insert_fleet(fleet);
        state.fleet_commands.insert(
            FleetId(0),
            FleetCommand {
                order: FleetOrder::Salvage,
                issued_turn: 1,
            },
        );

        let mut events = Vec::new();
        run(&mut state, &config, &mut events).unwrap();
        assert!(state.fleet(FleetId(0)).is_none());
        assert!(state.fleet_commands.is_empty());
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::SalvageCompleted { refund: 45, .. })));
    }

    #[test]
    fn test_population_grows_toward_cap() {
        let mut state = economy_state();
        let config = GameConfig::standard();
        let before = state.colony(ColonyId(0)).unwrap().population;
        let mut events = Vec::new();
        run(&mut state, &config, &mut events).unwrap();
        assert!(state.colony(ColonyId(0)).unwrap().population > before);
    }
}
