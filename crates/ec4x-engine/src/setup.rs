//! Initial game state construction.
//!
//! Consumes a finished star map (generation is the map tool's job) plus a
//! homeworld assignment per house and produces the turn-1 `GameState`.

use serde::{Deserialize, Serialize};

use crate::colony::Colony;
use crate::config::GameConfig;
use crate::error::EngineError;
use crate::fleet::{Fleet, Squadron};
use crate::house::House;
use crate::ids::{HouseId, SystemId};
use crate::starmap::StarMap;
use crate::state::GameState;
use crate::unit::{Ship, ShipClass};

/// One house's starting position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HouseSetup {
    pub name: String,
    pub homeworld: SystemId,
}

/// Build the starting state: one developed homeworld and a small starter
/// fleet per house.
pub fn create_initial_state(
    config: &GameConfig,
    star_map: StarMap,
    houses: &[HouseSetup],
    seed: u64,
) -> Result<GameState, EngineError> {
    if houses.len() < 2 {
        return Err(EngineError::SetupError(
            "a game needs at least two houses".into(),
        ));
    }
    for (i, setup) in houses.iter().enumerate() {
        if !star_map.contains(setup.homeworld) {
            return Err(EngineError::SetupError(format!(
                "homeworld {} is not on the star map",
                setup.homeworld
            )));
        }
        if houses[..i].iter().any(|h| h.homeworld == setup.homeworld) {
            return Err(EngineError::SetupError(format!(
                "homeworld {} assigned twice",
                setup.homeworld
            )));
        }
    }

    let mut state = GameState::new(seed, star_map);

    for (i, setup) in houses.iter().enumerate() {
        let house_id = HouseId(i as u32);
        state.houses.insert(
            house_id,
            House::new(house_id, setup.name.clone(), config.setup.starting_treasury),
        );

        let colony_id = state.id_counters.next_colony();
        let mut colony = Colony::new(
            colony_id,
            house_id,
            setup.homeworld,
            config.setup.starting_population,
        );
        colony.infrastructure = config.setup.starting_infrastructure;
        colony.spaceports = 1;
        colony.shipyards = 1;
        colony.drydocks = 1;
        state.insert_colony(colony);

        let fleet_id = state.id_counters.next_fleet();
        let mut fleet = Fleet::new(fleet_id, house_id, setup.homeworld);
        for class in [ShipClass::Frigate, ShipClass::Scout] {
            let ship = Ship::new(state.id_counters.next_ship(), class);
            fleet
                .squadrons
                .push(Squadron::new(state.id_counters.next_squadron(), ship));
        }
        let mut etac = Ship::new(state.id_counters.next_ship(), ShipClass::Etac);
        etac.cargo.ptu = 1;
        fleet.spacelift.push(etac);
        state.insert_fleet(fleet);
    }

    state.audit(config)?;
    Ok(state)
}
