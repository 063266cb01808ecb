//! Victory, elimination, and defensive collapse checks.

use crate::config::GameConfig;
use crate::event::GameEvent;
use crate::ids::HouseId;
use crate::state::GameState;

/// Result of a victory check.
#[derive(Clone, Debug)]
pub struct VictoryResult {
    pub winner: HouseId,
    pub reason: String,
}

/// Eliminate houses with nothing left, then look for a winner.
pub fn check(
    state: &mut GameState,
    config: &GameConfig,
    events: &mut Vec<GameEvent>,
) -> Option<VictoryResult> {
    // Elimination: no colonies and no fleets, or no colonies and no
    // fighting strength left to take one back.
    for house_id in state.living_houses() {
        let colonies = state.owned_colony_ids(house_id).len();
        if colonies > 0 {
            continue;
        }
        let fleet_ids = state.owned_fleet_ids(house_id);
        let fleet_strength: u32 = fleet_ids
            .iter()
            .filter_map(|id| state.fleet(*id))
            .map(|f| f.attack_strength(config))
            .sum();
        let reason = if fleet_ids.is_empty() {
            "All colonies and fleets lost"
        } else if fleet_strength == 0 {
            "Defensive collapse: no colonies and no fighting strength"
        } else {
            continue;
        };
        if let Some(house) = state.house_mut(house_id) {
            house.eliminated = true;
        }
        events.push(GameEvent::HouseEliminated {
            house: house_id,
            reason: reason.to_string(),
        });
    }

    // Last house standing wins outright.
    let living = state.living_houses();
    if living.len() == 1 {
        let winner = living[0];
        let result = VictoryResult {
            winner,
            reason: "Sole surviving house".to_string(),
        };
        events.push(GameEvent::VictoryAchieved {
            house: winner,
            reason: result.reason.clone(),
        });
        return Some(result);
    }

    // Prestige threshold: highest qualifying house wins.
    let mut best: Option<(i32, HouseId)> = None;
    for house_id in living {
        let prestige = state.houses[&house_id].prestige;
        if prestige >= config.setup.victory_prestige
            && best.map(|(p, _)| prestige > p).unwrap_or(true)
        {
            best = Some((prestige, house_id));
        }
    }
    if let Some((prestige, winner)) = best {
        let result = VictoryResult {
            winner,
            reason: format!("Prestige {prestige} reached the victory threshold"),
        };
        events.push(GameEvent::VictoryAchieved {
            house: winner,
            reason: result.reason.clone(),
        });
        return Some(result);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::Colony;
    use crate::house::House;
    use crate::ids::{ColonyId, SystemId};
    use crate::starmap::{PlanetClass, ResourceRating, StarMap, System};

    fn base_state() -> GameState {
        let systems = vec![System {
            id: SystemId(0),
            name: "Home".into(),
            planet_class: PlanetClass::Benign,
            resource_rating: ResourceRating::Abundant,
        }];
        let mut state = GameState::new(1, StarMap::new(systems, vec![]));
        for i in 0..2 {
            state
                .houses
                .insert(HouseId(i), House::new(HouseId(i), format!("H{i}"), 100));
            state.insert_colony(Colony::new(ColonyId(i), HouseId(i), SystemId(0), 10));
        }
        state
    }

    #[test]
    fn test_no_winner_early() {
        let mut state = base_state();
        let config = GameConfig::standard();
        let mut events = Vec::new();
        assert!(check(&mut state, &config, &mut events).is_none());
    }

    #[test]
    fn test_prestige_victory() {
        let mut state = base_state();
        let config = GameConfig::standard();
        state.houses.get_mut(&HouseId(1)).unwrap().prestige =
            config.setup.victory_prestige + 10;
        let mut events = Vec::new();
        let result = check(&mut state, &config, &mut events).unwrap();
        assert_eq!(result.winner, HouseId(1));
    }

    #[test]
    fn test_elimination_and_sole_survivor() {
        let mut state = base_state();
        let config = GameConfig::standard();
        // Strip house 1 of everything.
        let ids = state.owned_colony_ids(HouseId(1));
        for id in ids {
            state.transfer_colony(id, HouseId(0));
        }
        let mut events = Vec::new();
        let result = check(&mut state, &config, &mut events).unwrap();
        assert_eq!(result.winner, HouseId(0));
        assert!(state.houses[&HouseId(1)].eliminated);
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::HouseEliminated { .. })));
    }
}
