//! EC4X turn resolution core.
//!
//! A deterministic engine for a simultaneous-resolution 4X game: every
//! house submits an order packet, and `Engine::resolve_turn` drives the
//! four-phase pipeline (Conflict -> Income -> Command -> Maintenance)
//! that produces the next state, the turn's event log, per-house
//! intelligence deltas, and combat reports.
//!
//! The engine is a pure function of `(config, state, packets)`: no clock,
//! no I/O, no global RNG. Map generation, config file loading, transport,
//! and UI all live outside this crate.

pub mod capacity;
pub mod colony;
pub mod combat;
pub mod command;
pub mod config;
pub mod conflict;
pub mod diplomacy;
pub mod dice;
pub mod error;
pub mod espionage;
pub mod event;
pub mod fleet;
pub mod house;
pub mod ids;
pub mod income;
pub mod intel;
pub mod maintenance;
pub mod movement;
pub mod order;
pub mod phase;
pub mod planetary;
pub mod resolver;
pub mod save;
pub mod setup;
pub mod starmap;
pub mod state;
pub mod unit;
pub mod validate;
pub mod victory;

use std::collections::BTreeMap;

use config::GameConfig;
use error::EngineError;
use event::{CombatReport, GameEvent};
use ids::HouseId;
use intel::IntelDelta;
use order::OrderPacket;
use phase::Phase;
use setup::HouseSetup;
use starmap::StarMap;
use state::GameState;

/// Everything one resolved turn hands back to the outside world.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// The turn log, in emission order.
    pub events: Vec<GameEvent>,
    /// Battle summaries for UI consumption.
    pub combat_reports: Vec<CombatReport>,
    /// Per-house fog-of-war change sets; the only thing clients receive.
    pub intel_deltas: BTreeMap<HouseId, IntelDelta>,
}

/// The turn resolution engine. Single source of truth for game rules.
pub struct Engine {
    config: GameConfig,
    state: GameState,
}

impl Engine {
    /// Start a new game from a finished star map and homeworld
    /// assignments.
    pub fn new_game(
        config: GameConfig,
        star_map: StarMap,
        houses: &[HouseSetup],
        seed: u64,
    ) -> Result<Self, EngineError> {
        let state = setup::create_initial_state(&config, star_map, houses, seed)?;
        Ok(Engine { config, state })
    }

    /// Restore an engine from a previously serialized game state.
    pub fn from_state(config: GameConfig, state: GameState) -> Self {
        Engine { config, state }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Resolve one full turn. A house with no packet submits an empty
    /// one. On any fatal error the turn is NOT committed: the caller
    /// keeps the previous state by reloading the last save.
    pub fn resolve_turn(
        &mut self,
        packets: &BTreeMap<HouseId, OrderPacket>,
    ) -> Result<TurnOutcome, EngineError> {
        let resolving = self.state.turn;
        let mut events = Vec::new();
        let mut reports = Vec::new();

        conflict::run(&mut self.state, &self.config, &mut events, &mut reports)?;
        self.state.audit(&self.config)?;
        events.push(GameEvent::PhaseCompleted {
            phase: Phase::Conflict,
            turn: resolving,
        });

        income::run(&mut self.state, &self.config, &mut events)?;
        self.state.audit(&self.config)?;
        events.push(GameEvent::PhaseCompleted {
            phase: Phase::Income,
            turn: resolving,
        });

        let docket = command::run(&mut self.state, &self.config, packets, &mut events)?;
        self.state.audit(&self.config)?;
        events.push(GameEvent::PhaseCompleted {
            phase: Phase::Command,
            turn: resolving,
        });

        maintenance::run(&mut self.state, &self.config, &docket, &mut events)?;
        self.state.audit(&self.config)?;
        events.push(GameEvent::PhaseCompleted {
            phase: Phase::Maintenance,
            turn: resolving,
        });

        let intel_deltas = intel::refresh_all(&mut self.state, &self.config);
        events.push(GameEvent::TurnResolved { turn: resolving });

        Ok(TurnOutcome {
            events,
            combat_reports: reports,
            intel_deltas,
        })
    }

    /// Serialize the game state to JSON (client bridge).
    pub fn serialize_state_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(&self.state).map_err(|e| EngineError::Serialization(e.to_string()))
    }

    /// Serialize the game state to MessagePack bytes (save files).
    pub fn serialize_state(&self) -> Result<Vec<u8>, EngineError> {
        rmp_serde::to_vec(&self.state).map_err(|e| EngineError::Serialization(e.to_string()))
    }

    /// Deserialize a game state from MessagePack bytes.
    pub fn deserialize_state(data: &[u8]) -> Result<GameState, EngineError> {
        rmp_serde::from_slice(data).map_err(|e| EngineError::Deserialization(e.to_string()))
    }

    /// One-line summary for save headers and logs.
    pub fn turn_summary(&self) -> String {
        format!(
            "Turn {} - {} houses, {} colonies, {} fleets",
            self.state.turn,
            self.state.living_houses().len(),
            self.state.colonies.len(),
            self.state.fleets.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diplomacy::DiplomaticState;
    use pretty_assertions::assert_eq;
    use fleet::{Fleet, Squadron};
    use house::TechField;
    use ids::{ColonyId, FleetId, ShipId, SquadronId, SystemId};
    use order::FleetOrder;
    use starmap::{PlanetClass, ResourceRating, System};
    use state::FleetCommand;
    use unit::{Ship, ShipClass};

    fn test_map() -> StarMap {
        let systems = (0..6)
            .map(|i| System {
                id: SystemId(i),
                name: format!("S{i}"),
                planet_class: PlanetClass::Benign,
                resource_rating: ResourceRating::Abundant,
            })
            .collect();
        let lanes = (0..5).map(|i| (SystemId(i), SystemId(i + 1))).collect();
        StarMap::new(systems, lanes)
    }

    fn two_houses() -> Vec<HouseSetup> {
        vec![
            HouseSetup {
                name: "Atreides".into(),
                homeworld: SystemId(0),
            },
            HouseSetup {
                name: "Harkonnen".into(),
                homeworld: SystemId(5),
            },
        ]
    }

    fn new_engine(seed: u64) -> Engine {
        Engine::new_game(GameConfig::standard(), test_map(), &two_houses(), seed).unwrap()
    }

    fn add_frigate_fleet(engine: &mut Engine, id: u32, house: u32, at: u32, count: u32) -> FleetId {
        let mut fleet = Fleet::new(FleetId(id), HouseId(house), SystemId(at));
        for i in 0..count {
            fleet.squadrons.push(Squadron::new(
                SquadronId(1000 + id * 10 + i),
                Ship::new(ShipId(1000 + id * 10 + i), ShipClass::Frigate),
            ));
        }
        engine.state.insert_fleet(fleet);
        FleetId(id)
    }

    #[test]
    fn test_empty_turn_advances_counter_and_keeps_entities() {
        let mut engine = new_engine(42);
        let colonies_before = engine.state().colonies.len();
        let fleets_before = engine.state().fleets.len();

        let outcome = engine.resolve_turn(&BTreeMap::new()).unwrap();
        assert_eq!(engine.state().turn, 2);
        assert_eq!(engine.state().colonies.len(), colonies_before);
        assert_eq!(engine.state().fleets.len(), fleets_before);
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::TurnResolved { turn: 1 })));
        // All four phases reported.
        let phases = outcome
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::PhaseCompleted { .. }))
            .count();
        assert_eq!(phases, 4);
    }

    #[test]
    fn test_determinism_identical_runs() {
        let run = || {
            let mut engine = new_engine(777);
            // Some activity: hostile relations plus opposing fleets.
            for (a, b) in [(0u32, 1u32), (1, 0)] {
                engine
                    .state
                    .houses
                    .get_mut(&HouseId(a))
                    .unwrap()
                    .relations
                    .insert(HouseId(b), DiplomaticState::Enemy);
            }
            add_frigate_fleet(&mut engine, 100, 0, 3, 2);
            add_frigate_fleet(&mut engine, 101, 1, 3, 2);

            let mut all_events = Vec::new();
            for _ in 0..4 {
                let outcome = engine.resolve_turn(&BTreeMap::new()).unwrap();
                all_events.extend(outcome.events);
            }
            (
                engine.serialize_state_json().unwrap(),
                serde_json::to_string(&all_events).unwrap(),
            )
        };
        let (state_a, events_a) = run();
        let (state_b, events_b) = run();
        assert_eq!(state_a, state_b);
        assert_eq!(events_a, events_b);
    }

    #[test]
    fn test_serialize_resume_produces_identical_next_turn() {
        let mut original = new_engine(321);
        original.resolve_turn(&BTreeMap::new()).unwrap();

        let bytes = original.serialize_state().unwrap();
        let restored_state = Engine::deserialize_state(&bytes).unwrap();
        let mut restored = Engine::from_state(GameConfig::standard(), restored_state);

        original.resolve_turn(&BTreeMap::new()).unwrap();
        restored.resolve_turn(&BTreeMap::new()).unwrap();
        assert_eq!(
            original.serialize_state_json().unwrap(),
            restored.serialize_state_json().unwrap()
        );
    }

    #[test]
    fn test_salvage_lifecycle_across_turns() {
        let mut engine = new_engine(9);
        let fleet = add_frigate_fleet(&mut engine, 100, 0, 0, 3);

        // Turn 1: submit the salvage order (admitted, stored).
        let mut packet = OrderPacket::default();
        packet.fleet_orders.insert(fleet, FleetOrder::Salvage);
        let mut packets = BTreeMap::new();
        packets.insert(HouseId(0), packet);
        engine.resolve_turn(&packets).unwrap();
        assert!(engine.state().fleet_commands.contains_key(&fleet));
        assert!(engine.state().fleet(fleet).is_some());

        // Turn 2: the fleet survives Conflict and is scrapped in Income.
        let outcome = engine.resolve_turn(&BTreeMap::new()).unwrap();
        assert!(engine.state().fleet(fleet).is_none());
        assert!(!engine.state().fleet_commands.contains_key(&fleet));
        assert!(outcome.events.iter().any(|e| matches!(
            e,
            GameEvent::SalvageCompleted { refund: 45, .. }
        )));
    }

    #[test]
    fn test_spy_detection_escalates_detector_relation() {
        let mut engine = new_engine(55);
        // Certain detection.
        engine
            .state
            .houses
            .get_mut(&HouseId(1))
            .unwrap()
            .tech
            .levels
            .insert(TechField::CounterIntel, 30);

        let mut fleet = Fleet::new(FleetId(200), HouseId(0), SystemId(5));
        fleet.squadrons.push(Squadron::new(
            SquadronId(2000),
            Ship::new(ShipId(2000), ShipClass::Scout),
        ));
        engine.state.insert_fleet(fleet);
        let target_colony = engine.state.owned_colony_ids(HouseId(1))[0];
        engine.state.fleet_commands.insert(
            FleetId(200),
            FleetCommand {
                order: FleetOrder::SpyPlanet {
                    colony: target_colony,
                },
                issued_turn: 1,
            },
        );

        let outcome = engine.resolve_turn(&BTreeMap::new()).unwrap();
        // Detector escalates to Hostile; the spy's own stance stays put.
        assert_eq!(
            engine.state().houses[&HouseId(1)].relation(HouseId(0)),
            DiplomaticState::Hostile
        );
        assert_eq!(
            engine.state().houses[&HouseId(0)].relation(HouseId(1)),
            DiplomaticState::Neutral
        );
        assert!(outcome.events.iter().any(|e| matches!(
            e,
            GameEvent::DiplomaticRelationChanged { reason, .. } if reason == "Spy scout detected"
        )));
    }

    #[test]
    fn test_capacity_seizure_full_turn() {
        let mut engine = new_engine(3);
        // Homeworld IU 100 -> capital cap 8. Field 10 cruisers.
        let mut fleet = Fleet::new(FleetId(300), HouseId(0), SystemId(0));
        for i in 0..10 {
            fleet.squadrons.push(Squadron::new(
                SquadronId(3000 + i),
                Ship::new(ShipId(3000 + i), ShipClass::Cruiser),
            ));
        }
        engine.state.insert_fleet(fleet);

        let outcome = engine.resolve_turn(&BTreeMap::new()).unwrap();
        let seizures = outcome
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::CapitalShipSeized { .. }))
            .count();
        assert_eq!(seizures, 2);
        assert_eq!(engine.state().fleet(FleetId(300)).unwrap().squadrons.len(), 8);
    }

    #[test]
    fn test_intel_delta_emitted_per_house() {
        let mut engine = new_engine(8);
        let outcome = engine.resolve_turn(&BTreeMap::new()).unwrap();
        assert_eq!(outcome.intel_deltas.len(), 2);
        // First turn reveals each house its own homeworld.
        assert!(!outcome.intel_deltas[&HouseId(0)].systems_revealed.is_empty());
    }

    #[test]
    fn test_missing_packet_is_empty_packet() {
        let mut engine = new_engine(31);
        // Only house 0 submits; house 1's silence must not error.
        let mut packets = BTreeMap::new();
        packets.insert(HouseId(0), OrderPacket::default());
        assert!(engine.resolve_turn(&packets).is_ok());
        assert_eq!(engine.state().turn, 2);
    }

    #[test]
    fn test_turn_summary_format() {
        let engine = new_engine(1);
        let summary = engine.turn_summary();
        assert!(summary.contains("Turn 1"));
        assert!(summary.contains("2 houses"));
    }

    #[test]
    fn test_full_battle_turn_s1_shape() {
        let mut engine = new_engine(12345);
        for (a, b) in [(0u32, 1u32), (1, 0)] {
            engine
                .state
                .houses
                .get_mut(&HouseId(a))
                .unwrap()
                .relations
                .insert(HouseId(b), DiplomaticState::Enemy);
        }
        // Overwhelming tech so the outcome is one-sided at any seed.
        engine
            .state
            .houses
            .get_mut(&HouseId(0))
            .unwrap()
            .tech
            .levels
            .insert(TechField::Weapons, 6);

        let attacker = {
            let mut fleet = Fleet::new(FleetId(400), HouseId(0), SystemId(3));
            fleet.roe = 10;
            for i in 0..3 {
                fleet.squadrons.push(Squadron::new(
                    SquadronId(4000 + i),
                    Ship::new(ShipId(4000 + i), ShipClass::Cruiser),
                ));
            }
            engine.state.insert_fleet(fleet);
            FleetId(400)
        };
        let defender = {
            let mut fleet = Fleet::new(FleetId(401), HouseId(1), SystemId(3));
            fleet.roe = 10;
            fleet.squadrons.push(Squadron::new(
                SquadronId(4100),
                Ship::new(ShipId(4100), ShipClass::Destroyer),
            ));
            fleet.squadrons.push(Squadron::new(
                SquadronId(4101),
                Ship::new(ShipId(4101), ShipClass::Frigate),
            ));
            engine.state.insert_fleet(fleet);
            FleetId(401)
        };

        let outcome = engine.resolve_turn(&BTreeMap::new()).unwrap();

        // Sole occupancy for the victor; the loser's fleet is struck from
        // the state and every order table.
        assert!(engine.state().fleet(attacker).is_some());
        assert!(engine.state().fleet(defender).is_none());
        let report = outcome
            .combat_reports
            .iter()
            .find(|r| r.system == SystemId(3))
            .unwrap();
        assert_eq!(report.victor, Some(HouseId(0)));
        assert_eq!(report.losses.get(&HouseId(1)), Some(&2));
        assert!(outcome.events.iter().any(|e| matches!(
            e,
            GameEvent::FleetDestroyed { fleet, .. } if *fleet == defender
        )));
    }
}
