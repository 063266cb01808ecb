//! The root game state: every entity, the derived indices, and the narrow
//! mutators that keep them coherent.
//!
//! `GameState` exclusively owns all entities. Cross-entity references are
//! IDs; a lookup after removal returns `None` rather than dangling. All
//! shared mutation funnels through the mutator methods here so that index
//! maintenance stays centralized and auditable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::colony::{Colony, CompletedProject};
use crate::config::GameConfig;
use crate::error::EngineError;
use crate::espionage::OngoingEffect;
use crate::event::GameEvent;
use crate::fleet::Fleet;
use crate::house::House;
use crate::ids::{ColonyId, FleetId, HouseId, IdCounters, SystemId};
use crate::intel::IntelSnapshot;
use crate::order::{EspionageAction, FleetOrder, StandingOrder};
use crate::starmap::StarMap;

/// An order stored for later execution, tagged with the turn it was issued.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FleetCommand {
    pub order: FleetOrder,
    pub issued_turn: u32,
}

/// An established blockade of a system.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Blockade {
    pub system: SystemId,
    pub controller: HouseId,
    pub fleet: FleetId,
    pub since_turn: u32,
}

/// A spy scout lost to counter-detection, pending diplomatic escalation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoutLossEvent {
    pub house: HouseId,
    pub system: SystemId,
    pub detected_by: HouseId,
    pub turn: u32,
}

/// Per-house grace timers, one per capacity category that allows grace.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GracePeriodTracker {
    /// Turns remaining before total-squadron over-cap is enforced.
    pub total_squadrons: Option<u32>,
    /// Turns remaining per over-cap colony fighter garrison.
    pub fighters: BTreeMap<ColonyId, u32>,
}

/// The complete game state. Single source of truth.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    /// Monotonic turn counter, starting at 1.
    pub turn: u32,
    /// Game-wide RNG seed.
    pub seed: u64,
    pub star_map: StarMap,
    pub houses: BTreeMap<HouseId, House>,
    pub colonies: BTreeMap<ColonyId, Colony>,
    pub fleets: BTreeMap<FleetId, Fleet>,

    // Derived indices, maintained by the mutators below.
    pub colonies_by_system: BTreeMap<SystemId, Vec<ColonyId>>,
    pub colonies_by_owner: BTreeMap<HouseId, Vec<ColonyId>>,
    pub fleets_by_location: BTreeMap<SystemId, Vec<FleetId>>,
    pub fleets_by_owner: BTreeMap<HouseId, Vec<FleetId>>,

    /// Conflict and salvage orders awaiting execution.
    pub fleet_commands: BTreeMap<FleetId, FleetCommand>,
    /// Movement and posture orders executed in this turn's Maintenance.
    pub pending_moves: BTreeMap<FleetId, FleetOrder>,
    pub standing_commands: BTreeMap<FleetId, StandingOrder>,
    /// Fleets that have arrived at a colonization target and await the
    /// simultaneous resolution in the next Command Phase.
    pub colonize_intents: BTreeMap<FleetId, SystemId>,

    pub blockades: BTreeMap<SystemId, Blockade>,
    /// Guild operations admitted last Command Phase, resolved next
    /// Conflict Phase.
    pub pending_espionage: BTreeMap<HouseId, Vec<EspionageAction>>,
    pub ongoing_effects: Vec<OngoingEffect>,
    pub scout_loss_events: Vec<ScoutLossEvent>,
    pub pending_commissions: Vec<CompletedProject>,
    pub grace_timers: BTreeMap<HouseId, GracePeriodTracker>,

    pub id_counters: IdCounters,
    /// Last synthesized intelligence snapshot per house, for delta
    /// computation.
    pub prev_intel: BTreeMap<HouseId, IntelSnapshot>,
}

impl GameState {
    pub fn new(seed: u64, star_map: StarMap) -> Self {
        GameState {
            turn: 1,
            seed,
            star_map,
            houses: BTreeMap::new(),
            colonies: BTreeMap::new(),
            fleets: BTreeMap::new(),
            colonies_by_system: BTreeMap::new(),
            colonies_by_owner: BTreeMap::new(),
            fleets_by_location: BTreeMap::new(),
            fleets_by_owner: BTreeMap::new(),
            fleet_commands: BTreeMap::new(),
            pending_moves: BTreeMap::new(),
            standing_commands: BTreeMap::new(),
            colonize_intents: BTreeMap::new(),
            blockades: BTreeMap::new(),
            pending_espionage: BTreeMap::new(),
            ongoing_effects: Vec::new(),
            scout_loss_events: Vec::new(),
            pending_commissions: Vec::new(),
            grace_timers: BTreeMap::new(),
            id_counters: IdCounters::new(),
            prev_intel: BTreeMap::new(),
        }
    }

    // ---------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------

    pub fn house(&self, id: HouseId) -> Option<&House> {
        self.houses.get(&id)
    }

    pub fn house_mut(&mut self, id: HouseId) -> Option<&mut House> {
        self.houses.get_mut(&id)
    }

    pub fn fleet(&self, id: FleetId) -> Option<&Fleet> {
        self.fleets.get(&id)
    }

    pub fn fleet_mut(&mut self, id: FleetId) -> Option<&mut Fleet> {
        self.fleets.get_mut(&id)
    }

    pub fn colony(&self, id: ColonyId) -> Option<&Colony> {
        self.colonies.get(&id)
    }

    pub fn colony_mut(&mut self, id: ColonyId) -> Option<&mut Colony> {
        self.colonies.get_mut(&id)
    }

    /// The colony at a system, if any. Systems hold at most one colony.
    pub fn colony_at(&self, system: SystemId) -> Option<&Colony> {
        self.colonies_by_system
            .get(&system)
            .and_then(|ids| ids.first())
            .and_then(|id| self.colonies.get(id))
    }

    pub fn fleet_ids_at(&self, system: SystemId) -> Vec<FleetId> {
        self.fleets_by_location
            .get(&system)
            .cloned()
            .unwrap_or_default()
    }

    pub fn owned_colony_ids(&self, house: HouseId) -> Vec<ColonyId> {
        self.colonies_by_owner
            .get(&house)
            .cloned()
            .unwrap_or_default()
    }

    pub fn owned_fleet_ids(&self, house: HouseId) -> Vec<FleetId> {
        self.fleets_by_owner
            .get(&house)
            .cloned()
            .unwrap_or_default()
    }

    /// Houses still in the game, in ID order.
    pub fn living_houses(&self) -> Vec<HouseId> {
        self.houses
            .values()
            .filter(|h| !h.eliminated)
            .map(|h| h.id)
            .collect()
    }

    /// Nearest colony owned by `house`, by jump distance from `from`.
    pub fn nearest_owned_colony(&self, house: HouseId, from: SystemId) -> Option<SystemId> {
        self.owned_colony_ids(house)
            .iter()
            .filter_map(|id| self.colonies.get(id))
            .filter_map(|c| self.star_map.distance(from, c.system).map(|d| (d, c.system)))
            .min()
            .map(|(_, system)| system)
    }

    // ---------------------------------------------------------------
    // Mutators (index-coherent entry points)
    // ---------------------------------------------------------------

    pub fn insert_colony(&mut self, colony: Colony) {
        let id = colony.id;
        self.colonies_by_system
            .entry(colony.system)
            .or_default()
            .push(id);
        self.colonies_by_owner
            .entry(colony.owner)
            .or_default()
            .push(id);
        self.colonies.insert(id, colony);
    }

    /// Reassign a colony's owner, keeping `colonies_by_owner` coherent.
    pub fn transfer_colony(&mut self, id: ColonyId, to: HouseId) {
        let Some(colony) = self.colonies.get_mut(&id) else {
            return;
        };
        let from = colony.owner;
        if from == to {
            return;
        }
        colony.owner = to;
        if let Some(list) = self.colonies_by_owner.get_mut(&from) {
            list.retain(|&c| c != id);
        }
        self.colonies_by_owner.entry(to).or_default().push(id);
    }

    pub fn insert_fleet(&mut self, fleet: Fleet) {
        let id = fleet.id;
        self.fleets_by_location
            .entry(fleet.location)
            .or_default()
            .push(id);
        self.fleets_by_owner.entry(fleet.owner).or_default().push(id);
        self.fleets.insert(id, fleet);
    }

    /// Remove a fleet from primary storage, every index, and every command
    /// table. After this, no order table references the fleet.
    pub fn remove_fleet(&mut self, id: FleetId) -> Option<Fleet> {
        let fleet = self.fleets.remove(&id)?;
        if let Some(list) = self.fleets_by_location.get_mut(&fleet.location) {
            list.retain(|&f| f != id);
        }
        if let Some(list) = self.fleets_by_owner.get_mut(&fleet.owner) {
            list.retain(|&f| f != id);
        }
        self.fleet_commands.remove(&id);
        self.pending_moves.remove(&id);
        self.standing_commands.remove(&id);
        self.colonize_intents.remove(&id);
        self.blockades.retain(|_, b| b.fleet != id);
        Some(fleet)
    }

    /// Move a fleet, updating `fleets_by_location` atomically.
    pub fn move_fleet(&mut self, id: FleetId, to: SystemId) {
        let Some(fleet) = self.fleets.get_mut(&id) else {
            return;
        };
        let from = fleet.location;
        if from == to {
            return;
        }
        fleet.location = to;
        if let Some(list) = self.fleets_by_location.get_mut(&from) {
            list.retain(|&f| f != id);
        }
        self.fleets_by_location.entry(to).or_default().push(id);
    }

    /// Credit PP to a house treasury.
    pub fn credit_treasury(&mut self, house: HouseId, amount: u32) {
        if let Some(h) = self.houses.get_mut(&house) {
            h.treasury = h.treasury.saturating_add(amount);
        }
    }

    /// Debit PP, returning the uncovered shortfall (0 when fully paid).
    pub fn debit_treasury(&mut self, house: HouseId, amount: u32) -> u32 {
        let Some(h) = self.houses.get_mut(&house) else {
            return amount;
        };
        let paid = h.treasury.min(amount);
        h.treasury -= paid;
        amount - paid
    }

    /// Adjust prestige and emit the audit event.
    pub fn award_prestige(
        &mut self,
        house: HouseId,
        delta: i32,
        reason: &str,
        events: &mut Vec<GameEvent>,
    ) {
        if delta == 0 {
            return;
        }
        if let Some(h) = self.houses.get_mut(&house) {
            h.prestige += delta;
            events.push(GameEvent::PrestigeChanged {
                house,
                delta,
                reason: reason.to_string(),
            });
        }
    }

    /// Rebuild every derived index from primary collections.
    pub fn rebuild_indices(&mut self) {
        self.colonies_by_system.clear();
        self.colonies_by_owner.clear();
        self.fleets_by_location.clear();
        self.fleets_by_owner.clear();
        for colony in self.colonies.values() {
            self.colonies_by_system
                .entry(colony.system)
                .or_default()
                .push(colony.id);
            self.colonies_by_owner
                .entry(colony.owner)
                .or_default()
                .push(colony.id);
        }
        for fleet in self.fleets.values() {
            self.fleets_by_location
                .entry(fleet.location)
                .or_default()
                .push(fleet.id);
            self.fleets_by_owner
                .entry(fleet.owner)
                .or_default()
                .push(fleet.id);
        }
    }

    // ---------------------------------------------------------------
    // Invariant audit
    // ---------------------------------------------------------------

    /// Verify structural invariants. Run after every phase; a failure here
    /// is fatal and aborts the turn.
    pub fn audit(&self, config: &GameConfig) -> Result<(), EngineError> {
        // Fleet locations must be on the map.
        for fleet in self.fleets.values() {
            if !self.star_map.contains(fleet.location) {
                return Err(EngineError::InvariantViolation {
                    detail: format!("{} is at unknown {}", fleet.id, fleet.location),
                });
            }
            // Escort command cost within flagship rating.
            for squadron in &fleet.squadrons {
                if !squadron.within_command_rating(config) {
                    return Err(EngineError::InvariantViolation {
                        detail: format!(
                            "{} escorts exceed flagship command rating",
                            squadron.id
                        ),
                    });
                }
            }
        }

        // Command tables must not reference removed fleets.
        for id in self
            .fleet_commands
            .keys()
            .chain(self.pending_moves.keys())
            .chain(self.standing_commands.keys())
        {
            if !self.fleets.contains_key(id) {
                return Err(EngineError::InvariantViolation {
                    detail: format!("command table references removed {id}"),
                });
            }
        }

        // Index coherence, both directions. Mutators may leave empty
        // entries or different insertion orders behind, so compare as
        // sorted non-empty sets.
        fn normalized<K: Ord + Copy, V: Ord + Copy>(map: &BTreeMap<K, Vec<V>>) -> BTreeMap<K, Vec<V>> {
            map.iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(&k, v)| {
                    let mut sorted = v.clone();
                    sorted.sort();
                    (k, sorted)
                })
                .collect()
        }
        let mut derived = self.clone();
        derived.rebuild_indices();
        if normalized(&derived.colonies_by_owner) != normalized(&self.colonies_by_owner)
            || normalized(&derived.colonies_by_system) != normalized(&self.colonies_by_system)
        {
            return Err(EngineError::CorruptedIndex {
                detail: "colony indices out of sync with primary collection".into(),
            });
        }
        if normalized(&derived.fleets_by_location) != normalized(&self.fleets_by_location)
            || normalized(&derived.fleets_by_owner) != normalized(&self.fleets_by_owner)
        {
            return Err(EngineError::CorruptedIndex {
                detail: "fleet indices out of sync with primary collection".into(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::Fleet;
    use crate::ids::ShipId;
    use crate::starmap::{PlanetClass, ResourceRating, System};
    use crate::unit::{Ship, ShipClass};

    fn small_state() -> GameState {
        let systems = (0..3)
            .map(|i| System {
                id: SystemId(i),
                name: format!("S{i}"),
                planet_class: PlanetClass::Benign,
                resource_rating: ResourceRating::Abundant,
            })
            .collect();
        let lanes = vec![(SystemId(0), SystemId(1)), (SystemId(1), SystemId(2))];
        let mut state = GameState::new(99, StarMap::new(systems, lanes));
        state
            .houses
            .insert(HouseId(0), House::new(HouseId(0), "A".into(), 100));
        state
    }

    #[test]
    fn test_move_fleet_updates_index() {
        let mut state = small_state();
        let fleet = Fleet::new(FleetId(0), HouseId(0), SystemId(0));
        state.insert_fleet(fleet);
        assert_eq!(state.fleet_ids_at(SystemId(0)), vec![FleetId(0)]);

        state.move_fleet(FleetId(0), SystemId(2));
        assert!(state.fleet_ids_at(SystemId(0)).is_empty());
        assert_eq!(state.fleet_ids_at(SystemId(2)), vec![FleetId(0)]);
    }

    #[test]
    fn test_remove_fleet_clears_command_tables() {
        let mut state = small_state();
        state.insert_fleet(Fleet::new(FleetId(0), HouseId(0), SystemId(0)));
        state.fleet_commands.insert(
            FleetId(0),
            FleetCommand {
                order: FleetOrder::Hold,
                issued_turn: 1,
            },
        );
        state
            .standing_commands
            .insert(FleetId(0), StandingOrder::AutoColonize);

        state.remove_fleet(FleetId(0));
        assert!(state.fleet_commands.is_empty());
        assert!(state.standing_commands.is_empty());
        assert!(state.fleet_ids_at(SystemId(0)).is_empty());
    }

    #[test]
    fn test_transfer_colony_moves_owner_index() {
        let mut state = small_state();
        state
            .houses
            .insert(HouseId(1), House::new(HouseId(1), "B".into(), 100));
        state.insert_colony(Colony::new(ColonyId(0), HouseId(0), SystemId(1), 10));

        state.transfer_colony(ColonyId(0), HouseId(1));
        assert!(state.owned_colony_ids(HouseId(0)).is_empty());
        assert_eq!(state.owned_colony_ids(HouseId(1)), vec![ColonyId(0)]);
        assert_eq!(state.colony(ColonyId(0)).unwrap().owner, HouseId(1));
    }

    #[test]
    fn test_debit_returns_shortfall() {
        let mut state = small_state();
        assert_eq!(state.debit_treasury(HouseId(0), 60), 0);
        assert_eq!(state.house(HouseId(0)).unwrap().treasury, 40);
        assert_eq!(state.debit_treasury(HouseId(0), 60), 20);
        assert_eq!(state.house(HouseId(0)).unwrap().treasury, 0);
    }

    #[test]
    fn test_audit_catches_bad_location() {
        let mut state = small_state();
        let config = GameConfig::standard();
        state.insert_fleet(Fleet::new(FleetId(0), HouseId(0), SystemId(0)));
        assert!(state.audit(&config).is_ok());

        state.fleets.get_mut(&FleetId(0)).unwrap().location = SystemId(77);
        assert!(state.audit(&config).is_err());
    }

    #[test]
    fn test_audit_catches_index_drift() {
        let mut state = small_state();
        let config = GameConfig::standard();
        let mut fleet = Fleet::new(FleetId(0), HouseId(0), SystemId(0));
        fleet
            .squadrons
            .push(crate::fleet::Squadron::new(
                crate::ids::SquadronId(0),
                Ship::new(ShipId(0), ShipClass::Frigate),
            ));
        state.insert_fleet(fleet);

        // Corrupt the index behind the mutators' back.
        state.fleets_by_location.get_mut(&SystemId(0)).unwrap().clear();
        assert!(matches!(
            state.audit(&config),
            Err(EngineError::CorruptedIndex { .. })
        ));
    }

    #[test]
    fn test_nearest_owned_colony() {
        let mut state = small_state();
        state.insert_colony(Colony::new(ColonyId(0), HouseId(0), SystemId(2), 10));
        assert_eq!(
            state.nearest_owned_colony(HouseId(0), SystemId(0)),
            Some(SystemId(2))
        );
        assert_eq!(state.nearest_owned_colony(HouseId(1), SystemId(0)), None);
    }
}
