//! Fleets and squadrons.
//!
//! A squadron is the combat unit: one flagship plus escorts whose total
//! command cost must fit the flagship's command rating, plus embarked
//! fighters when the flagship is a carrier. A fleet groups squadrons and
//! spacelift ships at one location. Active orders for a fleet live in the
//! game state's command tables, not on the fleet itself.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::ids::{FleetId, HouseId, SquadronId, SystemId};
use crate::unit::Ship;

/// Readiness status of a fleet.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum FleetStatus {
    /// Full maintenance, full combat contribution.
    Active,
    /// Half maintenance, half attack and defense strength.
    Reserve,
    /// No maintenance; screened from combat entirely.
    Mothballed,
}

/// Damage state of a squadron.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum SquadronCondition {
    Undamaged,
    Crippled,
    Destroyed,
}

impl SquadronCondition {
    /// One step of damage: Undamaged -> Crippled -> Destroyed.
    pub fn degraded(self) -> SquadronCondition {
        match self {
            SquadronCondition::Undamaged => SquadronCondition::Crippled,
            SquadronCondition::Crippled | SquadronCondition::Destroyed => {
                SquadronCondition::Destroyed
            }
        }
    }
}

/// A flagship with its escorts and embarked fighters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Squadron {
    pub id: SquadronId,
    pub flagship: Ship,
    pub escorts: Vec<Ship>,
    pub fighters: Vec<Ship>,
}

impl Squadron {
    pub fn new(id: SquadronId, flagship: Ship) -> Self {
        Squadron {
            id,
            flagship,
            escorts: Vec::new(),
            fighters: Vec::new(),
        }
    }

    /// Total command cost consumed by the escorts.
    pub fn command_cost(&self, config: &GameConfig) -> u32 {
        self.escorts
            .iter()
            .map(|s| config.ship(s.class).command_cost)
            .sum()
    }

    /// Command rating provided by the flagship.
    pub fn command_rating(&self, config: &GameConfig) -> u32 {
        config.ship(self.flagship.class).command_rating
    }

    /// Whether the escorts fit the flagship's command rating.
    pub fn within_command_rating(&self, config: &GameConfig) -> bool {
        self.command_cost(config) <= self.command_rating(config)
    }

    /// A capital squadron is one led by a capital-rated flagship.
    pub fn is_capital(&self, config: &GameConfig) -> bool {
        config.ship(self.flagship.class).is_capital()
    }

    pub fn condition(&self) -> SquadronCondition {
        if self.flagship.crippled {
            SquadronCondition::Crippled
        } else {
            SquadronCondition::Undamaged
        }
    }

    fn ship_attack(ship: &Ship, config: &GameConfig) -> u32 {
        let base = config.ship(ship.class).attack;
        if ship.crippled {
            base / 2
        } else {
            base
        }
    }

    fn ship_defense(ship: &Ship, config: &GameConfig) -> u32 {
        let base = config.ship(ship.class).defense;
        if ship.crippled {
            base / 2
        } else {
            base
        }
    }

    /// Combined attack strength of flagship, escorts, and fighters.
    pub fn attack_strength(&self, config: &GameConfig) -> u32 {
        Self::ship_attack(&self.flagship, config)
            + self
                .escorts
                .iter()
                .chain(self.fighters.iter())
                .map(|s| Self::ship_attack(s, config))
                .sum::<u32>()
    }

    /// Combined defense strength of flagship, escorts, and fighters.
    pub fn defense_strength(&self, config: &GameConfig) -> u32 {
        Self::ship_defense(&self.flagship, config)
            + self
                .escorts
                .iter()
                .chain(self.fighters.iter())
                .map(|s| Self::ship_defense(s, config))
                .sum::<u32>()
    }

    /// Sum of build costs across every hull in the squadron.
    pub fn total_build_cost(&self, config: &GameConfig) -> u32 {
        config.ship(self.flagship.class).build_cost
            + self
                .escorts
                .iter()
                .chain(self.fighters.iter())
                .map(|s| config.ship(s.class).build_cost)
                .sum::<u32>()
    }

    /// Whether the flagship mounts a cloak and every escort does too.
    pub fn fully_cloaked(&self, config: &GameConfig) -> bool {
        config.ship(self.flagship.class).cloaked
            && self.escorts.iter().all(|s| config.ship(s.class).cloaked)
    }
}

/// A fleet: squadrons plus spacelift ships at a single system.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fleet {
    pub id: FleetId,
    pub owner: HouseId,
    pub location: SystemId,
    pub status: FleetStatus,
    pub squadrons: Vec<Squadron>,
    pub spacelift: Vec<Ship>,
    /// Rules of engagement, 0-10. Low values retreat early.
    pub roe: u8,
}

impl Fleet {
    pub fn new(id: FleetId, owner: HouseId, location: SystemId) -> Self {
        Fleet {
            id,
            owner,
            location,
            status: FleetStatus::Active,
            squadrons: Vec::new(),
            spacelift: Vec::new(),
            roe: 5,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.squadrons.is_empty() && self.spacelift.is_empty()
    }

    /// Fleet attack strength after the status multiplier.
    pub fn attack_strength(&self, config: &GameConfig) -> u32 {
        let raw: u32 = self
            .squadrons
            .iter()
            .map(|s| s.attack_strength(config))
            .sum();
        match self.status {
            FleetStatus::Active => raw,
            FleetStatus::Reserve => raw / 2,
            FleetStatus::Mothballed => 0,
        }
    }

    /// Fleet defense strength after the status multiplier.
    pub fn defense_strength(&self, config: &GameConfig) -> u32 {
        let raw: u32 = self
            .squadrons
            .iter()
            .map(|s| s.defense_strength(config))
            .sum();
        match self.status {
            FleetStatus::Active => raw,
            FleetStatus::Reserve => raw / 2,
            FleetStatus::Mothballed => 0,
        }
    }

    /// Marines embarked across all spacelift ships.
    pub fn embarked_marines(&self) -> usize {
        self.spacelift.iter().map(|s| s.cargo.marines.len()).sum()
    }

    /// PTU embarked across all spacelift ships.
    pub fn embarked_ptu(&self) -> u32 {
        self.spacelift.iter().map(|s| s.cargo.ptu).sum()
    }

    pub fn squadron(&self, id: SquadronId) -> Option<&Squadron> {
        self.squadrons.iter().find(|s| s.id == id)
    }

    pub fn squadron_mut(&mut self, id: SquadronId) -> Option<&mut Squadron> {
        self.squadrons.iter_mut().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ShipId;
    use crate::unit::ShipClass;

    fn squadron(flagship: ShipClass, escorts: &[ShipClass]) -> Squadron {
        let mut sq = Squadron::new(SquadronId(0), Ship::new(ShipId(0), flagship));
        for (i, &class) in escorts.iter().enumerate() {
            sq.escorts.push(Ship::new(ShipId(i as u32 + 1), class));
        }
        sq
    }

    #[test]
    fn test_command_rating_enforcement() {
        let config = GameConfig::standard();
        // Cruiser rating 7; three frigates cost 6.
        let sq = squadron(
            ShipClass::Cruiser,
            &[ShipClass::Frigate, ShipClass::Frigate, ShipClass::Frigate],
        );
        assert!(sq.within_command_rating(&config));

        // Four destroyers cost 12, over the cruiser's rating.
        let sq = squadron(
            ShipClass::Cruiser,
            &[
                ShipClass::Destroyer,
                ShipClass::Destroyer,
                ShipClass::Destroyer,
                ShipClass::Destroyer,
            ],
        );
        assert!(!sq.within_command_rating(&config));
    }

    #[test]
    fn test_crippled_halves_strength() {
        let config = GameConfig::standard();
        let mut sq = squadron(ShipClass::Cruiser, &[]);
        let full = sq.attack_strength(&config);
        sq.flagship.crippled = true;
        assert_eq!(sq.attack_strength(&config), full / 2);
        assert_eq!(sq.condition(), SquadronCondition::Crippled);
    }

    #[test]
    fn test_condition_state_machine() {
        assert_eq!(
            SquadronCondition::Undamaged.degraded(),
            SquadronCondition::Crippled
        );
        assert_eq!(
            SquadronCondition::Crippled.degraded(),
            SquadronCondition::Destroyed
        );
        assert_eq!(
            SquadronCondition::Destroyed.degraded(),
            SquadronCondition::Destroyed
        );
    }

    #[test]
    fn test_reserve_halves_fleet_strength() {
        let config = GameConfig::standard();
        let mut fleet = Fleet::new(FleetId(0), HouseId(0), SystemId(0));
        fleet.squadrons.push(squadron(ShipClass::Battleship, &[]));
        let active = fleet.attack_strength(&config);
        fleet.status = FleetStatus::Reserve;
        assert_eq!(fleet.attack_strength(&config), active / 2);
        fleet.status = FleetStatus::Mothballed;
        assert_eq!(fleet.attack_strength(&config), 0);
    }

    #[test]
    fn test_capital_detection() {
        let config = GameConfig::standard();
        assert!(squadron(ShipClass::Cruiser, &[]).is_capital(&config));
        assert!(!squadron(ShipClass::Destroyer, &[]).is_capital(&config));
    }
}
