//! Colonies: population, infrastructure, facilities, and work queues.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::ids::{ColonyId, FleetId, HouseId, ShipId, SystemId};
use crate::unit::{GroundUnit, GroundUnitClass, Ship, ShipClass};

/// Colony facility kinds that can be constructed.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum FacilityKind {
    Spaceport,
    Shipyard,
    Drydock,
    GroundBattery,
    ShieldGenerator,
}

/// Something a colony can build.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ProjectKind {
    Ship(ShipClass),
    GroundUnit(GroundUnitClass),
    Facility(FacilityKind),
    /// Add industrial units.
    Infrastructure(u32),
}

/// An in-progress construction project.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstructionProject {
    pub kind: ProjectKind,
    pub turns_remaining: u32,
}

/// A finished project waiting to be commissioned next Command Phase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletedProject {
    pub colony: ColonyId,
    pub kind: ProjectKind,
}

/// A crippled ship under repair at a drydock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepairJob {
    pub fleet: FleetId,
    pub ship: ShipId,
    pub turns_remaining: u32,
}

/// An in-progress terraforming effort.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerraformProject {
    pub target_class: crate::starmap::PlanetClass,
    pub turns_remaining: u32,
}

/// A colony on a system's primary planet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Colony {
    pub id: ColonyId,
    pub owner: HouseId,
    pub system: SystemId,
    /// Population in PU.
    pub population: u32,
    /// Souls per PU is a display concern; total souls tracked for flavor.
    pub souls: u64,
    /// Industrial units.
    pub infrastructure: u32,
    /// Tax rate in percent of gross output collected.
    pub tax_rate: u32,
    pub starbases: Vec<Ship>,
    pub spaceports: u32,
    pub shipyards: u32,
    pub drydocks: u32,
    /// Fighter squadrons stationed on the surface or in orbit.
    pub fighters: Vec<Ship>,
    pub ground_batteries: u32,
    pub shield_level: u32,
    pub armies: Vec<GroundUnit>,
    pub marines: Vec<GroundUnit>,
    pub construction_queue: Vec<ConstructionProject>,
    pub repair_queue: Vec<RepairJob>,
    pub terraform: Option<TerraformProject>,
    pub blockaded: bool,
    /// Set when casualties reduce population to zero. The colony lingers
    /// rather than vanishing the same turn.
    pub depopulated: bool,
}

impl Colony {
    pub fn new(id: ColonyId, owner: HouseId, system: SystemId, population: u32) -> Self {
        Colony {
            id,
            owner,
            system,
            population,
            souls: u64::from(population) * 1_000_000,
            infrastructure: 0,
            tax_rate: 50,
            starbases: Vec::new(),
            spaceports: 0,
            shipyards: 0,
            drydocks: 0,
            fighters: Vec::new(),
            ground_batteries: 0,
            shield_level: 0,
            armies: Vec::new(),
            marines: Vec::new(),
            construction_queue: Vec::new(),
            repair_queue: Vec::new(),
            terraform: None,
            blockaded: false,
            depopulated: false,
        }
    }

    /// Whether fleets can dock for salvage, mothballing, or repair.
    pub fn has_dock(&self) -> bool {
        self.spaceports > 0 || self.shipyards > 0
    }

    /// Gross economic output before tax, in PP. The multipliers come from
    /// the system's planet class and resource rating.
    pub fn gross_output(&self, class_pct: u32, resource_pct: u32) -> u32 {
        self.infrastructure * class_pct * resource_pct / 10_000
    }

    /// Total defending ground strength (armies + marines + militia).
    pub fn ground_defense(&self, config: &GameConfig) -> u32 {
        self.armies
            .iter()
            .chain(self.marines.iter())
            .map(|u| config.ground_unit(u.class).defense)
            .sum()
    }

    /// Construction slots available per turn. One project advances per
    /// shipyard, plus one for the colony itself.
    pub fn build_slots(&self) -> usize {
        self.shipyards as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gross_output_scaling() {
        let mut colony = Colony::new(ColonyId(0), HouseId(0), SystemId(0), 10);
        colony.infrastructure = 100;
        // Benign (100%) x Abundant (100%) = IU.
        assert_eq!(colony.gross_output(100, 100), 100);
        // Gaia (125%) x Rich (125%) on 100 IU.
        assert_eq!(colony.gross_output(125, 125), 156);
        // Barren (25%) x VeryPoor (50%).
        assert_eq!(colony.gross_output(25, 50), 12);
    }

    #[test]
    fn test_has_dock() {
        let mut colony = Colony::new(ColonyId(0), HouseId(0), SystemId(0), 10);
        assert!(!colony.has_dock());
        colony.spaceports = 1;
        assert!(colony.has_dock());
        colony.spaceports = 0;
        colony.shipyards = 2;
        assert!(colony.has_dock());
    }

    #[test]
    fn test_ground_defense_sums_garrison() {
        let config = GameConfig::standard();
        let mut colony = Colony::new(ColonyId(0), HouseId(0), SystemId(0), 10);
        colony
            .armies
            .push(GroundUnit::new(crate::ids::GroundUnitId(0), GroundUnitClass::Army));
        colony
            .marines
            .push(GroundUnit::new(crate::ids::GroundUnitId(1), GroundUnitClass::Marine));
        let expected = config.ground_unit(GroundUnitClass::Army).defense
            + config.ground_unit(GroundUnitClass::Marine).defense;
        assert_eq!(colony.ground_defense(&config), expected);
    }
}
