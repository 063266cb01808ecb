//! Ship and ground-unit class definitions and unit instances.

use serde::{Deserialize, Serialize};

use crate::ids::{GroundUnitId, ShipId};

/// All ship hull classes.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShipClass {
    Fighter,
    Scout,
    Raider,
    Corvette,
    Frigate,
    Destroyer,
    Cruiser,
    Battlecruiser,
    Battleship,
    Dreadnought,
    Carrier,
    Etac,
    AssaultTransport,
    PlanetBreaker,
    /// Fixed orbital defense. Never part of a fleet; wrapped into a
    /// transient squadron for combat only.
    Starbase,
}

impl ShipClass {
    /// Returns all hull classes as a slice.
    pub fn all() -> &'static [ShipClass] {
        &[
            ShipClass::Fighter,
            ShipClass::Scout,
            ShipClass::Raider,
            ShipClass::Corvette,
            ShipClass::Frigate,
            ShipClass::Destroyer,
            ShipClass::Cruiser,
            ShipClass::Battlecruiser,
            ShipClass::Battleship,
            ShipClass::Dreadnought,
            ShipClass::Carrier,
            ShipClass::Etac,
            ShipClass::AssaultTransport,
            ShipClass::PlanetBreaker,
            ShipClass::Starbase,
        ]
    }

    /// Targeting bucket this class is sorted into during combat.
    pub fn target_bucket(&self) -> TargetBucket {
        match self {
            ShipClass::Fighter => TargetBucket::Fighter,
            ShipClass::Scout | ShipClass::Raider => TargetBucket::Raider,
            ShipClass::Corvette | ShipClass::Frigate | ShipClass::Destroyer => {
                TargetBucket::Destroyer
            }
            ShipClass::Starbase => TargetBucket::Starbase,
            _ => TargetBucket::Capital,
        }
    }
}

/// Target buckets used to distribute attacks across a task force.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetBucket {
    Raider,
    Fighter,
    Destroyer,
    Starbase,
    Capital,
}

impl TargetBucket {
    pub fn all() -> &'static [TargetBucket] {
        &[
            TargetBucket::Raider,
            TargetBucket::Fighter,
            TargetBucket::Destroyer,
            TargetBucket::Starbase,
            TargetBucket::Capital,
        ]
    }
}

/// Static per-class ship statistics. Read from `GameConfig`, immutable
/// for the lifetime of a game.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShipStats {
    pub class: ShipClass,
    /// Attack strength.
    pub attack: u32,
    /// Defense strength.
    pub defense: u32,
    /// Weapons effectiveness modifier added to CER rolls.
    pub wep: i32,
    /// Command cost consumed when serving as an escort.
    pub command_cost: u32,
    /// Command rating provided when serving as a flagship.
    pub command_rating: u32,
    /// Production cost to build.
    pub build_cost: u32,
    /// Per-turn maintenance at Active status.
    pub maintenance: u32,
    /// Embarked fighter capacity (carriers).
    pub hangar_capacity: u32,
    /// Population transfer capacity in PTU (spacelift hulls).
    pub spacelift_ptu: u32,
    /// Marine berths (spacelift hulls).
    pub marine_capacity: u32,
    /// Whether the hull mounts a cloaking device.
    pub cloaked: bool,
}

impl ShipStats {
    /// A flagship with command rating at or above this is a capital.
    pub const CAPITAL_COMMAND_RATING: u32 = 7;

    pub fn is_capital(&self) -> bool {
        self.command_rating >= Self::CAPITAL_COMMAND_RATING
    }

    pub fn is_spacelift(&self) -> bool {
        self.spacelift_ptu > 0 || self.marine_capacity > 0
    }
}

/// A specific ship hull in play.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ship {
    pub id: ShipId,
    pub class: ShipClass,
    pub crippled: bool,
    /// Carrier this fighter is embarked on, if any.
    pub assigned_carrier: Option<ShipId>,
    /// Cargo aboard, for spacelift hulls.
    pub cargo: Cargo,
}

impl Ship {
    pub fn new(id: ShipId, class: ShipClass) -> Self {
        Ship {
            id,
            class,
            crippled: false,
            assigned_carrier: None,
            cargo: Cargo::default(),
        }
    }
}

/// What a spacelift ship is carrying.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Cargo {
    /// Population transfer units aboard.
    pub ptu: u32,
    /// Marines embarked for invasion.
    pub marines: Vec<GroundUnit>,
}

impl Cargo {
    pub fn is_empty(&self) -> bool {
        self.ptu == 0 && self.marines.is_empty()
    }
}

/// Ground unit classes.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroundUnitClass {
    Army,
    Marine,
    Militia,
}

impl GroundUnitClass {
    pub fn all() -> &'static [GroundUnitClass] {
        &[
            GroundUnitClass::Army,
            GroundUnitClass::Marine,
            GroundUnitClass::Militia,
        ]
    }
}

/// Static per-class ground unit statistics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroundUnitStats {
    pub class: GroundUnitClass,
    pub attack: u32,
    pub defense: u32,
    pub build_cost: u32,
    pub maintenance: u32,
}

/// A ground unit in play (garrisoned at a colony or embarked as cargo).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroundUnit {
    pub id: GroundUnitId,
    pub class: GroundUnitClass,
}

impl GroundUnit {
    pub fn new(id: GroundUnitId, class: GroundUnitClass) -> Self {
        GroundUnit { id, class }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_buckets() {
        assert_eq!(ShipClass::Raider.target_bucket(), TargetBucket::Raider);
        assert_eq!(ShipClass::Scout.target_bucket(), TargetBucket::Raider);
        assert_eq!(ShipClass::Fighter.target_bucket(), TargetBucket::Fighter);
        assert_eq!(ShipClass::Frigate.target_bucket(), TargetBucket::Destroyer);
        assert_eq!(ShipClass::Starbase.target_bucket(), TargetBucket::Starbase);
        assert_eq!(ShipClass::Dreadnought.target_bucket(), TargetBucket::Capital);
        assert_eq!(ShipClass::Carrier.target_bucket(), TargetBucket::Capital);
    }

    #[test]
    fn test_new_ship_is_healthy() {
        let ship = Ship::new(ShipId(1), ShipClass::Cruiser);
        assert!(!ship.crippled);
        assert!(ship.cargo.is_empty());
        assert!(ship.assigned_carrier.is_none());
    }
}
