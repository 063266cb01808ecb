//! Opaque entity identifiers and the monotonic ID counters.
//!
//! Every entity is referenced by an integer-wrapped newtype. IDs are never
//! recycled within a game; the counters only move forward.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// A player house.
    HouseId
);
define_id!(
    /// A star system on the map.
    SystemId
);
define_id!(
    /// A colony on a planet.
    ColonyId
);
define_id!(
    /// A fleet of squadrons and spacelift ships.
    FleetId
);
define_id!(
    /// A squadron (flagship + escorts) inside a fleet.
    SquadronId
);
define_id!(
    /// An individual ship hull.
    ShipId
);
define_id!(
    /// A ground unit (army, marine, or battery crew).
    GroundUnitId
);

/// Monotonic counters for every ID namespace. Stored inside the game state
/// so that save/resume continues the same sequences.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdCounters {
    next_colony: u32,
    next_fleet: u32,
    next_squadron: u32,
    next_ship: u32,
    next_ground_unit: u32,
}

impl IdCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_colony(&mut self) -> ColonyId {
        let id = ColonyId(self.next_colony);
        self.next_colony += 1;
        id
    }

    pub fn next_fleet(&mut self) -> FleetId {
        let id = FleetId(self.next_fleet);
        self.next_fleet += 1;
        id
    }

    pub fn next_squadron(&mut self) -> SquadronId {
        let id = SquadronId(self.next_squadron);
        self.next_squadron += 1;
        id
    }

    pub fn next_ship(&mut self) -> ShipId {
        let id = ShipId(self.next_ship);
        self.next_ship += 1;
        id
    }

    pub fn next_ground_unit(&mut self) -> GroundUnitId {
        let id = GroundUnitId(self.next_ground_unit);
        self.next_ground_unit += 1;
        id
    }
}
