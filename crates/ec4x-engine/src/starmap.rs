//! The star map: systems, jump lanes, and pathfinding.
//!
//! The map is produced by the external generator and is read-only after
//! game start. Jump lanes are undirected.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::ids::SystemId;

/// Planet habitability class. Affects production and colonization value.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlanetClass {
    Barren,
    Hostile,
    Harsh,
    Benign,
    Gaia,
}

impl PlanetClass {
    /// Production multiplier, in percent.
    pub fn production_pct(&self) -> u32 {
        match self {
            PlanetClass::Barren => 25,
            PlanetClass::Hostile => 50,
            PlanetClass::Harsh => 75,
            PlanetClass::Benign => 100,
            PlanetClass::Gaia => 125,
        }
    }

    /// Population ceiling in PU.
    pub fn population_cap(&self) -> u32 {
        match self {
            PlanetClass::Barren => 10,
            PlanetClass::Hostile => 30,
            PlanetClass::Harsh => 60,
            PlanetClass::Benign => 120,
            PlanetClass::Gaia => 200,
        }
    }
}

/// Mineral resource rating of a system's primary planet.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceRating {
    VeryPoor,
    Poor,
    Abundant,
    Rich,
    VeryRich,
}

impl ResourceRating {
    /// Production multiplier, in percent.
    pub fn production_pct(&self) -> u32 {
        match self {
            ResourceRating::VeryPoor => 50,
            ResourceRating::Poor => 75,
            ResourceRating::Abundant => 100,
            ResourceRating::Rich => 125,
            ResourceRating::VeryRich => 150,
        }
    }
}

/// Static definition of a star system.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct System {
    pub id: SystemId,
    pub name: String,
    pub planet_class: PlanetClass,
    pub resource_rating: ResourceRating,
}

/// The full map graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StarMap {
    systems: BTreeMap<SystemId, System>,
    lanes: BTreeMap<SystemId, BTreeSet<SystemId>>,
}

impl StarMap {
    pub fn new(systems: Vec<System>, lanes: Vec<(SystemId, SystemId)>) -> Self {
        let mut map = StarMap {
            systems: systems.into_iter().map(|s| (s.id, s)).collect(),
            lanes: BTreeMap::new(),
        };
        for (a, b) in lanes {
            map.lanes.entry(a).or_default().insert(b);
            map.lanes.entry(b).or_default().insert(a);
        }
        map
    }

    pub fn system(&self, id: SystemId) -> Option<&System> {
        self.systems.get(&id)
    }

    /// Terraforming is the one sanctioned post-init mutation of the map.
    pub fn set_planet_class(&mut self, id: SystemId, class: PlanetClass) {
        if let Some(system) = self.systems.get_mut(&id) {
            system.planet_class = class;
        }
    }

    pub fn contains(&self, id: SystemId) -> bool {
        self.systems.contains_key(&id)
    }

    pub fn systems(&self) -> impl Iterator<Item = &System> {
        self.systems.values()
    }

    pub fn neighbors(&self, id: SystemId) -> impl Iterator<Item = SystemId> + '_ {
        self.lanes.get(&id).into_iter().flatten().copied()
    }

    /// Shortest jump-lane path from `from` to `to`, inclusive of both
    /// endpoints. `None` if unreachable.
    pub fn shortest_path(&self, from: SystemId, to: SystemId) -> Option<Vec<SystemId>> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        if from == to {
            return Some(vec![from]);
        }
        let mut prev: BTreeMap<SystemId, SystemId> = BTreeMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(from);
        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(current) {
                if next == from || prev.contains_key(&next) {
                    continue;
                }
                prev.insert(next, current);
                if next == to {
                    let mut path = vec![to];
                    let mut at = to;
                    while let Some(&p) = prev.get(&at) {
                        path.push(p);
                        at = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Jump distance between two systems. `None` if unreachable.
    pub fn distance(&self, from: SystemId, to: SystemId) -> Option<u32> {
        self.shortest_path(from, to).map(|p| (p.len() - 1) as u32)
    }
}
