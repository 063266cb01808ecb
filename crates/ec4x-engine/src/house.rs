//! Per-house mutable state: treasury, prestige, tech, relations, espionage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::diplomacy::DiplomaticState;
use crate::ids::HouseId;
use crate::intel::IntelligenceReport;

/// Research fields a house can invest in.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TechField {
    /// Weapons effectiveness.
    Weapons,
    /// Shield and armor engineering.
    Defense,
    /// Construction technology (build speed).
    Construction,
    /// Jump drive efficiency.
    Propulsion,
    /// Counter-intelligence capability.
    CounterIntel,
    /// Terraforming.
    Terraforming,
}

impl TechField {
    pub fn all() -> &'static [TechField] {
        &[
            TechField::Weapons,
            TechField::Defense,
            TechField::Construction,
            TechField::Propulsion,
            TechField::CounterIntel,
            TechField::Terraforming,
        ]
    }
}

/// A house's research standing: one level plus accumulated RP per field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TechTree {
    pub levels: BTreeMap<TechField, u32>,
    pub accumulated_rp: BTreeMap<TechField, u32>,
}

impl TechTree {
    pub fn new() -> Self {
        let mut levels = BTreeMap::new();
        let mut accumulated_rp = BTreeMap::new();
        for &field in TechField::all() {
            levels.insert(field, 1);
            accumulated_rp.insert(field, 0);
        }
        TechTree {
            levels,
            accumulated_rp,
        }
    }

    pub fn level(&self, field: TechField) -> u32 {
        self.levels.get(&field).copied().unwrap_or(0)
    }

    /// Drop a field by one level, to a floor of 1. Used by sabotage.
    pub fn downgrade(&mut self, field: TechField) {
        let entry = self.levels.entry(field).or_insert(1);
        if *entry > 1 {
            *entry -= 1;
        }
    }
}

impl Default for TechTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-turn espionage tallies, reset each Income Phase.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EspionageTallies {
    pub attempts: u32,
    pub successes: u32,
    pub losses: u32,
}

/// A player house.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct House {
    pub id: HouseId,
    pub name: String,
    /// Treasury in PP. Never negative; shortfalls convert to prestige
    /// penalties instead.
    pub treasury: u32,
    pub prestige: i32,
    pub tech: TechTree,
    /// This house's view of each other house.
    pub relations: BTreeMap<HouseId, DiplomaticState>,
    /// Offensive espionage pool.
    pub ebp: u32,
    /// Counter-intelligence pool.
    pub cip: u32,
    pub intel_reports: Vec<IntelligenceReport>,
    pub eliminated: bool,
    /// Set when detected in a dishonorable act; pushes the house to the
    /// back of prestige-ranked priority queues.
    pub dishonored: bool,
    pub tallies: EspionageTallies,
}

impl House {
    pub fn new(id: HouseId, name: String, starting_treasury: u32) -> Self {
        House {
            id,
            name,
            treasury: starting_treasury,
            prestige: 0,
            tech: TechTree::new(),
            relations: BTreeMap::new(),
            ebp: 0,
            cip: 0,
            intel_reports: Vec::new(),
            eliminated: false,
            dishonored: false,
            tallies: EspionageTallies::default(),
        }
    }

    /// This house's view of another. Unlisted houses are Neutral.
    pub fn relation(&self, other: HouseId) -> DiplomaticState {
        self.relations
            .get(&other)
            .copied()
            .unwrap_or(DiplomaticState::Neutral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tech_tree_starts_at_level_one() {
        let tree = TechTree::new();
        for &field in TechField::all() {
            assert_eq!(tree.level(field), 1);
        }
    }

    #[test]
    fn test_downgrade_floors_at_one() {
        let mut tree = TechTree::new();
        tree.levels.insert(TechField::Weapons, 3);
        tree.downgrade(TechField::Weapons);
        assert_eq!(tree.level(TechField::Weapons), 2);
        tree.downgrade(TechField::Weapons);
        tree.downgrade(TechField::Weapons);
        assert_eq!(tree.level(TechField::Weapons), 1);
    }

    #[test]
    fn test_default_relation_is_neutral() {
        let house = House::new(HouseId(0), "Atreides".into(), 100);
        assert_eq!(house.relation(HouseId(9)), DiplomaticState::Neutral);
    }
}
