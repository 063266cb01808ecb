//! Read-only game configuration: stat tables and rule tunables.
//!
//! Built once at game start (normally from the external TOML loader) and
//! passed by reference wherever the engine needs it. Nothing in here
//! changes during a game.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::unit::{GroundUnitClass, GroundUnitStats, ShipClass, ShipStats, TargetBucket};

/// The complete rules configuration for one game.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    pub ships: BTreeMap<ShipClass, ShipStats>,
    pub ground_units: BTreeMap<GroundUnitClass, GroundUnitStats>,
    pub combat: CombatParams,
    pub economy: EconomyParams,
    pub espionage: EspionageParams,
    pub prestige: PrestigeValues,
    pub setup: SetupParams,
}

impl GameConfig {
    /// The standard ruleset.
    pub fn standard() -> Self {
        let mut ships = BTreeMap::new();
        for &class in ShipClass::all() {
            ships.insert(class, default_ship_stats(class));
        }
        let mut ground_units = BTreeMap::new();
        for &class in GroundUnitClass::all() {
            ground_units.insert(class, default_ground_stats(class));
        }
        GameConfig {
            ships,
            ground_units,
            combat: CombatParams::default(),
            economy: EconomyParams::default(),
            espionage: EspionageParams::default(),
            prestige: PrestigeValues::default(),
            setup: SetupParams::default(),
        }
    }

    /// Stats for a ship class. The table covers every class, so a miss is
    /// a configuration bug caught during setup validation.
    pub fn ship(&self, class: ShipClass) -> &ShipStats {
        &self.ships[&class]
    }

    pub fn ground_unit(&self, class: GroundUnitClass) -> &GroundUnitStats {
        &self.ground_units[&class]
    }
}

/// Combat engine tunables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CombatParams {
    /// Maximum rounds before a battle is declared a stalemate.
    pub max_rounds: u32,
    /// A final CER roll at or above this is a critical hit.
    pub critical_hit_threshold: i32,
    /// Base target number a CER roll must meet to hit.
    pub base_to_hit: i32,
    /// A detection roll at or above this reveals a cloaked task force.
    pub detection_threshold: i32,
    /// Relative attack weight per target bucket, in `TargetBucket::all()` order.
    pub bucket_weights: [u32; 5],
    /// Rounds of planetary bombardment per order.
    pub bombardment_rounds: u32,
    /// Ground combat round cap.
    pub ground_combat_max_rounds: u32,
    /// Marine attack penalty numerator/denominator during a blitz.
    pub blitz_attack_num: u32,
    pub blitz_attack_den: u32,
}

impl Default for CombatParams {
    fn default() -> Self {
        CombatParams {
            max_rounds: 20,
            critical_hit_threshold: 19,
            base_to_hit: 11,
            detection_threshold: 15,
            bucket_weights: [2, 2, 3, 1, 4],
            bombardment_rounds: 3,
            ground_combat_max_rounds: 5,
            blitz_attack_num: 1,
            blitz_attack_den: 2,
        }
    }
}

impl CombatParams {
    pub fn bucket_weight(&self, bucket: TargetBucket) -> u32 {
        let idx = TargetBucket::all()
            .iter()
            .position(|&b| b == bucket)
            .unwrap_or(0);
        self.bucket_weights[idx]
    }
}

/// Economy tunables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EconomyParams {
    /// Blockade production multiplier, as a percentage.
    pub blockade_penalty_pct: u32,
    /// Salvage refund, as a percentage of build cost.
    pub salvage_refund_pct: u32,
    /// Space Guild seizure payment, as a percentage of build cost.
    pub seizure_payment_pct: u32,
    /// Reserve fleet maintenance, as a percentage of active maintenance.
    pub reserve_maintenance_pct: u32,
    /// Population growth per turn, in PU per 100 PU.
    pub population_growth_per_100: u32,
    /// Tax rate above this costs prestige each turn.
    pub oppressive_tax_pct: u32,
    /// Tax rate at or below this earns prestige each turn.
    pub light_tax_pct: u32,
    /// Research points granted per PP allocated.
    pub rp_per_pp: u32,
    /// Accumulated RP needed to advance a tech field one level.
    pub rp_per_tech_level: u32,
}

impl Default for EconomyParams {
    fn default() -> Self {
        EconomyParams {
            blockade_penalty_pct: 50,
            salvage_refund_pct: 50,
            seizure_payment_pct: 50,
            reserve_maintenance_pct: 50,
            population_growth_per_100: 2,
            oppressive_tax_pct: 60,
            light_tax_pct: 30,
            rp_per_pp: 1,
            rp_per_tech_level: 100,
        }
    }
}

/// Espionage tunables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EspionageParams {
    /// Detection succeeds when d20 + CIC level + CIP/`cip_divisor` meets this.
    pub detection_threshold: i32,
    /// CIP pool points per +1 detection bonus.
    pub cip_divisor: u32,
    /// EBP cost of low-tier operations (spying, sabotage-low, psyops).
    pub low_op_cost: u32,
    /// EBP cost of high-tier operations (tech theft, sabotage-high,
    /// assassination).
    pub high_op_cost: u32,
    /// Turns an ongoing effect persists.
    pub effect_duration: u32,
    /// Disinformation variance bounds, in percent of true value.
    pub corruption_min_pct: u32,
    pub corruption_max_pct: u32,
    /// IU destroyed by a successful low sabotage.
    pub sabotage_low_iu: u32,
    /// Prestige drained per turn by an active psyops campaign.
    pub psyops_drain: i32,
}

impl Default for EspionageParams {
    fn default() -> Self {
        EspionageParams {
            detection_threshold: 18,
            cip_divisor: 10,
            low_op_cost: 10,
            high_op_cost: 25,
            effect_duration: 4,
            corruption_min_pct: 20,
            corruption_max_pct: 40,
            sabotage_low_iu: 5,
            psyops_drain: 2,
        }
    }
}

/// Prestige awards and penalties.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrestigeValues {
    pub combat_victory: i32,
    pub squadron_destroyed: i32,
    pub colony_captured: i32,
    pub colony_founded: i32,
    pub tech_level_gained: i32,
    pub blockade_imposed: i32,
    pub blockade_suffered: i32,
    pub maintenance_shortfall: i32,
    pub espionage_success: i32,
    pub espionage_detected: i32,
    pub light_tax_bonus: i32,
    pub oppressive_tax_penalty: i32,
}

impl Default for PrestigeValues {
    fn default() -> Self {
        PrestigeValues {
            combat_victory: 10,
            squadron_destroyed: 2,
            colony_captured: 25,
            colony_founded: 15,
            tech_level_gained: 5,
            blockade_imposed: 5,
            blockade_suffered: -5,
            maintenance_shortfall: -10,
            espionage_success: 3,
            espionage_detected: -8,
            light_tax_bonus: 1,
            oppressive_tax_penalty: -2,
        }
    }
}

/// Game setup parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetupParams {
    /// Map-size multiplier applied to squadron caps.
    pub map_multiplier: u32,
    /// Fighter cap multiplier per colony (applied to IU/100).
    pub fighter_cap_multiplier: u32,
    /// Grace turns allowed for total-squadron and fighter over-cap.
    pub capacity_grace_turns: u32,
    /// Prestige score that wins the game.
    pub victory_prestige: i32,
    /// Starting treasury per house.
    pub starting_treasury: u32,
    /// Starting homeworld infrastructure.
    pub starting_infrastructure: u32,
    /// Starting homeworld population units.
    pub starting_population: u32,
}

impl Default for SetupParams {
    fn default() -> Self {
        SetupParams {
            map_multiplier: 1,
            fighter_cap_multiplier: 6,
            capacity_grace_turns: 2,
            victory_prestige: 500,
            starting_treasury: 200,
            starting_infrastructure: 100,
            starting_population: 50,
        }
    }
}

fn default_ship_stats(class: ShipClass) -> ShipStats {
    match class {
        ShipClass::Fighter => ShipStats {
            class,
            attack: 2,
            defense: 1,
            wep: 1,
            command_cost: 0,
            command_rating: 0,
            build_cost: 5,
            maintenance: 1,
            hangar_capacity: 0,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: false,
        },
        ShipClass::Scout => ShipStats {
            class,
            attack: 1,
            defense: 1,
            wep: 0,
            command_cost: 1,
            command_rating: 1,
            build_cost: 8,
            maintenance: 1,
            hangar_capacity: 0,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: true,
        },
        ShipClass::Raider => ShipStats {
            class,
            attack: 4,
            defense: 2,
            wep: 2,
            command_cost: 2,
            command_rating: 2,
            build_cost: 15,
            maintenance: 2,
            hangar_capacity: 0,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: true,
        },
        ShipClass::Corvette => ShipStats {
            class,
            attack: 2,
            defense: 2,
            wep: 1,
            command_cost: 1,
            command_rating: 1,
            build_cost: 10,
            maintenance: 1,
            hangar_capacity: 0,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: false,
        },
        ShipClass::Frigate => ShipStats {
            class,
            attack: 3,
            defense: 3,
            wep: 1,
            command_cost: 2,
            command_rating: 2,
            build_cost: 30,
            maintenance: 2,
            hangar_capacity: 0,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: false,
        },
        ShipClass::Destroyer => ShipStats {
            class,
            attack: 4,
            defense: 4,
            wep: 2,
            command_cost: 3,
            command_rating: 3,
            build_cost: 45,
            maintenance: 3,
            hangar_capacity: 0,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: false,
        },
        ShipClass::Cruiser => ShipStats {
            class,
            attack: 6,
            defense: 6,
            wep: 3,
            command_cost: 5,
            command_rating: 7,
            build_cost: 80,
            maintenance: 5,
            hangar_capacity: 0,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: false,
        },
        ShipClass::Battlecruiser => ShipStats {
            class,
            attack: 8,
            defense: 7,
            wep: 3,
            command_cost: 6,
            command_rating: 8,
            build_cost: 110,
            maintenance: 7,
            hangar_capacity: 0,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: false,
        },
        ShipClass::Battleship => ShipStats {
            class,
            attack: 10,
            defense: 10,
            wep: 4,
            command_cost: 8,
            command_rating: 10,
            build_cost: 150,
            maintenance: 9,
            hangar_capacity: 0,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: false,
        },
        ShipClass::Dreadnought => ShipStats {
            class,
            attack: 14,
            defense: 12,
            wep: 5,
            command_cost: 10,
            command_rating: 12,
            build_cost: 220,
            maintenance: 12,
            hangar_capacity: 0,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: false,
        },
        ShipClass::Carrier => ShipStats {
            class,
            attack: 3,
            defense: 6,
            wep: 1,
            command_cost: 6,
            command_rating: 8,
            build_cost: 120,
            maintenance: 8,
            hangar_capacity: 6,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: false,
        },
        ShipClass::Etac => ShipStats {
            class,
            attack: 0,
            defense: 1,
            wep: 0,
            command_cost: 1,
            command_rating: 0,
            build_cost: 20,
            maintenance: 1,
            hangar_capacity: 0,
            spacelift_ptu: 1,
            marine_capacity: 0,
            cloaked: false,
        },
        ShipClass::AssaultTransport => ShipStats {
            class,
            attack: 0,
            defense: 2,
            wep: 0,
            command_cost: 2,
            command_rating: 0,
            build_cost: 40,
            maintenance: 2,
            hangar_capacity: 0,
            spacelift_ptu: 2,
            marine_capacity: 4,
            cloaked: false,
        },
        ShipClass::PlanetBreaker => ShipStats {
            class,
            attack: 20,
            defense: 8,
            wep: 6,
            command_cost: 12,
            command_rating: 12,
            build_cost: 400,
            maintenance: 20,
            hangar_capacity: 0,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: false,
        },
        ShipClass::Starbase => ShipStats {
            class,
            attack: 12,
            defense: 14,
            wep: 4,
            command_cost: 0,
            command_rating: 12,
            build_cost: 180,
            maintenance: 6,
            hangar_capacity: 4,
            spacelift_ptu: 0,
            marine_capacity: 0,
            cloaked: false,
        },
    }
}

fn default_ground_stats(class: GroundUnitClass) -> GroundUnitStats {
    match class {
        GroundUnitClass::Army => GroundUnitStats {
            class,
            attack: 4,
            defense: 5,
            build_cost: 20,
            maintenance: 1,
        },
        GroundUnitClass::Marine => GroundUnitStats {
            class,
            attack: 6,
            defense: 4,
            build_cost: 30,
            maintenance: 2,
        },
        GroundUnitClass::Militia => GroundUnitStats {
            class,
            attack: 2,
            defense: 3,
            build_cost: 8,
            maintenance: 0,
        },
    }
}
