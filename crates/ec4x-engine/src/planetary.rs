//! Planetary operations: bombardment and ground combat.
//!
//! These are pure battle kernels over a `PlanetaryDefense` view of the
//! target; the Conflict Phase driver owns preconditions (space supremacy,
//! battery status) and applies the outcomes to the colony.

use serde::{Deserialize, Serialize};

use crate::colony::Colony;
use crate::config::GameConfig;
use crate::dice::{CerRoll, DeterministicRng};
use crate::ids::SquadronId;
use crate::unit::{GroundUnit, GroundUnitClass};

/// Damage a shield level absorbs per bombardment round.
const SHIELD_ABSORB_PER_LEVEL: u32 = 5;
/// Damage required to silence one ground battery.
const BATTERY_TOUGHNESS: u32 = 15;
/// Damage required to kill one dug-in ground unit.
const GROUND_UNIT_TOUGHNESS: u32 = 10;

/// A snapshot of a colony's defenses, built before an assault.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanetaryDefense {
    pub shield_level: u32,
    pub ground_batteries: u32,
    pub ground_units: u32,
    pub has_spaceport: bool,
}

impl PlanetaryDefense {
    pub fn of(colony: &Colony) -> Self {
        PlanetaryDefense {
            shield_level: colony.shield_level,
            ground_batteries: colony.ground_batteries,
            ground_units: (colony.armies.len() + colony.marines.len()) as u32,
            has_spaceport: colony.spaceports > 0,
        }
    }
}

/// An attacking squadron flattened for bombardment.
#[derive(Clone, Debug)]
pub struct BombardingSquadron {
    pub id: SquadronId,
    pub attack: u32,
    pub wep: i32,
}

/// What a bombardment accomplished.
#[derive(Clone, Debug, Default)]
pub struct BombardmentOutcome {
    /// Raw damage delivered to infrastructure. The caller converts to IU
    /// lost at 10 damage per IU.
    pub infrastructure_damage: u32,
    pub batteries_destroyed: u32,
    pub ground_units_killed: u32,
    /// Attacker squadrons crippled by battery return fire.
    pub crippled_squadrons: Vec<SquadronId>,
    pub rounds: u32,
}

/// Run an orbital bombardment for up to `rounds` rounds.
pub fn conduct_bombardment(
    config: &GameConfig,
    squadrons: &[BombardingSquadron],
    defense: &PlanetaryDefense,
    seed: u64,
    rounds: u32,
) -> BombardmentOutcome {
    let mut outcome = BombardmentOutcome::default();
    if squadrons.is_empty() {
        return outcome;
    }
    let params = &config.combat;
    let mut rng = DeterministicRng::new(seed);
    let mut batteries = defense.ground_batteries;
    let mut ground_units = defense.ground_units;
    let mut active: Vec<BombardingSquadron> = squadrons.to_vec();

    for _ in 0..rounds {
        if active.is_empty() {
            break;
        }
        outcome.rounds += 1;

        // Attack rolls.
        let mut damage = 0u32;
        for squadron in &active {
            let roll = CerRoll::roll(&mut rng, squadron.wep + (squadron.attack / 4) as i32);
            if roll.is_hit(params.base_to_hit) {
                let dealt = if roll.is_critical(params.critical_hit_threshold) {
                    squadron.attack * 2
                } else {
                    squadron.attack
                };
                damage += dealt;
            }
        }

        // Shields soak a flat amount each round.
        damage = damage.saturating_sub(defense.shield_level * SHIELD_ABSORB_PER_LEVEL);

        // Allocation: batteries first, then dug-in ground forces, the
        // remainder churns infrastructure.
        let to_batteries = damage * 40 / 100;
        let to_ground = damage * 30 / 100;
        let to_infrastructure = damage - to_batteries - to_ground;

        let batteries_hit = (to_batteries / BATTERY_TOUGHNESS).min(batteries);
        batteries -= batteries_hit;
        outcome.batteries_destroyed += batteries_hit;

        let ground_hit = (to_ground / GROUND_UNIT_TOUGHNESS).min(ground_units);
        ground_units -= ground_hit;
        outcome.ground_units_killed += ground_hit;

        outcome.infrastructure_damage += to_infrastructure;

        // Battery return fire: each surviving battery can cripple one
        // bombarding squadron.
        for _ in 0..batteries {
            if active.is_empty() {
                break;
            }
            let roll = CerRoll::roll(&mut rng, 0);
            if roll.is_hit(params.detection_threshold) {
                let idx = rng.pick(active.len());
                let hit = active.remove(idx);
                outcome.crippled_squadrons.push(hit.id);
            }
        }
    }

    outcome
}

/// A ground force flattened for surface combat.
#[derive(Clone, Debug)]
pub struct GroundForce {
    pub units: Vec<GroundUnit>,
}

impl GroundForce {
    pub fn from_units(units: Vec<GroundUnit>) -> Self {
        GroundForce { units }
    }

    fn strength(&self, config: &GameConfig, attacking: bool) -> u32 {
        self.units
            .iter()
            .map(|u| {
                let stats = config.ground_unit(u.class);
                if attacking {
                    stats.attack
                } else {
                    stats.defense
                }
            })
            .sum()
    }
}

/// Outcome of a surface battle. There is no retreat from ground combat:
/// the losing attacker is annihilated.
#[derive(Clone, Debug)]
pub struct GroundCombatOutcome {
    pub attacker_won: bool,
    pub attacker_survivors: Vec<GroundUnit>,
    pub defender_survivors: Vec<GroundUnit>,
    pub rounds: u32,
}

/// Resolve ground combat. `attack_num/attack_den` scales the attacker's
/// strength (blitz lands at half effect).
pub fn ground_combat(
    config: &GameConfig,
    mut attackers: Vec<GroundUnit>,
    mut defenders: Vec<GroundUnit>,
    seed: u64,
    attack_num: u32,
    attack_den: u32,
) -> GroundCombatOutcome {
    let params = &config.combat;
    let mut rng = DeterministicRng::new(seed);
    let mut rounds = 0;

    while rounds < params.ground_combat_max_rounds
        && !attackers.is_empty()
        && !defenders.is_empty()
    {
        rounds += 1;

        let att_strength =
            GroundForce::from_units(attackers.clone()).strength(config, true) * attack_num
                / attack_den.max(1);
        let def_strength = GroundForce::from_units(defenders.clone()).strength(config, false);

        // Each side scores casualties proportional to strength plus a roll.
        let att_roll = rng.roll_d20() as u32;
        let def_roll = rng.roll_d20() as u32;
        let def_casualties = ((att_strength + att_roll) / 12).min(defenders.len() as u32);
        let att_casualties = ((def_strength + def_roll) / 12).min(attackers.len() as u32);

        // Weakest units die first.
        defenders.sort_by_key(|u| config.ground_unit(u.class).defense);
        attackers.sort_by_key(|u| config.ground_unit(u.class).attack);
        defenders.drain(..def_casualties as usize);
        attackers.drain(..att_casualties as usize);
    }

    let attacker_won = defenders.is_empty() && !attackers.is_empty();
    GroundCombatOutcome {
        attacker_won,
        // No retreat: a failed assault leaves no attacker survivors.
        attacker_survivors: if attacker_won { attackers } else { Vec::new() },
        defender_survivors: defenders,
        rounds,
    }
}

/// Marines for a blitz fight through intact batteries: each battery adds a
/// defending militia-equivalent blocking unit.
pub fn battery_screen(defense: &PlanetaryDefense, next_id: &mut impl FnMut() -> crate::ids::GroundUnitId) -> Vec<GroundUnit> {
    (0..defense.ground_batteries)
        .map(|_| GroundUnit::new(next_id(), GroundUnitClass::Militia))
        .collect()
}
