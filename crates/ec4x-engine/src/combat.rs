//! The layered combat engine: CER rolls, target buckets, multi-round
//! resolution, cloak detection, and retreat.
//!
//! Callers build a `BattleContext` plus one `TaskForce` per house and get
//! back a `CombatResult`. The engine never touches `GameState`; the
//! Conflict Phase driver applies results through the state mutators.
//! Identical context and task forces produce identical results.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::CombatParams;
use crate::dice::{CerRoll, DeterministicRng};
use crate::fleet::SquadronCondition;
use crate::ids::{FleetId, HouseId, SquadronId, SystemId};
use crate::unit::TargetBucket;

/// Static inputs for one battle.
#[derive(Clone, Debug)]
pub struct BattleContext {
    pub system: SystemId,
    pub seed: u64,
    pub max_rounds: u32,
    pub allow_ambush: bool,
    /// Starbases fire and can be targeted (orbital combat). When false
    /// they ride along for detection only.
    pub allow_starbase_combat: bool,
    /// Houses whose cloaks were already burned in an earlier layer.
    pub pre_detected: BTreeSet<HouseId>,
}

/// A squadron flattened for combat.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CombatSquadron {
    pub id: SquadronId,
    /// Owning fleet; `None` for starbases and unassigned garrison units.
    pub fleet: Option<FleetId>,
    pub house: HouseId,
    pub bucket: TargetBucket,
    pub attack: u32,
    pub defense: u32,
    /// CER modifier from weapons tech and hull.
    pub wep: i32,
    pub condition: SquadronCondition,
    pub is_starbase: bool,
    /// Present for detection but neither fires nor absorbs fire.
    pub inert: bool,
}

impl CombatSquadron {
    fn alive(&self) -> bool {
        self.condition != SquadronCondition::Destroyed
    }

    fn combatant(&self) -> bool {
        self.alive() && !self.inert
    }
}

/// One house's side of a battle.
#[derive(Clone, Debug)]
pub struct TaskForce {
    pub house: HouseId,
    pub squadrons: Vec<CombatSquadron>,
    pub roe: u8,
    pub cloaked: bool,
    /// Detection bonus from scouts and starbases.
    pub scout_rating: i32,
    /// Morale modifier applied to every CER roll.
    pub morale: i32,
    pub homeworld_defender: bool,
}

/// Outcome of one battle.
#[derive(Clone, Debug, Default)]
pub struct CombatResult {
    pub rounds: u32,
    pub victor: Option<HouseId>,
    pub was_stalemate: bool,
    /// Final state of squadrons still alive at battle end (including
    /// retreated ones).
    pub survivors: Vec<CombatSquadron>,
    /// Fleets that withdrew before the end.
    pub retreated: Vec<(HouseId, FleetId)>,
    pub eliminated: Vec<CombatSquadron>,
    /// Squadrons that ended the battle crippled.
    pub crippled: Vec<SquadronId>,
    /// Cloaked houses revealed during the battle (carried to later layers).
    pub detected_houses: BTreeSet<HouseId>,
    /// Squadrons destroyed per house.
    pub losses: BTreeMap<HouseId, u32>,
}

impl CombatResult {
    /// Squadron IDs surviving for a given house.
    pub fn surviving_squadrons(&self, house: HouseId) -> Vec<SquadronId> {
        self.survivors
            .iter()
            .filter(|s| s.house == house)
            .map(|s| s.id)
            .collect()
    }
}

/// Firing order within a round.
#[derive(Clone, Copy, PartialEq, Eq)]
enum SubPhase {
    Ambush,
    Intercept,
    Main,
}

/// Resolve a battle. With fewer than two houses fielding combatants this
/// is a no-op: every squadron survives, no victor, zero rounds.
pub fn resolve_battle(
    params: &CombatParams,
    ctx: &BattleContext,
    mut forces: Vec<TaskForce>,
) -> CombatResult {
    forces.sort_by_key(|tf| tf.house);

    let mut result = CombatResult::default();
    let mut detected: BTreeSet<HouseId> = ctx.pre_detected.clone();
    for tf in &forces {
        if !tf.cloaked {
            detected.insert(tf.house);
        }
    }

    let fighting_houses = forces
        .iter()
        .filter(|tf| tf.squadrons.iter().any(CombatSquadron::combatant))
        .count();
    if fighting_houses < 2 {
        for tf in forces {
            result.survivors.extend(tf.squadrons);
        }
        result.detected_houses = detected;
        return result;
    }

    let mut rng = DeterministicRng::new(ctx.seed);
    let mut retreated_houses: BTreeSet<HouseId> = BTreeSet::new();

    while result.rounds < ctx.max_rounds {
        result.rounds += 1;

        // 1. Detection pass. Undetected cloaked houses cannot be targeted
        //    this round.
        detection_pass(params, &forces, &retreated_houses, &mut detected, &mut rng);

        // 2. Firing passes: Ambush -> Intercept -> Main.
        let sub_phases: &[SubPhase] = if ctx.allow_ambush {
            &[SubPhase::Ambush, SubPhase::Intercept, SubPhase::Main]
        } else {
            &[SubPhase::Intercept, SubPhase::Main]
        };
        for &sub in sub_phases {
            fire_sub_phase(
                params,
                ctx,
                sub,
                &mut forces,
                &retreated_houses,
                &mut detected,
                &mut rng,
                &mut result,
            );
        }

        // 3. End-of-round retreats.
        for tf in &forces {
            if retreated_houses.contains(&tf.house) || tf.homeworld_defender {
                continue;
            }
            if should_retreat(tf) {
                retreated_houses.insert(tf.house);
                for squadron in &tf.squadrons {
                    if squadron.alive() && !squadron.is_starbase {
                        if let Some(fleet) = squadron.fleet {
                            if !result.retreated.contains(&(tf.house, fleet)) {
                                result.retreated.push((tf.house, fleet));
                            }
                        }
                    }
                }
            }
        }

        // 4. Battle-end check: at most one house still standing and engaged.
        let standing: Vec<HouseId> = forces
            .iter()
            .filter(|tf| {
                !retreated_houses.contains(&tf.house)
                    && tf.squadrons.iter().any(CombatSquadron::combatant)
            })
            .map(|tf| tf.house)
            .collect();
        if standing.len() <= 1 {
            result.victor = standing.first().copied();
            break;
        }
    }

    if result.victor.is_none() && result.rounds >= ctx.max_rounds {
        let viable = forces
            .iter()
            .filter(|tf| {
                !retreated_houses.contains(&tf.house)
                    && tf.squadrons.iter().any(CombatSquadron::combatant)
            })
            .count();
        result.was_stalemate = viable >= 2;
    }

    for tf in forces {
        for squadron in tf.squadrons {
            if squadron.alive() {
                if squadron.condition == SquadronCondition::Crippled {
                    result.crippled.push(squadron.id);
                }
                result.survivors.push(squadron);
            }
        }
    }
    result.detected_houses = detected;
    result
}

fn detection_pass(
    params: &CombatParams,
    forces: &[TaskForce],
    retreated: &BTreeSet<HouseId>,
    detected: &mut BTreeSet<HouseId>,
    rng: &mut DeterministicRng,
) {
    for tf in forces {
        if detected.contains(&tf.house) || retreated.contains(&tf.house) {
            continue;
        }
        // Best enemy sensor suite gets one roll per round.
        let best_scout = forces
            .iter()
            .filter(|other| other.house != tf.house && !retreated.contains(&other.house))
            .map(|other| other.scout_rating)
            .max()
            .unwrap_or(0);
        let roll = rng.roll_d20() + best_scout;
        if roll >= params.detection_threshold {
            detected.insert(tf.house);
        }
    }
}

fn sub_phase_of(squadron: &CombatSquadron, tf_cloaked_undetected: bool, ambush: bool) -> SubPhase {
    if ambush && tf_cloaked_undetected {
        return SubPhase::Ambush;
    }
    match squadron.bucket {
        TargetBucket::Fighter | TargetBucket::Destroyer => SubPhase::Intercept,
        _ => SubPhase::Main,
    }
}

#[allow(clippy::too_many_arguments)]
fn fire_sub_phase(
    params: &CombatParams,
    ctx: &BattleContext,
    sub: SubPhase,
    forces: &mut Vec<TaskForce>,
    retreated: &BTreeSet<HouseId>,
    detected: &mut BTreeSet<HouseId>,
    rng: &mut DeterministicRng,
    result: &mut CombatResult,
) {
    // Snapshot firing plan first; damage applies as we go, so a squadron
    // destroyed earlier in the sub-phase no longer fires.
    let shooters: Vec<(usize, usize)> = forces
        .iter()
        .enumerate()
        .flat_map(|(tf_idx, tf)| {
            let cloak_hidden = tf.cloaked && !detected.contains(&tf.house);
            let house_retreated = retreated.contains(&tf.house);
            tf.squadrons
                .iter()
                .enumerate()
                .filter(move |(_, s)| {
                    !house_retreated
                        && s.combatant()
                        && (!s.is_starbase || ctx.allow_starbase_combat)
                })
                .filter(move |(_, s)| {
                    sub_phase_of(s, cloak_hidden, ctx.allow_ambush) == sub
                })
                .map(move |(s_idx, _)| (tf_idx, s_idx))
                .collect::<Vec<_>>()
        })
        .collect();

    for (tf_idx, s_idx) in shooters {
        let (house, attack, wep, morale, was_hidden) = {
            let tf = &forces[tf_idx];
            let squadron = &tf.squadrons[s_idx];
            // May have been destroyed earlier in this sub-phase.
            if !squadron.combatant() {
                continue;
            }
            (
                tf.house,
                squadron.attack,
                squadron.wep,
                tf.morale,
                tf.cloaked && !detected.contains(&tf.house),
            )
        };

        // Select a target house, bucket, and squadron.
        let Some((target_tf, target_sq)) =
            select_target(params, ctx, forces, house, retreated, detected, rng)
        else {
            continue;
        };

        let (to_hit, crit) = {
            let target = &forces[target_tf].squadrons[target_sq];
            let to_hit = params.base_to_hit + (target.defense / 4) as i32;
            (to_hit, params.critical_hit_threshold)
        };

        let ambush_bonus = if was_hidden && sub == SubPhase::Ambush { 2 } else { 0 };
        let modifier = wep + morale + (attack / 4) as i32 + ambush_bonus;
        let roll = CerRoll::roll(rng, modifier);

        if roll.is_hit(to_hit) {
            let steps = if roll.is_critical(crit) { 2 } else { 1 };
            let target = &mut forces[target_tf].squadrons[target_sq];
            for _ in 0..steps {
                target.condition = target.condition.degraded();
            }
            if target.condition == SquadronCondition::Destroyed {
                let dead = target.clone();
                *result.losses.entry(dead.house).or_insert(0) += 1;
                result.eliminated.push(dead);
            }
        }

        // Opening fire gives the shooter's position away.
        if was_hidden {
            detected.insert(house);
        }
    }
}

/// Pick a hostile squadron: weighted bucket selection across the targetable
/// enemies, then a uniform pick inside the bucket.
fn select_target(
    params: &CombatParams,
    ctx: &BattleContext,
    forces: &[TaskForce],
    shooter: HouseId,
    retreated: &BTreeSet<HouseId>,
    detected: &BTreeSet<HouseId>,
    rng: &mut DeterministicRng,
) -> Option<(usize, usize)> {
    let mut candidates: Vec<(usize, usize)> = Vec::new();
    for (tf_idx, tf) in forces.iter().enumerate() {
        if tf.house == shooter
            || retreated.contains(&tf.house)
            || (tf.cloaked && !detected.contains(&tf.house))
        {
            continue;
        }
        for (s_idx, squadron) in tf.squadrons.iter().enumerate() {
            if !squadron.combatant() {
                continue;
            }
            if squadron.is_starbase && !ctx.allow_starbase_combat {
                continue;
            }
            candidates.push((tf_idx, s_idx));
        }
    }
    if candidates.is_empty() {
        return None;
    }

    // Weighted pick over the non-empty buckets.
    let mut bucket_totals: BTreeMap<TargetBucket, u32> = BTreeMap::new();
    for &(tf_idx, s_idx) in &candidates {
        let bucket = forces[tf_idx].squadrons[s_idx].bucket;
        *bucket_totals.entry(bucket).or_insert(0) += params.bucket_weight(bucket);
    }
    let total: u32 = bucket_totals.values().sum();
    let mut pick = rng.range_u32(0, total.saturating_sub(1));
    let mut chosen_bucket = *bucket_totals.keys().next()?;
    for (&bucket, &weight) in &bucket_totals {
        if pick < weight {
            chosen_bucket = bucket;
            break;
        }
        pick -= weight;
    }

    let in_bucket: Vec<(usize, usize)> = candidates
        .into_iter()
        .filter(|&(tf_idx, s_idx)| forces[tf_idx].squadrons[s_idx].bucket == chosen_bucket)
        .collect();
    let idx = rng.pick(in_bucket.len());
    Some(in_bucket[idx])
}

/// ROE-scaled withdrawal: a force retreats once its damaged fraction
/// crosses `25 + roe * 10` percent. ROE 8+ never voluntarily withdraws.
/// Losing more than half the force outright collapses morale regardless.
fn should_retreat(tf: &TaskForce) -> bool {
    let mobile: Vec<&CombatSquadron> = tf
        .squadrons
        .iter()
        .filter(|s| !s.is_starbase && !s.inert)
        .collect();
    if mobile.is_empty() {
        return false;
    }
    let total = mobile.len() as u32;
    let destroyed = mobile
        .iter()
        .filter(|s| s.condition == SquadronCondition::Destroyed)
        .count() as u32;
    let damaged = mobile
        .iter()
        .filter(|s| s.condition != SquadronCondition::Undamaged)
        .count() as u32;

    if destroyed * 2 > total {
        return true;
    }
    let threshold_pct = 25 + u32::from(tf.roe) * 10;
    damaged * 100 >= threshold_pct * total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::unit::ShipClass;

    fn squadron(
        id: u32,
        fleet: u32,
        house: u32,
        class: ShipClass,
        config: &GameConfig,
    ) -> CombatSquadron {
        let stats = config.ship(class);
        CombatSquadron {
            id: SquadronId(id),
            fleet: Some(FleetId(fleet)),
            house: HouseId(house),
            bucket: class.target_bucket(),
            attack: stats.attack,
            defense: stats.defense,
            wep: stats.wep,
            condition: SquadronCondition::Undamaged,
            is_starbase: false,
            inert: false,
        }
    }

    fn task_force(house: u32, squadrons: Vec<CombatSquadron>) -> TaskForce {
        TaskForce {
            house: HouseId(house),
            squadrons,
            roe: 5,
            cloaked: false,
            scout_rating: 0,
            morale: 0,
            homeworld_defender: false,
        }
    }

    fn ctx(seed: u64) -> BattleContext {
        BattleContext {
            system: SystemId(42),
            seed,
            max_rounds: 20,
            allow_ambush: true,
            allow_starbase_combat: false,
            pre_detected: BTreeSet::new(),
        }
    }

    #[test]
    fn test_single_task_force_is_noop() {
        let config = GameConfig::standard();
        let forces = vec![task_force(
            0,
            vec![squadron(0, 0, 0, ShipClass::Cruiser, &config)],
        )];
        let result = resolve_battle(&config.combat, &ctx(1), forces);
        assert_eq!(result.rounds, 0);
        assert_eq!(result.victor, None);
        assert_eq!(result.survivors.len(), 1);
        assert!(result.eliminated.is_empty());
    }

    #[test]
    fn test_decisive_victory_strong_over_weak() {
        let config = GameConfig::standard();
        let forces = vec![
            task_force(
                0,
                vec![
                    squadron(0, 0, 0, ShipClass::Cruiser, &config),
                    squadron(1, 0, 0, ShipClass::Cruiser, &config),
                    squadron(2, 0, 0, ShipClass::Cruiser, &config),
                ],
            ),
            task_force(
                1,
                vec![
                    squadron(3, 1, 1, ShipClass::Destroyer, &config),
                    squadron(4, 1, 1, ShipClass::Frigate, &config),
                ],
            ),
        ];
        let mut tf1 = forces;
        // The weak side fights to the end so the battle is decisive.
        tf1[1].roe = 10;
        tf1[0].roe = 10;
        let result = resolve_battle(&config.combat, &ctx(12345), tf1);
        assert_eq!(result.victor, Some(HouseId(0)));
        assert!(!result.was_stalemate);
        assert_eq!(result.losses.get(&HouseId(1)), Some(&2));
        assert!(result.surviving_squadrons(HouseId(1)).is_empty());
        assert!(!result.surviving_squadrons(HouseId(0)).is_empty());
    }

    #[test]
    fn test_determinism_same_seed_same_result() {
        let config = GameConfig::standard();
        let build = || {
            vec![
                task_force(
                    0,
                    vec![
                        squadron(0, 0, 0, ShipClass::Battleship, &config),
                        squadron(1, 0, 0, ShipClass::Destroyer, &config),
                    ],
                ),
                task_force(
                    1,
                    vec![
                        squadron(2, 1, 1, ShipClass::Cruiser, &config),
                        squadron(3, 1, 1, ShipClass::Cruiser, &config),
                    ],
                ),
            ]
        };
        let a = resolve_battle(&config.combat, &ctx(777), build());
        let b = resolve_battle(&config.combat, &ctx(777), build());
        assert_eq!(a.rounds, b.rounds);
        assert_eq!(a.victor, b.victor);
        assert_eq!(a.losses, b.losses);
        assert_eq!(
            a.survivors.iter().map(|s| s.id).collect::<Vec<_>>(),
            b.survivors.iter().map(|s| s.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_different_seed_may_differ_but_is_valid() {
        let config = GameConfig::standard();
        let forces = vec![
            task_force(0, vec![squadron(0, 0, 0, ShipClass::Cruiser, &config)]),
            task_force(1, vec![squadron(1, 1, 1, ShipClass::Cruiser, &config)]),
        ];
        let result = resolve_battle(&config.combat, &ctx(999), forces);
        assert!(result.rounds >= 1);
        assert!(result.survivors.len() + result.eliminated.len() == 2);
    }

    #[test]
    fn test_pre_detected_house_is_targetable_immediately() {
        let config = GameConfig::standard();
        let mut cloaked = task_force(1, vec![squadron(1, 1, 1, ShipClass::Raider, &config)]);
        cloaked.cloaked = true;
        let forces = vec![
            task_force(0, vec![squadron(0, 0, 0, ShipClass::Battleship, &config)]),
            cloaked,
        ];
        let mut context = ctx(4);
        context.pre_detected.insert(HouseId(1));
        let result = resolve_battle(&config.combat, &context, forces);
        assert!(result.detected_houses.contains(&HouseId(1)));
    }

    #[test]
    fn test_inert_starbase_not_targeted_in_space_combat() {
        let config = GameConfig::standard();
        let stats = config.ship(ShipClass::Starbase);
        let base = CombatSquadron {
            id: SquadronId(9),
            fleet: None,
            house: HouseId(1),
            bucket: TargetBucket::Starbase,
            attack: stats.attack,
            defense: stats.defense,
            wep: stats.wep,
            condition: SquadronCondition::Undamaged,
            is_starbase: true,
            inert: true,
        };
        // House 1 fields ONLY the inert starbase, so only one house has
        // combatants: no-op.
        let forces = vec![
            task_force(0, vec![squadron(0, 0, 0, ShipClass::Cruiser, &config)]),
            task_force(1, vec![base]),
        ];
        let result = resolve_battle(&config.combat, &ctx(5), forces);
        assert_eq!(result.rounds, 0);
        assert!(result.eliminated.is_empty());
    }

    #[test]
    fn test_starbase_fights_in_orbital_combat() {
        let config = GameConfig::standard();
        let stats = config.ship(ShipClass::Starbase);
        let base = CombatSquadron {
            id: SquadronId(9),
            fleet: None,
            house: HouseId(1),
            bucket: TargetBucket::Starbase,
            attack: stats.attack,
            defense: stats.defense,
            wep: stats.wep,
            condition: SquadronCondition::Undamaged,
            is_starbase: true,
            inert: false,
        };
        let forces = vec![
            task_force(
                0,
                vec![
                    squadron(0, 0, 0, ShipClass::Battleship, &config),
                    squadron(1, 0, 0, ShipClass::Battleship, &config),
                    squadron(2, 0, 0, ShipClass::Dreadnought, &config),
                ],
            ),
            task_force(1, vec![base]),
        ];
        let mut context = ctx(6);
        context.allow_starbase_combat = true;
        let result = resolve_battle(&config.combat, &context, forces);
        assert!(result.rounds >= 1);
        // The lone starbase is eventually overwhelmed.
        assert_eq!(result.victor, Some(HouseId(0)));
    }

    #[test]
    fn test_homeworld_defender_never_retreats() {
        let config = GameConfig::standard();
        let mut defender = task_force(
            1,
            vec![
                squadron(2, 1, 1, ShipClass::Corvette, &config),
                squadron(3, 1, 1, ShipClass::Corvette, &config),
            ],
        );
        defender.roe = 0;
        defender.homeworld_defender = true;
        let forces = vec![
            task_force(
                0,
                vec![
                    squadron(0, 0, 0, ShipClass::Dreadnought, &config),
                    squadron(1, 0, 0, ShipClass::Dreadnought, &config),
                ],
            ),
            defender,
        ];
        let result = resolve_battle(&config.combat, &ctx(8), forces);
        assert!(result.retreated.iter().all(|(h, _)| *h != HouseId(1)));
    }

    #[test]
    fn test_low_roe_retreats_on_damage() {
        let config = GameConfig::standard();
        let mut timid = task_force(
            1,
            vec![
                squadron(2, 1, 1, ShipClass::Frigate, &config),
                squadron(3, 1, 1, ShipClass::Frigate, &config),
                squadron(4, 1, 1, ShipClass::Frigate, &config),
            ],
        );
        timid.roe = 0;
        let forces = vec![
            task_force(
                0,
                vec![
                    squadron(0, 0, 0, ShipClass::Dreadnought, &config),
                    squadron(1, 0, 0, ShipClass::Dreadnought, &config),
                ],
            ),
            timid,
        ];
        let result = resolve_battle(&config.combat, &ctx(21), forces);
        // Either wiped out or retreated, but a ROE-0 force with survivors
        // that took damage must have withdrawn.
        let survivors = result.surviving_squadrons(HouseId(1));
        if !survivors.is_empty() && !result.losses.contains_key(&HouseId(0)) {
            let withdrew = result.retreated.iter().any(|(h, _)| *h == HouseId(1));
            let undamaged = result
                .survivors
                .iter()
                .filter(|s| s.house == HouseId(1))
                .all(|s| s.condition == SquadronCondition::Undamaged);
            assert!(withdrew || undamaged);
        }
    }
}
