//! Fog-of-war intelligence: per-house snapshots and turn deltas.
//!
//! Each house sees only what its assets and reports justify: systems it
//! occupies or has scouted, estimated colony and fleet figures, and the
//! public leaderboard scalars. A per-turn delta against the previous
//! snapshot is what clients receive; full snapshots are for reconnection.
//!
//! Active disinformation perturbs the counts a victim receives about the
//! saboteur. Discrete values (tech levels, tax policy) are never
//! corrupted, only counts and magnitudes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::GameConfig;
use crate::dice::{DeterministicRng, OpKind};
use crate::espionage::{effect_active, EffectKind};
use crate::ids::{ColonyId, FleetId, HouseId, SystemId};
use crate::state::GameState;

/// How a piece of intelligence was obtained.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ReportOrigin {
    SpyPlanet,
    SpySystem,
    HackStarbase,
    View,
    CombatAfterAction,
}

/// A filed intelligence report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntelligenceReport {
    pub turn: u32,
    pub origin: ReportOrigin,
    pub system: SystemId,
    pub colony: Option<ColonyId>,
    pub summary: String,
}

/// Estimated view of a foreign colony.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonyIntel {
    pub owner: HouseId,
    pub system: SystemId,
    pub population: u32,
    pub infrastructure: u32,
    pub fighters: u32,
    pub ground_batteries: u32,
    pub starbases: u32,
    /// Discrete level; exempt from corruption.
    pub shield_level: u32,
}

/// Estimated view of a foreign fleet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetIntel {
    pub owner: HouseId,
    pub location: SystemId,
    pub squadrons: u32,
    pub spacelift: u32,
}

/// Public leaderboard scalars for one house.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseScalars {
    pub prestige: i32,
    pub colonies: u32,
}

/// One house's complete fog-of-war view at a point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelSnapshot {
    pub turn: u32,
    pub visible_systems: BTreeSet<SystemId>,
    pub colonies: BTreeMap<ColonyId, ColonyIntel>,
    pub fleets: BTreeMap<FleetId, FleetIntel>,
    pub scalars: BTreeMap<HouseId, HouseScalars>,
}

impl IntelSnapshot {
    fn empty() -> Self {
        Self::default()
    }
}

/// The change set between two snapshots. This is what goes on the wire.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IntelDelta {
    pub turn: u32,
    pub systems_revealed: Vec<SystemId>,
    pub systems_lost: Vec<SystemId>,
    pub colonies_upserted: BTreeMap<ColonyId, ColonyIntel>,
    pub colonies_removed: Vec<ColonyId>,
    pub fleets_upserted: BTreeMap<FleetId, FleetIntel>,
    pub fleets_removed: Vec<FleetId>,
    pub scalar_changes: BTreeMap<HouseId, HouseScalars>,
}

impl IntelDelta {
    pub fn is_empty(&self) -> bool {
        self.systems_revealed.is_empty()
            && self.systems_lost.is_empty()
            && self.colonies_upserted.is_empty()
            && self.colonies_removed.is_empty()
            && self.fleets_upserted.is_empty()
            && self.fleets_removed.is_empty()
            && self.scalar_changes.is_empty()
    }
}

/// Build the current snapshot for one house.
pub fn synthesize(state: &GameState, config: &GameConfig, viewer: HouseId) -> IntelSnapshot {
    let mut snapshot = IntelSnapshot::empty();
    snapshot.turn = state.turn;

    // Systems occupied by own assets.
    for id in state.owned_colony_ids(viewer) {
        if let Some(colony) = state.colony(id) {
            snapshot.visible_systems.insert(colony.system);
        }
    }
    for id in state.owned_fleet_ids(viewer) {
        if let Some(fleet) = state.fleet(id) {
            snapshot.visible_systems.insert(fleet.location);
        }
    }
    // Systems from filed reports.
    if let Some(house) = state.house(viewer) {
        for report in &house.intel_reports {
            snapshot.visible_systems.insert(report.system);
        }
    }

    // Colonies: own colonies at ground truth, foreign colonies in visible
    // systems at (possibly corrupted) estimates.
    for colony in state.colonies.values() {
        let own = colony.owner == viewer;
        if !own && !snapshot.visible_systems.contains(&colony.system) {
            continue;
        }
        let mut intel = ColonyIntel {
            owner: colony.owner,
            system: colony.system,
            population: colony.population,
            infrastructure: colony.infrastructure,
            fighters: colony.fighters.len() as u32,
            ground_batteries: colony.ground_batteries,
            starbases: colony.starbases.len() as u32,
            shield_level: colony.shield_level,
        };
        if !own {
            corrupt_colony(state, config, viewer, colony.owner, colony.id, &mut intel);
        }
        snapshot.colonies.insert(colony.id, intel);
    }

    // Fleets: own fleets fully, foreign fleets in visible systems.
    for fleet in state.fleets.values() {
        let own = fleet.owner == viewer;
        if !own && !snapshot.visible_systems.contains(&fleet.location) {
            continue;
        }
        let mut intel = FleetIntel {
            owner: fleet.owner,
            location: fleet.location,
            squadrons: fleet.squadrons.len() as u32,
            spacelift: fleet.spacelift.len() as u32,
        };
        if !own {
            corrupt_fleet(state, config, viewer, fleet.owner, fleet.id, &mut intel);
        }
        snapshot.fleets.insert(fleet.id, intel);
    }

    // Public leaderboard.
    for house in state.houses.values() {
        snapshot.scalars.insert(
            house.id,
            HouseScalars {
                prestige: house.prestige,
                colonies: state.owned_colony_ids(house.id).len() as u32,
            },
        );
    }

    snapshot
}

/// Multiplicative variance for disinformation: uniform swing in the
/// configured percent band, applied up or down.
fn corruption_factor(
    state: &GameState,
    config: &GameConfig,
    viewer: HouseId,
    entity: u64,
) -> (u32, bool) {
    let stream = (u64::from(viewer.0) << 32) | entity;
    let mut rng = DeterministicRng::for_op(state.seed, state.turn, OpKind::IntelCorruption, stream);
    let swing = rng.range_u32(
        config.espionage.corruption_min_pct,
        config.espionage.corruption_max_pct,
    );
    let inflate = rng.pick(2) == 0;
    (swing, inflate)
}

fn perturb(value: u32, swing_pct: u32, inflate: bool) -> u32 {
    let delta = value * swing_pct / 100;
    if inflate {
        value + delta
    } else {
        value.saturating_sub(delta)
    }
}

fn corrupt_colony(
    state: &GameState,
    config: &GameConfig,
    viewer: HouseId,
    subject: HouseId,
    colony: ColonyId,
    intel: &mut ColonyIntel,
) {
    if !effect_active(state, EffectKind::Disinformation, subject, viewer) {
        return;
    }
    let (swing, inflate) = corruption_factor(state, config, viewer, u64::from(colony.0));
    intel.population = perturb(intel.population, swing, inflate);
    intel.infrastructure = perturb(intel.infrastructure, swing, inflate);
    intel.fighters = perturb(intel.fighters, swing, inflate);
    intel.ground_batteries = perturb(intel.ground_batteries, swing, inflate);
    intel.starbases = perturb(intel.starbases, swing, inflate);
    // shield_level is a discrete tech value: left untouched.
}

fn corrupt_fleet(
    state: &GameState,
    config: &GameConfig,
    viewer: HouseId,
    subject: HouseId,
    fleet: FleetId,
    intel: &mut FleetIntel,
) {
    if !effect_active(state, EffectKind::Disinformation, subject, viewer) {
        return;
    }
    let (swing, inflate) =
        corruption_factor(state, config, viewer, 0x8000_0000_0000_0000 | u64::from(fleet.0));
    intel.squadrons = perturb(intel.squadrons, swing, inflate);
    intel.spacelift = perturb(intel.spacelift, swing, inflate);
}

/// Compute the delta from `prev` to `next`.
pub fn delta(prev: Option<&IntelSnapshot>, next: &IntelSnapshot) -> IntelDelta {
    let empty = IntelSnapshot::empty();
    let prev = prev.unwrap_or(&empty);
    let mut out = IntelDelta {
        turn: next.turn,
        ..IntelDelta::default()
    };

    for &system in next.visible_systems.difference(&prev.visible_systems) {
        out.systems_revealed.push(system);
    }
    for &system in prev.visible_systems.difference(&next.visible_systems) {
        out.systems_lost.push(system);
    }

    for (id, intel) in &next.colonies {
        if prev.colonies.get(id) != Some(intel) {
            out.colonies_upserted.insert(*id, intel.clone());
        }
    }
    for id in prev.colonies.keys() {
        if !next.colonies.contains_key(id) {
            out.colonies_removed.push(*id);
        }
    }

    for (id, intel) in &next.fleets {
        if prev.fleets.get(id) != Some(intel) {
            out.fleets_upserted.insert(*id, intel.clone());
        }
    }
    for id in prev.fleets.keys() {
        if !next.fleets.contains_key(id) {
            out.fleets_removed.push(*id);
        }
    }

    for (house, scalars) in &next.scalars {
        if prev.scalars.get(house) != Some(scalars) {
            out.scalar_changes.insert(*house, *scalars);
        }
    }

    out
}

/// Refresh every living house's snapshot, returning the per-house deltas
/// and storing the new snapshots for next turn.
pub fn refresh_all(
    state: &mut GameState,
    config: &GameConfig,
) -> BTreeMap<HouseId, IntelDelta> {
    let mut deltas = BTreeMap::new();
    for house in state.living_houses() {
        let snapshot = synthesize(state, config, house);
        let d = delta(state.prev_intel.get(&house), &snapshot);
        state.prev_intel.insert(house, snapshot);
        deltas.insert(house, d);
    }
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::Colony;
    use pretty_assertions::assert_eq;
    use crate::espionage::OngoingEffect;
    use crate::fleet::Fleet;
    use crate::house::House;
    use crate::starmap::{PlanetClass, ResourceRating, StarMap, System};

    fn state_with_two_houses() -> GameState {
        let systems = (0..4)
            .map(|i| System {
                id: SystemId(i),
                name: format!("S{i}"),
                planet_class: PlanetClass::Benign,
                resource_rating: ResourceRating::Abundant,
            })
            .collect();
        let lanes = vec![
            (SystemId(0), SystemId(1)),
            (SystemId(1), SystemId(2)),
            (SystemId(2), SystemId(3)),
        ];
        let mut state = GameState::new(5, StarMap::new(systems, lanes));
        state
            .houses
            .insert(HouseId(0), House::new(HouseId(0), "A".into(), 100));
        state
            .houses
            .insert(HouseId(1), House::new(HouseId(1), "B".into(), 100));
        state.insert_colony(Colony::new(ColonyId(0), HouseId(0), SystemId(0), 20));
        state.insert_colony(Colony::new(ColonyId(1), HouseId(1), SystemId(3), 20));
        state
    }

    #[test]
    fn test_unscouted_colony_is_invisible() {
        let state = state_with_two_houses();
        let config = GameConfig::standard();
        let snapshot = synthesize(&state, &config, HouseId(0));
        assert!(snapshot.colonies.contains_key(&ColonyId(0)));
        assert!(!snapshot.colonies.contains_key(&ColonyId(1)));
    }

    #[test]
    fn test_fleet_presence_reveals_system() {
        let mut state = state_with_two_houses();
        let config = GameConfig::standard();
        state.insert_fleet(Fleet::new(FleetId(0), HouseId(0), SystemId(3)));
        let snapshot = synthesize(&state, &config, HouseId(0));
        assert!(snapshot.visible_systems.contains(&SystemId(3)));
        assert!(snapshot.colonies.contains_key(&ColonyId(1)));
    }

    #[test]
    fn test_delta_detects_additions() {
        let mut state = state_with_two_houses();
        let config = GameConfig::standard();
        let deltas = refresh_all(&mut state, &config);
        assert!(!deltas[&HouseId(0)].systems_revealed.is_empty());

        // Second refresh with no change: empty delta apart from scalars
        // already being stable.
        let deltas = refresh_all(&mut state, &config);
        assert!(deltas[&HouseId(0)].is_empty());
    }

    #[test]
    fn test_disinformation_corrupts_counts_not_levels() {
        let mut state = state_with_two_houses();
        let config = GameConfig::standard();
        {
            let colony = state.colonies.get_mut(&ColonyId(1)).unwrap();
            colony.infrastructure = 100;
            colony.shield_level = 3;
        }
        state.insert_fleet(Fleet::new(FleetId(0), HouseId(0), SystemId(3)));
        // House 1 planted disinformation against house 0.
        state.ongoing_effects.push(OngoingEffect {
            kind: EffectKind::Disinformation,
            actor: HouseId(1),
            target: HouseId(0),
            turns_remaining: 3,
        });

        let snapshot = synthesize(&state, &config, HouseId(0));
        let intel = &snapshot.colonies[&ColonyId(1)];
        assert_ne!(intel.infrastructure, 100);
        let swing = intel.infrastructure.abs_diff(100);
        assert!((20..=40).contains(&swing), "swing {swing} out of band");
        assert_eq!(intel.shield_level, 3);
    }

    #[test]
    fn test_corruption_is_deterministic() {
        let mut state = state_with_two_houses();
        let config = GameConfig::standard();
        state.insert_fleet(Fleet::new(FleetId(0), HouseId(0), SystemId(3)));
        state.ongoing_effects.push(OngoingEffect {
            kind: EffectKind::Disinformation,
            actor: HouseId(1),
            target: HouseId(0),
            turns_remaining: 3,
        });
        let a = synthesize(&state, &config, HouseId(0));
        let b = synthesize(&state, &config, HouseId(0));
        assert_eq!(a, b);
    }
}
