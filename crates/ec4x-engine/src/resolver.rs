//! Generic simultaneous-conflict resolution.
//!
//! Several houses want the same thing in the same instant: a colony site,
//! a blockade slot, a landing priority. The kernel ranks intents by a
//! caller-supplied strength projection; a strict maximum wins outright,
//! and ties are broken uniformly by a deterministic RNG seeded from
//! `(game_seed, turn, target)`, so replays pick the same winner.

use crate::dice::{derive_seed, DeterministicRng, OpKind};

/// Result of resolving one contested target.
#[derive(Clone, Debug)]
pub struct ConflictOutcome<I> {
    pub winner: I,
    pub losers: Vec<I>,
}

/// Seed for one contested target's tiebreak.
pub fn tiebreaker_seed(game_seed: u64, turn: u32, target: u64) -> u64 {
    derive_seed(game_seed, turn, OpKind::Tiebreak, target)
}

/// Resolve one contested target. Returns `None` for an empty intent set.
pub fn resolve<I, F>(
    mut intents: Vec<I>,
    strength: F,
    game_seed: u64,
    turn: u32,
    target: u64,
) -> Option<ConflictOutcome<I>>
where
    F: Fn(&I) -> u64,
{
    if intents.is_empty() {
        return None;
    }
    if intents.len() == 1 {
        let winner = intents.pop()?;
        return Some(ConflictOutcome {
            winner,
            losers: Vec::new(),
        });
    }

    // Sort descending by strength, stable on submission order.
    intents.sort_by(|a, b| strength(b).cmp(&strength(a)));
    let top = strength(&intents[0]);
    let tied = intents.iter().take_while(|i| strength(i) == top).count();

    let winner_idx = if tied == 1 {
        0
    } else {
        let mut rng = DeterministicRng::new(tiebreaker_seed(game_seed, turn, target));
        rng.pick(tied)
    };

    let winner = intents.remove(winner_idx);
    Some(ConflictOutcome {
        winner,
        losers: intents,
    })
}

/// Rank all intents for one target from strongest claim to weakest,
/// applying the same tiebreak. Used where contested orders execute
/// sequentially (planetary assaults) rather than winner-take-all.
pub fn priority_order<I, F>(
    intents: Vec<I>,
    strength: F,
    game_seed: u64,
    turn: u32,
    target: u64,
) -> Vec<I>
where
    F: Fn(&I) -> u64,
{
    let mut remaining = intents;
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut salt = 0u64;
    while !remaining.is_empty() {
        // Re-derive per pick so equal-strength groups shuffle fairly.
        let Some(outcome) = resolve(
            remaining,
            &strength,
            game_seed,
            turn,
            target.wrapping_add(salt),
        ) else {
            break;
        };
        ordered.push(outcome.winner);
        remaining = outcome.losers;
        salt += 1;
    }
    ordered
}
