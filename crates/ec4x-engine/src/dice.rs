//! Deterministic RNG for reproducible turn resolution.
//!
//! Uses ChaCha8 seeded per operation class from
//! `(game_seed, turn, operation, target)`. Each random operation class
//! gets its own stream, so a local change (an extra combat round, say)
//! never shifts the draws of an unrelated operation. Identical inputs
//! produce bit-identical outputs.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// The classes of random operation. Each gets an independent stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    SpaceCombat,
    OrbitalCombat,
    Bombardment,
    GroundCombat,
    Detection,
    Tiebreak,
    Espionage,
    IntelCorruption,
}

impl OpKind {
    fn tag(self) -> u64 {
        match self {
            OpKind::SpaceCombat => 1,
            OpKind::OrbitalCombat => 2,
            OpKind::Bombardment => 3,
            OpKind::GroundCombat => 4,
            OpKind::Detection => 5,
            OpKind::Tiebreak => 6,
            OpKind::Espionage => 7,
            OpKind::IntelCorruption => 8,
        }
    }
}

/// SplitMix64 finalizer. Spreads structured inputs across the seed space.
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Derive the seed for one random operation.
pub fn derive_seed(game_seed: u64, turn: u32, op: OpKind, target: u64) -> u64 {
    let mut seed = mix(game_seed);
    seed = mix(seed ^ u64::from(turn));
    seed = mix(seed ^ op.tag());
    mix(seed ^ target)
}

/// A deterministic roller backed by ChaCha8.
pub struct DeterministicRng {
    rng: ChaCha8Rng,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        DeterministicRng {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Convenience constructor straight from operation coordinates.
    pub fn for_op(game_seed: u64, turn: u32, op: OpKind, target: u64) -> Self {
        Self::new(derive_seed(game_seed, turn, op, target))
    }

    /// Roll a single d20 (returns 1-20).
    pub fn roll_d20(&mut self) -> i32 {
        self.rng.gen_range(1..=20)
    }

    /// Roll a single d100 (returns 1-100).
    pub fn roll_d100(&mut self) -> u32 {
        self.rng.gen_range(1..=100)
    }

    /// Uniform pick in `0..bound`. `bound` must be nonzero.
    pub fn pick(&mut self, bound: usize) -> usize {
        self.rng.gen_range(0..bound)
    }

    /// Uniform value in an inclusive range.
    pub fn range_u32(&mut self, low: u32, high: u32) -> u32 {
        self.rng.gen_range(low..=high)
    }
}

/// One Combat Effectiveness Roll: natural d20 plus modifiers.
#[derive(Clone, Copy, Debug)]
pub struct CerRoll {
    pub natural: i32,
    pub modifier: i32,
}

impl CerRoll {
    pub fn roll(rng: &mut DeterministicRng, modifier: i32) -> Self {
        CerRoll {
            natural: rng.roll_d20(),
            modifier,
        }
    }

    pub fn final_roll(&self) -> i32 {
        self.natural + self.modifier
    }

    pub fn is_hit(&self, to_hit: i32) -> bool {
        self.final_roll() >= to_hit
    }

    pub fn is_critical(&self, threshold: i32) -> bool {
        self.final_roll() >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = DeterministicRng::new(42);
        let mut b = DeterministicRng::new(42);
        let rolls_a: Vec<i32> = (0..20).map(|_| a.roll_d20()).collect();
        let rolls_b: Vec<i32> = (0..20).map(|_| b.roll_d20()).collect();
        assert_eq!(rolls_a, rolls_b);
    }

    #[test]
    fn test_rolls_in_range() {
        let mut rng = DeterministicRng::new(0);
        for _ in 0..200 {
            let roll = rng.roll_d20();
            assert!((1..=20).contains(&roll), "roll {roll} out of range");
        }
    }

    #[test]
    fn test_op_streams_are_independent() {
        let a = derive_seed(7, 3, OpKind::SpaceCombat, 42);
        let b = derive_seed(7, 3, OpKind::OrbitalCombat, 42);
        let c = derive_seed(7, 3, OpKind::SpaceCombat, 43);
        let d = derive_seed(7, 4, OpKind::SpaceCombat, 42);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_derive_seed_is_stable() {
        assert_eq!(
            derive_seed(12345, 1, OpKind::Tiebreak, 7),
            derive_seed(12345, 1, OpKind::Tiebreak, 7)
        );
    }

    #[test]
    fn test_cer_roll_arithmetic() {
        let roll = CerRoll {
            natural: 12,
            modifier: 3,
        };
        assert_eq!(roll.final_roll(), 15);
        assert!(roll.is_hit(15));
        assert!(!roll.is_hit(16));
        assert!(!roll.is_critical(19));
        let crit = CerRoll {
            natural: 18,
            modifier: 2,
        };
        assert!(crit.is_critical(19));
    }
}
