//! The four resolution phases of a turn.

use serde::{Deserialize, Serialize};

/// The four ordered phases of turn resolution.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Combat, blockade, and espionage from last turn's orders.
    Conflict,
    /// Production, maintenance, salvage, capacity, prestige, victory.
    Income,
    /// Commissioning, colonization, order admission, order storage.
    Command,
    /// Movement, construction, diplomacy, cleanup, turn increment.
    Maintenance,
}

impl Phase {
    /// Returns the next phase, or `None` at end of turn.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Conflict => Some(Phase::Income),
            Phase::Income => Some(Phase::Command),
            Phase::Command => Some(Phase::Maintenance),
            Phase::Maintenance => None,
        }
    }

    /// The full phase order for one turn.
    pub fn order() -> &'static [Phase; 4] {
        &[Phase::Conflict, Phase::Income, Phase::Command, Phase::Maintenance]
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Phase::Conflict => "Conflict Phase",
            Phase::Income => "Income Phase",
            Phase::Command => "Command Phase",
            Phase::Maintenance => "Maintenance Phase",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_sequence() {
        assert_eq!(Phase::Conflict.next(), Some(Phase::Income));
        assert_eq!(Phase::Income.next(), Some(Phase::Command));
        assert_eq!(Phase::Command.next(), Some(Phase::Maintenance));
        assert_eq!(Phase::Maintenance.next(), None);
    }

    #[test]
    fn test_order_walks_the_chain() {
        let order = Phase::order();
        for pair in order.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
        }
    }
}
