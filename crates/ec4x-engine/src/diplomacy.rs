//! Pairwise diplomatic state and the escalation policy.
//!
//! Relations are directional: each house keeps its own view of every other
//! house. States only escalate implicitly; explicit player action is the
//! only path back down.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::event::GameEvent;
use crate::ids::HouseId;
use crate::order::DiplomaticAction;
use crate::state::GameState;

/// How one house regards another.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiplomaticState {
    Neutral,
    Hostile,
    Enemy,
}

impl DiplomaticState {
    /// Escalate to at least `floor`. Never downgrades.
    pub fn escalated_to(self, floor: DiplomaticState) -> DiplomaticState {
        self.max(floor)
    }
}

/// Set `house`'s view of `other`, emitting an event when it changes.
/// Used for explicit player actions, which may downgrade.
pub fn set_relation(
    state: &mut GameState,
    house: HouseId,
    other: HouseId,
    to: DiplomaticState,
    reason: &str,
    events: &mut Vec<GameEvent>,
) {
    let Some(h) = state.houses.get_mut(&house) else {
        return;
    };
    let from = h.relation(other);
    if from == to {
        return;
    }
    h.relations.insert(other, to);
    events.push(GameEvent::DiplomaticRelationChanged {
        house,
        toward: other,
        from,
        to,
        reason: reason.to_string(),
    });
}

/// Escalate `house`'s view of `other` to at least `floor`. Only the single
/// directional relation changes; the reverse relation is untouched.
pub fn escalate_relation(
    state: &mut GameState,
    house: HouseId,
    other: HouseId,
    floor: DiplomaticState,
    reason: &str,
    events: &mut Vec<GameEvent>,
) {
    let Some(h) = state.houses.get_mut(&house) else {
        return;
    };
    let from = h.relation(other);
    let to = from.escalated_to(floor);
    if from == to {
        return;
    }
    h.relations.insert(other, to);
    events.push(GameEvent::DiplomaticRelationChanged {
        house,
        toward: other,
        from,
        to,
        reason: reason.to_string(),
    });
}

/// Execute one house's diplomatic actions for the turn.
pub fn execute_actions(
    state: &mut GameState,
    _config: &GameConfig,
    house: HouseId,
    actions: &[DiplomaticAction],
    events: &mut Vec<GameEvent>,
) {
    for action in actions {
        match *action {
            DiplomaticAction::DeclareHostile { target } => {
                if target != house {
                    escalate_relation(
                        state,
                        house,
                        target,
                        DiplomaticState::Hostile,
                        "Hostility declared",
                        events,
                    );
                }
            }
            DiplomaticAction::DeclareEnemy { target } => {
                if target != house {
                    escalate_relation(
                        state,
                        house,
                        target,
                        DiplomaticState::Enemy,
                        "War declared",
                        events,
                    );
                }
            }
            DiplomaticAction::SetNeutral { target } => {
                if target != house {
                    set_relation(
                        state,
                        house,
                        target,
                        DiplomaticState::Neutral,
                        "Peace offered",
                        events,
                    );
                }
            }
        }
    }
}

/// Two houses are mutually hostile if either side regards the other as
/// Hostile or worse. Combat triggers on this.
pub fn are_hostile(state: &GameState, a: HouseId, b: HouseId) -> bool {
    if a == b {
        return false;
    }
    let a_view = state
        .houses
        .get(&a)
        .map(|h| h.relation(b))
        .unwrap_or(DiplomaticState::Neutral);
    let b_view = state
        .houses
        .get(&b)
        .map(|h| h.relation(a))
        .unwrap_or(DiplomaticState::Neutral);
    a_view >= DiplomaticState::Hostile || b_view >= DiplomaticState::Hostile
}
