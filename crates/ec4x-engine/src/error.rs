//! Engine error types. The engine never panics; all errors are returned as
//! Results. Per-order problems are downgraded to events by the phase
//! drivers; only fatal conditions surface through these variants.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All possible errors from the turn resolution core.
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
pub enum EngineError {
    #[error("Unknown house: {house}")]
    UnknownHouse { house: u32 },

    #[error("Unknown fleet: {fleet}")]
    UnknownFleet { fleet: u32 },

    #[error("Unknown colony: {colony}")]
    UnknownColony { colony: u32 },

    #[error("Unknown system: {system}")]
    UnknownSystem { system: u32 },

    #[error("Order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("Invariant violated: {detail}")]
    InvariantViolation { detail: String },

    #[error("Corrupted index: {detail}")]
    CorruptedIndex { detail: String },

    #[error("Game setup error: {0}")]
    SetupError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Internal engine error: {0}")]
    Internal(String),
}
