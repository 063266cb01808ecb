//! Save/load envelope.
//!
//! Full game state serialization to JSON and MessagePack with a versioned
//! header. The persistence layer decides where bytes go; this module only
//! defines the envelope.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::state::GameState;

/// Current save file format version.
pub const SAVE_FORMAT_VERSION: u32 = 1;

/// A complete save file with metadata and game state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveFile {
    /// Format version for forward compatibility.
    pub version: u32,
    pub metadata: SaveMetadata,
    pub state: GameState,
}

/// Metadata about a save file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveMetadata {
    /// Human-readable save name.
    pub name: String,
    /// Unix timestamp when saved (seconds since epoch).
    pub timestamp: u64,
    /// Turn summary string.
    pub summary: String,
}

impl SaveFile {
    /// Wrap the current state for saving.
    pub fn from_state(state: &GameState, name: String, timestamp: u64) -> Self {
        SaveFile {
            version: SAVE_FORMAT_VERSION,
            metadata: SaveMetadata {
                name,
                timestamp,
                summary: format!("Turn {} - {} houses", state.turn, state.houses.len()),
            },
            state: state.clone(),
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON, rejecting incompatible versions.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let save: SaveFile = serde_json::from_str(json)
            .map_err(|e| EngineError::Deserialization(e.to_string()))?;
        save.check_version()?;
        Ok(save)
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        rmp_serde::to_vec(self).map_err(|e| EngineError::Serialization(e.to_string()))
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, EngineError> {
        let save: SaveFile = rmp_serde::from_slice(data)
            .map_err(|e| EngineError::Deserialization(e.to_string()))?;
        save.check_version()?;
        Ok(save)
    }

    fn check_version(&self) -> Result<(), EngineError> {
        if self.version != SAVE_FORMAT_VERSION {
            return Err(EngineError::Deserialization(format!(
                "unsupported save version {} (expected {})",
                self.version, SAVE_FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::setup::{self, HouseSetup};
    use crate::starmap::{PlanetClass, ResourceRating, StarMap, System};
    use crate::ids::SystemId;

    fn sample_state() -> GameState {
        let systems = (0..2)
            .map(|i| System {
                id: SystemId(i),
                name: format!("S{i}"),
                planet_class: PlanetClass::Benign,
                resource_rating: ResourceRating::Abundant,
            })
            .collect();
        let map = StarMap::new(systems, vec![(SystemId(0), SystemId(1))]);
        let houses = vec![
            HouseSetup {
                name: "A".into(),
                homeworld: SystemId(0),
            },
            HouseSetup {
                name: "B".into(),
                homeworld: SystemId(1),
            },
        ];
        setup::create_initial_state(&GameConfig::standard(), map, &houses, 9).unwrap()
    }

    #[test]
    fn test_json_round_trip() {
        let state = sample_state();
        let save = SaveFile::from_state(&state, "quicksave".into(), 1_700_000_000);
        let json = save.to_json().unwrap();
        let restored = SaveFile::from_json(&json).unwrap();
        assert_eq!(restored.state.turn, state.turn);
        assert_eq!(restored.state.houses.len(), 2);
        assert_eq!(restored.metadata.name, "quicksave");
    }

    #[test]
    fn test_messagepack_round_trip() {
        let state = sample_state();
        let save = SaveFile::from_state(&state, "autosave".into(), 1_700_000_000);
        let bytes = save.to_bytes().unwrap();
        let restored = SaveFile::from_bytes(&bytes).unwrap();
        assert_eq!(restored.state.seed, state.seed);
        assert_eq!(restored.state.fleets.len(), state.fleets.len());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let state = sample_state();
        let mut save = SaveFile::from_state(&state, "old".into(), 0);
        save.version = 99;
        let json = serde_json::to_string(&save).unwrap();
        assert!(SaveFile::from_json(&json).is_err());
    }
}
