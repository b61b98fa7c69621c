use crate::{MAX_CAPACITY, MIN_CAPACITY};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

pub const MIN_CURSOR_SCALE: f32 = 1.0;
pub const MAX_CURSOR_SCALE: f32 = 10.0;

/// Session settings read once at startup.
///
/// `capacity` is the number of slot groups per entity. It must match on the
/// host and every peer, and it cannot change while a session is running.
/// Peers whose capacity differs from the host's are rejected at join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(deserialize_with = "deserialize_capacity")]
    pub capacity: u8,
    /// Client-side cursor scale. Not used by the sync core.
    pub cursor_scale: f32,
}

/// Clamps any integer into the allowed capacity range.
pub fn clamp_capacity(capacity: i64) -> u8 {
    capacity.clamp(MIN_CAPACITY as i64, MAX_CAPACITY as i64) as u8
}

fn deserialize_capacity<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    i64::deserialize(deserializer).map(clamp_capacity)
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: MIN_CAPACITY,
            cursor_scale: MIN_CURSOR_SCALE,
        }
    }
}

impl SessionConfig {
    pub fn with_capacity(capacity: u8) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
        .clamped()
    }

    /// Replaces the capacity with a command-line value, clamped into range.
    pub fn override_capacity(self, capacity: i64) -> Self {
        Self {
            capacity: clamp_capacity(capacity),
            ..self
        }
    }

    /// Pulls every value back into its allowed range.
    pub fn clamped(mut self) -> Self {
        self.capacity = self.capacity.clamp(MIN_CAPACITY, MAX_CAPACITY);
        self.cursor_scale = if self.cursor_scale.is_nan() {
            MIN_CURSOR_SCALE
        } else {
            self.cursor_scale.clamp(MIN_CURSOR_SCALE, MAX_CURSOR_SCALE)
        };
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let config: SessionConfig = serde_json::from_str(json)?;
        Ok(config.clamped())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&contents)?)
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }
}
