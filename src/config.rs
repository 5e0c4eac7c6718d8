//! Emulator settings, read from an optional TOML file, e.g.
//!
//! ```toml
//! cycles_per_second = 500
//! wrap_sprites = true
//! keymap = "literal"
//! sound = true
//! ```
//!
//! Anything missing takes its default; command-line flags override the file.

use crate::error::{Error, Result};
use crate::input::Keymap;
use crate::sound::SIMPLEBEEP_PITCH;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// instructions per second; about what the COSMAC VIP managed
pub const DEFAULT_CYCLES_PER_SECOND: f64 = 700.0;

/// how long a key stays held after the terminal last reported it
pub const DEFAULT_KEY_HOLD_MS: u64 = 150;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cycles_per_second: f64,
    /// sprites drawn over an edge reappear on the opposite side
    pub wrap_sprites: bool,
    pub keymap: Keymap,
    pub key_hold_ms: u64,
    /// beep through the PC speaker while the sound timer runs
    pub sound: bool,
    pub pitch: u16,
    /// seed RND for repeatable runs
    pub seed: Option<u64>,
    /// stop after this many instructions
    pub cycle_limit: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cycles_per_second: DEFAULT_CYCLES_PER_SECOND,
            wrap_sprites: false,
            keymap: Keymap::default(),
            key_hold_ms: DEFAULT_KEY_HOLD_MS,
            sound: false,
            pitch: SIMPLEBEEP_PITCH,
            seed: None,
            cycle_limit: None,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.cycles_per_second.is_finite() || self.cycles_per_second <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "cycles_per_second must be positive, got {}",
                self.cycles_per_second
            )));
        }
        Ok(())
    }

    pub fn key_hold(&self) -> Duration {
        Duration::from_millis(self.key_hold_ms)
    }
}
