use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use dogfight::SessionConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub orbit_radius: f32,
    pub altitude: f32,
    /// Degrees per second around the arena centre.
    pub orbit_speed: f32,
    /// Seconds between shots; zero disables firing.
    pub fire_interval: f32,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            orbit_radius: 20.0,
            altitude: 8.0,
            orbit_speed: 30.0,
            fire_interval: 3.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub session: SessionConfig,
    pub pilot: PilotConfig,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}
