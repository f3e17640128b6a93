use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ags_formats::game::MAX_PLUGINS;

/// Loop budget handed to the VM's alive timer.
pub const DEFAULT_SCRIPT_TIMEOUT_LOOPS: u32 = 150_000;

/// Engine-side settings that are not part of the game data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run 320x200 and 320x240 games at double resolution.
    pub override_upscale: bool,
    pub script_timeout_loops: u32,
    pub max_plugins: usize,
    /// Refuse rooms compiled for a different game.
    pub strict_room_game_id: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            override_upscale: false,
            script_timeout_loops: DEFAULT_SCRIPT_TIMEOUT_LOOPS,
            max_plugins: MAX_PLUGINS,
            strict_room_game_id: true,
        }
    }
}

impl EngineConfig {
    /// Reads the config if `path` names an existing file, defaults otherwise.
    pub fn from_json_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            log::debug!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse engine config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = EngineConfig::from_json_file(Some(&dir.path().join("engine.json")))?;
        assert_eq!(config, EngineConfig::default());
        assert_eq!(EngineConfig::from_json_file(None)?, EngineConfig::default());
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"override_upscale": true, "max_plugins": 4}"#)?;
        let config = EngineConfig::from_json_file(Some(&path))?;
        assert!(config.override_upscale);
        assert_eq!(config.max_plugins, 4);
        assert_eq!(config.script_timeout_loops, DEFAULT_SCRIPT_TIMEOUT_LOOPS);
        assert!(config.strict_room_game_id);
        Ok(())
    }
}
