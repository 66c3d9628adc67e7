use std::path::PathBuf;

use anyhow::{Context, Result};
use chordweaver_core::Key;
use chordweaver_services::SessionConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    /// Octave chord symbols are voiced in
    pub octave: i8,
    pub key: KeyConfig,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            octave: 4,
            key: KeyConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct KeyConfig {
    pub tonic: String,
    pub mode: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            tonic: "C".to_string(),
            mode: "major".to_string(),
        }
    }
}

impl KeyConfig {
    pub fn key(&self) -> Result<Key> {
        Ok(Key::new(self.tonic.parse()?, self.mode.parse()?))
    }
}

pub(crate) fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chordweaver")
        .join("config.toml")
}

/// Missing or unreadable files give the defaults
pub(crate) fn load_config() -> AppConfig {
    let path = config_path();
    let Ok(text) = std::fs::read_to_string(&path) else {
        return AppConfig::default();
    };
    match toml::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring malformed config");
            AppConfig::default()
        }
    }
}

pub(crate) fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(config)?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chordweaver_core::{Archetype, Mode};

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.session, config.session);
        assert_eq!(back.octave, 4);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let text = r#"
            [key]
            tonic = "Eb"
            mode = "dorian"

            [session.instrument]
            archetype = "fm"
            harmonicity = 2.0
        "#;
        let config: AppConfig = toml::from_str(text).unwrap();
        let key = config.key.key().unwrap();
        assert_eq!(key.mode, Mode::Dorian);
        assert_eq!(config.session.instrument.archetype(), Archetype::Fm);
        assert!(config.session.loop_enabled);
    }
}
