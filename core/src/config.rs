use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::focus::{default_channel_priorities, DIALOG_CHANNEL};
use crate::{EngineError, Result};

/// High-level engine configuration
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Default tracing filter; RUST_LOG takes precedence
    pub log_filter: String,
    pub focus: FocusConfig,
    pub speech: SpeechConfig,
}

/// Channel name → priority; lower values win focus
#[derive(Clone, Debug)]
pub struct FocusConfig {
    pub channels: HashMap<String, u32>,
}

/// Speech synthesizer agent settings
#[derive(Clone, Debug)]
pub struct SpeechConfig {
    /// Focus channel acquired for speech output
    pub channel: String,
    pub interface_version: String,
    pub supported_formats: Vec<String>,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            channels: default_channel_priorities(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            channel: std::env::var("SPEECH_CHANNEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DIALOG_CHANNEL.to_string()),
            interface_version: std::env::var("SPEECH_INTERFACE_VERSION")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "1.0".to_string()),
            supported_formats: vec!["AUDIO_MPEG".to_string()],
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_filter: std::env::var("ENGINE_LOG")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "info".to_string()),
            focus: FocusConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file (path via ENGINE_CONFIG or ./engine.toml),
    /// overlaying values onto env-driven defaults. Problems are logged, not returned.
    pub fn load() -> Self {
        let path = std::env::var("ENGINE_CONFIG").unwrap_or_else(|_| "engine.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "engine_config", path = %path, "No TOML config found; using defaults/env");
            return Self::default();
        }
        match Self::from_file(p) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(target: "engine_config", error = %e, "Failed to load TOML; using defaults");
                Self::default()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let t: EngineToml = toml::from_str(s)?;
        t.overlay(Self::default())
    }
}

#[derive(Debug, Deserialize, Default)]
struct EngineToml {
    log_filter: Option<String>,
    focus: Option<FocusToml>,
    speech: Option<SpeechToml>,
}

#[derive(Debug, Deserialize, Default)]
struct FocusToml {
    channels: Option<HashMap<String, u32>>,
}

#[derive(Debug, Deserialize, Default)]
struct SpeechToml {
    channel: Option<String>,
    interface_version: Option<String>,
    supported_formats: Option<Vec<String>>,
}

impl EngineToml {
    fn overlay(self, mut base: EngineConfig) -> Result<EngineConfig> {
        if let Some(v) = self.log_filter {
            base.log_filter = v;
        }
        if let Some(channels) = self.focus.and_then(|f| f.channels) {
            if channels.is_empty() {
                return Err(EngineError::Config("focus.channels must not be empty".into()));
            }
            base.focus.channels = channels;
        }
        if let Some(s) = self.speech {
            if let Some(v) = s.channel {
                base.speech.channel = v;
            }
            if let Some(v) = s.interface_version {
                base.speech.interface_version = v;
            }
            if let Some(v) = s.supported_formats {
                base.speech.supported_formats = v;
            }
        }
        if !base.focus.channels.contains_key(&base.speech.channel) {
            return Err(EngineError::Config(format!(
                "speech.channel '{}' is not a configured focus channel",
                base.speech.channel
            )));
        }
        Ok(base)
    }
}
