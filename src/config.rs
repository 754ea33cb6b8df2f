use crate::error::GuideResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed coordinates used by the console location provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomeLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Emergency
    pub emergency_contact: String,
    pub sos_countdown_secs: u64,
    pub fall_debounce_secs: u64,
    pub fall_impact_threshold: f32,
    pub fall_listen_delay_secs: u64,
    pub home_location: Option<HomeLocation>,

    // Feedback pacing
    pub haptic_min_gap_ms: u64,
    pub face_speech_gap_ms: u64,

    // Light guidance
    pub light_dark_lux: f32,
    pub light_min_interval_ms: u64,
    pub light_max_interval_ms: u64,

    // Commands
    pub wake_words: Vec<String>,
    pub default_cloud_prompt: String,

    // Cloud vision
    pub cloud_model: String,
    pub cloud_base_url: String,
    pub cloud_api_key: String,
    pub cloud_timeout_secs: u64,
    pub capture_max_dimension: u32,

    // Speech
    pub tts_engine: String,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            emergency_contact: "7529073222".to_string(),
            sos_countdown_secs: 10,
            fall_debounce_secs: 10,
            fall_impact_threshold: 40.0,
            fall_listen_delay_secs: 3,
            home_location: None,
            haptic_min_gap_ms: 400,
            face_speech_gap_ms: 4000,
            light_dark_lux: 10.0,
            light_min_interval_ms: 50,
            light_max_interval_ms: 1000,
            wake_words: vec!["gemini".to_string(), "sightguide".to_string()],
            default_cloud_prompt: "Describe the scene for me.".to_string(),
            cloud_model: "gemini-2.5-flash".to_string(),
            cloud_base_url: "https://generativelanguage.googleapis.com".to_string(),
            cloud_api_key: String::new(),
            cloud_timeout_secs: 30,
            capture_max_dimension: 768,
            tts_engine: "system".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from `path`, falling back to defaults when missing or corrupt
    pub fn load_from(path: &Path) -> GuideResult<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    // Graceful degradation: log warning and use defaults
                    tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                    let backup_path = path.with_extension("json.corrupt");
                    let _ = std::fs::rename(path, &backup_path);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        if config.cloud_api_key.is_empty() {
            if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                config.cloud_api_key = key;
            }
        }

        Ok(config)
    }

    /// Save config to an explicit path
    pub fn save_to(&self, path: &Path) -> GuideResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn sos_countdown(&self) -> Duration {
        Duration::from_secs(self.sos_countdown_secs)
    }

    pub fn fall_debounce(&self) -> Duration {
        Duration::from_secs(self.fall_debounce_secs)
    }

    pub fn fall_listen_delay(&self) -> Duration {
        Duration::from_secs(self.fall_listen_delay_secs)
    }

    pub fn haptic_min_gap(&self) -> Duration {
        Duration::from_millis(self.haptic_min_gap_ms)
    }

    pub fn face_speech_gap(&self) -> Duration {
        Duration::from_millis(self.face_speech_gap_ms)
    }

    pub fn cloud_timeout(&self) -> Duration {
        Duration::from_secs(self.cloud_timeout_secs)
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sightguide")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}
