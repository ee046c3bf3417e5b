use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub classifier: ClassifierConfig,
    pub recognizer: RecognizerConfig,
    pub camera: CameraConfig,
    pub identity: IdentityConfig,
    pub behavior: BehaviorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub provider: Option<String>,
    pub api_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Prompt sent alongside the captured frame.
    pub prompt: Option<String>,
    /// Budget for one classification call before it is rolled back.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub api_endpoint: Option<String>,
    pub language: Option<String>,
    /// How long the microphone listens for a spoken name.
    pub listen_seconds: u64,
    pub sample_rate: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
    /// Override the still-capture tool. Auto-detected (fswebcam, ffmpeg) when unset.
    pub grab_command: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Pre-supplied logging identity. Falls back to a persisted anonymous id.
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// How long status messages stay visible before they expire.
    pub message_display_seconds: u64,
    /// Generate a short confirmation line after each successful log.
    pub confirmation_message: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: Some("vision-api".to_string()),
            api_endpoint: None,
            api_key: None,
            model: None,
            prompt: None,
            timeout_seconds: 30,
        }
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            api_endpoint: None,
            language: Some("en".to_string()),
            listen_seconds: 4,
            sample_rate: 16000,
            timeout_seconds: 30,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
            grab_command: None,
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            message_display_seconds: 5,
            confirmation_message: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
