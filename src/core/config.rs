use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which frame of a clicked video is decoded for the preview picture.
///
/// Drag-and-drop uses a separate first-non-black scan and is not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreviewFramePolicy {
    #[default]
    FirstFrame,
    LastFrame,
    RandomFrame,
}

impl PreviewFramePolicy {
    pub fn label(&self) -> &'static str {
        match self {
            PreviewFramePolicy::FirstFrame => "First frame",
            PreviewFramePolicy::LastFrame => "Last frame",
            PreviewFramePolicy::RandomFrame => "Random frame",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub preview_frame: PreviewFramePolicy,
    #[serde(default)]
    pub remove_black_borders: bool,
    #[serde(default)]
    pub last_opened_directory: Option<PathBuf>,
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            preview_frame: PreviewFramePolicy::FirstFrame,
            remove_black_borders: false,
            last_opened_directory: None,
            ffmpeg_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| anyhow::anyhow!("Failed to read config file at {}: {}", config_path.display(), e))?;

            // Try to parse the config, but if it fails due to missing fields, create a new one
            match serde_json::from_str::<Self>(&content) {
                Ok(config) => {
                    log::info!("Loaded existing config from {}", config_path.display());
                    Ok(config)
                }
                Err(e) => {
                    log::warn!("Config file exists but has issues ({}), creating new one with defaults", e);
                    let new_config = Self::default();
                    new_config.save()
                        .map_err(|save_err| anyhow::anyhow!("Failed to save new config: {}", save_err))?;
                    log::info!("Created new config file at {}", config_path.display());
                    Ok(new_config)
                }
            }
        } else {
            log::info!("No config file found, creating default config");
            let config = Self::default();
            config.save()
                .map_err(|e| anyhow::anyhow!("Failed to save default config: {}", e))?;
            log::info!("Created new config file at {}", config_path.display());
            Ok(config)
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("preview-helper")
            .join("config.json")
    }
}
