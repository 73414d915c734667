//! Host settings persisted as JSON in the user's config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How many documents the recent list remembers.
pub const MAX_RECENT_FILES: usize = 10;

/// Sample rate and block size handed to every node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub sample_rate: f64,
    pub block_size: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub sample_rate: f64,
    pub block_size: usize,
    pub default_bpm: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        let processing = ProcessingConfig::default();
        Self {
            sample_rate: processing.sample_rate,
            block_size: processing.block_size,
            default_bpm: 60,
        }
    }
}

impl HostConfig {
    pub fn processing(&self) -> ProcessingConfig {
        ProcessingConfig {
            sample_rate: self.sample_rate,
            block_size: self.block_size,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: HostConfig,
    /// Most recent first.
    pub recent_files: Vec<PathBuf>,
}

impl Settings {
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("plughost").join("settings.json"))
    }

    /// Settings from the default location, or defaults.
    pub fn load() -> Self {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Couldn't read settings {}: {}", path.display(), e);
                }
                return Self::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring corrupt settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        match Self::path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn last_document_opened(&self) -> Option<&Path> {
        self.recent_files.first().map(PathBuf::as_path)
    }

    pub fn set_last_document_opened(&mut self, path: &Path) {
        self.recent_files.retain(|p| p != path);
        self.recent_files.insert(0, path.to_path_buf());
        self.recent_files.truncate(MAX_RECENT_FILES);
    }
}
