//! Application configuration loaded from TOML.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Reward constants applied by the event ingress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardConfig {
    /// XP granted for each newly completed reading unit.
    pub xp_per_chapter: u32,
    /// XP granted per correct quiz answer.
    pub xp_per_correct_answer: u32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            xp_per_chapter: 10,
            xp_per_correct_answer: 50,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
    /// Reward constants.
    #[serde(default)]
    pub rewards: RewardConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join("jornada.db"),
            rewards: RewardConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform config directory, falling back
    /// to defaults when no file exists yet.
    pub fn load() -> Result<Self> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: AppConfig =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Persist configuration to the platform config directory.
    pub fn save(&self) -> Result<()> {
        let path = config_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let raw = toml::to_string_pretty(self).context("serializing config")?;
        std::fs::write(&path, raw)
            .with_context(|| format!("writing config file {}", path.display()))?;

        tracing::info!("Saved configuration to {}", path.display());
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("br", "jornada", "jornada")
}

fn config_file_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
