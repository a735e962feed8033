use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tdoa_core::constants::{
    DEFAULT_SAMPLES_PER_CHANNEL, DEFAULT_SAMPLE_RATE_HZ, DEFAULT_SENSOR_SPACING_M,
    DEFAULT_SPEED_OF_SOUND,
};
use tdoa_core::{BackendKind, CorrelationMode, Geometry, PeakSearch, PipelineSettings};

/// Session configuration. Fixed for the lifetime of a session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_samples_per_channel")]
    pub samples_per_channel: usize,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: f64,
    #[serde(default = "default_speed_of_sound")]
    pub speed_of_sound: f64,
    #[serde(default = "default_sensor_spacing")]
    pub sensor_spacing_m: f64,
    #[serde(default)]
    pub mode: CorrelationMode,
    #[serde(default)]
    pub peak_search: PeakSearch,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
    #[serde(default = "default_emit_blocks")]
    pub emit_blocks: bool,
}

fn default_samples_per_channel() -> usize {
    DEFAULT_SAMPLES_PER_CHANNEL
}

fn default_sample_rate() -> f64 {
    DEFAULT_SAMPLE_RATE_HZ
}

fn default_speed_of_sound() -> f64 {
    DEFAULT_SPEED_OF_SOUND
}

fn default_sensor_spacing() -> f64 {
    DEFAULT_SENSOR_SPACING_M
}

fn default_idle_interval_ms() -> u64 {
    1000
}

fn default_emit_blocks() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            samples_per_channel: default_samples_per_channel(),
            sample_rate_hz: default_sample_rate(),
            speed_of_sound: default_speed_of_sound(),
            sensor_spacing_m: default_sensor_spacing(),
            mode: CorrelationMode::default(),
            peak_search: PeakSearch::default(),
            backend: BackendKind::default(),
            idle_interval_ms: default_idle_interval_ms(),
            emit_blocks: default_emit_blocks(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from disk, or returns default if not found.
    pub fn load() -> Self {
        if let Some(path) = config_path() {
            if let Ok(content) = fs::read_to_string(path) {
                if let Ok(cfg) = serde_json::from_str(&content) {
                    return cfg;
                }
            }
        }
        Self::default()
    }

    /// Loads configuration from an explicit path. Unlike [`AppConfig::load`],
    /// a missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Saves configuration in JSON format to `path`, or the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path().context("Could not determine config directory")?,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn geometry(&self) -> Result<Geometry> {
        Geometry::new(self.sample_rate_hz, self.speed_of_sound, self.sensor_spacing_m)
    }

    pub fn pipeline(&self) -> PipelineSettings {
        PipelineSettings {
            samples_per_channel: self.samples_per_channel,
            mode: self.mode,
            backend: self.backend,
            peak_search: self.peak_search,
        }
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    /// Checks the values the pipeline would reject, before any I/O starts.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.samples_per_channel > 0,
            "samples_per_channel must be non-zero"
        );
        self.geometry()?;
        Ok(())
    }
}

pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "tdoa", "tdoa").map(|dirs| dirs.config_dir().join("config.json"))
}
