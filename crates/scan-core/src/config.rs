//! Configuration loading for the scan engine.
//!
//! All engine settings are loaded from a TOML configuration file; every
//! section falls back to documented defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::ports::CollectionScope;

/// Complete scan engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Cycle timing and candidate selection
    #[serde(default)]
    pub scan: ScanSection,
    /// Door-proximity radius adjustment
    #[serde(default)]
    pub doors: DoorSection,
    /// Cross-cutting policy toggles
    #[serde(default)]
    pub policy: PolicySection,
    /// Population-density suppression
    #[serde(default)]
    pub density: DensitySection,
    /// Highlight debounce
    #[serde(default)]
    pub glow: GlowSection,
    /// Corpse release delays
    #[serde(default)]
    pub mortality: MortalitySection,
    /// Theft coordination
    #[serde(default)]
    pub theft: TheftSection,
    /// Calibration sweep
    #[serde(default)]
    pub calibration: CalibrationSection,
}

impl ScanConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Toml)
    }

    /// Serializes the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Returns the default configuration as a TOML string.
pub fn default_config_toml() -> String {
    ScanConfig::default()
        .to_toml()
        .expect("default config serializes")
}

/// Errors loading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[source] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),
}

/// Cycle timing and candidate selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    /// Sleep between cycles, in milliseconds
    pub interval_ms: u64,
    /// Horizontal scan radius in world units
    pub radius: f32,
    /// Vertical radius as a fraction of the horizontal one
    pub vertical_factor: f32,
    /// Upper bound on candidates per cycle
    pub max_candidates: usize,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            radius: 180.0,
            vertical_factor: 0.6,
            max_candidates: 24,
        }
    }
}

impl ScanSection {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn vertical_radius(&self) -> f32 {
        self.radius * self.vertical_factor
    }
}

/// Door-proximity radius adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoorSection {
    /// Whether doors adjust the effective radius at all
    pub respect_doors: bool,
    /// How far a locked door shrinks, and an unlocked door relaxes,
    /// the effective radius
    pub tolerance: f32,
    /// Absolute ceiling on the relaxed radius
    pub max_radius: f32,
}

impl Default for DoorSection {
    fn default() -> Self {
        Self {
            respect_doors: true,
            tolerance: 40.0,
            max_radius: 400.0,
        }
    }
}

/// Cross-cutting policy toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    /// Evaluate ownership and crime at all
    pub crime_check: bool,
    /// Attempt detectable thefts through the theft coordinator instead
    /// of blocking them outright
    pub steal_if_undetected: bool,
    /// Auto-loot boss containers instead of highlighting them
    pub loot_boss_containers: bool,
    /// Auto-loot quest targets instead of highlighting them
    pub loot_quest_targets: bool,
    /// Auto-loot containers that were once observed locked
    pub loot_previously_locked: bool,
    /// Scope for collection membership checks
    pub collection_scope: CollectionScope,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            crime_check: true,
            steal_if_undetected: false,
            loot_boss_containers: false,
            loot_quest_targets: false,
            loot_previously_locked: false,
            collection_scope: CollectionScope::Global,
        }
    }
}

/// Population-density suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DensitySection {
    pub enabled: bool,
    /// Cell population at or above which looting is suppressed
    pub population_threshold: u32,
}

impl Default for DensitySection {
    fn default() -> Self {
        Self {
            enabled: true,
            population_threshold: 10,
        }
    }
}

/// Highlight debounce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlowSection {
    /// How long one highlight lasts; also the debounce window
    pub duration_ms: u64,
}

impl Default for GlowSection {
    fn default() -> Self {
        Self { duration_ms: 3000 }
    }
}

impl GlowSection {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Corpse release delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MortalitySection {
    /// FIFO capacity; the oldest record is dropped when full
    pub capacity: usize,
    /// Wait before a freshly-killed actor settles
    pub normal_delay_ms: u64,
    /// Wait when the external perk flag asks for the longer interval
    pub extended_delay_ms: u64,
}

impl Default for MortalitySection {
    fn default() -> Self {
        Self {
            capacity: 64,
            normal_delay_ms: 2000,
            extended_delay_ms: 6000,
        }
    }
}

impl MortalitySection {
    pub fn delay(&self, extended: bool) -> Duration {
        if extended {
            Duration::from_millis(self.extended_delay_ms)
        } else {
            Duration::from_millis(self.normal_delay_ms)
        }
    }
}

/// Theft coordination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TheftSection {
    /// Whether detectable-crime loots are attempted at all
    pub enabled: bool,
}

impl Default for TheftSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Calibration sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSection {
    pub start_radius: f32,
    pub step: f32,
    /// Sweep terminates once the radius would exceed this
    pub max_radius: f32,
}

impl Default for CalibrationSection {
    fn default() -> Self {
        Self {
            start_radius: 50.0,
            step: 50.0,
            max_radius: 500.0,
        }
    }
}
