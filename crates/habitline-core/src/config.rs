//! TOML-based engine configuration.
//!
//! Stores the knobs the derived views depend on:
//! - Local timezone offset used to bucket events into days
//! - Level size and default XP reward
//! - Attempt milestone ladder
//! - At-risk threshold and analytics windows
//! - Default fasting protocol
//!
//! Configuration is stored at `~/.config/habitline/config.toml`.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::attempt::{MilestoneLadder, DEFAULT_MILESTONE_DAYS, DEFAULT_MILESTONE_LABELS};
use crate::error::ConfigError;
use crate::fasting::FastingProtocol;
use crate::progression::{LevelCurve, DEFAULT_LEVEL_SIZE};
use crate::time::offset_from_minutes;

const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Returns `~/.config/habitline[-dev]/` based on HABITLINE_ENV.
///
/// Set HABITLINE_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("HABITLINE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("habitline-dev")
    } else {
        base_dir.join("habitline")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// XP and level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default = "default_level_size")]
    pub level_size: u64,
    /// Reward for completions of habits that no longer exist.
    #[serde(default = "default_xp_reward")]
    pub default_xp_reward: u32,
}

/// Attempt milestone ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestonesConfig {
    #[serde(default = "default_milestone_days")]
    pub days: Vec<u32>,
    #[serde(default = "default_milestone_labels")]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Completion rate (percent) below which a habit is at risk.
    #[serde(default = "default_min_completion_rate")]
    pub min_completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_30")]
    pub trend_window_days: u32,
    #[serde(default = "default_30")]
    pub completion_rate_window_days: u32,
    #[serde(default = "default_top_habits")]
    pub top_habits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastingConfig {
    /// Protocol applied when a fasting habit is created without a target.
    #[serde(default = "default_protocol")]
    pub default_protocol: String,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/habitline/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Owner of achievement unlocks.
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Local offset from UTC, in minutes, used for calendar-day bucketing.
    #[serde(default)]
    pub timezone_offset_minutes: i32,
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub milestones: MilestonesConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub fasting: FastingConfig,
}

// Default functions
fn default_user_id() -> String {
    "local".into()
}
fn default_level_size() -> u64 {
    DEFAULT_LEVEL_SIZE
}
fn default_xp_reward() -> u32 {
    10
}
fn default_milestone_days() -> Vec<u32> {
    DEFAULT_MILESTONE_DAYS.to_vec()
}
fn default_milestone_labels() -> Vec<String> {
    DEFAULT_MILESTONE_LABELS.iter().map(|s| s.to_string()).collect()
}
fn default_min_completion_rate() -> f64 {
    50.0
}
fn default_30() -> u32 {
    30
}
fn default_top_habits() -> usize {
    5
}
fn default_protocol() -> String {
    "16:8".into()
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            level_size: default_level_size(),
            default_xp_reward: default_xp_reward(),
        }
    }
}

impl Default for MilestonesConfig {
    fn default() -> Self {
        Self {
            days: default_milestone_days(),
            labels: default_milestone_labels(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_completion_rate: default_min_completion_rate(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            trend_window_days: 30,
            completion_rate_window_days: 30,
            top_habits: default_top_habits(),
        }
    }
}

impl Default for FastingConfig {
    fn default() -> Self {
        Self {
            default_protocol: default_protocol(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            timezone_offset_minutes: 0,
            progression: ProgressionConfig::default(),
            milestones: MilestonesConfig::default(),
            risk: RiskConfig::default(),
            analytics: AnalyticsConfig::default(),
            fasting: FastingConfig::default(),
        }
    }
}

impl EngineConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation, or if the default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: EngineConfig =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            // Unreadable files are left untouched.
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value in memory by dot-separated key.
    ///
    /// The change is rejected (and `self` left untouched) when the key is
    /// unknown, the value does not parse, or the result fails validation.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: EngineConfig =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and persist to the default location.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Reject configurations the engine cannot compute with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        if self.timezone_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(invalid(
                "timezone_offset_minutes",
                format!("must be within ±{MAX_OFFSET_MINUTES}"),
            ));
        }
        if self.progression.level_size == 0 {
            return Err(invalid("progression.level_size", "must be positive".into()));
        }
        if !(0.0..=100.0).contains(&self.risk.min_completion_rate) {
            return Err(invalid(
                "risk.min_completion_rate",
                "must be between 0 and 100".into(),
            ));
        }
        if self.analytics.trend_window_days == 0 {
            return Err(invalid("analytics.trend_window_days", "must be positive".into()));
        }
        if self.analytics.completion_rate_window_days == 0 {
            return Err(invalid(
                "analytics.completion_rate_window_days",
                "must be positive".into(),
            ));
        }
        self.milestone_ladder()
            .map_err(|e| invalid("milestones", e.to_string()))?;
        self.default_protocol()
            .map_err(|e| invalid("fasting.default_protocol", e.to_string()))?;
        Ok(())
    }

    pub fn offset(&self) -> FixedOffset {
        offset_from_minutes(self.timezone_offset_minutes)
    }

    pub fn level_curve(&self) -> Result<LevelCurve, ConfigError> {
        LevelCurve::new(self.progression.level_size).map_err(|e| ConfigError::InvalidValue {
            key: "progression.level_size".into(),
            message: e.to_string(),
        })
    }

    pub fn milestone_ladder(&self) -> Result<MilestoneLadder, ConfigError> {
        MilestoneLadder::from_parts(&self.milestones.days, &self.milestones.labels).map_err(|e| {
            ConfigError::InvalidValue {
                key: "milestones".into(),
                message: e.to_string(),
            }
        })
    }

    pub fn default_protocol(&self) -> Result<FastingProtocol, ConfigError> {
        self.fasting
            .default_protocol
            .parse::<FastingProtocol>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "fasting.default_protocol".into(),
                message: e.to_string(),
            })
    }
}
