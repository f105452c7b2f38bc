use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Sheet geometry and animation timings, in logical pixels and milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Off-screen offset; the sheet slides in from here.
    pub container_height: f64,
    /// Drag distance past which a release dismisses the sheet.
    pub dismiss_threshold: f64,
    pub open_duration_ms: u64,
    pub close_duration_ms: u64,
    pub dismiss_duration_ms: u64,
    pub spring_tension: f64,
    pub spring_friction: f64,
    /// When false every animation completes on the next frame.
    pub animations_enabled: bool,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            container_height: 800.0,
            dismiss_threshold: crate::DISMISS_THRESHOLD_PX,
            open_duration_ms: 300,
            close_duration_ms: 300,
            dismiss_duration_ms: 250,
            spring_tension: 100.0,
            spring_friction: 8.0,
            animations_enabled: true,
        }
    }
}

impl SheetConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.container_height.is_finite() || self.container_height <= 0.0 {
            return Err(ConfigError::Invalid("container_height must be > 0".into()));
        }
        if !self.dismiss_threshold.is_finite() || self.dismiss_threshold < 0.0 {
            return Err(ConfigError::Invalid("dismiss_threshold must be >= 0".into()));
        }
        if !(self.spring_tension.is_finite() && self.spring_tension > 0.0) {
            return Err(ConfigError::Invalid("spring_tension must be > 0".into()));
        }
        if !(self.spring_friction.is_finite() && self.spring_friction >= 0.0) {
            return Err(ConfigError::Invalid("spring_friction must be >= 0".into()));
        }
        Ok(())
    }

    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }

    pub fn close_duration(&self) -> Duration {
        Duration::from_millis(self.close_duration_ms)
    }

    pub fn dismiss_duration(&self) -> Duration {
        Duration::from_millis(self.dismiss_duration_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub request_timeout_ms: u64,
    pub max_cached_listings: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: u64::try_from(crate::REQUEST_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            max_cached_listings: crate::MAX_CACHED_LISTINGS,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be > 0".into()));
        }
        if self.max_cached_listings == 0 {
            return Err(ConfigError::Invalid("max_cached_listings must be > 0".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub sheet: SheetConfig,
    pub sync: SyncConfig,
}

impl CoreConfig {
    /// Parse and validate; absent keys fall back to defaults.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sheet.validate()?;
        self.sync.validate()
    }
}
