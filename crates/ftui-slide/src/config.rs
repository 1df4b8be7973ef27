#![forbid(unsafe_code)]

//! Configuration for slide coordination, loadable from TOML or JSON.
//!
//! ```toml
//! # slide.toml
//! delivery = "deferred"
//! max_frame_dt_ms = 50
//!
//! [spring]
//! stiffness = 210.0
//! damping = 20.0
//! ```
//!
//! ```rust,ignore
//! let config = SlideConfig::from_toml_file("slide.toml")?;
//! let config = SlideConfig::from_json_str(json)?;
//! ```
//!
//! Every field has a default, so partial files work.

#[cfg(feature = "config")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::mutation::Delivery;
use crate::spring::SpringConfig;

/// Tunables for a [`SlideCoordinator`](crate::SlideCoordinator) and the
/// slides it drives.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SlideConfig {
    /// Spring tuning shared by every slide.
    pub spring: SpringConfig,

    /// Whether observed batches run in the same pump or on the next tick.
    pub delivery: Delivery,

    /// Upper bound for a single frame's dt when driven from a clock.
    pub max_frame_dt_ms: u64,

    /// Maximum tasks processed by one pump before yielding to the next tick.
    pub max_cascade: usize,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            spring: SpringConfig::default(),
            delivery: Delivery::Immediate,
            max_frame_dt_ms: 100,
            max_cascade: 1024,
        }
    }
}

impl SlideConfig {
    /// `max_frame_dt_ms` as a [`Duration`].
    #[must_use]
    pub fn max_frame_dt(&self) -> Duration {
        Duration::from_millis(self.max_frame_dt_ms)
    }

    /// Replace the spring tuning (builder pattern).
    #[must_use]
    pub fn with_spring(mut self, spring: SpringConfig) -> Self {
        self.spring = spring;
        self
    }

    /// Replace the delivery mode (builder pattern).
    #[must_use]
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(ConfigError::Toml)?;
        config.checked()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigError::Json)?;
        config.checked()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Serialize to pretty TOML.
    #[cfg(feature = "config")]
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::TomlSer)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(self.spring.stiffness > 0.0) {
            errors.push(format!(
                "spring.stiffness must be > 0, got {}",
                self.spring.stiffness
            ));
        }

        if !(self.spring.damping >= 0.0) {
            errors.push(format!(
                "spring.damping must be >= 0, got {}",
                self.spring.damping
            ));
        }

        if !(self.spring.precision > 0.0) {
            errors.push(format!(
                "spring.precision must be > 0, got {}",
                self.spring.precision
            ));
        }

        if self.max_frame_dt_ms == 0 {
            errors.push("max_frame_dt_ms must be > 0".into());
        }

        if self.max_cascade == 0 {
            errors.push("max_cascade must be > 0".into());
        }

        errors
    }

    #[cfg(feature = "config")]
    fn checked(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a slide configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    Toml(toml::de::Error),
    /// TOML serialization error.
    #[cfg(feature = "config")]
    TomlSer(toml::ser::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config")]
            Self::TomlSer(e) => write!(f, "TOML serialization error: {e}"),
            #[cfg(feature = "config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config")]
            Self::TomlSer(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
