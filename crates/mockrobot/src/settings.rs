use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Settings for the driver, its transport and its process tracker.
///
/// Every field has a default, so a settings file only needs the values it
/// overrides:
///
/// ```rust
/// use mockrobot::DriverSettings;
///
/// let settings = DriverSettings::from_json_str(r#"{ "port": 2000 }"#).unwrap();
/// assert_eq!(settings.port, 2000);
/// assert_eq!(settings.home_timeout_ms, 120_000);
/// ```
pub struct DriverSettings {
    /// TCP port the onboard software listens on.
    ///
    /// ## Default
    /// 1000
    pub port: u16,
    /// How long `OpenConnection` may take before giving up (default: 5s).
    pub connect_timeout_ms: u64,
    /// How long to wait for the reply to a single request (default: 1s).
    pub reply_timeout_ms: u64,
    /// Largest reply read from the socket in one go (default: 1024 bytes).
    pub max_reply_length: usize,
    /// Delay between two status queries for the same process (default: 1s).
    pub poll_interval_ms: u64,
    /// Ceiling for the homing process (default: 2 minutes).
    pub home_timeout_ms: u64,
    /// Ceiling for pick and place processes (default: 5 minutes).
    pub motion_timeout_ms: u64,
    /// Lowest location accepted for `Source Location`/`Destination Location`.
    pub min_location: i64,
    /// Highest location accepted, inclusive.
    pub max_location: i64,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            port: 1000,
            connect_timeout_ms: 5_000,
            reply_timeout_ms: 1_000,
            max_reply_length: 1024,
            poll_interval_ms: 1_000,
            home_timeout_ms: 120_000,
            motion_timeout_ms: 300_000,
            min_location: 1,
            max_location: 17,
        }
    }
}

impl DriverSettings {
    /// Parses settings from JSON, filling missing fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads and parses a JSON settings file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Rejects combinations the driver cannot work with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.min_location > self.max_location {
            return Err(SettingsError::Invalid(format!(
                "min_location {} is greater than max_location {}",
                self.min_location, self.max_location
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(SettingsError::Invalid("poll_interval_ms must be positive".into()));
        }
        if self.max_reply_length == 0 {
            return Err(SettingsError::Invalid("max_reply_length must be positive".into()));
        }
        Ok(())
    }

    /// Locations accepted by request validation.
    pub fn location_range(&self) -> RangeInclusive<i64> {
        self.min_location..=self.max_location
    }

    /// [`Self::connect_timeout_ms`] as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// [`Self::reply_timeout_ms`] as a [`Duration`].
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// [`Self::poll_interval_ms`] as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// [`Self::home_timeout_ms`] as a [`Duration`].
    pub fn home_timeout(&self) -> Duration {
        Duration::from_millis(self.home_timeout_ms)
    }

    /// [`Self::motion_timeout_ms`] as a [`Duration`].
    pub fn motion_timeout(&self) -> Duration {
        Duration::from_millis(self.motion_timeout_ms)
    }
}

/// Errors loading [`DriverSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file could not be read.
    #[error("could not read settings: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid settings JSON.
    #[error("could not parse settings: {0}")]
    Json(#[from] serde_json::Error),
    /// The values are inconsistent.
    #[error("invalid settings: {0}")]
    Invalid(String),
}
