//! Library configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

/// Settings read by a [`crate::TimingHandler`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingConfig {
    /// Period given to new animators and tasks, in milliseconds
    pub default_period: u64,
    /// Frame rate reported before any frame has been measured
    pub initial_frame_rate: f64,
    /// Weight of the previous estimate when smoothing the frame rate
    pub frame_rate_smoothing: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverConfig {
    /// Interval between driven frames, in milliseconds
    pub frame_interval: u64,
    pub log_level: String,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;
        self.driver.validate()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            timing: TimingConfig::default(),
            driver: DriverConfig::default(),
        }
    }
}

impl TimingConfig {
    /// Validate timing configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_period == 0 {
            return Err(Error::Validation(
                "Default period must be greater than 0".to_string(),
            ));
        }

        if !self.initial_frame_rate.is_finite() || self.initial_frame_rate <= 0.0 {
            return Err(Error::Validation(format!(
                "Initial frame rate must be a positive number, got {}",
                self.initial_frame_rate
            )));
        }

        if !(0.0..1.0).contains(&self.frame_rate_smoothing) {
            return Err(Error::Validation(format!(
                "Frame rate smoothing must be in [0, 1), got {}",
                self.frame_rate_smoothing
            )));
        }

        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            default_period: 40, // 25 fps
            initial_frame_rate: 10.0,
            frame_rate_smoothing: 0.9,
        }
    }
}

impl DriverConfig {
    /// Validate driver configuration
    pub fn validate(&self) -> Result<()> {
        if self.frame_interval == 0 {
            return Err(Error::Validation(
                "Frame interval must be greater than 0".to_string(),
            ));
        }

        const MAX_INTERVAL: u64 = 60_000;
        if self.frame_interval > MAX_INTERVAL {
            return Err(Error::Validation(format!(
                "Frame interval too long (max {} ms)",
                MAX_INTERVAL
            )));
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(Error::Validation(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                valid_log_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Nominal frames per second for the configured interval
    pub fn target_frame_rate(&self) -> f64 {
        1000.0 / self.frame_interval as f64
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            frame_interval: 16, // ~60 fps
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0.0");
        assert_eq!(config.timing.default_period, 40);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timing_config_validation() {
        let mut config = TimingConfig::default();
        assert!(config.validate().is_ok());

        config.default_period = 0;
        assert!(config.validate().is_err());

        config.default_period = 16;
        config.initial_frame_rate = 0.0;
        assert!(config.validate().is_err());

        config.initial_frame_rate = f64::NAN;
        assert!(config.validate().is_err());

        config.initial_frame_rate = 60.0;
        config.frame_rate_smoothing = 1.0;
        assert!(config.validate().is_err());

        config.frame_rate_smoothing = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_driver_config_validation() {
        let mut config = DriverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.target_frame_rate(), 62.5);

        config.frame_interval = 0;
        assert!(config.validate().is_err());

        config.frame_interval = 100_000;
        assert!(config.validate().is_err());

        config.frame_interval = 33;
        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_section_defaults() {
        let config: Config = serde_json::from_str(r#"{"version":"1.0.0"}"#).unwrap();
        assert_eq!(config.timing, TimingConfig::default());
        assert_eq!(config.driver, DriverConfig::default());
    }
}
