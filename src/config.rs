//! # Configuration Module
//!
//! TOML configuration: touch input, steering, sensors, frame rate,
//! telemetry, logging and the on-screen button layout.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::controller::button::ButtonType;
use crate::controller::steering::MAX_DEADZONE;
use crate::error::{Result, TouchControllerError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub touch: TouchConfig,
    pub steering: SteeringConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    pub frame: FrameConfig,
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

/// Touchscreen input configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TouchConfig {
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

/// Steering shaping configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SteeringConfig {
    #[serde(default = "default_deadzone_center")]
    pub deadzone_center: f32,

    #[serde(default = "default_deadzone_edge")]
    pub deadzone_edge: f32,

    #[serde(default = "default_tilt_sensitivity")]
    pub tilt_sensitivity: f32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            deadzone_center: default_deadzone_center(),
            deadzone_edge: default_deadzone_edge(),
            tilt_sensitivity: default_tilt_sensitivity(),
        }
    }
}

/// Motion sensor configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SensorConfig {
    #[serde(default)]
    pub accelerometer: bool,

    #[serde(default)]
    pub gyroscope: bool,
}

/// Frame loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FrameConfig {
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
}

/// Action telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Diagnostic log output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for rolling log files, empty for stdout only.
    #[serde(default)]
    pub dir: String,
}

/// On-screen button layout
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LayoutConfig {
    #[serde(default)]
    pub buttons: Vec<ButtonLayout>,
}

/// Geometry of one on-screen button
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ButtonLayout {
    #[serde(rename = "type")]
    pub button_type: ButtonType,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

// Default value functions
fn default_feed_capacity() -> usize { 256 }

fn default_deadzone_center() -> f32 { 0.1 }
fn default_deadzone_edge() -> f32 { 0.1 }
fn default_tilt_sensitivity() -> f32 { 1.0 }

fn default_tick_rate_hz() -> u32 { 60 }

fn default_telemetry_enabled() -> bool { false }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_format() -> String { "jsonl".to_string() }

fn invalid(message: impl std::fmt::Display) -> TouchControllerError {
    TouchControllerError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Reads and validates a configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use touch_controller::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section against its allowed ranges
    fn validate(&self) -> Result<()> {
        if self.touch.feed_capacity == 0 || self.touch.feed_capacity > 4096 {
            return Err(invalid("feed_capacity must be between 1 and 4096"));
        }

        self.steering.validate()?;

        if ![30, 60, 120, 144, 240].contains(&self.frame.tick_rate_hz) {
            return Err(invalid("tick_rate_hz must be one of: 30, 60, 120, 144, 240"));
        }

        self.telemetry.validate()?;

        for (index, button) in self.layout.buttons.iter().enumerate() {
            if button.width <= 0 || button.height <= 0 {
                return Err(invalid(format!(
                    "layout button {} ({:?}) must have positive width and height",
                    index, button.button_type
                )));
            }
        }

        Ok(())
    }
}

impl SteeringConfig {
    /// Validate steering values
    ///
    /// Also used when re-applying a reloaded configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=MAX_DEADZONE).contains(&self.deadzone_center) {
            return Err(invalid(format!(
                "deadzone_center must be between 0.0 and {}",
                MAX_DEADZONE
            )));
        }

        if !(0.0..=MAX_DEADZONE).contains(&self.deadzone_edge) {
            return Err(invalid(format!(
                "deadzone_edge must be between 0.0 and {}",
                MAX_DEADZONE
            )));
        }

        if self.deadzone_center + self.deadzone_edge >= 1.0 {
            return Err(invalid("deadzone_center + deadzone_edge must be less than 1.0"));
        }

        if !(0.1..=5.0).contains(&self.tilt_sensitivity) {
            return Err(invalid("tilt_sensitivity must be between 0.1 and 5.0"));
        }

        Ok(())
    }
}

impl TelemetryConfig {
    /// Validate telemetry output settings
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.max_records_per_file == 0 || self.max_files_to_keep == 0 {
            return Err(invalid(
                "max_records_per_file and max_files_to_keep must be greater than 0",
            ));
        }

        if self.format != "jsonl" {
            return Err(invalid(format!(
                "unsupported telemetry format '{}', expected 'jsonl'",
                self.format
            )));
        }

        Ok(())
    }
}
