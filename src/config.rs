//! Configuration loading for robi-motion
//!
//! Loads application configuration from a TOML file. The mission plan can
//! embed its own robot geometry, which takes precedence over the `[robot]`
//! section here.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Robot geometry. Immutable once a mission starts.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct RobiConfig {
    /// Wheel radius in meters
    #[serde(default = "default_wheel_radius")]
    pub wheel_radius: f64,

    /// Distance between the center lines of the two wheels, in meters
    #[serde(default = "default_track_width")]
    pub track_width: f64,
}

/// Main configuration structure
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub robot: RobiConfig,
    #[serde(default)]
    pub tuning: TuningConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Control-loop calibration constants.
///
/// These values were reverse-calibrated against real hardware. They are
/// tuning constants, not derived quantities; adjust them only against
/// measurements of the actual control loop.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct TuningConfig {
    /// Kinematic simulation timestep in seconds, matched to the achieved
    /// period of the real control loop (default: 0.0014)
    #[serde(default = "default_sim_dt")]
    pub sim_dt: f64,

    /// Divisor of the proportional yaw compensation `rot * v / divisor`
    /// (default: 50.0)
    #[serde(default = "default_yaw_gain_divisor")]
    pub yaw_gain_divisor: f64,

    /// Pulse frequency below which a stepper cannot reliably step; lower
    /// commands disable the wheel (default: 7)
    #[serde(default = "default_min_step_frequency")]
    pub min_step_frequency_hz: u32,

    /// Yaw integration period in milliseconds (default: 10)
    #[serde(default = "default_yaw_tick_ms")]
    pub yaw_tick_ms: u64,

    /// Maximum ticks a primitive may run before it is aborted (default: 2000000)
    #[serde(default = "default_max_primitive_ticks")]
    pub max_primitive_ticks: u64,

    /// Number of stationary samples averaged during gyro calibration
    /// (default: 1000)
    #[serde(default = "default_calibration_iterations")]
    pub calibration_iterations: u32,
}

/// Simulated-device settings
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// RNG seed; 0 means non-deterministic
    #[serde(default)]
    pub seed: u64,

    /// Zero-rate gyro bias in degrees/second
    #[serde(default)]
    pub gyro_bias_dps: f64,

    /// Gaussian gyro noise standard deviation in degrees/second
    #[serde(default)]
    pub gyro_noise_stddev: f64,
}

/// Logging configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_wheel_radius() -> f64 {
    0.032
}
fn default_track_width() -> f64 {
    0.155
}
fn default_sim_dt() -> f64 {
    0.0014
}
fn default_yaw_gain_divisor() -> f64 {
    50.0
}
fn default_min_step_frequency() -> u32 {
    7
}
fn default_yaw_tick_ms() -> u64 {
    10
}
fn default_max_primitive_ticks() -> u64 {
    2_000_000
}
fn default_calibration_iterations() -> u32 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RobiConfig {
    fn default() -> Self {
        Self {
            wheel_radius: default_wheel_radius(),
            track_width: default_track_width(),
        }
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            sim_dt: default_sim_dt(),
            yaw_gain_divisor: default_yaw_gain_divisor(),
            min_step_frequency_hz: default_min_step_frequency(),
            yaw_tick_ms: default_yaw_tick_ms(),
            max_primitive_ticks: default_max_primitive_ticks(),
            calibration_iterations: default_calibration_iterations(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            gyro_bias_dps: 0.0,
            gyro_noise_stddev: 0.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            robot: RobiConfig::default(),
            tuning: TuningConfig::default(),
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TuningConfig {
    /// Yaw integration period as a `Duration`
    pub fn yaw_tick_period(&self) -> Duration {
        Duration::from_millis(self.yaw_tick_ms)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.robot.wheel_radius, 0.032);
        assert_eq!(config.robot.track_width, 0.155);
        assert_eq!(config.tuning.min_step_frequency_hz, 7);
        assert_eq!(config.tuning.yaw_tick_ms, 10);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[robot]
wheel_radius = 0.035
track_width = 0.147

[tuning]
sim_dt = 0.002
yaw_gain_divisor = 40.0

[logging]
level = "debug"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.robot.wheel_radius, 0.035);
        assert_eq!(config.robot.track_width, 0.147);
        assert_eq!(config.tuning.sim_dt, 0.002);
        assert_eq!(config.tuning.yaw_gain_divisor, 40.0);
        // Unspecified fields keep their defaults
        assert_eq!(config.tuning.min_step_frequency_hz, 7);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.robot.wheel_radius, 0.032);
        assert_eq!(config.simulation.seed, 0);
    }
}
