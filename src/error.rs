//! Error types for robi-motion

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Motion controller error types
#[derive(Debug, Error)]
pub enum Error {
    /// Sensor bus transaction failed (I2C/SPI level)
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// Stepper driver command failed
    #[error("Motor error: {0}")]
    Motor(String),

    /// Malformed mission plan (rejected before any motion starts)
    #[error("Invalid mission plan: {0}")]
    Plan(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Calibration requested while a wheel is enabled
    #[error("Calibration refused: motors are enabled")]
    CalibrationWhileMoving,

    /// A primitive ran past its maximum tick count
    #[error("Primitive timed out after {ticks} ticks")]
    PrimitiveTimeout {
        /// Ticks executed before the guard fired
        ticks: u64,
    },

    /// Mission cancelled by operator or shutdown signal
    #[error("Mission cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Plan(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
