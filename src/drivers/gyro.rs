//! Yaw-rate sensor driver trait

use crate::error::Result;

/// Single-axis angular-rate sensor.
///
/// Only yaw (rotation about the vertical axis) is tracked.
pub trait YawRateSensor: Send {
    /// Read the instantaneous angular rate in degrees/second.
    ///
    /// Performs exactly one sensor transaction. The value is raw, without
    /// zero-rate offset correction; the yaw integrator owns the offset.
    fn read_angular_rate(&mut self) -> Result<f64>;
}
