//! Stepper driver trait

use crate::error::Result;

/// Which wheel a command addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Wheel {
    Left,
    Right,
}

/// Driver for one stepper motor.
///
/// Frequency and direction are held by the hardware between calls; the
/// motion layer mirrors them in [`crate::motion::motors::MotorState`].
pub trait StepperDriver: Send {
    /// Energize the motor.
    fn enable(&mut self) -> Result<()>;

    /// De-energize the motor. This is the fail-safe state.
    fn disable(&mut self) -> Result<()>;

    /// Command the step pulse frequency in Hz.
    fn set_frequency(&mut self, hz: u32) -> Result<()>;

    /// Set the rotation direction. `true` is forward.
    fn set_direction(&mut self, forward: bool) -> Result<()>;

    /// Drive the microstep configuration pins.
    fn set_microstep_pins(&mut self, m0: bool, m1: bool, m2: bool) -> Result<()>;
}
