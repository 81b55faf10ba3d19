//! Hardware driver traits
//!
//! The register-level device protocols (MPU6050 over I2C, the stepper
//! drivers behind the MCP23S17 expander) live outside this crate; these
//! traits are the seam they plug into. The in-tree implementations are the
//! simulated devices under [`crate::devices::mock`].

pub mod abort;
pub mod gyro;
pub mod stepper;

pub use abort::AbortInput;
pub use gyro::YawRateSensor;
pub use stepper::StepperDriver;
