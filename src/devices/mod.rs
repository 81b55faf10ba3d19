//! Device implementations
//!
//! Only the simulated robot lives in-tree. Real hardware (MPU6050 gyro,
//! steppers behind the MCP23S17 expander) implements the same driver traits
//! from its own crate.

pub mod mock;
