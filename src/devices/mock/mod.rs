//! Simulated Robi42 for hardware-free testing
//!
//! The simulator closes the control loop: stepper frequency commands are
//! converted back into wheel velocities, and the simulated gyro reports the
//! yaw rate those velocities produce. A mission run against these devices
//! therefore exercises the same feedback path as the real robot.

mod noise;
mod sim;

pub use noise::NoiseGenerator;
pub use sim::{SimAbort, SimGyro, SimRobi, SimStepper, WheelSnapshot};
