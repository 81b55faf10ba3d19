//! Gyro-corrected differential-drive motion control
//!
//! Three layers: the [`motors`] velocity model converts wheel velocities to
//! stepper pulse frequencies, the [`yaw`] integrator tracks accumulated
//! heading error, and the [`primitives`] close the loop between the two.

pub mod motors;
pub mod primitives;
pub mod yaw;

pub use motors::{MotorState, Motors};
pub use primitives::{InstructionResult, MotionPrimitives, TurnEntry};
pub use yaw::{YawIntegrator, YawThreadHandle};
