//! Motor velocity model
//!
//! Converts desired linear wheel velocities into stepper pulse frequencies
//! and keeps a mirror of each wheel's commanded state. Frequencies below
//! [`Motors::min_step_frequency`] cannot be stepped reliably, so such
//! commands disable the wheel instead of crawling.

use crate::drivers::StepperDriver;
use crate::drivers::stepper::Wheel;
use crate::error::{Error, Result};
use std::time::Duration;

/// Full step angle of the stepper motors, in degrees.
/// A physical property of the motor, not a tuning constant.
pub const FULL_STEP_DEG: f64 = 1.8;

/// Full step angle in radians.
pub const ANGLE_PER_FULL_STEP: f64 = FULL_STEP_DEG * (std::f64::consts::PI / 180.0);

/// Microstep resolution selected by the driver's mode pins.
///
/// The table is fixed by the stepper driver IC: 000→1, 100→2, 010→4,
/// 110→8, 001→16, and every remaining combination selects 32.
pub fn microsteps_from_pins(m0: bool, m1: bool, m2: bool) -> u32 {
    match (m0, m1, m2) {
        (false, false, false) => 1,
        (true, false, false) => 2,
        (false, true, false) => 4,
        (true, true, false) => 8,
        (false, false, true) => 16,
        _ => 32,
    }
}

/// Mirror of one wheel's commanded state
#[derive(Clone, Copy, Debug)]
pub struct MotorState {
    /// Commanded pulse frequency in Hz, always >= 0
    pub frequency: u32,
    /// Rotation direction, `true` is forward
    pub forward: bool,
    /// Whether the wheel is energized
    pub enabled: bool,
    /// Microsteps per full step (1, 2, 4, 8, 16 or 32)
    pub microsteps: u32,
}

impl Default for MotorState {
    fn default() -> Self {
        Self {
            frequency: 0,
            forward: true,
            enabled: false,
            microsteps: 32,
        }
    }
}

/// The wheel pair and its velocity model
pub struct Motors {
    left: Box<dyn StepperDriver>,
    right: Box<dyn StepperDriver>,
    left_state: MotorState,
    right_state: MotorState,
    min_step_frequency: u32,
}

impl Motors {
    pub fn new(
        left: Box<dyn StepperDriver>,
        right: Box<dyn StepperDriver>,
        min_step_frequency: u32,
    ) -> Self {
        Self {
            left,
            right,
            left_state: MotorState::default(),
            right_state: MotorState::default(),
            min_step_frequency,
        }
    }

    fn parts(&mut self, wheel: Wheel) -> (&mut Box<dyn StepperDriver>, &mut MotorState) {
        match wheel {
            Wheel::Left => (&mut self.left, &mut self.left_state),
            Wheel::Right => (&mut self.right, &mut self.right_state),
        }
    }

    /// Commanded state mirror for one wheel.
    pub fn state(&self, wheel: Wheel) -> MotorState {
        match wheel {
            Wheel::Left => self.left_state,
            Wheel::Right => self.right_state,
        }
    }

    /// Whether either wheel is currently energized.
    pub fn any_enabled(&self) -> bool {
        self.left_state.enabled || self.right_state.enabled
    }

    /// Set the microstep resolution for both wheels.
    ///
    /// Must be called before a mission begins; the resolution is not changed
    /// mid-mission, so velocity-to-frequency conversion stays consistent
    /// across an entire instruction list.
    pub fn set_stepping_size(&mut self, m0: bool, m1: bool, m2: bool) -> Result<()> {
        let microsteps = microsteps_from_pins(m0, m1, m2);
        self.left.set_microstep_pins(m0, m1, m2)?;
        self.right.set_microstep_pins(m0, m1, m2)?;
        self.left_state.microsteps = microsteps;
        self.right_state.microsteps = microsteps;
        log::debug!("Stepping size set to 1/{} steps", microsteps);
        Ok(())
    }

    /// Command a linear velocity on one wheel.
    ///
    /// `f = (v / r) / (full_step_angle / microsteps)`, truncated to whole Hz.
    /// A result below the minimum step frequency disables the wheel: a
    /// near-zero velocity means "stopped", not "crawl". Otherwise the wheel
    /// is enabled with the direction taken from the sign of `v`.
    pub fn set_velocity(&mut self, wheel: Wheel, v: f64, wheel_radius: f64) -> Result<()> {
        if wheel_radius <= 0.0 {
            return Err(Error::Config(format!(
                "wheel radius must be positive, got {wheel_radius}"
            )));
        }

        let min_freq = self.min_step_frequency;
        let (driver, state) = self.parts(wheel);

        let angle_per_microstep = ANGLE_PER_FULL_STEP / state.microsteps as f64;
        let angular_velocity = v.abs() / wheel_radius;
        let frequency = (angular_velocity / angle_per_microstep) as u32;

        if frequency < min_freq {
            driver.disable()?;
            state.enabled = false;
            state.frequency = 0;
            return Ok(());
        }

        let forward = v >= 0.0;
        driver.enable()?;
        driver.set_direction(forward)?;
        driver.set_frequency(frequency)?;
        state.enabled = true;
        state.forward = forward;
        state.frequency = frequency;
        Ok(())
    }

    /// Disable both wheels. Fail-safe path: both disables are attempted even
    /// if the first fails, and errors are logged rather than propagated.
    pub fn disable_all(&mut self) {
        for (driver, state) in [
            (&mut self.left, &mut self.left_state),
            (&mut self.right, &mut self.right_state),
        ] {
            if let Err(e) = driver.disable() {
                log::error!("Failed to disable motor: {}", e);
            }
            state.enabled = false;
            state.frequency = 0;
        }
    }

    /// Open-loop frequency ramp toward a target, in 100 ms steps.
    ///
    /// Bring-up helper: runs a wheel without gyro feedback, stepping the
    /// pulse frequency by `hz_per_second` worth per step.
    pub fn accelerate_to_frequency(
        &mut self,
        wheel: Wheel,
        target_hz: u32,
        hz_per_second: u32,
    ) -> Result<()> {
        const STEP_DELAY: Duration = Duration::from_millis(100);
        let step = (hz_per_second / 10).max(1);

        let (driver, state) = self.parts(wheel);
        driver.enable()?;
        state.enabled = true;

        let mut freq = state.frequency;
        while freq != target_hz {
            freq = if target_hz > freq {
                (freq + step).min(target_hz)
            } else {
                freq.saturating_sub(step).max(target_hz)
            };
            driver.set_frequency(freq)?;
            state.frequency = freq;
            std::thread::sleep(STEP_DELAY);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RobiConfig, SimulationConfig};
    use crate::devices::mock::SimRobi;

    const WHEEL_RADIUS: f64 = 0.032;

    fn test_motors() -> (SimRobi, Motors) {
        let robi = SimRobi::new(
            RobiConfig {
                wheel_radius: WHEEL_RADIUS,
                track_width: 0.155,
            },
            SimulationConfig::default(),
        );
        let mut motors = Motors::new(
            Box::new(robi.stepper(Wheel::Left)),
            Box::new(robi.stepper(Wheel::Right)),
            7,
        );
        motors.set_stepping_size(true, true, true).unwrap();
        (robi, motors)
    }

    /// Velocity that converts to exactly `hz` pulses/sec at 1/32 microstepping.
    fn velocity_for_frequency(hz: u32) -> f64 {
        hz as f64 * (ANGLE_PER_FULL_STEP / 32.0) * WHEEL_RADIUS
    }

    #[test]
    fn test_microstep_table() {
        assert_eq!(microsteps_from_pins(false, false, false), 1);
        assert_eq!(microsteps_from_pins(true, false, false), 2);
        assert_eq!(microsteps_from_pins(false, true, false), 4);
        assert_eq!(microsteps_from_pins(true, true, false), 8);
        assert_eq!(microsteps_from_pins(false, false, true), 16);
        assert_eq!(microsteps_from_pins(true, false, true), 32);
        assert_eq!(microsteps_from_pins(false, true, true), 32);
        assert_eq!(microsteps_from_pins(true, true, true), 32);
    }

    #[test]
    fn test_sub_threshold_frequency_disables() {
        let (_robi, mut motors) = test_motors();

        // Exactly 6 Hz: below the floor, wheel must be disabled
        let v6 = velocity_for_frequency(6) + 1e-12;
        motors.set_velocity(Wheel::Left, v6, WHEEL_RADIUS).unwrap();
        let state = motors.state(Wheel::Left);
        assert!(!state.enabled);
        assert_eq!(state.frequency, 0);
    }

    #[test]
    fn test_threshold_frequency_enables() {
        let (_robi, mut motors) = test_motors();

        // Exactly 7 Hz: at the floor, wheel must be enabled
        let v7 = velocity_for_frequency(7) + 1e-12;
        motors.set_velocity(Wheel::Left, v7, WHEEL_RADIUS).unwrap();
        let state = motors.state(Wheel::Left);
        assert!(state.enabled);
        assert_eq!(state.frequency, 7);
    }

    #[test]
    fn test_set_velocity_is_idempotent() {
        let (_robi, mut motors) = test_motors();

        motors.set_velocity(Wheel::Right, 0.3, WHEEL_RADIUS).unwrap();
        let first = motors.state(Wheel::Right).frequency;
        motors.set_velocity(Wheel::Right, 0.3, WHEEL_RADIUS).unwrap();
        let second = motors.state(Wheel::Right).frequency;
        assert_eq!(first, second);
        assert!(first > 0);
    }

    #[test]
    fn test_negative_velocity_sets_backward_direction() {
        let (robi, mut motors) = test_motors();

        motors.set_velocity(Wheel::Left, -0.2, WHEEL_RADIUS).unwrap();
        let state = motors.state(Wheel::Left);
        assert!(state.enabled);
        assert!(!state.forward);
        assert!(robi.wheel_velocity(Wheel::Left) < 0.0);
    }

    #[test]
    fn test_frequency_conversion_against_known_value() {
        let (_robi, mut motors) = test_motors();

        // v = 0.51 m/s, r = 0.032 m, 1/32 microstepping:
        // f = (0.51 / 0.032) / (1.8deg in rad / 32) = ~16243 Hz
        motors.set_velocity(Wheel::Left, 0.51, WHEEL_RADIUS).unwrap();
        let f = motors.state(Wheel::Left).frequency;
        assert!((16200..=16300).contains(&f), "f={f}");
    }

    #[test]
    fn test_frequency_ramp_reaches_target() {
        let (robi, mut motors) = test_motors();

        motors
            .accelerate_to_frequency(Wheel::Left, 60, 600)
            .unwrap();
        let state = motors.state(Wheel::Left);
        assert!(state.enabled);
        assert_eq!(state.frequency, 60);
        assert_eq!(robi.wheel(Wheel::Left).frequency, 60);

        // Ramp back down
        motors
            .accelerate_to_frequency(Wheel::Left, 10, 600)
            .unwrap();
        assert_eq!(motors.state(Wheel::Left).frequency, 10);
    }

    #[test]
    fn test_disable_all_clears_both() {
        let (robi, mut motors) = test_motors();
        motors.set_velocity(Wheel::Left, 0.3, WHEEL_RADIUS).unwrap();
        motors.set_velocity(Wheel::Right, 0.3, WHEEL_RADIUS).unwrap();
        motors.disable_all();
        assert!(!motors.any_enabled());
        assert!(!robi.wheel(Wheel::Left).enabled);
        assert!(!robi.wheel(Wheel::Right).enabled);
    }
}
