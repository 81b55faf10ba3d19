//! Simulated gyro, steppers, and abort switch over a shared robot state

use crate::config::{RobiConfig, SimulationConfig};
use crate::drivers::stepper::Wheel;
use crate::drivers::{AbortInput, StepperDriver, YawRateSensor};
use crate::error::{Error, Result};
use crate::motion::motors::{ANGLE_PER_FULL_STEP, microsteps_from_pins};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Commanded state of one simulated wheel
#[derive(Clone, Copy, Debug, Default)]
pub struct WheelSnapshot {
    pub enabled: bool,
    pub frequency: u32,
    pub forward: bool,
    pub microsteps: u32,
}

impl WheelSnapshot {
    /// Linear velocity this command produces, in m/s (signed by direction).
    ///
    /// Inverse of the motion layer's velocity-to-frequency conversion.
    pub fn linear_velocity(&self, wheel_radius: f64) -> f64 {
        if !self.enabled || self.microsteps == 0 {
            return 0.0;
        }
        let angle_per_microstep = ANGLE_PER_FULL_STEP / self.microsteps as f64;
        let v = self.frequency as f64 * angle_per_microstep * wheel_radius;
        if self.forward { v } else { -v }
    }
}

#[derive(Debug, Default)]
struct SimShared {
    left: WheelSnapshot,
    right: WheelSnapshot,
}

/// Bundle of simulated devices sharing one robot state.
pub struct SimRobi {
    shared: Arc<Mutex<SimShared>>,
    config: RobiConfig,
    sim: SimulationConfig,
    abort_flag: Arc<AtomicBool>,
    gyro_fault: Arc<AtomicBool>,
}

impl SimRobi {
    pub fn new(config: RobiConfig, sim: SimulationConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SimShared::default())),
            config,
            sim,
            abort_flag: Arc::new(AtomicBool::new(false)),
            gyro_fault: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stepper driver for one wheel.
    pub fn stepper(&self, wheel: Wheel) -> SimStepper {
        SimStepper {
            shared: Arc::clone(&self.shared),
            wheel,
        }
    }

    /// Simulated gyro reading the yaw rate the commanded wheels produce.
    pub fn gyro(&self) -> SimGyro {
        SimGyro {
            shared: Arc::clone(&self.shared),
            config: self.config,
            bias_dps: self.sim.gyro_bias_dps,
            noise: NoiseSource::new(self.sim),
            fault: Arc::clone(&self.gyro_fault),
        }
    }

    /// Abort switch backed by a shared flag.
    pub fn abort_input(&self) -> SimAbort {
        SimAbort {
            flag: Arc::clone(&self.abort_flag),
        }
    }

    /// Press the operator abort button.
    pub fn press_abort(&self) {
        self.abort_flag.store(true, Ordering::Release);
    }

    /// Make every subsequent gyro read fail with a bus error.
    pub fn fail_gyro(&self) {
        self.gyro_fault.store(true, Ordering::Release);
    }

    /// Snapshot of the commanded state for one wheel.
    pub fn wheel(&self, wheel: Wheel) -> WheelSnapshot {
        let shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        match wheel {
            Wheel::Left => shared.left,
            Wheel::Right => shared.right,
        }
    }

    /// Signed linear velocity of one wheel in m/s.
    pub fn wheel_velocity(&self, wheel: Wheel) -> f64 {
        self.wheel(wheel).linear_velocity(self.config.wheel_radius)
    }
}

struct NoiseSource {
    gen: Option<super::NoiseGenerator>,
    stddev: f64,
}

impl NoiseSource {
    fn new(sim: SimulationConfig) -> Self {
        let gen = if sim.gyro_noise_stddev > 0.0 {
            Some(super::NoiseGenerator::new(sim.seed))
        } else {
            None
        };
        Self {
            gen,
            stddev: sim.gyro_noise_stddev,
        }
    }

    fn sample(&mut self) -> f64 {
        match self.gen.as_mut() {
            Some(g) => g.gaussian(self.stddev),
            None => 0.0,
        }
    }
}

/// Simulated stepper driver for one wheel
pub struct SimStepper {
    shared: Arc<Mutex<SimShared>>,
    wheel: Wheel,
}

impl SimStepper {
    fn state<'a>(&self, shared: &'a mut SimShared) -> &'a mut WheelSnapshot {
        match self.wheel {
            Wheel::Left => &mut shared.left,
            Wheel::Right => &mut shared.right,
        }
    }
}

impl StepperDriver for SimStepper {
    fn enable(&mut self) -> Result<()> {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        self.state(&mut shared).enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        self.state(&mut shared).enabled = false;
        Ok(())
    }

    fn set_frequency(&mut self, hz: u32) -> Result<()> {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        self.state(&mut shared).frequency = hz;
        Ok(())
    }

    fn set_direction(&mut self, forward: bool) -> Result<()> {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        self.state(&mut shared).forward = forward;
        Ok(())
    }

    fn set_microstep_pins(&mut self, m0: bool, m1: bool, m2: bool) -> Result<()> {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        self.state(&mut shared).microsteps = microsteps_from_pins(m0, m1, m2);
        Ok(())
    }
}

/// Simulated single-axis gyro.
///
/// Yaw convention matches the robot: clockwise drift (left wheel faster)
/// reads positive.
pub struct SimGyro {
    shared: Arc<Mutex<SimShared>>,
    config: RobiConfig,
    bias_dps: f64,
    noise: NoiseSource,
    fault: Arc<AtomicBool>,
}

impl YawRateSensor for SimGyro {
    fn read_angular_rate(&mut self) -> Result<f64> {
        if self.fault.load(Ordering::Acquire) {
            return Err(Error::Sensor("injected gyro bus fault".to_string()));
        }

        let (v_left, v_right) = {
            let shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
            (
                shared.left.linear_velocity(self.config.wheel_radius),
                shared.right.linear_velocity(self.config.wheel_radius),
            )
        };

        let rate_rad = (v_left - v_right) / self.config.track_width;
        Ok(rate_rad.to_degrees() + self.bias_dps + self.noise.sample())
    }
}

/// Simulated operator abort button
pub struct SimAbort {
    flag: Arc<AtomicBool>,
}

impl AbortInput for SimAbort {
    fn is_aborted(&mut self) -> Result<bool> {
        Ok(self.flag.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RobiConfig {
        RobiConfig {
            wheel_radius: 0.032,
            track_width: 0.155,
        }
    }

    #[test]
    fn test_disabled_wheel_has_zero_velocity() {
        let robi = SimRobi::new(test_config(), SimulationConfig::default());
        let mut stepper = robi.stepper(Wheel::Left);
        stepper.set_microstep_pins(true, true, true).unwrap();
        stepper.set_frequency(500).unwrap();
        stepper.set_direction(true).unwrap();
        // Never enabled
        assert_eq!(robi.wheel_velocity(Wheel::Left), 0.0);
    }

    #[test]
    fn test_straight_drive_reads_zero_rate() {
        let robi = SimRobi::new(test_config(), SimulationConfig::default());
        for wheel in [Wheel::Left, Wheel::Right] {
            let mut stepper = robi.stepper(wheel);
            stepper.set_microstep_pins(true, true, true).unwrap();
            stepper.set_frequency(800).unwrap();
            stepper.set_direction(true).unwrap();
            stepper.enable().unwrap();
        }
        let mut gyro = robi.gyro();
        assert_eq!(gyro.read_angular_rate().unwrap(), 0.0);
    }

    #[test]
    fn test_left_wheel_faster_reads_positive_rate() {
        let robi = SimRobi::new(test_config(), SimulationConfig::default());
        for (wheel, freq) in [(Wheel::Left, 900), (Wheel::Right, 700)] {
            let mut stepper = robi.stepper(wheel);
            stepper.set_microstep_pins(true, true, true).unwrap();
            stepper.set_frequency(freq).unwrap();
            stepper.set_direction(true).unwrap();
            stepper.enable().unwrap();
        }
        let mut gyro = robi.gyro();
        assert!(gyro.read_angular_rate().unwrap() > 0.0);
    }

    #[test]
    fn test_gyro_fault_injection() {
        let robi = SimRobi::new(test_config(), SimulationConfig::default());
        let mut gyro = robi.gyro();
        assert!(gyro.read_angular_rate().is_ok());
        robi.fail_gyro();
        assert!(matches!(
            gyro.read_angular_rate(),
            Err(Error::Sensor(_))
        ));
    }

    #[test]
    fn test_abort_button() {
        let robi = SimRobi::new(test_config(), SimulationConfig::default());
        let mut abort = robi.abort_input();
        assert!(!abort.is_aborted().unwrap());
        robi.press_abort();
        assert!(abort.is_aborted().unwrap());
    }
}
