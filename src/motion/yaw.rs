//! Gyro yaw integrator
//!
//! Samples the single-axis yaw-rate sensor and integrates the offset-corrected
//! rate into a cumulative heading estimate. Integration runs on a dedicated
//! thread with a fixed-period tick; the accumulated value is published through
//! the shared [`MotionState`] cell, which the primitive loops read without
//! locking.

use crate::drivers::YawRateSensor;
use crate::error::Result;
use crate::scheduler::Ticker;
use crate::shared::MotionState;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Yaw-rate sampling and zero-rate calibration.
pub struct YawIntegrator {
    sensor: Box<dyn YawRateSensor>,
    /// Zero-rate offset in degrees/second, subtracted from every read
    offset: f64,
    state: Arc<MotionState>,
}

impl YawIntegrator {
    pub fn new(sensor: Box<dyn YawRateSensor>, state: Arc<MotionState>) -> Self {
        Self {
            sensor,
            offset: 0.0,
            state,
        }
    }

    /// Average `iterations` consecutive raw samples into the zero-rate offset.
    ///
    /// The robot must be stationary; the caller is responsible for verifying
    /// that no wheel is enabled before starting calibration.
    pub fn calibrate(&mut self, iterations: u32) -> Result<()> {
        let iterations = iterations.max(1);
        let mut sum = 0.0;
        for _ in 0..iterations {
            sum += self.sensor.read_angular_rate()?;
        }
        self.offset = sum / iterations as f64;
        log::info!(
            "Gyro calibrated over {} samples, zero-rate offset {:.4} deg/s",
            iterations,
            self.offset
        );
        Ok(())
    }

    /// One offset-corrected rate sample in degrees/second.
    pub fn sample_rate(&mut self) -> Result<f64> {
        Ok(self.sensor.read_angular_rate()? - self.offset)
    }

    /// Calibrated zero-rate offset in degrees/second.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Accumulated yaw in degrees since the last reset.
    pub fn cumulative_yaw(&self) -> f64 {
        self.state.yaw() as f64
    }

    /// Move the integrator onto its integration thread.
    ///
    /// The thread samples at the given period and accumulates yaw using the
    /// measured inter-sample interval, so jitter in the tick does not skew
    /// the integral. A sensor error latches a fault on the shared state and
    /// ends the thread; the running primitive observes the fault and stops
    /// the motors.
    pub fn spawn(mut self, period: Duration) -> YawThreadHandle {
        let state = Arc::clone(&self.state);

        let handle = std::thread::Builder::new()
            .name("yaw-integrator".into())
            .spawn(move || {
                let mut ticker = Ticker::new(period);
                let mut last = Instant::now();
                let mut yaw = self.state.yaw() as f64;
                let mut epoch = self.state.yaw_epoch();

                loop {
                    if self.state.yaw_thread_should_stop() {
                        break;
                    }

                    ticker.wait();

                    let now = Instant::now();
                    let dt = now.duration_since(last).as_secs_f64();
                    last = now;

                    match self.sample_rate() {
                        Ok(rate) => {
                            // A foreground reset bumps the epoch; discard any
                            // accumulation that predates it.
                            let current = self.state.yaw_epoch();
                            if current != epoch {
                                epoch = current;
                                yaw = 0.0;
                            }
                            yaw += rate * dt;
                            // Re-check so a reset racing this tick is never
                            // overwritten with stale accumulation.
                            if self.state.yaw_epoch() == epoch {
                                self.state.set_yaw(yaw as f32);
                            } else {
                                epoch = self.state.yaw_epoch();
                                yaw = 0.0;
                            }
                        }
                        Err(e) => {
                            log::error!("Yaw sensor read failed: {}", e);
                            self.state.trigger_fault(format!("yaw sensor: {e}"));
                            break;
                        }
                    }
                }
            })
            .expect("Failed to spawn yaw integrator thread");

        YawThreadHandle { handle, state }
    }
}

/// Handle used to stop and join the integration thread at mission end.
pub struct YawThreadHandle {
    handle: JoinHandle<()>,
    state: Arc<MotionState>,
}

impl YawThreadHandle {
    /// Signal the thread to exit and wait for it.
    pub fn stop(self) {
        self.state.stop_yaw_thread();
        if self.handle.join().is_err() {
            log::error!("Yaw integrator thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RobiConfig, SimulationConfig};
    use crate::devices::mock::SimRobi;

    fn sim_robi(bias_dps: f64) -> SimRobi {
        SimRobi::new(
            RobiConfig {
                wheel_radius: 0.032,
                track_width: 0.155,
            },
            SimulationConfig {
                seed: 1,
                gyro_bias_dps: bias_dps,
                gyro_noise_stddev: 0.0,
            },
        )
    }

    #[test]
    fn test_calibration_learns_constant_bias() {
        let robi = sim_robi(2.5);
        let state = Arc::new(MotionState::new());
        let mut integrator = YawIntegrator::new(Box::new(robi.gyro()), state);

        integrator.calibrate(100).unwrap();
        assert!((integrator.offset() - 2.5).abs() < 1e-9);

        // Stationary robot now reads zero rate after correction
        let rate = integrator.sample_rate().unwrap();
        assert!(rate.abs() < 1e-9, "rate={rate}");

        // Nothing has integrated yet
        assert_eq!(integrator.cumulative_yaw(), 0.0);
    }

    #[test]
    fn test_calibration_propagates_sensor_error() {
        let robi = sim_robi(0.0);
        robi.fail_gyro();
        let state = Arc::new(MotionState::new());
        let mut integrator = YawIntegrator::new(Box::new(robi.gyro()), state);
        assert!(integrator.calibrate(10).is_err());
    }

    #[test]
    fn test_integration_thread_accumulates_bias() {
        let robi = sim_robi(90.0); // uncalibrated 90 deg/s drift
        let state = Arc::new(MotionState::new());
        let integrator = YawIntegrator::new(Box::new(robi.gyro()), Arc::clone(&state));

        let handle = integrator.spawn(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(120));
        handle.stop();

        // ~120ms at 90 deg/s is ~10.8 degrees; allow generous scheduling slack
        let yaw = state.yaw();
        assert!(yaw > 5.0, "yaw={yaw}");
        assert!(yaw < 40.0, "yaw={yaw}");
    }

    #[test]
    fn test_sensor_fault_latches_and_stops_thread() {
        let robi = sim_robi(0.0);
        let state = Arc::new(MotionState::new());
        let integrator = YawIntegrator::new(Box::new(robi.gyro()), Arc::clone(&state));

        let handle = integrator.spawn(Duration::from_millis(1));
        robi.fail_gyro();
        std::thread::sleep(Duration::from_millis(50));
        assert!(state.is_faulted());
        handle.stop();
    }
}
