//! Acceleration and turn primitives
//!
//! Each primitive runs a fixed-timestep control loop: advance the kinematic
//! state by `sim_dt`, read the accumulated yaw error, and command a
//! left/right velocity split that steers the error back toward zero. The
//! timestep is a calibration constant matched to the achieved period of the
//! real control loop; it is not derived from anything.

use crate::config::{RobiConfig, TuningConfig};
use crate::drivers::AbortInput;
use crate::drivers::stepper::Wheel;
use crate::error::{Error, Result};
use crate::motion::motors::Motors;
use crate::scheduler::Ticker;
use crate::shared::MotionState;
use std::sync::Arc;
use std::time::Duration;

/// What a primitive achieved by the time it terminated.
///
/// Threaded sequentially between instructions: the managed velocity of one
/// instruction seeds the entry velocity of the next, so chained instructions
/// keep rolling instead of stopping between them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstructionResult {
    /// Velocity actually reached, m/s
    pub managed_velocity: f64,
    /// Forward distance covered, m (zero for turns)
    pub covered_distance: f64,
}

/// How a turn interprets its entry velocity.
///
/// After a same-direction turn the wheel pair is already split and the
/// threaded velocity belongs to the inner wheel; after anything else it is
/// the outer wheel's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnEntry {
    Outer,
    Inner,
}

/// The motion controller's primitive loops.
pub struct MotionPrimitives {
    motors: Motors,
    state: Arc<MotionState>,
    robi: RobiConfig,
    tuning: TuningConfig,
    abort: Box<dyn AbortInput>,
    tick_period: Duration,
    /// Loop ticks between abort-switch polls (~100 ms of loop time)
    abort_poll_ticks: u64,
}

impl MotionPrimitives {
    pub fn new(
        motors: Motors,
        state: Arc<MotionState>,
        robi: RobiConfig,
        tuning: TuningConfig,
        abort: Box<dyn AbortInput>,
        tick_period: Duration,
    ) -> Self {
        let abort_poll_ticks = ((0.1 / tuning.sim_dt) as u64).max(1);
        Self {
            motors,
            state,
            robi,
            tuning,
            abort,
            tick_period,
            abort_poll_ticks,
        }
    }

    pub fn motors(&mut self) -> &mut Motors {
        &mut self.motors
    }

    pub fn motors_ref(&self) -> &Motors {
        &self.motors
    }

    /// Ramp the wheel pair from `from_v` toward `to_v` at acceleration `a`,
    /// holding heading with a proportional yaw correction.
    ///
    /// Terminates when `v` crosses `to_v` (from either side, per the sign of
    /// `a`) or the covered distance reaches `s_limit`. With `a == 0` the
    /// velocity never crosses, so `s_limit` is the sole terminator; that is
    /// how constant-speed legs are expressed. Returned velocity and distance
    /// are clamped to be non-negative.
    pub fn accelerate(
        &mut self,
        a: f64,
        from_v: f64,
        to_v: f64,
        s_limit: f64,
    ) -> Result<InstructionResult> {
        let dt = self.tuning.sim_dt;
        let gain_divisor = self.tuning.yaw_gain_divisor;
        let decelerating = a < 0.0;

        self.state.reset_yaw();

        let mut v = from_v;
        let mut s = 0.0;
        let mut ticks: u64 = 0;
        let mut ticker = Ticker::new(self.tick_period);

        loop {
            let target_reached = if decelerating { v <= to_v } else { v >= to_v };
            if target_reached || s >= s_limit {
                break;
            }

            self.check_interrupts(ticks)?;

            let rot = self.state.yaw() as f64;
            let comp = (rot * v / gain_divisor).abs();
            let (left_v, right_v) = if rot > 0.0 {
                (v - comp, v + comp)
            } else {
                (v + comp, v - comp)
            };
            self.command_wheels(left_v, right_v)?;

            v += a * dt;
            s += v * dt;
            ticks += 1;
            ticker.wait();
        }

        Ok(InstructionResult {
            managed_velocity: v.max(0.0),
            covered_distance: s.max(0.0),
        })
    }

    /// Controlled-radius turn through `total_turn_degree` degrees of heading
    /// change.
    ///
    /// The inner wheel runs at `k = r_inner / (r_inner + track_width)` times
    /// the outer wheel. Three phases, gated on accumulated yaw since turn
    /// start: ramp the pair up for `acceleration_degree` degrees, hold, then
    /// ramp down through the final `deceleration_degree` degrees. Stops at
    /// the target heading, or earlier when the decelerating pair reaches
    /// zero, in which case the wheels are commanded to rest.
    ///
    /// Returns the inner wheel's final velocity and zero covered distance:
    /// turns are accounted as pure rotation.
    #[allow(clippy::too_many_arguments)]
    pub fn turn(
        &mut self,
        left: bool,
        total_turn_degree: f64,
        acceleration_degree: f64,
        deceleration_degree: f64,
        inner_radius: f64,
        acceleration: f64,
        initial_velocity: f64,
        entry: TurnEntry,
    ) -> Result<InstructionResult> {
        let dt = self.tuning.sim_dt;
        let k = inner_radius / (inner_radius + self.robi.track_width);

        let mut outer_v = match entry {
            TurnEntry::Outer => initial_velocity,
            TurnEntry::Inner if k > 0.0 => initial_velocity / k,
            TurnEntry::Inner => initial_velocity,
        };

        let decel_start = total_turn_degree - deceleration_degree;

        self.state.reset_yaw();

        let mut ticks: u64 = 0;
        let mut ticker = Ticker::new(self.tick_period);

        loop {
            let progress = (self.state.yaw() as f64).abs();
            if progress >= total_turn_degree {
                break;
            }

            self.check_interrupts(ticks)?;

            if progress < acceleration_degree {
                outer_v += acceleration * dt;
            } else if progress >= decel_start {
                outer_v -= acceleration * dt;
                if outer_v <= 0.0 {
                    outer_v = 0.0;
                    self.command_wheels(0.0, 0.0)?;
                    break;
                }
            }

            let inner_v = k * outer_v;
            let (left_v, right_v) = if left {
                (inner_v, outer_v)
            } else {
                (outer_v, inner_v)
            };
            self.command_wheels(left_v, right_v)?;

            ticks += 1;
            ticker.wait();
        }

        Ok(InstructionResult {
            managed_velocity: (k * outer_v).max(0.0),
            covered_distance: 0.0,
        })
    }

    /// Pivot turn: wheels at equal and opposite velocity, through
    /// `total_turn_degree` degrees of heading change.
    ///
    /// Same yaw-gated phase structure as [`turn`](Self::turn), with
    /// `acceleration_degree` bounding both the ramp-up and the ramp-down.
    /// With a zero `acceleration_degree` the pivot keeps ramping the whole
    /// way instead of holding a speed it never reached. Always starts from
    /// and ends at rest.
    pub fn rapid_turn(
        &mut self,
        left: bool,
        total_turn_degree: f64,
        acceleration_degree: f64,
        acceleration: f64,
    ) -> Result<InstructionResult> {
        let dt = self.tuning.sim_dt;
        let decel_start = total_turn_degree - acceleration_degree;

        self.state.reset_yaw();

        let mut v: f64 = 0.0;
        let mut ticks: u64 = 0;
        let mut ticker = Ticker::new(self.tick_period);

        loop {
            let progress = (self.state.yaw() as f64).abs();
            if progress >= total_turn_degree {
                break;
            }

            self.check_interrupts(ticks)?;

            if acceleration_degree > 0.0 && progress >= decel_start {
                v -= acceleration * dt;
                if v <= 0.0 {
                    v = 0.0;
                    break;
                }
            } else if progress < acceleration_degree || acceleration_degree == 0.0 {
                v += acceleration * dt;
            }

            let (left_v, right_v) = if left { (-v, v) } else { (v, -v) };
            self.command_wheels(left_v, right_v)?;

            ticks += 1;
            ticker.wait();
        }

        // A pivot always ends at rest regardless of which bound fired.
        self.command_wheels(0.0, 0.0)?;

        Ok(InstructionResult {
            managed_velocity: 0.0,
            covered_distance: 0.0,
        })
    }

    /// Command both wheels, stopping the robot on any driver failure.
    fn command_wheels(&mut self, left_v: f64, right_v: f64) -> Result<()> {
        let r = self.robi.wheel_radius;
        let result = self
            .motors
            .set_velocity(Wheel::Left, left_v, r)
            .and_then(|_| self.motors.set_velocity(Wheel::Right, right_v, r));
        if result.is_err() {
            self.motors.disable_all();
        }
        result
    }

    /// Fail-fast checks run on every loop tick.
    ///
    /// Any hit disables both motors before the error propagates: the robot
    /// must never keep rolling past a fault, a cancellation, or a wedged
    /// termination condition.
    fn check_interrupts(&mut self, ticks: u64) -> Result<()> {
        if ticks >= self.tuning.max_primitive_ticks {
            self.motors.disable_all();
            return Err(Error::PrimitiveTimeout { ticks });
        }

        if self.state.is_faulted() {
            self.motors.disable_all();
            let reason = self
                .state
                .fault_reason()
                .unwrap_or_else(|| "unknown sensor fault".to_string());
            return Err(Error::Sensor(reason));
        }

        if self.state.is_cancelled() {
            self.motors.disable_all();
            return Err(Error::Cancelled);
        }

        if ticks % self.abort_poll_ticks == 0 {
            let aborted = match self.abort.is_aborted() {
                Ok(flag) => flag,
                Err(e) => {
                    self.motors.disable_all();
                    return Err(e);
                }
            };
            if aborted {
                log::warn!("Operator abort");
                self.state.cancel();
                self.motors.disable_all();
                return Err(Error::Cancelled);
            }
        }

        Ok(())
    }

    #[cfg(test)]
    fn tuning_mut(&mut self) -> &mut TuningConfig {
        &mut self.tuning
    }
}
