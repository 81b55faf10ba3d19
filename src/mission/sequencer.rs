//! Mission sequencer
//!
//! Replays an instruction list through the motion primitives. The exit
//! velocity of each instruction seeds the entry velocity of the next; a
//! single failure aborts the remainder. Whatever happens, both motors are
//! disabled before control returns to the caller.

use crate::config::{RobiConfig, TuningConfig};
use crate::drivers::stepper::Wheel;
use crate::drivers::{AbortInput, StepperDriver, YawRateSensor};
use crate::error::{Error, Result};
use crate::mission::plan::{MissionInstruction, MissionPlan};
use crate::motion::motors::Motors;
use crate::motion::primitives::{InstructionResult, MotionPrimitives, TurnEntry};
use crate::motion::yaw::YawIntegrator;
use crate::shared::MotionState;
use std::sync::Arc;
use std::time::Duration;

/// The hardware a mission runs against, constructed once at process start
/// and passed in by ownership. Keeps the hardware handles out of global
/// state and lets tests substitute simulated devices.
pub struct MissionContext {
    pub gyro: Box<dyn YawRateSensor>,
    pub left_stepper: Box<dyn StepperDriver>,
    pub right_stepper: Box<dyn StepperDriver>,
    pub abort: Box<dyn AbortInput>,
}

/// Sequential instruction replay over a set of motion primitives.
pub struct MissionSequencer {
    primitives: MotionPrimitives,
    state: Arc<MotionState>,
}

impl MissionSequencer {
    pub fn new(primitives: MotionPrimitives, state: Arc<MotionState>) -> Self {
        Self { primitives, state }
    }

    /// Run the instruction list to completion.
    ///
    /// Both motors are disabled on every exit path - normal completion,
    /// error, or cancellation. An empty list disables the motors and
    /// returns immediately.
    pub fn run(&mut self, instructions: &[MissionInstruction]) -> Result<Vec<InstructionResult>> {
        let outcome = self.run_inner(instructions);
        self.primitives.motors().disable_all();
        outcome
    }

    fn run_inner(
        &mut self,
        instructions: &[MissionInstruction],
    ) -> Result<Vec<InstructionResult>> {
        let mut results = Vec::with_capacity(instructions.len());
        let mut carry: Option<InstructionResult> = None;
        let mut previous: Option<MissionInstruction> = None;

        for (index, instruction) in instructions.iter().enumerate() {
            if self.state.is_cancelled() {
                return Err(Error::Cancelled);
            }

            log::info!(
                "Instruction {}/{}: {}",
                index + 1,
                instructions.len(),
                instruction.kind()
            );

            let result = match *instruction {
                MissionInstruction::Drive {
                    acceleration,
                    initial_velocity,
                    acceleration_time,
                    constant_speed_time,
                    deceleration_time,
                } => {
                    let entry_v = carry
                        .map(|r| r.managed_velocity)
                        .unwrap_or(initial_velocity);
                    self.drive(
                        acceleration,
                        entry_v,
                        acceleration_time,
                        constant_speed_time,
                        deceleration_time,
                    )?
                }
                MissionInstruction::Turn {
                    left,
                    total_turn_degree,
                    inner_radius,
                    acceleration,
                    initial_velocity,
                    acceleration_degree,
                    deceleration_degree,
                } => {
                    let entry_v = carry
                        .map(|r| r.managed_velocity)
                        .unwrap_or(initial_velocity);
                    let entry = match previous {
                        Some(MissionInstruction::Turn {
                            left: previous_left,
                            ..
                        }) if previous_left == left => TurnEntry::Inner,
                        _ => TurnEntry::Outer,
                    };
                    self.primitives.turn(
                        left,
                        total_turn_degree,
                        acceleration_degree,
                        deceleration_degree,
                        inner_radius,
                        acceleration,
                        entry_v,
                        entry,
                    )?
                }
                MissionInstruction::RapidTurn {
                    left,
                    total_turn_degree,
                    acceleration_degree,
                    acceleration,
                } => {
                    // Stop-and-pivot: always entered from rest.
                    self.primitives.rapid_turn(
                        left,
                        total_turn_degree,
                        acceleration_degree,
                        acceleration,
                    )?
                }
            };

            log::info!(
                "Instruction {} done: managed velocity {:.3} m/s, covered {:.3} m",
                index + 1,
                result.managed_velocity,
                result.covered_distance
            );

            results.push(result);
            carry = Some(result);
            previous = Some(*instruction);
        }

        Ok(results)
    }

    /// Drive: acceleration, cruise, and deceleration phases, each expressed
    /// through the acceleration primitive.
    fn drive(
        &mut self,
        acceleration: f64,
        entry_v: f64,
        acceleration_time: f64,
        constant_speed_time: f64,
        deceleration_time: f64,
    ) -> Result<InstructionResult> {
        let target_v = entry_v + acceleration * acceleration_time;
        let ramp = self
            .primitives
            .accelerate(acceleration, entry_v, target_v, f64::INFINITY)?;

        let mut velocity = ramp.managed_velocity;
        let mut covered = ramp.covered_distance;

        let cruise_distance = velocity * constant_speed_time;
        if cruise_distance > 0.0 {
            let cruise = self
                .primitives
                .accelerate(0.0, velocity, f64::INFINITY, cruise_distance)?;
            velocity = cruise.managed_velocity;
            covered += cruise.covered_distance;
        }

        if deceleration_time > 0.0 && acceleration > 0.0 {
            let decel_target = (velocity - acceleration * deceleration_time).max(0.0);
            let ramp_down =
                self.primitives
                    .accelerate(-acceleration, velocity, decel_target, f64::INFINITY)?;
            velocity = ramp_down.managed_velocity;
            covered += ramp_down.covered_distance;
        }

        Ok(InstructionResult {
            managed_velocity: velocity,
            covered_distance: covered,
        })
    }
}

/// Execute a full mission lifecycle against the given hardware.
///
/// Calibrates the gyro (refusing if a wheel is somehow enabled), spawns the
/// yaw integration thread, replays the plan, and tears everything down. The
/// motors end up disabled on every path.
pub fn run_mission(
    ctx: MissionContext,
    plan: &MissionPlan,
    geometry: RobiConfig,
    tuning: TuningConfig,
    state: Arc<MotionState>,
    tick_period: Duration,
) -> Result<Vec<InstructionResult>> {
    let mut motors = Motors::new(ctx.left_stepper, ctx.right_stepper, tuning.min_step_frequency_hz);

    // Full microstep resolution for the whole mission; the conversion in the
    // velocity model depends on this staying fixed until the motors disable.
    motors.set_stepping_size(true, true, true)?;

    let mut integrator = YawIntegrator::new(ctx.gyro, Arc::clone(&state));
    calibrate_gyro(&mut integrator, &motors, tuning.calibration_iterations)?;

    let yaw_handle = integrator.spawn(tuning.yaw_tick_period());

    let primitives = MotionPrimitives::new(
        motors,
        Arc::clone(&state),
        geometry,
        tuning,
        ctx.abort,
        tick_period,
    );
    let mut sequencer = MissionSequencer::new(primitives, Arc::clone(&state));

    let outcome = sequencer.run(&plan.instructions);

    yaw_handle.stop();

    match &outcome {
        Ok(results) => log::info!("Mission complete: {} instructions", results.len()),
        Err(e) => log::error!("Mission aborted: {}", e),
    }

    outcome
}

/// Calibrate the zero-rate offset, refusing while any wheel is enabled:
/// averaging samples from a moving robot would bake real rotation into the
/// offset.
pub fn calibrate_gyro(
    integrator: &mut YawIntegrator,
    motors: &Motors,
    iterations: u32,
) -> Result<()> {
    if motors.any_enabled() {
        return Err(Error::CalibrationWhileMoving);
    }
    integrator.calibrate(iterations)
}

/// Convenience constructor wiring a [`MissionContext`] to the simulated
/// robot's devices.
impl MissionContext {
    pub fn from_sim(robi: &crate::devices::mock::SimRobi) -> Self {
        Self {
            gyro: Box::new(robi.gyro()),
            left_stepper: Box::new(robi.stepper(Wheel::Left)),
            right_stepper: Box::new(robi.stepper(Wheel::Right)),
            abort: Box::new(robi.abort_input()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::devices::mock::SimRobi;

    const ROBI: RobiConfig = RobiConfig {
        wheel_radius: 0.032,
        track_width: 0.155,
    };

    fn sequencer_rig() -> (SimRobi, Arc<MotionState>, MissionSequencer) {
        let robi = SimRobi::new(ROBI, SimulationConfig::default());
        let state = Arc::new(MotionState::new());
        let mut motors = Motors::new(
            Box::new(robi.stepper(Wheel::Left)),
            Box::new(robi.stepper(Wheel::Right)),
            7,
        );
        motors.set_stepping_size(true, true, true).unwrap();
        let primitives = MotionPrimitives::new(
            motors,
            Arc::clone(&state),
            ROBI,
            TuningConfig::default(),
            Box::new(robi.abort_input()),
            Duration::ZERO,
        );
        let sequencer = MissionSequencer::new(primitives, Arc::clone(&state));
        (robi, state, sequencer)
    }

    #[test]
    fn test_empty_mission_disables_motors_and_returns() {
        let (robi, _state, mut sequencer) = sequencer_rig();
        let results = sequencer.run(&[]).unwrap();
        assert!(results.is_empty());
        assert!(!robi.wheel(Wheel::Left).enabled);
        assert!(!robi.wheel(Wheel::Right).enabled);
    }

    #[test]
    fn test_drive_reaches_expected_peak_velocity() {
        let (_robi, _state, mut sequencer) = sequencer_rig();

        let results = sequencer
            .run(&[MissionInstruction::Drive {
                acceleration: 0.3,
                initial_velocity: 0.0,
                acceleration_time: 1.7,
                constant_speed_time: 1.11,
                deceleration_time: 0.0,
            }])
            .unwrap();

        // Peak commanded velocity: 0.3 * 1.7 = 0.51 m/s
        let dt = TuningConfig::default().sim_dt;
        let managed = results[0].managed_velocity;
        assert!(
            (managed - 0.51).abs() <= 0.3 * dt + 1e-9,
            "managed={managed}"
        );
        // Accel covers ~0.43m plus cruise 0.51*1.11 ~ 0.57m
        assert!(results[0].covered_distance > 0.9);
        assert!(results[0].covered_distance < 1.2);
    }

    #[test]
    fn test_drive_deceleration_returns_to_rest() {
        let (robi, _state, mut sequencer) = sequencer_rig();

        let results = sequencer
            .run(&[MissionInstruction::Drive {
                acceleration: 0.3,
                initial_velocity: 0.0,
                acceleration_time: 1.0,
                constant_speed_time: 0.5,
                deceleration_time: 1.0,
            }])
            .unwrap();

        assert!(results[0].managed_velocity < 0.01);
        // Sequencer disables motors after the list completes
        assert!(!robi.wheel(Wheel::Left).enabled);
    }

    #[test]
    fn test_result_velocity_threads_between_drives() {
        let (_robi, _state, mut sequencer) = sequencer_rig();

        let first = MissionInstruction::Drive {
            acceleration: 0.3,
            initial_velocity: 0.0,
            acceleration_time: 1.0,
            constant_speed_time: 0.0,
            deceleration_time: 0.0,
        };
        // Declared initial_velocity of the second instruction is ignored in
        // favor of the threaded result (0.3 m/s from the first).
        let second = MissionInstruction::Drive {
            acceleration: 0.2,
            initial_velocity: 0.0,
            acceleration_time: 1.0,
            constant_speed_time: 0.0,
            deceleration_time: 0.0,
        };

        let results = sequencer.run(&[first, second]).unwrap();
        let dt = TuningConfig::default().sim_dt;
        assert!((results[0].managed_velocity - 0.3).abs() <= 0.3 * dt + 1e-9);
        // Second continues from ~0.3 and adds 0.2*1.0
        assert!(
            (results[1].managed_velocity - 0.5).abs() <= 0.01,
            "second managed={}",
            results[1].managed_velocity
        );
    }

    #[test]
    fn test_cancellation_before_start_runs_nothing() {
        let (robi, state, mut sequencer) = sequencer_rig();

        state.cancel();
        let err = sequencer
            .run(&[MissionInstruction::Drive {
                acceleration: 0.3,
                initial_velocity: 0.0,
                acceleration_time: 1.0,
                constant_speed_time: 0.0,
                deceleration_time: 0.0,
            }])
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(!robi.wheel(Wheel::Left).enabled);
    }

    #[test]
    fn test_calibration_refused_while_wheel_enabled() {
        let robi = SimRobi::new(ROBI, SimulationConfig::default());
        let state = Arc::new(MotionState::new());
        let mut motors = Motors::new(
            Box::new(robi.stepper(Wheel::Left)),
            Box::new(robi.stepper(Wheel::Right)),
            7,
        );
        motors.set_stepping_size(true, true, true).unwrap();
        motors
            .set_velocity(Wheel::Left, 0.3, ROBI.wheel_radius)
            .unwrap();

        let mut integrator = YawIntegrator::new(Box::new(robi.gyro()), state);
        let err = calibrate_gyro(&mut integrator, &motors, 10).unwrap_err();
        assert!(matches!(err, Error::CalibrationWhileMoving));
    }

    #[test]
    fn test_fault_mid_mission_disables_motors() {
        let (robi, state, mut sequencer) = sequencer_rig();

        state.trigger_fault("yaw sensor: bus stuck".to_string());
        let err = sequencer
            .run(&[MissionInstruction::Drive {
                acceleration: 0.3,
                initial_velocity: 0.0,
                acceleration_time: 1.0,
                constant_speed_time: 0.0,
                deceleration_time: 0.0,
            }])
            .unwrap_err();
        assert!(matches!(err, Error::Sensor(_)));
        assert!(!robi.wheel(Wheel::Left).enabled);
        assert!(!robi.wheel(Wheel::Right).enabled);
    }
}
