//! Mission plan model
//!
//! Wire shape:
//!
//! ```json
//! {
//!   "config": { "wheel_radius": 0.032, "track_width": 0.155 },
//!   "instructions": [
//!     { "type": "drive", "acceleration": 0.3, "initial_velocity": 0.0,
//!       "acceleration_time": 1.7, "constant_speed_time": 1.11,
//!       "deceleration_time": 0.0 },
//!     { "type": "turn", "left": true, "total_turn_degree": 90.0, ... },
//!     { "type": "rapid_turn", "left": false, ... }
//!   ]
//! }
//! ```
//!
//! An unknown `type` or a missing field rejects the plan at parse time,
//! before any motion starts.

use crate::config::RobiConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One step of a mission. Immutable once parsed.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissionInstruction {
    /// Accelerate, cruise, decelerate - all time-parameterized
    Drive {
        /// Acceleration magnitude, m/s^2
        acceleration: f64,
        /// Entry velocity for the first instruction, m/s; later instructions
        /// inherit the previous result instead
        initial_velocity: f64,
        /// Duration of the acceleration phase, s
        acceleration_time: f64,
        /// Duration of the constant-speed phase, s
        constant_speed_time: f64,
        /// Duration of the deceleration phase, s
        deceleration_time: f64,
    },

    /// Controlled-radius arc through a heading change
    Turn {
        /// Turn direction
        left: bool,
        /// Total heading change, degrees
        total_turn_degree: f64,
        /// Radius of the inner wheel's arc, m
        inner_radius: f64,
        /// Ramp acceleration, m/s^2
        acceleration: f64,
        /// Entry velocity (see `Drive::initial_velocity`), m/s
        initial_velocity: f64,
        /// Degrees of turn spent ramping up
        acceleration_degree: f64,
        /// Degrees of turn spent ramping down
        deceleration_degree: f64,
    },

    /// Pivot in place: wheels at equal and opposite speed
    RapidTurn {
        /// Turn direction
        left: bool,
        /// Total heading change, degrees
        total_turn_degree: f64,
        /// Degrees of turn spent ramping up and again ramping down
        acceleration_degree: f64,
        /// Ramp acceleration, m/s^2
        acceleration: f64,
    },
}

impl MissionInstruction {
    /// Instruction kind for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Drive { .. } => "drive",
            Self::Turn { .. } => "turn",
            Self::RapidTurn { .. } => "rapid_turn",
        }
    }
}

/// A parsed mission: robot geometry plus the instruction list.
///
/// A plan without an embedded `config` falls back to the application's
/// `[robot]` section at run time.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MissionPlan {
    #[serde(default)]
    pub config: Option<RobiConfig>,
    pub instructions: Vec<MissionInstruction>,
}

impl MissionPlan {
    /// Parse a plan from its JSON wire shape and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let plan: MissionPlan = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Load and parse a plan file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Robot geometry: the plan's own when embedded, else the fallback.
    pub fn geometry(&self, fallback: RobiConfig) -> RobiConfig {
        self.config.unwrap_or(fallback)
    }

    /// Reject physically nonsensical plans before any motion starts.
    fn validate(&self) -> Result<()> {
        if let Some(config) = self.config {
            if config.wheel_radius <= 0.0 || config.track_width <= 0.0 {
                return Err(Error::Plan(format!(
                    "robot geometry must be positive: wheel_radius={}, track_width={}",
                    config.wheel_radius, config.track_width
                )));
            }
        }

        for (i, instruction) in self.instructions.iter().enumerate() {
            let problem = match *instruction {
                MissionInstruction::Drive {
                    acceleration,
                    initial_velocity,
                    acceleration_time,
                    constant_speed_time,
                    deceleration_time,
                } => {
                    if acceleration < 0.0
                        || initial_velocity < 0.0
                        || acceleration_time < 0.0
                        || constant_speed_time < 0.0
                        || deceleration_time < 0.0
                    {
                        Some("negative drive parameter")
                    } else {
                        None
                    }
                }
                MissionInstruction::Turn {
                    total_turn_degree,
                    inner_radius,
                    acceleration,
                    initial_velocity,
                    acceleration_degree,
                    deceleration_degree,
                    ..
                } => {
                    if total_turn_degree <= 0.0 {
                        Some("turn degree must be positive")
                    } else if inner_radius < 0.0 {
                        Some("negative inner radius")
                    } else if acceleration < 0.0
                        || initial_velocity < 0.0
                        || acceleration_degree < 0.0
                        || deceleration_degree < 0.0
                    {
                        Some("negative turn parameter")
                    } else {
                        None
                    }
                }
                MissionInstruction::RapidTurn {
                    total_turn_degree,
                    acceleration_degree,
                    acceleration,
                    ..
                } => {
                    if total_turn_degree <= 0.0 {
                        Some("turn degree must be positive")
                    } else if acceleration <= 0.0 {
                        Some("pivot acceleration must be positive")
                    } else if acceleration_degree < 0.0 {
                        Some("negative ramp degree")
                    } else {
                        None
                    }
                }
            };

            if let Some(problem) = problem {
                return Err(Error::Plan(format!(
                    "instruction {i} ({}): {problem}",
                    instruction.kind()
                )));
            }
        }

        Ok(())
    }
}
