//! Mission plans and their execution
//!
//! A mission is an ordered list of drive/turn instructions decoded from a
//! JSON plan. The sequencer replays them, threading each instruction's
//! achieved velocity into the next so chained instructions roll through
//! their boundaries without stopping.

pub mod plan;
pub mod sequencer;

pub use plan::{MissionInstruction, MissionPlan};
pub use sequencer::{MissionContext, MissionSequencer, run_mission};
