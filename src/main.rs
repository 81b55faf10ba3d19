//! robi-motion - waypoint mission runner
//!
//! Executes a JSON mission plan against the simulated Robi42. Real hardware
//! plugs in behind the same driver traits from its own crate.

use robi_motion::config::AppConfig;
use robi_motion::devices::mock::SimRobi;
use robi_motion::error::Result;
use robi_motion::mission::{MissionContext, MissionPlan, run_mission};
use robi_motion::shared::MotionState;
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Parse command line arguments.
///
/// Supports:
/// - `robi-motion <plan.json>`
/// - `robi-motion --config <path> <plan.json>`
fn parse_args() -> (Option<String>, Option<String>) {
    let args: Vec<String> = env::args().collect();

    let mut config_path = None;
    let mut plan_path = None;

    let mut i = 1;
    while i < args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            config_path = Some(args[i + 1].clone());
            i += 2;
        } else if !args[i].starts_with('-') {
            plan_path = Some(args[i].clone());
            i += 1;
        } else {
            i += 1;
        }
    }

    (config_path, plan_path)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config_path, plan_path) = parse_args();

    let config = match config_path {
        Some(path) => {
            log::info!("Using config: {}", path);
            AppConfig::load(&path)?
        }
        None => AppConfig::default(),
    };

    let plan_path = match plan_path {
        Some(path) => path,
        None => {
            eprintln!("Usage: robi-motion [--config <config.toml>] <plan.json>");
            std::process::exit(2);
        }
    };

    log::info!("Loading mission plan: {}", plan_path);
    let plan = MissionPlan::load(&plan_path)?;
    let geometry = plan.geometry(config.robot);
    log::info!(
        "Plan: {} instructions, wheel_radius={:.3} m, track_width={:.3} m",
        plan.instructions.len(),
        geometry.wheel_radius,
        geometry.track_width
    );

    let state = Arc::new(MotionState::new());

    // Ctrl-C cancels the mission; the running primitive disables the motors.
    let cancel_state = Arc::clone(&state);
    ctrlc::set_handler(move || {
        log::warn!("Received shutdown signal, cancelling mission");
        cancel_state.cancel();
    })
    .map_err(|e| {
        robi_motion::error::Error::Config(format!("Error setting Ctrl-C handler: {e}"))
    })?;

    let robi = SimRobi::new(geometry, config.simulation);
    let ctx = MissionContext::from_sim(&robi);

    log::info!("Calibrating gyro and starting mission...");
    let tick_period = Duration::from_secs_f64(config.tuning.sim_dt);
    let results = run_mission(ctx, &plan, geometry, config.tuning, state, tick_period)?;

    for (i, result) in results.iter().enumerate() {
        println!(
            "instruction {:>2}: managed velocity {:.3} m/s, covered distance {:.3} m",
            i + 1,
            result.managed_velocity,
            result.covered_distance
        );
    }

    Ok(())
}
