//! # Drive executable
//!
//! Replays a drive episode through the drive control and event scheduling modules in real time.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and modules
//!     - Load the episode given as the only argument
//!     - Main loop, once per cycle until the episode ends:
//!         - Desired velocity from the episode keyframes
//!         - Drive control processing
//!         - Event scheduler processing
//!         - Background scheduler processing
//!         - Archiving
//!     - End the event episode, cancelling anything still running

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    env, thread,
    time::{Duration, Instant},
};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::{debug, info, warn};

use drive_lib::{
    drive_ctrl::{DriveCtrl, DriveCtrlParams, InputData},
    episode::Episode,
    event_sched::{scheduler_requirements, BackgroundScheduler, EventConditions, EventScheduler},
    robot_model::RobotParams,
    setpoint_gen::SetpointGenParams,
};
use util::{
    archive::Archived,
    logger::{logger_init_split, LevelFilter},
    module::State,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.02;

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("drive_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger, per-cycle debug records only go to the log file
    logger_init_split(LevelFilter::Debug, LevelFilter::Info, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let robot: RobotParams =
        util::params::load("robot.toml").wrap_err("Could not load robot params")?;
    let setpoint_gen: SetpointGenParams =
        util::params::load("setpoint_gen.toml").wrap_err("Could not load setpoint_gen params")?;

    info!("Exec parameters loaded");

    // ---- LOAD EPISODE ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    if args.len() != 2 {
        return Err(eyre!("Expected path to an episode file as the only argument"));
    }

    info!("Loading episode from \"{}\"", &args[1]);

    let episode = Episode::load(&args[1]).wrap_err("Failed to load the episode")?;
    let actions = episode.build_actions(CYCLE_PERIOD_S);
    let events = episode
        .build_events(&actions)
        .wrap_err("Failed to build the episode events")?;

    info!(
        "Loaded episode lasts {:.02} s and contains {} keyframes, {} actions and {} events",
        episode.duration_s,
        episode.keyframes.len(),
        actions.len(),
        events.len()
    );
    info!(
        "Episode requires: {:?}\n",
        scheduler_requirements(&events)
    );

    // ---- MODULE INIT ----

    info!("Initialising modules...");

    let mut drive_ctrl = DriveCtrl::init(
        DriveCtrlParams {
            robot,
            setpoint_gen,
        },
        Some(&session),
    )
    .wrap_err("Failed to initialise DriveCtrl")?;
    info!("DriveCtrl init complete");

    let conditions = EventConditions::new();
    let background = BackgroundScheduler::new();
    let mut event_sched = EventScheduler::new(conditions.clone(), background.clone());
    info!("EventScheduler init complete");

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    event_sched.begin(events);

    let mut num_cycles: u64 = 0;
    let mut prev_active: Vec<String> = Vec::new();

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        let time_s = num_cycles as f64 * CYCLE_PERIOD_S;
        if time_s > episode.duration_s {
            break;
        }

        // ---- DRIVE CONTROL ----

        let input = InputData {
            time_s,
            desired: episode.desired_at(time_s),
            dt_s: CYCLE_PERIOD_S,
            input_voltage_v: std::f64::NAN,
        };

        match drive_ctrl.proc(&input) {
            Ok((setpoint, report)) => {
                if report.drive_limited || report.steer_limited {
                    debug!(
                        "Setpoint limited to s = {:.3} (steer: {}, drive: {})",
                        report.interp_s, report.steer_limited, report.drive_limited
                    );
                }
                debug!("Setpoint speeds: {:?}", setpoint.robot_relative_speeds);
            }
            Err(e) => warn!("DriveCtrl processing error: {}", e),
        }

        // ---- EVENTS ----

        event_sched.tick(time_s);
        background.run();

        let active = conditions.active_conditions();
        if active != prev_active {
            info!("Active conditions at {:.2} s: {:?}", time_s, active);
            prev_active = active;
        }

        // ---- WRITE ARCHIVES ----

        if let Err(e) = drive_ctrl.write() {
            warn!("Could not archive DriveCtrl: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
            ),
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    event_sched.end();
    background.run();

    let final_speeds = drive_ctrl.setpoint().robot_relative_speeds;
    info!(
        "Episode complete after {} cycles, final speeds {:?}",
        num_cycles, final_speeds
    );
    info!("End of execution");

    Ok(())
}
