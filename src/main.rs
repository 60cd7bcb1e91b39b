use std::{env, fs, sync::Arc, time::Duration};

use flight_chamber::hardware::{
    simulated::{ChamberParams, SimulatedChamber},
    storage::FileStorage,
};
use flight_chamber::*;
use log::{error, info, warn};

const TICK: Duration = Duration::from_millis(50);
const BURNOUT_TIME: f64 = 2.0; // s
const TARGET_APOGEE: f64 = 1_500.0; // m
const TERMINAL_VELOCITY: f64 = -15.0; // m/s
const DEFAULT_GAINS: &str = "\
0.02, 0.002, 0.0, 60000
0.03, 0.004, 0.0, 85000
0.05, 0.006, 0.0, 110000
";

type SimController = TrackingController<
    hardware::simulated::SimulatedSensor,
    hardware::simulated::SimulatedPump,
    FileStorage,
    hardware::simulated::ManualClock,
>;

fn calibrate(controller: &mut SimController, clock: &impl Fn(Duration)) -> Result<(), RigError> {
    let setpoint = Atmosphere::altitude_to_pressure(CALIBRATION_ALTITUDE);
    controller.init_calibrate_system(setpoint)?;
    controller.start_calibrate_system()?;

    let mut last_state = CalibrationState::Ground;
    loop {
        clock(TICK);
        let state = controller.calibrate_iterate()?;
        if state != last_state {
            info!(
                "Calibration {} -> {} ({:.0}%)",
                last_state,
                state,
                controller.calibration_progress() * 100.0
            );
            last_state = state;
        }
        if state.is_terminal() {
            break;
        }
    }

    if let Some(report) = controller.calibration_report() {
        info!(
            "Calibrated in {:.1} s (pump-down {:.1} s, leak-up {:.1} s)",
            report.total_seconds, report.pump_down_seconds, report.leak_up_seconds
        );
    }
    Ok(())
}

fn fly(controller: &mut SimController, clock: &impl Fn(Duration)) -> Result<(), RigError> {
    controller.start()?;
    let ceiling = controller.trajectory().map_or(0.0, Trajectory::plot_ceiling);
    info!("Plot ceiling {:.0} m", ceiling);

    let mut ticks = 0_u64;
    loop {
        match controller.iterate()? {
            TickOutcome::Tracking(sample) => {
                if ticks % 40 == 0 {
                    info!(
                        "t={:>6.2}s | setpoint {:>7.1} m | chamber {:>7.1} m | error {:>7.1} Pa",
                        sample.time,
                        sample.setpoint_altitude(),
                        sample.measured_altitude(),
                        sample.error()
                    );
                }
            }
            TickOutcome::Complete | TickOutcome::Idle => break,
        }
        ticks += 1;
        clock(TICK);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let root = env::temp_dir().join("flight_chamber");
    fs::create_dir_all(&root)?;
    let config = ControllerConfig::default();
    let gain_path = root.join(&config.gain_file);
    if !gain_path.exists() {
        fs::write(&gain_path, DEFAULT_GAINS)?;
    }

    let trajectory = match TrajectoryGenerator::new(BURNOUT_TIME, TARGET_APOGEE, TERMINAL_VELOCITY)
        .generate()
    {
        Ok(trajectory) => Arc::new(trajectory),
        Err(e) => {
            error!("Cannot plan flight: {}", e);
            return Err(e.into());
        }
    };
    info!(
        "Planned flight: apogee {:.1} m at {:.2} s, {} samples over {:.2} s",
        trajectory.apogee_altitude(),
        trajectory.time_at_apogee(),
        trajectory.sample_count(),
        trajectory.duration()
    );

    let chamber = SimulatedChamber::new(ChamberParams::default(), 42);
    let clock = chamber.clock();
    let advance = |by: Duration| clock.advance(by);
    let hardware = Hardware::new(
        chamber.sensor(),
        chamber.pump(),
        FileStorage::new(&root),
        chamber.clock(),
    );
    let mut controller = TrackingController::new(hardware, config);

    if let Err(e) = calibrate(&mut controller, &advance) {
        controller.stop();
        error!("Calibration failed: {}", e);
        if e.is_session_fatal() {
            return Err(e.into());
        }
        warn!("Continuing without calibration");
    }
    if let Some(file) = controller.calibration_log_file() {
        info!("Calibration log: {}", root.join(file).display());
    }

    controller.load_gain_schedule()?;
    controller.bind_trajectory(trajectory)?;

    let result = fly(&mut controller, &advance);
    controller.stop();
    controller.telemetry().display_summary();

    if let Err(e) = result {
        error!("Run ended early: {}", e);
        return Err(e.into());
    }
    info!("Chamber pressure at rest: {:.1} Pa", chamber.pressure());
    Ok(())
}
