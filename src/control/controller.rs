use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};

use crate::{
    config::ControllerConfig,
    errors::RigError,
    hardware::{Clock, Hardware, PressureSensor, Pump, Storage},
    telemetry_system::telemetry::{LiveSample, Telemetry},
    trajectory_system::trajectory::Trajectory,
};

use super::{
    calibration::{CalibrationReport, CalibrationState, CalibrationStateMachine},
    filter::SensorFilter,
    gain_schedule::GainSchedule,
    pid::PidController,
    safety::SafetyEnvelope,
};

/// Result of one control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// No run is active; nothing was read or commanded.
    Idle,
    Tracking(LiveSample),
    /// The cursor ran off the end of the trajectory; the pump is off.
    Complete,
}

struct RunSession {
    trajectory: Arc<Trajectory>,
    gains: Arc<GainSchedule>,
    pid: PidController,
    started_at: Duration,
    cursor: usize,
    current_seconds: f64,
    last_tick_seconds: Option<f64>,
    last_command: i8,
}

struct CalibrationSession {
    machine: CalibrationStateMachine,
    log_file: String,
    started_at: Option<Duration>,
    current_seconds: f64,
}

impl CalibrationSession {
    fn is_active(&self) -> bool {
        self.started_at.is_some() && !self.machine.state().is_terminal()
    }
}

/// Closed-loop pressure tracking and calibration for one chamber.
///
/// Owns the injected hardware. Meant to be ticked from a single host loop:
/// [`iterate`](Self::iterate) during a run, [`calibrate_iterate`](Self::calibrate_iterate)
/// during calibration. Every abort path turns the pump off before doing
/// anything else.
pub struct TrackingController<S, P, L, C> {
    hardware: Hardware<S, P, L, C>,
    config: ControllerConfig,
    filter: SensorFilter,
    envelope: SafetyEnvelope,
    gain_schedule: Option<Arc<GainSchedule>>,
    trajectory: Option<Arc<Trajectory>>,
    run: Option<RunSession>,
    calibration: Option<CalibrationSession>,
    telemetry: Telemetry,
    latest: LiveSample,
}

impl<S, P, L, C> TrackingController<S, P, L, C>
where
    S: PressureSensor,
    P: Pump,
    L: Storage,
    C: Clock,
{
    pub fn new(mut hardware: Hardware<S, P, L, C>, config: ControllerConfig) -> Self {
        hardware.pump.send(0);

        let filter = SensorFilter::new(config.filter_alpha, config.filter_seed);
        let envelope =
            SafetyEnvelope::from_altitudes(config.envelope_min_altitude, config.envelope_max_altitude);
        let telemetry = Telemetry::new(config.log_interval);
        let latest = LiveSample {
            time: 0.0,
            measured: config.filter_seed as f32,
            setpoint: config.filter_seed as f32,
        };

        TrackingController {
            hardware,
            config,
            filter,
            envelope,
            gain_schedule: None,
            trajectory: None,
            run: None,
            calibration: None,
            telemetry,
            latest,
        }
    }

    pub fn hardware(&self) -> &Hardware<S, P, L, C> {
        &self.hardware
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn envelope(&self) -> SafetyEnvelope {
        self.envelope
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn init_sensor(&mut self) -> Result<(), RigError> {
        if self.hardware.sensor.is_ready() {
            return Ok(());
        }
        match self.hardware.sensor.init() {
            Ok(()) => {
                info!(
                    "Sensor initialised, base pressure {:.1} Pa",
                    self.hardware.sensor.base_pressure()
                );
                Ok(())
            }
            Err(e) => {
                warn!("Sensor failed to initialise: {}", e);
                Err(e)
            }
        }
    }

    pub fn set_filter_alpha(&mut self, alpha: f64) {
        self.filter.set_alpha(alpha);
        debug!("Filter alpha set to {:.3}", self.filter.alpha());
    }

    pub fn filter_alpha(&self) -> f64 {
        self.filter.alpha()
    }

    /// Loads the gain schedule from the configured file.
    pub fn load_gain_schedule(&mut self) -> Result<(), RigError> {
        let path = self.config.gain_file.clone();
        match GainSchedule::load(&mut self.hardware.storage, &path) {
            Ok(schedule) => {
                info!("Gain schedule loaded from {} ({} rows)", path, schedule.len());
                self.gain_schedule = Some(Arc::new(schedule));
                Ok(())
            }
            Err(e) => {
                warn!("Gain schedule unavailable: {}", e);
                self.gain_schedule = None;
                Err(e)
            }
        }
    }

    pub fn set_gain_schedule(&mut self, schedule: GainSchedule) {
        self.gain_schedule = Some(Arc::new(schedule));
    }

    pub fn gain_schedule(&self) -> Option<&GainSchedule> {
        self.gain_schedule.as_deref()
    }

    /// Brings up the sensor and binds the trajectory the next run follows.
    pub fn bind_trajectory(&mut self, trajectory: Arc<Trajectory>) -> Result<(), RigError> {
        if self.run.is_some() {
            return Err(RigError::NotReady(
                "cannot rebind the trajectory during a run".to_string(),
            ));
        }
        self.init_sensor()?;
        if trajectory.is_empty() {
            return Err(RigError::InvalidParameter(
                "trajectory has no samples".to_string(),
            ));
        }
        self.trajectory = Some(trajectory);
        Ok(())
    }

    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.trajectory.as_deref()
    }

    fn run_preconditions(&self) -> Result<(Arc<Trajectory>, Arc<GainSchedule>), RigError> {
        if self.run.is_some() {
            return Err(RigError::NotReady("a run is already active".to_string()));
        }
        if self.is_calibrating() {
            return Err(RigError::NotReady("calibration in progress".to_string()));
        }
        if !self.hardware.sensor.is_ready() {
            return Err(RigError::NotReady("sensor not initialised".to_string()));
        }
        let trajectory = self
            .trajectory
            .clone()
            .filter(|trajectory| !trajectory.is_empty())
            .ok_or_else(|| RigError::NotReady("no trajectory bound".to_string()))?;
        let gains = self
            .gain_schedule
            .clone()
            .filter(|schedule| !schedule.is_empty())
            .ok_or_else(|| RigError::NotReady("gain schedule not loaded".to_string()))?;
        Ok((trajectory, gains))
    }

    /// Starts a run. Fails without touching the hardware when the sensor,
    /// trajectory or gain schedule is not usable.
    pub fn start(&mut self) -> Result<(), RigError> {
        let (trajectory, gains) = self.run_preconditions()?;

        self.filter.reset(self.config.filter_seed);
        self.telemetry.reset();
        info!(
            "Run started: {} samples over {:.2} s",
            trajectory.sample_count(),
            trajectory.duration()
        );
        self.run = Some(RunSession {
            trajectory,
            gains,
            pid: PidController::new(self.config.output_limit),
            started_at: self.hardware.clock.now(),
            cursor: 0,
            current_seconds: 0.0,
            last_tick_seconds: None,
            last_command: 0,
        });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn run_cursor(&self) -> Option<usize> {
        self.run.as_ref().map(|run| run.cursor)
    }

    pub fn last_command(&self) -> Option<i8> {
        self.run.as_ref().map(|run| run.last_command)
    }

    fn abort_run(&mut self, reason: &RigError) {
        self.hardware.pump.send(0);
        self.run = None;
        error!("Run aborted: {}", reason);
    }

    /// Reads, filters and range-checks the sensor. Both the raw and the
    /// filtered value must lie inside the envelope, so a single bad reading
    /// is caught however heavy the smoothing. Does not touch the pump.
    fn filtered_reading(&mut self) -> Result<f64, RigError> {
        let raw = self.hardware.sensor.read(true)? as f64;
        self.envelope.check(raw)?;
        let filtered = self.filter.update(raw);
        self.envelope.check(filtered)
    }

    /// One control tick of an active run.
    pub fn iterate(&mut self) -> Result<TickOutcome, RigError> {
        if self.run.is_none() {
            return Ok(TickOutcome::Idle);
        }

        let filtered = match self.filtered_reading() {
            Ok(filtered) => filtered,
            Err(e) => {
                self.abort_run(&e);
                return Err(e);
            }
        };

        let now = self.hardware.clock.now();
        let Some(run) = self.run.as_mut() else {
            return Ok(TickOutcome::Idle);
        };
        let elapsed = now.saturating_sub(run.started_at).as_secs_f64();
        run.current_seconds = elapsed;

        let samples = run.trajectory.samples();
        while run.cursor < samples.len() && (samples[run.cursor].time as f64) < elapsed {
            run.cursor += 1;
        }
        let Some(target) = samples.get(run.cursor).copied() else {
            self.hardware.pump.send(0);
            self.run = None;
            info!("Run complete after {:.2} s", elapsed);
            return Ok(TickOutcome::Complete);
        };

        let setpoint = target.pressure as f64;
        let gains = run.gains.lookup(filtered);
        let dt = run
            .last_tick_seconds
            .map_or(0.0, |last| (elapsed - last).max(0.0));
        run.last_tick_seconds = Some(elapsed);

        let output = run.pid.calculate(setpoint - filtered, gains, dt);
        let command = output.round().clamp(-100.0, 100.0) as i8;
        run.last_command = command;
        self.hardware.pump.send(command);

        let sample = LiveSample {
            time: elapsed as f32,
            measured: filtered as f32,
            setpoint: setpoint as f32,
        };
        self.latest = sample;
        self.telemetry.record(sample);
        debug!(
            "t={:.2}s p={:.1} sp={:.1} cmd={}",
            elapsed, filtered, setpoint, command
        );
        Ok(TickOutcome::Tracking(sample))
    }

    /// Turns the pump off and ends any run or calibration in progress.
    pub fn stop(&mut self) {
        self.hardware.pump.send(0);
        if self.run.take().is_some() {
            info!("Run stopped");
        }
        if let Some(session) = self.calibration.as_mut() {
            if session.is_active() {
                session.machine.abort();
                info!("Calibration stopped");
            }
        }
        if let Err(e) = self.hardware.storage.flush() {
            warn!("Failed to flush log: {}", e);
        }
    }

    pub fn latest_sample(&self) -> LiveSample {
        self.latest
    }

    pub fn latest_time(&self) -> f32 {
        self.latest.time
    }

    pub fn latest_pressure(&self) -> f32 {
        self.latest.measured
    }

    pub fn latest_setpoint(&self) -> f32 {
        self.latest.setpoint
    }

    /// Prepares a calibration towards `setpoint` Pa: sensor up, log file
    /// open, state machine on the ground. The pump is not touched.
    pub fn init_calibrate_system(&mut self, setpoint: f64) -> Result<(), RigError> {
        if self.run.is_some() {
            return Err(RigError::NotReady("a run is active".to_string()));
        }
        if self.is_calibrating() {
            return Err(RigError::NotReady(
                "calibration already in progress".to_string(),
            ));
        }
        self.init_sensor()?;

        let base_pressure = self.hardware.sensor.base_pressure() as f64;
        let machine = CalibrationStateMachine::new(
            setpoint,
            base_pressure,
            self.config.calibration_dwell,
            self.config.calibration_tolerance,
        )?;
        let log_file = self.hardware.storage.create_file(
            &self.config.calibration_log_header,
            &self.config.calibration_log_prefix,
        )?;

        info!(
            "Calibration ready: setpoint {:.1} Pa, base {:.1} Pa, logging to {}",
            setpoint, base_pressure, log_file
        );
        self.calibration = Some(CalibrationSession {
            machine,
            log_file,
            started_at: None,
            current_seconds: 0.0,
        });
        Ok(())
    }

    /// Starts the prepared calibration. The first log line is mandatory;
    /// if it cannot be written the calibration is aborted.
    pub fn start_calibrate_system(&mut self) -> Result<(), RigError> {
        if !self.hardware.sensor.is_ready() {
            return Err(RigError::NotReady("sensor not initialised".to_string()));
        }
        let now = self.hardware.clock.now();
        let session = match self.calibration.as_mut() {
            Some(session)
                if session.started_at.is_none()
                    && session.machine.state() == CalibrationState::Ground =>
            {
                session
            }
            _ => {
                return Err(RigError::NotReady(
                    "calibration not initialised".to_string(),
                ))
            }
        };

        self.hardware.pump.send(0);
        self.filter.reset(self.config.filter_seed);
        self.telemetry.reset();
        session.started_at = Some(now);
        session.current_seconds = 0.0;

        let logged = self.telemetry.log_entry(
            &mut self.hardware.storage,
            now,
            session.machine.state().name(),
            0.0,
            self.filter.value(),
            true,
        );
        if let Err(e) = logged {
            self.hardware.pump.send(0);
            session.machine.abort();
            error!("Calibration aborted, could not write {}: {}", session.log_file, e);
            return Err(e);
        }

        info!("Calibration started");
        Ok(())
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration
            .as_ref()
            .is_some_and(CalibrationSession::is_active)
    }

    fn abort_calibration(&mut self, reason: &RigError) {
        self.hardware.pump.send(0);
        if let Some(session) = self.calibration.as_mut() {
            session.machine.abort();
        }
        error!("Calibration aborted: {}", reason);
        if let Err(e) = self.hardware.storage.flush() {
            warn!("Failed to flush calibration log: {}", e);
        }
    }

    /// One calibration tick. Returns the state after the tick; once the
    /// calibration is done or aborted further calls do nothing.
    pub fn calibrate_iterate(&mut self) -> Result<CalibrationState, RigError> {
        let Some(session) = self.calibration.as_ref() else {
            return Err(RigError::NotReady("calibration not initialised".to_string()));
        };
        let state = session.machine.state();
        if state.is_terminal() {
            return Ok(state);
        }
        let Some(started_at) = session.started_at else {
            return Err(RigError::NotReady("calibration not started".to_string()));
        };

        let filtered = match self.filtered_reading() {
            Ok(filtered) => filtered,
            Err(e) => {
                self.abort_calibration(&e);
                return Err(e);
            }
        };

        let now = self.hardware.clock.now();
        let elapsed = now.saturating_sub(started_at).as_secs_f64();
        let Some(session) = self.calibration.as_mut() else {
            return Err(RigError::NotReady("calibration not initialised".to_string()));
        };
        session.current_seconds = elapsed;

        let command = session.machine.step(elapsed, filtered);
        self.hardware.pump.send(command);

        let state = session.machine.state();
        self.latest = LiveSample {
            time: elapsed as f32,
            measured: filtered as f32,
            setpoint: session.machine.setpoint() as f32,
        };

        let finished = state == CalibrationState::Done;
        if let Err(e) = self.telemetry.log_entry(
            &mut self.hardware.storage,
            now,
            state.name(),
            elapsed,
            filtered,
            finished,
        ) {
            warn!("Calibration log line dropped: {}", e);
        }

        if finished {
            if let Some(report) = session.machine.report() {
                info!(
                    "Calibration report: base {:.1} Pa, pump-down {:.2} s, leak-up {:.2} s",
                    report.base_pressure, report.pump_down_seconds, report.leak_up_seconds
                );
            }
            if let Err(e) = self.hardware.storage.flush() {
                warn!("Failed to flush calibration log: {}", e);
            }
        }
        Ok(state)
    }

    pub fn calibration_progress(&self) -> f64 {
        self.calibration
            .as_ref()
            .map_or(0.0, |session| session.machine.progress())
    }

    pub fn calibration_state(&self) -> Option<CalibrationState> {
        self.calibration
            .as_ref()
            .map(|session| session.machine.state())
    }

    pub fn calibration_report(&self) -> Option<CalibrationReport> {
        self.calibration
            .as_ref()
            .and_then(|session| session.machine.report())
    }

    pub fn calibration_log_file(&self) -> Option<&str> {
        self.calibration
            .as_ref()
            .map(|session| session.log_file.as_str())
    }
}
