use std::fmt;
use std::time::Duration;

use log::info;

use crate::errors::RigError;

/// Pump command while evacuating: full duty, sucking.
pub const CALIBRATION_PUMP_COMMAND: i8 = -100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Ground,
    Pumping,
    Leaking,
    Done,
    Aborted,
}

impl CalibrationState {
    pub fn name(&self) -> &'static str {
        match self {
            CalibrationState::Ground => "ground",
            CalibrationState::Pumping => "pumping",
            CalibrationState::Leaking => "leaking",
            CalibrationState::Done => "done",
            CalibrationState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CalibrationState::Done | CalibrationState::Aborted)
    }
}

impl fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a finished calibration learned about the rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationReport {
    pub base_pressure: f64,
    pub setpoint: f64,
    pub pump_down_seconds: f64,
    pub leak_up_seconds: f64,
    pub total_seconds: f64,
}

/// Ground → Pumping → Leaking → Done, with Aborted reachable from anywhere.
///
/// Pure: [`step`](Self::step) consumes elapsed time and a filtered reading
/// and returns the pump command for the tick. The caller owns the I/O.
#[derive(Debug, Clone)]
pub struct CalibrationStateMachine {
    state: CalibrationState,
    setpoint: f64,
    base_pressure: f64,
    progress: f64,
    dwell_seconds: f64,
    tolerance: f64,
    pumping_started_at: Option<f64>,
    leaking_started_at: Option<f64>,
    finished_at: Option<f64>,
}

impl CalibrationStateMachine {
    pub fn new(
        setpoint: f64,
        base_pressure: f64,
        dwell: Duration,
        tolerance: f64,
    ) -> Result<Self, RigError> {
        if !(setpoint.is_finite() && base_pressure.is_finite()) || setpoint >= base_pressure {
            return Err(RigError::InvalidParameter(format!(
                "calibration setpoint {:.1} Pa must be below base pressure {:.1} Pa",
                setpoint, base_pressure
            )));
        }

        Ok(CalibrationStateMachine {
            state: CalibrationState::Ground,
            setpoint,
            base_pressure,
            progress: 0.0,
            dwell_seconds: dwell.as_secs_f64(),
            tolerance: tolerance.abs(),
            pumping_started_at: None,
            leaking_started_at: None,
            finished_at: None,
        })
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn base_pressure(&self) -> f64 {
        self.base_pressure
    }

    /// Fraction of the pressure span between base and setpoint that
    /// `reading` still sits above the setpoint.
    fn span_fraction(&self, reading: f64) -> f64 {
        (reading - self.setpoint) / (self.base_pressure - self.setpoint)
    }

    pub fn step(&mut self, elapsed: f64, reading: f64) -> i8 {
        match self.state {
            CalibrationState::Ground => {
                if elapsed >= self.dwell_seconds {
                    info!("Calibration baseline done at {:.2} s, pumping down", elapsed);
                    self.state = CalibrationState::Pumping;
                    self.pumping_started_at = Some(elapsed);
                    return CALIBRATION_PUMP_COMMAND;
                }
                0
            }
            CalibrationState::Pumping => {
                let progress = 0.5 * (1.0 - self.span_fraction(reading));
                self.progress = self.progress.max(progress.clamp(0.0, 0.5));

                if reading <= self.setpoint {
                    info!("Calibration setpoint reached at {:.2} s, leaking up", elapsed);
                    self.state = CalibrationState::Leaking;
                    self.leaking_started_at = Some(elapsed);
                    self.progress = 0.5;
                    return 0;
                }
                CALIBRATION_PUMP_COMMAND
            }
            CalibrationState::Leaking => {
                let progress = 0.5 * (1.0 + self.span_fraction(reading).max(0.0));
                self.progress = self.progress.max(progress.clamp(0.5, 1.0));

                if reading >= self.base_pressure - self.tolerance {
                    info!("Calibration complete at {:.2} s", elapsed);
                    self.state = CalibrationState::Done;
                    self.finished_at = Some(elapsed);
                    self.progress = 1.0;
                }
                0
            }
            CalibrationState::Done | CalibrationState::Aborted => 0,
        }
    }

    pub fn abort(&mut self) {
        self.state = CalibrationState::Aborted;
        self.progress = 0.0;
    }

    pub fn report(&self) -> Option<CalibrationReport> {
        if self.state != CalibrationState::Done {
            return None;
        }
        let pumping = self.pumping_started_at?;
        let leaking = self.leaking_started_at?;
        let finished = self.finished_at?;
        Some(CalibrationReport {
            base_pressure: self.base_pressure,
            setpoint: self.setpoint,
            pump_down_seconds: leaking - pumping,
            leak_up_seconds: finished - leaking,
            total_seconds: finished,
        })
    }
}
