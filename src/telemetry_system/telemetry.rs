use std::time::Duration;

use log::{info, warn};

use crate::{
    constants::HISTORY_CAPACITY, errors::RigError, hardware::Storage,
    trajectory_system::atmosphere::Atmosphere,
};

/// One live `(time, measured, setpoint)` triple for the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveSample {
    pub time: f32,
    pub measured: f32,
    pub setpoint: f32,
}

impl LiveSample {
    pub fn error(&self) -> f32 {
        self.setpoint - self.measured
    }

    pub fn measured_altitude(&self) -> f64 {
        Atmosphere::pressure_to_altitude(self.measured as f64)
    }

    pub fn setpoint_altitude(&self) -> f64 {
        Atmosphere::pressure_to_altitude(self.setpoint as f64)
    }
}

/// Session log writer and live history.
///
/// Log lines are `<state>,<elapsed seconds>,<filtered pressure Pa>` and are
/// rate limited to one per `log_interval` unless forced.
///
/// The live history keeps at most `history_capacity` samples (the first
/// ones of the run); the latest sample and the tracking error statistics
/// cover every recorded sample.
pub struct Telemetry {
    history: Vec<LiveSample>,
    history_capacity: usize,
    latest: Option<LiveSample>,
    samples_recorded: usize,
    error_sum: f64,
    log_interval: Duration,
    last_log_at: Option<Duration>,
    lines_logged: usize,
    lines_failed: usize,
    max_tracking_error: f32,
}

impl Telemetry {
    pub fn new(log_interval: Duration) -> Self {
        Telemetry {
            history: Vec::new(),
            history_capacity: HISTORY_CAPACITY,
            latest: None,
            samples_recorded: 0,
            error_sum: 0.0,
            log_interval,
            last_log_at: None,
            lines_logged: 0,
            lines_failed: 0,
            max_tracking_error: 0.0,
        }
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.latest = None;
        self.samples_recorded = 0;
        self.error_sum = 0.0;
        self.last_log_at = None;
        self.lines_logged = 0;
        self.lines_failed = 0;
        self.max_tracking_error = 0.0;
    }

    pub fn format_line(state: &str, elapsed_seconds: f64, pressure: f64) -> String {
        format!("{},{:.2},{:.1}\n", state, elapsed_seconds, pressure)
    }

    fn format_time(elapsed_time: f64) -> String {
        if elapsed_time >= 60.0 {
            let minutes = (elapsed_time / 60.0).floor();
            let seconds = elapsed_time % 60.0;
            format!("{:.0}m {:.2}s", minutes, seconds)
        } else {
            format!("{:.2}s", elapsed_time)
        }
    }

    /// Appends a log line when forced or when the interval has passed.
    /// Returns whether a line was written.
    pub fn log_entry(
        &mut self,
        storage: &mut impl Storage,
        now: Duration,
        state: &str,
        elapsed_seconds: f64,
        pressure: f64,
        force: bool,
    ) -> Result<bool, RigError> {
        let due = match self.last_log_at {
            Some(last) => now.saturating_sub(last) >= self.log_interval,
            None => true,
        };
        if !force && !due {
            return Ok(false);
        }

        self.last_log_at = Some(now);
        let line = Self::format_line(state, elapsed_seconds, pressure);
        match storage.append_buffered(&line) {
            Ok(()) => {
                self.lines_logged += 1;
                Ok(true)
            }
            Err(e) => {
                self.lines_failed += 1;
                warn!("Failed to log {:?}: {}", line.trim_end(), e);
                Err(e)
            }
        }
    }

    pub fn record(&mut self, sample: LiveSample) {
        let error = sample.error().abs();
        self.max_tracking_error = self.max_tracking_error.max(error);
        self.error_sum += error as f64;
        self.samples_recorded += 1;
        self.latest = Some(sample);
        if self.history.len() < self.history_capacity {
            self.history.push(sample);
        }
    }

    pub fn latest(&self) -> Option<LiveSample> {
        self.latest
    }

    pub fn samples_recorded(&self) -> usize {
        self.samples_recorded
    }

    pub fn history(&self) -> &[LiveSample] {
        &self.history
    }

    pub fn lines_logged(&self) -> usize {
        self.lines_logged
    }

    pub fn lines_failed(&self) -> usize {
        self.lines_failed
    }

    pub fn max_tracking_error(&self) -> f32 {
        self.max_tracking_error
    }

    pub fn mean_tracking_error(&self) -> f32 {
        if self.samples_recorded == 0 {
            return 0.0;
        }
        (self.error_sum / self.samples_recorded as f64) as f32
    }

    pub fn display_summary(&self) {
        info!("--- Run Summary ---");
        if let Some(last) = self.latest() {
            info!("Duration: {}", Self::format_time(last.time as f64));
        }
        info!("Samples: {}", self.samples_recorded);
        info!("Max tracking error: {:.1} Pa", self.max_tracking_error);
        info!("Mean tracking error: {:.1} Pa", self.mean_tracking_error());
        info!(
            "Log lines: {} written, {} failed",
            self.lines_logged, self.lines_failed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::simulated::MemoryStorage;
    use approx::assert_relative_eq;

    #[test]
    fn test_format_line() {
        assert_eq!(
            Telemetry::format_line("pumping", 12.346, 80_000.04),
            "pumping,12.35,80000.0\n"
        );
    }

    #[test]
    fn test_format_time() {
        assert_eq!(Telemetry::format_time(5.5), "5.50s");
        assert_eq!(Telemetry::format_time(125.0), "2m 5.00s");
    }

    #[test]
    fn test_log_rate_limited() {
        let mut storage = MemoryStorage::new();
        storage.create_file("state,time,pressure", "cal").unwrap();
        let mut telemetry = Telemetry::new(Duration::from_millis(100));

        let ms = Duration::from_millis;
        assert!(telemetry.log_entry(&mut storage, ms(0), "ground", 0.0, 1.0, false).unwrap());
        assert!(!telemetry.log_entry(&mut storage, ms(50), "ground", 0.05, 1.0, false).unwrap());
        assert!(telemetry.log_entry(&mut storage, ms(60), "ground", 0.06, 1.0, true).unwrap());
        assert!(!telemetry.log_entry(&mut storage, ms(150), "ground", 0.15, 1.0, false).unwrap());
        assert!(telemetry.log_entry(&mut storage, ms(160), "ground", 0.16, 1.0, false).unwrap());

        assert_eq!(telemetry.lines_logged(), 3);
        assert_eq!(storage.current_contents().lines().count(), 4);
    }

    #[test]
    fn test_log_failure_reported() {
        let mut storage = MemoryStorage::new();
        let mut telemetry = Telemetry::new(Duration::from_millis(100));

        let result = telemetry.log_entry(&mut storage, Duration::ZERO, "ground", 0.0, 1.0, true);
        assert!(matches!(result, Err(RigError::Storage(_))));
        assert_eq!(telemetry.lines_failed(), 1);
    }

    #[test]
    fn test_tracking_error_statistics() {
        let mut telemetry = Telemetry::new(Duration::from_millis(100));
        telemetry.record(LiveSample {
            time: 0.0,
            measured: 101_000.0,
            setpoint: 101_325.0,
        });
        telemetry.record(LiveSample {
            time: 0.1,
            measured: 100_000.0,
            setpoint: 99_875.0,
        });

        assert_relative_eq!(telemetry.max_tracking_error(), 325.0);
        assert_relative_eq!(telemetry.mean_tracking_error(), 225.0);
        assert_eq!(telemetry.latest().unwrap().time, 0.1);

        telemetry.reset();
        assert!(telemetry.history().is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut telemetry = Telemetry::new(Duration::from_millis(100)).with_history_capacity(3);
        for step in 0..10 {
            telemetry.record(LiveSample {
                time: step as f32 * 0.1,
                measured: 100_000.0,
                setpoint: 100_000.0 + step as f32,
            });
        }

        assert_eq!(telemetry.history().len(), 3);
        assert_eq!(telemetry.samples_recorded(), 10);
        assert_relative_eq!(telemetry.latest().unwrap().time, 0.9);
        assert_relative_eq!(telemetry.max_tracking_error(), 9.0);
        assert_relative_eq!(telemetry.mean_tracking_error(), 4.5);
    }

    #[test]
    fn test_live_sample_altitudes() {
        let sample = LiveSample {
            time: 1.0,
            measured: 101_325.0,
            setpoint: Atmosphere::altitude_to_pressure(1_000.0) as f32,
        };
        assert_relative_eq!(sample.measured_altitude(), 0.0, epsilon = 1e-3);
        assert_relative_eq!(sample.setpoint_altitude(), 1_000.0, epsilon = 0.5);
    }
}
