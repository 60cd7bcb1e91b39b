//! Capability handles for the rig's hardware.
//!
//! The controller owns one instance of each, injected at construction, so
//! tests and the host demo can swap in the doubles from [`simulated`].

pub mod simulated;
pub mod storage;

use std::time::{Duration, Instant};

use crate::{errors::RigError, utils::math::map_range};

pub trait PressureSensor {
    /// Brings the sensor up and measures the ambient base pressure.
    fn init(&mut self) -> Result<(), RigError>;

    fn is_ready(&self) -> bool;

    /// Chamber pressure in Pa. With `absolute` the reading is offset so
    /// that ambient reads as standard sea level pressure.
    fn read(&mut self, absolute: bool) -> Result<f32, RigError>;

    /// Ambient pressure in the same frame as an absolute [`read`](Self::read).
    fn base_pressure(&self) -> f32;
}

pub trait Pump {
    /// Sign selects direction (positive raises chamber pressure), magnitude
    /// is duty in percent. Must be safe to call every tick.
    fn send(&mut self, percent: i8);
}

pub trait Storage {
    /// Opens a fresh log file named from `prefix` and writes `header` as its
    /// first line. Returns the file name.
    fn create_file(&mut self, header: &str, prefix: &str) -> Result<String, RigError>;

    /// Buffers `line` for the open log file, flushing once the buffer fills.
    fn append_buffered(&mut self, line: &str) -> Result<(), RigError>;

    fn flush(&mut self) -> Result<(), RigError>;

    /// Raw text of a table file such as the gain schedule.
    fn load_table(&mut self, path: &str) -> Result<String, RigError>;
}

pub trait Clock {
    /// Monotonic time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpDirection {
    Blow,
    Suck,
}

/// Hardware-level form of a signed percentage command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpCommand {
    pub direction: PumpDirection,
    pub duty: u8,
}

impl PumpCommand {
    pub fn from_percent(percent: i8, max_duty: u8) -> Self {
        let direction = if percent >= 0 {
            PumpDirection::Blow
        } else {
            PumpDirection::Suck
        };
        let magnitude = (percent as i16).abs().clamp(0, 100) as f64;
        let duty = map_range(magnitude, 0.0, 100.0, 0.0, max_duty as f64).round() as u8;
        PumpCommand { direction, duty }
    }

    pub fn is_off(&self) -> bool {
        self.duty == 0
    }
}

/// The rig's injected devices.
pub struct Hardware<S, P, L, C> {
    pub sensor: S,
    pub pump: P,
    pub storage: L,
    pub clock: C,
}

impl<S, P, L, C> Hardware<S, P, L, C>
where
    S: PressureSensor,
    P: Pump,
    L: Storage,
    C: Clock,
{
    pub fn new(sensor: S, pump: P, storage: L, clock: C) -> Self {
        Hardware {
            sensor,
            pump,
            storage,
            clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pump_command_direction() {
        let blow = PumpCommand::from_percent(50, 255);
        assert_eq!(blow.direction, PumpDirection::Blow);
        assert_eq!(blow.duty, 128);

        let suck = PumpCommand::from_percent(-100, 255);
        assert_eq!(suck.direction, PumpDirection::Suck);
        assert_eq!(suck.duty, 255);
    }

    #[test]
    fn test_pump_command_extremes() {
        assert!(PumpCommand::from_percent(0, 255).is_off());
        assert_eq!(PumpCommand::from_percent(i8::MIN, 255).duty, 255);
        assert_eq!(PumpCommand::from_percent(i8::MAX, 255).duty, 255);
    }

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
