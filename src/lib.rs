pub mod config;
pub mod constants;
pub mod control;
pub mod errors;
pub mod hardware;
pub mod telemetry_system;
pub mod trajectory_system;
pub mod utils;

pub use config::ControllerConfig;
pub use constants::*;
pub use errors::RigError;

// Re-export commonly used items from control
pub use control::calibration::{CalibrationReport, CalibrationState, CalibrationStateMachine};
pub use control::controller::{TickOutcome, TrackingController};
pub use control::filter::SensorFilter;
pub use control::gain_schedule::{GainRow, GainSchedule, Gains};
pub use control::pid::PidController;
pub use control::safety::SafetyEnvelope;

// Re-export commonly used items from hardware
pub use hardware::{Clock, Hardware, MonotonicClock, PressureSensor, Pump, Storage};

// Re-export commonly used items from trajectory_system
pub use trajectory_system::atmosphere::Atmosphere;
pub use trajectory_system::trajectory::{Trajectory, TrajectoryGenerator, TrajectorySample};

// Re-export commonly used items from telemetry_system
pub use telemetry_system::telemetry::{LiveSample, Telemetry};
