use std::time::Duration;

use crate::constants::{
    CALIBRATION_DWELL_SECONDS, CALIBRATION_RETURN_TOLERANCE, DEFAULT_FILTER_ALPHA,
    ENVELOPE_MAX_ALTITUDE, ENVELOPE_MIN_ALTITUDE, LOG_INTERVAL_MICROS, PUMP_OUTPUT_LIMIT,
    SEA_LEVEL_PRESSURE,
};

/// Tunables fixed for a deployment and handed to the controller once.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Weight of the previous filtered value, see [`SensorFilter`](crate::control::filter::SensorFilter).
    pub filter_alpha: f64,
    pub filter_seed: f64,
    pub output_limit: f64,
    pub calibration_dwell: Duration,
    pub calibration_tolerance: f64,
    pub log_interval: Duration,
    pub envelope_min_altitude: f64,
    pub envelope_max_altitude: f64,
    pub gain_file: String,
    pub calibration_log_prefix: String,
    pub calibration_log_header: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            filter_alpha: DEFAULT_FILTER_ALPHA,
            filter_seed: SEA_LEVEL_PRESSURE,
            output_limit: PUMP_OUTPUT_LIMIT,
            calibration_dwell: Duration::from_secs_f64(CALIBRATION_DWELL_SECONDS),
            calibration_tolerance: CALIBRATION_RETURN_TOLERANCE,
            log_interval: Duration::from_micros(LOG_INTERVAL_MICROS),
            envelope_min_altitude: ENVELOPE_MIN_ALTITUDE,
            envelope_max_altitude: ENVELOPE_MAX_ALTITUDE,
            gain_file: "gains.csv".to_string(),
            calibration_log_prefix: "cal".to_string(),
            calibration_log_header: "state,time,pressure".to_string(),
        }
    }
}
