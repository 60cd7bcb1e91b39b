// Physical Constants
pub const GRAVITY: f64 = -9.81; // m/s², signed (downward)
pub const GRAVITY_MAGNITUDE: f64 = 9.81; // m/s²

// Atmosphere model (barometric formula, single lapse-rate layer)
pub const BASE_TEMPERATURE: f64 = 300.0; // K, 27°C at the base altitude
pub const TEMP_LAPSE_RATE: f64 = -0.0065; // K/m
pub const SEA_LEVEL_PRESSURE: f64 = 101325.0; // Pa (pascals)
pub const GAS_CONSTANT: f64 = 8.31432; // N⋅m/(mol⋅K)
pub const MOLAR_MASS_AIR: f64 = 0.0289644; // kg/mol
pub const BASE_ALTITUDE: f64 = 0.0; // m

// Trajectory Parameters
pub const TRAJECTORY_CAPACITY: usize = 8 * 320; // samples
pub const GROUND_THRESHOLD: f64 = 1.0; // m, generation stops below this after apogee
pub const PLOT_HEADROOM: f32 = 1.1; // plot ceiling as a fraction of apogee

// Controller Parameters
pub const PUMP_OUTPUT_LIMIT: f64 = 100.0; // %, sign selects direction
pub const DEFAULT_FILTER_ALPHA: f64 = 0.9;
pub const FILTER_ALPHA_MIN: f64 = 0.2;
pub const FILTER_ALPHA_MAX: f64 = 0.99;
pub const MAX_GAIN_ROWS: usize = 100;

// Safety envelope, expressed as equivalent altitudes
pub const ENVELOPE_MIN_ALTITUDE: f64 = -100.0; // m
pub const ENVELOPE_MAX_ALTITUDE: f64 = 10_000.0; // m

// Calibration Parameters
pub const CALIBRATION_DWELL_SECONDS: f64 = 5.0; // s spent on the ground gathering a baseline
pub const CALIBRATION_RETURN_TOLERANCE: f64 = 100.0; // Pa
pub const CALIBRATION_ALTITUDE: f64 = 3_000.0; // m, default pump-down target
pub const LOG_INTERVAL_MICROS: u64 = 100_000; // µs between non-forced log lines

// Storage Parameters
pub const HISTORY_CAPACITY: usize = 36_000; // live samples kept per run, 30 min at 50 ms
pub const LOG_BUFFER_SIZE: usize = 512; // bytes buffered before a flush
