use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RigError {
    #[error("Sensor read error: {0}")]
    SensorRead(String),

    #[error("Safety envelope violation: {pressure:.1} Pa outside [{min:.1}, {max:.1}] Pa")]
    SafetyEnvelopeViolation { pressure: f64, min: f64, max: f64 },

    #[error("Simulation infeasible: {0}")]
    SimulationInfeasible(String),

    #[error("Gain schedule load error: {0}")]
    GainScheduleLoad(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl RigError {
    /// Errors after which the active session must not continue.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            RigError::SafetyEnvelopeViolation { .. } | RigError::SensorRead(_)
        )
    }
}
