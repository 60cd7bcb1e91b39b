use crate::{errors::RigError, trajectory_system::atmosphere::Atmosphere};

/// Physically plausible chamber pressures. Anything outside means a
/// sensor fault or a runaway pump and ends the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyEnvelope {
    pub min_pressure: f64,
    pub max_pressure: f64,
}

impl SafetyEnvelope {
    /// Envelope spanning the pressures between two equivalent altitudes.
    pub fn from_altitudes(lowest: f64, highest: f64) -> Self {
        let a = Atmosphere::altitude_to_pressure(lowest);
        let b = Atmosphere::altitude_to_pressure(highest);
        SafetyEnvelope {
            min_pressure: a.min(b),
            max_pressure: a.max(b),
        }
    }

    pub fn contains(&self, pressure: f64) -> bool {
        pressure >= self.min_pressure && pressure <= self.max_pressure
    }

    pub fn check(&self, pressure: f64) -> Result<f64, RigError> {
        if self.contains(pressure) {
            Ok(pressure)
        } else {
            Err(RigError::SafetyEnvelopeViolation {
                pressure,
                min: self.min_pressure,
                max: self.max_pressure,
            })
        }
    }
}
