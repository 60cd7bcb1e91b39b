use crate::constants::{
    BASE_ALTITUDE, BASE_TEMPERATURE, GAS_CONSTANT, GRAVITY_MAGNITUDE, MOLAR_MASS_AIR,
    SEA_LEVEL_PRESSURE, TEMP_LAPSE_RATE,
};

/// Barometric formula for a single constant-lapse-rate layer.
///
/// Both directions are total: outside the layer (above [`model_ceiling`])
/// the pressure sentinel is `0.0` Pa, and a non-positive pressure maps back
/// to the ceiling altitude.
pub struct Atmosphere;

impl Atmosphere {
    /// Exponent `g·M / (R·|L|)` of the barometric formula (≈ 5.26).
    pub fn barometric_exponent() -> f64 {
        -(GRAVITY_MAGNITUDE * MOLAR_MASS_AIR) / (GAS_CONSTANT * TEMP_LAPSE_RATE)
    }

    /// Altitude at which the layer temperature reaches 0 K.
    pub fn model_ceiling() -> f64 {
        BASE_ALTITUDE - BASE_TEMPERATURE / TEMP_LAPSE_RATE
    }

    pub fn altitude_to_pressure(altitude: f64) -> f64 {
        let base = 1.0 + (TEMP_LAPSE_RATE / BASE_TEMPERATURE) * (altitude - BASE_ALTITUDE);
        if !base.is_finite() || base <= 0.0 {
            return 0.0;
        }
        SEA_LEVEL_PRESSURE * base.powf(Self::barometric_exponent())
    }

    pub fn pressure_to_altitude(pressure: f64) -> f64 {
        if !pressure.is_finite() || pressure <= 0.0 {
            return Self::model_ceiling();
        }
        let term = (pressure / SEA_LEVEL_PRESSURE).powf(1.0 / Self::barometric_exponent()) - 1.0;
        BASE_ALTITUDE + (BASE_TEMPERATURE / TEMP_LAPSE_RATE) * term
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_sea_level_pressure() {
        assert_abs_diff_eq!(Atmosphere::altitude_to_pressure(0.0), 101_325.0, epsilon = 1e-6);
        assert_abs_diff_eq!(Atmosphere::pressure_to_altitude(101_325.0), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pressure_decreases_with_altitude() {
        let mut previous = Atmosphere::altitude_to_pressure(-100.0);
        for step in 1..=40 {
            let pressure = Atmosphere::altitude_to_pressure(-100.0 + step as f64 * 1_000.0);
            assert!(pressure < previous, "Pressure must fall with altitude");
            previous = pressure;
        }
    }

    #[test]
    fn test_three_km_pressure() {
        // Warm 300 K base gives a slightly higher pressure than the ISA value (70.1 kPa)
        let pressure = Atmosphere::altitude_to_pressure(3_000.0);
        assert!(pressure > 70_000.0 && pressure < 71_500.0, "Got {}", pressure);
    }

    #[test]
    fn test_round_trip() {
        for altitude in [-100.0, 0.0, 1.0, 250.0, 3_000.0, 10_000.0, 25_000.0, 40_000.0] {
            let pressure = Atmosphere::altitude_to_pressure(altitude);
            let recovered = Atmosphere::pressure_to_altitude(pressure);
            assert_relative_eq!(recovered, altitude, epsilon = 1e-6, max_relative = 1e-3);
        }
    }

    #[test]
    fn test_outside_model_domain() {
        let ceiling = Atmosphere::model_ceiling();
        assert_abs_diff_eq!(ceiling, 46_153.846, epsilon = 0.01);
        assert_eq!(Atmosphere::altitude_to_pressure(ceiling + 1.0), 0.0);
        assert_eq!(Atmosphere::altitude_to_pressure(1e9), 0.0);
        assert_eq!(Atmosphere::altitude_to_pressure(f64::NAN), 0.0);
        assert_abs_diff_eq!(Atmosphere::pressure_to_altitude(0.0), ceiling, epsilon = 1e-9);
        assert_abs_diff_eq!(Atmosphere::pressure_to_altitude(-1.0), ceiling, epsilon = 1e-9);
    }
}
