use crate::constants::{FILTER_ALPHA_MAX, FILTER_ALPHA_MIN};

/// Single-pole IIR (exponential moving average) over raw pressure readings.
///
/// `alpha` is the weight kept on the *previous* filtered value:
/// `filtered = (1 - alpha) * raw + alpha * previous`. A larger alpha
/// therefore smooths more and responds more slowly. This is the
/// authoritative convention for every alpha in the crate. It is clamped
/// to `[0.2, 0.99]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFilter {
    filtered: f64,
    alpha: f64,
}

impl SensorFilter {
    pub fn new(alpha: f64, seed: f64) -> Self {
        SensorFilter {
            filtered: seed,
            alpha: Self::clamp_alpha(alpha),
        }
    }

    fn clamp_alpha(alpha: f64) -> f64 {
        if alpha.is_nan() {
            return FILTER_ALPHA_MAX;
        }
        alpha.clamp(FILTER_ALPHA_MIN, FILTER_ALPHA_MAX)
    }

    pub fn update(&mut self, raw: f64) -> f64 {
        self.filtered = (1.0 - self.alpha) * raw + self.alpha * self.filtered;
        self.filtered
    }

    pub fn reset(&mut self, seed: f64) {
        self.filtered = seed;
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = Self::clamp_alpha(alpha);
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn value(&self) -> f64 {
        self.filtered
    }
}
