use super::gain_schedule::Gains;

/// PID with gains that may change every tick. The integral is kept as an
/// accumulated output term so a gain change does not bump the output, and
/// it is clamped to the output limits against windup.
#[derive(Debug, Clone)]
pub struct PidController {
    integral: f64,
    previous_error: Option<f64>,
    output_limit: f64,
    output: f64,
}

impl PidController {
    pub fn new(output_limit: f64) -> Self {
        PidController {
            integral: 0.0,
            previous_error: None,
            output_limit: output_limit.abs(),
            output: 0.0,
        }
    }

    pub fn calculate(&mut self, error: f64, gains: Gains, delta_time: f64) -> f64 {
        let limit = self.output_limit;

        let derivative = match self.previous_error {
            Some(previous) if delta_time > 0.0 => (error - previous) / delta_time,
            _ => 0.0,
        };
        if delta_time > 0.0 {
            self.integral = (self.integral + gains.ki * error * delta_time).clamp(-limit, limit);
        }
        self.previous_error = Some(error);

        self.output = (gains.kp * error + self.integral + gains.kd * derivative).clamp(-limit, limit);
        self.output
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = None;
        self.output = 0.0;
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gains(kp: f64, ki: f64, kd: f64) -> Gains {
        Gains { kp, ki, kd }
    }

    #[test]
    fn test_pid_controller() {
        let mut pid = PidController::new(100.0);
        let mut error = 1_000.0;
        let delta_time = 0.1;

        for _ in 0..10 {
            let output = pid.calculate(error, gains(0.05, 0.01, 0.0), delta_time);
            error -= output * 10.0; // Simulate error reduction
        }

        assert!(error.abs() < 500.0, "PID should reduce error over time");
    }

    #[test]
    fn test_proportional_only() {
        let mut pid = PidController::new(100.0);
        assert_relative_eq!(pid.calculate(200.0, gains(0.1, 0.0, 0.0), 0.01), 20.0);
        assert_relative_eq!(pid.calculate(-300.0, gains(0.1, 0.0, 0.0), 0.01), -30.0);
    }

    #[test]
    fn test_output_is_clamped() {
        let mut pid = PidController::new(100.0);
        assert_eq!(pid.calculate(50_000.0, gains(1.0, 0.0, 0.0), 0.01), 100.0);
        assert_eq!(pid.calculate(-50_000.0, gains(1.0, 0.0, 0.0), 0.01), -100.0);
    }

    #[test]
    fn test_integral_windup_limited() {
        let mut pid = PidController::new(100.0);
        for _ in 0..1_000 {
            pid.calculate(10_000.0, gains(0.0, 1.0, 0.0), 0.1);
        }
        assert_eq!(pid.integral(), 100.0);
        // Recovers as soon as the error flips
        assert!(pid.calculate(-10_000.0, gains(0.0, 1.0, 0.0), 0.1) < 100.0);
    }

    #[test]
    fn test_first_tick_has_no_derivative_kick() {
        let mut pid = PidController::new(100.0);
        assert_eq!(pid.calculate(500.0, gains(0.0, 0.0, 1.0), 0.01), 0.0);
        assert_relative_eq!(pid.calculate(501.0, gains(0.0, 0.0, 1.0), 0.01), 100.0);
    }

    #[test]
    fn test_reset() {
        let mut pid = PidController::new(100.0);
        pid.calculate(1_000.0, gains(0.1, 0.5, 0.0), 0.1);
        pid.reset();
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.output(), 0.0);
    }
}
