use log::{debug, info};

use crate::{
    constants::{GRAVITY, GROUND_THRESHOLD, PLOT_HEADROOM, TRAJECTORY_CAPACITY},
    errors::RigError,
    utils::math::map_range,
};

use super::atmosphere::Atmosphere;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    pub time: f32,
    pub altitude: f32,
    pub velocity: f32,
    pub pressure: f32,
}

/// An immutable generated flight profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    samples: Vec<TrajectorySample>,
    apogee_altitude: f32,
    time_at_apogee: f32,
}

impl Trajectory {
    fn empty() -> Self {
        Trajectory {
            samples: Vec::new(),
            apogee_altitude: 0.0,
            time_at_apogee: 0.0,
        }
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn apogee_altitude(&self) -> f32 {
        self.apogee_altitude
    }

    pub fn time_at_apogee(&self) -> f32 {
        self.time_at_apogee
    }

    pub fn duration(&self) -> f32 {
        self.samples.last().map_or(0.0, |sample| sample.time)
    }

    /// Upper bound for plotting altitude, leaving room for overshoot.
    pub fn plot_ceiling(&self) -> f32 {
        self.apogee_altitude * PLOT_HEADROOM
    }

    pub fn times(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().map(|sample| sample.time)
    }

    pub fn altitudes(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().map(|sample| sample.altitude)
    }

    pub fn pressures(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().map(|sample| sample.pressure)
    }
}

/// Flight parameters a trajectory is generated from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryGenerator {
    pub burnout_time: f64,
    pub target_apogee: f64,
    pub terminal_velocity: f64,
    resolution: usize,
}

impl TrajectoryGenerator {
    pub fn new(burnout_time: f64, target_apogee: f64, terminal_velocity: f64) -> Self {
        TrajectoryGenerator {
            burnout_time,
            target_apogee,
            terminal_velocity,
            resolution: TRAJECTORY_CAPACITY,
        }
    }

    /// Number of evenly spaced time steps, clamped to `2..=TRAJECTORY_CAPACITY`.
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution.clamp(2, TRAJECTORY_CAPACITY);
        self
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Constant boost acceleration that reaches `apogee` after burning for
    /// `burnout_time` and coasting under `gravity`. `None` when the
    /// discriminant is negative or the result is not finite.
    ///
    /// With downward (negative) gravity and a positive apogee the
    /// discriminant cannot go negative, so this never rejects a real flight
    /// plan. Unreachable apogees such as `10 s / 1e9 m` are turned away by
    /// the atmosphere ceiling check in [`generate`](Self::generate).
    pub fn boost_acceleration(gravity: f64, burnout_time: f64, apogee: f64) -> Option<f64> {
        let tb2 = burnout_time * burnout_time;
        let g_tb2 = gravity * tb2;
        let discriminant = g_tb2 * g_tb2 - 8.0 * gravity * apogee * tb2;
        if discriminant < 0.0 {
            return None;
        }
        let acceleration = (g_tb2 + discriminant.sqrt()) / (2.0 * tb2);
        acceleration.is_finite().then_some(acceleration)
    }

    fn validate(&self) -> Result<(), RigError> {
        if !(self.burnout_time.is_finite() && self.burnout_time > 0.0) {
            return Err(RigError::InvalidParameter(format!(
                "burnout time must be positive, got {}",
                self.burnout_time
            )));
        }
        if !(self.target_apogee.is_finite() && self.target_apogee > 0.0) {
            return Err(RigError::InvalidParameter(format!(
                "target apogee must be positive, got {}",
                self.target_apogee
            )));
        }
        if !(self.terminal_velocity.is_finite() && self.terminal_velocity < 0.0) {
            return Err(RigError::InvalidParameter(format!(
                "terminal velocity must be negative, got {}",
                self.terminal_velocity
            )));
        }
        if !(2..=TRAJECTORY_CAPACITY).contains(&self.resolution) {
            return Err(RigError::InvalidParameter(format!(
                "resolution must be between 2 and {}, got {}",
                TRAJECTORY_CAPACITY, self.resolution
            )));
        }
        Ok(())
    }

    pub fn generate(&self) -> Result<Trajectory, RigError> {
        self.validate()?;

        let ceiling = Atmosphere::model_ceiling();
        if self.target_apogee >= ceiling {
            return Err(RigError::SimulationInfeasible(format!(
                "target apogee {:.0} m is above the atmosphere model ceiling {:.0} m",
                self.target_apogee, ceiling
            )));
        }

        let boost = Self::boost_acceleration(GRAVITY, self.burnout_time, self.target_apogee)
            .ok_or_else(|| {
                RigError::SimulationInfeasible(format!(
                    "no boost acceleration reaches {:.0} m with a {:.2} s burn",
                    self.target_apogee, self.burnout_time
                ))
            })?;

        let time_to_apogee = (self.burnout_time * (boost - GRAVITY) / -GRAVITY).abs();

        // Free fall from apogee until terminal velocity, then constant descent
        let time_to_terminal = (self.terminal_velocity / GRAVITY).abs();
        let terminal_altitude =
            self.target_apogee + self.terminal_velocity.powi(2) / (2.0 * GRAVITY);
        let time_to_landing = (terminal_altitude / self.terminal_velocity).abs();
        let total_flight_time = time_to_apogee + time_to_terminal + time_to_landing;

        debug!(
            "Boost {:.3} m/s², apogee at {:.2} s, flight time {:.2} s",
            boost, time_to_apogee, total_flight_time
        );

        if !(total_flight_time > 0.0) {
            return Ok(Trajectory::empty());
        }

        let mut samples = Vec::with_capacity(self.resolution);
        samples.push(TrajectorySample {
            time: 0.0,
            altitude: 0.0,
            velocity: 0.0,
            pressure: Atmosphere::altitude_to_pressure(0.0) as f32,
        });

        let last_index = (self.resolution - 1) as f64;
        let mut altitude = 0.0_f64;
        let mut velocity = 0.0_f64;
        let mut previous_time = 0.0_f64;

        for step in 1..self.resolution {
            let time = map_range(step as f64, 0.0, last_index, 0.0, total_flight_time);
            let dt = time - previous_time;

            let acceleration = if time < self.burnout_time {
                boost
            } else if velocity <= self.terminal_velocity {
                velocity = self.terminal_velocity;
                0.0
            } else {
                GRAVITY
            };

            altitude += velocity * dt + 0.5 * acceleration * dt * dt;
            velocity += acceleration * dt;
            previous_time = time;

            if altitude < GROUND_THRESHOLD && time > time_to_apogee {
                break;
            }

            let pressure = Atmosphere::altitude_to_pressure(altitude);
            if !pressure.is_finite() || !altitude.is_finite() {
                return Err(RigError::SimulationInfeasible(format!(
                    "non-finite state at t = {:.2} s",
                    time
                )));
            }

            samples.push(TrajectorySample {
                time: time as f32,
                altitude: altitude as f32,
                velocity: velocity as f32,
                pressure: pressure as f32,
            });
        }

        let (apogee_altitude, time_at_apogee) = samples
            .iter()
            .fold((f32::MIN, 0.0), |(best, best_time), sample| {
                if sample.altitude > best {
                    (sample.altitude, sample.time)
                } else {
                    (best, best_time)
                }
            });

        info!(
            "Generated {} samples, apogee {:.1} m at {:.2} s",
            samples.len(),
            apogee_altitude,
            time_at_apogee
        );

        Ok(Trajectory {
            samples,
            apogee_altitude,
            time_at_apogee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn generate(burnout: f64, apogee: f64, terminal: f64) -> Trajectory {
        TrajectoryGenerator::new(burnout, apogee, terminal)
            .generate()
            .expect("Feasible flight should generate")
    }

    #[test]
    fn test_boost_acceleration_reaches_apogee() {
        let burnout = 3.0;
        let apogee = 1_000.0;
        let boost = TrajectoryGenerator::boost_acceleration(GRAVITY, burnout, apogee)
            .expect("Discriminant is positive for downward gravity");

        // Height at burnout plus ballistic coast must equal the target
        let burnout_velocity = boost * burnout;
        let reached = 0.5 * boost * burnout * burnout + burnout_velocity.powi(2) / (2.0 * -GRAVITY);
        assert_relative_eq!(reached, apogee, max_relative = 1e-9);
    }

    #[test]
    fn test_negative_discriminant() {
        // An upward "gravity" makes the quadratic unsolvable for a large target
        assert_eq!(TrajectoryGenerator::boost_acceleration(9.81, 10.0, 1e9), None);
        // Real gravity always solves; the ceiling check rejects this plan instead
        assert!(TrajectoryGenerator::boost_acceleration(GRAVITY, 10.0, 1e9).is_some());
    }

    #[test]
    fn test_monotonic_time() {
        let trajectory = generate(2.0, 1_000.0, -10.0);
        assert!(trajectory.sample_count() > 1);
        for pair in trajectory.samples().windows(2) {
            assert!(
                pair[0].time < pair[1].time,
                "Time must strictly increase: {} then {}",
                pair[0].time,
                pair[1].time
            );
        }
    }

    #[test]
    fn test_apogee_is_maximum_altitude() {
        let trajectory = generate(2.0, 1_000.0, -10.0);
        let (index, max) = trajectory
            .altitudes()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, a)| if a > acc.1 { (i, a) } else { acc });

        assert_eq!(trajectory.apogee_altitude(), max);
        assert_eq!(trajectory.time_at_apogee(), trajectory.samples()[index].time);
        assert_relative_eq!(trajectory.apogee_altitude(), 1_000.0, max_relative = 0.02);
    }

    #[test]
    fn test_stops_near_ground() {
        let trajectory = generate(2.0, 1_000.0, -10.0);
        assert!(trajectory.sample_count() <= TRAJECTORY_CAPACITY);

        let last = trajectory.samples().last().expect("Non-empty trajectory");
        assert!(last.time > trajectory.time_at_apogee());
        assert!(
            last.altitude < 50.0,
            "Descent should end close to the ground, ended at {}",
            last.altitude
        );
    }

    #[test]
    fn test_pressure_consistent_with_altitude() {
        let trajectory = generate(4.0, 3_000.0, -25.0);
        for sample in trajectory.samples() {
            let expected = Atmosphere::altitude_to_pressure(sample.altitude as f64) as f32;
            assert_relative_eq!(sample.pressure, expected, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_descent_capped_at_terminal_velocity() {
        let terminal = -15.0;
        let trajectory = generate(2.0, 800.0, terminal);
        let slowest = trajectory
            .samples()
            .iter()
            .map(|sample| sample.velocity)
            .fold(f32::MAX, f32::min);

        assert!(
            slowest >= terminal as f32 - 1.0,
            "Descent should not exceed terminal velocity, got {}",
            slowest
        );
    }

    #[test]
    fn test_infeasible_apogee() {
        let result = TrajectoryGenerator::new(10.0, 1e9, -10.0).generate();
        assert!(matches!(result, Err(RigError::SimulationInfeasible(_))));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            TrajectoryGenerator::new(0.0, 1_000.0, -10.0).generate(),
            Err(RigError::InvalidParameter(_))
        ));
        assert!(matches!(
            TrajectoryGenerator::new(2.0, -5.0, -10.0).generate(),
            Err(RigError::InvalidParameter(_))
        ));
        assert!(matches!(
            TrajectoryGenerator::new(2.0, 1_000.0, 10.0).generate(),
            Err(RigError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_resolution_bounds() {
        let generator = TrajectoryGenerator::new(2.0, 1_000.0, -10.0);
        assert_eq!(generator.resolution(), TRAJECTORY_CAPACITY);
        assert_eq!(generator.with_resolution(0).resolution(), 2);
        assert_eq!(
            generator.with_resolution(1_000_000).resolution(),
            TRAJECTORY_CAPACITY
        );

        let coarse = generator.with_resolution(0).generate().unwrap();
        assert!(!coarse.is_empty() && coarse.sample_count() <= 2);

        for resolution in [0, 1, TRAJECTORY_CAPACITY + 1] {
            let unclamped = TrajectoryGenerator {
                resolution,
                ..generator
            };
            assert!(matches!(
                unclamped.generate(),
                Err(RigError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_regenerated_trajectories_are_independent() {
        let first = generate(2.0, 1_000.0, -10.0);
        let second = generate(3.0, 2_000.0, -10.0);
        assert_ne!(first, second);
        assert_eq!(first, generate(2.0, 1_000.0, -10.0));
    }

    #[test]
    fn test_plot_ceiling() {
        let trajectory = generate(2.0, 1_000.0, -10.0);
        assert_relative_eq!(
            trajectory.plot_ceiling(),
            trajectory.apogee_altitude() * 1.1,
            max_relative = 1e-6
        );
    }
}
