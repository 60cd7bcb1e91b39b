/// Linearly maps `x` from `[in_min, in_max]` onto `[out_min, out_max]`.
pub fn map_range(x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}
