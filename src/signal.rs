// Per-cycle signal derivation from sampled speed

use crate::config::ACCEL_FILTER_ALPHA;

/// Signals derived from consecutive speed samples
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Derived {
    /// RPM/s
    pub acceleration: f64,
    /// Exponentially smoothed acceleration, RPM/s
    pub filtered_acceleration: f64,
}

impl Derived {
    /// Fold in a new speed sample taken `dt` seconds after `previous_speed`
    ///
    /// A non-positive `dt` yields zero acceleration for the cycle.
    pub fn update(&mut self, previous_speed: f64, speed: f64, dt: f64) {
        self.acceleration = if dt > 0.0 {
            (speed - previous_speed) / dt
        } else {
            0.0
        };
        self.filtered_acceleration = ACCEL_FILTER_ALPHA * self.acceleration
            + (1.0 - ACCEL_FILTER_ALPHA) * self.filtered_acceleration;
    }
}
