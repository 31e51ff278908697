use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

/// The daily brightness schedule.
///
/// Between `start_hour` and `start_hour + duration_hours` the consigne
/// follows a half-cosine ramp rising from `0` to `amplitude` at mid-interval
/// and back to `0`. Outside that interval the consigne is `0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetpointCurve {
    /// Hour of the day the ramp starts at.
    pub start_hour: f32,
    /// Length of the ramp, in hours.
    pub duration_hours: f32,
    /// Peak consigne, reached at mid-interval.
    pub amplitude: f32,
}

impl Default for SetpointCurve {
    fn default() -> Self {
        Self::new(6.0, 14.0, 1000.0)
    }
}

impl SetpointCurve {
    /// Creates a [`SetpointCurve`].
    #[must_use]
    #[inline]
    pub const fn new(start_hour: f32, duration_hours: f32, amplitude: f32) -> Self {
        Self {
            start_hour,
            duration_hours,
            amplitude,
        }
    }

    /// Hour of the day the ramp ends at.
    #[must_use]
    #[inline]
    pub fn end_hour(&self) -> f32 {
        self.start_hour + self.duration_hours
    }

    /// Computes the consigne for the given hour of the day.
    #[must_use]
    pub fn consigne(&self, hour: f32) -> f32 {
        if hour < self.start_hour || hour > self.end_hour() {
            return 0.0;
        }

        let angle = TAU * (hour - self.start_hour) / self.duration_hours;
        self.amplitude * (1.0 - angle.cos()) / 2.0
    }
}
