use serde::{Deserialize, Serialize};

/// Regulation gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegulatorGains {
    /// Factor applied to the consigne in the proportional path.
    pub proportional: f32,
    /// The integrator advances by `error / integral_divisor` per step.
    pub integral_divisor: f32,
    /// Upper bound of the drive; the lower bound is `0`.
    pub output_max: f32,
}

impl Default for RegulatorGains {
    fn default() -> Self {
        Self {
            proportional: 0.8,
            integral_divisor: 200.0,
            output_max: 255.0,
        }
    }
}

/// The outcome of one regulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regulation {
    /// Clamped drive, in the `0..=output_max` domain.
    pub drive: f32,
    /// The rounded drive to write to the lamp, when it differs from the
    /// last written one.
    pub write: Option<u8>,
}

/// PI regulation state with conditional integration.
///
/// The integrator only moves in the direction of the error while the
/// unclamped output would stay within `[0, output_max]`. Once saturated, it
/// freezes until the error reverses.
#[derive(Debug, Clone, PartialEq)]
pub struct Regulator {
    gains: RegulatorGains,
    integrator: f32,
    drive: f32,
    written: Option<u8>,
}

impl Regulator {
    /// Creates a [`Regulator`] with an empty integrator.
    #[must_use]
    #[inline]
    pub const fn new(gains: RegulatorGains) -> Self {
        Self {
            gains,
            integrator: 0.0,
            drive: 0.0,
            written: None,
        }
    }

    /// The integrator accumulator.
    #[must_use]
    #[inline]
    pub const fn integrator(&self) -> f32 {
        self.integrator
    }

    /// The last computed drive.
    #[must_use]
    #[inline]
    pub const fn drive(&self) -> f32 {
        self.drive
    }

    /// The last drive written to the lamp.
    #[must_use]
    #[inline]
    pub const fn written(&self) -> Option<u8> {
        self.written
    }

    /// Runs one regulation step.
    pub fn update(&mut self, consigne: f32, luminosity: f32) -> Regulation {
        // TODO: decide whether the proportional path should act on
        // `consigne - luminosity` instead of the bare consigne.
        let p = self.gains.proportional * consigne;
        let d = 0.0;
        let di = (consigne - luminosity) / self.gains.integral_divisor;

        let candidate = p + self.integrator + di + d;
        let rising = di > 0.0 && candidate <= self.gains.output_max;
        let falling = di < 0.0 && candidate >= 0.0;
        if rising || falling {
            self.integrator += di;
        }

        // Must not panic on an inverted bound.
        self.drive = (p + self.integrator + d).min(self.gains.output_max).max(0.0);

        let rounded = self.drive.round() as u8;
        let write = (self.written != Some(rounded)).then_some(rounded);

        Regulation {
            drive: self.drive,
            write,
        }
    }

    /// Records that `value` reached the lamp.
    #[inline]
    pub fn mark_written(&mut self, value: u8) {
        self.written = Some(value);
    }
}
