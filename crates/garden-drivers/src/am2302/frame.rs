use core::result::Result::{self, Err, Ok};

use super::Measurement;

/// Number of edges making up a complete transmission.
///
/// The sensor answers the start pulse with a low/high handshake, then sends
/// 40 bits, each one as a low phase followed by a high phase, and finally
/// releases the line.
pub const FRAME_EDGES: usize = 84;

/// The portion of the frame an odd-indexed edge contributes a bit to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Humidity,
    Temperature,
    Checksum,
}

impl Field {
    // Only odd indices carry a bit: the edge closing the low phase that
    // follows the high phase being measured.
    #[inline]
    pub(crate) const fn at(index: usize) -> Option<Self> {
        if index % 2 == 0 {
            return None;
        }
        match index {
            5..=35 => Some(Self::Humidity),
            37..=67 => Some(Self::Temperature),
            69..=83 => Some(Self::Checksum),
            _ => None,
        }
    }
}

// A long high phase (~70 µs) against the following ~50 µs low phase is a 1,
// a short one (~26 µs) is a 0.
#[inline]
const fn bit_value(high_us: u32, low_us: u32) -> u8 {
    if high_us > low_us { 1 } else { 0 }
}

/// What a single edge contributes to the frame.
///
/// Shared by the interrupt-side capture and the offline decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeStep {
    /// An even edge closing a high phase of the given duration.
    High(u32),
    /// An odd edge inside a field, carrying one bit.
    Bit(Field, u8),
    /// An odd edge of the start sequence.
    Skip,
}

impl EdgeStep {
    /// Classifies the edge at `index`, observed `delta_us` after the
    /// previous one, given the duration of the last high phase.
    #[inline]
    pub(crate) const fn classify(index: usize, delta_us: u32, high_us: u32) -> Self {
        if index % 2 == 0 {
            return Self::High(delta_us);
        }
        match Field::at(index) {
            Some(field) => Self::Bit(field, bit_value(high_us, delta_us)),
            None => Self::Skip,
        }
    }
}

/// Bit accumulators filled while the edges of a transmission are observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFrame {
    /// Number of edges observed.
    pub edges: usize,
    /// Humidity bits, MSB first.
    pub humidity: u16,
    /// Temperature bits, MSB first.
    pub temperature: u16,
    /// Checksum bits, MSB first.
    pub checksum: u8,
}

impl RawFrame {
    #[inline]
    pub(crate) fn push(&mut self, field: Field, bit: u8) {
        match field {
            Field::Humidity => self.humidity = (self.humidity << 1) | u16::from(bit),
            Field::Temperature => self.temperature = (self.temperature << 1) | u16::from(bit),
            Field::Checksum => self.checksum = (self.checksum << 1) | bit,
        }
    }
}

/// A validated 40-bit frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Relative humidity in tenths of a percent.
    pub humidity: u16,
    /// Temperature: bit 15 is the sign, the rest tenths of a degree Celsius.
    pub temperature: u16,
    /// The transmitted checksum.
    pub checksum: u8,
}

impl Frame {
    /// Computes the checksum of the four data bytes.
    ///
    /// The checksum is the low 8 bits of the sum of the two humidity bytes
    /// and the two temperature bytes.
    #[must_use]
    pub const fn compute_checksum(humidity: u16, temperature: u16) -> u8 {
        let [hh, hl] = humidity.to_be_bytes();
        let [th, tl] = temperature.to_be_bytes();
        hh.wrapping_add(hl).wrapping_add(th).wrapping_add(tl)
    }

    /// Relative humidity as a percentage (% RH).
    #[must_use]
    #[inline]
    pub fn humidity_percent(&self) -> f32 {
        f32::from(self.humidity) / 10.0
    }

    /// Temperature in degrees Celsius (°C).
    #[must_use]
    #[inline]
    pub fn temperature_celsius(&self) -> f32 {
        let magnitude = f32::from(self.temperature & 0x7FFF) / 10.0;
        if self.temperature & 0x8000 != 0 {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Converts the frame into a [`Measurement`].
    #[must_use]
    #[inline]
    pub fn measurement(&self) -> Measurement {
        Measurement {
            humidity: self.humidity_percent(),
            temperature: self.temperature_celsius(),
        }
    }
}

/// Reasons a transmission cannot be turned into a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer than [`FRAME_EDGES`] edges were observed.
    Incomplete {
        /// Edges observed.
        edges: usize,
    },
    /// The transmitted checksum does not match the data bytes.
    ChecksumMismatch {
        /// Transmitted checksum.
        transmitted: u8,
        /// Checksum computed from the data bytes.
        computed: u8,
    },
}

/// Reconstructs frames from edge timings.
pub struct FrameDecoder;

impl FrameDecoder {
    /// Classifies a sequence of edge timestamps (µs) into bit accumulators.
    ///
    /// Edges beyond [`FRAME_EDGES`] are ignored. Timestamps may wrap.
    #[must_use]
    pub fn accumulate(timestamps: &[u32]) -> RawFrame {
        let mut raw = RawFrame::default();
        let mut last = 0u32;
        let mut high = 0u32;

        for (index, &now) in timestamps.iter().take(FRAME_EDGES).enumerate() {
            let delta = now.wrapping_sub(last);
            last = now;
            match EdgeStep::classify(index, delta, high) {
                EdgeStep::High(duration) => high = duration,
                EdgeStep::Bit(field, bit) => raw.push(field, bit),
                EdgeStep::Skip => {}
            }
            raw.edges = index + 1;
        }

        raw
    }

    /// Validates accumulated bits and returns the [`Frame`] they encode.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Incomplete`] when the transmission was cut
    /// short and [`FrameError::ChecksumMismatch`] when the checksum does not
    /// match. No correction is attempted.
    pub fn decode(raw: &RawFrame) -> Result<Frame, FrameError> {
        if raw.edges < FRAME_EDGES {
            return Err(FrameError::Incomplete { edges: raw.edges });
        }

        let computed = Frame::compute_checksum(raw.humidity, raw.temperature);
        if computed != raw.checksum {
            return Err(FrameError::ChecksumMismatch {
                transmitted: raw.checksum,
                computed,
            });
        }

        Ok(Frame {
            humidity: raw.humidity,
            temperature: raw.temperature,
            checksum: raw.checksum,
        })
    }

    /// Decodes a frame directly from edge timestamps (µs).
    ///
    /// # Errors
    ///
    /// See [`FrameDecoder::decode`].
    pub fn decode_edges(timestamps: &[u32]) -> Result<Frame, FrameError> {
        Self::decode(&Self::accumulate(timestamps))
    }
}
