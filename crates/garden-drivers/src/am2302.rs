//! # AM2302 Driver
//!
//! This module provides an architecture-agnostic driver for the `AM2302`
//! (`DHT22`) temperature and humidity sensor.
//!
//! Unlike a polling driver, the bits are not sampled by busy-waiting on the
//! pin. The driver sends the start pulse, releases the line and lets an edge
//! interrupt time-tag every transition into an [`EdgeCapture`]. Each bit is
//! classified inside the interrupt handler by comparing the duration of its
//! high phase with the low phase that follows it, so the main thread only
//! has to wait for the transmission to finish and validate the checksum.
//!
//! The acquisition goes through four states:
//!
//! - **Idle**: nothing in flight
//! - **Requesting**: the line is driven low to request a measurement
//! - **Listening**: the line is released and edges are recorded for at most
//!   10 ms
//! - **Decoding**: the interrupt is disabled and the captured frame is
//!   validated
//!
//! The `AM2302` sensor provides the following measurements:
//! - **Humidity**: Relative humidity as a percentage (% RH)
//! - **Temperature**: Temperature in degrees Celsius (°C)
//!
//! For detailed specifications, refer to the
//! [datasheet](https://cdn-shop.adafruit.com/datasheets/Digital+humidity+and+temperature+sensor+AM2302.pdf).

mod capture;
mod frame;

use core::result::Result::{self, Ok};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

pub use capture::{EdgeCapture, EdgeEvent};
pub use frame::{FRAME_EDGES, Frame, FrameDecoder, FrameError, RawFrame};

// Protocol-specific timing constants.
const START_SIGNAL_LOW_MS: u32 = 2; // MCU pulls line low for more than 1 ms to request a measurement.
const LISTEN_POLL_US: u32 = 1_000; // Delay between two checks of the capture.
const LISTEN_POLLS: usize = 10; // Maximum number of checks before timeout (~10 ms).

/// A single humidity and temperature measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Relative humidity as a percentage (% RH).
    pub humidity: f32,
    /// Temperature in degrees Celsius (°C).
    pub temperature: f32,
}

/// Errors that may occur when interacting with the `AM2302` sensor.
#[derive(Debug)]
pub enum Am2302Error<E> {
    /// GPIO pin errors.
    Pin(E),
    /// The transmission did not complete within the listening window.
    Timeout {
        /// Edges observed before the window elapsed.
        edges: usize,
    },
    /// Data checksum mismatch.
    ChecksumMismatch {
        /// Transmitted checksum.
        transmitted: u8,
        /// Checksum computed from the data bytes.
        computed: u8,
    },
}

impl<E> From<E> for Am2302Error<E> {
    fn from(e: E) -> Self {
        Am2302Error::Pin(e)
    }
}

impl<E> Am2302Error<E> {
    fn from_frame(e: FrameError) -> Self {
        match e {
            FrameError::Incomplete { edges } => Am2302Error::Timeout { edges },
            FrameError::ChecksumMismatch {
                transmitted,
                computed,
            } => Am2302Error::ChecksumMismatch {
                transmitted,
                computed,
            },
        }
    }
}

/// Registration of the edge interrupt on the data line.
///
/// The platform wires the handler of the interrupt to
/// [`EdgeCapture::record`], passing a monotonic microsecond timestamp.
/// The driver only enables and disables the interrupt source.
pub trait EdgeInterrupt {
    /// Starts delivering every transition of the data line to the capture.
    fn listen(&mut self);

    /// Stops delivering transitions.
    ///
    /// When this returns, the handler is guaranteed not to run again until
    /// the next [`EdgeInterrupt::listen`].
    fn unlisten(&mut self);
}

/// Acquisition states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// No acquisition in flight.
    Idle,
    /// The start pulse is being sent.
    Requesting,
    /// Edges are being recorded.
    Listening,
    /// The captured frame is being validated.
    Decoding,
}

/// The `AM2302` driver.
pub struct Am2302<'capture, P, D, I>
where
    P: OutputPin,
    D: DelayNs,
    I: EdgeInterrupt,
{
    pin: P,
    delay: D,
    interrupt: I,
    capture: &'capture EdgeCapture,
    state: AcquisitionState,
}

impl<'capture, P, D, I> Am2302<'capture, P, D, I>
where
    P: OutputPin,
    D: DelayNs,
    I: EdgeInterrupt,
{
    /// Creates an [`Am2302`] driver.
    ///
    /// The pin must be configured as open-drain with a pull-up so that
    /// driving it high releases the line to the sensor. The `capture` must
    /// be the one the interrupt handler records into.
    #[must_use]
    pub fn new(pin: P, delay: D, interrupt: I, capture: &'capture EdgeCapture) -> Self {
        Self {
            pin,
            delay,
            interrupt,
            capture,
            state: AcquisitionState::Idle,
        }
    }

    /// Current acquisition state.
    #[must_use]
    #[inline]
    pub const fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Reads a single humidity and temperature measurement.
    ///
    /// The call blocks for at most ~12 ms. The driver is always back to
    /// [`AcquisitionState::Idle`] when it returns.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Driving the pin fails
    /// - The sensor does not complete its transmission within the window
    /// - The received data fails checksum validation
    pub fn read(&mut self) -> Result<Measurement, Am2302Error<P::Error>> {
        let result = self.acquire();
        self.state = AcquisitionState::Idle;
        result
    }

    fn acquire(&mut self) -> Result<Measurement, Am2302Error<P::Error>> {
        self.state = AcquisitionState::Requesting;
        self.send_start_signal()?;

        self.state = AcquisitionState::Listening;
        let raw = self.listen();

        self.state = AcquisitionState::Decoding;
        let frame = FrameDecoder::decode(&raw).map_err(Am2302Error::from_frame)?;

        Ok(frame.measurement())
    }

    fn send_start_signal(&mut self) -> Result<(), Am2302Error<P::Error>> {
        // Idle level first, then pull the line low to signal the sensor.
        self.pin.set_high()?;
        self.pin.set_low()?;
        self.delay.delay_ms(START_SIGNAL_LOW_MS);

        // Release the line: the sensor takes control of it.
        self.pin.set_high()?;

        Ok(())
    }

    fn listen(&mut self) -> RawFrame {
        self.capture.arm();
        self.interrupt.listen();

        for _ in 0..LISTEN_POLLS {
            if self.capture.is_complete() {
                break;
            }
            self.delay.delay_us(LISTEN_POLL_US);
        }

        // The capture must be settled before it is read.
        self.interrupt.unlisten();
        self.capture.disarm();

        self.capture.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern crate std;
    use std::vec::Vec;

    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};

    use super::frame::tests::{encode_edges, frame_bytes};

    // Replays recorded edges into the capture as soon as it is enabled.
    struct ReplayInterrupt<'a> {
        capture: &'a EdgeCapture,
        edges: Vec<u32>,
        listening: bool,
    }

    impl<'a> ReplayInterrupt<'a> {
        fn new(capture: &'a EdgeCapture, edges: &[u32]) -> Self {
            Self {
                capture,
                edges: edges.to_vec(),
                listening: false,
            }
        }
    }

    impl EdgeInterrupt for ReplayInterrupt<'_> {
        fn listen(&mut self) {
            self.listening = true;
            for timestamp in &self.edges {
                self.capture.record(*timestamp);
            }
        }

        fn unlisten(&mut self) {
            self.listening = false;
        }
    }

    fn start_signal() -> [PinTransaction; 3] {
        [
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
        ]
    }

    #[test]
    fn test_send_start_signal() {
        let capture = EdgeCapture::new();
        let pin = PinMock::new(&start_signal());
        let delay = NoopDelay::new();
        let interrupt = ReplayInterrupt::new(&capture, &[]);
        let mut am2302 = Am2302::new(pin, delay, interrupt, &capture);

        am2302.send_start_signal().unwrap();

        am2302.pin.done();
    }

    #[test]
    fn test_read_valid_frame() {
        let capture = EdgeCapture::new();
        let edges = encode_edges([0x02, 0x58, 0x00, 0xC8, 0x22], 7_000);
        let pin = PinMock::new(&start_signal());
        let delay = NoopDelay::new();
        let interrupt = ReplayInterrupt::new(&capture, &edges);
        let mut am2302 = Am2302::new(pin, delay, interrupt, &capture);

        let measurement = am2302.read().unwrap();

        assert!((measurement.humidity - 60.0).abs() < f32::EPSILON);
        assert!((measurement.temperature - 20.0).abs() < f32::EPSILON);
        assert_eq!(am2302.state(), AcquisitionState::Idle);
        assert!(!am2302.interrupt.listening);
        assert!(!capture.is_armed());

        am2302.pin.done();
    }

    #[test]
    fn test_read_negative_temperature() {
        let capture = EdgeCapture::new();
        let edges = encode_edges(frame_bytes(0x01F4, 0x8065), 0);
        let pin = PinMock::new(&start_signal());
        let delay = NoopDelay::new();
        let interrupt = ReplayInterrupt::new(&capture, &edges);
        let mut am2302 = Am2302::new(pin, delay, interrupt, &capture);

        let measurement = am2302.read().unwrap();

        assert!((measurement.humidity - 50.0).abs() < f32::EPSILON);
        assert!((measurement.temperature + 10.1).abs() < 1e-5);

        am2302.pin.done();
    }

    #[test]
    fn test_read_timeout() {
        let capture = EdgeCapture::new();
        let edges = encode_edges(frame_bytes(0x0258, 0x00C8), 0);
        let pin = PinMock::new(&start_signal());
        let delay = NoopDelay::new();
        let interrupt = ReplayInterrupt::new(&capture, &edges[..41]);
        let mut am2302 = Am2302::new(pin, delay, interrupt, &capture);

        let result = am2302.read();

        assert!(matches!(result, Err(Am2302Error::Timeout { edges: 41 })));
        assert_eq!(am2302.state(), AcquisitionState::Idle);

        am2302.pin.done();
    }

    #[test]
    fn test_read_without_answer() {
        let capture = EdgeCapture::new();
        let pin = PinMock::new(&start_signal());
        let delay = NoopDelay::new();
        let interrupt = ReplayInterrupt::new(&capture, &[]);
        let mut am2302 = Am2302::new(pin, delay, interrupt, &capture);

        let result = am2302.read();

        assert!(matches!(result, Err(Am2302Error::Timeout { edges: 0 })));

        am2302.pin.done();
    }

    #[test]
    fn test_read_checksum_mismatch() {
        let capture = EdgeCapture::new();
        let edges = encode_edges([0x02, 0x58, 0x00, 0xC8, 0x21], 0);
        let pin = PinMock::new(&start_signal());
        let delay = NoopDelay::new();
        let interrupt = ReplayInterrupt::new(&capture, &edges);
        let mut am2302 = Am2302::new(pin, delay, interrupt, &capture);

        let result = am2302.read();

        assert!(matches!(
            result,
            Err(Am2302Error::ChecksumMismatch {
                transmitted: 0x21,
                computed: 0x22,
            })
        ));
        assert_eq!(am2302.state(), AcquisitionState::Idle);

        am2302.pin.done();
    }

    #[test]
    fn test_consecutive_reads_reuse_capture() {
        let capture = EdgeCapture::new();
        let first = encode_edges(frame_bytes(0x0258, 0x00C8), 0);
        let expectations = [start_signal(), start_signal()].concat();
        let pin = PinMock::new(&expectations);
        let delay = NoopDelay::new();
        let interrupt = ReplayInterrupt::new(&capture, &first);
        let mut am2302 = Am2302::new(pin, delay, interrupt, &capture);

        let a = am2302.read().unwrap();
        let b = am2302.read().unwrap();

        assert_eq!(a, b);

        am2302.pin.done();
    }
}
