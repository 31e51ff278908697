use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use garden_drivers::am2302::{Am2302, Am2302Error, EdgeInterrupt, Measurement};

use tracing::{debug, warn};

use crate::error::{Error, ErrorKind, Result};

/// A source of humidity and temperature measurements.
pub trait ClimateSensor {
    /// Runs one blocking acquisition.
    ///
    /// # Errors
    ///
    /// Any error is local to this acquisition.
    fn acquire(&mut self) -> Result<Measurement>;
}

impl<P, D, I> ClimateSensor for Am2302<'_, P, D, I>
where
    P: OutputPin,
    D: DelayNs,
    I: EdgeInterrupt,
{
    fn acquire(&mut self) -> Result<Measurement> {
        self.read().map_err(|e| match e {
            Am2302Error::Pin(e) => Error::new(
                ErrorKind::LineControl,
                format!("Unable to drive the data line: {e:?}"),
            ),
            Am2302Error::Timeout { edges } => Error::new(
                ErrorKind::AcquisitionTimeout,
                format!("Only {edges} edges received"),
            ),
            Am2302Error::ChecksumMismatch {
                transmitted,
                computed,
            } => Error::new(
                ErrorKind::ChecksumMismatch,
                format!("Transmitted {transmitted:#04x}, computed {computed:#04x}"),
            ),
        })
    }
}

/// Outcome of an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingStatus {
    /// The frame was received and validated.
    Valid,
    /// The transmission did not complete in time.
    Timeout,
    /// The frame failed checksum validation.
    ChecksumMismatch,
    /// The data line could not be driven.
    LineFault,
}

/// The result of one acquisition cycle.
///
/// A measurement is only present when the status is
/// [`ReadingStatus::Valid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Acquisition outcome.
    pub status: ReadingStatus,
    /// Measurement obtained in this cycle.
    pub measurement: Option<Measurement>,
}

impl SensorReading {
    fn from_result(result: Result<Measurement>) -> Self {
        match result {
            Ok(measurement) => Self {
                status: ReadingStatus::Valid,
                measurement: Some(measurement),
            },
            Err(e) => {
                let status = match e.kind() {
                    ErrorKind::ChecksumMismatch => ReadingStatus::ChecksumMismatch,
                    ErrorKind::LineControl => ReadingStatus::LineFault,
                    _ => ReadingStatus::Timeout,
                };
                warn!("Climate acquisition failed, keeping previous values: {e}");
                Self {
                    status,
                    measurement: None,
                }
            }
        }
    }
}

/// Humidity and temperature bookkeeping.
///
/// The latest valid measurement is only replaced by another valid one.
pub struct Climate<A>
where
    A: ClimateSensor,
{
    sensor: A,
    latest: Option<Measurement>,
    last_reading: Option<SensorReading>,
}

impl<A> Climate<A>
where
    A: ClimateSensor,
{
    /// Creates a [`Climate`] without any measurement.
    #[must_use]
    #[inline]
    pub const fn new(sensor: A) -> Self {
        Self {
            sensor,
            latest: None,
            last_reading: None,
        }
    }

    /// Runs one acquisition and returns its outcome.
    pub fn measure(&mut self) -> SensorReading {
        let reading = SensorReading::from_result(self.sensor.acquire());

        if let Some(measurement) = reading.measurement {
            debug!(
                humidity = measurement.humidity,
                temperature = measurement.temperature,
                "Climate measured"
            );
            self.latest = Some(measurement);
        }
        self.last_reading = Some(reading);

        reading
    }

    /// The latest valid measurement.
    #[must_use]
    #[inline]
    pub const fn latest(&self) -> Option<Measurement> {
        self.latest
    }

    /// The outcome of the last acquisition.
    #[must_use]
    #[inline]
    pub const fn last_reading(&self) -> Option<SensorReading> {
        self.last_reading
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::collections::VecDeque;

    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};

    use garden_drivers::am2302::{EdgeCapture, FRAME_EDGES};

    pub(crate) struct ScriptedSensor(pub(crate) VecDeque<Result<Measurement>>);

    impl ClimateSensor for ScriptedSensor {
        fn acquire(&mut self) -> Result<Measurement> {
            self.0
                .pop_front()
                .unwrap_or_else(|| Err(Error::new(ErrorKind::AcquisitionTimeout, "No script")))
        }
    }

    pub(crate) const FIRST: Measurement = Measurement {
        humidity: 60.0,
        temperature: 20.0,
    };

    const SECOND: Measurement = Measurement {
        humidity: 55.5,
        temperature: -3.2,
    };

    fn scripted(results: impl IntoIterator<Item = Result<Measurement>>) -> Climate<ScriptedSensor> {
        Climate::new(ScriptedSensor(results.into_iter().collect()))
    }

    #[test]
    fn test_valid_reading_replaces_latest() {
        let mut climate = scripted([Ok(FIRST), Ok(SECOND)]);

        let reading = climate.measure();
        assert_eq!(reading.status, ReadingStatus::Valid);
        assert_eq!(climate.latest(), Some(FIRST));

        let _ = climate.measure();
        assert_eq!(climate.latest(), Some(SECOND));
    }

    #[test]
    fn test_checksum_mismatch_keeps_previous_values() {
        let mut climate = scripted([
            Ok(FIRST),
            Err(Error::new(ErrorKind::ChecksumMismatch, "bad frame")),
        ]);

        let _ = climate.measure();
        let reading = climate.measure();

        assert_eq!(reading.status, ReadingStatus::ChecksumMismatch);
        assert_eq!(reading.measurement, None);
        assert_eq!(climate.latest(), Some(FIRST));
        assert_eq!(climate.last_reading(), Some(reading));
    }

    #[test]
    fn test_timeout_keeps_previous_values() {
        let mut climate = scripted([
            Ok(FIRST),
            Err(Error::new(ErrorKind::AcquisitionTimeout, "41 edges")),
        ]);

        let _ = climate.measure();
        let reading = climate.measure();

        assert_eq!(reading.status, ReadingStatus::Timeout);
        assert_eq!(climate.latest(), Some(FIRST));
    }

    #[test]
    fn test_no_value_before_first_valid_reading() {
        let mut climate = scripted([Err(Error::new(ErrorKind::LineControl, "pin"))]);

        let reading = climate.measure();

        assert_eq!(reading.status, ReadingStatus::LineFault);
        assert_eq!(climate.latest(), None);
    }

    struct Silent;

    impl EdgeInterrupt for Silent {
        fn listen(&mut self) {}
        fn unlisten(&mut self) {}
    }

    #[test]
    fn test_am2302_timeout_maps_to_error_kind() {
        let capture = EdgeCapture::new();
        let expectations = [
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
        ];
        let pin = PinMock::new(&expectations);
        let mut am2302 = Am2302::new(pin.clone(), NoopDelay::new(), Silent, &capture);

        let err = ClimateSensor::acquire(&mut am2302).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AcquisitionTimeout);
        assert!(capture.len() < FRAME_EDGES);

        let mut pin = pin;
        pin.done();
    }
}
