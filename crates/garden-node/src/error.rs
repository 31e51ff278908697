use std::borrow::Cow;
use std::fmt;

/// All possible error kinds.
///
/// None of them is fatal: the node logs the error, keeps its previous
/// values and carries on with the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The light sensor returned fewer bytes than requested.
    BusReadShortfall,
    /// The climate sensor did not complete its transmission in time.
    AcquisitionTimeout,
    /// The climate frame was received but failed checksum validation.
    ChecksumMismatch,
    /// The climate sensor data line could not be driven.
    LineControl,
    /// The telemetry endpoint could not be reached or refused the record.
    TelemetryFailure,
    /// The lamp drive could not be written.
    Actuator,
    /// Invalid configuration.
    Configuration,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::BusReadShortfall => "Light sensor bus read shortfall",
            Self::AcquisitionTimeout => "Climate acquisition timeout",
            Self::ChecksumMismatch => "Climate frame checksum mismatch",
            Self::LineControl => "Climate sensor line control",
            Self::TelemetryFailure => "Telemetry failure",
            Self::Actuator => "Lamp actuator",
            Self::Configuration => "Configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.description().fmt(f)
    }
}

/// A node error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    info: Cow<'static, str>,
}

impl Error {
    /// Creates an [`Error`].
    ///
    /// Implementations of the node seams, such as
    /// [`LightSensor`](crate::controller::LightSensor), use it to report
    /// their failures with the matching [`ErrorKind`].
    #[must_use]
    pub fn new(kind: ErrorKind, info: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            info: info.into(),
        }
    }

    /// The [`ErrorKind`].
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Information about the error.
    #[must_use]
    #[inline]
    pub fn info(&self) -> &str {
        &self.info
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.info)
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Configuration, format!("Invalid JSON: {e}"))
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
