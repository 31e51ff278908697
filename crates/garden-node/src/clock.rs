use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A source of wall-clock time.
pub trait WallClock {
    /// The current date and time.
    fn now(&self) -> OffsetDateTime;
}

/// The host clock, in the local time zone.
///
/// Falls back to UTC when the local offset cannot be determined.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl WallClock for LocalClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
    }
}

/// Fractional hour of the day, in `[0, 24)`.
#[must_use]
pub fn hour_of_day(datetime: &OffsetDateTime) -> f32 {
    let seconds = u32::from(datetime.hour()) * 3600
        + u32::from(datetime.minute()) * 60
        + u32::from(datetime.second());
    seconds as f32 / 3600.0
}

/// Formats a timestamp as RFC 3339.
#[must_use]
pub fn timestamp(datetime: &OffsetDateTime) -> String {
    datetime.format(&Rfc3339).unwrap_or_default()
}
