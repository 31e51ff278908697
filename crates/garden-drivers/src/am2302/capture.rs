use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, AtomicUsize, Ordering, fence};

use super::frame::{EdgeStep, FRAME_EDGES, Field, RawFrame};

/// A single electrical transition on the data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    /// Position of the edge in the transmission.
    ///
    /// Even indices close a high phase, odd indices close a low phase.
    pub index: usize,
    /// Hardware timestamp in microseconds.
    pub timestamp_us: u32,
}

/// Time-tagging of the edges of one transmission.
///
/// [`EdgeCapture::record`] is meant to be called from the edge interrupt
/// handler: it does a bounded, constant amount of work, never allocates and
/// never blocks. The acquiring side reads the capture only after the
/// interrupt source has been disabled and [`EdgeCapture::disarm`] has been
/// called.
///
/// A capture has a single producer (the interrupt handler) and a single
/// consumer (the acquisition), so every field is an atomic and the edge
/// counter is published with release ordering.
#[derive(Debug)]
pub struct EdgeCapture {
    armed: AtomicBool,
    len: AtomicUsize,
    last_us: AtomicU32,
    high_us: AtomicU32,
    humidity: AtomicU16,
    temperature: AtomicU16,
    checksum: AtomicU8,
    timestamps: [AtomicU32; FRAME_EDGES],
}

impl Default for EdgeCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeCapture {
    /// Creates a disarmed [`EdgeCapture`].
    ///
    /// The constructor is `const` so a capture can live in a `static` shared
    /// with the interrupt handler.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            len: AtomicUsize::new(0),
            last_us: AtomicU32::new(0),
            high_us: AtomicU32::new(0),
            humidity: AtomicU16::new(0),
            temperature: AtomicU16::new(0),
            checksum: AtomicU8::new(0),
            timestamps: [const { AtomicU32::new(0) }; FRAME_EDGES],
        }
    }

    /// Resets the edge counter and the accumulators, then starts recording.
    pub fn arm(&self) {
        self.len.store(0, Ordering::Relaxed);
        self.last_us.store(0, Ordering::Relaxed);
        self.high_us.store(0, Ordering::Relaxed);
        self.humidity.store(0, Ordering::Relaxed);
        self.temperature.store(0, Ordering::Relaxed);
        self.checksum.store(0, Ordering::Relaxed);
        self.armed.store(true, Ordering::Release);
    }

    /// Stops recording.
    ///
    /// Edges delivered after this call are dropped.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
        fence(Ordering::SeqCst);
    }

    /// Whether the capture is recording.
    #[must_use]
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Records one edge observed at `timestamp_us`.
    ///
    /// This is the interrupt handler body.
    pub fn record(&self, timestamp_us: u32) {
        if !self.armed.load(Ordering::Acquire) {
            return;
        }

        let index = self.len.load(Ordering::Relaxed);
        if index >= FRAME_EDGES {
            return;
        }

        let delta = timestamp_us.wrapping_sub(self.last_us.load(Ordering::Relaxed));
        self.last_us.store(timestamp_us, Ordering::Relaxed);
        self.timestamps[index].store(timestamp_us, Ordering::Relaxed);

        match EdgeStep::classify(index, delta, self.high_us.load(Ordering::Relaxed)) {
            EdgeStep::High(duration) => self.high_us.store(duration, Ordering::Relaxed),
            EdgeStep::Bit(field, bit) => self.push(field, bit),
            EdgeStep::Skip => {}
        }

        self.len.store(index + 1, Ordering::Release);
    }

    /// Number of edges recorded so far.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Whether no edge has been recorded.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a whole transmission has been recorded.
    #[must_use]
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.len() >= FRAME_EDGES
    }

    /// The edges recorded so far, at most [`FRAME_EDGES`].
    pub fn events(&self) -> impl Iterator<Item = EdgeEvent> + '_ {
        let len = self.len();
        self.timestamps[..len]
            .iter()
            .enumerate()
            .map(|(index, timestamp)| EdgeEvent {
                index,
                timestamp_us: timestamp.load(Ordering::Relaxed),
            })
    }

    /// Returns the accumulated bits.
    ///
    /// Must be called after the interrupt source has been disabled and the
    /// capture disarmed.
    #[must_use]
    pub fn snapshot(&self) -> RawFrame {
        let edges = self.len.load(Ordering::Acquire);
        RawFrame {
            edges,
            humidity: self.humidity.load(Ordering::Relaxed),
            temperature: self.temperature.load(Ordering::Relaxed),
            checksum: self.checksum.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn push(&self, field: Field, bit: u8) {
        match field {
            Field::Humidity => {
                let value = self.humidity.load(Ordering::Relaxed);
                self.humidity
                    .store((value << 1) | u16::from(bit), Ordering::Relaxed);
            }
            Field::Temperature => {
                let value = self.temperature.load(Ordering::Relaxed);
                self.temperature
                    .store((value << 1) | u16::from(bit), Ordering::Relaxed);
            }
            Field::Checksum => {
                let value = self.checksum.load(Ordering::Relaxed);
                self.checksum.store((value << 1) | bit, Ordering::Relaxed);
            }
        }
    }
}
