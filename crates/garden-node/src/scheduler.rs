use std::time::Duration;

use tokio::time::{Instant, sleep_until};

use tokio_util::sync::CancellationToken;

use tracing::{info, warn};

/// Period of a tick, in milliseconds.
pub const TICK_PERIOD_MS: u64 = 250;
/// Number of phases in a cycle.
pub const PHASES: u64 = 4;

const REPORT_PERIOD_MS: u64 = 5_000;
const ACQUIRE_PERIOD_MS: u64 = 2_000;
const ACQUIRE_OFFSET_MS: u64 = 500;
const STATUS_PERIOD_MS: u64 = 60_000;
const STATUS_OFFSET_MS: u64 = 750;

/// Phase of a tick within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Telemetry may be sent.
    Report,
    /// Regulation only.
    Regulate,
    /// The climate sensor may be acquired.
    Acquire,
    /// The status line may be logged.
    Status,
}

impl Phase {
    const fn from_tick(tick: u64) -> Self {
        match tick % PHASES {
            0 => Self::Report,
            1 => Self::Regulate,
            2 => Self::Acquire,
            _ => Self::Status,
        }
    }
}

/// The work due at a tick.
///
/// Regulation runs on every tick. The other activities only run on their
/// phase, at their own cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Milliseconds elapsed since start.
    pub elapsed_ms: u64,
    /// Tick index.
    pub tick: u64,
    /// Phase of the tick.
    pub phase: Phase,
    /// A telemetry record is due.
    pub report: bool,
    /// A climate acquisition is due.
    pub acquire: bool,
    /// A status line is due.
    pub status: bool,
}

impl Slot {
    /// Computes the slot for a given elapsed time.
    #[must_use]
    pub const fn at(elapsed_ms: u64) -> Self {
        let tick = elapsed_ms / TICK_PERIOD_MS;
        let phase = Phase::from_tick(tick);

        Self {
            elapsed_ms,
            tick,
            phase,
            report: matches!(phase, Phase::Report) && elapsed_ms % REPORT_PERIOD_MS == 0,
            acquire: matches!(phase, Phase::Acquire)
                && elapsed_ms % ACQUIRE_PERIOD_MS == ACQUIRE_OFFSET_MS,
            status: matches!(phase, Phase::Status)
                && elapsed_ms % STATUS_PERIOD_MS == STATUS_OFFSET_MS,
        }
    }
}

/// Work run on every tick.
pub trait Tick {
    /// Runs the work due at `slot`.
    fn tick(&mut self, slot: Slot) -> impl Future<Output = ()>;
}

/// Fixed-period tick scheduler.
///
/// Ticks are aligned on multiples of [`TICK_PERIOD_MS`] from the start of
/// [`Scheduler::run`]. When a tick overruns, the missed slots are skipped
/// instead of being run in a burst.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    period: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates a [`Scheduler`].
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            period: Duration::from_millis(TICK_PERIOD_MS),
        }
    }

    /// Runs `target` until `shutdown` is cancelled.
    pub async fn run<T>(&self, target: &mut T, shutdown: &CancellationToken)
    where
        T: Tick,
    {
        let start = Instant::now();
        let mut tick: u64 = 0;

        info!("Scheduler started");

        loop {
            let elapsed_ms = tick * TICK_PERIOD_MS;
            target.tick(Slot::at(elapsed_ms)).await;

            let done = start.elapsed().as_millis() as u64;
            let mut next = tick + 1;
            if done > next * TICK_PERIOD_MS {
                let resume = done / TICK_PERIOD_MS + 1;
                warn!("Tick {tick} overran, skipping {} slots", resume - next);
                next = resume;
            }
            tick = next;

            let deadline = start + self.period * (tick as u32);
            tokio::select! {
                () = shutdown.cancelled() => { break; }
                () = sleep_until(deadline) => {}
            }
        }

        info!("Scheduler stopped after {tick} ticks");
    }
}
