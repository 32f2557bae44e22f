use std::time::Duration;

use tokio::time::Instant;

/// What to do once a run has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Time left before the next scheduled start.
    Sleep(Duration),
    /// The next start is already due; carries how late we are.
    Overdue(Duration),
}

/// Timing of one loop iteration.
///
/// The next start is anchored to when this run began, so a slow run shortens
/// the following sleep instead of pushing the whole schedule back.
#[derive(Debug, Clone, Copy)]
pub struct RunCycle {
    scheduled_start: Instant,
    next_start: Instant,
}

impl RunCycle {
    pub fn start(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub fn starting_at(scheduled_start: Instant, interval: Duration) -> Self {
        Self {
            scheduled_start,
            next_start: scheduled_start + interval,
        }
    }

    pub fn next_start(&self) -> Instant {
        self.next_start
    }

    pub fn elapsed(&self) -> Duration {
        self.scheduled_start.elapsed()
    }

    pub fn pace(&self, now: Instant) -> Pace {
        match self.next_start.checked_duration_since(now) {
            Some(remaining) if !remaining.is_zero() => Pace::Sleep(remaining),
            _ => Pace::Overdue(now.saturating_duration_since(self.next_start)),
        }
    }
}
