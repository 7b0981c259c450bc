use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// Sliding look-back window, resolved against "now" at every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeWindow {
    seconds: i64,
}

impl TimeWindow {
    pub const fn from_seconds(seconds: i64) -> Self {
        Self { seconds }
    }

    pub const fn days(days: i64) -> Self {
        Self {
            seconds: days.saturating_mul(SECONDS_PER_DAY),
        }
    }

    pub fn seconds(self) -> i64 {
        self.seconds
    }

    /// Lower bound for the window ending at `now`.
    pub fn created_after(self, now_epoch: i64) -> i64 {
        compute_created_after(now_epoch, self)
    }

    /// Lower bound for the window ending at the current wall clock. Never cached.
    pub fn created_after_now(self) -> i64 {
        self.created_after(now_epoch_seconds())
    }

    /// Saturates at the earliest representable instant for oversized windows.
    pub fn cutoff(self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_seconds(self.seconds)
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

pub fn compute_created_after(now_epoch: i64, window: TimeWindow) -> i64 {
    now_epoch.saturating_sub(window.seconds)
}

pub fn now_epoch_seconds() -> i64 {
    Utc::now().timestamp()
}
