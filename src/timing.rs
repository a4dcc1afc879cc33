//! Wall-clock source and quiz deadline checks. Timeouts are detected lazily
//! at submission; nothing sweeps abandoned attempts.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

/// Extra time allowed past a quiz's nominal limit.
pub const GRACE_MINUTES: i64 = 1;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - started_at).num_seconds().max(0)
}

/// `true` once more than `time_limit_minutes + GRACE_MINUTES` have passed,
/// measured to the millisecond. A limit of 0 (or less) never expires.
pub fn is_past_deadline(
    time_limit_minutes: i32,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    if time_limit_minutes <= 0 {
        return false;
    }
    let allowed_ms = (i64::from(time_limit_minutes) + GRACE_MINUTES) * 60_000;
    (now - started_at).num_milliseconds() > allowed_ms
}
