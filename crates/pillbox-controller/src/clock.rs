//! Time sources.
//!
//! The controller reads two clocks: a monotonic one driving the settle
//! timers and a local wall clock stamping log entries. Both come from a
//! [`Clock`] so simulations and tests can step time by hand.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime, TimeDelta};

pub trait Clock: Send + Sync {
    /// Monotonic time, for timers.
    fn now(&self) -> Instant;

    /// Local wall-clock time, for log entries.
    fn local_now(&self) -> NaiveDateTime;
}

/// The real clocks of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use chrono::NaiveDate;
/// use pillbox_controller::{Clock, ManualClock};
///
/// let start = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let clock = ManualClock::new(start);
/// let t0 = clock.now();
///
/// clock.advance(Duration::from_secs(90));
/// assert_eq!(clock.now() - t0, Duration::from_secs(90));
/// assert_eq!(clock.local_now().to_string(), "2025-03-14 09:01:30");
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualTime>>,
}

#[derive(Debug)]
struct ManualTime {
    monotonic: Instant,
    wall: NaiveDateTime,
}

impl ManualClock {
    /// Start at wall-clock time `start`.
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualTime {
                monotonic: Instant::now(),
                wall: start,
            })),
        }
    }

    /// Move both clocks forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut time = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        time.monotonic += step;

        if let Ok(delta) = TimeDelta::from_std(step)
            && let Some(wall) = time.wall.checked_add_signed(delta)
        {
            time.wall = wall;
        }
    }

    /// Move the wall clock to `wall` without touching monotonic time, as an
    /// NTP correction would.
    pub fn set_local(&self, wall: NaiveDateTime) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .wall = wall;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .monotonic
    }

    fn local_now(&self) -> NaiveDateTime {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .wall
    }
}
