//! Time sources, interruptible sleeping and timezone resolution.
//!
//! Everything that reads the wall clock or blocks on a timer goes through
//! [`Clock`] and [`Sleeper`] so the daemon loop, the retry backoff and the
//! emergency wait can be driven deterministically in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::error::ConfigError;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
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

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock() = instant;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

/// Shared cancellation flag, set by SIGINT/SIGTERM handlers or by tests.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The raw flag, for `signal_hook::flag::register`.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Returned when a sleep was cut short by a stop signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

/// Blocking wait that can be interrupted.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted>;
}

/// Sleeps on the current thread in short slices, checking the stop signal.
#[derive(Debug, Clone, Default)]
pub struct ThreadSleeper {
    stop: StopSignal,
}

const SLICE: Duration = Duration::from_millis(200);

impl ThreadSleeper {
    pub fn new(stop: StopSignal) -> Self {
        Self { stop }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.stop.is_stopped() {
                return Err(Interrupted);
            }
            let step = remaining.min(SLICE);
            std::thread::sleep(step);
            remaining -= step;
        }
        if self.stop.is_stopped() {
            return Err(Interrupted);
        }
        Ok(())
    }
}

/// Effective timezone used to compute the day key and the time-of-day gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// The zone of the machine running the process.
    Local,
    /// An explicit IANA zone from configuration.
    Named(Tz),
}

impl Zone {
    /// Resolve the configured zone name; `None` or blank means the local zone.
    pub fn parse(name: Option<&str>) -> Result<Self, ConfigError> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => Ok(Zone::Local),
            Some(name) => name
                .parse::<Tz>()
                .map(Zone::Named)
                .map_err(|e| ConfigError::InvalidValue {
                    key: "timezone".into(),
                    message: e.to_string(),
                }),
        }
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Zone::Local => instant.with_timezone(&chrono::Local).date_naive(),
            Zone::Named(tz) => instant.with_timezone(tz).date_naive(),
        }
    }

    pub fn time_of(&self, instant: DateTime<Utc>) -> NaiveTime {
        match self {
            Zone::Local => instant.with_timezone(&chrono::Local).time(),
            Zone::Named(tz) => instant.with_timezone(tz).time(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Zone::Local => "local".to_string(),
            Zone::Named(tz) => tz.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_blank_is_local() {
        assert_eq!(Zone::parse(None).unwrap(), Zone::Local);
        assert_eq!(Zone::parse(Some("  ")).unwrap(), Zone::Local);
    }

    #[test]
    fn parse_rejects_unknown_zone() {
        assert!(matches!(
            Zone::parse(Some("Mars/Olympus_Mons")),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn named_zone_shifts_the_date() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 10, 3, 30, 0).unwrap();
        let la = Zone::parse(Some("America/Los_Angeles")).unwrap();
        let tokyo = Zone::parse(Some("Asia/Tokyo")).unwrap();
        assert_eq!(la.date_of(instant), NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
        assert_eq!(tokyo.date_of(instant), NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        assert_eq!(la.label(), "America/Los_Angeles");
    }

    #[test]
    fn thread_sleeper_returns_early_when_stopped() {
        let stop = StopSignal::new();
        stop.stop();
        let sleeper = ThreadSleeper::new(stop);
        assert_eq!(sleeper.sleep(Duration::from_secs(3600)), Err(Interrupted));
    }
}
