//! Durable daily block state.
//!
//! There is exactly one authoritative [`DailyState`] per calendar day in the
//! effective timezone. A store resolves the day on every `load()`: when the
//! stored date differs from today, the state is replaced by a fresh day and
//! written back before anything else sees it.
//!
//! ## Backends
//!
//! - [`LocalStateStore`]: JSON file, atomic rename-on-write
//! - [`RemoteStateStore`]: same JSON on a remote host, reached over
//!   [`crate::transport::RetryingTransport`] under a remote `flock`
//!
//! Callers hold a `dyn StateStore` and never know which one is active.

mod local;
mod remote;

pub use local::LocalStateStore;
pub use remote::RemoteStateStore;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::storage::UnlockSettings;

/// The per-day block state persisted as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyState {
    pub date: NaiveDate,
    #[serde(default = "default_blocked")]
    pub blocked: bool,
    #[serde(default, with = "timestamp")]
    pub unlock_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unlocked_via_conditions_today: bool,
    #[serde(default)]
    pub emergency_count: u32,
    /// Seconds the next emergency unlock must wait.
    #[serde(default)]
    pub emergency_next_wait: u64,
    #[serde(default, with = "timestamp")]
    pub last_check_at: Option<DateTime<Utc>>,
    /// Zone the day key was computed under. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Blocked flag of the last blocklist the enforcement point accepted.
    /// `None` until a push succeeds on this day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforced_blocked: Option<bool>,
}

fn default_blocked() -> bool {
    true
}

impl DailyState {
    /// Whether an unlock is in effect at `now`.
    pub fn is_unlocked_at(&self, now: DateTime<Utc>) -> bool {
        !self.blocked && self.unlock_expires_at.is_some_and(|t| now < t)
    }

    /// The enforcement point may be serving a different list than this state calls for.
    pub fn needs_push(&self) -> bool {
        self.enforced_blocked != Some(self.blocked)
    }

    /// Whole seconds of unlock left at `now`.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        match self.unlock_expires_at {
            Some(t) if !self.blocked => (t - now).num_seconds().max(0),
            _ => 0,
        }
    }
}

/// Day-zero values, derived from the unlock settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayDefaults {
    pub initial_wait: u64,
    pub wait_multiplier: u32,
}

impl DayDefaults {
    pub fn from_settings(settings: &UnlockSettings) -> Self {
        Self {
            initial_wait: settings.emergency_initial_wait,
            wait_multiplier: settings.emergency_wait_multiplier,
        }
    }

    /// A brand-new day: blocked, nothing used.
    pub fn fresh(&self, date: NaiveDate, zone_label: &str) -> DailyState {
        DailyState {
            date,
            blocked: true,
            unlock_expires_at: None,
            unlocked_via_conditions_today: false,
            emergency_count: 0,
            emergency_next_wait: self.initial_wait,
            last_check_at: None,
            timezone: Some(zone_label.to_string()),
            enforced_blocked: None,
        }
    }

    /// Wait owed after `count` emergency unlocks.
    pub fn wait_after(&self, count: u32) -> u64 {
        (0..count).fold(self.initial_wait, |wait, _| {
            wait.saturating_mul(u64::from(self.wait_multiplier))
        })
    }
}

impl Default for DayDefaults {
    fn default() -> Self {
        Self::from_settings(&UnlockSettings::default())
    }
}

/// Durable state with day-rollover resolution on load.
pub trait StateStore: Send + Sync {
    /// Today's state; rolls over (and persists) if the stored day is stale.
    fn load(&self) -> Result<DailyState, StateError>;

    /// Persist atomically.
    fn save(&self, state: &DailyState) -> Result<(), StateError>;

    /// Human-readable location, for status output and logs.
    fn describe(&self) -> String;
}

/// State as seen by an observer, after eager expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub state: DailyState,
    /// The unlock ran out and this observation re-blocked it.
    pub expired: bool,
    /// The re-block also reached the enforcement point.
    pub pushed: bool,
}

/// Load, apply expiry, and persist the re-block before returning.
pub fn observe(store: &dyn StateStore, now: DateTime<Utc>) -> Result<Observation, StateError> {
    let loaded = store.load()?;
    let state = crate::unlock::reconcile_expiry(&loaded, now);
    let expired = state != loaded;
    if expired {
        tracing::info!(
            expired_at = ?loaded.unlock_expires_at,
            store = %store.describe(),
            "unlock expired; re-blocking"
        );
        store.save(&state)?;
    }
    Ok(Observation {
        state,
        expired,
        pushed: false,
    })
}

/// How a raw stored document was turned into today's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Stored state is today's; nothing to write.
    Current,
    /// No state stored yet.
    Created,
    /// Stored state belongs to another day.
    RolledOver,
    /// Stored state could not be parsed and was discarded.
    Corrupt,
}

impl Resolution {
    pub(crate) fn needs_save(self) -> bool {
        self != Resolution::Current
    }
}

/// Turn the raw stored document into today's state.
pub(crate) fn resolve(
    raw: Option<&str>,
    today: NaiveDate,
    zone_label: &str,
    defaults: &DayDefaults,
    source: &str,
) -> (DailyState, Resolution) {
    let raw = match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => raw,
        None => return (defaults.fresh(today, zone_label), Resolution::Created),
    };

    let mut state: DailyState = match serde_json::from_str(raw) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(
                source,
                error = %e,
                "state is corrupt; starting a fresh day and discarding today's unlock and emergency history"
            );
            return (defaults.fresh(today, zone_label), Resolution::Corrupt);
        }
    };

    if state.date != today {
        tracing::info!(source, from = %state.date, to = %today, zone = zone_label, "day rollover");
        return (defaults.fresh(today, zone_label), Resolution::RolledOver);
    }

    if state.emergency_next_wait == 0 {
        state.emergency_next_wait = defaults.wait_after(state.emergency_count);
    }
    // An unlocked state without an expiry cannot end; treat it as blocked.
    if !state.blocked && state.unlock_expires_at.is_none() {
        state.blocked = true;
    }
    (state, Resolution::Current)
}

/// RFC 3339 timestamps on write; RFC 3339 or epoch seconds on read.
///
/// Epoch `0` (or negative) reads as unset.
pub(crate) mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(f64),
    }

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Text(text)) => DateTime::parse_from_rfc3339(&text)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(D::Error::custom),
            Some(Raw::Seconds(secs)) if secs <= 0.0 => Ok(None),
            Some(Raw::Seconds(secs)) => DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}"))),
        }
    }
}
