//! Unlock protocols over the daily state.
//!
//! [`UnlockOrchestrator`] owns every mutation of [`DailyState`] that lifts or
//! restores the block:
//!
//! - proof-of-work: conditions satisfied, at most once a day via the daemon
//! - emergency: confirmation phrase plus an escalating mandatory wait
//! - administrative `force_block` / `force_unblock`
//!
//! Each protocol re-reads state (with rollover and expiry) before deciding,
//! updates the enforcement point first, and persists only after the push
//! succeeded. A failed push leaves the state as it was.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, Sleeper, SystemClock, ThreadSleeper};
use crate::conditions::{ConditionEvaluator, ConditionReport};
use crate::enforcement::{effective_sites, Enforcement, PushReport};
use crate::error::{StateError, SyncError, UnlockError};
use crate::state::{self, DailyState, Observation, StateStore};
use crate::storage::UnlockSettings;

/// Upper bound on any single unlock.
const MAX_UNLOCK_SECS: u64 = 366 * 24 * 3600;

/// Exact phrase required for an emergency unlock.
pub const CONFIRMATION_PHRASE: &str = "I CHOOSE DISTRACTION";

pub const SHAME_PROMPTS: &[&str] = &[
    "You're about to waste time you could spend on something meaningful.",
    "Remember why you set up this blocker in the first place.",
    "Is this really what you want to be doing right now?",
    "Your future self will thank you for staying focused.",
    "Distraction is the enemy of achievement.",
];

/// A random line from [`SHAME_PROMPTS`].
pub fn shame_prompt() -> &'static str {
    SHAME_PROMPTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(SHAME_PROMPTS[0])
}

/// Re-block an unlock whose expiry has passed. Pure.
pub fn reconcile_expiry(state: &DailyState, now: DateTime<Utc>) -> DailyState {
    let mut next = state.clone();
    if !next.blocked && next.unlock_expires_at.map_or(true, |t| now >= t) {
        next.blocked = true;
        next.unlock_expires_at = None;
    }
    next
}

/// `h:mm:ss`, or `m:ss` under an hour.
pub fn format_remaining(seconds: i64) -> String {
    if seconds <= 0 {
        return "0:00".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// `2h 0m` / `5m` style duration for messages.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Who asked for a proof-of-work unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// A person, via the CLI or a phone request. Ignores the time gate.
    Manual,
    /// The daemon, after its own gate and once-a-day checks.
    Auto,
}

/// Result of a proof-of-work attempt. Unmet conditions are not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnlockOutcome {
    Unlocked {
        description: String,
        expires_at: DateTime<Utc>,
        reports: Vec<ConditionReport>,
    },
    NotMet {
        description: String,
        reports: Vec<ConditionReport>,
    },
    AlreadyUnlocked {
        expires_at: Option<DateTime<Utc>>,
    },
}

impl UnlockOutcome {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, UnlockOutcome::Unlocked { .. })
    }
}

/// Emergency budget as it stands, without mutating anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyPlan {
    pub used: u32,
    pub max: u32,
    /// Seconds the next emergency unlock must wait.
    pub wait_secs: u64,
    pub duration_secs: u64,
}

impl EmergencyPlan {
    pub fn available(&self) -> bool {
        self.used < self.max
    }

    pub fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.used)
    }
}

/// A completed emergency unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyGrant {
    pub expires_at: DateTime<Utc>,
    pub waited_secs: u64,
    pub used: u32,
    pub remaining: u32,
    pub duration_secs: u64,
}

/// What `sync` pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub blocked: bool,
    pub push: PushReport,
}

/// Snapshot for `status` output and the phone status page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub date: NaiveDate,
    pub blocked: bool,
    pub unlock_expires_at: Option<DateTime<Utc>>,
    pub unlock_remaining: String,
    pub unlocked_via_conditions_today: bool,
    pub emergency_count: u32,
    pub emergency_max: u32,
    pub emergency_remaining: u32,
    pub next_emergency_wait: u64,
    pub last_check_at: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub store: String,
    pub conditions_satisfied: bool,
    pub conditions: Vec<ConditionReport>,
    pub blocked_sites: usize,
}

/// Runs the unlock protocols against one store, evaluator and enforcement point.
pub struct UnlockOrchestrator {
    store: Arc<dyn StateStore>,
    conditions: Arc<dyn ConditionEvaluator>,
    enforcement: Arc<dyn Enforcement>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    settings: UnlockSettings,
    sites: Vec<String>,
}

impl UnlockOrchestrator {
    pub fn new(
        store: Arc<dyn StateStore>,
        conditions: Arc<dyn ConditionEvaluator>,
        enforcement: Arc<dyn Enforcement>,
        settings: UnlockSettings,
        sites: Vec<String>,
    ) -> Self {
        Self {
            store,
            conditions,
            enforcement,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(ThreadSleeper::default()),
            settings,
            sites,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sleeper used for the emergency wait.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn settings(&self) -> &UnlockSettings {
        &self.settings
    }

    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    /// Load today's state and apply expiry.
    ///
    /// A re-block is persisted and pushed. A failed push is only logged; the
    /// state keeps saying it is unenforced, so the next reconciliation retries.
    pub fn observe(&self) -> Result<Observation, StateError> {
        let mut observation = state::observe(self.store.as_ref(), self.clock.now())?;
        if observation.expired {
            match self.push_effective(&observation.state) {
                Ok(_) => {
                    observation.state.enforced_blocked = Some(observation.state.blocked);
                    self.store.save(&observation.state)?;
                    observation.pushed = true;
                }
                Err(e) => tracing::warn!(error = %e, "re-block not pushed; leaving it for the daemon"),
            }
        }
        Ok(observation)
    }

    fn seconds(secs: u64) -> chrono::Duration {
        chrono::Duration::seconds(secs.min(MAX_UNLOCK_SECS) as i64)
    }

    fn push_effective(&self, state: &DailyState) -> Result<PushReport, SyncError> {
        self.enforcement.push(&effective_sites(state, &self.sites))
    }

    /// Push the blocklist `state` calls for and record it as enforced.
    pub fn enforce(&self, state: &mut DailyState) -> Result<PushReport, UnlockError> {
        let push = self.push_effective(state)?;
        if state.needs_push() {
            state.enforced_blocked = Some(state.blocked);
            self.store.save(state)?;
        }
        Ok(push)
    }

    /// Proof-of-work unlock.
    pub fn attempt_unlock(&self, trigger: Trigger) -> Result<UnlockOutcome, UnlockError> {
        let now = self.clock.now();
        let current = self.observe()?.state;
        if current.is_unlocked_at(now) {
            return Ok(UnlockOutcome::AlreadyUnlocked {
                expires_at: current.unlock_expires_at,
            });
        }

        let evaluation = self.conditions.evaluate();
        if !evaluation.satisfied {
            tracing::info!(?trigger, "conditions not met; staying blocked");
            return Ok(UnlockOutcome::NotMet {
                description: evaluation.summary(),
                reports: evaluation.reports,
            });
        }

        let mut state = self.observe()?.state;
        let now = self.clock.now();
        if state.is_unlocked_at(now) {
            return Ok(UnlockOutcome::AlreadyUnlocked {
                expires_at: state.unlock_expires_at,
            });
        }

        self.enforcement.push(&[])?;

        let expires_at = now + Self::seconds(self.settings.proof_of_work_duration);
        state.blocked = false;
        state.unlock_expires_at = Some(expires_at);
        state.unlocked_via_conditions_today = true;
        state.enforced_blocked = Some(false);
        self.store.save(&state)?;

        let description = evaluation.summary();
        tracing::info!(?trigger, %expires_at, conditions = %description, "proof-of-work unlock granted");
        Ok(UnlockOutcome::Unlocked {
            description,
            expires_at,
            reports: evaluation.reports,
        })
    }

    /// Current emergency budget, for prompts.
    pub fn emergency_preview(&self) -> Result<EmergencyPlan, UnlockError> {
        let state = self.observe()?.state;
        Ok(EmergencyPlan {
            used: state.emergency_count,
            max: self.settings.emergency_max_per_day,
            wait_secs: state.emergency_next_wait,
            duration_secs: self.settings.emergency_duration,
        })
    }

    fn check_budget(&self, state: &DailyState) -> Result<(), UnlockError> {
        let max = self.settings.emergency_max_per_day;
        if state.emergency_count >= max {
            return Err(UnlockError::LimitExceeded {
                used: state.emergency_count,
                max,
            });
        }
        Ok(())
    }

    /// Emergency unlock, waiting on the orchestrator's sleeper.
    pub fn emergency_unlock(&self, confirmation: &str) -> Result<EmergencyGrant, UnlockError> {
        self.emergency_unlock_with(confirmation, self.sleeper.as_ref())
    }

    /// Emergency unlock, waiting on `waiter` (e.g. a countdown display).
    pub fn emergency_unlock_with(
        &self,
        confirmation: &str,
        waiter: &dyn Sleeper,
    ) -> Result<EmergencyGrant, UnlockError> {
        let state = self.observe()?.state;
        self.check_budget(&state)?;
        if confirmation != CONFIRMATION_PHRASE {
            return Err(UnlockError::ConfirmationMismatch);
        }

        let wait = state.emergency_next_wait;
        tracing::info!(wait_secs = wait, used = state.emergency_count, "emergency unlock waiting");
        if waiter.sleep(Duration::from_secs(wait)).is_err() {
            tracing::info!("emergency unlock cancelled during wait");
            return Err(UnlockError::Cancelled);
        }

        let mut state = self.observe()?.state;
        self.check_budget(&state)?;
        self.enforcement.push(&[])?;

        let now = self.clock.now();
        let mut expires_at = now + Self::seconds(self.settings.emergency_duration);
        if let Some(existing) = state.unlock_expires_at.filter(|_| !state.blocked) {
            expires_at = expires_at.max(existing);
        }
        state.blocked = false;
        state.unlock_expires_at = Some(expires_at);
        state.emergency_count += 1;
        state.emergency_next_wait = state
            .emergency_next_wait
            .saturating_mul(u64::from(self.settings.emergency_wait_multiplier));
        state.enforced_blocked = Some(false);
        self.store.save(&state)?;

        let max = self.settings.emergency_max_per_day;
        tracing::warn!(used = state.emergency_count, max, %expires_at, "emergency unlock granted");
        Ok(EmergencyGrant {
            expires_at,
            waited_secs: wait,
            used: state.emergency_count,
            remaining: max.saturating_sub(state.emergency_count),
            duration_secs: self.settings.emergency_duration,
        })
    }

    /// Block now, ending any unlock. Persists before pushing.
    pub fn force_block(&self) -> Result<DailyState, UnlockError> {
        let mut state = self.observe()?.state;
        state.blocked = true;
        state.unlock_expires_at = None;
        self.store.save(&state)?;
        self.enforce(&mut state)?;
        tracing::info!("sites blocked");
        Ok(state)
    }

    /// Administrative unblock for `duration` (default: the proof-of-work duration).
    ///
    /// Leaves the daily flag and the emergency budget alone.
    pub fn force_unblock(&self, duration: Option<Duration>) -> Result<DailyState, UnlockError> {
        let secs = duration.map_or(self.settings.proof_of_work_duration, |d| d.as_secs());
        let mut state = self.observe()?.state;
        self.enforcement.push(&[])?;
        let expires_at = self.clock.now() + Self::seconds(secs);
        state.blocked = false;
        state.unlock_expires_at = Some(expires_at);
        state.enforced_blocked = Some(false);
        self.store.save(&state)?;
        tracing::warn!(%expires_at, "sites force-unblocked");
        Ok(state)
    }

    /// Push whatever the current state calls for.
    pub fn sync(&self) -> Result<SyncOutcome, UnlockError> {
        let mut state = self.observe()?.state;
        let push = self.enforce(&mut state)?;
        Ok(SyncOutcome {
            blocked: state.blocked,
            push,
        })
    }

    /// Record a daemon evaluation at `now`.
    pub fn record_check(&self, now: DateTime<Utc>) -> Result<DailyState, StateError> {
        let mut state = self.observe()?.state;
        state.last_check_at = Some(now);
        self.store.save(&state)?;
        Ok(state)
    }

    pub fn status(&self) -> Result<StatusReport, UnlockError> {
        let now = self.clock.now();
        let state = self.observe()?.state;
        let evaluation = self.conditions.evaluate();
        let max = self.settings.emergency_max_per_day;
        Ok(StatusReport {
            date: state.date,
            blocked: state.blocked,
            unlock_expires_at: state.unlock_expires_at,
            unlock_remaining: format_remaining(state.remaining_secs(now)),
            unlocked_via_conditions_today: state.unlocked_via_conditions_today,
            emergency_count: state.emergency_count,
            emergency_max: max,
            emergency_remaining: max.saturating_sub(state.emergency_count),
            next_emergency_wait: state.emergency_next_wait,
            last_check_at: state.last_check_at,
            timezone: state.timezone.clone(),
            store: self.store.describe(),
            conditions_satisfied: evaluation.satisfied,
            conditions: evaluation.reports,
            blocked_sites: self.sites.len(),
        })
    }
}
