//! The recurring auto-unlock control loop.
//!
//! Each tick:
//! 1. **Reconciling**: observe state (rollover and expiry). Push the effective
//!    blocklist when the state says the enforcement point disagrees with it,
//!    and once after start.
//! 2. **Checking**: attempt an automatic proof-of-work unlock unless disabled,
//!    already earned today, before the earliest time, or already unlocked.
//! 3. Drain the phone request queue, when configured.
//! 4. Record `last_check_at`.
//!
//! Then **IdleWait** until the next tick or a stop signal. Tick errors are
//! logged and never end the loop.

use std::sync::Arc;

use chrono::NaiveTime;
use serde::Serialize;

use crate::clock::{Sleeper, StopSignal, ThreadSleeper, Zone};
use crate::error::CoreError;
use crate::poller::{ProcessedRequest, RequestPoller};
use crate::storage::AutoUnlockSettings;
use crate::unlock::{Trigger, UnlockOrchestrator, UnlockOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonPhase {
    IdleWait,
    Checking,
    Reconciling,
}

/// Why a tick did not attempt an automatic unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    AlreadyUsedToday,
    BeforeEarliestTime,
    AlreadyUnlocked,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// An unlock ran out during this tick.
    pub expired: bool,
    /// Blocked flag of the blocklist pushed during reconciliation, if any.
    pub pushed: Option<bool>,
    pub push_error: Option<String>,
    pub auto_unlock: Option<UnlockOutcome>,
    pub auto_unlock_error: Option<String>,
    pub skipped: Option<SkipReason>,
    pub requests: Vec<ProcessedRequest>,
}

pub struct AutoUnlockDaemon {
    orchestrator: Arc<UnlockOrchestrator>,
    settings: AutoUnlockSettings,
    zone: Zone,
    sleeper: Arc<dyn Sleeper>,
    poller: Option<RequestPoller>,
    phase: DaemonPhase,
    /// A push has succeeded since this daemon started.
    pushed_since_start: bool,
}

impl AutoUnlockDaemon {
    pub fn new(orchestrator: Arc<UnlockOrchestrator>, settings: AutoUnlockSettings, zone: Zone) -> Self {
        Self {
            orchestrator,
            settings,
            zone,
            sleeper: Arc::new(ThreadSleeper::default()),
            poller: None,
            phase: DaemonPhase::IdleWait,
            pushed_since_start: false,
        }
    }

    pub fn with_poller(mut self, poller: RequestPoller) -> Self {
        self.poller = Some(poller);
        self
    }

    /// Sleeper for the interval between ticks.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn phase(&self) -> DaemonPhase {
        self.phase
    }

    /// `None` means the gate is open all day.
    fn earliest(&self) -> Option<NaiveTime> {
        match self.settings.earliest() {
            Ok(time) => Some(time),
            Err(e) => {
                tracing::warn!(error = %e, "invalid earliest_time; not gating auto-unlock by time");
                None
            }
        }
    }

    /// Run one evaluation cycle.
    pub fn tick(&mut self) -> Result<TickReport, CoreError> {
        let result = self.run_tick();
        self.phase = DaemonPhase::IdleWait;
        result
    }

    fn run_tick(&mut self) -> Result<TickReport, CoreError> {
        let mut report = TickReport::default();

        self.phase = DaemonPhase::Reconciling;
        let observation = self.orchestrator.observe()?;
        let mut state = observation.state;
        report.expired = observation.expired;
        if observation.pushed {
            self.pushed_since_start = true;
            report.pushed = Some(state.blocked);
        } else if !self.pushed_since_start || state.needs_push() {
            match self.orchestrator.enforce(&mut state) {
                Ok(_) => {
                    self.pushed_since_start = true;
                    report.pushed = Some(state.blocked);
                }
                Err(e) => {
                    tracing::warn!(error = %e, blocked = state.blocked, "blocklist push failed; retrying next tick");
                    report.push_error = Some(e.to_string());
                }
            }
        }

        self.phase = DaemonPhase::Checking;
        let now = self.orchestrator.clock().now();
        report.skipped = if !self.settings.enabled {
            Some(SkipReason::Disabled)
        } else if state.unlocked_via_conditions_today {
            Some(SkipReason::AlreadyUsedToday)
        } else if self.earliest().is_some_and(|t| self.zone.time_of(now) < t) {
            Some(SkipReason::BeforeEarliestTime)
        } else if state.is_unlocked_at(now) {
            Some(SkipReason::AlreadyUnlocked)
        } else {
            None
        };

        if report.skipped.is_none() {
            match self.orchestrator.attempt_unlock(Trigger::Auto) {
                Ok(outcome) => report.auto_unlock = Some(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "auto-unlock failed");
                    report.auto_unlock_error = Some(e.to_string());
                }
            }
        } else {
            tracing::debug!(reason = ?report.skipped, "auto-unlock skipped");
        }

        if let Some(poller) = self.poller.as_mut() {
            match poller.process(&self.orchestrator) {
                Ok(requests) => report.requests = requests,
                Err(e) => tracing::warn!(error = %e, "request poll failed"),
            }
            match self.orchestrator.status() {
                Ok(status) => {
                    if let Err(e) = poller.publish_status(&status) {
                        tracing::warn!(error = %e, "status publish failed");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "could not build status for publishing"),
            }
        }

        self.orchestrator.record_check(now)?;
        Ok(report)
    }

    /// Tick until `stop` is raised.
    pub fn run(&mut self, stop: &StopSignal) {
        let interval = self.settings.interval();
        tracing::info!(
            interval_secs = interval.as_secs(),
            store = %self.orchestrator.store().describe(),
            "daemon started"
        );
        while !stop.is_stopped() {
            match self.tick() {
                Ok(report) => tracing::debug!(?report, "tick complete"),
                Err(e) => tracing::error!(error = %e, "tick failed"),
            }
            if stop.is_stopped() || self.sleeper.sleep(interval).is_err() {
                break;
            }
        }
        self.phase = DaemonPhase::IdleWait;
        tracing::info!("daemon stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::storage::UnlockSettings;
    use crate::testing::{FixedEvaluator, MemoryStateStore, RecordingEnforcement, RecordingSleeper};
    use chrono::{TimeZone, Utc};

    struct Harness {
        clock: Arc<ManualClock>,
        store: Arc<MemoryStateStore>,
        conditions: Arc<FixedEvaluator>,
        enforcement: Arc<RecordingEnforcement>,
        orchestrator: Arc<UnlockOrchestrator>,
        daemon: AutoUnlockDaemon,
    }

    fn harness(hour: u32, met: bool) -> Harness {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 8, 3, hour, 0, 0).unwrap()));
        let zone = Zone::parse(Some("UTC")).unwrap();
        let store = Arc::new(MemoryStateStore::new(clock.clone(), zone));
        let conditions = Arc::new(FixedEvaluator::new(met));
        let enforcement = Arc::new(RecordingEnforcement::new());
        let orchestrator = Arc::new(
            UnlockOrchestrator::new(
                store.clone(),
                conditions.clone(),
                enforcement.clone(),
                UnlockSettings::default(),
                vec!["x.com".into()],
            )
            .with_clock(clock.clone()),
        );
        let daemon = AutoUnlockDaemon::new(orchestrator.clone(), AutoUnlockSettings::default(), zone);
        Harness {
            clock,
            store,
            conditions,
            enforcement,
            orchestrator,
            daemon,
        }
    }

    #[test]
    fn first_tick_pushes_then_stays_quiet() {
        let mut h = harness(9, false);
        let report = h.daemon.tick().unwrap();
        assert_eq!(report.pushed, Some(true));
        assert_eq!(report.skipped, Some(SkipReason::BeforeEarliestTime));
        assert_eq!(h.daemon.phase(), DaemonPhase::IdleWait);

        let report = h.daemon.tick().unwrap();
        assert_eq!(report.pushed, None);
        assert_eq!(h.enforcement.pushes().len(), 1);
        assert_eq!(h.conditions.calls(), 0);
    }

    #[test]
    fn auto_unlocks_after_gate_once() {
        let mut h = harness(18, true);
        let report = h.daemon.tick().unwrap();
        assert!(report.auto_unlock.as_ref().is_some_and(UnlockOutcome::is_unlocked));

        h.clock.advance(chrono::Duration::hours(3));
        let report = h.daemon.tick().unwrap();
        assert!(report.expired);
        assert_eq!(report.pushed, Some(true));
        assert_eq!(report.skipped, Some(SkipReason::AlreadyUsedToday));
        assert!(h.store.stored().unwrap().blocked);
    }

    #[test]
    fn expiry_seen_by_a_command_still_reaches_the_resolver() {
        let mut h = harness(9, false);
        h.daemon.tick().unwrap();
        h.orchestrator.force_unblock(Some(std::time::Duration::from_secs(60))).unwrap();
        h.clock.advance(chrono::Duration::minutes(2));

        assert!(h.orchestrator.status().unwrap().blocked);
        h.daemon.tick().unwrap();
        h.clock.advance(chrono::Duration::minutes(5));
        h.daemon.tick().unwrap();

        assert_eq!(h.enforcement.last(), Some(vec!["x.com".to_string()]));
        assert!(!h.store.stored().unwrap().needs_push());
    }

    #[test]
    fn unpushed_reblock_is_pushed_by_the_next_tick() {
        let mut h = harness(9, false);
        h.daemon.tick().unwrap();
        h.orchestrator.force_unblock(Some(std::time::Duration::from_secs(60))).unwrap();
        h.clock.advance(chrono::Duration::minutes(2));
        h.enforcement.set_failing(true);
        assert!(h.orchestrator.status().unwrap().blocked);
        assert_eq!(h.enforcement.last(), Some(vec![]));

        h.enforcement.set_failing(false);
        let report = h.daemon.tick().unwrap();
        assert_eq!(report.pushed, Some(true));
        assert_eq!(h.enforcement.last(), Some(vec!["x.com".to_string()]));
    }

    #[test]
    fn rollover_out_of_an_unlock_is_pushed() {
        let mut h = harness(23, false);
        h.daemon.tick().unwrap();
        h.orchestrator.force_unblock(Some(std::time::Duration::from_secs(2 * 3600))).unwrap();
        h.clock.advance(chrono::Duration::hours(1));

        let report = h.daemon.tick().unwrap();
        assert_eq!(report.pushed, Some(true));
        assert_eq!(h.enforcement.last(), Some(vec!["x.com".to_string()]));
    }

    #[test]
    fn disabled_never_evaluates() {
        let mut h = harness(20, true);
        h.daemon.settings.enabled = false;
        let report = h.daemon.tick().unwrap();
        assert_eq!(report.skipped, Some(SkipReason::Disabled));
        assert_eq!(h.conditions.calls(), 0);
    }

    #[test]
    fn invalid_earliest_time_leaves_gate_open() {
        let mut h = harness(1, true);
        h.daemon.settings.earliest_time = "late".into();
        let report = h.daemon.tick().unwrap();
        assert!(report.auto_unlock.is_some());
    }

    #[test]
    fn failed_push_is_retried_next_tick() {
        let mut h = harness(9, false);
        h.enforcement.set_failing(true);
        let report = h.daemon.tick().unwrap();
        assert!(report.push_error.is_some());

        h.enforcement.set_failing(false);
        let report = h.daemon.tick().unwrap();
        assert_eq!(report.pushed, Some(true));
    }

    #[test]
    fn records_last_check() {
        let mut h = harness(9, false);
        h.daemon.tick().unwrap();
        assert_eq!(h.store.stored().unwrap().last_check_at, Some(h.clock.now()));
    }

    #[test]
    fn load_failure_is_an_error_and_run_survives_it() {
        let Harness { clock, store, daemon, .. } = harness(9, false);
        store.set_failing_loads(true);
        let stop = StopSignal::new();
        let sleeper = Arc::new(RecordingSleeper::advancing(clock).stop_after(3, stop.clone()));
        let mut daemon = daemon.with_sleeper(sleeper.clone());

        assert!(daemon.tick().is_err());
        daemon.run(&stop);

        assert_eq!(sleeper.slept().len(), 3);
        assert_eq!(daemon.phase(), DaemonPhase::IdleWait);
        assert_eq!(store.saves(), 0);
    }
}
