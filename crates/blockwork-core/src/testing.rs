//! In-memory doubles for the engine's seams, used by unit and integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::{Clock, Interrupted, ManualClock, Sleeper, StopSignal, Zone};
use crate::conditions::{ConditionEvaluator, ConditionReport, Evaluation, ConditionMode};
use crate::enforcement::{Enforcement, PushReport};
use crate::error::{StateError, SyncError, TransportError};
use crate::state::{resolve, DailyState, DayDefaults, StateStore};
use crate::transport::{RemoteCallOutcome, RemoteShell};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

type Handler = Box<dyn Fn(&str, Option<&[u8]>) -> RemoteCallOutcome + Send + Sync>;

/// A [`RemoteShell`] that replays queued outcomes and records every call.
///
/// When the queue is empty the optional handler answers; without one the call
/// fails fatally.
#[derive(Default)]
pub struct ScriptedShell {
    queue: Mutex<VecDeque<RemoteCallOutcome>>,
    calls: Mutex<Vec<(String, Option<Vec<u8>>)>>,
    handler: Option<Handler>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responding<F>(handler: F) -> Self
    where
        F: Fn(&str, Option<&[u8]>) -> RemoteCallOutcome + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::default()
        }
    }

    pub fn push_ok(&self, stdout: &str) {
        lock(&self.queue).push_back(Ok(stdout.to_string()));
    }

    pub fn push_err(&self, error: TransportError) {
        lock(&self.queue).push_back(Err(error));
    }

    pub fn commands(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn calls(&self) -> Vec<(String, Option<Vec<u8>>)> {
        lock(&self.calls).clone()
    }
}

impl RemoteShell for ScriptedShell {
    fn run(&self, command: &str, stdin: Option<&[u8]>) -> RemoteCallOutcome {
        lock(&self.calls).push((command.to_string(), stdin.map(<[u8]>::to_vec)));
        if let Some(outcome) = lock(&self.queue).pop_front() {
            return outcome;
        }
        match &self.handler {
            Some(handler) => handler(command, stdin),
            None => Err(TransportError::fatal(format!("no scripted response for: {command}"))),
        }
    }

    fn target(&self) -> String {
        "test@scripted".to_string()
    }
}

/// A [`ConditionEvaluator`] with a switchable answer.
#[derive(Debug, Default)]
pub struct FixedEvaluator {
    met: AtomicBool,
    calls: AtomicUsize,
}

impl FixedEvaluator {
    pub fn new(met: bool) -> Self {
        Self {
            met: AtomicBool::new(met),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConditionEvaluator for FixedEvaluator {
    fn evaluate(&self) -> Evaluation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let met = self.met.load(Ordering::SeqCst);
        Evaluation::combine(
            ConditionMode::Any,
            vec![ConditionReport {
                name: "workout".into(),
                met,
                description: format!("Checkbox '- [x] Workout' {}", if met { "checked" } else { "not checked" }),
            }],
        )
    }
}

/// An [`Enforcement`] that records pushed site lists and can be made to fail.
#[derive(Debug, Default)]
pub struct RecordingEnforcement {
    pushes: Mutex<Vec<Vec<String>>>,
    failing: AtomicBool,
}

impl RecordingEnforcement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every push with an exhausted transient error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn pushes(&self) -> Vec<Vec<String>> {
        lock(&self.pushes).clone()
    }

    pub fn last(&self) -> Option<Vec<String>> {
        lock(&self.pushes).last().cloned()
    }
}

impl Enforcement for RecordingEnforcement {
    fn push(&self, sites: &[String]) -> Result<PushReport, SyncError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Exhausted {
                operation: "blocklist upload".into(),
                attempts: 3,
                last: TransportError::transient("Connection timed out"),
            });
        }
        lock(&self.pushes).push(sites.to_vec());
        Ok(PushReport {
            sites: sites.len(),
            target: "recording".into(),
        })
    }
}

/// A [`StateStore`] holding the raw JSON document in memory.
pub struct MemoryStateStore {
    raw: Mutex<Option<String>>,
    zone: Zone,
    clock: Arc<dyn Clock>,
    defaults: DayDefaults,
    saves: AtomicUsize,
    failing_loads: AtomicBool,
}

impl MemoryStateStore {
    pub fn new(clock: Arc<dyn Clock>, zone: Zone) -> Self {
        Self {
            raw: Mutex::new(None),
            zone,
            clock,
            defaults: DayDefaults::default(),
            saves: AtomicUsize::new(0),
            failing_loads: AtomicBool::new(false),
        }
    }

    /// Simulate an unreachable backing store.
    pub fn set_failing_loads(&self, failing: bool) {
        self.failing_loads.store(failing, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Option<DailyState> {
        lock(&self.raw)
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<DailyState, StateError> {
        if self.failing_loads.load(Ordering::SeqCst) {
            return Err(StateError::Remote(SyncError::Exhausted {
                operation: "remote state load".into(),
                attempts: 3,
                last: TransportError::transient("No route to host"),
            }));
        }
        let raw = lock(&self.raw).clone();
        let today = self.zone.date_of(self.clock.now());
        let (state, resolution) = resolve(raw.as_deref(), today, &self.zone.label(), &self.defaults, "memory");
        if resolution.needs_save() {
            self.save(&state)?;
        }
        Ok(state)
    }

    fn save(&self, state: &DailyState) -> Result<(), StateError> {
        let json = serde_json::to_string(state)?;
        *lock(&self.raw) = Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Records requested sleeps instead of blocking.
///
/// Optionally advances a [`ManualClock`] by the slept amount, and can raise a
/// stop signal after a number of sleeps to end a daemon run.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
    clock: Option<Arc<ManualClock>>,
    stop_after: Option<(usize, StopSignal)>,
    interrupt: bool,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `clock` by every recorded sleep.
    pub fn advancing(clock: Arc<ManualClock>) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    /// Every sleep fails immediately, as if a signal arrived.
    pub fn interrupting() -> Self {
        Self {
            interrupt: true,
            ..Self::default()
        }
    }

    /// Raise `stop` once `count` sleeps have been recorded.
    pub fn stop_after(mut self, count: usize, stop: StopSignal) -> Self {
        self.stop_after = Some((count, stop));
        self
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        if self.interrupt {
            return Err(Interrupted);
        }
        let count = {
            let mut slept = self.slept.lock().unwrap_or_else(|p| p.into_inner());
            slept.push(duration);
            slept.len()
        };
        if let Some(clock) = &self.clock {
            let by = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
            clock.advance(by);
        }
        if let Some((limit, stop)) = &self.stop_after {
            if count >= *limit {
                stop.stop();
            }
        }
        Ok(())
    }
}
