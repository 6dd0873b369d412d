//! Remote command execution with classification-aware retry.
//!
//! A [`RemoteShell`] runs one command on a remote host. [`RetryingTransport`]
//! wraps it with a fixed attempt budget and exponential backoff. Every failure
//! is classified before deciding whether to retry:
//!
//! - transient (connection reset/refused/timed out, unreachable network,
//!   no route to host, ...) is retried
//! - anything else is fatal and returned immediately
//!
//! Used for the blocklist push, remote state I/O and the request queue.

mod ssh;

pub use ssh::SshShell;

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Sleeper;
use crate::error::{FailureClass, SyncError, TransportError};
use crate::storage::RetrySettings;

/// Outcome of one attempt at a remote operation.
pub type RemoteCallOutcome = Result<String, TransportError>;

/// Runs a single command on a remote host.
pub trait RemoteShell: Send + Sync {
    /// Run `command`, feeding `stdin` if given. Returns stdout on success.
    fn run(&self, command: &str, stdin: Option<&[u8]>) -> RemoteCallOutcome;

    /// `user@host` or similar, for logs.
    fn target(&self) -> String;
}

/// stderr fragments that mark a failure as transport-level and retryable.
const TRANSIENT_MARKERS: &[&str] = &[
    "connection reset",
    "connection refused",
    "connection timed out",
    "operation timed out",
    "network is unreachable",
    "no route to host",
    "broken pipe",
    "connection closed by remote host",
    "kex_exchange_identification",
    "temporary failure in name resolution",
];

/// Classify a failure from its stderr text.
pub fn classify(stderr: &str) -> FailureClass {
    let lower = stderr.to_ascii_lowercase();
    if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureClass::Transient
    } else {
        FailureClass::Fatal
    }
}

/// Quote `value` for a POSIX shell.
pub fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Attempt budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_secs(settings.initial_backoff),
            multiplier: settings.multiplier.max(1),
        }
    }

    /// Delay after failed attempt `attempt` (1-based): `base * multiplier^(attempt-1)`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }
}

/// A [`RemoteShell`] with retry and backoff.
pub struct RetryingTransport {
    shell: Arc<dyn RemoteShell>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingTransport {
    pub fn new(shell: Arc<dyn RemoteShell>, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            shell,
            policy,
            sleeper,
        }
    }

    pub fn target(&self) -> String {
        self.shell.target()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `op` until it succeeds, fails fatally, or the budget runs out.
    ///
    /// No delay follows the final attempt.
    pub fn execute<T>(
        &self,
        operation: &str,
        mut op: impl FnMut(&dyn RemoteShell) -> Result<T, TransportError>,
    ) -> Result<T, SyncError> {
        let budget = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match op(self.shell.as_ref()) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            tracing::warn!(
                operation,
                target = %self.shell.target(),
                attempt,
                budget,
                class = %error.class,
                cause = %error.cause,
                "remote attempt failed"
            );

            if !error.is_transient() {
                return Err(SyncError::Fatal {
                    operation: operation.to_string(),
                    attempt,
                    source: error,
                });
            }
            if attempt >= budget {
                return Err(SyncError::Exhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.policy.backoff_after(attempt);
            tracing::debug!(operation, delay_secs = delay.as_secs(), "backing off before retry");
            if self.sleeper.sleep(delay).is_err() {
                return Err(SyncError::Interrupted {
                    operation: operation.to_string(),
                });
            }
            attempt += 1;
        }
    }

    /// Run one command with retry, returning stdout.
    pub fn run(&self, operation: &str, command: &str, stdin: Option<&[u8]>) -> Result<String, SyncError> {
        self.execute(operation, |shell| shell.run(command, stdin))
    }
}
