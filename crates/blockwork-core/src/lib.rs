//! # Blockwork Core Library
//!
//! Daily website-blocking state and the protocols that lift it. The CLI binary
//! is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **State**: one [`DailyState`] record per day, kept locally or on a remote
//!   host, reset at the first access of each new day
//! - **Transport**: every remote operation runs through [`RetryingTransport`]
//!   with exponential backoff on transient failures
//! - **Conditions**: pluggable proof-of-work checks read from daily notes
//! - **Unlock**: proof-of-work and emergency protocols in [`UnlockOrchestrator`]
//! - **Daemon**: [`AutoUnlockDaemon`] ticks on an interval, re-blocks on expiry
//!   and drains phone requests through [`RequestPoller`]
//!
//! Time and sleeping are injected ([`Clock`], [`Sleeper`]) so every protocol is
//! testable without waiting.

pub mod clock;
pub mod conditions;
pub mod context;
pub mod daemon;
pub mod enforcement;
pub mod error;
pub mod poller;
pub mod state;
pub mod storage;
pub mod transport;
pub mod unlock;

#[doc(hidden)]
pub mod testing;

pub use clock::{Clock, ManualClock, Sleeper, StopSignal, SystemClock, ThreadSleeper, Zone};
pub use conditions::{Condition, ConditionConfig, ConditionEvaluator, ConditionMode, ConditionRegistry, Evaluation};
pub use context::AppContext;
pub use daemon::{AutoUnlockDaemon, DaemonPhase, TickReport};
pub use enforcement::{render_blocklist, Enforcement};
pub use error::{ConditionError, ConfigError, CoreError, StateError, SyncError, TransportError, UnlockError};
pub use poller::{PendingRequest, RequestPoller};
pub use state::{DailyState, StateStore};
pub use storage::Config;
pub use transport::{RetryPolicy, RetryingTransport};
pub use unlock::{EmergencyGrant, StatusReport, Trigger, UnlockOrchestrator, UnlockOutcome};
