//! Wiring from [`Config`] to a ready-to-use orchestrator and daemon.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, Sleeper, StopSignal, SystemClock, ThreadSleeper, Zone};
use crate::conditions::{ConditionContext, ConditionRegistry, ConfiguredConditions};
use crate::daemon::AutoUnlockDaemon;
use crate::enforcement::{Disabled, DnsmasqPush, Enforcement, LocalBlocklistFile};
use crate::error::ConfigError;
use crate::poller::RequestPoller;
use crate::state::{DayDefaults, LocalStateStore, RemoteStateStore, StateStore};
use crate::storage::Config;
use crate::transport::{RetryPolicy, RetryingTransport, SshShell};
use crate::unlock::UnlockOrchestrator;

/// Everything a command needs, built once per process.
pub struct AppContext {
    pub config: Config,
    pub zone: Zone,
    pub clock: Arc<dyn Clock>,
    pub stop: StopSignal,
    pub orchestrator: Arc<UnlockOrchestrator>,
    poller: Option<RequestPoller>,
}

impl AppContext {
    /// Build with the system clock and a sleeper tied to `stop`.
    pub fn from_config(config: Config, stop: StopSignal) -> Result<Self, ConfigError> {
        let sleeper: Arc<dyn Sleeper> = Arc::new(ThreadSleeper::new(stop.clone()));
        Self::build(config, stop, Arc::new(SystemClock), sleeper)
    }

    pub fn build(
        config: Config,
        stop: StopSignal,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let zone = Zone::parse(config.timezone.as_deref())?;
        let policy = RetryPolicy::from_settings(&config.retry);
        let attempt_timeout = Duration::from_secs(config.retry.attempt_timeout.max(1));
        let transport_to = |user: &str, host: &str| {
            let shell = SshShell::new(user, host).with_attempt_timeout(attempt_timeout);
            Arc::new(RetryingTransport::new(Arc::new(shell), policy, Arc::clone(&sleeper)))
        };

        let defaults = DayDefaults::from_settings(&config.unlock);
        let store: Arc<dyn StateStore> = match config.remote_state.endpoint(&config.remote_sync) {
            Some((host, user)) => Arc::new(RemoteStateStore::new(
                transport_to(&user, &host),
                config.remote_state.state_path.clone(),
                config.remote_state.lock_path.clone(),
                config.remote_state.sudo(),
                zone,
                Arc::clone(&clock),
                defaults,
            )),
            None => Arc::new(LocalStateStore::new(
                config.local_state_path()?,
                zone,
                Arc::clone(&clock),
                defaults,
            )),
        };

        let enforcement: Arc<dyn Enforcement> = if config.remote_sync.is_configured() {
            let sync = &config.remote_sync;
            Arc::new(DnsmasqPush::new(
                transport_to(&sync.user, &sync.host),
                sync.blocklist_path.clone(),
                sync.restart_command.clone(),
            ))
        } else if let Some(path) = &config.blocklist_file {
            Arc::new(LocalBlocklistFile::new(path.clone()))
        } else {
            tracing::debug!("no enforcement point configured");
            Arc::new(Disabled)
        };

        let conditions = Arc::new(ConfiguredConditions::new(
            config.conditions.clone(),
            config.condition_mode,
            Arc::new(ConditionRegistry::with_builtins()),
            ConditionContext::new(
                config.notes.vault_path.clone(),
                config.notes.daily_note_pattern.clone(),
                zone,
                Arc::clone(&clock),
            ),
        ));

        let orchestrator = UnlockOrchestrator::new(
            store,
            conditions,
            enforcement,
            config.unlock.clone(),
            config.blocked_sites.clone(),
        )
        .with_clock(Arc::clone(&clock))
        .with_sleeper(Arc::clone(&sleeper));

        let poller = config.phone_api.is_configured().then(|| {
            let api = &config.phone_api;
            RequestPoller::new(transport_to(&api.user, &api.host), api.data_dir.clone())
        });

        Ok(Self {
            config,
            zone,
            clock,
            stop,
            orchestrator: Arc::new(orchestrator),
            poller,
        })
    }

    /// The daemon over this context's orchestrator. Takes the request poller.
    pub fn daemon(&mut self) -> AutoUnlockDaemon {
        let sleeper: Arc<dyn Sleeper> = Arc::new(ThreadSleeper::new(self.stop.clone()));
        let daemon = AutoUnlockDaemon::new(
            Arc::clone(&self.orchestrator),
            self.config.auto_unlock.clone(),
            self.zone,
        )
        .with_sleeper(sleeper);
        match self.poller.take() {
            Some(poller) => daemon.with_poller(poller),
            None => daemon,
        }
    }
}
