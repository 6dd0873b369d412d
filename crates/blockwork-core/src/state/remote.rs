//! State file on a remote host.

use std::sync::Arc;

use chrono::NaiveDate;

use super::{resolve, DailyState, DayDefaults, StateStore};
use crate::clock::{Clock, Zone};
use crate::error::{StateError, SyncError};
use crate::transport::{sh_quote, RetryingTransport};

/// State kept on a remote host, guarded by `flock` on a remote lock file.
///
/// Reads take a shared lock; writes take an exclusive lock, write a temp file
/// next to the target and rename it into place. The day key comes from the
/// remote host's clock, in the configured zone when one is set.
pub struct RemoteStateStore {
    transport: Arc<RetryingTransport>,
    state_path: String,
    lock_path: String,
    use_sudo: bool,
    /// Explicit zone override, passed to the remote `date` as `TZ`.
    timezone: Option<String>,
    /// Used when the remote date cannot be read.
    fallback_zone: Zone,
    clock: Arc<dyn Clock>,
    defaults: DayDefaults,
}

impl RemoteStateStore {
    pub fn new(
        transport: Arc<RetryingTransport>,
        state_path: impl Into<String>,
        lock_path: impl Into<String>,
        use_sudo: bool,
        zone: Zone,
        clock: Arc<dyn Clock>,
        defaults: DayDefaults,
    ) -> Self {
        let timezone = match zone {
            Zone::Local => None,
            Zone::Named(tz) => Some(tz.name().to_string()),
        };
        Self {
            transport,
            state_path: state_path.into(),
            lock_path: lock_path.into(),
            use_sudo,
            timezone,
            fallback_zone: zone,
            clock,
            defaults,
        }
    }

    fn sudo(&self) -> &'static str {
        if self.use_sudo {
            "sudo "
        } else {
            ""
        }
    }

    fn state_dir(&self) -> String {
        match self.state_path.rsplit_once('/') {
            Some(("", _)) => "/".to_string(),
            Some((dir, _)) => dir.to_string(),
            None => ".".to_string(),
        }
    }

    fn zone_label(&self) -> String {
        self.timezone
            .clone()
            .unwrap_or_else(|| "remote-local".to_string())
    }

    pub(crate) fn read_command(&self) -> String {
        let script = format!(
            "{sudo}cat {path} 2>/dev/null || true",
            sudo = self.sudo(),
            path = sh_quote(&self.state_path),
        );
        format!("flock -s {} sh -c {}", sh_quote(&self.lock_path), sh_quote(&script))
    }

    pub(crate) fn write_command(&self) -> String {
        let path = sh_quote(&self.state_path);
        let tmp = sh_quote(&format!("{}.tmp", self.state_path));
        let mut script = format!(
            "{sudo}mkdir -p {dir} && {sudo}tee {tmp} >/dev/null && {sudo}mv {tmp} {path} && {sudo}chmod 600 {path}",
            sudo = self.sudo(),
            dir = sh_quote(&self.state_dir()),
        );
        if self.use_sudo {
            script.push_str(&format!(" && sudo chown root:root {path}"));
        }
        format!("flock -x {} sh -c {}", sh_quote(&self.lock_path), sh_quote(&script))
    }

    pub(crate) fn date_command(&self) -> String {
        match &self.timezone {
            Some(tz) => format!("TZ={} date +%F", sh_quote(tz)),
            None => "date +%F".to_string(),
        }
    }

    /// Today on the remote host; falls back to the local computation.
    fn today(&self) -> NaiveDate {
        let remote = self
            .transport
            .run("remote state date", &self.date_command(), None)
            .and_then(|out| {
                NaiveDate::parse_from_str(out.trim(), "%Y-%m-%d").map_err(|e| SyncError::BadResponse {
                    operation: "remote state date".into(),
                    message: format!("'{}': {e}", out.trim()),
                })
            });
        match remote {
            Ok(date) => date,
            Err(e) => {
                let local = self.fallback_zone.date_of(self.clock.now());
                tracing::warn!(error = %e, fallback = %local, "could not read remote date; using local date");
                local
            }
        }
    }
}

impl StateStore for RemoteStateStore {
    fn load(&self) -> Result<DailyState, StateError> {
        // A failed read is an error: never roll over on top of state we could not see.
        let raw = self
            .transport
            .run("remote state load", &self.read_command(), None)?;
        let today = self.today();
        let source = self.describe();
        let (state, resolution) = resolve(Some(&raw), today, &self.zone_label(), &self.defaults, &source);
        if resolution.needs_save() {
            self.save(&state)?;
        }
        Ok(state)
    }

    fn save(&self, state: &DailyState) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(state)?;
        self.transport
            .run("remote state save", &self.write_command(), Some(json.as_bytes()))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("remote:{}:{}", self.transport.target(), self.state_path)
    }
}
