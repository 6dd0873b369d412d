//! Blocklist rendering and delivery to the enforcement point.
//!
//! The artifact is a dnsmasq config: one `address=/<domain>/` line per site
//! (plus the `www.` variant of bare domains), sorted and de-duplicated. An
//! unblocked state renders as an empty file.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::SyncError;
use crate::state::DailyState;
use crate::transport::{sh_quote, RetryingTransport};

const REMOTE_STAGING: &str = "/tmp/blocklist.conf.tmp";

/// Render the dnsmasq blocklist for `sites`.
pub fn render_blocklist(sites: &[String]) -> String {
    let lines: BTreeSet<String> = sites
        .iter()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .flat_map(|site| {
            let www = (!site.starts_with("www.")).then(|| format!("address=/www.{site}/"));
            std::iter::once(format!("address=/{site}/")).chain(www)
        })
        .collect();
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.into_iter().collect::<Vec<_>>().join("\n");
    out.push('\n');
    out
}

/// Sites that should be enforced for `state`: all of them when blocked, none otherwise.
pub fn effective_sites(state: &DailyState, sites: &[String]) -> Vec<String> {
    if state.blocked {
        sites.to_vec()
    } else {
        Vec::new()
    }
}

/// What a successful push delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub sites: usize,
    pub target: String,
}

/// Delivers the effective blocklist somewhere that enforces it.
pub trait Enforcement: Send + Sync {
    fn push(&self, sites: &[String]) -> Result<PushReport, SyncError>;
}

/// Uploads the blocklist to a dnsmasq host and restarts the resolver.
pub struct DnsmasqPush {
    transport: Arc<RetryingTransport>,
    blocklist_path: String,
    restart_command: String,
}

impl DnsmasqPush {
    pub fn new(
        transport: Arc<RetryingTransport>,
        blocklist_path: impl Into<String>,
        restart_command: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            blocklist_path: blocklist_path.into(),
            restart_command: restart_command.into(),
        }
    }

    pub(crate) fn upload_command() -> String {
        format!("cat > {}", sh_quote(REMOTE_STAGING))
    }

    pub(crate) fn install_command(&self) -> String {
        let path = sh_quote(&self.blocklist_path);
        let mut command = format!(
            "sudo mv {staging} {path} && sudo chmod 644 {path} && sudo chown root:root {path}",
            staging = sh_quote(REMOTE_STAGING),
        );
        if !self.restart_command.trim().is_empty() {
            command.push_str(" && ");
            command.push_str(self.restart_command.trim());
        }
        command
    }
}

impl Enforcement for DnsmasqPush {
    fn push(&self, sites: &[String]) -> Result<PushReport, SyncError> {
        let content = render_blocklist(sites);
        self.transport
            .run("blocklist upload", &Self::upload_command(), Some(content.as_bytes()))?;
        self.transport
            .run("blocklist install", &self.install_command(), None)?;
        let report = PushReport {
            sites: sites.len(),
            target: format!("{}:{}", self.transport.target(), self.blocklist_path),
        };
        tracing::info!(sites = report.sites, target = %report.target, "blocklist pushed");
        Ok(report)
    }
}

/// Writes the blocklist to a local file for a resolver on this machine.
pub struct LocalBlocklistFile {
    path: PathBuf,
}

impl LocalBlocklistFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Enforcement for LocalBlocklistFile {
    fn push(&self, sites: &[String]) -> Result<PushReport, SyncError> {
        let local = |source| SyncError::Local {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(local)?;
        }
        std::fs::write(&self.path, render_blocklist(sites)).map_err(local)?;
        tracing::debug!(sites = sites.len(), path = %self.path.display(), "blocklist written");
        Ok(PushReport {
            sites: sites.len(),
            target: self.path.display().to_string(),
        })
    }
}

/// No enforcement point configured; pushes succeed without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl Enforcement for Disabled {
    fn push(&self, sites: &[String]) -> Result<PushReport, SyncError> {
        Ok(PushReport {
            sites: sites.len(),
            target: "disabled".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::state::DayDefaults;
    use crate::testing::{RecordingSleeper, ScriptedShell};
    use crate::transport::RetryPolicy;
    use chrono::NaiveDate;

    fn sites(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn renders_sorted_unique_lines_with_www() {
        let out = render_blocklist(&sites(&["reddit.com", "www.youtube.com", "Reddit.com"]));
        assert_eq!(
            out,
            "address=/reddit.com/\naddress=/www.reddit.com/\naddress=/www.youtube.com/\n"
        );
    }

    #[test]
    fn empty_list_renders_empty_file() {
        assert_eq!(render_blocklist(&[]), "");
        assert_eq!(render_blocklist(&sites(&["  "])), "");
    }

    #[test]
    fn effective_sites_follow_block_flag() {
        let all = sites(&["x.com"]);
        let mut state = DayDefaults::default().fresh(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), "local");
        assert_eq!(effective_sites(&state, &all), all);
        state.blocked = false;
        assert!(effective_sites(&state, &all).is_empty());
    }

    #[test]
    fn dnsmasq_push_uploads_then_installs() {
        let shell = Arc::new(ScriptedShell::new());
        shell.push_ok("");
        shell.push_ok("");
        let transport = Arc::new(RetryingTransport::new(
            shell.clone(),
            RetryPolicy::default(),
            Arc::new(RecordingSleeper::new()),
        ));
        let push = DnsmasqPush::new(transport, "/etc/dnsmasq.d/blocklist.conf", "sudo systemctl restart dnsmasq");

        let report = push.push(&sites(&["x.com"])).unwrap();

        assert_eq!(report.sites, 1);
        let calls = shell.calls();
        assert_eq!(calls[0].0, "cat > '/tmp/blocklist.conf.tmp'");
        assert_eq!(
            calls[0].1.as_deref(),
            Some("address=/www.x.com/\naddress=/x.com/\n".as_bytes())
        );
        assert!(calls[1].0.ends_with("&& sudo systemctl restart dnsmasq"));
        assert!(calls[1].0.contains("sudo chmod 644 '/etc/dnsmasq.d/blocklist.conf'"));
    }

    #[test]
    fn dnsmasq_push_surfaces_fatal_errors() {
        let shell = Arc::new(ScriptedShell::new());
        shell.push_err(TransportError::fatal("sudo: a password is required"));
        let transport = Arc::new(RetryingTransport::new(
            shell.clone(),
            RetryPolicy::default(),
            Arc::new(RecordingSleeper::new()),
        ));
        let push = DnsmasqPush::new(transport, "/etc/dnsmasq.d/blocklist.conf", "");

        assert!(matches!(push.push(&[]), Err(SyncError::Fatal { .. })));
        assert_eq!(shell.commands().len(), 1);
    }

    #[test]
    fn local_file_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dnsmasq").join("blocklist.conf");
        let local = LocalBlocklistFile::new(&path);

        local.push(&sites(&["x.com"])).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("address=/x.com/"));
        local.push(&[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
