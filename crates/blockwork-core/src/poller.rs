//! Phone-originated unlock requests.
//!
//! A small web endpoint (not part of this crate) appends requests to
//! `<data_dir>/requests.json` on a remote host:
//!
//! ```json
//! [{"id": "a1b2", "type": "unlock", "status": "pending", "created_at": 1767225600.5}]
//! ```
//!
//! [`RequestPoller`] reads that queue over the retrying transport, runs each
//! pending entry through the [`UnlockOrchestrator`] as a manual request, and
//! marks it completed with its result. The endpoint keeps pending entries and
//! the last ten completed ones. `status.json` next to it is refreshed for the
//! phone page.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use indoc::indoc;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::state::timestamp;
use crate::transport::{sh_quote, RetryingTransport};
use crate::unlock::{format_duration, StatusReport, Trigger, UnlockOrchestrator, UnlockOutcome, CONFIRMATION_PHRASE};

/// Marks one entry completed and trims old completed entries. Prints `ok`,
/// or `missing` when the id (or the file) is gone.
const MARK_SCRIPT: &str = indoc! {r#"
    import base64, json, os, sys
    path = sys.argv[1]
    payload = json.loads(base64.b64decode(sys.argv[2]).decode())
    try:
        with open(path) as f:
            requests = json.load(f)
    except FileNotFoundError:
        print("missing")
        sys.exit(0)
    found = False
    for r in requests:
        if r.get("id") == payload["id"]:
            r["status"] = "completed"
            r["result"] = payload["result"]
            r["completed_at"] = payload["completed_at"]
            found = True
    completed = [r for r in requests if r.get("status") == "completed"]
    pending = [r for r in requests if r.get("status") == "pending"]
    tmp = path + ".tmp"
    with open(tmp, "w") as f:
        json.dump(pending + completed[-10:], f, indent=2)
    os.replace(tmp, path)
    print("ok" if found else "missing")
"#};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Unlock,
    Emergency,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Completed,
    #[default]
    #[serde(other)]
    Other,
}

/// One queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub id: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: RequestKind,
    #[serde(rename = "created_at", alias = "submitted_at", default, with = "timestamp")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: RequestStatus,
}

/// What running a request produced; stored back into the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedRequest {
    pub request: PendingRequest,
    pub result: RequestResult,
    /// False when the request had already run and only the marking was retried.
    pub executed: bool,
}

pub struct RequestPoller {
    transport: Arc<RetryingTransport>,
    data_dir: String,
    /// Requests run by this process, kept until they leave the pending list.
    handled: HashMap<String, RequestResult>,
}

impl RequestPoller {
    pub fn new(transport: Arc<RetryingTransport>, data_dir: impl Into<String>) -> Self {
        Self {
            transport,
            data_dir: data_dir.into().trim_end_matches('/').to_string(),
            handled: HashMap::new(),
        }
    }

    fn file(&self, name: &str) -> String {
        format!("{}/{name}", self.data_dir)
    }

    /// Pending entries in the remote queue.
    pub fn poll(&self) -> Result<Vec<PendingRequest>, SyncError> {
        let command = format!("cat {} 2>/dev/null || echo '[]'", sh_quote(&self.file("requests.json")));
        let raw = self.transport.run("request poll", &command, None)?;
        let raw = if raw.trim().is_empty() { "[]" } else { raw.trim() };
        let entries: Vec<PendingRequest> =
            serde_json::from_str(raw).map_err(|e| SyncError::BadResponse {
                operation: "request poll".into(),
                message: e.to_string(),
            })?;
        Ok(entries
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect())
    }

    /// Mark `id` completed with `result`.
    pub fn mark_consumed(&self, id: &str, result: &RequestResult, now: DateTime<Utc>) -> Result<(), SyncError> {
        let payload = serde_json::json!({
            "id": id,
            "result": result,
            "completed_at": now.timestamp_millis() as f64 / 1000.0,
        });
        let encoded = BASE64.encode(payload.to_string());
        let command = format!(
            "python3 - {} {}",
            sh_quote(&self.file("requests.json")),
            sh_quote(&encoded)
        );
        let out = self
            .transport
            .run("request mark", &command, Some(MARK_SCRIPT.as_bytes()))?;
        match out.trim() {
            "ok" => Ok(()),
            "missing" => {
                tracing::warn!(id, "request vanished from the queue before it was marked");
                Ok(())
            }
            other => Err(SyncError::BadResponse {
                operation: "request mark".into(),
                message: other.to_string(),
            }),
        }
    }

    /// Refresh `status.json` for the phone page.
    pub fn publish_status(&self, report: &StatusReport) -> Result<(), SyncError> {
        let json = serde_json::to_string_pretty(report).map_err(|e| SyncError::BadResponse {
            operation: "status publish".into(),
            message: e.to_string(),
        })?;
        let path = self.file("status.json");
        let tmp = format!("{path}.tmp");
        let command = format!("cat > {t} && mv {t} {p}", t = sh_quote(&tmp), p = sh_quote(&path));
        self.transport
            .run("status publish", &command, Some(json.as_bytes()))?;
        Ok(())
    }

    fn execute(request: &PendingRequest, orchestrator: &UnlockOrchestrator) -> RequestResult {
        let (success, message) = match request.kind {
            RequestKind::Unlock => match orchestrator.attempt_unlock(Trigger::Manual) {
                Ok(UnlockOutcome::Unlocked { .. }) => (
                    true,
                    format!("Unlocked for {}", format_duration(orchestrator.settings().proof_of_work_duration)),
                ),
                Ok(UnlockOutcome::AlreadyUnlocked { .. }) => (true, "Already unlocked".to_string()),
                Ok(UnlockOutcome::NotMet { description, .. }) => (false, format!("Conditions not met: {description}")),
                Err(e) => (false, e.to_string()),
            },
            RequestKind::Emergency => match orchestrator.emergency_unlock(CONFIRMATION_PHRASE) {
                Ok(grant) => (
                    true,
                    format!(
                        "Emergency unlock for {}. {} remaining today.",
                        format_duration(grant.duration_secs),
                        grant.remaining
                    ),
                ),
                Err(e) => (false, e.to_string()),
            },
            RequestKind::Unknown => (false, "Unknown request type".to_string()),
        };
        RequestResult { success, message }
    }

    /// Run every pending request once and mark it consumed.
    ///
    /// A request whose marking fails is not run again on the next call; only
    /// the marking is retried.
    pub fn process(&mut self, orchestrator: &UnlockOrchestrator) -> Result<Vec<ProcessedRequest>, SyncError> {
        let pending = self.poll()?;
        self.handled
            .retain(|id, _| pending.iter().any(|r| &r.id == id));

        let mut processed = Vec::new();
        for request in pending {
            let (result, executed) = match self.handled.get(&request.id) {
                Some(result) => (result.clone(), false),
                None => {
                    let result = Self::execute(&request, orchestrator);
                    tracing::info!(
                        id = %request.id,
                        kind = ?request.kind,
                        success = result.success,
                        message = %result.message,
                        "phone request handled"
                    );
                    self.handled.insert(request.id.clone(), result.clone());
                    (result, true)
                }
            };
            if let Err(e) = self.mark_consumed(&request.id, &result, orchestrator.clock().now()) {
                tracing::warn!(id = %request.id, error = %e, "could not mark request; will retry marking");
                continue;
            }
            processed.push(ProcessedRequest {
                request,
                result,
                executed,
            });
        }
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::testing::{RecordingSleeper, ScriptedShell};
    use crate::transport::RetryPolicy;

    fn poller(shell: Arc<ScriptedShell>) -> RequestPoller {
        let transport = Arc::new(RetryingTransport::new(
            shell,
            RetryPolicy::default(),
            Arc::new(RecordingSleeper::new()),
        ));
        RequestPoller::new(transport, "/var/lib/blockwork/")
    }

    #[test]
    fn poll_keeps_only_pending_and_accepts_both_field_names() {
        let shell = Arc::new(ScriptedShell::new());
        shell.push_ok(
            r#"[
                {"id": "a", "type": "unlock", "status": "pending", "created_at": 1767225600.5},
                {"id": "b", "kind": "emergency", "status": "pending", "submitted_at": "2026-01-01T00:00:00Z"},
                {"id": "c", "type": "unlock", "status": "completed", "created_at": 1767225000},
                {"id": "d", "type": "reboot", "status": "pending"}
            ]"#,
        );

        let pending = poller(Arc::clone(&shell)).poll().unwrap();

        let ids: Vec<&str> = pending.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d"]);
        assert_eq!(pending[1].kind, RequestKind::Emergency);
        assert_eq!(pending[2].kind, RequestKind::Unknown);
        assert!(pending[0].submitted_at.is_some());
        assert_eq!(
            shell.commands()[0],
            "cat '/var/lib/blockwork/requests.json' 2>/dev/null || echo '[]'"
        );
    }

    #[test]
    fn poll_rejects_garbage() {
        let shell = Arc::new(ScriptedShell::new());
        shell.push_ok("<html>502</html>");
        assert!(matches!(poller(shell).poll(), Err(SyncError::BadResponse { .. })));
    }

    #[test]
    fn mark_ships_script_on_stdin_and_payload_as_base64() {
        let shell = Arc::new(ScriptedShell::new());
        shell.push_ok("ok\n");
        let result = RequestResult {
            success: true,
            message: "Unlocked for 2h 0m".into(),
        };

        poller(Arc::clone(&shell))
            .mark_consumed("a", &result, Utc::now())
            .unwrap();

        let (command, stdin) = shell.calls().remove(0);
        assert!(command.starts_with("python3 - '/var/lib/blockwork/requests.json' '"));
        let encoded = command.rsplit(' ').next().unwrap().trim_matches('\'');
        let payload: serde_json::Value =
            serde_json::from_slice(&BASE64.decode(encoded).unwrap()).unwrap();
        assert_eq!(payload["id"], "a");
        assert_eq!(payload["result"]["message"], "Unlocked for 2h 0m");
        assert_eq!(stdin.as_deref(), Some(MARK_SCRIPT.as_bytes()));
    }

    #[test]
    fn mark_rejects_unexpected_output() {
        let shell = Arc::new(ScriptedShell::new());
        shell.push_ok("Traceback (most recent call last):");
        let result = RequestResult {
            success: false,
            message: String::new(),
        };
        assert!(poller(shell).mark_consumed("a", &result, Utc::now()).is_err());
    }

    #[test]
    fn poll_surfaces_transport_failure() {
        let shell = Arc::new(ScriptedShell::new());
        shell.push_err(TransportError::fatal("Permission denied (publickey)"));
        assert!(matches!(poller(shell).poll(), Err(SyncError::Fatal { .. })));
    }
}
