//! `ssh` subprocess shell.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{classify, RemoteCallOutcome, RemoteShell};
use crate::error::TransportError;

const POLL: Duration = Duration::from_millis(50);

/// Runs commands through the system `ssh` client in batch mode.
#[derive(Debug, Clone)]
pub struct SshShell {
    user: String,
    host: String,
    connect_timeout: Duration,
    attempt_timeout: Duration,
}

impl SshShell {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            connect_timeout: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(30),
        }
    }

    /// Bound a single invocation, connection included.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self.connect_timeout = self.connect_timeout.min(timeout);
        self
    }

    fn command(&self, remote_command: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)))
            .arg(format!("{}@{}", self.user, self.host))
            .arg(remote_command);
        cmd
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

impl RemoteShell for SshShell {
    fn run(&self, command: &str, stdin: Option<&[u8]>) -> RemoteCallOutcome {
        let mut child = self
            .command(command)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TransportError::fatal(format!("failed to spawn ssh: {e}")))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // A closed pipe surfaces as a failed exit status below.
            let _ = pipe.write_all(input);
        }

        let deadline = Instant::now() + self.attempt_timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(TransportError::transient(format!(
                        "ssh to {} timed out after {}s",
                        self.host,
                        self.attempt_timeout.as_secs()
                    )));
                }
                Ok(None) => thread::sleep(POLL),
                Err(e) => return Err(TransportError::fatal(format!("waiting for ssh: {e}"))),
            }
        };

        let out = stdout.join().unwrap_or_default();
        let err = stderr.join().unwrap_or_default();
        if status.success() {
            return Ok(out);
        }

        let cause = if err.trim().is_empty() {
            format!("remote command exited with {status}")
        } else {
            err.trim().to_string()
        };
        Err(TransportError {
            class: classify(&cause),
            cause,
        })
    }

    fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}
