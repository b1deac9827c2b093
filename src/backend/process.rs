//! Subprocess plumbing shared by the shell backends.
//!
//! A driver script is started inside the external shell with the workload's
//! sources written to a scratch directory. The driver speaks a line protocol
//! on stdin/stdout:
//!
//! - after loading it prints `ready`, or `load-error <message>` and exits;
//! - for every `run` line it calls the entry point and prints `ok` or
//!   `err <message>`;
//! - on `quit` (or EOF) it exits.
//!
//! Latency is the host-side round trip of one `run` request.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::workload::Workload;

use super::traits::{InvocationError, LoadError};

/// Scratch directory holding the driver and the workload sources.
pub(crate) struct Scratch {
    dir: TempDir,
    pub driver: PathBuf,
    pub sources: Vec<PathBuf>,
}

impl Scratch {
    /// Write `driver` and every workload source (in load order) to a fresh
    /// temporary directory.
    pub fn prepare(driver: &str, workload: &Workload) -> Result<Self, LoadError> {
        let dir = tempfile::tempdir()
            .map_err(|e| LoadError::new(format!("failed to create temp dir: {e}")))?;
        let driver_path = dir.path().join("driver.js");
        std::fs::write(&driver_path, driver)
            .map_err(|e| LoadError::new(format!("failed to write driver: {e}")))?;

        let mut sources = Vec::new();
        for (index, source) in workload.sources().enumerate() {
            let path = dir.path().join(format!("{index:02}-{}", file_name_for(&source.name)));
            std::fs::write(&path, &source.text).map_err(|e| {
                LoadError::in_source(&source.name, format!("failed to write source: {e}"))
            })?;
            sources.push(path);
        }

        Ok(Scratch {
            dir,
            driver: driver_path,
            sources,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn file_name_for(source_name: &str) -> String {
    let base = Path::new(source_name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "source.js".to_string() } else { cleaned }
}

/// A running driver process. Dropping it stops the process and removes the
/// scratch directory.
pub(crate) struct ScriptProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    replies: Receiver<String>,
    timeout: Option<Duration>,
    dead: Option<String>,
    reaped: bool,
    _scratch: Scratch,
}

impl ScriptProcess {
    /// Spawn `cmd` and wait for the driver's load handshake.
    pub fn start(
        mut cmd: Command,
        scratch: Scratch,
        timeout: Option<Duration>,
    ) -> Result<Self, LoadError> {
        cmd.current_dir(scratch.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        // Wrapper shells fork the real engine; a group lets kill reach it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| LoadError::new(format!("failed to spawn shell: {e}")))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(LoadError::new("shell stdio was not captured"));
        };

        // Detached: the thread ends at EOF or once the receiver is dropped.
        let (tx, replies) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut process = ScriptProcess {
            child,
            stdin: Some(stdin),
            replies,
            timeout,
            dead: None,
            reaped: false,
            _scratch: scratch,
        };

        // Loading the compiler library can be slow; the handshake has no timeout.
        match process.replies.recv() {
            Ok(line) if line == "ready" => Ok(process),
            Ok(line) => match line.strip_prefix("load-error ") {
                Some(message) => Err(LoadError::new(message.to_string())),
                None => Err(LoadError::new(format!("unexpected handshake: {line}"))),
            },
            Err(_) => {
                let status = process.child.wait().ok();
                process.reaped = true;
                Err(LoadError::new(format!(
                    "shell exited before loading finished (status: {})",
                    status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".into())
                )))
            }
        }
    }

    /// Issue one `run` request and time the round trip.
    pub fn round_trip(&mut self) -> Result<Duration, InvocationError> {
        if let Some(reason) = &self.dead {
            return Err(InvocationError::EngineGone(reason.clone()));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(InvocationError::EngineGone("stdin closed".into()));
        };

        let start = Instant::now();
        let written = writeln!(stdin, "run").and_then(|_| stdin.flush());
        if let Err(e) = written {
            return Err(self.mark_dead(format!("failed to write request: {e}")));
        }

        let reply = match self.timeout {
            Some(limit) => match self.replies.recv_timeout(limit) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(?limit, "invocation timed out; stopping shell");
                    self.kill();
                    self.dead = Some(format!("timed out after {limit:?}"));
                    return Err(InvocationError::TimedOut(limit));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(self.mark_dead("shell exited".into()));
                }
            },
            None => self
                .replies
                .recv()
                .map_err(|_| self.mark_dead("shell exited".into()))?,
        };
        let elapsed = start.elapsed();

        if reply == "ok" {
            Ok(elapsed)
        } else if let Some(message) = reply.strip_prefix("err ") {
            Err(InvocationError::Script(message.to_string()))
        } else {
            Err(InvocationError::Protocol(format!("unexpected reply: {reply}")))
        }
    }

    fn mark_dead(&mut self, reason: String) -> InvocationError {
        self.dead = Some(reason.clone());
        InvocationError::EngineGone(reason)
    }

    fn kill(&mut self) {
        if self.reaped {
            return;
        }
        #[cfg(unix)]
        kill_group(self.child.id());
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    let ret = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if ret == -1 {
        debug!(error = %std::io::Error::last_os_error(), "failed to signal process group");
    }
}

impl Drop for ScriptProcess {
    fn drop(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = writeln!(stdin, "quit");
        }
        // Closing stdin lets a well-behaved driver exit; kill covers the rest.
        self.kill();
        debug!("shell process released");
    }
}

/// Run `program <args>` and return the first non-empty line of its output.
pub(crate) fn probe_version(program: &Path, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| {
            let stdout = String::from_utf8_lossy(&o.stdout).to_string();
            let stderr = String::from_utf8_lossy(&o.stderr).to_string();
            stdout
                .lines()
                .chain(stderr.lines())
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_for_sanitizes() {
        assert_eq!(file_name_for("typescript.js"), "typescript.js");
        assert_eq!(file_name_for("dir/lib pack.js"), "lib_pack.js");
        assert_eq!(file_name_for(""), "source.js");
    }

    #[test]
    fn test_scratch_writes_sources_in_order() {
        use crate::workload::ScriptSource;

        let workload = Workload::new(
            "w",
            ScriptSource::new("main.js", "function f() {}"),
            "f",
            vec![ScriptSource::new("typescript.js", "var ts = {};")],
        );
        let scratch = Scratch::prepare("// driver", &workload).unwrap();
        let names: Vec<String> = scratch
            .sources
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["00-typescript.js", "01-main.js"]);
        assert_eq!(std::fs::read_to_string(&scratch.driver).unwrap(), "// driver");

        let dir = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!dir.exists());
    }
}
