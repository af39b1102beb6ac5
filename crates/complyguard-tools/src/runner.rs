//! Subprocess execution with timeout enforcement.

use camino::Utf8PathBuf;
use complyguard_domain::CancelToken;
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Cancellation is polled at least this often while a tool runs.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Bytes kept per stream. Output past the cap is read and discarded.
pub const MAX_CAPTURE_BYTES: u64 = 16 * 1024 * 1024;

/// A fully resolved command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Utf8PathBuf,
    pub timeout: Duration,
}

/// Command execution output
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

/// Command execution errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("program not found: {program}")]
    ProgramNotFound { program: String },

    #[error("permission denied: {program}")]
    PermissionDenied { program: String },

    #[error("execution failed for '{program}': {reason}")]
    ExecutionFailed { program: String, reason: String },

    #[error("command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("command cancelled")]
    Cancelled,

    #[error("{parser} output could not be parsed: {reason}")]
    Parse { parser: &'static str, reason: String },
}

/// Runs a tool command. A seam so the adapter can be exercised without real scanners.
pub trait CommandRunner: Send + Sync {
    fn run(&self, cmd: &ToolCommand, cancel: &CancelToken) -> Result<ToolOutput, ToolError>;
}

/// Spawns real processes. stdout/stderr are drained on helper threads so a chatty tool
/// cannot block on a full pipe while we wait on it.
///
/// The timeout covers the whole run, including collecting output after the child exits: a
/// grandchild that inherited the pipes cannot hold the worker past the deadline.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, cmd: &ToolCommand, cancel: &CancelToken) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let deadline = start + cmd.timeout;
        let program = cmd.program.as_str();

        let mut child = Command::new(program)
            .args(&cmd.args)
            .current_dir(&cmd.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ToolError::ProgramNotFound {
                    program: program.to_string(),
                },
                io::ErrorKind::PermissionDenied => ToolError::PermissionDenied {
                    program: program.to_string(),
                },
                _ => ToolError::ExecutionFailed {
                    program: program.to_string(),
                    reason: e.to_string(),
                },
            })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let exec_failed = |e: io::Error| ToolError::ExecutionFailed {
            program: program.to_string(),
            reason: e.to_string(),
        };
        let timed_out = || ToolError::Timeout {
            timeout_ms: cmd.timeout.as_millis() as u64,
        };

        let status = loop {
            let now = Instant::now();
            if now >= deadline {
                break None;
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Cancelled);
            }
            let slice = (deadline - now).min(CANCEL_POLL);
            if let Some(status) = child.wait_timeout(slice).map_err(exec_failed)? {
                break Some(status);
            }
        };

        let Some(status) = status else {
            // Reader threads are left behind: a grandchild may still hold the pipes open.
            let _ = child.kill();
            let _ = child.wait();
            return Err(timed_out());
        };

        let stdout = collect(stdout, deadline, cancel).map_err(|e| e.into_tool_error(cmd))?;
        let stderr = collect(stderr, deadline, cancel).map_err(|e| e.into_tool_error(cmd))?;

        Ok(ToolOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut pipe = pipe;
        let mut buf = Vec::new();
        let _ = pipe.by_ref().take(MAX_CAPTURE_BYTES).read_to_end(&mut buf);
        let _ = io::copy(&mut pipe, &mut io::sink());
        let _ = tx.send(buf);
    });
    rx
}

enum CollectError {
    Expired,
    Cancelled,
}

impl CollectError {
    fn into_tool_error(self, cmd: &ToolCommand) -> ToolError {
        match self {
            CollectError::Expired => ToolError::Timeout {
                timeout_ms: cmd.timeout.as_millis() as u64,
            },
            CollectError::Cancelled => ToolError::Cancelled,
        }
    }
}

/// Wait for a reader thread until `deadline`, polling `cancel` on the way.
fn collect(
    rx: Option<Receiver<Vec<u8>>>,
    deadline: Instant,
    cancel: &CancelToken,
) -> Result<String, CollectError> {
    let Some(rx) = rx else {
        return Ok(String::new());
    };
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(CollectError::Expired);
        }
        if cancel.is_cancelled() {
            return Err(CollectError::Cancelled);
        }
        match rx.recv_timeout((deadline - now).min(CANCEL_POLL)) {
            Ok(bytes) => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(String::new()),
        }
    }
}
