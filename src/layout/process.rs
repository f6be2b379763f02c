//! External-process layout engine
//!
//! Runs the configured program once per request:
//! 1. Spawn with all three standard streams piped
//! 2. Feed stdin from a writer thread, then close it
//! 3. Drain stdout and stderr on reader threads so a large layout never
//!    stalls on a full pipe buffer
//! 4. Wait, bounded by the configured timeout (the child is killed on expiry)
//! 5. Collect the pipe threads against the same deadline, since a process
//!    the engine leaves behind can hold its pipes open after it exits

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{decode_output, encode_input, LayoutEngine, LayoutError, LayoutResult};
use crate::config::LayoutConfig;
use crate::models::{Edge, Node};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Layout engine reached through a child process.
#[derive(Debug, Clone)]
pub struct ProcessLayoutEngine {
    program: String,
    args: Vec<String>,
    /// None = wait indefinitely
    timeout: Option<Duration>,
    /// Extra attempts after a retryable failure
    retries: u32,
}

impl ProcessLayoutEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            retries: 0,
        }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        let engine = Self::new(config.program()).with_args(config.args());
        let engine = match config.timeout_secs() {
            0 => engine,
            secs => engine.with_timeout(Duration::from_secs(secs)),
        };
        engine.with_retries(config.retries())
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// One full round trip through the child process, returning its stdout.
    fn run_once(&self, input: &str) -> Result<String, LayoutError> {
        debug!("Running layout engine: {} {:?}", self.program, self.args);

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    LayoutError::NotFound {
                        program: self.program.clone(),
                    }
                } else {
                    LayoutError::Spawn(e)
                }
            })?;
        let mut child = ChildGuard::new(child);
        let deadline = self.timeout.map(|t| Instant::now() + t);

        let writer = child.child.stdin.take().map(|mut stdin| {
            let bytes = input.as_bytes().to_vec();
            background(move || {
                stdin.write_all(&bytes)?;
                stdin.flush()
                // stdin dropped here, closing the pipe
            })
        });
        let stdout = child.child.stdout.take().map(drain);
        let stderr = child.child.stderr.take().map(drain);

        let Some(status) = self.wait(&mut child, deadline)? else {
            // Pipe threads finish on their own once the pipes close; they
            // are not waited for here.
            return Err(self.timed_out());
        };

        if let Some(pending) = writer {
            match self.collect(pending, deadline)? {
                Ok(()) => {}
                // The engine may stop reading once it has what it needs
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("Layout engine closed stdin early");
                }
                Err(e) => return Err(LayoutError::Io(e)),
            }
        }

        let stdout = match stdout {
            Some(pending) => self.collect(pending, deadline)??,
            None => Vec::new(),
        };
        let stderr = match stderr {
            Some(pending) => self.collect(pending, deadline)??,
            None => Vec::new(),
        };

        if !status.success() {
            return Err(LayoutError::Exit {
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    /// Wait for the child; `None` means the deadline passed and the child
    /// was killed.
    fn wait(
        &self,
        child: &mut ChildGuard,
        deadline: Option<Instant>,
    ) -> Result<Option<ExitStatus>, LayoutError> {
        let Some(deadline) = deadline else {
            return Ok(Some(child.wait()?));
        };

        loop {
            if let Some(status) = child.child.try_wait()? {
                child.reaped = true;
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                child.kill();
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Result of a pipe thread, or `Timeout` once the deadline has passed.
    fn collect<T>(
        &self,
        pending: Pending<T>,
        deadline: Option<Instant>,
    ) -> Result<std::io::Result<T>, LayoutError> {
        let received = match deadline {
            Some(deadline) => {
                pending.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => pending.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => {
                debug!("Layout engine exited but its pipes are still open");
                Err(self.timed_out())
            }
            Err(RecvTimeoutError::Disconnected) => Err(LayoutError::Io(std::io::Error::other(
                "layout engine pipe thread panicked",
            ))),
        }
    }

    fn timed_out(&self) -> LayoutError {
        let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
        warn!("Layout engine timed out after {}s", secs);
        LayoutError::Timeout { secs }
    }
}

impl LayoutEngine for ProcessLayoutEngine {
    fn render(&self, nodes: &[Node], edges: &[Edge]) -> Result<LayoutResult, LayoutError> {
        if nodes.is_empty() {
            return Ok(LayoutResult::empty());
        }

        let input = encode_input(nodes, edges)?;
        let mut attempt = 0;
        loop {
            match self.run_once(&input).and_then(|out| decode_output(&out)) {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.retries && e.is_retryable() => {
                    attempt += 1;
                    warn!("Layout engine failed ({}), retrying ({}/{})", e, attempt, self.retries);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Kills and reaps the child on every exit path that did not already wait
/// for it.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill();
        }
    }
}

/// Outcome of work running on a pipe thread.
type Pending<T> = Receiver<std::io::Result<T>>;

fn background<T, F>(work: F) -> Pending<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // Receiver is gone when the run already gave up on this pipe
        let _ = tx.send(work());
    });
    rx
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Pending<Vec<u8>> {
    background(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}
