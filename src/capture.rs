//! Bounded, concurrent capture of child process output streams

use std::io::Read;
use std::process::Child;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

/// Timeout for collecting output from child process pipes
pub const OUTPUT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum bytes retained per stream (1MB)
pub const MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Which end of the output to keep once the capture cap is reached.
///
/// A crash at startup puts the diagnostic lines first (library load errors),
/// a hang puts them last. The default keeps the tail, which is what the
/// excerpt logic wants for timeouts and matches where R prints its errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePolicy {
    /// Stop retaining new bytes once full; the earliest output survives.
    KeepEarliest,
    /// Drop the oldest bytes as new ones arrive; the latest output survives.
    #[default]
    KeepLatest,
}

/// Buffer that enforces the capture cap and drop policy.
struct BoundedBuf {
    buf: Vec<u8>,
    cap: usize,
    policy: CapturePolicy,
    truncated: bool,
}

impl BoundedBuf {
    fn new(policy: CapturePolicy, cap: usize) -> Self {
        Self {
            buf: Vec::new(),
            cap,
            policy,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        match self.policy {
            CapturePolicy::KeepEarliest => {
                let remaining = self.cap.saturating_sub(self.buf.len());
                if remaining == 0 {
                    self.truncated = true;
                    return;
                }
                let take = chunk.len().min(remaining);
                self.buf.extend_from_slice(&chunk[..take]);
                if take < chunk.len() {
                    self.truncated = true;
                }
            }
            CapturePolicy::KeepLatest => {
                if chunk.len() >= self.cap {
                    self.truncated = self.truncated || !self.buf.is_empty() || chunk.len() > self.cap;
                    self.buf.clear();
                    self.buf.extend_from_slice(&chunk[chunk.len() - self.cap..]);
                } else {
                    let overflow = (self.buf.len() + chunk.len()).saturating_sub(self.cap);
                    if overflow > 0 {
                        self.buf.drain(..overflow);
                        self.truncated = true;
                    }
                    self.buf.extend_from_slice(chunk);
                }
            }
        }
    }

    fn into_string(self) -> String {
        let text = String::from_utf8_lossy(&self.buf).to_string();
        if !self.truncated {
            return text;
        }
        match self.policy {
            CapturePolicy::KeepEarliest => format!("{text}\n[later output dropped at capture limit]"),
            CapturePolicy::KeepLatest => format!("[earlier output dropped at capture limit]\n{text}"),
        }
    }
}

/// Read a stream to string under the capture cap, handling errors gracefully.
///
/// The stream is always drained to EOF even after the cap is hit, so the
/// child never blocks on a full pipe regardless of policy.
fn read_stream_bounded<R: Read>(mut stream: R, policy: CapturePolicy, cap: usize) -> String {
    let mut buf = BoundedBuf::new(policy, cap);
    let mut chunk = [0u8; 8192];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break, // EOF
            Ok(n) => buf.push(&chunk[..n]),
            Err(_) => {
                if buf.buf.is_empty() {
                    return "[error reading output]".to_string();
                }
                break;
            }
        }
    }

    buf.into_string()
}

/// Handle to the two reader threads draining a child's pipes.
pub struct StreamCapture {
    stdout_rx: mpsc::Receiver<String>,
    stderr_rx: mpsc::Receiver<String>,
}

impl StreamCapture {
    /// Start draining both pipes of `child`.
    ///
    /// Must be called before waiting on the child: if nobody reads, the child
    /// blocks on write() once the pipe buffer fills up (~64KB on Linux), and a
    /// sequential read of stdout-then-stderr deadlocks the same way when the
    /// child interleaves heavy output on both.
    pub fn start(child: &mut Child, policy: CapturePolicy) -> Self {
        let (stdout_tx, stdout_rx) = mpsc::channel();
        let (stderr_tx, stderr_rx) = mpsc::channel();

        if let Some(stdout) = child.stdout.take() {
            thread::spawn(move || {
                let _ = stdout_tx.send(read_stream_bounded(stdout, policy, MAX_CAPTURE_BYTES));
            });
        } else {
            let _ = stdout_tx.send(String::new());
        }

        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                let _ = stderr_tx.send(read_stream_bounded(stderr, policy, MAX_CAPTURE_BYTES));
            });
        } else {
            let _ = stderr_tx.send(String::new());
        }

        Self {
            stdout_rx,
            stderr_rx,
        }
    }

    /// Join both readers, returning `(stdout, stderr)`.
    ///
    /// The readers finish when the pipes close, i.e. after the child exits or
    /// its process group is killed; the join is bounded so a wedged pipe can
    /// never hang the harness.
    pub fn finish(self) -> (String, String) {
        let stdout = self
            .stdout_rx
            .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
            .unwrap_or_else(|_| {
                warn!("stdout reader did not finish within collection timeout");
                "[output collection timed out]".to_string()
            });
        let stderr = self
            .stderr_rx
            .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
            .unwrap_or_else(|_| {
                warn!("stderr reader did not finish within collection timeout");
                "[output collection timed out]".to_string()
            });
        (stdout, stderr)
    }
}
