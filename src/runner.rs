//! Child process lifecycle for a single validation run

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::capture::StreamCapture;
use crate::launch::LaunchSpec;
use crate::process::ProcessGroup;

/// Terminal condition of one run, before classification.
#[derive(Debug)]
pub enum RunOutcome {
    /// Process exited on its own before the deadline.
    Exited {
        exit_code: Option<i32>,
        success: bool,
        stdout: String,
        stderr: String,
    },
    /// Deadline elapsed; the process tree was forcefully terminated.
    DeadlineExpired { stdout: String, stderr: String },
    /// The runtime executable could not be spawned at all.
    SpawnFailed { error: io::Error },
}

/// Run the target once, racing process exit against the deadline.
///
/// Whichever arm is returned, nothing spawned here outlives the call: every
/// exit path funnels through a process-group kill before the streams are
/// joined, and the pipes close with the group.
pub fn run(spec: &LaunchSpec) -> Result<RunOutcome> {
    let mut cmd = Command::new(&spec.runtime);
    cmd.arg(&spec.entry_filename)
        .current_dir(&spec.app_dir)
        // Keep R from trying to open a browser for the app
        .env("R_BROWSER", "false")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Own process group, so tree-kill is a single killpg
        .process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(error) => return Ok(RunOutcome::SpawnFailed { error }),
    };

    let group = ProcessGroup::from_child(&child);
    debug!(
        pid = child.id(),
        runtime = %spec.runtime,
        entry = %spec.entry_filename,
        "spawned validation target"
    );

    // Readers must start before the wait: with nobody draining, the child
    // blocks on write() once a pipe buffer fills up (~64KB on Linux).
    let capture = StreamCapture::start(&mut child, spec.capture_policy);

    let started = Instant::now();
    match child.wait_timeout(spec.deadline) {
        Ok(Some(status)) => {
            // The direct child is reaped, but it may have left a listener
            // behind in the group.
            group.reap_stragglers();
            let (stdout, stderr) = capture.finish();
            debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                exit_code = ?status.code(),
                "target exited before deadline"
            );
            Ok(RunOutcome::Exited {
                exit_code: status.code(),
                success: status.success(),
                stdout,
                stderr,
            })
        }
        Ok(None) => {
            debug!(
                deadline_secs = spec.deadline.as_secs(),
                "deadline elapsed, terminating process group"
            );
            group.terminate(&mut child);
            let (stdout, stderr) = capture.finish();
            Ok(RunOutcome::DeadlineExpired { stdout, stderr })
        }
        Err(e) => {
            warn!("wait on validation target failed: {e}");
            group.terminate(&mut child);
            let _ = capture.finish();
            Err(e).context("failed to wait for validation target")
        }
    }
}
