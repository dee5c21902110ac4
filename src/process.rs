//! Process-group control for spawned validation targets

use std::process::Child;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use tracing::debug;
use wait_timeout::ChildExt;

/// Grace window between SIGTERM and SIGKILL during forced termination.
pub const KILL_GRACE_WINDOW: Duration = Duration::from_secs(2);

/// Owned handle to the process group a validation target runs in.
///
/// The target is spawned with `process_group(0)`, so its pid doubles as the
/// pgid and a single `killpg` reaches every descendant, including listeners
/// the app forks and detaches. Cleanup is one call regardless of how many
/// descendants exist.
#[derive(Debug, Clone, Copy)]
pub struct ProcessGroup {
    pgid: Option<Pid>,
}

impl ProcessGroup {
    pub fn from_child(child: &Child) -> Self {
        // A pid that does not fit i32 cannot be signalled; pgid 0 or -1 would
        // signal our own group or every reachable process instead.
        let pgid = i32::try_from(child.id()).ok().map(Pid::from_raw);
        Self { pgid }
    }

    /// Send a signal to the whole group. ESRCH (group already gone) is fine.
    fn signal(&self, signal: Signal) {
        if let Some(pgid) = self.pgid {
            match killpg(pgid, signal) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => debug!("killpg({pgid}, {signal}) failed: {e}"),
            }
        }
    }

    /// Forcefully terminate the group: SIGTERM first, then SIGKILL once the
    /// grace window passes without the direct child exiting. The child is
    /// reaped before returning so no zombie outlives the call.
    pub fn terminate(&self, child: &mut Child) {
        self.signal(Signal::SIGTERM);

        match child.wait_timeout(KILL_GRACE_WINDOW) {
            Ok(Some(_)) => {}
            _ => {
                debug!("target ignored SIGTERM, escalating to SIGKILL");
                self.signal(Signal::SIGKILL);
                // Without a group handle the signals above were no-ops; kill
                // the direct child so the wait below cannot block forever.
                let _ = child.kill();
                let _ = child.wait();
            }
        }

        // Descendants that detached from the direct child may still hold the
        // group open after the child itself is gone.
        self.signal(Signal::SIGKILL);
    }

    /// Reclaim any descendants that survived a normal exit of the direct
    /// child (e.g. a server the app started in the background). Called on
    /// every exit path.
    pub fn reap_stragglers(&self) {
        self.signal(Signal::SIGKILL);
    }
}

/// Check whether a process with the given pid is alive.
///
/// Sends the null signal, which probes existence without delivering anything.
/// EPERM means the process exists but is not ours; ESRCH means it is gone.
pub fn is_process_alive(pid: u32) -> bool {
    let pid = match i32::try_from(pid) {
        Ok(v) => v,
        Err(_) => return false,
    };

    match kill(Pid::from_raw(pid), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
