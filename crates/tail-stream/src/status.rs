//! Process memory probe for status reports.

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::warn;

/// Reads the resident memory of the current process.
pub struct StatusProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl StatusProbe {
    /// Create a probe for the current process.
    #[must_use]
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(error = %e, "Cannot determine own pid, memory will be reported as 0");
                None
            }
        };
        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }

    /// Returns the resident memory in bytes, or 0 if it cannot be read.
    #[must_use]
    pub fn allocated_memory(&self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        let mut system = self.system.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system.process(pid).map_or(0, sysinfo::Process::memory)
    }
}

impl Default for StatusProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusProbe").field("pid", &self.pid).finish_non_exhaustive()
    }
}
