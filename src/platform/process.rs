//! Process liveness via sysinfo.

use super::ProcessTable;
use crate::data::ProcessId;
use sysinfo::{Pid, ProcessRefreshKind, System};

/// Checks one pid at a time with a per-pid refresh instead of a full
/// process-table scan. Each check starts from an empty table so exited
/// processes are never reported from an earlier refresh.
#[derive(Debug, Default)]
pub struct SysinfoProcessTable;

impl SysinfoProcessTable {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessTable for SysinfoProcessTable {
    fn is_alive(&self, pid: ProcessId) -> bool {
        if pid == 0 {
            return false;
        }

        let mut sys = System::new();
        let sysinfo_pid = Pid::from(pid as usize);
        sys.refresh_process_specifics(sysinfo_pid, ProcessRefreshKind::new())
            && sys.process(sysinfo_pid).is_some()
    }
}
