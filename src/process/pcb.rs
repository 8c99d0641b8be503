// Process record for the coopkern core
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::process::context::Stack;

/// Process ID type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u64);

impl Pid {
    pub const fn new(raw: u64) -> Self {
        Pid(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling state, derived from the record flags and the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,      // Member of the ready queue
    Running,    // The scheduler's current process
    Blocked,    // Waiting to be unblocked
    Terminated, // Removed for good
}

/// Scheduling-relevant state of one process.
///
/// Records are shared as `Arc<Process>` between the process table, the
/// scheduler and drivers; the flags are atomics so interrupt handlers can
/// read them without taking a lock.
#[derive(Debug)]
pub struct Process {
    pid: Pid,
    /// Saved stack pointer while the process is not executing.
    context: AtomicUsize,
    ready: AtomicBool,
    io_wait: AtomicBool,
    terminated: AtomicBool,
    stack: Option<Stack>,
}

impl Process {
    /// A record without an execution context of its own.
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            context: AtomicUsize::new(0),
            ready: AtomicBool::new(false),
            io_wait: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            stack: None,
        }
    }

    /// A record that resumes at the top of `stack`. The stack must already
    /// be prepared; `entry_sp` is what [`Stack::prepare`] returned.
    pub fn with_stack(pid: Pid, stack: Stack, entry_sp: usize) -> Self {
        Self {
            context: AtomicUsize::new(entry_sp),
            stack: Some(stack),
            ..Self::new(pid)
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Whether the process is blocked waiting for a device event.
    pub fn io_wait(&self) -> bool {
        self.io_wait.load(Ordering::Acquire)
    }

    pub fn set_io_wait(&self, waiting: bool) {
        self.io_wait.store(waiting, Ordering::Release);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub(crate) fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::Release);
        self.io_wait.store(false, Ordering::Release);
    }

    pub fn has_stack(&self) -> bool {
        self.stack.is_some()
    }

    /// Where the switch routine stores this process's stack pointer.
    pub(crate) fn context_slot(&self) -> *mut usize {
        self.context.as_ptr()
    }

    pub(crate) fn saved_context(&self) -> usize {
        self.context.load(Ordering::Acquire)
    }
}

/// Process management errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    ProcessNotFound,
    TooManyProcesses,
    /// The running process can only end itself through `exit`.
    TerminatingRunning,
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProcessError::ProcessNotFound => write!(f, "Process not found"),
            ProcessError::TooManyProcesses => write!(f, "Process table is full"),
            ProcessError::TerminatingRunning => write!(f, "Cannot terminate the running process"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_idle() {
        let process = Process::new(Pid::new(7));
        assert_eq!(process.pid(), Pid::new(7));
        assert!(!process.is_ready());
        assert!(!process.io_wait());
        assert!(!process.is_terminated());
        assert!(!process.has_stack());
    }

    #[test]
    fn termination_clears_io_wait() {
        let process = Process::new(Pid::new(1));
        process.set_io_wait(true);
        process.mark_terminated();
        assert!(process.is_terminated());
        assert!(!process.io_wait());
    }
}
