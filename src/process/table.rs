// Process table for the coopkern core
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use log::info;
use spin::Mutex;

use crate::blocking;
use crate::platform::Platform;
use crate::process::context::{EntryPoint, Stack};
use crate::process::pcb::{Pid, Process, ProcessError, ProcessState};
use crate::scheduler::Scheduler;

/// Owns every live process record by pid.
pub struct ProcessTable {
    next_pid: AtomicU64,
    processes: Mutex<BTreeMap<Pid, Arc<Process>>>,
    stack_size: usize,
    max_processes: usize,
}

impl ProcessTable {
    pub fn new(stack_size: usize, max_processes: usize) -> Self {
        Self {
            next_pid: AtomicU64::new(1), // Start from PID 1
            processes: Mutex::new(BTreeMap::new()),
            stack_size,
            max_processes,
        }
    }

    /// Create a process with its own stack and hand it to the scheduler.
    pub fn spawn<P: Platform>(
        &self,
        scheduler: &Scheduler<P>,
        entry: EntryPoint,
        arg: usize,
    ) -> Result<Arc<Process>, ProcessError> {
        let process = {
            let mut processes = self.processes.lock();
            if processes.len() >= self.max_processes {
                return Err(ProcessError::TooManyProcesses);
            }
            let pid = Pid::new(self.next_pid.fetch_add(1, Ordering::Relaxed));
            let mut stack = Stack::new(self.stack_size);
            let entry_sp = stack.prepare(entry, arg);
            let process = Arc::new(Process::with_stack(pid, stack, entry_sp));
            processes.insert(pid, process.clone());
            process
        };

        scheduler.add(&process);
        info!("Created process {} ({} byte stack)", process.pid(), self.stack_size);
        Ok(process)
    }

    /// Terminate a process other than the running one.
    pub fn terminate<P: Platform>(
        &self,
        scheduler: &Scheduler<P>,
        pid: Pid,
    ) -> Result<(), ProcessError> {
        let process = self.get(pid).ok_or(ProcessError::ProcessNotFound)?;
        if scheduler.is_executing(&process) {
            return Err(ProcessError::TerminatingRunning);
        }

        process.mark_terminated();
        scheduler.remove(&process);
        self.processes.lock().remove(&pid);
        info!("Terminated process {}", pid);
        Ok(())
    }

    /// Drop the table's reference to a process that is ending itself.
    pub(crate) fn forget(&self, pid: Pid) {
        if self.processes.lock().remove(&pid).is_some() {
            info!("Process {} exited", pid);
        }
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<Process>> {
        self.processes.lock().get(&pid).cloned()
    }

    /// Block a process by pid. Only the executing process may block itself.
    pub fn block_process<P: Platform>(
        &self,
        scheduler: &Scheduler<P>,
        pid: Pid,
    ) -> Result<bool, ProcessError> {
        let process = self.get(pid).ok_or(ProcessError::ProcessNotFound)?;
        Ok(blocking::block(scheduler, &process))
    }

    pub fn unblock_process<P: Platform>(
        &self,
        scheduler: &Scheduler<P>,
        pid: Pid,
    ) -> Result<bool, ProcessError> {
        let process = self.get(pid).ok_or(ProcessError::ProcessNotFound)?;
        Ok(blocking::unblock(scheduler, &process))
    }

    /// List all processes
    pub fn list<P: Platform>(&self, scheduler: &Scheduler<P>) -> Vec<(Pid, ProcessState)> {
        let processes: Vec<Arc<Process>> = self.processes.lock().values().cloned().collect();
        processes
            .iter()
            .map(|process| (process.pid(), scheduler.state_of(process)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.processes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_STACK_SIZE;
    use crate::platform::testing::Simulated;

    extern "C" fn idle_entry(_: usize) -> ! {
        unreachable!()
    }

    fn table(max: usize) -> (ProcessTable, Scheduler<Simulated>) {
        (ProcessTable::new(MIN_STACK_SIZE, max), Scheduler::new())
    }

    #[test]
    fn pids_are_unique_and_increasing() {
        let (table, scheduler) = table(8);
        let a = table.spawn(&scheduler, idle_entry, 0).unwrap();
        let b = table.spawn(&scheduler, idle_entry, 0).unwrap();
        assert!(a.pid() < b.pid());
        assert!(a.has_stack());
        assert_eq!(scheduler.ready_queue(), [a.pid(), b.pid()]);
    }

    #[test]
    fn spawn_respects_the_limit() {
        let (table, scheduler) = table(1);
        table.spawn(&scheduler, idle_entry, 0).unwrap();
        assert_eq!(
            table.spawn(&scheduler, idle_entry, 0).err(),
            Some(ProcessError::TooManyProcesses)
        );
    }

    #[test]
    fn running_process_cannot_be_terminated() {
        let (table, scheduler) = table(4);
        let a = table.spawn(&scheduler, idle_entry, 0).unwrap();
        scheduler.reschedule();
        assert_eq!(
            table.terminate(&scheduler, a.pid()),
            Err(ProcessError::TerminatingRunning)
        );
    }

    #[test]
    fn block_and_unblock_by_pid() {
        let (table, scheduler) = table(4);
        let a = table.spawn(&scheduler, idle_entry, 0).unwrap();
        let b = table.spawn(&scheduler, idle_entry, 0).unwrap();
        scheduler.reschedule();

        assert_eq!(table.block_process(&scheduler, b.pid()), Ok(false));
        assert_eq!(table.block_process(&scheduler, a.pid()), Ok(true));
        scheduler.yield_now();
        assert_eq!(
            table.list(&scheduler),
            [(a.pid(), ProcessState::Blocked), (b.pid(), ProcessState::Running)]
        );

        assert_eq!(table.unblock_process(&scheduler, a.pid()), Ok(true));
        assert_eq!(
            table.unblock_process(&scheduler, Pid::new(99)),
            Err(ProcessError::ProcessNotFound)
        );
    }
}
