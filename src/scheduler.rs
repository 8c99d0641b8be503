// Round-robin scheduler for the coopkern core
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::{debug, trace};
use spin::Mutex;

use crate::platform::Platform;
use crate::process::pcb::{Pid, Process, ProcessState};
use crate::process::queue::ProcessQueue;

/// Cooperative round-robin scheduler.
///
/// `current` is the process the scheduler considers running. `executing` is
/// the process whose stack the CPU is on; the two differ only between a
/// process blocking or exiting and the reschedule that follows.
pub struct Scheduler<P: Platform> {
    state: Mutex<SchedulerState>,
    /// Saved stack pointer of the idle context (boot or idle loop).
    idle_context: AtomicUsize,
    /// Sink for the context of a process that will never be resumed.
    discard: AtomicUsize,
    total_switches: AtomicU64,
    _platform: PhantomData<fn() -> P>,
}

struct SchedulerState {
    queue: ProcessQueue,
    current: Option<Arc<Process>>,
    executing: Option<Arc<Process>>,
    /// A self-terminated process kept alive until execution left its stack.
    dying: Option<Arc<Process>>,
}

impl SchedulerState {
    /// Release the dying process unless we are still running on its stack.
    fn reap(&mut self) -> Option<Arc<Process>> {
        match (&self.dying, &self.executing) {
            (Some(dying), Some(executing)) if Arc::ptr_eq(dying, executing) => None,
            _ => self.dying.take(),
        }
    }

    fn is_current(&self, process: &Process) -> bool {
        self.current
            .as_ref()
            .is_some_and(|current| core::ptr::eq(Arc::as_ptr(current), process))
    }

    fn enqueue(&mut self, process: Arc<Process>) {
        if process.is_terminated() {
            return;
        }
        process.set_io_wait(false);
        process.set_ready(true);
        self.queue.push(process);
    }

    /// Round robin: the head of the ready queue.
    fn choose_next(&mut self) -> Option<Arc<Process>> {
        let next = self.queue.pop_front()?;
        next.set_ready(false);
        Some(next)
    }
}

/// Where the context switch goes
struct Switch {
    save: *mut usize,
    next: usize,
}

impl<P: Platform> Scheduler<P> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                queue: ProcessQueue::new(),
                current: None,
                executing: None,
                dying: None,
            }),
            idle_context: AtomicUsize::new(0),
            discard: AtomicUsize::new(0),
            total_switches: AtomicU64::new(0),
            _platform: PhantomData,
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SchedulerState) -> R) -> R {
        P::without_interrupts(|| f(&mut self.state.lock()))
    }

    /// Make a process eligible to run, behind every process already queued.
    pub fn add(&self, process: &Arc<Process>) {
        debug!("scheduler: add {}", process.pid());
        self.with_state(|state| state.enqueue(process.clone()));
    }

    /// Take a process out of scheduling consideration. If it is the current
    /// process, there is no current process afterwards.
    pub fn remove(&self, process: &Process) {
        debug!("scheduler: remove {}", process.pid());
        self.with_state(|state| {
            state.queue.remove(process);
            process.set_ready(false);
            if state.is_current(process) {
                state.current = None;
            }
        });
    }

    /// The running process, or `None` when the system is idle.
    pub fn current(&self) -> Option<Arc<Process>> {
        self.with_state(|state| state.current.clone())
    }

    pub fn is_current(&self, process: &Process) -> bool {
        self.with_state(|state| state.is_current(process))
    }

    /// The process whose stack is in use, even if it already blocked.
    pub(crate) fn executing(&self) -> Option<Arc<Process>> {
        self.with_state(|state| state.executing.clone())
    }

    pub(crate) fn is_executing(&self, process: &Process) -> bool {
        self.with_state(|state| {
            state
                .executing
                .as_ref()
                .is_some_and(|executing| core::ptr::eq(Arc::as_ptr(executing), process))
        })
    }

    pub fn has_ready(&self) -> bool {
        self.with_state(|state| !state.queue.is_empty())
    }

    /// Pids in the ready queue, head first.
    pub fn ready_queue(&self) -> Vec<Pid> {
        self.with_state(|state| state.queue.iter().map(|p| p.pid()).collect())
    }

    pub fn state_of(&self, process: &Process) -> ProcessState {
        if process.is_terminated() {
            ProcessState::Terminated
        } else if process.is_ready() {
            ProcessState::Ready
        } else if self.is_current(process) {
            ProcessState::Running
        } else {
            ProcessState::Blocked
        }
    }

    /// Save the executing context, pick the next ready process and resume it.
    ///
    /// Returns once this context is selected again. When nothing is ready a
    /// process hands the CPU to the idle context; called from the idle
    /// context with nothing ready it returns at once.
    pub fn reschedule(&self) {
        let (switch, reaped) = self.with_state(|state| {
            let reaped = state.reap();
            (self.prepare_switch(state), reaped)
        });
        drop(reaped);

        if let Some(switch) = switch {
            self.total_switches.fetch_add(1, Ordering::Relaxed);
            // SAFETY: `save` points into a live process record, the idle slot
            // or the discard slot, all of which outlive the switch; `next` was
            // saved by an earlier switch or prepared at spawn.
            unsafe { P::switch_context(switch.save, switch.next) };

            // resumed: whoever ran before us may have exited
            drop(self.with_state(SchedulerState::reap));
        }
    }

    fn prepare_switch(&self, state: &mut SchedulerState) -> Option<Switch> {
        let previous = state.executing.take();
        let save = match &previous {
            Some(process) if process.is_terminated() => self.discard.as_ptr(),
            Some(process) => process.context_slot(),
            None => self.idle_context.as_ptr(),
        };

        match state.choose_next() {
            Some(next) => {
                state.current = Some(next.clone());
                state.executing = Some(next.clone());
                if previous.as_ref().is_some_and(|p| Arc::ptr_eq(p, &next)) {
                    trace!("scheduler: {} keeps the cpu", next.pid());
                    return None;
                }
                trace!(
                    "scheduler: switch {} -> {}",
                    DisplayPid(previous.as_deref()),
                    next.pid()
                );
                Some(Switch {
                    save,
                    next: next.saved_context(),
                })
            }
            None => {
                state.current = None;
                // a process with nothing to switch to hands back to idle
                previous.map(|process| {
                    trace!("scheduler: {} -> idle", process.pid());
                    Switch {
                        save,
                        next: self.idle_context.load(Ordering::Acquire),
                    }
                })
            }
        }
    }

    /// Give up the CPU. If the caller is still the current process it goes
    /// to the back of the ready queue first; a caller that blocked stays out.
    pub fn yield_now(&self) {
        self.with_state(|state| {
            if let Some(current) = state.current.clone() {
                state.enqueue(current);
            }
        });
        self.reschedule();
    }

    /// Terminate the executing process and switch away for good.
    pub(crate) fn retire(&self, process: Arc<Process>) -> ! {
        let pid = process.pid();
        debug!("scheduler: retire {}", pid);
        let previous = self.with_state(|state| {
            process.mark_terminated();
            process.set_ready(false);
            state.queue.remove(&process);
            if state.is_current(&process) {
                state.current = None;
            }
            state.dying.replace(process)
        });
        // an earlier dying process is no longer on the CPU
        drop(previous);

        self.reschedule();
        panic!("terminated process {} was resumed", pid);
    }

    /// Get total context switches
    pub fn total_switches(&self) -> u64 {
        self.total_switches.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> SchedulerStats {
        let (current, ready) = self.with_state(|state| {
            (state.current.as_ref().map(|p| p.pid()), state.queue.len())
        });
        SchedulerStats {
            current,
            ready,
            total_switches: self.total_switches(),
        }
    }
}

impl<P: Platform> Default for Scheduler<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub current: Option<Pid>,
    pub ready: usize,
    pub total_switches: u64,
}

struct DisplayPid<'a>(Option<&'a Process>);

impl core::fmt::Display for DisplayPid<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.0 {
            Some(process) => write!(f, "{}", process.pid()),
            None => write!(f, "idle"),
        }
    }
}
