//! Block/unblock protocol between drivers and the scheduler.
//!
//! A consumer that has to wait blocks *itself* and then yields:
//!
//! ```text
//! process.set_io_wait(true);
//! blocking::block(scheduler, &process);
//! scheduler.yield_now();
//! ```
//!
//! A producer (usually an interrupt handler) later calls [`unblock`], which
//! puts the process back at the tail of the ready queue. Nothing here waits
//! or allocates, so both halves are safe to call from interrupt context.

use alloc::sync::Arc;

use log::{debug, warn};

use crate::platform::Platform;
use crate::process::pcb::Process;
use crate::scheduler::Scheduler;

/// Move the calling process from running to blocked.
///
/// Must be issued by the process itself, right before it yields. Returns
/// `false` and leaves everything untouched when `process` is not the one
/// executing.
pub fn block<P: Platform>(scheduler: &Scheduler<P>, process: &Process) -> bool {
    if !scheduler.is_executing(process) {
        warn!(
            "block: process {} is not the executing process, ignored",
            process.pid()
        );
        return false;
    }
    scheduler.remove(process);
    debug!("block: {} blocked", process.pid());
    true
}

/// Make a blocked process ready again, behind every process already queued.
///
/// Returns `false` if there was nothing to do: the process is already
/// ready, is the current process, or has terminated.
pub fn unblock<P: Platform>(scheduler: &Scheduler<P>, process: &Arc<Process>) -> bool {
    P::without_interrupts(|| {
        process.set_io_wait(false);
        if process.is_terminated() || process.is_ready() || scheduler.is_current(process) {
            return false;
        }
        scheduler.add(process);
        debug!("unblock: {} ready", process.pid());
        true
    })
}
