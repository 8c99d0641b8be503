// coopkern: cooperative scheduling and blocking core of a small kernel
#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[cfg(not(target_arch = "x86_64"))]
compile_error!("coopkern switches x86_64 stacks and only builds for x86_64");

pub mod blocking;
pub mod config;
pub mod drivers;
pub mod interrupts;
pub mod logging;
pub mod platform;
pub mod process;
pub mod scheduler;

use alloc::sync::Arc;

use crate::config::{ConfigError, KernelConfig};
use crate::drivers::keyboard::Keyboard;
use crate::platform::Platform;
use crate::process::{EntryPoint, Pid, Process, ProcessError, ProcessTable};
use crate::scheduler::Scheduler;

/// The kernel core: one scheduler, one process table and the keyboard
/// channel. Created once at startup and handed out by reference.
pub struct Kernel<P: Platform> {
    scheduler: Scheduler<P>,
    processes: ProcessTable,
    keyboard: Keyboard<P>,
}

impl<P: Platform> Kernel<P> {
    pub fn new(config: KernelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::set_max_level(config.log_level);
        log::info!(
            "kernel core up: stack {} bytes, keyboard buffer {} bytes, {} processes max",
            config.stack_size,
            config.keyboard_buffer_size,
            config.max_processes
        );
        Ok(Self {
            scheduler: Scheduler::new(),
            processes: ProcessTable::new(config.stack_size, config.max_processes),
            keyboard: Keyboard::new(config.keyboard_buffer_size),
        })
    }

    pub fn scheduler(&self) -> &Scheduler<P> {
        &self.scheduler
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn keyboard(&self) -> &Keyboard<P> {
        &self.keyboard
    }

    /// Create a process running `entry(arg)` on its own stack and make it ready.
    pub fn spawn(&self, entry: EntryPoint, arg: usize) -> Result<Arc<Process>, ProcessError> {
        self.processes.spawn(&self.scheduler, entry, arg)
    }

    /// Terminate another process. A process ends itself with [`Kernel::exit`].
    pub fn terminate(&self, pid: Pid) -> Result<(), ProcessError> {
        self.processes.terminate(&self.scheduler, pid)
    }

    /// Terminate the calling process. Never returns to it.
    ///
    /// Called from the idle context there is nothing to terminate, so the
    /// call degrades into the idle loop.
    pub fn exit(&self) -> ! {
        match self.scheduler.executing() {
            Some(process) => {
                self.processes.forget(process.pid());
                self.scheduler.retire(process)
            }
            None => self.idle_loop(),
        }
    }

    /// Run ready processes until none is left, then return to the caller.
    ///
    /// Must be called from the idle context, never from a process.
    pub fn run_until_idle(&self) {
        while self.scheduler.has_ready() {
            self.scheduler.reschedule();
        }
    }

    /// The idle path: run whatever is ready, otherwise wait for the next
    /// interrupt to make something ready.
    pub fn idle_loop(&self) -> ! {
        loop {
            self.scheduler.reschedule();
            P::wait_for_interrupt(|| self.scheduler.has_ready());
        }
    }
}
