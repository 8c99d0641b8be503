// Ready queue for the coopkern scheduler
use alloc::collections::VecDeque;
use alloc::sync::Arc;

use crate::process::pcb::Process;

/// FIFO of ready processes. Membership is by identity of the shared record.
#[derive(Debug, Default)]
pub struct ProcessQueue {
    entries: VecDeque<Arc<Process>>,
}

impl ProcessQueue {
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append to the tail. A process that is already queued keeps its place.
    pub fn push(&mut self, process: Arc<Process>) -> bool {
        if self.contains(&process) {
            return false;
        }
        self.entries.push_back(process);
        true
    }

    /// Remove the process wherever it sits.
    pub fn remove(&mut self, process: &Process) -> Option<Arc<Process>> {
        let index = self
            .entries
            .iter()
            .position(|queued| core::ptr::eq(Arc::as_ptr(queued), process))?;
        self.entries.remove(index)
    }

    pub fn pop_front(&mut self) -> Option<Arc<Process>> {
        self.entries.pop_front()
    }

    pub fn contains(&self, process: &Process) -> bool {
        self.entries
            .iter()
            .any(|queued| core::ptr::eq(Arc::as_ptr(queued), process))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued processes, head first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Process>> {
        self.entries.iter()
    }
}
