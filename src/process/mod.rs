// Process management for the coopkern core
pub mod context;
pub mod pcb;
pub mod queue;
pub mod table;

pub use context::{EntryPoint, Stack};
pub use pcb::{Pid, Process, ProcessError, ProcessState};
pub use queue::ProcessQueue;
pub use table::ProcessTable;
