// Configuration for the coopkern core
use core::fmt;

use log::LevelFilter;

/// Private stack given to each spawned process.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Smallest stack a process may be given.
pub const MIN_STACK_SIZE: usize = 4 * 1024;

/// Capacity of the keyboard ring buffer, in scancodes.
pub const KEYBOARD_BUFFER_SIZE: usize = 4000;

/// Upper bound on live processes in the process table.
pub const MAX_PROCESSES: usize = 64;

pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Startup configuration of a [`Kernel`](crate::Kernel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub stack_size: usize,
    pub keyboard_buffer_size: usize,
    pub max_processes: usize,
    pub log_level: LevelFilter,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            keyboard_buffer_size: KEYBOARD_BUFFER_SIZE,
            max_processes: MAX_PROCESSES,
            log_level: DEFAULT_LOG_LEVEL,
        }
    }
}

impl KernelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::StackTooSmall);
        }
        if self.keyboard_buffer_size == 0 {
            return Err(ConfigError::EmptyKeyboardBuffer);
        }
        if self.max_processes == 0 {
            return Err(ConfigError::NoProcesses);
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    StackTooSmall,
    EmptyKeyboardBuffer,
    NoProcesses,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::StackTooSmall => {
                write!(f, "Stack size below {} bytes", MIN_STACK_SIZE)
            }
            ConfigError::EmptyKeyboardBuffer => write!(f, "Keyboard buffer has no capacity"),
            ConfigError::NoProcesses => write!(f, "Process limit is zero"),
        }
    }
}
