// Serial logging for the coopkern core
use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;
use uart_16550::SerialPort;

/// I/O base of the first serial port.
pub const COM1: u16 = 0x3F8;

/// `log` backend writing one line per record to a 16550 UART.
pub struct SerialLogger {
    port: Mutex<Option<SerialPort>>,
}

static LOGGER: SerialLogger = SerialLogger {
    port: Mutex::new(None),
};

/// Route `log` records to COM1. Call once at boot, before the first record.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    // SAFETY: COM1 is a standard UART port reserved for the kernel log
    let mut port = unsafe { SerialPort::new(COM1) };
    port.init();
    *LOGGER.port.lock() = Some(port);

    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// One log line: `[LEVEL target] message`.
fn write_record(out: &mut impl Write, record: &Record) -> fmt::Result {
    write!(out, "[{:<5} {}] {}\r\n", record.level(), record.target(), record.args())
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // an interrupt handler logging while we hold the port would deadlock
        x86_64::instructions::interrupts::without_interrupts(|| {
            if let Some(port) = self.port.lock().as_mut() {
                let _ = write_record(port, record);
            }
        });
    }

    fn flush(&self) {}
}
