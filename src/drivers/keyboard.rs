//! Keyboard driver: the interrupt handler produces scancodes, one registered
//! process consumes them.
//!
//! Scancodes go through a fixed-size ring buffer. When the consumer outruns
//! the buffer the oldest unread scancode is overwritten; the hardware gets no
//! backpressure. Only one consumer can be registered at a time and a new
//! registration replaces the old one.

use alloc::sync::Arc;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;
use log::{info, warn};
use pc_keyboard::{layouts, DecodedKey, HandleControl, ScancodeSet1};
use spin::{Mutex, MutexGuard};

use crate::blocking;
use crate::drivers::ps2::KeyboardDevice;
use crate::platform::Platform;
use crate::process::pcb::Process;
use crate::scheduler::Scheduler;

type Decoder = pc_keyboard::Keyboard<layouts::Us104Key, ScancodeSet1>;

pub struct Keyboard<P: Platform> {
    buffer: ArrayQueue<u8>,
    /// Shared with the interrupt handler: only locked with interrupts masked.
    consumer: Mutex<Option<Arc<Process>>>,
    decoder: Mutex<Decoder>,
    dropped: AtomicU64,
    _platform: PhantomData<fn() -> P>,
}

/// One pass of the consumer's read loop.
enum Attempt {
    Read(u8),
    Parked(Arc<Process>),
}

impl<P: Platform> Keyboard<P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: ArrayQueue::new(capacity),
            consumer: Mutex::new(None),
            decoder: Mutex::new(Decoder::new(
                ScancodeSet1::new(),
                layouts::Us104Key,
                HandleControl::Ignore,
            )),
            dropped: AtomicU64::new(0),
            _platform: PhantomData,
        }
    }

    fn consumer_slot(&self) -> MutexGuard<'_, Option<Arc<Process>>> {
        debug_assert!(
            P::interrupts_masked(),
            "keyboard consumer locked with interrupts enabled"
        );
        self.consumer.lock()
    }

    /// Make `process` the only process allowed to read scancodes.
    pub fn register_consumer(&self, process: &Arc<Process>) {
        let previous = P::without_interrupts(|| self.consumer_slot().replace(process.clone()));
        match previous {
            Some(previous) if !Arc::ptr_eq(&previous, process) => info!(
                "keyboard: consumer {} replaced by {}",
                previous.pid(),
                process.pid()
            ),
            _ => info!("keyboard: consumer is {}", process.pid()),
        }
    }

    pub fn consumer(&self) -> Option<Arc<Process>> {
        P::without_interrupts(|| self.consumer_slot().clone())
    }

    /// Producer side, called from the keyboard interrupt: take one scancode
    /// from the device and queue it.
    pub fn handle_device_event<D>(&self, scheduler: &Scheduler<P>, device: &mut D)
    where
        D: KeyboardDevice,
    {
        let scancode = device.read_scancode();
        self.push_scancode(scheduler, scancode);
    }

    /// Queue a scancode and wake the consumer if it is waiting for one.
    pub fn push_scancode(&self, scheduler: &Scheduler<P>, scancode: u8) {
        if let Some(lost) = self.buffer.force_push(scancode) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "keyboard: buffer full, dropped scancode {:#04x} ({} so far)",
                lost, dropped
            );
        }

        P::without_interrupts(|| {
            let consumer = self.consumer_slot().clone();
            if let Some(consumer) = consumer {
                if consumer.io_wait() {
                    blocking::unblock(scheduler, &consumer);
                }
            }
        });
    }

    /// Consumer side: the next scancode, blocking while there is none.
    ///
    /// Returns `None` at once when the caller is not the registered consumer.
    pub fn read_scancode(&self, scheduler: &Scheduler<P>) -> Option<u8> {
        loop {
            // lookup, empty check, io_wait and block form one masked section
            // so the producer cannot wake us before we are blocked
            let attempt = P::without_interrupts(|| {
                let consumer = self.consumer_slot().clone()?;
                if !scheduler.is_current(&consumer) {
                    return None;
                }
                Some(match self.buffer.pop() {
                    Some(scancode) => {
                        consumer.set_io_wait(false);
                        Attempt::Read(scancode)
                    }
                    None => {
                        consumer.set_io_wait(true);
                        blocking::block(scheduler, &consumer);
                        Attempt::Parked(consumer)
                    }
                })
            })?;
            match attempt {
                Attempt::Read(scancode) => return Some(scancode),
                Attempt::Parked(consumer) => {
                    scheduler.yield_now();
                    consumer.set_io_wait(false);
                }
            }
        }
    }

    /// Consumer side: the next decoded key press.
    pub fn read_key(&self, scheduler: &Scheduler<P>) -> Option<DecodedKey> {
        loop {
            let scancode = self.read_scancode(scheduler)?;
            let mut decoder = self.decoder.lock();
            if let Ok(Some(event)) = decoder.add_byte(scancode) {
                if let Some(key) = decoder.process_keyevent(event) {
                    return Some(key);
                }
            }
        }
    }

    /// Scancodes waiting to be read.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Scancodes lost to overwrites since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
