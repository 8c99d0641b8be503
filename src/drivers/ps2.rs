// PS/2 keyboard controller access
use x86_64::instructions::port::{Port, PortReadOnly};

const DATA_PORT: u16 = 0x60;
const STATUS_PORT: u16 = 0x64;

/// Status register bit set while the controller input buffer is full.
const INPUT_BUFFER_FULL: u8 = 0x2;

/// Keyboard command: the next data byte is the LED mask.
pub const SET_LEDS: u8 = 0xED;

/// The hardware side of a keyboard: where scancodes come from and where
/// commands go.
pub trait KeyboardDevice {
    /// Read the scancode that raised the interrupt.
    fn read_scancode(&mut self) -> u8;

    /// Send one command or data byte to the keyboard.
    fn send(&mut self, byte: u8);

    /// Switch the lock-key LEDs.
    fn set_leds(&mut self, leds: LedState) {
        self.send(SET_LEDS);
        self.send(leds.bits());
    }
}

/// Lock-key indicator LEDs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedState {
    pub caps_lock: bool,
    pub num_lock: bool,
    pub scroll_lock: bool,
}

impl LedState {
    /// Bit mask sent after [`SET_LEDS`].
    pub fn bits(self) -> u8 {
        let mut bits = 0;
        if self.scroll_lock {
            bits |= 1;
        }
        if self.num_lock {
            bits |= 2;
        }
        if self.caps_lock {
            bits |= 4;
        }
        bits
    }
}

/// The i8042 controller on the legacy I/O ports.
pub struct Ps2Controller {
    data: Port<u8>,
    status: PortReadOnly<u8>,
}

impl Ps2Controller {
    pub fn new() -> Self {
        Self {
            data: Port::new(DATA_PORT),
            status: PortReadOnly::new(STATUS_PORT),
        }
    }

    fn wait_input_clear(&mut self) {
        // SAFETY: reading the i8042 status register has no side effects
        while unsafe { self.status.read() } & INPUT_BUFFER_FULL != 0 {
            core::hint::spin_loop();
        }
    }
}

impl Default for Ps2Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardDevice for Ps2Controller {
    fn read_scancode(&mut self) -> u8 {
        // SAFETY: port 0x60 holds the pending scancode in keyboard interrupt context
        unsafe { self.data.read() }
    }

    fn send(&mut self, byte: u8) {
        self.wait_input_clear();
        // SAFETY: the controller accepts a data byte once its input buffer is empty
        unsafe { self.data.write(byte) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    struct Recorder(Vec<u8>);

    impl KeyboardDevice for Recorder {
        fn read_scancode(&mut self) -> u8 {
            0
        }

        fn send(&mut self, byte: u8) {
            self.0.push(byte);
        }
    }

    #[test]
    fn leds_are_sent_as_command_and_mask() {
        let mut device = Recorder(Vec::new());
        device.set_leds(LedState {
            caps_lock: true,
            num_lock: true,
            scroll_lock: false,
        });
        assert_eq!(device.0, [SET_LEDS, 0b110]);
    }

    #[test]
    fn led_bits() {
        assert_eq!(LedState::default().bits(), 0);
        let all = LedState {
            caps_lock: true,
            num_lock: true,
            scroll_lock: true,
        };
        assert_eq!(all.bits(), 0b111);
        let caps = LedState {
            caps_lock: true,
            ..LedState::default()
        };
        assert_eq!(caps.bits(), 4);
    }
}
