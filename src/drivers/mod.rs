// Device drivers built on the blocking protocol
pub mod keyboard;
pub mod ps2;

pub use keyboard::Keyboard;
pub use ps2::{KeyboardDevice, LedState, Ps2Controller};
