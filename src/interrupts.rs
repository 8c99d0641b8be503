// Interrupt entry points for the coopkern core
//
// Hardware interrupt handlers take no arguments, so the single kernel
// instance is installed here once at boot. IDT setup and end-of-interrupt
// signalling belong to the caller; the handlers it installs call into the
// hooks below.
use core::fmt;

use conquer_once::spin::OnceCell;

use crate::config::{ConfigError, KernelConfig};
use crate::drivers::ps2::Ps2Controller;
use crate::platform::Bare;
use crate::Kernel;

static KERNEL: OnceCell<Kernel<Bare>> = OnceCell::uninit();

/// Create the kernel instance that interrupt entry points use.
pub fn install(config: KernelConfig) -> Result<&'static Kernel<Bare>, InstallError> {
    let kernel = Kernel::new(config).map_err(InstallError::Config)?;
    KERNEL
        .try_init_once(|| kernel)
        .map_err(|_| InstallError::AlreadyInstalled)?;
    kernel_ref().ok_or(InstallError::AlreadyInstalled)
}

/// The installed kernel, if [`install`] has run.
pub fn kernel_ref() -> Option<&'static Kernel<Bare>> {
    KERNEL.try_get().ok()
}

/// IRQ1 hook: move one scancode from the controller into the keyboard buffer.
pub fn keyboard_interrupt() {
    match kernel_ref() {
        Some(kernel) => kernel
            .keyboard()
            .handle_device_event(kernel.scheduler(), &mut Ps2Controller::new()),
        None => log::warn!("keyboard interrupt before kernel install"),
    }
}

/// Kernel install errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallError {
    AlreadyInstalled,
    Config(ConfigError),
}

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InstallError::AlreadyInstalled => write!(f, "Kernel is already installed"),
            InstallError::Config(err) => write!(f, "Invalid kernel configuration: {}", err),
        }
    }
}
