// Platform services the scheduler core relies on
//
// Interrupt masking, idling and the raw context switch differ between a
// bare-metal boot and running the core as an ordinary user-space program.

/// Machine-level primitives used by the [`Scheduler`](crate::scheduler::Scheduler).
pub trait Platform: 'static {
    /// Run `f` with interrupt delivery masked, restoring the previous state after.
    fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R;

    /// Called by the idle loop. Waits for an interrupt unless `ready` already
    /// reports runnable work; must not lose a wake-up between the check and
    /// the wait.
    fn wait_for_interrupt<F>(ready: F)
    where
        F: Fn() -> bool;

    /// Store the current stack pointer through `save` and resume the context
    /// whose stack pointer is `next`.
    ///
    /// # Safety
    /// `save` must stay valid until the saved context is resumed, and `next`
    /// must have been produced by a previous switch or by
    /// [`Stack::prepare`](crate::process::context::Stack::prepare).
    unsafe fn switch_context(save: *mut usize, next: usize);

    /// Whether interrupt delivery is masked right now. State shared with
    /// interrupt handlers may only be locked while this holds.
    fn interrupts_masked() -> bool;
}

/// Bare-metal x86_64: real interrupt flag and `hlt`.
pub struct Bare;

impl Platform for Bare {
    fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        x86_64::instructions::interrupts::without_interrupts(f)
    }

    fn wait_for_interrupt<F>(ready: F)
    where
        F: Fn() -> bool,
    {
        use x86_64::instructions::interrupts;

        interrupts::disable();
        if ready() {
            interrupts::enable();
        } else {
            // sti takes effect after hlt, so no interrupt can slip in between
            interrupts::enable_and_hlt();
        }
    }

    unsafe fn switch_context(save: *mut usize, next: usize) {
        crate::process::context::switch_stack(save, next)
    }

    fn interrupts_masked() -> bool {
        !x86_64::instructions::interrupts::are_enabled()
    }
}

/// The core running inside an ordinary x86_64 process. There are no device
/// interrupts, so masking is a no-op and idling spins.
pub struct Hosted;

impl Platform for Hosted {
    fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        f()
    }

    fn wait_for_interrupt<F>(ready: F)
    where
        F: Fn() -> bool,
    {
        if !ready() {
            core::hint::spin_loop();
        }
    }

    unsafe fn switch_context(save: *mut usize, next: usize) {
        crate::process::context::switch_stack(save, next)
    }

    // nothing can interrupt us
    fn interrupts_masked() -> bool {
        true
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use core::cell::Cell;

    use super::Platform;

    std::thread_local! {
        static MASK_DEPTH: Cell<usize> = Cell::new(0);
    }

    /// Scheduling without execution: the switch is recorded in the process
    /// records but control never leaves the calling test. Masking nests per
    /// thread, the way `cli`/`sti` save and restore the interrupt flag.
    pub struct Simulated;

    impl Simulated {
        /// How many `without_interrupts` sections the calling thread is in.
        pub fn mask_depth() -> usize {
            MASK_DEPTH.with(Cell::get)
        }
    }

    impl Platform for Simulated {
        fn without_interrupts<F, R>(f: F) -> R
        where
            F: FnOnce() -> R,
        {
            MASK_DEPTH.with(|depth| depth.set(depth.get() + 1));
            let result = f();
            MASK_DEPTH.with(|depth| depth.set(depth.get() - 1));
            result
        }

        fn wait_for_interrupt<F>(_ready: F)
        where
            F: Fn() -> bool,
        {
        }

        unsafe fn switch_context(_save: *mut usize, _next: usize) {}

        fn interrupts_masked() -> bool {
            Self::mask_depth() > 0
        }
    }

    #[test]
    fn masking_nests() {
        assert!(!Simulated::interrupts_masked());
        Simulated::without_interrupts(|| {
            Simulated::without_interrupts(|| assert_eq!(Simulated::mask_depth(), 2));
            assert!(Simulated::interrupts_masked());
        });
        assert_eq!(Simulated::mask_depth(), 0);
    }
}
