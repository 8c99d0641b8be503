// Real context switches on private stacks, driven from the test thread as
// the idle context.
use std::sync::atomic::{AtomicUsize, Ordering};

use coopkern::config::KernelConfig;
use coopkern::platform::Hosted;
use coopkern::process::ProcessState;
use coopkern::Kernel;
use spin::Mutex;

struct Harness {
    kernel: Kernel<Hosted>,
    trace: Mutex<Vec<u64>>,
    finished: AtomicUsize,
}

impl Harness {
    fn new() -> Self {
        Self {
            kernel: Kernel::new(KernelConfig::default()).unwrap(),
            trace: Mutex::new(Vec::new()),
            finished: AtomicUsize::new(0),
        }
    }

    fn arg(&self) -> usize {
        self as *const Harness as usize
    }

    fn from_arg<'a>(arg: usize) -> &'a Harness {
        // SAFETY: every test keeps its harness alive until the processes exit
        unsafe { &*(arg as *const Harness) }
    }

    fn record_self(&self) {
        let pid = self.kernel.scheduler().current().unwrap().pid();
        self.trace.lock().push(pid.as_u64());
    }
}

extern "C" fn take_turns(arg: usize) -> ! {
    let harness = Harness::from_arg(arg);
    for _ in 0..3 {
        harness.record_self();
        harness.kernel.scheduler().yield_now();
    }
    harness.finished.fetch_add(1, Ordering::SeqCst);
    harness.kernel.exit()
}

extern "C" fn run_once(arg: usize) -> ! {
    let harness = Harness::from_arg(arg);
    harness.record_self();
    harness.finished.fetch_add(1, Ordering::SeqCst);
    harness.kernel.exit()
}

#[test]
fn processes_run_and_return_to_idle() {
    let harness = Harness::new();
    harness.kernel.spawn(run_once, harness.arg()).unwrap();
    harness.kernel.run_until_idle();

    assert_eq!(harness.finished.load(Ordering::SeqCst), 1);
    assert!(harness.kernel.scheduler().current().is_none());
    assert!(harness.kernel.processes().is_empty());
}

#[test]
fn yielding_processes_rotate_round_robin() {
    let harness = Harness::new();
    let pids: Vec<u64> = (0..3)
        .map(|_| {
            harness
                .kernel
                .spawn(take_turns, harness.arg())
                .unwrap()
                .pid()
                .as_u64()
        })
        .collect();

    harness.kernel.run_until_idle();

    let expected: Vec<u64> = pids.iter().cycle().take(9).copied().collect();
    assert_eq!(*harness.trace.lock(), expected);
    assert_eq!(harness.finished.load(Ordering::SeqCst), 3);
    assert!(harness.kernel.processes().is_empty());
}

#[test]
fn stacks_keep_their_locals_across_switches() {
    extern "C" fn count(arg: usize) -> ! {
        let harness = Harness::from_arg(arg);
        let mut local = [0u64; 16];
        for round in 0..4u64 {
            for slot in local.iter_mut() {
                *slot += round;
            }
            harness.kernel.scheduler().yield_now();
        }
        // 0 + 1 + 2 + 3 in every slot
        if local.iter().all(|&slot| slot == 6) {
            harness.finished.fetch_add(1, Ordering::SeqCst);
        }
        harness.kernel.exit()
    }

    let harness = Harness::new();
    for _ in 0..2 {
        harness.kernel.spawn(count, harness.arg()).unwrap();
    }
    harness.kernel.run_until_idle();
    assert_eq!(harness.finished.load(Ordering::SeqCst), 2);
}

#[test]
fn idle_resumes_after_everyone_blocks() {
    extern "C" fn park(arg: usize) -> ! {
        let harness = Harness::from_arg(arg);
        let me = harness.kernel.scheduler().current().unwrap();
        coopkern::blocking::block(harness.kernel.scheduler(), &me);
        harness.kernel.scheduler().yield_now();
        // only reached after an unblock
        harness.record_self();
        harness.kernel.exit()
    }

    let harness = Harness::new();
    let a = harness.kernel.spawn(park, harness.arg()).unwrap();
    let b = harness.kernel.spawn(park, harness.arg()).unwrap();
    harness.kernel.run_until_idle();

    let scheduler = harness.kernel.scheduler();
    assert_eq!(scheduler.state_of(&a), ProcessState::Blocked);
    assert_eq!(scheduler.state_of(&b), ProcessState::Blocked);
    assert!(harness.trace.lock().is_empty());

    coopkern::blocking::unblock(scheduler, &b);
    coopkern::blocking::unblock(scheduler, &a);
    harness.kernel.run_until_idle();
    assert_eq!(*harness.trace.lock(), [b.pid().as_u64(), a.pid().as_u64()]);
    assert_eq!(scheduler.state_of(&a), ProcessState::Terminated);
}
