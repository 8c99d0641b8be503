// Context switching for the coopkern core
//
// A process is resumed from a single saved stack pointer. Switching pushes
// the callee-saved registers onto the outgoing stack, stores its stack
// pointer, loads the incoming one and pops the same registers back off.
use alloc::boxed::Box;
use alloc::vec;
use core::fmt;
use core::mem::size_of;

/// Entry function of a process. Receives the argument given at spawn time
/// and must end by calling [`Kernel::exit`](crate::Kernel::exit).
pub type EntryPoint = extern "C" fn(usize) -> !;

/// Words in the frame `switch_stack` pops: r15, r14, r13, r12, rbx, rbp,
/// return address.
const SWITCH_FRAME_WORDS: usize = 7;

core::arch::global_asm!(
    ".global coopkern_switch_stack",
    "coopkern_switch_stack:",
    "push rbp",
    "push rbx",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    "mov [rdi], rsp",
    "mov rsp, rsi",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop rbx",
    "pop rbp",
    "ret",
    // First activation of a process: r12 = argument, r13 = entry point.
    ".global coopkern_process_start",
    "coopkern_process_start:",
    "mov rdi, r12",
    "and rsp, -16",
    "call r13",
    "ud2",
);

extern "sysv64" {
    fn coopkern_switch_stack(save: *mut usize, next: usize);
    fn coopkern_process_start();
}

/// Save the current context through `save` and resume `next`.
///
/// # Safety
/// See [`Platform::switch_context`](crate::platform::Platform::switch_context).
pub unsafe fn switch_stack(save: *mut usize, next: usize) {
    coopkern_switch_stack(save, next)
}

/// A private, fixed-location process stack.
pub struct Stack {
    memory: Box<[u8]>,
}

impl Stack {
    pub fn new(size: usize) -> Self {
        Self {
            memory: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Highest 16-byte aligned address inside the stack.
    fn top(&self) -> usize {
        let base = self.memory.as_ptr() as usize;
        (base + self.memory.len()) & !0xf
    }

    /// Lay out a first-activation frame so that switching to the returned
    /// stack pointer calls `entry(arg)`.
    pub fn prepare(&mut self, entry: EntryPoint, arg: usize) -> usize {
        // registers popped by the switch, in pop order, then the return
        // address, then a null return address for the entry point itself
        let frame: [usize; SWITCH_FRAME_WORDS + 1] = [
            0, // r15
            0, // r14
            entry as usize, // r13
            arg, // r12
            0, // rbx
            0, // rbp
            coopkern_process_start as usize, // ret
            0,
        ];
        let sp = self.top() - frame.len() * size_of::<usize>();
        let offset = sp - self.memory.as_ptr() as usize;
        for (i, word) in frame.iter().enumerate() {
            let at = offset + i * size_of::<usize>();
            self.memory[at..at + size_of::<usize>()].copy_from_slice(&word.to_ne_bytes());
        }
        sp
    }

    pub fn contains(&self, addr: usize) -> bool {
        let base = self.memory.as_ptr() as usize;
        addr >= base && addr < base + self.memory.len()
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Stack")
            .field("base", &self.memory.as_ptr())
            .field("size", &self.memory.len())
            .finish()
    }
}
