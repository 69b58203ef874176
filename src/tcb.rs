//! Thread Control Block: identity, saved machine context, owned stack.

use crate::context::ThreadContext;

/// Unique, monotonically increasing thread identifier.
///
/// Never recycled: once issued, an id is good for the lifetime of the
/// process so a `thread_join` racing a long-dead thread still resolves
/// to a real (if stale) return-value table entry instead of silently
/// aliasing a newer thread that reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub(crate) u64);

impl ThreadId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "thread-{}", self.0)
    }
}

/// Coarse execution state, kept for diagnostics. The authoritative
/// record of *why* a thread is blocked is which wait-set queue holds
/// its id, not this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Ready,
    Running,
    Blocked,
    Terminated,
}

/// A thread's saved context and the stack backing it.
///
/// The stack is owned here, not held separately by the scheduler, so
/// dropping a `Tcb` frees it as soon as a thread is reaped.
pub struct Tcb {
    id: ThreadId,
    state: ThreadState,
    context: ThreadContext,
    /// `None` for the implicit thread that captured the process's own
    /// entry stack (see `Scheduler::ensure_caller_registered`); `Some`
    /// for every thread this runtime allocated a stack for itself.
    _stack: Option<Box<[u8]>>,
}

impl Tcb {
    pub(crate) fn new(id: ThreadId, context: ThreadContext, stack: Option<Box<[u8]>>) -> Self {
        Tcb {
            id,
            state: ThreadState::Ready,
            context,
            _stack: stack,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn set_state(&mut self, state: ThreadState) {
        self.state = state;
    }

    pub(crate) fn context_mut(&mut self) -> &mut ThreadContext {
        &mut self.context
    }

    pub(crate) fn context(&self) -> &ThreadContext {
        &self.context
    }
}
