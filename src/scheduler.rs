//! The scheduler: ready queue, wait sets, join lists, and the dispatch
//! loop that drives every cross-thread transition.
//!
//! Every public API call that needs to touch shared scheduling state
//! sets an [`Action`] and switches into the scheduler's own context
//! rather than mutating that state directly from the caller's stack.
//! The scheduler processes the action, decides what runs next, and
//! switches into it. Funneling every transition through one action
//! slot plus one context switch is what lets a single dispatch loop
//! serialize every transition without a lock that the preemption
//! signal handler could deadlock on.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::os::raw::c_int;

use crate::config::RuntimeConfig;
use crate::context::{self, ThreadContext};
use crate::error::{SyncError, ThreadError};
use crate::tcb::{Tcb, ThreadId, ThreadState};

pub type MutexId = u32;
pub type CondId = u32;

/// What the dispatch loop should do with the thread that was running
/// when it switched into the scheduler.
#[derive(Debug, Clone)]
pub(crate) enum Action {
    Yield,
    Exit(i32),
    Join(ThreadId),
    CondWait(CondId, MutexId),
    CondSignal(CondId),
    CondBroadcast(CondId),
    MutexUnlock(MutexId),
    MutexLockWait(MutexId),
}

struct MutexSlot {
    locked: bool,
    waiters: VecDeque<ThreadId>,
}

struct CondSlot {
    waiters: VecDeque<ThreadId>,
}

pub(crate) struct Scheduler {
    // Boxed so a `HashMap` rehash only ever moves the `Box` pointer,
    // never the `Tcb` (and the `ucontext_t` embedded in it) itself.
    // glibc's `ucontext_t` is self-referential (its saved FPU-state
    // pointer targets a field within the same struct); moving the
    // bytes of a context that has already been switched into once
    // would leave that pointer aimed at stale memory.
    threads: HashMap<ThreadId, Box<Tcb>>,
    ready: VecDeque<ThreadId>,
    current: Option<ThreadId>,
    join_lists: HashMap<ThreadId, Vec<ThreadId>>,
    exit_values: HashMap<ThreadId, i32>,
    mutexes: HashMap<MutexId, MutexSlot>,
    condvars: HashMap<CondId, CondSlot>,
    next_tid: u64,
    next_mutex_id: u32,
    next_cond_id: u32,
    action: Option<Action>,
    sched_context: ThreadContext,
    _sched_stack: Box<[u8]>,
    config: RuntimeConfig,
}

thread_local! {
    // A runtime instance never spans more than one OS thread — that is
    // the whole premise of user-level threading here — so the natural
    // home for it is thread-local rather than a single process-wide
    // static. This also means two unrelated OS threads (for instance
    // two `#[test]` functions run in parallel) each get an independent
    // scheduler instead of corrupting one shared one; only the
    // preemption timer in `preempt` remains genuinely process-global,
    // which is why tests that run concurrently disable it.
    pub(crate) static SCHEDULER: RefCell<Option<Scheduler>> = const { RefCell::new(None) };
}

/// Lazily create this thread's scheduler on first use.
pub(crate) fn ensure_initialized(config: RuntimeConfig) {
    SCHEDULER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_some() {
            return;
        }
        log::debug!("initializing scheduler");
        let mut sched_stack = vec![0u8; config.scheduler_stack_size].into_boxed_slice();
        let sched_context =
            unsafe { context::make_context(&mut sched_stack, dispatch_trampoline, 0) };
        *slot = Some(Scheduler {
            threads: HashMap::new(),
            ready: VecDeque::new(),
            current: None,
            join_lists: HashMap::new(),
            exit_values: HashMap::new(),
            mutexes: HashMap::new(),
            condvars: HashMap::new(),
            next_tid: 1,
            next_mutex_id: 1,
            next_cond_id: 1,
            action: None,
            sched_context,
            _sched_stack: sched_stack,
            config,
        });
    });
}

/// Run `f` with this thread's scheduler borrowed. Panics if the
/// scheduler was never initialized; every public entry point calls
/// `ensure_initialized` first so this should never fire.
pub(crate) fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    SCHEDULER.with(|cell| {
        let mut slot = cell.borrow_mut();
        let sched = slot.as_mut().expect("scheduler not initialized");
        f(sched)
    })
}

/// Register the thread calling into the API for the first time. The
/// process's own entry stack becomes a thread like any other, folded
/// into the same ready queue before anything is ever dispatched.
pub(crate) fn ensure_caller_registered(sched: &mut Scheduler) -> ThreadId {
    if let Some(id) = sched.current {
        return id;
    }
    let id = ThreadId(sched.next_tid);
    sched.next_tid += 1;
    let mut context = ThreadContext::empty();
    unsafe {
        let rc = libc::getcontext(context.as_mut_ptr());
        assert_eq!(rc, 0, "getcontext failed");
    }
    let mut tcb = Tcb::new(id, context, None);
    tcb.set_state(ThreadState::Running);
    sched.threads.insert(id, Box::new(tcb));
    sched.ready.push_back(id);
    sched.current = Some(id);
    log::debug!("registered calling thread as {id}");
    id
}

impl Scheduler {
    pub fn config(&self) -> RuntimeConfig {
        self.config
    }

    pub fn current(&self) -> Option<ThreadId> {
        self.current
    }

    fn live_thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Spawn a new thread running `entry`. Does not switch to it; it
    /// joins the tail of the ready queue and runs on its own turn.
    pub fn spawn(&mut self, entry: Box<dyn FnOnce() -> i32 + 'static>) -> Result<ThreadId, ThreadError> {
        if self.live_thread_count() >= crate::config::MAX_THREADS {
            return Err(ThreadError::TooManyThreads);
        }

        let id = ThreadId(self.next_tid);
        self.next_tid += 1;

        let mut stack = vec![0u8; self.config.thread_stack_size].into_boxed_slice();

        // Double-box so a single thin pointer (not the fat `dyn
        // FnOnce` pointer) can ride through `makecontext`'s
        // `int`-sized varargs.
        let boxed: Box<Box<dyn FnOnce() -> i32>> = Box::new(entry);
        let raw = Box::into_raw(boxed) as usize;

        let context = unsafe { context::make_context(&mut stack, trampoline, raw) };
        let tcb = Tcb::new(id, context, Some(stack));
        self.threads.insert(id, Box::new(tcb));
        self.ready.push_back(id);
        log::debug!("created {id}");
        Ok(id)
    }

    /// True if `id` was issued and has not yet terminated (regardless
    /// of which queue currently holds it).
    fn is_live(&self, id: ThreadId) -> bool {
        self.threads.contains_key(&id)
    }

    fn issued(&self, id: ThreadId) -> bool {
        self.is_live(id) || self.exit_values.contains_key(&id)
    }

    /// `Ok(Some(v))` if `target` already terminated with value `v`,
    /// `Ok(None)` if it is still live (the caller must block),
    /// `Err` if no such id was ever issued.
    pub fn join_target_status(&self, target: ThreadId) -> Result<Option<i32>, ThreadError> {
        if !self.issued(target) {
            return Err(ThreadError::UnknownThread);
        }
        Ok(self.exit_values.get(&target).copied())
    }

    pub fn new_mutex(&mut self) -> Result<MutexId, SyncError> {
        if self.mutexes.len() >= crate::config::MAX_MUTEXES {
            return Err(SyncError::TooManyMutexes);
        }
        let id = self.next_mutex_id;
        self.next_mutex_id += 1;
        self.mutexes.insert(
            id,
            MutexSlot {
                locked: false,
                waiters: VecDeque::new(),
            },
        );
        Ok(id)
    }

    pub fn destroy_mutex(&mut self, id: MutexId) {
        self.mutexes.remove(&id);
    }

    pub fn new_condvar(&mut self) -> Result<CondId, SyncError> {
        if self.condvars.len() >= crate::config::MAX_CONDVARS {
            return Err(SyncError::TooManyCondvars);
        }
        let id = self.next_cond_id;
        self.next_cond_id += 1;
        self.condvars.insert(id, CondSlot { waiters: VecDeque::new() });
        Ok(id)
    }

    pub fn destroy_condvar(&mut self, id: CondId) {
        self.condvars.remove(&id);
    }

    /// Try to lock `id` without blocking. Returns `true` if the lock
    /// was acquired.
    pub fn try_lock_mutex(&mut self, id: MutexId) -> bool {
        let slot = self.mutexes.get_mut(&id).expect("unknown mutex id");
        if slot.locked {
            false
        } else {
            slot.locked = true;
            true
        }
    }

    pub fn set_action(&mut self, action: Action) {
        self.action = Some(action);
    }

    pub fn sched_context_mut_ptr(&mut self) -> *mut ThreadContext {
        &mut self.sched_context
    }

    pub fn sched_context_ptr(&self) -> *const ThreadContext {
        &self.sched_context
    }

    pub(crate) fn thread_context_mut_ptr(&mut self, id: ThreadId) -> Option<*mut ThreadContext> {
        self.threads.get_mut(&id).map(|t| t.context_mut() as *mut ThreadContext)
    }

    /// Process the pending action, then return the context to switch
    /// into next, or `None` if the ready queue is now empty because
    /// the last live thread just exited — the dispatch loop should
    /// fall through and let the process terminate normally rather than
    /// treat that as a deadlock. Called only from the scheduler's own
    /// stack.
    fn dispatch_one(&mut self) -> Option<*const ThreadContext> {
        let action = self.action.take().expect("dispatch with no action set");
        let current = self.current.expect("dispatch with no current thread");
        let was_exit = matches!(action, Action::Exit(_));

        match action {
            Action::Yield => {
                self.ready.retain(|&t| t != current);
                self.ready.push_back(current);
            }
            Action::Exit(value) => {
                self.ready.retain(|&t| t != current);
                self.exit_values.insert(current, value);
                if let Some(waiters) = self.join_lists.remove(&current) {
                    for w in waiters {
                        self.ready.push_back(w);
                    }
                }
                self.threads.remove(&current);
                log::debug!("{current} exited with {value}");
            }
            Action::Join(target) => {
                // The public API only dispatches this action in the
                // blocking case; `target` was confirmed still live by
                // `join_target_status` first.
                self.ready.retain(|&t| t != current);
                self.join_lists.entry(target).or_default().push(current);
                log::debug!("{current} blocked joining {target}");
            }
            Action::CondWait(cond, mutex) => {
                self.ready.retain(|&t| t != current);
                self.unlock_or_handoff(mutex);
                self.condvars
                    .get_mut(&cond)
                    .expect("unknown condvar id")
                    .waiters
                    .push_back(current);
                log::debug!("{current} waiting on condvar {cond}");
            }
            Action::CondSignal(cond) => {
                if let Some(slot) = self.condvars.get_mut(&cond) {
                    if let Some(woken) = slot.waiters.pop_front() {
                        self.ready.push_back(woken);
                        log::debug!("condvar {cond} signal woke {woken}");
                    }
                }
            }
            Action::CondBroadcast(cond) => {
                if let Some(slot) = self.condvars.get_mut(&cond) {
                    while let Some(woken) = slot.waiters.pop_front() {
                        self.ready.push_back(woken);
                    }
                    log::debug!("condvar {cond} broadcast");
                }
            }
            Action::MutexUnlock(mutex) => {
                self.unlock_or_handoff(mutex);
            }
            Action::MutexLockWait(mutex) => {
                self.ready.retain(|&t| t != current);
                self.mutexes
                    .get_mut(&mutex)
                    .expect("unknown mutex id")
                    .waiters
                    .push_back(current);
                log::debug!("{current} blocked on mutex {mutex}");
            }
        }

        if self.ready.is_empty() {
            if was_exit {
                // The last live thread just exited and nobody was
                // waiting to join it: a clean, voluntary shutdown, not
                // a deadlock. Tell the dispatch loop to fall through;
                // the process exits normally (see `dispatch_trampoline`).
                log::info!("last thread exited; runtime shutting down");
                self.current = None;
                return None;
            }
            log::error!("deadlock detected: no runnable threads remain");
            std::process::abort();
        }

        let next = *self.ready.front().expect("checked non-empty above");
        self.current = Some(next);
        if let Some(tcb) = self.threads.get_mut(&next) {
            tcb.set_state(ThreadState::Running);
        }
        Some(
            self.threads
                .get(&next)
                .expect("scheduled thread missing from arena")
                .context() as *const ThreadContext,
        )
    }

    /// Unlock `mutex`, handing it directly to the next waiter (if any)
    /// rather than marking it free and letting the waiter re-check on
    /// wake: the waiter resumes already holding the lock. See
    /// DESIGN.md for why this interpretation was chosen.
    fn unlock_or_handoff(&mut self, mutex: MutexId) {
        let slot = self.mutexes.get_mut(&mutex).expect("unknown mutex id");
        match slot.waiters.pop_front() {
            Some(next_owner) => {
                slot.locked = true; // ownership transfers directly
                self.ready.push_back(next_owner);
                log::debug!("mutex {mutex} handed off to {next_owner}");
            }
            None => {
                slot.locked = false;
            }
        }
    }
}

/// The scheduler context's entry point. Runs on the scheduler's own
/// stack, alternating between processing whatever action brought
/// control here and switching into whichever thread should run next.
/// Returns only once the last live thread has exited and left the
/// ready queue empty; since this context's `uc_link` is null, that
/// return is what actually ends the process (see `context::make_context`).
extern "C" fn dispatch_trampoline(_lo: c_int, _hi: c_int) {
    loop {
        let step = with_scheduler(|sched| {
            sched
                .dispatch_one()
                .map(|next| (next, sched.sched_context_mut_ptr()))
        });
        match step {
            Some((next_ctx, sched_ctx)) => unsafe {
                context::swap(sched_ctx, next_ctx);
            },
            None => return,
        }
    }
}

/// Entry trampoline for user-created threads. Reassembles the boxed
/// closure pointer, runs it, and always reports a result back through
/// the normal exit path: a closure that returns normally falls through
/// to `thread_exit` exactly like one that calls it explicitly. A panic
/// inside a user thread is not something this runtime tries to
/// survive; it aborts the process rather than unwinding across the
/// context-switch boundary.
extern "C" fn trampoline(lo: c_int, hi: c_int) {
    // This context was captured (via `getcontext` in `make_context`)
    // while its creator held a preemption `Bracket`, so the signal
    // mask baked into it is blocked and the shared bracket-depth
    // counter has no entry on this thread's behalf to balance. Without
    // this, the thread would run permanently masked the moment it is
    // first scheduled — see `preempt::reset_bracket_baseline`.
    crate::preempt::reset_bracket_baseline();

    let raw = context::join_usize(lo, hi) as *mut Box<dyn FnOnce() -> i32>;
    let boxed: Box<Box<dyn FnOnce() -> i32>> = unsafe { Box::from_raw(raw) };
    let result = (*boxed)();
    crate::thread_exit(result);
}

/// Switch from the calling thread into the scheduler context with
/// `action` pending, and return only once this thread is scheduled to
/// run again.
pub(crate) fn enter_scheduler(action: Action) {
    let (caller_ctx, sched_ctx): (*mut ThreadContext, *const ThreadContext) = with_scheduler(|sched| {
        sched.set_action(action);
        let id = sched.current().expect("no current thread registered");
        let caller_ptr = sched
            .thread_context_mut_ptr(id)
            .expect("current thread missing from arena");
        (caller_ptr, sched.sched_context_ptr())
    });
    unsafe {
        context::swap(caller_ctx, sched_ctx);
    }
}
