//! Condition variables, backed by the scheduler's condvar wait sets.

use crate::error::SyncError;
use crate::mutex::Mutex;
use crate::scheduler::{self, Action, CondId};

/// A condition variable usable only from threads running under this
/// runtime. Always used together with a [`Mutex`] the caller already
/// holds.
pub struct Condvar {
    id: CondId,
}

impl Condvar {
    /// Allocate a new condvar id. Fails once `MAX_CONDVARS` ids are
    /// live.
    pub fn new() -> Result<Self, SyncError> {
        crate::ensure_started();
        let id = scheduler::with_scheduler(|s| s.new_condvar())?;
        Ok(Condvar { id })
    }

    /// Atomically release `mutex` and block until woken by
    /// [`Condvar::signal`] or [`Condvar::broadcast`], then reacquire
    /// `mutex` before returning. Reacquiring is an ordinary
    /// (possibly blocking) [`Mutex::lock`] call, not a separate
    /// fast path — a signaled waiter competes for the mutex exactly
    /// as any other blocked locker would.
    pub fn wait(&self, mutex: &Mutex) {
        {
            let _bracket = crate::preempt::Bracket::enter();
            scheduler::enter_scheduler(Action::CondWait(self.id, mutex.id()));
        }
        mutex.lock();
    }

    /// Wake one waiter, if any. A no-op if none are waiting.
    pub fn signal(&self) {
        let _bracket = crate::preempt::Bracket::enter();
        scheduler::enter_scheduler(Action::CondSignal(self.id));
    }

    /// Wake every waiter, in the order they began waiting.
    pub fn broadcast(&self) {
        let _bracket = crate::preempt::Bracket::enter();
        scheduler::enter_scheduler(Action::CondBroadcast(self.id));
    }

    pub(crate) fn id(&self) -> CondId {
        self.id
    }
}

impl Drop for Condvar {
    fn drop(&mut self) {
        scheduler::with_scheduler(|s| s.destroy_condvar(self.id));
    }
}
