//! Mutual exclusion, backed by the scheduler's mutex wait sets.
//!
//! Unlike `std::sync::Mutex` this type holds no data itself — it is a
//! bare lock/unlock pair guarding whatever the caller built around it
//! — and it is not reentrant: a thread that locks a mutex it already
//! holds queues behind itself and deadlocks.

use crate::error::SyncError;
use crate::scheduler::{self, Action, MutexId};

/// A non-reentrant lock usable only from threads running under this
/// runtime.
pub struct Mutex {
    id: MutexId,
}

impl Mutex {
    /// Allocate a new mutex id. Fails once `MAX_MUTEXES` ids are live.
    pub fn new() -> Result<Self, SyncError> {
        crate::ensure_started();
        let id = scheduler::with_scheduler(|s| s.new_mutex())?;
        Ok(Mutex { id })
    }

    /// Acquire the lock, blocking (yielding to other ready threads)
    /// until it is free. Returns immediately if it was already free.
    pub fn lock(&self) {
        let _bracket = crate::preempt::Bracket::enter();
        let acquired = scheduler::with_scheduler(|s| s.try_lock_mutex(self.id));
        if !acquired {
            scheduler::enter_scheduler(Action::MutexLockWait(self.id));
            // Woken by direct hand-off: the unlocker already marked
            // this mutex locked with us as the implicit new owner, so
            // there is nothing left to check here.
        }
    }

    /// Release the lock. A no-op if it was not held.
    pub fn unlock(&self) {
        let _bracket = crate::preempt::Bracket::enter();
        scheduler::enter_scheduler(Action::MutexUnlock(self.id));
    }

    pub(crate) fn id(&self) -> MutexId {
        self.id
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        scheduler::with_scheduler(|s| s.destroy_mutex(self.id));
    }
}
