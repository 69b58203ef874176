//! A cooperative-plus-preemptive user-level threading runtime.
//!
//! A single process, single-OS-thread runtime that multiplexes many
//! user ("green") threads onto one kernel thread using explicit
//! machine-context switching. A periodic `SIGALRM` forces round-robin
//! rotation so a purely computational thread cannot monopolize the
//! CPU; [`thread_yield`] rotates cooperatively in between ticks.
//!
//! ```no_run
//! use userthreads::{thread_create, thread_join};
//!
//! let a = thread_create(|| { println!("hello from a"); 1 }).unwrap();
//! let b = thread_create(|| { println!("hello from b"); 2 }).unwrap();
//! assert_eq!(userthreads::thread_join(a).unwrap(), 1);
//! assert_eq!(userthreads::thread_join(b).unwrap(), 2);
//! ```

mod config;
mod context;
mod condvar;
mod error;
mod logging;
mod mutex;
mod preempt;
mod scheduler;
mod tcb;

pub use config::RuntimeConfig;
pub use condvar::Condvar;
pub use error::{SyncError, ThreadError};
pub use mutex::Mutex;
pub use tcb::ThreadId;

use std::sync::OnceLock;

static CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// Start the runtime with an explicit configuration. Optional: every
/// other entry point calls this with [`RuntimeConfig::default`] the
/// first time it is needed. Calling it again after the runtime has
/// already started has no effect — configuration is fixed at first
/// use.
pub fn init(config: RuntimeConfig) {
    let _ = CONFIG.set(config);
    ensure_started();
}

pub(crate) fn ensure_started() {
    // Bracketed so that arming the timer below can never race a
    // signal landing before scheduler state (in particular the
    // calling thread's own registration) is fully set up.
    let _bracket = preempt::Bracket::enter();
    logging::init();
    let config = *CONFIG.get_or_init(RuntimeConfig::default);
    scheduler::ensure_initialized(config);
    scheduler::with_scheduler(scheduler::ensure_caller_registered);
    if config.preemption_enabled {
        preempt::init(config.preempt_interval_micros);
    }
}

/// Create a new thread running `entry` to completion, returning its
/// id. The thread is appended to the ready queue; it does not start
/// running until some thread yields, blocks, or is preempted.
pub fn thread_create(entry: impl FnOnce() -> i32 + 'static) -> Result<ThreadId, ThreadError> {
    ensure_started();
    let _bracket = preempt::Bracket::enter();
    scheduler::with_scheduler(|s| s.spawn(Box::new(entry)))
}

/// Give up the CPU to the next ready thread, rotating to the back of
/// the ready queue. Returns once this thread is scheduled again.
pub fn thread_yield() {
    ensure_started();
    let _bracket = preempt::Bracket::enter();
    scheduler::enter_scheduler(scheduler::Action::Yield);
}

/// Terminate the calling thread, recording `retval` for any current or
/// future [`thread_join`] call against its id, and waking every thread
/// already joined on it. Never returns.
pub fn thread_exit(retval: i32) -> ! {
    ensure_started();
    let _bracket = preempt::Bracket::enter();
    scheduler::enter_scheduler(scheduler::Action::Exit(retval));
    unreachable!("a terminated thread's context is never scheduled again")
}

/// Wait for thread `id` to terminate and return the value it exited
/// with. Returns immediately if `id` had already terminated before
/// this call — including threads that terminated long ago, since the
/// runtime keeps exit values around for the process's whole lifetime.
pub fn thread_join(id: ThreadId) -> Result<i32, ThreadError> {
    ensure_started();
    let _bracket = preempt::Bracket::enter();
    let status = scheduler::with_scheduler(|s| s.join_target_status(id))?;
    if let Some(value) = status {
        return Ok(value);
    }
    scheduler::enter_scheduler(scheduler::Action::Join(id));
    let value = scheduler::with_scheduler(|s| s.join_target_status(id))?;
    Ok(value.expect("a woken joiner's target must have recorded an exit value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn test_config() -> RuntimeConfig {
        let _ = env_logger::builder().is_test(true).try_init();
        RuntimeConfig::new().without_preemption()
    }

    #[test]
    fn yield_ordering_matches_scenario_s1() {
        init(test_config());
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));

        let log_a = log.clone();
        let a = thread_create(move || {
            log_a.lock().unwrap().push("First");
            thread_yield();
            log_a.lock().unwrap().push("Third");
            1
        })
        .unwrap();

        let log_b = log.clone();
        let b = thread_create(move || {
            log_b.lock().unwrap().push("Second");
            thread_yield();
            log_b.lock().unwrap().push("Fourth");
            5
        })
        .unwrap();

        assert_eq!(thread_join(a).unwrap(), 1);
        assert_eq!(thread_join(b).unwrap(), 5);
        assert_eq!(*log.lock().unwrap(), vec!["First", "Second", "Third", "Fourth"]);
    }

    #[test]
    fn mutex_provides_mutual_exclusion() {
        init(test_config());
        let counter = Arc::new(AtomicI32::new(0));
        let mutex = Arc::new(Mutex::new().unwrap());

        let mut ids = Vec::new();
        for _ in 0..10 {
            let counter = counter.clone();
            let mutex = mutex.clone();
            ids.push(
                thread_create(move || {
                    for _ in 0..1000 {
                        mutex.lock();
                        counter.fetch_add(1, Ordering::Relaxed);
                        mutex.unlock();
                        thread_yield();
                    }
                    0
                })
                .unwrap(),
            );
        }

        for id in ids {
            thread_join(id).unwrap();
        }

        assert_eq!(counter.load(Ordering::Relaxed), 10_000);
    }

    #[test]
    fn join_on_already_terminated_thread_returns_immediately() {
        init(test_config());
        let a = thread_create(|| 42).unwrap();
        // Let it run to completion before joining.
        thread_yield();
        assert_eq!(thread_join(a).unwrap(), 42);
        // Joining again still works; the value is never reclaimed.
        assert_eq!(thread_join(a).unwrap(), 42);
    }

    #[test]
    fn join_unknown_id_is_an_error() {
        init(test_config());
        let bogus = thread_create(|| 0).unwrap();
        thread_join(bogus).unwrap();
        let never_issued = ThreadId(999_999);
        assert_eq!(thread_join(never_issued), Err(ThreadError::UnknownThread));
    }
}
