//! Preemption: a periodic `SIGALRM` whose handler forces a yield, and
//! the signal-mask bracket that brackets every API entry point.
//!
//! A naive disarm-then-rearm around each API call leaves a window
//! where a signal already queued by the kernel before disarming still
//! lands; masking the signal with `pthread_sigmask` instead closes
//! that window, since a masked signal that arrives stays pending
//! rather than firing.

use std::cell::Cell;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};

use libc::{sigset_t, SIGALRM};

static PREEMPTION_ARMED: AtomicBool = AtomicBool::new(false);

thread_local! {
    // Every green thread multiplexed onto this OS thread shares this
    // one counter — it tracks whether SIGALRM is currently masked, not
    // any single green thread's own call-stack nesting, since nested
    // `Bracket::enter` calls can themselves span a context switch. See
    // `reset_bracket_baseline` for the one place that matters.
    static BRACKET_DEPTH: Cell<u32> = Cell::new(0);
}

extern "C" fn on_alarm(_sig: c_int) {
    // Only reachable with the signal unblocked, i.e. outside every
    // `Bracket`, so scheduler state is always consistent here.
    crate::thread_yield();
}

/// Install the `SIGALRM` handler and arm the interval timer. Idempotent.
pub(crate) fn init(interval_micros: u64) {
    if PREEMPTION_ARMED.swap(true, Ordering::SeqCst) {
        return;
    }

    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_alarm as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        let rc = libc::sigaction(SIGALRM, &action, std::ptr::null_mut());
        assert_eq!(rc, 0, "sigaction failed");

        let interval = libc::timeval {
            tv_sec: (interval_micros / 1_000_000) as libc::time_t,
            tv_usec: (interval_micros % 1_000_000) as libc::suseconds_t,
        };
        let timer = libc::itimerval {
            it_interval: interval,
            it_value: interval,
        };
        let rc = libc::setitimer(libc::ITIMER_REAL, &timer, std::ptr::null_mut());
        assert_eq!(rc, 0, "setitimer failed");
    }

    log::debug!("preemption timer armed at {interval_micros}us");
}

fn alarm_mask() -> sigset_t {
    unsafe {
        let mut set: sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, SIGALRM);
        set
    }
}

/// Re-establish a clean masking baseline for a green thread that is
/// about to start running its entry closure for the first time.
///
/// `BRACKET_DEPTH` is a `thread_local`, i.e. one counter shared by
/// every green thread multiplexed onto this one OS thread — it tracks
/// "is SIGALRM currently masked", not any one green thread's own call
/// nesting. A freshly created thread's context was captured (via
/// `getcontext` in `make_context`) while its *creator* held a
/// `Bracket`, so the mask baked into that saved context is blocked,
/// but the new thread has never itself entered a `Bracket` to balance
/// against. Left alone, its first `Bracket::enter`/`drop` pair would
/// oscillate the shared depth between 1 and 2 instead of ever reaching
/// 0, and SIGALRM would stay masked for the rest of the process the
/// moment this thread is first scheduled. Forcing the depth back to 0
/// and unblocking the signal here gives every new thread the same
/// unmasked starting point the runtime's very first caller gets.
pub(crate) fn reset_bracket_baseline() {
    BRACKET_DEPTH.with(|depth| depth.set(0));
    unsafe {
        let set = alarm_mask();
        libc::pthread_sigmask(libc::SIG_UNBLOCK, &set, std::ptr::null_mut());
    }
}

/// Guards a critical section against the preemption signal. Every
/// public API entry point holds one for its whole body, so a timer
/// tick can never interrupt scheduler state mid-mutation.
pub(crate) struct Bracket;

impl Bracket {
    pub(crate) fn enter() -> Self {
        BRACKET_DEPTH.with(|depth| {
            let d = depth.get();
            if d == 0 {
                unsafe {
                    let set = alarm_mask();
                    libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
                }
            }
            depth.set(d + 1);
        });
        Bracket
    }
}

impl Drop for Bracket {
    fn drop(&mut self) {
        BRACKET_DEPTH.with(|depth| {
            let d = depth.get() - 1;
            depth.set(d);
            if d == 0 {
                unsafe {
                    let set = alarm_mask();
                    libc::pthread_sigmask(libc::SIG_UNBLOCK, &set, std::ptr::null_mut());
                }
            }
        });
    }
}
