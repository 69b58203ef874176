//! Proves a purely computational thread cannot monopolize the CPU:
//! the preemption timer must force a rotation into a sibling thread
//! before the compute-bound thread ever voluntarily yields.
//!
//! Thread A spins in a tight loop and never calls `thread_yield`.
//! Thread B, the moment it first gets a turn, records whether A has
//! already finished. If the preemption timer works, B gets that turn
//! while A is still mid-loop; if it doesn't, A runs to completion
//! entirely uninterrupted and B only starts afterward.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static COUNTER_A: AtomicU64 = AtomicU64::new(0);
static A_FINISHED: AtomicBool = AtomicBool::new(false);
static B_STARTED_BEFORE_A_FINISHED: AtomicBool = AtomicBool::new(false);

const ITERS: u64 = 100_000_000;

fn main() {
    userthreads::init(userthreads::RuntimeConfig::new().preempt_interval_micros(2_000));

    let a = userthreads::thread_create(|| {
        for _ in 0..ITERS {
            COUNTER_A.fetch_add(1, Ordering::Relaxed);
        }
        A_FINISHED.store(true, Ordering::SeqCst);
        0
    })
    .expect("thread_create failed");

    let b = userthreads::thread_create(|| {
        if !A_FINISHED.load(Ordering::SeqCst) {
            B_STARTED_BEFORE_A_FINISHED.store(true, Ordering::SeqCst);
        }
        0
    })
    .expect("thread_create failed");

    userthreads::thread_join(a).expect("join a failed");
    userthreads::thread_join(b).expect("join b failed");

    if B_STARTED_BEFORE_A_FINISHED.load(Ordering::SeqCst) {
        println!("PREEMPTED");
        std::process::exit(0);
    }

    eprintln!("thread A ran to completion before thread B ever got a turn: not preempted");
    std::process::exit(1);
}
