//! The calling thread is itself a registered TCB, so when it is the
//! last one left and calls `thread_exit` directly (rather than just
//! returning from `main`), the ready queue empties through the normal
//! exit path. That must terminate the process cleanly, not abort it
//! as a false-positive deadlock.

fn main() {
    userthreads::init(userthreads::RuntimeConfig::new().without_preemption());
    userthreads::thread_exit(0);
}
