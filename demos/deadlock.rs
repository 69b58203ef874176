//! Deliberately deadlocks two threads on opposing lock order, so the
//! runtime's ready-queue-empty check has something to catch. Exists so
//! the test suite can assert the process aborts instead of hanging.

use userthreads::{thread_create, thread_join, Mutex};

fn main() {
    userthreads::init(userthreads::RuntimeConfig::new().without_preemption());

    let a = std::sync::Arc::new(Mutex::new().unwrap());
    let b = std::sync::Arc::new(Mutex::new().unwrap());

    let (a1, b1) = (a.clone(), b.clone());
    let t1 = thread_create(move || {
        a1.lock();
        userthreads::thread_yield();
        b1.lock();
        a1.unlock();
        b1.unlock();
        0
    })
    .unwrap();

    let (a2, b2) = (a.clone(), b.clone());
    let t2 = thread_create(move || {
        b2.lock();
        userthreads::thread_yield();
        a2.lock();
        b2.unlock();
        a2.unlock();
        0
    })
    .unwrap();

    thread_join(t1).unwrap();
    thread_join(t2).unwrap();
}
