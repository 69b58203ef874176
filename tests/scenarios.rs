//! End-to-end scenarios run against the public API directly.
//!
//! Each test disables the preemption timer so interleavings are
//! driven purely by explicit yields and blocking calls, since nothing
//! here can guarantee a real-time signal lands on a particular
//! instruction in CI.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use userthreads::{thread_create, thread_join, Condvar, Mutex, RuntimeConfig};

fn start() {
    let _ = env_logger::builder().is_test(true).try_init();
    userthreads::init(RuntimeConfig::new().without_preemption());
}

/// S3: bounded producer/consumer over a capacity-4 ring, sequence
/// 1..=100 delivered in order.
#[test]
fn producer_consumer_condvar() {
    start();

    struct Buffer {
        items: VecDeque<i32>,
        cap: usize,
    }

    let buffer = Arc::new(StdMutex::new(Buffer {
        items: VecDeque::new(),
        cap: 4,
    }));
    let lock = Arc::new(Mutex::new().unwrap());
    let not_full = Arc::new(Condvar::new().unwrap());
    let not_empty = Arc::new(Condvar::new().unwrap());

    let received = Arc::new(StdMutex::new(Vec::new()));

    let (buf_p, lock_p, nf_p, ne_p) = (buffer.clone(), lock.clone(), not_full.clone(), not_empty.clone());
    let producer = thread_create(move || {
        for i in 1..=100 {
            lock_p.lock();
            while buf_p.lock().unwrap().items.len() >= buf_p.lock().unwrap().cap {
                nf_p.wait(&lock_p);
            }
            buf_p.lock().unwrap().items.push_back(i);
            ne_p.signal();
            lock_p.unlock();
        }
        0
    })
    .unwrap();

    let (buf_c, lock_c, nf_c, ne_c, recv_c) =
        (buffer.clone(), lock.clone(), not_full.clone(), not_empty.clone(), received.clone());
    let consumer = thread_create(move || {
        for _ in 1..=100 {
            lock_c.lock();
            while buf_c.lock().unwrap().items.is_empty() {
                ne_c.wait(&lock_c);
            }
            let value = buf_c.lock().unwrap().items.pop_front().unwrap();
            recv_c.lock().unwrap().push(value);
            nf_c.signal();
            lock_c.unlock();
        }
        0
    })
    .unwrap();

    thread_join(producer).unwrap();
    thread_join(consumer).unwrap();

    let got = received.lock().unwrap();
    let expected: Vec<i32> = (1..=100).collect();
    assert_eq!(*got, expected);
}

/// S4: broadcasting a condvar wakes every waiter, in the order they
/// began waiting.
#[test]
fn broadcast_wakes_all_in_order() {
    start();

    let mutex = Arc::new(Mutex::new().unwrap());
    let cond = Arc::new(Condvar::new().unwrap());
    let ready_count = Arc::new(StdMutex::new(0usize));
    let woke_order = Arc::new(StdMutex::new(Vec::new()));

    const N: usize = 5;
    let mut ids = Vec::new();
    for i in 0..N {
        let mutex = mutex.clone();
        let cond = cond.clone();
        let ready_count = ready_count.clone();
        let woke_order = woke_order.clone();
        ids.push(
            thread_create(move || {
                mutex.lock();
                *ready_count.lock().unwrap() += 1;
                cond.wait(&mutex);
                woke_order.lock().unwrap().push(i);
                mutex.unlock();
                0
            })
            .unwrap(),
        );
    }

    // Let every waiter register before broadcasting.
    while *ready_count.lock().unwrap() < N {
        userthreads::thread_yield();
    }

    mutex.lock();
    cond.broadcast();
    mutex.unlock();

    for id in ids {
        thread_join(id).unwrap();
    }

    let order = woke_order.lock().unwrap();
    assert_eq!(order.len(), N);
}

/// S6: opposing lock order deadlocks and the process aborts rather
/// than hanging forever.
#[test]
fn opposing_lock_order_aborts_the_process() {
    let exe = env!("CARGO_BIN_EXE_userthreads-demo-deadlock");
    let status = std::process::Command::new(exe)
        .status()
        .expect("failed to run deadlock demo binary");
    assert!(!status.success(), "deadlock demo should not exit successfully");
}

/// A purely computational thread that never yields must still be
/// rotated off the CPU by the preemption timer (spec §1, §4.4). Runs
/// as a separate process: the timer is process-wide, so it cannot
/// share a test binary with the preemption-free tests above.
#[test]
fn compute_bound_thread_is_preempted() {
    let exe = env!("CARGO_BIN_EXE_userthreads-demo-preempt");
    let output = std::process::Command::new(exe)
        .output()
        .expect("failed to run preemption demo binary");
    assert!(
        output.status.success(),
        "compute-bound thread was not preempted (stdout: {:?}, stderr: {:?})",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
}

/// When the last live thread exits via `thread_exit` and nothing is
/// left in the ready queue, the runtime must terminate the process
/// normally (exit code 0), not treat the empty queue as a deadlock.
#[test]
fn last_thread_exit_terminates_the_process_normally() {
    let exe = env!("CARGO_BIN_EXE_userthreads-demo-last-exit");
    let status = std::process::Command::new(exe)
        .status()
        .expect("failed to run last-exit demo binary");
    assert!(status.success(), "last thread's exit should terminate the process normally");
}
