//! Runs a two-thread yield-ordering demo and prints the interleaved
//! output along with both exit values.

fn main() {
    userthreads::init(userthreads::RuntimeConfig::new().without_preemption());

    let first = userthreads::thread_create(|| {
        println!("First");
        userthreads::thread_yield();
        println!("Third");
        1
    })
    .expect("thread_create failed");

    let second = userthreads::thread_create(|| {
        println!("Second");
        userthreads::thread_yield();
        println!("Fourth");
        5
    })
    .expect("thread_create failed");

    println!("Starting...");

    let first_val = userthreads::thread_join(first).expect("join failed");
    println!("val from 1: {first_val}");
    let second_val = userthreads::thread_join(second).expect("join failed");
    println!("val from 2: {second_val}");
}
