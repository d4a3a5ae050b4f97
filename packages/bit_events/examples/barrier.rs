//! Example demonstrating barrier synchronization with the rendezvous
//! operation.
//!
//! Three workers each do an uneven amount of work, then meet at a barrier
//! before starting the next round. The arrival that completes the barrier
//! consumes the rendezvous bits for the whole group, so the barrier is
//! immediately reusable.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bit_events::{EventBitSet, EventMask, Timeout};

const WORKER_A: EventMask = EventMask::bit(0);
const WORKER_B: EventMask = EventMask::bit(1);
const WORKER_C: EventMask = EventMask::bit(2);
const ALL_WORKERS: EventMask = EventMask::from_bits(0b111);

const ROUNDS: u32 = 3;

fn main() {
    println!("=== Barrier Synchronization Example ===");

    let events = Arc::new(EventBitSet::new());

    let workers: Vec<_> = [("A", WORKER_A, 30), ("B", WORKER_B, 80), ("C", WORKER_C, 50)]
        .into_iter()
        .map(|(name, bit, work_ms)| {
            let events = Arc::clone(&events);
            thread::spawn(move || {
                for round in 1..=ROUNDS {
                    println!("Worker {name}: round {round} work ({work_ms} ms)");
                    thread::sleep(Duration::from_millis(work_ms));

                    println!("Worker {name}: ready for barrier {round}");
                    events.sync(bit, ALL_WORKERS, Timeout::Forever);

                    println!("Worker {name}: barrier {round} passed");
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }

    println!("\nAll workers completed {ROUNDS} synchronized rounds.");
}
