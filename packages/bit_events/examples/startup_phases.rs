//! Example demonstrating phased system startup over a phase gate.
//!
//! Initialization tasks signal capability bits as they finish; an
//! orchestrator gates on accumulated phases. The network producer is
//! deliberately absent, so the final phase times out and the orchestrator
//! falls back to a reduced-functionality mode, reporting exactly which
//! prerequisites never arrived.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bit_events::{EventBitSet, EventMask, PhaseGate, Timeout};

const HARDWARE_INIT: EventMask = EventMask::bit(0);
const DRIVERS_LOADED: EventMask = EventMask::bit(1);
const FILESYSTEM_READY: EventMask = EventMask::bit(2);
const CONFIG_VALIDATED: EventMask = EventMask::bit(3);
const NETWORK_STACK: EventMask = EventMask::bit(4);

fn main() {
    println!("=== Phased Startup Example ===");

    let events = Arc::new(EventBitSet::new());
    let gate = Arc::new(PhaseGate::new(Arc::clone(&events)));

    let phase1 = gate
        .define_next_phase("hardware", HARDWARE_INIT | DRIVERS_LOADED)
        .expect("phase topology is valid");
    let phase2 = gate
        .define_next_phase("storage", FILESYSTEM_READY | CONFIG_VALIDATED)
        .expect("phase topology is valid");
    let phase3 = gate
        .define_next_phase("network", NETWORK_STACK)
        .expect("phase topology is valid");

    // Initialization tasks. Note: nobody signals NETWORK_STACK.
    let init_tasks: Vec<_> = [
        ("hardware init", HARDWARE_INIT, 50),
        ("driver loader", DRIVERS_LOADED, 120),
        ("filesystem mount", FILESYSTEM_READY, 200),
        ("config validation", CONFIG_VALIDATED, 90),
    ]
    .into_iter()
    .map(|(name, bit, duration_ms)| {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            println!("{name}: starting...");
            thread::sleep(Duration::from_millis(duration_ms));
            println!("{name}: done");
            gate.signal_ready(bit);
        })
    })
    .collect();

    for (id, label) in [(phase1, "Phase 1"), (phase2, "Phase 2")] {
        println!("Orchestrator: waiting for {label}...");
        let result = gate.await_phase(id, Timeout::After(Duration::from_secs(5)));
        assert!(result.satisfied, "{label} should complete within the timeout");
        println!("Orchestrator: {label} complete");
    }

    println!("Orchestrator: waiting for Phase 3 (network)...");
    let result = gate.await_phase(phase3, Timeout::After(Duration::from_millis(300)));

    if result.satisfied {
        println!("Orchestrator: system fully operational");
    } else {
        println!(
            "Orchestrator: startup incomplete, missing bits {} - continuing in limited mode",
            result.missing
        );
    }

    for task in init_tasks {
        task.join().expect("init task panicked");
    }
}
