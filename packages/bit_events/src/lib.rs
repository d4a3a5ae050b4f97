//! Bit-condition signaling primitives for concurrent environments.
//!
//! This crate provides a shared set of named boolean event flags
//! ([`EventBitSet`]) that concurrent threads signal and wait on, plus a
//! phased-startup helper ([`PhaseGate`]) layered on top of it.
//!
//! A waiter can block until an arbitrary AND/OR combination of bits becomes
//! true, with an optional timeout and optional consume-on-release semantics.
//! Multiple simultaneous waiters are supported; all mutations and wake
//! evaluations on one instance are totally ordered, so a waiter never misses
//! a transition ("lost wakeups" are bugs here, not accepted races).
//!
//! # Signaling and waiting
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use bit_events::{EventBitSet, EventMask, Timeout, WaitMode};
//!
//! const SENSOR_A: EventMask = EventMask::bit(0);
//! const SENSOR_B: EventMask = EventMask::bit(1);
//!
//! let events = Arc::new(EventBitSet::new());
//!
//! for sensor in [SENSOR_A, SENSOR_B] {
//!     let events = Arc::clone(&events);
//!     thread::spawn(move || {
//!         // ... produce a reading ...
//!         events.set_bits(sensor);
//!     });
//! }
//!
//! // Block until both readings are in, consuming them for the next round.
//! let observed = events.wait(
//!     SENSOR_A | SENSOR_B,
//!     WaitMode::All,
//!     true,
//!     Timeout::Forever,
//! );
//! assert!(observed.contains(SENSOR_A | SENSOR_B));
//! ```
//!
//! # Phased startup
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use bit_events::{EventBitSet, EventMask, PhaseGate, Timeout};
//!
//! const HW: EventMask = EventMask::bit(0);
//! const NET: EventMask = EventMask::bit(1);
//!
//! let gate = PhaseGate::new(Arc::new(EventBitSet::new()));
//! let hardware = gate.define_next_phase("hardware", HW)?;
//! let network = gate.define_next_phase("network", NET)?;
//!
//! gate.signal_ready(HW);
//! assert!(gate.await_phase(hardware, Timeout::Forever).satisfied);
//!
//! // The network never comes up; the result names the missing prerequisite.
//! let result = gate.await_phase(network, Timeout::After(Duration::from_millis(10)));
//! assert!(!result.satisfied);
//! assert_eq!(result.missing, NET);
//! # Ok::<(), bit_events::ConfigurationError>(())
//! ```
//!
//! # Async waiting
//!
//! ```rust
//! use bit_events::{EventBitSet, EventMask, WaitMode};
//! use futures::executor::block_on;
//!
//! let events = EventBitSet::new();
//! events.set_bits(EventMask::bit(0));
//!
//! let observed = block_on(events.wait_async(EventMask::bit(0), WaitMode::Any, false));
//! assert!(observed.contains(EventMask::bit(0)));
//! ```

mod error;
mod futures;
mod gate;
mod mask;
mod set;

pub use error::ConfigurationError;
pub use futures::WaitFuture;
pub use gate::{PhaseGate, PhaseId, PhaseResult};
pub use mask::EventMask;
pub use set::{EventBitSet, Timeout, WaitMode};

// A poisoned lock means a thread panicked while mutating the flag word or
// the waiter registry; the instance's guarantees are gone and we must exit.
pub(crate) const ERR_POISONED_LOCK: &str =
    "encountered poisoned lock - continued execution is not safe because the \
    event state may be inconsistent";
