//! Phased startup gating over an event bit set.

use std::sync::{Arc, Mutex};

use crate::set::{EventBitSet, Timeout, WaitMode};
use crate::{ConfigurationError, ERR_POISONED_LOCK, EventMask};

/// Identifies a phase within one [`PhaseGate`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PhaseId(usize);

/// The outcome of awaiting a phase.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct PhaseResult {
    /// Whether the phase's full required mask was observed set.
    pub satisfied: bool,

    /// The required bits that never arrived. Empty when satisfied; on
    /// timeout this names exactly which prerequisites are still missing,
    /// so the caller can log them and fall back.
    pub missing: EventMask,
}

#[derive(Debug)]
struct Phase {
    name: String,
    required: EventMask,
    satisfied: bool,
}

#[derive(Debug)]
struct GateState {
    phases: Vec<Phase>,
    /// Union of every phase's own new bits, for overlap rejection.
    claimed: EventMask,
    sealed: bool,
}

/// Named synchronization points ("phases") over a shared [`EventBitSet`].
///
/// Each phase's required mask is the union of its own new bits and all prior
/// phases' required bits, modeling staged startup where phase N can only be
/// reached through phases 1..N. Producers signal individual capability bits
/// with [`signal_ready`][Self::signal_ready]; any number of consumers block
/// on [`await_phase`][Self::await_phase] until a phase's full mask is
/// satisfied.
///
/// Phases are defined up front; the first `await_phase` call seals the gate
/// and later definitions fail with [`ConfigurationError::GateSealed`]. Bit
/// ownership is checked at definition time, so accidentally reusing a bit
/// for two different milestones is rejected before any task runs.
///
/// Once a phase has been observed satisfied it stays satisfied, even if a
/// constituent bit is later cleared for unrelated reasons: downstream code
/// may assume that reached milestones do not un-happen.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use bit_events::{EventBitSet, EventMask, PhaseGate, Timeout};
///
/// const HW: EventMask = EventMask::bit(0);
/// const DRIVERS: EventMask = EventMask::bit(1);
/// const FS: EventMask = EventMask::bit(2);
///
/// let gate = PhaseGate::new(Arc::new(EventBitSet::new()));
/// let phase1 = gate.define_next_phase("hardware", HW | DRIVERS)?;
/// let phase2 = gate.define_next_phase("storage", FS)?;
///
/// gate.signal_ready(HW);
/// gate.signal_ready(DRIVERS);
///
/// let result = gate.await_phase(phase1, Timeout::After(Duration::from_secs(1)));
/// assert!(result.satisfied);
///
/// let result = gate.await_phase(phase2, Timeout::After(Duration::from_millis(10)));
/// assert!(!result.satisfied);
/// assert_eq!(result.missing, FS);
/// # Ok::<(), bit_events::ConfigurationError>(())
/// ```
#[derive(Debug)]
pub struct PhaseGate {
    events: Arc<EventBitSet>,
    state: Mutex<GateState>,
}

impl PhaseGate {
    /// Creates a gate over the given event bit set.
    ///
    /// The bit set may be shared with other users; the gate only ever sets
    /// bits and waits on them, it never clears.
    #[must_use]
    pub fn new(events: Arc<EventBitSet>) -> Self {
        Self {
            events,
            state: Mutex::new(GateState {
                phases: Vec::new(),
                claimed: EventMask::NONE,
                sealed: false,
            }),
        }
    }

    /// The underlying event bit set.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBitSet> {
        &self.events
    }

    /// Appends a phase whose required mask is the previous phase's required
    /// mask plus `new_bits`.
    ///
    /// `new_bits` may be empty, which defines a named alias for the previous
    /// phase's mask. Non-empty bits must be unclaimed and within the bit-set
    /// width; violations are rejected here, at definition time, rather than
    /// surfacing as mysterious wait behavior at runtime.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::GateSealed`] if any phase has already been
    /// awaited; [`ConfigurationError::BitOverlap`] if `new_bits` intersects
    /// bits owned by an earlier phase; [`ConfigurationError::MaskTooWide`]
    /// if `new_bits` exceeds the bit-set width.
    pub fn define_next_phase(
        &self,
        name: impl Into<String>,
        new_bits: EventMask,
    ) -> Result<PhaseId, ConfigurationError> {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        if state.sealed {
            return Err(ConfigurationError::GateSealed);
        }

        let valid = EventMask::up_to(self.events.width());
        if !valid.contains(new_bits) {
            return Err(ConfigurationError::MaskTooWide {
                mask: new_bits,
                width: self.events.width(),
            });
        }

        if state.claimed.intersects(new_bits) {
            let overlap = state.claimed & new_bits;
            let owner = state
                .phases
                .iter()
                .find(|phase| phase.required.intersects(overlap))
                .map_or_else(String::new, |phase| phase.name.clone());

            return Err(ConfigurationError::BitOverlap {
                bits: overlap,
                owner,
            });
        }

        let required = state
            .phases
            .last()
            .map_or(EventMask::NONE, |phase| phase.required)
            | new_bits;

        state.claimed |= new_bits;
        state.phases.push(Phase {
            name: name.into(),
            required,
            satisfied: false,
        });

        Ok(PhaseId(state.phases.len() - 1))
    }

    /// Signals that the capability represented by `mask` is ready.
    ///
    /// Non-blocking wrapper over [`EventBitSet::set_bits`]; safe to call
    /// from contexts that must not suspend.
    pub fn signal_ready(&self, mask: EventMask) {
        self.events.set_bits(mask);
    }

    /// Blocks until the phase's full required mask is satisfied or the
    /// timeout elapses. Seals the gate on first call.
    ///
    /// Phase bits persist: the wait neither clears bits nor prevents later
    /// phases and later waiters from observing them. Satisfaction is cached
    /// per phase (and for all its predecessors, whose masks are subsets), so
    /// repeated awaits of a reached phase return immediately.
    ///
    /// On timeout, `missing` reports `required & !observed`.
    ///
    /// # Panics
    ///
    /// Panics if `phase` does not belong to this gate.
    pub fn await_phase(&self, phase: PhaseId, timeout: Timeout) -> PhaseResult {
        let required = {
            let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
            state.sealed = true;

            let entry = state
                .phases
                .get(phase.0)
                .expect("phase id does not belong to this gate");

            if entry.satisfied {
                return PhaseResult {
                    satisfied: true,
                    missing: EventMask::NONE,
                };
            }

            entry.required
        };

        // The gate lock is not held while blocked, so concurrent awaits of
        // different phases proceed independently.
        let observed = self.events.wait(required, WaitMode::All, false, timeout);

        if observed.contains(required) {
            let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

            // Required masks grow monotonically, so reaching this phase
            // means every earlier phase is reached too.
            for entry in state.phases.iter_mut().take(phase.0 + 1) {
                entry.satisfied = true;
            }

            PhaseResult {
                satisfied: true,
                missing: EventMask::NONE,
            }
        } else {
            PhaseResult {
                satisfied: false,
                missing: required & !observed,
            }
        }
    }

    /// The name a phase was defined with, or `None` for a foreign id.
    #[must_use]
    pub fn phase_name(&self, phase: PhaseId) -> Option<String> {
        let state = self.state.lock().expect(ERR_POISONED_LOCK);
        state.phases.get(phase.0).map(|entry| entry.name.clone())
    }

    /// The full required mask of a phase, or `None` for a foreign id.
    #[must_use]
    pub fn required_mask(&self, phase: PhaseId) -> Option<EventMask> {
        let state = self.state.lock().expect(ERR_POISONED_LOCK);
        state.phases.get(phase.0).map(|entry| entry.required)
    }

    /// Whether the phase has been observed satisfied by some await.
    ///
    /// This reads the cached satisfaction state only; it does not consult
    /// the underlying bits.
    #[must_use]
    pub fn is_satisfied(&self, phase: PhaseId) -> bool {
        let state = self.state.lock().expect(ERR_POISONED_LOCK);
        state
            .phases
            .get(phase.0)
            .is_some_and(|entry| entry.satisfied)
    }

    /// The number of phases defined so far.
    #[must_use]
    pub fn phase_count(&self) -> usize {
        self.state.lock().expect(ERR_POISONED_LOCK).phases.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use static_assertions::assert_impl_all;
    use testing::with_watchdog;

    use super::*;

    const SHORT: Timeout = Timeout::After(Duration::from_millis(50));

    const HW: EventMask = EventMask::bit(0);
    const DRIVERS: EventMask = EventMask::bit(1);
    const FS: EventMask = EventMask::bit(2);
    const CONFIG: EventMask = EventMask::bit(3);

    fn startup_gate() -> (PhaseGate, PhaseId, PhaseId) {
        let gate = PhaseGate::new(Arc::new(EventBitSet::new()));
        let phase1 = gate.define_next_phase("phase1", HW | DRIVERS).unwrap();
        let phase2 = gate.define_next_phase("phase2", FS | CONFIG).unwrap();
        (gate, phase1, phase2)
    }

    #[test]
    fn required_masks_grow_monotonically() {
        let (gate, phase1, phase2) = startup_gate();

        assert_eq!(gate.required_mask(phase1).unwrap(), HW | DRIVERS);
        assert_eq!(gate.required_mask(phase2).unwrap(), HW | DRIVERS | FS | CONFIG);
        assert_eq!(gate.phase_count(), 2);
    }

    #[test]
    fn startup_phase_gating_scenario() {
        // Phase 1 arrives; phase 2 times out with an exact missing report.
        with_watchdog(|| {
            let (gate, phase1, phase2) = startup_gate();

            gate.signal_ready(HW);
            gate.signal_ready(DRIVERS);

            let result = gate.await_phase(phase1, Timeout::After(Duration::from_secs(1)));
            assert!(result.satisfied);
            assert_eq!(result.missing, EventMask::NONE);

            let result = gate.await_phase(phase2, Timeout::After(Duration::from_millis(100)));
            assert!(!result.satisfied);
            assert_eq!(result.missing, FS | CONFIG);
        });
    }

    #[test]
    fn missing_bits_diagnostic_is_exact() {
        // Required 0b1111, observed 0b0101: exactly 0b1010 is reported missing.
        with_watchdog(|| {
            let gate = PhaseGate::new(Arc::new(EventBitSet::new()));
            let phase = gate
                .define_next_phase("all-four", EventMask::from_bits(0b1111))
                .unwrap();

            gate.signal_ready(EventMask::from_bits(0b0101));

            let result = gate.await_phase(phase, SHORT);
            assert!(!result.satisfied);
            assert_eq!(result.missing, EventMask::from_bits(0b1010));
        });
    }

    #[test]
    fn satisfaction_is_cached_across_later_clears() {
        // A reached phase never reverts to pending.
        with_watchdog(|| {
            let (gate, phase1, _phase2) = startup_gate();

            gate.signal_ready(HW | DRIVERS);
            assert!(gate.await_phase(phase1, Timeout::Forever).satisfied);

            // An unrelated consumer clears a constituent bit.
            gate.events().clear_bits(HW);

            let result = gate.await_phase(phase1, Timeout::IMMEDIATE);
            assert!(result.satisfied);
            assert_eq!(result.missing, EventMask::NONE);
            assert!(gate.is_satisfied(phase1));
        });
    }

    #[test]
    fn reaching_a_later_phase_marks_earlier_phases_satisfied() {
        with_watchdog(|| {
            let (gate, phase1, phase2) = startup_gate();

            gate.signal_ready(HW | DRIVERS | FS | CONFIG);
            assert!(gate.await_phase(phase2, Timeout::Forever).satisfied);
            assert!(gate.is_satisfied(phase1));
        });
    }

    #[test]
    fn phase_bits_persist_for_later_waiters() {
        with_watchdog(|| {
            let (gate, phase1, _phase2) = startup_gate();

            gate.signal_ready(HW | DRIVERS);
            assert!(gate.await_phase(phase1, Timeout::Forever).satisfied);

            // The await did not consume the bits.
            assert!(gate.events().bits().contains(HW | DRIVERS));
        });
    }

    #[test]
    fn awaiting_consumers_are_released_as_bits_arrive() {
        with_watchdog(|| {
            let (gate, phase1, _phase2) = startup_gate();
            let gate = Arc::new(gate);

            let consumer = {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.await_phase(phase1, Timeout::Forever))
            };

            thread::sleep(Duration::from_millis(10));
            gate.signal_ready(HW);
            gate.signal_ready(DRIVERS);

            assert!(consumer.join().unwrap().satisfied);
        });
    }

    #[test]
    fn bit_overlap_is_rejected_at_definition_time() {
        let (gate, _phase1, _phase2) = startup_gate();

        let error = gate.define_next_phase("reuse", DRIVERS | EventMask::bit(5));
        assert_eq!(
            error,
            Err(ConfigurationError::BitOverlap {
                bits: DRIVERS,
                owner: "phase1".to_owned(),
            })
        );

        // The rejected definition claimed nothing.
        let phase3 = gate.define_next_phase("fresh", EventMask::bit(5)).unwrap();
        assert_eq!(
            gate.required_mask(phase3).unwrap(),
            HW | DRIVERS | FS | CONFIG | EventMask::bit(5)
        );
    }

    #[test]
    fn definitions_after_sealing_are_rejected() {
        with_watchdog(|| {
            let (gate, phase1, _phase2) = startup_gate();

            let _result = gate.await_phase(phase1, Timeout::IMMEDIATE);

            let error = gate.define_next_phase("late", EventMask::bit(5));
            assert_eq!(error, Err(ConfigurationError::GateSealed));
        });
    }

    #[test]
    fn over_width_masks_are_rejected() {
        let gate = PhaseGate::new(Arc::new(EventBitSet::with_width(8)));

        let error = gate.define_next_phase("wide", EventMask::bit(8));
        assert_eq!(
            error,
            Err(ConfigurationError::MaskTooWide {
                mask: EventMask::bit(8),
                width: 8,
            })
        );
    }

    #[test]
    fn empty_mask_defines_an_alias_phase() {
        with_watchdog(|| {
            let (gate, _phase1, phase2) = startup_gate();
            let alias = gate.define_next_phase("phase2-alias", EventMask::NONE).unwrap();

            assert_eq!(gate.required_mask(alias), gate.required_mask(phase2));
        });
    }

    #[test]
    fn phase_names_are_reported() {
        let (gate, phase1, _phase2) = startup_gate();
        assert_eq!(gate.phase_name(phase1).as_deref(), Some("phase1"));
        assert_eq!(gate.phase_name(PhaseId(99)), None);
    }

    #[test]
    #[should_panic]
    fn awaiting_a_foreign_phase_id_panics() {
        let (gate, _phase1, _phase2) = startup_gate();
        let _result = gate.await_phase(PhaseId(99), Timeout::IMMEDIATE);
    }

    #[test]
    fn thread_safe_types() {
        assert_impl_all!(PhaseGate: Send, Sync);
        assert_impl_all!(PhaseId: Send, Sync);
        assert_impl_all!(PhaseResult: Send, Sync);
    }
}
