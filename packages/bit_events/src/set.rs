//! The shared bit-condition primitive.
//!
//! An [`EventBitSet`] holds a fixed-width word of boolean event flags that
//! multiple threads signal and wait on. All mutations and waiter wake-ups
//! for one instance are serialized through a single lock, so a waiter can
//! never miss a transition that satisfies its condition.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::task::Waker;
use std::time::{Duration, Instant};

use crate::futures::WaitFuture;
use crate::{ERR_POISONED_LOCK, EventMask};

/// How a wait condition combines the bits of its mask.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitMode {
    /// The condition holds when at least one bit of the mask is set (OR).
    Any,

    /// The condition holds only when every bit of the mask is set (AND).
    All,
}

impl WaitMode {
    pub(crate) fn is_satisfied(self, bits: EventMask, mask: EventMask) -> bool {
        match self {
            Self::Any => bits.intersects(mask),
            Self::All => bits.contains(mask),
        }
    }
}

/// How long a blocking wait may suspend the calling thread.
///
/// A zero-length [`Timeout::After`] turns the wait into a non-blocking poll.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Timeout {
    /// Give up after the given duration has elapsed.
    After(Duration),

    /// Never give up.
    Forever,
}

impl Timeout {
    /// A timeout that elapses immediately, turning a wait into a poll.
    pub const IMMEDIATE: Self = Self::After(Duration::ZERO);

    /// Resolves to an absolute deadline, or `None` for an unbounded wait.
    fn deadline(self) -> Option<Instant> {
        match self {
            // A duration too large to represent as an instant is as good as
            // unbounded.
            Self::After(duration) => Instant::now().checked_add(duration),
            Self::Forever => None,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

/// A registered pending wait.
///
/// The `set_bits` call that satisfies the condition stamps `satisfied` with
/// the word it observed; the waiter only ever reads that stamp back. This is
/// what keeps clear-on-exit atomic: the setter clears consumed bits in the
/// same critical section that releases the waiters, so no thread can observe
/// a satisfied-but-not-yet-cleared window.
#[derive(Debug)]
struct WaitEntry {
    id: u64,
    mask: EventMask,
    mode: WaitMode,
    clear_on_exit: bool,
    satisfied: Option<EventMask>,

    /// Present for async waiters. Blocking waiters sleep on the shared
    /// condvar instead.
    waker: Option<Waker>,
}

#[derive(Debug)]
struct SetState {
    bits: EventMask,
    next_waiter_id: u64,
    waiters: Vec<WaitEntry>,
}

impl SetState {
    fn register(
        &mut self,
        mask: EventMask,
        mode: WaitMode,
        clear_on_exit: bool,
        waker: Option<Waker>,
    ) -> u64 {
        let id = self.next_waiter_id;
        self.next_waiter_id = self.next_waiter_id.wrapping_add(1);

        self.waiters.push(WaitEntry {
            id,
            mask,
            mode,
            clear_on_exit,
            satisfied: None,
            waker,
        });

        id
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.waiters.iter().position(|entry| entry.id == id)
    }

    /// Stamps every pending waiter whose condition now holds, applying the
    /// union of the released waiters' clear-on-exit masks before anyone can
    /// observe the word again. Returns the wakers of released async waiters;
    /// the caller wakes them once the lock is dropped.
    fn release_satisfied(&mut self) -> Vec<Waker> {
        let snapshot = self.bits;
        let mut to_clear = EventMask::NONE;
        let mut wakers = Vec::new();

        for entry in &mut self.waiters {
            if entry.satisfied.is_some() {
                continue;
            }

            if entry.mode.is_satisfied(snapshot, entry.mask) {
                entry.satisfied = Some(snapshot);

                if entry.clear_on_exit {
                    to_clear |= entry.mask;
                }

                if let Some(waker) = entry.waker.take() {
                    wakers.push(waker);
                }
            }
        }

        self.bits &= !to_clear;
        wakers
    }
}

/// A fixed-width set of named boolean event flags shared by concurrent
/// threads.
///
/// Producers call [`set_bits`][Self::set_bits] and
/// [`clear_bits`][Self::clear_bits]; these never block and are safe to call
/// from contexts that must not suspend. Consumers call
/// [`wait`][Self::wait] (blocking, with timeout) or
/// [`wait_async`][Self::wait_async] to suspend until an AND or OR
/// combination of bits becomes true, optionally consuming the matched bits
/// on release.
///
/// One instance is typically created per shared domain (startup events,
/// sensor events, ...) and handed to every participating thread in an
/// [`Arc`][std::sync::Arc].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
///
/// use bit_events::{EventBitSet, EventMask, Timeout, WaitMode};
///
/// const WORKER_DONE: EventMask = EventMask::bit(0);
///
/// let events = Arc::new(EventBitSet::new());
///
/// let signaller = Arc::clone(&events);
/// thread::spawn(move || {
///     signaller.set_bits(WORKER_DONE);
/// });
///
/// let observed = events.wait(WORKER_DONE, WaitMode::All, false, Timeout::Forever);
/// assert!(observed.contains(WORKER_DONE));
/// ```
#[derive(Debug)]
pub struct EventBitSet {
    state: Mutex<SetState>,

    /// Wakes blocking waiters. Async waiters are woken through their stored
    /// `Waker` instead.
    condvar: Condvar,

    /// The bit positions that are valid for this instance.
    valid: EventMask,
}

impl EventBitSet {
    /// The default flag-word width, in bits.
    pub const DEFAULT_WIDTH: u32 = 32;

    /// Creates a new event bit set with the default width of 32 bits,
    /// all cleared.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bit_events::{EventBitSet, EventMask};
    ///
    /// let events = EventBitSet::new();
    /// assert_eq!(events.bits(), EventMask::NONE);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_width(Self::DEFAULT_WIDTH)
    }

    /// Creates a new event bit set whose masks may use the lowest `width`
    /// bit positions.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero or greater than 64.
    #[must_use]
    pub fn with_width(width: u32) -> Self {
        assert!(
            (1..=64).contains(&width),
            "event bit set width must be between 1 and 64"
        );

        Self {
            state: Mutex::new(SetState {
                bits: EventMask::NONE,
                next_waiter_id: 0,
                waiters: Vec::new(),
            }),
            condvar: Condvar::new(),
            valid: EventMask::up_to(width),
        }
    }

    /// The flag-word width of this instance, in bits.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.valid.bits().count_ones()
    }

    /// A non-blocking snapshot of the current flag word.
    #[must_use]
    pub fn bits(&self) -> EventMask {
        self.state.lock().expect(ERR_POISONED_LOCK).bits
    }

    /// Atomically sets the bits of `mask`, releasing every pending waiter
    /// whose condition now holds.
    ///
    /// If a released waiter requested clear-on-exit, its mask's bits are
    /// cleared in the same atomic step, before that waiter resumes and before
    /// any other thread can observe the word. Returns the flag word after the
    /// set but before any such clears.
    ///
    /// Never blocks, so this is safe to call from contexts that must not
    /// suspend (for example a signal-delivery or interrupt-like context).
    ///
    /// # Panics
    ///
    /// Panics if `mask` has bits outside the configured width.
    pub fn set_bits(&self, mask: EventMask) -> EventMask {
        self.assert_valid(mask);

        let (after_set, wakers) = {
            let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
            state.bits |= mask;
            let after_set = state.bits;
            let wakers = state.release_satisfied();
            (after_set, wakers)
        };

        // Wake-ups happen outside the lock so released waiters do not
        // immediately contend on it.
        self.condvar.notify_all();

        for waker in wakers {
            waker.wake();
        }

        after_set
    }

    /// Atomically clears the bits of `mask`, returning the flag word from
    /// before the clear.
    ///
    /// Clearing can never satisfy a wait condition, so no waiter is woken.
    /// Never blocks.
    ///
    /// # Panics
    ///
    /// Panics if `mask` has bits outside the configured width.
    pub fn clear_bits(&self, mask: EventMask) -> EventMask {
        self.assert_valid(mask);

        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
        let before = state.bits;
        state.bits &= !mask;
        before
    }

    /// Blocks the calling thread until the bits of `mask` satisfy `mode`, or
    /// until the timeout elapses.
    ///
    /// Returns the flag word observed when the wait ended; the caller tests
    /// it against `mask` to distinguish satisfaction from timeout. On
    /// satisfaction with `clear_on_exit`, the bits of `mask` are consumed
    /// atomically with the release (see [`set_bits`][Self::set_bits]). On
    /// timeout nothing is cleared.
    ///
    /// An empty `mask` is trivially satisfied: the call returns the current
    /// word immediately and never clears anything. If the condition already
    /// holds at call time the thread does not block at all.
    ///
    /// # Panics
    ///
    /// Panics if `mask` has bits outside the configured width.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use bit_events::{EventBitSet, EventMask, Timeout, WaitMode};
    ///
    /// let events = EventBitSet::new();
    /// events.set_bits(EventMask::bit(0));
    ///
    /// // Already satisfied - returns without blocking.
    /// let observed = events.wait(
    ///     EventMask::bit(0),
    ///     WaitMode::All,
    ///     false,
    ///     Timeout::Forever,
    /// );
    /// assert!(observed.contains(EventMask::bit(0)));
    ///
    /// // Not satisfiable - returns the unsatisfied word after the timeout.
    /// let observed = events.wait(
    ///     EventMask::bit(1),
    ///     WaitMode::All,
    ///     false,
    ///     Timeout::After(Duration::from_millis(10)),
    /// );
    /// assert!(!observed.contains(EventMask::bit(1)));
    /// ```
    pub fn wait(
        &self,
        mask: EventMask,
        mode: WaitMode,
        clear_on_exit: bool,
        timeout: Timeout,
    ) -> EventMask {
        self.assert_valid(mask);

        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        if mask.is_empty() {
            return state.bits;
        }

        if mode.is_satisfied(state.bits, mask) {
            let snapshot = state.bits;

            if clear_on_exit {
                state.bits &= !mask;
            }

            return snapshot;
        }

        if timeout == Timeout::IMMEDIATE {
            return state.bits;
        }

        let deadline = timeout.deadline();
        let id = state.register(mask, mode, clear_on_exit, None);
        self.block_until_released(state, id, deadline)
    }

    /// Waits for the bits of `mask` to satisfy `mode` without blocking the
    /// thread, by returning a future.
    ///
    /// Semantics match [`wait`][Self::wait] except that no timeout is built
    /// in; callers bound the wait with their executor's timer facilities if
    /// needed. Dropping the future deregisters the waiter.
    ///
    /// # Panics
    ///
    /// Panics if `mask` has bits outside the configured width.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bit_events::{EventBitSet, EventMask, WaitMode};
    /// use futures::executor::block_on;
    ///
    /// let events = EventBitSet::new();
    /// events.set_bits(EventMask::bit(2));
    ///
    /// let observed = block_on(events.wait_async(EventMask::bit(2), WaitMode::Any, false));
    /// assert!(observed.contains(EventMask::bit(2)));
    /// ```
    pub fn wait_async(
        &self,
        mask: EventMask,
        mode: WaitMode,
        clear_on_exit: bool,
    ) -> WaitFuture<'_> {
        self.assert_valid(mask);
        WaitFuture::new(self, mask, mode, clear_on_exit)
    }

    /// Rendezvous: atomically sets the bits of `set_mask`, then waits until
    /// every bit of `wait_mask` is set, consuming `wait_mask` when the last
    /// participant arrives.
    ///
    /// This is the barrier idiom packaged as one atomic operation: N threads
    /// each set their own arrival bit and wait for all N bits, and the
    /// arrival that completes the set clears the rendezvous bits for the
    /// whole group. Returns the flag word observed when the wait ended; on
    /// timeout the arrival bits set so far remain set.
    ///
    /// # Panics
    ///
    /// Panics if either mask has bits outside the configured width.
    pub fn sync(&self, set_mask: EventMask, wait_mask: EventMask, timeout: Timeout) -> EventMask {
        self.assert_valid(set_mask);
        self.assert_valid(wait_mask);

        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
        state.bits |= set_mask;
        let after_set = state.bits;
        let wakers = state.release_satisfied();

        if after_set.contains(wait_mask) {
            // Last arrival: consume the rendezvous bits for the whole group.
            state.bits &= !wait_mask;
            drop(state);

            self.condvar.notify_all();
            for waker in wakers {
                waker.wake();
            }

            return after_set;
        }

        if timeout == Timeout::IMMEDIATE {
            let bits = state.bits;
            drop(state);

            self.condvar.notify_all();
            for waker in wakers {
                waker.wake();
            }

            return bits;
        }

        let deadline = timeout.deadline();

        // Registration must not be separated from the set: if the rendezvous
        // completed between the two, the completing arrival would have
        // already consumed our bits and we would wait forever.
        let id = state.register(wait_mask, WaitMode::All, true, None);

        // Our set may have released unrelated waiters; wake them before we
        // go to sleep. Waking under the lock is harmless here because we are
        // about to release it in the condvar wait.
        self.condvar.notify_all();
        for waker in wakers {
            waker.wake();
        }

        self.block_until_released(state, id, deadline)
    }

    /// Sleeps on the condvar until the registered entry is stamped satisfied
    /// or the deadline passes. `None` means wait forever.
    fn block_until_released(
        &self,
        mut state: MutexGuard<'_, SetState>,
        id: u64,
        deadline: Option<Instant>,
    ) -> EventMask {
        loop {
            let position = state
                .position(id)
                .expect("registered waiter disappeared while blocked");

            if let Some(snapshot) = state.waiters[position].satisfied {
                state.waiters.swap_remove(position);
                return snapshot;
            }

            match deadline {
                None => {
                    state = self.condvar.wait(state).expect(ERR_POISONED_LOCK);
                }
                Some(deadline) => {
                    let now = Instant::now();

                    if now >= deadline {
                        // Timed out: deregister and report the current,
                        // unsatisfied word. We hold the lock from the check
                        // above, so a concurrent set cannot slip in between.
                        let bits = state.bits;
                        state.waiters.swap_remove(position);
                        return bits;
                    }

                    let (guard, _timed_out) = self
                        .condvar
                        .wait_timeout(state, deadline - now)
                        .expect(ERR_POISONED_LOCK);
                    state = guard;
                }
            }
        }
    }

    /// Polls an async wait, registering or re-arming the waiter as needed.
    ///
    /// `registration` carries the waiter id across polls; it is `None` until
    /// the first poll registers the entry and is reset to `None` once the
    /// wait completes.
    pub(crate) fn poll_wait(
        &self,
        registration: &mut Option<u64>,
        mask: EventMask,
        mode: WaitMode,
        clear_on_exit: bool,
        waker: &Waker,
    ) -> Option<EventMask> {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        match *registration {
            None => {
                if mask.is_empty() {
                    return Some(state.bits);
                }

                if mode.is_satisfied(state.bits, mask) {
                    let snapshot = state.bits;

                    if clear_on_exit {
                        state.bits &= !mask;
                    }

                    return Some(snapshot);
                }

                let id = state.register(mask, mode, clear_on_exit, Some(waker.clone()));
                *registration = Some(id);
                None
            }
            Some(id) => {
                let position = state
                    .position(id)
                    .expect("registered waiter disappeared between polls");

                if let Some(snapshot) = state.waiters[position].satisfied {
                    state.waiters.swap_remove(position);
                    *registration = None;
                    Some(snapshot)
                } else {
                    // Only the waker from the most recent poll may be woken,
                    // per the Future API contract.
                    state.waiters[position].waker = Some(waker.clone());
                    None
                }
            }
        }
    }

    /// Deregisters an async waiter whose future was dropped before
    /// completion.
    pub(crate) fn cancel_wait(&self, id: u64) {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        if let Some(position) = state.position(id) {
            state.waiters.swap_remove(position);
        }
    }

    fn assert_valid(&self, mask: EventMask) {
        assert!(
            self.valid.contains(mask),
            "mask {mask} has bits outside the configured {}-bit width",
            self.width()
        );
    }
}

impl Default for EventBitSet {
    fn default() -> Self {
        Self::new()
    }
}
