//! Future implementation for asynchronous bit waits.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::EventMask;
use crate::set::{EventBitSet, WaitMode};

/// A `Future` that resolves once the requested bit condition holds.
///
/// Created by [`EventBitSet::wait_async`]. Dropping the future before it
/// resolves deregisters the waiter. Note that a clear-on-exit wait that is
/// satisfied and then dropped without being polled has already consumed its
/// bits; the snapshot is simply discarded.
#[derive(Debug)]
pub struct WaitFuture<'a> {
    set: &'a EventBitSet,
    mask: EventMask,
    mode: WaitMode,
    clear_on_exit: bool,
    registration: Option<u64>,
}

impl<'a> WaitFuture<'a> {
    pub(crate) fn new(
        set: &'a EventBitSet,
        mask: EventMask,
        mode: WaitMode,
        clear_on_exit: bool,
    ) -> Self {
        Self {
            set,
            mask,
            mode,
            clear_on_exit,
            registration: None,
        }
    }
}

impl Future for WaitFuture<'_> {
    type Output = EventMask;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        this.set
            .poll_wait(
                &mut this.registration,
                this.mask,
                this.mode,
                this.clear_on_exit,
                cx.waker(),
            )
            .map_or(Poll::Pending, Poll::Ready)
    }
}

impl Drop for WaitFuture<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.registration {
            self.set.cancel_wait(id);
        }
    }
}
