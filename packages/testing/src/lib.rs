//! Private helpers for testing and examples in `bit_events` packages.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// How long a test may run before the watchdog declares it hung.
const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs a test with a timeout to prevent infinite hangs.
///
/// Synchronization tests block real threads, so a lost-wakeup bug manifests
/// as a hang rather than an assertion failure. Wrapping the test body in this
/// guard turns such a hang into a panic instead of stalling the whole suite.
///
/// # Panics
///
/// Panics if the test exceeds the timeout.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// with_watchdog(|| {
///     // Your test code here
///     assert_eq!(2 + 2, 4);
/// });
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        let result = test_fn();

        // If this fails, the receiver has already given up on us.
        drop(tx.send(result));
    });

    match rx.recv_timeout(WATCHDOG_TIMEOUT) {
        Ok(result) => {
            test_handle.join().expect("test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded the {WATCHDOG_TIMEOUT:?} watchdog timeout")
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(_) => panic!("test thread disconnected unexpectedly"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchdog_allows_fast_tests() {
        let result = with_watchdog(|| 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn watchdog_propagates_return_value() {
        let result = with_watchdog(|| "hello world");
        assert_eq!(result, "hello world");
    }

    #[test]
    #[should_panic]
    fn watchdog_propagates_panics() {
        with_watchdog(|| panic!("inner failure"));
    }
}
