//! Cross-thread "new frame available" notification.
//!
//! The producer side (`FrameSignal`) may be cloned into any number of decoder threads. The
//! consumer side (`FrameWaiter`) belongs to the render thread. Notifications coalesce: any burst
//! of `notify` calls between two `take_pending` calls schedules exactly one redraw.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Shared {
    pending: Mutex<bool>,
    cond: Condvar,
    generation: AtomicU64,
}

/// Producer handle.
#[derive(Debug, Clone)]
pub struct FrameSignal {
    shared: Arc<Shared>,
}

/// Consumer handle (render thread).
#[derive(Debug, Clone)]
pub struct FrameWaiter {
    shared: Arc<Shared>,
}

/// Create a connected signal/waiter pair.
pub fn frame_signal() -> (FrameSignal, FrameWaiter) {
    let shared = Arc::new(Shared::default());
    (
        FrameSignal {
            shared: Arc::clone(&shared),
        },
        FrameWaiter { shared },
    )
}

impl FrameSignal {
    /// Mark a redraw as pending and wake the render thread.
    pub fn notify(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        let mut pending = lock(&self.shared.pending);
        *pending = true;
        self.shared.cond.notify_all();
    }

    /// A waiter connected to this signal.
    pub fn waiter(&self) -> FrameWaiter {
        FrameWaiter {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl FrameWaiter {
    /// Consume the pending flag. Returns true at most once per burst of notifications.
    pub fn take_pending(&self) -> bool {
        let mut pending = lock(&self.shared.pending);
        std::mem::replace(&mut *pending, false)
    }

    /// Peek without consuming.
    pub fn is_pending(&self) -> bool {
        *lock(&self.shared.pending)
    }

    /// Block until a notification is pending or `timeout` elapses, then consume it.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = lock(&self.shared.pending);
        let (mut pending, _) = self
            .shared
            .cond
            .wait_timeout_while(guard, timeout, |p| !*p)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *pending, false)
    }

    /// Monotonic count of notifications ever sent.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }
}

fn lock(m: &Mutex<bool>) -> std::sync::MutexGuard<'_, bool> {
    // A panicking producer cannot leave a bool in a torn state.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn bursts_coalesce_into_one_redraw() {
        let (sig, waiter) = frame_signal();
        for _ in 0..5 {
            sig.notify();
        }
        assert!(waiter.take_pending());
        assert!(!waiter.take_pending());
        assert_eq!(waiter.generation(), 5);
    }

    #[test]
    fn notification_crosses_threads() {
        let (sig, waiter) = frame_signal();
        let producer = thread::spawn(move || sig.notify());
        assert!(waiter.wait_timeout(Duration::from_secs(5)));
        producer.join().unwrap();
        assert!(!waiter.is_pending());
    }

    #[test]
    fn wait_times_out_without_producer() {
        let (_sig, waiter) = frame_signal();
        assert!(!waiter.wait_timeout(Duration::from_millis(10)));
    }
}
