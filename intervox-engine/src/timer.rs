use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Cancellable one-second-resolution countdown bounding a recording.
///
/// `on_tick(remaining)` fires each second; `on_expire` fires once when the
/// countdown reaches zero, after which the timer is inert. At most one
/// countdown exists per logical recording; the owner cancels the previous
/// one before starting a new one (dropping a `Countdown` cancels it).
pub struct Countdown {
    cancelled: Arc<AtomicBool>,
    remaining: Arc<AtomicU32>,
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn start<T, E>(seconds: u32, on_tick: T, on_expire: E) -> Self
    where
        T: Fn(u32) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let remaining = Arc::new(AtomicU32::new(seconds));

        let flag = cancelled.clone();
        let left_out = remaining.clone();
        let task = tokio::spawn(async move {
            let mut left = seconds;
            while left > 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if flag.load(Ordering::SeqCst) {
                    return;
                }
                left -= 1;
                left_out.store(left, Ordering::SeqCst);
                on_tick(left);
            }
            // The swap makes expiry and cancellation mutually exclusive.
            if !flag.swap(true, Ordering::SeqCst) {
                on_expire();
            }
        });

        Self {
            cancelled,
            remaining,
            task: Some(task),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }

    /// Stops delivery of further ticks and expiry. Idempotent; safe after
    /// expiry or when never observed ticking.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}
