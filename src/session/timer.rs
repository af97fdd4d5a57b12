//! Idle and hard expiry timers.
//!
//! Both timers are detached tokio tasks. Disposal only cancels a token and
//! never aborts the task, so a callback that is already running (possibly the
//! very cleanup that disposes the timer) always runs to completion.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Resettable inactivity timer.
///
/// Fires once per arming. After a fire it stays idle until [`reset`] arms it
/// again.
///
/// [`reset`]: IdleTimer::reset
#[derive(Debug)]
pub struct IdleTimer {
    deadline: watch::Sender<Option<Instant>>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl IdleTimer {
    /// Arm a timer that calls `on_fire` after `timeout` of inactivity.
    ///
    /// The task exits once `cancel` fires.
    pub fn spawn<F, Fut>(timeout: Duration, cancel: CancellationToken, on_fire: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = watch::channel(deadline_after(timeout));
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut pending = *rx.borrow_and_update();
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        pending = *rx.borrow_and_update();
                    }
                    _ = sleep_until(pending) => {
                        pending = None;
                        on_fire().await;
                    }
                }
            }
        });

        Self {
            deadline: tx,
            timeout,
            cancel,
        }
    }

    /// Push the deadline to `now + timeout`.
    ///
    /// Returns `false` if the timer has already been disposed.
    pub fn reset(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.deadline.send(deadline_after(self.timeout)).is_ok()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Stop the timer. Safe to call while the callback is in flight.
    pub fn dispose(self) {
        self.cancel.cancel();
    }
}

/// Fixed, non-resettable expiry timer.
#[derive(Debug)]
pub struct HardTimer {
    timeout: Duration,
    cancel: CancellationToken,
}

impl HardTimer {
    /// Arm a timer that calls `on_fire` once, `timeout` from now.
    pub fn spawn<F, Fut>(timeout: Duration, on_fire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let deadline = deadline_after(timeout);

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = sleep_until(deadline) => on_fire().await,
            }
        });

        Self { timeout, cancel }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Stop the timer. Safe to call while the callback is in flight.
    pub fn dispose(self) {
        self.cancel.cancel();
    }
}

/// `None` when `timeout` lies beyond what the clock can represent, which
/// means the timer never fires.
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
