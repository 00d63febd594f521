//! Cancellable scheduled tasks
//!
//! One-shot and recurring timers backing the policies: the circuit
//! breaker's reset and bucket-rotation schedules and the distribute
//! policy's deadline. Each timer returns a [`TimerHandle`]; cancelling the
//! handle prevents the callback from firing (one-shot) or stops the
//! schedule (recurring).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

/// Handle used to cancel a scheduled task
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Cancel the timer; a pending one-shot callback will not fire
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether the timer has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Run `callback` once after `delay` unless cancelled first
///
/// Must be called from within a tokio runtime.
pub fn oneshot<F>(delay: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let handle = TimerHandle::new();
    let handle_clone = handle.clone();

    tokio::spawn(async move {
        sleep(delay).await;
        if !handle_clone.is_cancelled() {
            callback();
        }
    });

    handle
}

/// Run `callback` every `period` until the handle is cancelled
///
/// The first tick happens one full `period` after the call, not
/// immediately. Must be called from within a tokio runtime.
pub fn recurring<F>(period: Duration, mut callback: F) -> TimerHandle
where
    F: FnMut() + Send + 'static,
{
    let handle = TimerHandle::new();
    let handle_clone = handle.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // Skip first immediate tick

        while !handle_clone.is_cancelled() {
            interval.tick().await;
            if !handle_clone.is_cancelled() {
                callback();
            }
        }
    });

    handle
}
