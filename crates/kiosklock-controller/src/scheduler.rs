//! Restartable single-shot relock countdown.
//!
//! Each [`arm`](RelockScheduler::arm) call is bound to a fresh generation
//! number. The timer task checks the generation before posting
//! [`LockEvent::RelockFired`], and the controller checks it again when the
//! event is dequeued: a timer that fired just before being superseded may
//! already sit in the queue, and that second check turns it into a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::events::LockEvent;

/// Countdown that posts a relock request after an idle period.
#[derive(Debug)]
pub struct RelockScheduler {
    events: mpsc::Sender<LockEvent>,
    generation: Arc<AtomicU64>,
    deadline: Option<Instant>,
    task: Option<JoinHandle<()>>,
}

impl RelockScheduler {
    /// Create a scheduler posting into `events`. Nothing is armed.
    pub fn new(events: mpsc::Sender<LockEvent>) -> Self {
        Self {
            events,
            generation: Arc::new(AtomicU64::new(0)),
            deadline: None,
            task: None,
        }
    }

    /// Cancel any pending deadline and schedule a new one `duration` from now.
    ///
    /// A zero `duration` means auto-relock is off: the pending deadline is
    /// cancelled and nothing is armed. Returns the generation of the new
    /// deadline, if one was armed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime with a non-zero `duration`.
    pub fn arm(&mut self, duration: Duration) -> Option<u64> {
        self.cancel();
        if duration.is_zero() {
            return None;
        }

        let generation = self.generation.load(Ordering::Acquire);
        let deadline = Instant::now() + duration;
        let current = Arc::clone(&self.generation);
        let events = self.events.clone();

        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if current.load(Ordering::Acquire) != generation {
                trace!(generation, "Superseded relock timer expired");
                return;
            }
            if events.send(LockEvent::RelockFired { generation }).await.is_err() {
                debug!(generation, "Event queue closed before relock fired");
            }
        }));
        self.deadline = Some(deadline);

        debug!(generation, secs = duration.as_secs_f64(), "Relock armed");
        Some(generation)
    }

    /// Invalidate the pending deadline, if any.
    ///
    /// A fire already in flight for the old generation is suppressed.
    pub fn cancel(&mut self) {
        let previous = self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.deadline.take().is_some() {
            trace!(generation = previous, "Relock cancelled");
        }
    }

    /// Returns `true` if `generation` belongs to the deadline still pending.
    pub fn is_current(&self, generation: u64) -> bool {
        self.deadline.is_some() && self.generation.load(Ordering::Acquire) == generation
    }

    /// Consume a fire for `generation`.
    ///
    /// Returns `true` and disarms the scheduler if the fire is current;
    /// returns `false` for a stale fire, leaving any newer deadline intact.
    pub fn acknowledge(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.cancel();
        true
    }

    /// The pending deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the pending deadline, if armed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` if a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Drop for RelockScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> (RelockScheduler, mpsc::Receiver<LockEvent>) {
        let (tx, rx) = mpsc::channel(8);
        (RelockScheduler::new(tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_duration() {
        let (mut scheduler, mut rx) = scheduler();
        let generation = scheduler.arm(Duration::from_secs(90)).unwrap();

        let early = tokio::time::timeout(Duration::from_secs(89), rx.recv()).await;
        assert!(early.is_err());

        let event = rx.recv().await.unwrap();
        assert_eq!(event, LockEvent::RelockFired { generation });
        assert!(scheduler.acknowledge(generation));
        assert!(!scheduler.is_armed());
        assert!(!scheduler.acknowledge(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_arms_nothing() {
        let (mut scheduler, mut rx) = scheduler();
        scheduler.arm(Duration::from_secs(10));
        assert_eq!(scheduler.arm(Duration::ZERO), None);
        assert!(!scheduler.is_armed());

        let fired = tokio::time::timeout(Duration::from_secs(60), rx.recv()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_deadline() {
        let (mut scheduler, mut rx) = scheduler();
        let first = scheduler.arm(Duration::from_secs(10)).unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        let second = scheduler.arm(Duration::from_secs(10)).unwrap();
        assert_ne!(first, second);
        assert!(!scheduler.is_current(first));

        // Nothing at the first deadline
        let early = tokio::time::timeout(Duration::from_secs(9), rx.recv()).await;
        assert!(early.is_err());

        let event = rx.recv().await.unwrap();
        assert_eq!(event, LockEvent::RelockFired { generation: second });
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_fire() {
        let (mut scheduler, mut rx) = scheduler();
        scheduler.arm(Duration::from_secs(1));
        scheduler.cancel();

        let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(fired.is_err());
        assert_eq!(scheduler.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_queued_before_rearm_is_stale() {
        let (mut scheduler, mut rx) = scheduler();
        let first = scheduler.arm(Duration::from_secs(1)).unwrap();

        // Let the first timer post its event, then re-arm before it is handled
        let queued = rx.recv().await.unwrap();
        let second = scheduler.arm(Duration::from_secs(30)).unwrap();

        assert_eq!(queued, LockEvent::RelockFired { generation: first });
        assert!(!scheduler.acknowledge(first));
        assert!(scheduler.is_current(second));
        assert_eq!(scheduler.remaining(), Some(Duration::from_secs(30)));
    }
}
