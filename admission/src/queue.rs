use std::sync::Arc;
use std::time::Duration;

use ballot_clock::LamportClock;
use ballot_types::LamportStamp;
use thiserror::Error;
use tokio::sync::{Semaphore, TryAcquireError};

/// Default number of concurrently admitted vote operations.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

#[derive(Debug, Error)]
pub enum AdmissionError {
    /// No slot freed up within the wait timeout. Retryable.
    #[error("admission queue busy: no slot within {waited_ms}ms")]
    Busy { waited_ms: u64 },

    /// The queue was shut down while the request was waiting.
    #[error("admission queue closed")]
    Closed,
}

/// A held processing slot.
///
/// Dropping the permit releases the slot and wakes the next waiter in
/// arrival order. The permit carries the Lamport stamp taken when the
/// request joined the queue.
pub struct AdmissionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
    queued_at: LamportStamp,
}

impl AdmissionPermit {
    /// Lamport stamp assigned when the request entered the queue.
    pub fn queued_at(&self) -> LamportStamp {
        self.queued_at
    }
}

/// FIFO bounded-concurrency gate in front of vote processing.
pub struct AdmissionQueue {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    wait_timeout: Duration,
    clock: Arc<LamportClock>,
}

impl AdmissionQueue {
    pub fn new(max_concurrent: usize, wait_timeout: Duration, clock: Arc<LamportClock>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            wait_timeout,
            clock,
        }
    }

    /// Wait for a processing slot, in arrival order.
    ///
    /// The returned permit holds the slot until dropped. Waiting longer than
    /// the configured timeout fails with [`AdmissionError::Busy`]. The tokio
    /// semaphore is fair, so no waiter can overtake an earlier one.
    pub async fn submit(&self) -> Result<AdmissionPermit, AdmissionError> {
        let queued_at = self.clock.tick();

        // Fast path: grab a free slot without touching the timer.
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => {
                return Ok(AdmissionPermit {
                    _permit: permit,
                    queued_at,
                })
            }
            Err(TryAcquireError::Closed) => return Err(AdmissionError::Closed),
            Err(TryAcquireError::NoPermits) => {}
        }

        let acquire = Arc::clone(&self.semaphore).acquire_owned();
        match tokio::time::timeout(self.wait_timeout, acquire).await {
            Ok(Ok(permit)) => Ok(AdmissionPermit {
                _permit: permit,
                queued_at,
            }),
            Ok(Err(_)) => Err(AdmissionError::Closed),
            Err(_) => {
                tracing::debug!(
                    waited_ms = self.wait_timeout.as_millis() as u64,
                    "vote admission timed out"
                );
                Err(AdmissionError::Busy {
                    waited_ms: self.wait_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn queue(max: usize, timeout_ms: u64) -> AdmissionQueue {
        AdmissionQueue::new(
            max,
            Duration::from_millis(timeout_ms),
            Arc::new(LamportClock::new()),
        )
    }

    #[tokio::test]
    async fn permits_release_on_drop() {
        let q = queue(1, 100);
        let permit = q.submit().await.unwrap();
        assert_eq!(q.available(), 0);
        drop(permit);
        assert_eq!(q.available(), 1);
    }

    #[tokio::test]
    async fn waiting_past_timeout_is_busy() {
        let q = queue(1, 50);
        let _held = q.submit().await.unwrap();

        match q.submit().await {
            Err(AdmissionError::Busy { waited_ms }) => assert_eq!(waited_ms, 50),
            other => panic!("expected Busy, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn queued_stamps_are_increasing() {
        let q = queue(5, 100);
        let a = q.submit().await.unwrap();
        let b = q.submit().await.unwrap();
        assert!(a.queued_at() < b.queued_at());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_never_exceeds_limit() {
        let q = Arc::new(queue(2, 5_000));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let q = Arc::clone(&q);
            let inf = Arc::clone(&in_flight);
            let max = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _permit = q.submit().await.unwrap();
                let current = inf.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                inf.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn waiters_admitted_in_arrival_order() {
        let q = Arc::new(queue(1, 5_000));
        let gate = q.submit().await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handles = Vec::new();
        for i in 0..4u32 {
            let q = Arc::clone(&q);
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let _permit = q.submit().await.unwrap();
                tx.send(i).unwrap();
            }));
            // Give each waiter time to join the queue before the next arrives.
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        drop(gate);
        for h in handles {
            h.await.unwrap();
        }

        let mut order = Vec::new();
        while let Ok(i) = rx.try_recv() {
            order.push(i);
        }
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
}
