//! Strict FIFO execution of mutating operations.
//!
//! One [`OperationQueue`] exists per backlog root. Every operation that
//! writes files goes through [`OperationQueue::enqueue`]; the single worker
//! task runs them one at a time in call order. Reads never wait here.
//!
//! Each operation runs in its own spawned task so a panic is contained: the
//! caller gets [`EngineError::Aborted`] and the worker moves on to the next
//! operation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::{mpsc, oneshot};

use crate::error::EngineError;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handle to a backlog's write queue. Clones share the same worker.
#[derive(Debug, Clone)]
pub struct OperationQueue {
    tx: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
}

impl OperationQueue {
    /// Start a queue on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::spawn_on(&Handle::current())
    }

    /// Like [`OperationQueue::new`], but reports a missing runtime instead
    /// of panicking.
    ///
    /// # Errors
    ///
    /// Returns the tokio error when no runtime is entered.
    pub fn try_new() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(|handle| Self::spawn_on(&handle))
    }

    /// Start a queue whose worker runs on `handle`.
    #[must_use]
    pub fn spawn_on(handle: &Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        handle.spawn(drain(rx, Arc::clone(&pending)));
        Self { tx, pending }
    }

    /// Operations admitted but not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Admit `op` behind every previously enqueued operation.
    ///
    /// The position in the queue is fixed when `enqueue` is called, not when
    /// the returned future is first polled. Dropping the future does not
    /// cancel the operation.
    pub fn enqueue<F, Fut, T, E>(&self, op: F) -> impl Future<Output = Result<T, E>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<EngineError> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let result = op().await;
            // The caller may have stopped waiting.
            let _ = reply_tx.send(result);
        });

        self.pending.fetch_add(1, Ordering::AcqRel);
        let closed = self.tx.send(job).is_err();
        if closed {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }

        async move {
            if closed {
                return Err(EngineError::QueueClosed.into());
            }
            reply_rx
                .await
                .unwrap_or_else(|_| Err(EngineError::Aborted.into()))
        }
    }
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<Job>, pending: Arc<AtomicUsize>) {
    while let Some(job) = rx.recv().await {
        if let Err(err) = tokio::spawn(job).await {
            tracing::warn!(error = %err, "queued operation panicked");
        }
        pending.fetch_sub(1, Ordering::AcqRel);
    }
    tracing::debug!("operation queue closed");
}

#[cfg(test)]
mod tests {
    use super::OperationQueue;
    use crate::error::{EngineError, ErrorKind};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn try_new_outside_a_runtime_is_an_error() {
        assert!(OperationQueue::try_new().is_err());
    }

    #[tokio::test]
    async fn results_go_to_their_callers() {
        let queue = OperationQueue::new();
        let a = queue.enqueue(|| async { Ok::<_, EngineError>(1) });
        let b = queue.enqueue(|| async { Ok::<_, EngineError>("two") });
        assert_eq!(a.await.unwrap(), 1);
        assert_eq!(b.await.unwrap(), "two");
    }

    #[tokio::test]
    async fn one_operation_at_a_time() {
        let queue = OperationQueue::new();
        let running = Arc::new(Mutex::new(0_u32));
        let peak = Arc::new(Mutex::new(0_u32));

        let futures: Vec<_> = (0..4)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                queue.enqueue(move || async move {
                    {
                        let mut now = running.lock().unwrap();
                        *now += 1;
                        let mut max = peak.lock().unwrap();
                        *max = (*max).max(*now);
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    *running.lock().unwrap() -= 1;
                    Ok::<_, EngineError>(())
                })
            })
            .collect();
        for future in futures {
            future.await.unwrap();
        }
        assert_eq!(*peak.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn panic_is_reported_as_aborted() {
        let queue = OperationQueue::new();
        let boom = queue.enqueue(|| async {
            if true {
                panic!("boom");
            }
            Ok::<u8, EngineError>(0)
        });
        let after = queue.enqueue(|| async { Ok::<_, EngineError>(7) });

        assert_eq!(boom.await.unwrap_err().kind(), ErrorKind::Unavailable);
        assert_eq!(after.await.unwrap(), 7);
    }
}
