//! Bounded concurrent dispatch of slice operations.
//!
//! A [`TransferEngine`] runs one session's slice work: each dispatched unit
//! gets its own task, at most `max_in_flight` run at once, failed units go
//! through a bounded retry queue, and [`TransferEngine::finish`] waits for
//! every unit to succeed or for the session deadline to pass.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::TransferError;
use crate::barrier::CompletionBarrier;
use crate::config::EngineLimits;

/// A single-slice operation the engine can run and retry.
pub trait SliceTask: Send + Sync + 'static {
    /// What gets dispatched and, on failure, queued for retry.
    type Unit: Send + 'static;

    /// Slice index of a unit, for logging.
    fn index(unit: &Self::Unit) -> u32;

    /// Performs the operation once.
    fn run<'a>(
        &'a self,
        unit: &'a Self::Unit,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransferError>> + Send + 'a>>;
}

/// Counters from a completed engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineReport {
    /// Units dispatched by the caller.
    pub dispatched: u64,
    /// Re-dispatches of failed units.
    pub retries: u64,
    pub elapsed: Duration,
}

struct Shared<T: SliceTask> {
    task: T,
    label: String,
    permits: Arc<Semaphore>,
    barrier: CompletionBarrier,
    retry_tx: mpsc::Sender<T::Unit>,
    cancel: CancellationToken,
    timed_out: AtomicBool,
    started_at: Instant,
    deadline: Duration,
    retry_delay: Duration,
    dispatched: AtomicU64,
    retries: AtomicU64,
}

impl<T: SliceTask> Shared<T> {
    fn expired(&self) -> bool {
        self.started_at.elapsed() > self.deadline
    }

    fn mark_timed_out(&self) {
        if !self.timed_out.swap(true, Ordering::SeqCst) {
            warn!(
                file = %self.label,
                deadline = ?self.deadline,
                outstanding = self.barrier.pending(),
                "transfer deadline exceeded"
            );
        }
        self.cancel.cancel();
    }

    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.permits.clone().acquire_owned() => permit.ok(),
        }
    }
}

/// Runs the slice work of one session.
///
/// Dropping the engine without calling [`finish`](Self::finish) cancels
/// any work still in flight.
pub struct TransferEngine<T: SliceTask> {
    shared: Arc<Shared<T>>,
    retry_loop: Option<JoinHandle<()>>,
}

impl<T: SliceTask> TransferEngine<T> {
    /// Creates an engine and starts its retry loop. The deadline clock
    /// starts now.
    pub fn new(task: T, limits: &EngineLimits, label: impl Into<String>) -> Self {
        let (retry_tx, retry_rx) = mpsc::channel(limits.retry_queue.max(1));
        let shared = Arc::new(Shared {
            task,
            label: label.into(),
            permits: Arc::new(Semaphore::new(limits.max_in_flight.max(1))),
            barrier: CompletionBarrier::new(),
            retry_tx,
            cancel: CancellationToken::new(),
            timed_out: AtomicBool::new(false),
            started_at: Instant::now(),
            deadline: limits.deadline,
            retry_delay: limits.retry_delay,
            dispatched: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        });
        let retry_loop = tokio::spawn(retry_loop(shared.clone(), retry_rx));
        Self {
            shared,
            retry_loop: Some(retry_loop),
        }
    }

    /// Starts a worker for `unit`, waiting for a free slot first.
    ///
    /// Fails with [`TransferError::Timeout`] once the deadline has passed.
    pub async fn dispatch(&self, unit: T::Unit) -> Result<(), TransferError> {
        let shared = &self.shared;
        if shared.expired() {
            shared.mark_timed_out();
        }
        let Some(permit) = shared.acquire().await else {
            return Err(TransferError::Timeout(shared.deadline));
        };

        shared.barrier.add();
        shared.dispatched.fetch_add(1, Ordering::Relaxed);
        spawn_worker(shared.clone(), permit, unit);
        Ok(())
    }

    /// Units dispatched or queued for retry that have not yet succeeded.
    pub fn outstanding(&self) -> usize {
        self.shared.barrier.pending()
    }

    /// Waits for every dispatched unit to succeed.
    ///
    /// Returns [`TransferError::Timeout`] if the deadline passes first, or
    /// if it turns out to have passed by the time the wait returns.
    pub async fn finish(mut self) -> Result<EngineReport, TransferError> {
        let shared = self.shared.clone();
        let deadline_at = shared.started_at + shared.deadline;

        let completed = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => false,
            _ = tokio::time::sleep_until(deadline_at) => false,
            _ = shared.barrier.wait() => true,
        };

        shared.cancel.cancel();
        if let Some(handle) = self.retry_loop.take() {
            let _ = handle.await;
        }

        if !completed || shared.timed_out.load(Ordering::SeqCst) || shared.expired() {
            shared.mark_timed_out();
            return Err(TransferError::Timeout(shared.deadline));
        }

        let report = EngineReport {
            dispatched: shared.dispatched.load(Ordering::Relaxed),
            retries: shared.retries.load(Ordering::Relaxed),
            elapsed: shared.started_at.elapsed(),
        };
        info!(
            file = %shared.label,
            dispatched = report.dispatched,
            retries = report.retries,
            elapsed = ?report.elapsed,
            "all slices transferred"
        );
        Ok(report)
    }
}

impl<T: SliceTask> Drop for TransferEngine<T> {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

fn spawn_worker<T: SliceTask>(shared: Arc<Shared<T>>, permit: OwnedSemaphorePermit, unit: T::Unit) {
    tokio::spawn(async move {
        let index = T::index(&unit);
        let result = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            result = shared.task.run(&unit) => result,
        };
        drop(permit);

        match result {
            Ok(()) => {
                debug!(file = %shared.label, index, "slice done");
                shared.barrier.done();
            }
            Err(e) => {
                warn!(file = %shared.label, index, error = %e, "slice failed, queued for retry");
                if !shared.retry_delay.is_zero() {
                    tokio::select! {
                        biased;
                        _ = shared.cancel.cancelled() => return,
                        _ = tokio::time::sleep(shared.retry_delay) => {}
                    }
                }
                tokio::select! {
                    biased;
                    _ = shared.cancel.cancelled() => {}
                    sent = shared.retry_tx.send(unit) => {
                        if sent.is_err() {
                            debug!(file = %shared.label, index, "retry queue closed");
                        }
                    }
                }
            }
        }
    });
}

async fn retry_loop<T: SliceTask>(shared: Arc<Shared<T>>, mut retry_rx: mpsc::Receiver<T::Unit>) {
    loop {
        let unit = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            unit = retry_rx.recv() => match unit {
                Some(unit) => unit,
                None => return,
            },
        };

        if shared.expired() {
            shared.mark_timed_out();
            return;
        }

        let Some(permit) = shared.acquire().await else {
            return;
        };
        shared.retries.fetch_add(1, Ordering::Relaxed);
        debug!(file = %shared.label, index = T::index(&unit), "retrying slice");
        spawn_worker(shared.clone(), permit, unit);
    }
}
