use tokio::sync::watch;

/// Counts dispatched slices that have not yet succeeded.
///
/// Work can be added after someone started waiting; the wait only
/// completes when the count is observed at zero.
pub(crate) struct CompletionBarrier {
    outstanding: watch::Sender<usize>,
}

impl CompletionBarrier {
    pub(crate) fn new() -> Self {
        Self {
            outstanding: watch::Sender::new(0),
        }
    }

    pub(crate) fn add(&self) {
        self.outstanding.send_modify(|n| *n += 1);
    }

    pub(crate) fn done(&self) {
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }

    pub(crate) fn pending(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Resolves once the count reaches zero.
    pub(crate) async fn wait(&self) {
        let mut rx = self.outstanding.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|&n| n == 0).await;
    }
}
