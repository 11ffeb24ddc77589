//! Streaming pipeline between a scan producer and the task consuming it.
//!
//! The producer runs as its own tokio task and pushes items through a bounded
//! channel, so it can work ahead of the consumer by at most the channel
//! capacity. The producer's terminal result (next cold time or error) sits in
//! its join handle and is only read once the channel has closed. Dropping a
//! [`Scan`] cancels and aborts the producer, releasing whatever cursor it
//! holds.

use std::{future::Future, time::SystemTime};

use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::error::LakeError;

/// Items the producer may buffer ahead of the consumer.
pub(crate) const SCAN_CHANNEL_CAPACITY: usize = 1;

/// The consumer stopped listening, or the scan was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("scan sink closed")]
pub struct SinkClosed;

/// Producer-side handle used by a scan to emit work items.
#[derive(Debug)]
pub struct ScanSink<T> {
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
}

impl<T> ScanSink<T> {
    /// Deliver one item, waiting while the consumer is still busy with the
    /// previous one.
    pub async fn send(&self, item: T) -> Result<(), SinkClosed> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SinkClosed),
            sent = self.tx.send(item) => sent.map_err(|_| SinkClosed),
        }
    }

    /// Whether further items would be discarded.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the scan has been cancelled or abandoned by the consumer.
    pub async fn closed(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }
}

/// Consumer-side handle of a running scan.
#[derive(Debug)]
pub struct Scan<T> {
    rx: mpsc::Receiver<T>,
    producer: Option<JoinHandle<Result<Option<SystemTime>, LakeError>>>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> Scan<T> {
    /// Start `produce` on the runtime, handing it the sending half.
    ///
    /// The producer is cancelled whenever `parent` is.
    pub(crate) fn spawn<F, Fut>(parent: &CancellationToken, produce: F) -> Self
    where
        F: FnOnce(ScanSink<T>) -> Fut,
        Fut: Future<Output = Result<Option<SystemTime>, LakeError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(SCAN_CHANNEL_CAPACITY);
        let cancel = parent.child_token();
        let sink = ScanSink {
            tx,
            cancel: cancel.clone(),
        };
        let producer = tokio::spawn(produce(sink));
        Self {
            rx,
            producer: Some(producer),
            cancel,
        }
    }
}

impl<T> Scan<T> {
    /// Next item, or `None` once the producer has finished and the channel
    /// is drained.
    pub(crate) async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Producer's terminal result. Call only after [`Scan::next`] returned
    /// `None`.
    pub(crate) async fn finish(mut self) -> Result<Option<SystemTime>, LakeError> {
        let Some(producer) = self.producer.take() else {
            return Ok(None);
        };
        match producer.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(LakeError::Cancelled),
            Err(err) => Err(LakeError::other(err)),
        }
    }
}

impl<T> Drop for Scan<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

/// Run `fut` unless `cancel` fires first, in which case `fut` is dropped and
/// `None` returned.
pub(crate) async fn cancellable<F>(cancel: &CancellationToken, fut: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}
