//! Cancellable event streams.
//!
//! Native notification APIs (HID reads, filesystem watchers) hand out events
//! through callbacks or blocking calls. [`EventStream`] wraps any such producer
//! behind one shape: a producer task feeding a bounded channel, a cancellation
//! token shared with the producer, and an optional teardown hook that runs
//! exactly once when the stream is cancelled or dropped.
//!
//! Consumers only ever see `next().await` (or [`futures::Stream`]), so the
//! dispatcher never touches native callback registration directly.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Producer half of an [`EventStream`].
pub struct Emitter<T> {
    /// Channel into the consumer.
    tx: mpsc::Sender<T>,
    /// Shared with the consumer; cancelled when it goes away.
    cancel: CancellationToken,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<T: Send> Emitter<T> {
    /// Deliver `item`, waiting for channel space.
    ///
    /// Returns `false` once the stream is cancelled or the consumer is gone;
    /// producers should stop when that happens.
    pub async fn emit(&self, item: T) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            res = self.tx.send(item) => res.is_ok(),
        }
    }

    /// Blocking variant of [`Emitter::emit`] for producers running on a
    /// dedicated thread. Must not be called from async context.
    pub fn blocking_emit(&self, item: T) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx.blocking_send(item).is_ok()
    }

    /// Deliver `item` without waiting. Suitable for native callbacks.
    ///
    /// Returns `false` when the channel is full, closed or cancelled.
    pub fn try_emit(&self, item: T) -> bool {
        !self.cancel.is_cancelled() && self.tx.try_send(item).is_ok()
    }

    /// True once the consumer cancelled the stream.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the consumer cancels the stream.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Hook run once on cancellation.
type Teardown = Box<dyn FnOnce() + Send>;

/// Consumer half: a lazily produced, cancellable sequence of `T`.
///
/// Dropping the stream cancels it. Use [`EventStream::shutdown`] to also wait
/// for the producer to exit.
pub struct EventStream<T> {
    /// Items from the producer.
    rx: mpsc::Receiver<T>,
    /// Cancellation shared with every emitter.
    cancel: CancellationToken,
    /// Channel capacity, reused by derived streams.
    capacity: usize,
    /// Producer task, joined by `shutdown`.
    producer: Option<JoinHandle<()>>,
    /// Pending teardown hook.
    teardown: Option<Teardown>,
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("capacity", &self.capacity)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("has_producer", &self.producer.is_some())
            .finish()
    }
}

impl<T> EventStream<T> {
    /// True once the stream was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the stream: signal the producer, close the channel and run the
    /// teardown hook. Idempotent.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    /// Register a hook that runs once when the stream is cancelled.
    ///
    /// Typically releases a native handle (watcher, device) captured by value.
    pub fn on_teardown<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let prev = self.teardown.take();
        self.teardown = Some(Box::new(move || {
            f();
            if let Some(prev) = prev {
                prev();
            }
        }));
        self
    }

    /// Cancel and wait for the producer task to finish.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.producer.take()
            && let Err(e) = handle.await
            && e.is_panic()
        {
            warn!("event_stream_producer_panicked");
        }
    }
}

impl<T: Send + 'static> EventStream<T> {
    /// Create an unattached stream together with its emitter.
    pub fn channel(capacity: usize) -> (Emitter<T>, Self) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        let emitter = Emitter {
            tx,
            cancel: cancel.clone(),
        };
        let stream = Self {
            rx,
            cancel,
            capacity,
            producer: None,
            teardown: None,
        };
        (emitter, stream)
    }

    /// Run `producer` as a tokio task feeding the stream.
    ///
    /// The stream ends when the producer returns and drops its emitter.
    pub fn spawn<F, Fut>(capacity: usize, producer: F) -> Self
    where
        F: FnOnce(Emitter<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut stream) = Self::channel(capacity);
        stream.producer = Some(tokio::spawn(producer(tx)));
        stream
    }

    /// Run a blocking `producer` on the blocking thread pool.
    ///
    /// The producer must poll [`Emitter::is_cancelled`] often enough to honor
    /// cancellation promptly.
    pub fn spawn_blocking<F>(capacity: usize, producer: F) -> Self
    where
        F: FnOnce(Emitter<T>) + Send + 'static,
    {
        let (tx, mut stream) = Self::channel(capacity);
        stream.producer = Some(tokio::task::spawn_blocking(move || producer(tx)));
        stream
    }

    /// Next item, or `None` once the stream ended or was cancelled.
    pub async fn next(&mut self) -> Option<T> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }
}

impl<T: Clone + PartialEq + Send + 'static> EventStream<T> {
    /// Suppress consecutive equal items.
    ///
    /// The returned stream owns this one; cancelling it shuts this one down.
    pub fn dedup(self) -> Self {
        let capacity = self.capacity;
        let mut inner = self;
        Self::spawn(capacity, move |tx| async move {
            let mut last = Dedup::new();
            loop {
                tokio::select! {
                    _ = tx.cancelled() => break,
                    item = inner.next() => match item {
                        Some(item) => {
                            if last.admit(&item) && !tx.emit(item).await {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            inner.shutdown().await;
        })
    }
}

impl<T> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Remembers the last admitted value and rejects an identical successor.
#[derive(Debug, Clone)]
pub struct Dedup<T> {
    /// Last admitted value.
    last: Option<T>,
}

impl<T> Default for Dedup<T> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<T: Clone + PartialEq> Dedup<T> {
    /// Empty filter; the first item is always admitted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` (and remembers `item`) when it differs from the last
    /// admitted value.
    pub fn admit(&mut self, item: &T) -> bool {
        if self.last.as_ref() == Some(item) {
            return false;
        }
        self.last = Some(item.clone());
        true
    }

    /// Forget the last value so the next item is always admitted.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
