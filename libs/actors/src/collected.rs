//! Collected Output Registry
//!
//! Per-actor sink queues for terminal messages, plus the timeout-bounded
//! streaming used to read them. A stream ends, without error, the first time
//! no item arrives within its timeout.

use crate::messages::{Message, Payload};
use crate::registry::ActorId;
use futures::stream::{self, Stream};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Cloneable handle to one unbounded FIFO sink
///
/// Clones share the same queue; concurrent readers take turns and each item
/// is delivered to exactly one of them.
pub struct CollectedQueue<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
    depth: Arc<AtomicUsize>,
}

impl<T> Clone for CollectedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
            depth: Arc::clone(&self.depth),
        }
    }
}

impl<T> std::fmt::Debug for CollectedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectedQueue")
            .field("depth", &self.len())
            .finish()
    }
}

impl<T> Default for CollectedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CollectedQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Append an item
    pub fn push(&self, item: T) {
        // Counted before the send so a parked reader can never decrement first.
        self.depth.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(item).is_err() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Wait up to `timeout` for the next item
    ///
    /// The timeout starts once this reader holds the queue; waiting behind
    /// another reader does not count against it.
    pub async fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(item)) => {
                self.depth.fetch_sub(1, Ordering::Relaxed);
                Some(item)
            }
            Ok(None) | Err(_) => None,
        }
    }

    /// Take the next item if one is ready and no reader holds the queue
    pub fn try_recv(&self) -> Option<T> {
        let mut rx = self.rx.try_lock().ok()?;
        let item = rx.try_recv().ok()?;
        self.depth.fetch_sub(1, Ordering::Relaxed);
        Some(item)
    }

    /// Take every item currently queued
    pub async fn drain(&self) -> Vec<T> {
        let mut rx = self.rx.lock().await;
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            items.push(item);
        }
        items
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + 'static> CollectedQueue<T> {
    /// Lazy stream of items that ends after `timeout` without a new one
    pub fn stream(&self, timeout: Duration) -> impl Stream<Item = T> + Send + 'static {
        stream::unfold(self.clone(), move |queue| async move {
            let item = queue.recv_timeout(timeout).await?;
            Some((item, queue))
        })
    }
}

/// Results and exceptions captured per actor
pub struct CollectedOutputs<R, E> {
    results: HashMap<ActorId, CollectedQueue<Message<R>>>,
    exceptions: HashMap<ActorId, CollectedQueue<Message<E>>>,
}

impl<R: Payload, E: Payload> CollectedOutputs<R, E> {
    /// One queue pair per actor id
    pub fn new<'a>(actor_ids: impl IntoIterator<Item = &'a ActorId>) -> Self {
        let mut results = HashMap::new();
        let mut exceptions = HashMap::new();
        for id in actor_ids {
            results.insert(id.clone(), CollectedQueue::new());
            exceptions.insert(id.clone(), CollectedQueue::new());
        }
        Self {
            results,
            exceptions,
        }
    }

    pub fn results(&self, actor_id: &ActorId) -> Option<&CollectedQueue<Message<R>>> {
        self.results.get(actor_id)
    }

    pub fn exceptions(&self, actor_id: &ActorId) -> Option<&CollectedQueue<Message<E>>> {
        self.exceptions.get(actor_id)
    }

    pub fn actor_ids(&self) -> impl Iterator<Item = &ActorId> {
        self.results.keys()
    }

    /// Number of messages waiting across every queue
    pub fn total_pending(&self) -> usize {
        self.results.values().map(CollectedQueue::len).sum::<usize>()
            + self.exceptions.values().map(CollectedQueue::len).sum::<usize>()
    }
}

impl<R, E> std::fmt::Debug for CollectedOutputs<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectedOutputs")
            .field("actors", &self.results.len())
            .finish()
    }
}
