//! Fan-out delivery of guidance messages.
//!
//! # Architecture
//!
//! ```text
//!                        ┌──► queue ──► worker thread ──► consumer A
//! producer ──► publish ──┼──► queue ──► worker thread ──► consumer B
//!                        └──► queue ──► worker thread ──► UDP sender
//! ```
//!
//! Every subscription owns an unbounded queue drained by its own thread, so
//! `publish` never waits on a consumer and a slow or panicking consumer only
//! affects itself. Messages are enqueued under one lock, which keeps the
//! publish order for every consumer.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::GuidanceMessage;

/// Receives published guidance messages.
///
/// Called from the subscription's delivery thread, one message at a time,
/// in publish order.
pub trait GuidanceConsumer: Send + Sync + 'static {
    /// Short name used in logs and thread names.
    fn name(&self) -> &str {
        "consumer"
    }

    /// Handle one message.
    fn on_guidance(&self, message: &GuidanceMessage);
}

/// Adapts a closure into a [`GuidanceConsumer`].
pub struct CallbackConsumer<F> {
    name: String,
    callback: F,
}

impl<F> CallbackConsumer<F>
where
    F: Fn(&GuidanceMessage) + Send + Sync + 'static,
{
    /// Wrap `callback` under the given name.
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

impl<F> GuidanceConsumer for CallbackConsumer<F>
where
    F: Fn(&GuidanceMessage) + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_guidance(&self, message: &GuidanceMessage) {
        (self.callback)(message)
    }
}

/// Identifies a subscription for [`GuidanceBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Numeric subscription id.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    /// The delivery thread could not be started.
    #[error("failed to start delivery thread for '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

struct Subscription {
    name: String,
    tx: mpsc::UnboundedSender<Arc<GuidanceMessage>>,
    worker: JoinHandle<()>,
}

/// Order-preserving, non-blocking fan-out of guidance messages.
pub struct GuidanceBus {
    subscriptions: Mutex<BTreeMap<u64, Subscription>>,
    next_id: AtomicU64,
    published: AtomicU64,
}

impl Default for GuidanceBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GuidanceBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidanceBus")
            .field("subscribers", &self.subscriber_count())
            .field("published", &self.published_count())
            .finish()
    }
}

impl GuidanceBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
        }
    }

    /// Register a consumer; it receives every message published from now on.
    pub fn subscribe(
        &self,
        consumer: Arc<dyn GuidanceConsumer>,
    ) -> Result<SubscriptionHandle, BusError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = consumer.name().to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = std::thread::Builder::new()
            .name(format!("guidance-{}", name))
            .spawn(move || deliver(id, consumer, rx))
            .map_err(|source| BusError::Spawn {
                name: name.clone(),
                source,
            })?;

        debug!(subscription = id, consumer = %name, "Guidance consumer subscribed");
        self.subscriptions
            .lock()
            .insert(id, Subscription { name, tx, worker });
        Ok(SubscriptionHandle(id))
    }

    /// Remove a subscription. Messages already queued are still delivered.
    ///
    /// Returns false if the handle was unknown.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        match self.subscriptions.lock().remove(&handle.0) {
            Some(sub) => {
                debug!(subscription = handle.0, consumer = %sub.name, "Guidance consumer unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Publish a message to every current subscriber.
    ///
    /// Returns the number of subscribers the message was queued for.
    pub fn publish(&self, message: GuidanceMessage) -> usize {
        let message = Arc::new(message);
        let subscriptions = self.subscriptions.lock();
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut queued = 0;
        for (id, sub) in subscriptions.iter() {
            if sub.tx.send(Arc::clone(&message)).is_ok() {
                queued += 1;
            } else {
                warn!(subscription = id, consumer = %sub.name, "Guidance consumer queue closed");
            }
        }
        queued
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Number of `publish` calls so far.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Remove all subscriptions and wait for their queues to drain.
    pub fn close(&self) {
        let drained: Vec<Subscription> = {
            let mut subscriptions = self.subscriptions.lock();
            std::mem::take(&mut *subscriptions).into_values().collect()
        };

        for sub in drained {
            drop(sub.tx);
            if sub.worker.join().is_err() {
                warn!(consumer = %sub.name, "Guidance delivery thread exited abnormally");
            }
        }
    }
}

fn deliver(
    id: u64,
    consumer: Arc<dyn GuidanceConsumer>,
    mut rx: mpsc::UnboundedReceiver<Arc<GuidanceMessage>>,
) {
    let mut delivered: u64 = 0;
    while let Some(message) = rx.blocking_recv() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| consumer.on_guidance(&message)));
        match result {
            Ok(()) => delivered += 1,
            Err(_) => warn!(
                subscription = id,
                consumer = consumer.name(),
                "Guidance consumer panicked, continuing with next message"
            ),
        }
    }
    debug!(subscription = id, consumer = consumer.name(), delivered, "Guidance delivery stopped");
}
