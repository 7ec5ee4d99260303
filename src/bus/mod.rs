//! Push notification of store changes.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::warn;

use crate::store::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Insert,
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: String,
    pub kind: EventKind,
    pub record: Message,
}

pub type Callback = Box<dyn Fn(ChangeEvent) + Send + Sync + 'static>;

pub trait RealtimeBus: Send + Sync {
    /// Starts delivering `kind` events on `collection` to `callback` until the
    /// returned handle is released.
    fn subscribe(&self, collection: &str, kind: EventKind, callback: Callback) -> Subscription;
}

/// One open bus connection.
///
/// Releasing is idempotent and also happens on drop, so a handle can never
/// outlive its owner and keep delivering.
pub struct Subscription {
    task: Option<JoinHandle<()>>,
    on_release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task), on_release: None }
    }

    pub fn on_release(mut self, f: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_release = Some(Box::new(f));
        self
    }

    pub fn is_live(&self) -> bool {
        self.task.is_some()
    }

    pub fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(f) = self.on_release.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("live", &self.is_live()).finish()
    }
}

/// In-process bus over a tokio broadcast channel.
///
/// `capacity` is how many events a subscriber may fall behind. A subscriber
/// further back than that loses the oldest events (logged as lag) and keeps
/// going from the oldest one still buffered. It is set with `BUS_CAPACITY`.
#[derive(Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<ChangeEvent>,
    live: Arc<AtomicUsize>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            // tokio panics on a zero capacity
            tx: broadcast::channel(capacity.max(1)).0,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // no receivers is fine, nobody is in the room
        let _ = self.tx.send(event);
    }

    /// Handles handed out and not yet released.
    pub fn live_subscriptions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl RealtimeBus for BroadcastBus {
    fn subscribe(&self, collection: &str, kind: EventKind, callback: Callback) -> Subscription {
        let mut rx = self.tx.subscribe();
        let collection = collection.to_owned();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.collection == collection && event.kind == kind => {
                        callback(event)
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, %collection, "subscriber lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        self.live.fetch_add(1, Ordering::SeqCst);
        let live = self.live.clone();
        Subscription::new(task).on_release(move || {
            live.fetch_sub(1, Ordering::SeqCst);
        })
    }
}
