//! Live message list for one room visit.
//!
//! A visit goes `Idle -> Loading -> Live -> Closed`. Entering loads the
//! history once, then listens for inserts on the bus; everything after the
//! load arrives through [`SyncEngine::apply`].

mod view;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    bus::{ChangeEvent, EventKind, RealtimeBus, Subscription},
    error::{ChatError, ChatResult},
    store::{MESSAGES, Message, MessageStore},
};

pub use view::MessageView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    /// History requested. Stays here when the load fails.
    Loading,
    Live,
    Closed,
}

/// Emitted right after the view grew.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    Appended { index: usize, message: Message },
}

pub struct SyncEngine {
    store: Arc<dyn MessageStore>,
    bus: Arc<dyn RealtimeBus>,
    state: SyncState,
    view: MessageView,
    subscription: Option<Subscription>,
    deliveries: Option<mpsc::UnboundedReceiver<Message>>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn MessageStore>, bus: Arc<dyn RealtimeBus>) -> Self {
        Self {
            store,
            bus,
            state: SyncState::Idle,
            view: MessageView::default(),
            subscription: None,
            deliveries: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn view(&self) -> &MessageView {
        &self.view
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_live)
    }

    /// Starts a fresh visit: loads the history, then subscribes.
    ///
    /// If the load fails the view stays empty, the state stays `Loading` and
    /// calling this again is the way to retry.
    pub async fn enter_room(&mut self) -> ChatResult<()> {
        self.release();
        self.view = MessageView::default();
        self.state = SyncState::Loading;

        let history = match self.store.query_ordered().await {
            Ok(history) => history,
            Err(err) => {
                warn!(%err, "history load failed, visit stalled");
                return Err(ChatError::SyncStalled(err.to_string()));
            }
        };

        self.view = MessageView::load(history);
        self.state = SyncState::Live;
        self.subscribe();
        info!(loaded = self.view.len(), "entered room");
        Ok(())
    }

    /// Opens the bus subscription, closing any handle still open first.
    pub fn subscribe(&mut self) {
        self.release();

        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.bus.subscribe(
            MESSAGES,
            EventKind::Insert,
            Box::new(move |event: ChangeEvent| {
                let _ = tx.send(event.record);
            }),
        );
        self.subscription = Some(subscription);
        self.deliveries = Some(rx);
    }

    /// Next message delivered by the bus for this visit. Pends forever when
    /// there is no subscription; `None` once the subscription is gone.
    pub async fn next_delivery(&mut self) -> Option<Message> {
        match self.deliveries.as_mut() {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Appends a delivered message unless its id is already in the view.
    pub fn apply(&mut self, message: Message) -> Option<ViewUpdate> {
        if self.state != SyncState::Live {
            debug!(id = %message.id, state = ?self.state, "delivery outside a live visit");
            return None;
        }

        let id = message.id;
        match self.view.append(message.clone()) {
            Some(index) => Some(ViewUpdate::Appended { index, message }),
            None => {
                debug!(%id, "duplicate delivery");
                None
            }
        }
    }

    /// Ends the visit. Safe to call any number of times.
    pub fn leave_room(&mut self) {
        self.release();
        self.state = SyncState::Closed;
        info!("left room");
    }

    fn release(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.deliveries = None;
    }
}
