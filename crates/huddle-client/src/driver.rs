//! Subscription driver.
//!
//! Executes [`ChatAction`]s against a [`RoomStore`]: opens one forwarding
//! task per subscription, tags every delivery with the subscription's token,
//! and aborts the task on close. The token tagging is what lets the chat
//! list discard a late callback from a subscription that was already closed.

use std::collections::HashMap;

use huddle_core::{MessageRecord, RoomId, RoomStore, StoreError, UserId};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::event::{ChatAction, ChatEvent, SubscriptionToken};

/// Executes chat list actions against the store.
///
/// All spawned forwarding tasks are aborted when the driver is dropped, so
/// discarding the driver cannot leak subscriptions.
pub struct SubscriptionDriver<S> {
    store: S,
    events: mpsc::UnboundedSender<ChatEvent>,
    tasks: HashMap<SubscriptionToken, JoinHandle<()>>,
}

impl<S: RoomStore> SubscriptionDriver<S> {
    /// Create a driver and the event stream it feeds.
    ///
    /// Every delivery and subscription failure arrives on the returned
    /// receiver as a [`ChatEvent`]; the caller forwards them into
    /// [`crate::ChatList::handle`].
    pub fn new(store: S) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Self { store, events, tasks: HashMap::new() }, receiver)
    }

    /// Execute a batch of actions.
    ///
    /// A failed open is reported through the event stream as a
    /// [`ChatEvent::SubscriptionError`] rather than returned, matching how a
    /// live transport fails after the fact. Closing an unknown token is a
    /// no-op, which makes close idempotent.
    pub fn apply(&mut self, actions: Vec<ChatAction>) {
        for action in actions {
            match action {
                ChatAction::OpenSubscription { room_id, token } => self.open(room_id, token),
                ChatAction::CloseSubscription { token, .. } => {
                    if let Some(task) = self.tasks.remove(&token) {
                        task.abort();
                    }
                },
            }
        }
    }

    /// Store-side half of the "room opened" signal: mark the latest message
    /// as seen so the sender's read receipt updates.
    ///
    /// Only a message authored by someone other than `viewer` is marked;
    /// the flag only ever transitions `false -> true`.
    pub async fn acknowledge_read(
        &self,
        room_id: &RoomId,
        latest: Option<&MessageRecord>,
        viewer: &UserId,
    ) -> Result<(), StoreError> {
        if let Some(message) = latest {
            if &message.sender != viewer && !message.seen {
                self.store.mark_seen(room_id, &message.id).await?;
            }
        }
        Ok(())
    }

    /// Number of live forwarding tasks.
    pub fn open_count(&self) -> usize {
        self.tasks.len()
    }

    fn open(&mut self, room_id: RoomId, token: SubscriptionToken) {
        match self.store.subscribe_latest(&room_id) {
            Ok(mut subscription) => {
                let events = self.events.clone();
                let task = tokio::spawn(async move {
                    while let Some(message) = subscription.next().await {
                        if events.send(ChatEvent::Delivery { token, message }).is_err() {
                            break;
                        }
                    }
                });
                self.tasks.insert(token, task);
            },
            Err(err) => {
                tracing::warn!(%room_id, error = %err, "failed to open room subscription");
                let _ = self
                    .events
                    .send(ChatEvent::SubscriptionError { token, reason: err.to_string() });
            },
        }
    }
}

impl<S> Drop for SubscriptionDriver<S> {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
