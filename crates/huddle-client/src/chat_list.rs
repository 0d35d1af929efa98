//! Chat list state machine.
//!
//! [`ChatList`] keeps exactly one live subscription per roster room and owns
//! the derived per-room state: the latest delivered message and the unread
//! flag. No other component mutates these maps; the presentation layer reads
//! snapshots through [`ChatList::sorted_view`].
//!
//! # Responsibilities
//!
//! - Reconcile the active subscription set against roster changes.
//! - Apply deliveries, discarding those from closed subscriptions.
//! - Derive the unread flag from the sender and seen flag of the latest
//!   message; clear it only on an explicit room-opened signal.
//! - Produce the sorted room list, recomputed fresh on every call.

use std::collections::HashMap;

use huddle_core::{MessageRecord, Room, RoomId, UserId, relative_age};

use crate::event::{ChatAction, ChatEvent, SubscriptionToken};

/// Per-room state derived from deliveries.
#[derive(Debug, Clone)]
struct RoomEntry {
    /// Room record as of the last roster reconciliation.
    room: Room,
    /// Position in the roster, used for tie breaking.
    roster_index: usize,
    /// Active subscription, if the room currently has one.
    token: Option<SubscriptionToken>,
    /// Most recent message delivered by the subscription.
    latest: Option<MessageRecord>,
    /// Whether the room carries unread activity for the viewer.
    unread: bool,
}

/// One row of the sorted chat list view model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatListEntry {
    /// Room key.
    pub room_id: RoomId,
    /// Group display name; `None` for 1:1 rooms.
    pub title: Option<String>,
    /// Latest message, if the room has any.
    pub latest: Option<MessageRecord>,
    /// Unread flag for the viewer.
    pub unread: bool,
    /// Effective sort timestamp: latest message, falling back to room
    /// creation.
    pub timestamp_ms: u64,
    /// Relative age of `timestamp_ms`, for display.
    pub when: String,
}

/// Live subscription manager and chat list view model.
///
/// Pure state machine: consumes [`ChatEvent`]s, produces [`ChatAction`]s.
/// No I/O dependencies - fully testable without a backend.
#[derive(Debug, Clone)]
pub struct ChatList {
    /// The signed-in viewer; unread derivation is relative to this id.
    viewer: Option<UserId>,
    /// Per-room state, keyed by room id.
    entries: HashMap<RoomId, RoomEntry>,
    /// Active token -> room index. A token missing here is closed; its
    /// deliveries are discarded.
    tokens: HashMap<SubscriptionToken, RoomId>,
    /// Next token value; tokens are never reused.
    next_token: u64,
}

impl ChatList {
    /// Create an empty chat list with no roster.
    pub fn new() -> Self {
        Self { viewer: None, entries: HashMap::new(), tokens: HashMap::new(), next_token: 0 }
    }

    /// Reconcile the subscription set against a new roster.
    ///
    /// Opens subscriptions for rooms newly present and closes them for rooms
    /// no longer present. Idempotent: an unchanged roster produces no
    /// actions. A room whose subscription previously failed counts as
    /// unsubscribed and is reopened here - this is the recovery path after a
    /// transport error.
    ///
    /// `viewer` must be a concrete identifier; an empty id is rejected with
    /// no state change. An empty `rooms` slice closes everything.
    pub fn set_roster(&mut self, viewer: &UserId, rooms: &[Room]) -> Vec<ChatAction> {
        if !viewer.is_concrete() {
            tracing::warn!("set_roster called with placeholder viewer; ignoring");
            return Vec::new();
        }

        let mut actions = Vec::new();

        // Unread state is per-viewer; a viewer switch invalidates all of it.
        if self.viewer.as_ref() != Some(viewer) {
            actions.extend(self.close_all());
            self.viewer = Some(viewer.clone());
        }

        let wanted: HashMap<&RoomId, usize> =
            rooms.iter().enumerate().map(|(index, room)| (&room.id, index)).collect();

        let removed: Vec<RoomId> =
            self.entries.keys().filter(|id| !wanted.contains_key(id)).cloned().collect();
        for room_id in removed {
            if let Some(entry) = self.entries.remove(&room_id) {
                if let Some(token) = entry.token {
                    self.tokens.remove(&token);
                    actions.push(ChatAction::CloseSubscription { room_id, token });
                }
            }
        }

        for (index, room) in rooms.iter().enumerate() {
            let needs_open = match self.entries.get_mut(&room.id) {
                Some(entry) => {
                    entry.room = room.clone();
                    entry.roster_index = index;
                    entry.token.is_none()
                },
                None => {
                    self.entries.insert(
                        room.id.clone(),
                        RoomEntry {
                            room: room.clone(),
                            roster_index: index,
                            token: None,
                            latest: None,
                            unread: false,
                        },
                    );
                    true
                },
            };

            if needs_open {
                let token = SubscriptionToken(self.next_token);
                self.next_token += 1;
                self.tokens.insert(token, room.id.clone());
                if let Some(entry) = self.entries.get_mut(&room.id) {
                    entry.token = Some(token);
                }
                actions.push(ChatAction::OpenSubscription { room_id: room.id.clone(), token });
            }
        }

        actions
    }

    /// Process a delivery, error, or presentation-layer signal.
    pub fn handle(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Delivery { token, message } => {
                let Some(room_id) = self.tokens.get(&token) else {
                    // Late callback from a closed subscription; must not
                    // touch state.
                    tracing::debug!(?token, "discarding delivery from closed subscription");
                    return;
                };
                let Some(entry) = self.entries.get_mut(room_id) else {
                    return;
                };

                let from_viewer = self.viewer.as_ref() == Some(&message.sender);
                if !from_viewer && !message.seen {
                    entry.unread = true;
                }
                entry.latest = Some(message);
            },
            ChatEvent::SubscriptionError { token, reason } => {
                if let Some(room_id) = self.tokens.remove(&token) {
                    tracing::warn!(%room_id, %reason, "room subscription failed; keeping last known state");
                    if let Some(entry) = self.entries.get_mut(&room_id) {
                        entry.token = None;
                    }
                }
            },
            ChatEvent::RoomOpened { room_id } => {
                if let Some(entry) = self.entries.get_mut(&room_id) {
                    entry.unread = false;
                }
            },
        }
    }

    /// Sorted room list, recomputed fresh from current state.
    ///
    /// Descending by latest-message timestamp, falling back to room creation
    /// time for rooms with no messages; ties broken by roster order. Always
    /// derived from scratch - never incrementally patched - so concurrent
    /// per-room deliveries cannot leave a stale cross-room order behind.
    pub fn sorted_view(&self, now_ms: u64) -> Vec<ChatListEntry> {
        let mut rows: Vec<&RoomEntry> = self.entries.values().collect();
        rows.sort_by(|a, b| {
            effective_timestamp(b)
                .cmp(&effective_timestamp(a))
                .then(a.roster_index.cmp(&b.roster_index))
        });

        rows.into_iter()
            .map(|entry| {
                let timestamp_ms = effective_timestamp(entry);
                ChatListEntry {
                    room_id: entry.room.id.clone(),
                    title: entry.room.name.clone(),
                    latest: entry.latest.clone(),
                    unread: entry.unread,
                    timestamp_ms,
                    when: relative_age(now_ms, timestamp_ms),
                }
            })
            .collect()
    }

    /// Close every open subscription and drop all derived state.
    ///
    /// Must be called when the owning view goes away; an unreleased
    /// subscription is a leak, not a warning.
    pub fn close_all(&mut self) -> Vec<ChatAction> {
        let mut actions = Vec::new();
        for (room_id, entry) in &mut self.entries {
            if let Some(token) = entry.token.take() {
                actions.push(ChatAction::CloseSubscription { room_id: room_id.clone(), token });
            }
        }
        self.entries.clear();
        self.tokens.clear();
        actions
    }

    /// Number of currently active subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.tokens.len()
    }

    /// Unread flag for a room. `None` if the room is not in the roster.
    pub fn unread(&self, room_id: &RoomId) -> Option<bool> {
        self.entries.get(room_id).map(|entry| entry.unread)
    }

    /// Latest delivered message for a room.
    pub fn latest(&self, room_id: &RoomId) -> Option<&MessageRecord> {
        self.entries.get(room_id).and_then(|entry| entry.latest.as_ref())
    }

    /// The signed-in viewer, once a roster has been set.
    pub fn viewer(&self) -> Option<&UserId> {
        self.viewer.as_ref()
    }
}

impl Default for ChatList {
    fn default() -> Self {
        Self::new()
    }
}

fn effective_timestamp(entry: &RoomEntry) -> u64 {
    entry.latest.as_ref().map_or(entry.room.created_at_ms, |m| m.created_at_ms)
}
