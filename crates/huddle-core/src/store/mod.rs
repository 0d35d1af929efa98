//! Contracts for the external collaborators.
//!
//! The chat core consumes three managed services through narrow traits: the
//! document store holding rooms and their message logs ([`RoomStore`]), the
//! binary object store holding uploads ([`ObjectStore`]), and the identity
//! provider's user directory ([`UserDirectory`]).
//!
//! Every method is a suspension point; callers must assume arbitrary
//! interleaving of other events between issuing a call and its completion.
//! In-memory implementations for tests and simulation live in [`memory`].

mod memory;

use async_trait::async_trait;
pub use memory::{MemoryDirectory, MemoryObjectStore, MemoryRoomStore};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::{MessageId, MessageRecord, NewMessage, Room, RoomId, UserId, UserProfile};

/// Errors surfaced by the store contracts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Room record does not exist.
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// Message does not exist in the room's log.
    #[error("message not found: room {room_id}, id {message_id}")]
    MessageNotFound {
        /// Room whose log was searched.
        room_id: RoomId,
        /// Message id that was not found.
        message_id: MessageId,
    },

    /// User record does not exist in the directory.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// No authenticated user in the directory.
    #[error("no signed-in user")]
    NoCurrentUser,

    /// Underlying transport failure (network, backend outage).
    ///
    /// Recoverable by retrying the triggering user action; never retried
    /// silently in a loop.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Live handle delivering the most recent message of one room, then every
/// subsequent change, until dropped.
#[derive(Debug)]
pub struct LatestSubscription {
    receiver: mpsc::UnboundedReceiver<MessageRecord>,
}

impl LatestSubscription {
    /// Wrap a delivery channel.
    pub fn new(receiver: mpsc::UnboundedReceiver<MessageRecord>) -> Self {
        Self { receiver }
    }

    /// Next delivery. `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<MessageRecord> {
        self.receiver.recv().await
    }
}

/// Document store holding room records and per-room message logs.
#[async_trait]
pub trait RoomStore: Clone + Send + Sync + 'static {
    /// Create a room record. Idempotent: an existing record is left
    /// untouched.
    async fn create_room(&self, room: &Room) -> Result<(), StoreError>;

    /// Load a room record. `None` if it does not exist.
    async fn load_room(&self, room_id: &RoomId) -> Result<Option<Room>, StoreError>;

    /// Replace a room's participant list.
    ///
    /// Last write wins; writing a list that already lacks a member is a
    /// no-op for that member, so concurrent duplicate removals cannot
    /// corrupt the list.
    async fn write_participants(
        &self,
        room_id: &RoomId,
        participants: &[UserId],
    ) -> Result<(), StoreError>;

    /// Append a message to the room's log.
    ///
    /// The store assigns the message id and a creation timestamp that is
    /// monotonic within the room. Returns the stored record.
    async fn append_message(
        &self,
        room_id: &RoomId,
        message: NewMessage,
    ) -> Result<MessageRecord, StoreError>;

    /// Flip a message's seen flag to `true`.
    ///
    /// The flag transitions `false -> true` only; marking an already-seen
    /// message is a no-op, and the flag never reverses.
    async fn mark_seen(&self, room_id: &RoomId, message_id: &MessageId) -> Result<(), StoreError>;

    /// Open a live subscription on the room's most recent message.
    ///
    /// Delivers the current latest message (if any) immediately, then every
    /// subsequent change. Closing is dropping the handle.
    fn subscribe_latest(&self, room_id: &RoomId) -> Result<LatestSubscription, StoreError>;
}

/// Binary object store for profile pictures and file attachments.
#[async_trait]
pub trait ObjectStore: Clone + Send + Sync + 'static {
    /// Upload bytes under `path` and return the download URL.
    async fn upload(&self, bytes: Vec<u8>, path: &str) -> Result<String, StoreError>;

    /// Delete the object under `path`. Deleting an absent object is a
    /// no-op.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

/// User directory exposed by the identity provider.
#[async_trait]
pub trait UserDirectory: Clone + Send + Sync + 'static {
    /// Profile of the authenticated user.
    async fn current_user(&self) -> Result<UserProfile, StoreError>;

    /// Batch profile lookup. Results follow input order; unknown ids are
    /// skipped.
    async fn lookup(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, StoreError>;

    /// Push delivery token for a user. `Ok(None)` when the user has no
    /// registered device.
    async fn push_token(&self, id: &UserId) -> Result<Option<String>, StoreError>;
}
