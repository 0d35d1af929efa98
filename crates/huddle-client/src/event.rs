//! Chat list events and actions.
//!
//! The caller is responsible for executing [`ChatAction`]s against the store
//! (the [`crate::SubscriptionDriver`] does this) and for feeding store
//! deliveries and presentation-layer signals back in as [`ChatEvent`]s.

use huddle_core::{MessageRecord, RoomId};

/// Handle identifying one opened subscription.
///
/// Tokens are never reused. A delivery tagged with a token that is no longer
/// active belongs to a closed subscription and is discarded, which is what
/// makes closing idempotent and late callbacks harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(pub(crate) u64);

/// Actions produced by the chat list for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    /// Open a live subscription on the room's latest message.
    OpenSubscription {
        /// Room to subscribe to.
        room_id: RoomId,
        /// Token the driver must tag deliveries with.
        token: SubscriptionToken,
    },

    /// Close a previously opened subscription.
    CloseSubscription {
        /// Room the subscription belonged to.
        room_id: RoomId,
        /// Token returned by the matching open action.
        token: SubscriptionToken,
    },
}

/// Events the caller feeds into the chat list.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A room subscription delivered its latest message.
    Delivery {
        /// Token of the subscription that delivered.
        token: SubscriptionToken,
        /// The delivered message.
        message: MessageRecord,
    },

    /// A room subscription reported a transport error.
    ///
    /// The last-known latest message stays in place; recovery happens on
    /// the next roster reconciliation.
    SubscriptionError {
        /// Token of the failed subscription.
        token: SubscriptionToken,
        /// Human-readable failure reason, for the log.
        reason: String,
    },

    /// The presentation layer opened a room; the only event that clears the
    /// unread flag.
    RoomOpened {
        /// The opened room.
        room_id: RoomId,
    },
}
