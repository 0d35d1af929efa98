//! Client-side chat core for Huddle
//!
//! Keeps a viewer's chat list consistent with the backing document store.
//! The [`ChatList`] state machine owns the per-room latest-message and
//! unread maps and reconciles live subscriptions against the roster; the
//! [`SubscriptionDriver`] executes its actions against a [`RoomStore`];
//! the [`MembershipMutator`] applies group membership changes with an
//! audit trail; the [`Composer`] writes outgoing text and media messages.
//!
//! # Architecture
//!
//! [`ChatList`] is a pure state machine: it consumes [`ChatEvent`] inputs
//! and produces [`ChatAction`] instructions for the driver to execute. All
//! I/O stays in the driver, so every ordering and cancellation rule is
//! testable without a backend.
//!
//! [`RoomStore`]: huddle_core::RoomStore

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chat_list;
mod composer;
mod driver;
mod event;
mod membership;
mod session;

pub use chat_list::{ChatList, ChatListEntry};
pub use composer::{ComposeError, Composer, MediaUpload};
pub use driver::SubscriptionDriver;
pub use event::{ChatAction, ChatEvent, SubscriptionToken};
pub use membership::{MembershipError, MembershipMutator, MembershipOutcome, MutationState};
pub use session::Session;
