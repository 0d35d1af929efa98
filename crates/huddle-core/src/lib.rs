//! Core domain model for Huddle
//!
//! Defines the identifier scheme for chat rooms, the record types shared by
//! every component, the environment abstraction used for time and randomness,
//! and the contracts for the external collaborators (document store, object
//! store, user directory) together with in-memory implementations for tests
//! and simulation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Environment abstraction (time + randomness).
pub mod env;
/// Room identifier derivation.
pub mod ident;
/// Store contracts and in-memory implementations.
pub mod store;
/// Shared record types.
pub mod types;

pub use env::{Environment, SystemEnv};
pub use ident::{group_room_id, pair_room_id};
pub use store::{
    LatestSubscription, MemoryDirectory, MemoryObjectStore, MemoryRoomStore, ObjectStore,
    RoomStore, StoreError, UserDirectory,
};
pub use types::{
    MediaAttachment, MediaKind, MessageBody, MessageId, MessageRecord, NewMessage, Room, RoomId,
    UserId, UserProfile, relative_age,
};
