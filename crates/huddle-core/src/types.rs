//! Record types shared across the workspace.
//!
//! These mirror the documents held by the backing store: user profiles, room
//! records with their participant lists, and the messages inside a room's
//! log. Messages are immutable once created except for the `seen` flag, which
//! transitions `false -> true` exactly once.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ident::GROUP_PREFIX;

/// Stable user identifier assigned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a usable identifier rather than a placeholder.
    pub fn is_concrete(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room key in the document store.
///
/// Pair rooms carry a canonical identifier derived from both participants;
/// group rooms carry an opaque generated token. The two live in distinct
/// namespaces, so a group identifier can never collide with a pair
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Wrap a raw identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identifies a group room.
    pub fn is_group(&self) -> bool {
        self.0.starts_with(GROUP_PREFIX)
    }

    /// Whether this identifies a 1:1 room.
    pub fn is_pair(&self) -> bool {
        !self.is_group()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message key within a room's log, assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a raw identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User profile document.
///
/// Created on first sign-in; mutated by profile edits; never hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Identity-provider-assigned identifier.
    pub id: UserId,
    /// Name shown in rosters and system messages.
    pub display_name: String,
    /// Download URL of the profile picture, if one was uploaded.
    pub avatar_url: Option<String>,
    /// Email address, when the account was created via email sign-in.
    pub email: Option<String>,
    /// Phone number, when the account was created via phone sign-in.
    pub phone: Option<String>,
    /// Push delivery token for this user's current device.
    pub push_token: Option<String>,
}

impl UserProfile {
    /// Minimal profile with just an id and display name.
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            avatar_url: None,
            email: None,
            phone: None,
            push_token: None,
        }
    }
}

/// Room document.
///
/// Never deleted: leaving a group empties the participant list but the record
/// persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room key (see [`RoomId`]).
    pub id: RoomId,
    /// Participant ids, unique, insertion order preserved for group display.
    pub participants: Vec<UserId>,
    /// Display name; groups only.
    pub name: Option<String>,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at_ms: u64,
}

impl Room {
    /// Pair room record for two participants.
    pub fn pair(id: RoomId, a: UserId, b: UserId, created_at_ms: u64) -> Self {
        Self { id, participants: vec![a, b], name: None, created_at_ms }
    }

    /// Group room record.
    pub fn group(
        id: RoomId,
        participants: Vec<UserId>,
        name: impl Into<String>,
        created_at_ms: u64,
    ) -> Self {
        Self { id, participants, name: Some(name.into()), created_at_ms }
    }
}

/// Kind of an uploaded attachment, classified once at upload time from the
/// MIME type and stored on the message record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    /// Still image.
    Image,
    /// Video clip.
    Video,
    /// Audio clip or voice note.
    Audio,
    /// Anything else, rendered as a generic file.
    File,
}

impl MediaKind {
    /// Classify a MIME type.
    pub fn classify(mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("video/") {
            Self::Video
        } else if mime.starts_with("audio/") {
            Self::Audio
        } else {
            Self::File
        }
    }
}

/// Uploaded media referenced by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Classified kind (see [`MediaKind::classify`]).
    pub kind: MediaKind,
    /// Download URL in the object store.
    pub url: String,
    /// Original file name.
    pub file_name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// MIME type as supplied at upload.
    pub mime_type: String,
}

/// Message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    /// Plain text message.
    Text {
        /// Message text.
        text: String,
    },
    /// Uploaded media with its metadata.
    Media {
        /// The uploaded attachment.
        attachment: MediaAttachment,
    },
    /// Synthetic membership-change notice, not authored by a user.
    System {
        /// Notice text, e.g. "Ana was added to the group".
        text: String,
    },
}

impl MessageBody {
    /// Whether this is a synthetic system notice.
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    /// Short display text for room lists and push notifications.
    pub fn preview(&self) -> &str {
        match self {
            Self::Text { text } | Self::System { text } => text,
            Self::Media { attachment } => &attachment.file_name,
        }
    }
}

/// Message document inside a room's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Store-assigned message key.
    pub id: MessageId,
    /// Owning room.
    pub room_id: RoomId,
    /// Authoring user (the acting user for system notices).
    pub sender: UserId,
    /// Store-assigned creation time, monotonic per room.
    pub created_at_ms: u64,
    /// Payload.
    pub body: MessageBody,
    /// Read flag; transitions `false -> true` only.
    pub seen: bool,
}

/// Message content handed to the store, which assigns the id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Authoring user.
    pub sender: UserId,
    /// Payload.
    pub body: MessageBody,
}

impl NewMessage {
    /// Text message from `sender`.
    pub fn text(sender: UserId, text: impl Into<String>) -> Self {
        Self { sender, body: MessageBody::Text { text: text.into() } }
    }

    /// System notice recorded on behalf of `actor`.
    pub fn system(actor: UserId, text: impl Into<String>) -> Self {
        Self { sender: actor, body: MessageBody::System { text: text.into() } }
    }
}

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;
const WEEK_MS: u64 = 7 * DAY_MS;

/// Short relative age string for room lists ("now", "5m", "3h", "2d", "6w").
///
/// A `then_ms` in the future renders as "now"; the store assigns timestamps,
/// so a small skew against the local clock is expected.
pub fn relative_age(now_ms: u64, then_ms: u64) -> String {
    let elapsed = now_ms.saturating_sub(then_ms);
    if elapsed < MINUTE_MS {
        "now".to_owned()
    } else if elapsed < HOUR_MS {
        format!("{}m", elapsed / MINUTE_MS)
    } else if elapsed < DAY_MS {
        format!("{}h", elapsed / HOUR_MS)
    } else if elapsed < WEEK_MS {
        format!("{}d", elapsed / DAY_MS)
    } else {
        format!("{}w", elapsed / WEEK_MS)
    }
}
