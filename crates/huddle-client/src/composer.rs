//! Outgoing message composition.
//!
//! The composer validates outgoing content before any network call,
//! delegates binary uploads to the object store, and writes the resulting
//! message record into the target room's log. The chat list sees these
//! writes as ordinary live-query deliveries; nothing here special-cases
//! "messages I just sent".

use huddle_core::{
    Environment, MediaAttachment, MediaKind, MessageBody, MessageRecord, NewMessage, ObjectStore,
    Room, RoomId, RoomStore, StoreError, UserId, pair_room_id,
};
use thiserror::Error;

use crate::session::Session;

/// Errors from message composition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// Outgoing text was empty or whitespace.
    #[error("message text is empty")]
    EmptyMessage,

    /// Outgoing upload had no bytes or no file name.
    #[error("upload is empty")]
    EmptyUpload,

    /// Store or object-store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outgoing media handed to [`Composer::send_media`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    /// Raw file bytes.
    pub bytes: Vec<u8>,
    /// Original file name, kept for display.
    pub file_name: String,
    /// MIME type reported by the picker.
    pub mime_type: String,
}

/// Writes outgoing messages into room logs.
pub struct Composer<E, S, O> {
    env: E,
    store: S,
    objects: O,
}

impl<E: Environment, S: RoomStore, O: ObjectStore> Composer<E, S, O> {
    /// Create a composer over the given store handles.
    pub fn new(env: E, store: S, objects: O) -> Self {
        Self { env, store, objects }
    }

    /// Send a text message to an existing room.
    pub async fn send_text(
        &self,
        session: &Session,
        room_id: &RoomId,
        text: &str,
    ) -> Result<MessageRecord, ComposeError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ComposeError::EmptyMessage);
        }
        let message = NewMessage::text(session.viewer_id().clone(), text);
        Ok(self.store.append_message(room_id, message).await?)
    }

    /// Send a text message to a peer, creating the 1:1 room on first send.
    ///
    /// The room identifier is the canonical pair id, so both sides converge
    /// on the same record no matter who sends first; creation is idempotent.
    pub async fn send_text_to_peer(
        &self,
        session: &Session,
        peer: &UserId,
        text: &str,
    ) -> Result<MessageRecord, ComposeError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ComposeError::EmptyMessage);
        }

        let viewer = session.viewer_id();
        let room_id = pair_room_id(viewer, peer);
        let room = Room::pair(room_id.clone(), viewer.clone(), peer.clone(), self.env.now_ms());
        self.store.create_room(&room).await?;

        self.send_text(session, &room_id, trimmed).await
    }

    /// Upload media and send the referencing message.
    ///
    /// The media kind is classified from the MIME type exactly once, here,
    /// and stored on the record; consumers never re-infer it.
    pub async fn send_media(
        &self,
        session: &Session,
        room_id: &RoomId,
        upload: MediaUpload,
    ) -> Result<MessageRecord, ComposeError> {
        if upload.bytes.is_empty() || upload.file_name.is_empty() {
            return Err(ComposeError::EmptyUpload);
        }

        let kind = MediaKind::classify(&upload.mime_type);
        let size_bytes = upload.bytes.len() as u64;
        let path =
            format!("rooms/{room_id}/{:016x}-{}", self.env.random_u64(), upload.file_name);
        let url = self.objects.upload(upload.bytes, &path).await?;

        let attachment = MediaAttachment {
            kind,
            url,
            file_name: upload.file_name,
            size_bytes,
            mime_type: upload.mime_type,
        };
        let message = NewMessage {
            sender: session.viewer_id().clone(),
            body: MessageBody::Media { attachment },
        };
        Ok(self.store.append_message(room_id, message).await?)
    }
}

#[cfg(test)]
mod tests {
    use huddle_core::{MemoryObjectStore, MemoryRoomStore, SystemEnv, UserProfile};

    use super::*;

    fn session(id: &str, name: &str) -> Session {
        Session::new(UserProfile::new(UserId::new(id), name))
    }

    fn composer() -> Composer<SystemEnv, MemoryRoomStore<SystemEnv>, MemoryObjectStore> {
        Composer::new(SystemEnv, MemoryRoomStore::new(SystemEnv), MemoryObjectStore::new())
    }

    #[tokio::test]
    async fn first_send_creates_pair_room_with_canonical_id() {
        let composer = composer();
        let ana = session("ana", "Ana");
        let ben = UserId::new("ben");

        let sent = composer.send_text_to_peer(&ana, &ben, "hi").await.unwrap();
        assert_eq!(sent.room_id, pair_room_id(&UserId::new("ana"), &ben));
        assert_eq!(sent.sender, UserId::new("ana"));
        assert!(!sent.seen);

        let room = composer.store.load_room(&sent.room_id).await.unwrap().unwrap();
        assert_eq!(room.participants, vec![UserId::new("ana"), ben]);
    }

    #[tokio::test]
    async fn second_send_reuses_the_room() {
        let composer = composer();
        let ana = session("ana", "Ana");
        let ben = UserId::new("ben");

        composer.send_text_to_peer(&ana, &ben, "one").await.unwrap();
        composer.send_text_to_peer(&ana, &ben, "two").await.unwrap();

        assert_eq!(composer.store.room_count(), 1);
        let room_id = pair_room_id(&UserId::new("ana"), &ben);
        assert_eq!(composer.store.message_count(&room_id), 2);
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_any_write() {
        let composer = composer();
        let ana = session("ana", "Ana");

        let result = composer.send_text_to_peer(&ana, &UserId::new("ben"), "   ").await;
        assert_eq!(result, Err(ComposeError::EmptyMessage));
        assert_eq!(composer.store.room_count(), 0);
    }

    #[tokio::test]
    async fn media_is_classified_and_uploaded_once() {
        let composer = composer();
        let ana = session("ana", "Ana");
        let ben = UserId::new("ben");
        composer.send_text_to_peer(&ana, &ben, "hi").await.unwrap();
        let room_id = pair_room_id(&UserId::new("ana"), &ben);

        let sent = composer
            .send_media(
                &ana,
                &room_id,
                MediaUpload {
                    bytes: vec![0xFF, 0xD8],
                    file_name: "cat.jpg".into(),
                    mime_type: "image/jpeg".into(),
                },
            )
            .await
            .unwrap();

        let MessageBody::Media { attachment } = &sent.body else {
            unreachable!("media message expected");
        };
        assert_eq!(attachment.kind, MediaKind::Image);
        assert_eq!(attachment.file_name, "cat.jpg");
        assert_eq!(attachment.size_bytes, 2);
        assert!(attachment.url.starts_with("mem://rooms/"));
        assert_eq!(composer.objects.object_count(), 1);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let composer = composer();
        let ana = session("ana", "Ana");
        let ben = UserId::new("ben");
        composer.send_text_to_peer(&ana, &ben, "hi").await.unwrap();
        let room_id = pair_room_id(&UserId::new("ana"), &ben);

        let result = composer
            .send_media(
                &ana,
                &room_id,
                MediaUpload { bytes: Vec::new(), file_name: "x".into(), mime_type: "a/b".into() },
            )
            .await;
        assert_eq!(result, Err(ComposeError::EmptyUpload));
        assert_eq!(composer.objects.object_count(), 0);
    }
}
