//! Push notification trigger.
//!
//! Fires once per created message record: resolves each recipient's push
//! token from the user directory and hands a notification to the delivery
//! boundary. A missing recipient or missing token is logged and terminal
//! for that message - there is no retry queue.

use async_trait::async_trait;
use huddle_core::{MessageBody, MessageRecord, Room, UserDirectory, UserId};
use thiserror::Error;

/// Failure reported by a push delivery backend.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct PushSendError(pub String);

/// One notification handed to the delivery backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNotification {
    /// Recipient device token.
    pub token: String,
    /// Notification title: the sender's display name.
    pub title: String,
    /// Notification body: the message text or an attachment placeholder.
    pub body: String,
}

/// Push delivery boundary.
#[async_trait]
pub trait PushSender: Send + Sync + 'static {
    /// Deliver one notification.
    async fn send(&self, notification: PushNotification) -> Result<(), PushSendError>;
}

/// Fans a created message out to its recipients' devices.
pub struct NotificationTrigger<D, P> {
    directory: D,
    push: P,
}

impl<D: UserDirectory, P: PushSender> NotificationTrigger<D, P> {
    /// Create a trigger over the given directory and delivery handles.
    pub fn new(directory: D, push: P) -> Self {
        Self { directory, push }
    }

    /// Handle one created message record.
    ///
    /// Recipients are the room's participants minus the sender. System
    /// notices are skipped. Returns the number of notifications actually
    /// delivered; every skipped recipient is logged.
    pub async fn message_created(&self, room: &Room, message: &MessageRecord) -> usize {
        if message.body.is_system() {
            tracing::debug!(room_id = %room.id, "system notice; no push");
            return 0;
        }

        let title = self.sender_name(&message.sender).await;
        let body = match &message.body {
            MessageBody::Text { text } | MessageBody::System { text } => text.clone(),
            MessageBody::Media { attachment } => format!("Sent {}", attachment.file_name),
        };

        let mut delivered = 0;
        for recipient in room.participants.iter().filter(|id| *id != &message.sender) {
            let token = match self.directory.push_token(recipient).await {
                Ok(Some(token)) => token,
                Ok(None) => {
                    tracing::warn!(%recipient, room_id = %room.id, "recipient has no push token; skipping");
                    continue;
                },
                Err(err) => {
                    tracing::warn!(%recipient, room_id = %room.id, error = %err, "recipient lookup failed; skipping");
                    continue;
                },
            };

            let notification =
                PushNotification { token, title: title.clone(), body: body.clone() };
            match self.push.send(notification).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::warn!(%recipient, room_id = %room.id, error = %err, "push delivery failed; not retrying");
                },
            }
        }
        delivered
    }

    async fn sender_name(&self, sender: &UserId) -> String {
        match self.directory.lookup(std::slice::from_ref(sender)).await {
            Ok(profiles) if !profiles.is_empty() => profiles[0].display_name.clone(),
            Ok(_) => sender.to_string(),
            Err(err) => {
                tracing::warn!(%sender, error = %err, "sender lookup failed; falling back to id");
                sender.to_string()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use huddle_core::{
        MediaAttachment, MediaKind, MemoryDirectory, MessageId, NewMessage, RoomId, UserProfile,
    };

    use super::*;

    /// Delivery double that records notifications and optionally fails.
    #[derive(Clone, Default)]
    struct RecordingSender {
        sent: Arc<Mutex<Vec<PushNotification>>>,
        fail: bool,
    }

    impl RecordingSender {
        fn sent(&self) -> Vec<PushNotification> {
            self.sent.lock().expect("Mutex poisoned").clone()
        }
    }

    #[async_trait]
    impl PushSender for RecordingSender {
        async fn send(&self, notification: PushNotification) -> Result<(), PushSendError> {
            if self.fail {
                return Err(PushSendError("delivery rejected".into()));
            }
            self.sent.lock().expect("Mutex poisoned").push(notification);
            Ok(())
        }
    }

    fn directory() -> MemoryDirectory {
        let directory = MemoryDirectory::new();
        let mut ana = UserProfile::new(UserId::new("ana"), "Ana");
        ana.push_token = Some("tok-ana".into());
        directory.insert(ana);
        let mut ben = UserProfile::new(UserId::new("ben"), "Ben");
        ben.push_token = Some("tok-ben".into());
        directory.insert(ben);
        // Cara signed in on a device without push registration.
        directory.insert(UserProfile::new(UserId::new("cara"), "Cara"));
        directory
    }

    fn group() -> Room {
        Room::group(
            RoomId::new("grp:test"),
            vec![UserId::new("ana"), UserId::new("ben"), UserId::new("cara")],
            "plans",
            100,
        )
    }

    fn text_message(sender: &str, text: &str) -> MessageRecord {
        let NewMessage { sender, body } = NewMessage::text(UserId::new(sender), text);
        MessageRecord {
            id: MessageId::new("m-1"),
            room_id: RoomId::new("grp:test"),
            sender,
            created_at_ms: 1000,
            body,
            seen: false,
        }
    }

    #[tokio::test]
    async fn notifies_every_recipient_except_the_sender() {
        let sender = RecordingSender::default();
        let trigger = NotificationTrigger::new(directory(), sender.clone());

        let delivered = trigger.message_created(&group(), &text_message("ana", "hello")).await;

        // Ben gets a push; Cara has no token and is skipped terminally.
        assert_eq!(delivered, 1);
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, "tok-ben");
        assert_eq!(sent[0].title, "Ana");
        assert_eq!(sent[0].body, "hello");
    }

    #[tokio::test]
    async fn unknown_recipient_is_logged_and_skipped() {
        let sender = RecordingSender::default();
        let trigger = NotificationTrigger::new(directory(), sender.clone());

        let mut room = group();
        room.participants.push(UserId::new("ghost"));
        let delivered = trigger.message_created(&room, &text_message("ana", "hello")).await;
        assert_eq!(delivered, 1);
    }

    #[tokio::test]
    async fn system_notices_do_not_push() {
        let sender = RecordingSender::default();
        let trigger = NotificationTrigger::new(directory(), sender.clone());

        let mut message = text_message("ana", "x");
        message.body = MessageBody::System { text: "Ben left the group".into() };
        let delivered = trigger.message_created(&group(), &message).await;

        assert_eq!(delivered, 0);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn media_messages_use_an_attachment_placeholder() {
        let sender = RecordingSender::default();
        let trigger = NotificationTrigger::new(directory(), sender.clone());

        let mut message = text_message("ben", "x");
        message.body = MessageBody::Media {
            attachment: MediaAttachment {
                kind: MediaKind::Image,
                url: "mem://cat.png".into(),
                file_name: "cat.png".into(),
                size_bytes: 10,
                mime_type: "image/png".into(),
            },
        };
        trigger.message_created(&group(), &message).await;

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, "tok-ana");
        assert_eq!(sent[0].body, "Sent cat.png");
    }

    #[tokio::test]
    async fn delivery_failure_is_terminal_not_fatal() {
        let sender = RecordingSender { fail: true, ..RecordingSender::default() };
        let trigger = NotificationTrigger::new(directory(), sender.clone());

        let delivered = trigger.message_created(&group(), &text_message("ana", "hello")).await;
        assert_eq!(delivered, 0);
    }
}
