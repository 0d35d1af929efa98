use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{LatestSubscription, ObjectStore, RoomStore, StoreError, UserDirectory};
use crate::{
    env::Environment,
    types::{MessageId, MessageRecord, NewMessage, Room, RoomId, UserId, UserProfile},
};

/// In-memory document store for tests and simulation.
///
/// State is wrapped in `Arc<Mutex<_>>` so clones share the same underlying
/// store, mirroring how multiple components hold handles to one backend.
/// Uses `lock().expect()` which panics if the mutex is poisoned - acceptable
/// for test code. Subscription fan-out uses unbounded channels; a dropped
/// receiver is pruned on the next delivery.
#[derive(Clone)]
pub struct MemoryRoomStore<E: Environment> {
    env: E,
    inner: Arc<Mutex<RoomStoreInner>>,
}

struct RoomStoreInner {
    rooms: HashMap<RoomId, Room>,
    messages: HashMap<RoomId, Vec<MessageRecord>>,
    subscribers: HashMap<RoomId, Vec<mpsc::UnboundedSender<MessageRecord>>>,
    next_message_seq: u64,
}

impl RoomStoreInner {
    /// Deliver `record` to every live subscriber of its room.
    fn notify(&mut self, record: &MessageRecord) {
        if let Some(senders) = self.subscribers.get_mut(&record.room_id) {
            senders.retain(|tx| tx.send(record.clone()).is_ok());
        }
    }
}

impl<E: Environment> MemoryRoomStore<E> {
    /// Create an empty store using `env` for timestamps.
    pub fn new(env: E) -> Self {
        Self {
            env,
            inner: Arc::new(Mutex::new(RoomStoreInner {
                rooms: HashMap::new(),
                messages: HashMap::new(),
                subscribers: HashMap::new(),
                next_message_seq: 0,
            })),
        }
    }

    /// Number of room records.
    #[allow(clippy::expect_used)]
    pub fn room_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").rooms.len()
    }

    /// Number of messages in one room's log.
    #[allow(clippy::expect_used)]
    pub fn message_count(&self, room_id: &RoomId) -> usize {
        self.inner.lock().expect("Mutex poisoned").messages.get(room_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl<E: Environment> RoomStore for MemoryRoomStore<E> {
    #[allow(clippy::expect_used)]
    async fn create_room(&self, room: &Room) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.rooms.entry(room.id.clone()).or_insert_with(|| room.clone());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    async fn load_room(&self, room_id: &RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").rooms.get(room_id).cloned())
    }

    #[allow(clippy::expect_used)]
    async fn write_participants(
        &self,
        room_id: &RoomId,
        participants: &[UserId],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let room = inner
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| StoreError::RoomNotFound(room_id.clone()))?;

        // Last write wins; keep first occurrence order, drop duplicates.
        let mut unique: Vec<UserId> = Vec::with_capacity(participants.len());
        for id in participants {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }
        room.participants = unique;
        Ok(())
    }

    #[allow(clippy::expect_used)]
    async fn append_message(
        &self,
        room_id: &RoomId,
        message: NewMessage,
    ) -> Result<MessageRecord, StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        if !inner.rooms.contains_key(room_id) {
            return Err(StoreError::RoomNotFound(room_id.clone()));
        }

        let seq = inner.next_message_seq;
        inner.next_message_seq += 1;

        // Store-assigned timestamps are monotonic within a room.
        let last_ts = inner
            .messages
            .get(room_id)
            .and_then(|log| log.last())
            .map_or(0, |m| m.created_at_ms);
        let created_at_ms = self.env.now_ms().max(last_ts + 1);

        let record = MessageRecord {
            id: MessageId::new(format!("msg-{seq:08x}")),
            room_id: room_id.clone(),
            sender: message.sender,
            created_at_ms,
            body: message.body,
            seen: false,
        };

        inner.messages.entry(room_id.clone()).or_default().push(record.clone());
        inner.notify(&record);
        Ok(record)
    }

    #[allow(clippy::expect_used)]
    async fn mark_seen(&self, room_id: &RoomId, message_id: &MessageId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let log = inner.messages.get_mut(room_id).ok_or_else(|| StoreError::MessageNotFound {
            room_id: room_id.clone(),
            message_id: message_id.clone(),
        })?;

        let index =
            log.iter().position(|m| &m.id == message_id).ok_or_else(|| {
                StoreError::MessageNotFound {
                    room_id: room_id.clone(),
                    message_id: message_id.clone(),
                }
            })?;

        // false -> true only; marking an already-seen message is a no-op.
        if log[index].seen {
            tracing::debug!(%room_id, %message_id, "message already seen; ignoring");
            return Ok(());
        }
        log[index].seen = true;

        // A seen-flag change on the latest message is a change to the
        // subscription's result set.
        if index == log.len() - 1 {
            let record = log[index].clone();
            inner.notify(&record);
        }
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn subscribe_latest(&self, room_id: &RoomId) -> Result<LatestSubscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        // Deliver the current latest message first, then every change.
        if let Some(latest) = inner.messages.get(room_id).and_then(|log| log.last()) {
            let _ = tx.send(latest.clone());
        }
        inner.subscribers.entry(room_id.clone()).or_default().push(tx);
        Ok(LatestSubscription::new(rx))
    }
}

/// In-memory object store for tests.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    /// Create an empty object store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an object exists under `path`.
    #[allow(clippy::expect_used)]
    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().expect("Mutex poisoned").contains_key(path)
    }

    /// Number of stored objects.
    #[allow(clippy::expect_used)]
    pub fn object_count(&self) -> usize {
        self.objects.lock().expect("Mutex poisoned").len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    #[allow(clippy::expect_used)]
    async fn upload(&self, bytes: Vec<u8>, path: &str) -> Result<String, StoreError> {
        self.objects.lock().expect("Mutex poisoned").insert(path.to_owned(), bytes);
        Ok(format!("mem://{path}"))
    }

    #[allow(clippy::expect_used)]
    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.objects.lock().expect("Mutex poisoned").remove(path);
        Ok(())
    }
}

/// In-memory user directory for tests.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    inner: Arc<Mutex<DirectoryInner>>,
}

#[derive(Default)]
struct DirectoryInner {
    users: HashMap<UserId, UserProfile>,
    current: Option<UserId>,
}

impl MemoryDirectory {
    /// Create an empty directory with no signed-in user.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile.
    #[allow(clippy::expect_used)]
    pub fn insert(&self, profile: UserProfile) {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.users.insert(profile.id.clone(), profile);
    }

    /// Mark a user as the signed-in principal.
    #[allow(clippy::expect_used)]
    pub fn set_current(&self, id: UserId) {
        self.inner.lock().expect("Mutex poisoned").current = Some(id);
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    #[allow(clippy::expect_used)]
    async fn current_user(&self) -> Result<UserProfile, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let id = inner.current.as_ref().ok_or(StoreError::NoCurrentUser)?;
        inner.users.get(id).cloned().ok_or(StoreError::NoCurrentUser)
    }

    #[allow(clippy::expect_used)]
    async fn lookup(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }

    #[allow(clippy::expect_used)]
    async fn push_token(&self, id: &UserId) -> Result<Option<String>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let profile =
            inner.users.get(id).ok_or_else(|| StoreError::UserNotFound(id.clone()))?;
        Ok(profile.push_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{env::SystemEnv, ident::pair_room_id, types::MessageBody};

    fn room(a: &str, b: &str) -> Room {
        let (a, b) = (UserId::new(a), UserId::new(b));
        Room::pair(pair_room_id(&a, &b), a, b, 1000)
    }

    #[tokio::test]
    async fn create_room_is_idempotent() {
        let store = MemoryRoomStore::new(SystemEnv);
        let first = room("ana", "ben");
        store.create_room(&first).await.unwrap();

        let mut second = first.clone();
        second.created_at_ms = 9999;
        store.create_room(&second).await.unwrap();

        let loaded = store.load_room(&first.id).await.unwrap().unwrap();
        assert_eq!(loaded.created_at_ms, 1000);
        assert_eq!(store.room_count(), 1);
    }

    #[tokio::test]
    async fn append_assigns_monotonic_timestamps() {
        let store = MemoryRoomStore::new(SystemEnv);
        let r = room("ana", "ben");
        store.create_room(&r).await.unwrap();

        let m1 =
            store.append_message(&r.id, NewMessage::text(UserId::new("ana"), "a")).await.unwrap();
        let m2 =
            store.append_message(&r.id, NewMessage::text(UserId::new("ben"), "b")).await.unwrap();

        assert!(m2.created_at_ms > m1.created_at_ms);
        assert_ne!(m1.id, m2.id);
        assert_eq!(store.message_count(&r.id), 2);
    }

    #[tokio::test]
    async fn append_rejects_unknown_room() {
        let store = MemoryRoomStore::new(SystemEnv);
        let result = store
            .append_message(&RoomId::new("dm:x:y"), NewMessage::text(UserId::new("x"), "hi"))
            .await;
        assert!(matches!(result, Err(StoreError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn subscription_delivers_latest_then_changes() {
        let store = MemoryRoomStore::new(SystemEnv);
        let r = room("ana", "ben");
        store.create_room(&r).await.unwrap();
        store.append_message(&r.id, NewMessage::text(UserId::new("ana"), "old")).await.unwrap();

        let mut sub = store.subscribe_latest(&r.id).unwrap();
        let first = sub.next().await.unwrap();
        assert_eq!(first.body, MessageBody::Text { text: "old".into() });

        store.append_message(&r.id, NewMessage::text(UserId::new("ben"), "new")).await.unwrap();
        let second = sub.next().await.unwrap();
        assert_eq!(second.body, MessageBody::Text { text: "new".into() });
    }

    #[tokio::test]
    async fn mark_seen_is_one_way_and_redelivers() {
        let store = MemoryRoomStore::new(SystemEnv);
        let r = room("ana", "ben");
        store.create_room(&r).await.unwrap();
        let sent =
            store.append_message(&r.id, NewMessage::text(UserId::new("ana"), "hi")).await.unwrap();
        assert!(!sent.seen);

        let mut sub = store.subscribe_latest(&r.id).unwrap();
        let _initial = sub.next().await.unwrap();

        store.mark_seen(&r.id, &sent.id).await.unwrap();
        let update = sub.next().await.unwrap();
        assert!(update.seen);

        // Marking again is a no-op and fires no delivery.
        store.mark_seen(&r.id, &sent.id).await.unwrap();
        store.append_message(&r.id, NewMessage::text(UserId::new("ben"), "next")).await.unwrap();
        let next = sub.next().await.unwrap();
        assert_eq!(next.body, MessageBody::Text { text: "next".into() });
    }

    #[tokio::test]
    async fn write_participants_deduplicates_and_tolerates_absent_removal() {
        let store = MemoryRoomStore::new(SystemEnv);
        let r = room("ana", "ben");
        store.create_room(&r).await.unwrap();

        let ana = UserId::new("ana");
        let ben = UserId::new("ben");
        let cara = UserId::new("cara");

        store
            .write_participants(&r.id, &[ana.clone(), ben.clone(), cara.clone(), ben.clone()])
            .await
            .unwrap();
        let loaded = store.load_room(&r.id).await.unwrap().unwrap();
        assert_eq!(loaded.participants, vec![ana.clone(), ben.clone(), cara.clone()]);

        // Writing a list that already lacks a member is a no-op for that
        // member, regardless of who lost the race.
        store.write_participants(&r.id, &[ana.clone(), ben.clone()]).await.unwrap();
        store.write_participants(&r.id, &[ana.clone(), ben.clone()]).await.unwrap();
        let loaded = store.load_room(&r.id).await.unwrap().unwrap();
        assert_eq!(loaded.participants, vec![ana, ben]);
    }

    #[tokio::test]
    async fn directory_lookup_skips_unknown_ids() {
        let directory = MemoryDirectory::new();
        directory.insert(UserProfile::new(UserId::new("ana"), "Ana"));

        let found = directory
            .lookup(&[UserId::new("ghost"), UserId::new("ana")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display_name, "Ana");
    }

    #[tokio::test]
    async fn current_user_requires_sign_in() {
        let directory = MemoryDirectory::new();
        assert!(matches!(directory.current_user().await, Err(StoreError::NoCurrentUser)));

        directory.insert(UserProfile::new(UserId::new("ana"), "Ana"));
        directory.set_current(UserId::new("ana"));
        assert_eq!(directory.current_user().await.unwrap().display_name, "Ana");
    }

    #[tokio::test]
    async fn push_token_distinguishes_missing_user_from_missing_token() {
        let directory = MemoryDirectory::new();
        let mut ana = UserProfile::new(UserId::new("ana"), "Ana");
        ana.push_token = Some("tok-1".into());
        directory.insert(ana);
        directory.insert(UserProfile::new(UserId::new("ben"), "Ben"));

        assert_eq!(
            directory.push_token(&UserId::new("ana")).await.unwrap(),
            Some("tok-1".to_owned())
        );
        assert_eq!(directory.push_token(&UserId::new("ben")).await.unwrap(), None);
        assert!(matches!(
            directory.push_token(&UserId::new("ghost")).await,
            Err(StoreError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn object_store_round_trip() {
        let objects = MemoryObjectStore::new();
        let url = objects.upload(vec![1, 2, 3], "uploads/r1/cat.png").await.unwrap();
        assert_eq!(url, "mem://uploads/r1/cat.png");
        assert!(objects.contains("uploads/r1/cat.png"));

        objects.delete("uploads/r1/cat.png").await.unwrap();
        assert!(!objects.contains("uploads/r1/cat.png"));

        // Deleting an absent object is a no-op.
        objects.delete("uploads/r1/cat.png").await.unwrap();
    }
}
