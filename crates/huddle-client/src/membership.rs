//! Group membership mutation.
//!
//! [`MembershipMutator`] applies add/remove/leave operations to a group
//! room's participant list and appends one system message per change. The
//! participant list in the store is the single source of truth - it is read
//! fresh for every operation and never cached here.
//!
//! The system messages are a best-effort audit trail, not a transactional
//! log: once the participant list is persisted, the membership change
//! stands, and a failed append is reported as an audit gap rather than
//! rolled back.

use huddle_core::{NewMessage, Room, RoomId, RoomStore, StoreError, UserDirectory, UserId};
use thiserror::Error;

/// Phase of the pending mutation, exposed so the presentation layer can
/// disable the initiating control while a mutation is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// No mutation in progress.
    Idle,
    /// A mutation was submitted and has not resolved yet.
    InFlight,
}

/// Errors from membership operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// `add_members` was called with no members.
    #[error("no members given")]
    EmptyMemberList,

    /// The target of a removal is not currently a participant.
    #[error("{member} is not a member of {room_id}")]
    NotAMember {
        /// The group room.
        room_id: RoomId,
        /// The id that was not found in the participant list.
        member: UserId,
    },

    /// Membership operations apply to group rooms only.
    #[error("{room_id} is not a group room")]
    NotAGroup {
        /// The offending room.
        room_id: RoomId,
    },

    /// Another mutation is still in flight; duplicate submission rejected.
    #[error("a membership operation is already in flight")]
    OperationInFlight,

    /// Store failure before the participant list was committed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a committed membership operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipOutcome {
    /// Participant list as persisted.
    pub participants: Vec<UserId>,
    /// Members whose system message could not be appended. The membership
    /// change itself is committed; only the audit trail has holes.
    pub audit_gaps: Vec<UserId>,
}

enum RemovalNotice {
    Removed,
    Left,
}

/// Applies membership changes to group rooms.
pub struct MembershipMutator<S, D> {
    store: S,
    directory: D,
    state: MutationState,
}

impl<S: RoomStore, D: UserDirectory> MembershipMutator<S, D> {
    /// Create a mutator over the given store and directory handles.
    pub fn new(store: S, directory: D) -> Self {
        Self { store, directory, state: MutationState::Idle }
    }

    /// Current mutation phase.
    pub fn state(&self) -> MutationState {
        self.state
    }

    /// Add members to a group room.
    ///
    /// Rejects an empty member list before any store call. Duplicates of
    /// existing participants are silently absorbed. Appends one
    /// "`<name>` was added to the group" notice per newly added member.
    pub async fn add_members(
        &mut self,
        actor: &UserId,
        room_id: &RoomId,
        new_members: &[UserId],
    ) -> Result<MembershipOutcome, MembershipError> {
        if new_members.is_empty() {
            return Err(MembershipError::EmptyMemberList);
        }
        self.begin()?;
        let result = self.add_members_inner(actor, room_id, new_members).await;
        self.state = MutationState::Idle;
        result
    }

    /// Remove one member from a group room.
    ///
    /// Rejects if the id is not currently a participant. The store-level
    /// list write tolerates a concurrent removal of the same member, so a
    /// lost race cannot corrupt the list.
    pub async fn remove_member(
        &mut self,
        actor: &UserId,
        room_id: &RoomId,
        member: &UserId,
    ) -> Result<MembershipOutcome, MembershipError> {
        self.begin()?;
        let result = self.remove_inner(actor, room_id, member, RemovalNotice::Removed).await;
        self.state = MutationState::Idle;
        result
    }

    /// Leave a group room.
    ///
    /// Same semantics as removing oneself, with a "`<name>` left the group"
    /// notice. After success the viewer's roster, which is derived from
    /// participant lists, no longer includes the room.
    pub async fn leave_group(
        &mut self,
        room_id: &RoomId,
        viewer: &UserId,
    ) -> Result<MembershipOutcome, MembershipError> {
        self.begin()?;
        let result = self.remove_inner(viewer, room_id, viewer, RemovalNotice::Left).await;
        self.state = MutationState::Idle;
        result
    }

    fn begin(&mut self) -> Result<(), MembershipError> {
        if self.state == MutationState::InFlight {
            return Err(MembershipError::OperationInFlight);
        }
        self.state = MutationState::InFlight;
        Ok(())
    }

    async fn load_group(&self, room_id: &RoomId) -> Result<Room, MembershipError> {
        let room = self
            .store
            .load_room(room_id)
            .await?
            .ok_or_else(|| StoreError::RoomNotFound(room_id.clone()))?;
        if !room.id.is_group() {
            return Err(MembershipError::NotAGroup { room_id: room_id.clone() });
        }
        Ok(room)
    }

    async fn add_members_inner(
        &self,
        actor: &UserId,
        room_id: &RoomId,
        new_members: &[UserId],
    ) -> Result<MembershipOutcome, MembershipError> {
        let room = self.load_group(room_id).await?;

        let mut participants = room.participants.clone();
        let mut added: Vec<UserId> = Vec::new();
        for member in new_members {
            if !participants.contains(member) && !added.contains(member) {
                participants.push(member.clone());
                added.push(member.clone());
            }
        }

        if added.is_empty() {
            // Every given id was already a participant; nothing to persist.
            return Ok(MembershipOutcome { participants, audit_gaps: Vec::new() });
        }

        self.store.write_participants(room_id, &participants).await?;

        let audit_gaps = self
            .append_notices(actor, room_id, &added, |name| {
                format!("{name} was added to the group")
            })
            .await;

        Ok(MembershipOutcome { participants, audit_gaps })
    }

    async fn remove_inner(
        &self,
        actor: &UserId,
        room_id: &RoomId,
        member: &UserId,
        notice: RemovalNotice,
    ) -> Result<MembershipOutcome, MembershipError> {
        let room = self.load_group(room_id).await?;

        if !room.participants.contains(member) {
            return Err(MembershipError::NotAMember {
                room_id: room_id.clone(),
                member: member.clone(),
            });
        }

        let participants: Vec<UserId> =
            room.participants.iter().filter(|id| *id != member).cloned().collect();
        self.store.write_participants(room_id, &participants).await?;

        let audit_gaps = self
            .append_notices(actor, room_id, std::slice::from_ref(member), |name| match notice {
                RemovalNotice::Removed => format!("{name} was removed from the group"),
                RemovalNotice::Left => format!("{name} left the group"),
            })
            .await;

        Ok(MembershipOutcome { participants, audit_gaps })
    }

    /// Append one system notice per member; returns the ids whose notice
    /// could not be written.
    async fn append_notices(
        &self,
        actor: &UserId,
        room_id: &RoomId,
        members: &[UserId],
        notice_text: impl Fn(&str) -> String,
    ) -> Vec<UserId> {
        let profiles = match self.directory.lookup(members).await {
            Ok(profiles) => profiles,
            Err(err) => {
                // Names unavailable; the membership change stands, the
                // audit trail has holes.
                tracing::warn!(%room_id, error = %err, "directory lookup failed; skipping audit messages");
                return members.to_vec();
            },
        };

        let mut gaps = Vec::new();
        for member in members {
            let name = profiles
                .iter()
                .find(|profile| &profile.id == member)
                .map_or_else(|| member.to_string(), |profile| profile.display_name.clone());

            let message = NewMessage::system(actor.clone(), notice_text(&name));
            if let Err(err) = self.store.append_message(room_id, message).await {
                tracing::warn!(%room_id, %member, error = %err, "audit message append failed");
                gaps.push(member.clone());
            }
        }
        gaps
    }
}
