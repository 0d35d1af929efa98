//! Property-based tests for the chat list state machine.
//!
//! Verifies the unread derivation rules and roster reconciliation
//! idempotence under arbitrary event sequences.

use huddle_client::{ChatAction, ChatEvent, ChatList, SubscriptionToken};
use huddle_core::{MessageBody, MessageId, MessageRecord, Room, RoomId, UserId, pair_room_id};
use proptest::prelude::*;

const ROOM_COUNT: usize = 3;

fn viewer() -> UserId {
    UserId::new("viewer")
}

fn peer(index: usize) -> UserId {
    UserId::new(format!("peer-{index}"))
}

fn roster() -> Vec<Room> {
    (0..ROOM_COUNT)
        .map(|index| {
            let other = peer(index);
            Room::pair(
                pair_room_id(&viewer(), &other),
                viewer(),
                other,
                (index as u64 + 1) * 10,
            )
        })
        .collect()
}

fn open_tokens(actions: &[ChatAction], rooms: &[Room]) -> Vec<SubscriptionToken> {
    rooms
        .iter()
        .map(|room| {
            actions
                .iter()
                .find_map(|action| match action {
                    ChatAction::OpenSubscription { room_id, token } if room_id == &room.id => {
                        Some(*token)
                    },
                    _ => None,
                })
                .expect("every roster room gets a subscription")
        })
        .collect()
}

/// One step of a randomized session.
#[derive(Debug, Clone)]
enum Step {
    /// A peer message arrives for room `room`.
    PeerDelivery { room: usize, seen: bool, ts: u64 },
    /// The viewer's own message echoes back for room `room`.
    OwnDelivery { room: usize, ts: u64 },
    /// The presentation layer opens room `room`.
    Open { room: usize },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0..ROOM_COUNT, any::<bool>(), 1u64..1_000_000)
            .prop_map(|(room, seen, ts)| Step::PeerDelivery { room, seen, ts }),
        2 => (0..ROOM_COUNT, 1u64..1_000_000).prop_map(|(room, ts)| Step::OwnDelivery { room, ts }),
        1 => (0..ROOM_COUNT).prop_map(|room| Step::Open { room }),
    ]
}

fn message(room: &Room, sender: &UserId, seen: bool, ts: u64) -> MessageRecord {
    MessageRecord {
        id: MessageId::new(format!("m-{ts}")),
        room_id: room.id.clone(),
        sender: sender.clone(),
        created_at_ms: ts,
        body: MessageBody::Text { text: "x".into() },
        seen,
    }
}

proptest! {
    /// The unread flag tracks a trivial reference model exactly: set by an
    /// unseen peer delivery, cleared only by an explicit open, untouched by
    /// the viewer's own messages.
    #[test]
    fn unread_matches_reference_model(steps in prop::collection::vec(step_strategy(), 0..60)) {
        let rooms = roster();
        let mut chat = ChatList::new();
        let actions = chat.set_roster(&viewer(), &rooms);
        let tokens = open_tokens(&actions, &rooms);

        let mut model = [false; ROOM_COUNT];
        for step in steps {
            match step {
                Step::PeerDelivery { room, seen, ts } => {
                    let sender = peer(room);
                    chat.handle(ChatEvent::Delivery {
                        token: tokens[room],
                        message: message(&rooms[room], &sender, seen, ts),
                    });
                    if !seen {
                        model[room] = true;
                    }
                },
                Step::OwnDelivery { room, ts } => {
                    chat.handle(ChatEvent::Delivery {
                        token: tokens[room],
                        message: message(&rooms[room], &viewer(), false, ts),
                    });
                },
                Step::Open { room } => {
                    chat.handle(ChatEvent::RoomOpened { room_id: rooms[room].id.clone() });
                    model[room] = false;
                },
            }

            for (index, room) in rooms.iter().enumerate() {
                prop_assert_eq!(chat.unread(&room.id), Some(model[index]));
            }
        }
    }

    /// Reapplying any roster subset is a no-op: no new actions, no
    /// duplicate subscriptions.
    #[test]
    fn set_roster_is_idempotent_for_any_subset(
        include in prop::collection::vec(any::<bool>(), ROOM_COUNT),
    ) {
        let rooms = roster();
        let subset: Vec<Room> = rooms
            .iter()
            .zip(&include)
            .filter_map(|(room, keep)| keep.then(|| room.clone()))
            .collect();

        let mut chat = ChatList::new();
        let first = chat.set_roster(&viewer(), &subset);
        prop_assert_eq!(first.len(), subset.len());
        let active = chat.active_subscriptions();

        let second = chat.set_roster(&viewer(), &subset);
        prop_assert!(second.is_empty());
        prop_assert_eq!(chat.active_subscriptions(), active);
    }

    /// The sorted view never invents or drops rooms and is ordered by
    /// non-increasing effective timestamp.
    #[test]
    fn sorted_view_is_a_permutation_in_order(steps in prop::collection::vec(step_strategy(), 0..40)) {
        let rooms = roster();
        let mut chat = ChatList::new();
        let actions = chat.set_roster(&viewer(), &rooms);
        let tokens = open_tokens(&actions, &rooms);

        for step in steps {
            match step {
                Step::PeerDelivery { room, seen, ts } => chat.handle(ChatEvent::Delivery {
                    token: tokens[room],
                    message: message(&rooms[room], &peer(room), seen, ts),
                }),
                Step::OwnDelivery { room, ts } => chat.handle(ChatEvent::Delivery {
                    token: tokens[room],
                    message: message(&rooms[room], &viewer(), false, ts),
                }),
                Step::Open { room } => {
                    chat.handle(ChatEvent::RoomOpened { room_id: rooms[room].id.clone() });
                },
            }
        }

        let view = chat.sorted_view(2_000_000);
        prop_assert_eq!(view.len(), rooms.len());

        let mut seen_ids: Vec<&RoomId> = view.iter().map(|row| &row.room_id).collect();
        seen_ids.sort();
        let mut expected: Vec<&RoomId> = rooms.iter().map(|room| &room.id).collect();
        expected.sort();
        prop_assert_eq!(seen_ids, expected);

        for pair in view.windows(2) {
            prop_assert!(pair[0].timestamp_ms >= pair[1].timestamp_ms);
        }
    }
}
