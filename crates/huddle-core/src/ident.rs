//! Room identifier derivation.
//!
//! Two identifier namespaces share the room keyspace:
//!
//! - `dm:` - 1:1 rooms, keyed by a canonical combination of the two
//!   participant ids. Deterministic and symmetric, so both participants
//!   address the same document without coordination.
//! - `grp:` - group rooms, keyed by an opaque generated token. Group
//!   membership is mutable, so the identifier is never derived from it.
//!
//! The distinct prefixes guarantee a group identifier can never equal a pair
//! identifier derivable from its members.

use crate::{env::Environment, types::{RoomId, UserId}};

/// Namespace prefix for 1:1 room identifiers.
pub const PAIR_PREFIX: &str = "dm:";

/// Namespace prefix for group room identifiers.
pub const GROUP_PREFIX: &str = "grp:";

/// Canonical identifier for the 1:1 room between `a` and `b`.
///
/// Symmetric in its arguments: `pair_room_id(a, b) == pair_room_id(b, a)`.
/// Pure and total; no error conditions.
pub fn pair_room_id(a: &UserId, b: &UserId) -> RoomId {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    RoomId::new(format!("{PAIR_PREFIX}{lo}:{hi}"))
}

/// Fresh opaque identifier for a new group room.
///
/// Concatenates a random 64-bit component with the creation time in
/// milliseconds; collision requires the same random draw within the same
/// millisecond.
pub fn group_room_id(env: &impl Environment) -> RoomId {
    RoomId::new(format!("{GROUP_PREFIX}{:016x}{:012x}", env.random_u64(), env.now_ms()))
}
