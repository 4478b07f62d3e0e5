//! Manager hierarchy checks.
//!
//! The manager relation must stay a forest. The walk is iterative and
//! bounded, so a corrupted chain already containing a loop cannot hang it.

use uuid::Uuid;

/// Returns true if making `manager_id` the manager of `user_id` would close a loop.
///
/// `manager_of` resolves a user's current manager. `max_depth` bounds the
/// walk, normally the number of users in the company; exhausting it is
/// treated as a cycle.
pub fn would_create_cycle<F>(
    user_id: Uuid,
    manager_id: Uuid,
    mut manager_of: F,
    max_depth: usize,
) -> bool
where
    F: FnMut(Uuid) -> Option<Uuid>,
{
    if user_id == manager_id {
        return true;
    }

    let mut current = manager_id;
    for _ in 0..max_depth {
        match manager_of(current) {
            None => return false,
            Some(next) if next == user_id => return true,
            Some(next) => current = next,
        }
    }
    true
}
