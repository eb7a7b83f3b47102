//! UUID helpers.
//!
//! Task ids are UUIDv7 (time-ordered, opaque to callers). Extracted unit ids
//! are UUIDv5 so that re-parsing the same cached result yields the same ids.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use saga_core::uuid_utils::new_v7;
///
/// let a = new_v7();
/// let b = new_v7();
/// assert_ne!(a, b);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Derive the id of the `index`-th unit extracted from `parent_unit_id`
/// under `content_hash`.
///
/// Pure function of its inputs: the same analysis always yields the same ids.
///
/// ```
/// use saga_core::uuid_utils::unit_id_for;
/// use uuid::Uuid;
///
/// let parent = Uuid::new_v4();
/// assert_eq!(unit_id_for(parent, "abc", 0), unit_id_for(parent, "abc", 0));
/// assert_ne!(unit_id_for(parent, "abc", 0), unit_id_for(parent, "abc", 1));
/// ```
pub fn unit_id_for(parent_unit_id: Uuid, content_hash: &str, index: usize) -> Uuid {
    let name = format!("{}:{}", content_hash, index);
    Uuid::new_v5(&parent_unit_id, name.as_bytes())
}

/// Cache key under which scope-wide analyses of `scope_id` are stored.
///
/// Kept apart from the scope id itself so it cannot collide with a member
/// unit's own cache entries.
pub fn scope_cache_id(scope_id: Uuid) -> Uuid {
    Uuid::new_v5(&scope_id, b"scope-analysis")
}
