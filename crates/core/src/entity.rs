//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Entities reference each other by identifier only; lookups go through the
/// store that owns the referenced entity.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
