//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Ingredients and menu items are entities: two ingredients with the same name
/// but different ids are different stock records.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Human-readable label used in error messages and logs.
    fn label(&self) -> &str;
}
