//! Entity traits: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}

/// Human-meaningful attribute used to match records across systems that
/// share no identifier. Not unique.
pub trait NaturalKey: Entity {
    fn natural_key(&self) -> &str;
}
