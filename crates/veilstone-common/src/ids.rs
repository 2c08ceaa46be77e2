//! ID types for entities, spells, and weapons.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for entity IDs.
static ENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a combatant in the game world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new unique entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(ENTITY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates an entity ID from a raw value (for deserialization).
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid entity ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) entity ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a spell template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpellId(u32);

impl SpellId {
    /// Creates a spell ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Unique identifier for a weapon instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeaponId(u32);

impl WeaponId {
    /// Creates a weapon ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_unique() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
        assert!(id1.is_valid());
    }

    #[test]
    fn test_entity_id_null() {
        assert!(!EntityId::NULL.is_valid());
        assert_eq!(EntityId::NULL.raw(), 0);
    }

    #[test]
    fn test_entity_id_raw_round_trip() {
        let id = EntityId::from_raw(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(id, EntityId::from_raw(42));
    }

    #[test]
    fn test_spell_and_weapon_ids() {
        assert_eq!(SpellId::new(7).raw(), 7);
        assert_eq!(WeaponId::new(9).raw(), 9);
        assert_ne!(WeaponId::new(1), WeaponId::new(2));
    }
}
