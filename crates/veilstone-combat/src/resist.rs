//! Damage types and per-combatant resistance profiles.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Types of damage a weapon or spell can deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    /// Edged weapon damage
    Slash,
    /// Pointed weapon damage
    Pierce,
    /// Blunt weapon damage
    Bludgeon,
    /// Frost damage
    Cold,
    /// Fire damage
    Fire,
    /// Corrosive damage
    Acid,
    /// Lightning damage
    Electric,
    /// Life-draining damage
    Nether,
}

impl DamageType {
    /// Check if this damage type is elemental.
    #[must_use]
    pub fn is_elemental(self) -> bool {
        matches!(self, Self::Cold | Self::Fire | Self::Acid | Self::Electric)
    }

    /// Get all damage types.
    #[must_use]
    pub const fn all() -> [Self; 8] {
        [
            Self::Slash,
            Self::Pierce,
            Self::Bludgeon,
            Self::Cold,
            Self::Fire,
            Self::Acid,
            Self::Electric,
            Self::Nether,
        ]
    }
}

/// Whether damage is delivered through physical or magical means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatKind {
    /// Weapon-delivered damage
    Physical,
    /// Spell-delivered damage
    Magic,
}

/// Resistance profile for a combatant, fixed after spawn.
///
/// Stores a multiplier per damage type (1.0 = neutral, below 1.0 resists,
/// above 1.0 is a vulnerability) plus rating multipliers applied to incoming
/// periodic damage and healing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResistanceProfile {
    values: AHashMap<DamageType, f32>,
    /// Multiplier on incoming damage from damage-rating enchantments.
    pub damage_rating: f32,
    /// Multiplier on incoming periodic damage specifically.
    pub dot_rating: f32,
    /// Multiplier on incoming healing.
    pub heal_rating: f32,
}

impl Default for ResistanceProfile {
    fn default() -> Self {
        Self {
            values: AHashMap::new(),
            damage_rating: 1.0,
            dot_rating: 1.0,
            heal_rating: 1.0,
        }
    }
}

impl ResistanceProfile {
    /// Create a neutral profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the multiplier for a damage type.
    pub fn set(&mut self, damage_type: DamageType, value: f32) {
        self.values.insert(damage_type, value.max(0.0));
    }

    /// Set a multiplier (builder pattern).
    #[must_use]
    pub fn with_resistance(mut self, damage_type: DamageType, value: f32) -> Self {
        self.set(damage_type, value);
        self
    }

    /// Set the periodic-damage rating multiplier (builder pattern).
    #[must_use]
    pub fn with_dot_rating(mut self, rating: f32) -> Self {
        self.dot_rating = rating.max(0.0);
        self
    }

    /// Set the healing rating multiplier (builder pattern).
    #[must_use]
    pub fn with_heal_rating(mut self, rating: f32) -> Self {
        self.heal_rating = rating.max(0.0);
        self
    }

    /// Multiplier for a damage type, floored at zero.
    #[must_use]
    pub fn modifier(&self, damage_type: DamageType) -> f32 {
        self.values
            .get(&damage_type)
            .copied()
            .unwrap_or(1.0)
            .max(0.0)
    }

    /// Check if fully immune to a damage type.
    #[must_use]
    pub fn is_immune(&self, damage_type: DamageType) -> bool {
        self.modifier(damage_type) == 0.0
    }
}
