//! Shared attack-animation timing table.
//!
//! Read from every entity's tick, populated lazily, never mutated per-tick.

use dashmap::DashMap;

use crate::attack::{AttackHeight, AttackMode};

/// Animation-derived timing for one attack variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackTiming {
    /// Seconds from swing start until damage lands
    pub contact_delay: f64,
    /// Seconds from contact until the attacker can act again
    pub recovery: f64,
    /// Seconds for the reload animation (missile attacks)
    pub reload: f64,
}

/// Lazily-populated lookup of attack timings shared across entities.
#[derive(Debug, Default)]
pub struct AnimationTimings {
    table: DashMap<(AttackMode, AttackHeight), AttackTiming>,
}

impl AnimationTimings {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the timing for an attack variant, populating it on first use.
    pub fn get(&self, mode: AttackMode, height: AttackHeight) -> AttackTiming {
        *self
            .table
            .entry((mode, height))
            .or_insert_with(|| Self::derive(mode, height))
    }

    /// Number of populated entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no entries have been populated yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn derive(mode: AttackMode, height: AttackHeight) -> AttackTiming {
        let base = match mode {
            AttackMode::Melee => AttackTiming {
                contact_delay: 0.4,
                recovery: 1.0,
                reload: 0.0,
            },
            AttackMode::Missile => AttackTiming {
                contact_delay: 0.6,
                recovery: 1.0,
                reload: 1.5,
            },
            AttackMode::Magic => AttackTiming {
                contact_delay: 1.0,
                recovery: 1.2,
                reload: 0.0,
            },
        };
        let height_mod = match height {
            AttackHeight::High => 1.2,
            AttackHeight::Medium => 1.0,
            AttackHeight::Low => 0.85,
        };
        AttackTiming {
            contact_delay: base.contact_delay * height_mod,
            ..base
        }
    }
}
