//! Damage history and attacker tracking per combatant.

use ahash::AHashMap;

use crate::combatant::{CombatantHandle, CombatantRef};
use crate::resist::DamageType;
use veilstone_common::EntityId;

/// A tracked attacker with the time of its most recent hit.
#[derive(Debug, Clone)]
pub struct AttackerEntry {
    /// Attacker entity
    pub id: EntityId,
    /// Weak handle for target acquisition
    pub handle: CombatantRef,
    /// Simulation time of the most recent hit
    pub last_attack_at: f64,
}

/// Per-combatant ledger of damage taken, healing received, and attackers.
///
/// Feeds death-blame resolution and the dispatcher's target acquisition.
#[derive(Debug, Default)]
pub struct ThreatBook {
    damage_by_source: AHashMap<EntityId, f32>,
    damage_by_type: AHashMap<DamageType, f32>,
    last_damager: Option<EntityId>,
    total_healed: f32,
    attackers: Vec<AttackerEntry>,
}

impl ThreatBook {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records damage dealt by a source.
    pub fn record(&mut self, source: EntityId, damage_type: DamageType, amount: f32) {
        if amount <= 0.0 {
            return;
        }
        *self.damage_by_source.entry(source).or_insert(0.0) += amount;
        *self.damage_by_type.entry(damage_type).or_insert(0.0) += amount;
        if source.is_valid() {
            self.last_damager = Some(source);
        }
    }

    /// Records healing received.
    pub fn record_heal(&mut self, amount: f32) {
        if amount > 0.0 {
            self.total_healed += amount;
        }
    }

    /// The most recent valid damage source, if any.
    #[must_use]
    pub fn last_damager(&self) -> Option<EntityId> {
        self.last_damager
    }

    /// Total damage recorded from one source.
    #[must_use]
    pub fn damage_from(&self, source: EntityId) -> f32 {
        self.damage_by_source.get(&source).copied().unwrap_or(0.0)
    }

    /// Total damage recorded across all sources.
    #[must_use]
    pub fn total_damage(&self) -> f32 {
        self.damage_by_source.values().sum()
    }

    /// Total healing recorded.
    #[must_use]
    pub fn total_healed(&self) -> f32 {
        self.total_healed
    }

    /// Registers or refreshes an attacker for retaliation.
    pub fn note_attacker(&mut self, source: &CombatantHandle, now: f64) {
        if let Some(entry) = self.attackers.iter_mut().find(|e| e.id == source.id()) {
            entry.last_attack_at = now;
            entry.handle = CombatantHandle::downgrade(source);
        } else {
            self.attackers.push(AttackerEntry {
                id: source.id(),
                handle: CombatantHandle::downgrade(source),
                last_attack_at: now,
            });
        }
    }

    /// All tracked attackers.
    #[must_use]
    pub fn attackers(&self) -> &[AttackerEntry] {
        &self.attackers
    }

    /// The attacker with the most recent hit, if any.
    #[must_use]
    pub fn most_recent_attacker(&self) -> Option<&AttackerEntry> {
        self.attackers
            .iter()
            .max_by(|a, b| a.last_attack_at.total_cmp(&b.last_attack_at))
    }

    /// Drops an attacker from tracking.
    pub fn forget_attacker(&mut self, id: EntityId) {
        self.attackers.retain(|e| e.id != id);
    }

    /// Clears all history.
    pub fn clear(&mut self) {
        self.damage_by_source.clear();
        self.damage_by_type.clear();
        self.last_damager = None;
        self.total_healed = 0.0;
        self.attackers.clear();
    }
}
