//! Combatant state: vitals, flags, equipment, and the per-entity locks.
//!
//! A [`Combatant`] is shared across region worker threads via
//! [`CombatantHandle`]. Each mutable block sits behind its own
//! `parking_lot::Mutex`; no operation may hold two combatants' locks at once,
//! so cross-entity calls (an attacker applying damage to a target) take only
//! the target's locks.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

use crate::effects::ActiveEffects;
use crate::ledger::ThreatBook;
use crate::position::CombatPosition;
use crate::resist::{DamageType, ResistanceProfile};
use crate::vitals::VitalSet;
use veilstone_common::{EntityId, WeaponId};

/// Shared handle to a combatant.
pub type CombatantHandle = Arc<Combatant>;

/// Weak handle used by effect records and attacker tracking.
pub type CombatantRef = Weak<Combatant>;

/// Closed set of combatant roles the dispatcher selects behavior by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatantRole {
    /// Player-controlled character
    Player,
    /// Autonomous creature
    Creature {
        /// Whether this creature can cast spells
        caster: bool,
    },
    /// Pet following an owner
    Pet {
        /// Owning entity
        owner: EntityId,
    },
}

impl CombatantRole {
    /// Whether this role is player-controlled.
    #[must_use]
    pub const fn is_player(self) -> bool {
        matches!(self, Self::Player)
    }

    /// Whether the combat tick dispatcher drives this role.
    #[must_use]
    pub const fn is_autonomous(self) -> bool {
        matches!(self, Self::Creature { .. } | Self::Pet { .. })
    }

    /// Whether this role is eligible to select magic attacks.
    #[must_use]
    pub const fn can_cast(self) -> bool {
        matches!(self, Self::Creature { caster: true })
    }
}

/// Per-combatant status flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatFlags {
    /// Death latch; set once and never cleared while the entity lives on
    pub dead: bool,
    /// Immune to all damage
    pub invincible: bool,
    /// Standing in a zone where damage cannot be dealt
    pub no_damage_zone: bool,
    /// Remaining sanctuary charges; each absorbs one harmful application
    pub sanctuary_charges: u32,
    /// Last time this combatant entered a PvP interaction
    pub pvp_flagged_at: Option<f64>,
}

/// How a weapon delivers damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponClass {
    /// Close-range weapon
    Melee,
    /// Projectile weapon requiring ammunition
    Missile,
}

/// Caster-side modifiers carried by a weapon.
///
/// `bypass` cleaves through the target's resistance; `damage` folds the
/// elemental, slayer, and absorb bonuses into a single multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponMods {
    /// Resistance-bypass multiplier
    pub bypass: f32,
    /// Damage bonus multiplier
    pub damage: f32,
}

impl Default for WeaponMods {
    fn default() -> Self {
        Self {
            bypass: 1.0,
            damage: 1.0,
        }
    }
}

/// A wieldable weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    /// Weapon instance ID
    pub id: WeaponId,
    /// Delivery class
    pub class: WeaponClass,
    /// Damage type dealt
    pub damage_type: DamageType,
    /// Base damage per strike
    pub base_damage: f32,
    /// Melee reach or missile maximum range
    pub reach: f32,
    /// Seconds between attacks
    pub attack_interval: f32,
    /// Stamina consumed per strike
    pub stamina_cost: u32,
    /// Remaining ammunition (missile weapons only)
    pub ammo: Option<u32>,
    /// Simulation time at which the weapon wears out, if any
    pub expires_at: Option<f64>,
    /// Caster-side modifiers
    pub mods: WeaponMods,
}

impl Weapon {
    /// Creates a weapon with class defaults.
    #[must_use]
    pub fn new(id: WeaponId, class: WeaponClass, damage_type: DamageType) -> Self {
        let (reach, ammo) = match class {
            WeaponClass::Melee => (1.5, None),
            WeaponClass::Missile => (40.0, Some(0)),
        };
        Self {
            id,
            class,
            damage_type,
            base_damage: 10.0,
            reach,
            attack_interval: 2.0,
            stamina_cost: 2,
            ammo,
            expires_at: None,
            mods: WeaponMods::default(),
        }
    }

    /// Sets base damage.
    #[must_use]
    pub fn with_damage(mut self, damage: f32) -> Self {
        self.base_damage = damage.max(0.0);
        self
    }

    /// Sets reach/range.
    #[must_use]
    pub fn with_reach(mut self, reach: f32) -> Self {
        self.reach = reach.max(0.1);
        self
    }

    /// Sets the attack interval.
    #[must_use]
    pub fn with_interval(mut self, interval: f32) -> Self {
        self.attack_interval = interval.max(0.1);
        self
    }

    /// Sets ammunition count.
    #[must_use]
    pub fn with_ammo(mut self, ammo: u32) -> Self {
        self.ammo = Some(ammo);
        self
    }

    /// Sets an expiry time.
    #[must_use]
    pub fn with_expiry(mut self, at: f64) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Sets caster-side modifiers.
    #[must_use]
    pub fn with_mods(mut self, mods: WeaponMods) -> Self {
        self.mods = mods;
        self
    }
}

/// A combatant's wielded weapon plus stowed spares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    wielded: Option<Weapon>,
    stowed: Vec<Weapon>,
}

impl Equipment {
    /// Creates empty equipment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently wielded weapon.
    #[must_use]
    pub fn wielded(&self) -> Option<&Weapon> {
        self.wielded.as_ref()
    }

    /// Mutable access to the wielded weapon.
    pub fn wielded_mut(&mut self) -> Option<&mut Weapon> {
        self.wielded.as_mut()
    }

    /// Whether a weapon of the given class is wielded.
    #[must_use]
    pub fn has_wielded(&self, class: WeaponClass) -> bool {
        self.wielded.as_ref().is_some_and(|w| w.class == class)
    }

    /// Wields a weapon, stowing any previously wielded one.
    pub fn wield(&mut self, weapon: Weapon) {
        if let Some(old) = self.wielded.take() {
            self.stowed.push(old);
        }
        self.wielded = Some(weapon);
    }

    /// Adds a weapon to the stowed spares.
    pub fn stow(&mut self, weapon: Weapon) {
        self.stowed.push(weapon);
    }

    /// Re-equips a stowed weapon of the given class.
    ///
    /// Returns whether a matching weapon was found and wielded.
    pub fn re_equip(&mut self, class: WeaponClass) -> bool {
        let Some(idx) = self.stowed.iter().position(|w| w.class == class) else {
            return false;
        };
        let weapon = self.stowed.remove(idx);
        self.wield(weapon);
        true
    }

    /// Removes and returns all weapons whose expiry has passed.
    pub fn expire_due(&mut self, now: f64) -> Vec<Weapon> {
        let mut expired = Vec::new();
        if self
            .wielded
            .as_ref()
            .and_then(|w| w.expires_at)
            .is_some_and(|at| at <= now)
        {
            if let Some(w) = self.wielded.take() {
                expired.push(w);
            }
        }
        let mut i = 0;
        while i < self.stowed.len() {
            if self.stowed[i].expires_at.is_some_and(|at| at <= now) {
                expired.push(self.stowed.remove(i));
            } else {
                i += 1;
            }
        }
        expired
    }
}

/// A combatant in the simulation.
#[derive(Debug)]
pub struct Combatant {
    id: EntityId,
    name: String,
    role: CombatantRole,
    resists: ResistanceProfile,
    vitals: Mutex<VitalSet>,
    effects: Mutex<ActiveEffects>,
    flags: Mutex<CombatFlags>,
    threat: Mutex<ThreatBook>,
    equipment: Mutex<Equipment>,
    position: Mutex<CombatPosition>,
}

impl Combatant {
    /// Creates a combatant with default vitals at the origin.
    #[must_use]
    pub fn new(role: CombatantRole, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            role,
            resists: ResistanceProfile::new(),
            vitals: Mutex::new(VitalSet::default()),
            effects: Mutex::new(ActiveEffects::default()),
            flags: Mutex::new(CombatFlags::default()),
            threat: Mutex::new(ThreatBook::new()),
            equipment: Mutex::new(Equipment::new()),
            position: Mutex::new(CombatPosition::new(0.0, 0.0)),
        }
    }

    /// Sets starting vitals (builder pattern).
    #[must_use]
    pub fn with_vitals(self, health: u32, stamina: u32, mana: u32) -> Self {
        *self.vitals.lock() = VitalSet::new(health, stamina, mana);
        self
    }

    /// Sets the resistance profile (builder pattern).
    #[must_use]
    pub fn with_resistances(mut self, resists: ResistanceProfile) -> Self {
        self.resists = resists;
        self
    }

    /// Sets the starting position (builder pattern).
    #[must_use]
    pub fn with_position(self, position: CombatPosition) -> Self {
        *self.position.lock() = position;
        self
    }

    /// Wields a weapon (builder pattern).
    #[must_use]
    pub fn with_weapon(self, weapon: Weapon) -> Self {
        self.equipment.lock().wield(weapon);
        self
    }

    /// Stows a spare weapon (builder pattern).
    #[must_use]
    pub fn with_stowed(self, weapon: Weapon) -> Self {
        self.equipment.lock().stow(weapon);
        self
    }

    /// Wraps the combatant in a shared handle.
    #[must_use]
    pub fn into_handle(self) -> CombatantHandle {
        Arc::new(self)
    }

    /// The combatant's entity ID.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The combatant's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The combatant's role.
    #[must_use]
    pub fn role(&self) -> CombatantRole {
        self.role
    }

    /// The resistance profile.
    #[must_use]
    pub fn resists(&self) -> &ResistanceProfile {
        &self.resists
    }

    /// Locks and returns the vital block.
    pub fn vitals(&self) -> MutexGuard<'_, VitalSet> {
        self.vitals.lock()
    }

    /// Locks and returns the active-effects block.
    ///
    /// The status-effect engine holds this guard for its entire aggregation
    /// pass so the rebuilt lists are consistent with no concurrent append.
    pub fn effects(&self) -> MutexGuard<'_, ActiveEffects> {
        self.effects.lock()
    }

    /// Locks and returns the status flags.
    pub fn flags(&self) -> MutexGuard<'_, CombatFlags> {
        self.flags.lock()
    }

    /// Locks and returns the threat ledger.
    pub fn threat(&self) -> MutexGuard<'_, ThreatBook> {
        self.threat.lock()
    }

    /// Locks and returns the equipment block.
    pub fn equipment(&self) -> MutexGuard<'_, Equipment> {
        self.equipment.lock()
    }

    /// The current position.
    #[must_use]
    pub fn position(&self) -> CombatPosition {
        *self.position.lock()
    }

    /// Moves the combatant (driven by the physics collaborator).
    pub fn set_position(&self, position: CombatPosition) {
        *self.position.lock() = position;
    }

    /// Whether the death latch is set.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.flags.lock().dead
    }

    /// Sets the death latch.
    pub fn mark_dead(&self) {
        self.flags.lock().dead = true;
    }

    /// Whether the combatant currently cannot take damage.
    #[must_use]
    pub fn is_invincible(&self) -> bool {
        let flags = self.flags.lock();
        flags.invincible || flags.no_damage_zone
    }

    /// Grants sanctuary charges.
    pub fn grant_sanctuary(&self, charges: u32) {
        self.flags.lock().sanctuary_charges += charges;
    }

    /// Consumes one sanctuary charge if present.
    ///
    /// Returns whether a charge was consumed.
    pub fn consume_sanctuary(&self) -> bool {
        let mut flags = self.flags.lock();
        if flags.sanctuary_charges > 0 {
            flags.sanctuary_charges -= 1;
            true
        } else {
            false
        }
    }

    /// Records a PvP interaction timestamp.
    pub fn mark_pvp(&self, now: f64) {
        self.flags.lock().pvp_flagged_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vitals::VitalKind;

    #[test]
    fn test_role_predicates() {
        assert!(CombatantRole::Player.is_player());
        assert!(!CombatantRole::Player.is_autonomous());
        assert!(CombatantRole::Creature { caster: true }.can_cast());
        assert!(!CombatantRole::Creature { caster: false }.can_cast());
        assert!(CombatantRole::Pet {
            owner: EntityId::from_raw(1)
        }
        .is_autonomous());
    }

    #[test]
    fn test_builder() {
        let combatant = Combatant::new(CombatantRole::Player, "hero")
            .with_vitals(150, 120, 90)
            .with_position(CombatPosition::new(3.0, 4.0));

        assert_eq!(combatant.name(), "hero");
        assert_eq!(combatant.vitals().get(VitalKind::Health).maximum(), 150);
        assert!((combatant.position().x - 3.0).abs() < f32::EPSILON);
        assert!(!combatant.is_dead());
    }

    #[test]
    fn test_sanctuary_charges() {
        let combatant = Combatant::new(CombatantRole::Player, "hero");
        assert!(!combatant.consume_sanctuary());

        combatant.grant_sanctuary(2);
        assert!(combatant.consume_sanctuary());
        assert!(combatant.consume_sanctuary());
        assert!(!combatant.consume_sanctuary());
    }

    #[test]
    fn test_invincibility_flags() {
        let combatant = Combatant::new(CombatantRole::Player, "hero");
        assert!(!combatant.is_invincible());

        combatant.flags().no_damage_zone = true;
        assert!(combatant.is_invincible());
    }

    #[test]
    fn test_equipment_wield_and_re_equip() {
        let mut equipment = Equipment::new();
        let bow = Weapon::new(WeaponId::new(1), WeaponClass::Missile, DamageType::Pierce)
            .with_ammo(10);
        let sword = Weapon::new(WeaponId::new(2), WeaponClass::Melee, DamageType::Slash);

        equipment.wield(bow);
        assert!(equipment.has_wielded(WeaponClass::Missile));

        equipment.wield(sword);
        assert!(equipment.has_wielded(WeaponClass::Melee));

        // The bow was stowed and can come back out
        assert!(equipment.re_equip(WeaponClass::Missile));
        assert!(equipment.has_wielded(WeaponClass::Missile));

        assert!(!equipment.re_equip(WeaponClass::Missile));
    }

    #[test]
    fn test_equipment_expiry() {
        let mut equipment = Equipment::new();
        equipment.wield(
            Weapon::new(WeaponId::new(1), WeaponClass::Melee, DamageType::Slash).with_expiry(5.0),
        );
        equipment.stow(
            Weapon::new(WeaponId::new(2), WeaponClass::Melee, DamageType::Slash).with_expiry(50.0),
        );

        let expired = equipment.expire_due(10.0);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, WeaponId::new(1));
        assert!(equipment.wielded().is_none());

        assert!(equipment.expire_due(20.0).is_empty());
    }
}
