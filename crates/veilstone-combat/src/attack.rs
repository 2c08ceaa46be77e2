//! Attack resolution: melee, missile, and magic execution.
//!
//! Resolution verifies line-of-sight and resources, then schedules the
//! damage or cast event at the animation's contact frame through the
//! deferred action scheduler rather than applying it immediately. A failed
//! resolution aborts the cycle; the dispatcher retries on its next eligible
//! tick.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::combatant::{CombatantHandle, WeaponClass};
use crate::dispatcher::AiState;
use crate::resist::DamageType;
use crate::scheduler::{ActionScheduler, CombatTask, TaskChain};
use crate::timing::AnimationTimings;
use crate::vitals::VitalKind;
use crate::world::CombatWorld;
use veilstone_common::SpellId;

/// Damage of an unarmed strike.
const UNARMED_DAMAGE: f32 = 4.0;
/// Seconds between unarmed strikes.
const UNARMED_INTERVAL: f32 = 2.0;
/// Stamina cost of an unarmed strike.
const UNARMED_STAMINA_COST: u32 = 1;

/// The attack type selected for one attack cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackMode {
    /// Close-range weapon strike
    Melee,
    /// Projectile launch
    Missile,
    /// Spell cast
    Magic,
}

/// Vertical attack height, driving animation timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackHeight {
    /// Head-level attack
    High,
    /// Torso-level attack
    Medium,
    /// Leg-level attack
    Low,
}

impl AttackHeight {
    /// Get all heights.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::High, Self::Medium, Self::Low]
    }
}

/// Periodic component of a spell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DotSpec {
    /// Damage per heartbeat
    pub tick_amount: f32,
    /// Total damage over the effect's life
    pub total_amount: f32,
}

/// A combat spell an autonomous caster can select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSpell {
    /// Spell template ID
    pub id: SpellId,
    /// Maximum cast range
    pub range: f32,
    /// Mana consumed per cast
    pub mana_cost: u32,
    /// Direct damage on completion
    pub damage: f32,
    /// Damage type dealt
    pub damage_type: DamageType,
    /// Seconds from cast start until the spell lands
    pub cast_time: f64,
    /// Seconds after landing before the caster can cast again
    pub recovery: f64,
    /// Periodic component, if the spell applies one
    pub dot: Option<DotSpec>,
}

impl CombatSpell {
    /// Creates a direct-damage spell with default timing.
    #[must_use]
    pub fn new(id: SpellId, damage: f32, damage_type: DamageType) -> Self {
        Self {
            id,
            range: 25.0,
            mana_cost: 10,
            damage,
            damage_type,
            cast_time: 1.0,
            recovery: 2.0,
            dot: None,
        }
    }

    /// Sets the cast range.
    #[must_use]
    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range.max(1.0);
        self
    }

    /// Sets the mana cost.
    #[must_use]
    pub fn with_mana_cost(mut self, cost: u32) -> Self {
        self.mana_cost = cost;
        self
    }

    /// Sets cast timing.
    #[must_use]
    pub fn with_timing(mut self, cast_time: f64, recovery: f64) -> Self {
        self.cast_time = cast_time.max(0.0);
        self.recovery = recovery.max(0.0);
        self
    }

    /// Adds a periodic component.
    #[must_use]
    pub fn with_dot(mut self, tick_amount: f32, total_amount: f32) -> Self {
        self.dot = Some(DotSpec {
            tick_amount,
            total_amount,
        });
        self
    }
}

/// Attack resolution errors; each aborts the current cycle only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttackError {
    /// Target is dead or otherwise unattackable
    #[error("invalid target")]
    TargetInvalid,
    /// A closed door blocks the attack
    #[error("door blocks the attack")]
    DoorBlocked,
    /// No line of sight to the target
    #[error("no line of sight")]
    LineBlocked,
    /// No usable weapon for the selected attack type
    #[error("no usable weapon")]
    NoWeapon,
    /// Not enough stamina to strike
    #[error("out of stamina")]
    OutOfStamina,
    /// No ammunition remaining
    #[error("out of ammunition")]
    OutOfAmmo,
    /// No spell is ready to cast
    #[error("no spell ready")]
    NoSpellReady,
    /// Not enough mana for any known spell
    #[error("out of mana")]
    OutOfMana,
}

/// Executes resolved attacks by scheduling their animation-timed effects.
#[derive(Debug, Clone)]
pub struct AttackResolver {
    timings: Arc<AnimationTimings>,
}

impl AttackResolver {
    /// Creates a resolver over a shared timing table.
    #[must_use]
    pub fn new(timings: Arc<AnimationTimings>) -> Self {
        Self { timings }
    }

    /// Executes one attack cycle for the dispatcher.
    ///
    /// On success the damage/cast event is enqueued at its animation offset,
    /// `is_attacking` is set, and the next-attack timestamp advances by the
    /// weapon or spell's own timing.
    pub fn execute<W: CombatWorld>(
        &self,
        attacker: &CombatantHandle,
        target: &CombatantHandle,
        ai: &mut AiState,
        world: &W,
        scheduler: &mut ActionScheduler,
        now: f64,
    ) -> Result<(), AttackError> {
        if target.is_dead() {
            return Err(AttackError::TargetInvalid);
        }
        if world.is_door_blocked(attacker.id(), target.id()) {
            return Err(AttackError::DoorBlocked);
        }
        if !world.has_line_of_sight(attacker.id(), target.id()) {
            return Err(AttackError::LineBlocked);
        }

        match ai.mode.unwrap_or(AttackMode::Melee) {
            AttackMode::Melee => self.execute_melee(attacker, target, ai, scheduler, now),
            AttackMode::Missile => self.execute_missile(attacker, target, ai, scheduler, now),
            AttackMode::Magic => self.execute_magic(attacker, target, ai, scheduler, now),
        }
    }

    fn execute_melee(
        &self,
        attacker: &CombatantHandle,
        target: &CombatantHandle,
        ai: &mut AiState,
        scheduler: &mut ActionScheduler,
        now: f64,
    ) -> Result<(), AttackError> {
        let weapon = attacker
            .equipment()
            .wielded()
            .filter(|w| w.class == WeaponClass::Melee)
            .cloned();
        let (damage, damage_type, interval, stamina_cost) = match &weapon {
            Some(w) => (
                w.base_damage * w.mods.damage,
                w.damage_type,
                w.attack_interval,
                w.stamina_cost,
            ),
            None => (
                UNARMED_DAMAGE,
                DamageType::Bludgeon,
                UNARMED_INTERVAL,
                UNARMED_STAMINA_COST,
            ),
        };

        Self::spend_stamina(attacker, stamina_cost)?;

        let timing = self.timings.get(AttackMode::Melee, ai.attack_height);
        let chain = TaskChain::new()
            .then(
                timing.contact_delay,
                CombatTask::LandMelee {
                    attacker: CombatantHandle::downgrade(attacker),
                    target: CombatantHandle::downgrade(target),
                    damage,
                    damage_type,
                },
            )
            .then(
                timing.recovery,
                CombatTask::EndAttack {
                    entity: attacker.id(),
                },
            );
        scheduler.enqueue(attacker.id(), now, chain);

        ai.is_attacking = true;
        ai.next_attack_at = now + f64::from(interval);
        Ok(())
    }

    fn execute_missile(
        &self,
        attacker: &CombatantHandle,
        target: &CombatantHandle,
        ai: &mut AiState,
        scheduler: &mut ActionScheduler,
        now: f64,
    ) -> Result<(), AttackError> {
        let stamina_cost = {
            let equipment = attacker.equipment();
            let weapon = equipment
                .wielded()
                .filter(|w| w.class == WeaponClass::Missile)
                .ok_or(AttackError::NoWeapon)?;
            if weapon.ammo.unwrap_or(0) == 0 {
                return Err(AttackError::OutOfAmmo);
            }
            weapon.stamina_cost
        };
        Self::spend_stamina(attacker, stamina_cost)?;

        let weapon = {
            let mut equipment = attacker.equipment();
            let weapon = equipment
                .wielded_mut()
                .filter(|w| w.class == WeaponClass::Missile)
                .ok_or(AttackError::NoWeapon)?;
            if let Some(ammo) = weapon.ammo.as_mut() {
                *ammo = ammo.saturating_sub(1);
            }
            weapon.clone()
        };

        let timing = self.timings.get(AttackMode::Missile, ai.attack_height);
        let chain = TaskChain::new()
            .then(
                timing.contact_delay,
                CombatTask::LaunchProjectile {
                    attacker: CombatantHandle::downgrade(attacker),
                    target: CombatantHandle::downgrade(target),
                    damage: weapon.base_damage * weapon.mods.damage,
                    damage_type: weapon.damage_type,
                },
            )
            .then(
                timing.reload,
                CombatTask::Reload {
                    attacker: CombatantHandle::downgrade(attacker),
                },
            )
            .then(
                timing.recovery,
                CombatTask::EndAttack {
                    entity: attacker.id(),
                },
            );
        scheduler.enqueue(attacker.id(), now, chain);

        ai.is_attacking = true;
        ai.next_attack_at = now + f64::from(weapon.attack_interval);
        Ok(())
    }

    fn execute_magic(
        &self,
        attacker: &CombatantHandle,
        target: &CombatantHandle,
        ai: &mut AiState,
        scheduler: &mut ActionScheduler,
        now: f64,
    ) -> Result<(), AttackError> {
        if ai.spellbook.is_empty() || now < ai.next_cast_ready {
            return Err(AttackError::NoSpellReady);
        }
        let mana = attacker.vitals().mana.current();
        let spell = ai
            .spellbook
            .iter()
            .find(|s| s.mana_cost <= mana)
            .cloned()
            .ok_or(AttackError::OutOfMana)?;

        attacker
            .vitals()
            .apply_delta(VitalKind::Mana, -(spell.mana_cost as i32));

        let timing = self.timings.get(AttackMode::Magic, ai.attack_height);
        let ready_at = now + spell.cast_time + spell.recovery;
        let chain = TaskChain::new()
            .then(
                spell.cast_time,
                CombatTask::LandSpell {
                    caster: CombatantHandle::downgrade(attacker),
                    target: CombatantHandle::downgrade(target),
                    spell,
                },
            )
            .then(
                timing.recovery,
                CombatTask::EndAttack {
                    entity: attacker.id(),
                },
            );
        scheduler.enqueue(attacker.id(), now, chain);

        ai.is_attacking = true;
        ai.next_cast_ready = ready_at;
        ai.next_attack_at = ready_at;
        Ok(())
    }

    /// Verifies and consumes the stamina cost of a strike.
    fn spend_stamina(attacker: &CombatantHandle, cost: u32) -> Result<(), AttackError> {
        let mut vitals = attacker.vitals();
        if vitals.stamina.current() < cost {
            return Err(AttackError::OutOfStamina);
        }
        vitals.apply_delta(VitalKind::Stamina, -(cost as i32));
        Ok(())
    }
}
