//! Periodic status effects: damage-over-time and heal-over-time.
//!
//! Each combatant owns a pair of effect lists behind a single lock. Spell and
//! attack application appends records; the heartbeat aggregation pass decays
//! them, merges simultaneous sources into one applied delta per damage type,
//! clamps against remaining health, and emits notifications. The whole pass
//! runs under the effect-list lock so the rebuilt lists are consistent with
//! no concurrent append.

use thiserror::Error;
use tracing::{debug, warn};

use crate::combatant::{CombatantHandle, CombatantRef, WeaponMods};
use crate::config::TickConfig;
use crate::events::{CombatMessage, NotificationSink};
use crate::resist::{CombatKind, DamageType};
use crate::vitals::{BoostableAttribute, VitalKind};
use ahash::AHashMap;
use veilstone_common::{EntityId, WeaponId};

/// Multiplier applied to periodic damage between two player combatants.
const PVP_DOT_MOD: f32 = 0.5;

/// Status-effect errors raised at the call boundary.
#[derive(Debug, Clone, Error)]
pub enum EffectError {
    /// The named attribute cannot carry a periodic effect
    #[error("attribute {0:?} is not a tickable vital")]
    NotAVital(BoostableAttribute),
    /// Periodic damage requires a live source
    #[error("periodic damage requires a source")]
    MissingSource,
}

/// Result type for status-effect operations.
pub type EffectResult<T> = Result<T, EffectError>;

/// An active damage-over-time instance.
///
/// Immutable between heartbeats; the aggregation pass rebuilds the list with
/// decremented `total_remaining` values and drops records that reach zero.
#[derive(Debug, Clone)]
pub struct DotRecord {
    /// Damage applied per heartbeat before modifiers
    pub tick_amount: f32,
    /// Damage left to deal; never negative
    pub total_remaining: f32,
    /// Damage type dealt
    pub damage_type: DamageType,
    /// Physical or magical delivery
    pub combat_kind: CombatKind,
    /// Whether the applying strike was critical
    pub critical: bool,
    /// Originating entity; may be dead or absent for merged ticks
    pub source: CombatantRef,
    /// Originating entity ID, `NULL` when absent
    pub source_id: EntityId,
    /// Caster-side resistance-bypass multiplier, applied at tick time
    pub bypass_mod: f32,
    /// Caster-side weapon damage multiplier, applied at tick time
    pub weapon_mod: f32,
}

/// An active heal-over-time instance.
#[derive(Debug, Clone)]
pub struct HotRecord {
    /// Amount restored per heartbeat before modifiers
    pub tick_amount: f32,
    /// Amount left to restore; never negative
    pub total_remaining: f32,
    /// Vital being restored
    pub vital: VitalKind,
    /// Physical or magical delivery
    pub combat_kind: CombatKind,
    /// Originating entity
    pub source: CombatantRef,
    /// Originating entity ID
    pub source_id: EntityId,
}

/// A combatant's active effect lists.
#[derive(Debug, Default)]
pub struct ActiveEffects {
    /// Active damage-over-time records
    pub dots: Vec<DotRecord>,
    /// Active heal-over-time records
    pub hots: Vec<HotRecord>,
}

impl ActiveEffects {
    /// Whether both lists are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dots.is_empty() && self.hots.is_empty()
    }
}

/// Parameters for applying a heal-over-time effect.
#[derive(Debug, Clone)]
pub struct HotParams {
    /// Amount restored per heartbeat before cadence scaling
    pub tick_amount: f32,
    /// Total amount the effect restores
    pub total_amount: f32,
    /// Attribute the spell payload names; must be a vital
    pub attribute: BoostableAttribute,
    /// Physical or magical delivery
    pub combat_kind: CombatKind,
}

impl HotParams {
    /// Creates heal parameters.
    #[must_use]
    pub fn new(tick_amount: f32, total_amount: f32, attribute: BoostableAttribute) -> Self {
        Self {
            tick_amount,
            total_amount,
            attribute,
            combat_kind: CombatKind::Magic,
        }
    }
}

/// Parameters for applying a damage-over-time effect.
#[derive(Debug, Clone)]
pub struct DotParams {
    /// Damage per heartbeat before modifiers
    pub tick_amount: f32,
    /// Total damage the effect deals
    pub total_amount: f32,
    /// Whether the applying strike was critical
    pub critical: bool,
    /// Physical or magical delivery
    pub combat_kind: CombatKind,
    /// Damage type dealt
    pub damage_type: DamageType,
    /// Originating entity; rejected when absent
    pub source: Option<CombatantHandle>,
    /// Weapon that drove the application, for caster-side modifiers
    pub source_weapon: Option<WeaponId>,
    /// Attack skill of the source, scaling the stored caster modifier
    pub attack_skill: u32,
}

impl DotParams {
    /// Creates damage parameters.
    #[must_use]
    pub fn new(
        tick_amount: f32,
        total_amount: f32,
        damage_type: DamageType,
        combat_kind: CombatKind,
    ) -> Self {
        Self {
            tick_amount,
            total_amount,
            critical: false,
            combat_kind,
            damage_type,
            source: None,
            source_weapon: None,
            attack_skill: 0,
        }
    }

    /// Sets the source entity.
    #[must_use]
    pub fn with_source(mut self, source: CombatantHandle) -> Self {
        self.source = Some(source);
        self
    }

    /// Marks the applying strike as critical.
    #[must_use]
    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Sets the driving weapon.
    #[must_use]
    pub fn with_weapon(mut self, weapon: WeaponId) -> Self {
        self.source_weapon = Some(weapon);
        self
    }

    /// Sets the source's attack skill.
    #[must_use]
    pub fn with_skill(mut self, skill: u32) -> Self {
        self.attack_skill = skill;
        self
    }
}

/// One source's contribution to an aggregate.
#[derive(Debug, Clone)]
struct SourceShare {
    id: EntityId,
    handle: CombatantRef,
    amount: f32,
}

/// A per-damage-type aggregate with first-seen ordering.
#[derive(Debug, Clone)]
struct DamageAggregate {
    damage_type: DamageType,
    total: f32,
    first_seen: usize,
    shares: Vec<SourceShare>,
}

/// Keyed damage aggregation preserving insertion order for tie-breaks.
#[derive(Debug, Default)]
struct DamageAggregates {
    index: AHashMap<DamageType, usize>,
    items: Vec<DamageAggregate>,
}

impl DamageAggregates {
    fn add(&mut self, damage_type: DamageType, id: EntityId, handle: CombatantRef, amount: f32) {
        let idx = match self.index.get(&damage_type) {
            Some(&existing) => existing,
            None => {
                let created = self.items.len();
                self.items.push(DamageAggregate {
                    damage_type,
                    total: 0.0,
                    first_seen: created,
                    shares: Vec::new(),
                });
                self.index.insert(damage_type, created);
                created
            }
        };
        let aggregate = &mut self.items[idx];
        aggregate.total += amount;
        if let Some(share) = aggregate.shares.iter_mut().find(|s| s.id == id) {
            share.amount += amount;
        } else {
            aggregate.shares.push(SourceShare { id, handle, amount });
        }
    }

    /// Descending by total, then first-seen order; never map iteration order.
    fn into_sorted(mut self) -> Vec<DamageAggregate> {
        self.items.sort_by(|a, b| {
            b.total
                .total_cmp(&a.total)
                .then(a.first_seen.cmp(&b.first_seen))
        });
        self.items
    }
}

/// A per-vital heal aggregate with first-seen ordering.
#[derive(Debug, Clone)]
struct HealAggregate {
    vital: VitalKind,
    total: f32,
    first_seen: usize,
    shares: Vec<SourceShare>,
}

#[derive(Debug, Default)]
struct HealAggregates {
    index: AHashMap<VitalKind, usize>,
    items: Vec<HealAggregate>,
}

impl HealAggregates {
    fn add(&mut self, vital: VitalKind, id: EntityId, handle: CombatantRef, amount: f32) {
        let idx = match self.index.get(&vital) {
            Some(&existing) => existing,
            None => {
                let created = self.items.len();
                self.items.push(HealAggregate {
                    vital,
                    total: 0.0,
                    first_seen: created,
                    shares: Vec::new(),
                });
                self.index.insert(vital, created);
                created
            }
        };
        let aggregate = &mut self.items[idx];
        aggregate.total += amount;
        if let Some(share) = aggregate.shares.iter_mut().find(|s| s.id == id) {
            share.amount += amount;
        } else {
            aggregate.shares.push(SourceShare { id, handle, amount });
        }
    }

    fn into_sorted(mut self) -> Vec<HealAggregate> {
        self.items.sort_by(|a, b| {
            b.total
                .total_cmp(&a.total)
                .then(a.first_seen.cmp(&b.first_seen))
        });
        self.items
    }
}

/// The periodic status-effect engine.
#[derive(Debug, Clone)]
pub struct StatusEffectEngine {
    config: TickConfig,
}

impl StatusEffectEngine {
    /// Creates an engine for the given cadence.
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        Self { config }
    }

    /// Applies a heal-over-time effect to `target`.
    ///
    /// Rejects attributes outside the three vitals with no state change. The
    /// per-tick amount is scaled for the configured heartbeat cadence.
    pub fn apply_hot<S: NotificationSink>(
        &self,
        target: &CombatantHandle,
        source: &CombatantHandle,
        params: HotParams,
        sink: &S,
    ) -> EffectResult<()> {
        let Some(vital) = params.attribute.as_vital() else {
            warn!(
                attribute = ?params.attribute,
                entity = target.id().raw(),
                "rejected heal-over-time on non-vital attribute"
            );
            return Err(EffectError::NotAVital(params.attribute));
        };

        let tick_amount = params.tick_amount * self.config.heartbeat_scale();
        target.effects().hots.push(HotRecord {
            tick_amount,
            total_remaining: params.total_amount,
            vital,
            combat_kind: params.combat_kind,
            source: CombatantHandle::downgrade(source),
            source_id: source.id(),
        });

        sink.deliver(
            source.id(),
            CombatMessage::HotApplied {
                target: target.id(),
                vital,
                total: params.total_amount,
            },
        );
        if target.id() != source.id() {
            sink.deliver(
                target.id(),
                CombatMessage::HotReceived {
                    source: source.id(),
                    vital,
                    total: params.total_amount,
                },
            );
        }
        Ok(())
    }

    /// Applies a damage-over-time effect to `target`.
    ///
    /// Returns `Ok(true)` when the record was appended, `Ok(false)` when a
    /// state precondition aborted the call (dead, invincible, or sanctuary
    /// protection — which is consumed), and `Err` when the input itself is
    /// invalid.
    pub fn apply_dot<S: NotificationSink>(
        &self,
        target: &CombatantHandle,
        params: DotParams,
        now: f64,
        sink: &S,
    ) -> EffectResult<bool> {
        let Some(source) = params.source else {
            warn!(
                entity = target.id().raw(),
                "rejected periodic damage with no source"
            );
            return Err(EffectError::MissingSource);
        };

        if target.is_dead() || target.is_invincible() {
            return Ok(false);
        }
        if target.consume_sanctuary() {
            sink.deliver(
                target.id(),
                CombatMessage::Protected {
                    target: target.id(),
                },
            );
            sink.deliver(
                source.id(),
                CombatMessage::Protected {
                    target: target.id(),
                },
            );
            return Ok(false);
        }

        let is_pvp = source.role().is_player() && target.role().is_player();
        let pvp_mod = if is_pvp { PVP_DOT_MOD } else { 1.0 };
        let composite = target.resists().damage_rating.max(0.0)
            * target.resists().dot_rating.max(0.0)
            * pvp_mod
            * self.config.heartbeat_scale();
        let tick_amount = params.tick_amount * composite;
        let total_amount = params.total_amount * composite;

        let mods = Self::caster_mods(&source, params.source_weapon);
        let weapon_mod = mods.damage * (1.0 + params.attack_skill as f32 / 1000.0);

        if is_pvp {
            source.mark_pvp(now);
            target.mark_pvp(now);
        }
        target.threat().note_attacker(&source, now);

        target.effects().dots.push(DotRecord {
            tick_amount,
            total_remaining: total_amount,
            damage_type: params.damage_type,
            combat_kind: params.combat_kind,
            critical: params.critical,
            source: CombatantHandle::downgrade(&source),
            source_id: source.id(),
            bypass_mod: mods.bypass,
            weapon_mod,
        });

        sink.deliver(
            source.id(),
            CombatMessage::DotApplied {
                target: target.id(),
                damage_type: params.damage_type,
                total: total_amount,
            },
        );
        if target.id() != source.id() {
            sink.deliver(
                target.id(),
                CombatMessage::DotReceived {
                    source: source.id(),
                    damage_type: params.damage_type,
                    total: total_amount,
                    critical: params.critical,
                },
            );
        }
        Ok(true)
    }

    /// Looks up the caster-side modifiers of the driving weapon.
    fn caster_mods(source: &CombatantHandle, weapon: Option<WeaponId>) -> WeaponMods {
        let Some(weapon_id) = weapon else {
            return WeaponMods::default();
        };
        let equipment = source.equipment();
        equipment
            .wielded()
            .filter(|w| w.id == weapon_id)
            .map(|w| w.mods)
            .unwrap_or_default()
    }

    /// Applies instantaneous damage from an attack.
    ///
    /// Returns the health actually removed.
    pub fn apply_direct_damage<S: NotificationSink>(
        &self,
        source: &CombatantHandle,
        target: &CombatantHandle,
        amount: f32,
        damage_type: DamageType,
        now: f64,
        sink: &S,
    ) -> i32 {
        if target.is_dead() || target.is_invincible() {
            return 0;
        }
        if target.consume_sanctuary() {
            sink.deliver(
                target.id(),
                CombatMessage::Protected {
                    target: target.id(),
                },
            );
            return 0;
        }

        let effective = (amount * target.resists().modifier(damage_type)).max(0.0);
        let rounded = effective.round() as i32;
        if rounded <= 0 {
            return 0;
        }

        let applied = -target.vitals().apply_delta(VitalKind::Health, -rounded);
        {
            let mut threat = target.threat();
            threat.record(source.id(), damage_type, applied as f32);
            threat.note_attacker(source, now);
        }
        sink.deliver(
            target.id(),
            CombatMessage::DamageTaken {
                damage_type,
                amount: applied,
            },
        );

        if target.vitals().health.is_depleted() && !target.is_dead() {
            target.mark_dead();
            let killer = target.threat().last_damager();
            sink.deliver(target.id(), CombatMessage::Died { killer });
        }
        applied
    }

    /// The per-heartbeat aggregation pass.
    ///
    /// Runs entirely under the target's effect-list lock: decays and prunes
    /// each record, merges contributions per damage type split by combat
    /// kind, clamps total applied damage to the health the entity had at the
    /// start of the pass, applies magic aggregates before physical ones in
    /// descending order of total amount, and notifies every contributing
    /// source of its share.
    pub fn heartbeat<S: NotificationSink>(&self, target: &CombatantHandle, now: f64, sink: &S) {
        let mut effects = target.effects();
        if target.is_dead() || effects.is_empty() {
            return;
        }

        // ---- damage pass ----
        let start_health = target.vitals().health.current() as f32;
        let mut retained = Vec::with_capacity(effects.dots.len());
        let mut magic = DamageAggregates::default();
        let mut physical = DamageAggregates::default();
        let mut running = 0.0_f32;
        let mut lethal = false;

        for dot in effects.dots.drain(..) {
            let base_tick = dot.tick_amount.min(dot.total_remaining);
            let remaining_after = (dot.total_remaining - dot.tick_amount).max(0.0);
            if remaining_after > 0.0 {
                let mut kept = dot.clone();
                kept.total_remaining = remaining_after;
                retained.push(kept);
            }
            // Decay continues for every record, but once the lethal clamp has
            // triggered no further damage is accounted this heartbeat.
            if lethal {
                continue;
            }

            let resist = target.resists().modifier(dot.damage_type);
            let effective = base_tick * resist * dot.bypass_mod * dot.weapon_mod;
            if effective <= 0.0 {
                continue;
            }

            let capacity = (start_health - running).max(0.0);
            let contribution = effective.min(capacity);
            if effective >= capacity {
                lethal = true;
            }
            if contribution <= 0.0 {
                continue;
            }
            running += contribution;

            let aggregates = match dot.combat_kind {
                CombatKind::Magic => &mut magic,
                CombatKind::Physical => &mut physical,
            };
            aggregates.add(dot.damage_type, dot.source_id, dot.source.clone(), contribution);
            if dot.source_id.is_valid() {
                target
                    .threat()
                    .record(dot.source_id, dot.damage_type, contribution);
            }
        }
        effects.dots = retained;

        debug!(
            entity = target.id().raw(),
            accounted = running,
            "periodic damage accounted this heartbeat"
        );

        let magic_sorted = magic.into_sorted();
        let physical_sorted = physical.into_sorted();

        let mut died = false;
        for aggregate in magic_sorted.iter().chain(physical_sorted.iter()) {
            let rounded = aggregate.total.round() as i32;
            let applied = if rounded > 0 {
                -target.vitals().apply_delta(VitalKind::Health, -rounded)
            } else {
                0
            };
            if applied > 0 {
                sink.deliver(
                    target.id(),
                    CombatMessage::DamageTaken {
                        damage_type: aggregate.damage_type,
                        amount: applied,
                    },
                );
            }

            let suppressed = applied == 0 || target.is_invincible();
            for share in &aggregate.shares {
                if share.id.is_valid() && share.id != target.id() {
                    let amount = if suppressed {
                        0
                    } else {
                        share.amount.round() as i32
                    };
                    sink.deliver(
                        share.id,
                        CombatMessage::PeriodicDamage {
                            target: target.id(),
                            damage_type: aggregate.damage_type,
                            amount,
                        },
                    );
                }
                // Liveness comes from the weak handle alone; taking the
                // source's own locks here would nest two entities' locks.
                if let Some(source) = share.handle.upgrade() {
                    target.threat().note_attacker(&source, now);
                }
            }

            if target.vitals().health.is_depleted() {
                died = true;
                target.mark_dead();
                let killer = target.threat().last_damager();
                sink.deliver(target.id(), CombatMessage::Died { killer });
                break;
            }
        }

        if died {
            // Remaining aggregates are not applied; the pruned DoT list was
            // already committed above and the HoT list has not ticked.
            return;
        }

        // ---- heal pass ----
        let mut retained = Vec::with_capacity(effects.hots.len());
        let mut heals = HealAggregates::default();
        let heal_mod = target.resists().heal_rating.max(0.0);

        for hot in effects.hots.drain(..) {
            let base_tick = hot.tick_amount.min(hot.total_remaining);
            let remaining_after = (hot.total_remaining - hot.tick_amount).max(0.0);
            if remaining_after > 0.0 {
                let mut kept = hot.clone();
                kept.total_remaining = remaining_after;
                retained.push(kept);
            }

            let effective = base_tick * heal_mod;
            if effective <= 0.0 {
                continue;
            }
            heals.add(hot.vital, hot.source_id, hot.source.clone(), effective);
        }
        effects.hots = retained;

        for aggregate in heals.into_sorted() {
            if target.is_dead() {
                break;
            }
            let rounded = aggregate.total.round() as i32;
            let applied = if rounded > 0 {
                target.vitals().apply_delta(aggregate.vital, rounded)
            } else {
                0
            };
            if applied > 0 {
                target.threat().record_heal(applied as f32);
                sink.deliver(
                    target.id(),
                    CombatMessage::HealTaken {
                        vital: aggregate.vital,
                        amount: applied,
                    },
                );
            }
            for share in &aggregate.shares {
                if share.id.is_valid() && share.id != target.id() {
                    sink.deliver(
                        share.id,
                        CombatMessage::PeriodicHeal {
                            target: target.id(),
                            vital: aggregate.vital,
                            amount: share.amount.round() as i32,
                        },
                    );
                }
            }
        }
    }

    /// Drops every active effect under the lock.
    ///
    /// A heartbeat immediately afterwards is a no-op.
    pub fn clear_all(&self, target: &CombatantHandle) {
        let mut effects = target.effects();
        effects.dots.clear();
        effects.hots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{Combatant, CombatantRole};
    use crate::events::{ChannelSink, NullSink};
    use crate::resist::ResistanceProfile;
    use proptest::prelude::*;

    fn creature(name: &str) -> CombatantHandle {
        Combatant::new(CombatantRole::Creature { caster: false }, name).into_handle()
    }

    fn player(name: &str) -> CombatantHandle {
        Combatant::new(CombatantRole::Player, name).into_handle()
    }

    fn engine() -> StatusEffectEngine {
        StatusEffectEngine::new(TickConfig::default())
    }

    fn dot(tick: f32, total: f32, damage_type: DamageType, kind: CombatKind) -> DotParams {
        DotParams::new(tick, total, damage_type, kind)
    }

    #[test]
    fn test_apply_hot_rejects_non_vital() {
        let engine = engine();
        let target = creature("target");
        let source = player("healer");
        let sink = ChannelSink::new(16);

        let result = engine.apply_hot(
            &target,
            &source,
            HotParams::new(5.0, 25.0, BoostableAttribute::Strength),
            &sink,
        );
        assert!(matches!(result, Err(EffectError::NotAVital(_))));
        assert!(target.effects().hots.is_empty());
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_apply_hot_scales_for_cadence() {
        let config = TickConfig::new(2.5, 0.5).expect("valid");
        let engine = StatusEffectEngine::new(config);
        let target = creature("target");
        let source = player("healer");
        let sink = ChannelSink::new(16);

        engine
            .apply_hot(
                &target,
                &source,
                HotParams::new(10.0, 50.0, BoostableAttribute::Health),
                &sink,
            )
            .expect("vital attribute");

        let effects = target.effects();
        assert_eq!(effects.hots.len(), 1);
        assert!((effects.hots[0].tick_amount - 5.0).abs() < 0.001);
        assert!((effects.hots[0].total_remaining - 50.0).abs() < 0.001);
    }

    #[test]
    fn test_apply_hot_notifies_source_and_target() {
        let engine = engine();
        let target = creature("target");
        let source = player("healer");
        let sink = ChannelSink::new(16);

        engine
            .apply_hot(
                &target,
                &source,
                HotParams::new(5.0, 25.0, BoostableAttribute::Stamina),
                &sink,
            )
            .expect("vital attribute");

        let messages = sink.drain();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, source.id());
        assert_eq!(messages[1].0, target.id());
    }

    #[test]
    fn test_apply_dot_requires_source() {
        let engine = engine();
        let target = creature("target");
        let sink = ChannelSink::new(16);

        let result = engine.apply_dot(
            &target,
            dot(8.0, 40.0, DamageType::Nether, CombatKind::Magic),
            0.0,
            &sink,
        );
        assert!(matches!(result, Err(EffectError::MissingSource)));
        assert!(target.effects().dots.is_empty());
    }

    #[test]
    fn test_apply_dot_rejected_on_dead_target() {
        let engine = engine();
        let target = creature("target");
        let source = player("attacker");
        let sink = ChannelSink::new(16);

        target.mark_dead();
        let applied = engine
            .apply_dot(
                &target,
                dot(8.0, 40.0, DamageType::Fire, CombatKind::Magic).with_source(source),
                0.0,
                &sink,
            )
            .expect("valid input");
        assert!(!applied);
        assert!(target.effects().dots.is_empty());
    }

    #[test]
    fn test_apply_dot_consumes_protection() {
        let engine = engine();
        let target = creature("target");
        let source = player("attacker");
        let sink = ChannelSink::new(16);

        target.grant_sanctuary(1);
        let applied = engine
            .apply_dot(
                &target,
                dot(8.0, 40.0, DamageType::Fire, CombatKind::Magic).with_source(source.clone()),
                0.0,
                &sink,
            )
            .expect("valid input");
        assert!(!applied);
        assert!(target.effects().dots.is_empty());
        assert!(!target.consume_sanctuary());

        let messages = sink.drain();
        assert!(messages
            .iter()
            .all(|(_, m)| matches!(m, CombatMessage::Protected { .. })));

        // Protection spent; the next application lands
        let applied = engine
            .apply_dot(
                &target,
                dot(8.0, 40.0, DamageType::Fire, CombatKind::Magic).with_source(source),
                0.0,
                &sink,
            )
            .expect("valid input");
        assert!(applied);
        assert_eq!(target.effects().dots.len(), 1);
    }

    #[test]
    fn test_apply_dot_pvp_halves_amounts() {
        let engine = engine();
        let target = player("defender");
        let source = player("attacker");
        let sink = ChannelSink::new(16);

        engine
            .apply_dot(
                &target,
                dot(10.0, 50.0, DamageType::Nether, CombatKind::Magic).with_source(source.clone()),
                7.0,
                &sink,
            )
            .expect("valid input");

        let effects = target.effects();
        assert!((effects.dots[0].tick_amount - 5.0).abs() < 0.001);
        assert!((effects.dots[0].total_remaining - 25.0).abs() < 0.001);
        drop(effects);

        assert!(target.flags().pvp_flagged_at.is_some());
        assert!(source.flags().pvp_flagged_at.is_some());
    }

    #[test]
    fn test_apply_dot_tracks_attacker() {
        let engine = engine();
        let target = creature("target");
        let source = player("attacker");
        let sink = ChannelSink::new(16);

        engine
            .apply_dot(
                &target,
                dot(5.0, 25.0, DamageType::Acid, CombatKind::Magic).with_source(source.clone()),
                3.0,
                &sink,
            )
            .expect("valid input");

        let threat = target.threat();
        assert_eq!(threat.attackers().len(), 1);
        assert_eq!(threat.attackers()[0].id, source.id());
    }

    #[test]
    fn test_heartbeat_decay_and_prune() {
        let engine = engine();
        let target = creature("target");
        let source = player("attacker");
        let sink = ChannelSink::new(64);

        engine
            .apply_dot(
                &target,
                dot(10.0, 25.0, DamageType::Fire, CombatKind::Magic).with_source(source),
                0.0,
                &sink,
            )
            .expect("valid input");

        engine.heartbeat(&target, 5.0, &sink);
        {
            let effects = target.effects();
            assert_eq!(effects.dots.len(), 1);
            assert!((effects.dots[0].total_remaining - 15.0).abs() < 0.001);
        }

        engine.heartbeat(&target, 10.0, &sink);
        {
            let effects = target.effects();
            assert!((effects.dots[0].total_remaining - 5.0).abs() < 0.001);
        }

        // Final partial tick of 5 and the record is gone
        engine.heartbeat(&target, 15.0, &sink);
        assert!(target.effects().dots.is_empty());
        assert_eq!(target.vitals().health.current(), 100 - 10 - 10 - 5);
    }

    #[test]
    fn test_heartbeat_lethal_clamp_scenario() {
        let engine = engine();
        let target = creature("target");
        let a = player("first");
        let b = player("second");
        let c = player("third");
        let sink = ChannelSink::new(64);

        for source in [a.clone(), b.clone()] {
            engine
                .apply_dot(
                    &target,
                    dot(80.0, 80.0, DamageType::Nether, CombatKind::Magic).with_source(source),
                    0.0,
                    &sink,
                )
                .expect("valid input");
        }
        // A third effect of a different type, aggregated after the clamp point
        engine
            .apply_dot(
                &target,
                dot(40.0, 40.0, DamageType::Fire, CombatKind::Magic).with_source(c.clone()),
                0.0,
                &sink,
            )
            .expect("valid input");
        sink.drain();

        engine.heartbeat(&target, 5.0, &sink);

        // Exactly the starting health was applied and the entity died
        assert_eq!(target.vitals().health.current(), 0);
        assert!(target.is_dead());

        // Both 80-point effects were consumed entirely; the third was never
        // accounted but still decayed and pruned
        assert!(target.effects().dots.is_empty());

        let messages = sink.drain();
        let damage_total: i32 = messages
            .iter()
            .filter_map(|(to, m)| match m {
                CombatMessage::DamageTaken { amount, .. } if *to == target.id() => Some(*amount),
                _ => None,
            })
            .sum();
        assert_eq!(damage_total, 100);

        // The third source's share never fired
        assert!(!messages.iter().any(|(to, _)| *to == c.id()));
        assert!(messages
            .iter()
            .any(|(_, m)| matches!(m, CombatMessage::Died { .. })));
    }

    #[test]
    fn test_heartbeat_magic_before_physical_descending() {
        let engine = engine();
        let target = Combatant::new(CombatantRole::Creature { caster: false }, "target")
            .with_vitals(1000, 100, 100)
            .into_handle();
        let source = player("attacker");
        let sink = ChannelSink::new(64);

        // Physical aggregate is the largest overall; magic must still apply first
        for (tick, damage_type, kind) in [
            (50.0, DamageType::Slash, CombatKind::Physical),
            (10.0, DamageType::Fire, CombatKind::Magic),
            (30.0, DamageType::Nether, CombatKind::Magic),
        ] {
            engine
                .apply_dot(
                    &target,
                    dot(tick, tick, damage_type, kind).with_source(source.clone()),
                    0.0,
                    &sink,
                )
                .expect("valid input");
        }
        sink.drain();

        engine.heartbeat(&target, 5.0, &sink);

        let order: Vec<DamageType> = sink
            .drain()
            .into_iter()
            .filter_map(|(to, m)| match m {
                CombatMessage::DamageTaken { damage_type, .. } if to == target.id() => {
                    Some(damage_type)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            order,
            vec![DamageType::Nether, DamageType::Fire, DamageType::Slash]
        );
    }

    #[test]
    fn test_heartbeat_tie_break_is_first_seen() {
        let engine = engine();
        let target = Combatant::new(CombatantRole::Creature { caster: false }, "target")
            .with_vitals(1000, 100, 100)
            .into_handle();
        let source = player("attacker");
        let sink = ChannelSink::new(64);

        for damage_type in [DamageType::Acid, DamageType::Cold, DamageType::Electric] {
            engine
                .apply_dot(
                    &target,
                    dot(20.0, 20.0, damage_type, CombatKind::Magic).with_source(source.clone()),
                    0.0,
                    &sink,
                )
                .expect("valid input");
        }
        sink.drain();

        engine.heartbeat(&target, 5.0, &sink);

        let order: Vec<DamageType> = sink
            .drain()
            .into_iter()
            .filter_map(|(to, m)| match m {
                CombatMessage::DamageTaken { damage_type, .. } if to == target.id() => {
                    Some(damage_type)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            order,
            vec![DamageType::Acid, DamageType::Cold, DamageType::Electric]
        );
    }

    #[test]
    fn test_heartbeat_resistance_applies_at_tick() {
        let engine = engine();
        let target = Combatant::new(CombatantRole::Creature { caster: false }, "target")
            .with_resistances(ResistanceProfile::new().with_resistance(DamageType::Fire, 0.5))
            .into_handle();
        let source = player("attacker");
        let sink = ChannelSink::new(64);

        engine
            .apply_dot(
                &target,
                dot(20.0, 20.0, DamageType::Fire, CombatKind::Magic).with_source(source),
                0.0,
                &sink,
            )
            .expect("valid input");

        engine.heartbeat(&target, 5.0, &sink);
        assert_eq!(target.vitals().health.current(), 90);
    }

    #[test]
    fn test_heartbeat_per_source_shares() {
        let engine = engine();
        let target = creature("target");
        let a = player("first");
        let b = player("second");
        let sink = ChannelSink::new(64);

        engine
            .apply_dot(
                &target,
                dot(10.0, 10.0, DamageType::Fire, CombatKind::Magic).with_source(a.clone()),
                0.0,
                &sink,
            )
            .expect("valid input");
        engine
            .apply_dot(
                &target,
                dot(20.0, 20.0, DamageType::Fire, CombatKind::Magic).with_source(b.clone()),
                0.0,
                &sink,
            )
            .expect("valid input");
        sink.drain();

        engine.heartbeat(&target, 5.0, &sink);

        let messages = sink.drain();
        let share_of = |id: EntityId| -> i32 {
            messages
                .iter()
                .find_map(|(to, m)| match m {
                    CombatMessage::PeriodicDamage { amount, .. } if *to == id => Some(*amount),
                    _ => None,
                })
                .expect("share delivered")
        };
        assert_eq!(share_of(a.id()), 10);
        assert_eq!(share_of(b.id()), 20);
        assert_eq!(target.vitals().health.current(), 70);
    }

    #[test]
    fn test_heartbeat_heal_clamps_to_missing() {
        let engine = engine();
        let target = creature("target");
        let source = player("healer");
        let sink = ChannelSink::new(64);

        target.vitals().health.apply_delta(-10);
        engine
            .apply_hot(
                &target,
                &source,
                HotParams::new(30.0, 30.0, BoostableAttribute::Health),
                &sink,
            )
            .expect("vital attribute");
        sink.drain();

        engine.heartbeat(&target, 5.0, &sink);

        assert_eq!(target.vitals().health.current(), 100);
        assert!((target.threat().total_healed() - 10.0).abs() < 0.001);

        let messages = sink.drain();
        assert!(messages.iter().any(|(to, m)| matches!(
            m,
            CombatMessage::HealTaken { amount: 10, .. }
        ) && *to == target.id()));
        assert!(messages
            .iter()
            .any(|(to, m)| matches!(m, CombatMessage::PeriodicHeal { .. }) && *to == source.id()));
    }

    #[test]
    fn test_heartbeat_dead_entity_skipped() {
        let engine = engine();
        let target = creature("target");
        let source = player("attacker");
        let sink = ChannelSink::new(64);

        engine
            .apply_dot(
                &target,
                dot(10.0, 50.0, DamageType::Fire, CombatKind::Magic).with_source(source),
                0.0,
                &sink,
            )
            .expect("valid input");
        sink.drain();

        target.mark_dead();
        engine.heartbeat(&target, 5.0, &sink);

        // Nothing ticked: no decay, no messages
        assert!((target.effects().dots[0].total_remaining - 50.0).abs() < 0.001);
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_clear_all_then_heartbeat_is_noop() {
        let engine = engine();
        let target = creature("target");
        let source = player("attacker");
        let sink = ChannelSink::new(64);

        engine
            .apply_dot(
                &target,
                dot(10.0, 50.0, DamageType::Fire, CombatKind::Magic).with_source(source.clone()),
                0.0,
                &sink,
            )
            .expect("valid input");
        engine
            .apply_hot(
                &target,
                &source,
                HotParams::new(5.0, 25.0, BoostableAttribute::Health),
                &sink,
            )
            .expect("vital attribute");
        sink.drain();

        engine.clear_all(&target);
        assert!(target.effects().is_empty());

        let health_before = target.vitals().health.current();
        engine.heartbeat(&target, 5.0, &sink);

        assert_eq!(target.vitals().health.current(), health_before);
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_direct_damage_applies_resistance_and_blame() {
        let engine = engine();
        let target = Combatant::new(CombatantRole::Creature { caster: false }, "target")
            .with_resistances(ResistanceProfile::new().with_resistance(DamageType::Slash, 0.5))
            .into_handle();
        let source = player("attacker");
        let sink = ChannelSink::new(16);

        let applied =
            engine.apply_direct_damage(&source, &target, 40.0, DamageType::Slash, 1.0, &sink);
        assert_eq!(applied, 20);
        assert_eq!(target.vitals().health.current(), 80);
        assert_eq!(target.threat().last_damager(), Some(source.id()));
    }

    #[test]
    fn test_direct_damage_kills_and_blames() {
        let engine = engine();
        let target = creature("target");
        let source = player("attacker");
        let sink = ChannelSink::new(16);

        let applied =
            engine.apply_direct_damage(&source, &target, 500.0, DamageType::Slash, 1.0, &sink);
        assert_eq!(applied, 100);
        assert!(target.is_dead());

        let messages = sink.drain();
        assert!(messages.iter().any(|(_, m)| matches!(
            m,
            CombatMessage::Died {
                killer: Some(k)
            } if *k == source.id()
        )));
    }

    proptest! {
        /// One heartbeat never removes more health than the entity started with,
        /// and the damage messages account for exactly the health removed.
        #[test]
        fn prop_lethal_clamp_invariant(
            ticks in proptest::collection::vec((1.0_f32..200.0, 1.0_f32..200.0), 1..8),
            health in 1u32..500,
        ) {
            let engine = StatusEffectEngine::new(TickConfig::default());
            let target = Combatant::new(CombatantRole::Creature { caster: false }, "target")
                .with_vitals(health, 100, 100)
                .into_handle();
            let source = Combatant::new(CombatantRole::Player, "attacker").into_handle();
            let sink = ChannelSink::new(256);

            for (tick, total) in ticks {
                engine
                    .apply_dot(
                        &target,
                        DotParams::new(tick, total, DamageType::Fire, CombatKind::Magic)
                            .with_source(source.clone()),
                        0.0,
                        &sink,
                    )
                    .expect("valid input");
            }
            sink.drain();

            let before = target.vitals().health.current();
            engine.heartbeat(&target, 5.0, &sink);
            let after = target.vitals().health.current();

            let reported: i32 = sink
                .drain()
                .iter()
                .filter_map(|(to, m)| match m {
                    CombatMessage::DamageTaken { amount, .. } if *to == target.id() => {
                        Some(*amount)
                    }
                    _ => None,
                })
                .sum();
            prop_assert!(reported as u32 <= before);
            prop_assert_eq!(before - after, reported as u32);
        }

        /// Decay is exact and zero-remaining records are pruned.
        #[test]
        fn prop_decay_invariant(
            tick in 1.0_f32..50.0,
            total in 1.0_f32..200.0,
        ) {
            let engine = StatusEffectEngine::new(TickConfig::default());
            let target = Combatant::new(CombatantRole::Creature { caster: false }, "target")
                .with_vitals(100_000, 100, 100)
                .into_handle();
            let source = Combatant::new(CombatantRole::Player, "attacker").into_handle();
            let sink = NullSink;

            engine
                .apply_dot(
                    &target,
                    DotParams::new(tick, total, DamageType::Cold, CombatKind::Magic)
                        .with_source(source),
                    0.0,
                    &sink,
                )
                .expect("valid input");

            engine.heartbeat(&target, 5.0, &sink);

            let effects = target.effects();
            let expected = (total - tick).max(0.0);
            if expected > 0.0 {
                prop_assert_eq!(effects.dots.len(), 1);
                prop_assert!((effects.dots[0].total_remaining - expected).abs() < 0.01);
            } else {
                prop_assert!(effects.dots.is_empty());
            }
        }
    }
}
