//! Combat engine facade.
//!
//! The world tick driver owns one engine per region worker and calls
//! [`CombatEngine::heartbeat`] and [`CombatEngine::combat_tick`] for every
//! entity it drives. Neither entry point panics or blocks; every failure is
//! absorbed locally.

use std::sync::Arc;

use crate::combatant::CombatantHandle;
use crate::config::TickConfig;
use crate::dispatcher::CombatDispatcher;
use crate::effects::{DotParams, EffectResult, HotParams, StatusEffectEngine};
use crate::events::{CombatMessage, NotificationSink};
use crate::hooks::EnchantmentHook;
use crate::resist::CombatKind;
use crate::scheduler::{ActionScheduler, CombatTask, ScheduledStep};
use crate::timing::AnimationTimings;
use crate::world::CombatWorld;

/// The combat simulation core: status effects, dispatcher, and deferred
/// actions behind the driver-facing surface.
#[derive(Debug)]
pub struct CombatEngine {
    config: TickConfig,
    effects: StatusEffectEngine,
    dispatcher: CombatDispatcher,
    scheduler: ActionScheduler,
}

impl CombatEngine {
    /// Creates an engine for the given cadence.
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        let timings = Arc::new(AnimationTimings::new());
        Self {
            config,
            effects: StatusEffectEngine::new(config),
            dispatcher: CombatDispatcher::new(config, timings),
            scheduler: ActionScheduler::new(),
        }
    }

    /// The engine's cadence configuration.
    #[must_use]
    pub fn config(&self) -> TickConfig {
        self.config
    }

    /// The status-effect engine.
    #[must_use]
    pub fn effects(&self) -> &StatusEffectEngine {
        &self.effects
    }

    /// The combat tick dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &CombatDispatcher {
        &self.dispatcher
    }

    /// Mutable access to the dispatcher (registration, stuns, emotes).
    pub fn dispatcher_mut(&mut self) -> &mut CombatDispatcher {
        &mut self.dispatcher
    }

    /// The deferred action scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &ActionScheduler {
        &self.scheduler
    }

    /// Mutable access to the scheduler.
    pub fn scheduler_mut(&mut self) -> &mut ActionScheduler {
        &mut self.scheduler
    }

    /// Slow-cadence upkeep for one entity: enchantment tick, status-effect
    /// aggregation, then downstream cleanup such as expiring equipped items.
    pub fn heartbeat<H: EnchantmentHook, S: NotificationSink>(
        &mut self,
        entity: &CombatantHandle,
        hook: &H,
        sink: &S,
        now: f64,
    ) {
        hook.on_heartbeat(entity, self.config.heartbeat_interval);
        self.effects.heartbeat(entity, now, sink);

        let expired = entity.equipment().expire_due(now);
        for weapon in expired {
            sink.deliver(
                entity.id(),
                CombatMessage::ItemExpired { weapon: weapon.id },
            );
        }
    }

    /// Fast-cadence tick for one entity: drains the entity's due deferred
    /// steps, then runs the dispatcher for autonomous roles.
    pub fn combat_tick<W: CombatWorld, S: NotificationSink>(
        &mut self,
        entity: &CombatantHandle,
        world: &mut W,
        sink: &S,
        now: f64,
    ) {
        for step in self.scheduler.drain_due(entity.id(), now) {
            self.run_task(step, world, sink, now);
        }
        if entity.role().is_autonomous() {
            self.dispatcher
                .tick(entity, world, &mut self.scheduler, sink, now);
        }
    }

    /// Flushes due steps across all entities, including ones no longer
    /// ticked. Steps of destroyed entities no-op against their dead handles.
    pub fn sweep_deferred<W: CombatWorld, S: NotificationSink>(
        &mut self,
        world: &mut W,
        sink: &S,
        now: f64,
    ) {
        for (_, step) in self.scheduler.drain_all_due(now) {
            self.run_task(step, world, sink, now);
        }
    }

    /// Applies a periodic damage effect (spell/attack subsystem entry point).
    pub fn apply_dot<S: NotificationSink>(
        &self,
        target: &CombatantHandle,
        params: DotParams,
        now: f64,
        sink: &S,
    ) -> EffectResult<bool> {
        self.effects.apply_dot(target, params, now, sink)
    }

    /// Applies a periodic heal effect (spell subsystem entry point).
    pub fn apply_hot<S: NotificationSink>(
        &self,
        target: &CombatantHandle,
        source: &CombatantHandle,
        params: HotParams,
        sink: &S,
    ) -> EffectResult<()> {
        self.effects.apply_hot(target, source, params, sink)
    }

    /// Removes every periodic effect from an entity.
    pub fn clear_all_effects(&self, target: &CombatantHandle) {
        self.effects.clear_all(target);
    }

    /// Executes one drained deferred step.
    fn run_task<W: CombatWorld, S: NotificationSink>(
        &mut self,
        step: ScheduledStep,
        world: &mut W,
        sink: &S,
        now: f64,
    ) {
        if step.token.is_cancelled() {
            return;
        }
        match step.task {
            CombatTask::LandMelee {
                attacker,
                target,
                damage,
                damage_type,
            } => {
                let (Some(attacker), Some(target)) = (attacker.upgrade(), target.upgrade()) else {
                    return;
                };
                if attacker.is_dead() {
                    return;
                }
                self.effects
                    .apply_direct_damage(&attacker, &target, damage, damage_type, now, sink);
            }
            CombatTask::LaunchProjectile {
                attacker,
                target,
                damage,
                damage_type,
            } => {
                let (Some(attacker), Some(target)) = (attacker.upgrade(), target.upgrade()) else {
                    return;
                };
                if attacker.is_dead() {
                    return;
                }
                if world.projectile_blocked(attacker.id(), target.id()) {
                    self.dispatcher.note_projectile_failure(attacker.id());
                } else {
                    self.effects
                        .apply_direct_damage(&attacker, &target, damage, damage_type, now, sink);
                }
            }
            CombatTask::LandSpell {
                caster,
                target,
                spell,
            } => {
                let (Some(caster), Some(target)) = (caster.upgrade(), target.upgrade()) else {
                    return;
                };
                if caster.is_dead() {
                    return;
                }
                if let Some(dot) = spell.dot {
                    let params = DotParams::new(
                        dot.tick_amount,
                        dot.total_amount,
                        spell.damage_type,
                        CombatKind::Magic,
                    )
                    .with_source(caster.clone());
                    let _ = self.effects.apply_dot(&target, params, now, sink);
                } else {
                    self.effects.apply_direct_damage(
                        &caster,
                        &target,
                        spell.damage,
                        spell.damage_type,
                        now,
                        sink,
                    );
                }
            }
            CombatTask::Reload { attacker } => {
                // Purely a timing step; the reload animation has elapsed
                let _ = attacker.upgrade();
            }
            CombatTask::EndAttack { entity } => {
                self.dispatcher.end_attack(entity);
            }
            CombatTask::EmoteStep { entity, motion } => {
                sink.deliver(entity, CombatMessage::EmoteVisual { entity, motion });
            }
        }
    }
}
