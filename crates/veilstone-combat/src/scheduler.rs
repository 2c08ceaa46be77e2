//! Deferred action scheduling.
//!
//! Animation-length delays are represented as data, never by suspending a
//! thread: a [`TaskChain`] is an ordered sequence of relative delays paired
//! with explicit [`CombatTask`] values. Once enqueued, a chain cannot be
//! cancelled by entity identity; aborting a behavior is done through the
//! chain's [`ChainToken`], which every step re-checks at resumption, and
//! steps whose entities have been destroyed no-op against the dead weak
//! handle.

use ahash::AHashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::attack::CombatSpell;
use crate::combatant::CombatantRef;
use crate::resist::DamageType;
use veilstone_common::EntityId;

/// A unit of deferred work, carrying only the data it needs.
#[derive(Debug, Clone)]
pub enum CombatTask {
    /// Land melee damage at the swing's contact frame
    LandMelee {
        /// Attacking entity
        attacker: CombatantRef,
        /// Target entity
        target: CombatantRef,
        /// Resolved damage amount
        damage: f32,
        /// Damage type dealt
        damage_type: DamageType,
    },
    /// Release a projectile at the launch frame
    LaunchProjectile {
        /// Attacking entity
        attacker: CombatantRef,
        /// Target entity
        target: CombatantRef,
        /// Resolved damage amount
        damage: f32,
        /// Damage type dealt
        damage_type: DamageType,
    },
    /// Complete a spell cast
    LandSpell {
        /// Casting entity
        caster: CombatantRef,
        /// Target entity
        target: CombatantRef,
        /// Resolved spell payload
        spell: CombatSpell,
    },
    /// Play the reload animation after a missile launch
    Reload {
        /// Attacking entity
        attacker: CombatantRef,
    },
    /// Close out the attack cycle and free the dispatcher for a new decision
    EndAttack {
        /// Attacking entity
        entity: EntityId,
    },
    /// One motion of a scripted emote sequence
    EmoteStep {
        /// Emoting entity
        entity: EntityId,
        /// Motion name
        motion: String,
    },
}

/// Cancellation token shared by every step of one chain.
///
/// Checked at each resumption; a cancelled step is still drained but must
/// no-op.
#[derive(Debug, Clone, Default)]
pub struct ChainToken(Arc<AtomicBool>);

impl ChainToken {
    /// Creates a live token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the chain. Steps already enqueued remain queued but no-op.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the chain has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// An ordered sequence of delay + task steps.
#[derive(Debug, Clone, Default)]
pub struct TaskChain {
    steps: Vec<(f64, CombatTask)>,
    token: ChainToken,
}

impl TaskChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step firing `delay` seconds after the previous step.
    #[must_use]
    pub fn then(mut self, delay: f64, task: CombatTask) -> Self {
        self.steps.push((delay.max(0.0), task));
        self
    }

    /// The chain's cancellation token.
    #[must_use]
    pub fn token(&self) -> ChainToken {
        self.token.clone()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A step whose fire time has been resolved against the clock.
#[derive(Debug, Clone)]
pub struct ScheduledStep {
    /// Absolute simulation time at which the step becomes due
    pub fire_at: f64,
    /// The work to run
    pub task: CombatTask,
    /// The owning chain's token
    pub token: ChainToken,
}

/// Per-entity ordered queues of deferred steps.
///
/// A given entity's queue is drained only by the thread that owns that
/// entity's tick, in FIFO order, never concurrently with the entity's own
/// heartbeat or dispatcher pass.
#[derive(Debug, Default)]
pub struct ActionScheduler {
    queues: AHashMap<EntityId, VecDeque<ScheduledStep>>,
}

impl ActionScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a chain for an entity, resolving relative delays against
    /// `now`. Ownership of the chain transfers to the scheduler.
    pub fn enqueue(&mut self, entity: EntityId, now: f64, chain: TaskChain) {
        let queue = self.queues.entry(entity).or_default();
        let mut fire_at = now;
        for (delay, task) in chain.steps {
            fire_at += delay;
            queue.push_back(ScheduledStep {
                fire_at,
                task,
                token: chain.token.clone(),
            });
        }
    }

    /// Removes and returns all due steps for one entity, preserving
    /// enqueue order among them.
    pub fn drain_due(&mut self, entity: EntityId, now: f64) -> Vec<ScheduledStep> {
        let Some(queue) = self.queues.get_mut(&entity) else {
            return Vec::new();
        };
        let mut due = Vec::new();
        let mut i = 0;
        while i < queue.len() {
            if queue[i].fire_at <= now {
                if let Some(step) = queue.remove(i) {
                    due.push(step);
                }
            } else {
                i += 1;
            }
        }
        if queue.is_empty() {
            self.queues.remove(&entity);
        }
        due
    }

    /// Removes and returns due steps across every entity.
    ///
    /// Used to sweep chains whose owning entities are no longer ticked; the
    /// executed steps no-op against their dead handles.
    pub fn drain_all_due(&mut self, now: f64) -> Vec<(EntityId, ScheduledStep)> {
        let entities: Vec<EntityId> = self.queues.keys().copied().collect();
        let mut due = Vec::new();
        for entity in entities {
            for step in self.drain_due(entity, now) {
                due.push((entity, step));
            }
        }
        due
    }

    /// Number of steps pending for an entity.
    #[must_use]
    pub fn pending(&self, entity: EntityId) -> usize {
        self.queues.get(&entity).map_or(0, VecDeque::len)
    }
}
