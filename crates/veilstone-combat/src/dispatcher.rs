//! Combat tick dispatcher for autonomous combatants.
//!
//! Each combat tick evaluates a strict priority ladder; the first matching
//! branch acts and returns without evaluating the rest. Pending sub-behaviors
//! (emote, wander, route) are owned solely by this dispatcher, and mutual
//! exclusion between them comes from the branch ordering rather than locking:
//! a given entity's tick always runs on the thread that owns its region.

use ahash::AHashMap;
use std::sync::Weak;
use tracing::debug;

use crate::attack::{AttackHeight, AttackMode, AttackResolver, CombatSpell};
use crate::combatant::{CombatantHandle, CombatantRef, WeaponClass};
use crate::config::TickConfig;
use crate::events::{CombatMessage, NotificationSink};
use crate::position::CombatPosition;
use crate::rng::CombatRng;
use crate::scheduler::{ActionScheduler, CombatTask, TaskChain};
use crate::timing::AnimationTimings;
use crate::world::{CombatWorld, MoveParams};
use veilstone_common::EntityId;

/// Seconds between stun visuals while stunned.
const STUN_VISUAL_INTERVAL: f64 = 2.0;
/// Consecutive movement failures before the move is abandoned.
const MOVE_FAILURE_LIMIT: u32 = 3;
/// Projectile-environment collisions before switching to melee.
const PROJECTILE_FAILURE_LIMIT: u32 = 3;
/// Iterations of the visibility-gated missile range reduction.
const MISSILE_FALLBACK_RETRIES: u32 = 10;
/// Range shrink per missile fallback iteration.
const MISSILE_RANGE_STEP: f32 = 0.75;
/// Distance inside which a stuck missile attacker switches to melee.
const SHORT_RANGE: f32 = 5.0;
/// Facing tolerance in radians.
const FACING_TOLERANCE: f32 = 0.4;
/// Distance from home at which the return-home sub-state completes.
const HOME_EPSILON: f32 = 1.0;
/// Distance at which a route waypoint counts as reached.
const WAYPOINT_EPSILON: f32 = 1.0;
/// Seconds the combat-stance activation animation plays.
const ACTIVATION_STANCE_TIME: f64 = 1.0;
/// Seconds between scripted emote motions.
const EMOTE_STEP_INTERVAL: f64 = 1.5;
/// Radius around home used for wander targets.
const WANDER_RADIUS: f32 = 8.0;
/// Reach used when no melee weapon is wielded.
const MELEE_FALLBACK_REACH: f32 = 1.5;
/// Chance an eligible caster selects a magic attack for the cycle.
const MAGIC_PREFERENCE: f32 = 0.4;

/// Dispatcher-owned per-entity combat state.
#[derive(Debug)]
pub struct AiState {
    /// Whether the entity is awake; dormant entities only run awareness
    pub awake: bool,
    /// Death latch mirrored from the combatant
    pub dead: bool,
    /// Stun expiry; in the future means stunned
    pub stun_expires_at: f64,
    last_stun_visual_at: f64,
    /// Current attack target
    pub target: Option<CombatantRef>,
    /// Attack type selected for the current cycle; cleared on cycle end
    pub mode: Option<AttackMode>,
    /// Attack height selected for the current cycle
    pub attack_height: AttackHeight,
    /// Maximum effective range of the selected attack type
    pub max_range: f32,
    /// Earliest time the next attack may begin
    pub next_attack_at: f64,
    /// Earliest time the next movement command may be issued
    pub next_move_at: f64,
    /// Earliest time the next spell may be cast
    pub next_cast_ready: f64,
    /// An attack chain is in flight
    pub is_attacking: bool,
    /// A movement operation is in flight
    pub moving: bool,
    /// Consecutive movement failures
    pub move_failures: u32,
    /// Consecutive projectile-environment collisions
    pub projectile_failures: u32,
    /// Combat stance has been engaged since waking
    pub first_activation_done: bool,
    /// Time the activation animation finishes
    pub activation_ready_at: f64,
    /// Queued scripted emote motions
    pub pending_emote: Option<Vec<String>>,
    /// Busy until this time while an emote sequence plays
    pub emote_busy_until: f64,
    /// A wander is queued
    pub pending_wander: bool,
    /// Queued route waypoints
    pub pending_route: Option<Vec<CombatPosition>>,
    /// Next waypoint index of the active route
    pub route_index: usize,
    /// Returning to the spawn point after losing an unreachable target
    pub returning_home: bool,
    /// Spawn position to return to
    pub home: CombatPosition,
    /// Spells available to caster roles
    pub spellbook: Vec<CombatSpell>,
}

impl AiState {
    /// Creates a dormant state anchored at `home`.
    #[must_use]
    pub fn new(home: CombatPosition) -> Self {
        Self {
            awake: false,
            dead: false,
            stun_expires_at: 0.0,
            last_stun_visual_at: f64::NEG_INFINITY,
            target: None,
            mode: None,
            attack_height: AttackHeight::Medium,
            max_range: MELEE_FALLBACK_REACH,
            next_attack_at: 0.0,
            next_move_at: 0.0,
            next_cast_ready: 0.0,
            is_attacking: false,
            moving: false,
            move_failures: 0,
            projectile_failures: 0,
            first_activation_done: false,
            activation_ready_at: 0.0,
            pending_emote: None,
            emote_busy_until: 0.0,
            pending_wander: false,
            pending_route: None,
            route_index: 0,
            returning_home: false,
            home,
            spellbook: Vec::new(),
        }
    }

    /// Sets the spellbook (builder pattern).
    #[must_use]
    pub fn with_spellbook(mut self, spells: Vec<CombatSpell>) -> Self {
        self.spellbook = spells;
        self
    }

    /// Upgrades the current target, if it is still alive in the world.
    #[must_use]
    pub fn target_handle(&self) -> Option<CombatantHandle> {
        self.target.as_ref().and_then(Weak::upgrade)
    }
}

/// The per-region combat tick dispatcher.
///
/// Owns the [`AiState`] of every autonomous combatant it drives, plus a
/// roster of weak handles for target resolution.
#[derive(Debug)]
pub struct CombatDispatcher {
    ai: AHashMap<EntityId, AiState>,
    roster: AHashMap<EntityId, CombatantRef>,
    rng: CombatRng,
    config: TickConfig,
    resolver: AttackResolver,
}

impl CombatDispatcher {
    /// Creates a dispatcher over a shared timing table.
    #[must_use]
    pub fn new(config: TickConfig, timings: std::sync::Arc<AnimationTimings>) -> Self {
        Self {
            ai: AHashMap::new(),
            roster: AHashMap::new(),
            rng: CombatRng::default(),
            config,
            resolver: AttackResolver::new(timings),
        }
    }

    /// Replaces the RNG seed (deterministic tests and replay).
    pub fn reseed(&mut self, seed: u64) {
        self.rng = CombatRng::new(seed);
    }

    /// Registers an autonomous combatant with a fresh dormant state.
    pub fn register(&mut self, entity: &CombatantHandle, home: CombatPosition) {
        self.register_with(entity, AiState::new(home));
    }

    /// Registers an autonomous combatant with a prepared state.
    pub fn register_with(&mut self, entity: &CombatantHandle, state: AiState) {
        self.roster
            .insert(entity.id(), CombatantHandle::downgrade(entity));
        self.ai.insert(entity.id(), state);
    }

    /// Adds a non-autonomous combatant (a player) to the target roster.
    pub fn track(&mut self, entity: &CombatantHandle) {
        self.roster
            .insert(entity.id(), CombatantHandle::downgrade(entity));
    }

    /// Removes an entity's state and roster entry.
    pub fn remove(&mut self, id: EntityId) {
        self.ai.remove(&id);
        self.roster.remove(&id);
    }

    /// The state of a driven entity.
    #[must_use]
    pub fn ai(&self, id: EntityId) -> Option<&AiState> {
        self.ai.get(&id)
    }

    /// Mutable state of a driven entity.
    pub fn ai_mut(&mut self, id: EntityId) -> Option<&mut AiState> {
        self.ai.get_mut(&id)
    }

    /// Wakes an entity, optionally aiming it at a target.
    pub fn wake(&mut self, id: EntityId, target: Option<&CombatantHandle>) {
        if let Some(handle) = target {
            self.roster
                .insert(handle.id(), CombatantHandle::downgrade(handle));
        }
        if let Some(state) = self.ai.get_mut(&id) {
            state.awake = true;
            if let Some(handle) = target {
                state.target = Some(CombatantHandle::downgrade(handle));
            }
        }
    }

    /// Stuns an entity until the given time.
    pub fn stun(&mut self, id: EntityId, until: f64) {
        if let Some(state) = self.ai.get_mut(&id) {
            state.stun_expires_at = until;
        }
    }

    /// Queues a scripted emote sequence.
    pub fn queue_emote(&mut self, id: EntityId, motions: Vec<String>) {
        if let Some(state) = self.ai.get_mut(&id) {
            state.pending_emote = Some(motions);
        }
    }

    /// Queues a wander around home.
    pub fn queue_wander(&mut self, id: EntityId) {
        if let Some(state) = self.ai.get_mut(&id) {
            state.pending_wander = true;
        }
    }

    /// Queues a route of waypoints.
    pub fn queue_route(&mut self, id: EntityId, waypoints: Vec<CombatPosition>) {
        if let Some(state) = self.ai.get_mut(&id) {
            state.pending_route = Some(waypoints);
            state.route_index = 0;
        }
    }

    /// Closes out an attack cycle, freeing the next decision.
    pub fn end_attack(&mut self, id: EntityId) {
        if let Some(state) = self.ai.get_mut(&id) {
            state.is_attacking = false;
            state.mode = None;
        }
    }

    /// Records a projectile-environment collision; repeated collisions force
    /// a switch to melee.
    pub fn note_projectile_failure(&mut self, id: EntityId) {
        if let Some(state) = self.ai.get_mut(&id) {
            state.projectile_failures += 1;
            if state.projectile_failures >= PROJECTILE_FAILURE_LIMIT {
                debug!(
                    entity = id.raw(),
                    "repeated projectile collisions; switching to melee"
                );
                state.mode = Some(AttackMode::Melee);
                state.max_range = MELEE_FALLBACK_REACH;
                state.projectile_failures = 0;
            }
        }
    }

    /// Evaluates one combat tick for an autonomous combatant.
    #[allow(clippy::too_many_lines)]
    pub fn tick<W: CombatWorld, S: NotificationSink>(
        &mut self,
        monster: &CombatantHandle,
        world: &mut W,
        scheduler: &mut ActionScheduler,
        sink: &S,
        now: f64,
    ) {
        let id = monster.id();
        let Self {
            ai,
            roster,
            rng,
            config,
            resolver,
        } = self;
        let Some(state) = ai.get_mut(&id) else {
            return;
        };

        // 1. Stunned
        if state.stun_expires_at > now {
            if now - state.last_stun_visual_at >= STUN_VISUAL_INTERVAL {
                state.last_stun_visual_at = now;
                sink.deliver(id, CombatMessage::StunVisual { entity: id });
            }
            return;
        }
        state.stun_expires_at = 0.0;

        // 2. Dormant: passive awareness only
        if !state.awake {
            if let Some(spotted) = world.spot_hostile(id) {
                if let Some(handle) = roster.get(&spotted).and_then(Weak::upgrade) {
                    if !handle.is_dead() {
                        debug!(entity = id.raw(), spotted = spotted.raw(), "woke on hostile");
                        state.target = Some(CombatantHandle::downgrade(&handle));
                        state.awake = true;
                    }
                }
            }
            return;
        }

        // 3. In-flight movement
        if state.moving {
            if world.is_moving(id) {
                if state.move_failures > MOVE_FAILURE_LIMIT {
                    state.moving = false;
                    state.move_failures = 0;
                } else {
                    return;
                }
            } else {
                state.moving = false;
            }
        }

        // 4. Dead
        if state.dead || monster.is_dead() {
            state.dead = true;
            return;
        }

        // 5. Busy with a scripted emote sequence
        if state.emote_busy_until > now {
            return;
        }

        // 6. Target acquisition, with the return-home sub-state
        if state.returning_home {
            if monster.position().distance_to(&state.home) <= HOME_EPSILON {
                state.returning_home = false;
                state.awake = false;
                state.target = None;
            } else if now >= state.next_move_at {
                if world.move_to_position(id, state.home, MoveParams::default()) {
                    state.moving = true;
                }
                state.next_move_at = now + config.combat_tick_interval;
            }
            return;
        }

        let live_target = state.target_handle().filter(|t| !t.is_dead());
        let target = match live_target {
            Some(t) => t,
            None => {
                let had_target = state.target.is_some();
                state.target = None;
                let replacement = monster
                    .threat()
                    .most_recent_attacker()
                    .and_then(|e| e.handle.upgrade())
                    .filter(|t| !t.is_dead());
                match replacement {
                    Some(found) => {
                        state.target = Some(CombatantHandle::downgrade(&found));
                        if had_target {
                            // 8. Stale or dead target: do not act this tick
                            return;
                        }
                        found
                    }
                    None => {
                        // 7. No target: back to sleep
                        debug!(entity = id.raw(), "no target; going dormant");
                        state.awake = false;
                        return;
                    }
                }
            }
        };

        if !world.is_reachable(id, target.id()) {
            debug!(entity = id.raw(), "target unreachable; returning home");
            state.returning_home = true;
            state.target = None;
            return;
        }

        // 9. First activation: engage combat stance before any attack logic
        if !state.first_activation_done {
            state.first_activation_done = true;
            state.activation_ready_at = now + ACTIVATION_STANCE_TIME;
            return;
        }
        if now < state.activation_ready_at || world.is_animating(id) {
            return;
        }

        // 10. Weapon availability for the selected attack type
        if state.mode == Some(AttackMode::Missile)
            && !monster.equipment().has_wielded(WeaponClass::Missile)
        {
            let re_equipped = monster.equipment().re_equip(WeaponClass::Missile);
            debug!(
                entity = id.raw(),
                re_equipped, "missile weapon missing; resetting attack selection"
            );
            state.mode = None;
            return;
        }

        // 11. Attack-type selection, once per attack cycle
        if state.mode.is_none() {
            let (mode, range) = Self::select_attack(monster, state, world, rng, &target, now);
            state.mode = Some(mode);
            state.max_range = range;
            state.attack_height = *rng
                .choose(&AttackHeight::all())
                .unwrap_or(&AttackHeight::Medium);
        }

        // 12. Distraction arbitration
        if world.is_directly_visible(id, target.id()) {
            state.pending_emote = None;
            state.pending_wander = false;
            state.pending_route = None;
            state.route_index = 0;
        } else {
            if let Some(motions) = state.pending_emote.take() {
                let count = motions.len() as f64;
                let mut chain = TaskChain::new();
                for motion in motions {
                    chain = chain.then(
                        EMOTE_STEP_INTERVAL,
                        CombatTask::EmoteStep { entity: id, motion },
                    );
                }
                state.emote_busy_until = now + count * EMOTE_STEP_INTERVAL;
                scheduler.enqueue(id, now, chain);
                return;
            }
            if state.pending_wander {
                if now >= state.next_move_at {
                    let angle = rng.range(0.0, std::f32::consts::TAU);
                    let dist = rng.range(0.0, WANDER_RADIUS);
                    let spot = CombatPosition::new(
                        state.home.x + angle.cos() * dist,
                        state.home.y + angle.sin() * dist,
                    );
                    if world.move_to_position(id, spot, MoveParams { run: false, stop_distance: 0.5 })
                    {
                        state.moving = true;
                        state.pending_wander = false;
                    }
                    state.next_move_at = now + config.combat_tick_interval;
                }
                return;
            }
            if let Some(route) = state.pending_route.clone() {
                if state.route_index >= route.len() {
                    state.pending_route = None;
                    state.route_index = 0;
                } else {
                    if now >= state.next_move_at {
                        let waypoint = route[state.route_index];
                        if monster.position().distance_to(&waypoint) <= WAYPOINT_EPSILON {
                            state.route_index += 1;
                        } else if world.move_to_position(id, waypoint, MoveParams::default()) {
                            state.moving = true;
                        }
                        state.next_move_at = now + config.combat_tick_interval;
                    }
                    return;
                }
            }
        }

        // 13. Range and facing
        let my_position = monster.position();
        let target_position = target.position();
        let distance = my_position.distance_to(&target_position);
        let self_target = target.id() == id;
        let facing = self_target || my_position.is_facing(&target_position, FACING_TOLERANCE);
        if distance > state.max_range || !facing {
            if now >= state.next_move_at {
                if state.mode == Some(AttackMode::Missile)
                    && state.move_failures >= MOVE_FAILURE_LIMIT
                    && distance <= SHORT_RANGE
                {
                    debug!(
                        entity = id.raw(),
                        "movement stalled inside short range; switching to melee"
                    );
                    state.mode = Some(AttackMode::Melee);
                    state.max_range = Self::melee_reach(monster);
                    state.move_failures = 0;
                    return;
                }

                if !facing && distance <= state.max_range {
                    world.turn_to(id, target.id());
                } else {
                    let params = MoveParams {
                        run: true,
                        stop_distance: (state.max_range * 0.8).max(0.5),
                    };
                    if world.move_to(id, target.id(), params) {
                        state.moving = true;
                        state.move_failures = 0;
                    } else {
                        state.move_failures += 1;
                        if state.move_failures > MOVE_FAILURE_LIMIT {
                            // Movement is impossible; drift instead of spinning
                            state.pending_wander = true;
                            state.move_failures = 0;
                        }
                    }
                }
                state.next_move_at = now + config.combat_tick_interval;
            }
            return;
        }

        // 14. Attack
        if state.is_attacking || now < state.next_attack_at {
            return;
        }
        if let Err(err) = resolver.execute(monster, &target, state, world, scheduler, now) {
            debug!(entity = id.raw(), error = %err, "attack aborted this cycle");
            state.is_attacking = false;
            state.mode = None;
        }
    }

    /// Chooses the attack type and its maximum effective range.
    fn select_attack<W: CombatWorld>(
        monster: &CombatantHandle,
        state: &AiState,
        world: &W,
        rng: &mut CombatRng,
        target: &CombatantHandle,
        now: f64,
    ) -> (AttackMode, f32) {
        // Casters weigh a spell first when one is ready
        if monster.role().can_cast()
            && !state.spellbook.is_empty()
            && now >= state.next_cast_ready
            && rng.chance(MAGIC_PREFERENCE)
        {
            let range = state
                .spellbook
                .iter()
                .map(|s| s.range)
                .fold(0.0_f32, f32::max);
            return (AttackMode::Magic, range.max(1.0));
        }

        if monster.equipment().has_wielded(WeaponClass::Missile) {
            let full_range = monster
                .equipment()
                .wielded()
                .map_or(SHORT_RANGE, |w| w.reach);
            let mut range = full_range;
            for _ in 0..MISSILE_FALLBACK_RETRIES {
                if world.has_line_of_sight(monster.id(), target.id()) {
                    return (AttackMode::Missile, range);
                }
                range *= MISSILE_RANGE_STEP;
            }
            // Visibility never cleared; fall back to melee
            return (AttackMode::Melee, Self::melee_reach(monster));
        }

        (AttackMode::Melee, Self::melee_reach(monster))
    }

    fn melee_reach(monster: &CombatantHandle) -> f32 {
        monster
            .equipment()
            .wielded()
            .filter(|w| w.class == WeaponClass::Melee)
            .map_or(MELEE_FALLBACK_REACH, |w| w.reach)
    }
}
