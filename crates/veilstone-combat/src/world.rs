//! World interface consumed by the dispatcher and attack resolution.
//!
//! Pathfinding, physics, and visibility live outside this core; the
//! dispatcher talks to them through this narrow trait and never blocks on
//! them.

use crate::position::CombatPosition;
use veilstone_common::EntityId;

/// Parameters for a movement command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveParams {
    /// Run rather than walk
    pub run: bool,
    /// Distance at which the mover should stop short of the target
    pub stop_distance: f32,
}

impl Default for MoveParams {
    fn default() -> Self {
        Self {
            run: true,
            stop_distance: 1.0,
        }
    }
}

/// Movement, visibility, and awareness queries against the world.
pub trait CombatWorld {
    /// Checks line of sight between two entities.
    fn has_line_of_sight(&self, from: EntityId, to: EntityId) -> bool;
    /// Checks whether a closed door blocks the path between two entities.
    fn is_door_blocked(&self, from: EntityId, to: EntityId) -> bool;
    /// Checks direct, unobstructed visibility (distraction arbitration).
    fn is_directly_visible(&self, from: EntityId, to: EntityId) -> bool;
    /// Checks whether a path to the target exists at all.
    fn is_reachable(&self, from: EntityId, to: EntityId) -> bool;
    /// Checks whether a projectile from `from` to `to` would strike the
    /// environment.
    fn projectile_blocked(&self, from: EntityId, to: EntityId) -> bool;
    /// Passive faction-awareness sweep; returns a hostile the entity would
    /// notice while dormant.
    fn spot_hostile(&self, of: EntityId) -> Option<EntityId>;
    /// Starts movement toward a target entity. Returns false when movement
    /// is impossible.
    fn move_to(&mut self, entity: EntityId, target: EntityId, params: MoveParams) -> bool;
    /// Starts movement toward a position. Returns false when movement is
    /// impossible.
    fn move_to_position(
        &mut self,
        entity: EntityId,
        position: CombatPosition,
        params: MoveParams,
    ) -> bool;
    /// Starts turning toward a target entity.
    fn turn_to(&mut self, entity: EntityId, target: EntityId) -> bool;
    /// Whether the entity is executing a movement operation.
    fn is_moving(&self, entity: EntityId) -> bool;
    /// Whether the entity is playing a blocking animation.
    fn is_animating(&self, entity: EntityId) -> bool;
}

/// Mock world for testing dispatcher and attack behavior.
#[derive(Debug)]
pub struct MockWorld {
    los: bool,
    door_blocked: bool,
    visible: bool,
    reachable: bool,
    projectile_hits_environment: bool,
    movement_allowed: bool,
    hostile: Option<EntityId>,
    moving: std::collections::HashSet<u64>,
    animating: std::collections::HashSet<u64>,
    /// Recorded `move_to` commands
    pub move_commands: Vec<(EntityId, EntityId)>,
    /// Recorded `move_to_position` commands
    pub position_commands: Vec<(EntityId, CombatPosition)>,
    /// Recorded `turn_to` commands
    pub turn_commands: Vec<(EntityId, EntityId)>,
}

impl Default for MockWorld {
    fn default() -> Self {
        Self {
            los: true,
            door_blocked: false,
            visible: true,
            reachable: true,
            projectile_hits_environment: false,
            movement_allowed: true,
            hostile: None,
            moving: std::collections::HashSet::new(),
            animating: std::collections::HashSet::new(),
            move_commands: Vec::new(),
            position_commands: Vec::new(),
            turn_commands: Vec::new(),
        }
    }
}

impl MockWorld {
    /// Creates a permissive mock world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets line-of-sight results.
    #[must_use]
    pub fn with_los(mut self, los: bool) -> Self {
        self.los = los;
        self
    }

    /// Sets door blocking.
    #[must_use]
    pub fn with_door_blocked(mut self, blocked: bool) -> Self {
        self.door_blocked = blocked;
        self
    }

    /// Sets direct visibility.
    #[must_use]
    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Sets reachability.
    #[must_use]
    pub fn with_reachable(mut self, reachable: bool) -> Self {
        self.reachable = reachable;
        self
    }

    /// Sets whether projectiles strike the environment.
    #[must_use]
    pub fn with_projectile_blocked(mut self, blocked: bool) -> Self {
        self.projectile_hits_environment = blocked;
        self
    }

    /// Sets whether movement commands succeed.
    #[must_use]
    pub fn with_movement_allowed(mut self, allowed: bool) -> Self {
        self.movement_allowed = allowed;
        self
    }

    /// Sets the hostile spotted by awareness sweeps.
    #[must_use]
    pub fn with_hostile(mut self, hostile: EntityId) -> Self {
        self.hostile = Some(hostile);
        self
    }

    /// Marks an entity as currently moving.
    pub fn set_moving(&mut self, entity: EntityId, moving: bool) {
        if moving {
            self.moving.insert(entity.raw());
        } else {
            self.moving.remove(&entity.raw());
        }
    }

    /// Marks an entity as currently animating.
    pub fn set_animating(&mut self, entity: EntityId, animating: bool) {
        if animating {
            self.animating.insert(entity.raw());
        } else {
            self.animating.remove(&entity.raw());
        }
    }
}

impl CombatWorld for MockWorld {
    fn has_line_of_sight(&self, _from: EntityId, _to: EntityId) -> bool {
        self.los
    }

    fn is_door_blocked(&self, _from: EntityId, _to: EntityId) -> bool {
        self.door_blocked
    }

    fn is_directly_visible(&self, _from: EntityId, _to: EntityId) -> bool {
        self.visible
    }

    fn is_reachable(&self, _from: EntityId, _to: EntityId) -> bool {
        self.reachable
    }

    fn projectile_blocked(&self, _from: EntityId, _to: EntityId) -> bool {
        self.projectile_hits_environment
    }

    fn spot_hostile(&self, _of: EntityId) -> Option<EntityId> {
        self.hostile
    }

    fn move_to(&mut self, entity: EntityId, target: EntityId, _params: MoveParams) -> bool {
        self.move_commands.push((entity, target));
        if self.movement_allowed {
            self.moving.insert(entity.raw());
        }
        self.movement_allowed
    }

    fn move_to_position(
        &mut self,
        entity: EntityId,
        position: CombatPosition,
        _params: MoveParams,
    ) -> bool {
        self.position_commands.push((entity, position));
        if self.movement_allowed {
            self.moving.insert(entity.raw());
        }
        self.movement_allowed
    }

    fn turn_to(&mut self, entity: EntityId, target: EntityId) -> bool {
        self.turn_commands.push((entity, target));
        true
    }

    fn is_moving(&self, entity: EntityId) -> bool {
        self.moving.contains(&entity.raw())
    }

    fn is_animating(&self, entity: EntityId) -> bool {
        self.animating.contains(&entity.raw())
    }
}
