//! Position data for combatants: distance, headings, facing checks.

use serde::{Deserialize, Serialize};

/// A combatant's position and facing in the world plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatPosition {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
    /// Direction facing (radians)
    pub facing: f32,
}

impl CombatPosition {
    /// Creates a new position facing east.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, facing: 0.0 }
    }

    /// Sets the facing direction.
    #[must_use]
    pub const fn with_facing(mut self, facing: f32) -> Self {
        self.facing = facing;
        self
    }

    /// Calculates distance to another position.
    #[must_use]
    pub fn distance_to(&self, other: &CombatPosition) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Calculates the heading toward another position, in radians.
    ///
    /// A degenerate direction vector (coincident positions) resolves to 0.0
    /// rather than propagating NaN.
    #[must_use]
    pub fn heading_to(&self, other: &CombatPosition) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        if dx * dx + dy * dy < 1e-8 {
            return 0.0;
        }
        dy.atan2(dx)
    }

    /// Returns whether this position faces `other` within `tolerance` radians.
    #[must_use]
    pub fn is_facing(&self, other: &CombatPosition, tolerance: f32) -> bool {
        let heading = self.heading_to(other);
        let diff = (heading - self.facing).abs();
        let wrapped = if diff > std::f32::consts::PI {
            std::f32::consts::TAU - diff
        } else {
            diff
        };
        wrapped <= tolerance
    }

    /// Returns a normalized direction vector toward another position.
    #[must_use]
    pub fn direction_to(&self, other: &CombatPosition) -> (f32, f32) {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < 0.0001 {
            (0.0, 0.0)
        } else {
            (dx / dist, dy / dist)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = CombatPosition::new(0.0, 0.0);
        let b = CombatPosition::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_heading() {
        let a = CombatPosition::new(0.0, 0.0);
        let b = CombatPosition::new(0.0, 1.0);
        assert!((a.heading_to(&b) - std::f32::consts::FRAC_PI_2).abs() < 0.001);
    }

    #[test]
    fn test_degenerate_heading_is_zero() {
        let a = CombatPosition::new(2.0, 2.0);
        let b = CombatPosition::new(2.0, 2.0);
        let heading = a.heading_to(&b);
        assert_eq!(heading, 0.0);
        assert!(!heading.is_nan());
    }

    #[test]
    fn test_is_facing() {
        let a = CombatPosition::new(0.0, 0.0).with_facing(0.0);
        let east = CombatPosition::new(5.0, 0.0);
        let north = CombatPosition::new(0.0, 5.0);

        assert!(a.is_facing(&east, 0.3));
        assert!(!a.is_facing(&north, 0.3));
    }

    #[test]
    fn test_is_facing_wraps_around() {
        let a = CombatPosition::new(0.0, 0.0).with_facing(std::f32::consts::PI - 0.05);
        let west_slightly_south = CombatPosition::new(-5.0, -0.1);
        assert!(a.is_facing(&west_slightly_south, 0.3));
    }

    #[test]
    fn test_direction_normalized() {
        let a = CombatPosition::new(0.0, 0.0);
        let b = CombatPosition::new(10.0, 0.0);
        let dir = a.direction_to(&b);
        assert!((dir.0 - 1.0).abs() < 0.001);
        assert!(dir.1.abs() < 0.001);
    }
}
