//! Tick cadence configuration.

use serde::{Deserialize, Serialize};
use veilstone_common::{CoreError, CoreResult};

/// Base heartbeat interval periodic effects are authored against, in seconds.
pub const NORMALIZATION_BASE: f64 = 5.0;

/// Cadence configuration for the simulation driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickConfig {
    /// Seconds between heartbeats (status effects, upkeep).
    pub heartbeat_interval: f64,
    /// Seconds between combat ticks (autonomous decision-making).
    pub combat_tick_interval: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: NORMALIZATION_BASE,
            combat_tick_interval: 0.5,
        }
    }
}

impl TickConfig {
    /// Creates a validated configuration.
    pub fn new(heartbeat_interval: f64, combat_tick_interval: f64) -> CoreResult<Self> {
        if heartbeat_interval <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "heartbeat_interval must be positive, got {heartbeat_interval}"
            )));
        }
        if combat_tick_interval <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "combat_tick_interval must be positive, got {combat_tick_interval}"
            )));
        }
        Ok(Self {
            heartbeat_interval,
            combat_tick_interval,
        })
    }

    /// Loads a configuration from JSON.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CoreError::Serialization(e.to_string()))?;
        Self::new(config.heartbeat_interval, config.combat_tick_interval)
    }

    /// Scale factor normalizing per-tick amounts for a non-default cadence.
    #[must_use]
    pub fn heartbeat_scale(&self) -> f32 {
        (self.heartbeat_interval / NORMALIZATION_BASE) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scale_is_unity() {
        let config = TickConfig::default();
        assert!((config.heartbeat_scale() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_halved_interval_halves_scale() {
        let config = TickConfig::new(2.5, 0.5).expect("valid");
        assert!((config.heartbeat_scale() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_rejects_non_positive_intervals() {
        assert!(TickConfig::new(0.0, 0.5).is_err());
        assert!(TickConfig::new(5.0, -1.0).is_err());
    }

    #[test]
    fn test_from_json() {
        let config = TickConfig::from_json(
            r#"{"heartbeat_interval": 10.0, "combat_tick_interval": 0.25}"#,
        )
        .expect("valid json");
        assert!((config.heartbeat_scale() - 2.0).abs() < 0.001);

        assert!(TickConfig::from_json(r#"{"heartbeat_interval": 0.0}"#).is_err());
        assert!(TickConfig::from_json("not json").is_err());
    }
}
