//! # Veilstone Combat
//!
//! Real-time per-entity combat simulation core for the Veilstone world
//! server:
//! - Periodic status effects (damage-over-time, heal-over-time) with
//!   per-heartbeat aggregation and lethal clamping
//! - The combat tick dispatcher driving autonomous combatants
//! - Attack resolution for melee, missile, and magic attacks
//! - Deferred action scheduling for animation-timed effects
//! - Vitals, resistances, equipment, and threat tracking
//!
//! The world tick driver calls [`engine::CombatEngine::heartbeat`] and
//! [`engine::CombatEngine::combat_tick`] per entity on fixed cadences;
//! neither entry point panics or blocks.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod attack;
pub mod combatant;
pub mod config;
pub mod dispatcher;
pub mod effects;
pub mod engine;
pub mod events;
pub mod hooks;
pub mod ledger;
pub mod position;
pub mod resist;
pub mod rng;
pub mod scheduler;
pub mod timing;
pub mod vitals;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::attack::*;
    pub use crate::combatant::*;
    pub use crate::config::*;
    pub use crate::dispatcher::*;
    pub use crate::effects::*;
    pub use crate::engine::*;
    pub use crate::events::*;
    pub use crate::hooks::*;
    pub use crate::ledger::*;
    pub use crate::position::*;
    pub use crate::resist::*;
    pub use crate::rng::*;
    pub use crate::scheduler::*;
    pub use crate::timing::*;
    pub use crate::vitals::*;
    pub use crate::world::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_through_engine_surface() {
        let engine = engine::CombatEngine::new(config::TickConfig::default());
        let target =
            combatant::Combatant::new(combatant::CombatantRole::Player, "target").into_handle();
        let source =
            combatant::Combatant::new(combatant::CombatantRole::Player, "source").into_handle();
        let sink = events::NullSink;

        let applied = engine
            .apply_dot(
                &target,
                effects::DotParams::new(
                    10.0,
                    50.0,
                    resist::DamageType::Nether,
                    resist::CombatKind::Magic,
                )
                .with_source(source),
                0.0,
                &sink,
            )
            .expect("valid input");
        assert!(applied);
        assert_eq!(target.effects().dots.len(), 1);
    }

    #[test]
    fn test_clear_all_roundtrip_through_engine() {
        let mut engine = engine::CombatEngine::new(config::TickConfig::default());
        let target =
            combatant::Combatant::new(combatant::CombatantRole::Player, "target").into_handle();
        let source =
            combatant::Combatant::new(combatant::CombatantRole::Player, "source").into_handle();
        let sink = events::ChannelSink::new(32);

        engine
            .apply_hot(
                &target,
                &source,
                effects::HotParams::new(5.0, 25.0, vitals::BoostableAttribute::Health),
                &sink,
            )
            .expect("vital attribute");
        sink.drain();

        engine.clear_all_effects(&target);
        let health_before = target.vitals().health.current();
        engine.heartbeat(&target, &hooks::NoopEnchantments, &sink, 5.0);

        assert_eq!(target.vitals().health.current(), health_before);
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_config_round_trip() {
        let config = config::TickConfig::from_json(
            r#"{"heartbeat_interval": 5.0, "combat_tick_interval": 0.5}"#,
        )
        .expect("valid json");
        assert!((config.heartbeat_scale() - 1.0).abs() < f32::EPSILON);
    }
}
