//! Collaborator hooks invoked from the heartbeat.

use crate::combatant::CombatantHandle;

/// Enchantment bookkeeping tick, run once per owning entity's heartbeat
/// before status-effect aggregation.
pub trait EnchantmentHook {
    /// Advances enchantment state by one heartbeat interval.
    fn on_heartbeat(&self, entity: &CombatantHandle, interval: f64);
}

/// Hook implementation that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEnchantments;

impl EnchantmentHook for NoopEnchantments {
    fn on_heartbeat(&self, _entity: &CombatantHandle, _interval: f64) {}
}
