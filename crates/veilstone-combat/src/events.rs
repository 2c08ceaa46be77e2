//! Notification sink for combat messages.
//!
//! Core logic emits fire-and-forget messages to participants and never
//! blocks on delivery. Text formatting is the transport layer's concern;
//! messages carry structured payloads only.

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::resist::DamageType;
use crate::vitals::VitalKind;
use veilstone_common::{EntityId, WeaponId};

/// A combat notification addressed to one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatMessage {
    /// A periodic damage effect was placed on a target (sent to the source)
    DotApplied {
        /// Target entity
        target: EntityId,
        /// Damage type of the effect
        damage_type: DamageType,
        /// Total damage the effect will deal
        total: f32,
    },
    /// A periodic damage effect landed on you (sent to the target)
    DotReceived {
        /// Source entity
        source: EntityId,
        /// Damage type of the effect
        damage_type: DamageType,
        /// Total damage the effect will deal
        total: f32,
        /// Whether the applying strike was critical
        critical: bool,
    },
    /// A periodic heal effect was placed on a target (sent to the source)
    HotApplied {
        /// Target entity
        target: EntityId,
        /// Vital being restored
        vital: VitalKind,
        /// Total amount the effect will restore
        total: f32,
    },
    /// A periodic heal effect landed on you (sent to the target)
    HotReceived {
        /// Source entity
        source: EntityId,
        /// Vital being restored
        vital: VitalKind,
        /// Total amount the effect will restore
        total: f32,
    },
    /// Your share of a periodic damage tick (sent to each contributing source)
    PeriodicDamage {
        /// Target entity
        target: EntityId,
        /// Damage type of the aggregate
        damage_type: DamageType,
        /// This source's contribution, zeroed if the target became immune
        amount: i32,
    },
    /// A periodic damage aggregate hit you (sent to the target)
    DamageTaken {
        /// Damage type of the aggregate
        damage_type: DamageType,
        /// Applied amount
        amount: i32,
    },
    /// Your share of a periodic heal tick (sent to each contributing source)
    PeriodicHeal {
        /// Target entity
        target: EntityId,
        /// Vital restored
        vital: VitalKind,
        /// This source's contribution
        amount: i32,
    },
    /// A periodic heal aggregate restored you (sent to the target)
    HealTaken {
        /// Vital restored
        vital: VitalKind,
        /// Applied amount
        amount: i32,
    },
    /// Sanctuary protection absorbed a harmful effect
    Protected {
        /// Protected entity
        target: EntityId,
    },
    /// A stunned combatant's periodic visual
    StunVisual {
        /// Stunned entity
        entity: EntityId,
    },
    /// A scripted emote motion played
    EmoteVisual {
        /// Emoting entity
        entity: EntityId,
        /// Motion name
        motion: String,
    },
    /// An equipped item wore out and was removed
    ItemExpired {
        /// The expired weapon
        weapon: WeaponId,
    },
    /// A combatant died
    Died {
        /// The entity blamed for the kill, if any
        killer: Option<EntityId>,
    },
}

/// Fire-and-forget delivery of a message to a specific participant.
pub trait NotificationSink {
    /// Delivers a message. Must not block; delivery is best-effort.
    fn deliver(&self, to: EntityId, message: CombatMessage);
}

/// Channel-backed sink for broadcasting messages to the transport layer.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Sender<(EntityId, CombatMessage)>,
    receiver: Receiver<(EntityId, CombatMessage)>,
    capacity: usize,
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl ChannelSink {
    /// Creates a new sink with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Drains all pending messages.
    pub fn drain(&self) -> Vec<(EntityId, CombatMessage)> {
        let mut messages = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Returns the number of pending messages.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl NotificationSink for ChannelSink {
    fn deliver(&self, to: EntityId, message: CombatMessage) {
        // Non-blocking send - if full, the message is dropped
        let _ = self.sender.try_send((to, message));
    }
}

/// Sink that discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn deliver(&self, _to: EntityId, _message: CombatMessage) {}
}
