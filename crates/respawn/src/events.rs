//! # RESPAWN Event System
//!
//! Channels between gameplay and the pool owners.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  EnemyDied       ┌─────────────┐
//! │   Enemy     │─────────────────>│ WaveSpawner │
//! │  (unit)     │  death channel   └─────────────┘
//! └─────────────┘
//! ┌─────────────┐  CombatFeedback  ┌─────────────┐
//! │  Gameplay   │─────────────────>│ CombatText  │
//! │  (combat)   │  combat channel  │    Pool     │
//! └─────────────┘                  └─────────────┘
//! ```
//!
//! Bounded crossbeam channels; consumers drain once per tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use respawn_core::UnitHandle;

use crate::combat_text::TextKind;
use crate::spatial::Vec3;

/// Events that flow from gameplay to the pool owners.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    // =========================================================================
    // Enemy Events (units → WaveSpawner)
    // =========================================================================
    /// An enemy died.
    ///
    /// Emitted by: the enemy unit itself, carrying its own handle
    /// Consumed by: WaveSpawner (release + scheduled replacement)
    EnemyDied {
        /// Handle the enemy was issued on activation.
        unit: UnitHandle,
    },

    // =========================================================================
    // Combat Events (gameplay → CombatTextPool)
    // =========================================================================
    /// A number should float up from a position.
    CombatFeedback {
        /// Damage, heal or experience amount.
        amount: u32,
        /// How the number is formatted and coloured.
        kind: TextKind,
        /// World position of the hit.
        position: Vec3,
    },
}

/// Event bus with one bounded channel.
pub struct EventBus {
    sender: Sender<GameEvent>,
    receiver: Receiver<GameEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum events in flight before sends are dropped.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Creates a sender handle (clone for multiple producers).
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Creates a receiver handle.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Creates a new pair of sender and receiver.
    #[must_use]
    pub fn create_pair(capacity: usize) -> (EventSender, EventReceiver) {
        let bus = Self::new(capacity);
        (bus.sender(), bus.receiver())
    }
}

/// Handle for sending events.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: Sender<GameEvent>,
}

impl EventSender {
    /// Sends an event (non-blocking).
    ///
    /// Returns `false` if the channel is full or closed; the event is dropped.
    #[inline]
    pub fn send(&self, event: GameEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!("event channel full, dropped {:?}", event);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Handle for receiving events.
#[derive(Clone, Debug)]
pub struct EventReceiver {
    receiver: Receiver<GameEvent>,
}

impl EventReceiver {
    /// Receives all pending events (non-blocking).
    #[inline]
    pub fn drain(&self) -> Vec<GameEvent> {
        self.receiver.try_iter().collect()
    }

    /// Receives one event (non-blocking).
    #[inline]
    pub fn try_recv(&self) -> Option<GameEvent> {
        self.receiver.try_recv().ok()
    }

    /// Returns the number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Checks if there are pending events.
    #[inline]
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.receiver.is_empty()
    }
}

/// Builder for the complete event system.
pub struct EventSystemBuilder {
    capacity: usize,
}

impl EventSystemBuilder {
    /// Creates a new builder with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self { capacity: 1024 }
    }

    /// Sets the channel capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builds the event system.
    #[must_use]
    pub fn build(self) -> EventSystem {
        let death = EventBus::new(self.capacity);
        let combat = EventBus::new(self.capacity);

        EventSystem {
            death_sender: death.sender(),
            death_receiver: death.receiver(),
            combat_sender: combat.sender(),
            combat_receiver: combat.receiver(),
        }
    }
}

impl Default for EventSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Every channel the runtime uses.
pub struct EventSystem {
    // Enemies → Spawner
    /// Handed to enemy units so they can report their death.
    pub death_sender: EventSender,
    /// Drained by the spawner.
    pub death_receiver: EventReceiver,

    // Gameplay → Combat text
    /// Used by gameplay to request floating numbers.
    pub combat_sender: EventSender,
    /// Drained by the combat text pool.
    pub combat_receiver: EventReceiver,
}

impl EventSystem {
    /// Creates a new event system with default settings.
    #[must_use]
    pub fn new() -> Self {
        EventSystemBuilder::new().build()
    }
}

impl Default for EventSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(amount: u32) -> GameEvent {
        GameEvent::CombatFeedback {
            amount,
            kind: TextKind::Damage,
            position: Vec3::ZERO,
        }
    }

    #[test]
    fn test_event_send_receive() {
        let (sender, receiver) = EventBus::create_pair(8);

        assert!(sender.send(feedback(25)));
        assert!(receiver.has_events());

        match receiver.try_recv() {
            Some(GameEvent::CombatFeedback { amount, .. }) => assert_eq!(amount, 25),
            other => panic!("Wrong event: {other:?}"),
        }
    }

    #[test]
    fn test_event_drain() {
        let (sender, receiver) = EventBus::create_pair(100);
        for i in 0..10 {
            sender.send(feedback(i));
        }

        assert_eq!(receiver.pending_count(), 10);
        assert_eq!(receiver.drain().len(), 10);
        assert!(!receiver.has_events());
    }

    #[test]
    fn test_full_channel_drops() {
        let (sender, receiver) = EventBus::create_pair(2);
        assert!(sender.send(feedback(1)));
        assert!(sender.send(feedback(2)));
        assert!(!sender.send(feedback(3)));
        assert_eq!(receiver.drain().len(), 2);
    }

    #[test]
    fn test_event_system_channels_are_separate() {
        let system = EventSystemBuilder::new().capacity(16).build();
        system.combat_sender.send(feedback(5));

        assert!(system.combat_receiver.has_events());
        assert!(!system.death_receiver.has_events());
    }
}
