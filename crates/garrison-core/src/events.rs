//! Notification log.
//!
//! The core records facts; it does not know or care how many observers exist.
//! Observers (UI, audio, AI) drain the log between ticks.

use hecs::Entity;

use crate::components::{DamageState, PlayerId};

/// One observable fact emitted by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    PassengerEntered { transport: Entity, passenger: Entity },
    PassengerExited { transport: Entity, passenger: Entity },
    SlaveKilled { master: Entity, slave: Entity },
    SlaveLaunched { master: Entity, slave: Entity },
    DeployComplete { entity: Entity },
    OwnerChanged { entity: Entity, old: PlayerId, new: PlayerId },
    Sold { entity: Entity },
    /// A garrison emptied out and reverted to the neutral owner.
    StructureAbandoned { entity: Entity },
    DamageStateChanged { entity: Entity, state: DamageState },
    /// A named condition crossed zero-to-one (`enabled`) or one-to-zero.
    ConditionChanged { entity: Entity, name: String, enabled: bool },
    /// An order was refused without any world mutation (blocked-cursor hook).
    OrderDenied { entity: Entity, command: String },
}

/// Drainable notification buffer.
#[derive(Debug, Default)]
pub struct Notifications {
    log: Vec<Notification>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, n: Notification) {
        self.log.push(n);
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.log)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.log.iter()
    }
}
