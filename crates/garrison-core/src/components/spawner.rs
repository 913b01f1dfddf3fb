//! Spawner master and slave components.
//!
//! A master owns a fixed roster of slave entries and drives their launch,
//! return, rearm and respawn cycle. The roster slots exist from construction;
//! an entry with no slave entity is "invalid" and awaits replenishment. The
//! world-facing operations live in [`crate::systems::spawner`].

use std::collections::HashMap;

use garrison_logic::rules::SpawnerRules;
use hecs::Entity;

use super::conditions::ConditionToken;

/// One roster slot.
#[derive(Debug, Clone)]
pub struct SlaveEntry {
    /// Unit kind spawned into this slot.
    pub kind: String,
    /// The live slave, or `None` while invalid (never spawned or killed).
    pub slave: Option<Entity>,
    /// Ticks until this slave may launch again after returning.
    pub rearm_ticks: u32,
    pub is_launched: bool,
    /// A deferred replenish for this slot is already queued.
    pub(crate) pending_replenish: bool,
}

impl SlaveEntry {
    fn new(kind: String) -> Self {
        Self {
            kind,
            slave: None,
            rearm_ticks: 0,
            is_launched: false,
            pending_replenish: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.slave.is_some()
    }
}

/// A condition token that expires after a countdown (launching condition).
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimedToken {
    pub token: ConditionToken,
    pub remaining: u32,
}

/// Master-side spawner component.
#[derive(Debug)]
pub struct SpawnerMaster {
    pub spec: SpawnerRules,
    pub(crate) slots: Vec<SlaveEntry>,
    /// Single respawn countdown; zero means no timer is running.
    pub(crate) respawn_ticks: u32,
    pub(crate) loaded_tokens: Vec<ConditionToken>,
    pub(crate) contain_tokens: HashMap<String, Vec<ConditionToken>>,
    pub(crate) timed_tokens: Vec<TimedToken>,
}

impl SpawnerMaster {
    pub fn new(spec: SpawnerRules) -> Self {
        let slots = spec.actors.iter().cloned().map(SlaveEntry::new).collect();
        Self {
            spec,
            slots,
            respawn_ticks: 0,
            loaded_tokens: Vec::new(),
            contain_tokens: HashMap::new(),
            timed_tokens: Vec::new(),
        }
    }

    pub fn slots(&self) -> &[SlaveEntry] {
        &self.slots
    }

    /// Index of the first entry that is valid, docked, and fully rearmed.
    pub fn get_launchable(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.is_valid() && !s.is_launched && s.rearm_ticks == 0)
    }

    /// True while the single respawn countdown is live.
    pub fn respawn_timer_running(&self) -> bool {
        self.respawn_ticks > 0
    }

    pub(crate) fn slot_of(&self, slave: Entity) -> Option<usize> {
        self.slots.iter().position(|s| s.slave == Some(slave))
    }

    /// Slots waiting for a replenish that has not been queued yet.
    pub(crate) fn unfilled_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_valid() && !s.pending_replenish)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Slave-side back-reference to the owning master.
#[derive(Debug, Clone, Copy)]
pub struct SpawnerSlave {
    pub master: Option<Entity>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecs::World;

    fn spec(n: usize) -> SpawnerRules {
        SpawnerRules {
            actors: vec!["drone".to_string(); n],
            ..Default::default()
        }
    }

    #[test]
    fn test_roster_created_empty() {
        let master = SpawnerMaster::new(spec(3));
        assert_eq!(master.slots().len(), 3);
        assert!(master.slots().iter().all(|s| !s.is_valid()));
        assert_eq!(master.get_launchable(), None);
    }

    #[test]
    fn test_launchable_skips_rearming_and_launched() {
        let mut world = World::new();
        let a = world.spawn((0u32,));
        let b = world.spawn((0u32,));
        let c = world.spawn((0u32,));

        let mut master = SpawnerMaster::new(spec(3));
        master.slots[0].slave = Some(a);
        master.slots[0].is_launched = true;
        master.slots[1].slave = Some(b);
        master.slots[1].rearm_ticks = 10;
        master.slots[2].slave = Some(c);

        assert_eq!(master.get_launchable(), Some(2));
        master.slots[2].is_launched = true;
        assert_eq!(master.get_launchable(), None);
    }

    #[test]
    fn test_unfilled_skips_pending() {
        let mut master = SpawnerMaster::new(spec(2));
        master.slots[0].pending_replenish = true;
        assert_eq!(master.unfilled_slots(), vec![1]);
    }
}
