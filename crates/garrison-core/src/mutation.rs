//! Deferred structural mutations.
//!
//! Systems iterate the world read-mostly and enqueue any change that adds,
//! removes, or re-links entities. The queue drains at the end of each tick;
//! a drained mutation may enqueue further mutations, and draining repeats
//! until the queue is empty. Every application re-checks that its targets
//! are still alive, so a mutation enqueued against an entity that died in
//! the same tick degrades to a no-op.

use std::collections::VecDeque;

use garrison_logic::cell::CellPos;
use garrison_logic::rules::Rules;
use hecs::{Entity, World};

use crate::components::{Cargo, Health, InWorld, Owner, Position, SpawnerMaster};
use crate::events::{Notification, Notifications};
use crate::map::GameMap;
use crate::orders::{self, Order};
use crate::systems::spawner;

#[derive(Debug, Clone)]
pub enum Mutation {
    /// Place an entity on the map at `cell` (clamped to bounds).
    AddToWorld { entity: Entity, cell: CellPos },
    /// Take an entity off the map without destroying it.
    RemoveFromWorld { entity: Entity },
    /// Destroy an entity outright.
    Despawn { entity: Entity },
    ChangeOwner { entity: Entity, owner: crate::components::PlayerId },
    SetPosition { entity: Entity, cell: CellPos },
    SetFacing { entity: Entity, facing: u32 },
    IssueOrder { entity: Entity, order: Order },
    /// Fill an empty roster slot with a freshly created slave.
    ReplenishSlot { master: Entity, slot: usize },
    /// Dock a returned slave back into its master.
    PickupSlave { master: Entity, slave: Entity },
    HealFull { entity: Entity },
    CancelActivities { entity: Entity },
}

#[derive(Default)]
pub struct MutationQueue {
    pending: VecDeque<Mutation>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, mutation: Mutation) {
        self.pending.push_back(mutation);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Apply everything pending, including mutations enqueued while applying.
    pub fn drain(
        &mut self,
        world: &mut World,
        map: &mut GameMap,
        rules: &Rules,
        players: &crate::components::Players,
        notifications: &mut Notifications,
    ) {
        while !self.pending.is_empty() {
            let batch: Vec<Mutation> = self.pending.drain(..).collect();
            for mutation in batch {
                apply(world, map, rules, players, notifications, self, mutation);
            }
        }
    }
}

fn apply(
    world: &mut World,
    map: &mut GameMap,
    rules: &Rules,
    _players: &crate::components::Players,
    notifications: &mut Notifications,
    queue: &mut MutationQueue,
    mutation: Mutation,
) {
    match mutation {
        Mutation::AddToWorld { entity, cell } => {
            if !world.contains(entity) || world.get::<&InWorld>(entity).is_ok() {
                return;
            }
            let cell = map.clamp(cell);
            if let Ok(mut pos) = world.get::<&mut Position>(entity) {
                pos.cell = cell;
            }
            let _ = world.insert_one(entity, InWorld);
            map.add_occupant(cell, entity);
        }
        Mutation::RemoveFromWorld { entity } => {
            remove_from_world(world, map, entity);
        }
        Mutation::Despawn { entity } => {
            if !world.contains(entity) {
                return;
            }
            remove_from_world(world, map, entity);
            let _ = world.despawn(entity);
        }
        Mutation::ChangeOwner { entity, owner } => {
            change_owner_now(world, notifications, queue, entity, owner);
        }
        Mutation::SetPosition { entity, cell } => {
            if !world.contains(entity) {
                return;
            }
            let cell = map.clamp(cell);
            let in_world = world.get::<&InWorld>(entity).is_ok();
            if let Ok(mut pos) = world.get::<&mut Position>(entity) {
                if in_world {
                    map.move_occupant(pos.cell, cell, entity);
                }
                pos.cell = cell;
            }
        }
        Mutation::SetFacing { entity, facing } => {
            if let Ok(mut f) = world.get::<&mut crate::components::Facing>(entity) {
                f.0 = facing % garrison_logic::formation::FACING_FULL;
            }
        }
        Mutation::IssueOrder { entity, order } => {
            if !world.contains(entity) {
                return;
            }
            orders::resolve_order(world, map, queue, notifications, entity, order);
        }
        Mutation::ReplenishSlot { master, slot } => {
            spawner::apply_replenish(world, rules, master, slot);
        }
        Mutation::PickupSlave { master, slave } => {
            if !world.contains(master) || !world.contains(slave) {
                return;
            }
            let insta_repair = match world.get::<&SpawnerMaster>(master) {
                Ok(sm) => sm.spec.insta_repair,
                Err(_) => return,
            };
            if spawner::pickup_slave(world, master, slave) {
                remove_from_world(world, map, slave);
                if insta_repair {
                    if let Ok(mut health) = world.get::<&mut Health>(slave) {
                        health.hp = health.max_hp;
                    }
                }
            }
        }
        Mutation::HealFull { entity } => {
            if let Ok(mut health) = world.get::<&mut Health>(entity) {
                health.hp = health.max_hp;
            }
        }
        Mutation::CancelActivities { entity } => {
            if let Ok(mut q) = world.get::<&mut crate::activity::ActivityQueue>(entity) {
                q.cancel();
            }
        }
    }
}

fn remove_from_world(world: &mut World, map: &mut GameMap, entity: Entity) {
    if !world.contains(entity) || world.get::<&InWorld>(entity).is_err() {
        return;
    }
    if let Ok(pos) = world.get::<&Position>(entity) {
        let cell = pos.cell;
        drop(pos);
        map.remove_occupant(cell, entity);
    }
    let _ = world.remove_one::<InWorld>(entity);
}

/// Owner change with propagation to boarded passengers and roster slaves.
/// The propagated changes are deferred so a long chain stays iterative.
pub(crate) fn change_owner_now(
    world: &mut World,
    notifications: &mut Notifications,
    queue: &mut MutationQueue,
    entity: Entity,
    owner: crate::components::PlayerId,
) {
    if !world.contains(entity) {
        return;
    }
    let old = match world.get::<&mut Owner>(entity) {
        Ok(mut o) => {
            if o.0 == owner {
                return;
            }
            let old = o.0;
            o.0 = owner;
            old
        }
        Err(_) => return,
    };
    notifications.push(Notification::OwnerChanged {
        entity,
        old,
        new: owner,
    });
    log::debug!("owner of {entity:?} changed {old:?} -> {owner:?}");

    if let Ok(cargo) = world.get::<&Cargo>(entity) {
        for passenger in cargo.passengers() {
            queue.enqueue(Mutation::ChangeOwner {
                entity: passenger,
                owner,
            });
        }
    }
    if let Ok(sm) = world.get::<&SpawnerMaster>(entity) {
        for slot in sm.slots() {
            if let Some(slave) = slot.slave {
                queue.enqueue(Mutation::ChangeOwner { entity: slave, owner });
            }
        }
    }
}
