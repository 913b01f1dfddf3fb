//! Order resolution: turning player commands into activities.
//!
//! Orders are validated here before any world state changes; a refused order
//! emits [`Notification::OrderDenied`] and nothing else.

use garrison_logic::cell::CellPos;
use hecs::{Entity, World};

use crate::activity::{self, Activity, ActivityQueue};
use crate::components::{Cargo, Position, SpawnerSlave};
use crate::events::{Notification, Notifications};
use crate::map::GameMap;
use crate::mutation::MutationQueue;
use crate::systems::cargo;

/// A player command aimed at one unit.
#[derive(Debug, Clone)]
pub struct Order {
    pub command: String,
    pub target: Option<Entity>,
    pub target_cell: Option<CellPos>,
    /// Queued orders run after the unit's current activity chain instead of
    /// replacing it.
    pub queued: bool,
}

impl Order {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            target: None,
            target_cell: None,
            queued: false,
        }
    }

    pub fn stop() -> Self {
        Self::new("Stop")
    }

    pub fn move_to(cell: CellPos) -> Self {
        Self {
            target_cell: Some(cell),
            ..Self::new("Move")
        }
    }

    pub fn attack(cell: CellPos) -> Self {
        Self {
            target_cell: Some(cell),
            ..Self::new("Attack")
        }
    }

    pub fn unload() -> Self {
        Self::new("Unload")
    }

    pub fn unload_at(cell: CellPos) -> Self {
        Self {
            target_cell: Some(cell),
            ..Self::new("Unload")
        }
    }

    pub fn enter_garrison(transport: Entity) -> Self {
        Self {
            target: Some(transport),
            ..Self::new("EnterGarrison")
        }
    }

    pub fn return_to_master() -> Self {
        Self::new("ReturnToMaster")
    }

    pub fn queued(mut self) -> Self {
        self.queued = true;
        self
    }
}

fn install(world: &mut World, entity: Entity, activity: Box<dyn Activity>, queued: bool) -> bool {
    match world.get::<&mut ActivityQueue>(entity) {
        Ok(mut q) => q.install(activity, queued),
        Err(_) => false,
    }
}

fn deny(notifications: &mut Notifications, entity: Entity, command: &str) {
    log::debug!("order {command} denied for {entity:?}");
    notifications.push(Notification::OrderDenied {
        entity,
        command: command.to_string(),
    });
}

pub fn resolve_order(
    world: &mut World,
    map: &GameMap,
    _mutations: &mut MutationQueue,
    notifications: &mut Notifications,
    entity: Entity,
    order: Order,
) {
    match order.command.as_str() {
        "Stop" => {
            if let Ok(mut q) = world.get::<&mut ActivityQueue>(entity) {
                q.cancel();
            }
        }
        "Move" => {
            if let Some(cell) = order.target_cell {
                let dest = map.clamp(cell);
                install(world, entity, Box::new(activity::MoveTo::new(dest, 0)), order.queued);
            }
        }
        "Attack" => {
            // Combat itself is out of scope; an attack order closes to
            // weapons range and holds there.
            let cell = order.target_cell.or_else(|| {
                order
                    .target
                    .and_then(|t| world.get::<&Position>(t).ok().map(|p| p.cell))
            });
            if let Some(cell) = cell {
                let dest = map.clamp(cell);
                install(world, entity, Box::new(activity::MoveTo::new(dest, 1)), order.queued);
            }
        }
        "Unload" => {
            if world.get::<&Cargo>(entity).is_err() {
                deny(notifications, entity, "Unload");
                return;
            }
            // An immediate unload with no travel must be possible right now;
            // a queued or targeted one is validated when it runs.
            if !order.queued
                && order.target_cell.is_none()
                && !cargo::can_unload(world, map, entity)
            {
                deny(notifications, entity, "Unload");
                return;
            }
            install(
                world,
                entity,
                Box::new(activity::UnloadCargo::new(order.target_cell, true)),
                order.queued,
            );
        }
        "EnterGarrison" => {
            let Some(transport) = order.target else {
                deny(notifications, entity, "EnterGarrison");
                return;
            };
            if !cargo::reserve_space(world, transport, entity) {
                deny(notifications, entity, "EnterGarrison");
                return;
            }
            let accepted = install(
                world,
                entity,
                Box::new(activity::EnterTransport::new(transport)),
                order.queued,
            );
            if !accepted {
                // The activity never starts, so it cannot release the
                // reservation on its own.
                cargo::unreserve_space(world, transport, entity);
                deny(notifications, entity, "EnterGarrison");
            }
        }
        "ReturnToMaster" => {
            let master = world
                .get::<&SpawnerSlave>(entity)
                .ok()
                .and_then(|s| s.master);
            let Some(master) = master else {
                deny(notifications, entity, "ReturnToMaster");
                return;
            };
            install(
                world,
                entity,
                Box::new(activity::EnterMaster::new(master)),
                order.queued,
            );
        }
        other => {
            log::warn!("unhandled order {other:?} for {entity:?}");
        }
    }
}
