//! The simulation facade: owns the world, map, rules, and the per-tick
//! pipeline. External callers (UI, AI, scenario scripts) talk to [`Game`]
//! between ticks; everything inside a tick is deterministic for a given
//! seed and order stream.

use std::fmt;

use garrison_logic::cell::CellPos;
use garrison_logic::rules::{Rules, SlaveDisposal};
use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::activity::{self, ActivityQueue};
use crate::components::{
    Cargo, Conditions, Facing, Flying, Health, InWorld, Owner, Passenger, PlayerId, Players,
    Position, SpawnerMaster, SpawnerSlave, UnitKind,
};
use crate::events::{Notification, Notifications};
use crate::map::GameMap;
use crate::mutation::{self, Mutation, MutationQueue};
use crate::orders::{self, Order};
use crate::systems::{cargo, spawner};

#[derive(Debug)]
pub enum GameError {
    UnknownUnitKind(String),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::UnknownUnitKind(kind) => write!(f, "unknown unit kind {kind:?}"),
        }
    }
}

impl std::error::Error for GameError {}

/// Create a unit entity from its rules definition. The unit starts off-map;
/// cargo initial units are boarded and spawner rosters filled immediately.
pub(crate) fn create_unit(
    world: &mut World,
    rules: &Rules,
    kind: &str,
    owner: PlayerId,
) -> Result<Entity, GameError> {
    let unit = rules
        .get(kind)
        .ok_or_else(|| GameError::UnknownUnitKind(kind.to_string()))?
        .clone();

    let entity = world.spawn((
        UnitKind(kind.to_string()),
        Owner(owner),
        Health::new(unit.health),
        Position::default(),
        Facing::default(),
        Conditions::new(),
        ActivityQueue::new(),
    ));
    if unit.flying {
        let _ = world.insert_one(entity, Flying { airborne: true });
    }
    if let Some(spec) = unit.passenger {
        let _ = world.insert_one(entity, Passenger::new(spec));
    }
    if let Some(spec) = unit.cargo {
        let initial = spec.initial_units.clone();
        let _ = world.insert_one(entity, Cargo::new(spec));
        // Pre-boarded garrison; linking and notifications settle on the
        // container's first tick.
        let mut sink = MutationQueue::new();
        let mut silent = Notifications::new();
        for kind in initial {
            let passenger = create_unit(world, rules, &kind, owner)?;
            cargo::load(world, &mut sink, &mut silent, entity, passenger);
        }
    }
    if let Some(spec) = unit.spawner {
        let slots = spec.actors.len();
        let _ = world.insert_one(entity, SpawnerMaster::new(spec));
        for slot in 0..slots {
            spawner::fill_slot(world, rules, entity, slot)?;
        }
    }
    Ok(entity)
}

pub struct Game {
    pub world: World,
    pub map: GameMap,
    rules: Rules,
    players: Players,
    mutations: MutationQueue,
    notifications: Notifications,
    rng: StdRng,
    tick: u64,
}

impl Game {
    pub fn new(rules: Rules, map: GameMap, players: Players, seed: u64) -> Self {
        Self {
            world: World::new(),
            map,
            rules,
            players,
            mutations: MutationQueue::new(),
            notifications: Notifications::new(),
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Advance the simulation one tick: timers, container init, activities,
    /// then the deferred mutation drain and condition-change collection.
    pub fn tick(&mut self) {
        self.tick += 1;
        spawner::spawner_system(&mut self.world, &mut self.mutations);
        cargo::cargo_system(&mut self.world, &mut self.notifications);
        activity::activity_system(
            &mut self.world,
            &mut self.map,
            &self.players,
            &mut self.mutations,
            &mut self.notifications,
            &mut self.rng,
        );
        self.flush();
        self.collect_condition_changes();
    }

    fn flush(&mut self) {
        self.mutations.drain(
            &mut self.world,
            &mut self.map,
            &self.rules,
            &self.players,
            &mut self.notifications,
        );
    }

    fn collect_condition_changes(&mut self) {
        let mut changed = Vec::new();
        for (entity, cond) in self.world.query_mut::<&mut Conditions>() {
            for change in cond.take_changes() {
                changed.push((entity, change));
            }
        }
        for (entity, change) in changed {
            self.notifications.push(Notification::ConditionChanged {
                entity,
                name: change.name,
                enabled: change.enabled,
            });
        }
    }

    /// Create a unit off-map. Use [`Game::add_to_world`] to place it.
    pub fn spawn_unit(&mut self, kind: &str, owner: PlayerId) -> Result<Entity, GameError> {
        create_unit(&mut self.world, &self.rules, kind, owner)
    }

    pub fn add_to_world(&mut self, entity: Entity, cell: CellPos) {
        self.mutations.enqueue(Mutation::AddToWorld { entity, cell });
        self.flush();
    }

    pub fn remove_from_world(&mut self, entity: Entity) {
        self.mutations.enqueue(Mutation::RemoveFromWorld { entity });
        self.flush();
    }

    pub fn issue_order(&mut self, entity: Entity, order: Order) {
        if !self.world.contains(entity) {
            return;
        }
        orders::resolve_order(
            &mut self.world,
            &self.map,
            &mut self.mutations,
            &mut self.notifications,
            entity,
            order,
        );
        self.flush();
    }

    /// Attack trigger for a spawner master: launches a ready slave at the
    /// target and retargets those already out.
    pub fn notify_attacking(&mut self, master: Entity, target: CellPos) {
        spawner::notify_attacking(
            &mut self.world,
            &mut self.mutations,
            &mut self.notifications,
            &mut self.rng,
            master,
            target,
        );
        self.flush();
    }

    /// Idle trigger for a spawner master: recalls launched slaves.
    pub fn notify_idle(&mut self, master: Entity) {
        spawner::recall(&mut self.world, &mut self.mutations, master);
        self.flush();
    }

    pub fn inflict_damage(&mut self, entity: Entity, amount: i32) {
        let result = match self.world.get::<&mut Health>(entity) {
            Ok(mut health) => {
                let before = health.damage_state();
                health.inflict(amount);
                Some((before, health.damage_state(), health.is_dead()))
            }
            Err(_) => None,
        };
        let Some((before, after, dead)) = result else {
            return;
        };
        if before != after {
            self.notifications
                .push(Notification::DamageStateChanged { entity, state: after });
        }
        if dead {
            self.kill(entity);
        }
    }

    /// Destroy a unit, unwinding every cross-entity link it participates in.
    pub fn kill(&mut self, entity: Entity) {
        if !self.world.contains(entity) {
            return;
        }

        // Slave: report the loss to its master.
        let master = self
            .world
            .get::<&SpawnerSlave>(entity)
            .ok()
            .and_then(|s| s.master);
        if let Some(master) = master {
            if self.world.contains(master) {
                spawner::on_slave_killed(
                    &mut self.world,
                    &mut self.notifications,
                    master,
                    entity,
                );
            }
        }

        // Passenger: release any reservation, and unwind container
        // accounting when killed while boarded.
        let (reserved, boarded_in) = match self.world.get::<&Passenger>(entity) {
            Ok(p) => (p.reserved, p.transport),
            Err(_) => (None, None),
        };
        if let Some(transport) = reserved {
            if self.world.contains(transport) {
                cargo::unreserve_space(&mut self.world, transport, entity);
            }
        }
        if let Some(transport) = boarded_in {
            if self.world.contains(transport) {
                cargo::passenger_killed(&mut self.world, transport, entity);
            }
        }

        // Master: dispose of the roster.
        self.dispose_slaves(entity);

        // Container: eject or destroy the garrison.
        self.release_cargo_on_death(entity);

        if self.world.get::<&InWorld>(entity).is_ok() {
            if let Ok(pos) = self.world.get::<&Position>(entity) {
                let cell = pos.cell;
                drop(pos);
                self.map.remove_occupant(cell, entity);
            }
        }
        let _ = self.world.despawn(entity);
        self.flush();
    }

    fn dispose_slaves(&mut self, master: Entity) {
        let plan = match self.world.get::<&SpawnerMaster>(master) {
            Ok(sm) => {
                let slaves: Vec<Entity> =
                    sm.slots().iter().filter_map(|s| s.slave).collect();
                Some((sm.spec.slave_disposal, slaves))
            }
            Err(_) => None,
        };
        let Some((disposal, slaves)) = plan else {
            return;
        };
        let master_cell = self
            .world
            .get::<&Position>(master)
            .map(|p| p.cell)
            .unwrap_or_default();

        for slave in &slaves {
            if let Ok(mut link) = self.world.get::<&mut SpawnerSlave>(*slave) {
                link.master = None;
            }
        }
        match disposal {
            SlaveDisposal::KillSlaves => {
                for slave in slaves {
                    self.kill(slave);
                }
            }
            SlaveDisposal::GiveFreedom => {
                for slave in slaves {
                    if self.world.get::<&InWorld>(slave).is_err() {
                        // Docked slaves step out beside the wreck.
                        self.mutations.enqueue(Mutation::AddToWorld {
                            entity: slave,
                            cell: master_cell,
                        });
                    }
                }
            }
            SlaveDisposal::DoNothing => {}
        }
    }

    fn release_cargo_on_death(&mut self, transport: Entity) {
        let plan = match self.world.get::<&mut Cargo>(transport) {
            Ok(mut cargo) => Some((cargo.spec.eject_on_death, cargo.drain_passengers())),
            Err(_) => None,
        };
        let Some((eject, passengers)) = plan else {
            return;
        };
        let cell = self
            .world
            .get::<&Position>(transport)
            .map(|p| p.cell)
            .unwrap_or_default();
        let airborne = self
            .world
            .get::<&Flying>(transport)
            .map(|f| f.airborne)
            .unwrap_or(false);

        for passenger in passengers {
            cargo::release_passenger(&mut self.world, passenger);
            if eject && !airborne {
                self.mutations.enqueue(Mutation::AddToWorld {
                    entity: passenger,
                    cell,
                });
            } else {
                // No survivors from a destroyed closed transport or a
                // mid-air loss.
                self.kill(passenger);
            }
        }
    }

    /// Sell a structure back. An ejecting garrison steps out first; a sealed
    /// one and the spawner roster go down with the sale.
    pub fn sell(&mut self, entity: Entity) {
        if !self.world.contains(entity) {
            return;
        }
        self.notifications.push(Notification::Sold { entity });

        self.dispose_slaves(entity);

        let plan = match self.world.get::<&mut Cargo>(entity) {
            Ok(mut cargo) => Some((cargo.spec.eject_on_sell, cargo.drain_passengers())),
            Err(_) => None,
        };
        let cell = self
            .world
            .get::<&Position>(entity)
            .map(|p| p.cell)
            .unwrap_or_default();
        if let Some((eject, passengers)) = plan {
            for passenger in passengers {
                cargo::release_passenger(&mut self.world, passenger);
                if eject {
                    self.mutations.enqueue(Mutation::AddToWorld {
                        entity: passenger,
                        cell,
                    });
                } else {
                    self.kill(passenger);
                }
            }
        }

        if self.world.get::<&InWorld>(entity).is_ok() {
            self.map.remove_occupant(cell, entity);
        }
        let _ = self.world.despawn(entity);
        self.flush();
    }

    pub fn change_owner(&mut self, entity: Entity, owner: PlayerId) {
        mutation::change_owner_now(
            &mut self.world,
            &mut self.notifications,
            &mut self.mutations,
            entity,
            owner,
        );
        self.flush();
    }

    pub fn is_in_world(&self, entity: Entity) -> bool {
        self.world.get::<&InWorld>(entity).is_ok()
    }

    pub fn position_of(&self, entity: Entity) -> Option<CellPos> {
        self.world.get::<&Position>(entity).ok().map(|p| p.cell)
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrison_logic::rules::{CargoRules, PassengerRules, UnitRules};

    fn rules() -> Rules {
        let mut rules = Rules::default();
        rules.units.insert(
            "bunker".into(),
            UnitRules {
                cargo: Some(CargoRules {
                    max_weight: 5,
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        rules.units.insert(
            "rifleman".into(),
            UnitRules {
                passenger: Some(PassengerRules::default()),
                ..Default::default()
            },
        );
        rules
    }

    #[test]
    fn test_spawn_and_place() {
        let mut game = Game::new(rules(), GameMap::new(16, 16), Players::default(), 1);
        let e = game.spawn_unit("rifleman", PlayerId(1)).unwrap();
        assert!(!game.is_in_world(e));
        game.add_to_world(e, CellPos::new(3, 3));
        assert!(game.is_in_world(e));
        assert_eq!(game.position_of(e), Some(CellPos::new(3, 3)));
    }

    #[test]
    fn test_unknown_kind_is_an_error() {
        let mut game = Game::new(rules(), GameMap::new(16, 16), Players::default(), 1);
        assert!(matches!(
            game.spawn_unit("nonesuch", PlayerId(1)),
            Err(GameError::UnknownUnitKind(_))
        ));
    }

    #[test]
    fn test_tick_advances_counter() {
        let mut game = Game::new(rules(), GameMap::new(16, 16), Players::default(), 1);
        game.tick();
        game.tick();
        assert_eq!(game.current_tick(), 2);
    }
}
