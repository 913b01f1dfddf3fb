//! Cargo operations: reservations, boarding, and unloading.
//!
//! All weight and condition-token bookkeeping for containers funnels through
//! here. The invariant maintained across every path: the "loading" condition
//! is held exactly while at least one reservation is outstanding, and each
//! boarded passenger contributes exactly one "loaded" token plus at most one
//! per-kind token.

use hecs::{Entity, World};

use crate::components::{
    BunkerState, Cargo, Conditions, Facing, Flying, Passenger, UnitKind,
};
use crate::events::{Notification, Notifications};
use crate::map::GameMap;
use crate::mutation::{Mutation, MutationQueue};

fn weight_of(world: &World, passenger: Entity) -> u32 {
    world
        .get::<&Passenger>(passenger)
        .map(|p| p.spec.weight)
        .unwrap_or(0)
}

fn kind_of(world: &World, entity: Entity) -> Option<String> {
    world.get::<&UnitKind>(entity).ok().map(|k| k.0.clone())
}

/// Could this passenger board right now? Checks type, space or an existing
/// reservation, and that the transport is at ground level.
pub fn can_load(world: &World, transport: Entity, passenger: Entity) -> bool {
    let Ok(cargo) = world.get::<&Cargo>(transport) else {
        return false;
    };
    let Ok(p) = world.get::<&Passenger>(passenger) else {
        return false;
    };
    if !cargo.accepts_type(&p.spec.cargo_type) {
        return false;
    }
    let grounded = world
        .get::<&Flying>(transport)
        .map(|f| !f.airborne)
        .unwrap_or(true);
    grounded && (cargo.has_reservation(passenger) || cargo.has_space(p.spec.weight))
}

/// Claim space ahead of boarding. Idempotent for a passenger that already
/// holds a reservation. The first outstanding reservation grants the
/// container's "loading" condition.
pub fn reserve_space(world: &mut World, transport: Entity, passenger: Entity) -> bool {
    let weight = match world.get::<&Passenger>(passenger) {
        Ok(p) => p.spec.weight,
        Err(_) => return false,
    };
    let cargo_type = match world.get::<&Passenger>(passenger) {
        Ok(p) => p.spec.cargo_type.clone(),
        Err(_) => return false,
    };

    let granted_name = {
        let Ok(mut cargo) = world.get::<&mut Cargo>(transport) else {
            return false;
        };
        if cargo.has_reservation(passenger) {
            return true;
        }
        if !cargo.accepts_type(&cargo_type) || !cargo.has_space(weight) {
            return false;
        }
        cargo.add_reserve(passenger, weight);
        if !cargo.loading_token.is_valid() {
            cargo.spec.loading_condition.clone()
        } else {
            None
        }
    };
    if let Some(name) = granted_name {
        grant_loading(world, transport, &name);
    }
    if let Ok(mut p) = world.get::<&mut Passenger>(passenger) {
        p.reserved = Some(transport);
    }
    true
}

fn grant_loading(world: &mut World, transport: Entity, name: &str) {
    let token = match world.get::<&mut Conditions>(transport) {
        Ok(mut cond) => cond.grant(name),
        Err(_) => return,
    };
    if let Ok(mut cargo) = world.get::<&mut Cargo>(transport) {
        cargo.loading_token = token;
    }
}

fn revoke_loading_if_clear(world: &mut World, transport: Entity) {
    let token = {
        let Ok(mut cargo) = world.get::<&mut Cargo>(transport) else {
            return;
        };
        if cargo.has_reservations() || !cargo.loading_token.is_valid() {
            return;
        }
        let t = cargo.loading_token;
        cargo.loading_token = crate::components::ConditionToken::INVALID;
        t
    };
    if let Ok(mut cond) = world.get::<&mut Conditions>(transport) {
        cond.revoke(token);
    }
}

/// Release a reservation. Reserving weight returns to the budget and the
/// "loading" condition is revoked once no reservations remain. Unknown
/// reservations are ignored.
pub fn unreserve_space(world: &mut World, transport: Entity, passenger: Entity) {
    let weight = weight_of(world, passenger);
    if let Ok(mut cargo) = world.get::<&mut Cargo>(transport) {
        cargo.remove_reserve(passenger, weight);
    }
    revoke_loading_if_clear(world, transport);
    if let Ok(mut p) = world.get::<&mut Passenger>(passenger) {
        if p.reserved == Some(transport) {
            p.reserved = None;
        }
    }
}

/// Board a passenger: converts any reservation to boarded weight, pushes the
/// passenger onto the stack, and grants the container and passenger
/// conditions. Callers check [`can_load`] first.
pub fn load(
    world: &mut World,
    mutations: &mut MutationQueue,
    notifications: &mut Notifications,
    transport: Entity,
    passenger: Entity,
) {
    let weight = weight_of(world, passenger);
    let kind = kind_of(world, passenger);

    let (initialized, disappear, capture, grants) = {
        let Ok(mut cargo) = world.get::<&mut Cargo>(transport) else {
            return;
        };
        cargo.remove_reserve(passenger, weight);
        cargo.push(passenger, weight);
        cargo.state = BunkerState::Bunkered;
        let mut grants: Vec<(Option<String>, String)> = Vec::new();
        if let Some(name) = &cargo.spec.loaded_condition {
            grants.push((None, name.clone()));
        }
        if let Some(kind) = &kind {
            if let Some(name) = cargo.spec.passenger_conditions.get(kind) {
                grants.push((Some(kind.clone()), name.clone()));
            }
        }
        (
            cargo.initialized,
            cargo.spec.disappear_on_load,
            cargo.spec.change_owner_when_garrison,
            grants,
        )
    };
    revoke_loading_if_clear(world, transport);

    // A garrisoned structure fights for whoever holds it.
    if capture {
        if let Ok(owner) = world.get::<&crate::components::Owner>(passenger).map(|o| o.0) {
            mutations.enqueue(Mutation::ChangeOwner {
                entity: transport,
                owner,
            });
        }
    }

    for (per_kind, name) in grants {
        let token = match world.get::<&mut Conditions>(transport) {
            Ok(mut cond) => cond.grant(&name),
            Err(_) => continue,
        };
        if let Ok(mut cargo) = world.get::<&mut Cargo>(transport) {
            match per_kind {
                Some(kind) => cargo.passenger_tokens.entry(kind).or_default().push(token),
                None => cargo.loaded_tokens.push(token),
            }
        }
    }

    // Passenger side: back-reference and the garrisoned self-condition.
    let bunkered = {
        let Ok(mut p) = world.get::<&mut Passenger>(passenger) else {
            return;
        };
        p.transport = Some(transport);
        p.reserved = None;
        p.spec.bunkered_condition.clone()
    };
    if let Some(name) = bunkered {
        let token = match world.get::<&mut Conditions>(passenger) {
            Ok(mut cond) => cond.grant(&name),
            Err(_) => crate::components::ConditionToken::INVALID,
        };
        if let Ok(mut p) = world.get::<&mut Passenger>(passenger) {
            p.bunkered_token = token;
        }
    }

    if initialized {
        notifications.push(Notification::PassengerEntered {
            transport,
            passenger,
        });
    }
    if disappear {
        mutations.enqueue(Mutation::RemoveFromWorld { entity: passenger });
    }
    log::debug!("{passenger:?} boarded {transport:?}");
}

/// Static check: does this transport satisfy the unload preconditions?
/// Transient blockage (exit cells occupied) is not checked here; the unload
/// activity retries that case.
pub fn can_unload(world: &World, map: &GameMap, transport: Entity) -> bool {
    let Ok(cargo) = world.get::<&Cargo>(transport) else {
        return false;
    };
    if cargo.is_empty() {
        return false;
    }
    let Ok(pos) = world.get::<&crate::components::Position>(transport) else {
        return false;
    };
    let cell = pos.cell;
    if !cargo.spec.unload_terrain_types.is_empty() {
        let terrain = map.terrain_at(cell);
        if !cargo.spec.unload_terrain_types.contains(&terrain) {
            return false;
        }
    }
    map.adjacent_cells(cell)
        .into_iter()
        .any(|c| map.terrain_at(c).passable())
}

/// Pop the most recently boarded passenger, unwinding its conditions and
/// emitting the exit notification. Placement back on the map is the caller's
/// job (deferred). Returns the passenger, or `None` when empty.
pub fn unload(
    world: &mut World,
    mutations: &mut MutationQueue,
    notifications: &mut Notifications,
    players: &crate::components::Players,
    transport: Entity,
) -> Option<Entity> {
    let passenger = world.get::<&Cargo>(transport).ok()?.peek()?;
    let weight = weight_of(world, passenger);
    let kind = kind_of(world, passenger);

    let (revokes, now_empty, change_owner, passenger_facing) = {
        let mut cargo = world.get::<&mut Cargo>(transport).ok()?;
        cargo.pop(|_| weight)?;
        let mut revokes = Vec::new();
        if let Some(token) = cargo.loaded_tokens.pop() {
            revokes.push(token);
        }
        if let Some(kind) = &kind {
            if let Some(tokens) = cargo.passenger_tokens.get_mut(kind) {
                if let Some(token) = tokens.pop() {
                    revokes.push(token);
                }
            }
        }
        let now_empty = cargo.is_empty();
        if now_empty {
            cargo.state = BunkerState::NonBunkered;
        }
        (
            revokes,
            now_empty,
            cargo.spec.change_owner_when_garrison,
            cargo.spec.passenger_facing,
        )
    };

    if let Ok(mut cond) = world.get::<&mut Conditions>(transport) {
        for token in revokes {
            cond.revoke(token);
        }
    }

    // Passenger side: unlink, revoke the garrisoned condition, and face away
    // from the transport.
    let bunkered_token = {
        match world.get::<&mut Passenger>(passenger) {
            Ok(mut p) => {
                p.transport = None;
                let t = p.bunkered_token;
                p.bunkered_token = crate::components::ConditionToken::INVALID;
                t
            }
            Err(_) => crate::components::ConditionToken::INVALID,
        }
    };
    if bunkered_token.is_valid() {
        if let Ok(mut cond) = world.get::<&mut Conditions>(passenger) {
            cond.revoke(bunkered_token);
        }
    }
    let transport_facing = world.get::<&Facing>(transport).map(|f| f.0).unwrap_or(0);
    if let Ok(mut f) = world.get::<&mut Facing>(passenger) {
        f.0 = (transport_facing + passenger_facing) % garrison_logic::formation::FACING_FULL;
    }

    notifications.push(Notification::PassengerExited {
        transport,
        passenger,
    });
    if now_empty && change_owner {
        // The garrison emptied out; the structure reverts to neutral.
        mutations.enqueue(Mutation::ChangeOwner {
            entity: transport,
            owner: players.neutral,
        });
        notifications.push(Notification::StructureAbandoned { entity: transport });
    }
    log::debug!("{passenger:?} left {transport:?}");
    Some(passenger)
}

/// Unlink a passenger from a transport that is being destroyed or sold,
/// revoking its garrisoned self-condition.
pub fn release_passenger(world: &mut World, passenger: Entity) {
    let token = match world.get::<&mut Passenger>(passenger) {
        Ok(mut p) => {
            p.transport = None;
            let t = p.bunkered_token;
            p.bunkered_token = crate::components::ConditionToken::INVALID;
            t
        }
        Err(_) => return,
    };
    if token.is_valid() {
        if let Ok(mut cond) = world.get::<&mut Conditions>(passenger) {
            cond.revoke(token);
        }
    }
}

/// Forcibly remove a passenger that died while boarded, keeping the weight
/// and token accounting straight.
pub fn passenger_killed(world: &mut World, transport: Entity, passenger: Entity) {
    let weight = weight_of(world, passenger);
    let kind = kind_of(world, passenger);
    let revokes = {
        let Ok(mut cargo) = world.get::<&mut Cargo>(transport) else {
            return;
        };
        if !cargo.remove_passenger(passenger, weight) {
            return;
        }
        let mut revokes = Vec::new();
        if let Some(token) = cargo.loaded_tokens.pop() {
            revokes.push(token);
        }
        if let Some(kind) = &kind {
            if let Some(tokens) = cargo.passenger_tokens.get_mut(kind) {
                if let Some(token) = tokens.pop() {
                    revokes.push(token);
                }
            }
        }
        if cargo.is_empty() {
            cargo.state = BunkerState::NonBunkered;
        }
        revokes
    };
    if let Ok(mut cond) = world.get::<&mut Conditions>(transport) {
        for token in revokes {
            cond.revoke(token);
        }
    }
}

/// First-tick latch: link passengers loaded at construction to their
/// transport and emit the deferred entered notifications.
pub fn cargo_system(world: &mut World, notifications: &mut Notifications) {
    let fresh: Vec<Entity> = world
        .query_mut::<&Cargo>()
        .into_iter()
        .filter(|(_, c)| !c.initialized)
        .map(|(e, _)| e)
        .collect();

    for transport in fresh {
        let passengers: Vec<Entity> = {
            let Ok(mut cargo) = world.get::<&mut Cargo>(transport) else {
                continue;
            };
            cargo.initialized = true;
            cargo.passengers().collect()
        };
        for passenger in passengers {
            if let Ok(mut p) = world.get::<&mut Passenger>(passenger) {
                p.transport = Some(transport);
            }
            notifications.push(Notification::PassengerEntered {
                transport,
                passenger,
            });
        }
    }
}
