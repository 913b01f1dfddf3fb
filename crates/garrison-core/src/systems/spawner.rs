//! Spawner operations: launch, recall, pickup, loss handling, and the
//! rearm/respawn timers.
//!
//! Timer invariant: a master runs at most one respawn countdown no matter
//! how many slots are empty. When it expires, every empty slot replenishes
//! in the same deferred batch; a loss while the countdown runs does not
//! restart it.

use garrison_logic::cell::CellPos;
use garrison_logic::formation;
use hecs::{Entity, World};
use rand::Rng;

use crate::components::{
    ConditionToken, Conditions, Owner, Position, SpawnerMaster, SpawnerSlave, TimedToken,
};
use crate::engine;
use crate::events::{Notification, Notifications};
use crate::mutation::{Mutation, MutationQueue};
use crate::orders::Order;

/// Grant the per-slave container conditions (loaded + per-kind contain) and
/// record the tokens on the master.
fn grant_contain_tokens(world: &mut World, master: Entity, kind: &str) {
    let (loaded_name, contain_name) = {
        let Ok(sm) = world.get::<&SpawnerMaster>(master) else {
            return;
        };
        (
            sm.spec.loaded_condition.clone(),
            sm.spec.contain_conditions.get(kind).cloned(),
        )
    };
    let mut loaded_token = None;
    let mut contain_token = None;
    if let Ok(mut cond) = world.get::<&mut Conditions>(master) {
        if let Some(name) = &loaded_name {
            loaded_token = Some(cond.grant(name));
        }
        if let Some(name) = &contain_name {
            contain_token = Some(cond.grant(name));
        }
    }
    if let Ok(mut sm) = world.get::<&mut SpawnerMaster>(master) {
        if let Some(token) = loaded_token {
            sm.loaded_tokens.push(token);
        }
        if let Some(token) = contain_token {
            sm.contain_tokens
                .entry(kind.to_string())
                .or_default()
                .push(token);
        }
    }
}

fn revoke_contain_tokens(world: &mut World, master: Entity, kind: &str) {
    let mut revokes: Vec<ConditionToken> = Vec::new();
    if let Ok(mut sm) = world.get::<&mut SpawnerMaster>(master) {
        if let Some(token) = sm.loaded_tokens.pop() {
            revokes.push(token);
        }
        if let Some(tokens) = sm.contain_tokens.get_mut(kind) {
            if let Some(token) = tokens.pop() {
                revokes.push(token);
            }
        }
    }
    if let Ok(mut cond) = world.get::<&mut Conditions>(master) {
        for token in revokes {
            cond.revoke(token);
        }
    }
}

/// Create a slave for `slot` and dock it. Panics if the slot is already
/// filled; callers guarantee the slot is invalid.
pub fn fill_slot(
    world: &mut World,
    rules: &garrison_logic::rules::Rules,
    master: Entity,
    slot: usize,
) -> Result<(), engine::GameError> {
    let kind = {
        let Ok(sm) = world.get::<&SpawnerMaster>(master) else {
            return Ok(());
        };
        let entry = &sm.slots()[slot];
        assert!(
            !entry.is_valid(),
            "fill_slot called on an occupied roster slot"
        );
        entry.kind.clone()
    };
    let owner = world
        .get::<&Owner>(master)
        .map(|o| o.0)
        .unwrap_or_default();

    let slave = engine::create_unit(world, rules, &kind, owner)?;
    let _ = world.insert_one(slave, SpawnerSlave { master: Some(master) });
    if let Ok(mut sm) = world.get::<&mut SpawnerMaster>(master) {
        let entry = &mut sm.slots[slot];
        entry.slave = Some(slave);
        entry.rearm_ticks = 0;
        entry.is_launched = false;
        entry.pending_replenish = false;
    }
    grant_contain_tokens(world, master, &kind);
    log::debug!("slot {slot} of {master:?} filled with {kind}");
    Ok(())
}

/// Deferred replenish from the respawn timer.
pub fn apply_replenish(
    world: &mut World,
    rules: &garrison_logic::rules::Rules,
    master: Entity,
    slot: usize,
) {
    if !world.contains(master) {
        return;
    }
    {
        let Ok(sm) = world.get::<&SpawnerMaster>(master) else {
            return;
        };
        if slot >= sm.slots().len() || sm.slots()[slot].is_valid() {
            return;
        }
    }
    if let Err(err) = fill_slot(world, rules, master, slot) {
        log::warn!("replenish of slot {slot} on {master:?} failed: {err}");
    }
}

/// Dock a returned slave. Returns false when the slave no longer belongs to
/// this master's roster.
pub fn pickup_slave(world: &mut World, master: Entity, slave: Entity) -> bool {
    let kind = {
        let Ok(mut sm) = world.get::<&mut SpawnerMaster>(master) else {
            return false;
        };
        let Some(slot) = sm.slot_of(slave) else {
            return false;
        };
        let rearm = sm.spec.rearm_ticks;
        let entry = &mut sm.slots[slot];
        entry.is_launched = false;
        entry.rearm_ticks = rearm;
        entry.kind.clone()
    };
    grant_contain_tokens(world, master, &kind);
    log::debug!("{slave:?} docked back into {master:?}");
    true
}

/// A slave died. Its slot invalidates and the single respawn timer starts
/// unless it is already running.
pub fn on_slave_killed(
    world: &mut World,
    notifications: &mut Notifications,
    master: Entity,
    slave: Entity,
) {
    let handled = {
        let Ok(mut sm) = world.get::<&mut SpawnerMaster>(master) else {
            return;
        };
        match sm.slot_of(slave) {
            Some(slot) => {
                let entry = &mut sm.slots[slot];
                let was_docked = !entry.is_launched;
                let kind = entry.kind.clone();
                entry.slave = None;
                entry.is_launched = false;
                entry.rearm_ticks = 0;
                if sm.respawn_ticks == 0 {
                    sm.respawn_ticks = sm.spec.respawn_ticks.max(1);
                }
                Some((was_docked, kind))
            }
            None => None,
        }
    };
    if let Some((was_docked, kind)) = handled {
        // A launched slave surrendered its tokens at launch time.
        if was_docked {
            revoke_contain_tokens(world, master, &kind);
        }
        notifications.push(Notification::SlaveKilled { master, slave });
        log::info!("slave {slave:?} of {master:?} lost");
    }
}

/// Attack trigger: retarget launched slaves and launch the first ready one
/// toward `target`. Placement and orders are deferred to frame end.
pub fn notify_attacking(
    world: &mut World,
    mutations: &mut MutationQueue,
    notifications: &mut Notifications,
    rng: &mut rand::rngs::StdRng,
    master: Entity,
    target: CellPos,
) {
    let launch = {
        let Ok(mut sm) = world.get::<&mut SpawnerMaster>(master) else {
            return;
        };
        for entry in sm.slots().iter() {
            if entry.is_launched {
                if let Some(slave) = entry.slave {
                    mutations.enqueue(Mutation::IssueOrder {
                        entity: slave,
                        order: Order::attack(target),
                    });
                }
            }
        }

        let Some(slot) = sm.get_launchable() else {
            return;
        };
        let Some(slave) = sm.slots[slot].slave else {
            return;
        };
        sm.slots[slot].is_launched = true;
        let spec = sm.spec.clone();
        if spec.consumed_on_launch {
            // One-shot: the slot empties now and the respawn timer covers
            // building the replacement.
            sm.slots[slot].slave = None;
            sm.slots[slot].is_launched = false;
            if sm.respawn_ticks == 0 {
                sm.respawn_ticks = spec.respawn_ticks.max(1);
            }
        }
        (slot, slave, sm.slots[slot].kind.clone(), spec)
    };
    let (slot, slave, kind, spec) = launch;

    revoke_contain_tokens(world, master, &kind);
    if let Some(name) = &spec.launching_condition {
        let token = match world.get::<&mut Conditions>(master) {
            Ok(mut cond) => Some(cond.grant(name)),
            Err(_) => None,
        };
        if let (Some(token), Ok(mut sm)) = (token, world.get::<&mut SpawnerMaster>(master)) {
            sm.timed_tokens.push(TimedToken {
                token,
                remaining: spec.launching_ticks.max(1),
            });
        }
    }

    let center = world
        .get::<&Position>(master)
        .map(|p| p.cell)
        .unwrap_or_default();
    let facings = spec.quantized_facings.max(1);
    let facing = formation::quantize_facing(rng.gen_range(0..facings), facings);
    let squad_index = slot as i32 - (spec.squad_size as i32 / 2);
    let cell = formation::spawn_cell(center, squad_index, facing, spec.squad_offset);

    mutations.enqueue(Mutation::AddToWorld { entity: slave, cell });
    mutations.enqueue(Mutation::SetFacing { entity: slave, facing });
    mutations.enqueue(Mutation::IssueOrder {
        entity: slave,
        order: Order::stop(),
    });
    mutations.enqueue(Mutation::IssueOrder {
        entity: slave,
        order: Order::attack(target),
    });
    notifications.push(Notification::SlaveLaunched { master, slave });
    log::info!("{master:?} launched {slave:?} at {cell:?}");
}

/// Idle trigger: recall every launched slave that is still alive.
pub fn recall(world: &mut World, mutations: &mut MutationQueue, master: Entity) {
    let Ok(sm) = world.get::<&SpawnerMaster>(master) else {
        return;
    };
    for entry in sm.slots().iter() {
        if entry.is_launched {
            if let Some(slave) = entry.slave {
                mutations.enqueue(Mutation::IssueOrder {
                    entity: slave,
                    order: Order::return_to_master(),
                });
            }
        }
    }
}

/// Per-tick timer upkeep for every master: rearm countdowns, timed
/// launching conditions, and the single respawn countdown.
pub fn spawner_system(world: &mut World, mutations: &mut MutationQueue) {
    let masters: Vec<Entity> = world
        .query_mut::<&SpawnerMaster>()
        .into_iter()
        .map(|(e, _)| e)
        .collect();

    for master in masters {
        let mut to_replenish: Vec<usize> = Vec::new();
        let mut expired: Vec<ConditionToken> = Vec::new();
        {
            let Ok(mut sm) = world.get::<&mut SpawnerMaster>(master) else {
                continue;
            };
            if sm.respawn_ticks > 0 {
                sm.respawn_ticks -= 1;
                if sm.respawn_ticks == 0 {
                    for slot in sm.unfilled_slots() {
                        sm.slots[slot].pending_replenish = true;
                        to_replenish.push(slot);
                    }
                }
            }
            for entry in &mut sm.slots {
                if entry.rearm_ticks > 0 {
                    entry.rearm_ticks -= 1;
                }
            }
            for timed in &mut sm.timed_tokens {
                timed.remaining = timed.remaining.saturating_sub(1);
            }
            let mut kept = Vec::new();
            for timed in sm.timed_tokens.drain(..) {
                if timed.remaining == 0 {
                    expired.push(timed.token);
                } else {
                    kept.push(timed);
                }
            }
            sm.timed_tokens = kept;
        }
        for slot in to_replenish {
            mutations.enqueue(Mutation::ReplenishSlot { master, slot });
        }
        if !expired.is_empty() {
            if let Ok(mut cond) = world.get::<&mut Conditions>(master) {
                for token in expired {
                    cond.revoke(token);
                }
            }
        }
    }
}
