//! Staged unload of a cargo container.
//!
//! Approach (optional move, landing for aircraft), a non-interruptible
//! pre-unload delay, one passenger per tick while exit cells are available
//! (with a short retry wait when every exit is blocked), then a post-unload
//! delay before the transport is usable again.

use garrison_logic::cell::CellPos;
use rand::seq::SliceRandom;

use crate::components::{Cargo, Flying};
use crate::events::Notification;
use crate::mutation::Mutation;
use crate::systems::cargo;

use super::{Activity, ActivityCtx, MoveTo, Wait};

enum Phase {
    Approach,
    PreDelay,
    Unloading,
    PostDelay,
    Done,
}

pub struct UnloadCargo {
    destination: Option<CellPos>,
    unload_all: bool,
    phase: Phase,
    /// The transport was airborne before landing to unload and should take
    /// off again afterwards.
    relaunch: bool,
}

impl UnloadCargo {
    pub fn new(destination: Option<CellPos>, unload_all: bool) -> Self {
        Self {
            destination,
            unload_all,
            phase: Phase::Approach,
            relaunch: false,
        }
    }
}

impl Activity for UnloadCargo {
    fn tick(&mut self, ctx: &mut ActivityCtx<'_>) -> bool {
        if ctx.canceling {
            return false;
        }
        let me = ctx.self_entity;

        match self.phase {
            Phase::Approach => {
                self.phase = Phase::PreDelay;
                if let Some(dest) = self.destination {
                    let dest = ctx.map.clamp(dest);
                    ctx.queue_child(MoveTo::new(dest, 0));
                    return true;
                }
                true
            }
            Phase::PreDelay => {
                if let Ok(mut flying) = ctx.world.get::<&mut Flying>(me) {
                    if flying.airborne {
                        flying.airborne = false;
                        self.relaunch = true;
                    }
                }
                let delay = ctx
                    .world
                    .get::<&Cargo>(me)
                    .map(|c| c.spec.before_unload_delay)
                    .unwrap_or(0);
                self.phase = Phase::Unloading;
                if delay > 0 {
                    ctx.queue_child(Wait::new(delay, false));
                }
                true
            }
            Phase::Unloading => {
                let (empty, after_delay) = match ctx.world.get::<&Cargo>(me) {
                    Ok(c) => (c.is_empty(), c.spec.after_unload_delay),
                    Err(_) => return false,
                };
                if empty || !cargo::can_unload(ctx.world, ctx.map, me) {
                    self.phase = Phase::PostDelay;
                    if after_delay > 0 {
                        ctx.queue_child(Wait::new(after_delay, false));
                    }
                    return true;
                }

                // Exit cells are contested; pick one of the free ones at
                // random, or back off briefly when they are all taken.
                let Some(center) = ctx.position() else {
                    return false;
                };
                let mut exits: Vec<CellPos> = ctx
                    .map
                    .adjacent_cells(center)
                    .into_iter()
                    .filter(|c| ctx.map.can_enter(*c))
                    .collect();
                if exits.is_empty() {
                    ctx.queue_child(Wait::new(10, true));
                    return true;
                }
                exits.shuffle(ctx.rng);
                let exit = exits[0];

                if let Some(passenger) = cargo::unload(
                    ctx.world,
                    ctx.mutations,
                    ctx.notifications,
                    ctx.players,
                    me,
                ) {
                    ctx.mutations.enqueue(Mutation::AddToWorld {
                        entity: passenger,
                        cell: exit,
                    });
                }
                if !self.unload_all {
                    self.phase = Phase::PostDelay;
                    if after_delay > 0 {
                        ctx.queue_child(Wait::new(after_delay, false));
                    }
                }
                true
            }
            Phase::PostDelay => {
                self.phase = Phase::Done;
                if self.relaunch {
                    if let Ok(mut flying) = ctx.world.get::<&mut Flying>(me) {
                        flying.airborne = true;
                    }
                }
                ctx.notifications
                    .push(Notification::DeployComplete { entity: me });
                false
            }
            Phase::Done => false,
        }
    }
}
