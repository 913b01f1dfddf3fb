//! Wait and movement primitives used as children by the composite activities.

use garrison_logic::cell::CellPos;

use crate::components::{Flying, InWorld, Position};

use super::{Activity, ActivityCtx};

/// Idle for a fixed number of ticks.
pub struct Wait {
    remaining: u32,
    interruptible: bool,
}

impl Wait {
    pub fn new(ticks: u32, interruptible: bool) -> Self {
        Self {
            remaining: ticks,
            interruptible,
        }
    }
}

impl Activity for Wait {
    fn tick(&mut self, ctx: &mut ActivityCtx<'_>) -> bool {
        if ctx.canceling && self.interruptible {
            return false;
        }
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.remaining > 0
    }

    fn is_interruptible(&self) -> bool {
        self.interruptible
    }
}

/// Greedy single-step movement toward a destination cell.
///
/// Not a pathfinder: each tick the unit takes the step that closes the most
/// distance, sidestepping to a neighbour when the direct cell is blocked.
/// Finishes once within `range` cells of the destination.
pub struct MoveTo {
    dest: CellPos,
    range: u32,
}

impl MoveTo {
    pub fn new(dest: CellPos, range: u32) -> Self {
        Self { dest, range }
    }
}

impl Activity for MoveTo {
    fn tick(&mut self, ctx: &mut ActivityCtx<'_>) -> bool {
        if ctx.canceling {
            return false;
        }
        let me = ctx.self_entity;
        if ctx.world.get::<&InWorld>(me).is_err() {
            return false;
        }
        let Some(cur) = ctx.position() else {
            return false;
        };
        if cur.distance(&self.dest) <= self.range {
            return false;
        }

        let airborne = ctx
            .world
            .get::<&Flying>(me)
            .map(|f| f.airborne)
            .unwrap_or(false);
        let direct = cur.step_toward(&self.dest);
        let next = if airborne || ctx.map.can_enter(direct) {
            Some(direct)
        } else {
            // Sidestep: closest enterable neighbour that still closes distance.
            let here = cur.distance(&self.dest);
            ctx.map
                .adjacent_cells(cur)
                .into_iter()
                .filter(|c| ctx.map.can_enter(*c))
                .filter(|c| c.distance(&self.dest) < here)
                .min_by_key(|c| c.distance(&self.dest))
        };

        if let Some(next) = next {
            ctx.map.move_occupant(cur, next, me);
            if let Ok(mut pos) = ctx.world.get::<&mut Position>(me) {
                pos.cell = next;
            }
        }
        // Blocked on all sides: stay put and retry next tick.
        true
    }
}
