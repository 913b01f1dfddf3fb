//! Activity queue: interruptible, resumable behavior steps.
//!
//! Each tick the head activity of a unit runs once and reports whether it is
//! still going. Activities may queue a child (which runs to completion before
//! the parent resumes) and follow-up activities queue behind the current
//! chain. Cancellation is cooperative: it either clears an interruptible
//! chain outright or raises a flag the running activity observes at its next
//! tick boundary.

pub mod basic;
pub mod enter;
pub mod unload;

pub use basic::{MoveTo, Wait};
pub use enter::{EnterMaster, EnterTransport};
pub use unload::UnloadCargo;

use std::collections::VecDeque;

use garrison_logic::cell::CellPos;
use hecs::{Entity, World};
use rand::rngs::StdRng;

use crate::components::{Players, Position};
use crate::events::Notifications;
use crate::map::GameMap;
use crate::mutation::MutationQueue;

/// Everything an activity may touch during its tick. World mutations that
/// add or remove entities go through `mutations`, never inline.
pub struct ActivityCtx<'a> {
    pub world: &'a mut World,
    pub map: &'a mut GameMap,
    pub players: &'a Players,
    pub mutations: &'a mut MutationQueue,
    pub notifications: &'a mut Notifications,
    pub rng: &'a mut StdRng,
    pub self_entity: Entity,
    /// A cancel was requested but the head activity is not interruptible;
    /// activities should wind down when they see this.
    pub canceling: bool,
    queued_child: Option<Box<dyn Activity>>,
}

impl ActivityCtx<'_> {
    /// Queue a child activity; it becomes current before the caller resumes.
    pub fn queue_child<A: Activity + 'static>(&mut self, activity: A) {
        self.queued_child = Some(Box::new(activity));
    }

    pub fn position(&self) -> Option<CellPos> {
        self.world
            .get::<&Position>(self.self_entity)
            .ok()
            .map(|p| p.cell)
    }

    fn take_child(&mut self) -> Option<Box<dyn Activity>> {
        self.queued_child.take()
    }
}

/// One resumable behavior step.
pub trait Activity: Send + Sync {
    /// Advance one tick. `true` keeps the activity current; `false` completes
    /// it and advances the queue.
    fn tick(&mut self, ctx: &mut ActivityCtx<'_>) -> bool;

    /// Interruptible activities may be replaced by new orders and cleared by
    /// cancellation; non-interruptible ones always finish on their own terms.
    fn is_interruptible(&self) -> bool {
        true
    }
}

/// Per-entity activity queue component.
#[derive(Default)]
pub struct ActivityQueue {
    /// Current chain; children are pushed on top of their parent.
    stack: Vec<Box<dyn Activity>>,
    /// Follow-up activities run after the current chain completes.
    queued: VecDeque<Box<dyn Activity>>,
    cancel_requested: bool,
}

impl ActivityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.stack.is_empty() && self.queued.is_empty()
    }

    fn can_interrupt(&self) -> bool {
        self.stack.last().map_or(true, |a| a.is_interruptible())
    }

    /// Install a new top-level activity. With `queued` it runs after the
    /// current chain. Otherwise it cancels an interruptible chain and starts
    /// once that chain has wound down; against a non-interruptible chain the
    /// new activity is dropped. Returns whether the activity was accepted, so
    /// callers can undo any setup they did on its behalf.
    pub fn install(&mut self, activity: Box<dyn Activity>, queued: bool) -> bool {
        if queued {
            self.queued.push_back(activity);
            return true;
        }
        if self.stack.is_empty() {
            self.queued.clear();
            self.cancel_requested = false;
            self.stack.push(activity);
            true
        } else if self.can_interrupt() {
            self.queued.clear();
            self.queued.push_back(activity);
            self.cancel_requested = true;
            true
        } else {
            false
        }
    }

    /// Request cancellation. Follow-ups drop immediately; the running chain
    /// observes the flag at its next tick and unwinds its own side effects
    /// (reservations, links) on the way out. Non-interruptible activities
    /// ignore the flag and finish on their own terms.
    pub fn cancel(&mut self) {
        self.queued.clear();
        if self.stack.is_empty() {
            self.cancel_requested = false;
        } else {
            self.cancel_requested = true;
        }
    }

    pub(crate) fn tick_frame(&mut self, ctx: &mut ActivityCtx<'_>) {
        if self.stack.is_empty() {
            self.cancel_requested = false;
            match self.queued.pop_front() {
                Some(next) => self.stack.push(next),
                None => return,
            }
        }

        ctx.canceling = self.cancel_requested;
        let mut head = match self.stack.pop() {
            Some(head) => head,
            None => return,
        };
        let running = head.tick(ctx);
        if running {
            self.stack.push(head);
        }
        // A child queued during this tick becomes current either way.
        if let Some(child) = ctx.take_child() {
            self.stack.push(child);
        }
        if self.stack.is_empty() {
            self.cancel_requested = false;
        }
    }
}

/// Advance every unit's current activity by one tick.
pub fn activity_system(
    world: &mut World,
    map: &mut GameMap,
    players: &Players,
    mutations: &mut MutationQueue,
    notifications: &mut Notifications,
    rng: &mut StdRng,
) {
    let entities: Vec<Entity> = world
        .query_mut::<&ActivityQueue>()
        .into_iter()
        .filter(|(_, q)| !q.is_idle())
        .map(|(e, _)| e)
        .collect();

    for entity in entities {
        // Detach the queue so activities get full world access.
        let Ok(mut queue) = world.remove_one::<ActivityQueue>(entity) else {
            continue;
        };
        let mut ctx = ActivityCtx {
            world: &mut *world,
            map: &mut *map,
            players,
            mutations: &mut *mutations,
            notifications: &mut *notifications,
            rng: &mut *rng,
            self_entity: entity,
            canceling: false,
            queued_child: None,
        };
        queue.tick_frame(&mut ctx);
        if world.contains(entity) {
            let _ = world.insert_one(entity, queue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountDown {
        ticks: u32,
        interruptible: bool,
    }

    impl Activity for CountDown {
        fn tick(&mut self, ctx: &mut ActivityCtx<'_>) -> bool {
            if ctx.canceling && self.interruptible {
                return false;
            }
            if self.ticks == 0 {
                return false;
            }
            self.ticks -= 1;
            self.ticks > 0
        }

        fn is_interruptible(&self) -> bool {
            self.interruptible
        }
    }

    fn harness() -> (World, GameMap, MutationQueue, Notifications, StdRng, Entity) {
        use rand::SeedableRng;
        let mut world = World::new();
        let entity = world.spawn((Position::default(),));
        (
            world,
            GameMap::new(8, 8),
            MutationQueue::new(),
            Notifications::new(),
            StdRng::seed_from_u64(7),
            entity,
        )
    }

    fn run_one(
        queue: &mut ActivityQueue,
        world: &mut World,
        map: &mut GameMap,
        mutations: &mut MutationQueue,
        notifications: &mut Notifications,
        rng: &mut StdRng,
        entity: Entity,
    ) {
        let players = Players::default();
        let mut ctx = ActivityCtx {
            world,
            map,
            players: &players,
            mutations,
            notifications,
            rng,
            self_entity: entity,
            canceling: false,
            queued_child: None,
        };
        queue.tick_frame(&mut ctx);
    }

    #[test]
    fn test_queue_advances_to_next() {
        let (mut world, mut map, mut muts, mut notes, mut rng, e) = harness();
        let mut queue = ActivityQueue::new();
        queue.install(Box::new(CountDown { ticks: 1, interruptible: true }), false);
        queue.install(Box::new(CountDown { ticks: 1, interruptible: true }), true);

        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        assert!(!queue.is_idle());
        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_cancel_winds_down_interruptible_chain() {
        let (mut world, mut map, mut muts, mut notes, mut rng, e) = harness();
        let mut queue = ActivityQueue::new();
        queue.install(Box::new(CountDown { ticks: 5, interruptible: true }), false);
        queue.install(Box::new(CountDown { ticks: 5, interruptible: true }), true);
        queue.cancel();
        // Follow-ups are gone; the head gets one tick to unwind.
        assert_eq!(queue.queued.len(), 0);
        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_non_interruptible_finishes_before_chain_clears() {
        let (mut world, mut map, mut muts, mut notes, mut rng, e) = harness();
        let mut queue = ActivityQueue::new();
        queue.install(Box::new(CountDown { ticks: 2, interruptible: false }), false);
        queue.install(Box::new(CountDown { ticks: 9, interruptible: true }), true);

        queue.cancel();
        // Still running: the non-interruptible head must complete on its own.
        assert!(!queue.is_idle());
        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        assert!(!queue.is_idle());
        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        // Head finished; the queued follow-up was dropped by the cancel.
        assert!(queue.is_idle());
    }

    #[test]
    fn test_new_order_dropped_against_non_interruptible() {
        let (..) = harness();
        let mut queue = ActivityQueue::new();
        assert!(queue.install(Box::new(CountDown { ticks: 5, interruptible: false }), false));
        // Replacement refused; queued insertion still allowed.
        assert!(!queue.install(Box::new(CountDown { ticks: 1, interruptible: true }), false));
        assert_eq!(queue.queued.len(), 0);
        assert!(queue.install(Box::new(CountDown { ticks: 1, interruptible: true }), true));
        assert_eq!(queue.queued.len(), 1);
        assert_eq!(queue.stack.len(), 1);
    }

    #[test]
    fn test_replacement_starts_after_canceled_head_unwinds() {
        let (mut world, mut map, mut muts, mut notes, mut rng, e) = harness();
        let mut queue = ActivityQueue::new();
        queue.install(Box::new(CountDown { ticks: 5, interruptible: true }), false);
        queue.install(Box::new(CountDown { ticks: 2, interruptible: true }), false);
        // Old head observes the cancel and exits.
        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        assert_eq!(queue.stack.len(), 0);
        assert_eq!(queue.queued.len(), 1);
        // Replacement runs to completion.
        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        assert!(queue.is_idle());
    }

    struct QueuesChild {
        queued: bool,
    }

    impl Activity for QueuesChild {
        fn tick(&mut self, ctx: &mut ActivityCtx<'_>) -> bool {
            if !self.queued {
                self.queued = true;
                ctx.queue_child(CountDown { ticks: 1, interruptible: true });
                return true;
            }
            false
        }
    }

    #[test]
    fn test_child_runs_before_parent_resumes() {
        let (mut world, mut map, mut muts, mut notes, mut rng, e) = harness();
        let mut queue = ActivityQueue::new();
        queue.install(Box::new(QueuesChild { queued: false }), false);

        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        assert_eq!(queue.stack.len(), 2);
        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        assert_eq!(queue.stack.len(), 1);
        run_one(&mut queue, &mut world, &mut map, &mut muts, &mut notes, &mut rng, e);
        assert!(queue.is_idle());
    }
}
