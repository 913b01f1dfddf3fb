//! Boarding activities: walking to a transport or back to a spawner master.

use hecs::Entity;

use crate::components::{InWorld, Position, SpawnerSlave};
use crate::mutation::Mutation;
use crate::systems::cargo;

use super::{Activity, ActivityCtx, MoveTo, Wait};

/// Walk to a transport and board it. The space reservation is made when the
/// order resolves, before this activity starts; the activity releases it on
/// cancel or when the transport disappears.
pub struct EnterTransport {
    transport: Entity,
}

impl EnterTransport {
    pub fn new(transport: Entity) -> Self {
        Self { transport }
    }

    fn abort(&self, ctx: &mut ActivityCtx<'_>) {
        cargo::unreserve_space(ctx.world, self.transport, ctx.self_entity);
    }
}

impl Activity for EnterTransport {
    fn tick(&mut self, ctx: &mut ActivityCtx<'_>) -> bool {
        let me = ctx.self_entity;
        if ctx.canceling {
            self.abort(ctx);
            return false;
        }
        if !ctx.world.contains(self.transport)
            || ctx.world.get::<&InWorld>(self.transport).is_err()
        {
            self.abort(ctx);
            return false;
        }
        let Some(cur) = ctx.position() else {
            self.abort(ctx);
            return false;
        };
        let Ok(dest) = ctx.world.get::<&Position>(self.transport).map(|p| p.cell) else {
            self.abort(ctx);
            return false;
        };

        if cur.distance(&dest) > 1 {
            ctx.queue_child(MoveTo::new(dest, 1));
            return true;
        }
        if cargo::can_load(ctx.world, self.transport, me) {
            cargo::load(
                ctx.world,
                ctx.mutations,
                ctx.notifications,
                self.transport,
                me,
            );
            return false;
        }
        // Adjacent but refused (airborne transport, space gone): back off and
        // try again shortly.
        ctx.queue_child(Wait::new(10, true));
        true
    }
}

/// Return a launched slave to its master. The docking itself runs at frame
/// end as a deferred pickup.
pub struct EnterMaster {
    master: Entity,
}

impl EnterMaster {
    pub fn new(master: Entity) -> Self {
        Self { master }
    }
}

impl Activity for EnterMaster {
    fn tick(&mut self, ctx: &mut ActivityCtx<'_>) -> bool {
        let me = ctx.self_entity;
        if ctx.canceling {
            return false;
        }
        if !ctx.world.contains(self.master) {
            return false;
        }
        // Links are checked again at pickup; a master that unlinked us while
        // we were in flight just means the trip ends here.
        let still_ours = ctx
            .world
            .get::<&SpawnerSlave>(me)
            .map(|s| s.master == Some(self.master))
            .unwrap_or(false);
        if !still_ours {
            return false;
        }
        let Some(cur) = ctx.position() else {
            return false;
        };
        let Ok(dest) = ctx.world.get::<&Position>(self.master).map(|p| p.cell) else {
            return false;
        };

        if cur.distance(&dest) > 1 {
            ctx.queue_child(MoveTo::new(dest, 1));
            return true;
        }
        ctx.mutations.enqueue(Mutation::PickupSlave {
            master: self.master,
            slave: me,
        });
        false
    }
}
