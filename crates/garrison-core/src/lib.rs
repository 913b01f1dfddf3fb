//! Garrison Core - actor-coordination engine for a tick-based RTS simulation.
//!
//! Masters own bounded rosters of slave units that launch, return, rearm and
//! respawn; transports carry weight-limited cargo through a reserve/load/
//! unload state machine; a token ledger tracks stacked named conditions per
//! unit; and unit behavior runs as queues of interruptible, resumable
//! activities with world mutations deferred to the end of each tick.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System architecture via `hecs`:
//! - **Entities**: units (masters, slaves, transports, passengers)
//! - **Components**: pure data attached to entities (Position, Health,
//!   Conditions, Cargo, SpawnerMaster, ...)
//! - **Systems**: logic that queries and updates components once per tick
//!
//! # Example
//!
//! ```rust,no_run
//! use garrison_core::prelude::*;
//! use garrison_logic::cell::CellPos;
//! use garrison_logic::rules::Rules;
//!
//! let rules = Rules::from_json(include_str!("../../../data/rules.json")).unwrap();
//! let mut game = Game::new(rules, GameMap::new(64, 64), Players::default(), 1);
//!
//! let bunker = game.spawn_unit("bunker", PlayerId(1)).unwrap();
//! game.add_to_world(bunker, CellPos::new(10, 10));
//!
//! loop {
//!     game.tick();
//! }
//! ```

pub mod activity;
pub mod components;
pub mod engine;
pub mod events;
pub mod map;
pub mod mutation;
pub mod orders;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::{Game, GameError};
    pub use crate::events::Notification;
    pub use crate::map::GameMap;
    pub use crate::orders::Order;
}
