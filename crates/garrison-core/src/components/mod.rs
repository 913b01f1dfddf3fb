//! Component definitions for all entity types.

pub mod cargo;
pub mod common;
pub mod conditions;
pub mod spawner;

pub use cargo::*;
pub use common::*;
pub use conditions::*;
pub use spawner::*;
