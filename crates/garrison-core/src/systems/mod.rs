//! World-facing systems that drive the cargo and spawner components.

pub mod cargo;
pub mod spawner;
