//! Pure coordination logic for Garrison.
//!
//! This crate contains the data and math that is independent of any ECS,
//! engine, or runtime. Functions take plain data and return results, making
//! them unit-testable on their own and portable across the headless harness
//! and any future frontend.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`cell`] | Grid cells, adjacency, terrain types and passability |
//! | [`formation`] | Quantized facings and squad-offset geometry for launches |
//! | [`rules`] | Declarative per-unit-type configuration records (serde) |

pub mod cell;
pub mod formation;
pub mod rules;
