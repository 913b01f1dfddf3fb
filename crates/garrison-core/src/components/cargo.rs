//! Cargo container and passenger components.
//!
//! The container holds boarded passengers in last-in-first-out order under a
//! weight budget, with a separate reserved weight for passengers that are on
//! their way but have not boarded yet. The world-facing load/unload/reserve
//! operations live in [`crate::systems::cargo`]; this module is the state.

use std::collections::{HashMap, HashSet};

use garrison_logic::rules::{CargoRules, PassengerRules};
use hecs::Entity;

use super::conditions::ConditionToken;

/// Garrison open/closed state, driven by the first load and last unload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BunkerState {
    #[default]
    NonBunkered,
    Bunkered,
}

/// Transport/garrison container component.
#[derive(Debug)]
pub struct Cargo {
    pub spec: CargoRules,
    /// Boarded passengers; the last element boarded most recently and is the
    /// first to leave.
    stack: Vec<Entity>,
    reserves: HashSet<Entity>,
    total_weight: u32,
    reserved_weight: u32,
    pub(crate) loading_token: ConditionToken,
    pub(crate) loaded_tokens: Vec<ConditionToken>,
    pub(crate) passenger_tokens: HashMap<String, Vec<ConditionToken>>,
    pub(crate) state: BunkerState,
    /// First-tick latch: initial cargo links and notifications happen on the
    /// container's first tick, not at construction.
    pub(crate) initialized: bool,
}

impl Cargo {
    pub fn new(spec: CargoRules) -> Self {
        Self {
            spec,
            stack: Vec::new(),
            reserves: HashSet::new(),
            total_weight: 0,
            reserved_weight: 0,
            loading_token: ConditionToken::INVALID,
            loaded_tokens: Vec::new(),
            passenger_tokens: HashMap::new(),
            state: BunkerState::NonBunkered,
            initialized: false,
        }
    }

    /// Would a passenger of `weight` fit alongside current and reserved load?
    pub fn has_space(&self, weight: u32) -> bool {
        self.total_weight + self.reserved_weight + weight <= self.spec.max_weight
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn passenger_count(&self) -> usize {
        self.stack.len()
    }

    pub fn passengers(&self) -> impl Iterator<Item = Entity> + '_ {
        self.stack.iter().rev().copied()
    }

    /// The passenger that would leave next.
    pub fn peek(&self) -> Option<Entity> {
        self.stack.last().copied()
    }

    pub fn total_weight(&self) -> u32 {
        self.total_weight
    }

    pub fn reserved_weight(&self) -> u32 {
        self.reserved_weight
    }

    pub fn state(&self) -> BunkerState {
        self.state
    }

    pub fn has_reservation(&self, passenger: Entity) -> bool {
        self.reserves.contains(&passenger)
    }

    pub fn has_reservations(&self) -> bool {
        !self.reserves.is_empty()
    }

    pub fn accepts_type(&self, cargo_type: &str) -> bool {
        self.spec.types.is_empty() || self.spec.types.iter().any(|t| t == cargo_type)
    }

    // State transitions below are pub(crate): only the cargo system calls
    // them, keeping the weight invariant in one place.

    pub(crate) fn push(&mut self, passenger: Entity, weight: u32) {
        self.stack.push(passenger);
        self.total_weight += weight;
    }

    pub(crate) fn pop(&mut self, weight_of: impl Fn(Entity) -> u32) -> Option<Entity> {
        let passenger = self.stack.pop()?;
        self.total_weight -= weight_of(passenger);
        Some(passenger)
    }

    pub(crate) fn add_reserve(&mut self, passenger: Entity, weight: u32) {
        self.reserves.insert(passenger);
        self.reserved_weight += weight;
    }

    pub(crate) fn remove_reserve(&mut self, passenger: Entity, weight: u32) -> bool {
        if self.reserves.remove(&passenger) {
            self.reserved_weight -= weight;
            true
        } else {
            false
        }
    }

    /// Remove a specific passenger regardless of stack position.
    pub(crate) fn remove_passenger(&mut self, passenger: Entity, weight: u32) -> bool {
        let before = self.stack.len();
        self.stack.retain(|e| *e != passenger);
        if self.stack.len() != before {
            self.total_weight = self.total_weight.saturating_sub(weight);
            true
        } else {
            false
        }
    }

    pub(crate) fn drain_passengers(&mut self) -> Vec<Entity> {
        self.total_weight = 0;
        let mut stack = std::mem::take(&mut self.stack);
        stack.reverse();
        stack
    }
}

/// Passenger-side component: weight, type, and weak back-references to the
/// transport the unit is boarded in or reserved for.
#[derive(Debug)]
pub struct Passenger {
    pub spec: PassengerRules,
    /// Transport currently boarded in, if any.
    pub transport: Option<Entity>,
    /// Transport holding a reservation for this unit, if any.
    pub reserved: Option<Entity>,
    /// Token for the condition granted to the passenger itself while
    /// garrisoned.
    pub(crate) bunkered_token: ConditionToken,
}

impl Passenger {
    pub fn new(spec: PassengerRules) -> Self {
        Self {
            spec,
            transport: None,
            reserved: None,
            bunkered_token: ConditionToken::INVALID,
        }
    }

    pub fn weight(&self) -> u32 {
        self.spec.weight
    }
}
