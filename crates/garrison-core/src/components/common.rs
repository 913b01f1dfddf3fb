//! Common components used across multiple unit types.

use garrison_logic::cell::CellPos;

/// Player identity. Owners are opaque to the core; only equality matters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PlayerId(pub u32);

/// The world-owned owner registry. Passed in at construction instead of
/// reached for through ambient state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Players {
    /// Receives abandoned garrisons.
    pub neutral: PlayerId,
}

/// Ownership component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub PlayerId);

/// The unit kind this entity was defined as, keying into the rules.
#[derive(Debug, Clone)]
pub struct UnitKind(pub String);

/// Map cell the unit stands on. Meaningful only while the entity carries the
/// [`InWorld`] marker; otherwise it is the last known cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct Position {
    pub cell: CellPos,
}

/// Facing on the 256-unit circle.
#[derive(Debug, Clone, Copy, Default)]
pub struct Facing(pub u32);

/// Marker: the entity is present in the live world (occupancy and spatial
/// indices). Boarded passengers and docked slaves exist without it.
#[derive(Debug, Clone, Copy, Default)]
pub struct InWorld;

/// Airborne unit state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flying {
    pub airborne: bool,
}

/// Coarse damage classification, quartiles of remaining hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DamageState {
    Undamaged,
    Light,
    Heavy,
    Critical,
    Dead,
}

/// Hit points.
#[derive(Debug, Clone, Copy)]
pub struct Health {
    pub hp: u32,
    pub max_hp: u32,
}

impl Health {
    pub fn new(max_hp: u32) -> Self {
        Self { hp: max_hp, max_hp }
    }

    pub fn damage_state(&self) -> DamageState {
        if self.hp == 0 {
            DamageState::Dead
        } else if self.hp * 4 <= self.max_hp {
            DamageState::Critical
        } else if self.hp * 2 <= self.max_hp {
            DamageState::Heavy
        } else if self.hp * 4 <= self.max_hp * 3 {
            DamageState::Light
        } else {
            DamageState::Undamaged
        }
    }

    /// Apply damage (negative heals). Clamps to `0..=max_hp`.
    pub fn inflict(&mut self, amount: i32) {
        let hp = self.hp as i64 - amount as i64;
        self.hp = hp.clamp(0, self.max_hp as i64) as u32;
    }

    pub fn is_dead(&self) -> bool {
        self.hp == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_states_by_quartile() {
        let mut h = Health::new(100);
        assert_eq!(h.damage_state(), DamageState::Undamaged);
        h.inflict(30);
        assert_eq!(h.damage_state(), DamageState::Light);
        h.inflict(25);
        assert_eq!(h.damage_state(), DamageState::Heavy);
        h.inflict(25);
        assert_eq!(h.damage_state(), DamageState::Critical);
        h.inflict(100);
        assert_eq!(h.damage_state(), DamageState::Dead);
        assert!(h.is_dead());
    }

    #[test]
    fn test_heal_clamps_to_max() {
        let mut h = Health::new(50);
        h.inflict(20);
        h.inflict(-1000);
        assert_eq!(h.hp, 50);
    }
}
