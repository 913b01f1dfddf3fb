//! Declarative per-unit-type configuration.
//!
//! Every master/cargo/passenger kind is parameterized by a static record
//! loaded once at definition time and immutable afterwards. The records
//! enumerate capacities, delays (in ticks), condition names to grant, terrain
//! restrictions, squad geometry, and behavior flags.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cell::TerrainType;

/// What happens to the live slaves when their master is destroyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlaveDisposal {
    /// Slaves are killed with the master.
    #[default]
    KillSlaves,
    /// Slaves lose their link and keep acting on their own.
    GiveFreedom,
    /// Slaves are left linked to a dead master; they expire on return.
    DoNothing,
}

/// Transport/garrison configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CargoRules {
    /// Maximum sum of passenger weights this unit can hold.
    pub max_weight: u32,
    /// Accepted `Passenger::cargo_type`s. Empty accepts everything.
    pub types: Vec<String>,
    /// Unit kinds spawned pre-boarded at creation.
    pub initial_units: Vec<String>,
    /// Evict passengers into the world when sold.
    pub eject_on_sell: bool,
    /// Evict (rather than kill) passengers when destroyed.
    pub eject_on_death: bool,
    /// Terrain the unit may unload onto. Empty allows all terrain.
    pub unload_terrain_types: Vec<TerrainType>,
    /// Ticks before the first passenger leaves.
    pub before_unload_delay: u32,
    /// Ticks spent idle after the last passenger left.
    pub after_unload_delay: u32,
    /// Condition granted while a reservation is outstanding.
    pub loading_condition: Option<String>,
    /// Condition granted per boarded passenger (stacks).
    pub loaded_condition: Option<String>,
    /// Conditions granted while specific unit kinds are boarded.
    pub passenger_conditions: HashMap<String, String>,
    /// Passengers leave the world while boarded.
    pub disappear_on_load: bool,
    /// Hand the unit to the neutral owner once the garrison empties.
    pub change_owner_when_garrison: bool,
    /// Facing delta applied to passengers as they exit.
    pub passenger_facing: u32,
}

impl Default for CargoRules {
    fn default() -> Self {
        Self {
            max_weight: 0,
            types: Vec::new(),
            initial_units: Vec::new(),
            eject_on_sell: true,
            eject_on_death: false,
            unload_terrain_types: Vec::new(),
            before_unload_delay: 8,
            after_unload_delay: 25,
            loading_condition: None,
            loaded_condition: None,
            passenger_conditions: HashMap::new(),
            disappear_on_load: true,
            change_owner_when_garrison: false,
            passenger_facing: 128,
        }
    }
}

/// Passenger-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PassengerRules {
    /// Capacity this passenger consumes in a transport.
    pub weight: u32,
    /// Matched against `CargoRules::types`.
    pub cargo_type: String,
    /// Condition granted to the passenger itself while garrisoned.
    pub bunkered_condition: Option<String>,
}

impl Default for PassengerRules {
    fn default() -> Self {
        Self {
            weight: 1,
            cargo_type: String::new(),
            bunkered_condition: None,
        }
    }
}

/// Master-side spawner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerRules {
    /// Slave unit kinds, one roster slot each.
    pub actors: Vec<String>,
    /// Ticks from a loss (or consuming launch) to replenishment.
    pub respawn_ticks: u32,
    /// Ticks a returned slave needs before it can launch again.
    pub rearm_ticks: u32,
    /// Condition granted right after a launch, revoked automatically.
    pub launching_condition: Option<String>,
    /// Lifetime of the launching condition, in ticks.
    pub launching_ticks: u32,
    /// Heal returning slaves to full on pickup.
    pub insta_repair: bool,
    /// Condition granted per contained slave (stacks).
    pub loaded_condition: Option<String>,
    /// Conditions granted while specific slave kinds are contained.
    pub contain_conditions: HashMap<String, String>,
    /// Members launched per trigger, spread by `squad_offset`.
    pub squad_size: u32,
    /// Lateral/fall-back spread between squad members, in cells.
    pub squad_offset: (i32, i32),
    /// Facing quantization steps for launch direction.
    pub quantized_facings: u32,
    /// The slave never returns; its slot is invalidated at launch and the
    /// respawn timer starts immediately (one-shot missiles).
    pub consumed_on_launch: bool,
    /// Slave fate when the master dies.
    pub slave_disposal: SlaveDisposal,
}

impl Default for SpawnerRules {
    fn default() -> Self {
        Self {
            actors: Vec::new(),
            respawn_ticks: 150,
            rearm_ticks: 150,
            launching_condition: None,
            launching_ticks: 15,
            insta_repair: true,
            loaded_condition: None,
            contain_conditions: HashMap::new(),
            squad_size: 1,
            squad_offset: (1, 1),
            quantized_facings: 32,
            consumed_on_launch: false,
            slave_disposal: SlaveDisposal::KillSlaves,
        }
    }
}

/// One unit type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitRules {
    pub health: u32,
    /// Airborne unit; must land before loading/unloading applies.
    pub flying: bool,
    pub cargo: Option<CargoRules>,
    pub passenger: Option<PassengerRules>,
    pub spawner: Option<SpawnerRules>,
}

impl Default for UnitRules {
    fn default() -> Self {
        Self {
            health: 100,
            flying: false,
            cargo: None,
            passenger: None,
            spawner: None,
        }
    }
}

/// The full immutable rule set, keyed by unit kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rules {
    pub units: HashMap<String, UnitRules>,
}

impl Rules {
    /// Parse rules from their JSON definition file.
    pub fn from_json(text: &str) -> Result<Self, RulesError> {
        let rules: Rules = serde_json::from_str(text)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn get(&self, kind: &str) -> Option<&UnitRules> {
        self.units.get(kind)
    }

    /// Cross-reference checks: cargo initial units and spawner rosters must
    /// name defined kinds, and passengers boarded anywhere need weights that
    /// could ever fit.
    pub fn validate(&self) -> Result<(), RulesError> {
        for (kind, unit) in &self.units {
            if let Some(cargo) = &unit.cargo {
                for initial in &cargo.initial_units {
                    let target = self
                        .units
                        .get(initial)
                        .ok_or_else(|| RulesError::UnknownKind {
                            referenced_by: kind.clone(),
                            kind: initial.clone(),
                        })?;
                    if target.passenger.is_none() {
                        return Err(RulesError::NotAPassenger {
                            referenced_by: kind.clone(),
                            kind: initial.clone(),
                        });
                    }
                }
            }
            if let Some(spawner) = &unit.spawner {
                for actor in &spawner.actors {
                    if !self.units.contains_key(actor) {
                        return Err(RulesError::UnknownKind {
                            referenced_by: kind.clone(),
                            kind: actor.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Errors raised while loading the rules file.
#[derive(Debug)]
pub enum RulesError {
    Json(serde_json::Error),
    UnknownKind { referenced_by: String, kind: String },
    NotAPassenger { referenced_by: String, kind: String },
}

impl From<serde_json::Error> for RulesError {
    fn from(e: serde_json::Error) -> Self {
        RulesError::Json(e)
    }
}

impl std::fmt::Display for RulesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulesError::Json(e) => write!(f, "rules parse error: {}", e),
            RulesError::UnknownKind {
                referenced_by,
                kind,
            } => write!(f, "{} references unknown unit kind {}", referenced_by, kind),
            RulesError::NotAPassenger {
                referenced_by,
                kind,
            } => write!(
                f,
                "{} lists {} as initial cargo but it has no passenger record",
                referenced_by, kind
            ),
        }
    }
}

impl std::error::Error for RulesError {}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "units": {
            "bunker": {
                "health": 500,
                "cargo": {
                    "max_weight": 10,
                    "types": ["infantry"],
                    "loaded_condition": "garrisoned",
                    "passenger_conditions": { "rifleman": "has-rifleman" }
                }
            },
            "rifleman": {
                "health": 80,
                "passenger": { "weight": 1, "cargo_type": "infantry" }
            }
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let rules = Rules::from_json(SAMPLE).unwrap();
        let bunker = rules.get("bunker").unwrap();
        let cargo = bunker.cargo.as_ref().unwrap();
        assert_eq!(cargo.max_weight, 10);
        assert_eq!(cargo.before_unload_delay, 8);
        assert!(cargo.eject_on_sell);
        assert_eq!(
            cargo.passenger_conditions.get("rifleman").unwrap(),
            "has-rifleman"
        );
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let rules = Rules::from_json(r#"{ "units": { "crate": {} } }"#).unwrap();
        let unit = rules.get("crate").unwrap();
        assert_eq!(unit.health, 100);
        assert!(unit.cargo.is_none());
    }

    #[test]
    fn test_unknown_initial_unit_rejected() {
        let bad = r#"{
            "units": {
                "bunker": { "cargo": { "max_weight": 5, "initial_units": ["ghost"] } }
            }
        }"#;
        match Rules::from_json(bad) {
            Err(RulesError::UnknownKind { kind, .. }) => assert_eq!(kind, "ghost"),
            other => panic!("expected UnknownKind, got {:?}", other),
        }
    }

    #[test]
    fn test_initial_unit_must_be_passenger() {
        let bad = r#"{
            "units": {
                "bunker": { "cargo": { "max_weight": 5, "initial_units": ["rock"] } },
                "rock": {}
            }
        }"#;
        assert!(matches!(
            Rules::from_json(bad),
            Err(RulesError::NotAPassenger { .. })
        ));
    }

    #[test]
    fn test_spawner_roster_validated() {
        let bad = r#"{
            "units": { "carrier": { "spawner": { "actors": ["drone"] } } }
        }"#;
        assert!(matches!(
            Rules::from_json(bad),
            Err(RulesError::UnknownKind { .. })
        ));
    }
}
