//! End-to-end scenarios driving the full tick pipeline: boarding, unloading,
//! garrison capture, spawner launch/recall cycles, and loss recovery.

use garrison_core::activity::{ActivityQueue, Wait};
use garrison_core::components::{Cargo, Conditions, Owner, SpawnerMaster};
use garrison_core::prelude::*;
use garrison_logic::cell::CellPos;
use garrison_logic::rules::{
    CargoRules, PassengerRules, Rules, SlaveDisposal, SpawnerRules, UnitRules,
};

fn rules() -> Rules {
    let mut rules = Rules::default();
    rules.units.insert(
        "heavy".into(),
        UnitRules {
            passenger: Some(PassengerRules {
                weight: 6,
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules.units.insert(
        "squad".into(),
        UnitRules {
            passenger: Some(PassengerRules {
                weight: 5,
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules.units.insert(
        "rifleman".into(),
        UnitRules {
            passenger: Some(PassengerRules {
                weight: 1,
                bunkered_condition: Some("garrisoned".into()),
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules.units.insert(
        "truck".into(),
        UnitRules {
            cargo: Some(CargoRules {
                max_weight: 10,
                loading_condition: Some("loading".into()),
                loaded_condition: Some("loaded".into()),
                before_unload_delay: 2,
                after_unload_delay: 3,
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules.units.insert(
        "manned_truck".into(),
        UnitRules {
            cargo: Some(CargoRules {
                max_weight: 10,
                initial_units: vec!["rifleman".into(), "rifleman".into()],
                loaded_condition: Some("loaded".into()),
                before_unload_delay: 2,
                after_unload_delay: 3,
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules.units.insert(
        "cramped_truck".into(),
        UnitRules {
            cargo: Some(CargoRules {
                max_weight: 10,
                initial_units: vec!["rifleman".into()],
                before_unload_delay: 0,
                after_unload_delay: 0,
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules.units.insert(
        "sealed_truck".into(),
        UnitRules {
            cargo: Some(CargoRules {
                max_weight: 10,
                initial_units: vec!["rifleman".into(), "rifleman".into()],
                eject_on_sell: false,
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules.units.insert(
        "bunker".into(),
        UnitRules {
            health: 400,
            cargo: Some(CargoRules {
                max_weight: 2,
                change_owner_when_garrison: true,
                before_unload_delay: 1,
                after_unload_delay: 1,
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules.units.insert(
        "apc".into(),
        UnitRules {
            cargo: Some(CargoRules {
                max_weight: 4,
                initial_units: vec!["rifleman".into(), "rifleman".into()],
                eject_on_death: true,
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules.units.insert(
        "drone".into(),
        UnitRules {
            health: 50,
            flying: true,
            ..Default::default()
        },
    );
    rules.units.insert(
        "carrier".into(),
        UnitRules {
            health: 500,
            spawner: Some(SpawnerRules {
                actors: vec!["drone".into(), "drone".into(), "drone".into()],
                respawn_ticks: 6,
                rearm_ticks: 4,
                loaded_condition: Some("hangar".into()),
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules.units.insert(
        "missile".into(),
        UnitRules {
            health: 30,
            flying: true,
            ..Default::default()
        },
    );
    rules.units.insert(
        "platform".into(),
        UnitRules {
            spawner: Some(SpawnerRules {
                actors: vec!["missile".into()],
                respawn_ticks: 6,
                consumed_on_launch: true,
                launching_condition: Some("launching".into()),
                launching_ticks: 3,
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules.units.insert(
        "free_platform".into(),
        UnitRules {
            spawner: Some(SpawnerRules {
                actors: vec!["missile".into()],
                slave_disposal: SlaveDisposal::GiveFreedom,
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    rules
}

fn game() -> Game {
    Game::new(rules(), GameMap::new(32, 32), Players::default(), 42)
}

fn denied(notes: &[Notification], entity: hecs::Entity) -> bool {
    notes
        .iter()
        .any(|n| matches!(n, Notification::OrderDenied { entity: e, .. } if *e == entity))
}

#[test]
fn test_reservation_counts_against_weight_budget() {
    let mut game = game();
    let truck = game.spawn_unit("truck", PlayerId(1)).unwrap();
    game.add_to_world(truck, CellPos::new(10, 10));
    let heavy = game.spawn_unit("heavy", PlayerId(1)).unwrap();
    game.add_to_world(heavy, CellPos::new(8, 10));
    let squad = game.spawn_unit("squad", PlayerId(1)).unwrap();
    game.add_to_world(squad, CellPos::new(12, 10));

    game.issue_order(heavy, Order::enter_garrison(truck));
    {
        let cargo = game.world.get::<&Cargo>(truck).unwrap();
        assert_eq!(cargo.reserved_weight(), 6);
        assert!(cargo.has_reservation(heavy));
    }
    assert!(game.world.get::<&Conditions>(truck).unwrap().has("loading"));
    game.drain_notifications();

    // 6 reserved + 5 would exceed the budget of 10.
    game.issue_order(squad, Order::enter_garrison(truck));
    assert!(denied(&game.drain_notifications(), squad));

    for _ in 0..30 {
        game.tick();
    }
    assert!(!game.is_in_world(heavy));
    {
        let cargo = game.world.get::<&Cargo>(truck).unwrap();
        assert_eq!(cargo.total_weight(), 6);
        assert_eq!(cargo.reserved_weight(), 0);
    }
    // The reservation became boarded weight; the budget is still exceeded.
    assert!(!game.world.get::<&Conditions>(truck).unwrap().has("loading"));
    game.issue_order(squad, Order::enter_garrison(truck));
    assert!(denied(&game.drain_notifications(), squad));
}

#[test]
fn test_stop_releases_reservation() {
    let mut game = game();
    let truck = game.spawn_unit("truck", PlayerId(1)).unwrap();
    game.add_to_world(truck, CellPos::new(10, 10));
    let heavy = game.spawn_unit("heavy", PlayerId(1)).unwrap();
    game.add_to_world(heavy, CellPos::new(4, 10));
    let squad = game.spawn_unit("squad", PlayerId(1)).unwrap();
    game.add_to_world(squad, CellPos::new(12, 10));

    game.issue_order(heavy, Order::enter_garrison(truck));
    game.issue_order(heavy, Order::stop());
    for _ in 0..3 {
        game.tick();
    }
    assert_eq!(game.world.get::<&Cargo>(truck).unwrap().reserved_weight(), 0);
    assert!(!game.world.get::<&Conditions>(truck).unwrap().has("loading"));

    game.drain_notifications();
    game.issue_order(squad, Order::enter_garrison(truck));
    assert!(!denied(&game.drain_notifications(), squad));
}

#[test]
fn test_refused_boarding_order_leaves_no_reservation() {
    let mut game = game();
    let truck = game.spawn_unit("truck", PlayerId(1)).unwrap();
    game.add_to_world(truck, CellPos::new(10, 10));
    let heavy = game.spawn_unit("heavy", PlayerId(1)).unwrap();
    game.add_to_world(heavy, CellPos::new(8, 10));
    let squad = game.spawn_unit("squad", PlayerId(1)).unwrap();
    game.add_to_world(squad, CellPos::new(12, 10));

    // The unit is committed to something it cannot break out of.
    game.world
        .get::<&mut ActivityQueue>(heavy)
        .unwrap()
        .install(Box::new(Wait::new(30, false)), false);

    game.issue_order(heavy, Order::enter_garrison(truck));
    assert!(denied(&game.drain_notifications(), heavy));
    {
        let cargo = game.world.get::<&Cargo>(truck).unwrap();
        assert_eq!(cargo.reserved_weight(), 0);
        assert!(!cargo.has_reservation(heavy));
    }
    assert!(!game.world.get::<&Conditions>(truck).unwrap().has("loading"));

    // Capacity stays available to everyone else.
    game.issue_order(squad, Order::enter_garrison(truck));
    assert!(!denied(&game.drain_notifications(), squad));
}

#[test]
fn test_unload_is_lifo_with_delays() {
    let mut game = game();
    let truck = game.spawn_unit("manned_truck", PlayerId(1)).unwrap();
    game.add_to_world(truck, CellPos::new(10, 10));
    game.tick();

    let expected: Vec<hecs::Entity> = game
        .world
        .get::<&Cargo>(truck)
        .unwrap()
        .passengers()
        .collect();
    assert_eq!(expected.len(), 2);
    assert_eq!(game.world.get::<&Conditions>(truck).unwrap().count("loaded"), 2);
    game.drain_notifications();

    game.issue_order(truck, Order::unload());
    for _ in 0..30 {
        game.tick();
    }

    let exits: Vec<hecs::Entity> = game
        .drain_notifications()
        .into_iter()
        .filter_map(|n| match n {
            Notification::PassengerExited { passenger, .. } => Some(passenger),
            _ => None,
        })
        .collect();
    assert_eq!(exits, expected);
    assert!(game.world.get::<&Cargo>(truck).unwrap().is_empty());
    assert_eq!(game.world.get::<&Conditions>(truck).unwrap().count("loaded"), 0);
    for passenger in expected {
        assert!(game.is_in_world(passenger));
    }
}

#[test]
fn test_garrison_captures_and_reverts_to_neutral() {
    let mut game = game();
    let bunker = game.spawn_unit("bunker", PlayerId(1)).unwrap();
    game.add_to_world(bunker, CellPos::new(10, 10));
    let rifleman = game.spawn_unit("rifleman", PlayerId(2)).unwrap();
    game.add_to_world(rifleman, CellPos::new(8, 10));

    game.issue_order(rifleman, Order::enter_garrison(bunker));
    for _ in 0..20 {
        game.tick();
    }
    assert!(!game.is_in_world(rifleman));
    assert_eq!(game.world.get::<&Owner>(bunker).unwrap().0, PlayerId(2));
    assert!(game
        .world
        .get::<&Conditions>(rifleman)
        .unwrap()
        .has("garrisoned"));
    game.drain_notifications();

    game.issue_order(bunker, Order::unload());
    for _ in 0..20 {
        game.tick();
    }
    assert!(game.is_in_world(rifleman));
    assert!(!game
        .world
        .get::<&Conditions>(rifleman)
        .unwrap()
        .has("garrisoned"));
    // Empty garrison reverts to the neutral owner.
    assert_eq!(game.world.get::<&Owner>(bunker).unwrap().0, PlayerId(0));
    assert!(game
        .drain_notifications()
        .iter()
        .any(|n| matches!(n, Notification::StructureAbandoned { entity } if *entity == bunker)));
}

#[test]
fn test_losses_share_a_single_respawn_timer() {
    let mut game = game();
    let carrier = game.spawn_unit("carrier", PlayerId(1)).unwrap();
    game.add_to_world(carrier, CellPos::new(10, 10));
    {
        let sm = game.world.get::<&SpawnerMaster>(carrier).unwrap();
        assert!(sm.slots().iter().all(|s| s.is_valid()));
        assert!(!sm.respawn_timer_running());
    }
    assert_eq!(game.world.get::<&Conditions>(carrier).unwrap().count("hangar"), 3);

    let first = game.world.get::<&SpawnerMaster>(carrier).unwrap().slots()[0]
        .slave
        .unwrap();
    game.kill(first);
    assert!(game
        .world
        .get::<&SpawnerMaster>(carrier)
        .unwrap()
        .respawn_timer_running());
    assert!(game
        .drain_notifications()
        .iter()
        .any(|n| matches!(n, Notification::SlaveKilled { slave, .. } if *slave == first)));

    // A second loss mid-countdown rides the same timer.
    for _ in 0..3 {
        game.tick();
    }
    let second = game.world.get::<&SpawnerMaster>(carrier).unwrap().slots()[1]
        .slave
        .unwrap();
    game.kill(second);

    for _ in 0..3 {
        game.tick();
    }
    let sm = game.world.get::<&SpawnerMaster>(carrier).unwrap();
    assert!(sm.slots().iter().all(|s| s.is_valid()));
    assert!(!sm.respawn_timer_running());
}

#[test]
fn test_launch_recall_pickup_repairs_and_rearms() {
    let mut game = game();
    let carrier = game.spawn_unit("carrier", PlayerId(1)).unwrap();
    game.add_to_world(carrier, CellPos::new(10, 10));

    game.notify_attacking(carrier, CellPos::new(20, 20));
    let launched: Vec<hecs::Entity> = game
        .drain_notifications()
        .into_iter()
        .filter_map(|n| match n {
            Notification::SlaveLaunched { slave, .. } => Some(slave),
            _ => None,
        })
        .collect();
    assert_eq!(launched.len(), 1);
    let drone = launched[0];
    assert!(game.is_in_world(drone));
    // Containment conditions drop while the drone is out.
    assert_eq!(game.world.get::<&Conditions>(carrier).unwrap().count("hangar"), 2);

    for _ in 0..5 {
        game.tick();
    }
    game.inflict_damage(drone, 30);

    game.notify_idle(carrier);
    for _ in 0..40 {
        game.tick();
    }
    assert!(!game.is_in_world(drone));
    let health = game
        .world
        .get::<&garrison_core::components::Health>(drone)
        .unwrap();
    assert_eq!(health.hp, health.max_hp);
    drop(health);
    assert_eq!(game.world.get::<&Conditions>(carrier).unwrap().count("hangar"), 3);
    let sm = game.world.get::<&SpawnerMaster>(carrier).unwrap();
    assert!(sm.slots().iter().all(|s| !s.is_launched));
}

#[test]
fn test_consuming_launch_invalidates_slot_and_times_condition() {
    let mut game = game();
    let platform = game.spawn_unit("platform", PlayerId(1)).unwrap();
    game.add_to_world(platform, CellPos::new(10, 10));

    game.notify_attacking(platform, CellPos::new(25, 25));
    {
        let sm = game.world.get::<&SpawnerMaster>(platform).unwrap();
        assert!(!sm.slots()[0].is_valid());
        assert!(sm.respawn_timer_running());
    }
    assert!(game.world.get::<&Conditions>(platform).unwrap().has("launching"));

    for _ in 0..4 {
        game.tick();
    }
    assert!(!game.world.get::<&Conditions>(platform).unwrap().has("launching"));

    for _ in 0..4 {
        game.tick();
    }
    let sm = game.world.get::<&SpawnerMaster>(platform).unwrap();
    assert!(sm.slots()[0].is_valid());
    assert!(!sm.respawn_timer_running());
}

#[test]
fn test_blocked_exits_retry_until_a_cell_frees_up() {
    let mut game = game();
    let truck = game.spawn_unit("cramped_truck", PlayerId(1)).unwrap();
    let center = CellPos::new(5, 5);
    game.add_to_world(truck, center);

    let mut blockers = Vec::new();
    for cell in game.map.adjacent_cells(center) {
        let blocker = game.spawn_unit("squad", PlayerId(2)).unwrap();
        game.add_to_world(blocker, cell);
        blockers.push(blocker);
    }
    let passenger = game
        .world
        .get::<&Cargo>(truck)
        .unwrap()
        .peek()
        .unwrap();

    game.issue_order(truck, Order::unload());
    for _ in 0..5 {
        game.tick();
    }
    assert!(!game.is_in_world(passenger));
    assert!(!game.world.get::<&Cargo>(truck).unwrap().is_empty());

    let freed = game.position_of(blockers[0]).unwrap();
    game.kill(blockers[0]);
    for _ in 0..15 {
        game.tick();
    }
    assert!(game.is_in_world(passenger));
    assert_eq!(game.position_of(passenger), Some(freed));
}

#[test]
fn test_transport_death_ejects_or_destroys_cargo() {
    let mut game = game();
    let apc = game.spawn_unit("apc", PlayerId(1)).unwrap();
    game.add_to_world(apc, CellPos::new(10, 10));
    game.tick();
    let survivors: Vec<hecs::Entity> = game
        .world
        .get::<&Cargo>(apc)
        .unwrap()
        .passengers()
        .collect();

    game.kill(apc);
    assert!(!game.world.contains(apc));
    for passenger in &survivors {
        assert!(game.is_in_world(*passenger));
    }

    // Without eject-on-death the garrison dies with the transport.
    let truck = game.spawn_unit("manned_truck", PlayerId(1)).unwrap();
    game.add_to_world(truck, CellPos::new(20, 20));
    game.tick();
    let doomed: Vec<hecs::Entity> = game
        .world
        .get::<&Cargo>(truck)
        .unwrap()
        .passengers()
        .collect();
    game.kill(truck);
    for passenger in doomed {
        assert!(!game.world.contains(passenger));
    }
}

#[test]
fn test_sell_disposes_garrison_and_roster() {
    let mut game = game();
    let truck = game.spawn_unit("manned_truck", PlayerId(1)).unwrap();
    game.add_to_world(truck, CellPos::new(10, 10));
    game.tick();
    let ejected: Vec<hecs::Entity> = game
        .world
        .get::<&Cargo>(truck)
        .unwrap()
        .passengers()
        .collect();
    game.sell(truck);
    assert!(!game.world.contains(truck));
    for passenger in &ejected {
        assert!(game.is_in_world(*passenger));
    }

    // A sealed transport takes its garrison down with the sale.
    let sealed = game.spawn_unit("sealed_truck", PlayerId(1)).unwrap();
    game.add_to_world(sealed, CellPos::new(14, 10));
    game.tick();
    let doomed: Vec<hecs::Entity> = game
        .world
        .get::<&Cargo>(sealed)
        .unwrap()
        .passengers()
        .collect();
    game.sell(sealed);
    for passenger in doomed {
        assert!(!game.world.contains(passenger));
    }

    // Selling a master runs the same roster disposal as destroying it.
    let carrier = game.spawn_unit("carrier", PlayerId(1)).unwrap();
    game.add_to_world(carrier, CellPos::new(20, 20));
    let drones: Vec<hecs::Entity> = game
        .world
        .get::<&SpawnerMaster>(carrier)
        .unwrap()
        .slots()
        .iter()
        .filter_map(|s| s.slave)
        .collect();
    game.sell(carrier);
    assert_eq!(drones.len(), 3);
    for drone in drones {
        assert!(!game.world.contains(drone));
    }
}

#[test]
fn test_slave_disposal_on_master_death() {
    let mut game = game();
    let carrier = game.spawn_unit("carrier", PlayerId(1)).unwrap();
    game.add_to_world(carrier, CellPos::new(10, 10));
    let drones: Vec<hecs::Entity> = game
        .world
        .get::<&SpawnerMaster>(carrier)
        .unwrap()
        .slots()
        .iter()
        .filter_map(|s| s.slave)
        .collect();
    game.kill(carrier);
    for drone in drones {
        assert!(!game.world.contains(drone));
    }

    let platform = game.spawn_unit("free_platform", PlayerId(1)).unwrap();
    game.add_to_world(platform, CellPos::new(20, 20));
    let missile = game.world.get::<&SpawnerMaster>(platform).unwrap().slots()[0]
        .slave
        .unwrap();
    game.kill(platform);
    // Freed slaves step out beside the wreck and live on.
    assert!(game.world.contains(missile));
    assert!(game.is_in_world(missile));
}

#[test]
fn test_condition_changes_surface_only_on_zero_crossings() {
    let mut game = game();
    let truck = game.spawn_unit("manned_truck", PlayerId(1)).unwrap();
    game.add_to_world(truck, CellPos::new(10, 10));
    game.tick();
    game.drain_notifications();

    game.issue_order(truck, Order::unload());
    for _ in 0..30 {
        game.tick();
    }
    let crossings: Vec<bool> = game
        .drain_notifications()
        .into_iter()
        .filter_map(|n| match n {
            Notification::ConditionChanged { name, enabled, .. } if name == "loaded" => {
                Some(enabled)
            }
            _ => None,
        })
        .collect();
    // Two stacked grants existed; only the final revoke crosses one-to-zero.
    assert_eq!(crossings, vec![false]);
}
