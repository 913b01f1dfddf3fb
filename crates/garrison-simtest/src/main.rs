//! Garrison Headless Simulation Harness
//!
//! Validates the shipped rules data and runs full coordination scenarios
//! in-process — no rendering, no networking.
//!
//! Usage:
//!   cargo run -p garrison-simtest
//!   cargo run -p garrison-simtest -- --verbose

use garrison_core::prelude::*;
use garrison_logic::cell::CellPos;
use garrison_logic::rules::Rules;

// ── Rules data (same JSON a frontend would load) ────────────────────────
const RULES_JSON: &str = include_str!("../../../data/rules.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Garrison Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Rules data validation
    results.extend(validate_rules(verbose));

    // 2. Garrison load/unload cycle
    results.extend(run_garrison_scenario(verbose));

    // 3. Carrier launch/recall cycle
    results.extend(run_carrier_scenario(verbose));

    // 4. Missile platform one-shot cycle
    results.extend(run_missile_scenario(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn result(name: &str, passed: bool, detail: String) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail,
    }
}

fn load_rules() -> Option<Rules> {
    Rules::from_json(RULES_JSON).ok()
}

fn fresh_game(rules: Rules) -> Game {
    Game::new(rules, GameMap::new(48, 48), Players::default(), 7)
}

// ── 1. Rules data ───────────────────────────────────────────────────────

fn validate_rules(_verbose: bool) -> Vec<TestResult> {
    println!("--- Rules Data ---");
    let mut results = Vec::new();

    let rules = match Rules::from_json(RULES_JSON) {
        Ok(r) => r,
        Err(e) => {
            results.push(result("rules_parse", false, format!("parse error: {e}")));
            return results;
        }
    };
    results.push(result(
        "rules_parse",
        true,
        format!("{} unit kinds loaded", rules.units.len()),
    ));

    results.push(result(
        "rules_cross_references",
        rules.validate().is_ok(),
        "initial units and rosters reference defined kinds".into(),
    ));

    let transports = rules.units.values().filter(|u| u.cargo.is_some()).count();
    let spawners = rules.units.values().filter(|u| u.spawner.is_some()).count();
    results.push(result(
        "rules_has_coordinators",
        transports > 0 && spawners > 0,
        format!("{transports} transports, {spawners} spawner masters"),
    ));

    results
}

// ── 2. Garrison cycle ───────────────────────────────────────────────────

fn run_garrison_scenario(verbose: bool) -> Vec<TestResult> {
    println!("--- Garrison Cycle ---");
    let mut results = Vec::new();
    let Some(rules) = load_rules() else {
        return results;
    };
    let mut game = fresh_game(rules);

    let bunker = match game.spawn_unit("bunker", PlayerId(1)) {
        Ok(e) => e,
        Err(e) => {
            results.push(result("garrison_setup", false, format!("{e}")));
            return results;
        }
    };
    game.add_to_world(bunker, CellPos::new(10, 10));
    let Ok(rifleman) = game.spawn_unit("rifleman", PlayerId(2)) else {
        results.push(result("garrison_setup", false, "rifleman missing".into()));
        return results;
    };
    game.add_to_world(rifleman, CellPos::new(6, 10));

    game.issue_order(rifleman, Order::enter_garrison(bunker));
    let mut boarded_at = None;
    for tick in 0..60 {
        game.tick();
        if !game.is_in_world(rifleman) {
            boarded_at = Some(tick);
            break;
        }
    }
    results.push(result(
        "garrison_boards",
        boarded_at.is_some(),
        match boarded_at {
            Some(t) => format!("boarded after {} ticks", t + 1),
            None => "never boarded".into(),
        },
    ));
    let captured = game
        .world
        .get::<&garrison_core::components::Owner>(bunker)
        .map(|o| o.0 == PlayerId(2))
        .unwrap_or(false);
    results.push(result(
        "garrison_captures_owner",
        captured,
        "occupied bunker fights for the garrisoning player".into(),
    ));

    game.issue_order(bunker, Order::unload());
    let mut exited_at = None;
    for tick in 0..80 {
        game.tick();
        if game.is_in_world(rifleman) {
            exited_at = Some(tick);
            break;
        }
    }
    let neutral = game
        .world
        .get::<&garrison_core::components::Owner>(bunker)
        .map(|o| o.0 == PlayerId(0))
        .unwrap_or(false);
    results.push(result(
        "garrison_unloads",
        exited_at.is_some(),
        match exited_at {
            Some(t) => format!("exited after {} ticks", t + 1),
            None => "never exited".into(),
        },
    ));
    results.push(result(
        "garrison_reverts_to_neutral",
        neutral,
        "empty bunker returned to the neutral player".into(),
    ));

    if verbose {
        for n in game.drain_notifications() {
            println!("    note: {n:?}");
        }
    }
    results
}

// ── 3. Carrier cycle ────────────────────────────────────────────────────

fn run_carrier_scenario(verbose: bool) -> Vec<TestResult> {
    println!("--- Carrier Cycle ---");
    let mut results = Vec::new();
    let Some(rules) = load_rules() else {
        return results;
    };
    let mut game = fresh_game(rules);

    let carrier = match game.spawn_unit("carrier", PlayerId(1)) {
        Ok(e) => e,
        Err(e) => {
            results.push(result("carrier_setup", false, format!("{e}")));
            return results;
        }
    };
    game.add_to_world(carrier, CellPos::new(20, 20));

    let docked = game
        .world
        .get::<&garrison_core::components::SpawnerMaster>(carrier)
        .map(|sm| sm.slots().iter().filter(|s| s.is_valid()).count())
        .unwrap_or(0);
    results.push(result(
        "carrier_roster_filled",
        docked == 3,
        format!("{docked}/3 slots filled at creation"),
    ));

    game.notify_attacking(carrier, CellPos::new(34, 34));
    let launched: Vec<_> = game
        .drain_notifications()
        .into_iter()
        .filter_map(|n| match n {
            Notification::SlaveLaunched { slave, .. } => Some(slave),
            _ => None,
        })
        .collect();
    results.push(result(
        "carrier_launches_one",
        launched.len() == 1,
        format!("{} slaves launched per trigger", launched.len()),
    ));

    for _ in 0..10 {
        game.tick();
    }
    game.notify_idle(carrier);
    let mut docked_again = false;
    for _ in 0..80 {
        game.tick();
        if launched.iter().all(|s| !game.is_in_world(*s)) {
            docked_again = true;
            break;
        }
    }
    results.push(result(
        "carrier_recalls",
        docked_again,
        "launched slave returned to the hangar".into(),
    ));

    if verbose {
        for n in game.drain_notifications() {
            println!("    note: {n:?}");
        }
    }
    results
}

// ── 4. Missile platform ─────────────────────────────────────────────────

fn run_missile_scenario(_verbose: bool) -> Vec<TestResult> {
    println!("--- Missile Platform ---");
    let mut results = Vec::new();
    let Some(rules) = load_rules() else {
        return results;
    };
    let mut game = fresh_game(rules);

    let platform = match game.spawn_unit("missile_platform", PlayerId(1)) {
        Ok(e) => e,
        Err(e) => {
            results.push(result("missile_setup", false, format!("{e}")));
            return results;
        }
    };
    game.add_to_world(platform, CellPos::new(10, 10));

    game.notify_attacking(platform, CellPos::new(40, 40));
    let consumed = game
        .world
        .get::<&garrison_core::components::SpawnerMaster>(platform)
        .map(|sm| !sm.slots()[0].is_valid() && sm.respawn_timer_running())
        .unwrap_or(false);
    results.push(result(
        "missile_consumed_on_launch",
        consumed,
        "slot invalidated and respawn timer started".into(),
    ));

    let mut rebuilt_at = None;
    for tick in 0..400 {
        game.tick();
        let ready = game
            .world
            .get::<&garrison_core::components::SpawnerMaster>(platform)
            .map(|sm| sm.slots()[0].is_valid())
            .unwrap_or(false);
        if ready {
            rebuilt_at = Some(tick);
            break;
        }
    }
    results.push(result(
        "missile_rebuilds",
        rebuilt_at.is_some(),
        match rebuilt_at {
            Some(t) => format!("replacement built after {} ticks", t + 1),
            None => "replacement never built".into(),
        },
    ));

    results
}
