//! Scenario (ii): a player stands within aggro range and field of view of
//! a wandering enemy, but a wall element sits on the straight line between
//! them. The enemy must never transition to Aggro while the wall blocks
//! line of sight, and must transition the very first tick after the wall
//! is disabled (simulating a door opening) with everything else held
//! fixed.

mod common;

use odyssey_ai_core::ai::AIStatus;
use odyssey_ai_core::config::Config;
use odyssey_ai_core::geometry::{ElementType, Geometry, Point, Shape};

use common::*;

fn wall_between(x: f64) -> Geometry {
    Geometry::new(vec![Shape::new(
        1,
        ElementType::Barrier,
        vec![Point::new(x, -1000.0), Point::new(x, 1000.0)],
        false,
    )])
}

#[test]
fn wall_blocks_aggro_until_disabled() {
    let config = Config::default();
    let host = NoopHost;
    let skills = FixtureSkills(Default::default());
    let executor = InstantExecutor;

    let mut zone = make_zone(Some(wall_between(500.0)));
    spawn_player(&mut zone, Point::new(1000.0, 0.0));
    let enemy_id = spawn_enemy(&mut zone, Point::new(0.0, 0.0), ai_params(2000.0, std::f64::consts::PI, 1000), 0.0, vec![]);

    // The player sits well within both aggro distance and FoV, but the
    // wall at x=500 sits squarely between them, so LoS must keep blocking
    // aggro across many think-cycles.
    let _ = run_ticks(&mut zone, &host, &skills, &executor, &config, 0, 200_000, 50);
    assert_eq!(zone.enemies[&enemy_id].ai.status, AIStatus::Wandering);

    // Disable the wall element (as if a gate opened) and tick once more;
    // aggro must fire on this very next think-cycle.
    zone.disabled_geometry_elements.insert(1);
    let history = run_ticks(&mut zone, &host, &skills, &executor, &config, 10_000_000, 200_000, 20);

    assert_eq!(zone.enemies[&enemy_id].ai.status, AIStatus::Aggro);
    let saw_activation = history.iter().flatten().any(|p| matches!(p, odyssey_ai_core::protocol::OutboundPacket::EnemyActivated { .. }));
    assert!(saw_activation, "expected an EnemyActivated packet once the wall no longer blocks LoS");
}
