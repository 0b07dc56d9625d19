//! Move-command construction: straight-line/shortest-path building,
//! segmentation for smooth client-visible motion, and the `Chase` /
//! `Retreat` / `Circle` helpers scripts and built-in behaviors queue.
//!
//! `GetLinearPoint` and `RotatePoint` (§4.6) are pure point-geometry
//! helpers also needed by random spot sampling, so they live in
//! `geometry::spot` and are re-exported here under the names this module's
//! callers expect.

use std::collections::HashSet;

use pathfinding::prelude::astar;
use rand::Rng;

use crate::config::{CIRCLE_ANGLE_STEP_RAD, CIRCLE_MAX_SEGMENTS};
use crate::entity::EntityId;
use crate::geometry::{ElementType, Geometry, Point};

pub use crate::geometry::spot::{linear_point as get_linear_point, rotate_point};

use super::AICommand;

/// Maximum number of visibility-graph nodes considered before giving up on
/// a detour and reporting the destination unreachable — a resource-
/// exhaustion guard per §7 error kind 7, not a tuning knob.
const MAX_VISIBILITY_NODES: usize = 256;

/// Shortest path from `from` to `to` around `geometry`'s barrier polygons,
/// via a visibility graph over their vertices. `None` means no path
/// exists (§7 error kind 3, "geometry unreachable").
///
/// Only called once the direct straight line is known to collide; the
/// straight line itself is always tried first by [`get_move_command`].
fn shortest_path(geometry: &Geometry, disabled: &HashSet<u32>, from: Point, to: Point) -> Option<Vec<Point>> {
    let mut nodes: Vec<Point> = vec![from, to];
    for shape in geometry
        .shapes()
        .iter()
        .filter(|s| s.element_type == ElementType::Barrier && s.closed && !disabled.contains(&s.element_id))
    {
        nodes.extend(shape.points.iter().copied());
        if nodes.len() >= MAX_VISIBILITY_NODES {
            break;
        }
    }
    nodes.truncate(MAX_VISIBILITY_NODES);
    let n = nodes.len();

    let edge_cost = |i: usize, j: usize| -> Option<u64> {
        if i == j {
            return None;
        }
        if geometry.segment_collides(nodes[i], nodes[j], disabled) {
            None
        } else {
            Some((nodes[i].distance(nodes[j]) * 1000.0) as u64)
        }
    };

    let result = astar(
        &0usize,
        |&i| {
            (0..n)
                .filter(move |&j| j != i)
                .filter_map(|j| edge_cost(i, j).map(|cost| (j, cost)))
                .collect::<Vec<_>>()
        },
        |&i| (nodes[i].distance(nodes[1]) * 1000.0) as u64,
        |&i| i == 1,
    );

    result.map(|(path, _cost)| path.into_iter().skip(1).map(|i| nodes[i]).collect())
}

fn split_path(start: Point, path: Vec<Point>, max_segment_len: f64) -> Vec<Point> {
    if max_segment_len <= 0.0 {
        return path;
    }
    let mut out = Vec::new();
    let mut prev = start;
    for point in path {
        let dist = prev.distance(point);
        if dist > max_segment_len {
            let steps = (dist / max_segment_len).ceil() as usize;
            for step in 1..steps {
                let t = (step as f64 * max_segment_len) / dist;
                out.push(Point::new(prev.x + (point.x - prev.x) * t, prev.y + (point.y - prev.y) * t));
            }
        }
        out.push(point);
        prev = point;
    }
    out
}

/// Build a `Move` `AICommand` from `from` to `dest`. Tries the straight
/// line first; falls back to the visibility-graph shortest path if that
/// collides. Returns `None` if neither yields a usable path (§7 kind 3).
///
/// `reduce` shortens the final leg by that many units along its last
/// segment so the entity stops short of its destination (e.g. to not walk
/// into a target's hitbox). `split` breaks legs longer than
/// `move_speed * 0.5s` into sub-segments for smoother client motion.
#[allow(clippy::too_many_arguments)]
pub fn get_move_command(
    geometry: Option<&Geometry>,
    disabled: &HashSet<u32>,
    from: Point,
    dest: Point,
    move_speed: f64,
    reduce: f64,
    split: bool,
    target: Option<EntityId>,
    min_distance: Option<f64>,
    max_distance: Option<f64>,
) -> Option<AICommand> {
    let mut path = match geometry {
        Some(geo) if geo.segment_collides(from, dest, disabled) => {
            let shortest = shortest_path(geo, disabled, from, dest)?;
            if shortest.is_empty() {
                return None;
            }
            shortest
        }
        _ => vec![dest],
    };

    if reduce > 0.0 && !path.is_empty() {
        let last = *path.last().unwrap();
        let prev = if path.len() >= 2 { path[path.len() - 2] } else { from };
        let remaining = prev.distance(last);
        let shortened = if remaining > reduce { get_linear_point(last, prev, reduce, false) } else { prev };
        *path.last_mut().unwrap() = shortened;
    }

    if split {
        let max_segment_len = move_speed * 0.5;
        path = split_path(from, path, max_segment_len);
    }

    Some(AICommand::Move { path, target, min_distance, max_distance, cursor: 0 })
}

/// A move command toward a live target with min/max distance termination
/// conditions attached (§4.6 Chase).
pub fn chase(
    geometry: Option<&Geometry>,
    disabled: &HashSet<u32>,
    from: Point,
    target_id: EntityId,
    target_pos: Point,
    move_speed: f64,
    min_distance: f64,
    max_distance: f64,
) -> Option<AICommand> {
    get_move_command(geometry, disabled, from, target_pos, move_speed, 0.0, true, Some(target_id), Some(min_distance), Some(max_distance))
}

/// A one-segment move straight away from `away_from` by `distance`, only
/// if the resulting point is actually farther from `away_from` than the
/// entity's current position (§4.6 Retreat).
pub fn retreat(from: Point, away_from: Point, distance: f64) -> Option<AICommand> {
    let candidate = get_linear_point(from, away_from, distance, true);
    if candidate.distance(away_from) > from.distance(away_from) {
        Some(AICommand::Move { path: vec![candidate], target: None, min_distance: None, max_distance: None, cursor: 0 })
    } else {
        None
    }
}

/// Up to 3 points circling a target: first a point `distance` from the
/// target toward the entity, then 1-2 rotations of `CIRCLE_ANGLE_STEP_RAD`
/// around the target. Direction is chosen randomly and inverted once if a
/// step collides; extension stops once blocked in both directions
/// (§4.6 Circle).
pub fn circle(geometry: Option<&Geometry>, disabled: &HashSet<u32>, entity_pos: Point, target_pos: Point, distance: f64) -> AICommand {
    let first = get_linear_point(target_pos, entity_pos, distance, false);
    let mut points = vec![first];
    let mut prev = first;

    let mut direction: f64 = if rand::thread_rng().gen_bool(0.5) { 1.0 } else { -1.0 };
    let mut inverted = false;

    for _ in 0..(CIRCLE_MAX_SEGMENTS.saturating_sub(1)) {
        let candidate = rotate_point(prev, target_pos, CIRCLE_ANGLE_STEP_RAD * direction);
        let blocked = geometry.map(|g| g.segment_collides(prev, candidate, disabled)).unwrap_or(false);
        if blocked {
            if inverted {
                break;
            }
            inverted = true;
            direction = -direction;
            let retry = rotate_point(prev, target_pos, CIRCLE_ANGLE_STEP_RAD * direction);
            let retry_blocked = geometry.map(|g| g.segment_collides(prev, retry, disabled)).unwrap_or(false);
            if retry_blocked {
                break;
            }
            points.push(retry);
            prev = retry;
            continue;
        }
        points.push(candidate);
        prev = candidate;
    }

    AICommand::Move { path: points, target: None, min_distance: None, max_distance: None, cursor: 0 }
}

/// Whether committing to a straight move from `from` to `to` is clear of
/// geometry. Move-command execution clears the whole queue on collision
/// (§4.6 Move).
pub fn path_is_clear(geometry: Option<&Geometry>, disabled: &HashSet<u32>, from: Point, to: Point) -> bool {
    match geometry {
        Some(geo) => !geo.segment_collides(from, to, disabled),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ElementType, Shape};

    fn wall() -> Geometry {
        Geometry::new(vec![Shape::new(
            1,
            ElementType::Barrier,
            vec![Point::new(40.0, -50.0), Point::new(60.0, -50.0), Point::new(60.0, 50.0), Point::new(40.0, 50.0)],
            true,
        )])
    }

    #[test]
    fn straight_line_used_when_clear() {
        let cmd = get_move_command(None, &HashSet::new(), Point::new(0.0, 0.0), Point::new(10.0, 0.0), 100.0, 0.0, false, None, None, None).unwrap();
        match cmd {
            AICommand::Move { path, .. } => assert_eq!(path, vec![Point::new(10.0, 0.0)]),
            _ => panic!("expected move"),
        }
    }

    #[test]
    fn detours_around_a_blocking_wall() {
        let geo = wall();
        let disabled = HashSet::new();
        let cmd = get_move_command(Some(&geo), &disabled, Point::new(0.0, 0.0), Point::new(100.0, 0.0), 100.0, 0.0, false, None, None, None);
        let cmd = cmd.expect("a path should exist around the wall's ends");
        match cmd {
            AICommand::Move { path, .. } => assert!(!path.is_empty()),
            _ => panic!("expected move"),
        }
    }

    #[test]
    fn reduce_shortens_final_leg() {
        let cmd = get_move_command(None, &HashSet::new(), Point::new(0.0, 0.0), Point::new(100.0, 0.0), 100.0, 20.0, false, None, None, None).unwrap();
        match cmd {
            AICommand::Move { path, .. } => {
                let last = path.last().unwrap();
                assert!((last.x - 80.0).abs() < 1e-6);
            }
            _ => panic!("expected move"),
        }
    }

    #[test]
    fn split_breaks_long_legs_into_think_period_segments() {
        let cmd = get_move_command(None, &HashSet::new(), Point::new(0.0, 0.0), Point::new(1000.0, 0.0), 100.0, 0.0, true, None, None, None).unwrap();
        match cmd {
            AICommand::Move { path, .. } => assert!(path.len() > 1, "a 1000-unit leg at speed 100 should split"),
            _ => panic!("expected move"),
        }
    }

    #[test]
    fn retreat_rejected_when_it_would_not_increase_distance() {
        // Retreating from a point the entity is already moving away from
        // at distance 0 collapses to the same point, which must be rejected.
        let result = retreat(Point::new(0.0, 0.0), Point::new(0.0, 0.0), 10.0);
        assert!(result.is_none());
    }

    #[test]
    fn circle_produces_up_to_three_points() {
        let cmd = circle(None, &HashSet::new(), Point::new(10.0, 0.0), Point::new(0.0, 0.0), 5.0);
        match cmd {
            AICommand::Move { path, .. } => assert!(path.len() <= CIRCLE_MAX_SEGMENTS && !path.is_empty()),
            _ => panic!("expected move"),
        }
    }
}
