//! Spots — named rotated rectangles used for spawn regions, zone-in
//! markers, and interaction triggers — and random sampling within them.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Geometry, Point};
use crate::config::SPOT_SAMPLE_PULLBACK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpotType {
    ZoneIn,
    SpawnArea,
    InteractionTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: u32,
    pub center: Point,
    pub span_x: f64,
    pub span_y: f64,
    pub rotation: f64,
    pub spot_type: SpotType,
}

impl Spot {
    fn half_spans(&self) -> (f64, f64) {
        (self.span_x / 2.0, self.span_y / 2.0)
    }

    fn rotate_around_center(&self, p: Point) -> Point {
        rotate_point(p, self.center, self.rotation)
    }

    /// Uniform sample in the unrotated rectangle, then rotated into place,
    /// then pulled back from any geometry collision along the sample ray.
    pub fn random_point(&self, geometry: Option<&Geometry>, disabled: &HashSet<u32>) -> Point {
        let mut rng = rand::thread_rng();
        let (hx, hy) = self.half_spans();
        let local = Point::new(
            self.center.x + rng.gen_range(-hx..hx),
            self.center.y + rng.gen_range(-hy..hy),
        );
        let sample = self.rotate_around_center(local);

        match geometry {
            Some(geo) => match geo.first_collision_point(self.center, sample, disabled) {
                Some(hit) => pull_back(self.center, hit, SPOT_SAMPLE_PULLBACK),
                None => sample,
            },
            None => sample,
        }
    }

    /// Whether a world-space point lies within this rotated rectangle.
    pub fn contains(&self, p: Point) -> bool {
        // Rotate the point into the rectangle's local (unrotated) frame.
        let local = rotate_point(p, self.center, -self.rotation);
        let (hx, hy) = self.half_spans();
        (local.x - self.center.x).abs() <= hx + 1e-6 && (local.y - self.center.y).abs() <= hy + 1e-6
    }
}

/// Standard 2-D rotation of `p` around `origin` by `rad` radians.
pub fn rotate_point(p: Point, origin: Point, rad: f64) -> Point {
    let (sin, cos) = rad.sin_cos();
    let dx = p.x - origin.x;
    let dy = p.y - origin.y;
    Point::new(origin.x + dx * cos - dy * sin, origin.y + dx * sin + dy * cos)
}

/// Point offset by distance `d` from `(sx, sy)` toward, or (if `away`)
/// opposite from, `(tx, ty)`. Handles the axis-aligned degenerate cases to
/// avoid a divide-by-zero.
pub fn linear_point(from: Point, toward: Point, d: f64, away: bool) -> Point {
    let dx = toward.x - from.x;
    let dy = toward.y - from.y;
    let dist = (dx * dx + dy * dy).sqrt();

    let d = if away { -d } else { d };

    if dist < 1e-9 {
        return from;
    }

    Point::new(from.x + dx / dist * d, from.y + dy / dist * d)
}

fn pull_back(from: Point, collision: Point, extra: f64) -> Point {
    linear_point(collision, from, extra, false)
}
