//! 2-D geometry primitives: points, line-segment and polygon collision,
//! bounding boxes. Everything here is pure and immutable; a `Shape` owns no
//! state beyond its points and is shared read-only across zones that use
//! the same QMP file.

pub mod qmp;
pub mod spot;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance_squared(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub fn of(points: &[Point]) -> Self {
        let mut x_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for p in points {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
        }
        Self { x_min, x_max, y_min, y_max }
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x_min <= other.x_max
            && self.x_max >= other.x_min
            && self.y_min <= other.y_max
            && self.y_max >= other.y_min
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }
}

/// What kind of barrier a geometry element represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    Barrier,
    OneWay,
    Toggle,
}

/// A single closed polygon or open line strip making up one element.
#[derive(Debug, Clone)]
pub struct Shape {
    pub element_id: u32,
    pub element_type: ElementType,
    pub points: Vec<Point>,
    pub closed: bool,
    pub bounds: BoundingBox,
}

impl Shape {
    pub fn new(element_id: u32, element_type: ElementType, points: Vec<Point>, closed: bool) -> Self {
        let bounds = BoundingBox::of(&points);
        Self { element_id, element_type, points, closed, bounds }
    }

    /// Edges of this shape as consecutive point pairs. For a closed shape
    /// the last edge wraps back to the first point.
    fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        let last = if self.closed { n } else { n.saturating_sub(1) };
        (0..last).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    pub fn intersects_segment(&self, a: Point, b: Point) -> bool {
        let seg_box = BoundingBox::of(&[a, b]);
        if !self.bounds.intersects(&seg_box) {
            return false;
        }
        self.edges().any(|(p1, p2)| segments_intersect(a, b, p1, p2))
    }

    /// Point-in-polygon test (ray casting). Only meaningful for closed
    /// shapes; open line strips always return false.
    pub fn contains_point(&self, p: Point) -> bool {
        if !self.closed || self.points.len() < 3 {
            return false;
        }
        if !self.bounds.contains(p) {
            return false;
        }
        let mut inside = false;
        let n = self.points.len();
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.points[i];
            let pj = self.points[j];
            if (pi.y > p.y) != (pj.y > p.y)
                && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x <= a.x.max(b.x) && p.x >= a.x.min(b.x) && p.y <= a.y.max(b.y) && p.y >= a.y.min(b.y)
}

/// Standard orientation-based segment intersection test, including the
/// degenerate collinear-overlap cases.
pub fn segments_intersect(p1: Point, q1: Point, p2: Point, q2: Point) -> bool {
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if (o1 > 0.0) != (o2 > 0.0) && (o3 > 0.0) != (o4 > 0.0) && o1 != 0.0 && o2 != 0.0 {
        return true;
    }

    if o1 == 0.0 && on_segment(p1, q1, p2) {
        return true;
    }
    if o2 == 0.0 && on_segment(p1, q1, q2) {
        return true;
    }
    if o3 == 0.0 && on_segment(p2, q2, p1) {
        return true;
    }
    if o4 == 0.0 && on_segment(p2, q2, q1) {
        return true;
    }
    false
}

/// An immutable per-QMP-file geometry: a collection of named shapes plus
/// which element ids a given zone instance has dynamically disabled.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    shapes: Vec<Shape>,
}

impl Geometry {
    pub fn new(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Line-of-sight / straight-line collision test, skipping any element
    /// whose id is in `disabled`.
    pub fn segment_collides(&self, a: Point, b: Point, disabled: &std::collections::HashSet<u32>) -> bool {
        self.shapes
            .iter()
            .filter(|s| s.element_type == ElementType::Barrier)
            .filter(|s| !disabled.contains(&s.element_id))
            .any(|s| s.intersects_segment(a, b))
    }

    /// First collision point along the segment `a -> b`, if any, used by
    /// random spot sampling to pull the sample back from a barrier.
    pub fn first_collision_point(
        &self,
        a: Point,
        b: Point,
        disabled: &std::collections::HashSet<u32>,
    ) -> Option<Point> {
        let mut nearest: Option<(f64, Point)> = None;
        for shape in self
            .shapes
            .iter()
            .filter(|s| s.element_type == ElementType::Barrier)
            .filter(|s| !disabled.contains(&s.element_id))
        {
            for (p1, p2) in shape.edges() {
                if let Some(hit) = segment_intersection_point(a, b, p1, p2) {
                    let d = a.distance_squared(hit);
                    if nearest.map(|(nd, _)| d < nd).unwrap_or(true) {
                        nearest = Some((d, hit));
                    }
                }
            }
        }
        nearest.map(|(_, p)| p)
    }
}

/// Exact intersection point of two segments, if they cross.
fn segment_intersection_point(p1: Point, q1: Point, p2: Point, q2: Point) -> Option<Point> {
    let d1x = q1.x - p1.x;
    let d1y = q1.y - p1.y;
    let d2x = q2.x - p2.x;
    let d2y = q2.y - p2.y;

    let denom = d1x * d2y - d1y * d2x;
    if denom.abs() < 1e-12 {
        return None;
    }

    let t = ((p2.x - p1.x) * d2y - (p2.y - p1.y) * d2x) / denom;
    let u = ((p2.x - p1.x) * d1y - (p2.y - p1.y) * d1x) / denom;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(Point::new(p1.x + t * d1x, p1.y + t * d1y))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(id: u32) -> Shape {
        Shape::new(
            id,
            ElementType::Barrier,
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
            true,
        )
    }

    #[test]
    fn segments_intersect_basic_crossing() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 10.0);
        let c = Point::new(0.0, 10.0);
        let d = Point::new(10.0, 0.0);
        assert!(segments_intersect(a, b, c, d));
    }

    #[test]
    fn segments_do_not_intersect_when_parallel_and_offset() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        let c = Point::new(0.0, 5.0);
        let d = Point::new(10.0, 5.0);
        assert!(!segments_intersect(a, b, c, d));
    }

    #[test]
    fn shape_contains_point_inside_square() {
        let sq = square(1);
        assert!(sq.contains_point(Point::new(5.0, 5.0)));
        assert!(!sq.contains_point(Point::new(50.0, 50.0)));
    }

    #[test]
    fn line_of_sight_blocked_by_barrier_between_points() {
        let geo = Geometry::new(vec![square(1)]);
        let disabled = std::collections::HashSet::new();
        // Straight line through the square from outside to outside.
        let a = Point::new(-5.0, 5.0);
        let b = Point::new(15.0, 5.0);
        assert!(geo.segment_collides(a, b, &disabled));
    }

    #[test]
    fn line_of_sight_clear_when_element_disabled() {
        let geo = Geometry::new(vec![square(1)]);
        let mut disabled = std::collections::HashSet::new();
        disabled.insert(1u32);
        let a = Point::new(-5.0, 5.0);
        let b = Point::new(15.0, 5.0);
        assert!(!geo.segment_collides(a, b, &disabled));
    }

    #[test]
    fn first_collision_point_lies_on_segment() {
        let geo = Geometry::new(vec![square(1)]);
        let disabled = std::collections::HashSet::new();
        let a = Point::new(5.0, 5.0); // inside
        let b = Point::new(20.0, 5.0); // outside
        let hit = geo.first_collision_point(a, b, &disabled).expect("should collide");
        assert!((hit.x - 10.0).abs() < 1e-6);
        assert!((hit.y - 5.0).abs() < 1e-6);
    }
}
