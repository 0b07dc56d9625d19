//! QMP-file loading contract.
//!
//! QMP files are the definition-store's on-disk geometry format: a
//! collection of named elements, each carrying one or more boundary line
//! segments tagged with the element they belong to. This module defines
//! the loader trait only — parsing the actual file format is a definition
//! store concern out of scope for this crate (see `definitions::QmpLoader`).

use serde::{Deserialize, Serialize};

use super::{ElementType, Geometry, Point, Shape};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QmpElement {
    pub id: u32,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QmpLine {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub element_id: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QmpBoundary {
    pub lines: Vec<QmpLine>,
}

/// Raw shape of a parsed QMP file, prior to being grouped into `Shape`s.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QmpFile {
    pub elements: Vec<QmpElement>,
    pub boundaries: Vec<QmpBoundary>,
}

impl QmpFile {
    /// Build an immutable `Geometry` by grouping each element's boundary
    /// lines into a connected point chain. Lines for an element are
    /// threaded head-to-tail; if they don't form a single chain (a
    /// malformed QMP file) each line is kept as its own two-point open
    /// shape instead of silently dropping geometry.
    pub fn into_geometry(self) -> Geometry {
        use std::collections::HashMap;

        let element_types: HashMap<u32, ElementType> =
            self.elements.iter().map(|e| (e.id, e.element_type)).collect();

        let mut lines_by_element: HashMap<u32, Vec<QmpLine>> = HashMap::new();
        for boundary in self.boundaries {
            for line in boundary.lines {
                lines_by_element.entry(line.element_id).or_default().push(line);
            }
        }

        let mut shapes = Vec::new();
        for (element_id, lines) in lines_by_element {
            let element_type = element_types
                .get(&element_id)
                .copied()
                .unwrap_or(ElementType::Barrier);

            if let Some(chain) = chain_lines(&lines) {
                let closed = chain.first().zip(chain.last()).map(|(a, b)| points_close(*a, *b)).unwrap_or(false);
                shapes.push(Shape::new(element_id, element_type, chain, closed));
            } else {
                for line in &lines {
                    shapes.push(Shape::new(
                        element_id,
                        element_type,
                        vec![Point::new(line.x1, line.y1), Point::new(line.x2, line.y2)],
                        false,
                    ));
                }
            }
        }

        Geometry::new(shapes)
    }
}

fn points_close(a: Point, b: Point) -> bool {
    a.distance(b) < 1e-6
}

/// Attempt to thread a set of line segments into one continuous chain of
/// points. Returns `None` if the segments don't form a single path.
fn chain_lines(lines: &[QmpLine]) -> Option<Vec<Point>> {
    if lines.is_empty() {
        return None;
    }
    let mut remaining: Vec<(Point, Point)> = lines
        .iter()
        .map(|l| (Point::new(l.x1, l.y1), Point::new(l.x2, l.y2)))
        .collect();

    let (start, end) = remaining.remove(0);
    let mut chain = vec![start, end];

    while !remaining.is_empty() {
        let tail = *chain.last().unwrap();
        let idx = remaining
            .iter()
            .position(|(a, b)| points_close(*a, tail) || points_close(*b, tail))?;
        let (a, b) = remaining.remove(idx);
        if points_close(a, tail) {
            chain.push(b);
        } else {
            chain.push(a);
        }
    }

    Some(chain)
}
