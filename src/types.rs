use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Integer pixel coordinate; `x` is the column, `y` the row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point2i {
    pub x: i32,
    pub y: i32,
}

impl Point2i {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point2i {
    type Output = Point2i;

    fn add(self, rhs: Point2i) -> Point2i {
        Point2i::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2i {
    type Output = Point2i;

    fn sub(self, rhs: Point2i) -> Point2i {
        Point2i::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Camera-space point in meters. A zero `z` marks "no data".
pub type Vec3f = [f32; 3];

/// Axis-aligned box in full-frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn top_left(&self) -> Point2i {
        Point2i::new(self.x, self.y)
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Smallest box containing every point; `None` for an empty slice.
    pub fn enclosing(points: &[Point2i]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }
}

/// A convexity defect: the boundary run between two consecutive hull vertices
/// (`start`, `end`) and its deepest point `far`. All three are boundary indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Defect {
    pub start: usize,
    pub end: usize,
    pub far: usize,
    /// Distance in pixels from `far` to the hull edge.
    pub depth: f32,
}
