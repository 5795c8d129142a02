use std::f64::consts::PI;

use crate::types::{Point2i, Vec3f};

pub fn sub3(a: Vec3f, b: Vec3f) -> Vec3f {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn cross3(a: Vec3f, b: Vec3f) -> Vec3f {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn norm3(a: Vec3f) -> f32 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

pub fn distance3(a: Vec3f, b: Vec3f) -> f64 {
    let dx = a[0] as f64 - b[0] as f64;
    let dy = a[1] as f64 - b[1] as f64;
    let dz = a[2] as f64 - b[2] as f64;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

pub fn distance2(a: Point2i, b: Point2i) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

pub fn midpoint3(a: Vec3f, b: Vec3f) -> Vec3f {
    [(a[0] + b[0]) * 0.5, (a[1] + b[1]) * 0.5, (a[2] + b[2]) * 0.5]
}

/// Angle at `vertex` formed by `a` and `b`, in `[0, pi]`. Zero if either arm is degenerate.
pub fn angle_between_points(a: Point2i, b: Point2i, vertex: Point2i) -> f64 {
    let (ax, ay) = ((a.x - vertex.x) as f64, (a.y - vertex.y) as f64);
    let (bx, by) = ((b.x - vertex.x) as f64, (b.y - vertex.y) as f64);
    let na = (ax * ax + ay * ay).sqrt();
    let nb = (bx * bx + by * by).sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    ((ax * bx + ay * by) / (na * nb)).clamp(-1.0, 1.0).acos()
}

/// 3D counterpart of [`angle_between_points`].
pub fn angle_between_3d(a: Vec3f, b: Vec3f, vertex: Vec3f) -> f64 {
    let u = sub3(a, vertex).map(|v| v as f64);
    let w = sub3(b, vertex).map(|v| v as f64);
    let nu = (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
    let nw = (w[0] * w[0] + w[1] * w[1] + w[2] * w[2]).sqrt();
    if nu == 0.0 || nw == 0.0 {
        return 0.0;
    }
    ((u[0] * w[0] + u[1] * w[1] + u[2] * w[2]) / (nu * nw))
        .clamp(-1.0, 1.0)
        .acos()
}

/// Direction of `v` measured counter-clockwise on screen from straight down,
/// in `[0, 2pi)`. Image rows grow downward, so right is `pi/2` and up is `pi`.
pub fn ccw_angle_from_down(v: Point2i) -> f64 {
    let angle = (v.x as f64).atan2(v.y as f64);
    if angle < 0.0 { angle + 2.0 * PI } else { angle }
}

/// Mean angle subtended at `contour[index]` by the points `k` steps before and
/// after it, for every `k` in `lo..=hi`. Indices wrap around the closed contour.
pub fn contour_curvature(contour: &[Point2i], index: usize, lo: usize, hi: usize) -> f64 {
    let n = contour.len();
    if n == 0 || hi < lo {
        return 0.0;
    }
    let center = contour[index % n];
    let mut total = 0.0;
    for k in lo..=hi {
        let k = k % n;
        let before = contour[(index + n - k) % n];
        let after = contour[(index + k) % n];
        total += angle_between_points(before, after, center);
    }
    total / (hi - lo + 1) as f64
}

/// Whether `p` lies within `side` pixels of the left/right border or `bottom`
/// pixels of the bottom border of a `width` x `height` frame.
pub fn point_on_edge(width: i32, height: i32, p: Point2i, bottom: i32, side: i32) -> bool {
    p.x <= side || p.x >= width - side || p.y >= height - bottom
}

/// Shoelace area; negative for a loop running counter-clockwise on screen.
pub fn signed_area(points: &[Point2i]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0i64;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        acc += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    acc as f64 * 0.5
}

pub fn contour_area(points: &[Point2i]) -> f64 {
    signed_area(points).abs()
}

/// Perimeter of the closed polygon.
pub fn arc_length(points: &[Point2i]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| distance2(points[i], points[(i + 1) % n]))
        .sum()
}

/// Indices of the two points farthest apart, and their distance.
pub fn diameter(points: &[Point2i]) -> (usize, usize, f64) {
    let mut best = (0, 0, 0i64);
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            let dx = (points[i].x - points[j].x) as i64;
            let dy = (points[i].y - points[j].y) as i64;
            let d2 = dx * dx + dy * dy;
            if d2 > best.2 {
                best = (i, j, d2);
            }
        }
    }
    (best.0, best.1, (best.2 as f64).sqrt())
}

/// Fewest steps between two indices of a closed contour of length `n`.
pub fn boundary_span(a: usize, b: usize, n: usize) -> usize {
    let d = a.abs_diff(b);
    d.min(n - d)
}

/// Whether walking forward from `from` reaches `x` no later than `to`.
pub fn arc_contains(from: usize, to: usize, x: usize) -> bool {
    if from <= to {
        x >= from && x <= to
    } else {
        x >= from || x <= to
    }
}
