#![allow(dead_code)]

use depth_hand::{Cluster, Point2i, Vec3f, XyzMap};

pub const WIDTH: usize = 640;
pub const HEIGHT: usize = 480;

/// A single-object frame at 1 mm per pixel, half a meter from the camera.
pub struct Scene {
    pub frame: XyzMap,
    pub ij: Vec<Point2i>,
    pub xyz: Vec<Vec3f>,
}

impl Scene {
    pub fn render(inside: impl Fn(f64, f64) -> bool) -> Self {
        let frame = XyzMap::from_fn(WIDTH, HEIGHT, |x, y| {
            if inside(x as f64, y as f64) {
                world(x, y)
            } else {
                [0.0; 3]
            }
        });
        let mut ij = Vec::new();
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let p = Point2i::new(x as i32, y as i32);
                if frame.has_data(p) {
                    ij.push(p);
                }
            }
        }
        let xyz = frame.sample(&ij);
        Self { frame, ij, xyz }
    }

    pub fn cluster(&self) -> Cluster<'_> {
        Cluster::new(&self.ij, &self.xyz, &self.frame).unwrap()
    }
}

pub fn world(x: usize, y: usize) -> Vec3f {
    [
        (x as f32 - 320.0) * 0.001,
        (y as f32 - 240.0) * 0.001,
        0.5,
    ]
}

fn in_capsule(px: f64, py: f64, a: (f64, f64), b: (f64, f64), r: f64) -> bool {
    let (vx, vy) = (b.0 - a.0, b.1 - a.1);
    let t = (((px - a.0) * vx + (py - a.1) * vy) / (vx * vx + vy * vy)).clamp(0.0, 1.0);
    let (qx, qy) = (a.0 + t * vx, a.1 + t * vy);
    (px - qx).powi(2) + (py - qy).powi(2) <= r * r
}

/// Palm disc at (320, 260) with radius 45, a 60 px wide forearm running down
/// to `forearm_bottom`, and one 14 px wide finger per angle (degrees from
/// straight up, positive to the right) reaching 95 px from the palm center.
pub fn star(angles: &[f64], forearm_bottom: f64) -> Scene {
    let (cx, cy) = (320.0, 260.0);
    let fingers: Vec<((f64, f64), (f64, f64))> = angles
        .iter()
        .map(|deg| {
            let (dx, dy) = (deg.to_radians().sin(), -deg.to_radians().cos());
            ((cx + 30.0 * dx, cy + 30.0 * dy), (cx + 95.0 * dx, cy + 95.0 * dy))
        })
        .collect();

    Scene::render(|x, y| {
        (x - cx).powi(2) + (y - cy).powi(2) <= 45.0 * 45.0
            || ((290.0..=350.0).contains(&x) && (260.0..=forearm_bottom).contains(&y))
            || fingers.iter().any(|&(a, b)| in_capsule(x, y, a, b, 7.0))
    })
}

pub fn five_finger_star() -> Scene {
    star(&[-60.0, -30.0, 0.0, 30.0, 60.0], 400.0)
}

pub fn disc(cx: f64, cy: f64, r: f64) -> Scene {
    Scene::render(|x, y| (x - cx).powi(2) + (y - cy).powi(2) <= r * r)
}

/// Whether any point lies within `tol` pixels of `target`.
pub fn has_point_near(points: &[Point2i], target: Point2i, tol: i32) -> bool {
    points
        .iter()
        .any(|p| (p.x - target.x).abs() <= tol && (p.y - target.y).abs() <= tol)
}
