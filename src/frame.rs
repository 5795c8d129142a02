use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::{
    error::{HandError, Result},
    geometry::util::{cross3, norm3, sub3},
    types::{BoundingBox, Point2i, Vec3f},
};

/// Dense grid of camera-space points, row-major. Pixels with `z == 0` hold no data.
#[derive(Clone, Debug, PartialEq)]
pub struct XyzMap {
    width: usize,
    height: usize,
    data: Vec<Vec3f>,
}

impl XyzMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![[0.0; 3]; width * height],
        }
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> Vec3f) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Back-projects a millimeter depth image through a pinhole camera.
    pub fn from_depth_mm(depth: &ImageBuffer<Luma<u16>, Vec<u16>>, camera: &CameraIntrinsics) -> Self {
        let (width, height) = depth.dimensions();
        Self::from_fn(width as usize, height as usize, |x, y| {
            let raw = depth.get_pixel(x as u32, y as u32)[0];
            if raw == 0 {
                return [0.0; 3];
            }
            let z = raw as f32 * 0.001;
            [
                (x as f32 - camera.cx) * z / camera.fx,
                (y as f32 - camera.cy) * z / camera.fy,
                z,
            ]
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, p: Point2i) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as usize) < self.width && (p.y as usize) < self.height
    }

    /// Point at `p`, or the zero point outside the map.
    pub fn at(&self, p: Point2i) -> Vec3f {
        if self.contains(p) {
            self.data[p.y as usize * self.width + p.x as usize]
        } else {
            [0.0; 3]
        }
    }

    pub fn set(&mut self, p: Point2i, value: Vec3f) {
        if self.contains(p) {
            self.data[p.y as usize * self.width + p.x as usize] = value;
        }
    }

    pub fn depth(&self, p: Point2i) -> f32 {
        self.at(p)[2]
    }

    pub fn has_data(&self, p: Point2i) -> bool {
        self.depth(p) != 0.0
    }

    pub fn sample(&self, points: &[Point2i]) -> Vec<Vec3f> {
        points.iter().map(|p| self.at(*p)).collect()
    }

    /// Mean of the valid points in the `size` x `size` window centered on `p`.
    /// Returns the zero point when the window holds no data.
    pub fn average_around_point(&self, p: Point2i, size: i32) -> Vec3f {
        let half = size / 2;
        let mut sum = [0.0f64; 3];
        let mut count = 0usize;

        let y0 = (p.y - half).max(0);
        let y1 = (p.y + half).min(self.height as i32 - 1);
        let x0 = (p.x - half).max(0);
        let x1 = (p.x + half).min(self.width as i32 - 1);

        for y in y0..=y1 {
            for x in x0..=x1 {
                let v = self.data[y as usize * self.width + x as usize];
                if v[2] != 0.0 {
                    sum[0] += v[0] as f64;
                    sum[1] += v[1] as f64;
                    sum[2] += v[2] as f64;
                    count += 1;
                }
            }
        }

        if count == 0 {
            return [0.0; 3];
        }
        let n = count as f64;
        [(sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32]
    }

    /// `p` if it holds data, otherwise the closest data pixel found within
    /// `max_radius` square rings. Falls back to `p` when nothing is found.
    pub fn nearest_point_on_cluster(&self, p: Point2i, max_radius: i32) -> Point2i {
        if self.has_data(p) {
            return p;
        }

        for r in 1..=max_radius {
            let mut best: Option<(i64, Point2i)> = None;
            for dy in -r..=r {
                let step = if dy == -r || dy == r { 1 } else { 2 * r };
                let mut dx = -r;
                while dx <= r {
                    let q = Point2i::new(p.x + dx, p.y + dy);
                    if self.has_data(q) {
                        let d2 = (dx as i64).pow(2) + (dy as i64).pow(2);
                        if best.is_none_or(|(bd, _)| d2 < bd) {
                            best = Some((d2, q));
                        }
                    }
                    dx += step;
                }
            }
            if let Some((_, q)) = best {
                return q;
            }
            if r as usize > self.width.max(self.height) {
                break;
            }
        }
        p
    }

    /// Area (m^2) of the surface spanned by neighboring data pixels.
    pub fn surface_area(&self) -> f64 {
        let mut total = 0.0f64;
        for y in 0..self.height.saturating_sub(1) {
            for x in 0..self.width.saturating_sub(1) {
                let p = self.data[y * self.width + x];
                let right = self.data[y * self.width + x + 1];
                let down = self.data[(y + 1) * self.width + x];
                if p[2] == 0.0 || right[2] == 0.0 || down[2] == 0.0 {
                    continue;
                }
                total += norm3(cross3(sub3(right, p), sub3(down, p))) as f64;
            }
        }
        total
    }
}

/// Pinhole intrinsics used when converting depth images.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self {
            fx: 525.0,
            fy: 525.0,
            cx: 319.5,
            cy: 239.5,
        }
    }
}

/// A candidate object: parallel image/world points borrowed from the caller,
/// plus the frame they came from.
#[derive(Clone, Copy, Debug)]
pub struct Cluster<'a> {
    points_ij: &'a [Point2i],
    points_xyz: &'a [Vec3f],
    frame: &'a XyzMap,
    bbox: BoundingBox,
}

impl<'a> Cluster<'a> {
    pub fn new(points_ij: &'a [Point2i], points_xyz: &'a [Vec3f], frame: &'a XyzMap) -> Result<Self> {
        if points_ij.len() != points_xyz.len() {
            return Err(HandError::ClusterMismatch {
                ij: points_ij.len(),
                xyz: points_xyz.len(),
            });
        }
        let bbox = BoundingBox::enclosing(points_ij).unwrap_or_default();
        Ok(Self {
            points_ij,
            points_xyz,
            frame,
            bbox,
        })
    }

    pub fn points_ij(&self) -> &'a [Point2i] {
        self.points_ij
    }

    pub fn points_xyz(&self) -> &'a [Vec3f] {
        self.points_xyz
    }

    pub fn is_empty(&self) -> bool {
        self.points_ij.is_empty()
    }

    pub fn frame_width(&self) -> i32 {
        self.frame.width() as i32
    }

    pub fn frame_height(&self) -> i32 {
        self.frame.height() as i32
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// Topmost point, leftmost among ties.
    pub fn top_point(&self) -> Option<Point2i> {
        self.points_ij.iter().copied().min_by_key(|p| (p.y, p.x))
    }

    /// Bounding-box sized map holding only this cluster's points.
    pub fn local_map(&self) -> XyzMap {
        let origin = self.bbox.top_left();
        let mut map = XyzMap::new(self.bbox.width.max(0) as usize, self.bbox.height.max(0) as usize);
        for (ij, xyz) in self.points_ij.iter().zip(self.points_xyz) {
            map.set(*ij - origin, *xyz);
        }
        map
    }
}

/// Splits the frame into 8-connected regions closer than `max_depth` meters,
/// dropping regions under `min_points` pixels. Largest region first; points
/// within a region are in row-major order.
pub fn segment_clusters(frame: &XyzMap, max_depth: f32, min_points: usize) -> Vec<Vec<Point2i>> {
    let mask = GrayImage::from_fn(frame.width() as u32, frame.height() as u32, |x, y| {
        let z = frame.depth(Point2i::new(x as i32, y as i32));
        if z > 0.0 && z < max_depth {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut regions: Vec<Vec<Point2i>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if regions.len() < label {
            regions.resize_with(label, Vec::new);
        }
        regions[label - 1].push(Point2i::new(x as i32, y as i32));
    }

    regions.retain(|r| r.len() >= min_points);
    regions.sort_by(|a, b| b.len().cmp(&a.len()));
    regions
}
