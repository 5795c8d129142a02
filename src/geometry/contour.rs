use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};

use crate::{
    frame::XyzMap,
    geometry::util::signed_area,
    types::{Defect, Point2i},
};

/// Outer boundary of the largest blob of data pixels in `map`, in map
/// coordinates, running counter-clockwise on screen (bottom, right, top, left).
pub fn trace_boundary(map: &XyzMap) -> Vec<Point2i> {
    // one pixel of padding keeps blobs touching the map border closed
    let (w, h) = (map.width() as u32, map.height() as u32);
    let mask = GrayImage::from_fn(w + 2, h + 2, |x, y| {
        if x == 0 || y == 0 || x > w || y > h {
            return Luma([0u8]);
        }
        if map.has_data(Point2i::new(x as i32 - 1, y as i32 - 1)) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    let mut best: Option<(f64, Vec<Point2i>)> = None;
    for contour in find_contours::<i32>(&mask) {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let points: Vec<Point2i> = contour
            .points
            .iter()
            .map(|p| Point2i::new(p.x - 1, p.y - 1))
            .collect();
        let area = signed_area(&points).abs();
        let better = match &best {
            None => true,
            Some((best_area, best_points)) => {
                area > *best_area || (area == *best_area && points.len() > best_points.len())
            }
        };
        if better {
            best = Some((area, points));
        }
    }

    let mut boundary = best.map(|(_, points)| points).unwrap_or_default();
    if signed_area(&boundary) > 0.0 {
        boundary.reverse();
    }
    boundary
}

/// Convex hull of `contour` as ascending contour indices. Collinear points are
/// dropped; a point visited more than once maps to its first index.
pub fn convex_hull_indices(contour: &[Point2i]) -> Vec<usize> {
    let mut first_index: HashMap<Point2i, usize> = HashMap::with_capacity(contour.len());
    for (i, p) in contour.iter().enumerate() {
        first_index.entry(*p).or_insert(i);
    }

    let mut points: Vec<Point2i> = first_index.keys().copied().collect();
    points.sort_by_key(|p| (p.x, p.y));
    if points.len() < 3 {
        let mut idx: Vec<usize> = points.iter().map(|p| first_index[p]).collect();
        idx.sort_unstable();
        return idx;
    }

    let cross = |o: Point2i, a: Point2i, b: Point2i| -> i64 {
        (a.x - o.x) as i64 * (b.y - o.y) as i64 - (a.y - o.y) as i64 * (b.x - o.x) as i64
    };

    let mut hull: Vec<Point2i> = Vec::with_capacity(points.len() + 1);
    for &p in &points {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in points.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();

    let mut idx: Vec<usize> = hull.iter().map(|p| first_index[p]).collect();
    idx.sort_unstable();
    idx
}

/// For each pair of consecutive hull vertices (wrapping around), the contour
/// point between them farthest from the hull edge. Pairs whose run lies on the
/// edge produce no defect.
pub fn convexity_defects(contour: &[Point2i], hull: &[usize]) -> Vec<Defect> {
    let n = contour.len();
    let mut defects = Vec::new();
    if hull.len() < 3 || n < 3 {
        return defects;
    }

    for k in 0..hull.len() {
        let start = hull[k];
        let end = hull[(k + 1) % hull.len()];
        let a = contour[start];
        let b = contour[end];
        let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
        let len = (dx * dx + dy * dy).sqrt();
        if len == 0.0 {
            continue;
        }

        let mut far = start;
        let mut depth = 0.0f64;
        let mut i = (start + 1) % n;
        while i != end {
            let p = contour[i];
            let d = ((p.x - a.x) as f64 * dy - (p.y - a.y) as f64 * dx).abs() / len;
            if d > depth {
                depth = d;
                far = i;
            }
            i = (i + 1) % n;
        }

        if depth > 0.0 {
            defects.push(Defect {
                start,
                end,
                far,
                depth: depth as f32,
            });
        }
    }
    defects
}

/// Area centroid of the polygon; the vertex mean for degenerate polygons.
pub fn area_centroid(contour: &[Point2i]) -> Point2i {
    let n = contour.len();
    if n == 0 {
        return Point2i::default();
    }

    let (mut m00, mut m10, mut m01) = (0.0f64, 0.0f64, 0.0f64);
    for i in 0..n {
        let a = contour[i];
        let b = contour[(i + 1) % n];
        let c = a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
        m00 += c;
        m10 += (a.x + b.x) as f64 * c;
        m01 += (a.y + b.y) as f64 * c;
    }

    if m00.abs() < f64::EPSILON {
        let sx: i64 = contour.iter().map(|p| p.x as i64).sum();
        let sy: i64 = contour.iter().map(|p| p.y as i64).sum();
        return Point2i::new((sx / n as i64) as i32, (sy / n as i64) as i32);
    }

    let cx = m10 / (3.0 * m00);
    let cy = m01 / (3.0 * m00);
    Point2i::new(cx.round() as i32, cy.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::util::contour_area;

    fn disc_map(size: usize, cx: i32, cy: i32, r: i32) -> XyzMap {
        XyzMap::from_fn(size, size, |x, y| {
            let (dx, dy) = (x as i32 - cx, y as i32 - cy);
            if dx * dx + dy * dy <= r * r {
                [0.0, 0.0, 1.0]
            } else {
                [0.0; 3]
            }
        })
    }

    #[test]
    fn test_boundary_is_ccw_on_screen() {
        let map = disc_map(60, 30, 30, 20);
        let boundary = trace_boundary(&map);
        assert!(boundary.len() > 80);
        assert!(signed_area(&boundary) < 0.0);
        assert!(boundary.iter().all(|p| map.has_data(*p)));
    }

    #[test]
    fn test_boundary_keeps_largest_blob() {
        let map = XyzMap::from_fn(50, 20, |x, y| {
            let small = x < 5 && y < 5;
            let large = (10..40).contains(&x) && (5..15).contains(&y);
            if small || large { [0.0, 0.0, 1.0] } else { [0.0; 3] }
        });
        let boundary = trace_boundary(&map);
        assert!(boundary.iter().all(|p| p.x >= 10));
        assert_eq!(contour_area(&boundary), 29.0 * 9.0);
    }

    #[test]
    fn test_boundary_of_blob_touching_border() {
        let map = XyzMap::from_fn(10, 10, |_, _| [0.0, 0.0, 1.0]);
        let boundary = trace_boundary(&map);
        assert_eq!(contour_area(&boundary), 81.0);
        assert!(boundary.contains(&Point2i::new(0, 0)));
        assert!(boundary.contains(&Point2i::new(9, 9)));
    }

    #[test]
    fn test_hull_of_square_with_notch() {
        // square traced on screen counter-clockwise, notch cut into the top edge
        let contour = vec![
            Point2i::new(0, 10),
            Point2i::new(10, 10),
            Point2i::new(10, 0),
            Point2i::new(6, 0),
            Point2i::new(5, 4),
            Point2i::new(4, 0),
            Point2i::new(0, 0),
        ];
        let hull = convex_hull_indices(&contour);
        assert_eq!(hull, vec![0, 1, 2, 6]);

        let defects = convexity_defects(&contour, &hull);
        assert_eq!(defects.len(), 1);
        assert_eq!((defects[0].start, defects[0].end, defects[0].far), (2, 6, 4));
        assert_eq!(defects[0].depth, 4.0);
    }

    #[test]
    fn test_area_centroid() {
        let square = [
            Point2i::new(0, 10),
            Point2i::new(10, 10),
            Point2i::new(10, 0),
            Point2i::new(0, 0),
        ];
        assert_eq!(area_centroid(&square), Point2i::new(5, 5));
        assert_eq!(area_centroid(&[Point2i::new(2, 2), Point2i::new(4, 2)]), Point2i::new(3, 2));
    }
}
