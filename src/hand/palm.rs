use crate::{
    frame::XyzMap,
    geometry::{
        contour::{area_centroid, convex_hull_indices, convexity_defects, trace_boundary},
        util::distance3,
    },
    params::HandParams,
    types::{Defect, Point2i, Vec3f},
};

/// Boundary-derived geometry of one cluster, in local map coordinates.
#[derive(Clone, Debug)]
pub struct PalmGeometry {
    pub boundary: Vec<Point2i>,
    pub hull_indices: Vec<usize>,
    pub defects: Vec<Defect>,
    /// Boundary centroid snapped onto the cluster.
    pub centroid: Point2i,
    pub top_point: Point2i,
    pub center: Point2i,
    pub center_xyz: Vec3f,
    pub radius: f64,
}

pub fn analyze(map: &XyzMap, top_point: Point2i, params: &HandParams) -> PalmGeometry {
    let boundary = trace_boundary(map);
    let hull_indices = convex_hull_indices(&boundary);
    let defects = if hull_indices.len() > 3 {
        convexity_defects(&boundary, &hull_indices)
    } else {
        Vec::new()
    };

    let centroid = map.nearest_point_on_cluster(area_centroid(&boundary), params.snap_radius);
    let top_xyz = map.average_around_point(top_point, params.xyz_average_size);

    let (center, radius) = largest_inscribed_circle(
        map,
        &boundary,
        top_xyz,
        params.center_max_dist_from_top,
        centroid.y,
    )
    .unwrap_or_else(|| (centroid, min_distance_to(&boundary, centroid, f64::MAX).sqrt()));
    let center_xyz = map.average_around_point(center, params.xyz_average_size);

    PalmGeometry {
        boundary,
        hull_indices,
        defects,
        centroid,
        top_point,
        center,
        center_xyz,
        radius,
    }
}

/// Searches data pixels within `max_dist_from_top` (3D) of `top_xyz` and no lower
/// than `max_row` for the one farthest from the boundary. Returns the center and
/// the radius in pixels.
pub fn largest_inscribed_circle(
    map: &XyzMap,
    boundary: &[Point2i],
    top_xyz: Vec3f,
    max_dist_from_top: f64,
    max_row: i32,
) -> Option<(Point2i, f64)> {
    if boundary.is_empty() {
        return None;
    }

    let mut best: Option<(Point2i, f64)> = None;
    let last_row = max_row.min(map.height() as i32 - 1);
    for y in 0..=last_row {
        for x in 0..map.width() as i32 {
            let p = Point2i::new(x, y);
            let xyz = map.at(p);
            if xyz[2] == 0.0 || distance3(xyz, top_xyz) > max_dist_from_top {
                continue;
            }
            let floor = best.map_or(0.0, |(_, r2)| r2);
            let r2 = min_distance_to(boundary, p, floor);
            if r2 > floor || best.is_none() {
                best = Some((p, r2));
            }
        }
    }
    best.map(|(p, r2)| (p, r2.sqrt()))
}

/// Squared distance from `p` to the nearest boundary point. Stops early once the
/// distance drops to `floor` or below, since the caller only wants larger values.
fn min_distance_to(boundary: &[Point2i], p: Point2i, floor: f64) -> f64 {
    let mut min = f64::MAX;
    for q in boundary {
        let dx = (q.x - p.x) as f64;
        let dy = (q.y - p.y) as f64;
        let d2 = dx * dx + dy * dy;
        if d2 < min {
            min = d2;
            if min <= floor {
                break;
            }
        }
    }
    min
}
