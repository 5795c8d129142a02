use crate::{
    geometry::util::{angle_between_points, boundary_span, distance2, distance3},
    types::{Defect, Point2i, Vec3f},
};

use super::{
    Scene,
    fingers::{Finger, passes_curvature},
};

/// Fallback for hands showing at most one finger: the hull point farthest from
/// the palm center (and roughly above it) becomes the only fingertip, paired
/// with the nearest good defect or, failing that, the palm center itself.
///
/// `palm_center` is in frame coordinates.
pub fn find_single_finger(
    scene: &Scene<'_>,
    boundary: &[Point2i],
    hull_indices: &[usize],
    good_defects: &[Defect],
    palm_center: Point2i,
    palm_xyz: Vec3f,
) -> Option<Finger> {
    let params = scene.params;
    let tl = scene.top_left;

    let mut best: Option<(usize, Point2i, Point2i, Point2i)> = None;
    let mut farthest = 0.0;
    if hull_indices.len() > 1 {
        let m = hull_indices.len();
        for i in 0..m {
            let pt = boundary[hull_indices[i]] + tl;
            if scene.on_edge(pt) {
                continue;
            }

            let xyz = scene
                .map
                .average_around_point(pt - tl, params.single_finger_hull_average_size);
            let dist = distance3(xyz, palm_xyz);
            let slope = (palm_center.y - pt.y) as f64 / (pt.x - palm_center.x).abs() as f64;

            if slope > params.single_finger_slope_min
                && pt.y < scene.frame_height - params.single_finger_bottom_cutoff
                && dist > farthest
            {
                farthest = dist;
                let right = boundary[hull_indices[(i + 1) % m]] + tl;
                let left = boundary[hull_indices[(i + m - 1) % m]] + tl;
                best = Some((hull_indices[i], pt, left, right));
            }
        }
    }

    let Some((tip_index, tip, left, right)) = best else {
        log::trace!("no hull point qualifies as a single fingertip");
        return None;
    };

    let search_radius = (scene.map.width() + scene.map.height()) as i32;
    let tip = scene.map.nearest_point_on_cluster(tip - tl, search_radius) + tl;
    let tip_xyz = scene
        .map
        .average_around_point(tip - tl, params.single_finger_tip_average_size);

    let angle = angle_between_points(left, right, tip);
    if angle <= params.single_finger_angle_thresh || scene.on_edge(tip) || good_defects.is_empty() {
        log::trace!("single fingertip at {tip:?} rejected: hull angle {angle:.3}");
        return None;
    }

    let mut best_defect: Option<(f64, Point2i, Vec3f, usize)> = None;
    for defect in good_defects {
        let far = boundary[defect.far];
        let far_xyz = scene.average(far);
        let far = scene.snap(far);
        let dist = distance3(far_xyz, tip_xyz);
        if dist > params.single_finger_len_min && best_defect.is_none_or(|(d, ..)| dist < d) {
            best_defect = Some((dist, far + tl, far_xyz, defect.far));
        }
    }

    let (defect_ij, defect_xyz, defect_index, span_anchor) = match best_defect {
        Some((_, ij, xyz, idx)) => (ij, xyz, Some(idx), idx),
        None => (
            palm_center,
            palm_xyz,
            None,
            nearest_boundary_index(boundary, palm_center - tl),
        ),
    };

    let span = boundary_span(span_anchor, tip_index, boundary.len());
    if span < params.min_points_to_defect || !passes_curvature(boundary, tip_index, span, params) {
        log::trace!("single fingertip at {tip:?} rejected by boundary shape (span {span})");
        return None;
    }

    let length = distance3(tip_xyz, defect_xyz);
    if length > params.single_finger_len_max || length < params.single_finger_len_min {
        log::trace!("single fingertip at {tip:?} rejected: length {length:.4}");
        return None;
    }

    Some(Finger {
        tip_ij: tip,
        tip_xyz,
        defect_ij,
        defect_xyz,
        tip_index,
        defect_index,
    })
}

fn nearest_boundary_index(boundary: &[Point2i], p: Point2i) -> usize {
    boundary
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| distance2(**a, p).total_cmp(&distance2(**b, p)))
        .map_or(0, |(i, _)| i)
}
