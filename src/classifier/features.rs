use std::f64::consts::PI;

use crate::{
    frame::XyzMap,
    geometry::util::{
        angle_between_3d, angle_between_points, arc_length, ccw_angle_from_down, contour_area,
        diameter, distance3, midpoint3,
    },
    hand::Hand,
    types::Vec3f,
};

/// Features computed for a hand before the per-finger blocks.
pub const LEADING_FEATURES: usize = 13;
/// Values in each finger's block.
pub const FINGER_FEATURES: usize = 7;
/// Values comparing a finger against the others, present when there are two or more.
pub const PAIRWISE_FEATURES: usize = 4;

/// Length of the vector [`extract_features`] produces for `fingers` fingers.
pub fn feature_len(fingers: usize) -> usize {
    match fingers {
        0 => 1,
        1 => LEADING_FEATURES + FINGER_FEATURES,
        n => LEADING_FEATURES + (FINGER_FEATURES + PAIRWISE_FEATURES) * n,
    }
}

/// Summarizes a measured hand as a fixed-schema vector. The first value is
/// always the finger count, which selects the regressor. `map` is the
/// cluster-local map the hand was measured on.
pub fn extract_features(hand: &Hand, points_xyz: &[Vec3f], map: &XyzMap, average_size: i32) -> Vec<f64> {
    let n = hand.num_fingers();
    let mut out = Vec::with_capacity(feature_len(n));
    out.push(n as f64);
    if n == 0 {
        return out;
    }

    let center = hand.palm_center();
    let center_ij = hand.palm_center_ij();

    // point cloud spread around the palm
    let count = points_xyz.len().max(1) as f64;
    let planar: Vec<f64> = points_xyz
        .iter()
        .map(|p| {
            let dx = (p[0] - center[0]) as f64;
            let dy = (p[1] - center[1]) as f64;
            (dx * dx + dy * dy).sqrt()
        })
        .collect();
    let mean_dist = planar.iter().sum::<f64>() / count;
    let var_dist = planar.iter().map(|d| (d - mean_dist).powi(2)).sum::<f64>() / count;
    let mean_depth = points_xyz.iter().map(|p| p[2] as f64).sum::<f64>() / count;
    let var_depth = points_xyz
        .iter()
        .map(|p| (p[2] as f64 - mean_depth).powi(2))
        .sum::<f64>()
        / count;

    out.push(mean_dist * 20.0);
    out.push(var_dist.sqrt() * 25.0);
    out.push(hand.surface_area() * 10.0);
    out.push(var_depth.sqrt() * 25.0);

    // shape
    let boundary = hand.boundary();
    let boundary_area = contour_area(boundary);
    let hull_area = contour_area(hand.hull());
    out.push(boundary_area / hull_area);
    out.push(boundary_area / hand.bounding_box().area() as f64);
    out.push(arc_length(boundary) / arc_length(hand.hull()) * 0.5);

    let (a, b, diam) = diameter(boundary);
    out.push(hand.circle_radius() / diam * 2.0);
    let diam_3d = match (boundary.get(a), boundary.get(b)) {
        (Some(&pa), Some(&pb)) => distance3(
            map.average_around_point(pa, average_size),
            map.average_around_point(pb, average_size),
        ),
        _ => 0.0,
    };
    out.push(diam_3d);

    let (wrist_width, mid_wrist) = match hand.wrist() {
        [l, r] => (distance3(*l, *r), midpoint3(*l, *r)),
        _ => (0.0, center),
    };
    out.push(wrist_width);

    // fingers
    let tips = hand.fingers();
    let defects = hand.defects();
    let lengths: Vec<f64> = tips
        .iter()
        .zip(defects)
        .map(|(t, d)| distance3(*t, *d))
        .collect();
    out.push(lengths.iter().sum::<f64>() / n as f64 * 5.0);
    out.push(tips.iter().map(|t| distance3(*t, mid_wrist)).sum::<f64>() / n as f64 * 2.0);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| lengths[j].total_cmp(&lengths[i]).then(j.cmp(&i)));

    let tips_ij = hand.fingers_ij();
    let defects_ij = hand.defects_ij();
    for &j in &order {
        out.push(lengths[j] * 5.0);
        out.push(distance3(defects[j], center) * 5.0);
        out.push(distance3(tips[j], center) * 5.0);
        out.push(angle_between_3d(tips[j], defects[j], center) / PI);
        out.push(angle_between_points(tips_ij[j], center_ij, defects_ij[j]) / PI);
        out.push(ccw_angle_from_down(tips_ij[j] - center_ij));
        out.push(ccw_angle_from_down(defects_ij[j] - center_ij));

        if n > 1 {
            let (mut min_tip, mut max_tip) = (f64::INFINITY, 0.0f64);
            let (mut min_def, mut max_def) = (f64::INFINITY, 0.0f64);
            for k in (0..n).filter(|&k| k != j) {
                let dt = distance3(tips[j], tips[k]);
                let dd = distance3(defects[j], defects[k]);
                min_tip = min_tip.min(dt);
                max_tip = max_tip.max(dt);
                min_def = min_def.min(dd);
                max_def = max_def.max(dd);
            }
            out.extend([min_tip * 5.0, max_tip * 5.0, min_def * 5.0, max_def * 5.0]);
        }
    }

    for v in &mut out {
        *v = sanitize(*v);
    }
    out
}

/// Replaces NaN with `1.0` and values at or above `f32::MAX` with `100.0`.
/// Applied to extracted features and to training rows alike.
pub(crate) fn sanitize(v: f64) -> f64 {
    if v.is_nan() {
        1.0
    } else if v >= f32::MAX as f64 {
        100.0
    } else {
        v
    }
}
