use std::cmp::Ordering;

use crate::{
    geometry::util::{
        angle_between_points, arc_contains, boundary_span, ccw_angle_from_down, contour_curvature,
        distance3,
    },
    params::HandParams,
    types::{Defect, Point2i, Vec3f},
};

use super::Scene;

/// A validated fingertip with the defect it was paired with.
#[derive(Clone, Debug, PartialEq)]
pub struct Finger {
    /// Frame coordinates.
    pub tip_ij: Point2i,
    pub tip_xyz: Vec3f,
    /// Frame coordinates.
    pub defect_ij: Point2i,
    pub defect_xyz: Vec3f,
    pub tip_index: usize,
    /// `None` when the palm center stands in for the defect.
    pub defect_index: Option<usize>,
}

/// Fingertip candidates as parallel boundary indices, plus every defect that
/// passed the distance tests.
#[derive(Clone, Debug, Default)]
pub struct Candidates {
    pub tips: Vec<usize>,
    pub defects: Vec<usize>,
    pub good_defects: Vec<Defect>,
}

/// Orders defects counter-clockwise (on screen) from straight below `center`
/// by the direction of their far point.
pub fn sort_defects_by_angle(defects: &mut [Defect], boundary: &[Point2i], center: Point2i) {
    let mut angle = vec![0.0f64; boundary.len()];
    for d in defects.iter() {
        angle[d.far] = ccw_angle_from_down(boundary[d.far] - center);
    }
    defects.sort_by(|a, b| {
        angle[a.far]
            .partial_cmp(&angle[b.far])
            .unwrap_or(Ordering::Equal)
    });
}

/// Whether a defect's far point lies on the boundary arc spanned by the wrist,
/// i.e. on the forearm side of the hand.
pub fn under_wrist(far: usize, wrist_l: usize, wrist_r: usize, direction: i32) -> bool {
    if direction == -1 {
        arc_contains(wrist_l, wrist_r, far)
    } else {
        arc_contains(wrist_r, wrist_l, far)
    }
}

/// Turns sorted defects into fingertip candidates. A defect start is skipped
/// when it repeats the previous defect's end.
pub fn collect_candidates(
    scene: &Scene<'_>,
    boundary: &[Point2i],
    defects: &[Defect],
    wrist: (usize, usize),
    direction: i32,
    palm_xyz: Vec3f,
) -> Candidates {
    let params = scene.params;
    let mut out = Candidates::default();
    let mut last_end: Vec3f = [0.0; 3];
    let mut first = true;

    for defect in defects {
        if under_wrist(defect.far, wrist.0, wrist.1, direction) {
            continue;
        }

        let start = scene.snap(boundary[defect.start]);
        let end = scene.snap(boundary[defect.end]);
        let far = scene.snap(boundary[defect.far]);
        if !scene.map.contains(far) || !scene.map.contains(start) || !scene.map.contains(end) {
            continue;
        }

        let far_xyz = scene.average(far);
        let start_xyz = scene.average(start);
        let end_xyz = scene.average(end);

        let far_center = distance3(far_xyz, palm_xyz);
        let start_end = distance3(start_xyz, end_xyz);
        if far_center <= params.defect_far_center_min_dist
            || far_center >= params.defect_far_center_max_dist
            || start_end <= params.defect_start_end_min_dist
        {
            continue;
        }
        out.good_defects.push(*defect);

        if angle_between_points(start, end, far) > params.defect_max_angle {
            continue;
        }

        if !scene.on_edge(start + scene.top_left)
            && (first || distance3(last_end, start_xyz) > params.defect_min_dist)
        {
            out.tips.push(defect.start);
            out.defects.push(defect.far);
            first = false;
        }

        if !scene.on_edge(end + scene.top_left) {
            out.tips.push(defect.end);
            out.defects.push(defect.far);
        }

        last_end = end_xyz;
    }
    out
}

/// Applies the per-candidate geometric and curvature tests. `center` is the
/// palm center in local coordinates.
pub fn validate(
    scene: &Scene<'_>,
    boundary: &[Point2i],
    candidates: &Candidates,
    center: Point2i,
) -> Vec<Finger> {
    let params = scene.params;
    let mut fingers = Vec::new();

    for (&tip_index, &defect_index) in candidates.tips.iter().zip(&candidates.defects) {
        let tip = boundary[tip_index];
        let defect = boundary[defect_index];

        if defect.y >= center.y + params.defect_max_y_from_center
            || defect.y + scene.top_left.y >= scene.frame_height - params.bottom_edge_thresh
        {
            continue;
        }

        let tip_xyz = scene.average(tip);
        let defect_xyz = scene.average(defect);

        let length = distance3(tip_xyz, defect_xyz);
        let defect_slope = (defect.y - tip.y) as f64 / (defect.x - tip.x).abs() as f64;
        let center_slope = (center.y - tip.y) as f64 / (center.x - tip.x).abs() as f64;
        let defect_angle = angle_between_points(tip, center, defect);

        let span = boundary_span(defect_index, tip_index, boundary.len());
        if span < params.min_points_to_defect {
            continue;
        }

        let accepted = length < params.finger_len_max
            && length > params.finger_len_min
            && defect_slope > params.finger_defect_slope_min
            && center_slope > params.finger_center_slope_min
            && defect_angle > params.centroid_defect_finger_angle_min
            && tip_xyz[2] != 0.0
            && passes_curvature(boundary, tip_index, span, params);

        if !accepted {
            log::trace!(
                "finger candidate at {:?} rejected: length {length:.4}, slopes {defect_slope:.2}/{center_slope:.2}, angle {defect_angle:.2}",
                tip + scene.top_left
            );
            continue;
        }

        fingers.push(Finger {
            tip_ij: tip + scene.top_left,
            tip_xyz,
            defect_ij: defect + scene.top_left,
            defect_xyz,
            tip_index,
            defect_index: Some(defect_index),
        });
    }
    fingers
}

/// Samples the boundary curvature near the tip and further down the finger,
/// at offsets proportional to the tip-to-defect span.
pub fn passes_curvature(boundary: &[Point2i], tip: usize, span: usize, params: &HandParams) -> bool {
    let near_lo = (span / 20).max(2);
    let mid_lo = (span / 5).max(2);
    let far_lo = (span * 9 / 10).max(2);

    let near = contour_curvature(boundary, tip, near_lo, near_lo + 4);
    let mid = contour_curvature(boundary, tip, mid_lo, mid_lo + 5);
    let far = contour_curvature(boundary, tip, far_lo, far_lo + 5).min(mid);

    near >= params.finger_curve_near_min
        && near <= params.finger_curve_near_max
        && far >= params.finger_curve_far_min
        && far <= params.finger_curve_far_max
}

/// Drops every finger that has another finger above it (smaller world `y`,
/// earlier index on ties) closer than `min_dist`, keeping the topmost tip of
/// each tight group.
pub fn dedup(fingers: Vec<Finger>, min_dist: f64) -> Vec<Finger> {
    let keep: Vec<bool> = (0..fingers.len())
        .map(|i| {
            let yi = fingers[i].tip_xyz[1];
            !fingers.iter().enumerate().any(|(j, other)| {
                let yj = other.tip_xyz[1];
                let above = yj < yi || (yj == yi && j < i);
                above && distance3(fingers[i].tip_xyz, other.tip_xyz) < min_dist
            })
        })
        .collect();

    fingers
        .into_iter()
        .zip(keep)
        .filter_map(|(f, k)| k.then_some(f))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defect(far: usize) -> Defect {
        Defect {
            start: far.saturating_sub(1),
            end: far + 1,
            far,
            depth: 1.0,
        }
    }

    fn finger_at(x: f32, y: f32) -> Finger {
        Finger {
            tip_ij: Point2i::default(),
            tip_xyz: [x, y, 0.5],
            defect_ij: Point2i::default(),
            defect_xyz: [x, y + 0.05, 0.5],
            tip_index: 0,
            defect_index: None,
        }
    }

    #[test]
    fn test_sort_runs_ccw_from_below() {
        let center = Point2i::new(50, 50);
        let boundary = vec![
            Point2i::new(50, 90), // below
            Point2i::new(10, 50), // left
            Point2i::new(50, 10), // above
            Point2i::new(90, 50), // right
            Point2i::new(55, 90), // below, slightly right
        ];
        let mut defects = vec![defect(1), defect(2), defect(3), defect(0)];
        sort_defects_by_angle(&mut defects, &boundary, center);
        let order: Vec<usize> = defects.iter().map(|d| d.far).collect();
        assert_eq!(order, vec![0, 3, 2, 1]);

        let mut defects = vec![defect(3), defect(4)];
        sort_defects_by_angle(&mut defects, &boundary, center);
        assert_eq!(defects[0].far, 4);
    }

    #[test]
    fn test_under_wrist_follows_direction() {
        assert!(under_wrist(50, 40, 60, -1));
        assert!(!under_wrist(50, 40, 60, 1));
        assert!(under_wrist(5, 40, 60, 1));
        assert!(under_wrist(95, 40, 60, 1));
        assert!(under_wrist(40, 40, 60, 1));
    }

    #[test]
    fn test_dedup_keeps_topmost() {
        let fingers = vec![
            finger_at(0.0, 0.000),
            finger_at(0.005, 0.004),
            finger_at(0.05, 0.0),
        ];
        let kept = dedup(fingers.clone(), 0.01);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], fingers[0]);
        assert_eq!(kept[1], fingers[2]);
    }

    #[test]
    fn test_dedup_breaks_ties_by_index() {
        let fingers = vec![finger_at(0.0, 0.0), finger_at(0.005, 0.0)];
        let kept = dedup(fingers.clone(), 0.01);
        assert_eq!(kept, vec![fingers[0].clone()]);
        assert_eq!(dedup(Vec::new(), 0.01), Vec::new());
    }

    #[test]
    fn test_curvature_rejects_straight_boundary() {
        let line: Vec<Point2i> = (0..200).map(|x| Point2i::new(x, 0)).collect();
        assert!(!passes_curvature(&line, 100, 60, &HandParams::default()));
    }
}
