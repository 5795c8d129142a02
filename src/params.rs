use std::{f64::consts::PI, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Thresholds for hand detection. Distances are meters unless the name says
/// pixels; angles are radians. Unknown fields in a JSON file are rejected,
/// missing ones keep their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandParams {
    /// Side of the square window (pixels) averaged when sampling a 3D point.
    pub xyz_average_size: i32,
    /// Pixels from the bottom of the frame treated as the bottom edge.
    pub bottom_edge_thresh: i32,
    /// Pixels from the left/right of the frame treated as a side edge.
    pub side_edge_thresh: i32,

    /// Surface area bounds (m^2).
    pub hand_min_area: f64,
    pub hand_max_area: f64,
    pub hand_require_edge_connected: bool,
    /// Fraction of frame height below which side contacts count as edge contacts.
    pub hand_edge_connect_max_y: f64,

    pub hand_use_svm: bool,
    pub svm_confidence_thresh: f64,
    /// Stricter threshold applied to every hand but the best one in a frame.
    pub svm_high_confidence_thresh: f64,

    pub center_max_dist_from_top: f64,
    pub contact_bot_edge_thresh: i32,
    pub contact_side_edge_thresh: i32,

    pub wrist_width_min: f64,
    pub wrist_width_max: f64,
    pub wrist_center_dist_thresh: f64,

    pub finger_len_min: f64,
    pub finger_len_max: f64,
    pub finger_dist_min: f64,
    pub finger_defect_slope_min: f64,
    pub finger_center_slope_min: f64,
    pub finger_curve_near_min: f64,
    pub finger_curve_near_max: f64,
    pub finger_curve_far_min: f64,
    pub finger_curve_far_max: f64,

    pub single_finger_len_min: f64,
    pub single_finger_len_max: f64,
    pub single_finger_angle_thresh: f64,
    pub single_finger_slope_min: f64,
    /// Hull points closer than this many pixels to the bottom are never single-finger tips.
    pub single_finger_bottom_cutoff: i32,
    pub single_finger_hull_average_size: i32,
    pub single_finger_tip_average_size: i32,

    pub defect_max_angle: f64,
    pub defect_min_dist: f64,
    pub defect_far_center_min_dist: f64,
    pub defect_far_center_max_dist: f64,
    pub defect_start_end_min_dist: f64,
    /// Pixels below the palm center a finger's defect may sit.
    pub defect_max_y_from_center: i32,
    pub centroid_defect_finger_angle_min: f64,

    /// Fewest boundary indices between a tip and its defect.
    pub min_points_to_defect: usize,
    /// Search radius (pixels) when snapping a point onto the cluster.
    pub snap_radius: i32,
}

impl Default for HandParams {
    fn default() -> Self {
        Self {
            xyz_average_size: 9,
            bottom_edge_thresh: 10,
            side_edge_thresh: 10,

            hand_min_area: 0.01,
            hand_max_area: 0.056,
            hand_require_edge_connected: false,
            hand_edge_connect_max_y: 0.5,

            hand_use_svm: true,
            svm_confidence_thresh: 0.45,
            svm_high_confidence_thresh: 0.59,

            center_max_dist_from_top: 0.155,
            contact_bot_edge_thresh: 8,
            contact_side_edge_thresh: 25,

            wrist_width_min: 0.03,
            wrist_width_max: 0.085,
            wrist_center_dist_thresh: 0.075,

            finger_len_min: 0.014,
            finger_len_max: 0.125,
            finger_dist_min: 0.01,
            finger_defect_slope_min: -1.0,
            finger_center_slope_min: -0.45,
            finger_curve_near_min: 0.95,
            finger_curve_near_max: 2.80,
            finger_curve_far_min: 0.05,
            finger_curve_far_max: 1.20,

            single_finger_len_min: 0.04,
            single_finger_len_max: 0.11,
            single_finger_angle_thresh: 0.08,
            single_finger_slope_min: -0.1,
            single_finger_bottom_cutoff: 10,
            single_finger_hull_average_size: 22,
            single_finger_tip_average_size: 10,

            defect_max_angle: 0.7 * PI,
            defect_min_dist: 0.02,
            defect_far_center_min_dist: 0.01,
            defect_far_center_max_dist: 0.105,
            defect_start_end_min_dist: 0.01,
            defect_max_y_from_center: 30,
            centroid_defect_finger_angle_min: 0.4 * PI,

            min_points_to_defect: 10,
            snap_radius: 64,
        }
    }
}

impl HandParams {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
