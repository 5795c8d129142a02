use crate::{frame::XyzMap, params::HandParams, types::Point2i};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeContact {
    pub left: bool,
    pub right: bool,
}

impl EdgeContact {
    pub fn any(&self) -> bool {
        self.left || self.right
    }
}

/// Sweeps the bottom band and the side columns of the frame, restricted to the
/// cluster's local map, for data pixels. The left and right halves of the frame
/// are judged independently.
pub fn edge_connectivity(
    map: &XyzMap,
    top_left: Point2i,
    frame_width: i32,
    frame_height: i32,
    params: &HandParams,
) -> EdgeContact {
    let cols = map.width() as i32;
    let rows = map.height() as i32;
    let has_data = |col: i32, row: i32| map.has_data(Point2i::new(col, row));

    let bottom_row = frame_height - params.bottom_edge_thresh - top_left.y;
    let bottom_in_map = bottom_row >= 0 && bottom_row < rows;
    let side_top = ((frame_height as f64 * params.hand_edge_connect_max_y) - top_left.y as f64)
        .max(0.0)
        .ceil() as i32;
    let side_bottom = (frame_height - 1 - top_left.y).min(rows - 1);

    let side_sweep = |col: i32| -> bool {
        col >= 0 && col < cols && (side_top..=side_bottom).rev().any(|row| has_data(col, row))
    };

    let mid = frame_width / 2 - top_left.x;

    let left = (bottom_in_map && (0..mid.min(cols)).any(|col| has_data(col, bottom_row)))
        || side_sweep(params.side_edge_thresh - top_left.x);

    let right = (bottom_in_map
        && (mid.max(0)..(frame_width - top_left.x).min(cols)).any(|col| has_data(col, bottom_row)))
        || side_sweep(frame_width - params.side_edge_thresh - top_left.x);

    EdgeContact { left, right }
}
