use crate::{
    frame::XyzMap,
    geometry::util::{distance3, point_on_edge},
    params::HandParams,
    types::{Point2i, Vec3f},
};

/// Seed indices on the boundary from which the wrist search starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contacts {
    pub left: usize,
    pub right: usize,
}

/// Picks the wrist seeds. `boundary` is in frame coordinates.
///
/// For a cluster touching the frame edge the seeds are the extreme boundary
/// points inside the contact band below `hand_edge_connect_max_y`; points in
/// the side margins compete by height, interior points by column. Otherwise
/// both seeds are the first lowest boundary point.
pub fn find_contacts(
    boundary: &[Point2i],
    touching_edge: bool,
    frame_width: i32,
    frame_height: i32,
    params: &HandParams,
) -> Option<Contacts> {
    let l_margin = params.contact_side_edge_thresh;
    let r_margin = frame_width - params.contact_side_edge_thresh;
    let min_y = frame_height as f64 * params.hand_edge_connect_max_y;

    let mut contact: Option<Contacts> = None;
    for (i, &pt) in boundary.iter().enumerate() {
        if !touching_edge {
            if contact.is_none_or(|c| pt.y > boundary[c.left].y) {
                contact = Some(Contacts { left: i, right: i });
            }
            continue;
        }

        if pt.y as f64 <= min_y
            || !point_on_edge(
                frame_width,
                frame_height,
                pt,
                params.contact_bot_edge_thresh,
                params.contact_side_edge_thresh,
            )
        {
            continue;
        }

        let Some(c) = contact.as_mut() else {
            contact = Some(Contacts { left: i, right: i });
            continue;
        };

        let ccl = boundary[c.left];
        let ccr = boundary[c.right];
        if pt.x <= l_margin {
            if ccl.x > l_margin || ccl.y > pt.y {
                c.left = i;
            }
            if ccr.x <= l_margin && ccr.y < pt.y {
                c.right = i;
            }
        } else if pt.x >= r_margin {
            if ccr.x < r_margin || ccr.y > pt.y {
                c.right = i;
            }
            if ccl.x >= r_margin && ccl.y < pt.y {
                c.left = i;
            }
        } else {
            if ccl.x > pt.x {
                c.left = i;
            }
            if ccr.x < pt.x {
                c.right = i;
            }
        }
    }
    contact
}

/// Step applied to the left seed while walking; the right seed walks the
/// opposite way. Chosen so both walks head into the hand rather than across
/// the contact span.
pub fn walk_direction(contacts: Contacts, boundary_len: usize) -> i32 {
    let (l, r, half) = (contacts.left, contacts.right, boundary_len / 2);
    if (r > l && r - l < half) || (r <= l && l - r >= half) {
        -1
    } else {
        1
    }
}

/// Walks the boundary from `from` by `step` until an index whose averaged 3D
/// point lies within `wrist_center_dist_thresh` of the palm center. Gives up on
/// reaching `stop`.
#[allow(clippy::too_many_arguments)]
pub fn walk_to_palm(
    boundary: &[Point2i],
    map: &XyzMap,
    top_left: Point2i,
    from: usize,
    stop: usize,
    step: i32,
    palm_xyz: Vec3f,
    params: &HandParams,
) -> Option<usize> {
    let n = boundary.len() as i64;
    if n == 0 {
        return None;
    }
    let mut i = from;
    loop {
        let xyz = map.average_around_point(boundary[i] - top_left, params.xyz_average_size);
        if distance3(xyz, palm_xyz) <= params.wrist_center_dist_thresh {
            return Some(i);
        }
        i = ((i as i64 + step as i64 + n) % n) as usize;
        if i == stop {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(n: usize) -> Vec<Point2i> {
        // square outline traced counter-clockwise on screen
        let mut pts = Vec::new();
        for x in 0..n as i32 {
            pts.push(Point2i::new(x, n as i32));
        }
        for y in (1..=n as i32).rev() {
            pts.push(Point2i::new(n as i32, y));
        }
        for x in (1..=n as i32).rev() {
            pts.push(Point2i::new(x, 0));
        }
        for y in 0..n as i32 {
            pts.push(Point2i::new(0, y));
        }
        pts
    }

    #[test]
    fn test_lowest_point_seeds_without_edge_contact() {
        let boundary = vec![
            Point2i::new(5, 5),
            Point2i::new(6, 9),
            Point2i::new(7, 9),
            Point2i::new(8, 4),
        ];
        let c = find_contacts(&boundary, false, 640, 480, &HandParams::default()).unwrap();
        assert_eq!(c, Contacts { left: 1, right: 1 });
        assert_eq!(walk_direction(c, boundary.len()), 1);
    }

    #[test]
    fn test_bottom_contacts_take_extreme_columns() {
        let boundary = vec![
            Point2i::new(300, 475),
            Point2i::new(340, 476),
            Point2i::new(360, 300),
            Point2i::new(280, 477),
            Point2i::new(320, 478),
        ];
        let c = find_contacts(&boundary, true, 640, 480, &HandParams::default()).unwrap();
        assert_eq!(boundary[c.left], Point2i::new(280, 477));
        assert_eq!(boundary[c.right], Point2i::new(340, 476));
    }

    #[test]
    fn test_no_contacts_in_band() {
        let boundary = vec![Point2i::new(300, 100), Point2i::new(310, 120)];
        assert!(find_contacts(&boundary, true, 640, 480, &HandParams::default()).is_none());
    }

    #[test]
    fn test_direction_rules() {
        assert_eq!(walk_direction(Contacts { left: 10, right: 20 }, 100), -1);
        assert_eq!(walk_direction(Contacts { left: 10, right: 80 }, 100), 1);
        assert_eq!(walk_direction(Contacts { left: 80, right: 10 }, 100), -1);
        assert_eq!(walk_direction(Contacts { left: 30, right: 10 }, 100), 1);
    }

    #[test]
    fn test_walk_is_symmetric() {
        let boundary = ring(40);
        let map = XyzMap::from_fn(41, 41, |x, y| [x as f32 * 0.001, y as f32 * 0.001, 0.5]);
        let params = HandParams {
            wrist_center_dist_thresh: 0.012,
            xyz_average_size: 1,
            ..HandParams::default()
        };
        let palm = [0.030, 0.010, 0.5];
        let origin = Point2i::default();

        let contacts = Contacts { left: 3, right: 37 };
        let dir = walk_direction(contacts, boundary.len());
        let l = walk_to_palm(&boundary, &map, origin, contacts.left, contacts.right, dir, palm, &params);
        let r = walk_to_palm(&boundary, &map, origin, contacts.right, contacts.left, -dir, palm, &params);

        let swapped = Contacts { left: 37, right: 3 };
        let sdir = walk_direction(swapped, boundary.len());
        assert_eq!(sdir, -dir);
        let sl = walk_to_palm(&boundary, &map, origin, swapped.left, swapped.right, sdir, palm, &params);
        let sr = walk_to_palm(&boundary, &map, origin, swapped.right, swapped.left, -sdir, palm, &params);

        assert!(l.is_some() && r.is_some());
        assert_eq!((l, r), (sr, sl));
    }

    #[test]
    fn test_walk_gives_up_at_stop() {
        let boundary = ring(20);
        let map = XyzMap::from_fn(21, 21, |x, y| [x as f32 * 0.001, y as f32 * 0.001, 0.5]);
        let far_away = [1.0, 1.0, 0.5];
        let params = HandParams::default();
        let found = walk_to_palm(&boundary, &map, Point2i::default(), 0, 10, 1, far_away, &params);
        assert!(found.is_none());
    }
}
