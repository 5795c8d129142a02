mod edge;
mod fingers;
mod palm;
mod single_finger;
mod wrist;

use std::{fmt, sync::Arc};

use rayon::prelude::*;
use thiserror::Error;

use crate::{
    classifier::{HandClassifier, features::extract_features},
    error::Result,
    frame::{Cluster, XyzMap},
    geometry::util::{distance3, point_on_edge},
    params::HandParams,
    types::{BoundingBox, Defect, Point2i, Vec3f},
};

pub use edge::EdgeContact;
pub use fingers::Finger;

/// A cluster's hand geometry. Built once by [`HandDetector::detect`] and read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct Hand {
    pub(crate) bounding_box: BoundingBox,
    pub(crate) boundary: Vec<Point2i>,
    pub(crate) hull: Vec<Point2i>,
    pub(crate) hull_indices: Vec<usize>,
    pub(crate) convexity_defects: Vec<Defect>,
    pub(crate) palm_center_ij: Point2i,
    pub(crate) palm_center_xyz: Vec3f,
    pub(crate) circle_radius: f64,
    pub(crate) wrist_ij: Vec<Point2i>,
    pub(crate) wrist_xyz: Vec<Vec3f>,
    pub(crate) fingers_ij: Vec<Point2i>,
    pub(crate) fingers_xyz: Vec<Vec3f>,
    pub(crate) defects_ij: Vec<Point2i>,
    pub(crate) defects_xyz: Vec<Vec3f>,
    pub(crate) left_edge_connected: bool,
    pub(crate) right_edge_connected: bool,
    pub(crate) surface_area: f64,
    pub(crate) is_hand: bool,
    pub(crate) confidence: Option<f64>,
}

impl Hand {
    /// Outer boundary, relative to the bounding box's top-left corner.
    pub fn boundary(&self) -> &[Point2i] {
        &self.boundary
    }

    /// Convex hull vertices, relative to the bounding box.
    pub fn hull(&self) -> &[Point2i] {
        &self.hull
    }

    pub fn hull_indices(&self) -> &[usize] {
        &self.hull_indices
    }

    pub fn convexity_defects(&self) -> &[Defect] {
        &self.convexity_defects
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn palm_center_ij(&self) -> Point2i {
        self.palm_center_ij
    }

    pub fn palm_center(&self) -> Vec3f {
        self.palm_center_xyz
    }

    /// Radius in pixels of the largest inscribed circle.
    pub fn circle_radius(&self) -> f64 {
        self.circle_radius
    }

    /// Either empty or the two wrist endpoints.
    pub fn wrist_ij(&self) -> &[Point2i] {
        &self.wrist_ij
    }

    pub fn wrist(&self) -> &[Vec3f] {
        &self.wrist_xyz
    }

    pub fn wrist_width(&self) -> Option<f64> {
        match self.wrist_xyz.as_slice() {
            [a, b] => Some(distance3(*a, *b)),
            _ => None,
        }
    }

    pub fn fingers_ij(&self) -> &[Point2i] {
        &self.fingers_ij
    }

    pub fn fingers(&self) -> &[Vec3f] {
        &self.fingers_xyz
    }

    /// Defect paired with each finger, parallel to [`Hand::fingers_ij`].
    pub fn defects_ij(&self) -> &[Point2i] {
        &self.defects_ij
    }

    pub fn defects(&self) -> &[Vec3f] {
        &self.defects_xyz
    }

    pub fn num_fingers(&self) -> usize {
        self.fingers_xyz.len()
    }

    pub fn touching_edge(&self) -> bool {
        self.left_edge_connected || self.right_edge_connected
    }

    pub fn touching_left_edge(&self) -> bool {
        self.left_edge_connected
    }

    pub fn touching_right_edge(&self) -> bool {
        self.right_edge_connected
    }

    /// Square meters.
    pub fn surface_area(&self) -> f64 {
        self.surface_area
    }

    pub fn is_hand(&self) -> bool {
        self.is_hand
    }

    /// Classifier output in `[0, 1]`, when the classifier ran.
    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    fn set_fingers(&mut self, fingers: &[Finger]) {
        self.fingers_ij = fingers.iter().map(|f| f.tip_ij).collect();
        self.fingers_xyz = fingers.iter().map(|f| f.tip_xyz).collect();
        self.defects_ij = fingers.iter().map(|f| f.defect_ij).collect();
        self.defects_xyz = fingers.iter().map(|f| f.defect_xyz).collect();
    }
}

/// Why a cluster is not a hand.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Rejection {
    #[error("cluster has no points")]
    EmptyCluster,
    #[error("surface area {0:.4} m^2 out of range")]
    AreaOutOfRange(f64),
    #[error("cluster does not touch a frame edge")]
    NotEdgeConnected,
    #[error("wrist not found")]
    WristNotFound,
    #[error("wrist width {0:.4} m out of range")]
    WristWidth(f64),
    #[error("{0} fingers")]
    FingerCount(usize),
    #[error("classifier confidence {0:.3} too low")]
    LowConfidence(f64),
}

/// Intermediate results, in frame coordinates.
#[derive(Clone, Debug, Default)]
pub struct HandDiagnostics {
    pub centroid: Option<Point2i>,
    pub top_point: Option<Point2i>,
    pub contacts: Option<(Point2i, Point2i)>,
    /// Boundary step taken from the left contact; zero when no seeds were found.
    pub direction: i32,
    pub wrist_indices: Option<(usize, usize)>,
    pub good_defects: Vec<Defect>,
    pub candidate_count: usize,
    pub used_single_finger: bool,
    pub rejection: Option<Rejection>,
}

#[derive(Clone, Debug)]
pub struct Detection {
    pub hand: Hand,
    pub diagnostics: HandDiagnostics,
}

/// Per-call view of a cluster's local map.
pub(crate) struct Scene<'a> {
    pub map: &'a XyzMap,
    pub top_left: Point2i,
    pub frame_width: i32,
    pub frame_height: i32,
    pub params: &'a HandParams,
}

impl Scene<'_> {
    pub fn average(&self, local: Point2i) -> Vec3f {
        self.map.average_around_point(local, self.params.xyz_average_size)
    }

    pub fn snap(&self, local: Point2i) -> Point2i {
        self.map.nearest_point_on_cluster(local, self.params.snap_radius)
    }

    pub fn on_edge(&self, global: Point2i) -> bool {
        point_on_edge(
            self.frame_width,
            self.frame_height,
            global,
            self.params.bottom_edge_thresh,
            self.params.side_edge_thresh,
        )
    }
}

#[derive(Clone)]
pub struct HandDetector {
    params: HandParams,
    classifier: Option<Arc<dyn HandClassifier>>,
}

impl fmt::Debug for HandDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandDetector")
            .field("params", &self.params)
            .field("classifier", &self.classifier.is_some())
            .finish()
    }
}

impl Default for HandDetector {
    fn default() -> Self {
        Self::new(HandParams::default())
    }
}

impl HandDetector {
    /// Geometry-only detector; attach a classifier with [`HandDetector::with_classifier`].
    pub fn new(params: HandParams) -> Self {
        Self {
            params,
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn HandClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn params(&self) -> &HandParams {
        &self.params
    }

    /// Decides whether `cluster` is a hand. Geometric rejections are reported
    /// through [`HandDiagnostics::rejection`]; errors come only from the classifier.
    pub fn detect(&self, cluster: &Cluster<'_>) -> Result<Detection> {
        let mut hand = Hand {
            bounding_box: cluster.bounding_box(),
            ..Hand::default()
        };
        let mut diagnostics = HandDiagnostics::default();
        let map = cluster.local_map();
        let scene = Scene {
            map: &map,
            top_left: cluster.bounding_box().top_left(),
            frame_width: cluster.frame_width(),
            frame_height: cluster.frame_height(),
            params: &self.params,
        };

        let mut verdict = self.measure(cluster, &scene, &mut hand, &mut diagnostics);

        if verdict.is_ok() && self.params.hand_use_svm {
            if let Some(classifier) = self.classifier.as_ref().filter(|c| c.is_trained()) {
                let features =
                    extract_features(&hand, cluster.points_xyz(), &map, self.params.xyz_average_size);
                let confidence = classifier.classify(&features)?;
                hand.confidence = Some(confidence);
                if confidence < self.params.svm_confidence_thresh {
                    verdict = Err(Rejection::LowConfidence(confidence));
                }
            }
        }

        match verdict {
            Ok(()) => hand.is_hand = true,
            Err(rejection) => {
                log::debug!(
                    "cluster at {:?} is not a hand: {rejection}",
                    hand.bounding_box.top_left()
                );
                diagnostics.rejection = Some(rejection);
            }
        }

        Ok(Detection { hand, diagnostics })
    }

    /// Runs [`HandDetector::detect`] over independent clusters in parallel. Every
    /// hand except the most confident one must also clear
    /// `svm_high_confidence_thresh`.
    pub fn detect_all(&self, clusters: &[Cluster<'_>]) -> Result<Vec<Detection>> {
        let mut detections = clusters
            .par_iter()
            .map(|cluster| self.detect(cluster))
            .collect::<Result<Vec<_>>>()?;

        let best = detections
            .iter()
            .enumerate()
            .filter(|(_, d)| d.hand.is_hand)
            .filter_map(|(i, d)| d.hand.confidence.map(|c| (i, c)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);

        if let Some(best) = best {
            for (i, detection) in detections.iter_mut().enumerate() {
                if i == best || !detection.hand.is_hand {
                    continue;
                }
                if let Some(c) = detection.hand.confidence {
                    if c < self.params.svm_high_confidence_thresh {
                        detection.hand.is_hand = false;
                        detection.diagnostics.rejection = Some(Rejection::LowConfidence(c));
                    }
                }
            }
        }

        Ok(detections)
    }

    fn measure(
        &self,
        cluster: &Cluster<'_>,
        scene: &Scene<'_>,
        hand: &mut Hand,
        diagnostics: &mut HandDiagnostics,
    ) -> std::result::Result<(), Rejection> {
        let params = &self.params;
        let tl = scene.top_left;
        let Some(top) = cluster.top_point() else {
            return Err(Rejection::EmptyCluster);
        };

        let contact = edge::edge_connectivity(
            scene.map,
            tl,
            scene.frame_width,
            scene.frame_height,
            params,
        );
        hand.left_edge_connected = contact.left;
        hand.right_edge_connected = contact.right;

        hand.surface_area = scene.map.surface_area();
        if hand.surface_area < params.hand_min_area || hand.surface_area > params.hand_max_area {
            return Err(Rejection::AreaOutOfRange(hand.surface_area));
        }
        if params.hand_require_edge_connected && !contact.any() {
            return Err(Rejection::NotEdgeConnected);
        }

        let palm = palm::analyze(scene.map, top - tl, params);
        if palm.boundary.is_empty() {
            return Err(Rejection::EmptyCluster);
        }
        diagnostics.centroid = Some(palm.centroid + tl);
        diagnostics.top_point = Some(palm.top_point + tl);

        hand.boundary = palm.boundary.clone();
        hand.convexity_defects = palm.defects.clone();
        hand.hull = palm.hull_indices.iter().map(|&i| palm.boundary[i]).collect();
        hand.hull_indices = palm.hull_indices.clone();
        hand.palm_center_ij = palm.center + tl;
        hand.palm_center_xyz = palm.center_xyz;
        hand.circle_radius = palm.radius;

        let global: Vec<Point2i> = palm.boundary.iter().map(|p| *p + tl).collect();
        let n = global.len();

        // wrist
        let contacts = wrist::find_contacts(
            &global,
            contact.any(),
            scene.frame_width,
            scene.frame_height,
            params,
        )
        .ok_or(Rejection::WristNotFound)?;
        let direction = wrist::walk_direction(contacts, n);
        diagnostics.contacts = Some((global[contacts.left], global[contacts.right]));
        diagnostics.direction = direction;

        let palm_xyz = palm.center_xyz;
        let walk = |from, stop, step| {
            wrist::walk_to_palm(&global, scene.map, tl, from, stop, step, palm_xyz, params)
        };
        let (Some(wrist_l), Some(wrist_r)) = (
            walk(contacts.left, contacts.right, direction),
            walk(contacts.right, contacts.left, -direction),
        ) else {
            return Err(Rejection::WristNotFound);
        };
        diagnostics.wrist_indices = Some((wrist_l, wrist_r));

        for idx in [wrist_l, wrist_r] {
            hand.wrist_ij.push(global[idx]);
            hand.wrist_xyz.push(scene.average(palm.boundary[idx]));
        }
        let width = distance3(hand.wrist_xyz[0], hand.wrist_xyz[1]);

        if width < params.wrist_width_min || width > params.wrist_width_max {
            return Err(Rejection::WristWidth(width));
        }

        // fingers
        let boundary = &palm.boundary;
        let mut defects = palm.defects.clone();
        fingers::sort_defects_by_angle(&mut defects, boundary, palm.center);
        let candidates = fingers::collect_candidates(
            scene,
            boundary,
            &defects,
            (wrist_l, wrist_r),
            direction,
            palm_xyz,
        );
        diagnostics.candidate_count = candidates.tips.len();

        let validated = fingers::validate(scene, boundary, &candidates, palm.center);
        let mut found = fingers::dedup(validated, params.finger_dist_min);
        if found.len() <= 1 {
            diagnostics.used_single_finger = true;
            found = single_finger::find_single_finger(
                scene,
                boundary,
                &hand.hull_indices,
                &candidates.good_defects,
                hand.palm_center_ij,
                palm_xyz,
            )
            .into_iter()
            .collect();
        }
        diagnostics.good_defects = candidates.good_defects;
        hand.set_fingers(&found);

        if found.is_empty() || found.len() > 6 {
            return Err(Rejection::FingerCount(found.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cluster_is_rejected() {
        let frame = XyzMap::new(64, 48);
        let cluster = Cluster::new(&[], &[], &frame).unwrap();
        let detection = HandDetector::default().detect(&cluster).unwrap();
        assert!(!detection.hand.is_hand());
        assert_eq!(detection.diagnostics.rejection, Some(Rejection::EmptyCluster));
    }

    #[test]
    fn test_small_blob_fails_area_gate() {
        let frame = XyzMap::from_fn(64, 48, |x, y| {
            if (10..20).contains(&x) && (10..20).contains(&y) {
                [x as f32 * 0.001, y as f32 * 0.001, 0.5]
            } else {
                [0.0; 3]
            }
        });
        let ij: Vec<Point2i> = (10..20)
            .flat_map(|y| (10..20).map(move |x| Point2i::new(x, y)))
            .collect();
        let xyz = frame.sample(&ij);
        let cluster = Cluster::new(&ij, &xyz, &frame).unwrap();
        let detection = HandDetector::default().detect(&cluster).unwrap();
        assert!(matches!(
            detection.diagnostics.rejection,
            Some(Rejection::AreaOutOfRange(a)) if a < 1e-3
        ));
        assert_eq!(detection.hand.num_fingers(), 0);
        assert!(detection.hand.boundary().is_empty());
    }

    #[test]
    fn test_wrist_width_requires_pair() {
        let mut hand = Hand::default();
        assert_eq!(hand.wrist_width(), None);
        hand.wrist_xyz = vec![[0.0, 0.0, 0.5], [0.03, 0.04, 0.5]];
        assert!((hand.wrist_width().unwrap() - 0.05).abs() < 1e-6);
    }
}
