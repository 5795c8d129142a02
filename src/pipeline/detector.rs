use std::{thread, time::Instant};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    frame::{Cluster, XyzMap, segment_clusters},
    hand::{Detection, HandDetector},
    types::{Point2i, Vec3f},
};

#[derive(Clone, Debug)]
pub struct DepthFrame {
    pub xyz: XyzMap,
    pub timestamp: Instant,
}

impl DepthFrame {
    pub fn new(xyz: XyzMap) -> Self {
        Self {
            xyz,
            timestamp: Instant::now(),
        }
    }
}

/// Coarse object segmentation ahead of hand detection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Meters; farther pixels are background.
    pub max_depth: f32,
    pub min_points: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_depth: 1.2,
            min_points: 400,
        }
    }
}

/// Detection results for one frame, one entry per segmented cluster.
#[derive(Clone, Debug)]
pub struct FrameHands {
    pub timestamp: Instant,
    pub detections: Vec<Detection>,
}

impl FrameHands {
    pub fn hands(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter().filter(|d| d.hand.is_hand())
    }
}

/// Segments `frame` into clusters and runs the detector over all of them.
pub fn detect_frame(
    detector: &HandDetector,
    frame: &XyzMap,
    segmentation: &SegmentationConfig,
) -> Result<Vec<Detection>> {
    let regions = segment_clusters(frame, segmentation.max_depth, segmentation.min_points);
    let points: Vec<(&[Point2i], Vec<Vec3f>)> = regions
        .iter()
        .map(|ij| (ij.as_slice(), frame.sample(ij)))
        .collect();
    let clusters = points
        .iter()
        .map(|(ij, xyz)| Cluster::new(ij, xyz, frame))
        .collect::<Result<Vec<_>>>()?;
    detector.detect_all(&clusters)
}

/// Spawns a worker that detects hands in the newest frame available,
/// skipping frames that queued up while it was busy. Stops when the frame
/// sender is dropped.
pub fn start_detector(
    detector: HandDetector,
    segmentation: SegmentationConfig,
    frame_rx: Receiver<DepthFrame>,
    result_tx: Sender<FrameHands>,
) -> thread::JoinHandle<()> {
    log::info!(
        "starting hand detector (classifier {})",
        if detector.params().hand_use_svm { "enabled" } else { "disabled" }
    );

    thread::spawn(move || {
        while let Some(frame) = recv_latest_frame(&frame_rx) {
            match detect_frame(&detector, &frame.xyz, &segmentation) {
                Ok(detections) => {
                    let _ = result_tx.try_send(FrameHands {
                        timestamp: frame.timestamp,
                        detections,
                    });
                }
                Err(err) => {
                    log::warn!("hand detection failed: {err}");
                }
            }
        }
        log::debug!("frame channel closed, hand detector exiting");
    })
}

fn recv_latest_frame(frame_rx: &Receiver<DepthFrame>) -> Option<DepthFrame> {
    let mut frame = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};

    fn blob_frame() -> XyzMap {
        XyzMap::from_fn(64, 48, |x, y| {
            if (20..40).contains(&x) && (10..30).contains(&y) {
                [x as f32 * 0.001, y as f32 * 0.001, 0.5]
            } else {
                [0.0; 3]
            }
        })
    }

    #[test]
    fn test_recv_latest_frame_skips_stale() {
        let (tx, rx) = unbounded();
        for i in 0..3 {
            tx.send(DepthFrame::new(XyzMap::new(i + 1, 1))).unwrap();
        }
        let latest = recv_latest_frame(&rx).unwrap();
        assert_eq!(latest.xyz.width(), 3);
        drop(tx);
        assert!(recv_latest_frame(&rx).is_none());
    }

    #[test]
    fn test_detect_frame_reports_every_cluster() {
        let segmentation = SegmentationConfig {
            max_depth: 1.0,
            min_points: 10,
        };
        let detections = detect_frame(&HandDetector::default(), &blob_frame(), &segmentation).unwrap();
        assert_eq!(detections.len(), 1);
        assert!(!detections[0].hand.is_hand());
    }

    #[test]
    fn test_worker_publishes_and_exits() {
        let (frame_tx, frame_rx) = bounded(1);
        let (result_tx, result_rx) = bounded(4);
        let segmentation = SegmentationConfig {
            max_depth: 1.0,
            min_points: 10,
        };
        let handle = start_detector(HandDetector::default(), segmentation, frame_rx, result_tx);

        frame_tx.send(DepthFrame::new(blob_frame())).unwrap();
        let result = result_rx.recv().unwrap();
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.hands().count(), 0);

        drop(frame_tx);
        handle.join().unwrap();
    }
}
