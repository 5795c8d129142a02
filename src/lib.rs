//! Per-frame hand detection on depth-camera clusters: geometric measurement of
//! palm, wrist and fingers, optionally confirmed by an SVM ensemble.

pub mod classifier;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod hand;
pub mod params;
pub mod pipeline;
pub mod types;

pub use classifier::{HandClassifier, LazyEnsemble, SvmEnsemble};
pub use error::{HandError, Result};
pub use frame::{CameraIntrinsics, Cluster, XyzMap};
pub use hand::{Detection, Hand, HandDetector, HandDiagnostics, Rejection};
pub use params::HandParams;
pub use types::{BoundingBox, Defect, Point2i, Vec3f};
