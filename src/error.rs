use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandError {
    #[error("hand classifier is not trained")]
    NotTrained,

    #[error("cluster has {ij} image points but {xyz} world points")]
    ClusterMismatch { ij: usize, xyz: usize },

    #[error("feature vector too short: model expects {expected} values, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("invalid model {path}: {reason}")]
    InvalidModel { path: PathBuf, reason: String },

    #[error("training data {path}: {reason}")]
    TrainingData { path: PathBuf, reason: String },

    #[error("no training samples for classifier #{0}")]
    EmptyTrainingBucket(usize),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HandError>;
