pub mod features;
pub mod svr;
pub mod training;

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use crate::error::{HandError, Result};

pub use svr::{DEFAULT_HYPER_PARAMS, SvrHyperParams, SvrModel};
pub use training::{TrainingBucket, TrainingSet};

/// Regressors in the ensemble, one per finger-count bucket (1, 2, 3, 4+).
pub const NUM_SVMS: usize = 4;

/// Prepended to relative model directories when set.
pub const MODEL_DIR_ENV: &str = "HAND_MODEL_DIR";
pub const DEFAULT_MODEL_DIR: &str = "models/hand";

/// Decides how hand-like a feature vector is.
pub trait HandClassifier: Send + Sync {
    fn is_trained(&self) -> bool;

    /// Confidence in `[0, 1]` that `features` (as produced by
    /// [`features::extract_features`]) describe a hand.
    fn classify(&self, features: &[f64]) -> Result<f64>;
}

/// Regressor index for a finger count; `None` for zero fingers.
pub fn svm_index(fingers: usize) -> Option<usize> {
    fingers.checked_sub(1).map(|i| i.min(NUM_SVMS - 1))
}

pub fn model_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("svm_{index}.json"))
}

/// Joins `relative` onto `base` when a non-empty base is given.
pub fn resolve_model_dir(base: Option<OsString>, relative: &Path) -> PathBuf {
    match base {
        Some(base) if !base.is_empty() => PathBuf::from(base).join(relative),
        _ => relative.to_path_buf(),
    }
}

pub fn default_model_dir() -> PathBuf {
    resolve_model_dir(std::env::var_os(MODEL_DIR_ENV), Path::new(DEFAULT_MODEL_DIR))
}

#[derive(Clone, Debug)]
pub enum TrainingEvent {
    Started { index: usize, samples: usize },
    Finished { index: usize, support_vectors: usize },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BucketReport {
    pub samples: usize,
    pub correct: usize,
}

impl BucketReport {
    pub fn accuracy(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.correct as f64 / self.samples as f64
        }
    }
}

/// Accuracy of a freshly trained ensemble on its own training data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingReport {
    pub buckets: [BucketReport; NUM_SVMS],
}

impl TrainingReport {
    pub fn overall(&self) -> BucketReport {
        self.buckets.iter().fold(BucketReport::default(), |acc, b| BucketReport {
            samples: acc.samples + b.samples,
            correct: acc.correct + b.correct,
        })
    }
}

/// Four RBF regressors selected by finger count. Either every model is
/// present or the ensemble is untrained.
#[derive(Clone, Debug, Default)]
pub struct SvmEnsemble {
    models: Option<Box<[SvrModel; NUM_SVMS]>>,
}

impl SvmEnsemble {
    pub fn untrained() -> Self {
        Self::default()
    }

    pub fn from_models(models: [SvrModel; NUM_SVMS]) -> Self {
        Self {
            models: Some(Box::new(models)),
        }
    }

    pub fn models(&self) -> Option<&[SvrModel; NUM_SVMS]> {
        self.models.as_deref()
    }

    /// Loads `svm_0.json` .. `svm_3.json` from `dir`. Any missing or invalid
    /// file leaves the ensemble untrained.
    pub fn load(dir: &Path) -> Self {
        match Self::try_load(dir) {
            Ok(ensemble) => {
                log::info!("Loaded hand classifier from {}", dir.display());
                ensemble
            }
            Err(e) => {
                log::warn!(
                    "Hand classifier unavailable in {}, using geometry only: {}",
                    dir.display(),
                    e
                );
                Self::untrained()
            }
        }
    }

    pub fn try_load(dir: &Path) -> Result<Self> {
        let mut models = Vec::with_capacity(NUM_SVMS);
        for index in 0..NUM_SVMS {
            models.push(read_model(&model_path(dir, index))?);
        }
        let models: [SvrModel; NUM_SVMS] = models
            .try_into()
            .map_err(|_| HandError::NotTrained)?;
        Ok(Self::from_models(models))
    }

    /// Writes every model to `dir`, creating it if needed.
    pub fn export(&self, dir: &Path) -> Result<()> {
        let models = self.models().ok_or(HandError::NotTrained)?;
        fs::create_dir_all(dir)?;
        for (index, model) in models.iter().enumerate() {
            let path = model_path(dir, index);
            fs::write(&path, serde_json::to_string_pretty(model)?)?;
            log::debug!("wrote {}", path.display());
        }
        log::info!("Exported hand classifier to {}", dir.display());
        Ok(())
    }

    /// Reads the training files in `data_dir` and fits one regressor per bucket.
    pub fn train<F>(
        data_dir: &Path,
        hyper: &[SvrHyperParams; NUM_SVMS],
        on_event: F,
    ) -> Result<(Self, TrainingReport)>
    where
        F: FnMut(TrainingEvent),
    {
        let set = TrainingSet::read_dir(data_dir)?;
        log::info!(
            "Read {} training samples from {}",
            set.total(),
            data_dir.display()
        );
        Self::fit(&set, hyper, on_event)
    }

    pub fn fit<F>(
        set: &TrainingSet,
        hyper: &[SvrHyperParams; NUM_SVMS],
        mut on_event: F,
    ) -> Result<(Self, TrainingReport)>
    where
        F: FnMut(TrainingEvent),
    {
        if let Some(index) = set.buckets.iter().position(TrainingBucket::is_empty) {
            return Err(HandError::EmptyTrainingBucket(index));
        }

        let mut models = Vec::with_capacity(NUM_SVMS);
        for (index, bucket) in set.buckets.iter().enumerate() {
            on_event(TrainingEvent::Started {
                index,
                samples: bucket.len(),
            });
            let model = svr::train(&bucket.samples, &bucket.targets(), &hyper[index]);
            on_event(TrainingEvent::Finished {
                index,
                support_vectors: model.support_vectors.len(),
            });
            models.push(model);
        }
        let models: [SvrModel; NUM_SVMS] = models
            .try_into()
            .map_err(|_| HandError::NotTrained)?;
        let ensemble = Self::from_models(models);

        let mut report = TrainingReport::default();
        for (index, bucket) in set.buckets.iter().enumerate() {
            let mut features = Vec::with_capacity(bucket.feature_count + 1);
            for (sample, &label) in bucket.samples.iter().zip(&bucket.labels) {
                features.clear();
                features.push(bucket.finger_count as f64);
                features.extend_from_slice(sample);
                let confidence = ensemble.classify(&features)?;
                let entry = &mut report.buckets[index];
                entry.samples += 1;
                if (confidence < 0.5 && label == 0) || (confidence > 0.5 && label == 1) {
                    entry.correct += 1;
                }
            }
            let entry = report.buckets[index];
            log::info!(
                "Classifier #{index}: {}/{} correct ({:.1}%)",
                entry.correct,
                entry.samples,
                entry.accuracy() * 100.0
            );
        }

        Ok((ensemble, report))
    }
}

impl HandClassifier for SvmEnsemble {
    fn is_trained(&self) -> bool {
        self.models.is_some()
    }

    fn classify(&self, features: &[f64]) -> Result<f64> {
        let models = self.models().ok_or(HandError::NotTrained)?;
        let Some((&fingers, values)) = features.split_first() else {
            return Ok(0.0);
        };
        let Some(index) = svm_index(fingers.max(0.0) as usize) else {
            return Ok(0.0);
        };
        let model = &models[index];
        if values.len() < model.feature_count {
            return Err(HandError::FeatureMismatch {
                expected: model.feature_count,
                actual: values.len(),
            });
        }
        let raw = model.predict(&values[..model.feature_count]);
        Ok(if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) })
    }
}

/// Loads an [`SvmEnsemble`] from `dir` on first use.
#[derive(Debug)]
pub struct LazyEnsemble {
    dir: PathBuf,
    ensemble: OnceLock<SvmEnsemble>,
}

impl LazyEnsemble {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ensemble: OnceLock::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(default_model_dir())
    }

    pub fn get(&self) -> &SvmEnsemble {
        self.ensemble.get_or_init(|| SvmEnsemble::load(&self.dir))
    }
}

impl HandClassifier for LazyEnsemble {
    fn is_trained(&self) -> bool {
        self.get().is_trained()
    }

    fn classify(&self, features: &[f64]) -> Result<f64> {
        self.get().classify(features)
    }
}

fn read_model(path: &Path) -> Result<SvrModel> {
    let text = fs::read_to_string(path)?;
    let model: SvrModel = serde_json::from_str(&text)?;
    model.validate().map_err(|reason| HandError::InvalidModel {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(model)
}
