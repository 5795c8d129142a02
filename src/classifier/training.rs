use std::{fs, path::Path};

use crate::error::{HandError, Result};

use super::{NUM_SVMS, features::sanitize, svm_index};

pub const LABELS_FILE: &str = "labels.txt";
pub const FEATURES_FILE: &str = "features.txt";

/// Samples for one finger-count regressor. Rows are truncated to the shortest
/// record seen in the bucket and exclude the leading finger count.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingBucket {
    pub samples: Vec<Vec<f64>>,
    pub labels: Vec<i32>,
    pub feature_count: usize,
    /// Smallest finger count among the bucket's records.
    pub finger_count: usize,
}

impl TrainingBucket {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.labels.iter().map(|&l| l as f64).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingSet {
    pub buckets: [TrainingBucket; NUM_SVMS],
}

struct Record<'a> {
    name: &'a str,
    feature_count: usize,
    fingers: usize,
    values: Vec<f64>,
}

impl TrainingSet {
    /// Reads `labels.txt` and `features.txt` from `dir`.
    pub fn read_dir(dir: &Path) -> Result<Self> {
        let labels_path = dir.join(LABELS_FILE);
        let features_path = dir.join(FEATURES_FILE);
        let labels = fs::read_to_string(&labels_path)?;
        let features = fs::read_to_string(&features_path)?;
        Self::parse(&labels, &features).map_err(|(file, reason)| HandError::TrainingData {
            path: if file == LABELS_FILE { labels_path } else { features_path },
            reason,
        })
    }

    /// Joins labels to feature records by name. The labels file starts with a
    /// record count; the features file starts with a header line. Label
    /// entries without a matching feature record are skipped.
    pub fn parse(labels: &str, features: &str) -> std::result::Result<Self, (&'static str, String)> {
        let mut label_tokens = tokens(labels);
        let count: usize = match label_tokens.next() {
            Some(t) => t
                .parse()
                .map_err(|_| (LABELS_FILE, format!("bad record count {t:?}")))?,
            None => return Err((LABELS_FILE, "empty file".to_string())),
        };

        let records = features
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .take(count)
            .enumerate()
            .map(|(i, line)| parse_record(line).map_err(|e| (FEATURES_FILE, format!("record {}: {e}", i + 1))))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut set = Self::default();
        let mut min_features = [usize::MAX; NUM_SVMS];
        let mut min_fingers = [usize::MAX; NUM_SVMS];
        for r in &records {
            if let Some(b) = svm_index(r.fingers) {
                min_features[b] = min_features[b].min(r.feature_count);
                min_fingers[b] = min_fingers[b].min(r.fingers);
            }
        }

        'records: for r in &records {
            let label = loop {
                let Some(name) = label_tokens.next() else {
                    break 'records;
                };
                let Some(value) = label_tokens.next() else {
                    return Err((LABELS_FILE, format!("missing label for {name}")));
                };
                if name == r.name {
                    break value
                        .parse::<i32>()
                        .map_err(|_| (LABELS_FILE, format!("bad label {value:?} for {name}")))?;
                }
                log::debug!("skipping label for {name}, next feature record is {}", r.name);
            };

            let Some(b) = svm_index(r.fingers) else {
                continue;
            };
            let width = min_features[b] - 1;
            let bucket = &mut set.buckets[b];
            bucket.samples.push(r.values[..width].to_vec());
            bucket.labels.push(label);
        }

        for (b, bucket) in set.buckets.iter_mut().enumerate() {
            if !bucket.is_empty() {
                bucket.feature_count = min_features[b] - 1;
                bucket.finger_count = min_fingers[b];
            }
        }
        Ok(set)
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(TrainingBucket::len).sum()
    }
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
}

fn parse_record(line: &str) -> std::result::Result<Record<'_>, String> {
    let mut it = tokens(line);
    let name = it.next().ok_or("missing name")?;
    let feature_count: usize = it
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or("bad feature count")?;
    let fingers: usize = it
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or("bad finger count")?;
    if feature_count == 0 {
        return Err("feature count must include the finger count".to_string());
    }
    let values = it
        .take(feature_count - 1)
        .map(|t| {
            t.parse::<f64>()
                .map(sanitize)
                .map_err(|_| format!("bad value {t:?}"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if values.len() < feature_count - 1 {
        return Err(format!(
            "{name} declares {} values, found {}",
            feature_count - 1,
            values.len()
        ));
    }
    Ok(Record {
        name,
        feature_count,
        fingers,
        values,
    })
}
