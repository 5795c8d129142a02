mod common;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use common::five_finger_star;
use depth_hand::{
    HandClassifier, HandDetector, HandParams, LazyEnsemble, Rejection, SvmEnsemble,
    classifier::{
        DEFAULT_HYPER_PARAMS, NUM_SVMS, SvrModel, TrainingEvent, features::feature_len,
        model_path, svm_index,
    },
};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("depth-hand-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// A model whose output is `output` everywhere.
fn constant_model(feature_count: usize, output: f64) -> SvrModel {
    SvrModel {
        gamma: 1.0,
        rho: -output,
        feature_count,
        support_vectors: vec![vec![0.0; feature_count]],
        coefficients: vec![0.0],
    }
}

/// Ensemble answering `output` for hands with four or more fingers.
fn ensemble_for_many_fingers(output: f64) -> SvmEnsemble {
    SvmEnsemble::from_models([
        constant_model(1, 0.0),
        constant_model(1, 0.0),
        constant_model(1, 0.0),
        constant_model(feature_len(5) - 1, output),
    ])
}

#[test]
fn test_svm_index_buckets() {
    let expected = [(1, 0), (2, 1), (3, 2), (4, 3), (5, 3), (100, 3)];
    for (fingers, index) in expected {
        assert_eq!(svm_index(fingers), Some(index));
    }
    assert_eq!(svm_index(0), None);
}

#[test]
fn test_confident_classifier_keeps_hand() {
    let scene = five_finger_star();
    let detector = HandDetector::default().with_classifier(Arc::new(ensemble_for_many_fingers(0.9)));
    let detection = detector.detect(&scene.cluster()).unwrap();

    assert!(detection.hand.is_hand());
    let confidence = detection.hand.confidence().unwrap();
    assert!((confidence - 0.9).abs() < 1e-9);
}

#[test]
fn test_low_confidence_rejects_hand() {
    let scene = five_finger_star();
    let detector = HandDetector::default().with_classifier(Arc::new(ensemble_for_many_fingers(0.2)));
    let detection = detector.detect(&scene.cluster()).unwrap();

    assert!(!detection.hand.is_hand());
    assert_eq!(detection.hand.num_fingers(), 5);
    assert!(matches!(
        detection.diagnostics.rejection,
        Some(Rejection::LowConfidence(c)) if (c - 0.2).abs() < 1e-9
    ));
}

#[test]
fn test_classifier_ignored_when_disabled() {
    let scene = five_finger_star();
    let params = HandParams {
        hand_use_svm: false,
        ..HandParams::default()
    };
    let detector = HandDetector::new(params).with_classifier(Arc::new(ensemble_for_many_fingers(0.0)));
    let detection = detector.detect(&scene.cluster()).unwrap();
    assert!(detection.hand.is_hand());
    assert_eq!(detection.hand.confidence(), None);
}

#[test]
fn test_secondary_hands_need_high_confidence() {
    let scene = five_finger_star();
    let clusters = [scene.cluster(), scene.cluster()];

    // between the two thresholds: only one hand survives
    let detector = HandDetector::default().with_classifier(Arc::new(ensemble_for_many_fingers(0.5)));
    let detections = detector.detect_all(&clusters).unwrap();
    assert_eq!(detections.iter().filter(|d| d.hand.is_hand()).count(), 1);

    let detector = HandDetector::default().with_classifier(Arc::new(ensemble_for_many_fingers(0.8)));
    let detections = detector.detect_all(&clusters).unwrap();
    assert_eq!(detections.iter().filter(|d| d.hand.is_hand()).count(), 2);
}

#[test]
fn test_partial_model_dir_is_untrained() {
    let dir = temp_dir("partial");
    let ensemble = ensemble_for_many_fingers(0.9);
    ensemble.export(&dir).unwrap();
    for index in 0..NUM_SVMS {
        assert!(model_path(&dir, index).exists());
    }
    assert!(SvmEnsemble::load(&dir).is_trained());

    fs::remove_file(model_path(&dir, 2)).unwrap();
    assert!(!SvmEnsemble::load(&dir).is_trained());

    // geometry-only verdict with an untrained classifier attached
    let scene = five_finger_star();
    let detector = HandDetector::default().with_classifier(Arc::new(LazyEnsemble::new(&dir)));
    let detection = detector.detect(&scene.cluster()).unwrap();
    assert!(detection.hand.is_hand());
    assert_eq!(detection.hand.confidence(), None);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_invalid_model_file_is_untrained() {
    let dir = temp_dir("invalid");
    ensemble_for_many_fingers(0.9).export(&dir).unwrap();
    fs::write(model_path(&dir, 0), "{\"gamma\": 1.0}").unwrap();
    assert!(SvmEnsemble::try_load(&dir).is_err());
    assert!(!SvmEnsemble::load(&dir).is_trained());

    let mut bad = constant_model(3, 0.5);
    bad.support_vectors[0].pop();
    fs::write(model_path(&dir, 0), serde_json::to_string(&bad).unwrap()).unwrap();
    assert!(!SvmEnsemble::load(&dir).is_trained());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_exported_models_round_trip() {
    let dir = temp_dir("export");
    let ensemble = ensemble_for_many_fingers(0.7);
    ensemble.export(&dir).unwrap();
    let loaded = SvmEnsemble::try_load(&dir).unwrap();
    assert_eq!(loaded.models(), ensemble.models());
    fs::remove_dir_all(&dir).unwrap();
}

fn write_training_data(dir: &Path) {
    let mut labels = String::from("16\n");
    let mut features = String::from("name featureCount fingerCount values\n");
    for fingers in [1, 2, 3, 5] {
        let rows = [
            ("open", 0.0, 0.0, 0),
            ("open2", 0.1, 0.0, 0),
            ("fist", 3.0, 3.0, 1),
            ("fist2", 3.1, 3.0, 1),
        ];
        for (name, a, b, label) in rows {
            let name = format!("{name}_{fingers}");
            labels.push_str(&format!("{name} {label}\n"));
            features.push_str(&format!("{name} 3 {fingers} {a}, {b}\n"));
        }
    }
    fs::write(dir.join("labels.txt"), labels).unwrap();
    fs::write(dir.join("features.txt"), features).unwrap();
}

#[test]
fn test_train_and_export() {
    let data = temp_dir("train-data");
    let out = temp_dir("train-out");
    write_training_data(&data);

    let mut events = Vec::new();
    let (ensemble, report) =
        SvmEnsemble::train(&data, &DEFAULT_HYPER_PARAMS, |event| events.push(event)).unwrap();

    assert!(ensemble.is_trained());
    assert_eq!(events.len(), 2 * NUM_SVMS);
    assert!(matches!(events[0], TrainingEvent::Started { index: 0, samples: 4 }));
    for bucket in &report.buckets {
        assert_eq!(bucket.samples, 4);
        assert_eq!(bucket.correct, 4);
    }
    assert_eq!(report.overall().samples, 16);

    assert!(ensemble.classify(&[2.0, 0.05, 0.0]).unwrap() < 0.5);
    assert!(ensemble.classify(&[4.0, 3.05, 3.0]).unwrap() > 0.5);

    ensemble.export(&out).unwrap();
    let reloaded = SvmEnsemble::load(&out);
    assert!(reloaded.is_trained());
    let again = reloaded.classify(&[1.0, 3.0, 3.0]).unwrap();
    assert!((again - ensemble.classify(&[1.0, 3.0, 3.0]).unwrap()).abs() < 1e-12);

    fs::remove_dir_all(&data).unwrap();
    fs::remove_dir_all(&out).unwrap();
}

#[test]
fn test_training_needs_every_bucket() {
    let data = temp_dir("train-missing");
    fs::write(data.join("labels.txt"), "2\na 0\nb 1\n").unwrap();
    fs::write(data.join("features.txt"), "header\na 3 1 0.0 0.0\nb 3 1 1.0 1.0\n").unwrap();
    let result = SvmEnsemble::train(&data, &DEFAULT_HYPER_PARAMS, |_| {});
    assert!(matches!(
        result,
        Err(depth_hand::HandError::EmptyTrainingBucket(1))
    ));
    fs::remove_dir_all(&data).unwrap();
}
