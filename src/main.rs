use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use depth_hand::{
    CameraIntrinsics, HandDetector, HandParams, SvmEnsemble, XyzMap,
    classifier::{DEFAULT_HYPER_PARAMS, TrainingEvent, default_model_dir},
    pipeline::{SegmentationConfig, detect_frame},
};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser, Debug)]
#[command(author, version, about = "Geometric hand detection on depth frames", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect hands in 16-bit millimeter depth PNGs
    Detect {
        /// JSON file overriding detection parameters
        #[arg(long)]
        params: Option<PathBuf>,

        /// Directory holding svm_0.json .. svm_3.json
        #[arg(long)]
        models: Option<PathBuf>,

        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Train the classifier ensemble from labels.txt and features.txt
    Train { data_dir: PathBuf, out_dir: PathBuf },
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Detect {
            params,
            models,
            inputs,
        } => run_detect(params.as_deref(), models, &inputs),
        Command::Train { data_dir, out_dir } => run_train(&data_dir, &out_dir),
    }
}

fn run_detect(
    params_path: Option<&Path>,
    model_dir: Option<PathBuf>,
    inputs: &[PathBuf],
) -> Result<()> {
    let params = match params_path {
        Some(path) => HandParams::from_json_file(path)
            .with_context(|| format!("failed to read parameters from {}", path.display()))?,
        None => HandParams::default(),
    };

    let mut detector = HandDetector::new(params);
    if detector.params().hand_use_svm {
        let dir = model_dir.unwrap_or_else(default_model_dir);
        detector = detector.with_classifier(Arc::new(SvmEnsemble::load(&dir)));
    }

    let camera = CameraIntrinsics::default();
    let segmentation = SegmentationConfig::default();
    for path in inputs {
        let xyz = load_depth(path, &camera)?;
        let started = Instant::now();
        let detections = detect_frame(&detector, &xyz, &segmentation)
            .with_context(|| format!("detection failed on {}", path.display()))?;

        println!(
            "{}: {} clusters in {:.1} ms",
            path.display(),
            detections.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        for (i, detection) in detections.iter().enumerate() {
            let hand = &detection.hand;
            let bbox = hand.bounding_box();
            if hand.is_hand() {
                let confidence = hand
                    .confidence()
                    .map(|c| format!(", confidence {c:.2}"))
                    .unwrap_or_default();
                println!(
                    "  #{i} hand at ({}, {}) {}x{}: {} fingers, palm {:?}{confidence}",
                    bbox.x,
                    bbox.y,
                    bbox.width,
                    bbox.height,
                    hand.num_fingers(),
                    hand.palm_center_ij(),
                );
            } else {
                let reason = detection
                    .diagnostics
                    .rejection
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                println!(
                    "  #{i} not a hand at ({}, {}) {}x{}: {reason}",
                    bbox.x, bbox.y, bbox.width, bbox.height
                );
            }
        }
    }
    Ok(())
}

fn load_depth(path: &Path, camera: &CameraIntrinsics) -> Result<XyzMap> {
    let depth = image::open(path)
        .with_context(|| format!("failed to open depth image {}", path.display()))?
        .into_luma16();
    Ok(XyzMap::from_depth_mm(&depth, camera))
}

fn run_train(data_dir: &Path, out_dir: &Path) -> Result<()> {
    let mut progress: Option<ProgressBar> = None;
    let (ensemble, report) = SvmEnsemble::train(data_dir, &DEFAULT_HYPER_PARAMS, |event| {
        match event {
            TrainingEvent::Started { index, samples } => {
                progress = Some(create_spinner(format!(
                    "training classifier #{index} on {samples} samples"
                )));
            }
            TrainingEvent::Finished {
                index,
                support_vectors,
            } => {
                if let Some(pb) = progress.take() {
                    pb.finish_with_message(format!(
                        "classifier #{index} ready ({support_vectors} support vectors)"
                    ));
                }
            }
        }
    })
    .with_context(|| format!("failed to train from {}", data_dir.display()))?;

    for (index, bucket) in report.buckets.iter().enumerate() {
        println!(
            "classifier #{index}: {}/{} correct ({:.1}%)",
            bucket.correct,
            bucket.samples,
            bucket.accuracy() * 100.0
        );
    }
    let overall = report.overall();
    println!(
        "overall: {}/{} correct ({:.1}%)",
        overall.correct,
        overall.samples,
        overall.accuracy() * 100.0
    );

    ensemble
        .export(out_dir)
        .with_context(|| format!("failed to write models to {}", out_dir.display()))?;
    println!("models written to {}", out_dir.display());
    Ok(())
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_detect() {
        let cli = Cli::try_parse_from([
            "depth-hand", "detect", "--models", "m", "a.png", "b.png",
        ])
        .unwrap();
        match cli.command {
            Command::Detect {
                params,
                models,
                inputs,
            } => {
                assert_eq!(params, None);
                assert_eq!(models, Some(PathBuf::from("m")));
                assert_eq!(inputs, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(Cli::try_parse_from(["depth-hand", "detect"]).is_err());
        assert!(Cli::try_parse_from(["depth-hand", "train", "data"]).is_err());
        let help = Cli::try_parse_from(["depth-hand", "detect", "--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
