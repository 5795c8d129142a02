pub mod detector;

pub use detector::{
    DepthFrame, FrameHands, SegmentationConfig, detect_frame, start_detector,
};
