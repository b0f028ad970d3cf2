//! Detection adapters for the Sentinel backend.
//!
//! This crate provides:
//! - The [`ObjectDetector`] seam behind which inference runtimes stay opaque
//! - Image payload decoding and JPEG helpers
//! - A persistent greedy-IoU multi-object tracker (byte-track family)
//! - The [`DetectorAdapter`] combining the person model, tracker and the
//!   optional suspicious-object model
//! - The suspicious pipeline: category tagging, UI thresholding and
//!   association of suspicious boxes back to person tracks
//! - An ONNX Runtime detector backend (cargo feature `onnx`)

pub mod adapter;
pub mod decode;
pub mod detector;
pub mod error;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod suspicious;
pub mod tracker;

pub use adapter::DetectorAdapter;
pub use decode::{crop_box, decode_base64_image, encode_jpeg};
pub use detector::{ObjectDetector, RawDetection, COCO_LABELS, PERSON_CLASS_ID};
pub use error::{VisionError, VisionResult};
#[cfg(feature = "onnx")]
pub use onnx::OnnxDetector;
pub use suspicious::{
    associate_tracks, categorize, SuspiciousConfig, SuspiciousFrame, DEFAULT_ASSOC_IOU_MIN,
    DEFAULT_ASSOC_MAX_DIST_FRAC, DEFAULT_SUSPICIOUS_CONF, DEFAULT_THREAT_CONF,
    SUSPICIOUS_RUN_CONF,
};
pub use tracker::IouTracker;

// Re-exported so downstream crates use one `image` version.
pub use image;
