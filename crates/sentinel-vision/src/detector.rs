//! The detector seam: inference runtimes stay opaque behind a trait.

use image::DynamicImage;

use crate::error::VisionResult;

/// COCO class id for `person`.
pub const PERSON_CLASS_ID: u32 = 0;

/// The 80 COCO class labels, indexed by class id.
pub const COCO_LABELS: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// A raw box straight out of an inference runtime, in pixel coordinates of
/// the input frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
    pub label: String,
}

impl RawDetection {
    pub fn coords(&self) -> (f32, f32, f32, f32) {
        (self.x1, self.y1, self.x2, self.y2)
    }
}

/// An opaque detection model.
///
/// Implementations wrap whatever runtime executes the network; callers only
/// see boxes, classes and confidences. `conf` is the minimum confidence to
/// report and `iou` the non-max-suppression threshold; runtimes without
/// native support for either may ignore them.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, frame: &DynamicImage, conf: f32, iou: f32) -> VisionResult<Vec<RawDetection>>;
}
