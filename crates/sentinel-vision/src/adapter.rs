//! Detector adapter: primary person model with persistent tracking, plus an
//! optional secondary suspicious-object model.

use std::sync::Mutex;

use image::DynamicImage;
use tracing::debug;

use sentinel_models::{BoundingBox, TrackedBox};

use crate::detector::{ObjectDetector, PERSON_CLASS_ID};
use crate::error::VisionResult;
use crate::tracker::IouTracker;

/// NMS threshold used for the primary model.
const PERSON_NMS_IOU: f32 = 0.5;

pub struct DetectorAdapter {
    person: Box<dyn ObjectDetector>,
    tracker: Mutex<IouTracker>,
    suspicious: Option<Box<dyn ObjectDetector>>,
    suspicious_model_path: Option<String>,
}

impl DetectorAdapter {
    pub fn new(person: Box<dyn ObjectDetector>) -> Self {
        Self {
            person,
            tracker: Mutex::new(IouTracker::default()),
            suspicious: None,
            suspicious_model_path: None,
        }
    }

    /// Attach the secondary suspicious-object model.
    pub fn with_suspicious(mut self, model: Box<dyn ObjectDetector>, path: impl Into<String>) -> Self {
        self.suspicious = Some(model);
        self.suspicious_model_path = Some(path.into());
        self
    }

    pub fn suspicious_loaded(&self) -> bool {
        self.suspicious.is_some()
    }

    pub fn suspicious_model_path(&self) -> Option<&str> {
        self.suspicious_model_path.as_deref()
    }

    /// Run the primary model, keep person boxes at or above `conf`, and
    /// assign persistent track ids. Identities survive across calls; the
    /// tracker is the only stateful piece.
    pub fn detect_and_track(
        &self,
        frame: &DynamicImage,
        conf: f32,
    ) -> VisionResult<(Vec<BoundingBox>, Vec<TrackedBox>)> {
        let raw = self.person.detect(frame, conf, PERSON_NMS_IOU)?;
        let persons: Vec<_> = raw
            .into_iter()
            .filter(|d| d.class_id == PERSON_CLASS_ID && d.confidence >= conf)
            .collect();

        let ids = self.tracker.lock().unwrap().update(&persons);
        debug!(
            people = persons.len(),
            "primary detection pass complete"
        );

        let mut detections = Vec::with_capacity(persons.len());
        let mut tracked = Vec::with_capacity(persons.len());
        for (det, id) in persons.iter().zip(ids) {
            let mut bbox = BoundingBox::new(
                det.x1,
                det.y1,
                det.x2,
                det.y2,
                det.confidence,
                format!("Person ({:.2})", det.confidence),
            );
            bbox.track_id = Some(id);
            detections.push(bbox);
            tracked.push(TrackedBox::new(id, det.x1, det.y1, det.x2, det.y2, det.confidence));
        }

        Ok((detections, tracked))
    }

    /// Run the secondary model. Callers pass a permissive confidence floor:
    /// the adjudicator, not model confidence, is the real gate.
    ///
    /// Returns an empty list when no secondary model is loaded.
    pub fn detect_suspicious(
        &self,
        frame: &DynamicImage,
        conf: f32,
        iou: f32,
    ) -> VisionResult<Vec<BoundingBox>> {
        let Some(model) = &self.suspicious else {
            return Ok(Vec::new());
        };
        let raw = model.detect(frame, conf, iou)?;
        Ok(raw
            .into_iter()
            .map(|d| BoundingBox::new(d.x1, d.y1, d.x2, d.y2, d.confidence, d.label))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::RawDetection;
    use image::RgbImage;

    struct FixedDetector(Vec<RawDetection>);

    impl ObjectDetector for FixedDetector {
        fn detect(&self, _frame: &DynamicImage, _conf: f32, _iou: f32) -> VisionResult<Vec<RawDetection>> {
            Ok(self.0.clone())
        }
    }

    fn frame() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(640, 480))
    }

    fn raw(class_id: u32, label: &str, conf: f32) -> RawDetection {
        RawDetection {
            x1: 10.0,
            y1: 10.0,
            x2: 110.0,
            y2: 210.0,
            confidence: conf,
            class_id,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_non_person_classes_are_filtered() {
        let adapter = DetectorAdapter::new(Box::new(FixedDetector(vec![
            raw(0, "person", 0.9),
            raw(56, "chair", 0.9),
        ])));
        let (detections, tracked) = adapter.detect_and_track(&frame(), 0.25).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(tracked.len(), 1);
        assert_eq!(detections[0].label, "Person (0.90)");
    }

    #[test]
    fn test_confidence_floor_applies() {
        let adapter = DetectorAdapter::new(Box::new(FixedDetector(vec![raw(0, "person", 0.2)])));
        let (detections, _) = adapter.detect_and_track(&frame(), 0.25).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_track_ids_survive_across_calls() {
        let adapter = DetectorAdapter::new(Box::new(FixedDetector(vec![raw(0, "person", 0.9)])));
        let (_, first) = adapter.detect_and_track(&frame(), 0.25).unwrap();
        let (_, second) = adapter.detect_and_track(&frame(), 0.25).unwrap();
        assert_eq!(first[0].track_id, second[0].track_id);
    }

    #[test]
    fn test_detect_suspicious_without_model_is_empty() {
        let adapter = DetectorAdapter::new(Box::new(FixedDetector(vec![])));
        assert!(!adapter.suspicious_loaded());
        assert!(adapter.detect_suspicious(&frame(), 0.01, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_detect_suspicious_keeps_model_labels() {
        let adapter = DetectorAdapter::new(Box::new(FixedDetector(vec![])))
            .with_suspicious(Box::new(FixedDetector(vec![raw(1, "knife", 0.1)])), "models/threats.onnx");
        assert!(adapter.suspicious_loaded());
        assert_eq!(adapter.suspicious_model_path(), Some("models/threats.onnx"));
        let boxes = adapter.detect_suspicious(&frame(), 0.01, 0.5).unwrap();
        assert_eq!(boxes[0].label, "knife");
        assert!(boxes[0].track_id.is_none());
    }
}
