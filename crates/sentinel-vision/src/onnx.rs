//! ONNX Runtime detector backend (YOLOv8/v11-style single-output models).

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tracing::info;

use sentinel_models::iou_xyxy;

use crate::detector::{ObjectDetector, RawDetection};
use crate::error::{VisionError, VisionResult};

/// Grey letterbox padding value, the YOLO training-time standard.
const PAD_VALUE: f32 = 114.0 / 255.0;

pub struct OnnxDetector {
    session: Session,
    input_size: u32,
    labels: Vec<String>,
}

impl OnnxDetector {
    /// Load a model and warm nothing: sessions are ready after commit.
    pub fn load(model_path: &Path, input_size: u32, labels: Vec<String>) -> VisionResult<Self> {
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(2))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| VisionError::ModelLoad(format!("{}: {e}", model_path.display())))?;
        info!(model = %model_path.display(), input_size, "loaded ONNX model");
        Ok(Self {
            session,
            input_size,
            labels,
        })
    }

    fn label_for(&self, class_id: usize) -> String {
        self.labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("cls_{class_id}"))
    }
}

impl ObjectDetector for OnnxDetector {
    fn detect(&self, frame: &DynamicImage, conf: f32, iou: f32) -> VisionResult<Vec<RawDetection>> {
        let (orig_w, orig_h) = frame.dimensions();
        let size = self.input_size;

        // Letterbox: scale to fit, pad to square with grey.
        let scale = (size as f32 / orig_w.max(orig_h) as f32).min(1.0);
        let new_w = ((orig_w as f32 * scale) as u32).max(1);
        let new_h = ((orig_h as f32 * scale) as u32).max(1);
        let resized = frame
            .resize_exact(new_w, new_h, FilterType::Triangle)
            .to_rgb8();
        let pad_x = (size - new_w) / 2;
        let pad_y = (size - new_h) / 2;

        let mut input = Array4::<f32>::from_elem((1, 3, size as usize, size as usize), PAD_VALUE);
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, (y + pad_y) as usize, (x + pad_x) as usize]] =
                    pixel[c] as f32 / 255.0;
            }
        }

        let inputs = ort::inputs!["images" => input.view()]
            .map_err(|e| VisionError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| VisionError::Inference(e.to_string()))?;
        // Output layout: [1, 4 + num_classes, num_boxes].
        let tensor = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Inference(e.to_string()))?;
        let shape = tensor.shape();
        if shape.len() != 3 || shape[1] < 5 {
            return Err(VisionError::Inference(format!(
                "unexpected output shape {shape:?}"
            )));
        }
        let num_classes = shape[1] - 4;
        let num_boxes = shape[2];

        let mut detections = Vec::new();
        for i in 0..num_boxes {
            let cx = tensor[[0, 0, i]];
            let cy = tensor[[0, 1, i]];
            let bw = tensor[[0, 2, i]];
            let bh = tensor[[0, 3, i]];

            let mut best_score = 0.0_f32;
            let mut best_class = 0usize;
            for c in 0..num_classes {
                let score = tensor[[0, 4 + c, i]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }
            if best_score < conf {
                continue;
            }

            // Undo the letterbox back into source pixel coordinates.
            let x1 = ((cx - bw / 2.0 - pad_x as f32) / scale).clamp(0.0, orig_w as f32 - 1.0);
            let y1 = ((cy - bh / 2.0 - pad_y as f32) / scale).clamp(0.0, orig_h as f32 - 1.0);
            let x2 = ((cx + bw / 2.0 - pad_x as f32) / scale).clamp(0.0, orig_w as f32 - 1.0);
            let y2 = ((cy + bh / 2.0 - pad_y as f32) / scale).clamp(0.0, orig_h as f32 - 1.0);

            detections.push(RawDetection {
                x1,
                y1,
                x2,
                y2,
                confidence: best_score,
                class_id: best_class as u32,
                label: self.label_for(best_class),
            });
        }

        Ok(non_max_suppression(detections, iou))
    }
}

/// Greedy per-class NMS on confidence-sorted boxes.
fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<RawDetection> = Vec::new();
    'candidates: for det in detections {
        for existing in &kept {
            if existing.class_id == det.class_id
                && iou_xyxy(
                    existing.x1,
                    existing.y1,
                    existing.x2,
                    existing.y2,
                    det.x1,
                    det.y1,
                    det.x2,
                    det.y2,
                ) > iou_threshold
            {
                continue 'candidates;
            }
        }
        kept.push(det);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, conf: f32, class_id: u32) -> RawDetection {
        RawDetection {
            x1,
            y1: 0.0,
            x2: x1 + 100.0,
            y2: 100.0,
            confidence: conf,
            class_id,
            label: "person".to_string(),
        }
    }

    #[test]
    fn test_nms_keeps_highest_confidence() {
        let kept = non_max_suppression(vec![det(0.0, 0.7, 0), det(5.0, 0.9, 0)], 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_ignores_other_classes() {
        let kept = non_max_suppression(vec![det(0.0, 0.7, 0), det(5.0, 0.9, 1)], 0.5);
        assert_eq!(kept.len(), 2);
    }
}
