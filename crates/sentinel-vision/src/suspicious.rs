//! Suspicious-object pipeline: category tagging, UI thresholding, and
//! association of suspicious boxes back to person tracks.

use sentinel_models::{iou_xyxy, BoundingBox, Category, TrackedBox};

/// Internal confidence floor for the secondary model run. Deliberately
/// permissive: adjudication decides, not confidence.
pub const SUSPICIOUS_RUN_CONF: f32 = 0.01;
/// Default UI threshold for suspicious-category boxes.
pub const DEFAULT_SUSPICIOUS_CONF: f32 = 0.25;
/// Default UI threshold for threat-category boxes.
pub const DEFAULT_THREAT_CONF: f32 = 0.35;
/// Minimum IoU for associating a suspicious box with a person track.
pub const DEFAULT_ASSOC_IOU_MIN: f32 = 0.10;
/// Nearest-center fallback radius, as a fraction of the frame diagonal.
pub const DEFAULT_ASSOC_MAX_DIST_FRAC: f32 = 0.08;

/// Labels treated as threats (case-insensitive).
const THREAT_LABELS: [&str; 4] = ["weapon", "gun", "knife", "firearm"];

#[derive(Debug, Clone)]
pub struct SuspiciousConfig {
    /// Collapse every box to `suspicious`, muting threat styling.
    pub suspicious_only: bool,
    pub assoc_iou_min: f32,
    pub assoc_max_dist_frac: f32,
}

impl Default for SuspiciousConfig {
    fn default() -> Self {
        Self {
            suspicious_only: false,
            assoc_iou_min: DEFAULT_ASSOC_IOU_MIN,
            assoc_max_dist_frac: DEFAULT_ASSOC_MAX_DIST_FRAC,
        }
    }
}

/// One frame's worth of secondary-model output.
#[derive(Debug, Default)]
pub struct SuspiciousFrame {
    /// Every candidate box, no confidence gating; adjudication input.
    pub all_boxes: Vec<BoundingBox>,
    /// Per-category thresholded boxes for display.
    pub ui_boxes: Vec<BoundingBox>,
}

fn is_threat_label(label: &str, suspicious_only: bool) -> bool {
    !suspicious_only && THREAT_LABELS.contains(&label.to_lowercase().as_str())
}

/// Tag each box with its category and split into the unfiltered list and the
/// UI list gated by the per-category thresholds.
pub fn categorize(
    boxes: Vec<BoundingBox>,
    suspicious_conf: f32,
    threat_conf: f32,
    config: &SuspiciousConfig,
) -> SuspiciousFrame {
    let mut frame = SuspiciousFrame::default();
    for mut bbox in boxes {
        let threat = is_threat_label(&bbox.label, config.suspicious_only);
        bbox.category = Some(if threat {
            Category::Threat
        } else {
            Category::Suspicious
        });
        let gate = if threat { threat_conf } else { suspicious_conf };
        if bbox.confidence >= gate {
            frame.ui_boxes.push(bbox.clone());
        }
        frame.all_boxes.push(bbox);
    }
    frame
}

/// Stamp each suspicious box with the best-matching person track id.
///
/// Highest IoU wins when it clears `assoc_iou_min`; otherwise the nearest
/// person center within `assoc_max_dist_frac` of the frame diagonal.
/// Unmatched boxes keep `track_id = None`.
pub fn associate_tracks(
    boxes: &mut [BoundingBox],
    persons: &[TrackedBox],
    frame_width: u32,
    frame_height: u32,
    config: &SuspiciousConfig,
) {
    if persons.is_empty() {
        return;
    }
    let diagonal = ((frame_width as f32).powi(2) + (frame_height as f32).powi(2)).sqrt();

    for bbox in boxes.iter_mut() {
        let (bx, by) = bbox.center();
        let mut best_iou = 0.0_f32;
        let mut best_id = None;
        let mut min_dist = f32::INFINITY;
        let mut nearest_id = None;

        for person in persons {
            let iou = iou_xyxy(
                bbox.x1, bbox.y1, bbox.x2, bbox.y2, person.x1, person.y1, person.x2, person.y2,
            );
            if iou > best_iou {
                best_iou = iou;
                best_id = Some(person.track_id);
            }
            let (px, py) = person.center();
            let dist = (bx - px).hypot(by - py);
            if dist < min_dist {
                min_dist = dist;
                nearest_id = Some(person.track_id);
            }
        }

        if best_id.is_some() && best_iou >= config.assoc_iou_min {
            bbox.track_id = best_id;
        } else if nearest_id.is_some() && min_dist <= config.assoc_max_dist_frac * diagonal {
            bbox.track_id = nearest_id;
        }
    }
}
