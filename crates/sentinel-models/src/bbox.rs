//! Detection bounding boxes and threat categories.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Classification family assigned to secondary-model detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Label matched the configured threat set (weapon, gun, knife, firearm).
    Threat,
    /// Anything else the secondary model flagged.
    Suspicious,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Threat => "threat",
            Category::Suspicious => "suspicious",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "threat" => Ok(Category::Threat),
            "suspicious" => Ok(Category::Suspicious),
            _ => Err(CategoryParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown category: {0}")]
pub struct CategoryParseError(String);

/// One detection box in pixel coordinates relative to the processed frame.
///
/// `track_id` is present when the tracker has an identity for this box.
/// `llm_false_positive` is tri-state on the wire: absent until an
/// adjudication verdict exists for the frame.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_false_positive: Option<bool>,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, label: impl Into<String>) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            label: label.into(),
            track_id: None,
            category: None,
            llm_false_positive: None,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        iou_xyxy(
            self.x1, self.y1, self.x2, self.y2, other.x1, other.y1, other.x2, other.y2,
        )
    }
}

/// IoU between two boxes in xyxy format.
pub fn iou_xyxy(
    ax1: f32,
    ay1: f32,
    ax2: f32,
    ay2: f32,
    bx1: f32,
    by1: f32,
    bx2: f32,
    by2: f32,
) -> f32 {
    let iw = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
    let ih = (ay2.min(by2) - ay1.max(by1)).max(0.0);
    let inter = iw * ih;
    if inter <= 0.0 {
        return 0.0;
    }
    let a_area = (ax2 - ax1).max(0.0) * (ay2 - ay1).max(0.0);
    let b_area = (bx2 - bx1).max(0.0) * (by2 - by1).max(0.0);
    let denom = a_area + b_area - inter;
    if denom > 0.0 {
        inter / denom
    } else {
        0.0
    }
}
