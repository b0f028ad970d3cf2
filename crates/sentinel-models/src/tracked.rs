//! Tracked person boxes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A person box that carries a tracker identity. Only these drive counting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackedBox {
    pub track_id: i64,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl TrackedBox {
    pub fn new(track_id: i64, x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            track_id,
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}
