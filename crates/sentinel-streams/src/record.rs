//! Per-stream state records and their wire snapshots.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use sentinel_models::BoundingBox;

/// Mutable state for one running stream. Owned by the manager; the worker is
/// the only writer of detection fields.
#[derive(Debug)]
pub struct StreamRecord {
    pub stream_id: String,
    pub source: String,
    pub confidence: f32,
    pub is_active: bool,
    pub last_heartbeat: Instant,
    pub last_detection_time: Option<DateTime<Utc>>,
    pub people_count: usize,
    pub detections: Vec<BoundingBox>,
    pub processing_time_ms: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub error: Option<String>,
}

impl StreamRecord {
    pub fn new(stream_id: impl Into<String>, source: impl Into<String>, confidence: f32) -> Self {
        Self {
            stream_id: stream_id.into(),
            source: source.into(),
            confidence,
            is_active: true,
            last_heartbeat: Instant::now(),
            last_detection_time: None,
            people_count: 0,
            detections: Vec::new(),
            processing_time_ms: 0.0,
            frame_width: 0,
            frame_height: 0,
            error: None,
        }
    }

    pub fn status(&self) -> StreamStatus {
        StreamStatus {
            stream_id: self.stream_id.clone(),
            source: self.source.clone(),
            confidence: self.confidence,
            is_active: self.is_active,
            heartbeat_age_seconds: self.last_heartbeat.elapsed().as_secs_f64(),
            last_detection_time: self.last_detection_time,
            people_count: self.people_count,
            detections: self.detections.clone(),
            processing_time: self.processing_time_ms,
            frame_width: self.frame_width,
            frame_height: self.frame_height,
            error: self.error.clone(),
        }
    }
}

/// Wire snapshot of a stream record.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    pub stream_id: String,
    pub source: String,
    pub confidence: f32,
    pub is_active: bool,
    pub heartbeat_age_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_detection_time: Option<DateTime<Utc>>,
    pub people_count: usize,
    pub detections: Vec<BoundingBox>,
    /// Milliseconds spent on the last processed frame.
    pub processing_time: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
