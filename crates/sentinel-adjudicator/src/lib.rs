//! LLM adjudication of flagged detections.
//!
//! This crate provides:
//! - The chat-completions client (20 s hard timeout, strict-JSON verdict)
//! - The two-level cooldown ledger (per stream, per stream+track)
//! - Candidate selection and the trigger/gate logic
//! - The disk snapshotter for full frames and crops

pub mod client;
pub mod cooldown;
pub mod error;
pub mod snapshot;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use sentinel_models::BoundingBox;

pub use client::{LlmClient, LlmConfig, Verdict, DEFAULT_LLM_MODEL, LLM_TIMEOUT};
pub use cooldown::{CooldownLedger, DEFAULT_COOLDOWN};
pub use error::{AdjudicatorError, AdjudicatorResult};
pub use snapshot::Snapshotter;

/// Which cooldown gate blocked an adjudication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownBlock {
    Stream(Duration),
    Track(Duration),
}

impl CooldownBlock {
    /// Operator-facing `llm_error` string.
    pub fn error_message(&self) -> String {
        match self {
            CooldownBlock::Stream(remaining) => {
                format!("cooldown active: {}s remaining", remaining.as_secs())
            }
            CooldownBlock::Track(remaining) => {
                format!("per-track cooldown active: {}s remaining", remaining.as_secs())
            }
        }
    }

    /// Prefix for the `llm_reason` detection summary.
    pub fn reason_prefix(&self) -> &'static str {
        match self {
            CooldownBlock::Stream(_) => "Cooldown: detected ",
            CooldownBlock::Track(_) => "Cooldown (track): detected ",
        }
    }
}

/// Adjudication metadata attached to a detection response.
#[derive(Debug, Clone, Default)]
pub struct AdjudicationOutcome {
    pub triggered: Option<bool>,
    pub is_false_positive: Option<bool>,
    pub confidence: Option<f64>,
    pub reason: Option<String>,
    pub model: Option<String>,
    pub error: Option<String>,
}

/// Orchestrates gating and the LLM call. The ledger lock is never held
/// across the outbound request.
pub struct Adjudicator {
    client: LlmClient,
    ledger: Mutex<CooldownLedger>,
    auto_on_threat: bool,
}

impl Adjudicator {
    pub fn new(
        client: LlmClient,
        stream_cooldown: Duration,
        track_cooldown: Duration,
        auto_on_threat: bool,
    ) -> Self {
        Self {
            client,
            ledger: Mutex::new(CooldownLedger::new(stream_cooldown, track_cooldown)),
            auto_on_threat,
        }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Trigger condition: displayed boxes exist, a key is configured, and
    /// either auto mode is on or the request opted in.
    pub fn should_run(&self, has_ui_boxes: bool, request_opt_in: Option<bool>) -> bool {
        has_ui_boxes
            && self.client.has_api_key()
            && (self.auto_on_threat || request_opt_in == Some(true))
    }

    /// Pick the box to send: prefer boxes with a track id, then the largest
    /// area.
    pub fn select_candidate(boxes: &[BoundingBox]) -> Option<&BoundingBox> {
        let tracked: Vec<&BoundingBox> = boxes.iter().filter(|b| b.track_id.is_some()).collect();
        let pool: Vec<&BoundingBox> = if tracked.is_empty() {
            boxes.iter().collect()
        } else {
            tracked
        };
        pool.into_iter().max_by(|a, b| {
            a.area()
                .partial_cmp(&b.area())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Check both gates at `now`. On pass, both timestamps are set
    /// immediately (call-time, not success) and `Ok` is returned.
    ///
    /// The per-track gate is evaluated first; a per-stream block takes
    /// precedence in the reported message.
    pub fn try_acquire(
        &self,
        stream: &str,
        track_id: Option<i64>,
        now: Instant,
    ) -> Result<(), CooldownBlock> {
        let mut ledger = self.ledger.lock().unwrap();
        let mut block = track_id
            .and_then(|t| ledger.track_remaining(stream, t, now))
            .map(CooldownBlock::Track);
        if let Some(remaining) = ledger.stream_remaining(stream, now) {
            block = Some(CooldownBlock::Stream(remaining));
        }
        match block {
            Some(block) => Err(block),
            None => {
                ledger.mark(stream, track_id, now);
                Ok(())
            }
        }
    }

    pub async fn adjudicate(
        &self,
        label: &str,
        full_jpeg: &[u8],
        crop_jpeg: &[u8],
    ) -> AdjudicatorResult<Verdict> {
        self.client.adjudicate(label, full_jpeg, crop_jpeg).await
    }
}

/// Human summary of the top detections (up to three, confidence-sorted) for
/// cooldown responses.
pub fn detection_summary(boxes: &[BoundingBox]) -> Option<String> {
    let mut sorted: Vec<&BoundingBox> = boxes.iter().collect();
    sorted.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let parts: Vec<String> = sorted
        .iter()
        .take(3)
        .map(|b| format!("{} ({:.2})", b.label, b.confidence))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
