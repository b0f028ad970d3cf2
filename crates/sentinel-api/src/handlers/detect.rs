//! Frame detection: decode, track, count, flag, adjudicate.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use validator::Validate;

use sentinel_adjudicator::{detection_summary, AdjudicationOutcome, Adjudicator};
use sentinel_models::{BoundingBox, Category, TrackedBox};
use sentinel_vision::image::{DynamicImage, GenericImageView};
use sentinel_vision::{
    associate_tracks, categorize, crop_box, decode_base64_image, encode_jpeg,
    DEFAULT_SUSPICIOUS_CONF, DEFAULT_THREAT_CONF, SUSPICIOUS_RUN_CONF,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn default_confidence() -> f32 {
    0.25
}

#[derive(Debug, Deserialize, Validate)]
pub struct DetectRequest {
    /// Base64-encoded image, bare or as a data URL.
    pub image_data: String,
    #[serde(default = "default_confidence")]
    #[validate(range(min = 0.1, max = 1.0))]
    pub confidence: f32,
    // Optional thresholds for the suspicious/threat model.
    #[validate(range(min = 0.0, max = 1.0))]
    pub suspicious_conf: Option<f32>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub threat_conf: Option<f32>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub suspicious_iou: Option<f32>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub threat_iou: Option<f32>,
    /// Client override of LLM usage (e.g. disabled for continuous polling).
    pub llm_enabled: Option<bool>,
    /// Stream identifier scoping the LLM cooldowns.
    pub stream_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub people_count: usize,
    pub detections: Vec<BoundingBox>,
    /// Milliseconds spent on decode + primary inference + counting.
    pub processing_time: f64,
    pub image_width: u32,
    pub image_height: u32,
    pub entry_count: u64,
    pub exit_count: u64,
    pub current_occupancy: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threats: Option<Vec<BoundingBox>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_threat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_is_false_positive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_triggered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_error: Option<String>,
}

/// Detect people in one frame, with tracking and zone-based counting.
pub async fn detect(
    State(state): State<AppState>,
    Json(request): Json<DetectRequest>,
) -> ApiResult<Json<DetectResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let started = Instant::now();

    let image = Arc::new(
        decode_base64_image(&request.image_data)
            .map_err(|e| ApiError::detection_failed(e.to_string()))?,
    );
    let (width, height) = image.dimensions();

    // Primary inference and tracking, off the async threads.
    let detector = state.detector.clone();
    let frame = image.clone();
    let confidence = request.confidence;
    let (detections, tracked) =
        tokio::task::spawn_blocking(move || detector.detect_and_track(&frame, confidence))
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?
            .map_err(|e| ApiError::detection_failed(e.to_string()))?;
    debug!(
        people = detections.len(),
        tracked = tracked.len(),
        width,
        height,
        "frame analyzed"
    );

    // Counting happens under the engine lock with a zone snapshot; nothing
    // here awaits, so frames cannot interleave their updates.
    let zones = state.zones.read().unwrap().to_vec();
    let occupancy = {
        let mut engine = state.counting.lock().unwrap();
        engine.process_frame(&tracked, &zones);
        engine.occupancy()
    };

    let processing_time = started.elapsed().as_secs_f64() * 1000.0;

    let (threats, has_threat, llm) =
        run_suspicious_pipeline(&state, &request, image, &tracked, width, height).await;

    Ok(Json(DetectResponse {
        people_count: detections.len(),
        detections,
        processing_time,
        image_width: width,
        image_height: height,
        entry_count: occupancy.entry_count,
        exit_count: occupancy.exit_count,
        current_occupancy: occupancy.persistent_occupancy,
        threats,
        has_threat,
        llm_is_false_positive: llm.is_false_positive,
        llm_confidence: llm.confidence,
        llm_reason: llm.reason,
        llm_model: llm.model,
        llm_triggered: llm.triggered,
        llm_error: llm.error,
    }))
}

/// The IoU threshold for the secondary run: the stricter of the two client
/// values when both are present.
fn resolve_suspicious_iou(request: &DetectRequest) -> f32 {
    let iou = match (request.threat_iou, request.suspicious_iou) {
        (Some(threat), Some(suspicious)) => threat.min(suspicious),
        (Some(threat), None) => threat,
        (None, Some(suspicious)) => suspicious,
        (None, None) => 0.5,
    };
    iou.clamp(0.0, 1.0)
}

/// Run the secondary model, associate boxes to tracks, and adjudicate under
/// the cooldown gates. Never fails the detection response: all errors land
/// in the outcome metadata or the log.
async fn run_suspicious_pipeline(
    state: &AppState,
    request: &DetectRequest,
    image: Arc<DynamicImage>,
    tracked: &[TrackedBox],
    width: u32,
    height: u32,
) -> (Option<Vec<BoundingBox>>, Option<bool>, AdjudicationOutcome) {
    let mut outcome = AdjudicationOutcome::default();
    if !state.detector.suspicious_loaded() {
        return (None, None, outcome);
    }

    let run_iou = resolve_suspicious_iou(request);
    let detector = state.detector.clone();
    let frame = image.clone();
    let raw = match tokio::task::spawn_blocking(move || {
        detector.detect_suspicious(&frame, SUSPICIOUS_RUN_CONF, run_iou)
    })
    .await
    {
        Ok(Ok(boxes)) => boxes,
        Ok(Err(e)) => {
            warn!(error = %e, "suspicious detection failed");
            return (None, None, outcome);
        }
        Err(e) => {
            warn!(error = %e, "suspicious detection task panicked");
            return (None, None, outcome);
        }
    };

    let suspicious_conf = request.suspicious_conf.unwrap_or(DEFAULT_SUSPICIOUS_CONF);
    let threat_conf = request.threat_conf.unwrap_or(DEFAULT_THREAT_CONF);
    let mut frame_boxes = categorize(raw, suspicious_conf, threat_conf, &state.suspicious);
    associate_tracks(&mut frame_boxes.all_boxes, tracked, width, height, &state.suspicious);
    associate_tracks(&mut frame_boxes.ui_boxes, tracked, width, height, &state.suspicious);

    if frame_boxes.ui_boxes.is_empty() {
        return (None, None, outcome);
    }
    let mut has_threat = frame_boxes
        .ui_boxes
        .iter()
        .any(|b| b.category == Some(Category::Threat));
    let mut threats = frame_boxes.ui_boxes.clone();

    if state.adjudicator.should_run(true, request.llm_enabled) {
        let stream_key = request.stream_id.clone().unwrap_or_else(|| "default".to_string());
        if let Some(candidate) = Adjudicator::select_candidate(&frame_boxes.all_boxes).cloned() {
            match state
                .adjudicator
                .try_acquire(&stream_key, candidate.track_id, Instant::now())
            {
                Err(block) => {
                    outcome.error = Some(block.error_message());
                    if let Some(summary) = detection_summary(&frame_boxes.ui_boxes) {
                        outcome.reason = Some(format!("{}{}", block.reason_prefix(), summary));
                    }
                }
                Ok(()) => {
                    outcome.triggered = Some(true);
                    outcome.model = Some(state.adjudicator.model().to_string());
                    adjudicate_candidate(
                        state,
                        &stream_key,
                        &candidate,
                        &image,
                        &mut outcome,
                        &mut threats,
                        &mut has_threat,
                    )
                    .await;
                }
            }
        }
    }

    (Some(threats), Some(has_threat), outcome)
}

/// Snapshot the frame, call the LLM, and fold the verdict into the threat
/// boxes. Cooldown timestamps were already set at acquisition.
async fn adjudicate_candidate(
    state: &AppState,
    stream_key: &str,
    candidate: &BoundingBox,
    image: &DynamicImage,
    outcome: &mut AdjudicationOutcome,
    threats: &mut [BoundingBox],
    has_threat: &mut bool,
) {
    let crop = crop_box(image, candidate.x1, candidate.y1, candidate.x2, candidate.y2);
    let (full_jpeg, crop_jpeg) = match (encode_jpeg(image), encode_jpeg(&crop)) {
        (Ok(full), Ok(crop)) => (full, crop),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "failed to encode adjudication snapshots");
            outcome.error = Some(e.to_string());
            return;
        }
    };

    if let Err(e) = state
        .snapshots
        .save(stream_key, &candidate.label, &full_jpeg, &crop_jpeg)
        .await
    {
        warn!(error = %e, "snapshot write failed");
    }

    match state
        .adjudicator
        .adjudicate(&candidate.label, &full_jpeg, &crop_jpeg)
        .await
    {
        Ok(verdict) => {
            outcome.is_false_positive = Some(verdict.false_positive);
            outcome.confidence = verdict.confidence;
            outcome.reason = verdict.reason;
            for bbox in threats.iter_mut() {
                bbox.llm_false_positive = Some(verdict.false_positive);
            }
            if verdict.false_positive {
                *has_threat = false;
            }
        }
        Err(e) => {
            warn!(error = %e, "LLM adjudication failed");
            outcome.error = Some(e.to_string());
            if outcome.reason.is_none() {
                outcome.reason = Some(e.to_string());
            }
        }
    }
}
