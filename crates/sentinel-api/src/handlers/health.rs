//! Health check handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub active_streams: usize,
    pub suspicious_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_model_path: Option<String>,
}

/// Health check endpoint. The detector is loaded before the server binds,
/// so a responding service always has its primary model.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: true,
        active_streams: state.streams.len(),
        suspicious_loaded: state.detector.suspicious_loaded(),
        threat_model_path: state.detector.suspicious_model_path().map(str::to_string),
    })
}
