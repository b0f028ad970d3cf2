//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::detect::detect;
use crate::handlers::health::health;
use crate::handlers::occupancy::{get_occupancy, reset_occupancy, set_occupancy_mode};
use crate::handlers::streams::{
    list_streams, start_stream, stop_stream, stream_heartbeat, stream_status,
};
use crate::handlers::zones::{get_camera_zones, get_zones, update_zones};
use crate::middleware::{cors_layer, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/detect", post(detect))
        .route("/zones/update", post(update_zones))
        .route("/zones", get(get_zones))
        .route("/zones/:camera_id", get(get_camera_zones))
        .route("/occupancy", get(get_occupancy))
        .route("/occupancy/reset", post(reset_occupancy))
        .route("/occupancy/mode", post(set_occupancy_mode))
        .route("/stream/start", post(start_stream))
        .route("/stream/status/:stream_id", get(stream_status))
        .route("/stream/stop/:stream_id", post(stop_stream))
        .route("/stream/heartbeat", post(stream_heartbeat))
        .route("/streams", get(list_streams))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer())
        .with_state(state)
}
