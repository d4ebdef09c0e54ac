//! Health check handler

use axum::{Json, extract::State};
use serde::Serialize;

use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub country: i32,
    pub retained_spots: usize,
    pub live_subscribers: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        country: state.config.country,
        retained_spots: state.store.len(),
        live_subscribers: state.broadcaster.subscriber_count(),
    })
}
