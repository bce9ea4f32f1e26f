//! HTTP API handlers

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::protocol::{
    serialize_settings, CalibrationStarted, ErrorResponse, GazeSample, Settings, SettingsBody,
    SettingsResponse, StatusResponse, TrackingStatus,
};
use crate::tracking::{CalibrationState, TrackingController, TrackingSnapshot};
use crate::ui::server::AppState;

/// Run a blocking controller call off the async workers
async fn with_controller<F>(state: &AppState, op: F) -> (StatusCode, Response)
where
    F: FnOnce(&TrackingController) -> crate::Result<TrackingStatus> + Send + 'static,
{
    let controller = state.controller.clone();
    let result = tokio::task::spawn_blocking(move || op(controller.as_ref())).await;

    match result {
        Ok(Ok(status)) => (
            StatusCode::OK,
            Json(StatusResponse::from(status)).into_response(),
        ),
        Ok(Err(e)) => {
            tracing::error!("Tracking request failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())).into_response(),
            )
        }
        Err(e) => {
            tracing::error!("Tracking task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("tracking task failed")).into_response(),
            )
        }
    }
}

/// Start tracking
pub async fn start_tracking(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    with_controller(&state, |controller| controller.start()).await
}

/// Stop tracking
pub async fn stop_tracking(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    with_controller(&state, |controller| controller.stop()).await
}

/// Snapshot of the recorded session
pub async fn get_gaze_data(State(state): State<Arc<AppState>>) -> Json<Vec<GazeSample>> {
    Json(state.controller.snapshot())
}

/// Drop the recorded session
pub async fn clear_data(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    state.controller.buffer().clear();
    tracing::info!("Session data cleared");
    Json(StatusResponse::new("Data cleared"))
}

/// Current settings
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsBody> {
    Json(SettingsBody(state.settings.get()))
}

/// Merge a settings payload
///
/// The raw body is parsed here so that malformed JSON gets the same
/// `{"status": "Error"}` reply as a well-formed but invalid payload.
pub async fn update_settings(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match state.settings.update_json(&body) {
        Ok(settings) => {
            // The source lock is held by the sampler while it polls
            let controller = state.controller.clone();
            let forwarded = settings.clone();
            if let Err(e) =
                tokio::task::spawn_blocking(move || controller.apply_settings(&forwarded)).await
            {
                tracing::error!("Settings task failed: {}", e);
            }
            tracing::info!("Updated settings: {:?}", settings);
            (
                StatusCode::OK,
                Json(SettingsResponse {
                    status: "Settings updated".to_string(),
                    settings,
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!("Error updating settings: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

/// Export the session and return it as a file attachment
///
/// With `clear_after_download` only the exported samples are dropped;
/// anything recorded after the snapshot stays buffered.
pub async fn download_data(State(state): State<Arc<AppState>>) -> Response {
    let (samples, mark) = state.controller.buffer().snapshot_marked();
    let exporter = state.exporter.clone();

    let exported = match tokio::task::spawn_blocking(move || exporter.export(&samples)).await {
        Ok(Ok(exported)) => exported,
        Ok(Err(e)) => {
            tracing::error!("Export failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Export task failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("export task failed")),
            )
                .into_response();
        }
    };

    if state.clear_after_download {
        let discarded = state.controller.buffer().discard_through(mark);
        tracing::debug!("Discarded {} exported samples", discarded);
    }

    let disposition = format!("attachment; filename=\"{}\"", exported.file_name);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.bytes,
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct CalibrationQuery {
    /// Return a handle instead of waiting for completion
    #[serde(default, rename = "async")]
    pub background: bool,
}

/// Run a calibration
///
/// Waits for completion unless `?async=true` is given. Waiting suspends the
/// request task only; no worker thread is held.
pub async fn start_calibration(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CalibrationQuery>,
) -> Response {
    let handle = state.calibrator.begin();

    if query.background {
        return (
            StatusCode::ACCEPTED,
            Json(CalibrationStarted {
                status: "Calibration started".to_string(),
                calibration_id: handle.id(),
            }),
        )
            .into_response();
    }

    handle.wait().await;
    (
        StatusCode::OK,
        Json(StatusResponse::new("Calibration completed")),
    )
        .into_response()
}

/// Current calibration state
pub async fn calibration_status(State(state): State<Arc<AppState>>) -> Json<CalibrationState> {
    Json(state.calibrator.state())
}

/// System status
#[derive(Serialize)]
pub struct SystemStatus {
    pub tracking: TrackingSnapshot,
    pub calibration: CalibrationState,
    #[serde(serialize_with = "serialize_settings")]
    pub settings: Settings,
    pub uptime_seconds: i64,
}

/// Get system status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    Json(SystemStatus {
        tracking: state.controller.status(),
        calibration: state.calibrator.state(),
        settings: state.settings.get(),
        uptime_seconds: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}
