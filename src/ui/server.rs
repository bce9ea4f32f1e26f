//! Axum web server: control API, live stream and static files

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
};

use crate::config::{AppConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::session::SessionExporter;
use crate::settings::SettingsStore;
use crate::tracking::{Calibrator, TrackingController};
use crate::ui::{handlers, websocket};

/// State shared by every request handler
pub struct AppState {
    pub controller: Arc<TrackingController>,
    pub settings: Arc<SettingsStore>,
    pub calibrator: Calibrator,
    pub exporter: SessionExporter,

    /// Queue depth given to each WebSocket subscriber
    pub subscriber_queue: usize,

    pub clear_after_download: bool,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire the shared components from configuration
    ///
    /// The initial settings are pushed to the controller's source.
    pub fn new(config: &AppConfig, controller: Arc<TrackingController>) -> Self {
        let settings = Arc::new(SettingsStore::from_config(&config.settings));
        controller.apply_settings(&settings.get());

        Self {
            controller,
            settings,
            calibrator: Calibrator::new(config.calibration.duration()),
            exporter: SessionExporter::from_config(&config.export),
            subscriber_queue: config.tracking.subscriber_queue,
            clear_after_download: config.export.clear_after_download,
            started_at: Utc::now(),
        }
    }
}

/// HTTP + WebSocket server
pub struct WebServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.bind_address, self.config.http_port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address: {}", e)))
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.bind_addr()?;
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web server listening on http://{}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Routes of the control API and live stream
pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/start-tracking", post(handlers::start_tracking))
        .route("/stop-tracking", post(handlers::stop_tracking))
        .route("/gaze-data", get(handlers::get_gaze_data))
        .route("/clear-data", post(handlers::clear_data))
        .route("/settings", get(handlers::get_settings))
        .route("/update-settings", post(handlers::update_settings))
        .route("/download-data", get(handlers::download_data))
        .route("/start-calibration", post(handlers::start_calibration))
        .route("/calibration-status", get(handlers::calibration_status))
        .route("/status", get(handlers::get_status))
        .route("/ws", get(websocket::ws_handler))
        .with_state(state);

    if let Some(dir) = &config.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(ServiceBuilder::new().layer(cors_layer(&config.cors_allowed_origins)))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
