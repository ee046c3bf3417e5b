//! REST API server for Rollcall.
//!
//! Provides HTTP endpoints for:
//! - Capture workflow control (camera, capture, classify, voice, retake, status)
//! - Attendance history
//! - Application logs

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::capture::{ApiCommand, CaptureApiState};

pub struct ApiServer {
    port: u16,
    capture_state: CaptureApiState,
}

impl ApiServer {
    pub fn new(
        tx: tokio::sync::mpsc::Sender<ApiCommand>,
        status: crate::capture::CaptureStatusHandle,
        user_id: String,
    ) -> Self {
        Self {
            port: 7655, // ROLL on a phone keypad
            capture_state: CaptureApiState {
                tx,
                status,
                user_id,
            },
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            // Root and version endpoints
            .route("/", get(status))
            .route("/version", get(version))
            // Capture workflow endpoints
            .merge(routes::capture::router(self.capture_state))
            // Other API routes
            .nest("/history", routes::history::router())
            .nest("/logs", routes::logs::router())
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /              - Service info");
        info!("  POST /camera/start  - Start the camera");
        info!("  POST /capture       - Capture a still image");
        info!("  POST /classify      - Verify a face in the captured image");
        info!("  POST /voice         - Listen for a spoken name and log attendance");
        info!("  POST /retake        - Discard the session and restart the camera");
        info!("  GET  /status        - Get workflow status");
        info!("  GET  /version       - Get version info");
        info!("  GET  /history       - List attendance records");
        info!("  GET  /history/:id   - Get a single record with its image");
        info!("  GET  /logs          - Get application logs");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "rollcall",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "rollcall"
    }))
}
