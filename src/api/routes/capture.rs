//! Capture workflow endpoints.
//!
//! Each action endpoint enqueues a command for the workflow actor and replies
//! with the freshly settled status; the buttons of a UI map one-to-one onto
//! these routes.

use crate::capture::{CaptureState, CaptureStatusHandle};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Commands the workflow actor consumes, one per user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCommand {
    StartCamera,
    CaptureImage,
    ProcessImage,
    StartVoiceInput,
    Retake,
}

impl ApiCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartCamera => "start_camera",
            Self::CaptureImage => "capture_image",
            Self::ProcessImage => "process_image",
            Self::StartVoiceInput => "start_voice_input",
            Self::Retake => "retake",
        }
    }
}

#[derive(Clone)]
pub struct CaptureApiState {
    pub tx: mpsc::Sender<ApiCommand>,
    pub status: CaptureStatusHandle,
    pub user_id: String,
}

/// Creates the capture router with all workflow endpoints.
pub fn router(state: CaptureApiState) -> Router {
    Router::new()
        .route("/camera/start", post(start_camera))
        .route("/capture", post(capture_image))
        .route("/classify", post(process_image))
        .route("/voice", post(start_voice_input))
        .route("/retake", post(retake))
        .route("/status", get(capture_status))
        .with_state(state)
}

async fn start_camera(State(state): State<CaptureApiState>) -> Result<Json<Value>, StatusCode> {
    dispatch(state, ApiCommand::StartCamera).await
}

async fn capture_image(State(state): State<CaptureApiState>) -> Result<Json<Value>, StatusCode> {
    dispatch(state, ApiCommand::CaptureImage).await
}

async fn process_image(State(state): State<CaptureApiState>) -> Result<Json<Value>, StatusCode> {
    dispatch(state, ApiCommand::ProcessImage).await
}

async fn start_voice_input(
    State(state): State<CaptureApiState>,
) -> Result<Json<Value>, StatusCode> {
    dispatch(state, ApiCommand::StartVoiceInput).await
}

async fn retake(State(state): State<CaptureApiState>) -> Result<Json<Value>, StatusCode> {
    dispatch(state, ApiCommand::Retake).await
}

/// Enqueue one workflow command and reply with the settled status.
async fn dispatch(
    state: CaptureApiState,
    command: ApiCommand,
) -> Result<Json<Value>, StatusCode> {
    info!("{} command received via API", command.as_str());

    match state.tx.send(command).await {
        Ok(_) => {
            // Small delay to allow the status to be updated
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

            Ok(Json(status_json(&state.status.get().await, &state.user_id)))
        }
        Err(e) => {
            error!("Failed to send {} command: {}", command.as_str(), e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /status - Current workflow state.
async fn capture_status(State(state): State<CaptureApiState>) -> Json<Value> {
    Json(status_json(&state.status.get().await, &state.user_id))
}

fn status_json(state: &CaptureState, user_id: &str) -> Value {
    let message = state.message.as_ref().map(|m| {
        json!({
            "text": m.text,
            "is_error": m.is_error,
        })
    });

    json!({
        "phase": state.phase.as_str(),
        "phase_seconds": state.phase_seconds(),
        "busy": state.phase.is_busy(),
        "has_image": state.captured_image.is_some(),
        "face_detected": state.face_detected,
        "recognized_name": state.recognized_name,
        "message": message,
        "user": user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CapturePhase;

    #[tokio::test]
    async fn test_status_json_shape() {
        let handle = CaptureStatusHandle::default();
        handle.set_phase(CapturePhase::ReadyForName).await;
        handle.set_image(Some("data:image/jpeg;base64,AA==".into())).await;
        handle.set_face_detected(true).await;

        let value = status_json(&handle.get().await, "anon-1");
        assert_eq!(value["phase"], "ready_for_name");
        assert_eq!(value["busy"], false);
        assert_eq!(value["has_image"], true);
        assert_eq!(value["face_detected"], true);
        assert_eq!(value["user"], "anon-1");
        // The raw image never rides along in status payloads.
        assert!(value.get("captured_image").is_none());
    }
}
