//! Capture session state and the shared status handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Phase of the capture workflow. Exactly one is active at a time; in-flight
/// outbound calls are their own variants so the lock they imply is visible in
/// the state rather than reconstructed from flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    Idle,
    CameraActive,
    Captured,
    Classifying,
    ReadyForName,
    Listening,
    Logging,
}

impl CapturePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CameraActive => "camera_active",
            Self::Captured => "captured",
            Self::Classifying => "classifying",
            Self::ReadyForName => "ready_for_name",
            Self::Listening => "listening",
            Self::Logging => "logging",
        }
    }

    /// Whether an outbound call is in flight. Retake is rejected here so an
    /// in-flight request is never orphaned.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Classifying | Self::Listening | Self::Logging)
    }
}

/// A user-visible status message. Ephemeral: expired messages are dropped on
/// read and never persisted.
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
    expires_at: Instant,
}

impl StatusMessage {
    fn new(text: String, is_error: bool, ttl: Duration) -> Self {
        Self {
            text,
            is_error,
            expires_at: Instant::now() + ttl,
        }
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// The ephemeral capture session. Lives only in memory; a record in the store
/// is the only thing that outlives it.
#[derive(Debug, Clone)]
pub struct CaptureState {
    pub phase: CapturePhase,
    /// When the current phase was entered.
    pub phase_since: chrono::DateTime<chrono::Utc>,
    /// At most one pending still image, as a data URI.
    pub captured_image: Option<String>,
    /// Gate derived from the last classification of the current image.
    pub face_detected: bool,
    /// At most one pending transcript.
    pub recognized_name: Option<String>,
    pub message: Option<StatusMessage>,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self {
            phase: CapturePhase::Idle,
            phase_since: chrono::Utc::now(),
            captured_image: None,
            face_detected: false,
            recognized_name: None,
            message: None,
        }
    }
}

impl CaptureState {
    /// Seconds spent in the current phase.
    pub fn phase_seconds(&self) -> u64 {
        let elapsed = chrono::Utc::now() - self.phase_since;
        elapsed.num_seconds().max(0) as u64
    }
}

/// Thread-safe handle for sharing capture state between the machine and API
/// handlers.
#[derive(Clone)]
pub struct CaptureStatusHandle {
    inner: Arc<Mutex<CaptureState>>,
    message_ttl: Duration,
}

impl Default for CaptureStatusHandle {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl CaptureStatusHandle {
    pub fn new(message_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CaptureState::default())),
            message_ttl,
        }
    }

    /// Snapshot of the current state. Expired messages are cleared here, which
    /// is what makes them ephemeral without a background timer.
    pub async fn get(&self) -> CaptureState {
        let mut state = self.inner.lock().await;
        if state.message.as_ref().is_some_and(|m| m.expired()) {
            state.message = None;
        }
        state.clone()
    }

    pub async fn set_phase(&self, phase: CapturePhase) {
        let mut state = self.inner.lock().await;
        if state.phase != phase {
            state.phase_since = chrono::Utc::now();
        }
        state.phase = phase;
    }

    pub async fn set_image(&self, image: Option<String>) {
        let mut state = self.inner.lock().await;
        state.captured_image = image;
        state.face_detected = false;
    }

    pub async fn set_face_detected(&self, detected: bool) {
        let mut state = self.inner.lock().await;
        state.face_detected = detected;
    }

    pub async fn set_name(&self, name: Option<String>) {
        let mut state = self.inner.lock().await;
        state.recognized_name = name;
    }

    pub async fn show_message(&self, text: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.message = Some(StatusMessage::new(text.into(), false, self.message_ttl));
    }

    pub async fn show_error(&self, text: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.message = Some(StatusMessage::new(text.into(), true, self.message_ttl));
    }

    /// Clear the whole session back to idle. Used by retake.
    pub async fn reset_session(&self) {
        let mut state = self.inner.lock().await;
        state.phase = CapturePhase::Idle;
        state.phase_since = chrono::Utc::now();
        state.captured_image = None;
        state.face_detected = false;
        state.recognized_name = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_as_str() {
        assert_eq!(CapturePhase::Idle.as_str(), "idle");
        assert_eq!(CapturePhase::CameraActive.as_str(), "camera_active");
        assert_eq!(CapturePhase::Captured.as_str(), "captured");
        assert_eq!(CapturePhase::Classifying.as_str(), "classifying");
        assert_eq!(CapturePhase::ReadyForName.as_str(), "ready_for_name");
        assert_eq!(CapturePhase::Listening.as_str(), "listening");
        assert_eq!(CapturePhase::Logging.as_str(), "logging");
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&CapturePhase::ReadyForName).unwrap();
        assert_eq!(json, "\"ready_for_name\"");

        let parsed: CapturePhase = serde_json::from_str("\"listening\"").unwrap();
        assert_eq!(parsed, CapturePhase::Listening);
    }

    #[test]
    fn test_busy_phases() {
        assert!(CapturePhase::Classifying.is_busy());
        assert!(CapturePhase::Listening.is_busy());
        assert!(CapturePhase::Logging.is_busy());
        assert!(!CapturePhase::Idle.is_busy());
        assert!(!CapturePhase::Captured.is_busy());
        assert!(!CapturePhase::ReadyForName.is_busy());
    }

    #[tokio::test]
    async fn test_default_state() {
        let handle = CaptureStatusHandle::default();
        let state = handle.get().await;
        assert_eq!(state.phase, CapturePhase::Idle);
        assert!(state.captured_image.is_none());
        assert!(!state.face_detected);
        assert!(state.recognized_name.is_none());
        assert!(state.message.is_none());
    }

    #[tokio::test]
    async fn test_set_image_clears_face_gate() {
        let handle = CaptureStatusHandle::default();
        handle.set_face_detected(true).await;
        handle.set_image(Some("data:image/jpeg;base64,AA==".into())).await;

        let state = handle.get().await;
        assert!(!state.face_detected);
        assert!(state.captured_image.is_some());
    }

    #[tokio::test]
    async fn test_reset_session() {
        let handle = CaptureStatusHandle::default();
        handle.set_phase(CapturePhase::ReadyForName).await;
        handle.set_image(Some("data:image/jpeg;base64,AA==".into())).await;
        handle.set_face_detected(true).await;
        handle.set_name(Some("Alice".into())).await;

        handle.reset_session().await;

        let state = handle.get().await;
        assert_eq!(state.phase, CapturePhase::Idle);
        assert!(state.captured_image.is_none());
        assert!(!state.face_detected);
        assert!(state.recognized_name.is_none());
    }

    #[tokio::test]
    async fn test_message_expires_on_read() {
        let handle = CaptureStatusHandle::new(Duration::from_millis(10));
        handle.show_error("Could not access webcam: denied").await;

        let state = handle.get().await;
        assert!(state.message.is_some());
        assert!(state.message.unwrap().is_error);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let state = handle.get().await;
        assert!(state.message.is_none());
    }
}
