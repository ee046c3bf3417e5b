//! Capture workflow orchestrator.
//!
//! Owns the camera lifecycle and drives one session through
//! camera → still → classification → spoken name → stored record.
//!
//! All dependencies are injected via constructor — no concrete types
//! hardcoded. Every outbound call is wrapped so a failure becomes a
//! user-visible message plus a rollback to the nearest safe prior phase,
//! never an unhandled error and never a forward transition.

use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::camera::FrameSource;
use crate::classifier::FaceClassifier;
use crate::db::{NewAttendanceRecord, RecordStore};
use crate::identity::Identity;
use crate::recognizer::SpeechRecognizer;

use super::error::CaptureError;
use super::status::{CapturePhase, CaptureStatusHandle};

/// Per-call budgets and behavior toggles.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowOptions {
    /// Budget for one classification or generation call.
    pub classify_timeout: Duration,
    /// Budget for one recognition session, listening window included.
    pub recognize_timeout: Duration,
    /// Generate a confirmation line after each successful log.
    pub confirmation_message: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            classify_timeout: Duration::from_secs(30),
            recognize_timeout: Duration::from_secs(35),
            confirmation_message: false,
        }
    }
}

pub struct CaptureMachine {
    camera: Box<dyn FrameSource>,
    classifier: Arc<dyn FaceClassifier>,
    recognizer: Box<dyn SpeechRecognizer>,
    store: Box<dyn RecordStore>,
    identity: Identity,
    options: WorkflowOptions,
    status: CaptureStatusHandle,
}

impl CaptureMachine {
    pub fn new(
        camera: Box<dyn FrameSource>,
        classifier: Arc<dyn FaceClassifier>,
        recognizer: Box<dyn SpeechRecognizer>,
        store: Box<dyn RecordStore>,
        identity: Identity,
        options: WorkflowOptions,
        status: CaptureStatusHandle,
    ) -> Self {
        Self {
            camera,
            classifier,
            recognizer,
            store,
            identity,
            options,
            status,
        }
    }

    /// Acquire the camera. Idle → CameraActive; a device failure stays Idle.
    pub async fn start_camera(&mut self) -> Result<CapturePhase> {
        let state = self.status.get().await;
        if state.phase != CapturePhase::Idle {
            bail!("Cannot start camera while {}", state.phase.as_str());
        }

        // Always route through stop so two live sources can never exist.
        self.camera.stop();

        match self.camera.start() {
            Ok(()) => {
                self.status.set_phase(CapturePhase::CameraActive).await;
                info!("CaptureMachine: camera live");
                Ok(CapturePhase::CameraActive)
            }
            Err(e) => {
                let err = CaptureError::DeviceAccess(e.to_string());
                warn!("Failed to start camera: {}", e);
                self.status.show_error(err.to_string()).await;
                Ok(CapturePhase::Idle)
            }
        }
    }

    /// Grab a still and release the camera. CameraActive → Captured; a grab
    /// failure keeps the camera live.
    pub async fn capture_image(&mut self) -> Result<CapturePhase> {
        let state = self.status.get().await;
        if state.phase != CapturePhase::CameraActive {
            bail!("Cannot capture while {}", state.phase.as_str());
        }

        let frame = match self.camera.grab_frame() {
            Ok(frame) => frame,
            Err(e) => {
                let err = CaptureError::SurfaceNotReady(e.to_string());
                warn!("Failed to grab frame: {}", e);
                self.status.show_error(err.to_string()).await;
                return Ok(CapturePhase::CameraActive);
            }
        };

        self.camera.stop();

        // set_image clears the face gate for the new still.
        self.status.set_image(Some(frame.to_data_uri())).await;
        self.status.set_phase(CapturePhase::Captured).await;
        info!("CaptureMachine: still captured, camera released");

        Ok(CapturePhase::Captured)
    }

    /// Send the held image to the classifier. Captured → Classifying →
    /// ReadyForName on a positive result, back to Captured on anything else.
    pub async fn process_image(&mut self) -> Result<CapturePhase> {
        let state = self.status.get().await;
        if state.phase != CapturePhase::Captured {
            bail!("Cannot classify while {}", state.phase.as_str());
        }
        let Some(image) = state.captured_image else {
            bail!("No image captured");
        };

        self.status.set_phase(CapturePhase::Classifying).await;

        let image_b64 = image_base64(&image);
        let outcome = timeout(
            self.options.classify_timeout,
            self.classifier.detect_face(image_b64),
        )
        .await;

        match outcome {
            Ok(Ok(detection)) if detection.face_detected => {
                self.status.set_face_detected(true).await;
                // A name recognized for a previous image must never attach
                // to this one.
                self.status.set_name(None).await;
                self.status.set_phase(CapturePhase::ReadyForName).await;
                self.status.show_message(detection.message).await;
                info!("CaptureMachine: face confirmed");
                Ok(CapturePhase::ReadyForName)
            }
            Ok(Ok(detection)) => {
                self.status.set_face_detected(false).await;
                self.status.set_phase(CapturePhase::Captured).await;
                self.status.show_error(detection.message).await;
                info!("CaptureMachine: no face reported");
                Ok(CapturePhase::Captured)
            }
            Ok(Err(e)) => {
                self.rollback_classification(CaptureError::Classification(e.to_string()))
                    .await;
                Ok(CapturePhase::Captured)
            }
            Err(_) => {
                self.rollback_classification(CaptureError::Classification(
                    "request timed out".to_string(),
                ))
                .await;
                Ok(CapturePhase::Captured)
            }
        }
    }

    async fn rollback_classification(&self, err: CaptureError) {
        warn!("Classification failed: {}", err);
        self.status.set_face_detected(false).await;
        self.status.set_phase(CapturePhase::Captured).await;
        self.status.show_error(err.to_string()).await;
    }

    /// Listen for a spoken name. ReadyForName → Listening; a final transcript
    /// transitions straight into the logging write — there is no separate
    /// confirmation step between hearing the name and storing the record.
    pub async fn start_voice_input(&mut self) -> Result<CapturePhase> {
        let state = self.status.get().await;
        if state.phase != CapturePhase::ReadyForName {
            bail!("Cannot listen while {}", state.phase.as_str());
        }

        if !self.recognizer.is_available() {
            let err = CaptureError::Recognition(
                "speech capture is not supported on this platform".to_string(),
            );
            self.status.show_error(err.to_string()).await;
            return Ok(CapturePhase::ReadyForName);
        }

        self.status.set_phase(CapturePhase::Listening).await;

        let outcome = timeout(self.options.recognize_timeout, self.recognizer.recognize()).await;

        match outcome {
            Ok(Ok(name)) => {
                self.status.set_name(Some(name.clone())).await;
                self.log_attendance(name).await
            }
            Ok(Err(e)) => {
                self.rollback_recognition(CaptureError::Recognition(e.to_string()))
                    .await;
                Ok(CapturePhase::ReadyForName)
            }
            Err(_) => {
                self.rollback_recognition(CaptureError::Recognition(
                    "listening timed out".to_string(),
                ))
                .await;
                Ok(CapturePhase::ReadyForName)
            }
        }
    }

    async fn rollback_recognition(&self, err: CaptureError) {
        warn!("Recognition failed: {}", err);
        self.status.set_name(None).await;
        self.status.set_phase(CapturePhase::ReadyForName).await;
        self.status.show_error(err.to_string()).await;
    }

    /// Write one attendance record. Entered only from a successful transcript.
    /// Success returns to Captured with the image kept for review; a write
    /// failure returns to ReadyForName with image and face gate preserved so
    /// the user can retry without re-capturing.
    async fn log_attendance(&mut self, name: String) -> Result<CapturePhase> {
        self.status.set_phase(CapturePhase::Logging).await;

        let state = self.status.get().await;

        let write_result = match (&state.captured_image, state.face_detected) {
            (Some(image), true) if !name.trim().is_empty() => {
                let record = NewAttendanceRecord {
                    person_name: name.clone(),
                    image: image.clone(),
                    logged_by: self.identity.user_id.clone(),
                };
                self.store.insert(&record)
            }
            _ => Err(anyhow::anyhow!(
                "attendance requires a verified image and a non-empty name"
            )),
        };

        match write_result {
            Ok(id) => {
                self.status.set_name(None).await;
                self.status.set_face_detected(false).await;
                self.status.set_phase(CapturePhase::Captured).await;
                self.status
                    .show_message(format!("Attendance logged for {}", name))
                    .await;
                info!("CaptureMachine: record {} stored for {}", id, name);

                if self.options.confirmation_message {
                    self.show_confirmation(&name).await;
                }

                Ok(CapturePhase::Captured)
            }
            Err(e) => {
                let err = CaptureError::Write(e.to_string());
                warn!("Attendance write failed: {}", err);
                self.status.set_name(None).await;
                self.status.set_phase(CapturePhase::ReadyForName).await;
                self.status.show_error(err.to_string()).await;
                Ok(CapturePhase::ReadyForName)
            }
        }
    }

    /// Best-effort confirmation line from the generative endpoint. Failure
    /// here never affects the stored record.
    async fn show_confirmation(&self, name: &str) {
        let prompt = format!(
            "Generate one short, friendly confirmation sentence for {}, who was just marked present.",
            name
        );

        match timeout(self.options.classify_timeout, self.classifier.generate(&prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                self.status.show_message(text.trim().to_string()).await;
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("Confirmation generation failed: {}", e),
            Err(_) => debug!("Confirmation generation timed out"),
        }
    }

    /// Discard the session and start over. Available from Captured,
    /// ReadyForName, or Idle with a leftover image; rejected while an
    /// outbound call is in flight or the camera is already live.
    pub async fn retake(&mut self) -> Result<CapturePhase> {
        let state = self.status.get().await;
        if state.phase.is_busy() {
            bail!("Cannot retake while {}", state.phase.as_str());
        }
        if state.phase == CapturePhase::CameraActive {
            bail!("Camera is already live");
        }

        self.camera.stop();
        self.status.reset_session().await;
        info!("CaptureMachine: session discarded, restarting camera");

        self.start_camera().await
    }

    pub fn status(&self) -> CaptureStatusHandle {
        self.status.clone()
    }
}

/// Strip the `data:<mime>;base64,` prefix for classifier payloads.
fn image_base64(data_uri: &str) -> &str {
    data_uri
        .rsplit_once(',')
        .map(|(_, b64)| b64)
        .unwrap_or(data_uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CapturedFrame;
    use crate::capture::status::CapturePhase;
    use crate::classifier::Detection;
    use std::sync::Mutex;

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct CameraLog {
        events: Mutex<Vec<&'static str>>,
    }

    struct MockCamera {
        log: Arc<CameraLog>,
        fail_start: bool,
        fail_grab: bool,
        active: bool,
    }

    impl MockCamera {
        fn new(log: Arc<CameraLog>) -> Self {
            Self {
                log,
                fail_start: false,
                fail_grab: false,
                active: false,
            }
        }
    }

    impl FrameSource for MockCamera {
        fn start(&mut self) -> Result<()> {
            if self.fail_start {
                bail!("permission denied");
            }
            assert!(!self.active, "started while already live");
            self.active = true;
            self.log.events.lock().unwrap().push("start");
            Ok(())
        }

        fn stop(&mut self) {
            if self.active {
                self.log.events.lock().unwrap().push("stop");
            }
            self.active = false;
        }

        fn is_active(&self) -> bool {
            self.active
        }

        fn grab_frame(&mut self) -> Result<CapturedFrame> {
            if self.fail_grab {
                bail!("no frame available");
            }
            Ok(CapturedFrame::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]))
        }
    }

    struct MockClassifier {
        // Pop-front queue of outcomes; the last entry repeats.
        outcomes: Mutex<Vec<Result<Detection, String>>>,
    }

    impl MockClassifier {
        fn always(detection: Detection) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(vec![Ok(detection)]),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(vec![Err(message.to_string())]),
            })
        }

        fn face() -> Detection {
            Detection {
                face_detected: true,
                message: "Face detected".to_string(),
            }
        }

        fn no_face() -> Detection {
            Detection {
                face_detected: false,
                message: "No face detected".to_string(),
            }
        }
    }

    impl FaceClassifier for MockClassifier {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn detect_face<'a>(
            &'a self,
            _image_base64: &'a str,
        ) -> crate::classifier::BoxFuture<'a, Detection> {
            let mut outcomes = self.outcomes.lock().unwrap();
            let outcome = if outcomes.len() > 1 {
                outcomes.remove(0)
            } else {
                outcomes[0].clone()
            };
            Box::pin(async move { outcome.map_err(|e| anyhow::anyhow!(e)) })
        }

        fn generate<'a>(&'a self, _prompt: &'a str) -> crate::classifier::BoxFuture<'a, String> {
            Box::pin(async move { Ok("Welcome!".to_string()) })
        }
    }

    struct MockRecognizer {
        outcome: Result<String, String>,
        available: bool,
    }

    impl MockRecognizer {
        fn hears(name: &str) -> Box<Self> {
            Box::new(Self {
                outcome: Ok(name.to_string()),
                available: true,
            })
        }

        fn failing(message: &str) -> Box<Self> {
            Box::new(Self {
                outcome: Err(message.to_string()),
                available: true,
            })
        }

        fn unsupported() -> Box<Self> {
            Box::new(Self {
                outcome: Err("unsupported".to_string()),
                available: false,
            })
        }
    }

    impl SpeechRecognizer for MockRecognizer {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn recognize<'a>(
            &'a self,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>>
        {
            let outcome = self.outcome.clone();
            Box::pin(async move { outcome.map_err(|e| anyhow::anyhow!(e)) })
        }
    }

    #[derive(Default)]
    struct MockStore {
        fail: bool,
        inserted: Mutex<Vec<NewAttendanceRecord>>,
    }

    impl RecordStore for Arc<MockStore> {
        fn insert(&self, record: &NewAttendanceRecord) -> Result<i64> {
            if self.fail {
                bail!("store offline");
            }
            let mut inserted = self.inserted.lock().unwrap();
            inserted.push(record.clone());
            Ok(inserted.len() as i64)
        }
    }

    fn identity() -> Identity {
        Identity {
            user_id: "anon-test".to_string(),
            anonymous: true,
        }
    }

    struct Harness {
        machine: CaptureMachine,
        camera_log: Arc<CameraLog>,
        store: Arc<MockStore>,
    }

    fn harness(
        camera: MockCamera,
        classifier: Arc<MockClassifier>,
        recognizer: Box<MockRecognizer>,
        store: Arc<MockStore>,
    ) -> Harness {
        let camera_log = camera.log.clone();
        let machine = CaptureMachine::new(
            Box::new(camera),
            classifier,
            recognizer,
            Box::new(store.clone()),
            identity(),
            WorkflowOptions::default(),
            CaptureStatusHandle::default(),
        );
        Harness {
            machine,
            camera_log,
            store,
        }
    }

    fn default_harness() -> Harness {
        let log = Arc::new(CameraLog::default());
        harness(
            MockCamera::new(log),
            MockClassifier::always(MockClassifier::face()),
            MockRecognizer::hears("Alice"),
            Arc::new(MockStore::default()),
        )
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_camera_denied_stays_idle() {
        let log = Arc::new(CameraLog::default());
        let mut camera = MockCamera::new(log);
        camera.fail_start = true;
        let mut h = harness(
            camera,
            MockClassifier::always(MockClassifier::face()),
            MockRecognizer::hears("Alice"),
            Arc::new(MockStore::default()),
        );

        let phase = h.machine.start_camera().await.unwrap();
        assert_eq!(phase, CapturePhase::Idle);

        let state = h.machine.status().get().await;
        assert_eq!(state.phase, CapturePhase::Idle);
        let message = state.message.unwrap();
        assert!(message.is_error);
        assert!(message.text.starts_with("Could not access webcam"));
        assert!(h.camera_log.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_workflow_logs_record() {
        let mut h = default_harness();

        assert_eq!(
            h.machine.start_camera().await.unwrap(),
            CapturePhase::CameraActive
        );
        assert_eq!(
            h.machine.capture_image().await.unwrap(),
            CapturePhase::Captured
        );
        assert_eq!(
            h.machine.process_image().await.unwrap(),
            CapturePhase::ReadyForName
        );
        assert_eq!(
            h.machine.start_voice_input().await.unwrap(),
            CapturePhase::Captured
        );

        let state = h.machine.status().get().await;
        assert_eq!(state.phase, CapturePhase::Captured);
        assert!(state.recognized_name.is_none());
        assert!(!state.face_detected);
        // Image stays visible for review until an explicit retake.
        assert!(state.captured_image.is_some());

        let inserted = h.store.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].person_name, "Alice");
        assert_eq!(inserted[0].logged_by, "anon-test");
        assert!(inserted[0].image.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_camera_released_after_capture() {
        let mut h = default_harness();
        h.machine.start_camera().await.unwrap();
        h.machine.capture_image().await.unwrap();

        let events = h.camera_log.events.lock().unwrap().clone();
        assert_eq!(events, vec!["start", "stop"]);
    }

    #[tokio::test]
    async fn test_no_face_is_idempotent() {
        let log = Arc::new(CameraLog::default());
        let mut h = harness(
            MockCamera::new(log),
            MockClassifier::always(MockClassifier::no_face()),
            MockRecognizer::hears("Alice"),
            Arc::new(MockStore::default()),
        );

        h.machine.start_camera().await.unwrap();
        h.machine.capture_image().await.unwrap();

        for _ in 0..2 {
            let phase = h.machine.process_image().await.unwrap();
            assert_eq!(phase, CapturePhase::Captured);

            let state = h.machine.status().get().await;
            assert!(!state.face_detected);
            assert_eq!(state.message.unwrap().text, "No face detected");
        }

        assert!(h.store.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_classifier_error_rolls_back_to_captured() {
        let log = Arc::new(CameraLog::default());
        let mut h = harness(
            MockCamera::new(log),
            MockClassifier::failing("connection refused"),
            MockRecognizer::hears("Alice"),
            Arc::new(MockStore::default()),
        );

        h.machine.start_camera().await.unwrap();
        h.machine.capture_image().await.unwrap();
        let phase = h.machine.process_image().await.unwrap();

        assert_eq!(phase, CapturePhase::Captured);
        let state = h.machine.status().get().await;
        assert!(state.captured_image.is_some());
        assert!(state.message.unwrap().text.starts_with("Could not verify face"));
    }

    #[tokio::test]
    async fn test_store_failure_preserves_image_and_gate() {
        let log = Arc::new(CameraLog::default());
        let store = Arc::new(MockStore {
            fail: true,
            ..Default::default()
        });
        let mut h = harness(
            MockCamera::new(log),
            MockClassifier::always(MockClassifier::face()),
            MockRecognizer::hears("Alice"),
            store,
        );

        h.machine.start_camera().await.unwrap();
        h.machine.capture_image().await.unwrap();
        h.machine.process_image().await.unwrap();
        let phase = h.machine.start_voice_input().await.unwrap();

        assert_eq!(phase, CapturePhase::ReadyForName);
        let state = h.machine.status().get().await;
        assert!(state.captured_image.is_some());
        assert!(state.face_detected);
        assert!(state.recognized_name.is_none());
        assert!(state
            .message
            .unwrap()
            .text
            .starts_with("Could not log attendance"));
        assert!(h.store.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recognizer_error_returns_to_ready() {
        let log = Arc::new(CameraLog::default());
        let mut h = harness(
            MockCamera::new(log),
            MockClassifier::always(MockClassifier::face()),
            MockRecognizer::failing("no speech detected"),
            Arc::new(MockStore::default()),
        );

        h.machine.start_camera().await.unwrap();
        h.machine.capture_image().await.unwrap();
        h.machine.process_image().await.unwrap();
        let phase = h.machine.start_voice_input().await.unwrap();

        assert_eq!(phase, CapturePhase::ReadyForName);
        let state = h.machine.status().get().await;
        assert!(state.recognized_name.is_none());
        assert!(state.face_detected);
        assert!(h.store.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_recognizer_stays_ready() {
        let log = Arc::new(CameraLog::default());
        let mut h = harness(
            MockCamera::new(log),
            MockClassifier::always(MockClassifier::face()),
            MockRecognizer::unsupported(),
            Arc::new(MockStore::default()),
        );

        h.machine.start_camera().await.unwrap();
        h.machine.capture_image().await.unwrap();
        h.machine.process_image().await.unwrap();
        let phase = h.machine.start_voice_input().await.unwrap();

        assert_eq!(phase, CapturePhase::ReadyForName);
        let state = h.machine.status().get().await;
        assert!(state
            .message
            .unwrap()
            .text
            .contains("not supported on this platform"));
    }

    #[tokio::test]
    async fn test_grab_failure_keeps_camera_live() {
        let log = Arc::new(CameraLog::default());
        let mut camera = MockCamera::new(log);
        camera.fail_grab = true;
        let mut h = harness(
            camera,
            MockClassifier::always(MockClassifier::face()),
            MockRecognizer::hears("Alice"),
            Arc::new(MockStore::default()),
        );

        h.machine.start_camera().await.unwrap();
        let phase = h.machine.capture_image().await.unwrap();

        assert_eq!(phase, CapturePhase::CameraActive);
        let state = h.machine.status().get().await;
        assert!(state.captured_image.is_none());
        assert!(state
            .message
            .unwrap()
            .text
            .starts_with("Capture surface not ready"));
    }

    #[tokio::test]
    async fn test_retake_resets_session() {
        let mut h = default_harness();

        h.machine.start_camera().await.unwrap();
        h.machine.capture_image().await.unwrap();
        h.machine.process_image().await.unwrap();

        let phase = h.machine.retake().await.unwrap();
        assert_eq!(phase, CapturePhase::CameraActive);

        let state = h.machine.status().get().await;
        assert!(state.captured_image.is_none());
        assert!(!state.face_detected);
        assert!(state.recognized_name.is_none());

        // stop always precedes the restart
        let events = h.camera_log.events.lock().unwrap().clone();
        assert_eq!(events, vec!["start", "stop", "start"]);
    }

    #[tokio::test]
    async fn test_retake_rejected_while_busy() {
        let mut h = default_harness();
        h.machine.status().set_phase(CapturePhase::Listening).await;
        assert!(h.machine.retake().await.is_err());

        h.machine.status().set_phase(CapturePhase::Logging).await;
        assert!(h.machine.retake().await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_phase_commands_bail() {
        let mut h = default_harness();

        assert!(h.machine.capture_image().await.is_err());
        assert!(h.machine.process_image().await.is_err());
        assert!(h.machine.start_voice_input().await.is_err());
    }

    #[test]
    fn test_image_base64_strips_prefix() {
        assert_eq!(image_base64("data:image/jpeg;base64,AAAA"), "AAAA");
        assert_eq!(image_base64("AAAA"), "AAAA");
    }
}
