//! End-to-end workflow tests with injected collaborator doubles.
//!
//! These drive the capture machine through the public crate API the way the
//! service loop does, without touching a real camera, microphone, network
//! endpoint, or database file.

use anyhow::{bail, Result};
use std::sync::{Arc, Mutex};

use rollcall::camera::{CapturedFrame, FrameSource};
use rollcall::capture::{CaptureMachine, CapturePhase, CaptureStatusHandle, WorkflowOptions};
use rollcall::classifier::{BoxFuture, Detection, FaceClassifier};
use rollcall::db::{NewAttendanceRecord, RecordStore};
use rollcall::identity::Identity;
use rollcall::recognizer::SpeechRecognizer;

struct FakeCamera {
    active: bool,
}

impl FrameSource for FakeCamera {
    fn start(&mut self) -> Result<()> {
        if self.active {
            bail!("already live");
        }
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn grab_frame(&mut self) -> Result<CapturedFrame> {
        Ok(CapturedFrame::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]))
    }
}

struct FakeClassifier {
    face_present: bool,
}

impl FaceClassifier for FakeClassifier {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn detect_face<'a>(&'a self, _image_base64: &'a str) -> BoxFuture<'a, Detection> {
        let detection = if self.face_present {
            Detection {
                face_detected: true,
                message: "Face detected".to_string(),
            }
        } else {
            Detection {
                face_detected: false,
                message: "No face detected".to_string(),
            }
        };
        Box::pin(async move { Ok(detection) })
    }

    fn generate<'a>(&'a self, _prompt: &'a str) -> BoxFuture<'a, String> {
        Box::pin(async move { Ok(String::new()) })
    }
}

struct FakeRecognizer {
    transcript: String,
}

impl SpeechRecognizer for FakeRecognizer {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize<'a>(
        &'a self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>> {
        let transcript = self.transcript.clone();
        Box::pin(async move {
            if transcript.is_empty() {
                bail!("no speech detected");
            }
            Ok(transcript)
        })
    }
}

#[derive(Default)]
struct MemoryStore {
    // Flips to Ok behavior after failures run out.
    failures_left: Mutex<u32>,
    records: Mutex<Vec<NewAttendanceRecord>>,
}

/// Local newtype so the crate's `RecordStore` trait can be implemented without
/// tripping the orphan rule on `Arc<MemoryStore>`, while still sharing the same
/// underlying store with the test body.
struct SharedStore(Arc<MemoryStore>);

impl RecordStore for SharedStore {
    fn insert(&self, record: &NewAttendanceRecord) -> Result<i64> {
        let mut failures = self.0.failures_left.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            bail!("store offline");
        }
        let mut records = self.0.records.lock().unwrap();
        records.push(record.clone());
        Ok(records.len() as i64)
    }
}

fn machine_with(
    classifier: FakeClassifier,
    recognizer: FakeRecognizer,
    store: Arc<MemoryStore>,
) -> CaptureMachine {
    CaptureMachine::new(
        Box::new(FakeCamera { active: false }),
        Arc::new(classifier),
        Box::new(recognizer),
        Box::new(SharedStore(store)),
        Identity {
            user_id: "user-42".to_string(),
            anonymous: false,
        },
        WorkflowOptions::default(),
        CaptureStatusHandle::default(),
    )
}

#[tokio::test]
async fn full_session_produces_one_record() {
    let store = Arc::new(MemoryStore::default());
    let mut machine = machine_with(
        FakeClassifier { face_present: true },
        FakeRecognizer {
            transcript: "Alice".to_string(),
        },
        store.clone(),
    );

    assert_eq!(machine.start_camera().await.unwrap(), CapturePhase::CameraActive);
    assert_eq!(machine.capture_image().await.unwrap(), CapturePhase::Captured);
    assert_eq!(machine.process_image().await.unwrap(), CapturePhase::ReadyForName);
    assert_eq!(machine.start_voice_input().await.unwrap(), CapturePhase::Captured);

    let records = store.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].person_name, "Alice");
    assert_eq!(records[0].logged_by, "user-42");
    assert!(records[0].image.starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn no_face_never_reaches_voice_input() {
    let store = Arc::new(MemoryStore::default());
    let mut machine = machine_with(
        FakeClassifier { face_present: false },
        FakeRecognizer {
            transcript: "Alice".to_string(),
        },
        store.clone(),
    );

    machine.start_camera().await.unwrap();
    machine.capture_image().await.unwrap();

    // Re-attempting classification on the same image is allowed and stays put.
    assert_eq!(machine.process_image().await.unwrap(), CapturePhase::Captured);
    assert_eq!(machine.process_image().await.unwrap(), CapturePhase::Captured);

    // Voice input has no face gate to stand on and must be rejected.
    assert!(machine.start_voice_input().await.is_err());
    assert!(store.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn write_failure_allows_voice_retry_without_recapture() {
    let store = Arc::new(MemoryStore {
        failures_left: Mutex::new(1),
        ..Default::default()
    });
    let mut machine = machine_with(
        FakeClassifier { face_present: true },
        FakeRecognizer {
            transcript: "Alice".to_string(),
        },
        store.clone(),
    );

    machine.start_camera().await.unwrap();
    machine.capture_image().await.unwrap();
    machine.process_image().await.unwrap();

    // First attempt hits the offline store and rolls back to ReadyForName.
    assert_eq!(
        machine.start_voice_input().await.unwrap(),
        CapturePhase::ReadyForName
    );
    assert!(store.records.lock().unwrap().is_empty());

    // Retry straight from voice input: no new capture, no new classification.
    assert_eq!(
        machine.start_voice_input().await.unwrap(),
        CapturePhase::Captured
    );
    assert_eq!(store.records.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn retake_discards_session_and_restarts_camera() {
    let store = Arc::new(MemoryStore::default());
    let mut machine = machine_with(
        FakeClassifier { face_present: true },
        FakeRecognizer {
            transcript: "Alice".to_string(),
        },
        store,
    );

    machine.start_camera().await.unwrap();
    machine.capture_image().await.unwrap();
    machine.process_image().await.unwrap();

    assert_eq!(machine.retake().await.unwrap(), CapturePhase::CameraActive);

    let state = machine.status().get().await;
    assert!(state.captured_image.is_none());
    assert!(!state.face_detected);
    assert!(state.recognized_name.is_none());
}
