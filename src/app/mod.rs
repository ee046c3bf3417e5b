use crate::api::{ApiCommand, ApiServer};
use crate::camera::CommandFrameSource;
use crate::capture::{CaptureMachine, CaptureStatusHandle, WorkflowOptions};
use crate::classifier;
use crate::config::Config;
use crate::db::SqliteStore;
use crate::identity;
use crate::recognizer::MicRecognizer;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn run_service() -> Result<()> {
    info!("Starting Rollcall service");

    let config = Config::load()?;
    let identity = identity::resolve(&config.identity)?;

    let classifier = classifier::from_config(&config.classifier)?;
    let recognizer = MicRecognizer::from_config(&config.recognizer)?;
    let camera = CommandFrameSource::new(config.camera.clone());

    let status = CaptureStatusHandle::new(Duration::from_secs(
        config.behavior.message_display_seconds.max(1),
    ));

    let options = WorkflowOptions {
        classify_timeout: Duration::from_secs(config.classifier.timeout_seconds.max(1)),
        // The recognition budget covers the listening window plus the
        // transcription round trip.
        recognize_timeout: Duration::from_secs(
            config.recognizer.listen_seconds + config.recognizer.timeout_seconds.max(1),
        ),
        confirmation_message: config.behavior.confirmation_message,
    };

    let mut machine = CaptureMachine::new(
        Box::new(camera),
        classifier,
        Box::new(recognizer),
        Box::new(SqliteStore),
        identity.clone(),
        options,
        status.clone(),
    );

    let (tx, mut rx) = mpsc::channel::<ApiCommand>(10);

    let api_server = ApiServer::new(tx, status, identity.user_id.clone());
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {}", e);
        }
    });

    info!("Rollcall is ready!");
    info!("Start a session: curl -X POST http://127.0.0.1:7655/camera/start");
    info!("Then: /capture, /classify, /voice — or /retake to start over");

    // Single consumer: commands are applied strictly one at a time, so at most
    // one classification, recognition, or write is ever in flight.
    while let Some(command) = rx.recv().await {
        let result = match command {
            ApiCommand::StartCamera => machine.start_camera().await,
            ApiCommand::CaptureImage => machine.capture_image().await,
            ApiCommand::ProcessImage => machine.process_image().await,
            ApiCommand::StartVoiceInput => machine.start_voice_input().await,
            ApiCommand::Retake => machine.retake().await,
        };

        match result {
            Ok(phase) => info!("{} handled, now {}", command.as_str(), phase.as_str()),
            Err(e) => warn!("{} rejected: {}", command.as_str(), e),
        }
    }

    Ok(())
}
