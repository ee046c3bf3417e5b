//! Failure kinds for the capture workflow.
//!
//! Every outbound call is converted into one of these at its call site, and
//! each kind has a fixed rollback target in the machine. The displayed text is
//! the `Display` rendering.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Camera permission or hardware failure.
    #[error("Could not access webcam: {0}")]
    DeviceAccess(String),

    /// Frame grab failed while the camera was live.
    #[error("Capture surface not ready: {0}")]
    SurfaceNotReady(String),

    /// Classification call failed (network, HTTP, malformed response).
    #[error("Could not verify face: {0}")]
    Classification(String),

    /// Speech recognition failed (unsupported platform, no speech, network).
    #[error("Could not recognize name: {0}")]
    Recognition(String),

    /// Attendance write failed (store unavailable, identity missing).
    #[error("Could not log attendance: {0}")]
    Write(String),
}
