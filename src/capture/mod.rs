pub mod error;
pub mod machine;
pub mod status;

pub use error::CaptureError;
pub use machine::{CaptureMachine, WorkflowOptions};
pub use status::{CapturePhase, CaptureState, CaptureStatusHandle, StatusMessage};
