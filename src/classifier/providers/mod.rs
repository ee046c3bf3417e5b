use super::{BoxFuture, Detection};

pub mod gemini;
pub mod vision_api;

pub use gemini::GeminiClassifier;
pub use vision_api::VisionApiClassifier;

pub trait FaceClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Inspect a base64-encoded still image and report face-detection status.
    fn detect_face<'a>(&'a self, image_base64: &'a str) -> BoxFuture<'a, Detection>;

    /// Free-text prompt in, free-text completion out. No schema is enforced
    /// on the response.
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, String>;
}
