//! Webcam frame source.
//!
//! The camera is a singular owned resource: exactly zero or one source is
//! live at a time, and callers always route through stop before start. The
//! concrete implementation grabs stills with an external capture tool rather
//! than linking a capture stack into the binary.

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::CameraConfig;

/// One encoded still image.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub mime: &'static str,
}

impl CapturedFrame {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            data,
            mime: "image/jpeg",
        }
    }

    /// Encode as a data URI for storage and for classifier payloads.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.data))
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }
}

/// Trait for live video sources the workflow can capture stills from.
pub trait FrameSource: Send {
    /// Acquire the device. Fails if it is unavailable or already held.
    fn start(&mut self) -> Result<()>;

    /// Release the device. Safe to call when not started.
    fn stop(&mut self);

    /// Whether the source is currently live.
    fn is_active(&self) -> bool;

    /// Grab one still frame. Only valid while the source is live.
    fn grab_frame(&mut self) -> Result<CapturedFrame>;
}

/// Which external tool grabs the still.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GrabTool {
    Fswebcam(PathBuf),
    Ffmpeg(PathBuf),
    /// User-supplied command; `{device}`, `{width}`, `{height}` and `{output}`
    /// placeholders are substituted.
    Custom(String),
}

/// Frame source that shells out to a capture tool for each still.
pub struct CommandFrameSource {
    config: CameraConfig,
    tool: Option<GrabTool>,
    active: bool,
}

impl CommandFrameSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            tool: None,
            active: false,
        }
    }

    fn resolve_tool(&self) -> Result<GrabTool> {
        if let Some(command) = &self.config.grab_command {
            return Ok(GrabTool::Custom(command.clone()));
        }
        if let Ok(path) = which::which("fswebcam") {
            return Ok(GrabTool::Fswebcam(path));
        }
        if let Ok(path) = which::which("ffmpeg") {
            return Ok(GrabTool::Ffmpeg(path));
        }
        Err(anyhow!(
            "no capture tool found (install fswebcam or ffmpeg, or set camera.grab_command)"
        ))
    }

    fn grab_args(tool: &GrabTool, config: &CameraConfig, output: &str) -> (String, Vec<String>) {
        let resolution = format!("{}x{}", config.width, config.height);
        match tool {
            GrabTool::Fswebcam(path) => (
                path.to_string_lossy().to_string(),
                vec![
                    "--no-banner".into(),
                    "-d".into(),
                    config.device.clone(),
                    "-r".into(),
                    resolution,
                    "--jpeg".into(),
                    "85".into(),
                    "--save".into(),
                    output.into(),
                ],
            ),
            GrabTool::Ffmpeg(path) => (
                path.to_string_lossy().to_string(),
                vec![
                    "-f".into(),
                    "v4l2".into(),
                    "-i".into(),
                    config.device.clone(),
                    "-frames:v".into(),
                    "1".into(),
                    "-s".into(),
                    resolution,
                    "-y".into(),
                    output.into(),
                ],
            ),
            GrabTool::Custom(command) => {
                let rendered = command
                    .replace("{device}", &config.device)
                    .replace("{width}", &config.width.to_string())
                    .replace("{height}", &config.height.to_string())
                    .replace("{output}", output);
                let mut parts = rendered.split_whitespace().map(String::from);
                let program = parts.next().unwrap_or_default();
                (program, parts.collect())
            }
        }
    }
}

impl FrameSource for CommandFrameSource {
    fn start(&mut self) -> Result<()> {
        if self.active {
            bail!("Frame source already started");
        }

        let tool = self.resolve_tool()?;

        // A custom command is trusted to know its own device; for the
        // detected tools the device node must exist up front so permission
        // and hardware problems surface at start, not at capture.
        if !matches!(tool, GrabTool::Custom(_)) && !std::path::Path::new(&self.config.device).exists()
        {
            bail!("camera device {} not found", self.config.device);
        }

        info!("Camera acquired: {} via {:?}", self.config.device, tool);
        self.tool = Some(tool);
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.active {
            debug!("Camera released: {}", self.config.device);
        }
        self.tool = None;
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn grab_frame(&mut self) -> Result<CapturedFrame> {
        let tool = self
            .tool
            .as_ref()
            .ok_or_else(|| anyhow!("frame source not started"))?;

        let scratch = tempfile::Builder::new()
            .prefix("rollcall-frame-")
            .suffix(".jpg")
            .tempfile()
            .context("Failed to create scratch file for frame")?;
        let output_path = scratch.path().to_string_lossy().to_string();

        let (program, args) = Self::grab_args(tool, &self.config, &output_path);
        debug!("Grabbing frame: {} {:?}", program, args);

        let output = std::process::Command::new(&program)
            .args(&args)
            .output()
            .with_context(|| format!("Failed to run capture tool {}", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "capture tool exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let data = std::fs::read(scratch.path()).context("Failed to read captured frame")?;
        if data.is_empty() {
            bail!("capture tool produced an empty frame");
        }

        info!("Captured frame: {} bytes", data.len());
        Ok(CapturedFrame::jpeg(data))
    }
}

impl Drop for CommandFrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}
