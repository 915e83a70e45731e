//! Screen capture boundary: the [`Frame`] type handed through the step loop
//! and the capture trait the engine consumes, plus the xcap-backed
//! implementation used by the CLI.

use std::io::Cursor;

use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::errors::{AgentError, AgentResult};

/// One captured screen bitmap.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbaImage,
}

impl Frame {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// PNG-encode and base64 the frame for vision API payloads.
    pub fn to_png_base64(&self) -> AgentResult<String> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(self.image.clone())
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| AgentError::Capture(format!("PNG encode failed: {e}")))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(&buf))
    }
}

/// Supplies freshly-captured frames to the step loop. Must be callable
/// repeatedly; every call observes the live screen.
pub trait ScreenCapture: Send {
    fn capture(&mut self) -> AgentResult<Frame>;
}

/// Captures the primary monitor via xcap. Stateless; monitors are
/// re-enumerated on every call so display changes are picked up.
pub struct XcapCapture;

impl ScreenCapture for XcapCapture {
    fn capture(&mut self) -> AgentResult<Frame> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| AgentError::Capture(format!("monitor enumeration failed: {e}")))?;
        let monitor = monitors
            .into_iter()
            .reduce(|primary, m| if m.is_primary() { m } else { primary })
            .ok_or_else(|| AgentError::Capture("no monitor found".into()))?;
        let image = monitor
            .capture_image()
            .map_err(|e| AgentError::Capture(format!("screen capture failed: {e}")))?;
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            "screen captured"
        );
        Ok(Frame::new(image))
    }
}
