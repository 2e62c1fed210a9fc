//! Visible-tab screenshots and the data URLs they arrive as.
//!
//! The host hands back the screenshot the way a browser does: an encoded
//! image inside a `data:` URL. Decoding lives here so the coordinator only
//! ever sees a `DynamicImage`.

use crate::config::ImageEncoding;
use crate::host::WindowId;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::DynamicImage;
use regex::Regex;
use std::future::Future;
use std::sync::LazyLock;

static DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:(image/[a-z0-9.+-]+);base64,([A-Za-z0-9+/=\s]*)$").unwrap()
});

/// Host capability: screenshot the visible area of a window's active tab.
pub trait TabCapture {
    fn capture_visible_tab(
        &self,
        window: WindowId,
        encoding: ImageEncoding,
    ) -> impl Future<Output = Result<String, CaptureError>>;
}

/// Wraps encoded image bytes in a base64 `data:` URL.
pub fn to_data_url(bytes: &[u8], encoding: ImageEncoding) -> String {
    format!("data:{};base64,{}", encoding.mime_type(), STANDARD.encode(bytes))
}

/// Decodes a `data:image/...;base64,` URL into pixels.
pub fn decode_data_url(url: &str) -> Result<DynamicImage, CaptureError> {
    let captures = DATA_URL.captures(url).ok_or(CaptureError::MalformedDataUrl)?;
    let mime = &captures[1];
    let payload: String = captures[2].split_whitespace().collect();

    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| CaptureError::Decode(format!("base64: {}", e)))?;

    image::load_from_memory(&bytes)
        .map_err(|e| CaptureError::Decode(format!("{}: {}", mime, e)))
}

/// Screenshots the primary monitor with `xcap`, standing in for the
/// visible tab when the page is shown full screen on the desktop.
#[cfg(feature = "desktop-capture")]
pub struct DesktopCapture;

#[cfg(feature = "desktop-capture")]
impl DesktopCapture {
    fn capture_primary_monitor() -> Result<DynamicImage, CaptureError> {
        use xcap::Monitor;

        let monitors =
            Monitor::all().map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        // Fall back to the first monitor when none reports as primary.
        let index = monitors
            .iter()
            .position(|m| m.is_primary().unwrap_or(false))
            .unwrap_or(0);
        let primary = monitors
            .into_iter()
            .nth(index)
            .ok_or_else(|| CaptureError::CaptureFailed("no monitor found".into()))?;

        let image = primary
            .capture_image()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        Ok(DynamicImage::ImageRgba8(image))
    }
}

#[cfg(feature = "desktop-capture")]
impl TabCapture for DesktopCapture {
    async fn capture_visible_tab(
        &self,
        window: WindowId,
        encoding: ImageEncoding,
    ) -> Result<String, CaptureError> {
        log::debug!("[CAPTURE] Desktop capture for window {}", window);
        let screenshot = Self::capture_primary_monitor()?;

        let rgba = screenshot.to_rgba8();
        let bytes = super::region::encode(rgba, encoding)
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
        Ok(to_data_url(&bytes, encoding))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("Screenshot is not a base64 image data URL")]
    MalformedDataUrl,

    #[error("Screenshot decoding failed: {0}")]
    Decode(String),

    #[error(transparent)]
    Crop(#[from] super::region::CropError),
}
