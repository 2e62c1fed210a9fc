//! Capture coordinator: background-side screenshot, crop, hand-off.
//!
//! Turns a capture request (device-pixel rectangle from the page) into an
//! encoded image blob ready for the download manager. The pure crop lives
//! in `region`, host screenshot plumbing in `screenshot`.

mod region;
mod screenshot;

pub use region::{crop, crop_to_bytes, encode, CropError, PixelRegion};
#[cfg(feature = "desktop-capture")]
pub use screenshot::DesktopCapture;
pub use screenshot::{decode_data_url, to_data_url, CaptureError, TabCapture};

use crate::config::OutputConfig;
use crate::host::WindowId;
use crate::locator::geometry::Rect;
use crate::protocol::Blob;

/// A cropped capture, encoded and named, ready to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct CroppedImage {
    pub blob: Blob,
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

pub struct CaptureCoordinator<C> {
    capture: C,
    config: OutputConfig,
}

impl<C: TabCapture> CaptureCoordinator<C> {
    pub fn new(capture: C, config: OutputConfig) -> Self {
        Self { capture, config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Screenshot the window's visible tab and crop it to `rect`.
    ///
    /// Each step short-circuits on failure; there is no retry.
    pub async fn capture_and_crop(
        &self,
        window: WindowId,
        rect: &Rect,
    ) -> Result<CroppedImage, CaptureError> {
        let start = std::time::Instant::now();
        let region = PixelRegion::from_rect(rect)?;
        let encoding = self.config.encoding;

        let data_url = self.capture.capture_visible_tab(window, encoding).await?;
        let screenshot = decode_data_url(&data_url)?;
        let capture_ms = start.elapsed().as_millis();

        let bytes = crop_to_bytes(&screenshot, region, encoding)?;

        log::info!(
            "[CAPTURE] Cropped {}x{} at {},{} from {}x{} screenshot in {}ms ({}ms capture), {} bytes",
            region.width,
            region.height,
            region.x,
            region.y,
            screenshot.width(),
            screenshot.height(),
            start.elapsed().as_millis(),
            capture_ms,
            bytes.len()
        );

        Ok(CroppedImage {
            blob: Blob::new(encoding.mime_type(), bytes),
            filename: self.config.filename(),
            width: region.width,
            height: region.height,
        })
    }
}
