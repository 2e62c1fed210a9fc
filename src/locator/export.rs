//! Direct export: read every canvas' own pixels instead of screenshotting.
//!
//! Only works for canvases that are not tainted by cross-origin content;
//! tainted ones are reported to the user and skipped.

use super::page::Page;
use crate::protocol::Blob;

const BASE_NAME: &str = "canvas";

#[derive(Debug, Clone, PartialEq)]
pub struct ExportedCanvas {
    pub filename: String,
    pub blob: Blob,
}

/// Exports all canvases as PNG blobs, in document order.
///
/// A single canvas is named `canvas.png`; several are `canvas-1.png`,
/// `canvas-2.png`, ... by document position.
pub fn export_all<P: Page + ?Sized>(page: &P) -> Vec<ExportedCanvas> {
    let canvases = page.canvases();
    if canvases.is_empty() {
        page.alert("No canvas element found on this page!");
        return Vec::new();
    }

    let numbered = canvases.len() > 1;
    let mut exported = Vec::with_capacity(canvases.len());

    for (index, canvas) in canvases.iter().enumerate() {
        let filename = if numbered {
            format!("{}-{}.png", BASE_NAME, index + 1)
        } else {
            format!("{}.png", BASE_NAME)
        };

        match page.canvas_png(canvas.id) {
            Ok(data) => exported.push(ExportedCanvas {
                filename,
                blob: Blob::new("image/png", data),
            }),
            Err(e) => {
                log::warn!("[EXPORT] Skipping {}: {}", filename, e);
                page.alert("Unable to create image data for this canvas.");
            }
        }
    }

    exported
}
