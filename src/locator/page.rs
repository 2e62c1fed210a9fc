//! The page-side view the locator works against.
//!
//! Mirrors the handful of DOM facilities the content context needs:
//! viewport metrics, canvas enumeration, hit testing, direct canvas reads,
//! and a blocking alert.

use super::geometry::{Point, Rect, Viewport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Document-order index of an element.
pub type ElementId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Canvas,
    /// Any other element, by tag name.
    Other(String),
}

/// An element with its bounding client rect (CSS px, viewport-relative).
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub bounds: Rect,
}

impl Element {
    pub fn is_canvas(&self) -> bool {
        self.kind == ElementKind::Canvas
    }
}

pub trait Page {
    fn viewport(&self) -> Viewport;

    /// All canvas elements, in document order.
    fn canvases(&self) -> Vec<Element>;

    /// Topmost element at `point`, if any.
    fn element_from_point(&self, point: Point) -> Option<Element>;

    /// Reads a canvas' own pixels as PNG. Fails for tainted canvases.
    fn canvas_png(&self, id: ElementId) -> Result<Vec<u8>, CanvasReadError>;

    /// Shows a blocking notice to the user.
    fn alert(&self, message: &str);
}

impl<P: Page + ?Sized> Page for Arc<P> {
    fn viewport(&self) -> Viewport {
        (**self).viewport()
    }

    fn canvases(&self) -> Vec<Element> {
        (**self).canvases()
    }

    fn element_from_point(&self, point: Point) -> Option<Element> {
        (**self).element_from_point(point)
    }

    fn canvas_png(&self, id: ElementId) -> Result<Vec<u8>, CanvasReadError> {
        (**self).canvas_png(id)
    }

    fn alert(&self, message: &str) {
        (**self).alert(message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CanvasReadError {
    #[error("Canvas {0} is tainted by cross-origin data")]
    Tainted(ElementId),

    #[error("No canvas with id {0}")]
    UnknownCanvas(ElementId),

    #[error("Canvas encoding failed: {0}")]
    Encoding(String),
}
