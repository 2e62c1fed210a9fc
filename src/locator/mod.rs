//! Canvas locator: page-side target resolution.
//!
//! Works out which canvas the user means and where it sits on screen, in
//! device pixels, right before the capture is requested. Nothing here
//! holds pixels; the background does the cropping.

mod export;
pub mod geometry;
pub mod page;

pub use export::{export_all, ExportedCanvas};

use crate::protocol::SelectionMode;
use geometry::{to_physical, Point, Rect};
use page::{Element, Page};

/// Last pointer position seen on the page, fed by pointer-move events.
#[derive(Debug, Default, Clone, Copy)]
pub struct PointerTracker {
    last: Option<Point>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_pointer_move(&mut self, position: Point) {
        self.last = Some(position);
    }

    pub fn position(&self) -> Option<Point> {
        self.last
    }
}

/// Resolves the element the user means. Cursor mode may return a
/// non-canvas element; `locate` treats that as not found.
pub fn resolve_target<P: Page + ?Sized>(
    page: &P,
    mode: SelectionMode,
    pointer: Option<Point>,
) -> Result<Element, LocateError> {
    match mode {
        SelectionMode::Cursor => {
            let point = pointer.ok_or(LocateError::NoCanvasUnderCursor)?;
            page.element_from_point(point)
                .ok_or(LocateError::NoCanvasUnderCursor)
        }
        SelectionMode::Auto => nearest_canvas(page),
    }
}

fn nearest_canvas<P: Page + ?Sized>(page: &P) -> Result<Element, LocateError> {
    let mut canvases = page.canvases();
    match canvases.len() {
        0 => return Err(LocateError::NoCanvas),
        1 => return Ok(canvases.remove(0)),
        _ => {}
    }

    let viewport = page.viewport();
    let center = viewport.center();
    let mut best: Option<(f64, Element)> = None;

    for canvas in canvases {
        if !viewport.overlaps(&canvas.bounds) {
            continue;
        }
        let distance = canvas.bounds.center().distance_to(center);
        // Strict comparison: the earlier canvas wins a tie.
        if best.as_ref().map_or(true, |(d, _)| distance < *d) {
            best = Some((distance, canvas));
        }
    }

    best.map(|(_, canvas)| canvas).ok_or(LocateError::NoCanvas)
}

/// Clips an element's bounds to the viewport and converts to device pixels.
pub fn visible_rect<P: Page + ?Sized>(page: &P, element: &Element) -> Result<Rect, LocateError> {
    let viewport = page.viewport();
    let clipped = viewport
        .clip(&element.bounds)
        .ok_or(LocateError::NotVisible)?;
    Ok(to_physical(&clipped, viewport.device_pixel_ratio))
}

/// Full page-side step: resolve the target and produce the capture
/// rectangle (device px) to send to the background.
pub fn locate<P: Page + ?Sized>(
    page: &P,
    mode: SelectionMode,
    pointer: Option<Point>,
) -> Result<Rect, LocateError> {
    let target = resolve_target(page, mode, pointer)?;
    if !target.is_canvas() {
        return Err(LocateError::NoCanvasUnderCursor);
    }

    let rect = visible_rect(page, &target)?;
    log::debug!(
        "[LOCATE] {:?} → canvas #{} at {:?} (device px)",
        mode,
        target.id,
        rect
    );
    Ok(rect)
}

/// Locator failures. The `Display` text is what the user sees in the alert.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocateError {
    #[error("No canvas element found on this page!")]
    NoCanvas,

    #[error("No canvas element under the cursor!")]
    NoCanvasUnderCursor,

    #[error("The canvas is not visible in the current viewport.")]
    NotVisible,
}

impl LocateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LocateError::NoCanvas | LocateError::NoCanvasUnderCursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryPage, PageElement};
    use super::geometry::Viewport;

    fn page(elements: Vec<PageElement>) -> MemoryPage {
        MemoryPage::new(Viewport::new(1000.0, 800.0, 1.0), elements)
    }

    #[test]
    fn single_canvas_is_selected_wherever_it_is() {
        let p = page(vec![PageElement::canvas(Rect::new(5000.0, 5000.0, 10.0, 10.0))]);
        let target = resolve_target(&p, SelectionMode::Auto, None).unwrap();
        assert_eq!(target.id, 0);
        // ...but it still cannot be captured while off screen.
        assert_eq!(
            locate(&p, SelectionMode::Auto, None),
            Err(LocateError::NotVisible)
        );
    }

    #[test]
    fn no_canvas_is_not_found() {
        let p = page(vec![PageElement::other("div", Rect::new(0.0, 0.0, 100.0, 100.0))]);
        let err = locate(&p, SelectionMode::Auto, None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn nearest_to_viewport_center_wins() {
        // Viewport center is (500, 400).
        let p = page(vec![
            PageElement::canvas(Rect::new(0.0, 0.0, 100.0, 100.0)),
            PageElement::canvas(Rect::new(410.0, 300.0, 200.0, 200.0)),
            PageElement::canvas(Rect::new(800.0, 600.0, 100.0, 100.0)),
        ]);
        let target = resolve_target(&p, SelectionMode::Auto, None).unwrap();
        assert_eq!(target.id, 1);
    }

    #[test]
    fn tie_goes_to_document_order() {
        // Both centers are 100px from (500, 400).
        let p = page(vec![
            PageElement::canvas(Rect::new(350.0, 350.0, 100.0, 100.0)),
            PageElement::canvas(Rect::new(550.0, 350.0, 100.0, 100.0)),
        ]);
        assert_eq!(resolve_target(&p, SelectionMode::Auto, None).unwrap().id, 0);
    }

    #[test]
    fn offscreen_canvases_are_not_candidates() {
        let p = page(vec![
            PageElement::canvas(Rect::new(450.0, 1200.0, 100.0, 100.0)),
            PageElement::canvas(Rect::new(0.0, 0.0, 50.0, 50.0)),
        ]);
        assert_eq!(resolve_target(&p, SelectionMode::Auto, None).unwrap().id, 1);

        let all_offscreen = page(vec![
            PageElement::canvas(Rect::new(0.0, -500.0, 100.0, 100.0)),
            PageElement::canvas(Rect::new(2000.0, 0.0, 100.0, 100.0)),
        ]);
        assert_eq!(
            locate(&all_offscreen, SelectionMode::Auto, None),
            Err(LocateError::NoCanvas)
        );
    }

    #[test]
    fn cursor_mode_uses_topmost_element() {
        let p = page(vec![
            PageElement::canvas(Rect::new(0.0, 0.0, 300.0, 300.0)),
            PageElement::other("div", Rect::new(100.0, 100.0, 50.0, 50.0)),
        ]);
        let on_canvas = locate(&p, SelectionMode::Cursor, Some(Point::new(20.0, 20.0)));
        assert_eq!(on_canvas, Ok(Rect::new(0.0, 0.0, 300.0, 300.0)));

        let on_overlay = locate(&p, SelectionMode::Cursor, Some(Point::new(120.0, 120.0)));
        assert_eq!(on_overlay, Err(LocateError::NoCanvasUnderCursor));
    }

    #[test]
    fn cursor_mode_without_pointer_is_not_found() {
        let p = page(vec![PageElement::canvas(Rect::new(0.0, 0.0, 300.0, 300.0))]);
        assert_eq!(
            locate(&p, SelectionMode::Cursor, None),
            Err(LocateError::NoCanvasUnderCursor)
        );
    }

    #[test]
    fn rect_is_clipped_then_scaled_by_device_pixel_ratio() {
        let p = MemoryPage::new(
            Viewport::new(400.0, 300.0, 2.0),
            vec![PageElement::canvas(Rect::new(-10.0, 250.0, 100.0, 100.0))],
        );
        let rect = locate(&p, SelectionMode::Auto, None).unwrap();
        assert_eq!(rect, Rect::new(0.0, 500.0, 180.0, 100.0));
    }

    #[test]
    fn pointer_tracker_keeps_latest_position() {
        let mut tracker = PointerTracker::new();
        assert_eq!(tracker.position(), None);
        tracker.on_pointer_move(Point::new(1.0, 2.0));
        tracker.on_pointer_move(Point::new(3.0, 4.0));
        assert_eq!(tracker.position(), Some(Point::new(3.0, 4.0)));
    }
}
