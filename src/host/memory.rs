//! In-memory host: a described page that can be hit-tested, read and
//! screenshotted like a real tab.

use super::{MessagingError, TabId, TabInfo, Tabs, WindowId};
use crate::capture::{encode, to_data_url, CaptureError, TabCapture};
use crate::config::ImageEncoding;
use crate::locator::geometry::{to_physical, Point, Rect, Viewport};
use crate::locator::page::{CanvasReadError, Element, ElementId, ElementKind, Page};
use crate::page_agent::PageEvent;
use crate::protocol::BackgroundCommand;
use image::{DynamicImage, Rgba, RgbaImage};
use serde::Deserialize;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

const DEFAULT_CANVAS_COLOR: [u8; 4] = [128, 128, 128, 255];
const DEFAULT_ELEMENT_COLOR: [u8; 4] = [240, 240, 240, 255];

fn default_background() -> [u8; 4] {
    [255, 255, 255, 255]
}

/// One element of a described page. Bounds are CSS pixels relative to the
/// viewport, as a bounding client rect would report them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageElement {
    pub kind: ElementKind,
    pub bounds: Rect,
    #[serde(default)]
    pub color: Option<[u8; 4]>,
    /// Holds cross-origin pixels; direct reads fail.
    #[serde(default)]
    pub tainted: bool,
}

impl PageElement {
    pub fn canvas(bounds: Rect) -> Self {
        Self {
            kind: ElementKind::Canvas,
            bounds,
            color: None,
            tainted: false,
        }
    }

    pub fn other(tag: &str, bounds: Rect) -> Self {
        Self {
            kind: ElementKind::Other(tag.to_string()),
            bounds,
            color: None,
            tainted: false,
        }
    }

    pub fn with_color(mut self, color: [u8; 4]) -> Self {
        self.color = Some(color);
        self
    }

    pub fn tainted(mut self) -> Self {
        self.tainted = true;
        self
    }

    fn fill(&self) -> Rgba<u8> {
        let default = match self.kind {
            ElementKind::Canvas => DEFAULT_CANVAS_COLOR,
            ElementKind::Other(_) => DEFAULT_ELEMENT_COLOR,
        };
        Rgba(self.color.unwrap_or(default))
    }
}

/// A page described by its viewport and elements in document order.
/// Later elements paint over earlier ones.
#[derive(Debug, Deserialize)]
pub struct MemoryPage {
    viewport: Viewport,
    #[serde(default = "default_background")]
    background: [u8; 4],
    #[serde(default)]
    elements: Vec<PageElement>,
    #[serde(skip)]
    alerts: Mutex<Vec<String>>,
}

impl MemoryPage {
    pub fn new(viewport: Viewport, elements: Vec<PageElement>) -> Self {
        Self {
            viewport,
            background: default_background(),
            elements,
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Alerts shown so far, oldest first.
    pub fn alerts(&self) -> Vec<String> {
        self.alerts
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    fn element(&self, id: ElementId) -> Element {
        let e = &self.elements[id];
        Element {
            id,
            kind: e.kind.clone(),
            bounds: e.bounds,
        }
    }

    /// Paints the visible viewport in device pixels.
    pub fn render(&self) -> RgbaImage {
        let dpr = self.viewport.device_pixel_ratio;
        let width = (self.viewport.width * dpr).round().max(1.0) as u32;
        let height = (self.viewport.height * dpr).round().max(1.0) as u32;
        let mut screen = RgbaImage::from_pixel(width, height, Rgba(self.background));

        for element in &self.elements {
            let Some(visible) = self.viewport.clip(&element.bounds) else {
                continue;
            };
            let area = to_physical(&visible, dpr);
            let x0 = area.x.round() as u32;
            let y0 = area.y.round() as u32;
            let x1 = (area.right().round() as u32).min(width);
            let y1 = (area.bottom().round() as u32).min(height);
            let color = element.fill();
            for y in y0..y1 {
                for x in x0..x1 {
                    screen.put_pixel(x, y, color);
                }
            }
        }

        screen
    }
}

impl Page for MemoryPage {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn canvases(&self) -> Vec<Element> {
        (0..self.elements.len())
            .filter(|&id| self.elements[id].kind == ElementKind::Canvas)
            .map(|id| self.element(id))
            .collect()
    }

    fn element_from_point(&self, point: Point) -> Option<Element> {
        (0..self.elements.len())
            .rev()
            .find(|&id| self.elements[id].bounds.contains(point))
            .map(|id| self.element(id))
    }

    fn canvas_png(&self, id: ElementId) -> Result<Vec<u8>, CanvasReadError> {
        let canvas = self
            .elements
            .get(id)
            .filter(|e| e.kind == ElementKind::Canvas)
            .ok_or(CanvasReadError::UnknownCanvas(id))?;
        if canvas.tainted {
            return Err(CanvasReadError::Tainted(id));
        }

        let width = canvas.bounds.width.round().max(1.0) as u32;
        let height = canvas.bounds.height.round().max(1.0) as u32;
        let pixels = RgbaImage::from_pixel(width, height, canvas.fill());

        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(pixels)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| CanvasReadError::Encoding(e.to_string()))?;
        Ok(bytes)
    }

    fn alert(&self, message: &str) {
        log::info!("[PAGE] alert: {}", message);
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(message.to_string());
        }
    }
}

/// A single-window browser with one tab showing a `MemoryPage`.
#[derive(Clone)]
pub struct MemoryTabs {
    tab: TabInfo,
    page: Arc<MemoryPage>,
    page_events: UnboundedSender<PageEvent>,
}

impl MemoryTabs {
    pub fn new(
        tab: TabInfo,
        page: Arc<MemoryPage>,
        page_events: UnboundedSender<PageEvent>,
    ) -> Self {
        Self {
            tab,
            page,
            page_events,
        }
    }

    pub fn tab(&self) -> TabInfo {
        self.tab
    }
}

impl Tabs for MemoryTabs {
    async fn active_tab(&self) -> Option<TabInfo> {
        Some(self.tab)
    }

    fn send_to_tab(&self, tab: TabId, command: BackgroundCommand) -> Result<(), MessagingError> {
        if tab != self.tab.id {
            return Err(MessagingError::NoReceiver(tab));
        }
        self.page_events
            .send(PageEvent::Command(command))
            .map_err(|_| MessagingError::NoReceiver(tab))
    }
}

impl TabCapture for MemoryTabs {
    async fn capture_visible_tab(
        &self,
        window: WindowId,
        encoding: ImageEncoding,
    ) -> Result<String, CaptureError> {
        if window != self.tab.window_id {
            return Err(CaptureError::CaptureFailed(format!("no window {}", window)));
        }
        let bytes = encode(self.page.render(), encoding)?;
        Ok(to_data_url(&bytes, encoding))
    }
}
