//! Pure viewport geometry: clipping, centers, device pixel conversion.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned rectangle. Units depend on context: CSS pixels while the
/// page reasons about it, device pixels once converted for capture.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Half-open containment, matching hit testing on the page.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    pub fn scale(&self, factor: f64) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }
}

/// The visible area of the page, in CSS pixels, plus its device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f64,
}

fn default_device_pixel_ratio() -> f64 {
    1.0
}

impl Viewport {
    pub fn new(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    /// True when `rect` shares any area with the viewport.
    pub fn overlaps(&self, rect: &Rect) -> bool {
        rect.right() > 0.0 && rect.bottom() > 0.0 && rect.x < self.width && rect.y < self.height
    }

    /// Clips `rect` to the viewport. `None` when nothing of it is on screen.
    pub fn clip(&self, rect: &Rect) -> Option<Rect> {
        let x = rect.x.max(0.0);
        let y = rect.y.max(0.0);
        let width = rect.right().min(self.width) - x;
        let height = rect.bottom().min(self.height) - y;

        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(Rect::new(x, y, width, height))
    }
}

/// Converts a CSS-pixel rectangle to device pixels; screenshots are taken
/// in device pixels.
pub fn to_physical(rect: &Rect, device_pixel_ratio: f64) -> Rect {
    rect.scale(device_pixel_ratio)
}
