//! Pure region cropping logic: functional core.
//!
//! Takes a decoded screenshot and a device-pixel rectangle, returns the
//! encoded bytes of exactly that rectangle. No scaling.

use crate::config::ImageEncoding;
use crate::locator::geometry::Rect;
use image::{imageops, DynamicImage, RgbaImage};
use std::io::Cursor;

/// A crop rectangle snapped to whole device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRegion {
    /// Snaps a device-pixel rectangle to whole pixels.
    ///
    /// Edges are rounded, not sizes, so the region covers the same pixels
    /// the page painted for it at fractional device pixel ratios.
    pub fn from_rect(rect: &Rect) -> Result<Self, CropError> {
        let fields = [rect.x, rect.y, rect.width, rect.height, rect.right(), rect.bottom()];
        if fields.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > u32::MAX as f64) {
            return Err(CropError::InvalidRegion(*rect));
        }

        let (x0, x1) = (rect.x.round(), rect.right().round());
        let (y0, y1) = (rect.y.round(), rect.bottom().round());
        let region = Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        };
        if region.width == 0 || region.height == 0 {
            return Err(CropError::ZeroDimension);
        }
        Ok(region)
    }
}

/// Copies `region` of `image` onto a fresh `width × height` surface.
///
/// The surface always has the requested size. Any part of the region that
/// lies outside the screenshot stays transparent.
pub fn crop(image: &DynamicImage, region: PixelRegion) -> Result<RgbaImage, CropError> {
    if region.width == 0 || region.height == 0 {
        return Err(CropError::ZeroDimension);
    }

    let mut surface = RgbaImage::new(region.width, region.height);

    let available_w = image.width().saturating_sub(region.x).min(region.width);
    let available_h = image.height().saturating_sub(region.y).min(region.height);
    if available_w > 0 && available_h > 0 {
        let source = image
            .crop_imm(region.x, region.y, available_w, available_h)
            .to_rgba8();
        imageops::replace(&mut surface, &source, 0, 0);
    } else {
        log::warn!(
            "[CAPTURE] Region {:?} lies outside the {}x{} screenshot",
            region,
            image.width(),
            image.height()
        );
    }

    Ok(surface)
}

/// Encodes a surface in the configured format. JPEG has no alpha channel,
/// so it is flattened to RGB first.
pub fn encode(surface: RgbaImage, encoding: ImageEncoding) -> Result<Vec<u8>, CropError> {
    let image = match encoding {
        ImageEncoding::Png => DynamicImage::ImageRgba8(surface),
        ImageEncoding::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(surface).to_rgb8()),
    };

    let mut bytes: Vec<u8> = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), encoding.image_format())
        .map_err(|e| CropError::EncodingFailed(e.to_string()))?;

    Ok(bytes)
}

/// Crop then encode; the whole functional core of a capture.
pub fn crop_to_bytes(
    image: &DynamicImage,
    region: PixelRegion,
    encoding: ImageEncoding,
) -> Result<Vec<u8>, CropError> {
    let surface = crop(image, region)?;
    encode(surface, encoding)
}

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("Crop rectangle has zero width or height")]
    ZeroDimension,

    #[error("Crop rectangle {0:?} is not a valid device-pixel region")]
    InvalidRegion(Rect),

    #[error("Image encoding failed: {0}")]
    EncodingFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Every pixel encodes its own coordinates.
    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([x as u8, y as u8, (x + y) as u8, 255])
        }))
    }

    fn region(x: u32, y: u32, width: u32, height: u32) -> PixelRegion {
        PixelRegion {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn crop_matches_source_sub_region_pixel_for_pixel() {
        let img = gradient(120, 90);
        let out = crop(&img, region(30, 20, 50, 40)).unwrap();
        assert_eq!(out.dimensions(), (50, 40));
        let src = img.to_rgba8();
        for (x, y, px) in out.enumerate_pixels() {
            assert_eq!(px, src.get_pixel(x + 30, y + 20));
        }
    }

    #[test]
    fn crop_past_the_edge_keeps_size_and_leaves_transparency() {
        let img = gradient(100, 100);
        let out = crop(&img, region(80, 90, 30, 20)).unwrap();
        assert_eq!(out.dimensions(), (30, 20));
        assert_eq!(out.get_pixel(0, 0), &Rgba([80, 90, 170, 255]));
        assert_eq!(out.get_pixel(25, 5), &Rgba([0, 0, 0, 0]));
        assert_eq!(out.get_pixel(5, 15), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn crop_zero_dimension_fails() {
        let img = gradient(100, 100);
        let result = crop(&img, region(0, 0, 0, 50));
        assert!(matches!(result, Err(CropError::ZeroDimension)));
    }

    #[test]
    fn region_from_rect_rounds_and_rejects_garbage() {
        let r = PixelRegion::from_rect(&Rect::new(10.4, 20.6, 199.5, 150.0)).unwrap();
        assert_eq!(r, region(10, 21, 200, 150));
        assert!(matches!(
            PixelRegion::from_rect(&Rect::new(-1.0, 0.0, 10.0, 10.0)),
            Err(CropError::InvalidRegion(_))
        ));
        assert!(matches!(
            PixelRegion::from_rect(&Rect::new(0.0, f64::NAN, 10.0, 10.0)),
            Err(CropError::InvalidRegion(_))
        ));
        assert!(matches!(
            PixelRegion::from_rect(&Rect::new(0.0, 0.0, 0.2, 10.0)),
            Err(CropError::ZeroDimension)
        ));
    }

    #[test]
    fn fractional_rect_snaps_edges_not_sizes() {
        // 1,1,11,11 CSS px at a 1.5 ratio.
        let r = PixelRegion::from_rect(&Rect::new(1.5, 1.5, 16.5, 16.5)).unwrap();
        assert_eq!(r, region(2, 2, 16, 16));

        let r = PixelRegion::from_rect(&Rect::new(12.5, 0.0, 25.0, 12.5)).unwrap();
        assert_eq!(r, region(13, 0, 25, 13));
    }

    #[test]
    fn fractional_crop_has_no_neighbouring_pixels() {
        let canvas = Rgba([255, 0, 0, 255]);
        // What a 1.5 ratio page paints for a canvas at 1,1 of 11x11 CSS px.
        let screen = DynamicImage::ImageRgba8(RgbaImage::from_fn(40, 40, |x, y| {
            if (2..18).contains(&x) && (2..18).contains(&y) {
                canvas
            } else {
                Rgba([255, 255, 255, 255])
            }
        }));
        let r = PixelRegion::from_rect(&Rect::new(1.5, 1.5, 16.5, 16.5)).unwrap();
        let out = crop(&screen, r).unwrap();
        assert_eq!(out.dimensions(), (16, 16));
        assert_eq!(out.pixels().filter(|p| **p != canvas).count(), 0);
    }

    #[test]
    fn png_and_jpeg_encodings_have_their_magic_bytes() {
        let img = gradient(40, 40);
        let png = crop_to_bytes(&img, region(0, 0, 16, 16), ImageEncoding::Png).unwrap();
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);

        let jpeg = crop_to_bytes(&img, region(0, 0, 16, 16), ImageEncoding::Jpeg).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}
