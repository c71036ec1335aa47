//! Raster renderer – paints a [`LayoutConfig`] with `tiny-skia` and encodes
//! the result as BMP, JPEG, PNG or PPM.
//!
//! All pages go into one image, stacked top to bottom at [`RASTER_DPI`].
//! Text is drawn from the outlines of the system TrueType face held by the
//! [`FontManager`]; without one, text is skipped.

use std::collections::HashMap;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use tiny_skia::{
    FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform,
};

use crate::assets::decode_image;
use crate::fonts::{FontKey, FontManager};
use crate::layout_config::{LayoutBox, LayoutConfig};
use crate::request::OutputType;

/// Output resolution.
pub const RASTER_DPI: f32 = 96.0;

const REGULAR: FontKey = FontKey {
    bold: false,
    monospace: false,
};

/// Paint every page of `config` into one tall image.
pub fn render_raster(config: &LayoutConfig, fonts: &FontManager) -> Result<RgbaImage, String> {
    let scale = RASTER_DPI / 72.0;
    let page_w = (config.page_width_pt * scale).round().max(1.0) as u32;
    let page_h = (config.page_height_pt * scale).round().max(1.0) as u32;
    let page_count = config.pages.len().max(1) as u32;
    let total_h = page_h
        .checked_mul(page_count)
        .ok_or_else(|| format!("{page_count} pages do not fit in one image"))?;

    let mut pixmap = Pixmap::new(page_w, total_h)
        .ok_or_else(|| format!("Cannot allocate a {page_w}×{total_h} raster"))?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let face = fonts.get(REGULAR).face();

    let mut painter = Painter {
        pixmap,
        face,
        scale,
        images: HashMap::new(),
    };
    for (index, page) in config.pages.iter().enumerate() {
        let offset = index as f32 * page_h as f32;
        for lbox in page.all_boxes() {
            painter.paint(lbox, offset);
        }
    }
    to_rgba(&painter.pixmap)
}

/// Encode a rendered image in the format of `output_type`.
///
/// `quality` (0–100) applies to JPEG only.
pub fn encode(image: &RgbaImage, output_type: OutputType, quality: u8) -> Result<Vec<u8>, String> {
    let (width, height) = image.dimensions();
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut out = Vec::new();
    let result = match output_type {
        OutputType::Png => {
            PngEncoder::new(&mut out).write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
        }
        OutputType::Jpeg => JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8),
        OutputType::Bmp => {
            BmpEncoder::new(&mut out).write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        }
        OutputType::Ppm => PnmEncoder::new(&mut out)
            .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Binary))
            .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8),
        other => return Err(format!("{other} is not a raster format")),
    };
    result.map_err(|e| format!("{output_type} encoding failed: {e}"))?;
    Ok(out)
}

struct Painter<'f> {
    pixmap: Pixmap,
    face: Option<ttf_parser::Face<'f>>,
    /// Pixels per point.
    scale: f32,
    /// Decoded images by `src`; `None` marks a source that failed.
    images: HashMap<String, Option<Pixmap>>,
}

impl Painter<'_> {
    fn paint(&mut self, lbox: &LayoutBox, offset_y: f32) {
        let s = self.scale;
        let rect = Rect::from_xywh(
            lbox.x * s,
            offset_y + lbox.y * s,
            (lbox.width * s).max(0.5),
            (lbox.height * s).max(0.5),
        );

        if let (Some(bg), Some(rect)) = (lbox.background_color, rect) {
            self.pixmap
                .fill_rect(rect, &paint_for(bg), Transform::identity(), None);
        }

        if let (Some(border), Some(rect)) = (&lbox.border, rect) {
            let path = PathBuilder::from_rect(rect);
            let stroke = Stroke {
                width: (border.width * s).max(1.0),
                ..Stroke::default()
            };
            self.pixmap.stroke_path(
                &path,
                &paint_for(border.color),
                &stroke,
                Transform::identity(),
                None,
            );
        }

        if let Some(text) = &lbox.text {
            let size = text.font_size * s;
            let ascender = self.ascender(size);
            let paint = paint_for(text.color);
            for line in text.lines.iter().filter(|l| !l.text.is_empty()) {
                let x = (lbox.x + line.x_offset) * s;
                let baseline = offset_y + (lbox.y + line.y_offset) * s + ascender;
                self.draw_text(&line.text, x, baseline, size, text.bold, &paint);
                if text.underline {
                    if let Some(under) =
                        Rect::from_xywh(x, baseline + size * 0.1, line.width * s, (size * 0.05).max(1.0))
                    {
                        self.pixmap.fill_rect(under, &paint, Transform::identity(), None);
                    }
                }
            }
        }

        if let Some(img) = &lbox.image {
            let cached = self
                .images
                .entry(img.src.clone())
                .or_insert_with(|| decode_image(&img.src).and_then(|d| pixmap_from(&d.to_rgba8())));
            if let Some(source) = cached {
                let sx = img.width * s / source.width() as f32;
                let sy = img.height * s / source.height() as f32;
                let transform = Transform::from_row(sx, 0.0, 0.0, sy, lbox.x * s, offset_y + lbox.y * s);
                let paint = PixmapPaint {
                    quality: FilterQuality::Bilinear,
                    ..PixmapPaint::default()
                };
                self.pixmap
                    .draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
            }
        }

        for child in &lbox.children {
            self.paint(child, offset_y);
        }
    }

    fn ascender(&self, size: f32) -> f32 {
        match &self.face {
            Some(face) => face.ascender() as f32 * size / face.units_per_em() as f32,
            None => size * 0.75,
        }
    }

    fn draw_text(&mut self, text: &str, x: f32, baseline: f32, size: f32, bold: bool, paint: &Paint) {
        let Some(face) = &self.face else {
            return;
        };
        let units = size / face.units_per_em() as f32;
        let mut pen = x;
        for ch in text.chars() {
            let Some(glyph) = face.glyph_index(ch) else {
                pen += size * 0.5;
                continue;
            };
            let mut outline = GlyphOutline {
                builder: PathBuilder::new(),
                x: pen,
                y: baseline,
                scale: units,
            };
            face.outline_glyph(glyph, &mut outline);
            if let Some(path) = outline.builder.finish() {
                self.pixmap
                    .fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
                if bold {
                    // Synthetic bold: thicken the outline.
                    let stroke = Stroke {
                        width: size * 0.04,
                        ..Stroke::default()
                    };
                    self.pixmap
                        .stroke_path(&path, paint, &stroke, Transform::identity(), None);
                }
            }
            pen += face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * units;
        }
    }
}

/// Glyph outline in font units, flipped into pixel space at a pen position.
struct GlyphOutline {
    builder: PathBuilder,
    x: f32,
    y: f32,
    scale: f32,
}

impl GlyphOutline {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.x + x * self.scale, self.y - y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for GlyphOutline {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn paint_for(color: [f32; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    paint.set_color_rgba8(
        channel(color[0]),
        channel(color[1]),
        channel(color[2]),
        channel(color[3]),
    );
    paint.anti_alias = true;
    paint
}

fn pixmap_from(rgba: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(rgba.width(), rgba.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

fn to_rgba(pixmap: &Pixmap) -> Result<RgbaImage, String> {
    let mut buf = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        buf.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), buf)
        .ok_or_else(|| "Raster buffer size mismatch".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_config::PageLayout;

    fn two_pages() -> LayoutConfig {
        let mut config = LayoutConfig::new(72.0, 36.0);
        for index in 0..2 {
            let mut page = PageLayout::new(index);
            let mut block = LayoutBox::new(0.0, 0.0, 36.0, 18.0);
            block.background_color = Some([1.0, 0.0, 0.0, 1.0]);
            page.boxes.push(block);
            config.pages.push(page);
        }
        config
    }

    #[test]
    fn pages_are_stacked_vertically() {
        let img = render_raster(&two_pages(), &FontManager::new()).unwrap();
        // 72pt × 36pt at 96 dpi = 96 × 48 px per page.
        assert_eq!(img.dimensions(), (96, 96));
        assert_eq!(img.get_pixel(5, 5).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(5, 53).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(90, 40).0, [255, 255, 255, 255]);
    }

    #[test]
    fn encodes_every_raster_format() {
        let img = render_raster(&two_pages(), &FontManager::new()).unwrap();
        let png = encode(&img, OutputType::Png, 90).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let jpeg = encode(&img, OutputType::Jpeg, 40).unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
        let bmp = encode(&img, OutputType::Bmp, 90).unwrap();
        assert_eq!(&bmp[0..2], b"BM");
        let ppm = encode(&img, OutputType::Ppm, 90).unwrap();
        assert_eq!(&ppm[0..2], b"P6");
        assert!(encode(&img, OutputType::Pdf, 90).is_err());
    }

    #[test]
    fn jpeg_quality_changes_output() {
        let mut config = two_pages();
        config.pages[0].boxes[0].background_color = Some([0.2, 0.6, 0.9, 1.0]);
        let img = render_raster(&config, &FontManager::new()).unwrap();
        let low = encode(&img, OutputType::Jpeg, 5).unwrap();
        let high = encode(&img, OutputType::Jpeg, 100).unwrap();
        assert_ne!(low, high);
    }
}
