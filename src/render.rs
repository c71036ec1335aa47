//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use std::collections::{HashMap, HashSet};

use printpdf::*;

use crate::assets::load_image_bytes;
use crate::layout_config::*;

/// Points to millimetres.
const MM_PER_PT: f32 = 0.352778;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a LayoutConfig into PDF bytes.
///
/// Header and footer bands are drawn with the same primitives as the body.
/// Images that cannot be loaded or decoded are skipped with a warning.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>, String> {
    let page_w = Mm(config.page_width_pt * MM_PER_PT);
    let page_h = Mm(config.page_height_pt * MM_PER_PT);

    let mut doc = PdfDocument::new(&config.title);

    // ── Pre-register all images ────────────────────────────────────────────
    let mut all_srcs: HashSet<&str> = HashSet::new();
    for page_layout in &config.pages {
        for lbox in page_layout.all_boxes() {
            lbox.visit(&mut |b| {
                if let Some(img) = &b.image {
                    all_srcs.insert(img.src.as_str());
                }
            });
        }
    }

    let mut image_resources: HashMap<&str, ImageResource> = HashMap::new();
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();
    for src in all_srcs {
        match register_image(&mut doc, src, &mut img_warnings) {
            Ok(resource) => {
                image_resources.insert(src, resource);
            }
            Err(e) => log::warn!("Skipping image: {e}"),
        }
    }

    // ── Render pages ──────────────────────────────────────────────────────
    let mut pages: Vec<PdfPage> = config
        .pages
        .iter()
        .map(|page_layout| {
            let mut ops = Vec::new();
            for lbox in page_layout.all_boxes() {
                render_box(&mut ops, lbox, config.page_height_pt, &image_resources);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();

    // Ensure at least one page.
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    Ok(doc.save(&PdfSaveOptions::default(), &mut Vec::new()))
}

fn register_image(
    doc: &mut PdfDocument,
    src: &str,
    warnings: &mut Vec<PdfWarnMsg>,
) -> Result<ImageResource, String> {
    let bytes = load_image_bytes(src)?;
    // Pixel dimensions come from the `image` crate.
    let decoded = ::image::load_from_memory(&bytes).map_err(|e| format!("decode error: {e}"))?;
    let raw = RawImage::decode_from_bytes(&bytes, warnings)
        .map_err(|e| format!("PDF encode error: {e}"))?;
    Ok(ImageResource {
        xobj_id: doc.add_image(&raw),
        px_width: decoded.width(),
        px_height: decoded.height(),
    })
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{201A}' => 0x82,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99, // trademark
            '\u{00A0}' | '\t' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: intentionally non-UTF-8 for the 0x80-0xFF range; printpdf
    // passes these bytes straight to the PDF stream, decoded by
    // WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

fn rgb(c: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Corners of a rectangle in PDF space (origin bottom-left).
fn corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Vec<LinePoint> {
    vec![point(x1, y1), point(x2, y1), point(x2, y2), point(x1, y2)]
}

fn builtin_font(text: &TextContent) -> BuiltinFont {
    match (text.monospace, text.bold, text.italic) {
        (true, true, true) => BuiltinFont::CourierBoldOblique,
        (true, true, false) => BuiltinFont::CourierBold,
        (true, false, true) => BuiltinFont::CourierOblique,
        (true, false, false) => BuiltinFont::Courier,
        (false, true, true) => BuiltinFont::HelveticaBoldOblique,
        (false, true, false) => BuiltinFont::HelveticaBold,
        (false, false, true) => BuiltinFont::HelveticaOblique,
        (false, false, false) => BuiltinFont::Helvetica,
    }
}

/// Recursively render a LayoutBox and its children into PDF ops.
fn render_box(
    ops: &mut Vec<Op>,
    lbox: &LayoutBox,
    page_height: f32,
    images: &HashMap<&str, ImageResource>,
) {
    // Layout origin is top-left; PDF origin is bottom-left.
    let top = page_height - lbox.y;
    let bottom = top - lbox.height;
    let right = lbox.x + lbox.width;

    if let Some(bg) = lbox.background_color {
        ops.push(Op::SetFillColor { col: rgb(bg) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: corners(lbox.x, bottom, right, top),
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    if let Some(border) = &lbox.border {
        ops.push(Op::SetOutlineColor {
            col: rgb(border.color),
        });
        ops.push(Op::SetOutlineThickness {
            pt: Pt(border.width),
        });
        ops.push(Op::DrawLine {
            line: Line {
                points: corners(lbox.x, bottom, right, top),
                is_closed: true,
            },
        });
    }

    if let Some(text) = &lbox.text {
        let font = builtin_font(text);
        // Baseline ≈ top of line + ascender (0.75 × font size for the
        // builtin faces).
        let ascender = text.font_size * 0.75;

        for tline in text.lines.iter().filter(|l| !l.text.is_empty()) {
            let text_x = lbox.x + tline.x_offset;
            let baseline = top - tline.y_offset - ascender;

            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(text_x),
                    y: Pt(baseline),
                },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(text.font_size),
                font,
            });
            ops.push(Op::SetLineHeight {
                lh: Pt(text.line_height),
            });
            ops.push(Op::SetFillColor {
                col: rgb(text.color),
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(to_winlatin(&tline.text))],
                font,
            });
            ops.push(Op::EndTextSection);

            if text.underline {
                let underline_y = baseline - text.font_size * 0.1;
                ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
                ops.push(Op::SetOutlineColor {
                    col: rgb(text.color),
                });
                ops.push(Op::DrawLine {
                    line: Line {
                        points: vec![
                            point(text_x, underline_y),
                            point(text_x + tline.width, underline_y),
                        ],
                        is_closed: false,
                    },
                });
            }
        }
    }

    if let Some(img) = &lbox.image {
        if let Some(res) = images.get(img.src.as_str()) {
            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale = |target: f32, px: u32| if px > 0 { target / px as f32 } else { 1.0 };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(lbox.x)),
                    translate_y: Some(Pt(page_height - lbox.y - img.height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale(img.width, res.px_width)),
                    scale_y: Some(scale(img.height, res.px_height)),
                    rotate: None,
                },
            });
        }
    }

    for child in &lbox.children {
        render_box(ops, child, page_height, images);
    }
}
