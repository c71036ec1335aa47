//! The render backend: one payload in, one artifact out.
//!
//! Layout runs in two phases. The body is flowed and paginated first, which
//! fixes the page count. Then each page's header and footer are resolved,
//! prefixed with the document's own style markup, filled in with the page
//! number and count, and laid out into their bands.

use std::fs;
use std::path::{Path, PathBuf};

use crate::document::DocumentPayload;
use crate::dom::{body_children, document_title, parse_html, style_markup};
use crate::flow::flow;
use crate::fonts::FontManager;
use crate::layout_config::{LayoutBox, LayoutConfig, PageLayout};
use crate::page::PageContext;
use crate::pagination::{paginate, ContentArea};
use crate::placeholder::substitute;
use crate::raster::{encode, render_raster};
use crate::render::render_pdf;
use crate::request::OutputType;
use crate::section::{Edge, SectionSet};

/// Smallest usable content extent, so degenerate geometry still lays out.
const MIN_EXTENT_PT: f32 = 1.0;

/// Lay out `payload` into pages.
pub fn layout_document(payload: &DocumentPayload, fonts: &FontManager) -> Result<LayoutConfig, String> {
    let geometry = payload.geometry();
    let (page_width, page_height) = geometry.page_size_pt();
    let [top, right, bottom, left] = geometry.margins_pt();
    let header_height = geometry.header_height_pt();
    let footer_height = geometry.footer_height_pt();
    let content_width = (page_width - left - right).max(MIN_EXTENT_PT);

    let body_area = ContentArea {
        x: left,
        y: top + header_height,
        width: content_width,
        height: (page_height - top - bottom - header_height - footer_height).max(MIN_EXTENT_PT),
    };
    let header_area = ContentArea {
        x: left,
        y: top,
        width: content_width,
        height: header_height,
    };
    let footer_area = ContentArea {
        x: left,
        y: page_height - bottom - footer_height,
        width: content_width,
        height: footer_height,
    };
    log::debug!("Page {page_width}×{page_height}pt, body area {body_area:?}");

    let dom = parse_html(&payload.content);
    let mut config = LayoutConfig::new(page_width, page_height);
    if let Some(title) = document_title(&dom) {
        config.title = title;
    }

    let pages = paginate(flow(&body_children(&dom), content_width, fonts)?, &body_area);
    let page_count = pages.len() as u32;

    let styles = style_markup(&payload.content);
    let headers = payload.sections(Edge::Header);
    let footers = payload.sections(Edge::Footer);

    for (index, boxes) in pages.into_iter().enumerate() {
        let ctx = PageContext::new(index as u32 + 1, page_count);
        let mut page = PageLayout::new(index);
        page.boxes = boxes;
        if geometry.header.is_some() {
            page.header = band(&headers, Edge::Header, ctx, &styles, &header_area, fonts)?;
        }
        if geometry.footer.is_some() {
            page.footer = band(&footers, Edge::Footer, ctx, &styles, &footer_area, fonts)?;
        }
        config.pages.push(page);
    }
    Ok(config)
}

/// Lay out the section that applies to `ctx` into `area`, dropping whatever
/// does not fit the band.
fn band(
    sections: &SectionSet,
    edge: Edge,
    ctx: PageContext,
    styles: &str,
    area: &ContentArea,
    fonts: &FontManager,
) -> Result<Vec<LayoutBox>, String> {
    let Some(section) = sections.resolve(ctx) else {
        return Ok(Vec::new());
    };
    let markup = substitute(&format!("{styles}{}", section.content), ctx);
    let fragments = flow(&body_children(&parse_html(&markup)), area.width, fonts)?;

    // Leading margin of the first block does not count against the band.
    let lead = fragments.first().map_or(0.0, |f| f.layout.y);
    let mut boxes = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let mut lbox = fragment.layout;
        lbox.translate(0.0, -lead);
        if lbox.bottom() > area.height + 0.01 {
            log::debug!(
                "Page {}: {} clipped at {}pt",
                ctx.page_number,
                edge.name(),
                area.height
            );
            break;
        }
        lbox.translate(area.x, area.y);
        boxes.push(lbox);
    }
    Ok(boxes)
}

/// Render `payload` as `output_type` and return the artifact bytes.
pub fn render_document(payload: &DocumentPayload, output_type: OutputType) -> Result<Vec<u8>, String> {
    match output_type {
        OutputType::Html => Ok(payload.content.clone().into_bytes()),
        OutputType::Pdf => {
            let layout = layout_document(payload, &FontManager::new())?;
            log::debug!("Rendering {} page(s) to PDF", layout.pages.len());
            render_pdf(&layout)
        }
        raster => {
            // Measure with the face that will draw the glyphs.
            let fonts = FontManager::with_system_fonts();
            let layout = layout_document(payload, &fonts)?;
            log::debug!("Rendering {} page(s) to {raster}", layout.pages.len());
            let image = render_raster(&layout, &fonts)?;
            encode(&image, raster, payload.quality)
        }
    }
}

/// Backend entry point: read the payload at `payload_path`, render it as
/// `type_name` and write the artifact to `destination`.
///
/// Unknown type names render as PDF.
pub fn run(type_name: &str, payload_path: &Path, destination: &Path) -> Result<PathBuf, String> {
    let output_type = OutputType::from_backend_name(type_name);
    let payload = DocumentPayload::read(payload_path)?;
    let bytes = render_document(&payload, output_type)?;
    fs::write(destination, bytes)
        .map_err(|e| format!("cannot write '{}': {e}", destination.display()))?;
    log::info!("Rendered {output_type} to {}", destination.display());
    Ok(destination.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::Section;
    use crate::settings::{LayoutSettings, Margin, Orientation};

    fn payload(content: &str) -> DocumentPayload {
        DocumentPayload {
            content: content.to_string(),
            quality: 90,
            layout: LayoutSettings::named("A4", Orientation::Portrait).with_margin(Margin::uniform("1cm")),
            ..DocumentPayload::default()
        }
    }

    fn long_body(paragraphs: usize) -> String {
        (0..paragraphs).map(|i| format!("<p>Paragraph {i}</p>")).collect()
    }

    #[test]
    fn footer_counts_pages() {
        let mut payload = payload(&long_body(80));
        payload.footer = Some(Section::new("1cm", "{{PageNumber}}/{{PageCount}}"));
        let layout = layout_document(&payload, &FontManager::new()).unwrap();
        let count = layout.pages.len();
        assert!(count >= 2);
        for (i, page) in layout.pages.iter().enumerate() {
            assert_eq!(page.footer_text(), format!("{}/{count}", i + 1));
            assert!(page.header.is_empty());
        }
    }

    #[test]
    fn variants_apply_per_page() {
        let mut payload = payload(&long_body(120));
        payload.header = Some(Section::new("1cm", "generic"));
        payload.odd_header = Some(Section::new("1cm", "odd"));
        payload.last_header = Some(Section::new("1cm", "last"));
        payload.special_headers.insert(1, Section::new("1cm", "cover"));
        let layout = layout_document(&payload, &FontManager::new()).unwrap();
        let texts: Vec<String> = layout.pages.iter().map(PageLayout::header_text).collect();
        let n = texts.len();
        assert!(n >= 3, "{n} pages");
        assert_eq!(texts[0], "cover");
        // No even variant: even pages fall through to odd.
        assert_eq!(texts[1], "odd");
        assert_eq!(texts[n - 1], "last");
    }

    #[test]
    fn bands_shrink_the_body_area() {
        let body = long_body(120);
        let plain = layout_document(&payload(&body), &FontManager::new()).unwrap();
        let mut banded = payload(&body);
        banded.header = Some(Section::new("3cm", "h"));
        banded.footer = Some(Section::new("3cm", "f"));
        let banded = layout_document(&banded, &FontManager::new()).unwrap();
        assert!(banded.pages.len() > plain.pages.len());

        let header_bottom = 28.35 + 85.04;
        let first = &banded.pages[0].boxes[0];
        assert!(first.y >= header_bottom - 0.1);
        let footer = &banded.pages[0].footer[0];
        assert!(footer.y >= 841.89 - 28.35 - 85.04 - 0.1);
    }

    #[test]
    fn band_content_is_clipped_and_styled() {
        let mut payload = payload("<head><style>p{}</style></head><p>body</p>");
        payload.header = Some(Section::new("20pt", "<div>one</div><div>two</div><div>three</div>"));
        let layout = layout_document(&payload, &FontManager::new()).unwrap();
        assert_eq!(layout.pages[0].header_text(), "one");
    }

    #[test]
    fn title_comes_from_document() {
        let layout = layout_document(&payload("<title>Quarterly</title><p>x</p>"), &FontManager::new()).unwrap();
        assert_eq!(layout.title, "Quarterly");
        assert_eq!(layout.pages.len(), 1);
    }

    #[test]
    fn run_writes_pdf_for_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let payload_path = dir.path().join("payload.json");
        fs::write(&payload_path, payload("<p>x</p>").to_json().unwrap()).unwrap();
        let dest = dir.path().join("out.bin");
        let written = run("TIFF", &payload_path, &dest).unwrap();
        assert_eq!(written, dest);
        assert_eq!(&fs::read(&dest).unwrap()[0..5], b"%PDF-");
    }

    #[test]
    fn run_reports_unreadable_payload() {
        let dir = tempfile::tempdir().unwrap();
        let err = run("PDF", &dir.path().join("missing.json"), &dir.path().join("x.pdf")).unwrap_err();
        assert!(err.contains("missing.json"), "{err}");
    }
}
