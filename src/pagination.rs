//! Pagination – distributes flowed fragments over pages.
//!
//! Handles:
//! - The content area left between margins and header/footer bands
//! - Page-break-before / page-break-after hints
//! - Vertical space above the first fragment of a continuation page is dropped

use crate::flow::Fragment;
use crate::layout_config::LayoutBox;

/// Slack for float rounding when testing whether a fragment fits.
const FIT_EPSILON: f32 = 0.01;

/// A page-absolute rectangle content is placed into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentArea {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Split `fragments` into pages of `area`. Returns one box list per page,
/// in page-absolute coordinates. There is always at least one page.
///
/// A fragment taller than the area gets a page of its own and overflows it.
pub fn paginate(fragments: Vec<Fragment>, area: &ContentArea) -> Vec<Vec<LayoutBox>> {
    let mut pages: Vec<Vec<LayoutBox>> = Vec::new();
    let mut current: Vec<LayoutBox> = Vec::new();

    // Document-space y at which the current page begins; `None` until the
    // first fragment of a continuation page fixes it.
    let mut page_start: Option<f32> = Some(0.0);

    for fragment in fragments {
        let Fragment {
            mut layout,
            break_before,
            break_after,
        } = fragment;

        if break_before && !current.is_empty() {
            pages.push(std::mem::take(&mut current));
            page_start = None;
        }

        if let Some(start) = page_start {
            let overflows = layout.bottom() - start > area.height + FIT_EPSILON;
            if overflows && !current.is_empty() {
                pages.push(std::mem::take(&mut current));
                page_start = None;
            }
        }

        let start = *page_start.get_or_insert(layout.y);
        layout.translate(area.x, area.y - start);
        current.push(layout);

        if break_after {
            pages.push(std::mem::take(&mut current));
            page_start = None;
        }
    }

    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    log::debug!("Paginated into {} page(s)", pages.len());
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::flow::flow;
    use crate::fonts::FontManager;

    const AREA: ContentArea = ContentArea {
        x: 40.0,
        y: 60.0,
        width: 400.0,
        height: 200.0,
    };

    fn pages_for(html: &str) -> Vec<Vec<LayoutBox>> {
        paginate(flow(&parse_html(html), AREA.width, &FontManager::default()).unwrap(), &AREA)
    }

    #[test]
    fn single_page() {
        let pages = pages_for("<p>Short text</p>");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0][0].x, 40.0);
        // 12pt paragraph margin on the first page.
        assert!((pages[0][0].y - 72.0).abs() < 0.01);
    }

    #[test]
    fn empty_document_has_one_page() {
        let pages = pages_for("");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn multiple_pages_stay_inside_area() {
        let html: String = (0..40).map(|i| format!("<p>Paragraph {i} with some text</p>")).collect();
        let pages = pages_for(&html);
        assert!(pages.len() > 1, "Expected multiple pages, got {}", pages.len());
        for page in &pages[1..] {
            // Continuation pages start at the top of the area.
            assert!((page[0].y - AREA.y).abs() < 0.01);
        }
        for page in &pages {
            for lbox in page {
                assert!(lbox.bottom() <= AREA.y + AREA.height + FIT_EPSILON);
            }
        }
        let total: usize = pages.iter().map(Vec::len).sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn explicit_breaks() {
        let pages = pages_for(
            r#"<p>a</p><p style="page-break-before: always">b</p><p style="page-break-after: always">c</p><p>d</p><p style="page-break-after: always">e</p>"#,
        );
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), 1);
        assert_eq!(pages[1].len(), 2);
        // No trailing blank page after the final break.
        assert_eq!(pages[2].len(), 2);
    }

    #[test]
    fn oversized_fragment_gets_its_own_page() {
        let mut tall = LayoutBox::new(0.0, 0.0, 10.0, 500.0);
        tall.background_color = Some([0.0, 0.0, 0.0, 1.0]);
        let fragments = vec![
            Fragment {
                layout: LayoutBox::new(0.0, 0.0, 10.0, 10.0),
                break_before: false,
                break_after: false,
            },
            Fragment {
                layout: {
                    tall.translate(0.0, 10.0);
                    tall
                },
                break_before: false,
                break_after: false,
            },
        ];
        let pages = paginate(fragments, &AREA);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1][0].y, AREA.y);
    }
}
