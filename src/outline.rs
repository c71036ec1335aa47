//! Heading outline: the entries a table of contents is built from.

use serde::Serialize;

use crate::document::TocSettings;
use crate::dom::{parse_html, walk_elements};
use crate::slug::SlugRegistry;

/// One heading, with the anchor slug it was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    pub level: u8,
    pub text: String,
    pub slug: String,
}

/// Collect the headings of `html` in document order.
///
/// Every heading gets a slug, so anchors stay stable whatever window `toc`
/// selects; only headings inside the window are returned. A disabled table
/// of contents has no entries.
pub fn outline(html: &str, toc: &TocSettings) -> Vec<OutlineEntry> {
    if !toc.enabled {
        return Vec::new();
    }
    let dom = parse_html(html);
    let mut slugs = SlugRegistry::new();
    let mut entries = Vec::new();
    walk_elements(&dom, &mut |el| {
        let Some(level) = el.tag.heading_level() else {
            return;
        };
        let text = el.text_content().split_whitespace().collect::<Vec<_>>().join(" ");
        let slug = slugs.create_slug(&text);
        if toc.includes(level) {
            entries.push(OutlineEntry { level, text, slug });
        }
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> TocSettings {
        TocSettings {
            enabled: true,
            ..TocSettings::default()
        }
    }

    #[test]
    fn headings_in_order_with_unique_slugs() {
        let html = "<h1>Intro</h1><p>x</p><h2>Setup  steps</h2><h2>Intro</h2>";
        let entries = outline(html, &enabled());
        let slugs: Vec<&str> = entries.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, ["intro", "setup-steps", "intro-0"]);
        assert_eq!(entries[1].text, "Setup steps");
        assert_eq!(entries[1].level, 2);
    }

    #[test]
    fn window_filters_but_slugs_still_count() {
        let toc = TocSettings {
            enabled: true,
            min_level: 2,
            max_level: 2,
        };
        let entries = outline("<h1>Same</h1><h3>Deep</h3><h2>Same</h2>", &toc);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].slug, "same-0");
    }

    #[test]
    fn no_headings() {
        assert!(outline("<p>plain</p>", &enabled()).is_empty());
    }

    #[test]
    fn disabled_toc_has_no_entries() {
        assert!(outline("<h1>Intro</h1><h2>More</h2>", &TocSettings::default()).is_empty());
    }
}
