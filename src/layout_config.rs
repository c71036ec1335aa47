//! Layout config – the intermediate representation between layout computation
//! and the PDF/raster renderers. This is the "frozen" structure that encodes
//! exactly what goes on each page, including its header and footer bands.

use serde::{Deserialize, Serialize};

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    #[serde(default = "LayoutConfig::default_title")]
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in PDF points.
    pub page_height_pt: f32,
    /// Ordered list of pages.
    pub pages: Vec<PageLayout>,
}

/// One page of content. All boxes carry page-absolute coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
    #[serde(default)]
    pub header: Vec<LayoutBox>,
    #[serde(default)]
    pub footer: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to page top-left, in points.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    /// Visual styling
    pub background_color: Option<[f32; 4]>,
    pub border: Option<BorderStyle>,

    /// Content (mutually exclusive in practice)
    pub text: Option<TextContent>,
    pub image: Option<ImageContent>,

    /// Children (nested boxes), also page-absolute.
    pub children: Vec<LayoutBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    /// Pre-wrapped, pre-aligned lines of text.
    pub lines: Vec<TextLine>,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    pub color: [f32; 4],
    pub line_height: f32,
    pub underline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// X offset within the layout box (for alignment)
    pub x_offset: f32,
    /// Y offset from the top of the box
    pub y_offset: f32,
    /// Measured width, used for underlines
    pub width: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    pub src: String,
    pub width: f32,
    pub height: f32,
}

impl LayoutConfig {
    /// An empty layout with the given page size.
    pub fn new(page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: Self::default_title(),
            page_width_pt,
            page_height_pt,
            pages: Vec::new(),
        }
    }

    fn default_title() -> String {
        "page-forge output".to_string()
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }
}

impl PageLayout {
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            ..Self::default()
        }
    }

    pub fn body_text(&self) -> String {
        text_of(&self.boxes)
    }

    pub fn header_text(&self) -> String {
        text_of(&self.header)
    }

    pub fn footer_text(&self) -> String {
        text_of(&self.footer)
    }

    /// Boxes in paint order: header, body, footer.
    pub fn all_boxes(&self) -> impl Iterator<Item = &LayoutBox> {
        self.header.iter().chain(&self.boxes).chain(&self.footer)
    }
}

/// Text lines of a box list in paint order, one per line.
pub fn text_of(boxes: &[LayoutBox]) -> String {
    let mut lines = Vec::new();
    for lbox in boxes {
        lbox.visit(&mut |b| {
            if let Some(text) = &b.text {
                lines.extend(text.lines.iter().map(|l| l.text.clone()));
            }
        });
    }
    lines.join("\n")
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            text: None,
            image: None,
            children: Vec::new(),
        }
    }

    /// Shift this box and its children by `(dx, dy)`.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
        for child in &mut self.children {
            child.translate(dx, dy);
        }
    }

    /// Visit this box and then its descendants.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a LayoutBox)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_box(y: f32, line: &str) -> LayoutBox {
        let mut b = LayoutBox::new(0.0, y, 100.0, 10.0);
        b.text = Some(TextContent {
            lines: vec![TextLine {
                text: line.to_string(),
                x_offset: 0.0,
                y_offset: 0.0,
                width: 10.0,
            }],
            font_size: 10.0,
            bold: false,
            italic: false,
            monospace: false,
            color: [0.0, 0.0, 0.0, 1.0],
            line_height: 10.0,
            underline: false,
        });
        b
    }

    #[test]
    fn translate_moves_children() {
        let mut parent = LayoutBox::new(10.0, 10.0, 50.0, 50.0);
        parent.children.push(text_box(20.0, "x"));
        parent.translate(5.0, 100.0);
        assert_eq!((parent.x, parent.y), (15.0, 110.0));
        assert_eq!(parent.children[0].y, 120.0);
    }

    #[test]
    fn page_text_by_band() {
        let mut page = PageLayout::new(0);
        page.header.push(text_box(0.0, "head"));
        let mut row = LayoutBox::new(0.0, 20.0, 100.0, 10.0);
        row.children.push(text_box(20.0, "a"));
        row.children.push(text_box(20.0, "b"));
        page.boxes.push(row);
        assert_eq!(page.header_text(), "head");
        assert_eq!(page.body_text(), "a\nb");
        assert_eq!(page.footer_text(), "");
        assert_eq!(page.all_boxes().count(), 2);
    }

    #[test]
    fn json_round_trip_keeps_bands() {
        let mut config = LayoutConfig::new(200.0, 300.0);
        let mut page = PageLayout::new(0);
        page.footer.push(text_box(290.0, "1/1"));
        config.pages.push(page);
        let back = LayoutConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back.pages[0].footer_text(), "1/1");
        assert_eq!(back.title, "page-forge output");
    }
}
