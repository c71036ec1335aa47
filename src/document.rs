//! The document handed to a conversion and the payload it becomes on its way
//! to the backend.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, Result};
use crate::page::PageContext;
use crate::paper::PaperGeometry;
use crate::section::{Edge, Section, SectionSet};
use crate::settings::LayoutSettings;

/// Which headings feed the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TocSettings {
    pub enabled: bool,
    pub min_level: u8,
    pub max_level: u8,
}

impl Default for TocSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            min_level: 1,
            max_level: 3,
        }
    }
}

impl TocSettings {
    pub fn includes(&self, level: u8) -> bool {
        (self.min_level..=self.max_level).contains(&level)
    }
}

/// A fully configured document, owned by one conversion.
#[derive(Debug, Clone)]
pub struct RenderableDocument {
    /// HTML content.
    pub content: String,
    /// Output quality, 0–100.
    pub quality: u8,
    pub paper: LayoutSettings,
    pub header: SectionSet,
    pub footer: SectionSet,
    /// Stylesheet paths; later entries win over earlier ones.
    pub style_sheets: Vec<PathBuf>,
    pub scripts: Vec<PathBuf>,
    pub toc: TocSettings,
}

impl RenderableDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            quality: 90,
            paper: LayoutSettings::default(),
            header: SectionSet::default(),
            footer: SectionSet::default(),
            style_sheets: Vec::new(),
            scripts: Vec::new(),
            toc: TocSettings::default(),
        }
    }

    pub fn sections(&self, edge: Edge) -> &SectionSet {
        match edge {
            Edge::Header => &self.header,
            Edge::Footer => &self.footer,
        }
    }

    /// The header or footer section that applies to the page in `ctx`.
    pub fn resolve(&self, edge: Edge, ctx: PageContext) -> Option<&Section> {
        self.sections(edge).resolve(ctx)
    }

    pub fn geometry(&self) -> PaperGeometry {
        PaperGeometry::compute(&self.paper, &self.header, &self.footer)
    }

    /// The content with stylesheets inlined as `<style>` blocks (in list
    /// order, before `</head>` when there is one) and scripts inlined as
    /// `<script>` blocks (before `</body>` when there is one).
    pub fn assemble_html(&self) -> Result<String> {
        let mut styles = String::new();
        for path in &self.style_sheets {
            let css = read_resource(path)?;
            styles.push_str("<style>\n");
            styles.push_str(&css);
            styles.push_str("\n</style>\n");
        }
        let mut scripts = String::new();
        for path in &self.scripts {
            let js = read_resource(path)?;
            scripts.push_str("<script>\n");
            scripts.push_str(&js);
            scripts.push_str("\n</script>\n");
        }

        let mut html = self.content.clone();
        if !styles.is_empty() {
            let at = find_ascii_ci(&html, "</head>").unwrap_or(0);
            html.insert_str(at, &styles);
        }
        if !scripts.is_empty() {
            let at = find_ascii_ci(&html, "</body>").unwrap_or(html.len());
            html.insert_str(at, &scripts);
        }
        Ok(html)
    }

    /// Self-contained snapshot for the backend.
    pub fn payload(&self) -> Result<DocumentPayload> {
        Ok(DocumentPayload {
            content: self.assemble_html()?,
            quality: self.quality,
            layout: self.paper.clone(),
            header: self.header.default.clone(),
            footer: self.footer.default.clone(),
            even_header: self.header.even.clone(),
            odd_header: self.header.odd.clone(),
            last_header: self.header.last.clone(),
            even_footer: self.footer.even.clone(),
            odd_footer: self.footer.odd.clone(),
            last_footer: self.footer.last.clone(),
            special_headers: self.header.special.clone(),
            special_footers: self.footer.special.clone(),
        })
    }
}

fn read_resource(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| ConversionError::from_io(e, path))
}

/// Byte offset of `needle` (ASCII) in `haystack`, ignoring ASCII case.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}

/// What the backend reads from its payload file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DocumentPayload {
    pub content: String,
    pub quality: u8,
    pub layout: LayoutSettings,
    pub header: Option<Section>,
    pub footer: Option<Section>,
    pub even_header: Option<Section>,
    pub odd_header: Option<Section>,
    pub last_header: Option<Section>,
    pub even_footer: Option<Section>,
    pub odd_footer: Option<Section>,
    pub last_footer: Option<Section>,
    pub special_headers: BTreeMap<u32, Section>,
    pub special_footers: BTreeMap<u32, Section>,
}

impl DocumentPayload {
    pub fn sections(&self, edge: Edge) -> SectionSet {
        match edge {
            Edge::Header => SectionSet {
                default: self.header.clone(),
                even: self.even_header.clone(),
                odd: self.odd_header.clone(),
                last: self.last_header.clone(),
                special: self.special_headers.clone(),
            },
            Edge::Footer => SectionSet {
                default: self.footer.clone(),
                even: self.even_footer.clone(),
                odd: self.odd_footer.clone(),
                last: self.last_footer.clone(),
                special: self.special_footers.clone(),
            },
        }
    }

    pub fn geometry(&self) -> PaperGeometry {
        PaperGeometry::compute(
            &self.layout,
            &self.sections(Edge::Header),
            &self.sections(Edge::Footer),
        )
    }

    pub fn to_json(&self) -> std::result::Result<String, String> {
        serde_json::to_string(self).map_err(|e| e.to_string())
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }

    /// Read a payload file written by the driver.
    pub fn read(path: &Path) -> std::result::Result<Self, String> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("cannot read payload '{}': {e}", path.display()))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::Section;

    fn scratch_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn styles_go_into_head_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = scratch_file(dir.path(), "a.css", "p { color: red }");
        let b = scratch_file(dir.path(), "b.css", "p { color: blue }");
        let js = scratch_file(dir.path(), "x.js", "void 0;");

        let mut doc = RenderableDocument::new(
            "<html><HEAD><title>t</title></HEAD><body><p>x</p></body></html>",
        );
        doc.style_sheets = vec![a, b];
        doc.scripts = vec![js];
        let html = doc.assemble_html().unwrap();

        let red = html.find("color: red").unwrap();
        let blue = html.find("color: blue").unwrap();
        let head_end = html.find("</HEAD>").unwrap();
        assert!(red < blue && blue < head_end);
        let script = html.find("void 0;").unwrap();
        assert!(script > html.find("<p>x</p>").unwrap());
        assert!(script < html.find("</body>").unwrap());
    }

    #[test]
    fn fragments_get_styles_prepended() {
        let dir = tempfile::tempdir().unwrap();
        let css = scratch_file(dir.path(), "s.css", "h1 {}");
        let mut doc = RenderableDocument::new("<h1>Title</h1>");
        doc.style_sheets = vec![css];
        let html = doc.assemble_html().unwrap();
        assert!(html.starts_with("<style>"));
        assert!(html.ends_with("<h1>Title</h1>"));
    }

    #[test]
    fn missing_stylesheet_is_reported_with_its_path() {
        let mut doc = RenderableDocument::new("<p/>");
        doc.style_sheets = vec![PathBuf::from("/definitely/not/here.css")];
        let err = doc.payload().unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.css"), "{err}");
    }

    #[test]
    fn payload_uses_pascal_case_schema() {
        let mut doc = RenderableDocument::new("<p>body</p>");
        doc.header = SectionSet::uniform(Section::new("1cm", "{{PageNumber}}"));
        doc.footer.special.insert(3, Section::new("2cm", "three"));
        doc.footer.last = Some(Section::new("2cm", "last"));

        let json = doc.payload().unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Content"], "<p>body</p>");
        assert_eq!(value["Header"]["Content"], "{{PageNumber}}");
        assert_eq!(value["Header"]["Height"], "1cm");
        assert_eq!(value["SpecialFooters"]["3"]["Content"], "three");
        assert_eq!(value["LastFooter"]["Content"], "last");
        assert!(value["EvenHeader"].is_null());
        assert!(value["Layout"]["Margin"].is_object());

        let back = DocumentPayload::from_json(&json).unwrap();
        assert_eq!(back.sections(Edge::Footer), doc.footer);
        assert_eq!(back.sections(Edge::Header), doc.header);
    }

    #[test]
    fn payload_tolerates_missing_keys() {
        let payload = DocumentPayload::from_json(r#"{"Content":"<p>hi</p>"}"#).unwrap();
        assert_eq!(payload.content, "<p>hi</p>");
        assert!(!payload.sections(Edge::Header).is_configured());
    }

    #[test]
    fn document_resolves_per_edge() {
        let mut doc = RenderableDocument::new("");
        doc.header = SectionSet::uniform(Section::new("1cm", "h"));
        let ctx = PageContext::new(1, 2);
        assert_eq!(doc.resolve(Edge::Header, ctx).map(|s| s.content.as_str()), Some("h"));
        assert!(doc.resolve(Edge::Footer, ctx).is_none());
        assert!(doc.geometry().header.is_some());
        assert!(doc.geometry().footer.is_none());
    }

    #[test]
    fn toc_level_window() {
        let toc = TocSettings::default();
        assert!(toc.includes(1) && toc.includes(3));
        assert!(!toc.includes(4));
    }
}
