//! Layout settings and the converter's configuration file.
//!
//! [`LayoutSettings`] is the per-conversion paper description that travels to
//! the backend (PascalCase keys, camelCase accepted). [`Settings`] is the
//! user-facing JSON configuration (camelCase keys) from which a
//! [`RenderableDocument`] and a [`BackendConfig`] are built.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::document::{RenderableDocument, TocSettings};
use crate::error::{ConversionError, Result};
use crate::protocol::BackendConfig;
use crate::request::OutputType;
use crate::section::{Section, SectionSet, DEFAULT_SECTION_HEIGHT};
use crate::units::Length;

/// Page orientation for named paper formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    #[serde(alias = "Portrait")]
    Portrait,
    #[serde(alias = "Landscape")]
    Landscape,
}

/// Page margins; every edge is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Margin {
    #[serde(alias = "top")]
    pub top: Option<Length>,
    #[serde(alias = "right")]
    pub right: Option<Length>,
    #[serde(alias = "bottom")]
    pub bottom: Option<Length>,
    #[serde(alias = "left")]
    pub left: Option<Length>,
}

impl Margin {
    pub fn uniform(value: impl Into<Length>) -> Self {
        let value = value.into();
        Self {
            top: Some(value.clone()),
            right: Some(value.clone()),
            bottom: Some(value.clone()),
            left: Some(value),
        }
    }

    /// `true` when no edge carries a non-blank value.
    pub fn is_empty(&self) -> bool {
        [&self.top, &self.right, &self.bottom, &self.left]
            .into_iter()
            .all(|edge| edge.as_ref().map_or(true, Length::is_empty))
    }
}

/// Paper description for one conversion.
///
/// A named `format` is authoritative when present; otherwise `width` and
/// `height` are used when both are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LayoutSettings {
    #[serde(alias = "margin")]
    pub margin: Margin,
    #[serde(alias = "format")]
    pub format: Option<String>,
    #[serde(alias = "orientation")]
    pub orientation: Orientation,
    #[serde(alias = "width")]
    pub width: Option<Length>,
    #[serde(alias = "height")]
    pub height: Option<Length>,
}

impl LayoutSettings {
    /// A named format such as `"A4"` with the given orientation.
    pub fn named(format: impl Into<String>, orientation: Orientation) -> Self {
        Self {
            format: Some(format.into()),
            orientation,
            ..Self::default()
        }
    }

    /// Explicit page dimensions.
    pub fn custom(width: impl Into<Length>, height: impl Into<Length>) -> Self {
        Self {
            width: Some(width.into()),
            height: Some(height.into()),
            ..Self::default()
        }
    }

    pub fn with_margin(mut self, margin: Margin) -> Self {
        self.margin = margin;
        self
    }
}

// ---------------------------------------------------------------------------
// Configuration file
// ---------------------------------------------------------------------------

/// Header or footer configuration: an optional generic section plus its
/// variants.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeSettings {
    pub content: Option<String>,
    pub height: Option<Length>,
    pub even: Option<Section>,
    pub odd: Option<Section>,
    pub last: Option<Section>,
    pub special: BTreeMap<u32, Section>,
}

impl EdgeSettings {
    pub fn to_section_set(&self) -> SectionSet {
        let default = self.content.as_ref().map(|content| Section {
            height: self
                .height
                .clone()
                .unwrap_or_else(|| Length::from(DEFAULT_SECTION_HEIGHT)),
            content: content.clone(),
        });
        SectionSet {
            default,
            even: self.even.clone(),
            odd: self.odd.clone(),
            last: self.last.clone(),
            special: self.special.clone(),
        }
    }
}

/// Where the backend lives and how long it may run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    pub program: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            program: None,
            timeout_secs: 60,
        }
    }
}

/// The converter's configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Output types produced when none are requested explicitly.
    pub conversion_types: Vec<OutputType>,
    /// Raster/JPEG quality, 0–100.
    pub conversion_quality: u8,
    pub layout: LayoutSettings,
    /// When `false`, header and footer configuration is ignored entirely.
    pub header_footer_enabled: bool,
    pub header: EdgeSettings,
    pub footer: EdgeSettings,
    /// Stylesheets in precedence order; relative paths resolve against the
    /// document's directory.
    pub style_sheets: Vec<PathBuf>,
    pub scripts: Vec<PathBuf>,
    pub toc: TocSettings,
    pub backend: BackendSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            conversion_types: vec![OutputType::Pdf],
            conversion_quality: 90,
            layout: LayoutSettings::named("A4", Orientation::Portrait)
                .with_margin(Margin::uniform("1cm")),
            header_footer_enabled: true,
            header: EdgeSettings::default(),
            footer: EdgeSettings::default(),
            style_sheets: Vec::new(),
            scripts: Vec::new(),
            toc: TocSettings::default(),
            backend: BackendSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ConversionError::Settings(e.to_string()))
    }

    /// Read a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| ConversionError::from_io(e, path))?;
        let settings = Self::from_json(&json)?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Build the document to render from HTML `content` located in
    /// `document_root`.
    pub fn document(&self, content: impl Into<String>, document_root: &Path) -> RenderableDocument {
        let mut document = RenderableDocument::new(content);
        document.quality = self.conversion_quality.min(100);
        document.paper = self.layout.clone();
        if self.header_footer_enabled {
            document.header = self.header.to_section_set();
            document.footer = self.footer.to_section_set();
        }
        document.style_sheets = resolve_all(&self.style_sheets, document_root);
        document.scripts = resolve_all(&self.scripts, document_root);
        document.toc = self.toc.clone();
        document
    }

    pub fn backend_config(&self) -> BackendConfig {
        let mut config = BackendConfig::default();
        if let Some(program) = &self.backend.program {
            config.program = program.clone();
        }
        config.timeout = Duration::from_secs(self.backend.timeout_secs.max(1));
        config
    }
}

fn resolve_all(paths: &[PathBuf], root: &Path) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|p| if p.is_absolute() { p.clone() } else { root.join(p) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_emptiness_ignores_blank_edges() {
        assert!(Margin::default().is_empty());
        let blank = Margin {
            top: Some(Length::from(" ")),
            ..Margin::default()
        };
        assert!(blank.is_empty());
        let set = Margin {
            left: Some(Length::from("5mm")),
            ..Margin::default()
        };
        assert!(!set.is_empty());
    }

    #[test]
    fn layout_accepts_both_key_casings() {
        let pascal: LayoutSettings = serde_json::from_str(
            r#"{"Margin":{"Top":"1cm"},"Format":"A5","Orientation":"landscape"}"#,
        )
        .unwrap();
        let camel: LayoutSettings = serde_json::from_str(
            r#"{"margin":{"top":"1cm"},"format":"A5","orientation":"Landscape"}"#,
        )
        .unwrap();
        assert_eq!(pascal, camel);
        assert_eq!(pascal.orientation, Orientation::Landscape);
    }

    #[test]
    fn settings_defaults_apply_to_missing_fields() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings.conversion_quality, 90);
        assert_eq!(settings.conversion_types, vec![OutputType::Pdf]);
        assert_eq!(settings.layout.format.as_deref(), Some("A4"));
        assert_eq!(settings.backend.timeout_secs, 60);
    }

    #[test]
    fn settings_build_document_sections() {
        let settings = Settings::from_json(
            r#"{
                "conversionQuality": 75,
                "header": {
                    "content": "<p>{{ PageNumber }}</p>",
                    "height": "15mm",
                    "last": {"content": "end"},
                    "special": {"1": {"content": "cover", "height": "2cm"}}
                },
                "footer": {"even": {"content": "even"}},
                "styleSheets": ["css/site.css", "/abs/print.css"]
            }"#,
        )
        .unwrap();
        let doc = settings.document("<p>x</p>", Path::new("/docs"));
        assert_eq!(doc.quality, 75);
        let header = doc.header.default.as_ref().unwrap();
        assert_eq!(header.height.as_str(), "15mm");
        assert_eq!(doc.header.last.as_ref().unwrap().height.as_str(), DEFAULT_SECTION_HEIGHT);
        assert_eq!(doc.header.special[&1].content, "cover");
        assert!(doc.footer.default.is_none());
        assert!(doc.footer.is_configured());
        assert_eq!(
            doc.style_sheets,
            vec![PathBuf::from("/docs/css/site.css"), PathBuf::from("/abs/print.css")]
        );
    }

    #[test]
    fn disabled_header_footer_drops_sections() {
        let settings = Settings::from_json(
            r#"{"headerFooterEnabled": false, "header": {"content": "x"}}"#,
        )
        .unwrap();
        let doc = settings.document("", Path::new("."));
        assert!(!doc.header.is_configured());
    }

    #[test]
    fn malformed_settings_are_reported() {
        let err = Settings::from_json(r#"{"conversionQuality": "high"}"#).unwrap_err();
        assert!(matches!(err, ConversionError::Settings(_)));
    }

    #[test]
    fn backend_settings_feed_the_driver_config() {
        let settings = Settings::from_json(
            r#"{"backend": {"program": "/opt/forge-backend", "timeoutSecs": 5}}"#,
        )
        .unwrap();
        let config = settings.backend_config();
        assert_eq!(config.program, PathBuf::from("/opt/forge-backend"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
