//! Output types and the immutable request handed to the backend.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::{DocumentPayload, RenderableDocument};
use crate::error::Result;

/// Artifact kinds a conversion can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[serde(alias = "BMP")]
    Bmp,
    #[serde(alias = "JPEG", alias = "jpg")]
    Jpeg,
    #[serde(alias = "PNG")]
    Png,
    #[serde(alias = "PPM")]
    Ppm,
    #[serde(alias = "PDF")]
    Pdf,
    /// The assembled HTML itself; written without involving the backend.
    #[serde(alias = "HTML")]
    Html,
}

impl OutputType {
    pub const ALL: [OutputType; 6] = [
        OutputType::Bmp,
        OutputType::Jpeg,
        OutputType::Png,
        OutputType::Ppm,
        OutputType::Pdf,
        OutputType::Html,
    ];

    /// Name passed to the backend as its first argument.
    pub fn backend_name(self) -> &'static str {
        match self {
            OutputType::Bmp => "BMP",
            OutputType::Jpeg => "JPEG",
            OutputType::Png => "PNG",
            OutputType::Ppm => "PPM",
            OutputType::Pdf => "PDF",
            OutputType::Html => "HTML",
        }
    }

    /// Parse a backend type name. Unknown names are rendered as PDF.
    pub fn from_backend_name(name: &str) -> Self {
        match name {
            "BMP" => OutputType::Bmp,
            "JPEG" => OutputType::Jpeg,
            "PNG" => OutputType::Png,
            "PPM" => OutputType::Ppm,
            "HTML" => OutputType::Html,
            _ => OutputType::Pdf,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputType::Bmp => "bmp",
            OutputType::Jpeg => "jpg",
            OutputType::Png => "png",
            OutputType::Ppm => "ppm",
            OutputType::Pdf => "pdf",
            OutputType::Html => "html",
        }
    }

    pub fn is_raster(self) -> bool {
        matches!(
            self,
            OutputType::Bmp | OutputType::Jpeg | OutputType::Png | OutputType::Ppm
        )
    }

    /// `false` for outputs the orchestrator writes itself.
    pub fn needs_backend(self) -> bool {
        self != OutputType::Html
    }

    /// `<dir>/<stem>.<ext>` for this type.
    pub fn destination_in(self, dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{stem}.{}", self.extension()))
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.backend_name())
    }
}

impl FromStr for OutputType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bmp" => Ok(OutputType::Bmp),
            "jpeg" | "jpg" => Ok(OutputType::Jpeg),
            "png" => Ok(OutputType::Png),
            "ppm" => Ok(OutputType::Ppm),
            "pdf" => Ok(OutputType::Pdf),
            "html" | "htm" => Ok(OutputType::Html),
            other => Err(format!("unknown output type {other:?}")),
        }
    }
}

/// One (output type, document, destination) triple.
///
/// The payload is a self-contained snapshot taken at construction, so the
/// request cannot change once dispatched.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    output_type: OutputType,
    payload: DocumentPayload,
    destination: PathBuf,
}

impl RenderRequest {
    /// Snapshot `document` for rendering to `destination`.
    pub fn new(
        output_type: OutputType,
        document: &RenderableDocument,
        destination: impl Into<PathBuf>,
    ) -> Result<Self> {
        Ok(Self::from_payload(
            output_type,
            document.payload()?,
            destination,
        ))
    }

    pub fn from_payload(
        output_type: OutputType,
        payload: DocumentPayload,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            output_type,
            payload,
            destination: destination.into(),
        }
    }

    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    pub fn payload(&self) -> &DocumentPayload {
        &self.payload
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_round_trip() {
        for ty in OutputType::ALL {
            assert_eq!(OutputType::from_backend_name(ty.backend_name()), ty);
        }
        assert_eq!(OutputType::from_backend_name("TIFF"), OutputType::Pdf);
    }

    #[test]
    fn parses_user_spellings() {
        assert_eq!("JPG".parse::<OutputType>(), Ok(OutputType::Jpeg));
        assert_eq!(" pdf ".parse::<OutputType>(), Ok(OutputType::Pdf));
        assert!("docx".parse::<OutputType>().is_err());
        let from_json: Vec<OutputType> = serde_json::from_str(r#"["png","PDF","jpg"]"#).unwrap();
        assert_eq!(from_json, vec![OutputType::Png, OutputType::Pdf, OutputType::Jpeg]);
    }

    #[test]
    fn destinations_use_type_extension() {
        let dir = Path::new("/out");
        assert_eq!(
            OutputType::Jpeg.destination_in(dir, "report"),
            PathBuf::from("/out/report.jpg")
        );
        assert!(OutputType::Ppm.is_raster());
        assert!(!OutputType::Pdf.is_raster());
        assert!(!OutputType::Html.needs_backend());
    }
}
