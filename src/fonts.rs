//! Font loading and text measurement using `ttf-parser`.
//!
//! PDF output draws with the builtin Helvetica/Courier faces, so layout for
//! it measures with a width heuristic. Raster output needs real outlines: a
//! TrueType face is discovered on the system and used both to measure and to
//! draw, so wrapping matches what ends up in the pixels.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Environment variable naming a TTF/OTF file to use for raster output.
pub const FONT_ENV: &str = "FORGE_FONT";

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    /// Face within a collection file.
    pub face_index: u32,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
    pub line_gap: f32,
}

impl FontData {
    /// Helvetica-like metrics with no outlines.
    fn synthetic() -> Self {
        Self {
            bytes: Vec::new(),
            face_index: 0,
            units_per_em: 1000.0,
            ascender: 750.0,
            descender: -250.0,
            line_gap: 0.0,
        }
    }

    pub fn parse(bytes: Vec<u8>) -> Result<Self, String> {
        Self::parse_face(bytes, 0)
    }

    /// Parse face `face_index` of a font or font collection.
    pub fn parse_face(bytes: Vec<u8>, face_index: u32) -> Result<Self, String> {
        let face = ttf_parser::Face::parse(&bytes, face_index)
            .map_err(|e| format!("Failed to parse font: {e}"))?;
        Ok(Self {
            face_index,
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            line_gap: face.line_gap() as f32,
            bytes,
        })
    }

    pub fn has_outlines(&self) -> bool {
        !self.bytes.is_empty()
    }

    /// The parsed face, or `None` for synthetic metrics.
    pub fn face(&self) -> Option<ttf_parser::Face<'_>> {
        if !self.has_outlines() {
            return None;
        }
        ttf_parser::Face::parse(&self.bytes, self.face_index).ok()
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub bold: bool,
    pub monospace: bool,
}

/// Manages loaded fonts.
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
    /// Used when no face is registered for a key.
    fallback: FontData,
}

impl FontManager {
    /// Heuristic metrics only.
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
            fallback: FontData::synthetic(),
        }
    }

    /// Heuristic metrics plus the best TrueType face found on this system.
    ///
    /// Missing fonts are not an error; raster text is then skipped.
    pub fn with_system_fonts() -> Self {
        let mut mgr = Self::new();
        match discover_system_font() {
            Some(data) => mgr.fallback = data,
            None => log::warn!("No TrueType font found; raster output will have no text"),
        }
        mgr
    }

    /// Load a TTF/OTF font from bytes for one style.
    pub fn load_font(&mut self, key: FontKey, bytes: Vec<u8>) -> Result<(), String> {
        let data = FontData::parse(bytes)?;
        self.fonts.insert(key, data);
        Ok(())
    }

    /// Get font data for a key, falling back to the default face.
    pub fn get(&self, key: FontKey) -> &FontData {
        self.fonts.get(&key).unwrap_or(&self.fallback)
    }

    /// Check if real font bytes are loaded for the default face.
    pub fn has_real_fonts(&self) -> bool {
        self.fallback.has_outlines()
    }

    /// Measure the width of a string at a given font size (pt).
    ///
    /// With font bytes we sum glyph advances. Otherwise an average character
    /// width heuristic applies: 0.5 × size, bold ~10 % wider, monospace 0.6.
    pub fn measure_text_width(&self, text: &str, font_size: f32, key: FontKey) -> f32 {
        let data = self.get(key);
        let heuristic = |count: usize| {
            let avg = if key.monospace {
                0.6
            } else if key.bold {
                0.55
            } else {
                0.5
            };
            count as f32 * font_size * avg
        };

        match data.face() {
            Some(face) => {
                let scale = font_size / data.units_per_em;
                text.chars()
                    .map(|ch| match face.glyph_index(ch) {
                        Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        None => font_size * 0.5,
                    })
                    .sum()
            }
            None => heuristic(text.chars().count()),
        }
    }

    /// Line height in pt.
    pub fn line_height(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }

    /// Ascender in pt for the given style.
    pub fn ascender(&self, font_size: f32, key: FontKey) -> f32 {
        let data = self.get(key);
        data.ascender * font_size / data.units_per_em
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Word-wrap text to fit within `max_width` points. Returns a vec of lines.
///
/// Runs of whitespace collapse to one space; `\n` forces a break. With
/// `preserve` set, lines are kept exactly as written.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    key: FontKey,
    max_width: f32,
    preserve: bool,
    fonts: &FontManager,
) -> Vec<String> {
    if preserve {
        return text
            .trim_matches('\n')
            .split('\n')
            .map(|line| line.trim_end_matches('\r').replace('\t', "    "))
            .collect();
    }
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.trim().to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        for word in &words {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{current_line} {word}")
            };
            let w = fonts.measure_text_width(&candidate, font_size, key);
            if w > max_width && !current_line.is_empty() {
                lines.push(current_line);
                current_line = word.to_string();
            } else {
                current_line = candidate;
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

// ---------------------------------------------------------------------------
// System font discovery
// ---------------------------------------------------------------------------

/// Sans-serif families tried before fontdb's generic fallback, best first.
const PREFERRED_FAMILIES: &[&str] = &[
    "DejaVu Sans",
    "Liberation Sans",
    "Arial",
    "Helvetica",
    "Noto Sans",
    "FreeSans",
    "Roboto",
];

/// `$FORGE_FONT` when it names a loadable font, else the best regular
/// sans-serif face known to the system font database.
pub fn discover_system_font() -> Option<FontData> {
    if let Some(explicit) = std::env::var_os(FONT_ENV) {
        let path = PathBuf::from(explicit);
        match fs::read(&path).map_err(|e| e.to_string()).and_then(FontData::parse) {
            Ok(data) => {
                log::debug!("Using font {} from {FONT_ENV}", path.display());
                return Some(data);
            }
            Err(e) => log::warn!("Ignoring {FONT_ENV}={}: {e}", path.display()),
        }
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    log::debug!("Font database holds {} face(s)", db.len());
    font_from_database(&db)
}

/// Pick a regular, upright sans-serif face from `db` and load it.
///
/// Preferred families come first, then fontdb's sans-serif generic, then any
/// upright proportional face.
pub fn font_from_database(db: &fontdb::Database) -> Option<FontData> {
    let mut families: Vec<fontdb::Family> =
        PREFERRED_FAMILIES.iter().map(|&name| fontdb::Family::Name(name)).collect();
    families.push(fontdb::Family::SansSerif);
    let query = fontdb::Query {
        families: &families,
        weight: fontdb::Weight::NORMAL,
        style: fontdb::Style::Normal,
        stretch: fontdb::Stretch::Normal,
    };

    let id = db.query(&query).or_else(|| {
        db.faces()
            .find(|face| !face.monospaced && face.style == fontdb::Style::Normal)
            .map(|face| face.id)
    })?;

    let family = db
        .face(id)
        .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
        .unwrap_or_default();
    match db.with_face_data(id, |data, index| FontData::parse_face(data.to_vec(), index))? {
        Ok(data) => {
            log::debug!("Using system font {family:?}");
            Some(data)
        }
        Err(e) => {
            log::warn!("Cannot load system font {family:?}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGULAR: FontKey = FontKey {
        bold: false,
        monospace: false,
    };

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        // 5 chars × 16 × 0.5 = 40
        assert!((mgr.measure_text_width("Hello", 16.0, REGULAR) - 40.0).abs() < 0.1);
        let mono = FontKey {
            bold: false,
            monospace: true,
        };
        assert!((mgr.measure_text_width("Hello", 10.0, mono) - 30.0).abs() < 0.1);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::default();
        let lines = wrap_text("Hello world foo bar", 16.0, REGULAR, 60.0, false, &mgr);
        assert!(lines.len() >= 2, "Expected wrapping, got {lines:?}");
        assert!(lines.iter().all(|l| !l.starts_with(' ')));
    }

    #[test]
    fn wrap_collapses_whitespace_and_honours_newlines() {
        let mgr = FontManager::default();
        let lines = wrap_text("  a   b\nc  ", 10.0, REGULAR, 1000.0, false, &mgr);
        assert_eq!(lines, vec!["a b", "c"]);
    }

    #[test]
    fn preserved_text_keeps_spacing() {
        let mgr = FontManager::default();
        let lines = wrap_text("\nfn main() {\n    run();\n}\n", 10.0, REGULAR, 10.0, true, &mgr);
        assert_eq!(lines, vec!["fn main() {", "    run();", "}"]);
    }

    #[test]
    fn empty_font_database_yields_no_face() {
        let db = fontdb::Database::new();
        assert!(font_from_database(&db).is_none());
    }

    #[test]
    fn system_fonts_measure_with_real_advances() {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        // Hosts without any installed fonts have nothing to check.
        let Some(data) = font_from_database(&db) else {
            return;
        };
        let mut mgr = FontManager::new();
        mgr.load_font(REGULAR, data.bytes.clone()).ok();
        assert!(data.face().is_some());
        let narrow = mgr.measure_text_width("iiii", 12.0, REGULAR);
        let wide = mgr.measure_text_width("WWWW", 12.0, REGULAR);
        assert!(narrow > 0.0 && wide > narrow, "{narrow} vs {wide}");
    }

    #[test]
    fn unparseable_font_is_rejected() {
        let mut mgr = FontManager::new();
        assert!(mgr.load_font(REGULAR, vec![0, 1, 2, 3]).is_err());
        assert!(!mgr.has_real_fonts());
    }
}
