//! Image sources: `data:` URIs and local files.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

/// Raw bytes behind an `<img src>`.
///
/// Accepts base64 `data:` URIs, `file://` URLs and plain filesystem paths.
pub fn load_image_bytes(src: &str) -> Result<Vec<u8>, String> {
    if src.starts_with("data:") {
        return parse_data_uri(src);
    }
    let path = src.strip_prefix("file://").unwrap_or(src);
    if path.contains("://") {
        return Err(format!("Remote images are not fetched: {}", preview(src)));
    }
    std::fs::read(Path::new(path)).map_err(|e| format!("Cannot read image {path:?}: {e}"))
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
pub fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| format!("Not a data URI: {}", preview(src)))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or("Invalid data URI: missing `,` separator between header and data")?;
    if !header.contains(";base64") {
        return Err("Only base64-encoded data URIs are supported".to_string());
    }
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_STD
        .decode(compact)
        .map_err(|e| format!("Base64 decode error: {e}"))
}

/// Decoded image for `src`, or `None` (with a warning) when it cannot be used.
pub fn decode_image(src: &str) -> Option<image::DynamicImage> {
    let bytes = match load_image_bytes(src) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Skipping image: {e}");
            return None;
        }
    };
    match image::load_from_memory(&bytes) {
        Ok(img) => Some(img),
        Err(e) => {
            log::warn!("Skipping image {}: decode error: {e}", preview(src));
            None
        }
    }
}

fn preview(src: &str) -> &str {
    match src.char_indices().nth(60) {
        Some((i, _)) => &src[..i],
        None => src,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A 2×1 PNG as a data URI.
    pub(crate) fn tiny_png_uri() -> String {
        let img = image::RgbaImage::from_pixel(2, 1, image::Rgba([255, 0, 0, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", BASE64_STD.encode(bytes))
    }

    #[test]
    fn data_uri_decodes() {
        let img = decode_image(&tiny_png_uri()).unwrap();
        assert_eq!((img.width(), img.height()), (2, 1));
    }

    #[test]
    fn malformed_sources_are_rejected() {
        assert!(parse_data_uri("data:image/png,abc").is_err());
        assert!(parse_data_uri("data:image/png;base64").is_err());
        assert!(load_image_bytes("https://example.com/a.png").is_err());
        assert!(decode_image("/no/such/image.png").is_none());
    }
}
