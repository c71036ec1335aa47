//! Style resolver – maps tag defaults and inline `style` declarations to a
//! flat [`ComputedStyle`] consumed by the flow layout.
//!
//! Lengths are resolved to points. CSS pixels are 0.75pt.

use crate::dom::{ElementNode, Tag};
use crate::units::Length;

/// Fully resolved style for a single element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub hidden: bool,

    // Spacing (pt)
    pub margin_top: f32,
    pub margin_bottom: f32,
    /// Extra left indent for this block's content.
    pub indent: f32,
    pub padding: f32,

    // Border
    pub border_width: f32,
    pub border_color: Color,

    // Typography
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub monospace: bool,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub preserve_whitespace: bool,

    pub background_color: Color,

    // Explicit size (pt), used by images
    pub width: Option<f32>,
    pub height: Option<f32>,

    // Page break
    pub page_break_before: bool,
    pub page_break_after: bool,
}

/// 16px, the browser default body size.
pub const DEFAULT_FONT_SIZE_PT: f32 = 12.0;

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            hidden: false,
            margin_top: 0.0,
            margin_bottom: 0.0,
            indent: 0.0,
            padding: 0.0,
            border_width: 0.0,
            border_color: Color::BLACK,
            font_size: DEFAULT_FONT_SIZE_PT,
            bold: false,
            italic: false,
            underline: false,
            monospace: false,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.3,
            preserve_whitespace: false,
            background_color: Color::TRANSPARENT,
            width: None,
            height: None,
            page_break_before: false,
            page_break_after: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
    const LIGHT_GRAY: Self = Self::rgb(0.93, 0.93, 0.93);
    const MID_GRAY: Self = Self::rgb(0.6, 0.6, 0.6);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Hex, `rgb()`/`rgba()` or a basic colour keyword.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if value.starts_with('#') {
            return Self::from_hex(&value);
        }
        if let Some(args) = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<f32> = args
                .split(',')
                .filter_map(|p| p.trim().parse::<f32>().ok())
                .collect();
            return match parts.as_slice() {
                [r, g, b] => Some(Self::rgb(r / 255.0, g / 255.0, b / 255.0)),
                [r, g, b, a] => Some(Self {
                    r: r / 255.0,
                    g: g / 255.0,
                    b: b / 255.0,
                    a: a.clamp(0.0, 1.0),
                }),
                _ => None,
            };
        }
        let named = match value.as_str() {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "transparent" => Self::TRANSPARENT,
            "red" => Self::rgb(1.0, 0.0, 0.0),
            "green" => Self::rgb(0.0, 0.5, 0.0),
            "blue" => Self::rgb(0.0, 0.0, 1.0),
            "gray" | "grey" => Self::rgb(0.5, 0.5, 0.5),
            "silver" => Self::rgb(0.75, 0.75, 0.75),
            "navy" => Self::rgb(0.0, 0.0, 0.5),
            "maroon" => Self::rgb(0.5, 0.0, 0.0),
            "orange" => Self::rgb(1.0, 0.647, 0.0),
            _ => return None,
        };
        Some(named)
    }
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element, inheriting text properties from its parent.
pub fn resolve_style(element: &ElementNode, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut style = ComputedStyle::default();

    if let Some(p) = parent {
        style.font_size = p.font_size;
        style.bold = p.bold;
        style.italic = p.italic;
        style.underline = p.underline;
        style.monospace = p.monospace;
        style.color = p.color;
        style.text_align = p.text_align;
        style.line_height = p.line_height;
        style.preserve_whitespace = p.preserve_whitespace;
    }

    apply_tag_defaults(&mut style, &element.tag);
    if let Some(declarations) = element.inline_style() {
        apply_inline_style(&mut style, declarations);
    }
    for (attr, prop) in [("width", "width"), ("height", "height")] {
        if let Some(value) = element.attr(attr) {
            apply_css_property(&mut style, prop, value);
        }
    }
    style
}

/// Default styles based on tag semantics.
fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    let base = s.font_size;
    match tag {
        Tag::Heading(level) => {
            let scale = match level {
                1 => 2.0,
                2 => 1.5,
                3 => 1.17,
                4 => 1.0,
                5 => 0.83,
                _ => 0.67,
            };
            s.font_size = DEFAULT_FONT_SIZE_PT * scale;
            s.bold = true;
            s.margin_top = s.font_size * 0.67;
            s.margin_bottom = s.font_size * 0.67;
        }
        Tag::P => {
            s.margin_top = base;
            s.margin_bottom = base;
        }
        Tag::Ul | Tag::Ol => {
            s.margin_top = base;
            s.margin_bottom = base;
            s.indent = 30.0;
        }
        Tag::Blockquote => {
            s.margin_top = base;
            s.margin_bottom = base;
            s.indent = 30.0;
            s.border_width = 2.0;
            s.border_color = Color::MID_GRAY;
        }
        Tag::Pre => {
            s.margin_top = base;
            s.margin_bottom = base;
            s.monospace = true;
            s.preserve_whitespace = true;
        }
        Tag::Code => s.monospace = true,
        Tag::Table => {
            s.margin_bottom = base * 0.5;
        }
        Tag::Td | Tag::Th => {
            s.padding = 3.0;
            s.border_width = 0.5;
            s.border_color = Color::MID_GRAY;
            if *tag == Tag::Th {
                s.bold = true;
                s.background_color = Color::LIGHT_GRAY;
            }
        }
        Tag::Hr => {
            s.margin_top = base * 0.5;
            s.margin_bottom = base * 0.5;
            s.border_width = 0.75;
            s.border_color = Color::MID_GRAY;
        }
        Tag::Strong => s.bold = true,
        Tag::Em => s.italic = true,
        Tag::U => s.underline = true,
        Tag::A => {
            s.underline = true;
            s.color = Color::rgb(0.0, 0.0, 0.93);
        }
        tag if tag.is_hidden() => s.hidden = true,
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Inline style parsing (limited subset)
// ---------------------------------------------------------------------------

pub fn apply_inline_style(s: &mut ComputedStyle, style_str: &str) {
    for decl in style_str.split(';') {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let val = val.trim().trim_end_matches("!important").trim();
        if prop.is_empty() || val.is_empty() {
            continue;
        }
        apply_css_property(s, &prop, val);
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    let font_size = s.font_size;
    let length = |v: &str| parse_length_pt(v, font_size);
    match prop {
        "display" => s.hidden = val == "none",
        "visibility" => s.hidden = val == "hidden",
        "font-size" => {
            if let Some(pt) = parse_font_size(val, font_size) {
                s.font_size = pt;
            }
        }
        "font-weight" => {
            s.bold = matches!(val, "bold" | "bolder" | "600" | "700" | "800" | "900");
        }
        "font-style" => s.italic = matches!(val, "italic" | "oblique"),
        "font-family" => {
            let v = val.to_ascii_lowercase();
            s.monospace = v.contains("mono") || v.contains("courier");
        }
        "text-decoration" | "text-decoration-line" => s.underline = val.contains("underline"),
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" | "background" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "white-space" => s.preserve_whitespace = val.starts_with("pre"),
        "width" => s.width = length(val),
        "height" => s.height = length(val),
        "margin" => {
            let parts: Vec<f32> = val.split_whitespace().filter_map(length).collect();
            match parts.as_slice() {
                [all] => {
                    s.margin_top = *all;
                    s.margin_bottom = *all;
                }
                [vertical, _] => {
                    s.margin_top = *vertical;
                    s.margin_bottom = *vertical;
                }
                [top, _, bottom] | [top, _, bottom, _] => {
                    s.margin_top = *top;
                    s.margin_bottom = *bottom;
                }
                _ => {}
            }
        }
        "margin-top" => {
            if let Some(pt) = length(val) {
                s.margin_top = pt;
            }
        }
        "margin-bottom" => {
            if let Some(pt) = length(val) {
                s.margin_bottom = pt;
            }
        }
        "margin-left" | "padding-left" => {
            if let Some(pt) = length(val) {
                s.indent = pt;
            }
        }
        "padding" => {
            if let Some(pt) = val.split_whitespace().next().and_then(length) {
                s.padding = pt;
            }
        }
        "border" | "border-width" => {
            if val == "none" {
                s.border_width = 0.0;
            }
            for part in val.split_whitespace() {
                if let Some(pt) = length(part) {
                    s.border_width = pt;
                } else if let Some(c) = Color::parse(part) {
                    s.border_color = c;
                }
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                s.border_color = c;
            }
        }
        "line-height" => {
            if let Ok(v) = val.parse::<f32>() {
                s.line_height = v;
            } else if let Some(pt) = length(val) {
                s.line_height = pt / s.font_size.max(1.0);
            }
        }
        "page-break-before" | "break-before" => {
            s.page_break_before = matches!(val, "always" | "page");
        }
        "page-break-after" | "break-after" => {
            s.page_break_after = matches!(val, "always" | "page");
        }
        _ => {}
    }
}

/// A CSS length in points. Unitless numbers are CSS pixels.
pub fn parse_length_pt(value: &str, font_size: f32) -> Option<f32> {
    let value = value.trim();
    if let Some(em) = value.strip_suffix("rem") {
        return em.trim().parse::<f32>().ok().map(|v| v * DEFAULT_FONT_SIZE_PT);
    }
    if let Some(em) = value.strip_suffix("em") {
        return em.trim().parse::<f32>().ok().map(|v| v * font_size);
    }
    if value.ends_with('%') {
        return None;
    }
    Length::new(value).try_to_points()
}

fn parse_font_size(value: &str, parent: f32) -> Option<f32> {
    let keyword = match value {
        "xx-small" => 0.6,
        "x-small" => 0.75,
        "small" => 0.89,
        "medium" => 1.0,
        "large" => 1.2,
        "x-large" => 1.5,
        "xx-large" => 2.0,
        "smaller" => return Some(parent * 0.83),
        "larger" => return Some(parent * 1.2),
        _ => {
            if let Some(pct) = value.strip_suffix('%') {
                return pct.trim().parse::<f32>().ok().map(|p| parent * p / 100.0);
            }
            return parse_length_pt(value, parent).filter(|pt| *pt > 0.0);
        }
    };
    Some(DEFAULT_FONT_SIZE_PT * keyword)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_html, DomNode};

    fn first_element(html: &str) -> ElementNode {
        match parse_html(html).into_iter().next() {
            Some(DomNode::Element(e)) => e,
            other => panic!("Expected element, got {other:?}"),
        }
    }

    #[test]
    fn inline_style_font_size() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "font-size: 24px; color: #ff0000");
        assert_eq!(s.font_size, 18.0);
        assert!((s.color.r - 1.0).abs() < 0.01);
        apply_inline_style(&mut s, "font-size: 2em; COLOR: rgb(0, 128, 0) !important");
        assert_eq!(s.font_size, 36.0);
        assert!((s.color.g - 0.502).abs() < 0.01);
    }

    #[test]
    fn color_from_hex() {
        let c = Color::from_hex("#ff8800").unwrap();
        assert!((c.r - 1.0).abs() < 0.01);
        assert!((c.g - 0.533).abs() < 0.01);
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn headings_are_bold_and_scaled() {
        let h1 = resolve_style(&first_element("<h1>x</h1>"), None);
        assert!(h1.bold);
        assert_eq!(h1.font_size, 24.0);
    }

    #[test]
    fn text_properties_inherit() {
        let parent = resolve_style(
            &first_element(r#"<div style="color: navy; text-align: center; margin-top: 20pt">x</div>"#),
            None,
        );
        assert_eq!(parent.margin_top, 20.0);
        let child = resolve_style(&first_element("<span>y</span>"), Some(&parent));
        assert_eq!(child.text_align, TextAlign::Center);
        assert_eq!(child.color, Color::rgb(0.0, 0.0, 0.5));
        assert_eq!(child.margin_top, 0.0);
    }

    #[test]
    fn page_breaks_and_display() {
        let s = resolve_style(
            &first_element(r#"<div style="page-break-after: always; display: none"></div>"#),
            None,
        );
        assert!(s.page_break_after && s.hidden);
        assert!(resolve_style(&first_element("<script></script>"), None).hidden);
    }

    #[test]
    fn lengths_resolve_to_points() {
        assert_eq!(parse_length_pt("10px", 12.0), Some(7.5));
        assert_eq!(parse_length_pt("1in", 12.0), Some(72.0));
        assert_eq!(parse_length_pt("1.5em", 10.0), Some(15.0));
        assert_eq!(parse_length_pt("50%", 10.0), None);
    }
}
