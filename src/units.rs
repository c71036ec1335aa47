//! Distances with units, as they appear in layout settings and section
//! heights (`"1cm"`, `"10mm"`, `"0.5in"`, `"12pt"`, `"40px"`, `"40"`).
//!
//! Values keep their original spelling so the backend payload carries exactly
//! what the author configured; conversion to PDF points happens on demand.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Points per inch (PDF user space).
pub const PT_PER_INCH: f32 = 72.0;
/// CSS reference pixels per inch.
pub const PX_PER_INCH: f32 = 96.0;

/// A distance-with-unit string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Length(String);

impl Length {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The zero distance emitted for unset margin edges.
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A blank string counts as "not configured".
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Parse into points. Returns `None` for blank or malformed input.
    pub fn try_to_points(&self) -> Option<f32> {
        let s = self.0.trim();
        if s.is_empty() {
            return None;
        }
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
            .unwrap_or(s.len());
        let (number, unit) = s.split_at(split);
        let value: f32 = number.parse().ok()?;
        let per_unit = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "px" => PT_PER_INCH / PX_PER_INCH,
            "pt" => 1.0,
            "in" => PT_PER_INCH,
            "cm" => PT_PER_INCH / 2.54,
            "mm" => PT_PER_INCH / 25.4,
            _ => return None,
        };
        Some(value * per_unit)
    }

    /// Points, degrading to zero (with a warning) for malformed input.
    pub fn to_points(&self) -> f32 {
        match self.try_to_points() {
            Some(pt) => pt,
            None => {
                if !self.is_empty() {
                    log::warn!("Ignoring malformed length {:?}; using 0", self.0);
                }
                0.0
            }
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Length {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Length {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Points → device pixels at the given resolution.
pub fn pt_to_px(pt: f32, dpi: f32) -> f32 {
    pt * dpi / PT_PER_INCH
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn units_convert_to_points() {
        assert!(approx(Length::from("1in").to_points(), 72.0));
        assert!(approx(Length::from("2.54cm").to_points(), 72.0));
        assert!(approx(Length::from("25.4mm").to_points(), 72.0));
        assert!(approx(Length::from("96px").to_points(), 72.0));
        assert!(approx(Length::from("96").to_points(), 72.0));
        assert!(approx(Length::from("12pt").to_points(), 12.0));
        assert!(approx(Length::from(" 1 IN ").to_points(), 72.0));
    }

    #[test]
    fn blank_and_malformed_degrade_to_zero() {
        assert!(Length::from("  ").is_empty());
        assert_eq!(Length::from("").try_to_points(), None);
        assert_eq!(Length::from("wide").try_to_points(), None);
        assert_eq!(Length::from("3furlongs").try_to_points(), None);
        assert_eq!(Length::from("3furlongs").to_points(), 0.0);
    }

    #[test]
    fn serialises_as_plain_string() {
        let json = serde_json::to_string(&Length::from("1cm")).unwrap();
        assert_eq!(json, "\"1cm\"");
        let back: Length = serde_json::from_str("\"5mm\"").unwrap();
        assert_eq!(back.as_str(), "5mm");
    }
}
