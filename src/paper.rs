//! Paper geometry: which page size, margins and header/footer bands the
//! backend should use for a document.

use crate::section::SectionSet;
use crate::settings::{LayoutSettings, Orientation};
use crate::units::Length;

/// A4 portrait in points; the size used when nothing bounds the page.
pub const DEFAULT_PAGE_SIZE_PT: (f32, f32) = (595.28, 841.89);

/// Named paper sizes in portrait points.
pub fn named_size_pt(format: &str) -> Option<(f32, f32)> {
    let size = match format.trim().to_ascii_lowercase().as_str() {
        "a3" => (841.89, 1190.55),
        "a4" => (595.28, 841.89),
        "a5" => (419.53, 595.28),
        "legal" => (612.0, 1008.0),
        "letter" => (612.0, 792.0),
        "tabloid" => (792.0, 1224.0),
        _ => return None,
    };
    Some(size)
}

/// Margin part of the geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum MarginGeometry {
    /// No margin configured at all: the zero sentinel.
    None,
    /// All four edges, unset ones filled with zero.
    Edges {
        top: Length,
        right: Length,
        bottom: Length,
        left: Length,
    },
}

/// Page-size part of the geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum PageSize {
    Named {
        format: String,
        orientation: Orientation,
    },
    Explicit {
        width: Length,
        height: Length,
    },
    /// Nothing configured; the backend chooses.
    Default,
}

/// Height reserved for a header or footer band.
#[derive(Debug, Clone, PartialEq)]
pub struct BandGeometry {
    pub height: Length,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaperGeometry {
    pub margin: MarginGeometry,
    pub size: PageSize,
    pub header: Option<BandGeometry>,
    pub footer: Option<BandGeometry>,
}

impl PaperGeometry {
    /// Derive the geometry for `layout`.
    ///
    /// Header/footer bands are present only for edges with at least one
    /// configured variant. Partial configuration never fails; it degrades to
    /// defaults.
    pub fn compute(layout: &LayoutSettings, header: &SectionSet, footer: &SectionSet) -> Self {
        let margin = if layout.margin.is_empty() {
            MarginGeometry::None
        } else {
            let edge = |value: &Option<Length>| {
                value
                    .as_ref()
                    .filter(|l| !l.is_empty())
                    .cloned()
                    .unwrap_or_else(Length::zero)
            };
            MarginGeometry::Edges {
                top: edge(&layout.margin.top),
                right: edge(&layout.margin.right),
                bottom: edge(&layout.margin.bottom),
                left: edge(&layout.margin.left),
            }
        };

        let format = layout.format.as_deref().map(str::trim).filter(|f| !f.is_empty());
        let width = layout.width.as_ref().filter(|l| !l.is_empty());
        let height = layout.height.as_ref().filter(|l| !l.is_empty());
        let size = match (format, width, height) {
            (Some(format), _, _) => PageSize::Named {
                format: format.to_string(),
                orientation: layout.orientation,
            },
            (None, Some(width), Some(height)) => PageSize::Explicit {
                width: width.clone(),
                height: height.clone(),
            },
            _ => PageSize::Default,
        };

        let band = |set: &SectionSet| {
            if !set.is_configured() {
                return None;
            }
            let height = set.reserved_height().unwrap_or_else(Length::zero);
            Some(BandGeometry { height })
        };

        let geometry = Self {
            margin,
            size,
            header: band(header),
            footer: band(footer),
        };
        log::debug!("Paper geometry: {geometry:?}");
        geometry
    }

    /// Page width and height in points.
    pub fn page_size_pt(&self) -> (f32, f32) {
        match &self.size {
            PageSize::Named {
                format,
                orientation,
            } => {
                let (w, h) = named_size_pt(format).unwrap_or_else(|| {
                    log::warn!("Unknown paper format {format:?}; using A4");
                    DEFAULT_PAGE_SIZE_PT
                });
                match orientation {
                    Orientation::Portrait => (w, h),
                    Orientation::Landscape => (h, w),
                }
            }
            PageSize::Explicit { width, height } => {
                let (w, h) = (width.to_points(), height.to_points());
                if w <= 0.0 || h <= 0.0 {
                    log::warn!("Unusable page size {width} × {height}; using A4");
                    DEFAULT_PAGE_SIZE_PT
                } else {
                    (w, h)
                }
            }
            PageSize::Default => DEFAULT_PAGE_SIZE_PT,
        }
    }

    /// Margins in points as `[top, right, bottom, left]`.
    pub fn margins_pt(&self) -> [f32; 4] {
        match &self.margin {
            MarginGeometry::None => [0.0; 4],
            MarginGeometry::Edges {
                top,
                right,
                bottom,
                left,
            } => [
                top.to_points(),
                right.to_points(),
                bottom.to_points(),
                left.to_points(),
            ],
        }
    }

    pub fn header_height_pt(&self) -> f32 {
        self.header.as_ref().map_or(0.0, |b| b.height.to_points())
    }

    pub fn footer_height_pt(&self) -> f32 {
        self.footer.as_ref().map_or(0.0, |b| b.height.to_points())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::Section;
    use crate::settings::Margin;

    fn none() -> SectionSet {
        SectionSet::default()
    }

    #[test]
    fn empty_margin_is_zero_sentinel() {
        let geometry = PaperGeometry::compute(&LayoutSettings::default(), &none(), &none());
        assert_eq!(geometry.margin, MarginGeometry::None);
        assert_eq!(geometry.margins_pt(), [0.0; 4]);
        assert_eq!(geometry.size, PageSize::Default);
        assert_eq!(geometry.page_size_pt(), DEFAULT_PAGE_SIZE_PT);
    }

    #[test]
    fn partial_margin_fills_every_edge() {
        let layout = LayoutSettings::default().with_margin(Margin {
            top: Some("1in".into()),
            left: Some("".into()),
            ..Margin::default()
        });
        let geometry = PaperGeometry::compute(&layout, &none(), &none());
        assert_eq!(
            geometry.margin,
            MarginGeometry::Edges {
                top: "1in".into(),
                right: Length::zero(),
                bottom: Length::zero(),
                left: Length::zero(),
            }
        );
        assert_eq!(geometry.margins_pt(), [72.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn format_takes_precedence_over_dimensions() {
        let mut layout = LayoutSettings::custom("10cm", "10cm");
        layout.format = Some("A4".into());
        let geometry = PaperGeometry::compute(&layout, &none(), &none());
        assert_eq!(
            geometry.size,
            PageSize::Named {
                format: "A4".into(),
                orientation: Orientation::Portrait
            }
        );
        assert_eq!(geometry.page_size_pt(), (595.28, 841.89));
    }

    #[test]
    fn explicit_dimensions_need_both_sides() {
        let both = PaperGeometry::compute(&LayoutSettings::custom("4in", "6in"), &none(), &none());
        assert_eq!(both.page_size_pt(), (288.0, 432.0));

        let mut only_width = LayoutSettings::default();
        only_width.width = Some("4in".into());
        let geometry = PaperGeometry::compute(&only_width, &none(), &none());
        assert_eq!(geometry.size, PageSize::Default);
    }

    #[test]
    fn landscape_swaps_named_size() {
        let layout = LayoutSettings::named("letter", Orientation::Landscape);
        let geometry = PaperGeometry::compute(&layout, &none(), &none());
        assert_eq!(geometry.page_size_pt(), (792.0, 612.0));
    }

    #[test]
    fn unknown_format_degrades_to_default_size() {
        let layout = LayoutSettings::named("Folio-ish", Orientation::Portrait);
        let geometry = PaperGeometry::compute(&layout, &none(), &none());
        assert_eq!(geometry.page_size_pt(), DEFAULT_PAGE_SIZE_PT);
    }

    #[test]
    fn bands_follow_configured_variants() {
        let header = SectionSet::uniform(Section::new("2cm", "h"));
        let footer = SectionSet {
            last: Some(Section::new("1in", "f")),
            ..SectionSet::default()
        };
        let geometry = PaperGeometry::compute(&LayoutSettings::default(), &header, &footer);
        assert_eq!(geometry.header, Some(BandGeometry { height: "2cm".into() }));
        assert!((geometry.footer_height_pt() - 72.0).abs() < 0.01);

        let bare = PaperGeometry::compute(&LayoutSettings::default(), &none(), &none());
        assert!(bare.header.is_none() && bare.footer.is_none());
        assert_eq!(bare.header_height_pt(), 0.0);
    }
}
