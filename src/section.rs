//! Header and footer sections and the per-page selection rule.
//!
//! A document carries one [`SectionSet`] per [`Edge`]. Each set may hold a
//! generic section, even/odd/last-page variants and an ordered map of
//! page-specific sections. [`SectionSet::resolve`] picks the one that applies
//! to a given page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::page::PageContext;
use crate::units::Length;

/// Height used when a configured section does not name one.
pub const DEFAULT_SECTION_HEIGHT: &str = "1cm";

/// Which page edge a section belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Header,
    Footer,
}

impl Edge {
    pub fn name(self) -> &'static str {
        match self {
            Edge::Header => "header",
            Edge::Footer => "footer",
        }
    }
}

/// A block of markup with the height reserved for it on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Section {
    #[serde(alias = "height", default = "default_height")]
    pub height: Length,
    #[serde(alias = "content", default)]
    pub content: String,
}

fn default_height() -> Length {
    Length::from(DEFAULT_SECTION_HEIGHT)
}

impl Section {
    pub fn new(height: impl Into<Length>, content: impl Into<String>) -> Self {
        Self {
            height: height.into(),
            content: content.into(),
        }
    }
}

/// Every section variant configured for one edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionSet {
    pub default: Option<Section>,
    pub even: Option<Section>,
    pub odd: Option<Section>,
    pub last: Option<Section>,
    /// Page number → section, for pages that override every other rule
    /// except the last-page one.
    pub special: BTreeMap<u32, Section>,
}

impl SectionSet {
    /// A set holding only a generic section.
    pub fn uniform(section: Section) -> Self {
        Self {
            default: Some(section),
            ..Self::default()
        }
    }

    /// `true` if any variant is configured. Backends reserve space for an
    /// edge only when this holds.
    pub fn is_configured(&self) -> bool {
        self.default.is_some()
            || self.even.is_some()
            || self.odd.is_some()
            || self.last.is_some()
            || !self.special.is_empty()
    }

    /// Pick the section for `ctx`.
    ///
    /// Precedence is fixed: last page, then page-specific, then even, then
    /// odd (also taken by an even page without an even variant), then the
    /// generic section.
    pub fn resolve(&self, ctx: PageContext) -> Option<&Section> {
        if ctx.is_last() {
            if let Some(last) = &self.last {
                return Some(last);
            }
        }
        if let Some(special) = self.special.get(&ctx.page_number) {
            return Some(special);
        }
        if ctx.is_even() {
            if let Some(even) = &self.even {
                return Some(even);
            }
        }
        if let Some(odd) = &self.odd {
            return Some(odd);
        }
        self.default.as_ref()
    }

    /// Height to reserve for the edge: the generic section's, or the tallest
    /// variant when no generic section exists.
    pub fn reserved_height(&self) -> Option<Length> {
        if let Some(default) = &self.default {
            return Some(default.height.clone());
        }
        self.variants()
            .max_by(|a, b| a.height.to_points().total_cmp(&b.height.to_points()))
            .map(|s| s.height.clone())
    }

    fn variants(&self) -> impl Iterator<Item = &Section> {
        self.even
            .iter()
            .chain(self.odd.iter())
            .chain(self.last.iter())
            .chain(self.special.values())
    }
}
