//! Anchor slugs for heading text.
//!
//! [`slugify`] derives the base slug; [`SlugRegistry`] makes it unique within
//! one document by appending `-0`, `-1`, … on collision.

use std::collections::HashSet;

use deunicode::deunicode_with_tofu;

/// Generate the base slug for `text`.
///
/// Transliterates to ASCII with `deunicode`, lower-cases, and joins the
/// remaining alphanumeric runs with single hyphens. Characters without a
/// transliteration are dropped.
///
/// ```
/// use page_forge::slug::slugify;
///
/// assert_eq!(slugify("Chapter One"), "chapter-one");
/// assert_eq!(slugify("Über Straße"), "uber-strasse");
/// assert_eq!(slugify("Привет мир"), "privet-mir");
/// assert_eq!(slugify("  --Hello,   World!--  "), "hello-world");
/// ```
pub fn slugify(text: &str) -> String {
    deunicode_with_tofu(text, "")
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// The slugs already handed out for one document.
///
/// Append-only for the lifetime of a conversion. Calls must be sequential
/// (single writer); a later call always observes earlier results.
#[derive(Debug, Default, Clone)]
pub struct SlugRegistry {
    used: HashSet<String>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a slug for `text` that has not been used in this document and
    /// record it.
    ///
    /// On collision the base slug gets a zero-based counter suffix
    /// (`intro`, `intro-0`, `intro-1`, …). An empty base slug follows the
    /// same rule, so the second empty heading yields `-0`.
    pub fn create_slug(&mut self, text: &str) -> String {
        let base = slugify(text);
        let mut slug = base.clone();
        let mut counter = 0u32;
        while self.used.contains(&slug) {
            slug = format!("{base}-{counter}");
            counter += 1;
        }
        self.used.insert(slug.clone());
        slug
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.used.contains(slug)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic_shapes() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("hello_world"), "hello-world");
        assert_eq!(slugify("Chapter 1.2"), "chapter-1-2");
        assert_eq!(slugify("-hello-"), "hello");
    }

    #[test]
    fn slugify_transliterates() {
        assert_eq!(slugify("Ærøskøbing"), "aeroskobing");
        assert_eq!(slugify("Größe – Maß"), "grosse-mass");
        assert_eq!(slugify("Crème brûlée"), "creme-brulee");
        assert_eq!(slugify("Łódź"), "lodz");
    }

    #[test]
    fn slugify_transliterates_other_scripts() {
        assert_eq!(slugify("Привет мир"), "privet-mir");
        assert_eq!(slugify("日本語"), "ri-ben-yu");
        assert!(!slugify("Ελληνικά").is_empty());
    }

    #[test]
    fn non_latin_headings_keep_their_own_slugs() {
        let mut registry = SlugRegistry::new();
        let slugs: Vec<String> = ["Привет мир", "Ελληνικά", "日本語"]
            .iter()
            .map(|text| registry.create_slug(text))
            .collect();
        for slug in &slugs {
            assert!(!slug.is_empty() && !slug.starts_with('-'), "{slugs:?}");
        }
        assert_eq!(slugs[0], "privet-mir");
        assert_eq!(slugs[2], "ri-ben-yu");
    }

    #[test]
    fn repeated_text_gets_counter_suffix() {
        let mut registry = SlugRegistry::new();
        assert_eq!(registry.create_slug("Intro"), "intro");
        assert_eq!(registry.create_slug("Intro"), "intro-0");
        assert_eq!(registry.create_slug("intro"), "intro-1");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn suffix_skips_slugs_taken_by_other_headings() {
        let mut registry = SlugRegistry::new();
        assert_eq!(registry.create_slug("Setup 0"), "setup-0");
        assert_eq!(registry.create_slug("Setup"), "setup");
        assert_eq!(registry.create_slug("Setup"), "setup-1");
    }

    #[test]
    fn empty_text_participates_in_collisions() {
        let mut registry = SlugRegistry::new();
        assert_eq!(registry.create_slug(""), "");
        assert_eq!(registry.create_slug("!!!"), "-0");
        assert_eq!(registry.create_slug(""), "-1");
    }

    #[test]
    fn equal_texts_yield_distinct_non_empty_slugs() {
        for text in ["A", "Installation Guide", "Ünïcödé", "x y z"] {
            let mut registry = SlugRegistry::new();
            let first = registry.create_slug(text);
            let second = registry.create_slug(text);
            assert!(!first.is_empty());
            assert_ne!(first, second);
            assert_eq!(second, format!("{first}-0"));
            assert!(registry.contains(&first) && registry.contains(&second));
        }
    }
}
