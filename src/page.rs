//! Per-page context handed to header/footer resolution.

/// Position of one laid-out page within its document.
///
/// Produced by the backend for each page it finalises and consumed
/// synchronously for that page only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageContext {
    /// 1-based page number.
    pub page_number: u32,
    /// Total number of pages, never smaller than `page_number`.
    pub page_count: u32,
}

impl PageContext {
    /// Build a context, clamping so `1 <= page_number <= page_count`.
    pub fn new(page_number: u32, page_count: u32) -> Self {
        let page_count = page_count.max(1);
        Self {
            page_number: page_number.clamp(1, page_count),
            page_count,
        }
    }

    pub fn is_last(&self) -> bool {
        self.page_number == self.page_count
    }

    pub fn is_even(&self) -> bool {
        self.page_number % 2 == 0
    }

    /// Contexts for every page of a `page_count`-page document, in order.
    pub fn sequence(page_count: u32) -> impl Iterator<Item = PageContext> {
        (1..=page_count).map(move |n| PageContext::new(n, page_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_into_range() {
        assert_eq!(PageContext::new(0, 3).page_number, 1);
        assert_eq!(PageContext::new(9, 3).page_number, 3);
        assert_eq!(PageContext::new(1, 0).page_count, 1);
    }

    #[test]
    fn sequence_covers_every_page() {
        let pages: Vec<_> = PageContext::sequence(3).collect();
        assert_eq!(pages.len(), 3);
        assert!(!pages[0].is_last());
        assert!(pages[1].is_even());
        assert!(pages[2].is_last());
    }
}
