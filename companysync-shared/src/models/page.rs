/// Page-number pagination shared by every list endpoint
///
/// Pages are 1-based. `per_page` is clamped to `1..=MAX_PER_PAGE`, so a
/// caller can never request an unbounded result set.

use serde::{Deserialize, Serialize};

/// Default page size
pub const DEFAULT_PER_PAGE: i64 = 20;

/// Largest page size a caller may request
pub const MAX_PER_PAGE: i64 = 100;

/// Validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: i64,
    per_page: i64,
}

impl Pagination {
    /// Builds a page request from optional query parameters
    ///
    /// Missing or out-of-range values fall back to page 1 and the default
    /// page size; oversized pages are clamped to [`MAX_PER_PAGE`].
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let per_page = per_page
            .filter(|n| *n >= 1)
            .unwrap_or(DEFAULT_PER_PAGE)
            .min(MAX_PER_PAGE);

        Self { page, per_page }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    /// SQL `LIMIT`
    pub fn limit(&self) -> i64 {
        self.per_page
    }

    /// SQL `OFFSET`
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the size of the full result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Rows matching the filter, independent of the requested page
    pub total: i64,

    pub page: i64,

    pub per_page: i64,

    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let per_page = pagination.per_page();
        let total_pages = if total == 0 { 0 } else { (total + per_page - 1) / per_page };

        Self {
            items,
            total,
            page: pagination.page(),
            per_page,
            total_pages,
        }
    }
}

/// Escapes `%`, `_` and `\` and wraps the term for a substring `ILIKE`
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
