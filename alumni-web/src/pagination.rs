//! Pagination utilities for the directory listing

/// Page size used when the configured value is unusable
pub const DEFAULT_PAGE_SIZE: i64 = 24;

/// Largest page size a config may request
pub const MAX_PAGE_SIZE: i64 = 200;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Rows per page
    pub page_size: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Calculate pagination metadata from total results and requested page
///
/// Ensures page is within valid bounds [1, total_pages]. Page size outside
/// `1..=MAX_PAGE_SIZE` falls back to [`DEFAULT_PAGE_SIZE`].
///
/// # Examples
/// ```
/// use alumni_web::pagination::calculate_pagination;
///
/// // 60 results at 24 per page = 3 pages (24 + 24 + 12)
/// let p = calculate_pagination(60, 2, 24);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 24);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(60, 99, 24);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 48);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, page_size: i64) -> Pagination {
    let page_size = if (1..=MAX_PAGE_SIZE).contains(&page_size) {
        page_size
    } else {
        DEFAULT_PAGE_SIZE
    };
    let total_results = total_results.max(0);
    let total_pages = (total_results + page_size - 1) / page_size;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * page_size;

    Pagination {
        page,
        total_pages,
        page_size,
        offset,
    }
}
