//! Page arithmetic for list endpoints (100 rows per page)

use serde::Serialize;

pub const PAGE_SIZE: i64 = 100;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
    #[serde(skip)]
    pub offset: i64,
}

/// Clamp the requested page into [1, total_pages] and compute the offset
///
/// ```
/// use litrev_server::pagination::calculate_pagination;
///
/// let p = calculate_pagination(250, 99);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 200);
/// ```
pub fn calculate_pagination(total: i64, requested_page: i64) -> Pagination {
    let total_pages = (total + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = requested_page.max(1).min(total_pages.max(1));

    Pagination {
        page,
        total_pages,
        total,
        offset: (page - 1) * PAGE_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_page() {
        let p = calculate_pagination(250, 2);
        assert_eq!((p.page, p.total_pages, p.offset), (2, 3, 100));
    }

    #[test]
    fn test_out_of_bounds_pages_are_clamped() {
        assert_eq!(calculate_pagination(150, 0).page, 1);
        assert_eq!(calculate_pagination(150, 99).page, 2);
    }

    #[test]
    fn test_empty_result() {
        let p = calculate_pagination(0, 1);
        assert_eq!((p.page, p.total_pages, p.offset), (1, 0, 0));
    }

    #[test]
    fn test_exact_boundary() {
        let p = calculate_pagination(200, 3);
        assert_eq!((p.page, p.total_pages, p.offset), (2, 2, 100));
    }
}
