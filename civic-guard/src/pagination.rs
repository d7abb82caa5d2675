//! Offset pagination for reporting reads

/// Pagination parameters for limiting query results
///
/// # Example
///
/// ```rust
/// use civic_guard::pagination::Pagination;
///
/// let page3 = Pagination::page(3, 20);
/// assert_eq!(page3.offset, 40);
/// assert_eq!(page3.limit, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of results to skip
    pub offset: u64,
    /// Maximum number of results to return
    pub limit: u64,
}

impl Pagination {
    /// Create new pagination parameters
    #[must_use]
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// First page with the given limit
    #[must_use]
    pub const fn first_page(limit: u64) -> Self {
        Self { offset: 0, limit }
    }

    /// Page `page_number` (1-indexed) of size `page_size`
    #[must_use]
    pub const fn page(page_number: u64, page_size: u64) -> Self {
        let offset = page_number.saturating_sub(1) * page_size;
        Self {
            offset,
            limit: page_size,
        }
    }

    /// Same offset with the limit capped at `max`
    #[must_use]
    pub fn capped(self, max: u64) -> Self {
        Self {
            offset: self.offset,
            limit: self.limit.min(max),
        }
    }

    /// Apply to an already ordered iterator
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(usize::try_from(self.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(self.limit).unwrap_or(usize::MAX))
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
        }
    }
}
