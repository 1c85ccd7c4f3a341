//! One page of records plus the metadata a table needs to render pager controls

use serde::{Deserialize, Serialize};

/// A page of records with totals and the sort/filter actually applied
///
/// # Example
///
/// ```rust
/// use worldcities_server::paging::PageResult;
///
/// let page = PageResult::new(vec!["a", "b"], 0, 2, 5);
/// assert_eq!(page.total_pages, 3);
/// assert!(page.has_next_page);
/// assert!(!page.has_previous_page);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    /// Records on this page
    pub data: Vec<T>,

    /// Zero-based page number
    pub page_index: i64,

    /// Requested page size
    pub page_size: i64,

    /// Records matching the filter across all pages
    pub total_count: u64,

    /// `ceil(total_count / page_size)`
    pub total_pages: u64,

    /// Whether a page precedes this one
    pub has_previous_page: bool,

    /// Whether a page follows this one
    pub has_next_page: bool,

    /// Canonical name of the sort field applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_column: Option<String>,

    /// Direction applied, `asc` or `desc`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,

    /// Canonical name of the filter field applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_column: Option<String>,

    /// Filter value applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_query: Option<String>,
}

impl<T> PageResult<T> {
    /// Build a page and derive the pager flags from the totals
    ///
    /// `page_size` is expected to be positive; a non-positive size yields zero pages.
    #[must_use]
    pub fn new(data: Vec<T>, page_index: i64, page_size: i64, total_count: u64) -> Self {
        let total_pages = match u64::try_from(page_size) {
            Ok(size) if size > 0 => total_count.div_ceil(size),
            _ => 0,
        };
        let has_next_page = u64::try_from(page_index)
            .ok()
            .and_then(|index| index.checked_add(1))
            .is_some_and(|next| next < total_pages);

        Self {
            data,
            page_index,
            page_size,
            total_count,
            total_pages,
            has_previous_page: page_index > 0,
            has_next_page,
            sort_column: None,
            sort_order: None,
            filter_column: None,
            filter_query: None,
        }
    }

    /// Record the sort that produced this page
    #[must_use]
    pub fn with_sort(mut self, column: impl Into<String>, order: impl Into<String>) -> Self {
        self.sort_column = Some(column.into());
        self.sort_order = Some(order.into());
        self
    }

    /// Record the filter that produced this page
    #[must_use]
    pub fn with_filter(mut self, column: impl Into<String>, query: impl Into<String>) -> Self {
        self.filter_column = Some(column.into());
        self.filter_query = Some(query.into());
        self
    }

    /// Map the records while keeping the metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            data: self.data.into_iter().map(f).collect(),
            page_index: self.page_index,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
            has_previous_page: self.has_previous_page,
            has_next_page: self.has_next_page,
            sort_column: self.sort_column,
            sort_order: self.sort_order,
            filter_column: self.filter_column,
            filter_query: self.filter_query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(PageResult::<u8>::new(vec![], 0, 10, 0).total_pages, 0);
        assert_eq!(PageResult::<u8>::new(vec![], 0, 10, 10).total_pages, 1);
        assert_eq!(PageResult::<u8>::new(vec![], 0, 10, 11).total_pages, 2);
    }

    #[test]
    fn test_pager_flags() {
        let last = PageResult::<u8>::new(vec![], 1, 10, 20);
        assert!(last.has_previous_page);
        assert!(!last.has_next_page);

        let beyond = PageResult::<u8>::new(vec![], 7, 10, 20);
        assert!(!beyond.has_next_page);
    }

    #[test]
    fn test_serializes_camel_case_and_skips_unapplied() {
        let page = PageResult::new(vec![1], 0, 10, 1).with_sort("name", "asc");
        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(json["totalCount"], 1);
        assert_eq!(json["hasNextPage"], false);
        assert_eq!(json["sortColumn"], "name");
        assert!(json.get("filterColumn").is_none());
    }
}
