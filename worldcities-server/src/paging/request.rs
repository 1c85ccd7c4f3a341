//! Page request parameters as received from a list endpoint
//!
//! ```rust
//! use worldcities_server::paging::{PageRequest, SortOrder};
//!
//! let request = PageRequest::new(2, 25)
//!     .with_sort("name", SortOrder::Desc)
//!     .with_filter("iso2", "IT");
//!
//! assert_eq!(request.offset(), Some(50));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::PageError;

/// Page size used when a request does not carry one
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending (A-Z, 0-9)
    #[default]
    Asc,
    /// Descending (Z-A, 9-0)
    Desc,
}

impl SortOrder {
    /// SQL keyword for this direction
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(PageError::InvalidSortOrder(s.to_string()))
        }
    }
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// Paging, sorting and filtering parameters of a list request
///
/// Field names follow the query-string spelling (`pageIndex`, `sortColumn`, ...).
/// Empty strings are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// Zero-based page number
    #[serde(default)]
    pub page_index: i64,

    /// Number of records per page
    #[serde(default = "default_page_size")]
    pub page_size: i64,

    /// Field to sort by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_column: Option<String>,

    /// `asc` or `desc`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,

    /// Field to filter on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_column: Option<String>,

    /// Value the filter column must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_query: Option<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

impl PageRequest {
    /// Request one page without sort or filter
    #[must_use]
    pub fn new(page_index: i64, page_size: i64) -> Self {
        Self {
            page_index,
            page_size,
            sort_column: None,
            sort_order: None,
            filter_column: None,
            filter_query: None,
        }
    }

    /// Sort by `column` in `order`
    #[must_use]
    pub fn with_sort(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort_column = Some(column.into());
        self.sort_order = Some(order.to_string());
        self
    }

    /// Filter `column` by `query`
    #[must_use]
    pub fn with_filter(mut self, column: impl Into<String>, query: impl Into<String>) -> Self {
        self.filter_column = Some(column.into());
        self.filter_query = Some(query.into());
        self
    }

    /// Records to skip, or `None` if the offset does not fit in a `u64`
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        let index = u64::try_from(self.page_index).ok()?;
        let size = u64::try_from(self.page_size).ok()?;
        index.checked_mul(size)
    }

    pub(crate) fn sort_column(&self) -> Option<&str> {
        non_empty(self.sort_column.as_deref())
    }

    pub(crate) fn sort_order(&self) -> Result<SortOrder, PageError> {
        non_empty(self.sort_order.as_deref())
            .map(str::parse)
            .unwrap_or(Ok(SortOrder::Asc))
    }

    /// The filter pair, only when both halves are present
    pub(crate) fn filter(&self) -> Option<(&str, &str)> {
        let column = non_empty(self.filter_column.as_deref())?;
        let query = non_empty(self.filter_query.as_deref())?;
        Some((column, query))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
