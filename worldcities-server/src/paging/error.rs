//! Errors raised while validating a page request

use thiserror::Error;

use super::field::FieldKind;

/// A page request that cannot be turned into a query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    /// `pageIndex` below zero
    #[error("pageIndex must not be negative (got {0})")]
    NegativePageIndex(i64),

    /// `pageSize` of zero or below
    #[error("pageSize must be greater than zero (got {0})")]
    NonPositivePageSize(i64),

    /// `sortOrder` other than asc/desc
    #[error("sortOrder must be 'asc' or 'desc' (got '{0}')")]
    InvalidSortOrder(String),

    /// Sort or filter column outside the allow-list
    #[error("'{column}' is not a valid {purpose} column")]
    UnknownColumn {
        /// Requested column
        column: String,
        /// `sort` or `filter`
        purpose: &'static str,
    },

    /// Filter value that does not parse as the column's type
    #[error("filterQuery '{value}' is not a valid {kind} for column '{column}'")]
    InvalidFilterValue {
        /// Canonical column name
        column: &'static str,
        /// Expected type
        kind: FieldKind,
        /// Raw value
        value: String,
    },
}
