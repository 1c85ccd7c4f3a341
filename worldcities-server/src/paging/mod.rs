//! Paged, sorted and filtered listings
//!
//! Every list endpoint accepts the same [`PageRequest`] and answers with a
//! [`PageResult`]. Column names in a request are resolved against the
//! record's compiled [`Record::FIELDS`] allow-list before anything touches
//! storage.

mod builder;
mod error;
mod field;
mod request;
mod result;

pub use builder::{build_page, count_matching, Condition, PageQuery, PageSource, Sort};
pub use error::PageError;
pub use field::{Field, FieldKind, FieldRef, FieldValue, Record};
pub use request::{PageRequest, SortOrder, DEFAULT_PAGE_SIZE};
pub use result::PageResult;
