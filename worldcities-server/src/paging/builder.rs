//! Resolving a page request into a typed query and running it against a source
//!
//! [`build_page`] is the one entry point every list endpoint goes through. It
//! validates the raw [`PageRequest`], resolves the sort and filter columns
//! against the record's [`Record::FIELDS`] allow-list, asks the
//! [`PageSource`] for the filtered total and for the requested slice, and
//! assembles the [`PageResult`].
//!
//! Ordering is always made total by breaking ties on ascending `id`, in
//! both directions, so consecutive pages never overlap or skip records.

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;

use super::error::PageError;
use super::field::{Field, FieldValue, Record};
use super::request::{PageRequest, SortOrder};
use super::result::PageResult;

/// A typed predicate over one allow-listed field
pub struct Condition<R: 'static> {
    /// Field being tested
    pub field: &'static Field<R>,
    /// Operand, already parsed to the field's type
    pub value: FieldValue,
}

impl<R> Clone for Condition<R> {
    fn clone(&self) -> Self {
        Self {
            field: self.field,
            value: self.value.clone(),
        }
    }
}

impl<R> fmt::Debug for Condition<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("field", &self.field.name())
            .field("value", &self.value)
            .finish()
    }
}

impl<R> Condition<R> {
    /// Pair a field with an operand
    pub fn new(field: &'static Field<R>, value: FieldValue) -> Self {
        Self { field, value }
    }

    /// Parse `raw` as an operand for `field`
    pub fn parse(field: &'static Field<R>, raw: &str) -> Option<Self> {
        field.parse(raw).map(|value| Self::new(field, value))
    }

    /// Listing filter test (text contains, numbers equal)
    pub fn matches(&self, record: &R) -> bool {
        self.field.contains(record, &self.value)
    }

    /// Duplicate test (text equal ignoring case, numbers equal)
    pub fn equals(&self, record: &R) -> bool {
        self.field.equals(record, &self.value)
    }
}

/// Sort key: one allow-listed field and a direction
pub struct Sort<R: 'static> {
    /// Field to order by
    pub field: &'static Field<R>,
    /// Direction
    pub order: SortOrder,
}

impl<R> Clone for Sort<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Sort<R> {}

impl<R> fmt::Debug for Sort<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sort")
            .field("field", &self.field.name())
            .field("order", &self.order)
            .finish()
    }
}

impl<R: Record> Sort<R> {
    /// Compare two records by the sort field, then by ascending id
    pub fn compare(&self, a: &R, b: &R) -> Ordering {
        let ordering = self.field.compare(a, b);
        let ordering = match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        ordering.then_with(|| a.id().cmp(&b.id()))
    }
}

/// A validated page query ready to be executed by a [`PageSource`]
pub struct PageQuery<R: 'static> {
    /// Optional filter predicate
    pub filter: Option<Condition<R>>,
    /// Sort key
    pub sort: Sort<R>,
    /// Records to skip; saturates to `u64::MAX` when the page lies beyond any addressable offset
    pub offset: u64,
    /// Records to take
    pub limit: u64,
}

impl<R> fmt::Debug for PageQuery<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageQuery")
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .finish()
    }
}

impl<R: Record> PageQuery<R> {
    /// Validate `request` and resolve its columns against `R::FIELDS`
    ///
    /// `default_sort` is used when the request names no sort column.
    pub fn resolve(request: &PageRequest, default_sort: &str) -> Result<Self, PageError> {
        if request.page_index < 0 {
            return Err(PageError::NegativePageIndex(request.page_index));
        }
        if request.page_size <= 0 {
            return Err(PageError::NonPositivePageSize(request.page_size));
        }

        let order = request.sort_order()?;
        let sort_name = request.sort_column().unwrap_or(default_sort);
        let sort_field = R::field(sort_name).ok_or_else(|| PageError::UnknownColumn {
            column: sort_name.to_string(),
            purpose: "sort",
        })?;

        let filter = match request.filter() {
            Some((column, query)) => {
                let field = R::field(column).ok_or_else(|| PageError::UnknownColumn {
                    column: column.to_string(),
                    purpose: "filter",
                })?;
                let condition =
                    Condition::parse(field, query).ok_or_else(|| PageError::InvalidFilterValue {
                        column: field.name(),
                        kind: field.kind(),
                        value: query.to_string(),
                    })?;
                Some(condition)
            }
            None => None,
        };

        Ok(Self {
            filter,
            sort: Sort {
                field: sort_field,
                order,
            },
            offset: request.offset().unwrap_or(u64::MAX),
            limit: request.page_size.unsigned_abs(),
        })
    }

    /// Apply this query to an in-memory collection
    pub fn apply<'a, I>(&self, records: I) -> Vec<R>
    where
        I: IntoIterator<Item = &'a R>,
        R: Clone,
    {
        let mut matching: Vec<&R> = records
            .into_iter()
            .filter(|record| self.filter.as_ref().is_none_or(|c| c.matches(record)))
            .collect();
        matching.sort_by(|a, b| self.sort.compare(a, b));

        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Count the records of an in-memory collection that pass `filter`
pub fn count_matching<'a, R, I>(records: I, filter: Option<&Condition<R>>) -> u64
where
    R: Record,
    I: IntoIterator<Item = &'a R>,
{
    let count = records
        .into_iter()
        .filter(|record| filter.is_none_or(|c| c.matches(record)))
        .count();
    u64::try_from(count).unwrap_or(u64::MAX)
}

/// Anything that can count and fetch records for a validated [`PageQuery`]
#[async_trait]
pub trait PageSource<R: Record>: Send + Sync {
    /// Error raised by the underlying storage
    type Error: Send;

    /// Number of records passing `filter`, ignoring paging
    async fn count(&self, filter: Option<&Condition<R>>) -> Result<u64, Self::Error>;

    /// Filtered, sorted slice described by `query`
    async fn fetch(&self, query: &PageQuery<R>) -> Result<Vec<R>, Self::Error>;
}

#[async_trait]
impl<R: Record + Clone> PageSource<R> for Vec<R> {
    type Error = PageError;

    async fn count(&self, filter: Option<&Condition<R>>) -> Result<u64, Self::Error> {
        Ok(count_matching(self.iter(), filter))
    }

    async fn fetch(&self, query: &PageQuery<R>) -> Result<Vec<R>, Self::Error> {
        Ok(query.apply(self.iter()))
    }
}

/// Run `request` against `source` and assemble the page
///
/// # Errors
///
/// Returns a [`PageError`] (converted into `S::Error`) when the request is
/// invalid, or the source's own error when counting or fetching fails.
pub async fn build_page<R, S>(
    source: &S,
    request: &PageRequest,
    default_sort: &str,
) -> Result<PageResult<R>, S::Error>
where
    R: Record,
    S: PageSource<R> + ?Sized,
    S::Error: From<PageError>,
{
    let query = PageQuery::<R>::resolve(request, default_sort)?;

    let total_count = source.count(query.filter.as_ref()).await?;
    let data = if query.offset < total_count {
        source.fetch(&query).await?
    } else {
        Vec::new()
    };

    let mut page = PageResult::new(data, request.page_index, request.page_size, total_count)
        .with_sort(query.sort.field.name(), query.sort.order.to_string());
    if let Some(filter) = &query.filter {
        page = page.with_filter(filter.field.name(), filter.value.to_string());
    }
    Ok(page)
}
