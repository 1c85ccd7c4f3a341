//! Paged, sortable, filterable list view model
//!
//! The view never sorts or filters on its own: every page, sort or filter
//! event re-issues `list` and the rows and pager values shown are the ones
//! the server returned.

use worldcities_server::{
    models::Entity,
    paging::{PageRequest, PageResult, SortOrder, DEFAULT_PAGE_SIZE},
};

use crate::api::Api;
use crate::error::Result;
use crate::validator::{Generations, Ticket};

/// Column sorted by until the user picks another
pub const DEFAULT_SORT_COLUMN: &str = "name";

/// Column a filter query applies to
pub const DEFAULT_FILTER_COLUMN: &str = "name";

/// List view of entity `E`
#[derive(Debug)]
pub struct ListView<E: Entity> {
    request: PageRequest,
    rows: Vec<E::Listing>,
    total_count: u64,
    page_index: i64,
    page_size: i64,
    error: Option<String>,
    generations: Generations,
}

impl<E: Entity> Default for ListView<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> ListView<E> {
    /// First page, sorted by name, unfiltered
    pub fn new() -> Self {
        Self {
            request: PageRequest::new(0, DEFAULT_PAGE_SIZE)
                .with_sort(DEFAULT_SORT_COLUMN, SortOrder::Asc),
            rows: Vec::new(),
            total_count: 0,
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
            error: None,
            generations: Generations::default(),
        }
    }

    /// Start from `request` instead of the first page sorted by name
    pub fn with_request(mut self, request: PageRequest) -> Self {
        self.page_index = request.page_index;
        self.page_size = request.page_size;
        self.request = request;
        self
    }

    /// Request the next `list` call will send
    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// Rows of the last applied page
    pub fn rows(&self) -> &[E::Listing] {
        &self.rows
    }

    /// Total matching records reported by the server
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Page index reported by the server
    pub fn page_index(&self) -> i64 {
        self.page_index
    }

    /// Page size reported by the server
    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    /// Message of the last failed load, cleared by the next success
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Issue a ticket for the current request; older tickets become stale
    pub fn begin(&mut self) -> (Ticket, PageRequest) {
        (self.generations.next(), self.request.clone())
    }

    /// Apply the answer to the request issued with `ticket`
    ///
    /// Returns `false` and changes nothing when a newer request was issued
    /// in the meantime.
    pub fn apply(&mut self, ticket: Ticket, result: &Result<PageResult<E::Listing>>) -> bool {
        if !self.generations.is_current(ticket) {
            return false;
        }

        match result {
            Ok(page) => {
                self.rows = page.data.clone();
                self.total_count = page.total_count;
                self.page_index = page.page_index;
                self.page_size = page.page_size;
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        true
    }

    /// Reload the current request
    pub async fn refresh<A>(&mut self, api: &A) -> Result<()>
    where
        A: Api<E> + ?Sized,
    {
        let (ticket, request) = self.begin();
        let result = api.list(&request).await;
        self.apply(ticket, &result);
        result.map(|_| ())
    }

    /// Go back to the first page and filter by `query` (no filter when empty)
    pub async fn load<A>(&mut self, api: &A, query: Option<&str>) -> Result<()>
    where
        A: Api<E> + ?Sized,
    {
        self.request.page_index = 0;
        self.request.page_size = DEFAULT_PAGE_SIZE;

        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => {
                self.request.filter_column = Some(DEFAULT_FILTER_COLUMN.to_string());
                self.request.filter_query = Some(query.to_string());
            }
            None => {
                self.request.filter_column = None;
                self.request.filter_query = None;
            }
        }

        self.refresh(api).await
    }

    /// Pager event
    pub async fn on_page<A>(&mut self, api: &A, page_index: i64, page_size: i64) -> Result<()>
    where
        A: Api<E> + ?Sized,
    {
        self.request.page_index = page_index;
        self.request.page_size = page_size;
        self.refresh(api).await
    }

    /// Column header event
    pub async fn on_sort<A>(&mut self, api: &A, column: &str, order: SortOrder) -> Result<()>
    where
        A: Api<E> + ?Sized,
    {
        self.request.sort_column = Some(column.to_string());
        self.request.sort_order = Some(order.to_string());
        self.refresh(api).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::LocalApi;
    use worldcities_server::models::{City, Country};

    #[tokio::test]
    async fn test_initial_load_sorts_by_name() {
        let api = LocalApi::seeded();
        let mut view = ListView::<City>::new();

        view.load(&api, None).await.unwrap();

        let names: Vec<&str> = view.rows().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["TestCity1", "TestCity2", "TestCity3"]);
        assert_eq!(view.total_count(), 3);
        assert_eq!(view.page_size(), 10);
    }

    #[tokio::test]
    async fn test_filter_resets_to_first_page() {
        let api = LocalApi::seeded();
        let mut view = ListView::<City>::new();

        view.on_page(&api, 1, 2).await.unwrap();
        assert_eq!(view.page_index(), 1);
        assert_eq!(view.rows().len(), 1);

        view.load(&api, Some("city2")).await.unwrap();
        assert_eq!(view.page_index(), 0);
        assert_eq!(view.total_count(), 1);
        assert_eq!(view.request().filter_column.as_deref(), Some("name"));

        view.load(&api, Some("  ")).await.unwrap();
        assert_eq!(view.request().filter_query, None);
        assert_eq!(view.total_count(), 3);
    }

    #[tokio::test]
    async fn test_sort_reissues_list() {
        let api = LocalApi::seeded();
        let mut view = ListView::<Country>::new();

        view.on_sort(&api, "totCities", SortOrder::Desc).await.unwrap();

        assert_eq!(view.rows()[0].name, "Testland");
        assert_eq!(view.request().sort_order.as_deref(), Some("desc"));
    }

    #[tokio::test]
    async fn test_with_request() {
        let api = LocalApi::seeded();
        let mut view = ListView::<City>::new()
            .with_request(PageRequest::new(1, 2).with_sort("name", SortOrder::Desc));

        view.refresh(&api).await.unwrap();

        let names: Vec<&str> = view.rows().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["TestCity1"]);
        assert_eq!(view.page_index(), 1);
    }

    #[tokio::test]
    async fn test_superseded_page_is_dropped() {
        let api = LocalApi::seeded();
        let mut view = ListView::<City>::new();

        let (stale, stale_request) = view.begin();
        view.request.page_size = 1;
        let (fresh, fresh_request) = view.begin();

        let fresh_page = Api::<City>::list(&api, &fresh_request).await;
        assert!(view.apply(fresh, &fresh_page));

        let stale_page = Api::<City>::list(&api, &stale_request).await;
        assert!(!view.apply(stale, &stale_page));

        assert_eq!(view.rows().len(), 1);
        assert_eq!(view.page_size(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_rows() {
        let api = LocalApi::seeded();
        let mut view = ListView::<City>::new();
        view.load(&api, None).await.unwrap();

        api.fail_requests(true);
        assert!(view.on_page(&api, 1, 10).await.is_err());

        assert_eq!(view.rows().len(), 3);
        assert!(view.error().is_some());
    }
}
