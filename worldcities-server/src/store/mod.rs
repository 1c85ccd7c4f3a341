//! Persistence for countries and cities
//!
//! [`Store`] is the seam between resource controllers and storage. Two
//! implementations exist: [`MemoryStore`], used when no database is
//! configured and in tests, and `PgStore` (feature `database`), which
//! pushes filtering, sorting and paging into PostgreSQL.

mod memory;
#[cfg(feature = "database")]
mod postgres;

pub use memory::{InMemory, MemoryStore, MemoryTables};
#[cfg(feature = "database")]
pub use postgres::{PgEntity, PgStore};

use std::marker::PhantomData;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{DatabaseError, DatabaseOperation, Error};
use crate::models::Entity;
use crate::paging::{Condition, PageQuery, PageSource};

/// Failure reported by a [`Store`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// An update matched no row: the record changed or vanished since it was read
    #[error("{kind} {id} was modified or removed concurrently")]
    Conflict {
        /// Entity kind
        kind: &'static str,
        /// Record id
        id: i32,
    },

    /// Storage failure
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl StoreError {
    /// Re-tag a storage failure with the operation it happened in
    pub(crate) fn during(self, operation: DatabaseOperation) -> Self {
        match self {
            StoreError::Database(e) => StoreError::Database(e.during(operation)),
            other => other,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Error::Conflict(err.to_string()),
            StoreError::Database(e) => Error::Database(e),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(DatabaseError::from(err))
    }
}

/// Storage operations a resource controller needs for entity `E`
#[async_trait]
pub trait Store<E: Entity>: Send + Sync {
    /// Load one record
    async fn find(&self, id: i32) -> Result<Option<E>, StoreError>;

    /// Whether a record with `id` exists
    async fn exists(&self, id: i32) -> Result<bool, StoreError>;

    /// Insert `entity` under a newly generated id and return the stored record
    async fn insert(&self, entity: E) -> Result<E, StoreError>;

    /// Overwrite the record with `entity.id()`
    ///
    /// Fails with [`StoreError::Conflict`] when no row was affected.
    async fn update(&self, entity: E) -> Result<(), StoreError>;

    /// Remove a record; `false` when it did not exist
    async fn delete(&self, id: i32) -> Result<bool, StoreError>;

    /// Whether a record other than `exclude_id` satisfies every condition (duplicate semantics)
    async fn any_match(
        &self,
        conditions: &[Condition<E>],
        exclude_id: i32,
    ) -> Result<bool, StoreError>;

    /// Count listing rows passing `filter`
    async fn count_listing(
        &self,
        filter: Option<&Condition<E::Listing>>,
    ) -> Result<u64, StoreError>;

    /// Fetch one page of listing rows
    async fn fetch_listing(
        &self,
        query: &PageQuery<E::Listing>,
    ) -> Result<Vec<E::Listing>, StoreError>;
}

/// Adapts a [`Store`] into the [`PageSource`] of its listing projection
pub struct ListingSource<'a, E: Entity> {
    store: &'a dyn Store<E>,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> ListingSource<'a, E> {
    /// Wrap `store`
    pub fn new(store: &'a dyn Store<E>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Entity> PageSource<E::Listing> for ListingSource<'_, E> {
    type Error = Error;

    async fn count(&self, filter: Option<&Condition<E::Listing>>) -> Result<u64, Self::Error> {
        Ok(self.store.count_listing(filter).await?)
    }

    async fn fetch(&self, query: &PageQuery<E::Listing>) -> Result<Vec<E::Listing>, Self::Error> {
        Ok(self.store.fetch_listing(query).await?)
    }
}
