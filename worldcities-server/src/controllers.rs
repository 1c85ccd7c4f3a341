//! Resource controllers
//!
//! One [`ResourceController`] is instantiated per entity type. It owns the
//! business rules of the CRUD surface (id consistency on update, the
//! conflict/existence re-check, duplicate checks) and leaves HTTP concerns to
//! [`crate::routes`].

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::Entity;
use crate::paging::{build_page, Condition, PageRequest, PageResult};
use crate::store::{ListingSource, Store, StoreError};

/// CRUD operations, paged listing and duplicate checks for entity `E`
pub struct ResourceController<E: Entity> {
    store: Arc<dyn Store<E>>,
}

impl<E: Entity> Clone for ResourceController<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<E: Entity> ResourceController<E> {
    /// Controller over `store`
    pub fn new(store: Arc<dyn Store<E>>) -> Self {
        Self { store }
    }

    /// One page of the listing projection
    pub async fn list(&self, request: &PageRequest) -> Result<PageResult<E::Listing>> {
        let source = ListingSource::new(self.store.as_ref());
        build_page(&source, request, E::DEFAULT_SORT).await
    }

    /// One record by id
    pub async fn get(&self, id: i32) -> Result<E> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| not_found::<E>(id))
    }

    /// Store a new record; any id in `entity` is replaced by a generated one
    pub async fn create(&self, entity: E) -> Result<E> {
        let created = self.store.insert(entity).await?;
        tracing::info!(kind = E::KIND, id = created.id(), "Created record");
        Ok(created)
    }

    /// Overwrite record `id` with `entity`
    ///
    /// `entity.id()` must equal `id`. When the store reports that no row was
    /// affected, the record is looked up again to tell a deletion (not found)
    /// from a concurrent modification (conflict).
    pub async fn update(&self, id: i32, entity: E) -> Result<()> {
        if entity.id() != id {
            return Err(Error::InvalidArgument(format!(
                "path id {} does not match body id {}",
                id,
                entity.id()
            )));
        }

        match self.store.update(entity).await {
            Ok(()) => {
                tracing::info!(kind = E::KIND, id, "Updated record");
                Ok(())
            }
            Err(StoreError::Conflict { .. }) => {
                if self.store.exists(id).await? {
                    tracing::warn!(kind = E::KIND, id, "Update conflicted with a concurrent change");
                    Err(Error::Conflict(format!(
                        "{} {} was modified concurrently",
                        E::KIND,
                        id
                    )))
                } else {
                    Err(not_found::<E>(id))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove record `id`
    pub async fn delete(&self, id: i32) -> Result<()> {
        if self.store.delete(id).await? {
            tracing::info!(kind = E::KIND, id, "Deleted record");
            Ok(())
        } else {
            Err(not_found::<E>(id))
        }
    }

    /// Whether a record other than `id` already holds `field_value` in `field_name`
    ///
    /// Answers `false` for an empty value, a field outside the entity's
    /// duplicate-check set, or a value that does not parse as the field's type.
    pub async fn is_dupe_field(&self, id: i32, field_name: &str, field_value: &str) -> Result<bool> {
        if field_value.is_empty() {
            return Ok(false);
        }
        let Some(field) = E::dupe_field(field_name) else {
            return Ok(false);
        };
        let Some(condition) = Condition::parse(field, field_value) else {
            return Ok(false);
        };

        Ok(self.store.any_match(&[condition], id).await?)
    }

    /// Whether a record other than `entity` matches it on every duplicate-check field
    pub async fn is_dupe(&self, entity: &E) -> Result<bool> {
        let conditions: Vec<Condition<E>> = E::dupe_fields()
            .map(|field| Condition::new(field, field.get(entity).into()))
            .collect();

        Ok(self.store.any_match(&conditions, entity.id()).await?)
    }
}

fn not_found<E: Entity>(id: i32) -> Error {
    Error::NotFound(format!("{} {} not found", E::KIND, id))
}
