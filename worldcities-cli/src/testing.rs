//! In-process [`Api`] backed by the server's controllers over a memory store

use async_trait::async_trait;
use axum::response::IntoResponse;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use worldcities_server::{
    controllers::ResourceController,
    error::Error,
    models::{City, Country, Entity},
    paging::{PageRequest, PageResult},
    store::MemoryStore,
};

use crate::api::{Api, CityApi};
use crate::error::{ClientError, Result};

pub(crate) struct LocalApi {
    countries: ResourceController<Country>,
    cities: ResourceController<City>,
    failing: AtomicBool,
    dupe_checks: AtomicUsize,
}

impl LocalApi {
    /// Two countries; three cities in `Testland`
    pub(crate) fn seeded() -> Self {
        let store = Arc::new(MemoryStore::with_records(
            vec![
                Country::new("Testland", "TL", "TLD").with_id(1),
                Country::new("Otherland", "OL", "OLD").with_id(2),
            ],
            vec![
                City::new("TestCity2", 2.0, 2.0, 1).with_id(2),
                City::new("TestCity1", 1.0, 1.0, 1).with_id(1),
                City::new("TestCity3", 3.0, 3.0, 1).with_id(3),
            ],
        ));
        Self {
            countries: ResourceController::<Country>::new(store.clone()),
            cities: ResourceController::<City>::new(store),
            failing: AtomicBool::new(false),
            dupe_checks: AtomicUsize::new(0),
        }
    }

    /// Make every following call fail with 503
    pub(crate) fn fail_requests(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of duplicate checks served
    pub(crate) fn dupe_checks(&self) -> usize {
        self.dupe_checks.load(Ordering::SeqCst)
    }

    fn guard(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ClientError::Status {
                status: 503,
                message: "Service Unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn status(err: Error) -> ClientError {
    let message = err.to_string();
    ClientError::Status {
        status: err.into_response().status().as_u16(),
        message,
    }
}

pub(crate) trait Local: Entity {
    fn controller(api: &LocalApi) -> &ResourceController<Self>;
}

impl Local for Country {
    fn controller(api: &LocalApi) -> &ResourceController<Self> {
        &api.countries
    }
}

impl Local for City {
    fn controller(api: &LocalApi) -> &ResourceController<Self> {
        &api.cities
    }
}

#[async_trait]
impl<E: Local> Api<E> for LocalApi {
    async fn list(&self, request: &PageRequest) -> Result<PageResult<E::Listing>> {
        self.guard()?;
        E::controller(self).list(request).await.map_err(status)
    }

    async fn get(&self, id: i32) -> Result<E> {
        self.guard()?;
        E::controller(self).get(id).await.map_err(status)
    }

    async fn create(&self, entity: &E) -> Result<E> {
        self.guard()?;
        E::controller(self)
            .create(entity.clone())
            .await
            .map_err(status)
    }

    async fn update(&self, entity: &E) -> Result<()> {
        self.guard()?;
        E::controller(self)
            .update(entity.id(), entity.clone())
            .await
            .map_err(status)
    }

    async fn delete(&self, id: i32) -> Result<()> {
        self.guard()?;
        E::controller(self).delete(id).await.map_err(status)
    }

    async fn is_dupe_field(&self, id: i32, field_name: &str, field_value: &str) -> Result<bool> {
        self.guard()?;
        self.dupe_checks.fetch_add(1, Ordering::SeqCst);
        E::controller(self)
            .is_dupe_field(id, field_name, field_value)
            .await
            .map_err(status)
    }
}

#[async_trait]
impl CityApi for LocalApi {
    async fn is_dupe_city(&self, city: &City) -> Result<bool> {
        self.guard()?;
        self.dupe_checks.fetch_add(1, Ordering::SeqCst);
        self.cities.is_dupe(city).await.map_err(status)
    }
}
