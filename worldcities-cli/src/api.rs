//! Typed access to the WorldCities HTTP API
//!
//! [`Api`] is implemented once per entity type by [`ApiClient`]; views and
//! forms are written against the trait so they can be driven by an
//! in-process implementation in tests.

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use worldcities_server::{
    error::ErrorResponse,
    models::{City, Country, Entity},
    paging::{PageRequest, PageResult},
};

use crate::error::{ClientError, Result};

/// CRUD, listing and duplicate checks for entity `E`
#[async_trait]
pub trait Api<E: Entity>: Send + Sync {
    /// One page of the listing
    async fn list(&self, request: &PageRequest) -> Result<PageResult<E::Listing>>;

    /// One record
    async fn get(&self, id: i32) -> Result<E>;

    /// Store a new record and return it with its generated id
    async fn create(&self, entity: &E) -> Result<E>;

    /// Overwrite the record with `entity`'s id
    async fn update(&self, entity: &E) -> Result<()>;

    /// Remove a record
    async fn delete(&self, id: i32) -> Result<()>;

    /// Whether a record other than `id` holds `field_value` in `field_name`
    async fn is_dupe_field(&self, id: i32, field_name: &str, field_value: &str) -> Result<bool>;
}

/// City endpoints beyond the common surface
#[async_trait]
pub trait CityApi: Api<City> + Api<Country> {
    /// Whether another city matches `city` on name, coordinates and country
    async fn is_dupe_city(&self, city: &City) -> Result<bool>;
}

/// HTTP implementation of [`Api`]
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Client for the API rooted at `base_url` (e.g. `http://localhost:8080`)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Send `token` as a bearer credential on every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Root URL of the API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url<E: Entity>(&self) -> String {
        format!("{}/api/{}", self.base_url, E::COLLECTION)
    }

    fn item_url<E: Entity>(&self, id: i32) -> String {
        format!("{}/{}", self.collection_url::<E>(), id)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }
}

async fn send(builder: RequestBuilder) -> Result<Response> {
    let response = builder.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await?;
    let message = match serde_json::from_slice::<ErrorResponse>(&body) {
        Ok(error) => error.error,
        Err(_) => status.canonical_reason().unwrap_or("Unknown").to_string(),
    };

    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl<E> Api<E> for ApiClient
where
    E: Entity,
    E::Listing: DeserializeOwned,
{
    async fn list(&self, request: &PageRequest) -> Result<PageResult<E::Listing>> {
        let builder = self
            .request(Method::GET, self.collection_url::<E>())
            .query(request);
        decode(send(builder).await?).await
    }

    async fn get(&self, id: i32) -> Result<E> {
        let builder = self.request(Method::GET, self.item_url::<E>(id));
        decode(send(builder).await?).await
    }

    async fn create(&self, entity: &E) -> Result<E> {
        let builder = self
            .request(Method::POST, self.collection_url::<E>())
            .json(entity);
        decode(send(builder).await?).await
    }

    async fn update(&self, entity: &E) -> Result<()> {
        let builder = self
            .request(Method::PUT, self.item_url::<E>(entity.id()))
            .json(entity);
        send(builder).await?;
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<()> {
        send(self.request(Method::DELETE, self.item_url::<E>(id))).await?;
        Ok(())
    }

    async fn is_dupe_field(&self, id: i32, field_name: &str, field_value: &str) -> Result<bool> {
        let id = id.to_string();
        let builder = self
            .request(
                Method::POST,
                format!("{}/IsDupeField", self.collection_url::<E>()),
            )
            .query(&[
                (E::ID_PARAM, id.as_str()),
                ("fieldName", field_name),
                ("fieldValue", field_value),
            ]);
        decode(send(builder).await?).await
    }
}

#[async_trait]
impl CityApi for ApiClient {
    async fn is_dupe_city(&self, city: &City) -> Result<bool> {
        let builder = self
            .request(
                Method::POST,
                format!("{}/IsDupeCity", self.collection_url::<City>()),
            )
            .json(city);
        decode(send(builder).await?).await
    }
}
