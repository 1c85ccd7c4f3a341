//! Application state management

use axum::extract::FromRef;
use std::sync::Arc;

#[cfg(feature = "database")]
use sqlx::PgPool;

use crate::{
    config::Config,
    controllers::ResourceController,
    error::Result,
    middleware::JwtAuth,
    models::{City, Country},
    store::MemoryStore,
};

/// Application state shared across handlers
///
/// Handlers extract the controller they need (`State<ResourceController<City>>`)
/// through the [`FromRef`] impls below.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,

    countries: ResourceController<Country>,

    cities: ResourceController<City>,

    jwt: Option<JwtAuth>,

    #[cfg(feature = "database")]
    db_pool: Option<PgPool>,
}

impl AppState {
    /// Create a new builder for AppState
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Country controller
    pub fn countries(&self) -> &ResourceController<Country> {
        &self.countries
    }

    /// City controller
    pub fn cities(&self) -> &ResourceController<City> {
        &self.cities
    }

    /// Token validator, when JWT is configured
    pub fn jwt(&self) -> Option<&JwtAuth> {
        self.jwt.as_ref()
    }

    /// Get the database pool
    ///
    /// `None` when records are kept in memory.
    #[cfg(feature = "database")]
    pub fn db(&self) -> Option<&PgPool> {
        self.db_pool.as_ref()
    }
}

impl FromRef<AppState> for ResourceController<Country> {
    fn from_ref(state: &AppState) -> Self {
        state.countries.clone()
    }
}

impl FromRef<AppState> for ResourceController<City> {
    fn from_ref(state: &AppState) -> Self {
        state.cities.clone()
    }
}

/// Builder for AppState
///
/// ```rust,ignore
/// let state = AppState::builder()
///     .config(config)
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<Config>,
    memory: Option<Arc<MemoryStore>>,
    jwt: Option<JwtAuth>,

    #[cfg(feature = "database")]
    db_pool: Option<PgPool>,
}

impl AppStateBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Keep records in `store` instead of a database
    pub fn memory_store(mut self, store: Arc<MemoryStore>) -> Self {
        self.memory = Some(store);
        self
    }

    /// Use `auth` instead of building a validator from `config.jwt`
    pub fn jwt(mut self, auth: JwtAuth) -> Self {
        self.jwt = Some(auth);
        self
    }

    /// Use an existing database pool
    #[cfg(feature = "database")]
    pub fn db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Build the AppState
    ///
    /// The backing store is chosen in this order: an explicit memory store,
    /// an explicit pool, a pool created from `config.database`, and finally an
    /// empty [`MemoryStore`].
    pub async fn build(self) -> Result<AppState> {
        let config = self.config.unwrap_or_default();

        let jwt = match (self.jwt, &config.jwt) {
            (Some(auth), _) => Some(auth),
            (None, Some(jwt_config)) => Some(JwtAuth::new(jwt_config)?),
            (None, None) => {
                tracing::warn!("JWT not configured; write endpoints will reject every request");
                None
            }
        };

        if let Some(store) = self.memory {
            return Ok(Self::with_memory(config, jwt, store));
        }

        #[cfg(feature = "database")]
        {
            let pool = match self.db_pool {
                Some(pool) => Some(pool),
                None => match &config.database {
                    Some(db_config) => Some(crate::database::create_pool(db_config).await?),
                    None => None,
                },
            };

            if let Some(pool) = pool {
                let store = Arc::new(crate::store::PgStore::new(pool.clone()));
                return Ok(AppState {
                    config: Arc::new(config),
                    countries: ResourceController::<Country>::new(store.clone()),
                    cities: ResourceController::<City>::new(store),
                    jwt,
                    db_pool: Some(pool),
                });
            }
        }

        tracing::info!("No database configured; records are kept in memory");
        Ok(Self::with_memory(config, jwt, Arc::new(MemoryStore::new())))
    }

    fn with_memory(config: Config, jwt: Option<JwtAuth>, store: Arc<MemoryStore>) -> AppState {
        AppState {
            config: Arc::new(config),
            countries: ResourceController::<Country>::new(store.clone()),
            cities: ResourceController::<City>::new(store),
            jwt,
            #[cfg(feature = "database")]
            db_pool: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::PageRequest;

    #[tokio::test]
    async fn test_state_builder_defaults() {
        let state = AppStateBuilder::new().build().await.unwrap();

        assert_eq!(state.config().service.name, "worldcities");
        assert!(state.jwt().is_none());
        #[cfg(feature = "database")]
        assert!(state.db().is_none());
    }

    #[tokio::test]
    async fn test_controllers_share_memory_store() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::builder()
            .config(Config::default())
            .memory_store(store)
            .build()
            .await
            .unwrap();

        let country = state
            .countries()
            .create(Country::new("Testland", "TL", "TLD"))
            .await
            .unwrap();
        state
            .cities()
            .create(City::new("TestCity1", 1.0, 1.0, country.id))
            .await
            .unwrap();

        let page = state.countries().list(&PageRequest::default()).await.unwrap();
        assert_eq!(page.data[0].tot_cities, 1);
    }
}
