//! # worldcities-server
//!
//! REST API for countries and cities reference data.
//!
//! - **Paged listings**: every collection is listed through one generic
//!   page/sort/filter contract ([`paging`]) whose column names are checked
//!   against compiled allow-lists
//! - **CRUD with role gating**: create/update need `RegisteredUser`, delete
//!   needs `Administrator` (JWT bearer tokens)
//! - **Duplicate checks**: `IsDupeField` per resource and a whole-record
//!   `IsDupeCity`
//! - **Storage**: PostgreSQL through sqlx (feature `database`) or an
//!   in-memory store when no database is configured
//!
//! ## Example
//!
//! ```rust,no_run
//! use worldcities_server::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::builder().config(config.clone()).build().await?;
//!
//!     Server::new(config).serve(router(state)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controllers;
#[cfg(feature = "database")]
pub mod database;
pub mod error;
pub mod health;
pub mod ids;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod paging;
pub mod responses;
pub mod routes;
pub mod server;
pub mod state;
pub mod store;

/// Commonly used items
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::controllers::ResourceController;
    pub use crate::error::{Error, Result};
    pub use crate::middleware::{Claims, JwtAuth, Role};
    pub use crate::models::{City, CityListing, Country, CountryListing, Entity};
    pub use crate::observability::init_tracing;
    pub use crate::paging::{PageRequest, PageResult, SortOrder};
    pub use crate::routes::router;
    pub use crate::server::Server;
    pub use crate::state::AppState;
    pub use crate::store::{MemoryStore, Store};
}
