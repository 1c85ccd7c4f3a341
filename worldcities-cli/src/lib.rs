//! # worldcities-cli
//!
//! Client side of the WorldCities API.
//!
//! - [`api`]: typed HTTP access, one [`api::Api`] implementation per entity
//! - [`list_view`]: paged, sortable, filterable lists driven by the server
//! - [`edit_form`]: add/edit forms with local field rules and server-side
//!   duplicate checks
//! - [`validator`]: restartable asynchronous duplicate validation where the
//!   latest check always wins

pub mod api;
pub mod edit_form;
pub mod error;
pub mod list_view;
pub mod validator;

#[cfg(test)]
mod testing;

pub use api::{Api, ApiClient, CityApi};
pub use error::{ClientError, Result};
