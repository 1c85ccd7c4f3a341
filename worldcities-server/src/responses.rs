//! HTTP response builders with correct status codes
//!
//! - **201 Created** - record inserted (POST), with a `Location` header
//! - **204 No Content** - record updated (PUT) or removed (DELETE)

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// HTTP 201 Created response
///
/// ```rust,ignore
/// async fn create_city(Json(city): Json<City>) -> Created<City> {
///     let city = store.insert(city).await?;
///     Created::new(city).with_location(format!("/api/cities/{}", city.id))
/// }
/// ```
#[derive(Debug)]
pub struct Created<T> {
    data: T,
    location: Option<String>,
}

impl<T> Created<T> {
    /// Create a new 201 Created response
    pub fn new(data: T) -> Self {
        Self {
            data,
            location: None,
        }
    }

    /// Add a Location header pointing to the created resource
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::CREATED, Json(&self.data)).into_response();

        if let Some(location) = self.location {
            if let Ok(header_value) = HeaderValue::from_str(&location) {
                response.headers_mut().insert(header::LOCATION, header_value);
            }
        }

        response
    }
}

/// HTTP 204 No Content response
#[derive(Debug, Clone, Copy)]
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Row {
        id: i32,
    }

    #[test]
    fn test_created_sets_location() {
        let response = Created::new(Row { id: 4 })
            .with_location("/api/cities/4")
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/api/cities/4"
        );
    }

    #[test]
    fn test_created_without_location() {
        let response = Created::new(Row { id: 4 }).into_response();
        assert!(response.headers().get(header::LOCATION).is_none());
    }

    #[test]
    fn test_no_content() {
        assert_eq!(NoContent.into_response().status(), StatusCode::NO_CONTENT);
    }
}
