//! Typed request identifiers
//!
//! Every request handled by the service carries an `x-request-id` header of
//! the form `req_<base32 uuidv7>`. Incoming ids are propagated untouched;
//! missing ones are generated by [`MakeTypedRequestId`]. The id is attached
//! to the request's tracing span so log lines can be correlated.

use http::{HeaderValue, Request};
use mti::prelude::*;
use std::fmt;
use tower_http::request_id::{MakeRequestId, RequestId as TowerRequestId};

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Time-sortable request identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(MagicTypeId);

impl RequestId {
    /// The prefix used for request IDs
    pub const PREFIX: &'static str = "req";

    /// Creates a new request ID with a UUIDv7.
    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }

    /// Returns the request ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates a [`RequestId`] for requests that arrive without one
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTypedRequestId;

impl MakeRequestId for MakeTypedRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<TowerRequestId> {
        let id = RequestId::new();
        let header_value = HeaderValue::from_str(id.as_str()).ok()?;
        Some(TowerRequestId::new(header_value))
    }
}

/// The request id header of `request`, or `-` when absent or not UTF-8
pub fn request_id_of<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_format() {
        let id = RequestId::new();
        assert!(id.as_str().starts_with("req_"));
        // prefix (3) + underscore (1) + suffix (26)
        assert_eq!(id.as_str().len(), 30);
    }

    #[test]
    fn test_make_typed_request_id() {
        let mut maker = MakeTypedRequestId;
        let request = Request::builder().body(()).unwrap();

        let header_value = maker.make_request_id(&request).unwrap().into_header_value();
        assert!(header_value.to_str().unwrap().starts_with("req_"));
    }

    #[test]
    fn test_request_id_of() {
        let tagged = Request::builder()
            .header(REQUEST_ID_HEADER, "req_01h455vb4pex5vsknk084sn02q")
            .body(())
            .unwrap();
        assert_eq!(request_id_of(&tagged), "req_01h455vb4pex5vsknk084sn02q");

        let untagged = Request::builder().body(()).unwrap();
        assert_eq!(request_id_of(&untagged), "-");
    }
}
