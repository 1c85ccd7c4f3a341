//! Request id and sensitive header layers

use axum::http::{header, HeaderName};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
};

use crate::ids::MakeTypedRequestId;

/// Headers masked in traces
pub fn sensitive_headers() -> [HeaderName; 3] {
    [
        header::AUTHORIZATION,
        header::COOKIE,
        header::PROXY_AUTHORIZATION,
    ]
}

/// Generate an `x-request-id` for requests arriving without one
pub fn request_id_layer() -> SetRequestIdLayer<MakeTypedRequestId> {
    SetRequestIdLayer::x_request_id(MakeTypedRequestId)
}

/// Copy the request's `x-request-id` onto the response
pub fn request_id_propagation_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Mark credentials as sensitive so trace output redacts them
pub fn sensitive_headers_layer() -> SetSensitiveRequestHeadersLayer {
    SetSensitiveRequestHeadersLayer::new(sensitive_headers())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_is_sensitive() {
        assert!(sensitive_headers().contains(&header::AUTHORIZATION));
    }
}
