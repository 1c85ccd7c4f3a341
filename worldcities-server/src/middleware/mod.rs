//! Authentication, authorization and request tracking middleware

pub mod auth;
pub mod jwt;
pub mod request_tracking;
pub mod token;

pub use auth::{require_roles, RoleGuard};
pub use jwt::JwtAuth;
pub use request_tracking::{
    request_id_layer, request_id_propagation_layer, sensitive_headers, sensitive_headers_layer,
};
pub use token::{extract_token, Claims, Role};
