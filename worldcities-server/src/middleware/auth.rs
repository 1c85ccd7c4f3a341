//! Per-route role guard
//!
//! ```rust,ignore
//! use axum::{handler::Handler, middleware::from_fn_with_state, routing::delete};
//! use worldcities_server::middleware::{require_roles, Role, RoleGuard};
//!
//! let route = delete(remove.layer(from_fn_with_state(
//!     RoleGuard::new(&[Role::Administrator]),
//!     require_roles,
//! )));
//! ```

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::token::{Claims, Role};
use crate::error::Error;

/// Roles any one of which admits a request
#[derive(Debug, Clone, Copy)]
pub struct RoleGuard {
    roles: &'static [Role],
}

impl RoleGuard {
    /// Admit holders of any of `roles`
    pub const fn new(roles: &'static [Role]) -> Self {
        Self { roles }
    }

    /// Check `claims` against the guard
    pub fn check(&self, claims: Option<&Claims>) -> Result<(), Error> {
        let claims = claims
            .ok_or_else(|| Error::Unauthorized("Missing bearer token".to_string()))?;

        if claims.has_any_role(self.roles) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "Requires one of the roles: {}",
                self.roles
                    .iter()
                    .map(Role::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }
}

/// Middleware rejecting requests whose claims lack the guard's roles
///
/// No claims at all yields 401; claims without a matching role yield 403.
pub async fn require_roles(
    State(guard): State<RoleGuard>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    if let Err(e) = guard.check(request.extensions().get::<Claims>()) {
        tracing::info!(
            method = %request.method(),
            path = %request.uri().path(),
            "Access denied: {}",
            e
        );
        return Err(e);
    }
    Ok(next.run(request).await)
}
