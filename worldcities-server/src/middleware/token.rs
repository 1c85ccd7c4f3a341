//! Bearer token claims and roles

use axum::http::{header::AUTHORIZATION, HeaderMap};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// Roles recognised by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Any signed-in user; may create and edit records
    RegisteredUser,
    /// May additionally delete records
    Administrator,
}

impl Role {
    /// Name as carried in the `roles` claim
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RegisteredUser => "RegisteredUser",
            Self::Administrator => "Administrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims of a validated token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Username (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Role names
    #[serde(default)]
    pub roles: Vec<String>,

    /// Expiration time (Unix timestamp)
    pub exp: u64,

    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// Issuer (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl Claims {
    /// Check if the token carries `role`
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }

    /// Check if the token carries at least one of `roles`
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.has_role(*role))
    }
}

/// Extract the bearer token from the `Authorization` header
///
/// `Ok(None)` when there is no header at all; an error when the header is
/// present but not a bearer credential.
pub fn extract_token(headers: &HeaderMap) -> Result<Option<&str>, Error> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| Error::Unauthorized("Invalid Authorization header encoding".to_string()))?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(Error::Unauthorized(
            "Invalid Authorization header format".to_string(),
        )),
    }
}
