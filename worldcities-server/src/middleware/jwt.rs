//! JWT authentication middleware

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::{fs, sync::Arc};

use super::token::{extract_token, Claims};
use crate::{config::JwtConfig, error::Error};

/// Validates bearer tokens and attaches their [`Claims`] to the request
#[derive(Clone)]
pub struct JwtAuth {
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
}

impl JwtAuth {
    /// Build from configuration, reading the key from `key_path`
    pub fn new(config: &JwtConfig) -> Result<Self, Error> {
        let key = fs::read(&config.key_path).map_err(|e| {
            Error::Config(Box::new(figment::Error::from(format!(
                "Failed to read JWT key from '{}': {}",
                config.key_path.display(),
                e
            ))))
        })?;

        let algorithm = parse_algorithm(&config.algorithm)?;
        let decoding_key = match algorithm {
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
                DecodingKey::from_rsa_pem(&key)?
            }
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(&key)?,
            _ => DecodingKey::from_secret(&key),
        };

        Ok(Self::with_key(
            decoding_key,
            algorithm,
            config.issuer.as_deref(),
            config.audience.as_deref(),
        ))
    }

    /// Build from an in-memory key
    pub fn with_key(
        decoding_key: DecodingKey,
        algorithm: Algorithm,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: Arc::new(decoding_key),
            validation,
        }
    }

    /// Decode and validate `token`
    pub fn validate_token(&self, token: &str) -> Result<Claims, Error> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Middleware attaching claims when a valid bearer token is presented
    ///
    /// Never rejects by itself: a missing, malformed, expired or foreign token
    /// leaves the request anonymous, and route guards answer 401 where a
    /// role is required.
    pub async fn middleware(
        State(auth): State<Self>,
        mut request: Request<Body>,
        next: Next,
    ) -> Response {
        if let Some(claims) = auth.claims_for(&request) {
            tracing::debug!(sub = %claims.sub, roles = ?claims.roles, "Authenticated request");
            request.extensions_mut().insert(claims);
        }

        next.run(request).await
    }

    fn claims_for(&self, request: &Request<Body>) -> Option<Claims> {
        let token = match extract_token(request.headers()) {
            Ok(token) => token?,
            Err(e) => {
                tracing::warn!(path = %request.uri().path(), "Ignoring Authorization header: {}", e);
                return None;
            }
        };

        match self.validate_token(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::warn!(path = %request.uri().path(), "Rejected bearer token: {}", e);
                None
            }
        }
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm, Error> {
    match name.to_uppercase().as_str() {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "ES256" => Ok(Algorithm::ES256),
        "ES384" => Ok(Algorithm::ES384),
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        alg => Err(Error::Config(Box::new(figment::Error::from(format!(
            "Unsupported JWT algorithm: {}",
            alg
        ))))),
    }
}
