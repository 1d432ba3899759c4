//! Bearer token issuance and verification

use crate::config::AuthConfig;
use crate::error::{GatewayError, GatewayResult};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::server::ErrorResponse;

#[cfg(test)]
mod tests;

const SUBJECT: &str = "starwars_api_user";
const ROLE: &str = "user";

/// Claims carried by issued tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

/// Body returned by `POST /auth`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Issues and verifies HS256 tokens
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> GatewayResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(GatewayError::ConfigError("JWT secret must not be empty".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            ttl_secs: config.token_ttl_secs,
        })
    }

    /// Issue a fresh token for the shared API user
    pub fn issue(&self) -> GatewayResult<TokenResponse> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: SUBJECT.to_string(),
            role: ROLE.to_string(),
            iat: now,
            exp: now + self.ttl_secs as i64,
            jti: Uuid::new_v4().to_string(),
        };

        Ok(TokenResponse {
            access_token: self.sign(&claims)?,
            token_type: "bearer".to_string(),
            expires_in: self.ttl_secs,
        })
    }

    fn sign(&self, claims: &Claims) -> GatewayResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| GatewayError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str) -> GatewayResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    GatewayError::Unauthorized("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    GatewayError::Unauthorized("Token signature is invalid".to_string())
                }
                _ => GatewayError::Unauthorized(format!("Token validation failed: {}", e)),
            })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(ErrorResponse {
            error: "unauthorized".to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Reject requests without a valid bearer token; verified claims go into request extensions
pub async fn require_bearer(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match header_value.and_then(bearer_token) {
        Some(token) => token,
        None => {
            debug!("Request without bearer token rejected");
            return unauthorized("Missing bearer token");
        }
    };

    match tokens.verify(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            warn!("Bearer token rejected: {}", e);
            unauthorized("Invalid or expired token")
        }
    }
}
