//! HS256 token validation.

use barpi_stomp::UsernameResolver;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::AuthError;

/// Claims carried by tokens issued by the appliance's login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Numeric user id.
    #[serde(default)]
    pub user_id: i64,
    /// Login name.
    pub username: String,
    /// Role name (`user`, `admin`, ...).
    #[serde(default)]
    pub role: String,
    /// Whether the long-lived "remember me" expiry was requested.
    #[serde(default)]
    pub remember: bool,
    /// Expiry, Unix seconds.
    pub exp: u64,
}

/// Validates HS256 tokens and yields the `username` claim.
pub struct JwtUsernameResolver {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtUsernameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtUsernameResolver").finish_non_exhaustive()
    }
}

impl JwtUsernameResolver {
    /// Build a resolver for the given shared secret.
    pub fn new(secret: &str) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        })
    }

    /// Decode and validate a token, returning its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

impl UsernameResolver for JwtUsernameResolver {
    fn resolve(&self, token: &str) -> Option<String> {
        match self.validate(token) {
            Ok(claims) => {
                debug!(username = %claims.username, "bearer token accepted");
                Some(claims.username)
            }
            Err(AuthError::Jwt(e)) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                warn!("bearer token expired");
                None
            }
            Err(e) => {
                warn!(error = %e, "bearer token rejected");
                None
            }
        }
    }
}
