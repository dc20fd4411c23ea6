//! Authentication errors.

/// Errors raised while building or using a token resolver.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No signing secret was configured.
    #[error("JWT secret is not configured")]
    MissingSecret,

    /// The token failed decoding or validation.
    #[error("token rejected: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}
