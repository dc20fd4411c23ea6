//! # barpi-auth
//!
//! Resolves the bearer token presented in a STOMP `CONNECT` frame to the
//! username it was issued for. Tokens are HS256 JWTs signed with the
//! shared `JWT_SECRET`.

#![deny(unsafe_code)]

pub mod errors;
pub mod jwt;

pub use errors::AuthError;
pub use jwt::{Claims, JwtUsernameResolver};
