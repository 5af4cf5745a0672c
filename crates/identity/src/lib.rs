//! Identity provider client
//!
//! Exchanges an email/password pair with the external identity provider and
//! turns a successful exchange into a registered session.
//!
//! Login flow:
//! 1. `encode::encode_password()` makes the plaintext password transport-safe
//! 2. `client::IdentityClient::login()` posts the pair to `{base_url}/auth/login`
//! 3. The upstream payload is sanitized and returned as an `AuthResponse`
//! 4. `authenticator::Authenticator` registers `access_token` in the token store

pub mod authenticator;
pub mod client;
pub mod encode;
pub mod error;
pub mod login;

pub use authenticator::{Authenticated, Authenticator, Registration};
pub use client::{AuthResponse, IdentityClient, sanitize_payload};
pub use encode::encode_password;
pub use error::{Error, Result};
pub use login::{LoginPair, validate_email};
