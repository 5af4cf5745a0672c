//! User directory lookups
//!
//! Read-only projection of user profile rows from the relational datastore.
//! Rows are not owned by this service; a lookup either finds one row or finds
//! nothing, and "nothing" is a normal outcome distinct from a datastore error.

pub mod error;
pub mod mysql;

pub use error::{Error, Result};
pub use mysql::{DatabaseTarget, MySqlDirectory};

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// A user profile row. Field names on the wire match the table's columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    #[serde(rename = "USER_GUID")]
    #[sqlx(rename = "USER_GUID")]
    pub user_guid: Option<String>,
    #[serde(rename = "STAFF_ID")]
    #[sqlx(rename = "STAFF_ID")]
    pub staff_id: Option<String>,
    #[serde(rename = "LOGIN_ID")]
    #[sqlx(rename = "LOGIN_ID")]
    pub login_id: Option<String>,
    #[serde(rename = "EMAIL")]
    #[sqlx(rename = "EMAIL")]
    pub email: Option<String>,
}

/// Keyed lookup of user records.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn UserDirectory>`).
pub trait UserDirectory: Send + Sync {
    /// Identifier for logging and the health endpoint.
    fn backend(&self) -> &str;

    /// Fetch at most one user by login id.
    fn find_by_login_id<'a>(
        &'a self,
        login_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<UserRecord>>> + Send + 'a>>;
}
