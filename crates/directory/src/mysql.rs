//! MariaDB / MySQL backed directory
//!
//! Every lookup borrows a connection from a pool, so concurrent requests never
//! share a cursor. The pool is built once at startup; failing to reach the
//! datastore there is fatal for the process.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use common::Secret;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::{UserDirectory, UserRecord};

/// Columns are cast to text so numeric ids decode into the string fields.
const FIND_BY_LOGIN_ID: &str = "SELECT \
    CAST(USER_GUID AS CHAR) AS USER_GUID, \
    CAST(STAFF_ID AS CHAR) AS STAFF_ID, \
    CAST(LOGIN_ID AS CHAR) AS LOGIN_ID, \
    CAST(EMAIL AS CHAR) AS EMAIL \
    FROM user_main WHERE LOGIN_ID = ? LIMIT 1";

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct DatabaseTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<Secret<String>>,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

pub struct MySqlDirectory {
    pool: MySqlPool,
}

impl MySqlDirectory {
    /// Build the pool and open its first connection.
    pub async fn connect(target: &DatabaseTarget) -> Result<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&target.user)
            .database(&target.database);
        if let Some(password) = &target.password {
            options = options.password(password.expose());
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(target.max_connections)
            .acquire_timeout(target.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::Connect(format!(
                    "{}@{}:{}/{}: {e}",
                    target.user, target.host, target.port, target.database
                ))
            })?;

        info!(
            host = %target.host,
            port = target.port,
            database = %target.database,
            max_connections = target.max_connections,
            "connected to user datastore"
        );
        Ok(Self { pool })
    }

    async fn lookup(&self, login_id: &str) -> Result<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(FIND_BY_LOGIN_ID)
            .bind(login_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Query(e.to_string()))?;
        debug!(login_id, found = record.is_some(), "user lookup");
        Ok(record)
    }
}

impl UserDirectory for MySqlDirectory {
    fn backend(&self) -> &str {
        "mysql"
    }

    fn find_by_login_id<'a>(
        &'a self,
        login_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<UserRecord>>> + Send + 'a>> {
        Box::pin(self.lookup(login_id))
    }
}
