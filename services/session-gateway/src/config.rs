//! Configuration types and loading
//!
//! Precedence: env vars > config file > defaults. The config file is optional;
//! without one the gateway runs on defaults plus environment. Cache and
//! datastore passwords come only from the environment (REDIS_PASSWORD,
//! DB_PASSWORD), never from the TOML file.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "session-gateway.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub identity: IdentityConfig,
    pub cache: CacheConfig,
    pub database: DatabaseConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub max_connections: usize,
}

/// Identity provider settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base URL; logins are posted to `{base_url}/auth/login`
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

/// Session cache settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    /// How often the in-memory backend reclaims expired sessions
    pub sweep_interval_secs: u64,
}

/// User datastore settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_connections: 1000,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: "https://appcore.beesuite.app/api".into(),
            timeout_secs: 10,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            host: "127.0.0.1".into(),
            port: 6379,
            username: Some("default".into()),
            password: None,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3306,
            user: "root".into(),
            password: None,
            database: "cloud_services_db_dev".into(),
            max_connections: 5,
            acquire_timeout_secs: 5,
        }
    }
}

impl IdentityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DatabaseConfig {
    pub fn target(&self) -> directory::DatabaseTarget {
        directory::DatabaseTarget {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then overlay the
    /// process environment and validate.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.overlay(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> common::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn overlay<F>(&mut self, lookup: F) -> common::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("LISTEN_ADDR") {
            self.server.listen_addr = parse_env("LISTEN_ADDR", &addr)?;
        }
        if let Some(url) = lookup("API_BASE_URL") {
            self.identity.base_url = url;
        }

        if let Some(backend) = lookup("CACHE_BACKEND") {
            self.cache.backend = match backend.to_ascii_lowercase().as_str() {
                "redis" => CacheBackend::Redis,
                "memory" => CacheBackend::Memory,
                other => {
                    return Err(common::Error::Env {
                        var: "CACHE_BACKEND".into(),
                        reason: format!("expected redis or memory, got {other}"),
                    });
                }
            };
        }
        if let Some(host) = lookup("REDIS_HOST") {
            self.cache.host = host;
        }
        if let Some(port) = lookup("REDIS_PORT") {
            self.cache.port = parse_env("REDIS_PORT", &port)?;
        }
        if let Some(user) = lookup("REDIS_USER") {
            self.cache.username = Some(user).filter(|u| !u.is_empty());
        }
        if let Some(password) = lookup("REDIS_PASSWORD") {
            self.cache.password = Some(Secret::new(password));
        }

        if let Some(host) = lookup("DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.database.port = parse_env("DB_PORT", &port)?;
        }
        if let Some(user) = lookup("DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.database.password = Some(Secret::new(password));
        }
        if let Some(database) = lookup("DB_DATABASE") {
            self.database.database = database;
        }
        Ok(())
    }

    pub fn validate(&self) -> common::Result<()> {
        if !self.identity.base_url.starts_with("http://")
            && !self.identity.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "identity base_url must start with http:// or https://, got: {}",
                self.identity.base_url
            )));
        }
        if self.identity.timeout_secs == 0 {
            return Err(common::Error::Config(
                "identity timeout_secs must be greater than 0".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "server max_connections must be greater than 0".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(common::Error::Config(
                "database max_connections must be greater than 0".into(),
            ));
        }
        if self.cache.backend == CacheBackend::Memory && self.cache.sweep_interval_secs == 0 {
            return Err(common::Error::Config(
                "cache sweep_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the config file from CLI arg, then CONFIG_PATH env var, then
    /// the default file if it exists. `None` means run on defaults.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }
}

fn parse_env<T>(var: &str, raw: &str) -> common::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| common::Error::Env {
        var: var.into(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serializes tests that mutate process environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_legacy_deployment() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr.port(), 8000);
        assert_eq!(config.identity.base_url, "https://appcore.beesuite.app/api");
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.cache.port, 6379);
        assert_eq!(config.cache.username.as_deref(), Some("default"));
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.database, "cloud_services_db_dev");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_keys() {
        let config = Config::from_toml(
            r#"
[identity]
base_url = "https://idp.example/api"

[cache]
backend = "memory"
"#,
        )
        .unwrap();
        assert_eq!(config.identity.base_url, "https://idp.example/api");
        assert_eq!(config.identity.timeout_secs, 10);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::from_toml(
            r#"
[database]
host = "file-host"
port = 3307
"#,
        )
        .unwrap();
        config
            .overlay(env(&[
                ("DB_HOST", "env-host"),
                ("DB_PASSWORD", "dbpw"),
                ("REDIS_PORT", "6380"),
                ("REDIS_PASSWORD", "redispw"),
                ("API_BASE_URL", "http://localhost:9000/api"),
            ]))
            .unwrap();

        assert_eq!(config.database.host, "env-host");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.password.as_ref().unwrap().expose(), "dbpw");
        assert_eq!(config.cache.port, 6380);
        assert_eq!(config.cache.password.as_ref().unwrap().expose(), "redispw");
        assert_eq!(config.identity.base_url, "http://localhost:9000/api");
    }

    #[test]
    fn secrets_are_not_read_from_toml() {
        let config = Config::from_toml(
            r#"
[database]
password = "from-file"
"#,
        );
        // `password` is skipped by serde, so the key is simply ignored
        assert!(config.unwrap().database.password.is_none());
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        let mut config = Config::default();
        let err = config.overlay(env(&[("DB_PORT", "33o6")])).unwrap_err();
        assert!(err.to_string().contains("DB_PORT"), "got: {err}");
    }

    #[test]
    fn unknown_cache_backend_is_rejected() {
        let mut config = Config::default();
        assert!(config.overlay(env(&[("CACHE_BACKEND", "memcached")])).is_err());

        let mut config = Config::default();
        config.overlay(env(&[("CACHE_BACKEND", "Memory")])).unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Memory);
    }

    #[test]
    fn empty_redis_user_means_no_username() {
        let mut config = Config::default();
        config.overlay(env(&[("REDIS_USER", "")])).unwrap();
        assert!(config.cache.username.is_none());
    }

    #[test]
    fn base_url_without_scheme_is_rejected() {
        let mut config = Config::default();
        config.identity.base_url = "appcore.beesuite.app/api".into();
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains("must start with http"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut config = Config::default();
        config.identity.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file_and_validates() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session-gateway.toml");
        std::fs::write(
            &path,
            r#"
[server]
listen_addr = "127.0.0.1:9000"

[identity]
base_url = "ftp://nope"
"#,
        )
        .unwrap();
        unsafe { remove_env("API_BASE_URL") };

        assert!(Config::load(Some(path.as_path())).is_err(), "ftp base_url must be rejected");
    }

    #[test]
    fn load_missing_file_errors() {
        let result = Config::load(Some(Path::new("/nonexistent/session-gateway.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_invalid_toml_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid {{{{ toml").unwrap();
        assert!(Config::load(Some(path.as_path())).is_err());
    }

    #[test]
    fn resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(path, Some(PathBuf::from("/cli/wins.toml")));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, Some(PathBuf::from("/env/path.toml")));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn database_target_carries_password() {
        let mut config = Config::default();
        config.overlay(env(&[("DB_PASSWORD", "dbpw")])).unwrap();
        let target = config.database.target();
        assert_eq!(target.password.as_ref().unwrap().expose(), "dbpw");
        assert_eq!(target.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn shipped_example_parses_and_validates() {
        let config =
            Config::from_toml(include_str!("../../../session-gateway.example.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.database.database, "cloud_services_db_dev");
        assert!(config.cache.password.is_none());
    }
}
