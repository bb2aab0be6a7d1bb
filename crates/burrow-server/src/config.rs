//! Configuration management for the Burrow server
//!
//! Settings load from a YAML file, `BURROW_*` environment variables and
//! command line overrides, in that order of precedence. Environment
//! variables nest with a double underscore (`BURROW_SERVER__PORT` is
//! `server.port`), leaving single underscores free for key names like
//! `default_lock_ttl_secs`.

use std::time::Duration;

use config::{Config, Environment};

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_PATH: &str = "burrow.redb";
pub const DEFAULT_LOCK_TTL_SECS: u64 = 300;

/// Application configuration loaded from config file and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

/// Command line overrides applied on top of file and environment sources.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<String>,
    pub token: Option<String>,
}

impl Configuration {
    pub fn new(config_path: &str, overrides: Overrides) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("burrow")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(host) = overrides.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = overrides.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(path) = overrides.database_path {
            builder = builder.set_override("database.path", path)?;
        }
        if let Some(token) = overrides.token {
            builder = builder.set_override("server.token", token)?;
        }

        Ok(Configuration {
            config: builder.build()?,
        })
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn log_level(&self) -> String {
        self.config
            .get_string("log.level")
            .unwrap_or("info".to_string())
    }

    /// Either "text" or "json".
    pub fn log_format(&self) -> String {
        self.config
            .get_string("log.format")
            .unwrap_or("text".to_string())
    }

    // ========================================================================
    // Server
    // ========================================================================

    pub fn server_host(&self) -> String {
        self.config
            .get_string("server.host")
            .unwrap_or(DEFAULT_SERVER_HOST.to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config
            .get_int("server.port")
            .unwrap_or(DEFAULT_SERVER_PORT.into()) as u16
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host(), self.server_port())
    }

    /// Static token every request must present. `None` disables
    /// authentication.
    pub fn server_token(&self) -> Option<String> {
        self.config.get_string("server.token").ok()
    }

    pub fn tls_cert_path(&self) -> Option<String> {
        self.config.get_string("server.tls.cert_path").ok()
    }

    pub fn tls_key_path(&self) -> Option<String> {
        self.config.get_string("server.tls.key_path").ok()
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls_cert_path().is_some() && self.tls_key_path().is_some()
    }

    // ========================================================================
    // Database
    // ========================================================================

    pub fn database_path(&self) -> String {
        self.config
            .get_string("database.path")
            .unwrap_or(DEFAULT_DATABASE_PATH.to_string())
    }

    /// Advisory nesting depth for bucket paths; not enforced.
    pub fn max_bucket_depth(&self) -> u32 {
        self.config
            .get_int("database.max_bucket_depth")
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(3)
    }

    pub fn default_lock_ttl(&self) -> Duration {
        let secs = self
            .config
            .get_int("database.default_lock_ttl_secs")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(DEFAULT_LOCK_TTL_SECS);
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let configuration = Configuration::default();
        assert_eq!(configuration.server_host(), DEFAULT_SERVER_HOST);
        assert_eq!(configuration.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(configuration.database_path(), DEFAULT_DATABASE_PATH);
        assert_eq!(
            configuration.default_lock_ttl(),
            Duration::from_secs(DEFAULT_LOCK_TTL_SECS)
        );
        assert_eq!(configuration.server_token(), None);
        assert!(!configuration.tls_enabled());
    }

    #[test]
    fn test_env_nested_keys_resolve() {
        unsafe { std::env::set_var("BURROW_SERVER__PORT", "7070") };
        let configuration = Configuration::new("does-not-exist", Overrides::default()).unwrap();
        unsafe { std::env::remove_var("BURROW_SERVER__PORT") };
        assert_eq!(configuration.server_port(), 7070);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            host: Some("0.0.0.0".to_string()),
            port: Some(9090),
            database_path: Some("/tmp/test.redb".to_string()),
            token: Some("secret".to_string()),
        };
        let configuration = Configuration::new("does-not-exist", overrides).unwrap();
        assert_eq!(configuration.server_address(), "0.0.0.0:9090");
        assert_eq!(configuration.database_path(), "/tmp/test.redb");
        assert_eq!(configuration.server_token(), Some("secret".to_string()));
    }
}
