//! Configuration management for the BSCP server
//!
//! Settings are layered: `conf/application.yml`, then `BSCP__`-prefixed
//! environment variables (`BSCP__DB__TIMEOUT_MS=5000` sets
//! `bscp.db.timeout_ms`), then command line flags.

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use sea_orm::ConnectOptions;

use bscp_core::{GrpcAuthService, TokenCache, handler::rpc::DEFAULT_PUSH_BUFFER};

use crate::startup::LoggingConfig;

use super::constants::*;

/// Command line arguments for the server
#[derive(Debug, Default, Parser)]
#[command(name = "bscp-server", about = "BSCP configuration release server")]
pub struct Cli {
    /// Configuration file, without or with extension.
    #[arg(short = 'c', long = "config", default_value = "conf/application.yml")]
    pub config_file: String,
    #[arg(long = "grpc-port")]
    pub grpc_port: Option<u16>,
    #[arg(long = "http-port")]
    pub http_port: Option<u16>,
    /// Database shard URL; repeat once per shard, in routing order.
    #[arg(long = "db-shard", env = "BSCP_DB_SHARDS", value_delimiter = ',')]
    pub db_shards: Vec<String>,
    #[arg(long = "redis-url", env = "BSCP_REDIS_URL")]
    pub redis_url: Option<String>,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load from the process command line.
    pub fn new() -> anyhow::Result<Self> {
        Self::load(Cli::parse())
    }

    pub fn load(cli: Cli) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name(&cli.config_file).required(false))
            .add_source(
                Environment::with_prefix("BSCP")
                    .prefix_separator("__")
                    .separator("__")
                    .keep_prefix(true)
                    .try_parsing(true),
            );

        if let Some(v) = cli.grpc_port {
            builder = builder.set_override(GRPC_PORT, v)?;
        }
        if let Some(v) = cli.http_port {
            builder = builder.set_override(HTTP_PORT, v)?;
        }
        if !cli.db_shards.is_empty() {
            builder = builder.set_override(DB_SHARDS, cli.db_shards)?;
        }
        if let Some(v) = cli.redis_url {
            builder = builder.set_override(SIGNALLING_REDIS_URL, v)?;
        }

        let configuration = Self::from_config(builder.build()?);
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.shard_urls().is_empty() {
            anyhow::bail!("no database shard configured ({})", DB_SHARDS);
        }
        if self.auth_enabled() && self.token_secret_key().is_empty() {
            anyhow::bail!(
                "{} is required when {} is true",
                AUTH_TOKEN_SECRET_KEY,
                AUTH_ENABLED
            );
        }
        Ok(())
    }

    fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.config
            .get_int(key)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(default)
    }

    fn get_optional_string(&self, key: &str) -> Option<String> {
        self.config
            .get_string(key)
            .ok()
            .filter(|s| !s.trim().is_empty())
    }

    // ========================================================================
    // Server
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string(SERVER_ADDRESS)
            .unwrap_or(DEFAULT_SERVER_ADDRESS.to_string())
    }

    pub fn grpc_port(&self) -> u16 {
        u16::try_from(self.get_u64(GRPC_PORT, DEFAULT_GRPC_PORT as u64)).unwrap_or(DEFAULT_GRPC_PORT)
    }

    pub fn http_port(&self) -> u16 {
        u16::try_from(self.get_u64(HTTP_PORT, DEFAULT_HTTP_PORT as u64)).unwrap_or(DEFAULT_HTTP_PORT)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.get_u64(SHUTDOWN_TIMEOUT_MS, DEFAULT_SHUTDOWN_TIMEOUT_MS))
    }

    // ========================================================================
    // Database
    // ========================================================================

    /// Shard URLs in routing order.
    pub fn shard_urls(&self) -> Vec<String> {
        self.config
            .get::<Vec<String>>(DB_SHARDS)
            .unwrap_or_default()
            .into_iter()
            .filter(|url| !url.trim().is_empty())
            .collect()
    }

    /// Per-call timeout applied to every database round-trip.
    pub fn db_timeout(&self) -> Duration {
        Duration::from_millis(self.get_u64(DB_TIMEOUT_MS, DEFAULT_DB_TIMEOUT_MS))
    }

    pub fn auto_migrate(&self) -> bool {
        self.config.get_bool(DB_AUTO_MIGRATE).unwrap_or(false)
    }

    /// Pool options for every shard, sharing one pool configuration.
    pub fn shard_connect_options(&self) -> Vec<ConnectOptions> {
        let max_connections = self.get_u64(DB_MAX_CONNECTIONS, 50) as u32;
        let min_connections = self.get_u64(DB_MIN_CONNECTIONS, 1) as u32;
        let connect_timeout = self.get_u64(DB_CONNECT_TIMEOUT_SECS, 10);
        let idle_timeout = self.get_u64(DB_IDLE_TIMEOUT_SECS, 600);
        let sqlx_logging = self.config.get_bool(DB_SQLX_LOGGING).unwrap_or(false);

        tracing::info!(
            shards = self.shard_urls().len(),
            max_connections,
            min_connections,
            connect_timeout,
            sqlx_logging,
            "Database connection pools configured"
        );

        self.shard_urls()
            .into_iter()
            .map(|url| {
                let mut opt = ConnectOptions::new(url);
                opt.max_connections(max_connections)
                    .min_connections(min_connections)
                    .connect_timeout(Duration::from_secs(connect_timeout))
                    .idle_timeout(Duration::from_secs(idle_timeout))
                    .sqlx_logging(sqlx_logging);
                opt
            })
            .collect()
    }

    // ========================================================================
    // Auth
    // ========================================================================

    pub fn auth_enabled(&self) -> bool {
        self.config.get_bool(AUTH_ENABLED).unwrap_or(false)
    }

    pub fn token_secret_key(&self) -> String {
        self.config
            .get_string(AUTH_TOKEN_SECRET_KEY)
            .unwrap_or_default()
    }

    pub fn token_cache(&self) -> TokenCache {
        TokenCache::new(
            self.get_u64(AUTH_TOKEN_CACHE_CAPACITY, DEFAULT_TOKEN_CACHE_CAPACITY),
            Duration::from_secs(self.get_u64(AUTH_TOKEN_CACHE_TTL_SECS, DEFAULT_TOKEN_CACHE_TTL_SECS)),
        )
    }

    pub fn auth_service(&self) -> GrpcAuthService {
        GrpcAuthService::new(self.auth_enabled(), self.token_secret_key(), self.token_cache())
    }

    // ========================================================================
    // Sessions and signalling
    // ========================================================================

    pub fn push_buffer(&self) -> usize {
        self.get_u64(SESSION_PUSH_BUFFER, DEFAULT_PUSH_BUFFER as u64) as usize
    }

    pub fn heartbeat_interval_ms(&self) -> u64 {
        self.get_u64(SESSION_HEARTBEAT_INTERVAL_MS, DEFAULT_HEARTBEAT_INTERVAL_MS)
    }

    pub fn pull_interval_ms(&self) -> u64 {
        self.get_u64(SESSION_PULL_INTERVAL_MS, DEFAULT_PULL_INTERVAL_MS)
    }

    /// Redis URL of the shared signalling bus; none means in-process only.
    pub fn redis_url(&self) -> Option<String> {
        self.get_optional_string(SIGNALLING_REDIS_URL)
    }

    pub fn signalling_topic(&self) -> String {
        self.get_optional_string(SIGNALLING_TOPIC_KEY)
            .unwrap_or(SIGNALLING_TOPIC.to_string())
    }

    // ========================================================================
    // Downstream services
    // ========================================================================

    pub fn blob_endpoint(&self) -> Option<String> {
        self.get_optional_string(BLOB_ENDPOINT)
            .map(|s| s.trim_end_matches('/').to_string())
    }

    pub fn blob_timeout(&self) -> Duration {
        Duration::from_millis(self.get_u64(BLOB_TIMEOUT_MS, DEFAULT_BLOB_TIMEOUT_MS))
    }

    pub fn discovery_endpoint(&self) -> Option<String> {
        self.get_optional_string(DISCOVERY_ENDPOINT)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.get_u64(DISCOVERY_INTERVAL_SECS, DEFAULT_DISCOVERY_INTERVAL_SECS))
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.get_u64(DISCOVERY_TIMEOUT_MS, DEFAULT_DISCOVERY_TIMEOUT_MS))
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.get_optional_string(LOG_DIR),
            self.config.get_bool(LOG_CONSOLE).unwrap_or(true),
            self.config.get_bool(LOG_FILE).unwrap_or(true),
            self.config
                .get_string(LOG_LEVEL)
                .unwrap_or("info".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_yaml(yaml: &str) -> Configuration {
        Configuration::from_config(
            Config::builder()
                .add_source(File::from_str(yaml, FileFormat::Yaml))
                .build()
                .unwrap(),
        )
    }

    const SAMPLE: &str = r#"
bscp:
  server:
    grpc:
      port: 19510
  db:
    shards:
      - mysql://root@127.0.0.1/bscp_0
      - mysql://root@127.0.0.1/bscp_1
    timeout_ms: 1500
  auth:
    enabled: true
    token:
      secret_key: c2VjcmV0
      cache_ttl_secs: 60
  blob:
    endpoint: http://blob.local:8080/
"#;

    #[test]
    fn test_defaults() {
        let config = from_yaml("bscp: {}");
        assert_eq!(config.grpc_port(), DEFAULT_GRPC_PORT);
        assert_eq!(config.http_port(), DEFAULT_HTTP_PORT);
        assert_eq!(config.db_timeout(), Duration::from_millis(DEFAULT_DB_TIMEOUT_MS));
        assert!(!config.auth_enabled());
        assert_eq!(config.push_buffer(), DEFAULT_PUSH_BUFFER);
        assert_eq!(config.signalling_topic(), SIGNALLING_TOPIC);
        assert!(config.redis_url().is_none());
        assert!(config.blob_endpoint().is_none());
        assert!(config.shard_urls().is_empty());
    }

    #[test]
    fn test_values_from_yaml() {
        let config = from_yaml(SAMPLE);
        assert_eq!(config.grpc_port(), 19510);
        assert_eq!(config.shard_urls().len(), 2);
        assert_eq!(config.shard_connect_options().len(), 2);
        assert_eq!(config.db_timeout(), Duration::from_millis(1500));
        assert!(config.auth_enabled());
        assert!(config.auth_service().is_auth_enabled());
        assert_eq!(config.blob_endpoint().as_deref(), Some("http://blob.local:8080"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_shards() {
        let config = from_yaml("bscp: {}");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_secret_when_auth_enabled() {
        let config = from_yaml(
            r#"
bscp:
  db:
    shards: [ "mysql://root@127.0.0.1/bscp" ]
  auth:
    enabled: true
"#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(AUTH_TOKEN_SECRET_KEY));
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.yml");
        std::fs::write(&path, SAMPLE).unwrap();

        let cli = Cli::try_parse_from([
            "bscp-server",
            "--config",
            path.to_str().unwrap(),
            "--grpc-port",
            "20000",
            "--db-shard",
            "postgres://bscp@db/a,postgres://bscp@db/b,postgres://bscp@db/c",
        ])
        .unwrap();

        let config = Configuration::load(cli).unwrap();
        assert_eq!(config.grpc_port(), 20000);
        assert_eq!(config.shard_urls().len(), 3);
        assert_eq!(config.db_timeout(), Duration::from_millis(1500));
    }
}
