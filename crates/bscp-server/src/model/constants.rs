//! Configuration keys and defaults for the BSCP server

pub use bscp_common::SIGNALLING_TOPIC;

// Server
pub const SERVER_ADDRESS: &str = "bscp.server.address";
pub const GRPC_PORT: &str = "bscp.server.grpc.port";
pub const HTTP_PORT: &str = "bscp.server.http.port";
pub const SHUTDOWN_TIMEOUT_MS: &str = "bscp.server.shutdown_timeout_ms";

pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_GRPC_PORT: u16 = 9510;
pub const DEFAULT_HTTP_PORT: u16 = 9511;
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 3000;

// Database shards
pub const DB_SHARDS: &str = "bscp.db.shards";
pub const DB_TIMEOUT_MS: &str = "bscp.db.timeout_ms";
pub const DB_MAX_CONNECTIONS: &str = "bscp.db.pool.max_connections";
pub const DB_MIN_CONNECTIONS: &str = "bscp.db.pool.min_connections";
pub const DB_CONNECT_TIMEOUT_SECS: &str = "bscp.db.pool.connect_timeout_secs";
pub const DB_IDLE_TIMEOUT_SECS: &str = "bscp.db.pool.idle_timeout_secs";
pub const DB_SQLX_LOGGING: &str = "bscp.db.pool.sqlx_logging";
pub const DB_AUTO_MIGRATE: &str = "bscp.db.auto_migrate";

pub const DEFAULT_DB_TIMEOUT_MS: u64 = 3000;

// Auth
pub const AUTH_ENABLED: &str = "bscp.auth.enabled";
pub const AUTH_TOKEN_SECRET_KEY: &str = "bscp.auth.token.secret_key";
pub const AUTH_TOKEN_CACHE_CAPACITY: &str = "bscp.auth.token.cache_capacity";
pub const AUTH_TOKEN_CACHE_TTL_SECS: &str = "bscp.auth.token.cache_ttl_secs";

pub const DEFAULT_TOKEN_CACHE_CAPACITY: u64 = 10_000;
pub const DEFAULT_TOKEN_CACHE_TTL_SECS: u64 = 300;

// Sessions
pub const SESSION_PUSH_BUFFER: &str = "bscp.session.push_buffer";
pub const SESSION_HEARTBEAT_INTERVAL_MS: &str = "bscp.session.heartbeat_interval_ms";
pub const SESSION_PULL_INTERVAL_MS: &str = "bscp.session.pull_interval_ms";

pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 15_000;
pub const DEFAULT_PULL_INTERVAL_MS: u64 = 60_000;

// Signalling bus
pub const SIGNALLING_REDIS_URL: &str = "bscp.signalling.redis_url";
pub const SIGNALLING_TOPIC_KEY: &str = "bscp.signalling.topic";

// Blob store
pub const BLOB_ENDPOINT: &str = "bscp.blob.endpoint";
pub const BLOB_TIMEOUT_MS: &str = "bscp.blob.timeout_ms";

pub const DEFAULT_BLOB_TIMEOUT_MS: u64 = 2000;

// Discovery load reporting
pub const DISCOVERY_ENDPOINT: &str = "bscp.discovery.endpoint";
pub const DISCOVERY_INTERVAL_SECS: &str = "bscp.discovery.interval_secs";
pub const DISCOVERY_TIMEOUT_MS: &str = "bscp.discovery.timeout_ms";

pub const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 2000;

// Logging
pub const LOG_DIR: &str = "bscp.log.dir";
pub const LOG_CONSOLE: &str = "bscp.log.console";
pub const LOG_FILE: &str = "bscp.log.file";
pub const LOG_LEVEL: &str = "bscp.log.level";
