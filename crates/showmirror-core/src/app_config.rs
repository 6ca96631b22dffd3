use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Root of the upstream catalog API, without a trailing slash.
    pub catalog_base_url: String,
    pub catalog_user_agent: String,
    /// Per-call timeout for a single catalog request. Independent of the run.
    pub catalog_request_timeout_secs: u64,
    /// Minimum gap between any two catalog requests, shared by all workers.
    pub catalog_request_delay_ms: u64,
    /// Additional attempts after the first failure of a transient fetch.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_backoff_factor: f64,
    pub retry_max_delay_ms: u64,
    /// Upper bound on shows processed in parallel within a run.
    pub max_concurrent_shows: usize,
    /// Six-field cron expression for the scheduled incremental update.
    pub update_schedule: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("catalog_base_url", &self.catalog_base_url)
            .field("catalog_user_agent", &self.catalog_user_agent)
            .field(
                "catalog_request_timeout_secs",
                &self.catalog_request_timeout_secs,
            )
            .field("catalog_request_delay_ms", &self.catalog_request_delay_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_backoff_factor", &self.retry_backoff_factor)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("max_concurrent_shows", &self.max_concurrent_shows)
            .field("update_schedule", &self.update_schedule)
            .finish()
    }
}
