use coin_ledger::LedgerConfig;
use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub allowed_origins: Vec<String>,
    pub shutdown_timeout_secs: u64,
    pub keep_alive_secs: u64,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", 4)?
            .set_default("server.allowed_origins", vec!["http://localhost:5173"])?
            .set_default("server.shutdown_timeout_secs", 5)?
            .set_default("server.keep_alive_secs", 60)?
            .set_default("server.request_timeout_secs", 10)?
            .set_default("auth.jwt_secret", "")?
            .set_default("auth.token_ttl_hours", 24 * 7)?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(Environment::with_prefix("SHOP_GATEWAY").separator("__"));

        // Special handling for common env vars
        if let Some(db_url) = database_url_from_env(|key| env::var(key).ok()) {
            builder = builder.set_override("ledger.database.url", db_url)?;
        }

        if let Ok(redis_url) = env::var("REDIS_URL") {
            builder = builder
                .set_override("ledger.cache.backend", "redis")?
                .set_override("ledger.cache.redis_url", redis_url)?;
        }

        if let Ok(secret) = env::var("JWT_SECRET") {
            builder = builder.set_override("auth.jwt_secret", secret)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.server.workers == 0 {
            return Err("At least one worker is required".to_string());
        }

        if self.auth.jwt_secret.is_empty() {
            return Err("JWT secret is required".to_string());
        }

        if self.auth.token_ttl_hours <= 0 {
            return Err("Token lifetime must be positive".to_string());
        }

        self.ledger.validate().map_err(|e| e.to_string())
    }
}

/// `DATABASE_URL`, or a PostgreSQL URL composed from the `DB_*` variables
pub fn database_url_from_env(var: impl Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(url) = var("DATABASE_URL") {
        return Some(url);
    }

    let host = var("DB_HOST")?;
    let port = var("DB_PORT").unwrap_or_else(|| "5432".to_string());
    let username = var("DB_USERNAME").unwrap_or_else(|| "postgres".to_string());
    let password = var("DB_PASSWORD").unwrap_or_default();
    let database = var("DB_DATABASE").unwrap_or_else(|| "postgres".to_string());

    let mut url = format!(
        "postgres://{}:{}@{}:{}/{}?sslmode=disable",
        username, password, host, port, database
    );
    if let Some(schema) = var("DB_SCHEMA").filter(|s| !s.is_empty() && s != "public") {
        url.push_str(&format!("&options=-c%20search_path%3D{}", schema));
    }
    Some(url)
}
