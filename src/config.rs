use anyhow::Result;
use compute::IdempotencyGuard;
use config::{Config, Environment, File};
use sea_orm::Database;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::auth::JwtKeys;
use crate::schemas::AppState;
use crate::sms::DeepSeekParser;

/// Signing secret used when none is configured. Fine for local runs only.
pub const DEFAULT_JWT_SECRET: &str = "easybill-development-secret";

/// Application configuration.
///
/// Sources are layered: built-in defaults, then an optional `easybill.toml`
/// in the working directory, then `EASYBILL__SECTION__KEY` environment
/// variables (e.g. `EASYBILL__AI__API_KEY`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub ai: AiConfig,
    pub idempotency: IdempotencyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

/// OpenAI-compatible chat completion endpoint used to read SMS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    pub ttl_days: u64,
    pub max_capacity: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://easybill.db?mode=rwc".to_string(),
            },
            server: ServerConfig {
                bind_address: "0.0.0.0:3000".to_string(),
                request_timeout_secs: 30,
            },
            auth: AuthConfig {
                jwt_secret: DEFAULT_JWT_SECRET.to_string(),
                token_ttl_hours: 24,
            },
            ai: AiConfig {
                base_url: "https://api.deepseek.com".to_string(),
                api_key: String::new(),
                model: "deepseek-chat".to_string(),
                timeout_secs: 30,
            },
            idempotency: IdempotencyConfig {
                ttl_days: 7,
                max_capacity: 100_000,
            },
        }
    }
}

impl AppConfig {
    /// Loads the configuration file at `path` (extension optional, may be
    /// absent) over the defaults, then the environment over both.
    pub fn load_from(path: &str) -> Result<Self> {
        debug!("Loading configuration from {} and environment", path);
        let config = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("EASYBILL")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Command line flags win over every other source.
    pub fn apply_overrides(&mut self, database_url: Option<String>, bind_address: Option<String>) {
        if let Some(url) = database_url {
            self.database.url = url;
        }
        if let Some(address) = bind_address {
            self.server.bind_address = address;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency.ttl_days * 24 * 60 * 60)
    }
}

/// Initialize application state from configuration
pub async fn initialize_app_state(config: &AppConfig) -> Result<AppState> {
    if config.auth.jwt_secret == DEFAULT_JWT_SECRET {
        warn!("Using the built-in JWT secret; set EASYBILL__AUTH__JWT_SECRET in production");
    }
    if config.ai.api_key.is_empty() {
        warn!("No AI API key configured; incoming SMS will be stored for manual entry");
    }

    // Connect to database
    info!("Connecting to database: {}", config.database.url);
    let db = Database::connect(&config.database.url).await?;

    let parser = DeepSeekParser::new(&config.ai)?;
    debug!("AI parser targets {} with model {}", parser.endpoint(), config.ai.model);

    let idempotency =
        IdempotencyGuard::new(config.idempotency_ttl(), config.idempotency.max_capacity);

    Ok(AppState {
        db,
        idempotency,
        parser: Arc::new(parser),
        jwt: JwtKeys::new(&config.auth.jwt_secret, config.auth.token_ttl_hours),
        request_timeout: config.request_timeout(),
    })
}
