//! Sync pipeline configuration
//!
//! Configuration is an explicit struct built once at process start and passed
//! by reference into the components that need it. No component reads ambient
//! global state.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tributary_common::{Result, SyncError};

use crate::connectors::http::RetryPolicy;

/// Retry schedule applied to every outbound connector request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2,
            max_delay_secs: 10,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs(self.base_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Orchestrator tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Bounded entity channel size between producer and orchestrator.
    pub channel_capacity: usize,
    /// Publish a job snapshot every N processed entities.
    pub publish_every: usize,
    /// Connection string for the Postgres-backed hash store. When unset the
    /// in-memory store is used and incremental state does not survive the
    /// process.
    pub hash_store_url: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            publish_every: 50,
            hash_store_url: None,
        }
    }
}

/// Discord source credentials and paging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    pub base_url: String,
    pub page_size: usize,
    pub member_page_size: usize,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: "https://discord.com/api/v10".to_string(),
            page_size: 100,
            member_page_size: 1000,
        }
    }
}

/// Dixa source credentials and paging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DixaConfig {
    pub api_key: String,
    pub base_url: String,
    pub page_size: usize,
}

impl Default for DixaConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://dev.dixa.io/v1".to_string(),
            page_size: 100,
        }
    }
}

/// Intercom source credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntercomConfig {
    pub token: String,
    pub base_url: String,
}

impl Default for IntercomConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: "https://api.intercom.io".to_string(),
        }
    }
}

/// Tabular (Postgres) source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresSourceConfig {
    pub url: String,
    pub schema: String,
    /// `"*"` for every base table, or a comma-separated list.
    pub tables: String,
    pub batch_size: usize,
}

impl Default for PostgresSourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            schema: "public".to_string(),
            tables: "*".to_string(),
            batch_size: 50,
        }
    }
}

/// Top-level configuration for one Tributary process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub retry: RetryConfig,
    pub sync: SyncSettings,
    pub discord: Option<DiscordConfig>,
    pub dixa: Option<DixaConfig>,
    pub intercom: Option<IntercomConfig>,
    pub postgres: Option<PostgresSourceConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables. Source blocks are only
    /// present when their credential variable is set.
    pub fn from_env() -> Result<Self> {
        let retry = RetryConfig {
            max_attempts: env_or("SYNC_RETRY_MAX_ATTEMPTS", 3),
            base_delay_secs: env_or("SYNC_RETRY_BASE_DELAY_SECS", 2),
            max_delay_secs: env_or("SYNC_RETRY_MAX_DELAY_SECS", 10),
        };
        let sync = SyncSettings {
            channel_capacity: env_or("SYNC_CHANNEL_CAPACITY", 64),
            publish_every: env_or("SYNC_PUBLISH_EVERY", 50),
            hash_store_url: std::env::var("SYNC_HASH_STORE_URL").ok(),
        };

        let discord = std::env::var("SOURCE_DISCORD_TOKEN").ok().map(|token| {
            let mut config = DiscordConfig {
                token,
                ..DiscordConfig::default()
            };
            if let Ok(url) = std::env::var("SOURCE_DISCORD_BASE_URL") {
                config.base_url = url;
            }
            config.page_size = env_or("SOURCE_DISCORD_PAGE_SIZE", config.page_size);
            config
        });

        let dixa = std::env::var("SOURCE_DIXA_API_KEY").ok().map(|api_key| {
            let mut config = DixaConfig {
                api_key,
                ..DixaConfig::default()
            };
            if let Ok(url) = std::env::var("SOURCE_DIXA_BASE_URL") {
                config.base_url = url;
            }
            config.page_size = env_or("SOURCE_DIXA_PAGE_SIZE", config.page_size);
            config
        });

        let intercom = std::env::var("SOURCE_INTERCOM_TOKEN").ok().map(|token| {
            let mut config = IntercomConfig {
                token,
                ..IntercomConfig::default()
            };
            if let Ok(url) = std::env::var("SOURCE_INTERCOM_BASE_URL") {
                config.base_url = url;
            }
            config
        });

        let postgres = std::env::var("SOURCE_POSTGRES_URL").ok().map(|url| {
            let mut config = PostgresSourceConfig {
                url,
                ..PostgresSourceConfig::default()
            };
            if let Ok(schema) = std::env::var("SOURCE_POSTGRES_SCHEMA") {
                config.schema = schema;
            }
            if let Ok(tables) = std::env::var("SOURCE_POSTGRES_TABLES") {
                config.tables = tables;
            }
            config.batch_size = env_or("SOURCE_POSTGRES_BATCH_SIZE", config.batch_size);
            config
        });

        let config = Self {
            retry,
            sync,
            discord,
            dixa,
            intercom,
            postgres,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, failing fast before any sync starts.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(SyncError::Configuration(
                "SYNC_RETRY_MAX_ATTEMPTS must be greater than 0".into(),
            ));
        }
        if self.sync.channel_capacity == 0 {
            return Err(SyncError::Configuration(
                "SYNC_CHANNEL_CAPACITY must be greater than 0".into(),
            ));
        }
        if self.sync.publish_every == 0 {
            return Err(SyncError::Configuration(
                "SYNC_PUBLISH_EVERY must be greater than 0".into(),
            ));
        }
        if let Some(discord) = &self.discord {
            if discord.page_size == 0 || discord.member_page_size == 0 {
                return Err(SyncError::Configuration(
                    "discord page sizes must be greater than 0".into(),
                ));
            }
        }
        if let Some(dixa) = &self.dixa {
            if dixa.page_size == 0 {
                return Err(SyncError::Configuration(
                    "SOURCE_DIXA_PAGE_SIZE must be greater than 0".into(),
                ));
            }
        }
        if let Some(postgres) = &self.postgres {
            if postgres.batch_size == 0 {
                return Err(SyncError::Configuration(
                    "SOURCE_POSTGRES_BATCH_SIZE must be greater than 0".into(),
                ));
            }
            if postgres.schema.is_empty() {
                return Err(SyncError::Configuration(
                    "SOURCE_POSTGRES_SCHEMA cannot be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
