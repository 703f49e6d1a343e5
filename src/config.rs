//! Configuration
//!
//! Connection parameters for PostgreSQL and the language-model endpoint, resolved
//! from the environment (a `.env` file is honoured by the binary via `dotenv`).

use crate::error::{ChatSqlError, Result};
use sqlx::postgres::PgConnectOptions;
use std::fmt;

/// Resolved configuration for one run
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database: DatabaseConfig::from_lookup(&lookup)?,
            llm: LlmConfig::from_lookup(&lookup)?,
        })
    }
}

/// PostgreSQL connection parameters
#[derive(Clone, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    /// Full connection URL; when set it takes precedence over the individual fields
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_connections: 1,
            url: None,
        }
    }
}

impl DatabaseConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match non_empty(lookup("PGPORT")) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ChatSqlError::Config(format!("Invalid PGPORT '{}': {}", raw, e)))?,
            None => defaults.port,
        };

        let max_connections = match non_empty(lookup("PG_MAX_CONNECTIONS")) {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                ChatSqlError::Config(format!("Invalid PG_MAX_CONNECTIONS '{}': {}", raw, e))
            })?,
            None => defaults.max_connections,
        };

        if max_connections == 0 {
            return Err(ChatSqlError::Config(
                "PG_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }

        let config = Self {
            host: non_empty(lookup("PGHOST")).unwrap_or(defaults.host),
            port,
            database: non_empty(lookup("PGDATABASE")).unwrap_or(defaults.database),
            user: non_empty(lookup("PGUSER")).unwrap_or(defaults.user),
            password: lookup("PGPASSWORD").unwrap_or_default(),
            max_connections,
            url: None,
        };

        match non_empty(lookup("DATABASE_URL")) {
            Some(url) => config.with_url(url),
            None => Ok(config),
        }
    }

    /// Connect through a URL; host, port, database and user are taken from it
    pub fn with_url(mut self, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let options = url
            .parse::<PgConnectOptions>()
            .map_err(|e| ChatSqlError::Config(format!("Invalid database URL: {}", e)))?;

        self.host = options.get_host().to_string();
        self.port = options.get_port();
        self.user = options.get_username().to_string();
        self.database = options
            .get_database()
            .map(str::to_string)
            .unwrap_or_else(|| self.user.clone());
        self.url = Some(url);
        Ok(self)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// How the API key is presented to the model endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmAuth {
    /// `api-key: <key>` header (Azure OpenAI / AI Studio)
    #[default]
    ApiKeyHeader,
    /// `Authorization: Bearer <key>`
    Bearer,
}

impl std::str::FromStr for LlmAuth {
    type Err = ChatSqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "api-key" | "api_key" | "apikey" => Ok(LlmAuth::ApiKeyHeader),
            "bearer" => Ok(LlmAuth::Bearer),
            other => Err(ChatSqlError::Config(format!(
                "Unknown LLM_AUTH '{}', expected 'api-key' or 'bearer'",
                other
            ))),
        }
    }
}

/// Language-model endpoint parameters
#[derive(Clone, PartialEq)]
pub struct LlmConfig {
    /// Full chat-completions URL
    pub url: String,
    pub api_key: String,
    /// Sent as `model` in the request body when the endpoint needs it
    pub model: Option<String>,
    pub auth: LlmAuth,
}

impl LlmConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            model: None,
            auth: LlmAuth::default(),
        }
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = non_empty(lookup("LLM_URL"))
            .or_else(|| non_empty(lookup("GPT4V_URL")))
            .ok_or_else(|| ChatSqlError::Config("LLM_URL is not set".to_string()))?;

        let api_key = non_empty(lookup("LLM_API_KEY"))
            .or_else(|| non_empty(lookup("GPT4V_KEY")))
            .ok_or_else(|| ChatSqlError::Config("LLM_API_KEY is not set".to_string()))?;

        let auth = match non_empty(lookup("LLM_AUTH")) {
            Some(raw) => raw.parse()?,
            None => LlmAuth::default(),
        };

        Ok(Self {
            url,
            api_key,
            model: non_empty(lookup("LLM_MODEL")),
            auth,
        })
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("auth", &self.auth)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
