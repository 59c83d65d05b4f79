//! Runtime configuration
//!
//! Loaded once at startup from the environment (`.env` supported via dotenv).
//! Holds MySQL connection settings and the reasoning-provider chain settings.

use crate::error::{QueryError, Result};
use sqlx::mysql::MySqlConnectOptions;

/// MySQL connection settings.
#[derive(Debug, Clone)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Default database when a request does not name one.
    pub database: String,
}

impl MySqlConfig {
    /// Connection options for a specific database, or the server-level
    /// connection when `database` is `None` (used for catalog listing).
    pub fn connect_options(&self, database: Option<&str>) -> MySqlConnectOptions {
        let opts = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password);
        match database {
            Some(db) => opts.database(db),
            None => opts,
        }
    }
}

/// Settings for the completion-provider chain.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Preferred provider name; the rest of the chain is appended as fallback.
    pub primary: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub ollama_model: String,
    pub ollama_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mysql: MySqlConfig,
    pub providers: ProviderConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mysql = MySqlConfig {
            host: require("MYSQL_HOST")?,
            port: optional("MYSQL_PORT")
                .unwrap_or_else(|| "3306".to_string())
                .parse()
                .map_err(|e| QueryError::Config(format!("Invalid MYSQL_PORT: {}", e)))?,
            user: require("MYSQL_USER")?,
            password: require("MYSQL_PASSWORD")?,
            database: require("MYSQL_DATABASE")?,
        };

        let providers = ProviderConfig {
            primary: optional("LLM_PROVIDER")
                .unwrap_or_else(|| "groq".to_string())
                .to_lowercase(),
            groq_api_key: optional("GROQ_API_KEY"),
            groq_model: optional("GROQ_MODEL")
                .unwrap_or_else(|| "llama-3.1-8b-instant".to_string()),
            google_api_key: optional("GOOGLE_API_KEY"),
            gemini_model: optional("GEMINI_MODEL")
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            ollama_model: optional("OLLAMA_MODEL").unwrap_or_else(|| "llama3".to_string()),
            ollama_url: optional("OLLAMA_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
        };

        Ok(Self { mysql, providers })
    }
}

fn require(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| QueryError::Config(format!("{} is not set", key)))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
