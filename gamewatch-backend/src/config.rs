use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Request body size limit in bytes
    /// Env: REQUEST_BODY_LIMIT (default: 1048576 = 1MB)
    pub request_body_limit: usize,

    /// Request timeout in seconds
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Outbound delivery timeout in seconds
    /// Env: DELIVERY_TIMEOUT_SECS (default: 15)
    pub delivery_timeout: Duration,

    /// Server port
    /// Env: PORT (default: 5100)
    pub port: u16,

    /// Database file path
    /// Env: DATABASE_PATH (default: "gamewatch.db")
    pub database_path: String,

    /// Discord webhook URL for group chat alerts
    /// Env: DISCORD_WEBHOOK (required at startup, checked in main)
    pub discord_webhook_url: Option<String>,

    /// Twilio account SID
    /// Env: TWILIO_ACCT_SID (required at startup, checked in main)
    pub twilio_account_sid: Option<String>,

    /// Twilio auth token
    /// Env: TWILIO_AUTH_TOKEN (required at startup, checked in main)
    pub twilio_auth_token: Option<String>,

    /// Twilio sending number
    /// Env: TWILIO_TN (required at startup, checked in main)
    pub twilio_from_number: Option<String>,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for debugging mostly
        Self {
            request_body_limit: env_or_default("REQUEST_BODY_LIMIT", 1024 * 1024),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 30)),
            delivery_timeout: Duration::from_secs(env_or_default("DELIVERY_TIMEOUT_SECS", 15)),
            port: env_or_default("PORT", 5100),
            database_path: env_or_default_string("DATABASE_PATH", "gamewatch.db"),
            discord_webhook_url: var("DISCORD_WEBHOOK").ok(),
            twilio_account_sid: var("TWILIO_ACCT_SID").ok(),
            twilio_auth_token: var("TWILIO_AUTH_TOKEN").ok(),
            twilio_from_number: var("TWILIO_TN").ok(),
        }
    }

    /// Create configuration with all default values
    pub fn default() -> Self {
        Self {
            request_body_limit: 1024 * 1024, // 1 MB
            request_timeout: Duration::from_secs(30),
            delivery_timeout: Duration::from_secs(15),
            port: 5100,
            database_path: "gamewatch.db".to_string(),
            discord_webhook_url: None,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from_number: None,
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
