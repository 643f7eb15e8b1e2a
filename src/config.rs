//! Process-wide relay configuration.
//!
//! Read once from the environment at startup and passed into the engine;
//! nothing mutates it afterwards. The API key is mandatory; without it the
//! relay refuses to start, because every upstream request must carry it.

use reqwest::Url;
use thiserror::Error;

/// Environment variable holding the DataStore API key.
pub const API_KEY_ENV: &str = "REPORTDASH_API_KEY";

/// Environment variable overriding the DataStore endpoint URL.
pub const API_URL_ENV: &str = "REPORTDASH_API_URL";

/// Default DataStore MCP endpoint.
pub const DEFAULT_API_URL: &str = "https://datastore.reportdash.com/api/mcp/v1";

/// Immutable relay configuration: where to POST and which key to present.
#[derive(Debug, Clone)]
pub struct Config {
    /// DataStore MCP endpoint. HTTP or HTTPS per the URL scheme.
    pub api_url: Url,
    /// Credential sent in the `X-Api-Key` header on every request.
    pub api_key: String,
}

/// Errors that prevent the relay from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "{API_KEY_ENV} environment variable is required. Get your API key from \
         ReportDash DataStore (https://datastore.reportdash.com) > Destinations > API Access."
    )]
    MissingApiKey,
    #[error("invalid {API_URL_ENV} '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `REPORTDASH_API_KEY` must be set and non-empty; `REPORTDASH_API_URL`
    /// falls back to the production endpoint when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let url = std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&url).map_err(|e| ConfigError::InvalidApiUrl {
            url,
            reason: e.to_string(),
        })?;

        Ok(Config { api_url, api_key })
    }

    /// Build a configuration directly (tests and embedding).
    pub fn new(api_url: Url, api_key: impl Into<String>) -> Self {
        Config {
            api_url,
            api_key: api_key.into(),
        }
    }

    /// The API key with everything but the first 10 and last 4 characters
    /// elided, for human-readable diagnostics.
    ///
    /// Counts characters, not bytes: keys are not guaranteed to be ASCII.
    pub fn redacted_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 14 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..10].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url_parses() {
        let url = Url::parse(DEFAULT_API_URL).unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("datastore.reportdash.com"));
    }

    #[test]
    fn redacted_key_keeps_ends() {
        let config = Config::new(
            Url::parse(DEFAULT_API_URL).unwrap(),
            "rd_0123456789abcdef",
        );
        assert_eq!(config.redacted_key(), "rd_0123456...cdef");
    }

    #[test]
    fn redacted_key_handles_multibyte_keys() {
        // 6 characters but 18 bytes; byte-indexed slicing would panic here.
        let config = Config::new(Url::parse(DEFAULT_API_URL).unwrap(), "€€€€€€");
        assert_eq!(config.redacted_key(), "******");

        let config = Config::new(
            Url::parse(DEFAULT_API_URL).unwrap(),
            "ключ-секрет-0123456789",
        );
        assert_eq!(config.redacted_key(), "ключ-секре...6789");
    }

    #[test]
    fn redacted_key_hides_short_keys_entirely() {
        let config = Config::new(Url::parse(DEFAULT_API_URL).unwrap(), "short");
        assert_eq!(config.redacted_key(), "*****");
    }

    #[test]
    fn missing_key_message_points_at_dashboard() {
        let message = ConfigError::MissingApiKey.to_string();
        assert!(message.contains(API_KEY_ENV));
        assert!(message.contains("datastore.reportdash.com"));
    }
}
