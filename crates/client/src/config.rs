use crate::error::ConfigError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MAX_PAGE_SIZE: usize = 100;

/// Client runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Forum root, e.g. `https://discuss.example.org`
    pub base_url: String,

    /// Path of the JSON:API root below `base_url`
    pub api_path: String,

    /// Optional API key sent as `Authorization: Token <key>`
    pub api_token: Option<String>,

    /// Posts requested per post-stream page
    pub page_size: usize,

    /// Transport timeout in seconds
    pub timeout_secs: u64,

    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_path: "/api".to_string(),
            api_token: None,
            page_size: 20,
            timeout_secs: 30,
            user_agent: concat!("forum-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `FORUM_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Applies `FORUM_BASE_URL`, `FORUM_API_PATH`, `FORUM_API_TOKEN`,
    /// `FORUM_PAGE_SIZE` and `FORUM_TIMEOUT_SECS` from `lookup`.
    pub fn apply_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(value) = get("FORUM_BASE_URL") {
            self.base_url = value;
        }
        if let Some(value) = get("FORUM_API_PATH") {
            self.api_path = value;
        }
        if let Some(value) = get("FORUM_API_TOKEN") {
            self.api_token = Some(value);
        }
        if let Some(value) = get("FORUM_PAGE_SIZE") {
            self.page_size = parse_env("FORUM_PAGE_SIZE", &value)?;
        }
        if let Some(value) = get("FORUM_TIMEOUT_SECS") {
            self.timeout_secs = parse_env("FORUM_TIMEOUT_SECS", &value)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if !self.api_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "api_path must start with '/', got {:?}",
                self.api_path
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "page_size must be within 1..={MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    /// JSON:API root, e.g. `https://discuss.example.org/api`.
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let joined = format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_path.trim_end_matches('/')
        );
        let url = Url::parse(&joined)
            .map_err(|e| ConfigError::Invalid(format!("api url {joined:?}: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "api url {joined:?} cannot be a base"
            )));
        }
        Ok(url)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        config.validate().expect("valid");
        assert_eq!(
            config.api_url().expect("api url").as_str(),
            "http://localhost:8080/api"
        );
    }

    #[test]
    fn env_overrides_defaults() {
        let config = ClientConfig::default()
            .apply_env(lookup(&[
                ("FORUM_BASE_URL", "https://discuss.example.org/"),
                ("FORUM_PAGE_SIZE", " 50 "),
                ("FORUM_API_TOKEN", "abc"),
                ("FORUM_TIMEOUT_SECS", ""),
            ]))
            .expect("config");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.api_token.as_deref(), Some("abc"));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(
            config.api_url().expect("api url").as_str(),
            "https://discuss.example.org/api"
        );
    }

    #[test]
    fn env_rejects_bad_numbers_and_ranges() {
        let err = ClientConfig::default()
            .apply_env(lookup(&[("FORUM_PAGE_SIZE", "lots")]))
            .expect_err("not a number");
        assert!(matches!(err, ConfigError::Env { .. }));

        let err = ClientConfig::default()
            .apply_env(lookup(&[("FORUM_PAGE_SIZE", "0")]))
            .expect_err("zero");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn toml_fills_missing_fields_with_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
base_url = "https://discuss.example.org"
page_size = 10
"#,
        )
        .expect("toml");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.api_path, "/api");

        let err = ClientConfig::from_toml_str(r#"base_url = "ftp://x""#).expect_err("scheme");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn toml_file_is_read_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("forum.toml");
        std::fs::write(&path, "api_path = \"/v1\"\n").expect("write");
        let config = ClientConfig::from_toml_file(&path).expect("config");
        assert_eq!(config.api_path, "/v1");
    }
}
