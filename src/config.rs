//! Configuration file parser for ~/.config/rss-extractor/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::feed::DEFAULT_ARTICLES;

/// Public CORS relay used when no other relay is configured.
pub const DEFAULT_RELAY_PREFIX: &str = "https://thingproxy.freeboard.io/fetch/";

/// Feeds loaded when the caller names none.
pub const DEFAULT_FEEDS: &[&str] = &[
    "https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml",
    "https://feeds.theguardian.com/theguardian/world/rss",
    "https://engineering.fb.com/feed/",
    "https://blog.cloudflare.com/rss/",
    "https://stackoverflow.blog/feed/",
];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix prepended to every feed URL. Empty = fetch directly.
    pub relay_prefix: String,

    /// Transport timeout in seconds. 0 = no timeout.
    pub timeout_secs: u64,

    /// Maximum accepted response body size in bytes.
    pub max_feed_bytes: usize,

    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Initial display window (`Feed::articles`) of newly registered feeds.
    pub default_articles: u32,

    /// Feeds fetched when none are given on the command line.
    pub default_feeds: Vec<String>,

    /// Maximum number of feeds fetched at once.
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_prefix: DEFAULT_RELAY_PREFIX.to_string(),
            timeout_secs: 0,
            max_feed_bytes: 10 * 1024 * 1024, // 10MB
            user_agent: concat!("rss-extractor/", env!("CARGO_PKG_VERSION")).to_string(),
            default_articles: DEFAULT_ARTICLES,
            default_feeds: DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect(),
            concurrency: 5,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "relay_prefix",
        "timeout_secs",
        "max_feed_bytes",
        "user_agent",
        "default_articles",
        "default_feeds",
        "concurrency",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text. Blank text yields defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            relay = %config.relay_prefix,
            feeds = config.default_feeds.len(),
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(test_name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("rss_extractor_config_{test_name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.relay_prefix, DEFAULT_RELAY_PREFIX);
        assert_eq!(config.timeout_secs, 0);
        assert_eq!(config.max_feed_bytes, 10 * 1024 * 1024);
        assert_eq!(config.default_articles, 5);
        assert_eq!(config.default_feeds.len(), 5);
        assert_eq!(config.concurrency, 5);
        assert!(config.user_agent.starts_with("rss-extractor/"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/rss_extractor_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_file_returns_default() {
        let path = write_config("empty", "   \n  \n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("partial", "relay_prefix = \"\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.relay_prefix, "");
        assert_eq!(config.default_articles, 5);
        assert_eq!(config.default_feeds.len(), 5);
        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let path = write_config(
            "full",
            r#"
relay_prefix = "https://relay.example/?url="
timeout_secs = 20
max_feed_bytes = 4096
user_agent = "custom/1.0"
default_articles = 10
default_feeds = ["https://a.example/rss", "https://b.example/atom"]
concurrency = 2
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config,
            Config {
                relay_prefix: "https://relay.example/?url=".to_string(),
                timeout_secs: 20,
                max_feed_bytes: 4096,
                user_agent: "custom/1.0".to_string(),
                default_articles: 10,
                default_feeds: vec![
                    "https://a.example/rss".to_string(),
                    "https://b.example/atom".to_string()
                ],
                concurrency: 2,
            }
        );
        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("concurrency = 3\ntotally_fake_key = 1\n").unwrap();
        assert_eq!(config.concurrency, 3);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::from_toml("default_articles = \"five\"\n").is_err());
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }
}
