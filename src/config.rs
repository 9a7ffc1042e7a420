//! Configuration file parser for ~/.config/opdsview/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde and reported with a warning.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::convert::FeedViewConverter;
use crate::opds::{identifier_for_url, FeedDocument, FetchOptions};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Two `[[catalogs]]` entries resolve to the same identifier.
    #[error("Duplicate catalog identifier in config file: {0}")]
    DuplicateCatalog(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// A catalog listed under `[[catalogs]]`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub title: String,
    pub url: String,
    /// Defaults to the SHA-256 of the URL when omitted.
    #[serde(default)]
    pub identifier: Option<String>,
}

impl CatalogEntry {
    pub fn to_document(&self) -> FeedDocument {
        FeedDocument {
            identifier: self
                .identifier
                .clone()
                .unwrap_or_else(|| identifier_for_url(&self.url)),
            title: self.title.clone(),
            url: self.url.clone(),
        }
    }
}

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be given.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Language tags tried in order when a title has several translations.
    pub preferred_languages: Vec<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Retries for rate-limited, failing or truncated responses.
    pub max_retries: u32,

    /// Largest catalog page accepted, in bytes.
    pub max_feed_size_bytes: usize,

    /// Allow catalogs on localhost or private networks (e.g. a home server).
    pub allow_private_hosts: bool,

    /// Known catalogs, listed by `opdsview catalogs`.
    pub catalogs: Vec<CatalogEntry>,
}

impl Default for Config {
    fn default() -> Self {
        let fetch = FetchOptions::default();
        Self {
            preferred_languages: vec!["en".to_string()],
            request_timeout_secs: fetch.timeout.as_secs(),
            max_retries: fetch.max_retries,
            max_feed_size_bytes: fetch.max_size,
            allow_private_hosts: fetch.allow_private_hosts,
            catalogs: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "preferred_languages",
        "request_timeout_secs",
        "max_retries",
        "max_feed_size_bytes",
        "allow_private_hosts",
        "catalogs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Two catalogs with the same identifier → `Err(ConfigError::DuplicateCatalog)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
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
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            catalogs = config.catalogs.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text. Blank text yields the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
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

        let mut seen = HashSet::new();
        for document in config.catalog_documents() {
            if !seen.insert(document.identifier.clone()) {
                return Err(ConfigError::DuplicateCatalog(document.identifier));
            }
        }

        Ok(config)
    }

    /// The configured catalogs as documents, in file order.
    pub fn catalog_documents(&self) -> Vec<FeedDocument> {
        self.catalogs.iter().map(CatalogEntry::to_document).collect()
    }

    /// Looks up a configured catalog by identifier.
    pub fn find_catalog(&self, identifier: &str) -> Option<FeedDocument> {
        self.catalog_documents()
            .into_iter()
            .find(|d| d.identifier == identifier)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            max_size: self.max_feed_size_bytes,
            allow_private_hosts: self.allow_private_hosts,
            ..FetchOptions::default()
        }
    }

    pub fn converter(&self) -> FeedViewConverter {
        FeedViewConverter::new(self.preferred_languages.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.preferred_languages, vec!["en".to_string()]);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_feed_size_bytes, 10 * 1024 * 1024);
        assert!(!config.allow_private_hosts);
        assert!(config.catalogs.is_empty());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/opdsview_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.preferred_languages, vec!["en".to_string()]);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("opdsview_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "  \n ").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.catalogs.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("opdsview_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
preferred_languages = ["fr", "en"]
request_timeout_secs = 10
max_retries = 1
max_feed_size_bytes = 2048
allow_private_hosts = true

[[catalogs]]
title = "Gutenberg"
url = "https://m.gutenberg.org/ebooks.opds/"

[[catalogs]]
title = "Home server"
url = "http://192.168.1.10:8080/opds"
identifier = "home"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.preferred_languages, vec!["fr", "en"]);
        assert!(config.allow_private_hosts);

        let options = config.fetch_options();
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.max_retries, 1);
        assert_eq!(options.max_size, 2048);
        assert!(options.allow_private_hosts);

        let documents = config.catalog_documents();
        assert_eq!(documents.len(), 2);
        assert_eq!(
            documents[0].identifier,
            identifier_for_url("https://m.gutenberg.org/ebooks.opds/")
        );
        assert_eq!(documents[1].identifier, "home");
        assert_eq!(
            config.find_catalog("home").map(|d| d.title),
            Some("Home server".to_string())
        );
        assert!(config.find_catalog("missing").is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_toml("max_retries = 5\n").unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.preferred_languages, vec!["en".to_string()]);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::from_toml("preferred_languages = \"en\"\n").is_err());
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("theme = \"dark\"\nmax_retries = 2\n").unwrap();
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_catalog_requires_url() {
        let result = Config::from_toml("[[catalogs]]\ntitle = \"No URL\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_duplicate_catalogs_rejected() {
        let content = r#"
[[catalogs]]
title = "One"
url = "https://example.com/opds"

[[catalogs]]
title = "Two"
url = "https://example.com/opds"
"#;
        let err = Config::from_toml(content).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCatalog(_)));
    }

    #[test]
    fn test_converter_uses_language_preferences() {
        let config = Config::from_toml("preferred_languages = [\"de\"]\n").unwrap();
        assert_eq!(config.converter().preferred_languages(), ["de".to_string()]);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("opdsview_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
