//! YAML configuration: the source being watched, the store location, the
//! notification destinations, and the classifier endpoint.
//!
//! Loaded once at process start and passed by reference into the
//! components that need it; nothing reads configuration ambiently. The
//! SMS credentials deliberately live outside this file; they arrive via
//! environment-backed CLI flags (see [`crate::cli`]).
//!
//! # Example
//!
//! ```yaml
//! source:
//!   url: "https://www.cnet.com/ai-atlas/"
//!   origin: "https://www.cnet.com"
//!   selector: "a.c-storiesNeonHighlightsCard_link"
//! store:
//!   path: "data/atlas_watch.sqlite"
//! notifier:
//!   from: "+15005550006"
//!   destinations:
//!     - "+15551230001"
//!     - "+15551230002"
//! classifier:
//!   endpoint: "http://127.0.0.1:8602/classify"
//! watch:
//!   interval_secs: 900
//! ```

use crate::error::ConfigError;
use scraper::Selector;
use serde::Deserialize;
use std::fs;
use std::time::Duration;
use url::Url;

fn default_timeout_secs() -> u64 {
    30
}

fn default_store_path() -> String {
    "data/atlas_watch.sqlite".to_string()
}

fn default_interval_secs() -> u64 {
    900
}

/// Top-level configuration file shape.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub notifier: NotifierConfig,
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    /// Read and parse the configuration file at `path`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config = serde_yaml::from_str(&raw)?;
        Ok(config)
    }
}

/// The news page being watched.
#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    /// Page to fetch each run.
    pub url: String,
    /// Fixed origin used to absolutize relative story links.
    pub origin: String,
    /// CSS selector matching story link elements.
    pub selector: String,
    /// Fetch timeout; a timed-out fetch fails the run's fetch stage.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SourceConfig {
    pub fn url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.url).map_err(|source| ConfigError::Url {
            field: "source.url",
            value: self.url.clone(),
            source,
        })
    }

    pub fn origin(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|source| ConfigError::Url {
            field: "source.origin",
            value: self.origin.clone(),
            source,
        })
    }

    pub fn selector(&self) -> Result<Selector, ConfigError> {
        Selector::parse(&self.selector).map_err(|e| ConfigError::Selector {
            rule: self.selector.clone(),
            message: e.to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where the item store lives.
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// SMS notification settings (credentials excluded; see [`crate::cli`]).
#[derive(Debug, Deserialize)]
pub struct NotifierConfig {
    /// Sending phone number in E.164 form.
    pub from: String,
    /// One or more destination numbers, notified independently.
    pub destinations: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The remote classification endpoint.
#[derive(Debug, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ClassifierConfig {
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.endpoint).map_err(|source| ConfigError::Url {
            field: "classifier.endpoint",
            value: self.endpoint.clone(),
            source,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Cadence for the periodic `watch` subcommand.
#[derive(Debug, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
source:
  url: "https://www.cnet.com/ai-atlas/"
  origin: "https://www.cnet.com"
  selector: "a.c-storiesNeonHighlightsCard_link"
  timeout_secs: 10
store:
  path: "/tmp/atlas_test.sqlite"
notifier:
  from: "+15005550006"
  destinations: ["+15551230001", "+15551230002"]
classifier:
  endpoint: "http://127.0.0.1:8602/classify"
watch:
  interval_secs: 60
"#;

    const MINIMAL: &str = r#"
source:
  url: "https://www.cnet.com/ai-atlas/"
  origin: "https://www.cnet.com"
  selector: "a.c-storiesNeonHighlightsCard_link"
notifier:
  from: "+15005550006"
  destinations: ["+15551230001"]
classifier:
  endpoint: "http://127.0.0.1:8602/classify"
"#;

    #[test]
    fn test_full_config_parses() {
        let config: Config = serde_yaml::from_str(FULL).unwrap();
        assert_eq!(config.source.timeout(), Duration::from_secs(10));
        assert_eq!(config.store.path, "/tmp/atlas_test.sqlite");
        assert_eq!(config.notifier.destinations.len(), 2);
        assert_eq!(config.watch.interval_secs, 60);
    }

    #[test]
    fn test_minimal_config_applies_defaults() {
        let config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.source.timeout_secs, 30);
        assert_eq!(config.store.path, "data/atlas_watch.sqlite");
        assert_eq!(config.notifier.timeout_secs, 30);
        assert_eq!(config.classifier.timeout_secs, 30);
        assert_eq!(config.watch.interval_secs, 900);
    }

    #[test]
    fn test_parsed_accessors() {
        let config: Config = serde_yaml::from_str(FULL).unwrap();
        assert!(config.source.url().is_ok());
        assert!(config.source.origin().is_ok());
        assert!(config.source.selector().is_ok());
        assert!(config.classifier.endpoint().is_ok());
    }

    #[test]
    fn test_bad_selector_is_an_error() {
        let mut config: Config = serde_yaml::from_str(FULL).unwrap();
        config.source.selector = ":::not-a-selector".to_string();
        assert!(config.source.selector().is_err());
    }

    #[test]
    fn test_bad_url_is_an_error() {
        let mut config: Config = serde_yaml::from_str(FULL).unwrap();
        config.source.url = "not a url".to_string();
        assert!(config.source.url().is_err());
    }
}
