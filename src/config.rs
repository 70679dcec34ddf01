use serde::Deserialize;
use std::path::Path;

use crate::dom::ContentType;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// The feed fetched on every run
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
    /// How the feed body is parsed
    #[serde(default)]
    pub content_type: ContentType,
    /// Selector sets synced into the media store at startup
    #[serde(default)]
    pub media: Vec<MediaConfig>,
}

fn default_feed_url() -> String {
    "https://zenn.dev/zenn/feed".to_string()
}

/// CSS selectors describing how to read feeds served from one hostname.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MediaConfig {
    pub hostname: String,
    pub feed_title_selector: String,
    pub feed_desc_selector: String,
    pub feed_last_updated_selector: String,
    pub item_selector: String,
    pub item_title_selector: String,
    pub item_link_selector: String,
    pub item_desc_selector: String,
    pub item_pubdate_selector: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}
