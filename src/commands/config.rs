use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{DownloaderError, Result};

/// Immutable settings for one run. Built once in `main` and passed by reference.
///
/// Every field has a default, so a config file only needs the keys it overrides.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloaderConfig {
    pub users_api: String,
    pub thumbnails_api: String,
    pub avatar_api: String,
    pub games_api: String,
    pub groups_api: String,
    pub catalog_api: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Pause between two CDN mirrors for the same hash.
    pub mirror_delay_ms: u64,
    /// Pause between two texture downloads.
    pub texture_delay_ms: u64,
    /// Pause between two 2D thumbnail downloads.
    pub image_delay_ms: u64,
    /// Pause between two users of a batch.
    pub user_delay_ms: u64,
    pub thumbnail_sizes: Vec<String>,
    pub include_textures: bool,
    /// Extra CDN hosts tried after `t0`..`t7`.
    pub cdn_alternates: Vec<String>,
    /// Base URLs (scheme included) tried in order instead of every rbxcdn
    /// host, e.g. a local cache. Empty means `t0`..`t7` plus `cdn_alternates`.
    pub cdn_mirrors: Vec<String>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            users_api: "https://users.roblox.com".into(),
            thumbnails_api: "https://thumbnails.roblox.com".into(),
            avatar_api: "https://avatar.roblox.com".into(),
            games_api: "https://games.roblox.com".into(),
            groups_api: "https://groups.roblox.com".into(),
            catalog_api: "https://catalog.roblox.com".into(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
            request_timeout_secs: 30,
            mirror_delay_ms: 500,
            texture_delay_ms: 300,
            image_delay_ms: 100,
            user_delay_ms: 2000,
            thumbnail_sizes: vec!["150x150".into(), "420x420".into()],
            include_textures: true,
            cdn_alternates: vec![
                "tr.rbxcdn.com".into(),
                "c0.rbxcdn.com".into(),
                "c1.rbxcdn.com".into(),
            ],
            cdn_mirrors: Vec::new(),
        }
    }
}

impl DownloaderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn mirror_delay(&self) -> Duration {
        Duration::from_millis(self.mirror_delay_ms)
    }

    pub fn texture_delay(&self) -> Duration {
        Duration::from_millis(self.texture_delay_ms)
    }

    pub fn image_delay(&self) -> Duration {
        Duration::from_millis(self.image_delay_ms)
    }

    pub fn user_delay(&self) -> Duration {
        Duration::from_millis(self.user_delay_ms)
    }
}

/// Loads the config from an optional JSON file, falling back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<DownloaderConfig> {
    let Some(path) = path else {
        return Ok(DownloaderConfig::default());
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        DownloaderError::Custom(format!("Cannot read config {}: {e}", path.display()))
    })?;
    let config: DownloaderConfig = serde_json::from_str(&content)?;

    if config.thumbnail_sizes.is_empty() {
        return Err(DownloaderError::Custom(
            "thumbnailSizes must contain at least one size".into(),
        ));
    }

    Ok(config)
}
