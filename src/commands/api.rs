use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::commands::config::DownloaderConfig;
use crate::error::{DownloaderError, Result};

/// The three 2D renders the thumbnails API offers for a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThumbnailKind {
    FullBody,
    Headshot,
    Bust,
}

impl ThumbnailKind {
    pub const ALL: [ThumbnailKind; 3] = [
        ThumbnailKind::FullBody,
        ThumbnailKind::Headshot,
        ThumbnailKind::Bust,
    ];

    fn endpoint(self) -> &'static str {
        match self {
            ThumbnailKind::FullBody => "avatar",
            ThumbnailKind::Headshot => "avatar-headshot",
            ThumbnailKind::Bust => "avatar-bust",
        }
    }

    /// File name stem, e.g. `headshot` in `headshot_420x420.png`.
    pub fn file_stem(self) -> &'static str {
        match self {
            ThumbnailKind::FullBody => "avatar",
            ThumbnailKind::Headshot => "headshot",
            ThumbnailKind::Bust => "bust",
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThumbnailEntry {
    pub target_id: u64,
    pub state: String,
    pub image_url: Option<String>,
}

impl ThumbnailEntry {
    /// Only finished renders have a usable image URL.
    pub fn ready_url(&self) -> Option<&str> {
        if self.state == "Completed" {
            self.image_url.as_deref().filter(|u| !u.is_empty())
        } else {
            None
        }
    }
}

/// One hit of the username → user lookup.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsernameMatch {
    pub requested_username: String,
    pub id: u64,
    pub name: String,
    pub display_name: String,
}

/// Hashes and framing info returned by the avatar-3d metadata document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Avatar3dMetadata {
    pub obj: Option<String>,
    pub mtl: Option<String>,
    pub textures: Vec<String>,
    pub camera: Value,
    pub aabb: Value,
}

impl Avatar3dMetadata {
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Thin wrapper around one reusable `reqwest::Client` and the run's config.
pub struct RobloxClient {
    http: reqwest::Client,
    config: DownloaderConfig,
}

impl RobloxClient {
    pub fn new(config: DownloaderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// GET a JSON document. Any status other than 200 is an `HttpStatus` error.
    pub async fn fetch_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        debug!("GET {url} {query:?}");
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(DownloaderError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    pub async fn user_info(&self, user_id: u64) -> Result<Option<Value>> {
        let url = format!("{}/v1/users/{user_id}", self.config.users_api);
        optional(self.fetch_json(&url, &[]).await, "user info")
    }

    /// Resolve up to 10 usernames in one request. Unknown names are simply absent.
    pub async fn lookup_usernames(&self, usernames: &[String]) -> Result<Vec<UsernameMatch>> {
        let url = format!("{}/v1/usernames/users", self.config.users_api);
        let body = json!({
            "usernames": usernames,
            "excludeBannedUsers": false,
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(DownloaderError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let result: Value = response.json().await?;
        Ok(data_array(&result)
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect())
    }

    pub async fn search_users(&self, keyword: &str, limit: u32) -> Result<Vec<Value>> {
        let url = format!("{}/v1/users/search", self.config.users_api);
        let query = [
            ("keyword", keyword.to_string()),
            ("limit", limit.min(25).to_string()),
        ];
        let result = optional(self.fetch_json(&url, &query).await, "user search")?;
        Ok(result.map(|v| data_array(&v).to_vec()).unwrap_or_default())
    }

    pub async fn user_thumbnails(
        &self,
        user_id: u64,
        kind: ThumbnailKind,
        size: &str,
    ) -> Result<Vec<ThumbnailEntry>> {
        let url = format!("{}/v1/users/{}", self.config.thumbnails_api, kind.endpoint());
        let query = [
            ("userIds", user_id.to_string()),
            ("size", size.to_string()),
            ("format", "Png".to_string()),
            ("isCircular", "false".to_string()),
        ];
        let result = optional(self.fetch_json(&url, &query).await, kind.endpoint())?;
        Ok(result.map(|v| thumbnail_entries(&v)).unwrap_or_default())
    }

    pub async fn asset_thumbnails(&self, asset_id: u64) -> Result<Vec<ThumbnailEntry>> {
        let url = format!("{}/v1/assets", self.config.thumbnails_api);
        let query = [
            ("assetIds", asset_id.to_string()),
            ("size", "420x420".to_string()),
            ("format", "Png".to_string()),
        ];
        let result = optional(self.fetch_json(&url, &query).await, "asset thumbnail")?;
        Ok(result.map(|v| thumbnail_entries(&v)).unwrap_or_default())
    }

    /// Two-step fetch: the avatar-3d endpoint hands out a URL to the real
    /// metadata document (OBJ/MTL/texture hashes, camera, bounding box).
    pub async fn avatar_3d_metadata(&self, user_id: u64) -> Result<Option<Value>> {
        let url = format!("{}/v1/users/avatar-3d", self.config.thumbnails_api);
        let Some(response) = optional(
            self.fetch_json(&url, &[("userId", user_id.to_string())]).await,
            "avatar-3d",
        )?
        else {
            return Ok(None);
        };

        // Older responses wrap the entry in a `data` array
        let entry = match data_array(&response).first() {
            Some(first) => first.clone(),
            None => response,
        };

        let state = entry["state"].as_str().unwrap_or("Unknown");
        if state != "Completed" {
            warn!("3D avatar for {user_id} is not ready yet (state: {state})");
            return Ok(None);
        }

        let Some(image_url) = entry["imageUrl"].as_str().filter(|u| !u.is_empty()) else {
            warn!("3D avatar response for {user_id} has no imageUrl");
            return Ok(None);
        };

        optional(self.fetch_json(image_url, &[]).await, "3D metadata")
    }

    pub async fn avatar_config(&self, user_id: u64) -> Result<Value> {
        let url = format!("{}/v1/users/{user_id}/avatar", self.config.avatar_api);
        self.fetch_json(&url, &[]).await
    }

    pub async fn currently_wearing(&self, user_id: u64) -> Result<Value> {
        let url = format!("{}/v1/users/{user_id}/currently-wearing", self.config.avatar_api);
        self.fetch_json(&url, &[]).await
    }

    pub async fn avatar_thumbnail_info(&self, user_id: u64) -> Result<Value> {
        let url = format!("{}/v1/users/avatar", self.config.thumbnails_api);
        let query = [
            ("userIds", user_id.to_string()),
            ("size", "720x720".to_string()),
            ("format", "Png".to_string()),
            ("isCircular", "false".to_string()),
        ];
        self.fetch_json(&url, &query).await
    }

    pub async fn games(&self, user_id: u64) -> Result<Value> {
        let url = format!("{}/v2/users/{user_id}/games", self.config.games_api);
        let query = [
            ("accessFilter", "Public".to_string()),
            ("limit", "10".to_string()),
        ];
        self.fetch_json(&url, &query).await
    }

    pub async fn groups(&self, user_id: u64) -> Result<Value> {
        let url = format!("{}/v2/users/{user_id}/groups/roles", self.config.groups_api);
        self.fetch_json(&url, &[]).await
    }

    pub async fn outfits(&self, user_id: u64) -> Result<Value> {
        let url = format!("{}/v1/users/{user_id}/outfits", self.config.avatar_api);
        let query = [
            ("page", "1".to_string()),
            ("itemsPerPage", "10".to_string()),
        ];
        self.fetch_json(&url, &query).await
    }

    pub async fn asset_types(&self) -> Result<Value> {
        let url = format!("{}/v1/avatar/asset-types", self.config.avatar_api);
        self.fetch_json(&url, &[]).await
    }

    pub async fn catalog_details(&self, asset_id: u64) -> Result<Option<Value>> {
        let url = format!("{}/v1/catalog/items/details", self.config.catalog_api);
        optional(
            self.fetch_json(&url, &[("items", asset_id.to_string())]).await,
            "catalog details",
        )
    }
}

/// Turns a non-200 answer into `Ok(None)` after logging it. Transport and
/// decoding errors are passed through.
pub fn optional(result: Result<Value>, what: &str) -> Result<Option<Value>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DownloaderError::HttpStatus { status, url }) => {
            warn!("{what} request failed: HTTP {status} from {url}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// The `data` array most Roblox list endpoints wrap their results in.
pub fn data_array(value: &Value) -> &[Value] {
    value["data"].as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn thumbnail_entries(value: &Value) -> Vec<ThumbnailEntry> {
    data_array(value)
        .iter()
        .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_url_requires_completed() {
        let done = ThumbnailEntry {
            target_id: 1,
            state: "Completed".into(),
            image_url: Some("https://tr.rbxcdn.com/x.png".into()),
        };
        let pending = ThumbnailEntry {
            state: "Pending".into(),
            ..done.clone()
        };
        let empty = ThumbnailEntry {
            image_url: Some(String::new()),
            ..done.clone()
        };
        assert_eq!(done.ready_url(), Some("https://tr.rbxcdn.com/x.png"));
        assert_eq!(pending.ready_url(), None);
        assert_eq!(empty.ready_url(), None);
    }

    #[test]
    fn test_thumbnail_entries_lenient() {
        let value = json!({
            "data": [
                { "targetId": 156, "state": "Completed", "imageUrl": "https://a/b.png", "version": "x" },
                { "targetId": 157, "state": "Blocked" }
            ]
        });
        let entries = thumbnail_entries(&value);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].target_id, 156);
        assert!(entries[1].image_url.is_none());
    }

    #[test]
    fn test_data_array_missing() {
        assert!(data_array(&json!({})).is_empty());
        assert!(data_array(&json!({ "data": "nope" })).is_empty());
    }

    #[test]
    fn test_username_match_deserialize() {
        let entry = json!({
            "requestedUsername": "builderman",
            "hasVerifiedBadge": true,
            "id": 156,
            "name": "builderman",
            "displayName": "Builderman"
        });
        let hit: UsernameMatch = serde_json::from_value(entry).unwrap();
        assert_eq!(hit.id, 156);
        assert_eq!(hit.display_name, "Builderman");
    }

    #[test]
    fn test_avatar_3d_metadata_defaults() {
        let meta = Avatar3dMetadata::from_value(&json!({
            "obj": "abc",
            "textures": ["t1", "t2"],
            "camera": { "fov": 70 }
        }));
        assert_eq!(meta.obj.as_deref(), Some("abc"));
        assert!(meta.mtl.is_none());
        assert_eq!(meta.textures, vec!["t1", "t2"]);
        assert_eq!(meta.camera["fov"], 70);
        assert!(meta.aabb.is_null());

        let garbage = Avatar3dMetadata::from_value(&json!("not an object"));
        assert!(garbage.obj.is_none());
    }

    #[test]
    fn test_optional_maps_status_to_none() {
        let err = DownloaderError::HttpStatus {
            status: 404,
            url: "https://users.roblox.com/v1/users/0".into(),
        };
        assert!(optional(Err(err), "user info").unwrap().is_none());
        assert!(optional(Err(DownloaderError::Custom("boom".into())), "x").is_err());
        assert_eq!(optional(Ok(json!(1)), "x").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_thumbnail_file_stems() {
        let stems: Vec<_> = ThumbnailKind::ALL.iter().map(|k| k.file_stem()).collect();
        assert_eq!(stems, vec!["avatar", "headshot", "bust"]);
    }
}
