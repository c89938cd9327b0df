use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::commands::mesh::{MaterialLibrary, MeshStructure};
use crate::error::Result;

pub const GENERATOR: &str = concat!("rbxavatar ", env!("CARGO_PKG_VERSION"));

/// Writes `value` as pretty-printed JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Responses of the optional avatar endpoints, keyed by section name, plus
/// one status string per section (`success`, `failed_404`, `error_...`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedInfo {
    pub user_id: u64,
    pub collected_at: String,
    pub api_responses: BTreeMap<String, Value>,
    pub collection_status: BTreeMap<String, String>,
}

impl ExtendedInfo {
    pub fn successful_sections(&self) -> usize {
        self.collection_status
            .values()
            .filter(|s| s.as_str() == "success")
            .count()
    }

    pub fn section(&self, key: &str) -> Option<&Value> {
        self.api_responses.get(key)
    }
}

/// Files of a package directory, bucketed by what they are.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileInventory {
    pub thumbnails: Vec<String>,
    #[serde(rename = "3d_model")]
    pub model_3d: Vec<String>,
    pub metadata: Vec<String>,
    pub other: Vec<String>,
}

impl FileInventory {
    pub fn total(&self) -> usize {
        self.thumbnails.len() + self.model_3d.len() + self.metadata.len() + self.other.len()
    }
}

/// Walks `dir` recursively. Paths are relative to `dir`, `/`-separated and sorted.
pub fn file_inventory(dir: &Path) -> Result<FileInventory> {
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    files.sort();

    let mut inventory = FileInventory::default();
    for rel in files {
        let lower = rel.to_lowercase();
        let ext = lower.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        let bucket = match ext {
            "png" | "jpg" | "jpeg" if lower.contains("texture") => &mut inventory.model_3d,
            "png" | "jpg" | "jpeg" => &mut inventory.thumbnails,
            "obj" | "mtl" => &mut inventory.model_3d,
            "json" | "md" | "txt" => &mut inventory.metadata,
            _ => &mut inventory.other,
        };
        bucket.push(rel);
    }
    Ok(inventory)
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            out.push(parts.join("/"));
        }
    }
    Ok(())
}

/// Body of `metadata.json` in a 3D folder.
pub fn model_metadata(
    user_info: &Value,
    avatar_3d: &Value,
    extended: Option<&ExtendedInfo>,
    mesh: Option<&MeshStructure>,
    materials: Option<&MaterialLibrary>,
    downloaded_at: &str,
) -> Result<Value> {
    Ok(json!({
        "user_info": user_info,
        "avatar_3d_metadata": avatar_3d,
        "download_timestamp": downloaded_at,
        "api_info": {
            "generator": GENERATOR,
            "thumbnails_endpoint": "/v1/users/avatar-3d",
            "cdn_hosts": "t0-t7.rbxcdn.com",
        },
        "extended_avatar_info": serde_json::to_value(extended)?,
        "obj_structure": serde_json::to_value(mesh)?,
        "material_library": serde_json::to_value(materials)?,
    }))
}

/// What ended up on disk for one package.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct ContentStatus {
    #[serde(rename = "2d_thumbnails")]
    pub thumbnails: bool,
    #[serde(rename = "3d_model")]
    pub model_3d: bool,
    pub extended_avatar_info: bool,
    pub attachment_analysis: bool,
}

pub struct PackageParts<'a> {
    pub user_id: u64,
    pub user_info: &'a Value,
    pub status: ContentStatus,
    pub extended: Option<&'a ExtendedInfo>,
    pub mesh: Option<&'a MeshStructure>,
    pub materials: Option<&'a MaterialLibrary>,
    pub inventory: &'a FileInventory,
    pub created_at: &'a str,
}

/// Body of `COMPLETE_AVATAR_PACKAGE.json`.
pub fn complete_package(parts: &PackageParts<'_>) -> Result<Value> {
    let username = parts.user_info["name"].as_str().unwrap_or("Unknown");
    let display_name = parts.user_info["displayName"].as_str().unwrap_or(username);

    let attachment_information = match parts.mesh {
        Some(mesh) => json!({
            "obj_structure": mesh,
            "material_library": parts.materials,
            "body_part_groups": mesh.body_parts().count(),
            "attachment_points": mesh.attachments.len(),
        }),
        None => Value::Null,
    };

    Ok(json!({
        "package_info": {
            "created_at": parts.created_at,
            "generator": GENERATOR,
            "user_id": parts.user_id,
            "username": username,
            "display_name": display_name,
        },
        "content_status": parts.status,
        "user_profile": parts.user_info,
        "extended_avatar_data": serde_json::to_value(parts.extended)?,
        "attachment_information": attachment_information,
        "file_inventory": parts.inventory,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("user_info.json");
        let value = json!({
            "id": 156,
            "name": "builderman",
            "displayName": "Builderman",
            "isBanned": false,
            "scales": { "height": 1.05, "width": 0.75 },
            "assets": [{ "id": 1, "assetType": { "id": 8, "name": "Hat" } }],
            "description": "héllo \"world\"\n",
            "missing": null
        });

        write_json(&path, &value).unwrap();
        assert_eq!(read_json(&path).unwrap(), value);
    }

    #[test]
    fn test_file_inventory_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("3D_Model/textures")).unwrap();
        for file in [
            "avatar_420x420.png",
            "headshot_150x150.png",
            "user_info.json",
            "README.md",
            "BODY_PART_MAPPING.txt",
            "3D_Model/avatar.obj",
            "3D_Model/avatar.mtl",
            "3D_Model/textures/texture_001.png",
            "notes.bin",
        ] {
            std::fs::write(root.join(file), b"x").unwrap();
        }

        let inventory = file_inventory(root).unwrap();
        assert_eq!(
            inventory.thumbnails,
            vec!["avatar_420x420.png", "headshot_150x150.png"]
        );
        assert_eq!(
            inventory.model_3d,
            vec![
                "3D_Model/avatar.mtl",
                "3D_Model/avatar.obj",
                "3D_Model/textures/texture_001.png"
            ]
        );
        assert_eq!(
            inventory.metadata,
            vec!["BODY_PART_MAPPING.txt", "README.md", "user_info.json"]
        );
        assert_eq!(inventory.other, vec!["notes.bin"]);
        assert_eq!(inventory.total(), 9);

        let value = serde_json::to_value(&inventory).unwrap();
        assert!(value["3d_model"].is_array());
    }

    #[test]
    fn test_complete_package_shape() {
        let user = json!({ "id": 156, "name": "builderman", "displayName": "Builderman" });
        let mesh = MeshStructure::parse("g Player1\nv 0 0 0\n");
        let inventory = FileInventory::default();
        let status = ContentStatus {
            thumbnails: true,
            model_3d: true,
            ..Default::default()
        };

        let package = complete_package(&PackageParts {
            user_id: 156,
            user_info: &user,
            status,
            extended: None,
            mesh: Some(&mesh),
            materials: None,
            inventory: &inventory,
            created_at: "2024-01-01 00:00:00",
        })
        .unwrap();

        assert_eq!(package["package_info"]["username"], "builderman");
        assert_eq!(package["package_info"]["display_name"], "Builderman");
        assert_eq!(package["content_status"]["2d_thumbnails"], true);
        assert_eq!(package["content_status"]["extended_avatar_info"], false);
        assert_eq!(
            package["attachment_information"]["obj_structure"]["groups"][0]["name"],
            "Player1"
        );
        assert_eq!(package["attachment_information"]["body_part_groups"], 1);
        assert!(package["extended_avatar_data"].is_null());
    }

    #[test]
    fn test_extended_info_counts_successes() {
        let mut info = ExtendedInfo::default();
        info.collection_status.insert("avatar".into(), "success".into());
        info.collection_status.insert("games".into(), "failed_404".into());
        info.collection_status.insert("groups".into(), "success".into());
        assert_eq!(info.successful_sections(), 2);
    }
}
