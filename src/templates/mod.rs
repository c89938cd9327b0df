use serde_json::Value;

use crate::commands::api::Avatar3dMetadata;
use crate::commands::body_parts::{BodyPart, PartKind, Region};
use crate::commands::mesh::{GroupRecord, MaterialLibrary, MeshStructure};
use crate::commands::report::{ExtendedInfo, GENERATOR};
use crate::commands::scan::ScanResults;
use crate::util::thousands;

const RULE: &str = "═══════════════════════════════════════════════════════════════════════════════════";

/// Everything the two mapping files need about one avatar.
#[derive(Clone, Debug, Default)]
pub struct MappingSubject {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub created: String,
    pub obj_file: String,
    pub vertices: u64,
    pub faces: u64,
    pub groups: Vec<GroupRecord>,
}

impl MappingSubject {
    pub fn new(user_info: &Value, mesh: &MeshStructure) -> Self {
        Self {
            user_id: text(user_info, "id"),
            username: text(user_info, "name"),
            display_name: text(user_info, "displayName"),
            created: text(user_info, "created"),
            obj_file: mesh.file_path.clone().unwrap_or_else(|| "N/A".into()),
            vertices: mesh.vertices,
            faces: mesh.faces,
            groups: mesh.groups.clone(),
        }
    }

    /// Rebuilds the subject from a saved `COMPLETE_AVATAR_PACKAGE.json`.
    pub fn from_package(package: &Value) -> Self {
        let obj_structure = &package["attachment_information"]["obj_structure"];
        let mesh: MeshStructure = serde_json::from_value(obj_structure.clone()).unwrap_or_default();
        let mut subject = Self::new(&package["user_profile"], &mesh);

        // Older packages only carry the identity in package_info
        let info = &package["package_info"];
        if subject.user_id == "N/A" {
            subject.user_id = text(info, "user_id");
        }
        if subject.username == "N/A" {
            subject.username = text(info, "username");
        }
        if subject.display_name == "N/A" {
            subject.display_name = text(info, "display_name");
        }
        subject
    }
}

/// Lenient field read: strings as-is, numbers and bools printed, anything else `N/A`.
fn text(value: &Value, key: &str) -> String {
    match &value[key] {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => "N/A".to_string(),
    }
}

fn count(value: &Value, key: &str) -> usize {
    value[key].as_array().map(Vec::len).unwrap_or(0)
}

fn check(present: bool) -> &'static str {
    if present {
        "✅ included"
    } else {
        "❌ missing"
    }
}

fn mapping_line(group: &GroupRecord, part: BodyPart, label_width: usize) -> String {
    format!(
        "{} {:<12} → {:<label_width$} (line: {})\n",
        part.glyph(),
        group.name,
        part.label(),
        thousands(group.line as u64),
    )
}

/// Returns the content of `BODY_PART_MAPPING.txt`.
pub fn body_part_mapping(subject: &MappingSubject, generated_at: &str) -> String {
    let mut out = format!(
        r#"
╔════════════════════════════════════════════════════════════════════════════════╗
║                           🎯 ROBLOX AVATAR BODY PART MAPPING                   ║
╚════════════════════════════════════════════════════════════════════════════════╝

📋 Avatar Info
├─ User: {display} (@{username})
├─ User ID: {user_id}
├─ Created: {created}
├─ 3D Model: {vertices} vertices, {faces} faces
└─ OBJ File: {obj_file}

{RULE}

🎯 BODY PART ATTACHMENT POINTS (by OBJ group)

📊 Groups found: {total}

"#,
        display = subject.display_name,
        username = subject.username,
        user_id = subject.user_id,
        created = subject.created,
        vertices = thousands(subject.vertices),
        faces = thousands(subject.faces),
        obj_file = subject.obj_file,
        total = subject.groups.len(),
    );

    let parts: Vec<(&GroupRecord, BodyPart)> = subject
        .groups
        .iter()
        .map(|g| (g, BodyPart::from_group_name(&g.name)))
        .collect();

    let mut region_counts = Vec::new();
    for region in Region::ALL {
        let in_region: Vec<_> = parts.iter().filter(|(_, p)| p.region() == region).collect();
        region_counts.push((region, in_region.len()));
        if in_region.is_empty() {
            continue;
        }

        out.push_str(region.heading());
        out.push('\n');
        out.push_str(&"─".repeat(80));
        out.push('\n');
        for (group, part) in in_region {
            out.push_str(&mapping_line(group, *part, 20));
            out.push_str(&format!("   💡 {}\n\n", part.description()));
        }
    }

    out.push_str(&format!(
        r#"
{RULE}

🛠️ Usage Guide

1. 📋 Reading the OBJ structure
   - Each Player group is one body part of the avatar
   - The line number points at the group inside the OBJ file

2. 🎨 3D modeling
   - Assign a different material per group in Blender or Maya
   - Tune texture mapping per body part

3. 🎮 Game development
   - Set up per-part colliders in Unity or Unreal Engine
   - Use the groups as attachment points for clothing systems

4. 🔧 Customization
   - Edit a single body part to personalize the avatar
   - Mount tools and weapons on the accessory Handle

{RULE}

📊 Summary
├─ Total groups: {total}
"#,
        total = subject.groups.len(),
    ));

    for (region, n) in region_counts {
        if n > 0 {
            out.push_str(&format!("├─ {}: {n}\n", region.stat_label()));
        }
    }

    out.push_str(&format!(
        r#"└─ Mesh complexity: {vertices} vertices

{RULE}

Generated at: {generated_at}
Source: {GENERATOR}
"#,
        vertices = thousands(subject.vertices),
    ));
    out
}

/// Returns the content of `SIMPLE_BODY_PART_MAPPING.txt`: one line per group,
/// head first.
pub fn simple_body_part_mapping(subject: &MappingSubject, generated_at: &str) -> String {
    let mut out = format!(
        r#"
┌─────────────────────────────────────────────────────────────────────────────┐
│  🎯 BODY PART MAPPING - {username} (ID: {user_id})
└─────────────────────────────────────────────────────────────────────────────┘

📋 Body Part Mapping ({total} groups)

"#,
        username = subject.username,
        user_id = subject.user_id,
        total = subject.groups.len(),
    );

    let mut parts: Vec<(&GroupRecord, BodyPart)> = subject
        .groups
        .iter()
        .map(|g| (g, BodyPart::from_group_name(&g.name)))
        .collect();
    // Stable: equal priorities keep file order
    parts.sort_by_key(|(_, part)| part.priority());

    for (group, part) in parts {
        out.push_str(&mapping_line(group, part, 18));
    }

    out.push_str(&format!(
        r#"

┌─────────────────────────────────────────────────────────────────────────────┐
│                              🎨 Color Guide                                 │
└─────────────────────────────────────────────────────────────────────────────┘

🟡 Head/Face       🟢 Torso (Front/Back)    🔵🔷🟦 Arms & Hands
🟣🟪🟫 Legs & Feet   ⭐ Accessory Handle      ❓ Unknown Parts

┌─────────────────────────────────────────────────────────────────────────────┐
│                             📊 Quick Stats                                  │
└─────────────────────────────────────────────────────────────────────────────┘

Groups:       {total:>3}
Vertices:  {vertices:>8}
Faces:     {faces:>8}

Generated: {generated_at} | {GENERATOR}
"#,
        total = subject.groups.len(),
        vertices = thousands(subject.vertices),
        faces = thousands(subject.faces),
    ));
    out
}

/// Inputs of the README written into a 3D model folder.
pub struct ModelReadme<'a> {
    pub user_info: &'a Value,
    pub metadata: &'a Avatar3dMetadata,
    pub extended: Option<&'a ExtendedInfo>,
    pub mesh: Option<&'a MeshStructure>,
    pub materials: Option<&'a MaterialLibrary>,
    pub textures_downloaded: usize,
    pub generated_at: &'a str,
}

/// Returns the README.md for a `{username}_{id}_3D` folder.
pub fn model_readme(input: &ModelReadme<'_>) -> String {
    let user = input.user_info;
    let mut out = format!(
        r#"# 🎮 Roblox 3D Avatar - {display}

## 📋 User
- **Username**: @{username}
- **Display name**: {display}
- **User ID**: {id}
- **Created**: {created}
- **Downloaded**: {generated_at}

## 📁 Files
- `avatar.obj`: 3D mesh (Wavefront OBJ)
- `avatar.mtl`: material library
- `textures/`: {textures} texture file(s) of {hashes} listed
- `metadata.json`: every API response collected for this avatar
- `BODY_PART_MAPPING.txt`: OBJ group → body part table
"#,
        display = text(user, "displayName"),
        username = text(user, "name"),
        id = text(user, "id"),
        created = text(user, "created"),
        generated_at = input.generated_at,
        textures = input.textures_downloaded,
        hashes = input.metadata.textures.len(),
    );

    if let Some(extended) = input.extended {
        if let Some(avatar) = extended.section("avatar_config") {
            out.push_str(&format!(
                "\n## 👤 Avatar\n- **Avatar type**: {}\n- **Worn assets**: {}\n- **Body colors**: {}\n",
                text(avatar, "playerAvatarType"),
                count(avatar, "assets"),
                if avatar["bodyColors"].is_object() { "set" } else { "N/A" },
            ));
            if let Some(assets) = avatar["assets"].as_array() {
                for asset in assets.iter().take(10) {
                    out.push_str(&format!(
                        "  - {} ({}, ID {})\n",
                        text(asset, "name"),
                        text(&asset["assetType"], "name"),
                        text(asset, "id"),
                    ));
                }
            }
        }

        if let Some(games) = extended.section("games") {
            let list = games["data"].as_array().cloned().unwrap_or_default();
            if !list.is_empty() {
                out.push_str(&format!("\n## 🎯 Public Games ({})\n", list.len()));
                for game in list.iter().take(5) {
                    out.push_str(&format!(
                        "- {} (visits: {})\n",
                        text(game, "name"),
                        text(game, "placeVisits"),
                    ));
                }
            }
        }

        if let Some(groups) = extended.section("groups") {
            let list = groups["data"].as_array().cloned().unwrap_or_default();
            if !list.is_empty() {
                out.push_str(&format!("\n## 👥 Groups ({})\n", list.len()));
                for membership in list.iter().take(5) {
                    out.push_str(&format!(
                        "- {} ({})\n",
                        text(&membership["group"], "name"),
                        text(&membership["role"], "name"),
                    ));
                }
            }
        }
    }

    if let Some(mesh) = input.mesh {
        out.push_str(&format!(
            r#"
## 🧩 OBJ Structure
- **Vertices**: {vertices}
- **Faces**: {faces}
- **Normals**: {normals}
- **Texture coordinates**: {uvs}
- **Groups**: {groups}
- **Objects**: {objects}
- **Attachment points**: {attachments}
"#,
            vertices = thousands(mesh.vertices),
            faces = thousands(mesh.faces),
            normals = thousands(mesh.normals),
            uvs = thousands(mesh.texture_coords),
            groups = mesh.groups.len(),
            objects = mesh.objects.len(),
            attachments = mesh.attachments.len(),
        ));

        let mut buckets: Vec<(PartKind, Vec<&GroupRecord>)> = Vec::new();
        for group in mesh.body_parts() {
            match buckets.iter_mut().find(|(kind, _)| *kind == group.kind) {
                Some((_, list)) => list.push(group),
                None => buckets.push((group.kind, vec![group])),
            }
        }
        if !buckets.is_empty() {
            out.push_str("\n### Body Parts\n");
            for (kind, groups) in buckets {
                out.push_str(&format!("\n**{}**\n", kind.title()));
                for group in groups {
                    out.push_str(&format!("- `{}` (line {})\n", group.name, group.line));
                }
            }
        }

        if !mesh.materials.is_empty() {
            out.push_str(&format!("\n### Materials ({})\n", mesh.materials.len()));
            for material in &mesh.materials {
                out.push_str(&format!("- `{material}`\n"));
            }
        }
    }

    if let Some(library) = input.materials {
        if !library.textures.is_empty() {
            out.push_str("\n### Texture References\n");
            for texture in &library.textures {
                out.push_str(&format!(
                    "- `{}` {} → `{}`\n",
                    texture.material, texture.property, texture.texture_file
                ));
            }
        }
    }

    let meta = input.metadata;
    if !meta.camera.is_null() || !meta.aabb.is_null() {
        out.push_str(&format!(
            "\n## 📷 Camera & Bounds\n- **Camera**: `{}`\n- **AABB**: `{}`\n",
            meta.camera, meta.aabb
        ));
    }

    out.push_str(
        r#"
## 🛠️ Usage
1. **Blender**: File → Import → Wavefront (.obj), keep `avatar.mtl` next to the OBJ
2. **Unity / Unreal**: drag the folder in and assign `textures/` to the imported materials
3. **Body parts**: each `Player` group in the OBJ is one part, see BODY_PART_MAPPING.txt
"#,
    );
    out
}

/// Returns the README.md for a complete package, read leniently from the
/// package JSON.
pub fn package_readme(package: &Value) -> String {
    let info = &package["package_info"];
    let status = &package["content_status"];
    let flag = |key: &str| check(status[key].as_bool().unwrap_or(false));

    let mut out = format!(
        r#"# 🎯 Complete Avatar Package

## 📋 Package
- **User**: {display} (@{username})
- **User ID**: {id}
- **Created**: {created}
- **Generator**: {generator}

## 📦 Content
- **2D thumbnails**: {thumbs}
- **3D model**: {model}
- **Extended info**: {extended}
- **Attachment analysis**: {analysis}

## 📁 Files
"#,
        display = text(info, "display_name"),
        username = text(info, "username"),
        id = text(info, "user_id"),
        created = text(info, "created_at"),
        generator = text(info, "generator"),
        thumbs = flag("2d_thumbnails"),
        model = flag("3d_model"),
        extended = flag("extended_avatar_info"),
        analysis = flag("attachment_analysis"),
    );

    let inventory = &package["file_inventory"];
    for (key, title) in [
        ("thumbnails", "Thumbnails"),
        ("3d_model", "3D Model"),
        ("metadata", "Metadata"),
        ("other", "Other"),
    ] {
        let files = inventory[key].as_array().cloned().unwrap_or_default();
        if files.is_empty() {
            continue;
        }
        out.push_str(&format!("\n### {title} ({})\n", files.len()));
        for file in files.iter().take(10) {
            out.push_str(&format!("- `{}`\n", file.as_str().unwrap_or_default()));
        }
        if files.len() > 10 {
            out.push_str(&format!("- ... and {} more\n", files.len() - 10));
        }
    }

    let responses = &package["extended_avatar_data"]["api_responses"];
    if responses.is_object() {
        out.push_str("\n## 👤 Extended Info\n");
        let avatar = &responses["avatar_config"];
        if avatar.is_object() {
            out.push_str(&format!("- **Worn items**: {}\n", count(avatar, "assets")));
            if avatar["bodyColors"].is_object() {
                out.push_str("- **Body colors**: set\n");
            }
        }
        let wearing = &responses["currently_wearing"];
        if wearing.is_object() {
            out.push_str(&format!(
                "- **Currently wearing**: {} item(s)\n",
                count(wearing, "assetIds")
            ));
        }
        out.push_str(&format!(
            "- **Public games**: {}\n- **Groups**: {}\n",
            count(&responses["games"], "data"),
            count(&responses["groups"], "data"),
        ));
    }

    let structure = &package["attachment_information"]["obj_structure"];
    if structure.is_object() {
        out.push_str(&format!(
            "\n## 🎯 3D Model Structure\n- **Vertices**: {}\n- **Faces**: {}\n- **Groups**: {}\n",
            thousands(structure["vertices"].as_u64().unwrap_or(0)),
            thousands(structure["faces"].as_u64().unwrap_or(0)),
            count(structure, "groups"),
        ));
    }

    out.push_str(
        r#"
## 🛠️ Usage
1. **2D thumbnails**: profile pictures for sites and apps
2. **3D model**: import `3D_Model/avatar.obj` into Blender, Unity or Maya
3. **Body part mapping**: BODY_PART_MAPPING.txt and SIMPLE_BODY_PART_MAPPING.txt
4. **Metadata**: COMPLETE_AVATAR_PACKAGE.json holds every collected response
"#,
    );
    out
}

/// Returns the Markdown report of a folder scan.
pub fn scan_report(results: &ScanResults) -> String {
    let summary = &results.summary;
    let mut out = format!(
        r#"# 🔍 OBJ Attachment Analysis

- **Scanned**: {scanned_at}
- **Root**: `{root}`

## 📊 Summary
- **Folders**: {folders}
- **OBJ files**: {obj}
- **MTL files**: {mtl}
- **Texture files**: {textures}
- **Groups**: {groups}
- **Objects**: {objects}
- **Attachment points**: {attachments}
"#,
        scanned_at = results.scanned_at,
        root = results.root,
        folders = summary.folders,
        obj = summary.obj_files,
        mtl = summary.mtl_files,
        textures = summary.texture_files,
        groups = summary.groups,
        objects = summary.objects,
        attachments = summary.attachments,
    );

    for folder in &results.folders {
        out.push_str(&format!("\n## 📁 {}\n", folder.folder_name));
        for mesh in &folder.obj_files {
            out.push_str(&format!(
                "\n### `{}`\n- {} vertices, {} faces, {} groups\n",
                mesh.file_path.as_deref().unwrap_or("N/A"),
                thousands(mesh.vertices),
                thousands(mesh.faces),
                mesh.groups.len(),
            ));
            for group in &mesh.groups {
                out.push_str(&format!(
                    "  - `{}` → {} (line {})\n",
                    group.name,
                    group.kind.as_str(),
                    group.line
                ));
            }
            for attachment in &mesh.attachments {
                out.push_str(&format!(
                    "  - 📍 {} (line {})\n",
                    attachment.name, attachment.line
                ));
            }
        }
        for library in &folder.mtl_files {
            out.push_str(&format!(
                "\n### `{}`\n- {} materials, {} texture references\n",
                library.file_path.as_deref().unwrap_or("N/A"),
                library.materials.len(),
                library.textures.len(),
            ));
        }
        if !folder.texture_files.is_empty() {
            out.push_str(&format!("\n**Images** ({})\n", folder.texture_files.len()));
            for texture in &folder.texture_files {
                out.push_str(&format!("- `{}` ({} bytes)\n", texture.name, thousands(texture.size)));
            }
        }
    }
    out
}
