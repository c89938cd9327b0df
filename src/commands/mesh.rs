//! Single-pass structural scan of Wavefront OBJ and MTL files.
//!
//! Nothing here validates geometry. Each trimmed line is tested against a
//! fixed set of prefixes and anything that doesn't match is skipped, so the
//! parsers never fail on content, only on reading the file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::commands::body_parts::PartKind;
use crate::error::Result;

/// Comment keywords that hint at rigging information.
const RIG_KEYWORDS: [&str; 5] = ["attach", "bone", "joint", "bind", "rig"];

/// `# <Keyword> <Name>` comment forms that name an attachment point.
const ATTACHMENT_COMMENT_KEYWORDS: [&str; 3] = ["# attachment", "# attach", "# bone"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub line: usize,
    #[serde(rename = "type", default)]
    pub kind: PartKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub name: String,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub line: usize,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentSource {
    Group,
    Object,
    Comment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    #[serde(rename = "type")]
    pub source: AttachmentSource,
    pub line: usize,
    pub name: String,
}

/// Counts and named records extracted from one OBJ file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshStructure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub vertices: u64,
    pub faces: u64,
    pub normals: u64,
    pub texture_coords: u64,
    pub groups: Vec<GroupRecord>,
    pub objects: Vec<ObjectRecord>,
    /// Distinct `usemtl` names in first-seen order.
    pub materials: Vec<String>,
    pub material_libs: Vec<String>,
    pub comments: Vec<CommentRecord>,
    pub attachments: Vec<AttachmentRecord>,
}

impl MeshStructure {
    pub fn parse(text: &str) -> Self {
        let mut mesh = MeshStructure::default();

        for (index, raw) in text.lines().enumerate() {
            let line_num = index + 1;
            let line = raw.trim();

            if line.is_empty() {
                continue;
            }

            if line.starts_with("v ") {
                mesh.vertices += 1;
            } else if line.starts_with("vn ") {
                mesh.normals += 1;
            } else if line.starts_with("vt ") {
                mesh.texture_coords += 1;
            } else if line.starts_with("f ") {
                mesh.faces += 1;
            } else if let Some(rest) = line.strip_prefix("g ") {
                let name = rest.trim().to_string();
                if names_attachment(&name) {
                    mesh.attachments.push(AttachmentRecord {
                        source: AttachmentSource::Group,
                        line: line_num,
                        name: name.clone(),
                    });
                }
                mesh.groups.push(GroupRecord {
                    kind: PartKind::classify(&name),
                    name,
                    line: line_num,
                });
            } else if let Some(rest) = line.strip_prefix("o ") {
                let name = rest.trim().to_string();
                if names_attachment(&name) {
                    mesh.attachments.push(AttachmentRecord {
                        source: AttachmentSource::Object,
                        line: line_num,
                        name: name.clone(),
                    });
                }
                mesh.objects.push(ObjectRecord {
                    name,
                    line: line_num,
                });
            } else if let Some(rest) = line.strip_prefix("usemtl ") {
                let material = rest.trim().to_string();
                if !mesh.materials.contains(&material) {
                    mesh.materials.push(material);
                }
            } else if let Some(rest) = line.strip_prefix("mtllib ") {
                mesh.material_libs.push(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix('#') {
                let content = rest.trim();
                let lower = content.to_ascii_lowercase();
                if !RIG_KEYWORDS.iter().any(|k| lower.contains(k)) {
                    continue;
                }
                mesh.comments.push(CommentRecord {
                    line: line_num,
                    content: content.to_string(),
                });
                for name in attachment_names_in_comment(line) {
                    mesh.attachments.push(AttachmentRecord {
                        source: AttachmentSource::Comment,
                        line: line_num,
                        name,
                    });
                }
            }
        }

        mesh
    }

    /// Reads and scans an OBJ file. Invalid UTF-8 is replaced, not rejected.
    pub fn parse_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut mesh = Self::parse(&String::from_utf8_lossy(&bytes));
        mesh.file_path = Some(path.to_string_lossy().to_string());
        Ok(mesh)
    }

    /// Groups the keyword table could classify.
    pub fn body_parts(&self) -> impl Iterator<Item = &GroupRecord> {
        self.groups.iter().filter(|g| g.kind != PartKind::Unknown)
    }
}

fn names_attachment(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("attach") || lower.contains("bone")
}

/// Finds `# Attachment X`, `# Attach X` and `# Bone X` anywhere in the line.
/// The keyword must be followed by whitespace and then a word.
fn attachment_names_in_comment(line: &str) -> Vec<String> {
    // ASCII lowering keeps byte offsets aligned with `line`
    let lower = line.to_ascii_lowercase();
    let mut names = Vec::new();

    for keyword in ATTACHMENT_COMMENT_KEYWORDS {
        let mut search_from = 0;
        while let Some(pos) = lower[search_from..].find(keyword) {
            let after = search_from + pos + keyword.len();
            search_from = search_from + pos + 1;

            let rest = &line[after..];
            let trimmed = rest.trim_start();
            if trimmed.len() == rest.len() {
                continue; // no whitespace after the keyword
            }
            let word: String = trimmed
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if !word.is_empty() {
                names.push(word);
                break;
            }
        }
    }

    names
}

// ── MTL ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub line: usize,
    pub properties: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureRef {
    pub material: String,
    pub property: String,
    pub texture_file: String,
    pub line: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialLibrary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub materials: Vec<Material>,
    pub textures: Vec<TextureRef>,
}

impl MaterialLibrary {
    pub fn parse(text: &str) -> Self {
        let mut library = MaterialLibrary::default();
        let mut current: Option<Material> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix("newmtl ") {
                if let Some(done) = current.take() {
                    library.materials.push(done);
                }
                current = Some(Material {
                    name: rest.trim().to_string(),
                    line: index + 1,
                    properties: BTreeMap::new(),
                });
                continue;
            }

            // Properties before the first newmtl have no owner
            let Some(material) = current.as_mut() else {
                continue;
            };

            let mut parts = line.split_whitespace();
            let (Some(key), value) = (parts.next(), parts.collect::<Vec<_>>().join(" ")) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }

            if key.starts_with("map_") || key == "bump" || key == "norm" {
                library.textures.push(TextureRef {
                    material: material.name.clone(),
                    property: key.to_string(),
                    texture_file: value.clone(),
                    line: index + 1,
                });
            }
            material.properties.insert(key.to_string(), value);
        }

        if let Some(done) = current {
            library.materials.push(done);
        }

        library
    }

    pub fn parse_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut library = Self::parse(&String::from_utf8_lossy(&bytes));
        library.file_path = Some(path.to_string_lossy().to_string());
        Ok(library)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OBJ: &str = "\
# Roblox avatar export
mtllib avatar.mtl
o Avatar
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
v 0.5 0.5 1.0
vn 0.0 0.0 1.0
vt 0.0 0.0
vt 1.0 1.0
g Player1
usemtl Player1Mtl
f 1 2 3
g Player2
usemtl Player1Mtl
f 1 3 4

g Handle1
usemtl HandleMtl
";

    #[test]
    fn test_counts_match_prefix_lines() {
        let mesh = MeshStructure::parse(SAMPLE_OBJ);
        assert_eq!(mesh.vertices, 5);
        assert_eq!(mesh.faces, 2);
        assert_eq!(mesh.normals, 1);
        assert_eq!(mesh.texture_coords, 2);
    }

    #[test]
    fn test_group_records_with_lines() {
        let mesh = MeshStructure::parse(SAMPLE_OBJ);
        let names: Vec<_> = mesh.groups.iter().map(|g| (g.name.as_str(), g.line)).collect();
        assert_eq!(names, vec![("Player1", 12), ("Player2", 15), ("Handle1", 19)]);
        assert_eq!(mesh.groups[0].kind, PartKind::Head);
        assert_eq!(mesh.groups[1].kind, PartKind::Torso);
        assert_eq!(mesh.groups[2].kind, PartKind::Handle);
        assert_eq!(mesh.body_parts().count(), 3);
    }

    #[test]
    fn test_objects_materials_and_libs() {
        let mesh = MeshStructure::parse(SAMPLE_OBJ);
        assert_eq!(
            mesh.objects,
            vec![ObjectRecord { name: "Avatar".into(), line: 3 }]
        );
        assert_eq!(mesh.materials, vec!["Player1Mtl", "HandleMtl"]);
        assert_eq!(mesh.material_libs, vec!["avatar.mtl"]);
    }

    #[test]
    fn test_prefix_must_match_exactly() {
        let text = "vx 1 2 3\nvertex 1\nfoo bar\n  v 1 2 3\nf1 2 3\ng\n";
        let mesh = MeshStructure::parse(text);
        // Only the indented "v " counts once trimmed
        assert_eq!(mesh.vertices, 1);
        assert_eq!(mesh.faces, 0);
        assert!(mesh.groups.is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(MeshStructure::parse(""), MeshStructure::default());
    }

    #[test]
    fn test_rig_comments_and_attachments() {
        let text = "\
# exported by tool
# Attachment LeftGripAttachment
# Bone Neck
# joint data follows
g HatAttachment
o RootBone
";
        let mesh = MeshStructure::parse(text);
        assert_eq!(mesh.comments.len(), 3);
        assert_eq!(mesh.comments[0].line, 2);
        assert_eq!(mesh.comments[0].content, "Attachment LeftGripAttachment");

        let found: Vec<_> = mesh
            .attachments
            .iter()
            .map(|a| (a.source, a.name.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                (AttachmentSource::Comment, "LeftGripAttachment"),
                (AttachmentSource::Comment, "Neck"),
                (AttachmentSource::Group, "HatAttachment"),
                (AttachmentSource::Object, "RootBone"),
            ]
        );
    }

    #[test]
    fn test_structure_serializes_kind_as_type() {
        let mesh = MeshStructure::parse("g Player1\n");
        let value = serde_json::to_value(&mesh).unwrap();
        assert_eq!(value["groups"][0]["type"], "head");
        assert_eq!(value["groups"][0]["line"], 1);
        assert!(value.get("file_path").is_none());
    }

    #[test]
    fn test_parse_file_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avatar.obj");
        std::fs::write(&path, "v 1 2 3\nf 1 1 1\n").unwrap();
        let mesh = MeshStructure::parse_file(&path).unwrap();
        assert_eq!(mesh.vertices, 1);
        assert!(mesh.file_path.unwrap().ends_with("avatar.obj"));
    }

    #[test]
    fn test_parse_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MeshStructure::parse_file(&dir.path().join("nope.obj")).is_err());
    }

    #[test]
    fn test_mtl_materials_and_textures() {
        let text = "\
# material file
Ka 1 1 1
newmtl Player1Mtl
Kd 0.8 0.8 0.8
map_Kd texture_001.png
newmtl HandleMtl
d 1
bump normal map.png
";
        let library = MaterialLibrary::parse(text);
        assert_eq!(library.materials.len(), 2);
        assert_eq!(library.materials[0].name, "Player1Mtl");
        assert_eq!(library.materials[0].line, 3);
        assert_eq!(library.materials[0].properties["Kd"], "0.8 0.8 0.8");
        assert_eq!(library.materials[1].properties["d"], "1");

        assert_eq!(library.textures.len(), 2);
        assert_eq!(library.textures[0].material, "Player1Mtl");
        assert_eq!(library.textures[0].texture_file, "texture_001.png");
        assert_eq!(library.textures[1].property, "bump");
        assert_eq!(library.textures[1].texture_file, "normal map.png");
    }
}
