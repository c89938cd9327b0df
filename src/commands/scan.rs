use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::commands::mesh::{MaterialLibrary, MeshStructure};
use crate::commands::report::{write_json, write_text};
use crate::error::Result;
use crate::templates;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tga"];

#[derive(Clone, Debug, Serialize)]
pub struct ImageFile {
    pub file: String,
    pub name: String,
    pub size: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct FolderAnalysis {
    pub folder_name: String,
    pub folder_path: String,
    pub obj_files: Vec<MeshStructure>,
    pub mtl_files: Vec<MaterialLibrary>,
    pub texture_files: Vec<ImageFile>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ScanSummary {
    pub folders: usize,
    pub obj_files: usize,
    pub mtl_files: usize,
    pub texture_files: usize,
    pub groups: usize,
    pub objects: usize,
    pub attachments: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScanResults {
    pub scanned_at: String,
    pub root: String,
    pub folders: Vec<FolderAnalysis>,
    pub summary: ScanSummary,
}

/// Any folder whose name mentions `3d` or `avatar` in any case, which covers
/// the `*_3D` and `3D_Model` folders this tool writes.
pub fn is_avatar_folder(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("3d") || lower.contains("avatar")
}

/// Finds avatar folders below `root` (not `root` itself), sorted by path.
pub fn find_avatar_folders(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk_dirs(root, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk_dirs(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        if is_avatar_folder(&name) {
            found.push(path.clone());
        }
        walk_dirs(&path, found)?;
    }
    Ok(())
}

/// Files in `dir` and its `textures/` subfolder, sorted by name.
fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = [dir.to_path_buf(), dir.join("textures")]
        .iter()
        .filter_map(|d| std::fs::read_dir(d).ok())
        .flatten()
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn analyze_folder(dir: &Path) -> FolderAnalysis {
    let mut analysis = FolderAnalysis {
        folder_name: dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        folder_path: dir.to_string_lossy().to_string(),
        obj_files: Vec::new(),
        mtl_files: Vec::new(),
        texture_files: Vec::new(),
    };

    for path in files_in(dir) {
        let ext = extension(&path);
        match ext.as_str() {
            "obj" => match MeshStructure::parse_file(&path) {
                Ok(mesh) => analysis.obj_files.push(mesh),
                Err(e) => warn!("Cannot read {}: {e}", path.display()),
            },
            "mtl" => match MaterialLibrary::parse_file(&path) {
                Ok(library) => analysis.mtl_files.push(library),
                Err(e) => warn!("Cannot read {}: {e}", path.display()),
            },
            _ if IMAGE_EXTENSIONS.contains(&ext.as_str()) => {
                analysis.texture_files.push(ImageFile {
                    file: path.to_string_lossy().to_string(),
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    size: std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0),
                });
            }
            _ => {}
        }
    }
    analysis
}

pub fn scan_folders(root: &Path, scanned_at: &str) -> Result<ScanResults> {
    let folders: Vec<FolderAnalysis> = find_avatar_folders(root)?
        .iter()
        .map(|dir| analyze_folder(dir))
        .collect();

    let mut summary = ScanSummary {
        folders: folders.len(),
        ..Default::default()
    };
    for folder in &folders {
        summary.obj_files += folder.obj_files.len();
        summary.mtl_files += folder.mtl_files.len();
        summary.texture_files += folder.texture_files.len();
        for mesh in &folder.obj_files {
            summary.groups += mesh.groups.len();
            summary.objects += mesh.objects.len();
            summary.attachments += mesh.attachments.len();
        }
    }

    Ok(ScanResults {
        scanned_at: scanned_at.to_string(),
        root: root.to_string_lossy().to_string(),
        folders,
        summary,
    })
}

/// Writes `obj_attachment_analysis.json` and `.md` into `out_dir`.
pub fn write_scan(results: &ScanResults, out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let json_path = out_dir.join("obj_attachment_analysis.json");
    let md_path = out_dir.join("obj_attachment_analysis.md");
    write_json(&json_path, results)?;
    write_text(&md_path, &templates::scan_report(results))?;
    info!(
        "Scan report: {} folder(s), {} OBJ file(s) → {}",
        results.summary.folders,
        results.summary.obj_files,
        md_path.display()
    );
    Ok((json_path, md_path))
}
