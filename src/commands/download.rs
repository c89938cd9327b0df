use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::commands::api::{data_array, Avatar3dMetadata, RobloxClient, ThumbnailKind};
use crate::commands::cdn::{download_from_hash, download_url};
use crate::commands::mesh::{MaterialLibrary, MeshStructure};
use crate::commands::report::{
    complete_package, file_inventory, model_metadata, read_json, write_json, write_text,
    ContentStatus, ExtendedInfo, PackageParts,
};
use crate::commands::resolve::resolve_batch;
use crate::error::{DownloaderError, Result};
use crate::templates::{self, MappingSubject, ModelReadme};
use crate::util::{now_local, safe_file_name};

pub const PACKAGE_FILE: &str = "COMPLETE_AVATAR_PACKAGE.json";
pub const MAPPING_FILE: &str = "BODY_PART_MAPPING.txt";
pub const SIMPLE_MAPPING_FILE: &str = "SIMPLE_BODY_PART_MAPPING.txt";

/// Progress events streamed to whoever drives the run (the CLI prints them
/// and mirrors them into the session log).
#[derive(Clone, Debug)]
pub enum DownloadEvent {
    StepStarted {
        step: String,
        description: String,
        step_index: usize,
        total_steps: usize,
    },
    StepProgress {
        step: String,
        progress: f64,
        detail: String,
    },
    StepCompleted { step: String, detail: String },
    StepWarning { step: String, message: String },
    Error { step: String, message: String },
    Finished { succeeded: usize, failed: usize },
}

pub type EventSender = mpsc::UnboundedSender<DownloadEvent>;

impl DownloadEvent {
    /// Session log prefix and human-readable line for this event.
    pub fn log_line(&self) -> (&'static str, String) {
        match self {
            DownloadEvent::StepStarted {
                description,
                step_index,
                total_steps,
                ..
            } => ("step", format!("[{step_index}/{total_steps}] {description}")),
            DownloadEvent::StepProgress {
                progress, detail, ..
            } => ("progress", format!("{:>3.0}% {detail}", progress * 100.0)),
            DownloadEvent::StepCompleted { step, detail } => ("done", format!("✅ {step}: {detail}")),
            DownloadEvent::StepWarning { step, message } => ("warn", format!("⚠️ {step}: {message}")),
            DownloadEvent::Error { step, message } => ("error", format!("❌ {step}: {message}")),
            DownloadEvent::Finished { succeeded, failed } => (
                "done",
                format!("🏁 {succeeded} succeeded, {failed} failed"),
            ),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImageOptions {
    pub sizes: Vec<String>,
    pub include_items: bool,
}

/// What to produce for each user of a batch.
#[derive(Clone, Debug)]
pub enum Job {
    Images(ImageOptions),
    Model { include_textures: bool },
    Package {
        images: ImageOptions,
        include_textures: bool,
    },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ImageSummary {
    pub thumbnails: usize,
    pub items: usize,
}

/// The parsed state of a finished 3D folder.
#[derive(Clone, Debug)]
pub struct ModelOutcome {
    pub folder: PathBuf,
    pub mesh: Option<MeshStructure>,
    pub materials: Option<MaterialLibrary>,
    pub textures: usize,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<(String, PathBuf)>,
    pub failed: Vec<(String, String)>,
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Records one optional section: the response on success, and a status of
/// `success`, `failed_{status}` or `error_{message}` (message cut to 50 chars).
pub fn record_section(info: &mut ExtendedInfo, key: &str, result: Result<Value>) {
    let status = match result {
        Ok(value) => {
            info.api_responses.insert(key.to_string(), value);
            "success".to_string()
        }
        Err(DownloaderError::HttpStatus { status, .. }) => format!("failed_{status}"),
        Err(e) => {
            let message: String = e.to_string().chars().take(50).collect();
            format!("error_{message}")
        }
    };
    info.collection_status.insert(key.to_string(), status);
}

/// Parses whatever mesh files made it to disk and writes `metadata.json`,
/// `README.md` and `BODY_PART_MAPPING.txt`. Fails with `MissingMesh` when
/// neither `avatar.obj` nor `avatar.mtl` exists.
pub fn finalize_model_folder(
    folder: &Path,
    user_info: &Value,
    avatar_3d: &Value,
    extended: Option<&ExtendedInfo>,
    textures: usize,
    generated_at: &str,
) -> Result<ModelOutcome> {
    let obj_path = folder.join("avatar.obj");
    let mtl_path = folder.join("avatar.mtl");
    if !obj_path.exists() && !mtl_path.exists() {
        return Err(DownloaderError::MissingMesh);
    }

    let mesh = if obj_path.exists() {
        MeshStructure::parse_file(&obj_path)
            .map_err(|e| warn!("Cannot analyze {}: {e}", obj_path.display()))
            .ok()
    } else {
        None
    };
    let materials = if mtl_path.exists() {
        MaterialLibrary::parse_file(&mtl_path)
            .map_err(|e| warn!("Cannot analyze {}: {e}", mtl_path.display()))
            .ok()
    } else {
        None
    };

    let metadata = model_metadata(
        user_info,
        avatar_3d,
        extended,
        mesh.as_ref(),
        materials.as_ref(),
        generated_at,
    )?;
    write_json(&folder.join("metadata.json"), &metadata)?;

    let parsed = Avatar3dMetadata::from_value(avatar_3d);
    let readme = templates::model_readme(&ModelReadme {
        user_info,
        metadata: &parsed,
        extended,
        mesh: mesh.as_ref(),
        materials: materials.as_ref(),
        textures_downloaded: textures,
        generated_at,
    });
    write_text(&folder.join("README.md"), &readme)?;

    if let Some(mesh) = &mesh {
        let subject = MappingSubject::new(user_info, mesh);
        write_text(
            &folder.join(MAPPING_FILE),
            &templates::body_part_mapping(&subject, generated_at),
        )?;
        info!(
            "Analyzed OBJ: {} vertices, {} faces, {} groups",
            mesh.vertices,
            mesh.faces,
            mesh.groups.len()
        );
    }

    Ok(ModelOutcome {
        folder: folder.to_path_buf(),
        mesh,
        materials,
        textures,
    })
}

/// Writes `COMPLETE_AVATAR_PACKAGE.json`, the package README and both mapping
/// files. Returns the package JSON.
pub fn finalize_package(
    folder: &Path,
    user_id: u64,
    user_info: &Value,
    status: ContentStatus,
    extended: Option<&ExtendedInfo>,
    model: Option<&ModelOutcome>,
    created_at: &str,
) -> Result<Value> {
    let inventory = file_inventory(folder)?;
    let mesh = model.and_then(|m| m.mesh.as_ref());

    let package = complete_package(&PackageParts {
        user_id,
        user_info,
        status,
        extended,
        mesh,
        materials: model.and_then(|m| m.materials.as_ref()),
        inventory: &inventory,
        created_at,
    })?;

    write_json(&folder.join(PACKAGE_FILE), &package)?;
    write_text(&folder.join("README.md"), &templates::package_readme(&package))?;

    if let Some(mesh) = mesh {
        let subject = MappingSubject::new(user_info, mesh);
        write_mappings(folder, &subject, created_at)?;
    }
    Ok(package)
}

fn write_mappings(folder: &Path, subject: &MappingSubject, generated_at: &str) -> Result<()> {
    write_text(
        &folder.join(MAPPING_FILE),
        &templates::body_part_mapping(subject, generated_at),
    )?;
    write_text(
        &folder.join(SIMPLE_MAPPING_FILE),
        &templates::simple_body_part_mapping(subject, generated_at),
    )
}

/// Rewrites both mapping files of an existing package from its JSON alone.
/// Returns the number of groups mapped.
pub fn regenerate_mapping(package_dir: &Path, generated_at: &str) -> Result<usize> {
    let package_path = package_dir.join(PACKAGE_FILE);
    if !package_path.exists() {
        return Err(DownloaderError::Custom(format!(
            "{} not found in {}",
            PACKAGE_FILE,
            package_dir.display()
        )));
    }
    let package = read_json(&package_path)?;
    let subject = MappingSubject::from_package(&package);
    write_mappings(package_dir, &subject, generated_at)?;
    info!(
        "Regenerated body part mapping for {} ({} groups)",
        subject.username,
        subject.groups.len()
    );
    Ok(subject.groups.len())
}

/// Drives every network-backed operation for one run.
pub struct Downloader<'a> {
    client: &'a RobloxClient,
    output_root: PathBuf,
    on_event: EventSender,
}

impl<'a> Downloader<'a> {
    pub fn new(client: &'a RobloxClient, output_root: PathBuf, on_event: EventSender) -> Self {
        Self {
            client,
            output_root,
            on_event,
        }
    }

    // A closed receiver only means nobody is watching; the run goes on.
    fn emit(&self, event: DownloadEvent) {
        let _ = self.on_event.send(event);
    }

    fn start(&self, step: &str, description: &str, step_index: usize, total_steps: usize) {
        debug!("[{step_index}/{total_steps}] {description}");
        self.emit(DownloadEvent::StepStarted {
            step: step.into(),
            description: description.into(),
            step_index,
            total_steps,
        });
    }

    fn progress(&self, step: &str, done: usize, total: usize, detail: String) {
        let progress = if total == 0 { 1.0 } else { done as f64 / total as f64 };
        self.emit(DownloadEvent::StepProgress {
            step: step.into(),
            progress,
            detail,
        });
    }

    fn complete(&self, step: &str, detail: String) {
        self.emit(DownloadEvent::StepCompleted {
            step: step.into(),
            detail,
        });
    }

    fn step_warning(&self, step: &str, message: String) {
        warn!("{step}: {message}");
        self.emit(DownloadEvent::StepWarning {
            step: step.into(),
            message,
        });
    }

    fn step_error(&self, step: &str, message: String) {
        error!("{step}: {message}");
        self.emit(DownloadEvent::Error {
            step: step.into(),
            message,
        });
    }

    fn folder_for(&self, user_id: u64, user_info: &Value, suffix: &str) -> PathBuf {
        let name = safe_file_name(user_info["name"].as_str().unwrap_or("user"));
        let name = if name.is_empty() { "user".to_string() } else { name };
        self.output_root.join(format!("{name}_{user_id}{suffix}"))
    }

    async fn fetch_user(&self, user_id: u64) -> Result<Value> {
        self.client
            .user_info(user_id)
            .await?
            .ok_or_else(|| DownloaderError::UserNotFound(user_id.to_string()))
    }

    /// 2D renders (`avatar_`, `headshot_`, `bust_` per size) plus
    /// `user_info.json`, and optionally one thumbnail per worn item.
    pub async fn download_images(
        &self,
        user_id: u64,
        user_info: &Value,
        folder: &Path,
        options: &ImageOptions,
    ) -> Result<ImageSummary> {
        tokio::fs::create_dir_all(folder).await?;
        write_json(&folder.join("user_info.json"), user_info)?;

        let delay = self.client.config().image_delay();
        let total = options.sizes.len() * ThumbnailKind::ALL.len();
        let mut done = 0;
        let mut summary = ImageSummary::default();

        for size in &options.sizes {
            for kind in ThumbnailKind::ALL {
                done += 1;
                let file_name = format!("{}_{size}.png", kind.file_stem());

                let entries = match self.client.user_thumbnails(user_id, kind, size).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        self.step_warning("images", format!("{file_name}: {e}"));
                        continue;
                    }
                };

                match entries.first().and_then(|entry| entry.ready_url()) {
                    Some(url) => {
                        if download_url(self.client, url, &folder.join(&file_name))
                            .await
                            .is_some()
                        {
                            summary.thumbnails += 1;
                        }
                    }
                    None => self.step_warning("images", format!("{file_name}: render not ready")),
                }

                self.progress("images", done, total, file_name);
                pause(delay).await;
            }
        }

        if options.include_items {
            summary.items = self.download_item_thumbnails(user_id, folder).await;
        }
        Ok(summary)
    }

    /// One thumbnail per currently worn asset into `textures/`, plus the
    /// catalog details of each asset in `textures/items.json`.
    async fn download_item_thumbnails(&self, user_id: u64, folder: &Path) -> usize {
        let avatar = match self.client.avatar_config(user_id).await {
            Ok(avatar) => avatar,
            Err(e) => {
                self.step_warning("items", format!("avatar configuration unavailable: {e}"));
                return 0;
            }
        };

        let assets = avatar["assets"].as_array().cloned().unwrap_or_default();
        let textures = folder.join("textures");
        let delay = self.client.config().image_delay();
        let mut saved = 0;
        let mut details = Vec::new();

        for (i, asset) in assets.iter().enumerate() {
            let Some(asset_id) = asset["id"].as_u64() else {
                continue;
            };
            let name = safe_file_name(asset["name"].as_str().unwrap_or("item"));
            let asset_type = safe_file_name(asset["assetType"]["name"].as_str().unwrap_or("Asset"));

            match self.client.asset_thumbnails(asset_id).await {
                Ok(entries) => {
                    if let Some(url) = entries.first().and_then(|entry| entry.ready_url()) {
                        let path = textures.join(format!("{name}_{asset_type}_{asset_id}.png"));
                        if download_url(self.client, url, &path).await.is_some() {
                            saved += 1;
                        }
                    }
                }
                Err(e) => self.step_warning("items", format!("asset {asset_id}: {e}")),
            }

            match self.client.catalog_details(asset_id).await {
                Ok(Some(detail)) => details.extend(data_array(&detail).iter().cloned()),
                Ok(None) => {}
                Err(e) => self.step_warning("items", format!("catalog {asset_id}: {e}")),
            }

            self.progress("items", i + 1, assets.len(), format!("{name} ({asset_type})"));
            pause(delay).await;
        }

        if !details.is_empty() {
            if let Err(e) = write_json(&textures.join("items.json"), &details) {
                self.step_warning("items", format!("items.json: {e}"));
            }
        }
        saved
    }

    /// Calls each optional avatar endpoint once and records the outcome.
    pub async fn collect_extended_info(&self, user_id: u64) -> ExtendedInfo {
        let client = self.client;
        let mut info = ExtendedInfo {
            user_id,
            collected_at: now_local(),
            ..Default::default()
        };

        record_section(&mut info, "avatar_config", client.avatar_config(user_id).await);
        record_section(&mut info, "currently_wearing", client.currently_wearing(user_id).await);
        record_section(&mut info, "thumbnails", client.avatar_thumbnail_info(user_id).await);
        record_section(&mut info, "games", client.games(user_id).await);
        record_section(&mut info, "groups", client.groups(user_id).await);
        record_section(&mut info, "outfits", client.outfits(user_id).await);
        record_section(&mut info, "asset_types", client.asset_types().await);

        info!(
            "Collected {}/{} extended sections for {user_id}",
            info.successful_sections(),
            info.collection_status.len()
        );
        info
    }

    /// OBJ, MTL and textures from the CDN, then the folder's reports. Fails
    /// with `MissingMesh` when this run fetched neither the OBJ nor the MTL.
    pub async fn download_model(
        &self,
        user_id: u64,
        user_info: &Value,
        folder: &Path,
        include_textures: bool,
        extended: &ExtendedInfo,
    ) -> Result<ModelOutcome> {
        let avatar_3d = self.client.avatar_3d_metadata(user_id).await?.ok_or_else(|| {
            DownloaderError::Custom(format!("3D metadata unavailable for user {user_id}"))
        })?;
        let meta = Avatar3dMetadata::from_value(&avatar_3d);
        tokio::fs::create_dir_all(folder).await?;

        let obj_path = folder.join("avatar.obj");
        let mtl_path = folder.join("avatar.mtl");
        // Mesh files from an earlier run must not stand in for this one
        for stale in [&obj_path, &mtl_path] {
            if stale.exists() {
                tokio::fs::remove_file(stale).await?;
            }
        }

        let obj = match &meta.obj {
            Some(hash) => download_from_hash(self.client, hash, &obj_path, "OBJ").await,
            None => None,
        };
        if obj.is_none() {
            self.step_warning("model", "OBJ could not be downloaded".into());
        }
        let mtl = match &meta.mtl {
            Some(hash) => download_from_hash(self.client, hash, &mtl_path, "MTL").await,
            None => None,
        };
        if mtl.is_none() {
            self.step_warning("model", "MTL could not be downloaded".into());
        }
        if obj.is_none() && mtl.is_none() {
            return Err(DownloaderError::MissingMesh);
        }

        let mut textures = 0;
        if include_textures && !meta.textures.is_empty() {
            let total = meta.textures.len();
            let delay = self.client.config().texture_delay();
            for (i, hash) in meta.textures.iter().enumerate() {
                if i > 0 {
                    pause(delay).await;
                }
                let file_name = format!("texture_{:03}.png", i + 1);
                let path = folder.join("textures").join(&file_name);
                if download_from_hash(self.client, hash, &path, &file_name)
                    .await
                    .is_some()
                {
                    textures += 1;
                }
                self.progress("model", i + 1, total, file_name);
            }
            if textures < total {
                self.step_warning("model", format!("{textures}/{total} textures downloaded"));
            }
        }

        finalize_model_folder(
            folder,
            user_info,
            &avatar_3d,
            Some(extended),
            textures,
            &now_local(),
        )
    }

    /// Every artifact for one user under `{username}_{id}/`.
    pub async fn download_package(
        &self,
        user_id: u64,
        user_info: &Value,
        images: &ImageOptions,
        include_textures: bool,
    ) -> Result<PathBuf> {
        let folder = self.folder_for(user_id, user_info, "");
        let total = 4;

        self.start("images", "Downloading 2D thumbnails", 1, total);
        let thumbnails = match self.download_images(user_id, user_info, &folder, images).await {
            Ok(summary) => {
                self.complete(
                    "images",
                    format!("{} thumbnails, {} items", summary.thumbnails, summary.items),
                );
                summary.thumbnails > 0
            }
            Err(e) => {
                self.step_error("images", e.to_string());
                false
            }
        };

        self.start("extended", "Collecting extended avatar info", 2, total);
        let extended = self.collect_extended_info(user_id).await;
        self.complete(
            "extended",
            format!(
                "{}/{} sections",
                extended.successful_sections(),
                extended.collection_status.len()
            ),
        );

        self.start("model", "Downloading 3D model", 3, total);
        let model = match self
            .download_model(
                user_id,
                user_info,
                &folder.join("3D_Model"),
                include_textures,
                &extended,
            )
            .await
        {
            Ok(outcome) => {
                self.complete("model", format!("{} textures", outcome.textures));
                Some(outcome)
            }
            Err(e) => {
                self.step_warning("model", e.to_string());
                None
            }
        };

        if !thumbnails && model.is_none() {
            let message = "Neither thumbnails nor a 3D model could be downloaded".to_string();
            self.step_error("package", message.clone());
            return Err(DownloaderError::Custom(message));
        }

        self.start("package", "Writing package files", 4, total);
        let status = ContentStatus {
            thumbnails,
            model_3d: model.is_some(),
            extended_avatar_info: extended.successful_sections() > 0,
            attachment_analysis: model.as_ref().is_some_and(|m| m.mesh.is_some()),
        };
        finalize_package(
            &folder,
            user_id,
            user_info,
            status,
            Some(&extended),
            model.as_ref(),
            &now_local(),
        )?;
        self.complete("package", folder.display().to_string());
        Ok(folder)
    }

    /// One user, one job. Returns the folder that was written.
    pub async fn run_job(&self, user_id: u64, job: &Job) -> Result<PathBuf> {
        let user_info = self.fetch_user(user_id).await?;

        match job {
            Job::Images(options) => {
                let folder = self.folder_for(user_id, &user_info, "");
                self.start("images", "Downloading 2D thumbnails", 1, 1);
                let summary = self
                    .download_images(user_id, &user_info, &folder, options)
                    .await?;
                if summary.thumbnails == 0 {
                    return Err(DownloaderError::Custom(format!(
                        "No thumbnails available for user {user_id}"
                    )));
                }
                self.complete(
                    "images",
                    format!("{} thumbnails, {} items", summary.thumbnails, summary.items),
                );
                Ok(folder)
            }
            Job::Model { include_textures } => {
                let folder = self.folder_for(user_id, &user_info, "_3D");
                self.start("extended", "Collecting extended avatar info", 1, 2);
                let extended = self.collect_extended_info(user_id).await;
                self.complete(
                    "extended",
                    format!("{} sections", extended.successful_sections()),
                );

                self.start("model", "Downloading 3D model", 2, 2);
                let outcome = self
                    .download_model(user_id, &user_info, &folder, *include_textures, &extended)
                    .await?;
                self.complete("model", format!("{} textures", outcome.textures));
                Ok(outcome.folder)
            }
            Job::Package {
                images,
                include_textures,
            } => {
                self.download_package(user_id, &user_info, images, *include_textures)
                    .await
            }
        }
    }

    /// Resolves every input, then runs `job` for each user in order with the
    /// configured pause in between. One user's failure never stops the batch.
    pub async fn run_batch(&self, inputs: &[String], job: &Job) -> BatchReport {
        let mut report = BatchReport::default();

        let resolution = resolve_batch(self.client, inputs).await;
        for (input, reason) in resolution.skipped {
            self.step_error("resolve", format!("{input}: {reason}"));
            report.failed.push((input, reason));
        }

        let delay = self.client.config().user_delay();
        for (i, (input, user_id)) in resolution.resolved.into_iter().enumerate() {
            if i > 0 {
                pause(delay).await;
            }
            info!("Processing {input} (user {user_id})");

            match self.run_job(user_id, job).await {
                Ok(folder) => {
                    info!("Finished {input}: {}", folder.display());
                    report.succeeded.push((input, folder));
                }
                Err(e) => {
                    self.step_error("user", format!("{input}: {e}"));
                    report.failed.push((input, e.to_string()));
                }
            }
        }

        self.emit(DownloadEvent::Finished {
            succeeded: report.succeeded.len(),
            failed: report.failed.len(),
        });
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::config::DownloaderConfig;
    use crate::test_http::{Reply, TestServer};
    use serde_json::json;

    const MOCK_OBJ: &str = "\
# Roblox avatar
mtllib avatar.mtl
v 0 0 0
v 1 0 0
v 0 1 0
g Player1
f 1 2 3
g Player2
f 1 2 3
g Handle1
f 1 2 3
";

    fn user() -> Value {
        json!({ "id": 156, "name": "builderman", "displayName": "Builderman" })
    }

    /// Serves avatar-3d for user 156 and routes every CDN hash to `/cdn/{hash}`.
    async fn avatar_server(textures: &[&str]) -> (TestServer, RobloxClient) {
        let server = TestServer::start().await;
        server.route(
            "/v1/users/avatar-3d",
            Reply::ok(
                json!({ "state": "Completed", "imageUrl": server.url("/3d") }).to_string(),
            ),
        );
        server.route(
            "/3d",
            Reply::ok(json!({ "obj": "objhash", "mtl": "mtlhash", "textures": textures }).to_string()),
        );

        let config = DownloaderConfig {
            thumbnails_api: server.base.clone(),
            cdn_mirrors: vec![server.url("/cdn")],
            mirror_delay_ms: 0,
            texture_delay_ms: 0,
            request_timeout_secs: 5,
            ..Default::default()
        };
        let client = RobloxClient::new(config).unwrap();
        (server, client)
    }

    #[test]
    fn test_record_section_statuses() {
        let mut info = ExtendedInfo::default();
        record_section(&mut info, "avatar_config", Ok(json!({ "assets": [] })));
        record_section(
            &mut info,
            "games",
            Err(DownloaderError::HttpStatus {
                status: 403,
                url: "https://games.roblox.com".into(),
            }),
        );
        record_section(&mut info, "groups", Err(DownloaderError::Custom("x".repeat(80))));

        assert_eq!(info.collection_status["avatar_config"], "success");
        assert_eq!(info.collection_status["games"], "failed_403");
        assert_eq!(info.collection_status["groups"], format!("error_{}", "x".repeat(50)));
        assert!(info.api_responses.contains_key("avatar_config"));
        assert!(!info.api_responses.contains_key("games"));
    }

    #[test]
    fn test_event_log_lines() {
        let event = DownloadEvent::StepStarted {
            step: "model".into(),
            description: "Downloading 3D model".into(),
            step_index: 2,
            total_steps: 4,
        };
        assert_eq!(event.log_line(), ("step", "[2/4] Downloading 3D model".to_string()));
        let progress = DownloadEvent::StepProgress {
            step: "model".into(),
            progress: 0.5,
            detail: "texture_002.png".into(),
        };
        assert_eq!(progress.log_line().1, " 50% texture_002.png");

        let done = DownloadEvent::Finished { succeeded: 1, failed: 2 };
        assert_eq!(done.log_line(), ("done", "🏁 1 succeeded, 2 failed".to_string()));
        let warning = DownloadEvent::StepWarning {
            step: "model".into(),
            message: "MTL could not be downloaded".into(),
        };
        assert_eq!(warning.log_line().0, "warn");
    }

    #[test]
    fn test_finalize_model_without_mesh_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = finalize_model_folder(dir.path(), &user(), &json!({}), None, 0, "now").unwrap_err();
        assert!(matches!(err, DownloaderError::MissingMesh));
    }

    #[test]
    fn test_finalize_model_writes_reports() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path();
        std::fs::write(folder.join("avatar.obj"), MOCK_OBJ).unwrap();

        let avatar_3d = json!({ "obj": "hash", "textures": [], "camera": { "fov": 70 } });
        let outcome =
            finalize_model_folder(folder, &user(), &avatar_3d, None, 0, "2024-01-01 00:00:00")
                .unwrap();

        assert!(outcome.materials.is_none());
        assert_eq!(outcome.mesh.as_ref().map(|m| m.groups.len()), Some(3));

        let metadata = read_json(&folder.join("metadata.json")).unwrap();
        assert_eq!(metadata["user_info"]["name"], "builderman");
        assert_eq!(metadata["avatar_3d_metadata"]["obj"], "hash");
        assert_eq!(metadata["download_timestamp"], "2024-01-01 00:00:00");
        assert_eq!(metadata["obj_structure"]["groups"][1]["type"], "torso");

        let mapping = std::fs::read_to_string(folder.join(MAPPING_FILE)).unwrap();
        assert!(mapping.contains("Total groups: 3"));
        assert!(folder.join("README.md").exists());
    }

    #[test]
    fn test_mtl_only_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("avatar.mtl"), "newmtl A\n").unwrap();
        let outcome = finalize_model_folder(dir.path(), &user(), &json!({}), None, 0, "now").unwrap();
        assert!(outcome.mesh.is_none());
        assert!(!dir.path().join(MAPPING_FILE).exists());
    }

    #[test]
    fn test_package_and_regenerated_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("builderman_156");
        let model_dir = folder.join("3D_Model");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join("avatar.obj"), MOCK_OBJ).unwrap();
        std::fs::write(folder.join("avatar_420x420.png"), b"png").unwrap();

        let outcome =
            finalize_model_folder(&model_dir, &user(), &json!({}), None, 0, "now").unwrap();
        let status = ContentStatus {
            thumbnails: true,
            model_3d: true,
            extended_avatar_info: false,
            attachment_analysis: true,
        };
        let package = finalize_package(
            &folder,
            156,
            &user(),
            status,
            None,
            Some(&outcome),
            "2024-01-01 00:00:00",
        )
        .unwrap();

        assert_eq!(package["package_info"]["user_id"], 156);
        assert_eq!(package["file_inventory"]["thumbnails"][0], "avatar_420x420.png");
        assert!(folder.join(SIMPLE_MAPPING_FILE).exists());

        std::fs::remove_file(folder.join(MAPPING_FILE)).unwrap();
        std::fs::remove_file(folder.join(SIMPLE_MAPPING_FILE)).unwrap();

        let groups = regenerate_mapping(&folder, "2024-01-02 00:00:00").unwrap();
        assert_eq!(groups, 3);
        let mapping = std::fs::read_to_string(folder.join(MAPPING_FILE)).unwrap();
        let head = mapping.lines().find(|l| l.contains("Player1 ")).unwrap();
        assert!(head.contains("Head/Face"));
        assert!(head.contains("(line: 6)"));
        let simple = std::fs::read_to_string(folder.join(SIMPLE_MAPPING_FILE)).unwrap();
        assert!(simple.contains("builderman (ID: 156)"));
    }

    #[test]
    fn test_regenerate_without_package_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(regenerate_mapping(dir.path(), "now").is_err());
    }

    #[tokio::test]
    async fn test_download_model_ignores_stale_mesh() {
        let (_server, client) = avatar_server(&[]).await;
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("builderman_156_3D");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("avatar.obj"), MOCK_OBJ).unwrap();
        std::fs::write(folder.join("avatar.mtl"), "newmtl Old\n").unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let downloader = Downloader::new(&client, dir.path().to_path_buf(), tx);
        let err = downloader
            .download_model(156, &user(), &folder, true, &ExtendedInfo::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloaderError::MissingMesh));
        assert!(!folder.join("avatar.obj").exists());
        assert!(!folder.join("avatar.mtl").exists());
    }

    #[tokio::test]
    async fn test_download_model_from_mirror() {
        let (server, client) = avatar_server(&["texhash", "gonehash"]).await;
        server.route("/cdn/objhash", Reply::ok(MOCK_OBJ));
        server.route("/cdn/texhash", Reply::ok("png"));
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("builderman_156_3D");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let downloader = Downloader::new(&client, dir.path().to_path_buf(), tx);
        let outcome = downloader
            .download_model(156, &user(), &folder, true, &ExtendedInfo::default())
            .await
            .unwrap();
        drop(downloader);

        assert_eq!(outcome.textures, 1);
        assert_eq!(outcome.mesh.as_ref().map(|m| m.groups.len()), Some(3));
        assert!(outcome.materials.is_none());
        assert!(folder.join("textures").join("texture_001.png").exists());
        assert!(!folder.join("textures").join("texture_002.png").exists());
        assert!(folder.join("metadata.json").exists());
        assert!(folder.join(MAPPING_FILE).exists());

        let mut warnings = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DownloadEvent::StepWarning { message, .. } = event {
                warnings.push(message);
            }
        }
        assert!(warnings.contains(&"MTL could not be downloaded".to_string()));
        assert!(warnings.contains(&"1/2 textures downloaded".to_string()));
    }
}
