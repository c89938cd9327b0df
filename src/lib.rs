use anyhow::Context;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod commands;
pub mod error;
pub mod templates;
pub mod util;

#[cfg(test)]
mod test_http;

use cli::{Args, Commands};
use commands::api::RobloxClient;
use commands::body_parts::BodyPart;
use commands::config::{load_config, DownloaderConfig};
use commands::download::{regenerate_mapping, DownloadEvent, Downloader, ImageOptions, Job};
use commands::logs::{send_log, SessionLogger};
use commands::mesh::MeshStructure;
use commands::resolve::{lookup_many, split_user_args};
use commands::scan::{scan_folders, write_scan};
use util::{expand_tilde, now_local};

/// Installs the global `tracing` subscriber. `RUST_LOG` still wins for
/// other targets.
pub fn init_tracing(verbose: bool) {
    let directive = if verbose {
        "rbxavatar=debug"
    } else {
        "rbxavatar=info"
    };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = directive.parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs one CLI invocation. Exit code 0 means at least one user (or the
/// offline command) succeeded.
pub async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let output = PathBuf::from(expand_tilde(&args.output));

    match args.command {
        Commands::Lookup { names } => lookup(config, &split_user_args(&names)).await,
        Commands::Search { keyword, limit } => search(config, &keyword, limit).await,
        Commands::Images {
            users,
            sizes,
            items,
        } => {
            let sizes = if sizes.is_empty() {
                config.thumbnail_sizes.clone()
            } else {
                sizes
            };
            let job = Job::Images(ImageOptions {
                sizes,
                include_items: items,
            });
            download(config, output, &users, job).await
        }
        Commands::Model { users, no_textures } => {
            let job = Job::Model {
                include_textures: config.include_textures && !no_textures,
            };
            download(config, output, &users, job).await
        }
        Commands::Package {
            users,
            no_textures,
            items,
        } => {
            let job = Job::Package {
                images: ImageOptions {
                    sizes: config.thumbnail_sizes.clone(),
                    include_items: items,
                },
                include_textures: config.include_textures && !no_textures,
            };
            download(config, output, &users, job).await
        }
        Commands::Map { package_dir } => {
            let package_dir = PathBuf::from(expand_tilde(&package_dir.to_string_lossy()));
            let groups = regenerate_mapping(&package_dir, &now_local())
                .with_context(|| format!("Failed to map {}", package_dir.display()))?;
            println!("✅ Mapped {groups} groups in {}", package_dir.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Analyze { obj_file, json } => analyze(&obj_file, json),
        Commands::Scan { root } => {
            let root = root.unwrap_or(output);
            let results = scan_folders(&root, &now_local())
                .with_context(|| format!("Failed to scan {}", root.display()))?;
            let (json_path, md_path) = write_scan(&results, &root)?;
            println!(
                "✅ {} avatar folder(s), {} OBJ file(s)\n   {}\n   {}",
                results.summary.folders,
                results.summary.obj_files,
                json_path.display(),
                md_path.display()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn lookup(config: DownloaderConfig, names: &[String]) -> anyhow::Result<ExitCode> {
    let client = RobloxClient::new(config)?;
    let results = lookup_many(&client, names).await;

    let mut found = 0;
    println!("{:<24} {:>14}  {}", "USERNAME", "USER ID", "DISPLAY NAME");
    for name in names {
        match results.get(name).and_then(|hit| hit.as_ref()) {
            Some(hit) => {
                found += 1;
                println!("{:<24} {:>14}  {}", hit.name, hit.id, hit.display_name);
            }
            None => println!("{name:<24} {:>14}  -", "not found"),
        }
    }
    Ok(exit_code(found > 0))
}

async fn search(config: DownloaderConfig, keyword: &str, limit: u32) -> anyhow::Result<ExitCode> {
    let client = RobloxClient::new(config)?;
    let users = client.search_users(keyword, limit).await?;

    for user in &users {
        println!(
            "{:<24} {:>14}  {}",
            user["name"].as_str().unwrap_or_default(),
            user["id"].as_u64().unwrap_or_default(),
            user["displayName"].as_str().unwrap_or_default(),
        );
    }
    println!("{} result(s) for '{keyword}'", users.len());
    Ok(exit_code(!users.is_empty()))
}

async fn download(
    config: DownloaderConfig,
    output: PathBuf,
    users: &[String],
    job: Job,
) -> anyhow::Result<ExitCode> {
    let inputs = split_user_args(users);
    tokio::fs::create_dir_all(&output)
        .await
        .with_context(|| format!("Cannot create {}", output.display()))?;

    let logger = SessionLogger::new(&output).await;
    let log_tx = logger.as_ref().map(SessionLogger::sender);
    let client = RobloxClient::new(config)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<DownloadEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let (prefix, line) = event.log_line();
            // Warnings and errors already reach the terminal through tracing
            if !matches!(
                event,
                DownloadEvent::StepWarning { .. } | DownloadEvent::Error { .. }
            ) {
                println!("{line}");
            }
            if let Some(tx) = &log_tx {
                send_log(tx, prefix, &line);
            }
        }
    });

    let downloader = Downloader::new(&client, output.clone(), tx);
    let report = downloader.run_batch(&inputs, &job).await;
    drop(downloader);
    let _ = printer.await;
    if let Some(logger) = logger {
        logger.finish().await;
    }

    println!();
    for (input, folder) in &report.succeeded {
        println!("✅ {input} → {}", folder.display());
    }
    for (input, reason) in &report.failed {
        println!("❌ {input}: {reason}");
    }
    Ok(exit_code(!report.succeeded.is_empty()))
}

fn analyze(obj_file: &Path, json: bool) -> anyhow::Result<ExitCode> {
    let mesh = MeshStructure::parse_file(obj_file)
        .with_context(|| format!("Cannot read {}", obj_file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&mesh)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("📄 {}", obj_file.display());
    println!(
        "   {} vertices, {} faces, {} normals, {} texture coordinates",
        mesh.vertices, mesh.faces, mesh.normals, mesh.texture_coords
    );
    println!(
        "   {} groups, {} objects, {} materials, {} attachment points",
        mesh.groups.len(),
        mesh.objects.len(),
        mesh.materials.len(),
        mesh.attachments.len()
    );
    for group in &mesh.groups {
        println!(
            "   line {:>8}  {:<16} {:<18} {}",
            group.line,
            group.name,
            BodyPart::from_group_name(&group.name).label(),
            group.kind.as_str()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
