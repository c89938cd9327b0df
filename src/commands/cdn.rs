use futures_util::StreamExt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::commands::api::RobloxClient;
use crate::commands::config::DownloaderConfig;
use crate::error::Result;

/// Only this many leading characters of a hash take part in the host choice.
const HASH_PREFIX_LEN: usize = 38;

/// Numbered CDN hosts are `t0` through `t7`.
const CDN_HOSTS: u32 = 8;

/// Picks the numbered CDN host (`t0`..`t7`) that serves `hash`.
///
/// Seeds an accumulator with 31, XORs in the code point of each of the first
/// 38 characters and reduces modulo 8. An empty hash maps to `31 % 8 = 7`.
pub fn cdn_index(hash: &str) -> u8 {
    let acc = hash
        .chars()
        .take(HASH_PREFIX_LEN)
        .fold(31u32, |acc, c| acc ^ c as u32);
    (acc % CDN_HOSTS) as u8
}

pub fn cdn_url(hash: &str) -> String {
    format!("https://t{}.rbxcdn.com/{hash}", cdn_index(hash))
}

/// Every URL worth trying for `hash`, in order: the computed host, the other
/// numbered hosts, then the configured alternates. No URL appears twice.
pub fn candidate_urls(hash: &str, alternates: &[String]) -> Vec<String> {
    let mut urls = vec![cdn_url(hash)];

    let numbered = (0..CDN_HOSTS).map(|n| format!("https://t{n}.rbxcdn.com/{hash}"));
    let extra = alternates
        .iter()
        .map(|host| format!("https://{}/{hash}", host.trim_end_matches('/')));

    for url in numbered.chain(extra) {
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// The URLs `download_from_hash` walks for `hash`. Configured `cdn_mirrors`
/// replace the rbxcdn hosts entirely.
pub fn mirror_candidates(hash: &str, config: &DownloaderConfig) -> Vec<String> {
    if config.cdn_mirrors.is_empty() {
        return candidate_urls(hash, &config.cdn_alternates);
    }
    config
        .cdn_mirrors
        .iter()
        .map(|base| format!("{}/{hash}", base.trim_end_matches('/')))
        .collect()
}

/// Runs `attempt` over `candidates` in order and stops at the first `Some`.
///
/// Failed attempts (`Ok(None)` or `Err`) are logged and followed by `delay`
/// before the next candidate. Returns `None` once every candidate failed.
pub async fn try_each<T, F, Fut>(candidates: &[String], delay: Duration, mut attempt: F) -> Option<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for (i, candidate) in candidates.iter().enumerate() {
        match attempt(candidate.clone()).await {
            Ok(Some(found)) => return Some(found),
            Ok(None) => debug!("No usable response from {candidate}"),
            Err(e) => debug!("Request to {candidate} failed: {e}"),
        }

        if i + 1 < candidates.len() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    None
}

/// Streams `url` into `path`. Returns the number of bytes written, or `None`
/// when the response is unusable (non-200, declared empty, or actually empty).
/// No file is left behind unless the download succeeded.
pub async fn fetch_to_file(http: &reqwest::Client, url: &str, path: &Path) -> Result<Option<u64>> {
    let response = http
        .get(url)
        .header("Referer", "https://www.roblox.com/")
        .header("Accept", "*/*")
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await?;

    if response.status() != reqwest::StatusCode::OK {
        debug!("HTTP {} from {url}", response.status());
        return Ok(None);
    }
    if response.content_length() == Some(0) {
        debug!("Empty body declared by {url}");
        return Ok(None);
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(path).await?;
    let result = write_body(response, &mut file).await;
    drop(file);

    match result {
        Ok(written) if written > 0 => Ok(Some(written)),
        Ok(_) => {
            debug!("Empty body from {url}");
            let _ = tokio::fs::remove_file(path).await;
            Ok(None)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(path).await;
            Err(e)
        }
    }
}

async fn write_body(response: reqwest::Response, file: &mut tokio::fs::File) -> Result<u64> {
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Downloads the CDN object named by `hash` into `path`, walking the mirror
/// list until one host answers with a non-empty body.
pub async fn download_from_hash(
    client: &RobloxClient,
    hash: &str,
    path: &Path,
    label: &str,
) -> Option<u64> {
    let candidates = mirror_candidates(hash, client.config());
    let http = client.http();

    let result = try_each(&candidates, client.config().mirror_delay(), |url| async move {
        fetch_to_file(http, &url, path).await
    })
    .await;

    match result {
        Some(bytes) => info!("Downloaded {label} ({bytes} bytes) to {}", path.display()),
        None => warn!(
            "Could not download {label} ({hash}) from any of {} CDN mirrors",
            candidates.len()
        ),
    }
    result
}

/// Single-URL download used for thumbnails whose URL the API already resolved.
pub async fn download_url(client: &RobloxClient, url: &str, path: &Path) -> Option<u64> {
    match fetch_to_file(client.http(), url, path).await {
        Ok(Some(bytes)) => Some(bytes),
        Ok(None) => {
            warn!("Download returned nothing usable: {url}");
            None
        }
        Err(e) => {
            warn!("Download failed for {url}: {e}");
            None
        }
    }
}
