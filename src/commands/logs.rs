use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Rotated session logs kept next to `latest.log`.
const MAX_SESSIONS: usize = 10;

/// Async session logger that writes timestamped lines to `<output>/.logs/latest.log`.
///
/// [`send_log`] only pushes into an mpsc channel. A background task does the
/// writing, so callers never wait on disk I/O.
pub struct SessionLogger {
    tx: mpsc::UnboundedSender<String>,
    writer: JoinHandle<()>,
    path: PathBuf,
}

impl SessionLogger {
    /// Create a new session logger under `output_root`.
    ///
    /// - Creates `.logs/` if it doesn't exist
    /// - Rotates `latest.log` → `session-{timestamp}.log`
    /// - Cleans up old sessions (keeps max 10)
    /// - Spawns a background writer task
    pub async fn new(output_root: &Path) -> Option<Self> {
        let logs_dir = output_root.join(".logs");

        if tokio::fs::create_dir_all(&logs_dir).await.is_err() {
            return None;
        }

        let latest = logs_dir.join("latest.log");

        if latest.exists() {
            let ts = chrono::Utc::now().timestamp();
            let rotated = logs_dir.join(format!("session-{ts}.log"));
            let _ = tokio::fs::rename(&latest, &rotated).await;
        }

        cleanup_old_sessions(&logs_dir).await;

        let file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&latest)
            .await
        {
            Ok(f) => f,
            Err(_) => return None,
        };

        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(writer_task(file, rx));

        let header = format!("=== rbxavatar session {} ===\n\n", timestamp());
        let _ = tx.send(header);

        Some(Self {
            tx,
            writer,
            path: latest,
        })
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<String> {
        self.tx.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the channel and waits until the footer is on disk. Lines sent
    /// through clones of [`sender`](Self::sender) still drain first, as long
    /// as those clones are dropped.
    pub async fn finish(self) {
        drop(self.tx);
        let _ = self.writer.await;
    }
}

/// Format a log line and send it through a cloned sender.
pub fn send_log(tx: &mpsc::UnboundedSender<String>, prefix: &str, line: &str) {
    let formatted = format!("[{}] [{prefix}] {line}\n", timestamp());
    let _ = tx.send(formatted);
}

async fn writer_task(file: tokio::fs::File, mut rx: mpsc::UnboundedReceiver<String>) {
    use tokio::io::AsyncWriteExt;
    let mut writer = tokio::io::BufWriter::new(file);

    while let Some(line) = rx.recv().await {
        let _ = writer.write_all(line.as_bytes()).await;
        // Flush every line so the log is readable while the run is going
        let _ = writer.flush().await;
    }

    let footer = format!("\n=== Session ended {} ===\n", timestamp());
    let _ = writer.write_all(footer.as_bytes()).await;
    let _ = writer.flush().await;
}

/// ISO 8601 UTC, e.g. "2025-06-15T10:30:00Z".
fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Keep only the 10 most recent `session-*.log` files.
async fn cleanup_old_sessions(logs_dir: &Path) {
    let mut entries = match tokio::fs::read_dir(logs_dir).await {
        Ok(rd) => rd,
        Err(_) => return,
    };

    let mut session_files: Vec<PathBuf> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with("session-") && name_str.ends_with(".log") {
            session_files.push(entry.path());
        }
    }

    // Timestamps have the same width for centuries, so name order is age order
    session_files.sort();

    let excess = session_files.len().saturating_sub(MAX_SESSIONS);
    for oldest in session_files.iter().take(excess) {
        let _ = tokio::fs::remove_file(oldest).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logger_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SessionLogger::new(dir.path()).await.unwrap();
        {
            let tx = logger.sender();
            send_log(&tx, "info", "Downloading OBJ");
        }
        let path = logger.path().to_path_buf();
        logger.finish().await;

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("=== rbxavatar session "));
        assert!(content.contains("[info] Downloading OBJ"));
        assert!(content.contains("=== Session ended "));
    }

    #[tokio::test]
    async fn test_previous_log_is_rotated() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join(".logs");
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(logs.join("latest.log"), "old run\n").unwrap();

        let logger = SessionLogger::new(dir.path()).await.unwrap();
        logger.finish().await;

        let rotated: Vec<_> = std::fs::read_dir(&logs)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with("session-"))
            .collect();
        assert_eq!(rotated.len(), 1);
        let old = std::fs::read_to_string(logs.join(&rotated[0])).unwrap();
        assert_eq!(old, "old run\n");
    }

    #[tokio::test]
    async fn test_old_sessions_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join(".logs");
        std::fs::create_dir_all(&logs).unwrap();
        for i in 0..13 {
            std::fs::write(logs.join(format!("session-10000000{i:02}.log")), "x").unwrap();
        }

        cleanup_old_sessions(&logs).await;

        let mut left: Vec<_> = std::fs::read_dir(&logs)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        left.sort();
        assert_eq!(left.len(), MAX_SESSIONS);
        assert_eq!(left[0], "session-1000000003.log");
    }
}
