/// All errors that can occur while resolving users and building avatar packages.
#[derive(Debug, thiserror::Error)]
pub enum DownloaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("User '{0}' could not be found")]
    UserNotFound(String),

    #[error("Neither avatar.obj nor avatar.mtl could be downloaded")]
    MissingMesh,

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, DownloaderError>;
