use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::account::AuthError;
use crate::launcher::download::DownloadError;
use crate::net::http::HttpError;

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("Failed to fetch version manifest: {0}")]
    ManifestFetch(#[source] HttpError),
    #[error("Version {0} not found in manifest")]
    VersionNotFound(String),
    #[error("Invalid version metadata for {id}: {reason}")]
    InvalidVersion { id: String, reason: String },
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("Failed to extract {}: {reason}", path.display())]
    ArchiveExtraction { path: PathBuf, reason: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Failed to launch {program}: {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Java runtime unavailable: {0}")]
    JavaRuntime(String),
    #[error("Instance {0} is already running")]
    AlreadyRunning(String),
    #[error("Instance {0} does not exist")]
    InstanceNotFound(String),
    #[error("Instance {0} already exists")]
    InstanceExists(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("{}: {source}", path.display())]
    Fs {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl LauncherError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LauncherError::Fs {
            path: path.into(),
            source,
        }
    }
}

pub type LauncherResult<T> = Result<T, LauncherError>;
