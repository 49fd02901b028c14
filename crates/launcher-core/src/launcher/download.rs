use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use sha1::{Digest, Sha1};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::manifest::Download;
use super::progress::{ProgressTracker, SessionListener};
use crate::net::http::{send_with_retries, HttpError};

pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Integrity check failed for {}: expected sha1 {expected}, got {actual}", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("Download of {} incomplete: expected {expected} bytes, got {actual}", path.display())]
    Incomplete {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
    #[error("Download of {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: HttpError,
    },
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}", BatchSummary(failures))]
    Batch { failures: Vec<DownloadError> },
}

struct BatchSummary<'a>(&'a [DownloadError]);

impl fmt::Display for BatchSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} download(s) failed", self.0.len())?;
        if let Some(first) = self.0.first() {
            write!(f, "; first: {first}")?;
        }
        Ok(())
    }
}

impl DownloadError {
    fn io(path: &Path, source: io::Error) -> Self {
        DownloadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Per-file failures, flattening an aggregated batch.
    pub fn failures(&self) -> Vec<&DownloadError> {
        match self {
            DownloadError::Batch { failures } => failures.iter().flat_map(|f| f.failures()).collect(),
            other => vec![other],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub sha1: Option<String>,
    pub expected_size: Option<u64>,
    pub destination: PathBuf,
    /// Bytes already on disk. Non-zero asks for `Range: bytes=<offset>-`.
    pub resume_offset: u64,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            sha1: None,
            expected_size: None,
            destination: destination.into(),
            resume_offset: 0,
        }
    }

    pub fn from_download(download: &Download, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: download.url.clone(),
            sha1: download.sha1.clone(),
            expected_size: download.size,
            destination: destination.into(),
            resume_offset: 0,
        }
    }

    pub fn with_sha1(mut self, sha1: impl Into<String>) -> Self {
        self.sha1 = Some(sha1.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    pub fn resume_from(mut self, offset: u64) -> Self {
        self.resume_offset = offset;
        self
    }

    /// Size-only precheck: `None` when the destination already has the expected
    /// length, otherwise the task, resuming when a shorter partial file exists.
    pub fn if_needed(self) -> Option<Self> {
        let existing = std::fs::metadata(&self.destination).map(|meta| meta.len()).ok();
        match (existing, self.expected_size) {
            (None, _) => Some(self),
            (Some(_), None) => None,
            (Some(len), Some(size)) if len == size => None,
            (Some(len), Some(size)) if len < size => Some(self.resume_from(len)),
            (Some(_), Some(_)) => Some(self.resume_from(0)),
        }
    }
}

/// A set of transfers run with bounded concurrency. One failed task does not
/// stop its siblings; every failure is returned together.
pub struct DownloadBatch {
    client: Client,
    concurrency: usize,
    label: String,
    tasks: Vec<DownloadTask>,
}

impl DownloadBatch {
    pub fn new(client: Client, concurrency: usize, label: impl Into<String>) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            label: label.into(),
            tasks: Vec::new(),
        }
    }

    pub fn add(&mut self, task: DownloadTask) {
        self.tasks.push(task);
    }

    pub async fn run_all(self, listener: &dyn SessionListener) -> Result<(), DownloadError> {
        if self.tasks.is_empty() {
            return Ok(());
        }

        let total: u64 = self
            .tasks
            .iter()
            .filter_map(|task| task.expected_size)
            .sum();
        let tracker = ProgressTracker::new(listener, self.label.as_str(), total);
        let count = self.tasks.len();
        debug!(label = %self.label, count, total, "starting download batch");

        let client = &self.client;
        let tracker_ref = &tracker;
        let failures: Vec<DownloadError> = stream::iter(self.tasks.into_iter().map(move |task| async move {
            run_task(client, &task, tracker_ref).await.map_err(|err| {
                warn!(url = %task.url, error = %err, "download failed");
                err
            })
        }))
        .buffer_unordered(self.concurrency)
        .filter_map(|result| async move { result.err() })
        .collect()
        .await;

        tracker.finish();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DownloadError::Batch { failures })
        }
    }
}

async fn run_task(
    client: &Client,
    task: &DownloadTask,
    tracker: &ProgressTracker<'_>,
) -> Result<(), DownloadError> {
    let path = task.destination.as_path();
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|err| DownloadError::io(parent, err))?;
    }

    let mut offset = task.resume_offset;
    let http_error = |source| DownloadError::Http {
        url: task.url.clone(),
        source,
    };

    let mut response = send_with_retries(client, &task.url, (offset > 0).then_some(offset))
        .await
        .map_err(http_error)?;

    if offset > 0 {
        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                tracker.advance(offset);
            }
            StatusCode::RANGE_NOT_SATISFIABLE if task.expected_size == Some(offset) => {
                tracker.advance(offset);
                return verify(task).await;
            }
            _ => {
                // The server ignored or rejected the range; start over.
                offset = 0;
                if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
                    response = send_with_retries(client, &task.url, None)
                        .await
                        .map_err(http_error)?;
                }
            }
        }
    }

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(http_error(HttpError::Status { status, body }));
    }

    if task.expected_size.is_none() {
        if let Some(length) = response.content_length() {
            tracker.grow(length + offset);
        }
    }

    let mut file = if offset > 0 {
        async_fs::OpenOptions::new()
            .append(true)
            .open(path)
            .await
            .map_err(|err| DownloadError::io(path, err))?
    } else {
        async_fs::File::create(path)
            .await
            .map_err(|err| DownloadError::io(path, err))?
    };

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|err| http_error(HttpError::Request(err)))?;
        file.write_all(&bytes)
            .await
            .map_err(|err| DownloadError::io(path, err))?;
        tracker.advance(bytes.len() as u64);
    }
    file.flush().await.map_err(|err| DownloadError::io(path, err))?;
    drop(file);

    if let Some(expected) = task.expected_size {
        let actual = async_fs::metadata(path)
            .await
            .map(|meta| meta.len())
            .map_err(|err| DownloadError::io(path, err))?;
        if actual != expected {
            return Err(DownloadError::Incomplete {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }
    }

    verify(task).await
}

/// Checks the sha1 when one is known. A mismatching file is removed.
async fn verify(task: &DownloadTask) -> Result<(), DownloadError> {
    let Some(expected) = task.sha1.clone() else {
        return Ok(());
    };
    let path = task.destination.clone();
    let actual = sha1_file_blocking(path.clone()).await?;
    if actual.eq_ignore_ascii_case(&expected) {
        return Ok(());
    }
    let _ = async_fs::remove_file(&path).await;
    Err(DownloadError::Integrity {
        path,
        expected,
        actual,
    })
}

pub async fn sha1_file_blocking(path: PathBuf) -> Result<String, DownloadError> {
    let join_path = path.clone();
    tokio::task::spawn_blocking(move || sha1_file(&path))
        .await
        .map_err(|err| DownloadError::io(&join_path, io::Error::new(io::ErrorKind::Other, err)))?
}

pub fn sha1_file(path: &Path) -> Result<String, DownloadError> {
    let mut file = std::fs::File::open(path).map_err(|err| DownloadError::io(path, err))?;
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = io::Read::read(&mut file, &mut buffer).map_err(|err| DownloadError::io(path, err))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// True when `path` exists with `size` bytes and, if given, the right sha1.
pub fn file_matches(path: &Path, size: Option<u64>, sha1: Option<&str>) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if size.is_some_and(|size| metadata.len() != size) {
        return false;
    }
    match sha1 {
        Some(expected) => sha1_file(path)
            .map(|actual| actual.eq_ignore_ascii_case(expected))
            .unwrap_or(false),
        None => true,
    }
}
