use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

use super::manifest::{VersionManifest, VersionMetadata};
use crate::config::LauncherContext;
use crate::error::{LauncherError, LauncherResult};
use crate::net::http::{fetch_text, HttpError};
use crate::paths::LauncherDirs;

pub const MANIFEST_TTL: Duration = Duration::from_secs(3 * 60 * 60);
const MANIFEST_FILE_NAME: &str = "version_manifest_v2.json";

/// Version manifest with a disk copy refreshed after [`MANIFEST_TTL`].
/// Per-version documents are cached forever under `versions/<id>/<id>.json`.
#[derive(Debug, Clone)]
pub struct ManifestCache {
    client: Client,
    manifest_url: String,
    dirs: LauncherDirs,
    ttl: Duration,
}

impl ManifestCache {
    pub fn new(ctx: &LauncherContext) -> Self {
        Self {
            client: ctx.client.clone(),
            manifest_url: ctx.config.manifest_url.clone(),
            dirs: ctx.dirs.clone(),
            ttl: MANIFEST_TTL,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dirs.versions.join(MANIFEST_FILE_NAME)
    }

    pub async fn manifest(&self, force_network: bool) -> LauncherResult<VersionManifest> {
        let path = self.manifest_path();
        if !force_network && self.is_fresh(&path).await {
            match read_manifest(&path).await {
                Some(manifest) => {
                    debug!(path = %path.display(), "using cached version manifest");
                    return Ok(manifest);
                }
                None => warn!(path = %path.display(), "cached version manifest is unreadable"),
            }
        }

        match self.fetch_manifest().await {
            Ok((manifest, body)) => {
                if let Err(err) = write_manifest(&path, &body).await {
                    warn!(path = %path.display(), error = %err, "failed to cache version manifest");
                }
                info!(versions = manifest.versions.len(), "refreshed version manifest");
                Ok(manifest)
            }
            Err(err) => match read_manifest(&path).await {
                Some(manifest) => {
                    warn!(error = %err, "manifest refresh failed; using stale copy");
                    Ok(manifest)
                }
                None => Err(LauncherError::ManifestFetch(err)),
            },
        }
    }

    /// Looks `id` up in the manifest and returns its metadata.
    pub async fn resolve(&self, id: &str, force_network: bool) -> LauncherResult<VersionMetadata> {
        let path = self.dirs.version_json(id);
        if let Some(version) = read_cached_version(&path).await {
            return Ok(version);
        }

        let manifest = self.manifest(force_network).await?;
        let summary = manifest
            .find(id)
            .ok_or_else(|| LauncherError::VersionNotFound(id.to_string()))?;
        self.version(id, &summary.url).await
    }

    /// Fetches metadata for `id` once; afterwards the disk copy is authoritative.
    pub async fn version(&self, id: &str, url: &str) -> LauncherResult<VersionMetadata> {
        let path = self.dirs.version_json(id);
        if let Some(version) = read_cached_version(&path).await {
            return Ok(version);
        }

        debug!(version = id, %url, "downloading version metadata");
        let body = fetch_text(&self.client, url).await?;
        let version: VersionMetadata =
            serde_json::from_str(&body).map_err(|err| LauncherError::InvalidVersion {
                id: id.to_string(),
                reason: err.to_string(),
            })?;

        let dir = self.dirs.version_dir(id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|err| LauncherError::fs(&dir, err))?;
        fs::write(&path, body)
            .await
            .map_err(|err| LauncherError::fs(&path, err))?;
        Ok(version)
    }

    async fn fetch_manifest(&self) -> Result<(VersionManifest, String), HttpError> {
        let body = fetch_text(&self.client, &self.manifest_url).await?;
        let manifest = serde_json::from_str(&body).map_err(|source| HttpError::Parse {
            source,
            body: body.chars().take(256).collect(),
        })?;
        Ok((manifest, body))
    }

    async fn is_fresh(&self, path: &Path) -> bool {
        let Ok(metadata) = fs::metadata(path).await else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.ttl,
            // Modified in the future counts as fresh.
            Err(_) => true,
        }
    }
}

async fn write_manifest(path: &Path, body: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, body).await
}

async fn read_manifest(path: &Path) -> Option<VersionManifest> {
    let bytes = fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

async fn read_cached_version(path: &Path) -> Option<VersionMetadata> {
    let bytes = fs::read(path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(version) => Some(version),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable version metadata");
            None
        }
    }
}
