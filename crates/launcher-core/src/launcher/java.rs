use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::download::{file_matches, DownloadBatch, DownloadTask};
use super::manifest::{release_numbers, Download, VersionMetadata};
use super::progress::SessionListener;
use crate::config::LauncherContext;
use crate::error::{LauncherError, LauncherResult};
use crate::net::http::fetch_json;
use crate::paths::ensure_dir;
use crate::platform::{OsKind, Platform};

pub const RUNTIME_CATALOG_URL: &str =
    "https://launchermeta.mojang.com/v1/products/java-runtime/2ec0cc96c44e5a76b9c8b7c39df7210883d12871/all.json";
const RUNTIME_MANIFEST_MARKER_FILE: &str = ".runtime_manifest_url";

#[derive(Debug, Deserialize)]
pub(crate) struct JavaRuntimeFiles {
    pub files: HashMap<String, JavaRuntimeFile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JavaRuntimeFile {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub executable: bool,
    #[serde(default)]
    pub downloads: Option<JavaRuntimeDownloads>,
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JavaRuntimeDownloads {
    #[serde(default)]
    pub raw: Option<Download>,
}

#[derive(Debug, Deserialize)]
struct JavaRuntimeCatalogEntry {
    #[serde(default)]
    manifest: Option<JavaRuntimeCatalogManifest>,
}

#[derive(Debug, Deserialize)]
struct JavaRuntimeCatalogManifest {
    url: String,
}

/// Runtime component a version asks for. Versions without a `javaVersion`
/// entry get `java-runtime-gamma` from 1.17 on and `jre-legacy` before.
pub fn java_component(version: &VersionMetadata) -> String {
    if let Some(java) = &version.java_version {
        return java.component.clone();
    }
    match release_numbers(&version.id) {
        Some((_, minor, _)) if minor >= 17 => "java-runtime-gamma".to_string(),
        _ => "jre-legacy".to_string(),
    }
}

/// Home of an installed component: `runtimes/<component>`.
pub fn runtime_home(runtimes: &Path, component: &str) -> PathBuf {
    runtimes.join(component)
}

/// Launcher executable inside a runtime home.
pub fn java_executable(runtime_home: &Path, platform: &Platform) -> PathBuf {
    let home = match platform.os {
        OsKind::Osx => runtime_home.join("jre.bundle").join("Contents").join("Home"),
        _ => runtime_home.to_path_buf(),
    };
    home.join("bin").join(platform.java_executable_name())
}

/// Downloads Mojang-provided Java runtimes into the shared `runtimes` store.
#[derive(Debug, Clone)]
pub struct JavaRuntimeManager {
    client: Client,
    runtimes: PathBuf,
    catalog_url: String,
    platform: Platform,
    concurrency: usize,
}

impl JavaRuntimeManager {
    pub fn new(ctx: &LauncherContext) -> Self {
        Self {
            client: ctx.client.clone(),
            runtimes: ctx.dirs.runtimes.clone(),
            catalog_url: ctx.config.java_runtime_catalog_url.clone(),
            platform: ctx.platform.clone(),
            concurrency: ctx.config.download_concurrency,
        }
    }

    /// Installs `component` if needed and returns the path of its executable.
    pub async fn ensure_runtime(
        &self,
        component: &str,
        listener: &dyn SessionListener,
    ) -> LauncherResult<PathBuf> {
        let os_key = self.platform.runtime_key();
        let catalog: serde_json::Value = fetch_json(&self.client, &self.catalog_url).await?;
        let platform = catalog
            .get(os_key)
            .and_then(|value| value.as_object())
            .ok_or_else(|| LauncherError::JavaRuntime(format!("platform {os_key} not in catalog")))?;

        let chosen = select_java_component(platform, component);
        if chosen != component {
            warn!(requested = component, using = %chosen, "java runtime component unavailable");
        }
        let entry = select_runtime_entry(platform, &chosen)?;
        let manifest_url = entry
            .manifest
            .as_ref()
            .map(|manifest| manifest.url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| LauncherError::JavaRuntime(format!("manifest url missing for {chosen}")))?;

        let home = runtime_home(&self.runtimes, &chosen);
        let executable = java_executable(&home, &self.platform);
        let marker_path = home.join(RUNTIME_MANIFEST_MARKER_FILE);
        if runtime_is_latest(&executable, &marker_path, &manifest_url) {
            debug!(component = %chosen, "java runtime up to date");
            return Ok(executable);
        }

        info!(component = %chosen, platform = os_key, "installing java runtime");
        let runtime_manifest: JavaRuntimeFiles = fetch_json(&self.client, &manifest_url).await?;
        ensure_dir(&home)?;

        let mut batch = DownloadBatch::new(self.client.clone(), self.concurrency, "Java runtime");
        let mut executables = Vec::new();
        let mut links = Vec::new();
        for (relative_path, file) in &runtime_manifest.files {
            let out_path = home.join(relative_path);
            match file.kind.as_str() {
                "directory" => ensure_dir(&out_path)?,
                "file" => {
                    let download = file
                        .downloads
                        .as_ref()
                        .and_then(|downloads| downloads.raw.as_ref())
                        .ok_or_else(|| {
                            LauncherError::JavaRuntime(format!("no raw download for {relative_path}"))
                        })?;
                    if file.executable {
                        executables.push(out_path.clone());
                    }
                    if !file_matches(&out_path, download.size, download.sha1.as_deref()) {
                        batch.add(DownloadTask::from_download(download, out_path));
                    }
                }
                "link" => {
                    if let Some(target) = &file.target {
                        let base = out_path.parent().unwrap_or(&home);
                        links.push((base.join(target), out_path));
                    }
                }
                _ => {}
            }
        }

        batch.run_all(listener).await?;
        for path in &executables {
            set_executable(path)?;
        }
        for (target, link) in links {
            create_runtime_link(&target, &link)?;
        }

        if !executable.exists() {
            return Err(LauncherError::JavaRuntime(format!(
                "java executable missing after install: {}",
                executable.display()
            )));
        }
        fs::write(&marker_path, &manifest_url).map_err(|err| LauncherError::fs(&marker_path, err))?;
        Ok(executable)
    }
}

fn runtime_is_latest(java_path: &Path, marker_path: &Path, manifest_url: &str) -> bool {
    if !java_path.exists() {
        return false;
    }
    match fs::read_to_string(marker_path) {
        Ok(marker) => marker.trim() == manifest_url.trim(),
        Err(_) => false,
    }
}

fn has_entries(platform: &serde_json::Map<String, serde_json::Value>, component: &str) -> bool {
    platform
        .get(component)
        .and_then(|value| value.as_array())
        .map(|items| !items.is_empty())
        .unwrap_or(false)
}

pub(crate) fn select_java_component(
    platform: &serde_json::Map<String, serde_json::Value>,
    desired: &str,
) -> String {
    if has_entries(platform, desired) {
        return desired.to_string();
    }

    let candidates = [
        "java-runtime-delta",
        "java-runtime-gamma",
        "java-runtime-beta",
        "java-runtime-alpha",
        "jre-legacy",
    ];
    candidates
        .into_iter()
        .find(|candidate| has_entries(platform, candidate))
        .map(str::to_string)
        .unwrap_or_else(|| desired.to_string())
}

fn select_runtime_entry(
    platform: &serde_json::Map<String, serde_json::Value>,
    component: &str,
) -> LauncherResult<JavaRuntimeCatalogEntry> {
    let entries = platform
        .get(component)
        .and_then(|value| value.as_array())
        .ok_or_else(|| LauncherError::JavaRuntime(format!("no {component} runtime for this platform")))?;

    entries
        .iter()
        .filter_map(|value| serde_json::from_value::<JavaRuntimeCatalogEntry>(value.clone()).ok())
        .find(|entry| {
            entry
                .manifest
                .as_ref()
                .map(|manifest| !manifest.url.trim().is_empty())
                .unwrap_or(false)
        })
        .ok_or_else(|| LauncherError::JavaRuntime(format!("no usable {component} runtime entry")))
}

fn set_executable(path: &Path) -> LauncherResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)
            .map_err(|err| LauncherError::fs(path, err))?
            .permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(path, perms).map_err(|err| LauncherError::fs(path, err))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn create_runtime_link(target: &Path, link: &Path) -> LauncherResult<()> {
    if link.exists() {
        return Ok(());
    }
    if let Some(parent) = link.parent() {
        ensure_dir(parent)?;
    }
    if !target.exists() {
        return Err(LauncherError::JavaRuntime(format!(
            "link target missing: {}",
            target.display()
        )));
    }

    if try_create_symlink(target, link).is_ok() {
        return Ok(());
    }
    if target.is_file() {
        fs::copy(target, link).map_err(|err| LauncherError::fs(link, err))?;
    } else if target.is_dir() {
        ensure_dir(link)?;
    }
    Ok(())
}

fn try_create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(windows)]
    {
        if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, link);
        Err(std::io::Error::other("symlinks unsupported"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::manifest::JavaVersion;

    fn version(id: &str, json: &str) -> VersionMetadata {
        serde_json::from_str(&format!(
            r#"{{"id": "{id}", "type": "release", "mainClass": "Main", "minecraftArguments": "" {json}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn component_prefers_metadata_then_release_number() {
        let mut modern = version("1.20.1", "");
        assert_eq!(java_component(&modern), "java-runtime-gamma");
        modern.java_version = Some(JavaVersion {
            component: "java-runtime-delta".to_string(),
            major_version: Some(21),
        });
        assert_eq!(java_component(&modern), "java-runtime-delta");
        assert_eq!(java_component(&version("1.16.5", "")), "jre-legacy");
        assert_eq!(java_component(&version("b1.7.3", "")), "jre-legacy");
    }

    #[test]
    fn executable_path_follows_platform_layout() {
        let home = Path::new("/rt/java-runtime-gamma");
        let mac = Platform::new(OsKind::Osx, "14.0", "aarch64");
        assert_eq!(
            java_executable(home, &mac),
            PathBuf::from("/rt/java-runtime-gamma/jre.bundle/Contents/Home/bin/java")
        );
        let windows = Platform::new(OsKind::Windows, "10.0", "x86_64");
        assert!(java_executable(home, &windows).ends_with("bin/javaw.exe"));
    }

    #[test]
    fn missing_component_falls_back_to_known_list() {
        let catalog: serde_json::Value = serde_json::json!({
            "java-runtime-gamma": [{"manifest": {"url": "http://host/gamma.json"}}],
            "java-runtime-delta": []
        });
        let platform = catalog.as_object().unwrap();
        assert_eq!(select_java_component(platform, "java-runtime-delta"), "java-runtime-gamma");
        assert_eq!(select_java_component(platform, "java-runtime-gamma"), "java-runtime-gamma");
        let entry = select_runtime_entry(platform, "java-runtime-gamma").unwrap();
        assert_eq!(entry.manifest.unwrap().url, "http://host/gamma.json");
    }

    #[test]
    fn marker_must_match_manifest_url() {
        let temp = tempfile::tempdir().unwrap();
        let java = temp.path().join("java");
        let marker = temp.path().join(RUNTIME_MANIFEST_MARKER_FILE);
        fs::write(&java, b"").unwrap();
        assert!(!runtime_is_latest(&java, &marker, "http://a"));
        fs::write(&marker, "http://a\n").unwrap();
        assert!(runtime_is_latest(&java, &marker, "http://a"));
        assert!(!runtime_is_latest(&java, &marker, "http://b"));
    }
}
