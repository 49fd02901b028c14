use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{LauncherError, LauncherResult};
use crate::launcher::java::RUNTIME_CATALOG_URL;
use crate::launcher::manifest::{RESOURCES_URL, VERSION_MANIFEST_URL};
use crate::net::http::build_client;
use crate::paths::{self, LauncherDirs};
use crate::platform::Platform;

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LauncherConfig {
    #[serde(default = "paths::default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,
    #[serde(default = "default_assets_base_url")]
    pub assets_base_url: String,
    #[serde(default = "default_runtime_catalog_url")]
    pub java_runtime_catalog_url: String,
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,
    #[serde(default = "default_min_memory_mb")]
    pub default_min_memory_mb: u32,
    #[serde(default = "default_max_memory_mb")]
    pub default_max_memory_mb: u32,
    #[serde(default = "default_launcher_name")]
    pub launcher_name: String,
    #[serde(default)]
    pub offline_username: Option<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            work_dir: paths::default_work_dir(),
            manifest_url: default_manifest_url(),
            assets_base_url: default_assets_base_url(),
            java_runtime_catalog_url: default_runtime_catalog_url(),
            download_concurrency: default_download_concurrency(),
            default_min_memory_mb: default_min_memory_mb(),
            default_max_memory_mb: default_max_memory_mb(),
            launcher_name: default_launcher_name(),
            offline_username: None,
        }
    }
}

fn default_manifest_url() -> String {
    VERSION_MANIFEST_URL.to_string()
}

fn default_assets_base_url() -> String {
    RESOURCES_URL.to_string()
}

fn default_runtime_catalog_url() -> String {
    RUNTIME_CATALOG_URL.to_string()
}

fn default_download_concurrency() -> usize {
    8
}

fn default_min_memory_mb() -> u32 {
    512
}

fn default_max_memory_mb() -> u32 {
    2048
}

fn default_launcher_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

pub fn default_config_path() -> PathBuf {
    paths::default_work_dir().join(CONFIG_FILE_NAME)
}

impl LauncherConfig {
    /// Reads the config at `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> LauncherResult<Self> {
        if !paths::file_exists(path) {
            debug!(path = %path.display(), "config not found; using defaults");
            return Ok(Self::default());
        }
        let bytes = fs::read(path).map_err(|err| LauncherError::fs(path, err))?;
        let config: LauncherConfig = serde_json::from_slice(&bytes)
            .map_err(|err| LauncherError::Config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> LauncherResult<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, bytes).map_err(|err| LauncherError::fs(path, err))
    }

    pub fn validate(&self) -> LauncherResult<()> {
        if self.download_concurrency == 0 {
            return Err(LauncherError::Config(
                "downloadConcurrency must be at least 1".to_string(),
            ));
        }
        if self.default_min_memory_mb > self.default_max_memory_mb {
            return Err(LauncherError::Config(format!(
                "defaultMinMemoryMb ({}) exceeds defaultMaxMemoryMb ({})",
                self.default_min_memory_mb, self.default_max_memory_mb
            )));
        }
        Ok(())
    }
}

/// Everything the pipeline components share. Passed explicitly; there is no global.
#[derive(Debug, Clone)]
pub struct LauncherContext {
    pub client: Client,
    pub dirs: LauncherDirs,
    pub config: LauncherConfig,
    pub platform: Platform,
}

impl LauncherContext {
    pub fn new(config: LauncherConfig) -> LauncherResult<Self> {
        let user_agent = format!("{}/{}", config.launcher_name, env!("CARGO_PKG_VERSION"));
        let client = build_client(&user_agent)?;
        Ok(Self::with_parts(client, config, Platform::current()))
    }

    pub fn with_parts(client: Client, config: LauncherConfig, platform: Platform) -> Self {
        let dirs = LauncherDirs::new(&config.work_dir);
        Self {
            client,
            dirs,
            config,
            platform,
        }
    }
}
