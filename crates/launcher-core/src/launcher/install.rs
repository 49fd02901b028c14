use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::assets::{install_assets, AssetLayout};
use super::download::{DownloadBatch, DownloadTask};
use super::java::{java_component, JavaRuntimeManager};
use super::libraries::{extract_natives, plan_libraries, NativeArchive};
use super::manifest::VersionMetadata;
use super::progress::{SessionListener, Stage};
use super::versions::ManifestCache;
use crate::config::LauncherContext;
use crate::error::{LauncherError, LauncherResult};
use crate::paths::{ensure_dir, InstanceDirs};

/// Everything on disk a launch of one version needs.
#[derive(Debug, Clone)]
pub struct InstalledVersion {
    pub version: VersionMetadata,
    pub client_jar: PathBuf,
    /// Library jars in metadata order, without the client jar.
    pub libraries: Vec<PathBuf>,
    pub natives_dir: PathBuf,
    pub assets: Option<AssetLayout>,
    /// Set when a managed runtime was installed.
    pub java: Option<PathBuf>,
}

impl InstalledVersion {
    /// Launch classpath with `client_jar` (the original or an overlay) last.
    pub fn classpath_with(&self, client_jar: &Path) -> Vec<PathBuf> {
        let mut classpath = self.libraries.clone();
        classpath.push(client_jar.to_path_buf());
        classpath
    }
}

pub struct Installer {
    ctx: LauncherContext,
    manifests: ManifestCache,
}

impl Installer {
    pub fn new(ctx: &LauncherContext) -> Self {
        Self {
            ctx: ctx.clone(),
            manifests: ManifestCache::new(ctx),
        }
    }

    pub async fn ensure_installed(
        &self,
        version_id: &str,
        instance: &InstanceDirs,
        download_java_runtime: bool,
        listener: &dyn SessionListener,
    ) -> LauncherResult<InstalledVersion> {
        self.ctx.dirs.create_all()?;

        listener.on_stage(Stage::ResolvingVersion);
        let version = self.manifests.resolve(version_id, false).await?;
        info!(version = %version.id, legacy = version.is_legacy(), "installing version");

        listener.on_stage(Stage::DownloadingClient);
        let client_jar = self.download_client(&version, listener).await?;

        listener.on_stage(Stage::DownloadingLibraries);
        let plan = plan_libraries(&version.libraries, &self.ctx.dirs.libraries, &self.ctx.platform);
        debug!(
            classpath = plan.classpath.len(),
            natives = plan.natives.len(),
            pending = plan.downloads.len(),
            "planned libraries"
        );
        let mut batch = DownloadBatch::new(
            self.ctx.client.clone(),
            self.ctx.config.download_concurrency,
            "Libraries",
        );
        for task in plan.downloads {
            batch.add(task);
        }
        batch.run_all(listener).await?;

        listener.on_stage(Stage::ExtractingNatives);
        let natives_dir = instance.natives_dir(&version.id);
        let extracted = unpack_natives(plan.natives, natives_dir.clone()).await?;
        debug!(extracted, dir = %natives_dir.display(), "natives ready");

        listener.on_stage(Stage::DownloadingAssets);
        let assets = install_assets(&self.ctx, &version, instance, listener).await?;

        let java = if download_java_runtime {
            listener.on_stage(Stage::DownloadingJava);
            let component = java_component(&version);
            let manager = JavaRuntimeManager::new(&self.ctx);
            Some(manager.ensure_runtime(&component, listener).await?)
        } else {
            None
        };

        Ok(InstalledVersion {
            version,
            client_jar,
            libraries: plan.classpath,
            natives_dir,
            assets,
            java,
        })
    }

    async fn download_client(
        &self,
        version: &VersionMetadata,
        listener: &dyn SessionListener,
    ) -> LauncherResult<PathBuf> {
        let download = version.client_download().ok_or_else(|| LauncherError::InvalidVersion {
            id: version.id.clone(),
            reason: "missing client download".to_string(),
        })?;
        let path = self.ctx.dirs.client_jar(&version.id);
        // A correct-size jar is trusted; the hash is checked after each transfer.
        let Some(task) = DownloadTask::from_download(download, &path).if_needed() else {
            return Ok(path);
        };
        let mut batch = DownloadBatch::new(self.ctx.client.clone(), 1, "Client");
        batch.add(task);
        batch.run_all(listener).await?;
        Ok(path)
    }
}

async fn unpack_natives(natives: Vec<NativeArchive>, natives_dir: PathBuf) -> LauncherResult<usize> {
    tokio::task::spawn_blocking(move || -> LauncherResult<usize> {
        ensure_dir(&natives_dir)?;
        let mut written = 0;
        for archive in &natives {
            written += extract_natives(archive, &natives_dir)?;
        }
        Ok(written)
    })
    .await
    .map_err(|err| LauncherError::Io(std::io::Error::other(err)))?
}
