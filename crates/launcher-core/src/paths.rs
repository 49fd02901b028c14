use std::path::{Path, PathBuf};

use crate::error::{LauncherError, LauncherResult};

const INSTANCE_FILE_NAME: &str = "instance.json";

pub fn default_work_dir() -> PathBuf {
    if let Some(data) = dirs::data_dir() {
        return data.join("mc-launcher");
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".mc-launcher");
    }

    PathBuf::from("mc-launcher")
}

pub fn ensure_dir(path: &Path) -> LauncherResult<()> {
    std::fs::create_dir_all(path).map_err(|err| LauncherError::fs(path, err))
}

pub fn file_exists(path: &Path) -> bool {
    std::fs::metadata(path).is_ok()
}

/// Shared, content-addressed stores under `<root>/minecraft`.
#[derive(Debug, Clone)]
pub struct LauncherDirs {
    pub root: PathBuf,
    pub versions: PathBuf,
    pub libraries: PathBuf,
    pub assets: PathBuf,
    pub runtimes: PathBuf,
    pub instances: PathBuf,
}

impl LauncherDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let minecraft = root.join("minecraft");
        Self {
            versions: minecraft.join("versions"),
            libraries: minecraft.join("libraries"),
            assets: minecraft.join("assets"),
            runtimes: minecraft.join("runtimes"),
            instances: root.join("instances"),
            root,
        }
    }

    pub fn create_all(&self) -> LauncherResult<()> {
        for dir in [
            &self.versions,
            &self.libraries,
            &self.assets,
            &self.runtimes,
            &self.instances,
        ] {
            ensure_dir(dir)?;
        }
        ensure_dir(&self.assets.join("indexes"))?;
        ensure_dir(&self.assets.join("objects"))
    }

    pub fn version_dir(&self, version_id: &str) -> PathBuf {
        self.versions.join(version_id)
    }

    pub fn version_json(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id)
            .join(format!("{version_id}.json"))
    }

    pub fn client_jar(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id).join(format!("{version_id}.jar"))
    }

    pub fn asset_index(&self, index_id: &str) -> PathBuf {
        self.assets.join("indexes").join(format!("{index_id}.json"))
    }

    pub fn asset_object(&self, hash: &str) -> PathBuf {
        let prefix = hash.get(0..2).unwrap_or(hash);
        self.assets.join("objects").join(prefix).join(hash)
    }

    pub fn virtual_assets(&self, index_id: &str) -> PathBuf {
        self.assets.join("virtual").join(index_id)
    }
}

/// Per-instance directories.
#[derive(Debug, Clone)]
pub struct InstanceDirs {
    pub work_dir: PathBuf,
    pub minecraft_dir: PathBuf,
    pub jar_mods_dir: PathBuf,
    pub natives_root: PathBuf,
}

impl InstanceDirs {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        let minecraft_name = if cfg!(target_os = "macos") {
            "minecraft"
        } else {
            ".minecraft"
        };
        Self {
            minecraft_dir: work_dir.join(minecraft_name),
            jar_mods_dir: work_dir.join("jarmods"),
            natives_root: work_dir.join("natives"),
            work_dir,
        }
    }

    pub fn instance_file(&self) -> PathBuf {
        self.work_dir.join(INSTANCE_FILE_NAME)
    }

    pub fn natives_dir(&self, version_id: &str) -> PathBuf {
        self.natives_root.join(version_id)
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.minecraft_dir.join("resources")
    }
}
