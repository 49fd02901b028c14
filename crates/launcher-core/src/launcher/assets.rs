use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use super::download::{file_matches, DownloadBatch, DownloadTask};
use super::manifest::{AssetIndex, VersionMetadata};
use super::progress::SessionListener;
use crate::config::LauncherContext;
use crate::error::{LauncherError, LauncherResult};
use crate::paths::{ensure_dir, InstanceDirs, LauncherDirs};

/// What the game needs to know about the installed asset index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLayout {
    pub index_id: String,
    pub is_virtual: bool,
    pub map_to_resources: bool,
}

impl AssetLayout {
    /// Directory the game reads assets from: `resources/` for pre-1.6 layouts,
    /// the virtual tree for 1.6 to 1.7.2, the shared store otherwise.
    pub fn game_assets_dir(&self, dirs: &LauncherDirs, instance: &InstanceDirs) -> PathBuf {
        if self.map_to_resources {
            instance.resources_dir()
        } else if self.is_virtual {
            dirs.virtual_assets(&self.index_id)
        } else {
            dirs.assets.clone()
        }
    }
}

pub fn object_url(base_url: &str, hash: &str) -> String {
    let prefix = hash.get(0..2).unwrap_or(hash);
    format!("{}/{prefix}/{hash}", base_url.trim_end_matches('/'))
}

/// Downloads the asset index and every missing object, then mirrors objects
/// into the legacy layouts the index asks for.
pub async fn install_assets(
    ctx: &LauncherContext,
    version: &VersionMetadata,
    instance: &InstanceDirs,
    listener: &dyn SessionListener,
) -> LauncherResult<Option<AssetLayout>> {
    let Some(index_ref) = version.asset_index.as_ref() else {
        debug!(version = %version.id, "version has no asset index");
        return Ok(None);
    };

    let index_path = ctx.dirs.asset_index(&index_ref.id);
    if !file_matches(&index_path, index_ref.size, index_ref.sha1.as_deref()) {
        let mut task = DownloadTask::new(&index_ref.url, &index_path);
        task.sha1 = index_ref.sha1.clone();
        task.expected_size = index_ref.size;
        let mut batch = DownloadBatch::new(ctx.client.clone(), 1, "Asset index");
        batch.add(task);
        batch.run_all(listener).await?;
    }

    let bytes = tokio::fs::read(&index_path)
        .await
        .map_err(|err| LauncherError::fs(&index_path, err))?;
    let index: AssetIndex = serde_json::from_slice(&bytes)?;

    let layout = AssetLayout {
        index_id: index_ref.id.clone(),
        is_virtual: index.is_virtual,
        map_to_resources: index.map_to_resources,
    };

    // Several names may share one object.
    let objects: BTreeMap<String, u64> = index
        .objects
        .values()
        .map(|object| (object.hash.clone(), object.size))
        .collect();
    let store = ctx.dirs.clone();
    let missing = tokio::task::spawn_blocking(move || {
        objects
            .into_iter()
            .filter(|(hash, size)| !file_matches(&store.asset_object(hash), Some(*size), Some(hash.as_str())))
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|err| LauncherError::Io(std::io::Error::other(err)))?;

    info!(
        index = %layout.index_id,
        total = index.objects.len(),
        missing = missing.len(),
        "syncing assets"
    );

    let mut batch = DownloadBatch::new(
        ctx.client.clone(),
        ctx.config.download_concurrency,
        "Assets",
    );
    for (hash, size) in missing {
        let destination = ctx.dirs.asset_object(&hash);
        let task = DownloadTask::new(object_url(&ctx.config.assets_base_url, &hash), destination)
            .with_size(size)
            .with_sha1(hash);
        batch.add(task);
    }
    batch.run_all(listener).await?;

    if layout.map_to_resources || layout.is_virtual {
        let target = layout.game_assets_dir(&ctx.dirs, instance);
        let store = ctx.dirs.clone();
        let copied = tokio::task::spawn_blocking(move || mirror_objects(&index, &store, &target))
            .await
            .map_err(|err| LauncherError::Io(std::io::Error::other(err)))??;
        debug!(copied, "mirrored legacy assets");
    }

    Ok(Some(layout))
}

/// Copies verified objects to `<target>/<virtual path>`. Existing files of the
/// right size are left alone.
pub fn mirror_objects(index: &AssetIndex, store: &LauncherDirs, target: &Path) -> LauncherResult<usize> {
    let mut copied = 0;
    for (name, object) in &index.objects {
        let Some(relative) = safe_relative(name) else {
            continue;
        };
        let destination = target.join(relative);
        let up_to_date = fs::metadata(&destination)
            .map(|meta| meta.len() == object.size)
            .unwrap_or(false);
        if up_to_date {
            continue;
        }
        if let Some(parent) = destination.parent() {
            ensure_dir(parent)?;
        }
        let source = store.asset_object(&object.hash);
        fs::copy(&source, &destination).map_err(|err| LauncherError::fs(&source, err))?;
        copied += 1;
    }
    Ok(copied)
}

fn safe_relative(name: &str) -> Option<&Path> {
    let path = Path::new(name);
    path.components()
        .all(|component| matches!(component, Component::Normal(_)))
        .then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::manifest::AssetObject;

    #[test]
    fn object_urls_use_hash_prefix() {
        assert_eq!(
            object_url("https://resources.download.minecraft.net/", "ab12ef"),
            "https://resources.download.minecraft.net/ab/ab12ef"
        );
    }

    #[test]
    fn legacy_layouts_pick_their_directories() {
        let dirs = LauncherDirs::new("/data");
        let instance = InstanceDirs::new("/data/instances/Old");
        let mut layout = AssetLayout {
            index_id: "pre-1.6".to_string(),
            is_virtual: false,
            map_to_resources: true,
        };
        assert_eq!(layout.game_assets_dir(&dirs, &instance), instance.resources_dir());
        layout.map_to_resources = false;
        layout.is_virtual = true;
        assert_eq!(
            layout.game_assets_dir(&dirs, &instance),
            PathBuf::from("/data/minecraft/assets/virtual/pre-1.6")
        );
        layout.is_virtual = false;
        assert_eq!(layout.game_assets_dir(&dirs, &instance), dirs.assets);
    }

    #[test]
    fn mirror_copies_objects_and_skips_unsafe_names() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(temp.path());
        let hash = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
        let object = dirs.asset_object(hash);
        fs::create_dir_all(object.parent().unwrap()).unwrap();
        fs::write(&object, b"hello").unwrap();

        let mut index = AssetIndex::default();
        for name in ["sound/step.ogg", "../escape.ogg"] {
            index.objects.insert(
                name.to_string(),
                AssetObject {
                    hash: hash.to_string(),
                    size: 5,
                },
            );
        }

        let target = temp.path().join("resources");
        assert_eq!(mirror_objects(&index, &dirs, &target).unwrap(), 1);
        assert_eq!(fs::read(target.join("sound/step.ogg")).unwrap(), b"hello");
        assert!(!temp.path().join("escape.ogg").exists());
        assert_eq!(mirror_objects(&index, &dirs, &target).unwrap(), 0);
    }
}
