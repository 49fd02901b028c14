use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{LauncherError, LauncherResult};
use crate::models::JarMod;
use crate::paths::ensure_dir;

/// The client jar handed to the JVM for one session.
///
/// When jar mods were merged this is a private temporary file that is
/// deleted on [`Overlay::cleanup`] or drop.
#[derive(Debug)]
pub struct Overlay {
    path: PathBuf,
    temporary: bool,
}

impl Overlay {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn cleanup(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if !self.temporary {
            return;
        }
        self.temporary = false;
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "failed to remove overlay jar");
            }
        }
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Merges active jar mods over `client_jar`, in list order.
pub async fn apply_overlay(
    client_jar: &Path,
    work_dir: &Path,
    jar_mods: &[JarMod],
) -> LauncherResult<Overlay> {
    let active: Vec<PathBuf> = jar_mods
        .iter()
        .filter(|jar_mod| jar_mod.active)
        .map(|jar_mod| jar_mod.full_path.clone())
        .collect();
    if active.is_empty() {
        return Ok(Overlay {
            path: client_jar.to_path_buf(),
            temporary: false,
        });
    }

    let client_jar = client_jar.to_path_buf();
    let work_dir = work_dir.to_path_buf();
    tokio::task::spawn_blocking(move || build_overlay(&client_jar, &work_dir, &active))
        .await
        .map_err(|err| LauncherError::Io(io::Error::other(err)))?
}

pub fn build_overlay(client_jar: &Path, work_dir: &Path, mods: &[PathBuf]) -> LauncherResult<Overlay> {
    let session = Uuid::new_v4();
    let scratch = work_dir.join(format!("jarmod-scratch-{session}"));
    let target = work_dir.join(format!("client-{session}.jar"));
    ensure_dir(work_dir)?;

    let result = merge(client_jar, &scratch, &target, mods);
    if let Err(err) = fs::remove_dir_all(&scratch) {
        if err.kind() != io::ErrorKind::NotFound {
            warn!(path = %scratch.display(), error = %err, "failed to remove jar mod scratch dir");
        }
    }

    let overlay = Overlay {
        path: target,
        temporary: true,
    };
    let written = result?;
    info!(mods = mods.len(), overrides = written, path = %overlay.path.display(), "applied jar mods");
    Ok(overlay)
}

fn merge(client_jar: &Path, scratch: &Path, target: &Path, mods: &[PathBuf]) -> LauncherResult<usize> {
    let mut overrides: BTreeMap<String, PathBuf> = BTreeMap::new();
    for (index, jar_mod) in mods.iter().enumerate() {
        let dir = scratch.join(index.to_string());
        unpack(jar_mod, &dir)?;
        for entry in WalkDir::new(&dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&dir) else {
                continue;
            };
            let name = relative
                .components()
                .map(|part| part.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            overrides.insert(name, entry.path().to_path_buf());
        }
    }

    let source = File::open(client_jar).map_err(|err| LauncherError::fs(client_jar, err))?;
    let mut original = ZipArchive::new(source).map_err(|err| extraction_error(client_jar, err))?;
    let output = File::create(target).map_err(|err| LauncherError::fs(target, err))?;
    let mut writer = ZipWriter::new(output);

    for index in 0..original.len() {
        let entry = original
            .by_index_raw(index)
            .map_err(|err| extraction_error(client_jar, err))?;
        let name = entry.name().to_string();
        if is_signature_entry(&name) || overrides.contains_key(&name) {
            debug!(entry = %name, "dropping client jar entry");
            continue;
        }
        writer.raw_copy_file(entry)?;
    }

    let options = SimpleFileOptions::default();
    for (name, path) in &overrides {
        writer.start_file(name.as_str(), options)?;
        let mut file = File::open(path).map_err(|err| LauncherError::fs(path, err))?;
        io::copy(&mut file, &mut writer).map_err(|err| LauncherError::fs(target, err))?;
    }
    writer.finish()?;
    Ok(overrides.len())
}

fn unpack(archive: &Path, dir: &Path) -> LauncherResult<()> {
    let file = File::open(archive).map_err(|err| LauncherError::fs(archive, err))?;
    let mut zip = ZipArchive::new(file).map_err(|err| extraction_error(archive, err))?;
    ensure_dir(dir)?;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|err| extraction_error(archive, err))?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out = dir.join(relative);
        if entry.is_dir() {
            ensure_dir(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            ensure_dir(parent)?;
        }
        let mut file = File::create(&out).map_err(|err| LauncherError::fs(&out, err))?;
        io::copy(&mut entry, &mut file).map_err(|err| extraction_error(archive, err))?;
    }
    Ok(())
}

fn extraction_error(archive: &Path, err: impl std::fmt::Display) -> LauncherError {
    LauncherError::ArchiveExtraction {
        path: archive.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Manifest and signature files would make the JVM reject modified classes.
fn is_signature_entry(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    if !upper.starts_with("META-INF/") {
        return false;
    }
    upper == "META-INF/MANIFEST.MF"
        || [".SF", ".RSA", ".DSA", ".EC"]
            .iter()
            .any(|suffix| upper.ends_with(suffix))
}
