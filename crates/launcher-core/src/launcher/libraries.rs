use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use super::download::DownloadTask;
use super::manifest::{Download, Library};
use super::rules;
use crate::error::{LauncherError, LauncherResult};
use crate::paths::{ensure_dir, file_exists};
use crate::platform::Platform;

/// A native archive paired with the exclusions of the library it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeArchive {
    pub path: PathBuf,
    pub exclude: Vec<String>,
}

#[derive(Debug, Default)]
pub struct LibraryPlan {
    /// Library jars in metadata order, without the client jar.
    pub classpath: Vec<PathBuf>,
    pub natives: Vec<NativeArchive>,
    pub downloads: Vec<DownloadTask>,
}

/// Libraries that apply on `platform`, in metadata order.
pub fn applicable<'a>(
    libraries: &'a [Library],
    platform: &'a Platform,
) -> impl Iterator<Item = &'a Library> + 'a {
    libraries.iter().filter(move |library| {
        rules::applies(library.rules.as_deref(), platform) && is_arch_relevant(&library.name, platform)
    })
}

/// Maven names ending in an architecture suffix only apply on that CPU.
pub fn is_arch_relevant(name: &str, platform: &Platform) -> bool {
    if name.ends_with("arm64") {
        platform.is_arm64()
    } else if name.ends_with("arm32") {
        platform.is_arm32()
    } else if name.ends_with("x86") {
        platform.is_x86()
    } else {
        true
    }
}

/// Classifier key of the native archive for `platform`, if the library has one.
pub fn native_classifier(library: &Library, platform: &Platform) -> Option<String> {
    let os_key = platform.os.key();
    if let Some(natives) = &library.natives {
        return natives
            .get(os_key)
            .map(|classifier| classifier.replace("${arch}", platform.bits()));
    }

    let classifiers = library.downloads.as_ref()?.classifiers.as_ref()?;
    let base = format!("natives-{os_key}");
    if classifiers.contains_key(&base) {
        return Some(base);
    }
    let qualified = format!("{base}-{}", platform.native_qualifier());
    classifiers.contains_key(&qualified).then_some(qualified)
}

pub fn plan_libraries(libraries: &[Library], libraries_dir: &Path, platform: &Platform) -> LibraryPlan {
    let mut plan = LibraryPlan::default();
    let mut seen = HashSet::new();
    let mut seen_natives = HashSet::new();

    for library in applicable(libraries, platform) {
        let exclude = library
            .extract
            .as_ref()
            .map(|extract| extract.exclude.clone())
            .unwrap_or_default();
        let classifier = native_classifier(library, platform);

        if let Some(downloads) = &library.downloads {
            if let Some(artifact) = &downloads.artifact {
                let path = libraries_dir.join(artifact_path(artifact, &library.name, None));
                if seen.insert(path.clone()) {
                    plan.classpath.push(path.clone());
                    plan.downloads.extend(DownloadTask::from_download(artifact, path).if_needed());
                }
            }

            let native = classifier.as_deref().and_then(|key| {
                downloads
                    .classifiers
                    .as_ref()
                    .and_then(|classifiers| classifiers.get(key))
                    .map(|download| (key, download))
            });
            if let Some((key, download)) = native {
                let path = libraries_dir.join(artifact_path(download, &library.name, Some(key)));
                if !seen_natives.insert(path.clone()) {
                    continue;
                }
                plan.downloads.extend(DownloadTask::from_download(download, &path).if_needed());
                plan.natives.push(NativeArchive {
                    path,
                    exclude: exclude.clone(),
                });
            }
        } else if let Some(base_url) = &library.url {
            let mut base = base_url.trim().to_string();
            if !base.ends_with('/') {
                base.push('/');
            }

            let artifact_rel = library_path_from_name(&library.name);
            let artifact_path = libraries_dir.join(&artifact_rel);
            if seen.insert(artifact_path.clone()) {
                plan.classpath.push(artifact_path.clone());
                plan.downloads.extend(
                    DownloadTask::new(format!("{base}{artifact_rel}"), artifact_path).if_needed(),
                );
            }

            if let Some(key) = classifier.as_deref() {
                let native_rel = library_path_from_parts(&library.name, Some(key));
                let native_path = libraries_dir.join(&native_rel);
                if !seen_natives.insert(native_path.clone()) {
                    continue;
                }
                plan.downloads.extend(
                    DownloadTask::new(format!("{base}{native_rel}"), &native_path).if_needed(),
                );
                plan.natives.push(NativeArchive {
                    path: native_path,
                    exclude,
                });
            }
        }
    }

    plan
}

pub fn join_classpath(entries: &[PathBuf], separator: &str) -> String {
    entries
        .iter()
        .map(|path| path.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Unpacks one native archive. Excluded prefixes, directory entries and files
/// already present are skipped. Returns the number of files written.
pub fn extract_natives(archive: &NativeArchive, natives_dir: &Path) -> LauncherResult<usize> {
    let extraction_error = |reason: String| LauncherError::ArchiveExtraction {
        path: archive.path.clone(),
        reason,
    };

    let file = File::open(&archive.path).map_err(|err| LauncherError::fs(&archive.path, err))?;
    let mut zip = ZipArchive::new(file).map_err(|err| extraction_error(err.to_string()))?;
    ensure_dir(natives_dir)?;

    let mut written = 0;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|err| extraction_error(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if archive.exclude.iter().any(|prefix| name.starts_with(prefix.as_str())) {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            return Err(extraction_error(format!("unsafe entry path {name}")));
        };

        let out_path = natives_dir.join(relative);
        if file_exists(&out_path) {
            continue;
        }
        if let Some(parent) = out_path.parent() {
            ensure_dir(parent)?;
        }
        let mut outfile = File::create(&out_path).map_err(|err| LauncherError::fs(&out_path, err))?;
        std::io::copy(&mut entry, &mut outfile).map_err(|err| extraction_error(format!("{name}: {err}")))?;
        written += 1;
    }

    Ok(written)
}

fn artifact_path(download: &Download, name: &str, classifier: Option<&str>) -> String {
    download
        .path
        .clone()
        .unwrap_or_else(|| library_path_from_parts(name, classifier))
}

pub(crate) fn library_path_from_name(name: &str) -> String {
    library_path_from_parts(name, None)
}

pub(crate) fn library_path_from_parts(name: &str, classifier: Option<&str>) -> String {
    let parts: Vec<&str> = name.split(':').collect();
    if parts.len() < 3 {
        return name.replace(':', "/");
    }
    let group = parts[0].replace('.', "/");
    let artifact = parts[1];
    let version = parts[2];
    let classifier = classifier.or_else(|| parts.get(3).copied());

    let filename = match classifier {
        Some(classifier) => format!("{artifact}-{version}-{classifier}.jar"),
        None => format!("{artifact}-{version}.jar"),
    };

    format!("{group}/{artifact}/{version}/{filename}")
}
