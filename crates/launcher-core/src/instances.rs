use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LauncherError, LauncherResult};
use crate::models::{Instance, JarMod};
use crate::paths::{ensure_dir, file_exists, InstanceDirs};

/// In-memory view of `<root>/instances`, kept in step with the directories on disk.
#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    root: PathBuf,
    instances: Arc<RwLock<BTreeMap<String, Instance>>>,
}

impl InstanceRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            instances: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scans `*/instance.json`, replacing whatever was loaded before.
    /// Unreadable entries are skipped with a warning.
    pub fn load(&self) -> LauncherResult<usize> {
        ensure_dir(&self.root)?;
        let mut loaded = BTreeMap::new();
        let entries = fs::read_dir(&self.root).map_err(|err| LauncherError::fs(&self.root, err))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let file = InstanceDirs::new(&path).instance_file();
            if !file_exists(&file) {
                continue;
            }
            match read_instance(&file) {
                Ok(instance) => {
                    loaded.insert(instance.name.clone(), instance);
                }
                Err(err) => warn!(path = %file.display(), error = %err, "skipping unreadable instance"),
            }
        }
        let count = loaded.len();
        *self.write() = loaded;
        debug!(count, root = %self.root.display(), "loaded instances");
        Ok(count)
    }

    pub fn dirs(&self, name: &str) -> InstanceDirs {
        InstanceDirs::new(self.root.join(name))
    }

    pub fn create(
        &self,
        name: &str,
        group: Option<String>,
        minecraft_version: &str,
    ) -> LauncherResult<Instance> {
        validate_name(name)?;
        let mut instances = self.write();
        let dirs = self.dirs(name);
        if instances.contains_key(name) || file_exists(&dirs.work_dir) {
            return Err(LauncherError::InstanceExists(name.to_string()));
        }

        ensure_dir(&dirs.minecraft_dir)?;
        let instance = Instance::new(name, group, minecraft_version);
        write_instance(&dirs.instance_file(), &instance)?;
        instances.insert(name.to_string(), instance.clone());
        info!(instance = name, version = minecraft_version, "created instance");
        Ok(instance)
    }

    pub fn remove(&self, name: &str) -> LauncherResult<()> {
        let mut instances = self.write();
        let instance = instances
            .get(name)
            .ok_or_else(|| LauncherError::InstanceNotFound(name.to_string()))?;
        if instance.running {
            return Err(LauncherError::AlreadyRunning(name.to_string()));
        }

        let dir = self.root.join(name);
        if file_exists(&dir) {
            fs::remove_dir_all(&dir).map_err(|err| LauncherError::fs(&dir, err))?;
        }
        instances.remove(name);
        info!(instance = name, "removed instance");
        Ok(())
    }

    /// Drops the entry when its directory disappeared behind our back.
    pub fn exists(&self, name: &str) -> bool {
        if !self.read().contains_key(name) {
            return false;
        }
        if file_exists(&self.root.join(name)) {
            return true;
        }
        self.write().remove(name);
        debug!(instance = name, "instance directory vanished; dropping entry");
        false
    }

    pub fn get(&self, name: &str) -> LauncherResult<Instance> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| LauncherError::InstanceNotFound(name.to_string()))
    }

    pub fn list(&self) -> Vec<Instance> {
        self.read().values().cloned().collect()
    }

    pub fn save(&self, instance: &Instance) -> LauncherResult<()> {
        let mut instances = self.write();
        let current = instances
            .get_mut(&instance.name)
            .ok_or_else(|| LauncherError::InstanceNotFound(instance.name.clone()))?;
        let running = current.running;
        *current = instance.clone();
        current.running = running;
        write_instance(&self.dirs(&instance.name).instance_file(), current)
    }

    /// Applies `change` to the stored instance and persists the result.
    pub fn update<F>(&self, name: &str, change: F) -> LauncherResult<Instance>
    where
        F: FnOnce(&mut Instance),
    {
        let mut instances = self.write();
        let instance = instances
            .get_mut(name)
            .ok_or_else(|| LauncherError::InstanceNotFound(name.to_string()))?;
        change(instance);
        write_instance(&self.dirs(name).instance_file(), instance)?;
        Ok(instance.clone())
    }

    /// Copies `source` to `jarmods/<uuid>.jar` and appends it as an active mod.
    pub fn add_jar_mod(&self, name: &str, source: &Path) -> LauncherResult<JarMod> {
        if !self.exists(name) {
            return Err(LauncherError::InstanceNotFound(name.to_string()));
        }
        let dirs = self.dirs(name);
        ensure_dir(&dirs.jar_mods_dir)?;

        let uuid = Uuid::new_v4();
        let destination = dirs.jar_mods_dir.join(format!("{uuid}.jar"));
        fs::copy(source, &destination).map_err(|err| LauncherError::fs(source, err))?;

        let display_name = source
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| uuid.to_string());
        let jar_mod = JarMod {
            uuid,
            active: true,
            full_path: destination,
            display_name,
        };
        let added = jar_mod.clone();
        self.update(name, move |instance| instance.jar_mods.push(jar_mod))?;
        info!(instance = name, jar_mod = %added.display_name, "added jar mod");
        Ok(added)
    }

    pub fn remove_jar_mod(&self, name: &str, uuid: Uuid) -> LauncherResult<()> {
        let instance = self.get(name)?;
        let jar_mod = instance
            .jar_mods
            .iter()
            .find(|jar_mod| jar_mod.uuid == uuid)
            .ok_or_else(|| LauncherError::Config(format!("Jar mod {uuid} not found in {name}")))?;
        if file_exists(&jar_mod.full_path) {
            fs::remove_file(&jar_mod.full_path)
                .map_err(|err| LauncherError::fs(&jar_mod.full_path, err))?;
        }
        self.update(name, |instance| instance.jar_mods.retain(|jar_mod| jar_mod.uuid != uuid))?;
        Ok(())
    }

    pub fn set_jar_mod_active(&self, name: &str, uuid: Uuid, active: bool) -> LauncherResult<()> {
        let mut found = false;
        self.update(name, |instance| {
            if let Some(jar_mod) = instance.jar_mod_mut(uuid) {
                jar_mod.active = active;
                found = true;
            }
        })?;
        if !found {
            return Err(LauncherError::Config(format!("Jar mod {uuid} not found in {name}")));
        }
        Ok(())
    }

    /// Marks the instance running. The flag clears when the guard drops.
    pub fn try_start(&self, name: &str) -> LauncherResult<RunningGuard> {
        let mut instances = self.write();
        let instance = instances
            .get_mut(name)
            .ok_or_else(|| LauncherError::InstanceNotFound(name.to_string()))?;
        if instance.running {
            return Err(LauncherError::AlreadyRunning(name.to_string()));
        }
        instance.running = true;
        Ok(RunningGuard {
            registry: self.clone(),
            name: name.to_string(),
        })
    }

    pub fn record_session(
        &self,
        name: &str,
        seconds: u64,
        finished_at: u64,
        exit_code: Option<i32>,
    ) -> LauncherResult<Instance> {
        self.update(name, |instance| {
            instance.last_exit_code = exit_code;
            instance.total_playtime_seconds += seconds;
            instance.last_playtime_seconds = seconds;
            instance.last_time_played = Some(finished_at);
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Instance>> {
        self.instances.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Instance>> {
        self.instances.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug)]
pub struct RunningGuard {
    registry: InstanceRegistry,
    name: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if let Some(instance) = self.registry.write().get_mut(&self.name) {
            instance.running = false;
        }
    }
}

fn validate_name(name: &str) -> LauncherResult<()> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed != name
        || name.starts_with('.')
        || name.contains(['/', '\\', ':', '*', '?', '"', '<', '>', '|']);
    if invalid {
        return Err(LauncherError::Config(format!("Invalid instance name: {name:?}")));
    }
    Ok(())
}

fn read_instance(path: &Path) -> LauncherResult<Instance> {
    let bytes = fs::read(path).map_err(|err| LauncherError::fs(path, err))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_instance(path: &Path, instance: &Instance) -> LauncherResult<()> {
    let bytes = serde_json::to_vec_pretty(instance)?;
    fs::write(path, bytes).map_err(|err| LauncherError::fs(path, err))
}
