use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JarMod {
    pub uuid: Uuid,
    #[serde(default = "default_true")]
    pub active: bool,
    pub full_path: PathBuf,
    pub display_name: String,
}

/// Persisted as `instance.json` inside the instance directory.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    pub minecraft_version: String,
    #[serde(default)]
    pub java_path: Option<PathBuf>,
    #[serde(default)]
    pub min_memory_mb: Option<u32>,
    #[serde(default)]
    pub max_memory_mb: Option<u32>,
    /// Deduplicated, in insertion order.
    #[serde(default)]
    pub custom_jvm_flags: Vec<String>,
    #[serde(default)]
    pub jar_mods: Vec<JarMod>,
    #[serde(default)]
    pub total_playtime_seconds: u64,
    #[serde(default)]
    pub last_playtime_seconds: u64,
    /// Unix seconds of the last session end.
    #[serde(default)]
    pub last_time_played: Option<u64>,
    #[serde(default)]
    pub last_exit_code: Option<i32>,
    #[serde(skip)]
    pub running: bool,
}

fn default_true() -> bool {
    true
}

impl Instance {
    pub fn new(name: impl Into<String>, group: Option<String>, minecraft_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group,
            minecraft_version: minecraft_version.into(),
            java_path: None,
            min_memory_mb: None,
            max_memory_mb: None,
            custom_jvm_flags: Vec::new(),
            jar_mods: Vec::new(),
            total_playtime_seconds: 0,
            last_playtime_seconds: 0,
            last_time_played: None,
            last_exit_code: None,
            running: false,
        }
    }

    pub fn add_jvm_flag(&mut self, flag: impl Into<String>) -> bool {
        let flag = flag.into();
        if flag.trim().is_empty() || self.custom_jvm_flags.contains(&flag) {
            return false;
        }
        self.custom_jvm_flags.push(flag);
        true
    }

    pub fn active_jar_mods(&self) -> impl Iterator<Item = &JarMod> {
        self.jar_mods.iter().filter(|jar_mod| jar_mod.active)
    }

    pub fn jar_mod_mut(&mut self, uuid: Uuid) -> Option<&mut JarMod> {
        self.jar_mods.iter_mut().find(|jar_mod| jar_mod.uuid == uuid)
    }

    pub fn java_override(&self) -> Option<&PathBuf> {
        self.java_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}
