use std::path::PathBuf;

use anyhow::{Context, Result};
use launcher_core::config::default_config_path;
use launcher_core::{InstanceRegistry, LauncherConfig, LauncherContext};
use tracing::debug;

/// Context and registry shared by every subcommand.
pub struct Launcher {
    pub ctx: LauncherContext,
    pub registry: InstanceRegistry,
}

impl Launcher {
    pub fn load(work_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(default_config_path);
        let mut config = LauncherConfig::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        if let Some(work_dir) = work_dir {
            config.work_dir = work_dir;
        }
        debug!(config = %config_path.display(), work_dir = %config.work_dir.display(), "loaded config");

        let ctx = LauncherContext::new(config).context("Failed to initialize launcher")?;
        let registry = InstanceRegistry::new(ctx.dirs.instances.clone());
        let loaded = registry.load().context("Failed to load instances")?;
        debug!(instances = loaded, "loaded instances");
        Ok(Self { ctx, registry })
    }
}
