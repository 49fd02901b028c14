pub mod args;
pub mod assets;
pub mod download;
pub mod install;
pub mod jarmods;
pub mod java;
pub mod libraries;
pub mod manifest;
pub mod process;
pub mod progress;
pub mod rules;
pub mod versions;

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use crate::account::Account;
use crate::config::LauncherContext;
use crate::error::{LauncherError, LauncherResult};
use crate::instances::InstanceRegistry;
use crate::models::Instance;
use crate::paths::{ensure_dir, InstanceDirs};
use args::{build_arguments, LaunchArguments};
use install::Installer;
use process::{LaunchCommand, ProcessSupervisor, Redactor, StopHandle};

pub use install::InstalledVersion;
pub use progress::{LogLevel, NoopListener, SessionListener, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Authenticating,
    Installing,
    BuildingArgs,
    Launching,
    Running,
    Failed,
}

/// Drives one instance from sign-in to process exit.
pub struct InstanceRunner {
    ctx: LauncherContext,
    registry: InstanceRegistry,
    name: String,
    listener: Arc<dyn SessionListener>,
    installer: Installer,
    state: Arc<Mutex<SessionState>>,
    /// Replaced at every launch so a late stop cannot reach the next game.
    stop: Mutex<StopHandle>,
}

impl InstanceRunner {
    pub fn new(
        ctx: &LauncherContext,
        registry: InstanceRegistry,
        name: impl Into<String>,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        Self {
            ctx: ctx.clone(),
            registry,
            name: name.into(),
            listener,
            installer: Installer::new(ctx),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            stop: Mutex::new(StopHandle::default()),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Asks a running game to exit. Has no effect outside `Launching`/`Running`.
    pub fn stop(&self) {
        if matches!(self.state(), SessionState::Launching | SessionState::Running) {
            self.stop
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .stop();
        }
    }

    /// Runs a full session and returns the game's exit code.
    pub async fn launch(&self, account: &mut dyn Account) -> LauncherResult<i32> {
        let _running = self.registry.try_start(&self.name)?;
        let result = self.run_session(account).await;
        if let Err(err) = &result {
            warn!(instance = %self.name, error = %err, "launch session failed");
            self.set_state(SessionState::Failed);
        }
        self.set_state(SessionState::Idle);
        result
    }

    async fn run_session(&self, account: &mut dyn Account) -> LauncherResult<i32> {
        let listener = self.listener.as_ref();

        self.set_state(SessionState::Authenticating);
        listener.on_stage(Stage::Authenticating);
        account.authenticate().await?;

        let instance = self.registry.get(&self.name)?;
        let dirs = self.registry.dirs(&self.name);
        ensure_dir(&dirs.minecraft_dir)?;

        self.set_state(SessionState::Installing);
        let java_override = instance.java_override().cloned();
        let installed = self
            .installer
            .ensure_installed(&instance.minecraft_version, &dirs, java_override.is_none(), listener)
            .await?;
        let java = java_override
            .or_else(|| installed.java.clone())
            .ok_or_else(|| LauncherError::JavaRuntime("no java executable available".to_string()))?;

        self.set_state(SessionState::BuildingArgs);
        listener.on_stage(Stage::ApplyingJarMods);
        let overlay =
            jarmods::apply_overlay(&installed.client_jar, &dirs.work_dir, &instance.jar_mods).await?;
        let classpath = installed.classpath_with(overlay.path());

        listener.on_stage(Stage::BuildingArguments);
        let args = self.arguments(&instance, &installed, &dirs, &classpath, &*account);
        let command = LaunchCommand {
            program: java,
            args,
            work_dir: dirs.work_dir.clone(),
            env: vec![("APPDATA".to_string(), dirs.work_dir.to_string_lossy().to_string())],
        };

        let stop = self.fresh_stop_handle();
        self.set_state(SessionState::Launching);
        listener.on_stage(Stage::Launching);
        let supervisor = ProcessSupervisor::new(self.listener.clone(), Redactor::new(&*account))
            .with_stop_handle(stop);
        let started = Instant::now();
        self.set_state(SessionState::Running);
        listener.on_stage(Stage::Running);
        let exit = supervisor.launch(&command).await;
        overlay.cleanup();
        let code = exit?;

        let played = started.elapsed().as_secs();
        let finished_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        self.registry
            .record_session(&self.name, played, finished_at, Some(code))?;
        info!(instance = %self.name, code, played, "session finished");
        listener.on_stage(Stage::Finished);
        Ok(code)
    }

    fn arguments(
        &self,
        instance: &Instance,
        installed: &InstalledVersion,
        dirs: &InstanceDirs,
        classpath: &[std::path::PathBuf],
        account: &dyn Account,
    ) -> Vec<String> {
        let config = &self.ctx.config;
        let max_memory_mb = instance.max_memory_mb.unwrap_or(config.default_max_memory_mb);
        let min_memory_mb = instance
            .min_memory_mb
            .unwrap_or(config.default_min_memory_mb)
            .min(max_memory_mb);
        let legacy_assets_dir = installed
            .assets
            .as_ref()
            .map(|layout| layout.game_assets_dir(&self.ctx.dirs, dirs))
            .unwrap_or_else(|| self.ctx.dirs.assets.clone());
        let asset_index_name = installed.version.asset_index_id().unwrap_or("legacy");

        build_arguments(&LaunchArguments {
            version: &installed.version,
            platform: &self.ctx.platform,
            account,
            classpath,
            natives_dir: &installed.natives_dir,
            library_dir: &self.ctx.dirs.libraries,
            game_dir: &dirs.minecraft_dir,
            assets_dir: &self.ctx.dirs.assets,
            legacy_assets_dir: &legacy_assets_dir,
            asset_index_name,
            min_memory_mb,
            max_memory_mb,
            custom_jvm_flags: &instance.custom_jvm_flags,
            launcher_name: &config.launcher_name,
            launcher_version: env!("CARGO_PKG_VERSION"),
        })
    }

    fn fresh_stop_handle(&self) -> StopHandle {
        let handle = StopHandle::default();
        *self.stop.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = handle.clone();
        handle
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }
}
