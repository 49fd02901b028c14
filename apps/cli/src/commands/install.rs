use anyhow::{Context, Result};
use clap::Args;
use launcher_core::launcher::install::Installer;

use crate::config::Launcher;
use crate::listener::ConsoleListener;

#[derive(Args)]
pub struct InstallArgs {
    /// Instance whose version should be installed
    instance: String,
}

pub async fn run(launcher: &Launcher, args: InstallArgs) -> Result<()> {
    let instance = launcher.registry.get(&args.instance)?;
    let dirs = launcher.registry.dirs(&args.instance);
    let listener = ConsoleListener::default();

    let installed = Installer::new(&launcher.ctx)
        .ensure_installed(
            &instance.minecraft_version,
            &dirs,
            instance.java_override().is_none(),
            &listener,
        )
        .await
        .with_context(|| format!("Failed to install {}", instance.minecraft_version))?;

    println!(
        "Installed {} ({} libraries)",
        installed.version.id,
        installed.libraries.len()
    );
    if let Some(java) = installed.java {
        println!("Java: {}", java.display());
    }
    Ok(())
}
