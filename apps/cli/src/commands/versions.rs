use anyhow::{Context, Result};
use clap::Args;
use launcher_core::launcher::versions::ManifestCache;

use crate::config::Launcher;

#[derive(Args)]
pub struct VersionsArgs {
    /// Include snapshots and old betas
    #[arg(long)]
    all: bool,
    /// Ignore the cached manifest
    #[arg(long)]
    refresh: bool,
}

pub async fn run(launcher: &Launcher, args: VersionsArgs) -> Result<()> {
    let manifest = ManifestCache::new(&launcher.ctx)
        .manifest(args.refresh)
        .await
        .context("Failed to load the version manifest")?;

    println!(
        "latest release: {}  latest snapshot: {}",
        manifest.latest.release, manifest.latest.snapshot
    );
    for version in manifest
        .versions
        .iter()
        .filter(|version| args.all || version.kind == "release")
    {
        let released = version.release_time.as_deref().unwrap_or("");
        println!("{:<24} {:<10} {}", version.id, version.kind, released);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn versions_flags_default_off() {
        let cli = Cli::try_parse_from(["mc-launcher", "versions"]).unwrap();
        let Commands::Versions(args) = cli.command else {
            panic!("expected versions");
        };
        assert!(!args.all && !args.refresh);

        let cli = Cli::try_parse_from(["mc-launcher", "versions", "--all", "--refresh"]).unwrap();
        let Commands::Versions(args) = cli.command else {
            panic!("expected versions");
        };
        assert!(args.all && args.refresh);
    }
}
