use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use launcher_core::{InstanceRunner, OfflineAccount};
use tracing::warn;

use crate::config::Launcher;
use crate::listener::ConsoleListener;

#[derive(Args)]
pub struct LaunchArgs {
    instance: String,
    /// Offline player name; defaults to `offlineUsername` from the config
    #[arg(long)]
    username: Option<String>,
}

pub async fn run(launcher: &Launcher, args: LaunchArgs) -> Result<()> {
    let username = args
        .username
        .or_else(|| launcher.ctx.config.offline_username.clone())
        .context("No username given; pass --username or set offlineUsername")?;
    let mut account = OfflineAccount::new(username);

    let runner = Arc::new(InstanceRunner::new(
        &launcher.ctx,
        launcher.registry.clone(),
        &args.instance,
        Arc::new(ConsoleListener::default()),
    ));

    let stopper = runner.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping the game");
            stopper.stop();
        }
    });

    let result = runner.launch(&mut account).await;
    ctrl_c.abort();
    let code = result.with_context(|| format!("Failed to launch {}", args.instance))?;
    if code != 0 {
        bail!("Minecraft exited with code {code}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn launch_takes_instance_and_optional_username() {
        let cli = Cli::try_parse_from(["mc-launcher", "launch", "Vanilla", "--username", "Steve"]).unwrap();
        let Commands::Launch(args) = cli.command else {
            panic!("expected launch");
        };
        assert_eq!(args.instance, "Vanilla");
        assert_eq!(args.username.as_deref(), Some("Steve"));

        let cli = Cli::try_parse_from(["mc-launcher", "launch", "Vanilla"]).unwrap();
        let Commands::Launch(args) = cli.command else {
            panic!("expected launch");
        };
        assert_eq!(args.username, None);

        assert!(Cli::try_parse_from(["mc-launcher", "launch"]).is_err());
    }
}
