use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod listener;

use commands::{instance, install, launch, versions};

#[derive(Parser)]
#[command(name = "mc-launcher", version, about = "Install and launch Minecraft instances")]
struct Cli {
    /// Root of the launcher data directory
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,
    /// Path to config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List versions from the version manifest
    Versions(versions::VersionsArgs),
    /// Download everything an instance needs without launching it
    Install(install::InstallArgs),
    /// Create a new instance
    Create(instance::CreateArgs),
    /// List instances
    List,
    /// Delete an instance and its files
    Remove(instance::RemoveArgs),
    /// Manage jar mods of an instance
    Jarmod {
        #[command(subcommand)]
        command: instance::JarModCommand,
    },
    /// Install and run an instance
    Launch(launch::LaunchArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,minecraft=off")))
        .init();

    let cli = Cli::parse();
    let launcher = config::Launcher::load(cli.work_dir, cli.config)?;

    match cli.command {
        Commands::Versions(args) => versions::run(&launcher, args).await,
        Commands::Install(args) => install::run(&launcher, args).await,
        Commands::Create(args) => instance::create(&launcher, args),
        Commands::List => instance::list(&launcher),
        Commands::Remove(args) => instance::remove(&launcher, args),
        Commands::Jarmod { command } => instance::jar_mod(&launcher, command),
        Commands::Launch(args) => launch::run(&launcher, args).await,
    }
}
