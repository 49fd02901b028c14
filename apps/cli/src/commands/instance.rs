use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use launcher_core::launcher::args::split_jvm_args;
use uuid::Uuid;

use crate::config::Launcher;

#[derive(Args)]
pub struct CreateArgs {
    name: String,
    /// Minecraft version id, e.g. 1.20.1
    version: String,
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    min_memory: Option<u32>,
    #[arg(long)]
    max_memory: Option<u32>,
    /// Extra JVM flags, whitespace separated
    #[arg(long, allow_hyphen_values = true)]
    jvm_args: Option<String>,
    /// Java executable to use instead of a managed runtime
    #[arg(long)]
    java: Option<PathBuf>,
}

#[derive(Args)]
pub struct RemoveArgs {
    name: String,
}

#[derive(Subcommand)]
pub enum JarModCommand {
    /// Copy a jar mod into the instance
    Add { instance: String, file: PathBuf },
    /// Delete a jar mod
    Remove { instance: String, uuid: Uuid },
    /// Enable or disable a jar mod
    Toggle {
        instance: String,
        uuid: Uuid,
        #[arg(long)]
        off: bool,
    },
    /// Show jar mods in overlay order
    List { instance: String },
}

pub fn create(launcher: &Launcher, args: CreateArgs) -> Result<()> {
    if let (Some(min), Some(max)) = (args.min_memory, args.max_memory) {
        if min > max {
            bail!("--min-memory ({min}) exceeds --max-memory ({max})");
        }
    }

    launcher
        .registry
        .create(&args.name, args.group, &args.version)
        .with_context(|| format!("Failed to create instance {}", args.name))?;
    let flags = args.jvm_args.as_deref().map(split_jvm_args).unwrap_or_default();
    let instance = launcher.registry.update(&args.name, |instance| {
        instance.min_memory_mb = args.min_memory;
        instance.max_memory_mb = args.max_memory;
        instance.java_path = args.java;
        for flag in flags {
            instance.add_jvm_flag(flag);
        }
    })?;

    println!("Created {} ({})", instance.name, instance.minecraft_version);
    Ok(())
}

pub fn list(launcher: &Launcher) -> Result<()> {
    let instances = launcher.registry.list();
    if instances.is_empty() {
        println!("No instances.");
        return Ok(());
    }
    for instance in instances {
        let group = instance.group.as_deref().unwrap_or("-");
        let hours = instance.total_playtime_seconds as f64 / 3600.0;
        println!(
            "{:<24} {:<12} {:<12} {:>6.1}h",
            instance.name, instance.minecraft_version, group, hours
        );
    }
    Ok(())
}

pub fn remove(launcher: &Launcher, args: RemoveArgs) -> Result<()> {
    launcher
        .registry
        .remove(&args.name)
        .with_context(|| format!("Failed to remove instance {}", args.name))?;
    println!("Removed {}", args.name);
    Ok(())
}

pub fn jar_mod(launcher: &Launcher, command: JarModCommand) -> Result<()> {
    let registry = &launcher.registry;
    match command {
        JarModCommand::Add { instance, file } => {
            let jar_mod = registry
                .add_jar_mod(&instance, &file)
                .with_context(|| format!("Failed to add {}", file.display()))?;
            println!("Added {} as {}", jar_mod.display_name, jar_mod.uuid);
        }
        JarModCommand::Remove { instance, uuid } => {
            registry.remove_jar_mod(&instance, uuid)?;
            println!("Removed {uuid}");
        }
        JarModCommand::Toggle { instance, uuid, off } => {
            registry.set_jar_mod_active(&instance, uuid, !off)?;
            println!("{uuid} {}", if off { "disabled" } else { "enabled" });
        }
        JarModCommand::List { instance } => {
            for jar_mod in registry.get(&instance)?.jar_mods {
                let state = if jar_mod.active { "on " } else { "off" };
                println!("{state} {} {}", jar_mod.uuid, jar_mod.display_name);
            }
        }
    }
    Ok(())
}
