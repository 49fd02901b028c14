use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::libraries::join_classpath;
use super::manifest::{release_numbers, Argument, ArgumentFormat, VersionMetadata};
use super::rules;
use crate::account::{Account, AccountKind};
use crate::platform::Platform;

const DEPRECATED_TOKENS: [&str; 9] = [
    "--demo",
    "--quickPlayPath",
    "${quickPlayPath}",
    "--quickPlaySingleplayer",
    "${quickPlaySingleplayer}",
    "--quickPlayMultiplayer",
    "${quickPlayMultiplayer}",
    "--quickPlayRealms",
    "${quickPlayRealms}",
];

const OFFLINE_AUTH_HOSTS: [&str; 4] = [
    "-Dminecraft.api.auth.host=https://nope.invalid",
    "-Dminecraft.api.account.host=https://nope.invalid",
    "-Dminecraft.api.session.host=https://nope.invalid",
    "-Dminecraft.api.services.host=https://nope.invalid",
];

const DEFAULT_WIDTH: u32 = 960;
const DEFAULT_HEIGHT: u32 = 540;

/// Inputs for one command line.
pub struct LaunchArguments<'a> {
    pub version: &'a VersionMetadata,
    pub platform: &'a Platform,
    pub account: &'a dyn Account,
    /// Library jars followed by the (possibly overlaid) client jar.
    pub classpath: &'a [PathBuf],
    pub natives_dir: &'a Path,
    pub library_dir: &'a Path,
    pub game_dir: &'a Path,
    pub assets_dir: &'a Path,
    /// Where pre-1.7.3 clients read assets from.
    pub legacy_assets_dir: &'a Path,
    pub asset_index_name: &'a str,
    pub min_memory_mb: u32,
    pub max_memory_mb: u32,
    pub custom_jvm_flags: &'a [String],
    pub launcher_name: &'a str,
    pub launcher_version: &'a str,
}

/// `java` arguments in launch order: heap, encoding, version JVM args,
/// custom flags, workaround, main class, game args.
pub fn build_arguments(ctx: &LaunchArguments<'_>) -> Vec<String> {
    let replacements = substitution_map(ctx);
    let mut args = vec![
        format!("-Xms{}m", ctx.min_memory_mb),
        format!("-Xmx{}m", ctx.max_memory_mb),
        "-Dfile.encoding=utf-8".to_string(),
        "-Dconsole.encoding=utf-8".to_string(),
    ];

    let game = match &ctx.version.arguments {
        ArgumentFormat::Modern { jvm, game } => {
            args.extend(expand_args(jvm, &replacements, ctx.platform));
            expand_args(game, &replacements, ctx.platform)
        }
        ArgumentFormat::Legacy(raw) => {
            for template in ["-Djava.library.path=${natives_directory}", "-cp", "${classpath}"] {
                args.push(replace_tokens(template, &replacements));
            }
            raw.split_whitespace()
                .map(|arg| replace_tokens(arg, &replacements))
                .collect()
        }
    };

    args.extend(
        ctx.custom_jvm_flags
            .iter()
            .filter(|flag| !flag.trim().is_empty())
            .cloned(),
    );
    if needs_offline_auth_workaround(&ctx.version.id, ctx.account.kind()) {
        args.extend(OFFLINE_AUTH_HOSTS.iter().map(|value| value.to_string()));
    }
    args.push(ctx.version.main_class.clone());
    args.extend(game);

    strip_deprecated(&mut args);

    let unresolved = unresolved_tokens(&args);
    if !unresolved.is_empty() {
        warn!(
            version = %ctx.version.id,
            tokens = %unresolved.join(", "),
            "launch arguments contain unresolved placeholders"
        );
    }
    args
}

pub fn substitution_map(ctx: &LaunchArguments<'_>) -> HashMap<&'static str, String> {
    let path = |value: &Path| value.to_string_lossy().to_string();
    let account = ctx.account;
    let uuid = account.uuid().simple().to_string();
    let token = account.access_token().to_string();

    let mut map = HashMap::new();
    map.insert("natives_directory", path(ctx.natives_dir));
    map.insert("launcher_name", ctx.launcher_name.to_string());
    map.insert("launcher_version", ctx.launcher_version.to_string());
    map.insert(
        "classpath",
        join_classpath(ctx.classpath, ctx.platform.classpath_separator()),
    );
    map.insert("classpath_separator", ctx.platform.classpath_separator().to_string());
    map.insert("library_directory", path(ctx.library_dir));

    map.insert("auth_player_name", account.username().to_string());
    map.insert("auth_uuid", uuid.clone());
    map.insert("auth_access_token", token.clone());
    map.insert("auth_session", token.clone());
    map.insert("auth_xuid", "-".to_string());
    map.insert("clientid", "-".to_string());
    map.insert("user_type", "msa".to_string());
    map.insert("user_properties", "{}".to_string());
    map.insert("version_name", ctx.version.id.clone());
    map.insert("version_type", ctx.version.kind.clone());
    map.insert("game_directory", path(ctx.game_dir));
    map.insert("assets_index_name", ctx.asset_index_name.to_string());
    map.insert("resolution_width", DEFAULT_WIDTH.to_string());
    map.insert("resolution_height", DEFAULT_HEIGHT.to_string());

    match ctx.version.arguments {
        ArgumentFormat::Modern { .. } => {
            map.insert("assets_root", path(ctx.assets_dir));
            map.insert("game_assets", path(ctx.assets_dir));
        }
        ArgumentFormat::Legacy(_) => {
            map.insert("assets_root", path(ctx.legacy_assets_dir));
            map.insert("game_assets", path(ctx.legacy_assets_dir));
            map.insert("uuid", uuid);
            map.insert("accessToken", token);
        }
    }
    map
}

/// Offline 1.16.5 clients hang on Mojang's auth hosts; point them nowhere.
pub fn needs_offline_auth_workaround(version_id: &str, kind: AccountKind) -> bool {
    kind != AccountKind::Microsoft
        && matches!(release_numbers(version_id), Some((_, 16, Some(5))))
}

/// Removes every occurrence of the demo and quick-play flags and their placeholders.
pub fn strip_deprecated(args: &mut Vec<String>) {
    args.retain(|arg| !DEPRECATED_TOKENS.contains(&arg.as_str()));
}

pub fn split_jvm_args(raw: &str) -> Vec<String> {
    raw.split_whitespace()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .collect()
}

pub fn unresolved_tokens(args: &[String]) -> Vec<String> {
    let mut out = HashSet::new();
    for arg in args {
        for token in extract_tokens(arg) {
            out.insert(token);
        }
    }
    let mut values = out.into_iter().collect::<Vec<_>>();
    values.sort();
    values
}

fn expand_args(
    args: &[Argument],
    replacements: &HashMap<&str, String>,
    platform: &Platform,
) -> Vec<String> {
    args.iter()
        .filter(|arg| rules::applies(Some(arg.rules()), platform))
        .flat_map(|arg| arg.values())
        .map(|value| replace_tokens(value, replacements))
        .collect()
}

pub fn replace_tokens(input: &str, replacements: &HashMap<&str, String>) -> String {
    let mut cursor = 0usize;
    let mut output = String::new();
    while let Some(start_rel) = input[cursor..].find("${") {
        let start = cursor + start_rel;
        output.push_str(&input[cursor..start]);

        let token_start = start + 2;
        let Some(end_rel) = input[token_start..].find('}') else {
            output.push_str(&input[start..]);
            cursor = input.len();
            break;
        };
        let end = token_start + end_rel;
        let key = &input[token_start..end];
        match replacements.get(key) {
            Some(value) => output.push_str(value),
            None => output.push_str(&input[start..=end]),
        }
        cursor = end + 1;
    }
    if cursor < input.len() {
        output.push_str(&input[cursor..]);
    }
    output
}

fn extract_tokens(input: &str) -> Vec<String> {
    let mut cursor = 0usize;
    let mut tokens = Vec::new();
    while let Some(start_rel) = input[cursor..].find("${") {
        let start = cursor + start_rel + 2;
        let Some(end_rel) = input[start..].find('}') else {
            break;
        };
        let end = start + end_rel;
        if end > start {
            tokens.push(input[start..end].to_string());
        }
        cursor = end + 1;
    }
    tokens
}
