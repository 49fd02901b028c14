use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionManifest {
    pub latest: LatestVersion,
    pub versions: Vec<VersionSummary>,
}

impl VersionManifest {
    pub fn find(&self, id: &str) -> Option<&VersionSummary> {
        self.versions.iter().find(|version| version.id == id)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatestVersion {
    pub release: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub release_time: Option<String>,
    #[serde(default)]
    pub compliance_level: Option<u32>,
}

/// Per-version descriptor. Exactly one argument format is present.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawVersionMetadata")]
pub struct VersionMetadata {
    pub id: String,
    pub kind: String,
    pub main_class: String,
    pub assets: Option<String>,
    pub asset_index: Option<AssetIndexRef>,
    pub downloads: HashMap<String, Download>,
    pub libraries: Vec<Library>,
    pub java_version: Option<JavaVersion>,
    pub arguments: ArgumentFormat,
}

#[derive(Debug, Clone)]
pub enum ArgumentFormat {
    Modern {
        jvm: Vec<Argument>,
        game: Vec<Argument>,
    },
    Legacy(String),
}

impl VersionMetadata {
    pub fn client_download(&self) -> Option<&Download> {
        self.downloads.get("client")
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.arguments, ArgumentFormat::Legacy(_))
    }

    /// Asset index name, falling back to the older top-level `assets` field.
    pub fn asset_index_id(&self) -> Option<&str> {
        self.asset_index
            .as_ref()
            .map(|index| index.id.as_str())
            .or(self.assets.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVersionMetadata {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    main_class: String,
    #[serde(default)]
    assets: Option<String>,
    #[serde(default)]
    asset_index: Option<AssetIndexRef>,
    #[serde(default)]
    downloads: HashMap<String, Download>,
    #[serde(default)]
    libraries: Vec<Library>,
    #[serde(default)]
    java_version: Option<JavaVersion>,
    #[serde(default)]
    arguments: Option<Arguments>,
    #[serde(default)]
    minecraft_arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Arguments {
    #[serde(default)]
    game: Vec<Argument>,
    #[serde(default)]
    jvm: Vec<Argument>,
}

impl TryFrom<RawVersionMetadata> for VersionMetadata {
    type Error = String;

    fn try_from(raw: RawVersionMetadata) -> Result<Self, Self::Error> {
        let arguments = match (raw.arguments, raw.minecraft_arguments) {
            (Some(arguments), None) => ArgumentFormat::Modern {
                jvm: arguments.jvm,
                game: arguments.game,
            },
            (None, Some(legacy)) => ArgumentFormat::Legacy(legacy),
            (Some(_), Some(_)) => {
                return Err(format!(
                    "version {} declares both arguments and minecraftArguments",
                    raw.id
                ))
            }
            (None, None) => {
                return Err(format!("version {} declares no launch arguments", raw.id))
            }
        };

        Ok(VersionMetadata {
            id: raw.id,
            kind: raw.kind,
            main_class: raw.main_class,
            assets: raw.assets,
            asset_index: raw.asset_index,
            downloads: raw.downloads,
            libraries: raw.libraries,
            java_version: raw.java_version,
            arguments,
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Download {
    #[serde(default)]
    pub path: Option<String>,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersion {
    pub component: String,
    #[serde(default)]
    pub major_version: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    #[serde(default)]
    pub map_to_resources: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    #[serde(default)]
    pub extract: Option<Extract>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<Download>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, Download>>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Extract {
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum Argument {
    String(String),
    Rule {
        #[serde(default)]
        rules: Vec<Rule>,
        value: ArgValue,
    },
}

impl Argument {
    pub fn rules(&self) -> &[Rule] {
        match self {
            Argument::String(_) => &[],
            Argument::Rule { rules, .. } => rules,
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            Argument::String(value) => vec![value.as_str()],
            Argument::Rule { value, .. } => match value {
                ArgValue::String(value) => vec![value.as_str()],
                ArgValue::List(list) => list.iter().map(String::as_str).collect(),
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum ArgValue {
    String(String),
    List(Vec<String>),
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<RuleOs>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RuleOs {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

/// Splits `1.16.5` into `(1, 16, Some(5))`. Snapshots and other shapes yield `None`.
pub fn release_numbers(id: &str) -> Option<(u32, u32, Option<u32>)> {
    let mut parts = id.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = match parts.next() {
        Some(part) => Some(part.parse().ok()?),
        None => None,
    };
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODERN: &str = r#"{
        "id": "1.20.1",
        "type": "release",
        "mainClass": "net.minecraft.client.main.Main",
        "arguments": {
            "game": ["--username", "${auth_player_name}"],
            "jvm": [{"rules": [{"action": "allow", "os": {"name": "osx"}}], "value": "-XstartOnFirstThread"}]
        },
        "libraries": []
    }"#;

    #[test]
    fn parses_modern_arguments() {
        let version: VersionMetadata = serde_json::from_str(MODERN).unwrap();
        match version.arguments {
            ArgumentFormat::Modern { jvm, game } => {
                assert_eq!(game.len(), 2);
                assert_eq!(jvm[0].values(), vec!["-XstartOnFirstThread"]);
                assert_eq!(jvm[0].rules()[0].action, RuleAction::Allow);
            }
            ArgumentFormat::Legacy(_) => panic!("expected modern format"),
        }
    }

    #[test]
    fn parses_legacy_arguments() {
        let json = r#"{
            "id": "1.7.10",
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "minecraftArguments": "--username ${auth_player_name}",
            "assets": "1.7.10"
        }"#;
        let version: VersionMetadata = serde_json::from_str(json).unwrap();
        assert!(version.is_legacy());
        assert_eq!(version.asset_index_id(), Some("1.7.10"));
    }

    #[test]
    fn rejects_both_argument_formats() {
        let json = r#"{
            "id": "x",
            "type": "release",
            "mainClass": "Main",
            "arguments": {"game": []},
            "minecraftArguments": "--demo"
        }"#;
        let err = serde_json::from_str::<VersionMetadata>(json).unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn rejects_missing_argument_format() {
        let json = r#"{"id": "x", "type": "release", "mainClass": "Main"}"#;
        assert!(serde_json::from_str::<VersionMetadata>(json).is_err());
    }

    #[test]
    fn release_numbers_handle_two_and_three_parts() {
        assert_eq!(release_numbers("1.16.5"), Some((1, 16, Some(5))));
        assert_eq!(release_numbers("1.20"), Some((1, 20, None)));
        assert_eq!(release_numbers("23w31a"), None);
    }
}
