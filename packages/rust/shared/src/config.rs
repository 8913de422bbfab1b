//! Application configuration for vaultdown.
//!
//! User config lives at `~/.vaultdown/vaultdown.toml`.
//! CLI flags override config file values, which override defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultdownError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "vaultdown.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".vaultdown";

/// Maximum number of documents converted at the same time.
pub const DEFAULT_CONCURRENCY: usize = 50;

// ---------------------------------------------------------------------------
// Config structs (matching vaultdown.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default conversion switches.
    #[serde(default)]
    pub convert: ConvertConfig,

    /// Tree engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Admission slots of the conversion pool.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// `[convert]` section: which body stages and front-matter updates run.
///
/// Built once per run and shared read-only by every conversion job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Copy inline tags into the `tags` front-matter field.
    pub copy_tags: bool,
    /// Replace the `tags` field instead of merging into it.
    pub sync_tags: bool,
    /// Delete inline tags from the body.
    pub remove_tags: bool,
    /// Delete `%%...%%` and `<!--...-->` comments.
    pub remove_comments: bool,
    /// Copy the first H1 into the `title` field.
    pub copy_title: bool,
    /// Add the first H1 to the `aliases` field.
    pub copy_alias: bool,
    /// Drop the alias equal to the previous title before copying.
    pub sync_title_alias: bool,
    /// Delete level-1 header lines from the body.
    pub remove_h1: bool,
    /// Rewrite wiki links and embeds into plain markdown links.
    pub convert_links: bool,
    /// Fail the document when a link cannot be resolved.
    pub strict_ref: bool,
    /// Strip `.md` from link targets and complete fragment-only links.
    pub format_link: bool,
    /// How heading fragments are turned into anchors.
    pub anchor_style: AnchorStyle,
    /// Only write documents marked `publish: true` or `draft: false`.
    pub publishable: bool,
    /// Report the whole error chain instead of the root cause.
    pub debug: bool,
}

impl ConvertConfig {
    /// Turn on every switch a preset implies.
    pub fn apply_preset(&mut self, preset: Preset) {
        self.copy_tags = true;
        self.copy_title = true;
        self.copy_alias = true;
        if preset == Preset::Standard {
            self.remove_tags = true;
            self.convert_links = true;
            self.remove_comments = true;
            self.strict_ref = true;
        }
    }

    /// Reject switch combinations that cannot take effect.
    pub fn validate(&self) -> Result<()> {
        if self.strict_ref && !self.convert_links {
            return Err(VaultdownError::config("strictref set but not link"));
        }
        if self.format_link && !self.convert_links {
            return Err(VaultdownError::config("formatLink set but not link"));
        }
        if self.sync_tags && !self.copy_tags {
            return Err(VaultdownError::config("synctag set but not cptag"));
        }
        if self.sync_title_alias && !self.copy_title {
            return Err(VaultdownError::config("synctlal set but not title"));
        }
        Ok(())
    }
}

/// Shorthands for common switch sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Keep the vault usable in Obsidian: copy tags, title and alias.
    Obsidian,
    /// Full static-site conversion.
    Standard,
}

/// Anchor formatting style for heading fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorStyle {
    /// Hugo's default heading ids.
    #[default]
    Hugo,
    /// `markdown-it-anchor` slugs.
    MarkdownIt,
}

impl AnchorStyle {
    /// Every accepted style name.
    pub const NAMES: [&'static str; 2] = ["hugo", "markdownit"];
}

impl FromStr for AnchorStyle {
    type Err = VaultdownError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hugo" => Ok(Self::Hugo),
            "markdownit" => Ok(Self::MarkdownIt),
            other => Err(VaultdownError::config(format!(
                "anchor style {other:?} is invalid. must choose from {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for AnchorStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hugo => f.write_str("hugo"),
            Self::MarkdownIt => f.write_str("markdownit"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.vaultdown/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| VaultdownError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.vaultdown/vaultdown.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| VaultdownError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| VaultdownError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| VaultdownError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| VaultdownError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| VaultdownError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("concurrency = 50"));
        assert!(toml_str.contains("anchor_style = \"hugo\""));
    }

    #[test]
    fn partial_convert_section() {
        let toml_str = r#"
[convert]
remove_tags = true
anchor_style = "markdownit"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.convert.remove_tags);
        assert!(!config.convert.copy_tags);
        assert_eq!(config.convert.anchor_style, AnchorStyle::MarkdownIt);
        assert_eq!(config.engine.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[engine]\nconcurrency = 8\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.engine.concurrency, 8);

        std::fs::write(&path, "[engine\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn presets() {
        let mut obs = ConvertConfig::default();
        obs.apply_preset(Preset::Obsidian);
        assert!(obs.copy_tags && obs.copy_title && obs.copy_alias);
        assert!(!obs.convert_links && !obs.remove_tags);

        let mut standard = ConvertConfig::default();
        standard.apply_preset(Preset::Standard);
        assert!(standard.convert_links && standard.strict_ref);
        assert!(standard.remove_comments && standard.remove_tags);
        assert!(standard.validate().is_ok());
    }

    #[test]
    fn validation_rejects_orphan_switches() {
        let config = ConvertConfig {
            strict_ref: true,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("strictref set but not link"));

        let config = ConvertConfig {
            format_link: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn anchor_style_parsing() {
        assert_eq!("hugo".parse::<AnchorStyle>().unwrap(), AnchorStyle::Hugo);
        assert_eq!(
            "markdownit".parse::<AnchorStyle>().unwrap(),
            AnchorStyle::MarkdownIt
        );
        let err = "github".parse::<AnchorStyle>().unwrap_err();
        assert!(err.to_string().contains("hugo, markdownit"));
    }
}
