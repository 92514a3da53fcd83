//! Plugin-wide settings.
//!
//! # Responsibility
//! - Describe the administrator-level defaults applied to new containers.
//! - Load them from a JSON document, filling gaps with defaults.
//!
//! # Invariants
//! - Unknown keys are rejected so typos surface at load time.
//! - A missing file is an error; a missing key is not.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Layout id used when nothing else is configured.
pub const FALLBACK_LAYOUT_ID: &str = "tabbed-list";

/// Markup flavour of the active theme, which picks between template variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeFlavor {
    #[default]
    Bootstrap4,
    Bootstrap3,
}

impl ThemeFlavor {
    pub fn template_suffix(self) -> &'static str {
        match self {
            Self::Bootstrap4 => "bootstrap4",
            Self::Bootstrap3 => "bootstrap3",
        }
    }
}

/// Administrator defaults for containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MultiblockSettings {
    /// Title given to new containers. Empty means "use the plugin name".
    pub default_title: String,
    /// Layout id preselected for new containers.
    pub default_layout: Option<String>,
    /// Block types added to a fresh container.
    pub default_sub_blocks: Vec<String>,
    pub theme_flavor: ThemeFlavor,
    /// Overrides `logging::default_log_level()` when set.
    pub log_level: Option<String>,
}

impl Default for MultiblockSettings {
    fn default() -> Self {
        Self {
            default_title: String::new(),
            default_layout: Some(FALLBACK_LAYOUT_ID.to_string()),
            default_sub_blocks: Vec::new(),
            theme_flavor: ThemeFlavor::default(),
            log_level: None,
        }
    }
}

/// Errors from settings loading.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read settings `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid settings document: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Parses settings from a JSON string.
pub fn parse_settings(raw: &str) -> Result<MultiblockSettings, ConfigError> {
    Ok(serde_json::from_str(raw)?)
}

/// Reads and parses a settings file.
pub fn load_settings(path: impl AsRef<Path>) -> Result<MultiblockSettings, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&raw)
}

#[cfg(test)]
mod tests {
    use super::{load_settings, parse_settings, ConfigError, ThemeFlavor, FALLBACK_LAYOUT_ID};
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = parse_settings("{}").unwrap();
        assert_eq!(settings.default_layout.as_deref(), Some(FALLBACK_LAYOUT_ID));
        assert!(settings.default_sub_blocks.is_empty());
        assert_eq!(settings.theme_flavor, ThemeFlavor::Bootstrap4);
    }

    #[test]
    fn rejects_unknown_keys_and_flavours() {
        assert!(matches!(
            parse_settings(r#"{ "default_layot": "accordion" }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            parse_settings(r#"{ "theme_flavor": "bootstrap5" }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "default_layout": "accordion", "default_sub_blocks": ["html", "calendar_month"], "theme_flavor": "bootstrap3" }}"#
        )
        .unwrap();

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.default_layout.as_deref(), Some("accordion"));
        assert_eq!(settings.default_sub_blocks, vec!["html", "calendar_month"]);
        assert_eq!(settings.theme_flavor, ThemeFlavor::Bootstrap3);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }
}
