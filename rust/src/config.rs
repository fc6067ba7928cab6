//! User settings persisted as JSON
//!
//! One [`Settings`] value is loaded at startup and handed to whatever needs
//! it. Changes are written back only when the caller asks for it, which is
//! whenever the user explicitly changes a preference.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::guard::{FileGuard, DEFAULT_MAX_FILE_SIZE_MB};
use crate::shape::ShapeSyntax;

/// Directory under the home directory holding the settings file
pub const CONFIG_DIR_NAME: &str = ".binviewer";

pub const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_MAX_DOWNSAMPLE_POINTS: usize = 200_000;

pub const DEFAULT_SHOW_DATA_THRESHOLD: usize = 200;

/// Error type for settings persistence
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write settings to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no home directory to store settings in")]
    NoHomeDir,
}

/// Interface language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::Zh => "zh",
            Language::En => "en",
        })
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh_cn" | "chinese" => Ok(Language::Zh),
            "en" | "english" => Ok(Language::En),
            other => Err(format!("unknown language {other:?} (expected zh or en)")),
        }
    }
}

/// Visual theme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Embedded,
    AiStyle,
    Minimal,
    Github,
}

impl Theme {
    pub const ALL: [Theme; 4] = [Theme::Embedded, Theme::AiStyle, Theme::Minimal, Theme::Github];

    pub fn display_name(self, language: Language) -> &'static str {
        match (self, language) {
            (Theme::Embedded, Language::Zh) => "嵌入式风格",
            (Theme::Embedded, Language::En) => "Embedded Style",
            (Theme::AiStyle, Language::Zh) => "AI风格",
            (Theme::AiStyle, Language::En) => "AI Style",
            (Theme::Minimal, Language::Zh) => "极简风格",
            (Theme::Minimal, Language::En) => "Minimal Style",
            (Theme::Github, Language::Zh) => "GitHub风格",
            (Theme::Github, Language::En) => "GitHub Style",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Embedded => "embedded",
            Theme::AiStyle => "ai_style",
            Theme::Minimal => "minimal",
            Theme::Github => "github",
        })
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Theme::ALL
            .into_iter()
            .find(|t| t.to_string() == key)
            .ok_or_else(|| format!("unknown theme {s:?} (expected embedded, ai_style, minimal or github)"))
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(deserialize_with = "or_default")]
    pub language: Language,
    #[serde(deserialize_with = "or_default")]
    pub theme: Theme,
    pub max_file_size_mb: u64,
    pub max_downsample_points: usize,
    pub show_data_threshold: usize,
    #[serde(deserialize_with = "or_default")]
    pub shape_syntax: ShapeSyntax,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: Language::default(),
            theme: Theme::default(),
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            max_downsample_points: DEFAULT_MAX_DOWNSAMPLE_POINTS,
            show_data_threshold: DEFAULT_SHOW_DATA_THRESHOLD,
            shape_syntax: ShapeSyntax::default(),
        }
    }
}

/// Unknown enum values (e.g. a renamed theme) fall back to the default
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

impl Settings {
    /// `~/.binviewer/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Load settings; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path: path.to_path_buf(), source }),
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write pretty JSON, creating the parent directory if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let write_err = |source| ConfigError::Write { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)?;
        debug!(path = %path.display(), "saved settings");
        Ok(())
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// File guard using the configured size limit
    pub fn guard(&self) -> FileGuard {
        FileGuard::new(self.max_file_size_bytes())
    }
}
