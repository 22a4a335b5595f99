//! Settings, command history, and run templates (spec §6.4, supplemented
//! with the `history` and `run --name/--list` commands the original tool
//! exposes). Settings are a single TOML file discovered in a per-user
//! config directory created on first use.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("could not parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize settings file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::Io { path: path.display().to_string(), source }
}

/// Per-user config directory (spec §6.4): `%APPDATA%/tools/cleaner` on
/// Windows, `$XDG_CONFIG_HOME/cleaner` (falling back to `$HOME/.config/cleaner`)
/// on Linux. Created on first use.
pub fn config_dir() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    if cfg!(windows) {
        base.join("tools").join("cleaner")
    } else {
        base.join("cleaner")
    }
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join("settings.toml")
}

fn ensure_parent_dir(path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    Ok(())
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct GeneralSettings {
    #[serde(default)]
    pub editor: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

/// A single prior command-line invocation, newest last.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub command: String,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub general: GeneralSettings,
    /// `run --name <key>` looks a template up by this map.
    #[serde(default)]
    pub run_templates: HashMap<String, String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Settings {
    /// Loads settings from `path`, or `default_settings_path()` when `None`.
    /// A missing file yields defaults rather than an error.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_settings_path);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file found, using defaults");
                Ok(Settings::default())
            }
            Err(e) => Err(io_err(&path, e)),
        }
    }

    pub fn save(&self, path: Option<&Path>) -> Result<(), Error> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_settings_path);
        ensure_parent_dir(&path)?;
        let text = toml::to_string_pretty(self)?;
        fs::write(&path, text).map_err(|e| io_err(&path, e))?;
        info!(path = %path.display(), "settings saved");
        Ok(())
    }

    pub fn add_history(&mut self, command: impl Into<String>) {
        self.history.push(HistoryEntry { command: command.into() });
    }

    pub fn history_lines(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(|h| h.command.as_str())
    }

    pub fn get_template(&self, name: &str) -> Option<&str> {
        self.run_templates.get(name).map(String::as_str)
    }

    pub fn list_templates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.run_templates.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_file_yields_defaults() {
        let settings = Settings::load(Some(Path::new("__does_not_exist__.toml"))).unwrap();
        assert!(settings.history.is_empty());
        assert!(settings.run_templates.is_empty());
    }

    #[test]
    fn save_then_load_roundtrips_history_and_templates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut settings = Settings::default();
        settings.add_history("count --source ./src");
        settings.run_templates.insert("todo".to_string(), "list --pattern TODO --source .".to_string());
        settings.save(Some(&path)).unwrap();

        let reloaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(reloaded.history_lines().collect::<Vec<_>>(), vec!["count --source ./src"]);
        assert_eq!(reloaded.get_template("todo"), Some("list --pattern TODO --source ."));
    }

    #[test]
    fn parses_general_settings_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[general]\neditor = \"vim\"\nmode = \"fast\"\n").unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.general.editor.as_deref(), Some("vim"));
        assert_eq!(settings.general.mode.as_deref(), Some("fast"));
    }
}
