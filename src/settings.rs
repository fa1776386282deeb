//! Application settings.
//!
//! Settings come from three layers, later ones winning: built-in defaults, an
//! optional YAML/TOML/JSON file, and `TRELLIS_*` environment variables.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `TRELLIS_DEBUG` | `debug` |
//! | `TRELLIS_ROUTES_CASE_SENSITIVE` | `routes.case_sensitive` |
//! | `TRELLIS_TEMPLATES_DIR` | `templates.directory` |
//! | `TRELLIS_LOG_*` | `log` (see [`crate::logging`]) |

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::CookieSettings;
use crate::logging::{env_flag, LogConfig};

/// Routing options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    /// Match literal pattern text case-sensitively
    pub case_sensitive: bool,
}

/// Where [`View`](crate::view::View) looks for templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    pub directory: PathBuf,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./templates"),
        }
    }
}

/// Everything an [`App`](crate::App) can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Show the diagnostic page on fatal errors
    pub debug: bool,
    pub log: LogConfig,
    pub cookies: CookieSettings,
    pub routes: RouteSettings,
    pub templates: TemplateSettings,
}

impl Settings {
    /// Load `path` (format picked by extension) and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let mut settings: Settings = match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&raw)
                .with_context(|| format!("Invalid YAML settings in {}", path.display()))?,
            "toml" => toml::from_str(&raw)
                .with_context(|| format!("Invalid TOML settings in {}", path.display()))?,
            "json" => serde_json::from_str(&raw)
                .with_context(|| format!("Invalid JSON settings in {}", path.display()))?,
            other => bail!("Unsupported settings format '{other}' for {}", path.display()),
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env();
        settings
    }

    pub fn apply_env(&mut self) {
        if let Some(debug) = env_flag("TRELLIS_DEBUG") {
            self.debug = debug;
        }
        if let Some(case_sensitive) = env_flag("TRELLIS_ROUTES_CASE_SENSITIVE") {
            self.routes.case_sensitive = case_sensitive;
        }
        if let Ok(dir) = env::var("TRELLIS_TEMPLATES_DIR") {
            self.templates.directory = PathBuf::from(dir);
        }
        self.log.apply_env();
    }

    /// Look up a setting by dotted path, e.g. `cookies.path`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let root = serde_json::to_value(self).ok()?;
        key.split('.')
            .try_fold(&root, |node, part| node.get(part))
            .filter(|v| !v.is_null())
            .cloned()
    }
}
