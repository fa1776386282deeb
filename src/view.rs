use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context as _, Result};
use minijinja::Environment;
use serde_json::{Map, Value};

use crate::app::Context;
use crate::error::FrameworkError;

/// Template renderer with data shared across every render of a request.
///
/// Templates are minijinja files below a templates directory. Data set on the
/// view is merged under the data passed to [`View::fetch`], so per-call values
/// win.
#[derive(Debug)]
pub struct View {
    data: RwLock<Map<String, Value>>,
    templates_dir: RwLock<PathBuf>,
}

impl View {
    pub fn new<P: Into<PathBuf>>(templates_dir: P) -> Self {
        Self {
            data: RwLock::new(Map::new()),
            templates_dir: RwLock::new(templates_dir.into()),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    #[must_use]
    pub fn all(&self) -> Map<String, Value> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Merge `data` into the shared data, overwriting existing keys.
    pub fn replace(&self, data: Map<String, Value>) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(data);
    }

    pub fn clear(&self) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn templates_dir(&self) -> PathBuf {
        self.templates_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_templates_dir<P: Into<PathBuf>>(&self, dir: P) {
        *self
            .templates_dir
            .write()
            .unwrap_or_else(PoisonError::into_inner) = dir.into();
    }

    /// Resolve `template` below the templates directory.
    ///
    /// Returns `None` for absolute paths and anything climbing out with `..`.
    #[must_use]
    pub fn template_path(&self, template: &str) -> Option<PathBuf> {
        let mut path = self.templates_dir();
        let mut pushed = false;
        for component in Path::new(template.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    pushed = true;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        pushed.then_some(path)
    }

    /// Render `template` with the shared data overlaid by `data`.
    ///
    /// # Errors
    ///
    /// [`FrameworkError::TemplateNotFound`] when the file does not exist or
    /// escapes the templates directory; minijinja errors otherwise.
    pub fn fetch(&self, template: &str, data: &Value) -> Result<String> {
        let path = self
            .template_path(template)
            .filter(|p| p.is_file())
            .ok_or_else(|| FrameworkError::TemplateNotFound {
                name: template.to_string(),
            })?;
        let source = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;

        let mut merged = self.all();
        if let Value::Object(extra) = data {
            merged.extend(extra.clone());
        }

        // Registered under its own name so autoescape follows the extension.
        let mut env = Environment::new();
        env.add_template(template, &source)?;
        let rendered = env.get_template(template)?.render(Value::Object(merged))?;
        Ok(rendered)
    }

    /// Render `template` into the request output.
    pub fn display(&self, ctx: &mut Context<'_>, template: &str, data: &Value) -> Result<()> {
        let rendered = self.fetch(template, data)?;
        ctx.echo(&rendered);
        Ok(())
    }
}
