use std::{collections::HashMap, path::Path};

use anyhow::{Error, Result, anyhow};
use tokio::fs;
use tracing::{debug, info, warn};

/// Immutable map of template name to raw HTML pattern.
///
/// Loaded once at startup; lookups never touch the filesystem.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<String, String>,
}

impl TemplateStore {
    /// Reads every `<name>.html` file directly under `dir`.
    ///
    /// A missing directory yields an empty store: each render that needs a
    /// file template then fails with `TemplateNotFound`.
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = dir.as_ref();

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    templates_dir = %dir.display(),
                    error = %e,
                    "Templates directory unavailable, starting with no file templates"
                );
                return Ok(Self::default());
            }
        };

        let mut templates = HashMap::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| anyhow!("Failed to list templates directory: {}", e))?
        {
            let path = entry.path();

            if path.extension().and_then(|ext| ext.to_str()) != Some("html") {
                continue;
            }

            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| anyhow!("Failed to read template {}: {}", path.display(), e))?;

            debug!(template = name, bytes = content.len(), "Template loaded");
            templates.insert(name.to_string(), content);
        }

        info!(
            templates_dir = %dir.display(),
            count = templates.len(),
            "Template store initialized"
        );

        Ok(Self { templates })
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            templates: entries
                .into_iter()
                .map(|(name, body)| (name.into(), body.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}
