use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::catalog::Catalog;

/// On-disk home of the catalog: one JSON document, rewritten in full on
/// every checkpoint.
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, catalog: &Catalog) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(catalog).context("serializing catalog")?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        debug!(
            "Checkpoint: {} brands, {} models, {} types, {} engines, {} stages",
            catalog.brands.len(),
            catalog.models.len(),
            catalog.types.len(),
            catalog.engines.len(),
            catalog.stages.len()
        );
        Ok(())
    }

    pub fn load(&self) -> Result<Catalog> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", self.path.display()))
    }
}
