use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::SourcesConfig;
use crate::error::{DocdexError, Result};
use crate::rustdoc::DocArtifact;
use crate::sources::{PackageMeta, SourceProvider, SourceUnit};

pub const NAME: &str = "local-file";

/// Loads every `*.json` doc artifact found directly in a directory.
///
/// Package metadata comes from an optional `<artifact>.meta.toml` sidecar
/// (a plain `[package]` table); without one, the unit is named after the
/// file and carries whatever version the artifact itself records.
#[derive(Debug)]
pub struct LocalFileProvider {
    path: PathBuf,
}

impl LocalFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn create(config: &SourcesConfig) -> Result<Box<dyn SourceProvider>> {
        Ok(Box::new(Self::new(config.path.clone())))
    }

    fn load_unit(path: &Path) -> Result<SourceUnit> {
        let artifact = DocArtifact::from_path(path)?;
        let sidecar = path.with_extension("meta.toml");
        let meta = std::fs::read_to_string(&sidecar)
            .ok()
            .and_then(|text| PackageMeta::from_manifest_str(&text));

        let fallback_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        let unit = match meta {
            Some(meta) => SourceUnit {
                version: meta.version.or_else(|| artifact.crate_version.clone()),
                name: meta.name,
                repository: meta.repository,
                artifact,
            },
            None => SourceUnit {
                name: fallback_name,
                version: artifact.crate_version.clone(),
                repository: None,
                artifact,
            },
        };
        Ok(unit)
    }
}

#[async_trait]
impl SourceProvider for LocalFileProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn enumerate(&self) -> Result<Vec<SourceUnit>> {
        if !self.path.is_dir() {
            return Err(DocdexError::Enumeration(format!(
                "artifact directory {} does not exist",
                self.path.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        // artifact parsing is CPU-bound on large crates, keep it off the
        // runtime workers
        let units = tokio::task::spawn_blocking(move || {
            let mut units = Vec::with_capacity(paths.len());
            for path in paths {
                match Self::load_unit(&path) {
                    Ok(unit) => {
                        debug!(unit = %unit.name, path = %path.display(), "loaded artifact");
                        units.push(unit);
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping unreadable artifact");
                    }
                }
            }
            units
        })
        .await
        .map_err(|e| DocdexError::Enumeration(format!("artifact load task failed: {e}")))?;

        Ok(units)
    }
}
