use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::SourcesConfig;
use crate::error::{DocdexError, Result};
use crate::rustdoc::DocArtifact;
use crate::sources::{run_bounded, PackageMeta, SourceProvider, SourceUnit};

pub const NAME: &str = "local-project";

/// Discovers library crates under a root directory, builds a rustdoc
/// JSON artifact for each, and loads the result.
///
/// Binary-only packages are skipped, as are paths matching the
/// configured ignore globs. A build is bounded by the configured
/// timeout; on timeout the child is killed and the build retried once
/// before the crate is skipped.
#[derive(Debug)]
pub struct LocalProjectProvider {
    root: PathBuf,
    ignore: GlobSet,
    build_timeout: Duration,
}

impl LocalProjectProvider {
    pub fn new(
        root: impl Into<PathBuf>,
        ignore_patterns: &[String],
        build_timeout: Duration,
    ) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in ignore_patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                DocdexError::Config(format!("bad ignore glob '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }
        let ignore = builder
            .build()
            .map_err(|e| DocdexError::Config(format!("ignore globs: {e}")))?;
        Ok(Self {
            root: root.into(),
            ignore,
            build_timeout,
        })
    }

    pub(crate) fn from_config(config: &SourcesConfig) -> Result<Self> {
        Self::new(
            config.path.clone(),
            &config.ignore,
            Duration::from_secs(config.build_timeout_secs),
        )
    }

    pub fn create(config: &SourcesConfig) -> Result<Box<dyn SourceProvider>> {
        Ok(Box::new(Self::from_config(config)?))
    }

    /// Manifest paths of buildable library crates, shallowest first so
    /// top-level crates index before nested fixtures.
    fn discover(&self) -> Vec<PathBuf> {
        let mut manifests = Vec::new();
        let walker = WalkDir::new(&self.root).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_str().unwrap_or("");
            if entry.file_type().is_dir() && (name == "target" || name == ".git") {
                return false;
            }
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            !self.ignore.is_match(relative)
        });
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(error = %err, "unreadable directory entry during discovery");
                    continue;
                }
            };
            if entry.file_type().is_file() && entry.file_name() == "Cargo.toml" {
                manifests.push(entry.path().to_path_buf());
            }
        }
        manifests.sort_by_key(|path| (path.components().count(), path.clone()));
        manifests
    }

    fn is_library(manifest_dir: &Path, manifest_text: &str) -> bool {
        if manifest_dir.join("src/lib.rs").is_file() {
            return true;
        }
        toml::from_str::<toml::Value>(manifest_text)
            .ok()
            .map(|value| value.get("lib").is_some())
            .unwrap_or(false)
    }

    fn doc_command(manifest_dir: &Path) -> Command {
        let mut cmd = Command::new("cargo");
        cmd.args([
            "+nightly",
            "rustdoc",
            "--lib",
            "--target-dir",
            "target",
            "--",
            "--output-format",
            "json",
            "-Z",
            "unstable-options",
        ])
        .current_dir(manifest_dir);
        cmd
    }

    async fn build_docs(&self, manifest_dir: &Path, crate_name: &str) -> Result<()> {
        let label = format!("cargo rustdoc ({crate_name})");
        match run_bounded(Self::doc_command(manifest_dir), &label, self.build_timeout).await {
            Err(DocdexError::ProcessTimeout { .. }) => {
                warn!(
                    crate_name,
                    timeout_secs = self.build_timeout.as_secs(),
                    "doc build timed out, retrying once"
                );
                run_bounded(Self::doc_command(manifest_dir), &label, self.build_timeout).await
            }
            other => other,
        }
    }

    async fn build_unit(&self, manifest_path: &Path, meta: PackageMeta) -> Result<SourceUnit> {
        let manifest_dir = manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        self.build_docs(manifest_dir, &meta.name).await?;

        let artifact_path = manifest_dir
            .join("target/doc")
            .join(format!("{}.json", meta.name.replace('-', "_")));
        let artifact = DocArtifact::from_path(&artifact_path)?;
        Ok(SourceUnit {
            version: meta.version.or_else(|| artifact.crate_version.clone()),
            name: meta.name,
            repository: meta.repository,
            artifact,
        })
    }
}

#[async_trait]
impl SourceProvider for LocalProjectProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn enumerate(&self) -> Result<Vec<SourceUnit>> {
        if !self.root.is_dir() {
            return Err(DocdexError::Enumeration(format!(
                "project root {} does not exist",
                self.root.display()
            )));
        }

        let manifests = self.discover();
        if manifests.is_empty() {
            warn!(root = %self.root.display(), "no crates found under project root");
            return Ok(Vec::new());
        }

        let mut units = Vec::new();
        for manifest_path in manifests {
            let text = match std::fs::read_to_string(&manifest_path) {
                Ok(text) => text,
                Err(err) => {
                    warn!(path = %manifest_path.display(), error = %err, "unreadable manifest, skipping");
                    continue;
                }
            };
            let Some(meta) = PackageMeta::from_manifest_str(&text) else {
                debug!(path = %manifest_path.display(), "manifest has no [package] table, skipping");
                continue;
            };
            let manifest_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
            if !Self::is_library(manifest_dir, &text) {
                debug!(crate_name = %meta.name, "skipping binary-only crate");
                continue;
            }

            let crate_name = meta.name.clone();
            match self.build_unit(&manifest_path, meta).await {
                Ok(unit) => {
                    info!(crate_name = %unit.name, "built documentation artifact");
                    units.push(unit);
                }
                Err(err) => {
                    warn!(crate_name = %crate_name, error = %err, "doc build failed, skipping crate");
                }
            }
        }
        Ok(units)
    }
}
