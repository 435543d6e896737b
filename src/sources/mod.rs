//! Source providers: pluggable strategies that turn configuration into a
//! batch of loadable units for one reload pass.
//!
//! Providers are selected by name through an explicit registry map built
//! at startup; there is no scanning or reflection-style discovery.

pub mod git;
pub mod local_file;
pub mod local_project;

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tokio::process::Command;

use crate::config::SourcesConfig;
use crate::error::{DocdexError, Result};
use crate::rustdoc::DocArtifact;

/// One loadable unit: a parsed doc artifact plus the package metadata
/// link resolution needs. Owned for a single reload pass and discarded
/// after extraction; units share no loader state.
#[derive(Debug)]
pub struct SourceUnit {
    pub name: String,
    pub version: Option<String>,
    pub repository: Option<String>,
    pub artifact: DocArtifact,
}

#[async_trait]
pub trait SourceProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Produces the units for one reload, or fails the whole reload with
    /// a clear error. Per-unit load problems are logged and skipped
    /// inside the provider, not surfaced as batch failures.
    async fn enumerate(&self) -> Result<Vec<SourceUnit>>;
}

type ProviderCtor = fn(&SourcesConfig) -> Result<Box<dyn SourceProvider>>;

static REGISTRY: Lazy<HashMap<&'static str, ProviderCtor>> = Lazy::new(|| {
    let mut registry: HashMap<&'static str, ProviderCtor> = HashMap::new();
    registry.insert(local_file::NAME, local_file::LocalFileProvider::create);
    registry.insert(local_project::NAME, local_project::LocalProjectProvider::create);
    registry.insert(git::NAME, git::GitProvider::create);
    registry
});

/// Instantiates the provider named in the configuration.
pub fn create_provider(config: &SourcesConfig) -> Result<Box<dyn SourceProvider>> {
    let name = config.provider.trim();
    match REGISTRY.get(name) {
        Some(ctor) => ctor(config),
        None => Err(DocdexError::UnknownProvider {
            name: name.to_string(),
            known: provider_names().join(", "),
        }),
    }
}

pub fn provider_names() -> Vec<&'static str> {
    let mut names: Vec<_> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

/// `[package]` fields read from a crate manifest. Values inherited from a
/// workspace (`version.workspace = true`) come back as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageMeta {
    pub name: String,
    pub version: Option<String>,
    pub repository: Option<String>,
}

impl PackageMeta {
    pub fn from_manifest_str(text: &str) -> Option<Self> {
        let value: toml::Value = toml::from_str(text).ok()?;
        let package = value.get("package")?;
        let name = package.get("name")?.as_str()?.to_string();
        let version = package
            .get("version")
            .and_then(toml::Value::as_str)
            .map(str::to_string);
        let repository = package
            .get("repository")
            .and_then(toml::Value::as_str)
            .map(str::to_string);
        Some(Self {
            name,
            version,
            repository,
        })
    }

    pub fn from_manifest(path: &Path) -> Option<Self> {
        Self::from_manifest_str(&std::fs::read_to_string(path).ok()?)
    }
}

/// Runs a command to completion and checks its exit status. Stderr is
/// captured into the error on failure.
pub(crate) async fn run_checked(mut cmd: Command, label: &str) -> Result<()> {
    cmd.stdin(Stdio::null());
    let output = cmd.output().await?;
    if output.status.success() {
        Ok(())
    } else {
        Err(DocdexError::ProcessFailed {
            command: label.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Like [`run_checked`] but bounded: on timeout the child is killed and a
/// `ProcessTimeout` error is returned.
pub(crate) async fn run_bounded(
    mut cmd: Command,
    label: &str,
    limit: Duration,
) -> Result<()> {
    use tokio::io::AsyncReadExt;

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn()?;

    // drain stderr concurrently so a chatty child cannot block on a full
    // pipe while we wait on it
    let stderr = child.stderr.take();
    let drain = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut pipe) = stderr {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });

    match tokio::time::timeout(limit, child.wait()).await {
        Ok(waited) => {
            let status = waited?;
            let stderr = drain.await.unwrap_or_default();
            if status.success() {
                Ok(())
            } else {
                Err(DocdexError::ProcessFailed {
                    command: label.to_string(),
                    status: status.code().unwrap_or(-1),
                    stderr: stderr.trim().to_string(),
                })
            }
        }
        Err(_) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            drain.abort();
            Err(DocdexError::ProcessTimeout {
                command: label.to_string(),
                seconds: limit.as_secs(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_all_providers() {
        assert_eq!(
            provider_names(),
            vec!["git", "local-file", "local-project"]
        );
    }

    #[test]
    fn unknown_provider_lists_known_names() {
        let config = SourcesConfig {
            provider: "nuget".to_string(),
            ..SourcesConfig::default()
        };
        let err = create_provider(&config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("nuget"));
        assert!(message.contains("local-file"));
    }

    #[test]
    fn create_resolves_by_name() {
        let config = SourcesConfig::default();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "local-file");
    }

    #[test]
    fn package_meta_reads_core_fields() {
        let meta = PackageMeta::from_manifest_str(
            r#"
            [package]
            name = "gadget"
            version = "1.2.3"
            repository = "https://github.com/acme/gadget"
            "#,
        )
        .unwrap();
        assert_eq!(meta.name, "gadget");
        assert_eq!(meta.version.as_deref(), Some("1.2.3"));
        assert_eq!(
            meta.repository.as_deref(),
            Some("https://github.com/acme/gadget")
        );
    }

    #[test]
    fn package_meta_tolerates_workspace_inheritance() {
        let meta = PackageMeta::from_manifest_str(
            r#"
            [package]
            name = "gadget"
            version.workspace = true
            "#,
        )
        .unwrap();
        assert_eq!(meta.name, "gadget");
        assert_eq!(meta.version, None);
    }

    #[test]
    fn workspace_only_manifest_has_no_package() {
        assert!(PackageMeta::from_manifest_str("[workspace]\nmembers = []").is_none());
    }

    #[tokio::test]
    async fn run_checked_reports_exit_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 3"]);
        let err = run_checked(cmd, "sh -c").await.unwrap_err();
        match err {
            DocdexError::ProcessFailed {
                status, stderr, ..
            } => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn run_bounded_kills_on_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = run_bounded(cmd, "sleep 5", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, DocdexError::ProcessTimeout { .. }));
    }

    #[tokio::test]
    async fn run_bounded_passes_fast_commands() {
        let mut cmd = Command::new("true");
        assert!(run_bounded(cmd, "true", Duration::from_secs(5)).await.is_ok());
        cmd = Command::new("false");
        let err = run_bounded(cmd, "false", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, DocdexError::ProcessFailed { .. }));
    }
}
