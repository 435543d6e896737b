use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::config::SourcesConfig;
use crate::error::{DocdexError, Result};
use crate::sources::{run_checked, SourceProvider, SourceUnit};

use super::local_project::LocalProjectProvider;

pub const NAME: &str = "git";

/// Keeps a checkout of a remote repository up to date, then hands the
/// working tree to the local-project strategy.
///
/// A failed clone or pull aborts the whole reload; per-crate build
/// failures inside the checkout remain non-fatal as usual.
#[derive(Debug)]
pub struct GitProvider {
    url: String,
    checkout: PathBuf,
    projects: LocalProjectProvider,
}

impl GitProvider {
    pub fn new(url: impl Into<String>, checkout: impl Into<PathBuf>, projects: LocalProjectProvider) -> Self {
        Self {
            url: url.into(),
            checkout: checkout.into(),
            projects,
        }
    }

    pub fn create(config: &SourcesConfig) -> Result<Box<dyn SourceProvider>> {
        let url = config.repository_url.clone().ok_or_else(|| {
            DocdexError::Config(
                "sources.repository_url is required for the git provider".to_string(),
            )
        })?;
        let projects = LocalProjectProvider::from_config(config)?;
        Ok(Box::new(Self::new(url, config.path.clone(), projects)))
    }

    async fn sync(&self) -> Result<()> {
        if self.checkout.join(".git").is_dir() {
            info!(path = %self.checkout.display(), "pulling repository");
            let mut cmd = Command::new("git");
            cmd.arg("pull").current_dir(&self.checkout);
            run_checked(cmd, "git pull").await
        } else {
            info!(url = %self.url, path = %self.checkout.display(), "cloning repository");
            let mut cmd = Command::new("git");
            cmd.arg("clone").arg(&self.url).arg(&self.checkout);
            run_checked(cmd, "git clone").await
        }
    }
}

#[async_trait]
impl SourceProvider for GitProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn enumerate(&self) -> Result<Vec<SourceUnit>> {
        self.sync().await?;
        self.projects.enumerate().await
    }
}
