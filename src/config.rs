use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocdexError, Result};

/// Top-level configuration, loaded from a TOML file layered with
/// `DOCDEX_`-prefixed environment variables (`DOCDEX_DISCORD__TOKEN`
/// overrides `discord.token`, and so on).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocdexConfig {
    pub discord: DiscordConfig,
    pub github: GitHubConfig,
    pub sources: SourcesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token, used for command registration and followup edits.
    pub token: Option<String>,
    pub application_id: Option<String>,
    /// Hex-encoded ed25519 public key from the application settings,
    /// required to serve the interactions endpoint.
    pub public_key: Option<String>,
    /// User ids allowed to run the reload command.
    pub owner_ids: Vec<String>,
    /// Address the interactions endpoint listens on.
    pub bind: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            application_id: None,
            public_key: None,
            owner_ids: Vec::new(),
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Bearer token for the GitHub API. Without it, source-link resolution
    /// is disabled and metadata lookups run anonymously.
    pub token: Option<String>,
    /// `owner/name` slug used by the repository and issue commands.
    pub repository: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Source provider name. See `sources::provider_names()`.
    pub provider: String,
    /// Directory the provider operates on: artifact directory for
    /// `local-file`, workspace root for `local-project`, checkout path
    /// for `git`.
    pub path: PathBuf,
    /// Remote URL for the `git` provider.
    pub repository_url: Option<String>,
    /// Glob patterns for paths to skip during crate discovery.
    pub ignore: Vec<String>,
    /// Upper bound on a single doc build, in seconds.
    pub build_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            provider: "local-file".to_string(),
            path: PathBuf::from("docs"),
            repository_url: None,
            ignore: Vec::new(),
            build_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter, overridable with `RUST_LOG`. Per-module
    /// levels use the usual directive syntax, e.g.
    /// `info,docdex::github=debug`.
    pub filter: String,
    /// When set, logs are also written to daily-rolling files here.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            directory: None,
        }
    }
}

impl DocdexConfig {
    /// Loads configuration from the given file (or `docdex.toml` in the
    /// working directory when absent) plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(explicit) => builder.add_source(
                config::File::from(explicit).format(config::FileFormat::Toml),
            ),
            None => builder.add_source(
                config::File::with_name("docdex")
                    .format(config::FileFormat::Toml)
                    .required(false),
            ),
        };
        builder = builder.add_source(
            config::Environment::with_prefix("DOCDEX").separator("__"),
        );

        let settings = builder
            .build()
            .map_err(|e| DocdexError::Config(e.to_string()))?;
        let cfg: DocdexConfig = settings
            .try_deserialize()
            .map_err(|e| DocdexError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.sources.provider.trim().is_empty() {
            return Err(DocdexError::Config(
                "sources.provider must not be empty".to_string(),
            ));
        }
        if self.sources.build_timeout_secs == 0 {
            return Err(DocdexError::Config(
                "sources.build_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks the fields the interactions endpoint cannot run without.
    pub fn require_serve(&self) -> Result<()> {
        if self.discord.public_key.as_deref().unwrap_or("").is_empty() {
            return Err(DocdexError::Config(
                "discord.public_key is required to serve the interactions endpoint"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = DocdexConfig::default();
        assert_eq!(cfg.sources.provider, "local-file");
        assert_eq!(cfg.sources.build_timeout_secs, 120);
        assert_eq!(cfg.discord.bind, "0.0.0.0:8080");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn serve_requires_public_key() {
        let mut cfg = DocdexConfig::default();
        assert!(cfg.require_serve().is_err());

        cfg.discord.public_key = Some("ab".repeat(32));
        assert!(cfg.require_serve().is_ok());
    }

    #[test]
    fn zero_build_timeout_is_rejected() {
        let mut cfg = DocdexConfig::default();
        cfg.sources.build_timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn toml_round_trips_through_serde() {
        let text = r#"
            [discord]
            public_key = "aa"
            owner_ids = ["123"]

            [sources]
            provider = "local-project"
            path = "/srv/projects"
            ignore = ["**/fixtures/**"]
        "#;
        let cfg: DocdexConfig = toml::from_str(text).unwrap();
        assert_eq!(cfg.sources.provider, "local-project");
        assert_eq!(cfg.discord.owner_ids, vec!["123".to_string()]);
        assert_eq!(cfg.sources.ignore.len(), 1);
        // untouched sections keep their defaults
        assert_eq!(cfg.logging.filter, "info");
    }
}
