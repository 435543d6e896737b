//! Command-line entry points: serve the interactions endpoint, build the
//! index once, or register the slash commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::DocdexConfig;
use crate::discord::{router, AppState, CommandHandler, DiscordRest, SignatureVerifier};
use crate::github::{GitHubClient, LinkResolver, RateLimiter};
use crate::index::DocStore;
use crate::sources;

#[derive(Parser, Debug)]
#[command(name = "docdex", version, about = "Rust documentation bot for Discord")]
pub struct Cli {
    /// Path to the configuration file. Defaults to `docdex.toml` in the
    /// working directory, when present.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the Discord interactions endpoint.
    Serve,
    /// Build the documentation index once and print a summary.
    Index,
    /// Register the slash commands with Discord and exit.
    Register,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config =
        DocdexConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let _log_guard = init_tracing(&config);

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Index => index_once(config).await,
        Command::Register => register(config).await,
    }
}

/// Console logging always; daily-rolling file logging when a log
/// directory is configured. The returned guard must stay alive for the
/// process lifetime or buffered file output is lost.
fn init_tracing(config: &DocdexConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "docdex.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
    }
}

fn build_store(config: &DocdexConfig) -> crate::error::Result<Arc<DocStore>> {
    let provider = sources::create_provider(&config.sources)?;
    let limiter = Arc::new(RateLimiter::github());
    let client = Arc::new(GitHubClient::new(
        reqwest::Client::new(),
        limiter,
        config.github.token.clone(),
    ));
    let links = Arc::new(LinkResolver::new(client));
    Ok(Arc::new(DocStore::new(provider, links)))
}

async fn serve(config: DocdexConfig) -> Result<()> {
    config.require_serve()?;
    let public_key = config.discord.public_key.as_deref().unwrap_or_default();
    let verifier = SignatureVerifier::from_hex(public_key)?;
    let store = build_store(&config)?;

    // Load once at startup. A failure is not fatal; the reload command
    // can retry once the underlying problem is fixed.
    if let Err(err) = store.reload().await {
        error!(error = %err, "initial documentation load failed");
    }

    let rest = DiscordRest::new(reqwest::Client::new(), config.discord.token.clone());
    match config.discord.application_id.as_deref() {
        Some(application_id) if rest.has_token() => {
            if let Err(err) = rest.register_commands(application_id).await {
                warn!(error = %err, "slash command registration failed");
            }
        }
        _ => warn!("bot token or application id missing, skipping command registration"),
    }

    let commands = CommandHandler::new(
        store,
        rest,
        config.github.repository.clone(),
        config.discord.owner_ids.clone(),
    );
    let app = router(Arc::new(AppState { verifier, commands }));

    let listener = tokio::net::TcpListener::bind(&config.discord.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.discord.bind))?;
    info!(addr = %config.discord.bind, "serving the interactions endpoint");
    axum::serve(listener, app)
        .await
        .context("interactions endpoint terminated")?;
    Ok(())
}

async fn index_once(config: DocdexConfig) -> Result<()> {
    let store = build_store(&config)?;
    let report = store.reload().await?;
    println!(
        "Indexed {} members from {} units in {:.2?}.",
        report.members, report.units, report.elapsed
    );
    for member in store.snapshot().members().take(10) {
        println!("  {}  {}", member.id, member.qualified_name);
    }
    Ok(())
}

async fn register(config: DocdexConfig) -> Result<()> {
    let application_id = config
        .discord
        .application_id
        .clone()
        .context("discord.application_id is required to register commands")?;
    let rest = DiscordRest::new(reqwest::Client::new(), config.discord.token.clone());
    let count = rest.register_commands(&application_id).await?;
    println!("Registered {count} commands for application {application_id}.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["docdex", "serve", "--config", "custom.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("custom.toml")));
        assert!(matches!(cli.command, Command::Serve));
    }

    #[test]
    fn subcommands_parse() {
        assert!(matches!(
            Cli::try_parse_from(["docdex", "index"]).unwrap().command,
            Command::Index
        ));
        assert!(matches!(
            Cli::try_parse_from(["docdex", "register"]).unwrap().command,
            Command::Register
        ));
        assert!(Cli::try_parse_from(["docdex"]).is_err());
    }
}
