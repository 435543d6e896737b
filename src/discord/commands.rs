//! Slash command handlers, the autocomplete and select-menu callbacks,
//! and the small slice of the Discord REST API the bot calls outbound.

use std::sync::Arc;

use dashmap::DashMap;
use reqwest::header::AUTHORIZATION;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::discord::types::{
    CommandOption, Interaction, InteractionData, InteractionResponse, SelectOption, PICK_MENU_ID,
};
use crate::error::{DocdexError, Result};
use crate::github::GitHubClient;
use crate::index::{DocStore, LookupOutcome};
use crate::member::{DocMember, MemberId};
use crate::render::{render, truncate_ellipsis, MAX_CHOICE_LEN};

const DISCORD_API_ROOT: &str = "https://discord.com/api/v10";

/// The full application command set, in registration payload form.
pub fn command_payload() -> Value {
    json!([
        {
            "name": "docs",
            "description": "Retrieves documentation for a given type or member.",
            "type": 1,
            "dm_permission": true,
            "options": [{
                "type": 3,
                "name": "member",
                "description": "The type or member to retrieve documentation for.",
                "required": true,
                "autocomplete": true
            }]
        },
        {
            "name": "reload",
            "description": "Reloads the bot documentation.",
            "type": 1
        },
        {
            "name": "repository",
            "description": "Get the repository link.",
            "type": 1
        },
        {
            "name": "version",
            "description": "Get the version of the bot.",
            "type": 1
        },
        {
            "name": "issue",
            "description": "Link an issue or pull request from the repository.",
            "type": 1,
            "options": [{
                "type": 4,
                "name": "number",
                "description": "The issue or pull request number.",
                "required": true,
                "min_value": 1
            }]
        }
    ])
}

/// Outbound Discord REST calls: command registration and deferred-reply
/// edits. Everything else flows back through interaction responses.
#[derive(Clone)]
pub struct DiscordRest {
    http: reqwest::Client,
    api_root: String,
    token: Option<String>,
}

impl DiscordRest {
    pub fn new(http: reqwest::Client, token: Option<String>) -> Self {
        Self {
            http,
            api_root: DISCORD_API_ROOT.to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into();
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Registers the command set globally, replacing whatever was
    /// registered before.
    pub async fn register_commands(&self, application_id: &str) -> Result<usize> {
        let Some(token) = self.token.as_deref() else {
            return Err(DocdexError::Config(
                "a bot token is required to register commands".to_string(),
            ));
        };
        let payload = command_payload();
        let count = payload.as_array().map(Vec::len).unwrap_or_default();
        let response = self
            .http
            .put(format!(
                "{}/applications/{}/commands",
                self.api_root, application_id
            ))
            .header(AUTHORIZATION, format!("Bot {token}"))
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DocdexError::Discord {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        info!(commands = count, "registered application commands");
        Ok(count)
    }

    /// Fills in a deferred interaction reply. Authorized by the
    /// interaction token alone, so this works without a bot token.
    pub async fn edit_original(
        &self,
        application_id: &str,
        interaction_token: &str,
        content: &str,
    ) -> Result<()> {
        let response = self
            .http
            .patch(format!(
                "{}/webhooks/{}/{}/messages/@original",
                self.api_root, application_id, interaction_token
            ))
            .json(&json!({ "content": content }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DocdexError::Discord {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Resolves issue references against the configured repository, caching
/// each rendered line for the life of the process.
pub struct IssueLinker {
    client: Arc<GitHubClient>,
    cache: DashMap<u64, String>,
}

impl IssueLinker {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self {
            client,
            cache: DashMap::new(),
        }
    }

    pub async fn link(&self, slug: &str, number: u64) -> Option<String> {
        if let Some(cached) = self.cache.get(&number) {
            return Some(cached.clone());
        }
        let issue = match self.client.issue(slug, number).await {
            Ok(Some(issue)) => issue,
            Ok(None) => return None,
            Err(err) => {
                warn!(number, error = %err, "issue lookup failed");
                return None;
            }
        };
        let label = if issue.is_pull_request() {
            "Pull Request"
        } else {
            "Issue"
        };
        let author = issue
            .user
            .as_ref()
            .map(|u| u.login.as_str())
            .unwrap_or("unknown");
        let text = format!(
            "{label} #{}: [{}](<{}>) - {author}",
            issue.number, issue.title, issue.html_url
        );
        self.cache.insert(number, text.clone());
        Some(text)
    }
}

/// Routes decoded interactions to their handlers.
pub struct CommandHandler {
    store: Arc<DocStore>,
    rest: DiscordRest,
    issues: IssueLinker,
    repository: Option<String>,
    owner_ids: Vec<String>,
}

impl CommandHandler {
    pub fn new(
        store: Arc<DocStore>,
        rest: DiscordRest,
        repository: Option<String>,
        owner_ids: Vec<String>,
    ) -> Self {
        let issues = IssueLinker::new(store.links().client().clone());
        Self {
            store,
            rest,
            issues,
            repository,
            owner_ids,
        }
    }

    pub async fn run_command(&self, interaction: &Interaction) -> InteractionResponse {
        let Some(data) = interaction.data.as_ref() else {
            return InteractionResponse::ephemeral("Malformed interaction payload.");
        };
        match data.name.as_deref() {
            Some("docs") | Some("documentation") => self.docs(data).await,
            Some("reload") => self.reload(interaction),
            Some("repository") => self.repository(),
            Some("version") => Self::version(),
            Some("issue") => self.issue(data).await,
            other => {
                debug!(command = ?other, "unrecognized command");
                InteractionResponse::ephemeral("Unknown command.")
            }
        }
    }

    pub fn run_autocomplete(&self, interaction: &Interaction) -> InteractionResponse {
        let query = interaction
            .data
            .as_ref()
            .and_then(InteractionData::focused_value)
            .unwrap_or_default();
        let index = self.store.snapshot();
        let choices = index
            .autocomplete(&query)
            .into_iter()
            .map(|m| (m.display_name.clone(), m.id.to_string()))
            .collect();
        InteractionResponse::autocomplete(choices)
    }

    pub async fn run_component(&self, interaction: &Interaction) -> InteractionResponse {
        let Some(data) = interaction.data.as_ref() else {
            return InteractionResponse::ephemeral("Malformed interaction payload.");
        };
        if data.custom_id.as_deref() != Some(PICK_MENU_ID) {
            debug!(custom_id = ?data.custom_id, "unrecognized component");
            return InteractionResponse::ephemeral("Unknown component.");
        }
        let member = data
            .values
            .first()
            .and_then(|value| MemberId::parse(value))
            .and_then(|id| self.store.snapshot().find_exact(id));
        match member {
            Some(member) => {
                let content = self.rendered(&member).await;
                InteractionResponse::update(content)
            }
            None => InteractionResponse::update("No documentation found."),
        }
    }

    async fn docs(&self, data: &InteractionData) -> InteractionResponse {
        let query = data
            .option("member")
            .map(CommandOption::value_text)
            .unwrap_or_default();
        let index = self.store.snapshot();
        match index.find_fuzzy(&query) {
            LookupOutcome::None => InteractionResponse::message("No documentation found."),
            LookupOutcome::One(member) => {
                InteractionResponse::message(self.rendered(&member).await)
            }
            LookupOutcome::Several(members) => {
                let options = members
                    .iter()
                    .map(|m| SelectOption {
                        label: truncate_ellipsis(&m.display_name, MAX_CHOICE_LEN),
                        value: m.id.to_string(),
                        description: Some(m.unit.clone()),
                    })
                    .collect();
                InteractionResponse::pick_menu(
                    format!("Found {} possible matches. Pick one:", members.len()),
                    options,
                )
            }
            LookupOutcome::TooMany(count) => InteractionResponse::message(format!(
                "Found {count} matches. Please refine your query."
            )),
        }
    }

    /// Owner-gated. Acknowledges immediately, reloads in the background,
    /// then edits the deferred reply with the outcome.
    fn reload(&self, interaction: &Interaction) -> InteractionResponse {
        if !self.is_owner(interaction) {
            return InteractionResponse::ephemeral(
                "Only the configured bot owners may reload documentation.",
            );
        }
        let Some(application_id) = interaction.application_id.clone() else {
            return InteractionResponse::ephemeral("Malformed interaction payload.");
        };
        let store = self.store.clone();
        let rest = self.rest.clone();
        let token = interaction.token.clone();
        tokio::spawn(async move {
            let content = match store.reload().await {
                Ok(_) => "Documentation reloaded.".to_string(),
                Err(err) => format!("Documentation reload failed: {err}"),
            };
            if let Err(err) = rest.edit_original(&application_id, &token, &content).await {
                warn!(error = %err, "could not edit the deferred reload reply");
            }
        });
        InteractionResponse::deferred()
    }

    fn repository(&self) -> InteractionResponse {
        match self.repository.as_deref() {
            Some(slug) => InteractionResponse::message(format!("https://github.com/{slug}")),
            None => InteractionResponse::message("No repository is configured."),
        }
    }

    fn version() -> InteractionResponse {
        InteractionResponse::message(format!("Version: {}", crate::VERSION))
    }

    async fn issue(&self, data: &InteractionData) -> InteractionResponse {
        let Some(number) = data
            .option("number")
            .and_then(CommandOption::as_u64)
            .filter(|n| *n > 0)
        else {
            return InteractionResponse::ephemeral("An issue number is required.");
        };
        let Some(slug) = self.repository.as_deref() else {
            return InteractionResponse::message("No repository is configured.");
        };
        match self.issues.link(slug, number).await {
            Some(text) => InteractionResponse::message(text),
            None => InteractionResponse::message(format!("Issue #{number} was not found.")),
        }
    }

    async fn rendered(&self, member: &Arc<DocMember>) -> String {
        let link = member
            .source_link(|| self.store.links().resolve(member))
            .await;
        render(member, link)
    }

    fn is_owner(&self, interaction: &Interaction) -> bool {
        interaction
            .invoker_id()
            .is_some_and(|id| self.owner_ids.iter().any(|owner| owner == id))
    }
}
