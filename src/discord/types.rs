//! Wire types for the interactions endpoint: the slice of the payload
//! the bot reads, and builders for the responses it sends back.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::render::{truncate_ellipsis, MAX_CHOICE_LEN};

/// Incoming interaction types.
pub mod interaction_type {
    pub const PING: u8 = 1;
    pub const APPLICATION_COMMAND: u8 = 2;
    pub const MESSAGE_COMPONENT: u8 = 3;
    pub const AUTOCOMPLETE: u8 = 4;
}

/// Custom id of the disambiguation select menu.
pub const PICK_MENU_ID: &str = "docs-pick";

#[derive(Debug, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    pub token: String,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub data: Option<InteractionData>,
    #[serde(default)]
    pub member: Option<GuildMember>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Interaction {
    /// Id of the invoking user, from whichever of the two places Discord
    /// puts it (guild invocations nest it under `member`).
    pub fn invoker_id(&self) -> Option<&str> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
            .map(|u| u.id.as_str())
    }

    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.name.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InteractionData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    /// Selected values of a component interaction.
    #[serde(default)]
    pub values: Vec<String>,
}

impl InteractionData {
    pub fn option(&self, name: &str) -> Option<&CommandOption> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Value of the option currently being typed, for autocomplete.
    pub fn focused_value(&self) -> Option<String> {
        self.options
            .iter()
            .find(|o| o.focused)
            .map(CommandOption::value_text)
    }
}

#[derive(Debug, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub focused: bool,
}

impl CommandOption {
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.value.as_u64()
    }

    /// The option value as text, whatever JSON type it arrived as.
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GuildMember {
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: String,
}

/// One entry in the disambiguation menu.
#[derive(Debug, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Outgoing interaction response.
#[derive(Debug, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self { kind: 1, data: None }
    }

    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: 4,
            data: Some(json!({ "content": content.into() })),
        }
    }

    /// A reply only the invoker sees.
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            kind: 4,
            data: Some(json!({ "content": content.into(), "flags": 64 })),
        }
    }

    /// Acknowledge now, answer later via the webhook edit.
    pub fn deferred() -> Self {
        Self { kind: 5, data: None }
    }

    /// Replaces the message a component interaction came from, dropping
    /// its components.
    pub fn update(content: impl Into<String>) -> Self {
        Self {
            kind: 7,
            data: Some(json!({ "content": content.into(), "components": [] })),
        }
    }

    pub fn autocomplete(choices: Vec<(String, String)>) -> Self {
        let choices: Vec<Value> = choices
            .into_iter()
            .map(|(name, value)| {
                json!({ "name": truncate_ellipsis(&name, MAX_CHOICE_LEN), "value": value })
            })
            .collect();
        Self {
            kind: 8,
            data: Some(json!({ "choices": choices })),
        }
    }

    /// A message carrying the disambiguation select menu.
    pub fn pick_menu(content: impl Into<String>, options: Vec<SelectOption>) -> Self {
        Self {
            kind: 4,
            data: Some(json!({
                "content": content.into(),
                "components": [{
                    "type": 1,
                    "components": [{
                        "type": 3,
                        "custom_id": PICK_MENU_ID,
                        "placeholder": "Answer here!",
                        "options": options,
                    }]
                }]
            })),
        }
    }

    #[cfg(test)]
    pub fn kind(&self) -> u8 {
        self.kind
    }

    #[cfg(test)]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}
