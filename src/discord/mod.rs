//! Discord surface: the interactions endpoint, slash command handlers,
//! and outbound REST calls for registration and deferred replies.

pub mod commands;
pub mod interactions;
pub mod types;

pub use commands::{CommandHandler, DiscordRest};
pub use interactions::{router, AppState, SignatureVerifier};
pub use types::{Interaction, InteractionResponse};
