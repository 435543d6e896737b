//! docdex: a Discord documentation bot for Rust crates.
//!
//! Documentation members are extracted from rustdoc JSON artifacts,
//! indexed under stable content-derived ids, and served through Discord
//! slash commands. GitHub source links are resolved lazily behind a
//! per-host rate limiter. The index is an immutable snapshot, atomically
//! replaced on reload; readers never see a partial state.

pub mod cli;
pub mod config;
pub mod discord;
pub mod error;
pub mod extract;
pub mod github;
pub mod index;
pub mod member;
pub mod render;
pub mod rustdoc;
pub mod sources;

// Re-export commonly used types
pub use config::DocdexConfig;
pub use error::{DocdexError, Result};
pub use github::{GitHubClient, LinkResolver, RateLimiter, RepoContext};
pub use index::{DocIndex, DocStore, LookupOutcome, ReloadReport};
pub use member::{DocMember, MemberId, SymbolKind};
pub use sources::{SourceProvider, SourceUnit};

/// Crate version, surfaced by the `/version` command.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
