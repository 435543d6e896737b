//! GitHub integration: a rate-limited REST client, and lazy source-link
//! resolution for documentation members.

pub mod client;
pub mod links;
pub mod rate_limit;

pub use client::GitHubClient;
pub use links::LinkResolver;
pub use rate_limit::RateLimiter;

/// Repository pin determined once per loaded unit: the `owner/name` slug
/// and the commit the unit's version resolves to. Members carry a shared
/// handle to their unit's context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    pub slug: String,
    pub commit: String,
}
