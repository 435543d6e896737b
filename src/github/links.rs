use std::sync::Arc;

use tracing::{debug, warn};

use crate::github::client::GitHubClient;
use crate::github::RepoContext;
use crate::member::DocMember;
use crate::sources::SourceUnit;

/// Resolves source links for documentation members.
///
/// Context determination happens once per loaded unit during a reload;
/// per-member resolution is deferred until a member is actually served
/// and memoized on the member itself. Every failure here is a
/// per-member (or per-unit) miss, never a reload failure.
pub struct LinkResolver {
    client: Arc<GitHubClient>,
}

impl LinkResolver {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<GitHubClient> {
        &self.client
    }

    /// Pins a unit to a repository slug and commit from its package
    /// metadata. Returns `None` when the metadata is incomplete or the
    /// lookups fail.
    pub async fn unit_context(&self, unit: &SourceUnit) -> Option<Arc<RepoContext>> {
        let repo_url = match unit.repository.as_deref() {
            Some(url) => url,
            None => {
                debug!(unit = %unit.name, "no repository url in unit metadata");
                return None;
            }
        };
        let slug = match repo_slug(repo_url) {
            Some(slug) => slug,
            None => {
                debug!(unit = %unit.name, url = repo_url, "repository url is not a repo path");
                return None;
            }
        };
        let version = match unit.version.as_deref() {
            Some(version) => version,
            None => {
                debug!(unit = %unit.name, "no version in unit metadata");
                return None;
            }
        };

        let commit = self.pin_commit(&slug, version).await?;
        debug!(unit = %unit.name, slug = %slug, commit = %commit, "pinned unit repository");
        Some(Arc::new(RepoContext { slug, commit }))
    }

    /// Commit for a version string: semver build metadata (`1.2.3+sha`)
    /// pins directly; otherwise the releases list is searched for a tag
    /// ending in the version (first release as fallback) and that tag is
    /// resolved through the ref API.
    async fn pin_commit(&self, slug: &str, version: &str) -> Option<String> {
        if let Some((_, build)) = version.split_once('+') {
            if !build.is_empty() {
                return Some(build.to_string());
            }
        }

        let releases = match self.client.releases(slug).await {
            Ok(releases) => releases,
            Err(err) => {
                warn!(slug, error = %err, "release list lookup failed");
                return None;
            }
        };
        if releases.is_empty() {
            debug!(slug, "repository has no releases to pin against");
            return None;
        }
        let tag = releases
            .iter()
            .find(|release| release.tag_name.ends_with(version))
            .map(|release| release.tag_name.clone())
            .unwrap_or_else(|| {
                debug!(slug, version, "no release tag matches, using the newest release");
                releases[0].tag_name.clone()
            });

        match self.client.tag_commit(slug, &tag).await {
            Ok(Some(sha)) => Some(sha),
            Ok(None) => {
                debug!(slug, tag, "tag has no ref");
                None
            }
            Err(err) => {
                warn!(slug, tag, error = %err, "tag ref lookup failed");
                None
            }
        }
    }

    /// Source link for one member via code search. Requires a token and
    /// a pinned unit context. Type members prefer the hit whose filename
    /// matches the type name exactly; everything else takes the first
    /// hit.
    pub async fn resolve(&self, member: &DocMember) -> Option<String> {
        let context = member.repo.as_ref()?;
        if !self.client.has_token() {
            debug!("github token not configured, skipping source link lookup");
            return None;
        }

        let query = format!(
            "{} repo:{} language:rust",
            member.decl.name, context.slug
        );
        let hits = match self.client.search_code(&query).await {
            Ok(hits) => hits,
            Err(err) => {
                debug!(member = %member.qualified_name, error = %err, "code search failed");
                return None;
            }
        };

        let hit = if member.kind().is_type() {
            let file_name = format!("{}.rs", member.decl.name);
            hits.iter().find(|hit| hit.name == file_name)
        } else {
            hits.first()
        };
        hit.map(|hit| hit.html_url.clone())
    }
}

/// Extracts an `owner/name` slug from a repository URL.
pub fn repo_slug(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let mut slug = parsed
        .path()
        .trim_start_matches('/')
        .trim_end_matches('/')
        .to_string();
    if let Some(stripped) = slug.strip_suffix(".git") {
        slug = stripped.to_string();
    }
    if slug.is_empty() || !slug.contains('/') {
        return None;
    }
    Some(slug)
}
