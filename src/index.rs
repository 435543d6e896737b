//! The published documentation index and the store that rebuilds it.
//!
//! An index is immutable once built. The store swaps a shared handle
//! under a short write lock, so readers never observe a half-built
//! index and never block on a reload in progress.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{DocdexError, Result};
use crate::extract::extract_all;
use crate::github::LinkResolver;
use crate::member::{DocMember, MemberId};
use crate::sources::SourceProvider;

/// Most matches a fuzzy lookup will enumerate before asking the user to
/// refine, sized to a Discord select menu.
pub const MAX_MATCHES: usize = 25;
/// Autocomplete suggestion cap, per the interaction contract.
pub const MAX_SUGGESTIONS: usize = 10;

/// Result of a free-text lookup.
#[derive(Debug)]
pub enum LookupOutcome {
    None,
    One(Arc<DocMember>),
    Several(Vec<Arc<DocMember>>),
    /// More matches than a menu can hold; carries the match count.
    TooMany(usize),
}

#[derive(Debug, Default)]
pub struct DocIndex {
    members: HashMap<MemberId, Arc<DocMember>>,
    by_qualified: HashMap<String, MemberId>,
    /// Insertion order, which extraction keeps sorted by qualified name.
    /// Every ordering tie-break downstream leans on this.
    ordered: Vec<Arc<DocMember>>,
}

impl DocIndex {
    pub fn from_members(members: Vec<DocMember>) -> Self {
        let mut index = Self::default();
        for member in members {
            let member = Arc::new(member);
            if let Some(previous) = index.members.insert(member.id, member.clone()) {
                warn!(
                    id = %member.id,
                    kept = %member.qualified_name,
                    dropped = %previous.qualified_name,
                    "duplicate member id, keeping the later entry"
                );
                index.ordered.retain(|m| !Arc::ptr_eq(m, &previous));
            }
            index
                .by_qualified
                .insert(member.qualified_name.clone(), member.id);
            index.ordered.push(member);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = &Arc<DocMember>> {
        self.ordered.iter()
    }

    pub fn find_exact(&self, id: MemberId) -> Option<Arc<DocMember>> {
        self.members.get(&id).cloned()
    }

    /// Free-text lookup. An exact hit (member id, qualified name, or
    /// display name) short-circuits to a single result; otherwise the
    /// query is matched case-insensitively as a substring of display
    /// names.
    pub fn find_fuzzy(&self, query: &str) -> LookupOutcome {
        let query = query.trim();
        if query.is_empty() {
            return LookupOutcome::None;
        }

        if let Some(member) = MemberId::parse(query).and_then(|id| self.find_exact(id)) {
            return LookupOutcome::One(member);
        }
        if let Some(member) = self
            .by_qualified
            .get(query)
            .and_then(|id| self.members.get(id))
        {
            return LookupOutcome::One(member.clone());
        }
        if let Some(member) = self.ordered.iter().find(|m| m.display_name == query) {
            return LookupOutcome::One(member.clone());
        }

        let needle = query.to_lowercase();
        let mut matches: Vec<_> = self
            .ordered
            .iter()
            .filter(|m| m.display_name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        if matches.len() > MAX_MATCHES {
            return LookupOutcome::TooMany(matches.len());
        }
        match matches.len() {
            0 => LookupOutcome::None,
            1 => LookupOutcome::One(matches.remove(0)),
            _ => LookupOutcome::Several(matches),
        }
    }

    /// Ranked suggestions for a partial query: exact match, then prefix
    /// match, then names the query ends with, then shorter names first.
    /// The sort is stable, so ties keep insertion order. An empty query
    /// suggests the leading members.
    pub fn autocomplete(&self, partial: &str) -> Vec<Arc<DocMember>> {
        let partial = partial.trim();
        if partial.is_empty() {
            return self
                .ordered
                .iter()
                .take(MAX_SUGGESTIONS)
                .cloned()
                .collect();
        }

        let needle = partial.to_lowercase();
        let mut candidates: Vec<_> = self
            .ordered
            .iter()
            .filter(|m| m.display_name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        candidates.sort_by_key(|m| {
            let name = m.display_name.as_str();
            (
                name != partial,
                !name.starts_with(partial),
                !partial.ends_with(name),
                name.len(),
            )
        });
        candidates.truncate(MAX_SUGGESTIONS);
        candidates
    }
}

/// Outcome of one successful reload.
#[derive(Debug, Clone, Copy)]
pub struct ReloadReport {
    pub units: usize,
    pub members: usize,
    pub elapsed: Duration,
}

/// Owns the source provider and the currently published index.
pub struct DocStore {
    provider: Box<dyn SourceProvider>,
    links: Arc<LinkResolver>,
    index: RwLock<Arc<DocIndex>>,
    reload_gate: Mutex<()>,
}

impl DocStore {
    /// Starts with an empty index; call [`DocStore::reload`] to populate
    /// it.
    pub fn new(provider: Box<dyn SourceProvider>, links: Arc<LinkResolver>) -> Self {
        Self {
            provider,
            links,
            index: RwLock::new(Arc::new(DocIndex::default())),
            reload_gate: Mutex::new(()),
        }
    }

    /// Handle to the currently published index. The handle stays valid
    /// across reloads; it just stops being the latest.
    pub fn snapshot(&self) -> Arc<DocIndex> {
        self.index.read().clone()
    }

    #[cfg(test)]
    pub(crate) fn publish(&self, index: DocIndex) {
        *self.index.write() = Arc::new(index);
    }

    pub fn links(&self) -> &Arc<LinkResolver> {
        &self.links
    }

    /// Rebuilds the index from scratch and publishes it. On enumeration
    /// failure the previous index stays published and the error is
    /// returned. Reloads are serialized; a second caller waits for the
    /// first to finish.
    pub async fn reload(&self) -> Result<ReloadReport> {
        let _gate = self.reload_gate.lock().await;
        let started = Instant::now();

        let units = match self.provider.enumerate().await {
            Ok(units) => units,
            Err(err) => {
                error!(
                    provider = self.provider.name(),
                    error = %err,
                    "enumeration failed, keeping the current index"
                );
                return Err(err);
            }
        };

        let mut tagged = Vec::with_capacity(units.len());
        for unit in units {
            let repo = self.links.unit_context(&unit).await;
            tagged.push((unit, repo));
        }
        let unit_count = tagged.len();

        let members = tokio::task::spawn_blocking(move || extract_all(tagged))
            .await
            .map_err(|e| DocdexError::Enumeration(format!("extraction worker panicked: {e}")))?;

        let next = Arc::new(DocIndex::from_members(members));
        let member_count = next.len();
        *self.index.write() = next;

        let elapsed = started.elapsed();
        info!(
            units = unit_count,
            members = member_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "documentation index rebuilt"
        );
        Ok(ReloadReport {
            units: unit_count,
            members: member_count,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{GitHubClient, RateLimiter};
    use crate::member::{SymbolDecl, SymbolKind};
    use crate::rustdoc::DocArtifact;
    use crate::sources::SourceUnit;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::path::Path;

    fn member(qualified: &str) -> DocMember {
        member_in(qualified, "gadget")
    }

    fn member_in(qualified: &str, unit: &str) -> DocMember {
        let name = qualified.rsplit("::").next().unwrap().to_string();
        DocMember::new(
            qualified.to_string(),
            format!("Documentation for {qualified}."),
            None,
            SymbolDecl::plain(SymbolKind::Function, name),
            unit.to_string(),
            None,
        )
    }

    fn index_of(names: &[&str]) -> DocIndex {
        DocIndex::from_members(names.iter().map(|n| member(n)).collect())
    }

    #[test]
    fn exact_id_short_circuits() {
        let index = index_of(&["gadget::Widget::render", "gadget::Widget::resize"]);
        let id = MemberId::from_name("gadget::Widget::render");
        match index.find_fuzzy(&id.to_string()) {
            LookupOutcome::One(m) => assert_eq!(m.qualified_name, "gadget::Widget::render"),
            other => panic!("expected a single match, got {other:?}"),
        }
    }

    #[test]
    fn exact_names_short_circuit_over_substring_hits() {
        let index = index_of(&[
            "gadget::Widget::render",
            "gadget::Widget::render_all",
            "gadget::Widget::prerender",
        ]);
        // display-name exact
        match index.find_fuzzy("Widget::render") {
            LookupOutcome::One(m) => assert_eq!(m.qualified_name, "gadget::Widget::render"),
            other => panic!("expected a single match, got {other:?}"),
        }
        // qualified-name exact
        match index.find_fuzzy("gadget::Widget::render") {
            LookupOutcome::One(m) => assert_eq!(m.qualified_name, "gadget::Widget::render"),
            other => panic!("expected a single match, got {other:?}"),
        }
    }

    #[test]
    fn fuzzy_match_is_case_insensitive_substring() {
        let index = index_of(&[
            "gadget::Widget::render",
            "gadget::Widget::resize",
            "gadget::draw",
        ]);
        match index.find_fuzzy("WIDGET::RE") {
            LookupOutcome::Several(members) => {
                let names: Vec<_> = members.iter().map(|m| m.display_name.as_str()).collect();
                assert_eq!(names, vec!["Widget::render", "Widget::resize"]);
            }
            other => panic!("expected several matches, got {other:?}"),
        }
    }

    #[test]
    fn no_match_and_blank_queries_come_back_empty() {
        let index = index_of(&["gadget::Widget"]);
        assert!(matches!(index.find_fuzzy("nonexistent"), LookupOutcome::None));
        assert!(matches!(index.find_fuzzy("   "), LookupOutcome::None));
    }

    #[test]
    fn over_the_cap_asks_for_refinement() {
        let names: Vec<String> = (0..30).map(|i| format!("gadget::item_{i:02}")).collect();
        let index =
            DocIndex::from_members(names.iter().map(|n| member(n)).collect());
        match index.find_fuzzy("item") {
            LookupOutcome::TooMany(count) => assert_eq!(count, 30),
            other => panic!("expected too many matches, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_qualified_names_keep_the_later_member() {
        let index = DocIndex::from_members(vec![
            member_in("gadget::Widget", "first"),
            member_in("gadget::Widget", "second"),
        ]);
        assert_eq!(index.len(), 1);
        let found = index
            .find_exact(MemberId::from_name("gadget::Widget"))
            .unwrap();
        assert_eq!(found.unit, "second");
        assert_eq!(index.members().count(), 1);
    }

    #[test]
    fn autocomplete_ranks_exact_prefix_then_shortest() {
        let index = index_of(&[
            "gadget::ReadySignal",
            "gadget::ReadBuffer",
            "gadget::Reader",
            "gadget::io::BufReader",
        ]);
        let suggestions: Vec<_> = index
            .autocomplete("Read")
            .iter()
            .map(|m| m.display_name.clone())
            .collect();
        assert_eq!(
            suggestions,
            vec!["Reader", "ReadBuffer", "ReadySignal", "io::BufReader"]
        );

        let exact: Vec<_> = index
            .autocomplete("Reader")
            .iter()
            .map(|m| m.display_name.clone())
            .collect();
        assert_eq!(exact, vec!["Reader", "io::BufReader"]);
    }

    #[test]
    fn autocomplete_ties_keep_insertion_order() {
        let index = index_of(&["gadget::alpha_x", "gadget::alpha_y", "gadget::alpha_z"]);
        let suggestions: Vec<_> = index
            .autocomplete("alpha")
            .iter()
            .map(|m| m.display_name.clone())
            .collect();
        assert_eq!(suggestions, vec!["alpha_x", "alpha_y", "alpha_z"]);
    }

    #[test]
    fn autocomplete_caps_at_ten_and_serves_blank_queries() {
        let names: Vec<String> = (0..15).map(|i| format!("gadget::entry_{i:02}")).collect();
        let index =
            DocIndex::from_members(names.iter().map(|n| member(n)).collect());
        assert_eq!(index.autocomplete("entry").len(), MAX_SUGGESTIONS);

        let leading: Vec<_> = index
            .autocomplete("")
            .iter()
            .map(|m| m.display_name.clone())
            .collect();
        assert_eq!(leading.len(), MAX_SUGGESTIONS);
        assert_eq!(leading[0], "entry_00");
    }

    // -- store ---------------------------------------------------------

    #[derive(Debug)]
    struct ScriptedProvider {
        batches: std::sync::Mutex<VecDeque<Result<Vec<SourceUnit>>>>,
    }

    impl ScriptedProvider {
        fn new(batches: Vec<Result<Vec<SourceUnit>>>) -> Box<Self> {
            Box::new(Self {
                batches: std::sync::Mutex::new(batches.into()),
            })
        }
    }

    #[async_trait]
    impl SourceProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn enumerate(&self) -> Result<Vec<SourceUnit>> {
            self.batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn unit(name: &str, functions: &[&str]) -> SourceUnit {
        let mut item_index = serde_json::Map::new();
        let mut paths = serde_json::Map::new();
        for (i, function) in functions.iter().enumerate() {
            let id = (i + 1).to_string();
            item_index.insert(
                id.clone(),
                json!({
                    "name": function,
                    "docs": "Does a thing.",
                    "visibility": "public",
                    "inner": {"function": {}}
                }),
            );
            paths.insert(
                id,
                json!({"crate_id": 0, "path": [name, function], "kind": "function"}),
            );
        }
        let doc = json!({"format_version": 30, "index": item_index, "paths": paths});
        SourceUnit {
            name: name.to_string(),
            version: None,
            repository: None,
            artifact: DocArtifact::parse(&doc.to_string(), Path::new("scripted.json")).unwrap(),
        }
    }

    fn store_with(batches: Vec<Result<Vec<SourceUnit>>>) -> DocStore {
        let client = GitHubClient::new(
            reqwest::Client::new(),
            Arc::new(RateLimiter::github()),
            None,
        );
        DocStore::new(
            ScriptedProvider::new(batches),
            Arc::new(LinkResolver::new(Arc::new(client))),
        )
    }

    #[tokio::test]
    async fn reload_publishes_a_fresh_index() {
        let store = store_with(vec![Ok(vec![unit("gadget", &["render", "resize"])])]);
        assert!(store.snapshot().is_empty());

        let report = store.reload().await.unwrap();
        assert_eq!(report.units, 1);
        assert_eq!(report.members, 2);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn failed_enumeration_keeps_the_previous_index() {
        let store = store_with(vec![
            Ok(vec![unit("gadget", &["render"])]),
            Err(DocdexError::Enumeration("clone failed".to_string())),
        ]);
        store.reload().await.unwrap();
        let before = store.snapshot();

        assert!(store.reload().await.is_err());
        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.len(), 1);
    }

    #[tokio::test]
    async fn member_ids_survive_a_reload_of_unchanged_sources() {
        let store = store_with(vec![
            Ok(vec![unit("gadget", &["render", "resize"])]),
            Ok(vec![unit("gadget", &["render", "resize"])]),
        ]);
        store.reload().await.unwrap();
        let stale = store.snapshot();
        let stale_id = stale.members().next().unwrap().id;

        store.reload().await.unwrap();
        let fresh = store.snapshot();
        assert!(!Arc::ptr_eq(&stale, &fresh));
        let found = fresh.find_exact(stale_id).unwrap();
        assert_eq!(
            found.qualified_name,
            stale.find_exact(stale_id).unwrap().qualified_name
        );
    }

    #[tokio::test]
    async fn old_snapshots_stay_readable_after_publication() {
        let store = store_with(vec![
            Ok(vec![unit("gadget", &["render"])]),
            Ok(vec![unit("gadget", &["render", "resize", "draw"])]),
        ]);
        store.reload().await.unwrap();
        let old = store.snapshot();
        store.reload().await.unwrap();

        assert_eq!(old.len(), 1);
        assert_eq!(store.snapshot().len(), 3);
    }
}
