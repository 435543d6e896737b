//! Member extraction: loadable units in, a flat batch of documentation
//! members out.
//!
//! Work fans out across units and across items within a unit; the only
//! shared state is the concurrent queue the members land in. The drained
//! batch is sorted by qualified name so index insertion order (and with
//! it every tie-break downstream) is deterministic.

use std::sync::Arc;

use crossbeam::queue::SegQueue;
use rayon::prelude::*;
use tracing::debug;

use crate::github::RepoContext;
use crate::member::{DocMember, SymbolDecl, SymbolKind};
use crate::rustdoc::{DocArtifact, Item};
use crate::sources::SourceUnit;

/// Extracts members from every unit in the batch.
pub fn extract_all(units: Vec<(SourceUnit, Option<Arc<RepoContext>>)>) -> Vec<DocMember> {
    let queue = SegQueue::new();
    units.par_iter().for_each(|(unit, repo)| {
        extract_unit(unit, repo.clone(), &queue);
    });

    let mut members = Vec::with_capacity(queue.len());
    while let Some(member) = queue.pop() {
        members.push(member);
    }
    members.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
    members
}

fn extract_unit(unit: &SourceUnit, repo: Option<Arc<RepoContext>>, queue: &SegQueue<DocMember>) {
    let entries: Vec<_> = unit
        .artifact
        .local_entries()
        .filter_map(|(id, summary)| {
            let kind = SymbolKind::from_kind_str(&summary.kind)?;
            Some((id, kind, summary.path.join("::")))
        })
        .filter(|(_, _, qualified)| !qualified.is_empty())
        .collect();

    entries.par_iter().for_each(|(id, kind, qualified)| {
        let Some(item) = unit.artifact.item(id) else {
            return;
        };
        if !eligible(item, last_segment(qualified)) {
            return;
        }

        queue.push(build_member(qualified, *kind, item, unit, repo.clone()));

        // members nested under a type: inherent impl items for structs,
        // enums and unions; declared items for traits
        match kind {
            SymbolKind::Struct | SymbolKind::Enum | SymbolKind::Union => {
                for impl_id in item.child_ids("impls") {
                    let Some(impl_item) = unit.artifact.item(&impl_id) else {
                        continue;
                    };
                    if impl_item.impl_trait().is_some() {
                        // trait and derive impls carry the trait's docs,
                        // not this type's
                        continue;
                    }
                    extract_children(impl_item, qualified, unit, &repo, queue);
                }
            }
            SymbolKind::Trait => {
                extract_children(item, qualified, unit, &repo, queue);
            }
            _ => {}
        }
    });
    debug!(unit = %unit.name, "unit extraction finished");
}

fn extract_children(
    parent: &Item,
    parent_path: &str,
    unit: &SourceUnit,
    repo: &Option<Arc<RepoContext>>,
    queue: &SegQueue<DocMember>,
) {
    for child_id in parent.child_ids("items") {
        let Some(child) = unit.artifact.item(&child_id) else {
            continue;
        };
        let Some(name) = child.name.as_deref() else {
            continue;
        };
        if !eligible(child, name) {
            continue;
        }
        let Some(kind) = child.kind().and_then(SymbolKind::from_kind_str) else {
            continue;
        };
        let kind = match kind {
            SymbolKind::Function => SymbolKind::Method,
            other => other,
        };
        let qualified = format!("{parent_path}::{name}");
        queue.push(build_member(&qualified, kind, child, unit, repo.clone()));
    }
}

/// Filters out members a reader never asked for: private items, hidden
/// items, and compiler/macro-synthesized names.
fn eligible(item: &Item, name: &str) -> bool {
    if !item.is_public() || item.is_doc_hidden() {
        return false;
    }
    !name.starts_with("__")
}

fn last_segment(qualified: &str) -> &str {
    qualified.rsplit("::").next().unwrap_or(qualified)
}

fn build_member(
    qualified: &str,
    kind: SymbolKind,
    item: &Item,
    unit: &SourceUnit,
    repo: Option<Arc<RepoContext>>,
) -> DocMember {
    let (summary, remarks) = split_docs(item.docs.as_deref().unwrap_or(""));
    let name = item
        .name
        .clone()
        .unwrap_or_else(|| last_segment(qualified).to_string());

    let signature = item.function_signature();
    let mut modifiers = vec!["pub".to_string()];
    if let Some(sig) = &signature {
        if sig.is_const {
            modifiers.push("const".to_string());
        }
        if sig.is_async {
            modifiers.push("async".to_string());
        }
        if sig.is_unsafe {
            modifiers.push("unsafe".to_string());
        }
    }

    let decl = SymbolDecl {
        kind,
        modifiers,
        name,
        generics: item.generic_params(),
        signature,
    };
    DocMember::new(
        qualified.to_string(),
        summary,
        remarks,
        decl,
        unit.name.clone(),
        repo,
    )
}

/// Splits raw doc text into the summary paragraph and the rest.
fn split_docs(docs: &str) -> (String, Option<String>) {
    let trimmed = docs.trim();
    if trimmed.is_empty() {
        return (String::new(), None);
    }
    match trimmed.split_once("\n\n") {
        Some((first, rest)) => {
            let rest = rest.trim();
            (
                first.trim().to_string(),
                (!rest.is_empty()).then(|| rest.to_string()),
            )
        }
        None => (trimmed.to_string(), None),
    }
}
