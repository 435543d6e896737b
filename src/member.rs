use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use xxhash_rust::xxh64::xxh64;

use crate::github::RepoContext;
use crate::rustdoc::FnSig;

/// Stable member identity: xxh64 of the fully-qualified name.
///
/// Derived purely from the name, so the same symbol keeps the same id
/// across reloads and process restarts. Interaction component values
/// minted before a reload therefore still resolve afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(u64);

impl MemberId {
    pub fn from_name(qualified_name: &str) -> Self {
        Self(xxh64(qualified_name.as_bytes(), 0))
    }

    /// Parses the 16-hex-digit form produced by `Display`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.len() != 16 {
            return None;
        }
        u64::from_str_radix(text, 16).ok().map(Self)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Module,
    Struct,
    Enum,
    Union,
    Trait,
    Function,
    Method,
    Constant,
    Static,
    TypeAlias,
    Macro,
}

impl SymbolKind {
    /// Maps a rustdoc `paths` kind string. Unknown kinds are not indexed.
    pub fn from_kind_str(kind: &str) -> Option<Self> {
        Some(match kind {
            "module" => SymbolKind::Module,
            "struct" => SymbolKind::Struct,
            "enum" => SymbolKind::Enum,
            "union" => SymbolKind::Union,
            "trait" => SymbolKind::Trait,
            "function" | "fn" => SymbolKind::Function,
            "method" => SymbolKind::Method,
            "constant" | "assoc_const" => SymbolKind::Constant,
            "static" => SymbolKind::Static,
            "type_alias" | "typedef" | "assoc_type" => SymbolKind::TypeAlias,
            "macro" | "proc_macro" => SymbolKind::Macro,
            _ => return None,
        })
    }

    /// Kinds that name a source file after themselves, used to pick the
    /// right code-search hit.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            SymbolKind::Struct | SymbolKind::Enum | SymbolKind::Union | SymbolKind::Trait
        )
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SymbolKind::Module => "mod",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Union => "union",
            SymbolKind::Trait => "trait",
            SymbolKind::Function | SymbolKind::Method => "fn",
            SymbolKind::Constant => "const",
            SymbolKind::Static => "static",
            SymbolKind::TypeAlias => "type",
            SymbolKind::Macro => "macro",
        }
    }
}

/// Language-agnostic symbol description, enough for a readable
/// declaration without a full signature printer.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolDecl {
    pub kind: SymbolKind,
    pub modifiers: Vec<String>,
    pub name: String,
    pub generics: Vec<String>,
    pub signature: Option<FnSig>,
}

impl SymbolDecl {
    pub fn plain(kind: SymbolKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            modifiers: vec!["pub".to_string()],
            name: name.into(),
            generics: Vec::new(),
            signature: None,
        }
    }
}

/// One documentable program element.
///
/// Immutable once constructed, except for the lazily-resolved source
/// link, which is computed at most once through the `OnceCell`.
#[derive(Debug)]
pub struct DocMember {
    pub id: MemberId,
    /// Full path including the crate segment, e.g. `gadget::io::Reader`.
    pub qualified_name: String,
    /// Path without the crate segment; what lookups match against.
    pub display_name: String,
    /// First doc paragraph. Empty when the item is undocumented.
    pub summary: String,
    /// Doc paragraphs past the first.
    pub remarks: Option<String>,
    pub decl: SymbolDecl,
    /// Crate the member came from.
    pub unit: String,
    /// Repository pin captured when the unit was loaded, if one could be
    /// determined.
    pub repo: Option<Arc<RepoContext>>,
    link: OnceCell<Option<String>>,
}

impl DocMember {
    pub fn new(
        qualified_name: String,
        summary: String,
        remarks: Option<String>,
        decl: SymbolDecl,
        unit: String,
        repo: Option<Arc<RepoContext>>,
    ) -> Self {
        let display_name = display_from_qualified(&qualified_name);
        Self {
            id: MemberId::from_name(&qualified_name),
            qualified_name,
            display_name,
            summary,
            remarks,
            decl,
            unit,
            repo,
            link: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> SymbolKind {
        self.decl.kind
    }

    /// Resolved source link, computing it on first access. `resolve` runs
    /// at most once per member; concurrent callers share the in-flight
    /// computation.
    pub async fn source_link<F, Fut>(&self, resolve: F) -> Option<&str>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Option<String>>,
    {
        self.link.get_or_init(resolve).await.as_deref()
    }

    /// The link if it has already been resolved, without triggering
    /// resolution.
    pub fn cached_link(&self) -> Option<&str> {
        self.link.get().and_then(|l| l.as_deref())
    }
}

/// Strips the crate segment from a qualified path: `gadget::io::Reader`
/// becomes `io::Reader`. Single-segment paths (the crate root) are kept
/// as-is.
fn display_from_qualified(qualified: &str) -> String {
    match qualified.split_once("::") {
        Some((_, rest)) => rest.to_string(),
        None => qualified.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_member(name: &str) -> DocMember {
        DocMember::new(
            name.to_string(),
            "Does things.".to_string(),
            None,
            SymbolDecl::plain(SymbolKind::Function, name.rsplit("::").next().unwrap()),
            "gadget".to_string(),
            None,
        )
    }

    #[test]
    fn id_is_stable_across_constructions() {
        let a = sample_member("gadget::Widget::render");
        let b = sample_member("gadget::Widget::render");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.to_string(), b.id.to_string());
    }

    #[test]
    fn id_differs_for_different_names() {
        let a = MemberId::from_name("gadget::Widget::render");
        let b = MemberId::from_name("gadget::Widget::resize");
        assert_ne!(a, b);
    }

    #[test]
    fn id_round_trips_through_display() {
        let id = MemberId::from_name("gadget::Widget");
        let parsed = MemberId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn id_parse_rejects_garbage() {
        assert!(MemberId::parse("not-hex").is_none());
        assert!(MemberId::parse("abcd").is_none());
        assert!(MemberId::parse("").is_none());
        // 17 digits
        assert!(MemberId::parse("00000000000000000").is_none());
    }

    #[test]
    fn display_name_drops_crate_segment() {
        let member = sample_member("gadget::io::Reader");
        assert_eq!(member.display_name, "io::Reader");

        let root = sample_member("gadget");
        assert_eq!(root.display_name, "gadget");
    }

    #[tokio::test]
    async fn source_link_resolves_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let member = sample_member("gadget::Widget::render");
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let link = member
                .source_link(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some("https://example.com/widget.rs".to_string())
                })
                .await;
            assert_eq!(link, Some("https://example.com/widget.rs"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(member.cached_link(), Some("https://example.com/widget.rs"));
    }

    #[tokio::test]
    async fn failed_resolution_is_memoized_too() {
        let member = sample_member("gadget::Widget::render");
        assert_eq!(member.source_link(|| async { None }).await, None);
        // a later successful resolver must not run
        let link = member
            .source_link(|| async { Some("late".to_string()) })
            .await;
        assert_eq!(link, None);
    }
}
