//! Markdown rendering for documentation members.
//!
//! Rendering is pure: the member is never mutated, and the resolved
//! source link is passed in by the caller at response time.

use crate::member::{DocMember, SymbolDecl, SymbolKind};

/// Upper bound on a rendered member block, in characters.
pub const MAX_CONTENT_LEN: usize = 2048;

/// Upper bound on an autocomplete choice name, per the Discord API.
pub const MAX_CHOICE_LEN: usize = 100;

const ELLIPSIS: char = '…';

/// Renders one member to a markdown block:
///
/// heading, summary (with a default when the item is undocumented),
/// optional remarks, the declaration in a fenced code block, and the
/// source link when one is supplied. The result is capped at
/// [`MAX_CONTENT_LEN`].
pub fn render(member: &DocMember, link: Option<&str>) -> String {
    let mut out = String::with_capacity(256);
    out.push_str("## ");
    out.push_str(&member.qualified_name);
    out.push_str("\n### Summary\n");
    if member.summary.is_empty() {
        out.push_str("No summary provided.");
    } else {
        out.push_str(&member.summary);
    }
    if let Some(remarks) = member.remarks.as_deref() {
        out.push_str("\n### Remarks\n");
        out.push_str(remarks);
    }
    out.push_str("\n### Declaration\n```rust\n");
    out.push_str(&format_declaration(&member.decl));
    out.push_str("\n```");
    if let Some(url) = link {
        out.push_str("\nSource: <");
        out.push_str(url);
        out.push('>');
    }
    truncate_ellipsis(&out, MAX_CONTENT_LEN)
}

/// Truncates to at most `max` characters. An over-long input yields
/// exactly `max` characters ending in `…`, cut at a character boundary.
pub fn truncate_ellipsis(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.char_indices().nth(max).is_none() {
        // at most max chars already
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .nth(max - 1)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
    let mut out = String::with_capacity(cut + ELLIPSIS.len_utf8());
    out.push_str(&text[..cut]);
    out.push(ELLIPSIS);
    out
}

/// Formats a declaration line from the extracted symbol description.
pub fn format_declaration(decl: &SymbolDecl) -> String {
    let mut out = String::new();
    for modifier in &decl.modifiers {
        out.push_str(modifier);
        out.push(' ');
    }
    out.push_str(decl.kind.keyword());
    out.push(' ');
    out.push_str(&decl.name);
    if matches!(decl.kind, SymbolKind::Macro) {
        out.push('!');
    }
    if !decl.generics.is_empty() {
        out.push('<');
        out.push_str(&decl.generics.join(", "));
        out.push('>');
    }
    if let Some(sig) = &decl.signature {
        out.push('(');
        let mut first = true;
        for (name, ty) in &sig.inputs {
            if !first {
                out.push_str(", ");
            }
            first = false;
            if name == "self" {
                out.push_str(ty);
            } else {
                out.push_str(name);
                out.push_str(": ");
                out.push_str(ty);
            }
        }
        out.push(')');
        if let Some(ret) = &sig.output {
            out.push_str(" -> ");
            out.push_str(ret);
        }
    }
    out
}
