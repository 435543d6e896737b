//! Tolerant reader for rustdoc JSON artifacts.
//!
//! The rustdoc JSON format shifts between toolchain releases (item ids and
//! the `inner` encoding in particular), so everything here reads through
//! `serde_json::Value` accessors instead of a pinned schema. Only the
//! handful of fields the extractor needs are modeled.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DocdexError, Result};

/// One parsed rustdoc JSON document.
#[derive(Debug, Deserialize)]
pub struct DocArtifact {
    #[serde(default)]
    pub format_version: u32,
    #[serde(default)]
    pub crate_version: Option<String>,
    #[serde(default)]
    pub index: HashMap<String, Item>,
    #[serde(default)]
    pub paths: HashMap<String, ItemSummary>,
}

/// Entry in the artifact's `paths` table: the addressable item surface.
#[derive(Debug, Deserialize)]
pub struct ItemSummary {
    #[serde(default)]
    pub crate_id: i64,
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub docs: Option<String>,
    #[serde(default)]
    pub visibility: Option<Value>,
    #[serde(default)]
    pub attrs: Vec<Value>,
    /// Older artifacts carry an explicit `kind` field; newer ones encode
    /// the kind as the single key of `inner`.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub inner: Value,
}

impl DocArtifact {
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| DocdexError::ArtifactParse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.index.get(id)
    }

    /// Path entries belonging to the documented crate itself (`crate_id`
    /// zero), i.e. the exported item surface.
    pub fn local_entries(&self) -> impl Iterator<Item = (&str, &ItemSummary)> {
        self.paths
            .iter()
            .filter(|(_, summary)| summary.crate_id == 0)
            .map(|(id, summary)| (id.as_str(), summary))
    }
}

impl Item {
    /// Item kind as a lowercase string, from whichever encoding the
    /// artifact uses.
    pub fn kind(&self) -> Option<&str> {
        if let Some(kind) = self.kind.as_deref() {
            return Some(kind);
        }
        self.inner
            .as_object()
            .and_then(|map| map.keys().next())
            .map(|k| k.as_str())
    }

    /// Payload of `inner` for this item's kind.
    fn payload(&self) -> Option<&Value> {
        match self.inner.as_object() {
            Some(map) if self.kind.is_none() => map.values().next(),
            _ if !self.inner.is_null() => Some(&self.inner),
            _ => None,
        }
    }

    pub fn is_public(&self) -> bool {
        match self.visibility.as_ref().and_then(Value::as_str) {
            Some("public") | Some("default") => true,
            Some(_) => false,
            // restricted visibility serializes as an object; anything
            // else (or a missing field) is treated as exported
            None => self
                .visibility
                .as_ref()
                .map(|v| !v.is_object())
                .unwrap_or(true),
        }
    }

    pub fn is_doc_hidden(&self) -> bool {
        self.attrs.iter().any(|attr| {
            attr.as_str()
                .map(|s| s.contains("doc(hidden)"))
                .unwrap_or(false)
        })
    }

    /// Ids of a child array (`impls` on a type, `items` on a trait or
    /// impl block), normalized to strings.
    pub fn child_ids(&self, field: &str) -> Vec<String> {
        self.payload()
            .and_then(|p| p.get(field))
            .and_then(Value::as_array)
            .map(|ids| ids.iter().map(id_key).collect())
            .unwrap_or_default()
    }

    /// For an impl block: the trait being implemented, if any.
    pub fn impl_trait(&self) -> Option<&Value> {
        self.payload()
            .and_then(|p| p.get("trait"))
            .filter(|v| !v.is_null())
    }

    pub fn function_signature(&self) -> Option<FnSig> {
        let payload = self.payload()?;
        let decl = payload.get("sig").or_else(|| payload.get("decl"))?;
        let inputs = decl
            .get("inputs")
            .and_then(Value::as_array)
            .map(|pairs| {
                pairs
                    .iter()
                    .filter_map(|pair| {
                        let parts = pair.as_array()?;
                        let name = parts.first()?.as_str()?.to_string();
                        let ty = shallow_type(parts.get(1).unwrap_or(&Value::Null));
                        Some((name, ty))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let output = decl
            .get("output")
            .filter(|v| !v.is_null())
            .map(shallow_type);
        let header = payload.get("header");
        let flag = |name: &str, legacy: &str| {
            header
                .and_then(|h| h.get(name).or_else(|| h.get(legacy)))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        Some(FnSig {
            inputs,
            output,
            is_async: flag("is_async", "async"),
            is_const: flag("is_const", "const"),
            is_unsafe: flag("is_unsafe", "unsafe"),
        })
    }

    /// Generic parameter names, lifetimes excluded.
    pub fn generic_params(&self) -> Vec<String> {
        self.payload()
            .and_then(|p| p.get("generics"))
            .and_then(|g| g.get("params"))
            .and_then(Value::as_array)
            .map(|params| {
                params
                    .iter()
                    .filter_map(|param| {
                        let name = param.get("name")?.as_str()?;
                        if name.starts_with('\'') {
                            None
                        } else {
                            Some(name.to_string())
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Function signature in plain-text form, ready for declaration
/// formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct FnSig {
    pub inputs: Vec<(String, String)>,
    pub output: Option<String>,
    pub is_async: bool,
    pub is_const: bool,
    pub is_unsafe: bool,
}

/// Normalizes an id reference (integer in newer artifacts, string in
/// older ones) to the string form used as `index` keys.
pub fn id_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        // some releases wrap ids as {"id": N}
        Value::Object(map) => map.get("id").map(id_key).unwrap_or_default(),
        _ => String::new(),
    }
}

const TYPE_DEPTH_LIMIT: usize = 3;

/// Plain-text name for a rustdoc type value. Deliberately shallow: enough
/// for a readable declaration, nowhere near a full type printer.
pub fn shallow_type(value: &Value) -> String {
    shallow_type_inner(value, 0)
}

fn shallow_type_inner(value: &Value, depth: usize) -> String {
    if depth > TYPE_DEPTH_LIMIT {
        return "_".to_string();
    }
    let obj = match value {
        Value::String(s) => return s.clone(),
        Value::Object(map) => map,
        _ => return "_".to_string(),
    };

    if let Some(name) = obj.get("primitive").and_then(Value::as_str) {
        return name.to_string();
    }
    if let Some(name) = obj.get("generic").and_then(Value::as_str) {
        return name.to_string();
    }
    if let Some(path) = obj.get("resolved_path") {
        let name = path
            .get("name")
            .or_else(|| path.get("path"))
            .and_then(Value::as_str)
            .unwrap_or("_");
        let args = path
            .get("args")
            .and_then(|a| a.get("angle_bracketed"))
            .and_then(|a| a.get("args"))
            .and_then(Value::as_array)
            .map(|args| {
                args.iter()
                    .filter_map(|arg| arg.get("type"))
                    .map(|t| shallow_type_inner(t, depth + 1))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        return if args.is_empty() {
            name.to_string()
        } else {
            format!("{}<{}>", name, args.join(", "))
        };
    }
    if let Some(reference) = obj.get("borrowed_ref") {
        let inner = reference
            .get("type")
            .map(|t| shallow_type_inner(t, depth + 1))
            .unwrap_or_else(|| "_".to_string());
        let mutable = reference
            .get("is_mutable")
            .or_else(|| reference.get("mutable"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        return if mutable {
            format!("&mut {inner}")
        } else {
            format!("&{inner}")
        };
    }
    if let Some(pointer) = obj.get("raw_pointer") {
        let inner = pointer
            .get("type")
            .map(|t| shallow_type_inner(t, depth + 1))
            .unwrap_or_else(|| "_".to_string());
        let mutable = pointer
            .get("is_mutable")
            .or_else(|| pointer.get("mutable"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        return if mutable {
            format!("*mut {inner}")
        } else {
            format!("*const {inner}")
        };
    }
    if let Some(element) = obj.get("slice") {
        return format!("[{}]", shallow_type_inner(element, depth + 1));
    }
    if let Some(array) = obj.get("array") {
        let element = array
            .get("type")
            .map(|t| shallow_type_inner(t, depth + 1))
            .unwrap_or_else(|| "_".to_string());
        let len = array.get("len").and_then(Value::as_str).unwrap_or("_");
        return format!("[{element}; {len}]");
    }
    if let Some(elements) = obj.get("tuple").and_then(Value::as_array) {
        let parts: Vec<_> = elements
            .iter()
            .map(|t| shallow_type_inner(t, depth + 1))
            .collect();
        return format!("({})", parts.join(", "));
    }
    if let Some(bounds) = obj.get("impl_trait").and_then(Value::as_array) {
        let name = bounds
            .iter()
            .filter_map(|bound| bound.get("trait_bound"))
            .filter_map(|b| b.get("trait"))
            .filter_map(|t| {
                t.get("name")
                    .or_else(|| t.get("path"))
                    .and_then(Value::as_str)
            })
            .next()
            .unwrap_or("_");
        return format!("impl {name}");
    }
    if let Some(qualified) = obj.get("qualified_path") {
        if let Some(name) = qualified.get("name").and_then(Value::as_str) {
            return format!("Self::{name}");
        }
    }
    if obj.contains_key("function_pointer") {
        return "fn(..)".to_string();
    }
    "_".to_string()
}
