//! Outline rendering for a reconstructed [`Forest`].
//!
//! Turns the key-only forest into a flat, pre-ordered list of labelled
//! [`OutlineEntry`] rows and a plain-text indented outline. Labels look like
//! `"Billing - /settings/billing"`.
//!
//! Traversal uses an explicit stack, so arbitrarily deep navigation chains
//! render without growing the call stack.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use sitetrail_shared::{Forest, Node};

use crate::normalize::{display_path, normalize};

/// Label used for nodes without a stored title.
const UNTITLED: &str = "Untitled Page";

/// One labelled outline row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    /// Normalized location key.
    pub url: String,
    /// Display label.
    pub label: String,
    /// Nesting level; roots are at 0.
    pub depth: usize,
}

/// Build the display label for `url`, looking the node up by raw and normalized key.
pub fn label_for(url: &str, nodes: &BTreeMap<String, Node>, width: usize) -> String {
    let title = nodes
        .get(url)
        .or_else(|| nodes.get(&normalize(url)))
        .map(|n| n.title.trim())
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED);
    format!("{title} - {}", display_path(url, width))
}

/// Build outline rows for `forest` in pre-order, siblings sorted by label.
///
/// A key already on the current branch is emitted as a leaf, so cyclic
/// child maps still terminate.
pub fn entries(forest: &Forest, nodes: &BTreeMap<String, Node>, width: usize) -> Vec<OutlineEntry> {
    let mut out = Vec::new();
    let mut pending = level(forest.roots.iter(), 0, nodes, width);
    let mut branch: Vec<String> = Vec::new();
    let mut on_branch: HashSet<String> = HashSet::new();

    while let Some(entry) = pending.pop() {
        while branch.len() > entry.depth {
            if let Some(key) = branch.pop() {
                on_branch.remove(&key);
            }
        }

        if on_branch.insert(entry.url.clone()) {
            branch.push(entry.url.clone());
            pending.extend(level(forest.children(&entry.url), entry.depth + 1, nodes, width));
        }
        out.push(entry);
    }
    out
}

/// Labelled siblings at `depth`, in reverse display order for a pop-based stack.
fn level<'a>(
    keys: impl Iterator<Item = &'a String>,
    depth: usize,
    nodes: &BTreeMap<String, Node>,
    width: usize,
) -> Vec<OutlineEntry> {
    let mut rows: Vec<OutlineEntry> = keys
        .map(|url| OutlineEntry {
            url: url.clone(),
            label: label_for(url, nodes, width),
            depth,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.label
            .to_lowercase()
            .cmp(&a.label.to_lowercase())
            .then_with(|| b.url.cmp(&a.url))
    });
    rows
}

/// Render `entries` as an indented text outline, one entry per line.
pub fn render_text(entries: &[OutlineEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        out.push_str(&"  ".repeat(e.depth));
        out.push_str("- ");
        out.push_str(&e.label);
        out.push('\n');
    }
    out
}
