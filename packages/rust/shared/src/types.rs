//! Core domain types for the Sitetrail navigation graph.
//!
//! The JSON shape of [`Graph`] is the wire/storage contract:
//! `{ "nodes": {..}, "edges": {..}, "transitions": [..] }` with camelCase fields.
//! Every collection defaults to empty so an absent or partial document still
//! deserializes to a usable graph.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// NavSettings
// ---------------------------------------------------------------------------

/// Navigation settings, snapshotted into every recorded transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavSettings {
    /// Nest the opened page directly under the page where the click happened.
    #[serde(default = "default_nesting_enabled")]
    pub nesting_enabled: bool,

    /// Ancestor hops used to promote a page when nesting is off. Always >= 1.
    #[serde(
        default = "default_back_steps",
        deserialize_with = "deserialize_back_steps"
    )]
    pub back_steps: u32,
}

impl NavSettings {
    /// Return a copy with `back_steps` clamped to at least 1.
    pub fn clamped(self) -> Self {
        Self {
            back_steps: self.back_steps.max(1),
            ..self
        }
    }
}

impl Default for NavSettings {
    fn default() -> Self {
        Self {
            nesting_enabled: default_nesting_enabled(),
            back_steps: default_back_steps(),
        }
    }
}

fn default_nesting_enabled() -> bool {
    true
}
fn default_back_steps() -> u32 {
    1
}

/// Read `backSteps` leniently: any number or numeric string is accepted and
/// clamped to `1..=u32::MAX`; anything else counts as 1.
fn deserialize_back_steps<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    };
    Ok(u32::try_from(raw.unwrap_or(1).max(1)).unwrap_or(u32::MAX))
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One distinct visited location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Normalized location key.
    pub url: String,
    /// Best-effort display title.
    #[serde(default)]
    pub title: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default = "default_visit_count")]
    pub visit_count: u64,
}

fn default_visit_count() -> u64 {
    1
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// One immutable ledger entry: a navigation from `from` to `to`, with the
/// settings that were in force when it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub at: DateTime<Utc>,
    #[serde(default = "default_nesting_enabled")]
    pub nesting_enabled: bool,
    #[serde(
        default = "default_back_steps",
        deserialize_with = "deserialize_back_steps"
    )]
    pub back_steps: u32,
}

impl Transition {
    /// Build a transition carrying a snapshot of `settings`.
    pub fn new(from: String, to: String, at: DateTime<Utc>, settings: NavSettings) -> Self {
        let settings = settings.clamped();
        Self {
            from,
            to,
            at,
            nesting_enabled: settings.nesting_enabled,
            back_steps: settings.back_steps,
        }
    }

    /// The settings snapshot recorded with this transition.
    pub fn settings(&self) -> NavSettings {
        NavSettings {
            nesting_enabled: self.nesting_enabled,
            back_steps: self.back_steps,
        }
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Sparse `from -> to -> count` map of observed direct transitions.
pub type EdgeCounts = BTreeMap<String, BTreeMap<String, u64>>;

/// The navigation graph: nodes, edge counts, and the ordered transition ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: BTreeMap<String, Node>,
    #[serde(default)]
    pub edges: EdgeCounts,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl Graph {
    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.transitions.is_empty()
    }

    /// Observed count for the direct edge `from -> to`.
    pub fn edge_count(&self, from: &str, to: &str) -> u64 {
        self.edges
            .get(from)
            .and_then(|targets| targets.get(to))
            .copied()
            .unwrap_or(0)
    }

    /// Summary counts.
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.nodes.len(),
            edges: self.edges.values().map(BTreeMap::len).sum(),
            transitions: self.transitions.len(),
        }
    }
}

/// Node/edge/transition counts for a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub transitions: usize,
}

// ---------------------------------------------------------------------------
// IngestEvent
// ---------------------------------------------------------------------------

/// A raw navigation event as delivered by the capture/relay layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestEvent {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub title: String,
}

impl IngestEvent {
    pub fn new(from: Option<&str>, to: &str, title: &str) -> Self {
        Self {
            from: from.map(String::from),
            to: to.into(),
            title: title.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Forest
// ---------------------------------------------------------------------------

/// Reconstructed sitemap forest. Nodes are referenced by key only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forest {
    pub roots: BTreeSet<String>,
    pub children_of: BTreeMap<String, BTreeSet<String>>,
}

impl Forest {
    /// Children of `key`, in key order. Empty if it has none.
    pub fn children(&self, key: &str) -> impl Iterator<Item = &String> {
        self.children_of.get(key).into_iter().flatten()
    }

    /// Parent of `key` in this forest, if it is attached under one.
    pub fn parent_of(&self, key: &str) -> Option<&str> {
        self.children_of
            .iter()
            .find(|(_, kids)| kids.contains(key))
            .map(|(parent, _)| parent.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults_and_clamp() {
        let s = NavSettings::default();
        assert!(s.nesting_enabled);
        assert_eq!(s.back_steps, 1);

        let s = NavSettings {
            nesting_enabled: false,
            back_steps: 0,
        }
        .clamped();
        assert_eq!(s.back_steps, 1);
        assert!(!s.nesting_enabled);
    }

    #[test]
    fn settings_merge_missing_fields_with_defaults() {
        let s: NavSettings = serde_json::from_str(r#"{"backSteps": 3}"#).expect("parse");
        assert!(s.nesting_enabled);
        assert_eq!(s.back_steps, 3);

        let s: NavSettings = serde_json::from_str("{}").expect("parse");
        assert_eq!(s, NavSettings::default());
    }

    #[test]
    fn back_steps_below_one_are_clamped_on_read() {
        for raw in ["-2", "0", "null", "\"abc\"", "0.5"] {
            let s: NavSettings =
                serde_json::from_str(&format!(r#"{{"backSteps": {raw}}}"#)).expect("parse");
            assert_eq!(s.back_steps, 1, "backSteps {raw}");
        }

        let s: NavSettings = serde_json::from_str(r#"{"backSteps": "3"}"#).expect("parse");
        assert_eq!(s.back_steps, 3);
        let s: NavSettings = serde_json::from_str(r#"{"backSteps": 1e12}"#).expect("parse");
        assert_eq!(s.back_steps, u32::MAX);
    }

    #[test]
    fn empty_document_is_empty_graph() {
        let graph: Graph = serde_json::from_str("{}").expect("parse");
        assert!(graph.is_empty());
        assert_eq!(graph, Graph::default());
    }

    #[test]
    fn graph_uses_camel_case_on_the_wire() {
        let now = Utc::now();
        let mut graph = Graph::default();
        graph.nodes.insert(
            "https://app.example.com/a".into(),
            Node {
                url: "https://app.example.com/a".into(),
                title: "A".into(),
                first_seen: now,
                last_seen: now,
                visit_count: 1,
            },
        );
        graph.transitions.push(Transition::new(
            "https://app.example.com/a".into(),
            "https://app.example.com/b".into(),
            now,
            NavSettings::default(),
        ));

        let json = serde_json::to_string(&graph).expect("serialize");
        assert!(json.contains("\"firstSeen\""));
        assert!(json.contains("\"visitCount\""));
        assert!(json.contains("\"nestingEnabled\""));
        assert!(json.contains("\"backSteps\""));
    }

    #[test]
    fn transition_snapshot_clamps_back_steps() {
        let t = Transition::new(
            "a".into(),
            "b".into(),
            Utc::now(),
            NavSettings {
                nesting_enabled: false,
                back_steps: 0,
            },
        );
        assert_eq!(t.back_steps, 1);
        assert!(!t.settings().nesting_enabled);
    }

    #[test]
    fn event_accepts_null_from_and_missing_title() {
        let e: IngestEvent =
            serde_json::from_str(r#"{"from": null, "to": "https://x.test/"}"#).expect("parse");
        assert_eq!(e.from, None);
        assert_eq!(e.title, "");
    }

    #[test]
    fn stats_count_distinct_edges() {
        let mut graph = Graph::default();
        graph
            .edges
            .entry("a".into())
            .or_default()
            .insert("b".into(), 3);
        graph
            .edges
            .entry("a".into())
            .or_default()
            .insert("c".into(), 1);
        assert_eq!(graph.stats().edges, 2);
        assert_eq!(graph.edge_count("a", "b"), 3);
        assert_eq!(graph.edge_count("b", "a"), 0);
    }

    #[test]
    fn graph_fixture_validates() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/graph.fixture.json")
            .expect("read fixture");
        let graph: Graph = serde_json::from_str(&fixture).expect("deserialize fixture graph");
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.transitions.len(), 3);
        assert!(!graph.transitions[2].nesting_enabled);
        assert_eq!(graph.transitions[2].back_steps, 2);
    }

    #[test]
    fn forest_parent_lookup() {
        let mut forest = Forest::default();
        forest.roots.insert("a".into());
        forest
            .children_of
            .entry("a".into())
            .or_default()
            .insert("b".into());
        assert_eq!(forest.parent_of("b"), Some("a"));
        assert_eq!(forest.parent_of("a"), None);
        assert_eq!(forest.children("a").count(), 1);
        assert_eq!(forest.children("b").count(), 0);
    }
}
