//! Pure merge of one navigation event into a [`Graph`].
//!
//! Persistence lives in [`crate::store`]; this module only mutates the graph
//! value it is handed, so callers decide when a merged graph becomes durable.

use chrono::{DateTime, Utc};
use sitetrail_shared::{Graph, IngestEvent, NavSettings, Node, Transition};

use crate::normalize::{is_location, normalize};
use crate::title::{merge_title, strip_branding};

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The event had no usable target; the graph was not touched.
    Skipped,
    /// The target node was created or updated.
    Recorded {
        /// Normalized target key.
        key: String,
        /// True if the node did not exist before.
        created: bool,
        /// True if an edge and ledger entry were added.
        transition: bool,
    },
}

/// Normalized key for the event target, or `None` if it cannot be recorded.
pub fn target_key(raw_to: &str) -> Option<String> {
    let raw_to = raw_to.trim();
    if raw_to.is_empty() || !is_location(raw_to) {
        return None;
    }
    Some(normalize(raw_to))
}

/// True when `event` would append a ledger entry: its target is usable and
/// its source is a distinct location.
pub fn records_transition(event: &IngestEvent) -> bool {
    target_key(&event.to)
        .and_then(|to| source_key(event.from.as_deref(), &to))
        .is_some()
}

/// Normalized source key, if present and distinct from `to`.
fn source_key(raw_from: Option<&str>, to: &str) -> Option<String> {
    let from = normalize(raw_from?);
    (!from.is_empty() && from != to).then_some(from)
}

/// Merge `event` into `graph` at time `now`.
///
/// `settings` is copied into the ledger entry when the event carries a
/// distinct source location.
pub fn apply(
    graph: &mut Graph,
    event: &IngestEvent,
    settings: NavSettings,
    now: DateTime<Utc>,
) -> IngestOutcome {
    let Some(to) = target_key(&event.to) else {
        return IngestOutcome::Skipped;
    };

    let created = match graph.nodes.get_mut(&to) {
        Some(node) => {
            node.last_seen = node.last_seen.max(now);
            node.visit_count = node.visit_count.saturating_add(1);
            if let Some(title) = merge_title(&node.title, &event.title) {
                node.title = title;
            }
            false
        }
        None => {
            graph.nodes.insert(
                to.clone(),
                Node {
                    url: to.clone(),
                    title: strip_branding(&event.title),
                    first_seen: now,
                    last_seen: now,
                    visit_count: 1,
                },
            );
            true
        }
    };

    let transition = match source_key(event.from.as_deref(), &to) {
        Some(from) => {
            *graph
                .edges
                .entry(from.clone())
                .or_default()
                .entry(to.clone())
                .or_insert(0) += 1;
            graph
                .transitions
                .push(Transition::new(from, to.clone(), now, settings));
            true
        }
        None => false,
    };

    IngestOutcome::Recorded {
        key: to,
        created,
        transition,
    }
}
