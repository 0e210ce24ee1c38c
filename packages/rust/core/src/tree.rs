//! Sitemap tree reconstruction.
//!
//! Replays the transition ledger in time order over a flat set of nodes and
//! collapses it into a [`Forest`]. Each transition reparents its target under
//! an *attach parent*:
//! - nesting enabled: the page the navigation started from;
//! - nesting disabled: the ancestor `back_steps` hops above that page in the
//!   tree as it stands at that point of the replay, or a root if the chain
//!   is shorter.
//!
//! The latest transition for a target wins. The function is pure: the graph
//! is only read, and the same graph always yields the same forest.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use sitetrail_shared::{Forest, Graph, Transition};
use tracing::{debug, instrument};

use crate::normalize::normalize;

/// Build the sitemap forest for `graph`.
#[instrument(skip_all, fields(nodes = graph.nodes.len(), transitions = graph.transitions.len()))]
pub fn build(graph: &Graph) -> Forest {
    let mut replay = Replay::default();

    for key in graph.nodes.keys() {
        let key = normalize(key);
        if !key.is_empty() {
            replay.roots.insert(key);
        }
    }

    // Stable sort: equal timestamps keep ledger order.
    let mut ordered: Vec<&Transition> = graph.transitions.iter().collect();
    ordered.sort_by_key(|t| t.at);

    for t in ordered {
        replay.apply(t);
    }

    replay.finish()
}

#[derive(Default)]
struct Replay {
    /// `None` marks a registered root.
    parent_of: HashMap<String, Option<String>>,
    children_of: BTreeMap<String, BTreeSet<String>>,
    roots: BTreeSet<String>,
}

impl Replay {
    fn apply(&mut self, t: &Transition) {
        let from = normalize(&t.from);
        let to = normalize(&t.to);
        if from.is_empty() || to.is_empty() || from == to {
            return;
        }

        for key in [&from, &to] {
            if !self.parent_of.contains_key(key) {
                self.set_parent(key, None);
            }
        }

        let attach = if t.nesting_enabled {
            Some(from)
        } else {
            self.ancestor(&from, t.back_steps.max(1))
        };

        if attach.as_deref() == Some(to.as_str()) {
            debug!(%to, "skipping transition that would parent a page under itself");
            return;
        }

        self.set_parent(&to, attach);
    }

    /// Walk `steps` hops up from `key`; `None` if a root is reached first.
    fn ancestor(&self, key: &str, steps: u32) -> Option<String> {
        let mut current = key;
        for _ in 0..steps {
            match self.parent_of.get(current) {
                Some(Some(parent)) => current = parent.as_str(),
                _ => return None,
            }
        }
        Some(current.to_string())
    }

    fn set_parent(&mut self, child: &str, parent: Option<String>) {
        match self.parent_of.get(child) {
            Some(Some(old)) => {
                if let Some(kids) = self.children_of.get_mut(old) {
                    kids.remove(child);
                }
            }
            Some(None) => {
                self.roots.remove(child);
            }
            None => {}
        }

        match parent {
            None => {
                self.roots.insert(child.to_string());
                self.parent_of.insert(child.to_string(), None);
            }
            Some(parent) => {
                self.roots.remove(child);
                self.children_of
                    .entry(parent.clone())
                    .or_default()
                    .insert(child.to_string());
                self.parent_of.insert(child.to_string(), Some(parent));
            }
        }
    }

    fn finish(mut self) -> Forest {
        self.children_of.retain(|_, kids| !kids.is_empty());

        for kids in self.children_of.values() {
            for kid in kids {
                self.roots.remove(kid);
            }
        }

        if self.roots.is_empty() {
            // Every key sits inside a parent cycle: show each parent as an entry point.
            debug!(
                parents = self.children_of.len(),
                "replay left no roots, falling back to parent keys"
            );
            self.roots = self.children_of.keys().cloned().collect();
        } else {
            self.detach_unreachable_cycles();
        }

        Forest {
            roots: self.roots,
            children_of: self.children_of,
        }
    }

    /// Break parent cycles that no root can reach, so every key stays displayable.
    ///
    /// Unreachable keys are visited in key order. For each one still
    /// unreachable, its parent chain is followed into the cycle it hangs from,
    /// and the smallest key on that cycle is detached and promoted to a root.
    /// Keys below the cycle keep their parents.
    fn detach_unreachable_cycles(&mut self) {
        let mut reachable = BTreeSet::new();
        let seeds: Vec<String> = self.roots.iter().cloned().collect();
        self.mark_reachable(seeds, &mut reachable);

        let all_keys: BTreeSet<String> = self
            .parent_of
            .keys()
            .cloned()
            .chain(self.children_of.keys().cloned())
            .collect();

        for key in all_keys {
            if reachable.contains(&key) {
                continue;
            }
            let entry = self.cycle_entry(&key);
            debug!(%key, %entry, "breaking unreachable parent cycle");
            if let Some(Some(parent)) = self.parent_of.get(&entry) {
                if let Some(kids) = self.children_of.get_mut(parent) {
                    kids.remove(&entry);
                }
            }
            self.parent_of.insert(entry.clone(), None);
            self.roots.insert(entry.clone());
            self.mark_reachable(vec![entry], &mut reachable);
        }

        self.children_of.retain(|_, kids| !kids.is_empty());
    }

    /// Smallest key on the parent cycle above `start`.
    ///
    /// If the chain ends without repeating, the last key on it is returned.
    fn cycle_entry(&self, start: &str) -> String {
        let mut path: Vec<&str> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut current = start;
        loop {
            if let Some(&at) = position.get(current) {
                return path[at..]
                    .iter()
                    .min()
                    .map(|k| (*k).to_string())
                    .unwrap_or_else(|| current.to_string());
            }
            position.insert(current, path.len());
            path.push(current);
            match self.parent_of.get(current) {
                Some(Some(parent)) => current = parent.as_str(),
                _ => return current.to_string(),
            }
        }
    }

    fn mark_reachable(&self, seeds: Vec<String>, reachable: &mut BTreeSet<String>) {
        let mut queue: VecDeque<String> = seeds.into();
        while let Some(key) = queue.pop_front() {
            if !reachable.insert(key.clone()) {
                continue;
            }
            if let Some(kids) = self.children_of.get(&key) {
                queue.extend(kids.iter().cloned());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use sitetrail_shared::{NavSettings, Node};

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn node(key: &str) -> Node {
        Node {
            url: key.into(),
            title: String::new(),
            first_seen: base_time(),
            last_seen: base_time(),
            visit_count: 1,
        }
    }

    /// Graph with nodes `keys` and transitions `(from, to, nesting, back_steps, second)`.
    fn graph(keys: &[&str], transitions: &[(&str, &str, bool, u32, i64)]) -> Graph {
        let mut g = Graph::default();
        for k in keys {
            g.nodes.insert((*k).into(), node(k));
        }
        for (from, to, nesting, back_steps, second) in transitions {
            g.transitions.push(Transition::new(
                (*from).into(),
                (*to).into(),
                base_time() + Duration::seconds(*second),
                NavSettings {
                    nesting_enabled: *nesting,
                    back_steps: *back_steps,
                },
            ));
        }
        g
    }

    fn set(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| (*k).to_string()).collect()
    }

    fn kids(forest: &Forest, key: &str) -> Vec<String> {
        forest.children(key).cloned().collect()
    }

    #[test]
    fn no_transitions_means_all_roots() {
        let g = graph(&["a", "b", "c"], &[]);
        let forest = build(&g);
        assert_eq!(forest.roots, set(&["a", "b", "c"]));
        assert!(forest.children_of.is_empty());
    }

    #[test]
    fn nesting_chain() {
        let g = graph(
            &["a", "b", "c"],
            &[("a", "b", true, 1, 1), ("b", "c", true, 1, 2)],
        );
        let forest = build(&g);
        assert_eq!(forest.roots, set(&["a"]));
        assert_eq!(kids(&forest, "a"), vec!["b"]);
        assert_eq!(kids(&forest, "b"), vec!["c"]);
        assert!(kids(&forest, "c").is_empty());
    }

    #[test]
    fn promotion_walks_current_ancestors() {
        let g = graph(
            &["a", "b", "c", "d"],
            &[
                ("a", "b", true, 1, 1),
                ("b", "c", true, 1, 2),
                ("c", "d", false, 2, 3),
            ],
        );
        let forest = build(&g);
        assert_eq!(forest.roots, set(&["a"]));
        assert_eq!(forest.children_of["a"], set(&["b", "d"]));
        assert_eq!(kids(&forest, "b"), vec!["c"]);
        assert_eq!(forest.parent_of("d"), Some("a"));
    }

    #[test]
    fn promotion_past_root_attaches_to_root() {
        let g = graph(
            &["a", "b", "c"],
            &[("a", "b", true, 1, 1), ("b", "c", false, 5, 2)],
        );
        let forest = build(&g);
        assert_eq!(forest.roots, set(&["a", "c"]));
        assert_eq!(kids(&forest, "a"), vec!["b"]);
    }

    #[test]
    fn single_step_promotion_makes_sibling() {
        let g = graph(
            &["a", "b", "c"],
            &[("a", "b", true, 1, 1), ("b", "c", false, 1, 2)],
        );
        let forest = build(&g);
        assert_eq!(forest.children_of["a"], set(&["b", "c"]));
    }

    #[test]
    fn cycle_guard_keeps_existing_parent() {
        let g = graph(
            &["x", "y", "z"],
            &[
                ("x", "y", true, 1, 1),
                ("y", "z", true, 1, 2),
                // Walking 1 hop up from z gives y: the target itself.
                ("z", "y", false, 1, 3),
            ],
        );
        let forest = build(&g);
        assert_eq!(forest.parent_of("y"), Some("x"));
        assert_eq!(forest.parent_of("z"), Some("y"));
        assert_eq!(forest.roots, set(&["x"]));
    }

    #[test]
    fn latest_transition_wins() {
        let g = graph(
            &["a", "b", "c"],
            &[("a", "c", true, 1, 1), ("b", "c", true, 1, 2)],
        );
        let forest = build(&g);
        assert_eq!(forest.parent_of("c"), Some("b"));
        assert!(kids(&forest, "a").is_empty());
        assert!(!forest.children_of.contains_key("a"));
        assert_eq!(forest.roots, set(&["a", "b"]));
    }

    #[test]
    fn replay_follows_timestamps_not_ledger_order() {
        let g = graph(
            &["a", "b", "c"],
            &[("b", "c", true, 1, 5), ("a", "c", true, 1, 1)],
        );
        let forest = build(&g);
        assert_eq!(forest.parent_of("c"), Some("b"));
    }

    #[test]
    fn equal_timestamps_keep_ledger_order() {
        let g = graph(
            &["a", "b", "c"],
            &[("a", "c", true, 1, 1), ("b", "c", true, 1, 1)],
        );
        assert_eq!(build(&g).parent_of("c"), Some("b"));

        let g = graph(
            &["a", "b", "c"],
            &[("b", "c", true, 1, 1), ("a", "c", true, 1, 1)],
        );
        assert_eq!(build(&g).parent_of("c"), Some("a"));
    }

    #[test]
    fn snapshot_per_transition_not_current_settings() {
        // Same pair of clicks, but the second one was recorded with nesting off.
        let g = graph(
            &["a", "b", "c"],
            &[("a", "b", true, 1, 1), ("b", "c", false, 1, 2)],
        );
        let forest = build(&g);
        assert_eq!(forest.parent_of("c"), Some("a"));
    }

    #[test]
    fn skips_self_and_empty_transitions() {
        let mut g = graph(&["a", "b"], &[("a", "a", true, 1, 1)]);
        g.transitions.push(Transition::new(
            String::new(),
            "b".into(),
            base_time(),
            NavSettings::default(),
        ));
        let forest = build(&g);
        assert_eq!(forest.roots, set(&["a", "b"]));
        assert!(forest.children_of.is_empty());
    }

    #[test]
    fn keys_are_normalized_during_replay() {
        let g = graph(
            &["https://app.example.com/a", "https://app.example.com/b"],
            &[(
                "https://app.example.com/a#top",
                "https://app.example.com/b#x",
                true,
                1,
                1,
            )],
        );
        let forest = build(&g);
        assert_eq!(forest.roots, set(&["https://app.example.com/a"]));
        assert_eq!(
            forest.parent_of("https://app.example.com/b"),
            Some("https://app.example.com/a")
        );
    }

    #[test]
    fn transition_only_keys_are_covered() {
        let g = graph(&["b"], &[("a", "b", true, 1, 1)]);
        let forest = build(&g);
        assert_eq!(forest.roots, set(&["a"]));
        assert_eq!(kids(&forest, "a"), vec!["b"]);
    }

    #[test]
    fn pure_cycle_falls_back_to_parent_keys() {
        let g = graph(&["a", "b"], &[("a", "b", true, 1, 1), ("b", "a", true, 1, 2)]);
        let forest = build(&g);
        // a is under b and b is under a; both become entry points.
        assert_eq!(forest.roots, set(&["a", "b"]));
        assert_eq!(kids(&forest, "a"), vec!["b"]);
        assert_eq!(kids(&forest, "b"), vec!["a"]);
    }

    #[test]
    fn detached_cycle_is_broken_when_other_roots_exist() {
        let g = graph(
            &["a", "b", "r"],
            &[("a", "b", true, 1, 1), ("b", "a", true, 1, 2)],
        );
        let forest = build(&g);
        // r is a root; the a<->b cycle is broken at "a".
        assert_eq!(forest.roots, set(&["a", "r"]));
        assert_eq!(kids(&forest, "a"), vec!["b"]);
        assert!(kids(&forest, "b").is_empty());
    }

    #[test]
    fn cycle_repair_keeps_tail_under_its_parent() {
        // n and m parent each other; c hangs below n and must stay there.
        let g = graph(
            &["c", "m", "n", "r"],
            &[
                ("m", "n", true, 1, 1),
                ("n", "c", true, 1, 2),
                ("n", "m", true, 1, 3),
            ],
        );
        let forest = build(&g);
        assert_eq!(forest.roots, set(&["m", "r"]));
        assert_eq!(forest.parent_of("c"), Some("n"));
        assert_eq!(forest.parent_of("n"), Some("m"));
        assert_eq!(forest.parent_of("m"), None);
    }

    #[test]
    fn forest_covers_every_node() {
        let g = graph(
            &["a", "b", "c", "d", "e"],
            &[
                ("a", "b", true, 1, 1),
                ("b", "c", true, 1, 2),
                ("c", "a", true, 1, 3),
                ("d", "e", false, 3, 4),
            ],
        );
        let forest = build(&g);
        let mut seen = BTreeSet::new();
        let mut stack: Vec<String> = forest.roots.iter().cloned().collect();
        while let Some(k) = stack.pop() {
            if seen.insert(k.clone()) {
                stack.extend(forest.children(&k).cloned());
            }
        }
        for key in g.nodes.keys() {
            assert!(seen.contains(key), "{key} not reachable");
        }
    }

    #[test]
    fn build_is_deterministic() {
        let g = graph(
            &["a", "b", "c", "d"],
            &[
                ("a", "b", true, 1, 1),
                ("b", "c", true, 1, 1),
                ("c", "d", false, 2, 2),
                ("d", "b", true, 1, 3),
            ],
        );
        let first = build(&g);
        let second = build(&g);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn fixture_graph_reconstructs() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/graph.fixture.json")
            .expect("read fixture");
        let g: Graph = serde_json::from_str(&fixture).expect("deserialize fixture");
        let forest = build(&g);
        assert_eq!(forest.roots, set(&["https://app.example.com/"]));
        assert_eq!(
            forest.children_of["https://app.example.com/"],
            set(&[
                "https://app.example.com/billing",
                "https://app.example.com/projects"
            ])
        );
        assert_eq!(
            forest.parent_of("https://app.example.com/projects/42"),
            Some("https://app.example.com/projects")
        );
    }
}
