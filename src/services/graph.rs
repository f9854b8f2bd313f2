// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::AppError;
use crate::domain::types::{NodeAvailabilitySnapshot, ScoredNode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

/// Snapshot of externally scored network nodes, replaced wholesale on each fetch.
#[derive(Debug, Default)]
pub struct NodeGraphCache {
    nodes: HashMap<String, ScoredNode>,
    fetched_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiscoveredNode {
    pub pub_key: String,
    pub alias: String,
    pub score: f64,
    pub total_capacity: Option<u64>,
    pub total_peers: Option<u64>,
    pub addresses: Vec<Value>,
    pub depth: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct RankedNode {
    pub rank: usize,
    pub pub_key: String,
    pub alias: String,
    pub score: f64,
    pub total_capacity: Option<u64>,
    pub total_peers: Option<u64>,
    pub centrality: Option<f64>,
    pub addresses: Vec<Value>,
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

impl NodeGraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, nodes: HashMap<String, ScoredNode>) {
        self.nodes = nodes;
        self.fetched_at = Some(Utc::now());
    }

    pub fn replace_from(&mut self, snapshot: &NodeAvailabilitySnapshot) {
        self.replace(snapshot.scored.clone());
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn get(&self, pubkey: &str) -> Option<&ScoredNode> {
        self.nodes.get(pubkey)
    }

    /// Highest scores first; ties ordered by pubkey.
    pub fn top_by_score(&self, limit: usize) -> Vec<RankedNode> {
        let mut ranked: Vec<(&String, &ScoredNode)> = self.nodes.iter().collect();
        ranked.sort_by(|(ka, a), (kb, b)| by_score_desc(a.score, b.score).then_with(|| ka.cmp(kb)));
        ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (pub_key, node))| RankedNode {
                rank: i + 1,
                pub_key: pub_key.clone(),
                alias: node.alias.clone().unwrap_or_else(|| "N/A".to_string()),
                score: node.score,
                total_capacity: node.total_capacity,
                total_peers: node.total_peers,
                centrality: node.centrality,
                addresses: node.addresses.clone(),
            })
            .collect()
    }

    /// Breadth-first walk over stable peers, starting at `start`.
    ///
    /// Each node is visited at most once. At most `peers_per_level` unvisited
    /// known peers are queued per expanded node and nothing beyond `max_depth`
    /// is expanded, so the walk terminates on cyclic graphs.
    pub fn explore(
        &self,
        start: &str,
        max_depth: usize,
        peers_per_level: usize,
    ) -> Result<Vec<DiscoveredNode>, AppError> {
        if self.nodes.is_empty() {
            return Err(AppError::NotFound(
                "Node availability data is not loaded. Call get_node_availability_data first."
                    .to_string(),
            ));
        }
        if !self.nodes.contains_key(start) {
            return Err(AppError::NotFound(format!(
                "Node {start} is not present in the node availability data."
            )));
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(start, 0)]);
        let mut discovered = Vec::new();

        while let Some((pubkey, depth)) = queue.pop_front() {
            if !visited.insert(pubkey) {
                continue;
            }
            let Some(node) = self.nodes.get(pubkey) else {
                continue;
            };
            discovered.push(DiscoveredNode {
                pub_key: pubkey.to_string(),
                alias: node.alias.clone().unwrap_or_else(|| "N/A".to_string()),
                score: node.score,
                total_capacity: node.total_capacity,
                total_peers: node.total_peers,
                addresses: node.addresses.clone(),
                depth,
            });

            if depth >= max_depth {
                continue;
            }
            let mut seen_here: HashSet<&str> = HashSet::new();
            let next = node
                .stable_inbound_peers
                .iter()
                .chain(node.stable_outbound_peers.iter())
                .map(String::as_str)
                .filter(|peer| seen_here.insert(*peer))
                .filter(|peer| !visited.contains(peer) && self.nodes.contains_key(*peer))
                .take(peers_per_level)
                .collect::<Vec<_>>();
            queue.extend(next.into_iter().map(|peer| (peer, depth + 1)));
        }

        discovered.sort_by(|a, b| {
            by_score_desc(a.score, b.score)
                .then_with(|| a.depth.cmp(&b.depth))
                .then_with(|| a.pub_key.cmp(&b.pub_key))
        });
        tracing::debug!(
            target: "liquidity",
            start,
            nodes = discovered.len(),
            max_depth,
            "peer network explored"
        );
        Ok(discovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(score: f64, inbound: &[&str], outbound: &[&str]) -> ScoredNode {
        ScoredNode {
            alias: Some(format!("n{score}")),
            score,
            stable_inbound_peers: inbound.iter().map(|s| s.to_string()).collect(),
            stable_outbound_peers: outbound.iter().map(|s| s.to_string()).collect(),
            ..ScoredNode::default()
        }
    }

    fn cache(entries: Vec<(&str, ScoredNode)>) -> NodeGraphCache {
        let mut cache = NodeGraphCache::new();
        cache.replace(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        );
        cache
    }

    #[test]
    fn empty_cache_is_not_found() {
        let err = NodeGraphCache::new().explore("a", 3, 3).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn cycle_terminates_and_visits_each_node_once() {
        let graph = cache(vec![("A", node(1.0, &["B"], &["B"])), ("B", node(2.0, &["A"], &["A"]))]);
        let found = graph.explore("A", 10, 10).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].pub_key, "B");
        assert_eq!(found[0].depth, 1);
        assert_eq!(found[1].pub_key, "A");
    }

    #[test]
    fn depth_and_fan_out_bound_the_walk() {
        let graph = cache(vec![
            ("root", node(1.0, &["a", "b", "c"], &[])),
            ("a", node(5.0, &["a1"], &[])),
            ("b", node(4.0, &[], &[])),
            ("c", node(3.0, &[], &[])),
            ("a1", node(9.0, &["a2"], &[])),
            ("a2", node(9.5, &[], &[])),
        ]);
        let found = graph.explore("root", 1, 2).unwrap();
        let keys: Vec<_> = found.iter().map(|n| n.pub_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "root"]);

        let deeper = graph.explore("root", 2, 1).unwrap();
        let keys: Vec<_> = deeper.iter().map(|n| n.pub_key.as_str()).collect();
        assert_eq!(keys, vec!["a1", "a", "root"]);
    }

    #[test]
    fn unknown_peers_are_skipped() {
        let graph = cache(vec![("root", node(1.0, &["ghost", "x"], &[])), ("x", node(2.0, &[], &[]))]);
        let found = graph.explore("root", 3, 1).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn top_by_score_ranks_descending() {
        let graph = cache(vec![("a", node(1.0, &[], &[])), ("b", node(3.0, &[], &[])), ("c", node(2.0, &[], &[]))]);
        let top = graph.top_by_score(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].pub_key, "b");
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[1].pub_key, "c");
        assert!(graph.fetched_at().is_some());
    }
}
