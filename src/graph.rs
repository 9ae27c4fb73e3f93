//! Wait-for graph over blocked transactions.
//!
//! An edge T -> B records that transaction T is blocked on a lock held by
//! B.  Outgoing edges of a transaction are replaced wholesale each time it
//! re-enters a blocked state, never accumulated across retry attempts.
//! Cycle detection is a depth-first search over the adjacency structure;
//! ordered maps keep the search deterministic.

use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
//  Wait-for graph
// ---------------------------------------------------------------------------

/// Directed transaction-blocks-on-transaction graph.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: BTreeMap<u64, BTreeSet<u64>>,
}

impl WaitForGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `from` is blocked on `to`.
    pub fn add_edge(&mut self, from: u64, to: u64) {
        self.edges.entry(from).or_default().insert(to);
    }

    /// Whether the edge `from -> to` exists.
    pub fn has_edge(&self, from: u64, to: u64) -> bool {
        self.edges.get(&from).is_some_and(|targets| targets.contains(&to))
    }

    /// Drop every outgoing edge of `tx`.  Called before each retry attempt
    /// so a still-blocked request re-records edges against the *current*
    /// holders only.
    pub fn clear_edges_from(&mut self, tx: u64) {
        self.edges.remove(&tx);
    }

    /// Remove `tx` entirely: its outgoing edges and every edge pointing at it.
    pub fn remove_transaction(&mut self, tx: u64) {
        self.edges.remove(&tx);
        self.edges.retain(|_, targets| {
            targets.remove(&tx);
            !targets.is_empty()
        });
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Whether the graph has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Find a cycle, returning its members in path order, or `None`.
    ///
    /// Start nodes and neighbours are visited in ascending id order, so
    /// when several cycles exist the one reported is deterministic.
    pub fn find_cycle(&self) -> Option<Vec<u64>> {
        let mut visited = BTreeSet::new();
        let mut in_progress = BTreeSet::new();
        let mut path = Vec::new();

        for &start in self.edges.keys() {
            if !visited.contains(&start) {
                if let Some(cycle) = self.dfs(start, &mut visited, &mut in_progress, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs(
        &self,
        node: u64,
        visited: &mut BTreeSet<u64>,
        in_progress: &mut BTreeSet<u64>,
        path: &mut Vec<u64>,
    ) -> Option<Vec<u64>> {
        visited.insert(node);
        in_progress.insert(node);
        path.push(node);

        if let Some(targets) = self.edges.get(&node) {
            for &next in targets {
                if !visited.contains(&next) {
                    if let Some(cycle) = self.dfs(next, visited, in_progress, path) {
                        return Some(cycle);
                    }
                } else if in_progress.contains(&next) {
                    // The cycle is the path suffix starting at `next`.
                    let pos = path.iter().position(|&p| p == next)?;
                    return Some(path[pos..].to_vec());
                }
            }
        }

        path.pop();
        in_progress.remove(&node);
        None
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------
