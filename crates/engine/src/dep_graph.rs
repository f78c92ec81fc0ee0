//! Dependency graph for formula cells.
//!
//! Stores forward adjacency only: for each producer position, the set of
//! consumer cells whose formulas read it. A cell's own outgoing references
//! are recoverable from its content, so they are not stored a second time.
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "B reads A"  (B must drop its memoised value when A changes)
//! ```
//!
//! This makes "whose caches break if X changes?" a single map lookup.
//!
//! # Invariants
//!
//! 1. **No dangling entries:** empty consumer sets are removed, not stored.
//! 2. **No duplicate edges:** set semantics enforced by `FxHashSet`.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::position::Position;

#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// producer -> cells whose formulas reference it
    consumers: FxHashMap<Position, FxHashSet<Position>>,
}

impl DepGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register that `consumer`'s formula reads `producer`. Idempotent.
    pub fn add_edge(&mut self, producer: Position, consumer: Position) {
        self.consumers.entry(producer).or_default().insert(consumer);
    }

    /// Unregister a single edge. Drops the producer's entry once it empties.
    pub fn remove_edge(&mut self, producer: Position, consumer: Position) {
        if let Some(set) = self.consumers.get_mut(&producer) {
            set.remove(&consumer);
            if set.is_empty() {
                self.consumers.remove(&producer);
            }
        }
    }

    /// Current consumers of `producer` (empty if it has none).
    pub fn edges_of(&self, producer: Position) -> impl Iterator<Item = Position> + '_ {
        self.consumers
            .get(&producer)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Remove and return the entire consumer set of `producer`.
    pub fn drop_all_from(&mut self, producer: Position) -> Option<FxHashSet<Position>> {
        self.consumers.remove(&producer)
    }

    /// Number of producers with at least one consumer.
    pub fn producer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Check all invariants. Panics if any are violated.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (producer, set) in &self.consumers {
            assert!(
                !set.is_empty(),
                "Empty consumer set stored for {:?}",
                producer
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(row: usize, col: usize) -> Position {
        Position::new(row, col)
    }

    #[test]
    fn test_empty_graph() {
        let graph = DepGraph::new();
        assert_eq!(graph.producer_count(), 0);
        assert_eq!(graph.edges_of(pos(0, 0)).count(), 0);
        graph.assert_consistent();
    }

    #[test]
    fn test_single_edge() {
        // B1 = A1
        let mut graph = DepGraph::new();
        let a1 = pos(0, 0);
        let b1 = pos(0, 1);

        graph.add_edge(a1, b1);
        graph.assert_consistent();

        assert_eq!(graph.edges_of(a1).collect::<Vec<_>>(), vec![b1]);
        assert_eq!(graph.edges_of(b1).count(), 0);
        assert_eq!(graph.producer_count(), 1);
    }

    #[test]
    fn test_add_edge_idempotent() {
        let mut graph = DepGraph::new();
        let a1 = pos(0, 0);
        let b1 = pos(0, 1);

        graph.add_edge(a1, b1);
        graph.add_edge(a1, b1);
        graph.assert_consistent();

        assert_eq!(graph.edges_of(a1).count(), 1);
    }

    #[test]
    fn test_multiple_consumers() {
        // B1 = A1, C1 = A1
        let mut graph = DepGraph::new();
        let a1 = pos(0, 0);
        let b1 = pos(0, 1);
        let c1 = pos(0, 2);

        graph.add_edge(a1, b1);
        graph.add_edge(a1, c1);
        graph.assert_consistent();

        let mut deps: Vec<_> = graph.edges_of(a1).collect();
        deps.sort();
        assert_eq!(deps, vec![b1, c1]);
    }

    #[test]
    fn test_remove_edge_cleans_empty_entry() {
        let mut graph = DepGraph::new();
        let a1 = pos(0, 0);
        let b1 = pos(0, 1);

        graph.add_edge(a1, b1);
        graph.remove_edge(a1, b1);
        graph.assert_consistent();

        assert_eq!(graph.edges_of(a1).count(), 0);
        assert_eq!(graph.producer_count(), 0);
    }

    #[test]
    fn test_remove_edge_keeps_other_consumers() {
        let mut graph = DepGraph::new();
        let a1 = pos(0, 0);
        let b1 = pos(0, 1);
        let c1 = pos(0, 2);

        graph.add_edge(a1, b1);
        graph.add_edge(a1, c1);
        graph.remove_edge(a1, b1);
        graph.assert_consistent();

        assert_eq!(graph.edges_of(a1).collect::<Vec<_>>(), vec![c1]);
    }

    #[test]
    fn test_remove_missing_edge_is_noop() {
        let mut graph = DepGraph::new();
        graph.remove_edge(pos(0, 0), pos(0, 1));
        graph.assert_consistent();
        assert_eq!(graph.producer_count(), 0);
    }

    #[test]
    fn test_drop_all_from_returns_removed_set() {
        let mut graph = DepGraph::new();
        let a1 = pos(0, 0);
        let b1 = pos(0, 1);
        let c1 = pos(0, 2);

        graph.add_edge(a1, b1);
        graph.add_edge(a1, c1);

        let removed = graph.drop_all_from(a1).unwrap();
        assert!(removed.contains(&b1));
        assert!(removed.contains(&c1));
        assert_eq!(removed.len(), 2);

        assert_eq!(graph.edges_of(a1).count(), 0);
        assert!(graph.drop_all_from(a1).is_none());
        graph.assert_consistent();
    }

    #[test]
    fn test_rewiring() {
        // B1 = A1, then B1 = A2 instead
        let mut graph = DepGraph::new();
        let a1 = pos(0, 0);
        let a2 = pos(1, 0);
        let b1 = pos(0, 1);

        graph.add_edge(a1, b1);
        graph.remove_edge(a1, b1);
        graph.add_edge(a2, b1);
        graph.assert_consistent();

        assert_eq!(graph.edges_of(a1).count(), 0);
        assert_eq!(graph.edges_of(a2).collect::<Vec<_>>(), vec![b1]);
    }
}
