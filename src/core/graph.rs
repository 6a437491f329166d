//! core::graph
//!
//! Type dependency graph and insertion-order resolution.
//!
//! # Architecture
//!
//! The graph is derived from pending relationships: one edge per
//! relationship, pointing from the child's type to the parent's type. At
//! resolution time the graph is restricted to the types actually staged for
//! insert - a dependency on a type with nothing staged imposes no ordering.
//!
//! # Invariants
//!
//! - The graph restricted to staged types must be acyclic
//! - Resolution is deterministic: adjacency is kept in first-registration
//!   order and roots are visited in first-staged order, so the same
//!   registration sequence always yields the same order
//! - Types with no dependency edges retain their first-staged relative order

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::types::EntityType;

/// A circular dependency between staged types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("circular dependency detected involving type {entity_type}")]
pub struct CycleError {
    /// The type at which the cycle was re-entered.
    pub entity_type: EntityType,
}

/// DFS bookkeeping marker.
enum Mark {
    /// On the current traversal path; re-entry means a cycle.
    Visiting,
    /// Fully resolved; safe to skip.
    Done,
}

/// The type-level dependency graph.
///
/// Edges point from child type to parent type ("child depends on parent").
/// Parents for each child are kept in first-registration order and
/// deduplicated, which keeps resolution independent of hash iteration order.
#[derive(Debug, Default)]
pub struct TypeGraph {
    parents: HashMap<EntityType, Vec<EntityType>>,
}

impl TypeGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or merge) a dependency edge child-type -> parent-type.
    pub fn add_edge(&mut self, child: EntityType, parent: EntityType) {
        let parents = self.parents.entry(child).or_default();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    /// The parents of a type, in first-registration order.
    pub fn parents_of(&self, child: &EntityType) -> &[EntityType] {
        self.parents.get(child).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the graph has any edges at all.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Resolve a dependency-correct insertion order over the staged types.
    ///
    /// Every type appears after all staged types it depends on. Dependencies
    /// on types not in `staged` are ignored. Types with no edges retain the
    /// relative order in which they appear in `staged`.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError`] naming the offending type if the staged
    /// restriction of the graph contains a cycle (including a self-edge).
    ///
    /// # Example
    ///
    /// ```
    /// use convoy::core::graph::TypeGraph;
    /// use convoy::core::types::EntityType;
    ///
    /// let contact = EntityType::new("Contact").unwrap();
    /// let account = EntityType::new("Account").unwrap();
    ///
    /// let mut graph = TypeGraph::new();
    /// graph.add_edge(contact.clone(), account.clone());
    ///
    /// let order = graph
    ///     .insertion_order(&[contact.clone(), account.clone()])
    ///     .unwrap();
    /// assert_eq!(order, vec![account, contact]);
    /// ```
    pub fn insertion_order(&self, staged: &[EntityType]) -> Result<Vec<EntityType>, CycleError> {
        let staged_set: HashSet<&EntityType> = staged.iter().collect();
        let mut marks: HashMap<EntityType, Mark> = HashMap::new();
        let mut order = Vec::with_capacity(staged.len());

        for entity_type in staged {
            self.visit(entity_type, &staged_set, &mut marks, &mut order)?;
        }

        Ok(order)
    }

    fn visit(
        &self,
        entity_type: &EntityType,
        staged: &HashSet<&EntityType>,
        marks: &mut HashMap<EntityType, Mark>,
        order: &mut Vec<EntityType>,
    ) -> Result<(), CycleError> {
        match marks.get(entity_type) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(CycleError {
                    entity_type: entity_type.clone(),
                })
            }
            None => {}
        }

        marks.insert(entity_type.clone(), Mark::Visiting);

        for parent in self.parents_of(entity_type) {
            if staged.contains(parent) {
                self.visit(parent, staged, marks, order)?;
            }
        }

        marks.insert(entity_type.clone(), Mark::Done);
        order.push(entity_type.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> EntityType {
        EntityType::new(name).unwrap()
    }

    #[test]
    fn empty_graph_preserves_staged_order() {
        let graph = TypeGraph::new();
        let staged = vec![t("C"), t("A"), t("B")];
        let order = graph.insertion_order(&staged).unwrap();
        assert_eq!(order, staged);
    }

    #[test]
    fn parent_precedes_child() {
        let mut graph = TypeGraph::new();
        graph.add_edge(t("Contact"), t("Account"));

        let order = graph.insertion_order(&[t("Contact"), t("Account")]).unwrap();
        assert_eq!(order, vec![t("Account"), t("Contact")]);
    }

    #[test]
    fn chain_resolves_depth_first() {
        let mut graph = TypeGraph::new();
        // C depends on B, B depends on A
        graph.add_edge(t("C"), t("B"));
        graph.add_edge(t("B"), t("A"));

        let order = graph.insertion_order(&[t("C"), t("B"), t("A")]).unwrap();
        assert_eq!(order, vec![t("A"), t("B"), t("C")]);
    }

    #[test]
    fn dependency_on_unstaged_type_is_ignored() {
        let mut graph = TypeGraph::new();
        graph.add_edge(t("Contact"), t("Account"));

        // Account has nothing staged, so Contact is unconstrained.
        let order = graph.insertion_order(&[t("Contact")]).unwrap();
        assert_eq!(order, vec![t("Contact")]);
    }

    #[test]
    fn duplicate_edges_merge() {
        let mut graph = TypeGraph::new();
        graph.add_edge(t("Contact"), t("Account"));
        graph.add_edge(t("Contact"), t("Account"));

        assert_eq!(graph.parents_of(&t("Contact")), &[t("Account")]);
    }

    #[test]
    fn multiple_parents_all_precede_child() {
        let mut graph = TypeGraph::new();
        graph.add_edge(t("Junction"), t("Left"));
        graph.add_edge(t("Junction"), t("Right"));

        let order = graph
            .insertion_order(&[t("Junction"), t("Left"), t("Right")])
            .unwrap();

        let pos = |name: &str| order.iter().position(|x| x == &t(name)).unwrap();
        assert!(pos("Left") < pos("Junction"));
        assert!(pos("Right") < pos("Junction"));
    }

    #[test]
    fn self_edge_is_a_cycle() {
        let mut graph = TypeGraph::new();
        graph.add_edge(t("Account"), t("Account"));

        let err = graph.insertion_order(&[t("Account")]).unwrap_err();
        assert_eq!(err.entity_type, t("Account"));
        assert!(err.to_string().contains("circular dependency"));
    }

    #[test]
    fn two_node_cycle_detected() {
        let mut graph = TypeGraph::new();
        graph.add_edge(t("A"), t("B"));
        graph.add_edge(t("B"), t("A"));

        assert!(graph.insertion_order(&[t("A"), t("B")]).is_err());
    }

    #[test]
    fn cycle_through_unstaged_type_is_not_a_cycle() {
        let mut graph = TypeGraph::new();
        graph.add_edge(t("A"), t("B"));
        graph.add_edge(t("B"), t("A"));

        // Only A is staged; the edge through B imposes nothing.
        let order = graph.insertion_order(&[t("A")]).unwrap();
        assert_eq!(order, vec![t("A")]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut graph = TypeGraph::new();
        graph.add_edge(t("D"), t("A"));
        graph.add_edge(t("D"), t("B"));
        graph.add_edge(t("C"), t("B"));

        let staged = vec![t("D"), t("C"), t("A"), t("B")];
        let first = graph.insertion_order(&staged).unwrap();
        for _ in 0..10 {
            assert_eq!(graph.insertion_order(&staged).unwrap(), first);
        }
    }

    #[test]
    fn shared_parent_resolved_once() {
        let mut graph = TypeGraph::new();
        graph.add_edge(t("B"), t("A"));
        graph.add_edge(t("C"), t("A"));

        let order = graph.insertion_order(&[t("B"), t("C"), t("A")]).unwrap();
        assert_eq!(order, vec![t("A"), t("B"), t("C")]);
    }
}
