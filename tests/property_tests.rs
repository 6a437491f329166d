//! Property-based tests for the dependency resolver and the error tree.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use convoy::core::graph::TypeGraph;
use convoy::core::tree::ErrorNode;
use convoy::core::types::EntityType;

/// Strategy for a pool of distinct entity type names `T0..Tn`.
fn type_pool(max: usize) -> impl Strategy<Value = Vec<EntityType>> {
    (2..=max).prop_map(|n| {
        (0..n)
            .map(|i| EntityType::new(format!("T{}", i)).unwrap())
            .collect()
    })
}

/// Strategy for an acyclic edge set over `n` types: edges only point from a
/// higher index (child) to a lower index (parent), which cannot cycle.
fn acyclic_edges(n: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((1..n, 0..n), 0..n * 2).prop_map(|pairs| {
        pairs
            .into_iter()
            .filter(|(child, parent)| parent < child)
            .collect()
    })
}

/// Strategy for arbitrary error trees, up to depth 4.
fn error_tree() -> impl Strategy<Value = ErrorNode> {
    let leaf = "[a-zA-Z0-9 .:,]{0,40}".prop_map(ErrorNode::leaf);
    leaf.prop_recursive(4, 32, 4, |inner| {
        (
            "[a-zA-Z0-9 .:,]{0,40}",
            prop::collection::vec(inner, 1..4),
        )
            .prop_map(|(message, children)| ErrorNode::with_children(message, children))
    })
}

proptest! {
    /// In any acyclic graph, every staged type comes after all of its staged
    /// dependencies.
    #[test]
    fn order_respects_dependencies(
        types in type_pool(8),
        raw_edges in acyclic_edges(8),
    ) {
        let mut graph = TypeGraph::new();
        let edges: Vec<(usize, usize)> = raw_edges
            .into_iter()
            .filter(|(child, parent)| *child < types.len() && *parent < types.len())
            .collect();
        for (child, parent) in &edges {
            graph.add_edge(types[*child].clone(), types[*parent].clone());
        }

        let order = graph.insertion_order(&types).unwrap();
        prop_assert_eq!(order.len(), types.len());

        let position = |entity_type: &EntityType| {
            order.iter().position(|x| x == entity_type).unwrap()
        };
        for (child, parent) in &edges {
            prop_assert!(
                position(&types[*parent]) < position(&types[*child]),
                "parent {} must precede child {}",
                types[*parent],
                types[*child],
            );
        }
    }

    /// Resolution never depends on anything but the inputs: repeated runs
    /// give identical orders.
    #[test]
    fn order_is_deterministic(
        types in type_pool(8),
        raw_edges in acyclic_edges(8),
    ) {
        let mut graph = TypeGraph::new();
        for (child, parent) in raw_edges {
            if child < types.len() && parent < types.len() {
                graph.add_edge(types[child].clone(), types[parent].clone());
            }
        }

        let first = graph.insertion_order(&types).unwrap();
        for _ in 0..5 {
            prop_assert_eq!(graph.insertion_order(&types).unwrap(), first.clone());
        }
    }

    /// Types with no edges keep their first-staged relative order.
    #[test]
    fn edge_free_types_keep_staged_order(types in type_pool(8)) {
        let graph = TypeGraph::new();
        let order = graph.insertion_order(&types).unwrap();
        prop_assert_eq!(order, types);
    }

    /// A ring of any size (including a self-edge) is rejected.
    #[test]
    fn rings_are_rejected(n in 1usize..8) {
        let types: Vec<EntityType> = (0..n)
            .map(|i| EntityType::new(format!("T{}", i)).unwrap())
            .collect();

        let mut graph = TypeGraph::new();
        for i in 0..n {
            graph.add_edge(types[i].clone(), types[(i + 1) % n].clone());
        }

        let err = graph.insertion_order(&types).unwrap_err();
        prop_assert!(err.to_string().contains("circular dependency"));
    }

    /// Any error tree survives the documented JSON encoding: same message at
    /// each node, same child count and order.
    #[test]
    fn error_tree_json_roundtrip(tree in error_tree()) {
        let json = tree.to_json_string();
        let parsed = ErrorNode::from_json_str(&json).unwrap();
        prop_assert_eq!(parsed, tree);
    }

    /// Leaves always encode as one-element arrays, parents as two-element
    /// arrays.
    #[test]
    fn error_tree_shape_invariant(tree in error_tree()) {
        let value: serde_json::Value = serde_json::from_str(&tree.to_json_string()).unwrap();
        fn check(node: &serde_json::Value) -> bool {
            let Some(items) = node.as_array() else { return false };
            match items.len() {
                1 => items[0].is_string(),
                2 => {
                    items[0].is_string()
                        && items[1].as_array().is_some_and(|children| {
                            !children.is_empty() && children.iter().all(check)
                        })
                }
                _ => false,
            }
        }
        prop_assert!(check(&value));
    }
}
