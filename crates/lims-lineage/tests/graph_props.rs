use lims_lineage::{Asset, AssetGraph, AssetId, AssetKind};
use proptest::prelude::*;
use std::collections::HashSet;

fn build(node_count: usize, edges: &[(usize, usize)]) -> (AssetGraph, Vec<AssetId>) {
    let mut graph = AssetGraph::new();
    let nodes: Vec<AssetId> = (0..node_count)
        .map(|_| graph.insert_asset(Asset::new(AssetKind::Generic)).unwrap())
        .collect();
    for &(from, to) in edges {
        if from < node_count && to < node_count {
            let _ = graph.add_link(nodes[from], nodes[to]);
        }
    }
    (graph, nodes)
}

/// Reference closure: repeat until no new asset is added
fn naive_descendants(graph: &AssetGraph, start: AssetId) -> HashSet<AssetId> {
    let mut reached: HashSet<AssetId> = graph.children_of(start).into_iter().collect();
    loop {
        let next: HashSet<AssetId> = reached
            .iter()
            .flat_map(|id| graph.children_of(*id))
            .collect();
        let before = reached.len();
        reached.extend(next);
        if reached.len() == before {
            return reached;
        }
    }
}

proptest! {
    #[test]
    fn prop_graph_remains_acyclic(
        node_count in 1..20usize,
        edges in proptest::collection::vec((0..20usize, 0..20usize), 0..60)
    ) {
        let (graph, _) = build(node_count, &edges);
        prop_assert!(graph.validate().is_ok());
        prop_assert!(graph.topological_order().is_ok());
    }

    #[test]
    fn prop_descendants_exclude_start_and_match_closure(
        node_count in 1..16usize,
        edges in proptest::collection::vec((0..16usize, 0..16usize), 0..48)
    ) {
        let (graph, nodes) = build(node_count, &edges);
        for &start in &nodes {
            let descendants = graph.descendants_of(start);
            prop_assert!(!descendants.contains(&start));

            let as_set: HashSet<AssetId> = descendants.iter().copied().collect();
            prop_assert_eq!(as_set.len(), descendants.len());
            prop_assert_eq!(as_set, naive_descendants(&graph, start));
        }
    }

    #[test]
    fn prop_component_is_symmetric(
        node_count in 2..12usize,
        edges in proptest::collection::vec((0..12usize, 0..12usize), 0..30)
    ) {
        let (graph, nodes) = build(node_count, &edges);
        for &a in &nodes {
            for b in graph.connected_component(a) {
                prop_assert!(graph.connected_component(b).contains(&a));
            }
        }
    }
}

#[test]
fn long_chain_terminates() {
    let mut graph = AssetGraph::new();
    let ids: Vec<AssetId> = (0..2_000)
        .map(|_| graph.insert_asset(Asset::new(AssetKind::Generic)).unwrap())
        .collect();
    for pair in ids.windows(2) {
        graph.add_link(pair[0], pair[1]).unwrap();
    }
    assert_eq!(graph.descendants_of(ids[0]).len(), 1_999);
    assert_eq!(graph.ancestors_of(ids[1_999]).len(), 1_999);
}
