use lims_lineage::prelude::*;
use pretty_assertions::assert_eq;

fn generic(graph: &mut AssetGraph) -> AssetId {
    graph.insert_asset(Asset::new(AssetKind::Generic)).unwrap()
}

#[test]
fn assigns_ordered_parents_and_single_child() {
    let mut graph = AssetGraph::new();
    let asset = generic(&mut graph);
    let parent_1 = generic(&mut graph);
    let parent_2 = generic(&mut graph);
    let child = generic(&mut graph);

    let outcome = LineageMutator::default()
        .assign_relationships(&mut graph, asset, vec![parent_1, parent_2], child)
        .unwrap();

    assert_eq!(
        outcome,
        RelationshipOutcome::Applied {
            parents_linked: 2,
            child_linked: true
        }
    );
    assert_eq!(graph.parents_of(asset), vec![parent_1, parent_2]);
    assert_eq!(graph.children_of(asset), vec![child]);
}

#[test]
fn bare_parent_and_sequence_child_is_a_no_op() {
    let mut graph = AssetGraph::new();
    let asset = generic(&mut graph);
    let _parent_1 = generic(&mut graph);
    let parent_2 = generic(&mut graph);

    let outcome = LineageMutator::default()
        .assign_relationships(&mut graph, asset, parent_2, Vec::<AssetId>::new())
        .unwrap();

    assert!(matches!(outcome, RelationshipOutcome::Ignored(_)));
    assert!(graph.parents_of(asset).is_empty());
    assert!(graph.children_of(asset).is_empty());
    assert_eq!(graph.link_count(), 0);
}

#[test]
fn sequence_child_blocks_even_valid_parents() {
    let mut graph = AssetGraph::new();
    let asset = generic(&mut graph);
    let parent = generic(&mut graph);
    let child = generic(&mut graph);

    let outcome = LineageMutator::default()
        .assign_relationships(&mut graph, asset, vec![parent], vec![child])
        .unwrap();

    assert!(!outcome.is_applied());
    assert_eq!(graph.link_count(), 0);
}

#[test]
fn repeated_assignment_does_not_duplicate_links() {
    let mut graph = AssetGraph::new();
    let asset = generic(&mut graph);
    let parent = generic(&mut graph);
    let child = generic(&mut graph);
    let mutator = LineageMutator::default();

    mutator
        .assign_relationships(&mut graph, asset, vec![parent], child)
        .unwrap();
    mutator
        .assign_relationships(&mut graph, asset, vec![parent], child)
        .unwrap();

    assert_eq!(graph.parents_of(asset), vec![parent]);
    assert_eq!(graph.children_of(asset), vec![child]);
    assert_eq!(graph.link_count(), 2);
}

#[test]
fn missing_asset_is_reported() {
    let mut graph = AssetGraph::new();
    let parent = generic(&mut graph);
    let ghost = AssetId::new();

    let err = LineageMutator::default()
        .assign_relationships(&mut graph, ghost, vec![parent], Relatives::None)
        .unwrap_err();
    assert_eq!(err, LineageError::AssetNotFound(ghost));
    assert!(err.is_recoverable());
}
