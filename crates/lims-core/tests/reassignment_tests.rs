//! Study reassignment across lineage graphs

use lims_core::{
    CommitSink, LabState, LabStore, LimsConfig, LimsError, MoveRequest, ReassignmentScope,
    SampleTracker, StoreError, MOVED_TO_ASSET_GROUP,
};
use lims_lineage::UserId;
use lims_test_utils::{diamond, linear_chain, Harness};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn moving_from_lane_relocates_whole_chain() {
    let chain = linear_chain();
    let harness = Harness::new(chain.state.clone(), LimsConfig::default());
    let actor = UserId::new();

    let moved = harness
        .tracker
        .move_to_asset_group(
            chain.lane,
            chain.study,
            chain.study_to,
            chain.asset_group_to_new,
            "",
            actor,
        )
        .unwrap();
    assert!(moved);

    let state = harness.snapshot();
    for id in &chain.requests {
        assert_eq!(state.requests[id].study, chain.study_to);
    }

    let groups_in_study_to = |asset| -> Vec<_> {
        state
            .asset_groups_of(asset)
            .filter(|g| g.study == chain.study_to)
            .map(|g| g.id)
            .collect()
    };
    assert_eq!(groups_in_study_to(chain.sample_tube), vec![chain.asset_group_to_new]);
    assert_eq!(groups_in_study_to(chain.sample_tube_2), vec![chain.asset_group_to_new]);

    // Only from-study memberships are dropped
    assert!(!state.memberships.contains(&(chain.asset_group, chain.sample_tube)));
    assert!(state.memberships.contains(&(chain.asset_group_2, chain.sample_tube_2)));

    assert!(state.studies_of_sample(chain.sample).any(|s| s == chain.study_to));
    assert!(state.studies_of_sample(chain.sample_2).any(|s| s == chain.study_to));
    assert!(state.studies_of_sample(chain.sample_2).any(|s| s == chain.study_2));
}

#[test]
fn every_moved_asset_is_audited_for_the_actor() {
    let chain = linear_chain();
    let harness = Harness::new(chain.state.clone(), LimsConfig::default());
    let actor = UserId::new();

    harness
        .tracker
        .move_to_asset_group(
            chain.lane,
            chain.study,
            chain.study_to,
            chain.asset_group_to_new,
            "",
            actor,
        )
        .unwrap();

    let records = harness.audit.records();
    assert_eq!(records.len(), 6);
    assert!(records
        .iter()
        .all(|r| r.entry.key == MOVED_TO_ASSET_GROUP && r.entry.actor == Some(actor)));
    assert_eq!(harness.audit.records_for(chain.library_tube_2).len(), 1);
    assert!(harness.audit.verify_integrity().is_ok());
}

#[test]
fn moving_from_library_tube_in_diamond_reaches_sample_tube() {
    let dag = diamond();
    let harness = Harness::new(dag.state.clone(), LimsConfig::default());

    let report = harness
        .tracker
        .move_to_asset_group_with_report(&MoveRequest {
            asset: dag.library_tube,
            from_study: dag.study,
            to_study: dag.study_to,
            to_asset_group: dag.asset_group_to_new,
            new_name: String::new(),
            actor: UserId::new(),
        })
        .unwrap();

    let state = harness.snapshot();
    assert_eq!(state.requests[&dag.request_sample_tube].study, dag.study_to);
    assert_eq!(state.requests[&dag.request_library_tube].study, dag.study_to);
    assert_eq!(state.requests[&dag.request_multiplex].study, dag.study_to);
    assert!(state.study_samples.contains(&(dag.study_to, dag.sample)));

    // Four assets, each counted once despite two paths into the pool
    assert_eq!(report.subgraph.len(), 4);
    assert_eq!(report.study_samples_created, 1);
}

#[test]
fn descendants_scope_leaves_upstream_requests() {
    let dag = diamond();
    let config = LimsConfig::default().with_reassignment_scope(ReassignmentScope::Descendants);
    let harness = Harness::new(dag.state.clone(), config);

    harness
        .tracker
        .move_to_asset_group(
            dag.library_tube,
            dag.study,
            dag.study_to,
            dag.asset_group_to_new,
            "",
            UserId::new(),
        )
        .unwrap();

    let state = harness.snapshot();
    assert_eq!(state.requests[&dag.request_sample_tube].study, dag.study);
    assert_eq!(state.requests[&dag.request_library_tube].study, dag.study_to);
    assert_eq!(state.requests[&dag.request_multiplex].study, dag.study_to);
    assert!(state.memberships.contains(&(dag.asset_group, dag.sample_tube)));
}

#[test]
fn group_from_another_study_aborts_atomically() {
    let chain = linear_chain();
    let harness = Harness::new(chain.state.clone(), LimsConfig::default());

    let err = harness
        .tracker
        .move_to_asset_group(
            chain.lane,
            chain.study,
            chain.study_to,
            chain.asset_group_2,
            "renamed",
            UserId::new(),
        )
        .unwrap_err();

    assert!(matches!(err, LimsError::TransactionAborted { .. }));
    assert!(matches!(err.root(), LimsError::AssetGroupStudyMismatch { .. }));
    assert_eq!(harness.snapshot(), chain.state);
    assert_eq!(harness.messages.errors().len(), 1);
    assert!(harness.audit.is_empty());
}

#[test]
fn renaming_numbers_relocated_assets() {
    let chain = linear_chain();
    let harness = Harness::new(chain.state.clone(), LimsConfig::default());

    harness
        .tracker
        .move_to_asset_group(
            chain.lane,
            chain.study,
            chain.study_to,
            chain.asset_group_to_new,
            "moved",
            UserId::new(),
        )
        .unwrap();

    let state = harness.snapshot();
    let mut names: Vec<String> = [chain.sample_tube, chain.sample_tube_2]
        .iter()
        .filter_map(|id| state.graph.asset(*id).and_then(|a| a.name.clone()))
        .collect();
    names.sort();
    assert_eq!(names, vec!["moved_1".to_string(), "moved_2".to_string()]);
    assert_eq!(state.graph.asset(chain.lane).unwrap().name, None);
}

struct FailingSink;

impl CommitSink for FailingSink {
    fn persist(&self, _state: &LabState) -> Result<(), StoreError> {
        Err(StoreError::CommitFailed("database unavailable".to_string()))
    }
}

#[test]
fn commit_failure_rolls_back_the_move() {
    let chain = linear_chain();
    let store = Arc::new(LabStore::from_snapshot(chain.state.clone()).with_commit_sink(Arc::new(FailingSink)));
    let tracker = SampleTracker::new(store.clone(), LimsConfig::default());

    let err = tracker
        .move_to_asset_group(
            chain.lane,
            chain.study,
            chain.study_to,
            chain.asset_group_to_new,
            "",
            UserId::new(),
        )
        .unwrap_err();

    assert!(matches!(
        err.root(),
        LimsError::Store(StoreError::CommitFailed(_))
    ));
    assert_eq!(store.snapshot(), chain.state);
}

#[test]
fn concurrent_moves_on_one_store_both_commit() {
    let first = linear_chain();
    let second = diamond();

    // Merge both scenarios into one store
    let mut state = first.state.clone();
    let other = second.state.clone();
    for asset in other.graph.assets() {
        state.graph.insert_asset(asset.clone()).unwrap();
    }
    for link in other.graph.links() {
        state.graph.add_link(link.ancestor, link.descendant).unwrap();
    }
    state.studies.extend(other.studies);
    state.samples.extend(other.samples);
    state.study_samples.extend(other.study_samples);
    state.asset_groups.extend(other.asset_groups);
    state.memberships.extend(other.memberships);
    state.requests.extend(other.requests);

    let harness = Harness::new(state, LimsConfig::default());
    std::thread::scope(|scope| {
        scope.spawn(|| {
            harness
                .tracker
                .move_to_asset_group(
                    first.lane,
                    first.study,
                    first.study_to,
                    first.asset_group_to_new,
                    "",
                    UserId::new(),
                )
                .unwrap()
        });
        scope.spawn(|| {
            harness
                .tracker
                .move_to_asset_group(
                    second.multiplex_tube,
                    second.study,
                    second.study_to,
                    second.asset_group_to_new,
                    "",
                    UserId::new(),
                )
                .unwrap()
        });
    });

    let state = harness.snapshot();
    assert!(first
        .requests
        .iter()
        .all(|id| state.requests[id].study == first.study_to));
    assert_eq!(state.requests[&second.request_sample_tube].study, second.study_to);
}
