//! Study reassignment
//!
//! Moves an asset and everything that shares its lineage from one study to
//! another: requests, asset group memberships and study/sample links are
//! rewritten in a single unit of work.

use crate::config::ReassignmentScope;
use crate::error::LimsError;
use crate::store::{LabState, LabStore};
use indexmap::IndexSet;
use lims_lineage::{AssetGroupId, AssetId, Material, RequestId, StudyId, UserId};
use serde::Serialize;

/// Arguments of one `move_to_asset_group` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub asset: AssetId,
    pub from_study: StudyId,
    pub to_study: StudyId,
    pub to_asset_group: AssetGroupId,
    /// Empty leaves asset names unchanged
    pub new_name: String,
    pub actor: UserId,
}

/// What a committed move changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReassignmentReport {
    /// Assets in scope, starting asset first
    pub subgraph: Vec<AssetId>,
    pub requests_moved: Vec<RequestId>,
    pub memberships_removed: usize,
    /// Assets that joined the target group
    pub relocated: Vec<AssetId>,
    pub study_samples_created: usize,
}

/// Runs study reassignments against a store
#[derive(Debug, Clone, Copy, Default)]
pub struct StudyReassignment {
    scope: ReassignmentScope,
}

impl StudyReassignment {
    #[inline]
    #[must_use]
    pub fn new(scope: ReassignmentScope) -> Self {
        Self { scope }
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> ReassignmentScope {
        self.scope
    }

    /// Apply the move in one unit of work
    ///
    /// # Errors
    /// `TransactionAborted` wrapping the cause; nothing is committed
    pub fn execute(
        &self,
        store: &LabStore,
        request: &MoveRequest,
    ) -> Result<ReassignmentReport, LimsError> {
        store
            .transaction(|state| self.apply(state, request))
            .map_err(LimsError::aborted)
    }

    /// Rewrite `state` in place
    ///
    /// Callers own atomicity: on error `state` may be partially updated and
    /// must be discarded.
    ///
    /// # Errors
    /// `UnknownStudy`, `UnknownAssetGroup`, `AssetGroupStudyMismatch`,
    /// `AssetNotFound`
    pub fn apply(
        &self,
        state: &mut LabState,
        request: &MoveRequest,
    ) -> Result<ReassignmentReport, LimsError> {
        Self::validate(state, request)?;
        let subgraph = self.subgraph(state, request.asset);
        tracing::debug!(asset = %request.asset, size = subgraph.len(), scope = ?self.scope, "reassignment scope");

        let requests_moved = Self::move_requests(state, &subgraph, request);
        let (memberships_removed, relocated) = Self::move_memberships(state, &subgraph, request);
        Self::rename(state, &relocated, &request.new_name);
        let study_samples_created = Self::link_samples(state, &subgraph, request.to_study);

        Ok(ReassignmentReport {
            subgraph: subgraph.into_iter().collect(),
            requests_moved,
            memberships_removed,
            relocated,
            study_samples_created,
        })
    }

    /// `{asset}` plus the assets the scope pulls in
    #[must_use]
    pub fn subgraph(&self, state: &LabState, asset: AssetId) -> IndexSet<AssetId> {
        let reached = match self.scope {
            ReassignmentScope::Connected => state.graph.connected_component(asset),
            ReassignmentScope::Descendants => state.graph.descendants_of(asset),
        };
        let mut subgraph = IndexSet::with_capacity(reached.len() + 1);
        subgraph.insert(asset);
        subgraph.extend(reached);
        subgraph
    }

    fn validate(state: &LabState, request: &MoveRequest) -> Result<(), LimsError> {
        state.graph.require(request.asset)?;
        for study in [request.from_study, request.to_study] {
            if !state.studies.contains_key(&study) {
                return Err(LimsError::UnknownStudy(study));
            }
        }
        let group = state
            .asset_groups
            .get(&request.to_asset_group)
            .ok_or(LimsError::UnknownAssetGroup(request.to_asset_group))?;
        if group.study != request.to_study {
            return Err(LimsError::AssetGroupStudyMismatch {
                group: group.id,
                expected: request.to_study,
                actual: group.study,
            });
        }
        Ok(())
    }

    fn move_requests(
        state: &mut LabState,
        subgraph: &IndexSet<AssetId>,
        request: &MoveRequest,
    ) -> Vec<RequestId> {
        let mut moved = Vec::new();
        for r in state.requests.values_mut() {
            if r.study == request.from_study && subgraph.contains(&r.asset) {
                r.study = request.to_study;
                moved.push(r.id);
            }
        }
        tracing::debug!(count = moved.len(), "requests moved");
        moved
    }

    /// Drop `from_study` memberships and enrol every grouped asset in the
    /// target group. Memberships in other studies' groups are kept.
    fn move_memberships(
        state: &mut LabState,
        subgraph: &IndexSet<AssetId>,
        request: &MoveRequest,
    ) -> (usize, Vec<AssetId>) {
        let from_study = request.from_study;
        let stale: Vec<(AssetGroupId, AssetId)> = state
            .memberships
            .iter()
            .filter(|(group, asset)| {
                subgraph.contains(asset)
                    && state
                        .asset_groups
                        .get(group)
                        .is_some_and(|g| g.study == from_study)
            })
            .copied()
            .collect();
        let grouped: IndexSet<AssetId> = subgraph
            .iter()
            .copied()
            .filter(|asset| state.memberships.iter().any(|(_, member)| member == asset))
            .collect();

        for (group, asset) in &stale {
            state.remove_membership(*group, *asset);
        }
        let mut relocated = Vec::new();
        for asset in grouped {
            state.add_membership(request.to_asset_group, asset);
            relocated.push(asset);
        }
        tracing::debug!(removed = stale.len(), relocated = relocated.len(), "memberships moved");
        (stale.len(), relocated)
    }

    fn rename(state: &mut LabState, relocated: &[AssetId], new_name: &str) {
        if new_name.is_empty() {
            return;
        }
        let numbered = relocated.len() > 1;
        for (ordinal, id) in relocated.iter().enumerate() {
            if let Some(asset) = state.graph.asset_mut(*id) {
                asset.name = Some(if numbered {
                    format!("{new_name}_{}", ordinal + 1)
                } else {
                    new_name.to_string()
                });
            }
        }
    }

    fn link_samples(state: &mut LabState, subgraph: &IndexSet<AssetId>, study: StudyId) -> usize {
        let samples: IndexSet<_> = subgraph
            .iter()
            .filter_map(|id| state.graph.asset(*id))
            .filter_map(|asset| match asset.material() {
                Some(Material::Sample(sample)) => Some(sample),
                _ => None,
            })
            .collect();
        let created = samples
            .into_iter()
            .filter(|sample| state.link_study_sample(study, *sample))
            .count();
        tracing::debug!(created, "study samples linked");
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetGroup, Request, Sample, Study};
    use lims_lineage::{Asset, AssetKind, SubmissionId};
    use pretty_assertions::assert_eq;

    struct Chain {
        state: LabState,
        tube: AssetId,
        library: AssetId,
        lane: AssetId,
        sample: lims_lineage::SampleId,
        from: StudyId,
        to: StudyId,
        from_group: AssetGroupId,
        to_group: AssetGroupId,
    }

    /// tube -> library -> lane, one request per asset, tube grouped in `from`
    fn chain() -> Chain {
        let mut state = LabState::new();
        let from = state.add_study(Study::new("from"));
        let to = state.add_study(Study::new("to"));
        let sample = state.add_sample(Sample::new("sample"));
        state.link_study_sample(from, sample);

        let tube = state
            .graph
            .insert_asset(
                Asset::new(AssetKind::SampleTube)
                    .with_material(Material::Sample(sample))
                    .unwrap(),
            )
            .unwrap();
        let library = state
            .graph
            .insert_asset(Asset::new(AssetKind::LibraryTube))
            .unwrap();
        let lane = state.graph.insert_asset(Asset::new(AssetKind::Lane)).unwrap();
        state.graph.add_link(tube, library).unwrap();
        state.graph.add_link(library, lane).unwrap();

        let submission = SubmissionId::new();
        for asset in [tube, library, lane] {
            state.add_request(Request::new(from, asset, submission).with_sample(sample));
        }
        let from_group = state.add_asset_group(AssetGroup::new("from group", from));
        let to_group = state.add_asset_group(AssetGroup::new("to group", to));
        state.add_membership(from_group, tube);

        Chain {
            state,
            tube,
            library,
            lane,
            sample,
            from,
            to,
            from_group,
            to_group,
        }
    }

    fn move_from(c: &Chain, asset: AssetId, new_name: &str) -> MoveRequest {
        MoveRequest {
            asset,
            from_study: c.from,
            to_study: c.to,
            to_asset_group: c.to_group,
            new_name: new_name.to_string(),
            actor: UserId::new(),
        }
    }

    #[test]
    fn connected_scope_reaches_upstream() {
        let mut c = chain();
        let request = move_from(&c, c.lane, "");
        let report = StudyReassignment::default()
            .apply(&mut c.state, &request)
            .unwrap();

        assert_eq!(report.subgraph, vec![c.lane, c.library, c.tube]);
        assert_eq!(report.requests_moved.len(), 3);
        assert!(c.state.requests.values().all(|r| r.study == c.to));
        assert_eq!(report.relocated, vec![c.tube]);
        assert_eq!(report.memberships_removed, 1);
        assert!(!c.state.memberships.contains(&(c.from_group, c.tube)));
        assert!(c.state.memberships.contains(&(c.to_group, c.tube)));
        assert_eq!(report.study_samples_created, 1);
        assert!(c.state.study_samples.contains(&(c.to, c.sample)));
    }

    #[test]
    fn descendants_scope_stays_downstream() {
        let mut c = chain();
        let request = move_from(&c, c.library, "");
        let report = StudyReassignment::new(ReassignmentScope::Descendants)
            .apply(&mut c.state, &request)
            .unwrap();

        assert_eq!(report.subgraph, vec![c.library, c.lane]);
        let tube_study = c.state.requests_on(c.tube).next().unwrap().study;
        assert_eq!(tube_study, c.from);
        assert!(report.relocated.is_empty());
        assert_eq!(report.study_samples_created, 0);
    }

    #[test]
    fn requests_of_other_studies_are_untouched() {
        let mut c = chain();
        let other = c.state.add_study(Study::new("other"));
        let foreign = c
            .state
            .add_request(Request::new(other, c.library, SubmissionId::new()));

        let request = move_from(&c, c.tube, "");
        StudyReassignment::default()
            .apply(&mut c.state, &request)
            .unwrap();
        assert_eq!(c.state.requests[&foreign].study, other);
    }

    #[test]
    fn existing_study_sample_is_not_duplicated() {
        let mut c = chain();
        c.state.link_study_sample(c.to, c.sample);
        let before = c.state.study_samples.len();

        let request = move_from(&c, c.tube, "");
        let report = StudyReassignment::default()
            .apply(&mut c.state, &request)
            .unwrap();
        assert_eq!(report.study_samples_created, 0);
        assert_eq!(c.state.study_samples.len(), before);
    }

    #[test]
    fn renames_relocated_assets() {
        let mut c = chain();
        c.state.add_membership(c.from_group, c.library);
        let request = move_from(&c, c.tube, "moved");
        StudyReassignment::default()
            .apply(&mut c.state, &request)
            .unwrap();

        let name = |id| c.state.graph.asset(id).unwrap().name.clone();
        assert_eq!(name(c.tube).as_deref(), Some("moved_1"));
        assert_eq!(name(c.library).as_deref(), Some("moved_2"));
        assert_eq!(name(c.lane), None);
    }

    #[test]
    fn group_of_wrong_study_aborts_without_changes() {
        let c = chain();
        let store = LabStore::from_snapshot(c.state.clone());
        let mut request = move_from(&c, c.lane, "");
        request.to_asset_group = c.from_group;

        let err = StudyReassignment::default()
            .execute(&store, &request)
            .unwrap_err();
        assert!(matches!(
            err.root(),
            LimsError::AssetGroupStudyMismatch { .. }
        ));
        assert_eq!(store.snapshot(), c.state);
    }

    #[test]
    fn unknown_study_aborts() {
        let c = chain();
        let store = LabStore::from_snapshot(c.state.clone());
        let mut request = move_from(&c, c.lane, "");
        request.from_study = StudyId::new();

        let err = StudyReassignment::default()
            .execute(&store, &request)
            .unwrap_err();
        assert!(matches!(err, LimsError::TransactionAborted { .. }));
        assert!(matches!(err.root(), LimsError::UnknownStudy(_)));
    }
}
