//! In-process record store with unit-of-work transactions
//!
//! A [`UnitOfWork`] holds the writer lock and mutates a staged copy of the
//! state. Nothing it does is visible until [`UnitOfWork::commit`]; dropping
//! it, or any error inside [`LabStore::transaction`], discards the copy.

use crate::error::{LimsError, StoreError};
use crate::types::{AssetGroup, Batch, Request, Sample, Study, Tag, TagGroup};
use indexmap::{IndexMap, IndexSet};
use lims_lineage::{
    AssetGraph, AssetGroupId, AssetId, BatchId, RequestId, SampleId, StudyId, TagGroupId, TagId,
};
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Every record the workflows read or write
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabState {
    pub graph: AssetGraph,
    pub studies: IndexMap<StudyId, Study>,
    pub samples: IndexMap<SampleId, Sample>,
    pub study_samples: IndexSet<(StudyId, SampleId)>,
    pub asset_groups: IndexMap<AssetGroupId, AssetGroup>,
    pub memberships: IndexSet<(AssetGroupId, AssetId)>,
    pub requests: IndexMap<RequestId, Request>,
    pub batches: IndexMap<BatchId, Batch>,
    pub tag_groups: IndexMap<TagGroupId, TagGroup>,
    pub tags: IndexMap<TagId, Tag>,
}

impl LabState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_study(&mut self, study: Study) -> StudyId {
        let id = study.id;
        self.studies.insert(id, study);
        id
    }

    pub fn add_sample(&mut self, sample: Sample) -> SampleId {
        let id = sample.id;
        self.samples.insert(id, sample);
        id
    }

    pub fn add_asset_group(&mut self, group: AssetGroup) -> AssetGroupId {
        let id = group.id;
        self.asset_groups.insert(id, group);
        id
    }

    pub fn add_request(&mut self, request: Request) -> RequestId {
        let id = request.id;
        self.requests.insert(id, request);
        id
    }

    pub fn add_batch(&mut self, batch: Batch) -> BatchId {
        let id = batch.id;
        self.batches.insert(id, batch);
        id
    }

    pub fn add_tag(&mut self, tag: Tag) -> TagId {
        let id = tag.id;
        self.tags.insert(id, tag);
        id
    }

    pub fn add_tag_group(&mut self, group: TagGroup) -> TagGroupId {
        let id = group.id;
        self.tag_groups.insert(id, group);
        id
    }

    /// Link a sample to a study; returns whether the link is new
    pub fn link_study_sample(&mut self, study: StudyId, sample: SampleId) -> bool {
        self.study_samples.insert((study, sample))
    }

    /// Add an asset to a group; returns whether the membership is new
    pub fn add_membership(&mut self, group: AssetGroupId, asset: AssetId) -> bool {
        self.memberships.insert((group, asset))
    }

    /// Remove an asset from a group; returns whether it was a member
    pub fn remove_membership(&mut self, group: AssetGroupId, asset: AssetId) -> bool {
        self.memberships.shift_remove(&(group, asset))
    }

    /// Groups the asset directly belongs to, in membership order
    pub fn asset_groups_of(&self, asset: AssetId) -> impl Iterator<Item = &AssetGroup> + '_ {
        self.memberships
            .iter()
            .filter(move |(_, member)| *member == asset)
            .filter_map(|(group, _)| self.asset_groups.get(group))
    }

    /// Studies a sample is linked to
    pub fn studies_of_sample(&self, sample: SampleId) -> impl Iterator<Item = StudyId> + '_ {
        self.study_samples
            .iter()
            .filter(move |(_, s)| *s == sample)
            .map(|(study, _)| *study)
    }

    /// Requests whose source asset is `asset`
    pub fn requests_on(&self, asset: AssetId) -> impl Iterator<Item = &Request> + '_ {
        self.requests.values().filter(move |r| r.asset == asset)
    }

    /// Requests of a batch, in batch order
    ///
    /// # Errors
    /// `UnknownBatch`, or `UnknownRequest` for a dangling request id
    pub fn batch_requests(&self, batch: BatchId) -> Result<Vec<Request>, LimsError> {
        let batch = self
            .batches
            .get(&batch)
            .ok_or(LimsError::UnknownBatch(batch))?;
        batch
            .requests
            .iter()
            .map(|id| {
                self.requests
                    .get(id)
                    .cloned()
                    .ok_or(LimsError::UnknownRequest(*id))
            })
            .collect()
    }
}

/// Receives staged state before it becomes visible
pub trait CommitSink: Send + Sync {
    /// Durably persist the state about to be published
    ///
    /// # Errors
    /// Any error aborts the commit
    fn persist(&self, state: &LabState) -> Result<(), StoreError>;
}

/// Writes each committed state as a JSON snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: std::path::PathBuf,
}

impl SnapshotFile {
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CommitSink for SnapshotFile {
    fn persist(&self, state: &LabState) -> Result<(), StoreError> {
        write_snapshot(&self.path, state)
    }
}

/// Shared, lock-protected record store
#[derive(Default)]
pub struct LabStore {
    state: RwLock<LabState>,
    sink: Option<Arc<dyn CommitSink>>,
}

impl std::fmt::Debug for LabStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabStore")
            .field("assets", &self.state.read().graph.asset_count())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl LabStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_snapshot(state: LabState) -> Self {
        Self {
            state: RwLock::new(state),
            sink: None,
        }
    }

    /// Load a JSON snapshot file
    ///
    /// # Errors
    /// `Snapshot` when the file cannot be read or decoded
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.display())))?;
        let state: LabState =
            serde_json::from_str(&source).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        state
            .graph
            .validate()
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        Ok(Self::from_snapshot(state))
    }

    /// Route every commit through `sink`
    #[must_use]
    pub fn with_commit_sink(mut self, sink: Arc<dyn CommitSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run `f` against the committed state
    pub fn read<T>(&self, f: impl FnOnce(&LabState) -> T) -> T {
        f(&self.state.read())
    }

    /// Clone of the committed state
    #[must_use]
    pub fn snapshot(&self) -> LabState {
        self.state.read().clone()
    }

    /// Write the committed state as a JSON snapshot
    ///
    /// # Errors
    /// `Snapshot` when the file cannot be written
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        write_snapshot(path.as_ref(), &self.state.read())
    }

    /// Start a unit of work; blocks until other writers finish
    pub fn begin(&self) -> UnitOfWork<'_> {
        let guard = self.state.write();
        let staged = guard.clone();
        UnitOfWork {
            guard,
            staged,
            sink: self.sink.as_deref(),
        }
    }

    /// Run `f` in a unit of work; commit on `Ok`, roll back on `Err`
    ///
    /// # Errors
    /// Whatever `f` returns, or the commit failure
    pub fn transaction<T, E>(&self, f: impl FnOnce(&mut LabState) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut work = self.begin();
        match f(work.state_mut()) {
            Ok(value) => {
                work.commit()?;
                Ok(value)
            }
            Err(err) => {
                work.rollback();
                Err(err)
            }
        }
    }
}

/// Exclusive, staged access to the store
pub struct UnitOfWork<'a> {
    guard: RwLockWriteGuard<'a, LabState>,
    staged: LabState,
    sink: Option<&'a dyn CommitSink>,
}

impl UnitOfWork<'_> {
    #[must_use]
    pub fn state(&self) -> &LabState {
        &self.staged
    }

    pub fn state_mut(&mut self) -> &mut LabState {
        &mut self.staged
    }

    /// Publish the staged state
    ///
    /// # Errors
    /// `CommitFailed` from the sink; the committed state is left unchanged
    pub fn commit(self) -> Result<(), StoreError> {
        let Self {
            mut guard,
            staged,
            sink,
        } = self;
        if let Some(sink) = sink {
            if let Err(err) = sink.persist(&staged) {
                tracing::error!(error = %err, "commit rejected by sink");
                return Err(err);
            }
        }
        *guard = staged;
        Ok(())
    }

    /// Discard the staged state
    pub fn rollback(self) {
        tracing::debug!("unit of work rolled back");
    }
}

fn write_snapshot(path: &Path, state: &LabState) -> Result<(), StoreError> {
    let json =
        serde_json::to_string_pretty(state).map_err(|e| StoreError::Snapshot(e.to_string()))?;
    std::fs::write(path, json)
        .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.display())))
}
