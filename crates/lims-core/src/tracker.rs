//! Sample tracker
//!
//! Entry point that wires the store, lookups, audit sink and message channel
//! together and exposes the lab workflows.

use crate::collaborators::{BatchLookup, FlashMessages, MessageChannel, TagGroupLookup};
use crate::config::LimsConfig;
use crate::error::LimsError;
use crate::reassignment::{MoveRequest, ReassignmentReport, StudyReassignment};
use crate::store::LabStore;
use crate::tagging::{
    TagApplication, TagAssignment, TagAssignmentPlan, TagSelections, TaskOutcome,
};
use lims_lineage::{
    AssetGroupId, AssetId, AuditEntry, AuditLog, AuditSink, BatchId, LineageMutator, Material,
    RelationshipOutcome, Relatives, StudyId, TagGroupId, UserId,
};
use std::sync::Arc;

/// Audit key for assets moved between studies
pub const MOVED_TO_ASSET_GROUP: &str = "moved_to_asset_group";
/// Audit key for wells that received a new tag
pub const TAGS_ASSIGNED: &str = "tags_assigned";

/// Lab workflow façade
pub struct SampleTracker {
    config: LimsConfig,
    store: Arc<LabStore>,
    batches: Arc<dyn BatchLookup>,
    tag_groups: Arc<dyn TagGroupLookup>,
    audit: Arc<dyn AuditSink>,
    messages: Arc<dyn MessageChannel>,
}

impl SampleTracker {
    /// Tracker over `store`, which also serves batch and tag-group lookups
    #[must_use]
    pub fn new(store: Arc<LabStore>, config: LimsConfig) -> Self {
        Self {
            config,
            batches: store.clone(),
            tag_groups: store.clone(),
            store,
            audit: Arc::new(AuditLog::new()),
            messages: Arc::new(FlashMessages::new()),
        }
    }

    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Arc<dyn MessageChannel>) -> Self {
        self.messages = messages;
        self
    }

    #[must_use]
    pub fn with_batch_lookup(mut self, batches: Arc<dyn BatchLookup>) -> Self {
        self.batches = batches;
        self
    }

    #[must_use]
    pub fn with_tag_group_lookup(mut self, tag_groups: Arc<dyn TagGroupLookup>) -> Self {
        self.tag_groups = tag_groups;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &LimsConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<LabStore> {
        &self.store
    }

    /// Every asset downstream of `asset`, each once
    ///
    /// # Errors
    /// `AssetNotFound`
    pub fn descendants_of(&self, asset: AssetId) -> Result<Vec<AssetId>, LimsError> {
        self.store.read(|state| -> Result<Vec<AssetId>, LimsError> {
            state.graph.require(asset)?;
            Ok(state.graph.descendants_of(asset).into_iter().collect())
        })
    }

    #[must_use]
    pub fn is_pool(&self, asset: AssetId) -> bool {
        self.store.read(|state| state.graph.is_pool(asset))
    }

    /// Link `parents -> asset -> child` under the configured shape policy
    ///
    /// # Errors
    /// `AssetNotFound`, `CycleDetected`, or `MalformedRelationships` when
    /// the policy is strict
    pub fn assign_relationships(
        &self,
        asset: AssetId,
        parents: impl Into<Relatives>,
        child: impl Into<Relatives>,
    ) -> Result<RelationshipOutcome, LimsError> {
        let mutator = LineageMutator::new(self.config.relationship_shape);
        let (parents, child) = (parents.into(), child.into());
        self.store.transaction(|state| {
            mutator
                .assign_relationships(&mut state.graph, asset, parents, child)
                .map_err(LimsError::from)
        })
    }

    /// Set the sample or tag an asset holds
    ///
    /// Nothing is written when the asset's kind cannot hold this material.
    ///
    /// # Errors
    /// `AssetNotFound` or `AssociationTypeMismatch`
    pub fn assign_material(&self, asset: AssetId, material: Material) -> Result<(), LimsError> {
        self.store.transaction(|state| -> Result<(), LimsError> {
            let target = state
                .graph
                .asset_mut(asset)
                .ok_or(lims_lineage::LineageError::AssetNotFound(asset))?;
            target.assign_material(material)?;
            Ok(())
        })
    }

    /// Move `asset` and its lineage from one study to another
    ///
    /// # Errors
    /// `TransactionAborted`; the actor also gets an error message
    pub fn move_to_asset_group(
        &self,
        asset: AssetId,
        from_study: StudyId,
        to_study: StudyId,
        to_asset_group: AssetGroupId,
        new_name: &str,
        actor: UserId,
    ) -> Result<bool, LimsError> {
        self.move_to_asset_group_with_report(&MoveRequest {
            asset,
            from_study,
            to_study,
            to_asset_group,
            new_name: new_name.to_string(),
            actor,
        })
        .map(|_| true)
    }

    /// As [`Self::move_to_asset_group`], returning what changed
    ///
    /// # Errors
    /// `TransactionAborted`
    pub fn move_to_asset_group_with_report(
        &self,
        request: &MoveRequest,
    ) -> Result<ReassignmentReport, LimsError> {
        tracing::info!(
            asset = %request.asset,
            from = %request.from_study,
            to = %request.to_study,
            "Moving asset to group {}", request.to_asset_group
        );

        let engine = StudyReassignment::new(self.config.reassignment_scope);
        let report = match engine.execute(&self.store, request) {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(asset = %request.asset, error = %err, "study reassignment rolled back");
                self.messages.error(&err.to_string());
                return Err(err);
            }
        };

        tracing::info!(
            assets = report.subgraph.len(),
            requests = report.requests_moved.len(),
            relocated = report.relocated.len(),
            "Study reassignment committed"
        );

        let payload = serde_json::json!({
            "from_study": request.from_study,
            "to_study": request.to_study,
            "to_asset_group": request.to_asset_group,
        });
        for &asset in &report.subgraph {
            self.audit_entry(
                AuditEntry::new(asset, MOVED_TO_ASSET_GROUP)
                    .by(request.actor)
                    .with_payload(payload.clone()),
            );
        }
        Ok(report)
    }

    /// Suggest a tag layout for the batch plate
    ///
    /// # Errors
    /// Lookup failures; duplicates are a [`TaskOutcome::Rejected`]
    pub fn render_assign_tags_to_wells_task(
        &self,
        tag_group: TagGroupId,
        batch: BatchId,
    ) -> Result<TaskOutcome<TagAssignmentPlan>, LimsError> {
        self.tag_assignment().render(tag_group, batch)
    }

    /// Write the selected tags to the batch's wells
    ///
    /// # Errors
    /// Lookup and write failures; duplicates are a [`TaskOutcome::Rejected`]
    pub fn do_assign_tags_to_wells_task(
        &self,
        batch: BatchId,
        selections: &TagSelections,
    ) -> Result<TaskOutcome<TagApplication>, LimsError> {
        let outcome = self.tag_assignment().apply(batch, selections)?;
        if let TaskOutcome::Accepted(application) = &outcome {
            for (&well, &instance) in &application.instances {
                let tag = selections.wells.get(&well);
                self.audit_entry(AuditEntry::new(well, TAGS_ASSIGNED).with_payload(
                    serde_json::json!({ "tag": tag, "tag_instance": instance }),
                ));
            }
        }
        Ok(outcome)
    }

    fn tag_assignment(&self) -> TagAssignment<'_> {
        TagAssignment {
            store: &self.store,
            batches: self.batches.as_ref(),
            tag_groups: self.tag_groups.as_ref(),
            messages: self.messages.as_ref(),
            config: &self.config,
        }
    }

    /// Audit failures never undo a committed change
    fn audit_entry(&self, entry: AuditEntry) {
        if !self.config.audit_enabled {
            return;
        }
        let asset = entry.asset;
        if let Err(err) = self.audit.record(entry) {
            tracing::warn!(%asset, error = %err, "audit entry dropped");
        }
    }
}

impl std::fmt::Debug for SampleTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleTracker")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
