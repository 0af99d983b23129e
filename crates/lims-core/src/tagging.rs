//! Tag assignment for multiplexed sequencing
//!
//! Two phases:
//! 1. render: lay a tag group's tags over the batch plate's wells and check
//!    that no submission would pool two wells carrying the same tag
//! 2. apply: re-check the tags the user actually selected, then replace the
//!    wells' tag instances and attach each submission's libraries to its pool
//!
//! A duplicate tag is a rejection, not an error: nothing is written and the
//! caller gets a [`TaskOutcome::Rejected`] telling it what to re-prompt for.

use crate::collaborators::{BatchLookup, MessageChannel, TagGroupLookup};
use crate::config::LimsConfig;
use crate::error::{LimsError, TagValidationError};
use crate::store::{LabState, LabStore};
use crate::types::{Request, Tag};
use indexmap::{IndexMap, IndexSet};
use lims_lineage::{
    Asset, AssetId, AssetKind, BatchId, Material, SubmissionId, TagGroupId, TagId, WellPosition,
};
use serde::Serialize;

/// One well and the tag laid over it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WellTag {
    pub well: AssetId,
    pub position: Option<WellPosition>,
    pub tag: TagId,
}

/// Suggested layout shown to the user in the render phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagAssignmentPlan {
    pub batch: BatchId,
    pub tag_group: TagGroupId,
    pub plate: AssetId,
    /// Tags of the group, ordered by `map_id`
    pub tags: Vec<Tag>,
    /// Column-major wells paired with tags; surplus wells are left out
    pub wells_to_tags: Vec<WellTag>,
    /// Request asset to display colour, one colour per submission
    pub colour_index: IndexMap<AssetId, usize>,
}

impl TagAssignmentPlan {
    /// Selections that accept the plan as laid out
    #[must_use]
    pub fn selections(&self) -> TagSelections {
        let mut selections = TagSelections::new().with_tag_group(self.tag_group);
        for pair in &self.wells_to_tags {
            selections = selections.select(pair.well, pair.tag);
        }
        selections
    }
}

/// Well-to-tag choices submitted by the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSelections {
    pub tag_group: Option<TagGroupId>,
    pub wells: IndexMap<AssetId, TagId>,
}

impl TagSelections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tag_group(mut self, tag_group: TagGroupId) -> Self {
        self.tag_group = Some(tag_group);
        self
    }

    /// Choose `tag` for `well`, replacing an earlier choice
    #[must_use]
    pub fn select(mut self, well: AssetId, tag: TagId) -> Self {
        self.wells.insert(well, tag);
        self
    }
}

/// Where the caller should send the user after a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Restage {
    pub batch: BatchId,
    pub tag_group: Option<TagGroupId>,
}

/// Why a task was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub warning: String,
    pub restage: Restage,
    pub violation: TagValidationError,
}

/// Accepted result, or a rejection that is safe to retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Accepted(T),
    Rejected(Rejection),
}

impl<T> TaskOutcome<T> {
    #[inline]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    #[must_use]
    pub fn accepted(&self) -> Option<&T> {
        match self {
            Self::Accepted(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

/// What the apply phase changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagApplication {
    /// Tag instances destroyed from the batch's wells
    pub removed_instances: Vec<AssetId>,
    /// Well to its new tag instance
    pub instances: IndexMap<AssetId, AssetId>,
    /// Submission to the pool its libraries now feed
    pub pools: IndexMap<SubmissionId, AssetId>,
    pub created_pools: Vec<AssetId>,
}

/// Pair tags with wells in column-major order (A1, B1, ... H1, A2, ...)
///
/// Wells without a position sort last. When there are more wells than tags
/// the extra wells get nothing.
#[must_use]
pub fn map_tags_to_wells(tags: &[Tag], wells: &[Asset]) -> Vec<WellTag> {
    let mut ordered: Vec<&Asset> = wells.iter().collect();
    ordered.sort_by_key(|well| (well.position.is_none(), well.position));
    ordered
        .into_iter()
        .zip(tags)
        .map(|(well, tag)| WellTag {
            well: well.id,
            position: well.position,
            tag: tag.id,
        })
        .collect()
}

/// Colour ordinal per request asset, numbering submissions in first-seen order
#[must_use]
pub fn colour_index_by_submission(requests: &[Request]) -> IndexMap<AssetId, usize> {
    let mut submissions: IndexSet<SubmissionId> = IndexSet::new();
    requests
        .iter()
        .map(|request| {
            let (ordinal, _) = submissions.insert_full(request.submission);
            (request.asset, ordinal)
        })
        .collect()
}

/// Finds a tag that one submission would pool twice
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateTagValidator;

impl DuplicateTagValidator {
    /// Check every submission for a repeated tag; stops at the first one
    ///
    /// `tag_for` maps a request's well to its tag; untagged wells are skipped.
    ///
    /// # Errors
    /// `DuplicateTagInSubmission` naming the first well that held the tag and
    /// the well that repeated it
    pub fn validate(
        requests: &[Request],
        tag_for: impl Fn(AssetId) -> Option<TagId>,
    ) -> Result<(), TagValidationError> {
        let mut seen: IndexMap<SubmissionId, IndexMap<TagId, AssetId>> = IndexMap::new();
        for request in requests {
            let Some(tag) = tag_for(request.asset) else {
                continue;
            };
            let tags = seen.entry(request.submission).or_default();
            match tags.get(&tag) {
                Some(&first) if first != request.asset => {
                    return Err(TagValidationError::DuplicateTagInSubmission {
                        submission: request.submission,
                        tag,
                        wells: vec![first, request.asset],
                    });
                }
                Some(_) => {}
                None => {
                    tags.insert(tag, request.asset);
                }
            }
        }
        Ok(())
    }
}

/// Render and apply phases bound to their collaborators
pub struct TagAssignment<'a> {
    pub store: &'a LabStore,
    pub batches: &'a dyn BatchLookup,
    pub tag_groups: &'a dyn TagGroupLookup,
    pub messages: &'a dyn MessageChannel,
    pub config: &'a LimsConfig,
}

impl TagAssignment<'_> {
    /// Lay `tag_group` over the batch plate and check it for duplicates
    ///
    /// # Errors
    /// Lookup failures (`UnknownBatch`, `BatchHasNoPlate`, `UnknownTagGroup`, ...)
    pub fn render(
        &self,
        tag_group: TagGroupId,
        batch: BatchId,
    ) -> Result<TaskOutcome<TagAssignmentPlan>, LimsError> {
        tracing::info!(%batch, %tag_group, "rendering tag assignment");
        let tags = self.tag_groups.tags_in_group(tag_group)?;
        let requests = self.batches.batch_requests(batch)?;
        let plate = self.batches.batch_plate(batch)?;

        let wells: Vec<Asset> = self.store.read(|state| {
            state
                .graph
                .children_of(plate.id)
                .into_iter()
                .filter_map(|id| state.graph.asset(id))
                .filter(|asset| asset.kind == AssetKind::Well)
                .cloned()
                .collect()
        });
        let wells_to_tags = map_tags_to_wells(&tags, &wells);
        let colour_index = colour_index_by_submission(&requests);

        let layout: IndexMap<AssetId, TagId> =
            wells_to_tags.iter().map(|pair| (pair.well, pair.tag)).collect();
        if let Err(violation) =
            DuplicateTagValidator::validate(&requests, |well| layout.get(&well).copied())
        {
            return Ok(self.reject(
                &self.config.duplicate_tag_warning,
                Restage {
                    batch,
                    tag_group: Some(tag_group),
                },
                violation,
            ));
        }

        tracing::debug!(wells = wells_to_tags.len(), tags = tags.len(), "tag layout accepted");
        Ok(TaskOutcome::Accepted(TagAssignmentPlan {
            batch,
            tag_group,
            plate: plate.id,
            tags,
            wells_to_tags,
            colour_index,
        }))
    }

    /// Re-validate `selections` and write them in one unit of work
    ///
    /// The batch's requests are read from the unit of work, so the checks
    /// and the writes see the same state.
    ///
    /// # Errors
    /// `WellNotInBatch`, `UnknownTag`, lookup failures, or
    /// `TransactionAborted` when the write fails and is rolled back
    pub fn apply(
        &self,
        batch: BatchId,
        selections: &TagSelections,
    ) -> Result<TaskOutcome<TagApplication>, LimsError> {
        tracing::info!(%batch, selected = selections.wells.len(), "assigning tags to wells");
        let mut work = self.store.begin();
        let requests = work.state().batch_requests(batch)?;
        let batch_wells: IndexSet<AssetId> = requests.iter().map(|r| r.asset).collect();

        for (&well, &tag) in &selections.wells {
            if !batch_wells.contains(&well) {
                return Err(LimsError::WellNotInBatch { batch, well });
            }
            if !work.state().tags.contains_key(&tag) {
                return Err(LimsError::UnknownTag(tag));
            }
        }

        if let Err(violation) =
            DuplicateTagValidator::validate(&requests, |well| selections.wells.get(&well).copied())
        {
            work.rollback();
            return Ok(self.reject(
                &self.config.duplicate_selection_warning,
                Restage {
                    batch,
                    tag_group: selections.tag_group,
                },
                violation,
            ));
        }

        let prefix = self.config.pool_name_prefix.as_str();
        let written = write_tags(work.state_mut(), &requests, &batch_wells, selections, prefix);
        let written = match written {
            Ok(application) => work
                .commit()
                .map(|()| application)
                .map_err(LimsError::from),
            Err(err) => {
                work.rollback();
                Err(err)
            }
        };
        let application = written.map_err(|err| {
            let err = LimsError::aborted(err);
            tracing::error!(%batch, error = %err, "tag assignment rolled back");
            self.messages.error(&err.to_string());
            err
        })?;

        tracing::info!(
            %batch,
            removed = application.removed_instances.len(),
            created = application.instances.len(),
            pools = application.pools.len(),
            "tags assigned"
        );
        Ok(TaskOutcome::Accepted(application))
    }

    fn reject<T>(
        &self,
        warning: &str,
        restage: Restage,
        violation: TagValidationError,
    ) -> TaskOutcome<T> {
        tracing::warn!(batch = %restage.batch, %violation, "tag assignment rejected");
        self.messages.warning(warning);
        TaskOutcome::Rejected(Rejection {
            warning: warning.to_string(),
            restage,
            violation,
        })
    }
}

/// Steps (a) to (c) of the apply phase, in order
fn write_tags(
    state: &mut LabState,
    requests: &[Request],
    batch_wells: &IndexSet<AssetId>,
    selections: &TagSelections,
    pool_name_prefix: &str,
) -> Result<TagApplication, LimsError> {
    let mut application = TagApplication::default();

    for &well in batch_wells {
        for parent in state.graph.parents_of(well) {
            if state.graph.asset(parent).map(|a| a.kind) == Some(AssetKind::TagInstance) {
                state.graph.remove_asset(parent)?;
                application.removed_instances.push(parent);
            }
        }
    }
    tracing::debug!(removed = application.removed_instances.len(), "old tag instances removed");

    for (&well, &tag) in &selections.wells {
        let oligo = state
            .tags
            .get(&tag)
            .map(|t| t.oligo.clone())
            .ok_or(LimsError::UnknownTag(tag))?;
        let instance = Asset::new(AssetKind::TagInstance)
            .with_name(oligo)
            .with_material(Material::Tag(tag))?;
        let instance = state.graph.insert_asset(instance)?;
        state.graph.add_link(instance, well)?;
        application.instances.insert(well, instance);
    }

    let mut libraries: IndexMap<SubmissionId, IndexSet<AssetId>> = IndexMap::new();
    for request in requests {
        if selections.wells.contains_key(&request.asset) {
            libraries
                .entry(request.submission)
                .or_default()
                .insert(request.library());
        }
    }
    for (submission, libraries) in libraries {
        let pool = match find_pool(state, submission, &libraries) {
            Some(pool) => pool,
            None => {
                let pool = state.graph.insert_asset(
                    Asset::new(AssetKind::MultiplexedLibraryTube)
                        .with_name(format!("{pool_name_prefix} {submission}")),
                )?;
                application.created_pools.push(pool);
                pool
            }
        };
        for &library in &libraries {
            for child in state.graph.children_of(library) {
                if child != pool && state.graph.is_pool(child) {
                    state.graph.remove_link(library, child);
                }
            }
            state.graph.add_link(library, pool)?;
        }
        application.pools.insert(submission, pool);
    }
    tracing::debug!(pools = application.pools.len(), "libraries pooled");

    Ok(application)
}

/// Nearest pool downstream of any of `libraries` that only this submission feeds
fn find_pool(
    state: &LabState,
    submission: SubmissionId,
    libraries: &IndexSet<AssetId>,
) -> Option<AssetId> {
    libraries.iter().find_map(|&library| {
        state
            .graph
            .descendants_of(library)
            .into_iter()
            .find(|&id| state.graph.is_pool(id) && pooled_only_from(state, id, submission))
    })
}

/// Whether every requested library upstream of `pool` belongs to `submission`
fn pooled_only_from(state: &LabState, pool: AssetId, submission: SubmissionId) -> bool {
    let upstream = state.graph.ancestors_of(pool);
    state
        .requests
        .values()
        .filter(|request| upstream.contains(&request.library()))
        .all(|request| request.submission == submission)
}
