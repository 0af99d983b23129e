//! Error types for LIMS Core
//!
//! Provides error handling for:
//! - Lineage and asset model violations (propagated from `lims-lineage`)
//! - Unit-of-work commit failures
//! - Tag collisions inside a pooling submission
//! - Missing records and misconfigured workflows

use lims_lineage::{
    AssetGroupId, AssetId, AuditError, BatchId, LineageError, RequestId, StudyId, SubmissionId,
    TagGroupId, TagId,
};

/// Main LIMS error type
#[derive(Debug, thiserror::Error)]
pub enum LimsError {
    /// Graph or asset model error
    #[error("lineage error: {0}")]
    Lineage(#[from] LineageError),

    /// Persistence failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Audit sink rejected an entry
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// Pre-mutation tag validation failed
    #[error("tag validation failed: {0}")]
    TagValidation(#[from] TagValidationError),

    #[error("unknown study: {0}")]
    UnknownStudy(StudyId),

    #[error("unknown asset group: {0}")]
    UnknownAssetGroup(AssetGroupId),

    /// Target asset group is scoped to a different study
    #[error("asset group {group} belongs to study {actual}, expected {expected}")]
    AssetGroupStudyMismatch {
        group: AssetGroupId,
        expected: StudyId,
        actual: StudyId,
    },

    #[error("unknown request: {0}")]
    UnknownRequest(RequestId),

    #[error("unknown batch: {0}")]
    UnknownBatch(BatchId),

    #[error("batch {0} has no plate")]
    BatchHasNoPlate(BatchId),

    #[error("unknown tag group: {0}")]
    UnknownTagGroup(TagGroupId),

    #[error("unknown tag: {0}")]
    UnknownTag(TagId),

    /// Tag selection names a well outside the batch
    #[error("well {well} is not part of batch {batch}")]
    WellNotInBatch { batch: BatchId, well: AssetId },

    /// A unit of work failed and was rolled back
    #[error("transaction aborted: {source}")]
    TransactionAborted {
        /// The failure that triggered the rollback
        source: Box<LimsError>,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl LimsError {
    /// Wrap an error as a rolled-back transaction
    #[inline]
    #[must_use]
    pub fn aborted(error: LimsError) -> Self {
        match error {
            already @ Self::TransactionAborted { .. } => already,
            other => Self::TransactionAborted {
                source: Box::new(other),
            },
        }
    }

    /// Rejected input that is safe to retry with different values
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::TagValidation(_))
    }

    /// Contract violation or data corruption; must not be swallowed
    #[must_use]
    pub fn is_defect(&self) -> bool {
        match self {
            Self::Lineage(e) => e.is_defect(),
            Self::TransactionAborted { source } => source.is_defect(),
            _ => false,
        }
    }

    /// Underlying cause, looking through a rolled-back transaction
    #[must_use]
    pub fn root(&self) -> &LimsError {
        match self {
            Self::TransactionAborted { source } => source.root(),
            other => other,
        }
    }
}

/// Unit-of-work and persistence errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Commit sink refused the staged state
    #[error("commit failed: {0}")]
    CommitFailed(String),

    /// Snapshot could not be read or written
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

/// Tag validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagValidationError {
    /// Two wells pooled by one submission carry the same tag
    #[error("tag {tag} assigned to more than one well in submission {submission}")]
    DuplicateTagInSubmission {
        submission: SubmissionId,
        tag: TagId,
        /// The first well holding the tag and the well that repeated it
        wells: Vec<AssetId>,
    },
}
