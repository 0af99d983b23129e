//! Core records for LIMS
//!
//! Defines the non-graph records the workflows operate on:
//! - Studies and samples
//! - Asset groups (study-scoped collections of assets)
//! - Requests, submissions and batches
//! - Tags and tag groups

use lims_lineage::{
    AssetGroupId, AssetId, BatchId, RequestId, SampleId, StudyId, SubmissionId, TagGroupId, TagId,
};
use serde::{Deserialize, Serialize};

/// A research study
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
    pub id: StudyId,
    pub name: String,
}

impl Study {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: StudyId::new(),
            name: name.into(),
        }
    }
}

/// A biological sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub name: String,
}

impl Sample {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SampleId::new(),
            name: name.into(),
        }
    }
}

/// Named, study-scoped collection of assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetGroup {
    pub id: AssetGroupId,
    pub name: String,
    pub study: StudyId,
}

impl AssetGroup {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, study: StudyId) -> Self {
        Self {
            id: AssetGroupId::new(),
            name: name.into(),
            study,
        }
    }
}

/// A unit of work ordered against an asset on behalf of a study
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub study: StudyId,
    pub sample: Option<SampleId>,
    /// Source asset the work is performed on
    pub asset: AssetId,
    /// Asset produced by the work, when known
    pub target_asset: Option<AssetId>,
    /// Submission grouping requests that pool together
    pub submission: SubmissionId,
}

impl Request {
    #[must_use]
    pub fn new(study: StudyId, asset: AssetId, submission: SubmissionId) -> Self {
        Self {
            id: RequestId::new(),
            study,
            sample: None,
            asset,
            target_asset: None,
            submission,
        }
    }

    #[must_use]
    pub fn with_sample(mut self, sample: SampleId) -> Self {
        self.sample = Some(sample);
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: AssetId) -> Self {
        self.target_asset = Some(target);
        self
    }

    /// The library this request indexes: its target, else its source
    #[inline]
    #[must_use]
    pub fn library(&self) -> AssetId {
        self.target_asset.unwrap_or(self.asset)
    }
}

/// Requests processed together in one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub requests: Vec<RequestId>,
}

impl Batch {
    #[inline]
    #[must_use]
    pub fn new(requests: Vec<RequestId>) -> Self {
        Self {
            id: BatchId::new(),
            requests,
        }
    }
}

/// An index oligo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    /// Position of the tag within its group
    pub map_id: u32,
    pub oligo: String,
}

impl Tag {
    #[inline]
    #[must_use]
    pub fn new(map_id: u32, oligo: impl Into<String>) -> Self {
        Self {
            id: TagId::new(),
            map_id,
            oligo: oligo.into(),
        }
    }
}

/// Ordered set of tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagGroup {
    pub id: TagGroupId,
    pub name: String,
    pub tags: Vec<TagId>,
}

impl TagGroup {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, tags: Vec<TagId>) -> Self {
        Self {
            id: TagGroupId::new(),
            name: name.into(),
            tags,
        }
    }
}
