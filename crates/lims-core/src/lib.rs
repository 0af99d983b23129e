//! LIMS Core - lab workflows over the asset lineage graph
//!
//! - Unit-of-work record store ([`LabStore`]) with optional commit sink
//! - Study reassignment: `move_to_asset_group` relocates an asset's lineage,
//!   requests and samples from one study to another atomically
//! - Tag assignment: render a tag layout for a batch plate, reject tags that
//!   would collide inside a pooled submission, apply the user's selection
//! - [`SampleTracker`] façade wiring store, lookups, audit and messages
//!
//! # Example
//!
//! ```rust
//! use lims_core::prelude::*;
//! use lims_lineage::{Asset, AssetKind, UserId};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), LimsError> {
//! let mut state = LabState::new();
//! let from = state.add_study(Study::new("Study A"));
//! let to = state.add_study(Study::new("Study B"));
//! let group = state.add_asset_group(AssetGroup::new("B tubes", to));
//! let tube = state.graph.insert_asset(Asset::new(AssetKind::SampleTube))?;
//!
//! let tracker = SampleTracker::new(Arc::new(LabStore::from_snapshot(state)), LimsConfig::new());
//! assert!(tracker.move_to_asset_group(tube, from, to, group, "", UserId::new())?);
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]

pub mod collaborators;
pub mod config;
pub mod error;
pub mod reassignment;
pub mod store;
pub mod tagging;
pub mod tracker;
pub mod types;

pub use collaborators::{
    BatchLookup, Flash, FlashMessages, MessageChannel, TagGroupLookup, TracingMessages,
};
pub use config::{LimsConfig, ReassignmentScope};
pub use error::{LimsError, StoreError, TagValidationError};
pub use reassignment::{MoveRequest, ReassignmentReport, StudyReassignment};
pub use store::{CommitSink, LabState, LabStore, SnapshotFile, UnitOfWork};
pub use tagging::{
    colour_index_by_submission, map_tags_to_wells, DuplicateTagValidator, Rejection, Restage,
    TagApplication, TagAssignment, TagAssignmentPlan, TagSelections, TaskOutcome, WellTag,
};
pub use tracker::{SampleTracker, MOVED_TO_ASSET_GROUP, TAGS_ASSIGNED};
pub use types::{AssetGroup, Batch, Request, Sample, Study, Tag, TagGroup};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with LIMS Core
    pub use crate::{
        AssetGroup, Batch, FlashMessages, LabState, LabStore, LimsConfig, LimsError, Request,
        Sample, SampleTracker, Study, Tag, TagGroup, TagSelections, TaskOutcome,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
