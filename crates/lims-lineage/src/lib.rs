//! LIMS Lineage
//!
//! Lab assets (tubes, wells, lanes, pools) as nodes of a directed acyclic
//! provenance graph.
//!
//! - [`AssetGraph`]: assets plus ancestor -> descendant links, with DAG-safe
//!   traversal (`descendants_of`, `ancestors_of`, `connected_component`)
//! - [`LineageMutator`]: `assign_relationships` with its argument-shape guard
//! - [`AuditLog`]: append-only, hash-chained asset audit sink
//!
//! # Example
//!
//! ```rust
//! use lims_lineage::prelude::*;
//!
//! let mut graph = AssetGraph::new();
//! let tube = graph.insert_asset(Asset::new(AssetKind::SampleTube)).unwrap();
//! let library = graph.insert_asset(Asset::new(AssetKind::LibraryTube)).unwrap();
//! let pool = graph.insert_asset(Asset::new(AssetKind::MultiplexedLibraryTube)).unwrap();
//!
//! LineageMutator::default()
//!     .assign_relationships(&mut graph, library, vec![tube], pool)
//!     .unwrap();
//!
//! assert_eq!(graph.descendants_of(tube).len(), 2);
//! assert!(graph.is_pool(pool));
//! ```

pub mod asset;
pub mod audit;
pub mod error;
pub mod graph;
pub mod lineage;
pub mod types;

pub use asset::{Asset, AssetKind, BarcodeStamp, Material, MaterialKind};
pub use audit::{AuditEntry, AuditLog, AuditRecord, AuditSink};
pub use error::{AuditError, LineageError};
pub use graph::{AssetGraph, AssetLink, GraphStats};
pub use lineage::{LineageMutator, RelationshipOutcome, Relatives, ShapePolicy};
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        Asset, AssetGraph, AssetId, AssetKind, AssetLink, AuditEntry, AuditLog, AuditSink,
        LineageError, LineageMutator, Material, RelationshipOutcome, Relatives, SampleId,
        ShapePolicy, TagId,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
