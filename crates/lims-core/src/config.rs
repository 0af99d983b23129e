//! LIMS configuration
//!
//! Loaded from TOML; every field has a default, so an empty file is valid.

use crate::error::LimsError;
use lims_lineage::ShapePolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which assets a study reassignment carries along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReassignmentScope {
    /// Every asset weakly connected to the starting asset
    #[default]
    Connected,
    /// The starting asset and its downstream closure only
    Descendants,
}

/// LIMS configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimsConfig {
    /// Handling of malformed `assign_relationships` arguments
    pub relationship_shape: ShapePolicy,
    /// Subgraph relocated by `move_to_asset_group`
    pub reassignment_scope: ReassignmentScope,
    /// Whether workflows emit asset audit entries
    pub audit_enabled: bool,
    /// Name prefix for pools created during tag assignment
    pub pool_name_prefix: String,
    /// Shown when a tag group would put one tag twice into a pool
    pub duplicate_tag_warning: String,
    /// Shown when submitted selections repeat a tag inside a pool
    pub duplicate_selection_warning: String,
}

impl LimsConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// `Config` when the document is not valid TOML for this schema
    pub fn from_toml_str(source: &str) -> Result<Self, LimsError> {
        toml::from_str(source).map_err(|e| LimsError::Config(e.to_string()))
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// `Config` when the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LimsError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| LimsError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// With relationship shape policy
    #[inline]
    #[must_use]
    pub fn with_relationship_shape(mut self, policy: ShapePolicy) -> Self {
        self.relationship_shape = policy;
        self
    }

    /// With reassignment scope
    #[inline]
    #[must_use]
    pub fn with_reassignment_scope(mut self, scope: ReassignmentScope) -> Self {
        self.reassignment_scope = scope;
        self
    }

    /// With audit enabled or disabled
    #[inline]
    #[must_use]
    pub fn with_audit(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    /// With pool name prefix
    #[inline]
    #[must_use]
    pub fn with_pool_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.pool_name_prefix = prefix.into();
        self
    }
}

impl Default for LimsConfig {
    fn default() -> Self {
        Self {
            relationship_shape: ShapePolicy::Lenient,
            reassignment_scope: ReassignmentScope::Connected,
            audit_enabled: true,
            pool_name_prefix: "Pool".to_string(),
            duplicate_tag_warning:
                "Duplicate tags will be assigned to a pooled tube, select a different tag group"
                    .to_string(),
            duplicate_selection_warning: "Duplicate tags in a single pooled tube".to_string(),
        }
    }
}
