//! Error types for the lineage graph, asset model and audit sink

use crate::asset::{AssetKind, MaterialKind};
use crate::types::AssetId;

/// Lineage and asset model errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineageError {
    /// Asset is not present in the graph
    #[error("asset not found: {0}")]
    AssetNotFound(AssetId),

    /// Asset id already present in the graph
    #[error("asset already exists: {0}")]
    DuplicateAsset(AssetId),

    /// Link from an asset to itself
    #[error("self-loop on asset {0}")]
    SelfLoop(AssetId),

    /// Link would close a cycle
    #[error("link {ancestor} -> {descendant} would create a cycle")]
    CycleDetected {
        ancestor: AssetId,
        descendant: AssetId,
    },

    /// Material accessor used on the wrong asset kind
    #[error("kind mismatch: {kind:?} asset {asset} has no {expected:?} material")]
    KindMismatch {
        asset: AssetId,
        kind: AssetKind,
        expected: MaterialKind,
    },

    /// Material of the wrong kind assigned to an asset
    #[error("association type mismatch: cannot assign {given:?} to {kind:?} asset {asset}")]
    AssociationTypeMismatch {
        asset: AssetId,
        kind: AssetKind,
        given: MaterialKind,
    },

    /// Relationship arguments of the wrong shape (strict policy only)
    #[error("malformed relationships for asset {asset}: {reason}")]
    MalformedRelationships { asset: AssetId, reason: String },

    /// Unparseable plate coordinate
    #[error("invalid well position: {0:?}")]
    InvalidWellPosition(String),
}

impl LineageError {
    /// Contract violations that indicate a defect in the caller or corrupt data.
    ///
    /// These must propagate; they are never turned into user-facing rejections.
    #[inline]
    #[must_use]
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Self::KindMismatch { .. }
                | Self::AssociationTypeMismatch { .. }
                | Self::CycleDetected { .. }
                | Self::SelfLoop(_)
        )
    }

    /// Errors a caller can correct and retry
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !self.is_defect()
    }
}

/// Audit sink errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// Key does not match `^[\w_]+$`
    #[error("invalid audit key: {0:?}")]
    InvalidKey(String),

    /// Hash chain broken
    #[error("audit log integrity violation at record {index}")]
    IntegrityViolation { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatches_are_defects() {
        let asset = AssetId::new();
        let err = LineageError::KindMismatch {
            asset,
            kind: AssetKind::TagInstance,
            expected: MaterialKind::Sample,
        };
        assert!(err.is_defect());
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("kind mismatch"));
    }

    #[test]
    fn missing_asset_is_recoverable() {
        assert!(LineageError::AssetNotFound(AssetId::new()).is_recoverable());
    }
}
