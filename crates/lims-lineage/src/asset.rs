//! Asset model
//!
//! Every lab artifact (tube, well, lane, pool, tag instance) shares one record
//! shape. Behaviour that differs per artifact is dispatched on [`AssetKind`],
//! and the biological payload lives in a single [`Material`] slot whose
//! variant is gated by the kind.

use crate::error::LineageError;
use crate::types::{AssetId, SampleId, TagId, WellPosition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of lab artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// Unclassified asset
    Generic,
    SampleTube,
    LibraryTube,
    MultiplexedLibraryTube,
    PulldownMultiplexedLibraryTube,
    Lane,
    Well,
    Plate,
    /// Binding of one tag to one well
    TagInstance,
}

impl AssetKind {
    /// Multiplexed (pooled) container kinds
    #[inline]
    #[must_use]
    pub fn is_pool(self) -> bool {
        matches!(
            self,
            Self::MultiplexedLibraryTube | Self::PulldownMultiplexedLibraryTube
        )
    }

    /// Whether a sample may occupy the material slot
    #[inline]
    #[must_use]
    pub fn accepts_sample(self) -> bool {
        !self.accepts_tag()
    }

    /// Whether a tag may occupy the material slot
    #[inline]
    #[must_use]
    pub fn accepts_tag(self) -> bool {
        matches!(self, Self::TagInstance)
    }
}

/// Discriminant of [`Material`], used in error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialKind {
    Sample,
    Tag,
}

/// Polymorphic material slot: exactly one of a sample or a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    Sample(SampleId),
    Tag(TagId),
}

impl Material {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MaterialKind {
        match self {
            Self::Sample(_) => MaterialKind::Sample,
            Self::Tag(_) => MaterialKind::Tag,
        }
    }
}

/// Barcode with the asset's creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeStamp {
    pub barcode: String,
    pub created_at: DateTime<Utc>,
}

/// A node in the lineage graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub kind: AssetKind,
    material: Option<Material>,
    pub name: Option<String>,
    pub barcode: Option<String>,
    /// Plate coordinate, for wells
    pub position: Option<WellPosition>,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Create an empty asset of the given kind
    #[must_use]
    pub fn new(kind: AssetKind) -> Self {
        Self {
            id: AssetId::new(),
            kind,
            material: None,
            name: None,
            barcode: None,
            position: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: WellPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Attach material, validating it against the kind
    ///
    /// # Errors
    /// `AssociationTypeMismatch` if the kind does not accept this material
    pub fn with_material(mut self, material: Material) -> Result<Self, LineageError> {
        self.assign_material(material)?;
        Ok(self)
    }

    /// Raw material slot
    #[inline]
    #[must_use]
    pub fn material(&self) -> Option<Material> {
        self.material
    }

    /// Sample held by this asset
    ///
    /// # Errors
    /// `KindMismatch` when called on a tag-bearing kind
    pub fn sample(&self) -> Result<Option<SampleId>, LineageError> {
        if !self.kind.accepts_sample() {
            return Err(self.kind_mismatch(MaterialKind::Sample));
        }
        Ok(match self.material {
            Some(Material::Sample(sample)) => Some(sample),
            _ => None,
        })
    }

    /// Tag held by this asset
    ///
    /// # Errors
    /// `KindMismatch` when called on a sample-bearing kind
    pub fn tag(&self) -> Result<Option<TagId>, LineageError> {
        if !self.kind.accepts_tag() {
            return Err(self.kind_mismatch(MaterialKind::Tag));
        }
        Ok(match self.material {
            Some(Material::Tag(tag)) => Some(tag),
            _ => None,
        })
    }

    /// Place a sample in the material slot
    ///
    /// # Errors
    /// `AssociationTypeMismatch` if this kind holds tags
    pub fn assign_sample(&mut self, sample: SampleId) -> Result<(), LineageError> {
        self.assign_material(Material::Sample(sample))
    }

    /// Place a tag in the material slot
    ///
    /// # Errors
    /// `AssociationTypeMismatch` if this kind holds samples
    pub fn assign_tag(&mut self, tag: TagId) -> Result<(), LineageError> {
        self.assign_material(Material::Tag(tag))
    }

    /// Place any material, checking the pairing with the kind first
    ///
    /// # Errors
    /// `AssociationTypeMismatch`; the asset is left unchanged
    pub fn assign_material(&mut self, material: Material) -> Result<(), LineageError> {
        let accepted = match material {
            Material::Sample(_) => self.kind.accepts_sample(),
            Material::Tag(_) => self.kind.accepts_tag(),
        };
        if !accepted {
            return Err(LineageError::AssociationTypeMismatch {
                asset: self.id,
                kind: self.kind,
                given: material.kind(),
            });
        }
        self.material = Some(material);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn is_pool(&self) -> bool {
        self.kind.is_pool()
    }

    /// Barcode together with the creation timestamp; `None` without a barcode
    #[must_use]
    pub fn barcode_and_created_at(&self) -> Option<BarcodeStamp> {
        self.barcode.as_ref().map(|barcode| BarcodeStamp {
            barcode: barcode.clone(),
            created_at: self.created_at,
        })
    }

    fn kind_mismatch(&self, expected: MaterialKind) -> LineageError {
        LineageError::KindMismatch {
            asset: self.id,
            kind: self.kind,
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_kinds() {
        assert!(!Asset::new(AssetKind::LibraryTube).is_pool());
        assert!(Asset::new(AssetKind::MultiplexedLibraryTube).is_pool());
        assert!(Asset::new(AssetKind::PulldownMultiplexedLibraryTube).is_pool());
    }

    #[test]
    fn sample_tube_holds_sample_not_tag() {
        let sample = SampleId::new();
        let mut tube = Asset::new(AssetKind::SampleTube);
        tube.assign_sample(sample).unwrap();

        assert_eq!(tube.sample().unwrap(), Some(sample));
        assert_eq!(tube.material(), Some(Material::Sample(sample)));
        assert!(matches!(
            tube.tag(),
            Err(LineageError::KindMismatch { expected: MaterialKind::Tag, .. })
        ));
    }

    #[test]
    fn tag_instance_holds_tag_not_sample() {
        let tag = TagId::new();
        let mut instance = Asset::new(AssetKind::TagInstance);
        instance.assign_tag(tag).unwrap();

        assert_eq!(instance.tag().unwrap(), Some(tag));
        assert_eq!(instance.material(), Some(Material::Tag(tag)));
        assert!(matches!(
            instance.sample(),
            Err(LineageError::KindMismatch { expected: MaterialKind::Sample, .. })
        ));
    }

    #[test]
    fn sample_assigned_as_tag_is_rejected() {
        let mut instance = Asset::new(AssetKind::TagInstance);
        let err = instance.assign_sample(SampleId::new()).unwrap_err();

        assert!(matches!(err, LineageError::AssociationTypeMismatch { .. }));
        assert!(err.is_defect());
        assert_eq!(instance.material(), None);
    }

    #[test]
    fn barcode_stamp_requires_barcode() {
        let with = Asset::new(AssetKind::SampleTube).with_barcode("NT42");
        let stamp = with.barcode_and_created_at().unwrap();
        assert_eq!(stamp.barcode, "NT42");
        assert_eq!(stamp.created_at, with.created_at);

        assert!(Asset::new(AssetKind::SampleTube)
            .barcode_and_created_at()
            .is_none());
    }
}
