//! Lineage mutator
//!
//! `assign_relationships` keeps a shape-based argument contract: parents must be a
//! non-empty sequence and the child a single asset (or nothing). Any other
//! shape is ignored without touching the graph, unless the policy is strict.

use crate::error::LineageError;
use crate::graph::AssetGraph;
use crate::types::AssetId;
use serde::{Deserialize, Serialize};

/// Shape of a relationship argument
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Relatives {
    #[default]
    None,
    One(AssetId),
    Many(Vec<AssetId>),
}

impl From<AssetId> for Relatives {
    fn from(id: AssetId) -> Self {
        Self::One(id)
    }
}

impl From<Option<AssetId>> for Relatives {
    fn from(id: Option<AssetId>) -> Self {
        id.map_or(Self::None, Self::One)
    }
}

impl From<Vec<AssetId>> for Relatives {
    fn from(ids: Vec<AssetId>) -> Self {
        Self::Many(ids)
    }
}

impl From<&[AssetId]> for Relatives {
    fn from(ids: &[AssetId]) -> Self {
        Self::Many(ids.to_vec())
    }
}

impl<const N: usize> From<[AssetId; N]> for Relatives {
    fn from(ids: [AssetId; N]) -> Self {
        Self::Many(ids.to_vec())
    }
}

/// How malformed relationship arguments are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapePolicy {
    /// Ignore the call and leave the graph untouched
    #[default]
    Lenient,
    /// Fail with `MalformedRelationships`
    Strict,
}

/// Result of an `assign_relationships` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipOutcome {
    /// Counts only links this call created; existing links are not recounted
    Applied {
        parents_linked: usize,
        child_linked: bool,
    },
    Ignored(String),
}

impl RelationshipOutcome {
    #[inline]
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Adds and removes lineage links
#[derive(Debug, Clone, Copy, Default)]
pub struct LineageMutator {
    policy: ShapePolicy,
}

impl LineageMutator {
    #[inline]
    #[must_use]
    pub fn new(policy: ShapePolicy) -> Self {
        Self { policy }
    }

    #[inline]
    #[must_use]
    pub fn policy(&self) -> ShapePolicy {
        self.policy
    }

    /// Link `parents -> asset` (in order) and `asset -> child`.
    ///
    /// All-or-nothing: if any link fails, links created by this call are
    /// removed before the error is returned.
    ///
    /// # Errors
    /// `AssetNotFound`, `SelfLoop`, `CycleDetected`, or
    /// `MalformedRelationships` under [`ShapePolicy::Strict`]
    pub fn assign_relationships(
        &self,
        graph: &mut AssetGraph,
        asset: AssetId,
        parents: impl Into<Relatives>,
        child: impl Into<Relatives>,
    ) -> Result<RelationshipOutcome, LineageError> {
        let parents = match parents.into() {
            Relatives::Many(parents) if !parents.is_empty() => parents,
            Relatives::Many(_) => return self.reject(asset, "parents must not be empty"),
            Relatives::One(_) | Relatives::None => {
                return self.reject(asset, "parents must be a sequence of assets")
            }
        };
        let child = match child.into() {
            Relatives::One(child) => Some(child),
            Relatives::None => None,
            Relatives::Many(_) => return self.reject(asset, "child must be a single asset"),
        };

        graph.require(asset)?;

        let mut created = Vec::new();
        let result = Self::link_all(graph, asset, &parents, child, &mut created);
        if let Err(err) = result {
            for (ancestor, descendant) in created {
                graph.remove_link(ancestor, descendant);
            }
            tracing::debug!(%asset, error = %err, "rolled back relationship assignment");
            return Err(err);
        }

        let parents_linked = created.iter().filter(|(_, to)| *to == asset).count();
        let child_linked = child.is_some_and(|child| created.contains(&(asset, child)));
        tracing::debug!(%asset, parents_linked, child_linked, "relationships assigned");
        Ok(RelationshipOutcome::Applied {
            parents_linked,
            child_linked,
        })
    }

    /// Remove one link; returns whether it existed
    pub fn unlink(&self, graph: &mut AssetGraph, ancestor: AssetId, descendant: AssetId) -> bool {
        graph.remove_link(ancestor, descendant)
    }

    fn link_all(
        graph: &mut AssetGraph,
        asset: AssetId,
        parents: &[AssetId],
        child: Option<AssetId>,
        created: &mut Vec<(AssetId, AssetId)>,
    ) -> Result<(), LineageError> {
        for &parent in parents {
            if graph.add_link(parent, asset)? {
                created.push((parent, asset));
            }
        }
        if let Some(child) = child {
            if graph.add_link(asset, child)? {
                created.push((asset, child));
            }
        }
        Ok(())
    }

    fn reject(&self, asset: AssetId, reason: &str) -> Result<RelationshipOutcome, LineageError> {
        match self.policy {
            ShapePolicy::Lenient => {
                tracing::debug!(%asset, reason, "ignoring malformed relationships");
                Ok(RelationshipOutcome::Ignored(reason.to_string()))
            }
            ShapePolicy::Strict => Err(LineageError::MalformedRelationships {
                asset,
                reason: reason.to_string(),
            }),
        }
    }
}
