//! Asset lineage graph
//!
//! Assets are nodes and [`AssetLink`]s are directed ancestor -> descendant
//! edges. The link set is a DAG: an asset may have several parents and
//! several children, so every traversal tracks a visited set and reports
//! each reachable asset exactly once.

use crate::asset::Asset;
use crate::error::LineageError;
use crate::types::AssetId;
use indexmap::{IndexMap, IndexSet};
use petgraph::algo::{has_path_connecting, is_cyclic_directed, toposort};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Directed edge between two assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetLink {
    pub ancestor: AssetId,
    pub descendant: AssetId,
}

impl AssetLink {
    #[inline]
    #[must_use]
    pub fn new(ancestor: AssetId, descendant: AssetId) -> Self {
        Self {
            ancestor,
            descendant,
        }
    }
}

/// Summary counts for a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub asset_count: usize,
    pub link_count: usize,
    pub pool_count: usize,
    pub root_count: usize,
    pub leaf_count: usize,
}

/// Assets plus the lineage links between them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(into = "GraphSnapshot", try_from = "GraphSnapshot")]
pub struct AssetGraph {
    assets: IndexMap<AssetId, Asset>,
    adjacency: DiGraphMap<AssetId, ()>,
    /// Insertion order of links, so neighbours read back in creation order
    links: IndexSet<AssetLink>,
}

impl PartialEq for AssetGraph {
    fn eq(&self, other: &Self) -> bool {
        self.assets == other.assets && self.links == other.links
    }
}

impl AssetGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset node
    ///
    /// # Errors
    /// `DuplicateAsset` if the id is already present
    pub fn insert_asset(&mut self, asset: Asset) -> Result<AssetId, LineageError> {
        let id = asset.id;
        if self.assets.contains_key(&id) {
            return Err(LineageError::DuplicateAsset(id));
        }
        self.adjacency.add_node(id);
        self.assets.insert(id, asset);
        Ok(id)
    }

    /// Remove an asset and every link touching it
    ///
    /// # Errors
    /// `AssetNotFound`
    pub fn remove_asset(&mut self, id: AssetId) -> Result<Asset, LineageError> {
        let asset = self
            .assets
            .shift_remove(&id)
            .ok_or(LineageError::AssetNotFound(id))?;
        self.adjacency.remove_node(id);
        self.links
            .retain(|link| link.ancestor != id && link.descendant != id);
        Ok(asset)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: AssetId) -> bool {
        self.assets.contains_key(&id)
    }

    #[inline]
    #[must_use]
    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.assets.get(&id)
    }

    #[inline]
    pub fn asset_mut(&mut self, id: AssetId) -> Option<&mut Asset> {
        self.assets.get_mut(&id)
    }

    /// Look up an asset, failing if absent
    ///
    /// # Errors
    /// `AssetNotFound`
    pub fn require(&self, id: AssetId) -> Result<&Asset, LineageError> {
        self.asset(id).ok_or(LineageError::AssetNotFound(id))
    }

    /// Assets in insertion order
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    /// Links in creation order
    pub fn links(&self) -> impl Iterator<Item = &AssetLink> {
        self.links.iter()
    }

    #[inline]
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    #[inline]
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Add an ancestor -> descendant link.
    ///
    /// Links are de-duplicated by pair: returns `Ok(false)` when the link
    /// already exists.
    ///
    /// # Errors
    /// `AssetNotFound`, `SelfLoop`, or `CycleDetected` when the descendant can
    /// already reach the ancestor
    pub fn add_link(&mut self, ancestor: AssetId, descendant: AssetId) -> Result<bool, LineageError> {
        if ancestor == descendant {
            return Err(LineageError::SelfLoop(ancestor));
        }
        self.require(ancestor)?;
        self.require(descendant)?;

        let link = AssetLink::new(ancestor, descendant);
        if self.links.contains(&link) {
            return Ok(false);
        }
        if has_path_connecting(&self.adjacency, descendant, ancestor, None) {
            return Err(LineageError::CycleDetected {
                ancestor,
                descendant,
            });
        }

        self.adjacency.add_edge(ancestor, descendant, ());
        self.links.insert(link);
        Ok(true)
    }

    /// Remove a link; returns whether it existed
    pub fn remove_link(&mut self, ancestor: AssetId, descendant: AssetId) -> bool {
        let removed = self.links.shift_remove(&AssetLink::new(ancestor, descendant));
        if removed {
            self.adjacency.remove_edge(ancestor, descendant);
        }
        removed
    }

    /// Direct parents, in the order the links were created
    #[must_use]
    pub fn parents_of(&self, id: AssetId) -> Vec<AssetId> {
        self.neighbours(id, Direction::Incoming)
    }

    /// Direct children, in the order the links were created
    #[must_use]
    pub fn children_of(&self, id: AssetId) -> Vec<AssetId> {
        self.neighbours(id, Direction::Outgoing)
    }

    /// Every asset reachable downstream, each once, excluding `id`
    #[must_use]
    pub fn descendants_of(&self, id: AssetId) -> IndexSet<AssetId> {
        self.walk(id, &[Direction::Outgoing])
    }

    /// Every asset reachable upstream, each once, excluding `id`
    #[must_use]
    pub fn ancestors_of(&self, id: AssetId) -> IndexSet<AssetId> {
        self.walk(id, &[Direction::Incoming])
    }

    /// Weakly-connected component of `id` (links followed both ways), excluding `id`
    #[must_use]
    pub fn connected_component(&self, id: AssetId) -> IndexSet<AssetId> {
        self.walk(id, &[Direction::Outgoing, Direction::Incoming])
    }

    /// Whether the asset is a pooled container
    #[must_use]
    pub fn is_pool(&self, id: AssetId) -> bool {
        self.asset(id).is_some_and(Asset::is_pool)
    }

    /// Check the whole link set is acyclic
    ///
    /// # Errors
    /// `CycleDetected`
    pub fn validate(&self) -> Result<(), LineageError> {
        if is_cyclic_directed(&self.adjacency) {
            self.topological_order()?;
        }
        Ok(())
    }

    /// Ancestors before descendants
    ///
    /// # Errors
    /// `CycleDetected`
    pub fn topological_order(&self) -> Result<Vec<AssetId>, LineageError> {
        toposort(&self.adjacency, None).map_err(|cycle| LineageError::CycleDetected {
            ancestor: cycle.node_id(),
            descendant: cycle.node_id(),
        })
    }

    /// Assets with no parents
    #[must_use]
    pub fn root_assets(&self) -> Vec<AssetId> {
        self.assets
            .keys()
            .copied()
            .filter(|id| {
                self.adjacency
                    .neighbors_directed(*id, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect()
    }

    /// Assets with no children
    #[must_use]
    pub fn leaf_assets(&self) -> Vec<AssetId> {
        self.assets
            .keys()
            .copied()
            .filter(|id| {
                self.adjacency
                    .neighbors_directed(*id, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            asset_count: self.asset_count(),
            link_count: self.link_count(),
            pool_count: self.assets.values().filter(|a| a.is_pool()).count(),
            root_count: self.root_assets().len(),
            leaf_count: self.leaf_assets().len(),
        }
    }

    fn neighbours(&self, id: AssetId, direction: Direction) -> Vec<AssetId> {
        if !self.adjacency.contains_node(id) {
            return Vec::new();
        }
        let mut found: Vec<(usize, AssetId)> = self
            .adjacency
            .neighbors_directed(id, direction)
            .filter_map(|other| {
                let link = match direction {
                    Direction::Incoming => AssetLink::new(other, id),
                    Direction::Outgoing => AssetLink::new(id, other),
                };
                self.links.get_index_of(&link).map(|order| (order, other))
            })
            .collect();
        found.sort_unstable_by_key(|(order, _)| *order);
        found.into_iter().map(|(_, other)| other).collect()
    }

    fn walk(&self, start: AssetId, directions: &[Direction]) -> IndexSet<AssetId> {
        let mut visited: HashSet<AssetId> = HashSet::new();
        let mut reached = IndexSet::new();
        let mut queue = VecDeque::new();

        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for &direction in directions {
                for next in self.neighbours(current, direction) {
                    if visited.insert(next) {
                        reached.insert(next);
                        queue.push_back(next);
                    }
                }
            }
        }

        reached
    }
}

/// Serialized form of [`AssetGraph`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphSnapshot {
    assets: Vec<Asset>,
    links: Vec<AssetLink>,
}

impl From<AssetGraph> for GraphSnapshot {
    fn from(graph: AssetGraph) -> Self {
        Self {
            assets: graph.assets.into_values().collect(),
            links: graph.links.into_iter().collect(),
        }
    }
}

impl TryFrom<GraphSnapshot> for AssetGraph {
    type Error = LineageError;

    fn try_from(snapshot: GraphSnapshot) -> Result<Self, Self::Error> {
        let mut graph = AssetGraph::new();
        for asset in snapshot.assets {
            graph.insert_asset(asset)?;
        }
        for link in snapshot.links {
            graph.add_link(link.ancestor, link.descendant)?;
        }
        Ok(graph)
    }
}
